//! Static allow-list of webhook-capable triggers.

use serde::Serialize;

/// A provider trigger that can start a workflow through a webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SupportedTrigger {
    pub provider_id: &'static str,
    pub trigger_type: &'static str,
    /// The provider must be told about the webhook URL (watch/subscription
    /// API) before it sends events.
    pub requires_subscription: bool,
}

const fn trigger(provider_id: &'static str, trigger_type: &'static str, requires_subscription: bool) -> SupportedTrigger {
    SupportedTrigger {
        provider_id,
        trigger_type,
        requires_subscription,
    }
}

pub const SUPPORTED_TRIGGERS: &[SupportedTrigger] = &[
    trigger("gmail", "gmail_trigger_new_email", true),
    trigger("google-calendar", "google_calendar_trigger_new_event", true),
    trigger("google-drive", "google_drive_trigger_new_file", true),
    trigger("google-sheets", "google_sheets_trigger_new_row", true),
    trigger("airtable", "airtable_trigger_new_record", true),
    trigger("discord", "discord_trigger_new_message", true),
    trigger("slack", "slack_trigger_new_message", false),
    trigger("github", "github_trigger_new_issue", false),
    trigger("stripe", "stripe_trigger_new_payment", false),
    trigger("notion", "notion_trigger_new_page", false),
    trigger("webhook", "webhook", false),
];

pub fn find_trigger(provider_id: &str, trigger_type: &str) -> Option<&'static SupportedTrigger> {
    SUPPORTED_TRIGGERS
        .iter()
        .find(|t| t.provider_id == provider_id && t.trigger_type == trigger_type)
}

pub fn is_webhook_supported(provider_id: &str, trigger_type: &str) -> bool {
    find_trigger(provider_id, trigger_type).is_some()
}

pub fn supported_triggers() -> &'static [SupportedTrigger] {
    SUPPORTED_TRIGGERS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list_lookups() {
        assert!(is_webhook_supported("gmail", "gmail_trigger_new_email"));
        assert!(is_webhook_supported("webhook", "webhook"));
        assert!(!is_webhook_supported("gmail", "slack_trigger_new_message"));
        assert!(!is_webhook_supported("twitter", "twitter_trigger_new_tweet"));
    }

    #[test]
    fn test_subscription_flags() {
        assert!(find_trigger("airtable", "airtable_trigger_new_record").unwrap().requires_subscription);
        assert!(!find_trigger("github", "github_trigger_new_issue").unwrap().requires_subscription);
        assert_eq!(supported_triggers().len(), 11);
    }
}
