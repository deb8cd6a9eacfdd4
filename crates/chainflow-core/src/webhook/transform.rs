//! Per-trigger payload normalizers.
//!
//! Provider payloads are reshaped into a small stable document so workflow
//! authors can reference `{{trigger.email.subject}}` regardless of how the
//! provider nests it. Each field is taken from the first path that holds a
//! non-null value.

use serde_json::{Value, json};

use crate::engine::resolver::lookup_path;

/// Normalize `payload` for `trigger_type`. Unknown triggers pass through.
pub fn transform_payload(trigger_type: &str, payload: &Value) -> Value {
    match trigger_type {
        "gmail_trigger_new_email" => {
            let m = scoped(payload, "message");
            json!({ "email": {
                "id": first(m, &["id"]),
                "from": first(m, &["from", "sender"]),
                "subject": first(m, &["subject"]),
                "body": first(m, &["body", "text", "snippet"]),
                "attachments": first(m, &["attachments"]).as_array().cloned().unwrap_or_default(),
                "receivedAt": first(m, &["receivedAt", "received_at", "internalDate", "date"]),
            }})
        }
        "google_calendar_trigger_new_event" => {
            let e = scoped(payload, "event");
            json!({ "event": {
                "id": first(e, &["id"]),
                "summary": first(e, &["summary", "title"]),
                "start": first(e, &["start.dateTime", "start.date", "start"]),
                "end": first(e, &["end.dateTime", "end.date", "end"]),
                "organizer": first(e, &["organizer.email", "organizer"]),
            }})
        }
        "google_drive_trigger_new_file" => {
            let f = scoped(payload, "file");
            json!({ "file": {
                "id": first(f, &["id"]),
                "name": first(f, &["name", "title"]),
                "mimeType": first(f, &["mimeType", "mime_type"]),
                "modifiedTime": first(f, &["modifiedTime", "modified_time"]),
            }})
        }
        "google_sheets_trigger_new_row" => {
            let r = scoped(payload, "row");
            json!({ "row": {
                "spreadsheetId": first(r, &["spreadsheetId", "spreadsheet_id"]),
                "sheetName": first(r, &["sheetName", "sheet_name", "sheet"]),
                "values": first(r, &["values", "row"]),
            }})
        }
        "airtable_trigger_new_record" => {
            let r = scoped(payload, "record");
            json!({ "record": {
                "baseId": first(payload, &["base.id", "baseId", "base_id"]),
                "tableId": first(payload, &["table.id", "tableId", "table_id"]),
                "recordId": first(r, &["id", "recordId", "record_id"]),
                "fields": first(r, &["fields", "cellValuesByFieldId"]),
            }})
        }
        "discord_trigger_new_message" => {
            let m = scoped(payload, "message");
            json!({ "message": {
                "id": first(m, &["id"]),
                "channelId": first(m, &["channelId", "channel_id"]),
                "author": first(m, &["author.username", "author"]),
                "content": first(m, &["content"]),
            }})
        }
        "slack_trigger_new_message" => {
            let e = scoped(payload, "event");
            json!({ "message": {
                "text": first(e, &["text"]),
                "user": first(e, &["user"]),
                "channel": first(e, &["channel"]),
                "ts": first(e, &["ts", "event_ts"]),
            }})
        }
        "github_trigger_new_issue" => {
            let i = scoped(payload, "issue");
            json!({ "issue": {
                "number": first(i, &["number"]),
                "title": first(i, &["title"]),
                "body": first(i, &["body"]),
                "author": first(i, &["user.login", "author"]),
                "url": first(i, &["html_url", "url"]),
            }})
        }
        "stripe_trigger_new_payment" => {
            let p = lookup_path(payload, "data.object").filter(|v| v.is_object()).unwrap_or(payload);
            json!({ "payment": {
                "id": first(p, &["id"]),
                "amount": first(p, &["amount", "amount_received"]),
                "currency": first(p, &["currency"]),
                "status": first(p, &["status"]),
                "customer": first(p, &["customer"]),
            }})
        }
        "notion_trigger_new_page" => {
            let p = scoped(payload, "page");
            json!({ "page": {
                "id": first(p, &["id"]),
                "title": notion_title(p),
                "url": first(p, &["url"]),
            }})
        }
        _ => payload.clone(),
    }
}

/// `payload[key]` when it is an object, else the payload itself.
fn scoped<'v>(payload: &'v Value, key: &str) -> &'v Value {
    payload.get(key).filter(|v| v.is_object()).unwrap_or(payload)
}

fn first(root: &Value, paths: &[&str]) -> Value {
    paths
        .iter()
        .filter_map(|path| lookup_path(root, path))
        .find(|v| !v.is_null())
        .cloned()
        .unwrap_or(Value::Null)
}

/// Notion titles are rich-text arrays under a `title` property.
fn notion_title(page: &Value) -> Value {
    if let Some(Value::String(title)) = page.get("title") {
        return Value::String(title.clone());
    }
    let Some(Value::Object(properties)) = page.get("properties") else {
        return Value::Null;
    };
    properties
        .values()
        .filter_map(|prop| prop.get("title").and_then(Value::as_array))
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("plain_text").and_then(Value::as_str))
                .collect::<String>()
        })
        .find(|s| !s.is_empty())
        .map(Value::String)
        .unwrap_or(Value::Null)
}
