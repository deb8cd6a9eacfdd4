//! Webhook subscription adapters.

pub mod subscriber;

pub use subscriber::HttpWebhookSubscriber;
