//! Action handlers that ship with chainflow.
//!
//! Third-party integrations plug in through `ActionHandler`; the generic
//! HTTP request node is the only one built in.

pub mod http_request;

use chainflow_core::engine::registry::HandlerRegistry;

pub use http_request::HttpRequestHandler;

/// Registry with every built-in action handler.
pub fn default_registry() -> Result<HandlerRegistry, reqwest::Error> {
    let mut registry = HandlerRegistry::new();
    registry.register(HttpRequestHandler::new()?);
    Ok(registry)
}
