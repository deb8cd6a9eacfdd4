//! Anthropic Messages API text generator.

pub mod client;
pub mod types;

pub use client::AnthropicGenerator;
