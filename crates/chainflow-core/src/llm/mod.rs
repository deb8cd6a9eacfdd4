//! Text generation abstractions.
//!
//! - `TextGenerator`: RPITIT trait for concrete provider implementations
//! - `BoxTextGenerator`: object-safe wrapper for runtime provider selection

pub mod box_generator;
pub mod generator;
pub mod response;
