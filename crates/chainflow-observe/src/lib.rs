//! Observability setup for chainflow: structured logging with an optional
//! OpenTelemetry bridge.

pub mod tracing_setup;
