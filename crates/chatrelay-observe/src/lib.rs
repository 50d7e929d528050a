//! Observability setup for ChatRelay.
//!
//! Installs the tracing subscriber used by the `relay` binary, with an
//! optional OpenTelemetry bridge for span export.

pub mod tracing_setup;
