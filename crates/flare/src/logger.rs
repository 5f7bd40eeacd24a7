// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fallback diagnostic sink for delivery problems.

use std::fmt;
use std::sync::Arc;

use flare_core::Payload;

/// Sink the transports use to report problems they cannot return to a caller.
pub trait ClientLogger: Send + Sync {
	/// Write one formatted diagnostic line.
	fn log(&self, args: fmt::Arguments<'_>);
}

/// Shared handle to a diagnostic sink.
pub type SharedLogger = Arc<dyn ClientLogger>;

/// Default sink: forwards every line to `tracing` at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl ClientLogger for TracingLogger {
	fn log(&self, args: fmt::Arguments<'_>) {
		tracing::error!(target: "flare", "{}", args);
	}
}

pub fn default_logger() -> SharedLogger {
	Arc::new(TracingLogger)
}

/// Report a delivery problem with the standard prefix.
pub(crate) fn report(logger: &dyn ClientLogger, args: fmt::Arguments<'_>) {
	logger.log(format_args!("flare error: {args}"));
}

/// Write an undeliverable payload so the data is not silently lost.
pub(crate) fn write_payload(logger: &dyn ClientLogger, payload: &Payload) {
	match serde_json::to_string(payload) {
		Ok(json) => report(logger, format_args!("undelivered payload: {json}")),
		Err(e) => report(logger, format_args!("failed to encode undelivered payload: {e}")),
	}
}


#[cfg(test)]
mod tests {
	use super::testing::RecordingLogger;
	use super::*;

	#[test]
	fn report_adds_prefix() {
		let logger = RecordingLogger::default();
		report(&logger, format_args!("received response: {}", 500));
		assert_eq!(logger.lines(), vec!["flare error: received response: 500"]);
	}

	#[test]
	fn write_payload_includes_json() {
		let logger = RecordingLogger::default();
		let mut payload = Payload::new();
		payload.insert("title".to_string(), serde_json::json!("boom"));

		write_payload(&logger, &payload);

		assert!(logger.contains(r#"{"title":"boom"}"#));
	}
}
