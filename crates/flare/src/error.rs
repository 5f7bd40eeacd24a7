// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the Flare SDK.

use std::path::PathBuf;
use std::time::Duration;

use flare_common_http::RetryableError;
use thiserror::Error;

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Failures while handing a payload to a transport or delivering it.
///
/// `BufferFull`, `ChannelClosed` and `Cancelled` are returned synchronously by
/// `send`. Delivery failures of the async transport are only ever reported to
/// the diagnostic sink.
#[derive(Debug, Error)]
pub enum TransportError {
	/// The payload could not be serialised.
	#[error("failed to encode payload: {0}")]
	Encoding(#[from] serde_json::Error),

	/// The HTTP request did not complete.
	#[error("POST failed: {0}")]
	Network(#[from] reqwest::Error),

	/// The collector answered 429.
	#[error("rate limited by server, retry after {retry_after_secs:?} seconds")]
	RateLimited {
		/// Optional retry-after header value.
		retry_after_secs: Option<u64>,
	},

	/// The collector answered anything other than 200 or 429.
	#[error("received response status {status}")]
	UnexpectedStatus { status: u16 },

	/// The async queue is at capacity.
	#[error("buffer full, dropping item")]
	BufferFull,

	/// The async transport no longer accepts items.
	#[error("transport channel is closed")]
	ChannelClosed,

	/// The transport's cancellation token was triggered.
	#[error("delivery cancelled")]
	Cancelled,
}

impl RetryableError for TransportError {
	fn is_retryable(&self) -> bool {
		match self {
			TransportError::Network(e) => e.is_retryable(),
			TransportError::RateLimited { .. } => true,
			_ => false,
		}
	}

	fn retry_after(&self) -> Option<Duration> {
		match self {
			TransportError::RateLimited {
				retry_after_secs: Some(secs),
			} => Some(Duration::from_secs(*secs)),
			_ => None,
		}
	}
}

/// Failures while building a client or transport.
#[derive(Debug, Error)]
pub enum ClientError {
	/// The HTTP client could not be constructed.
	#[error("failed to build HTTP client: {0}")]
	HttpClient(#[from] reqwest::Error),

	/// The async transport needs a Tokio runtime to spawn its worker.
	#[error("async transport requires a running Tokio runtime")]
	NoRuntime,

	/// Queue capacity must be at least one.
	#[error("buffer size must be at least 1")]
	InvalidBufferSize,

	/// A scrub pattern failed to compile.
	#[error("invalid scrub pattern: {0}")]
	InvalidPattern(#[from] regex::Error),

	/// Environment configuration could not be loaded.
	#[error(transparent)]
	Config(#[from] ConfigError),
}

/// Failures while loading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Failed to read the token file.
	#[error("failed to read token file at {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// The token file path was empty.
	#[error("token file path in {var} is empty")]
	EmptyPath { var: String },
}
