// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Delivery transports.
//!
//! Two implementations share one contract:
//!
//! - [`AsyncTransport`] queues payloads and delivers them from a background
//!   task; `send` never waits on the network.
//! - [`SyncTransport`] delivers inline and returns the delivery result.

mod async_transport;
mod base;
mod sync_transport;

use std::time::Duration;

use async_trait::async_trait;
use flare_core::{AccessToken, Payload};

use crate::error::{ClientError, Result};
use crate::logger::{default_logger, SharedLogger};

pub use async_transport::AsyncTransport;
pub use sync_transport::SyncTransport;

/// Default collector endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.rollbar.com/api/1/item/";

/// Default async queue capacity.
pub const DEFAULT_BUFFER: usize = 1000;

/// Default retry budget for temporary failures.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default base delay between inline retries.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// Delivery settings shared by both transports.
///
/// Transports hold an immutable snapshot and swap it on every setter, so a
/// delivery in progress always sees one consistent configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
	pub token: AccessToken,
	pub endpoint: String,
	/// Extra attempts after the first for temporary failures.
	pub retry_attempts: u32,
	/// Successful deliveries allowed per minute; zero means unlimited.
	pub items_per_minute: u32,
	/// Write undeliverable payloads to the diagnostic sink.
	pub print_payload_on_error: bool,
	pub request_timeout: Duration,
	/// Base backoff between inline retries of the sync transport.
	pub retry_base_delay: Duration,
}

impl Default for TransportConfig {
	fn default() -> Self {
		Self {
			token: AccessToken::default(),
			endpoint: DEFAULT_ENDPOINT.to_string(),
			retry_attempts: DEFAULT_RETRY_ATTEMPTS,
			items_per_minute: 0,
			print_payload_on_error: true,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
		}
	}
}

impl TransportConfig {
	pub fn new(token: impl Into<AccessToken>, endpoint: impl Into<String>) -> Self {
		Self {
			token: token.into(),
			endpoint: endpoint.into(),
			..Self::default()
		}
	}
}

/// Contract shared by the async and sync transports.
#[async_trait]
pub trait Transport: Send + Sync {
	/// Hand a payload over for delivery.
	async fn send(&self, payload: Payload) -> Result<()>;

	/// Block until every accepted payload has reached a terminal outcome.
	async fn wait(&self);

	/// Stop accepting payloads, then drain and release resources.
	async fn close(&self) -> Result<()>;

	/// Current configuration snapshot.
	fn config(&self) -> TransportConfig;

	fn set_token(&self, token: AccessToken);
	fn set_endpoint(&self, endpoint: String);
	fn set_logger(&self, logger: SharedLogger);
	fn set_retry_attempts(&self, retry_attempts: u32);
	fn set_items_per_minute(&self, items_per_minute: u32);
	fn set_print_payload_on_error(&self, enabled: bool);
}

/// Builder shared by both transports.
pub struct TransportBuilder {
	config: TransportConfig,
	buffer: usize,
	logger: SharedLogger,
	http_client: Option<reqwest::Client>,
	cancellation: Option<tokio_util::sync::CancellationToken>,
}

impl TransportBuilder {
	pub fn new(token: impl Into<AccessToken>, endpoint: impl Into<String>) -> Self {
		Self::from_config(TransportConfig::new(token, endpoint))
	}

	pub fn from_config(config: TransportConfig) -> Self {
		Self {
			config,
			buffer: DEFAULT_BUFFER,
			logger: default_logger(),
			http_client: None,
			cancellation: None,
		}
	}

	/// Async queue capacity. Ignored by the sync transport.
	pub fn buffer(mut self, buffer: usize) -> Self {
		self.buffer = buffer;
		self
	}

	pub fn retry_attempts(mut self, retry_attempts: u32) -> Self {
		self.config.retry_attempts = retry_attempts;
		self
	}

	pub fn items_per_minute(mut self, items_per_minute: u32) -> Self {
		self.config.items_per_minute = items_per_minute;
		self
	}

	pub fn print_payload_on_error(mut self, enabled: bool) -> Self {
		self.config.print_payload_on_error = enabled;
		self
	}

	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.config.request_timeout = timeout;
		self
	}

	pub fn retry_base_delay(mut self, delay: Duration) -> Self {
		self.config.retry_base_delay = delay;
		self
	}

	pub fn logger(mut self, logger: SharedLogger) -> Self {
		self.logger = logger;
		self
	}

	/// Use a preconfigured HTTP client instead of building one.
	pub fn http_client(mut self, client: reqwest::Client) -> Self {
		self.http_client = Some(client);
		self
	}

	/// Token whose cancellation aborts async delivery.
	pub fn cancellation_token(mut self, token: tokio_util::sync::CancellationToken) -> Self {
		self.cancellation = Some(token);
		self
	}

	/// Build an [`AsyncTransport`] and spawn its worker on the current runtime.
	pub fn build_async(self) -> std::result::Result<AsyncTransport, ClientError> {
		AsyncTransport::spawn(
			self.config,
			self.buffer,
			self.logger,
			self.http_client,
			self.cancellation.unwrap_or_default(),
		)
	}

	pub fn build_sync(self) -> std::result::Result<SyncTransport, ClientError> {
		SyncTransport::new(self.config, self.logger, self.http_client)
	}
}
