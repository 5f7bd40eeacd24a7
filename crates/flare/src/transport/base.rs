// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! State and single-attempt delivery shared by both transports.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use flare_core::Payload;
use parking_lot::{Mutex, RwLock};
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::StatusCode;
use tracing::{debug, instrument};

use super::TransportConfig;
use crate::error::{ClientError, Result, TransportError};
use crate::logger::{self, SharedLogger};
use crate::rate_limit::{RateLimiter, Reservation};

pub(super) struct BaseTransport {
	config: RwLock<Arc<TransportConfig>>,
	logger: RwLock<SharedLogger>,
	http_client: reqwest::Client,
	limiter: Mutex<RateLimiter>,
}

impl BaseTransport {
	pub(super) fn new(
		config: TransportConfig,
		logger: SharedLogger,
		http_client: Option<reqwest::Client>,
	) -> std::result::Result<Self, ClientError> {
		let http_client = match http_client {
			Some(client) => client,
			None => flare_common_http::new_client_with_timeout(config.request_timeout)?,
		};

		Ok(Self {
			config: RwLock::new(Arc::new(config)),
			logger: RwLock::new(logger),
			http_client,
			limiter: Mutex::new(RateLimiter::default()),
		})
	}

	pub(super) fn snapshot(&self) -> Arc<TransportConfig> {
		Arc::clone(&self.config.read())
	}

	/// Replace the snapshot with a modified copy.
	pub(super) fn update(&self, apply: impl FnOnce(&mut TransportConfig)) {
		let mut guard = self.config.write();
		let mut next = TransportConfig::clone(&guard);
		apply(&mut next);
		*guard = Arc::new(next);
	}

	pub(super) fn set_logger(&self, logger: SharedLogger) {
		*self.logger.write() = logger;
	}

	pub(super) fn report(&self, args: fmt::Arguments<'_>) {
		let logger = Arc::clone(&self.logger.read());
		logger::report(logger.as_ref(), args);
	}

	/// Write an undeliverable payload to the sink when the config asks for it.
	pub(super) fn dump_payload(&self, config: &TransportConfig, payload: &Payload) {
		if config.print_payload_on_error {
			self.dump_payload_always(payload);
		}
	}

	pub(super) fn dump_payload_always(&self, payload: &Payload) {
		let logger = Arc::clone(&self.logger.read());
		logger::write_payload(logger.as_ref(), payload);
	}

	/// Reserve a slot under the client-side rate limit, or `None` when the
	/// current window is full.
	pub(super) fn acquire(&self, config: &TransportConfig) -> Option<Reservation> {
		self.limiter.lock().try_acquire(config.items_per_minute, Instant::now())
	}

	/// Return the slot of an item that was not delivered.
	pub(super) fn release(&self, reservation: Reservation) {
		self.limiter.lock().release(reservation);
	}

	/// One delivery attempt.
	///
	/// An empty token skips the request and counts as delivered. Only a 200
	/// response is success.
	#[instrument(skip_all, fields(endpoint = %config.endpoint))]
	pub(super) async fn post(&self, config: &TransportConfig, payload: &Payload) -> Result<()> {
		if config.token.is_empty() {
			debug!("empty access token, skipping delivery");
			return Ok(());
		}

		let body = match serde_json::to_vec(payload) {
			Ok(body) => body,
			Err(e) => {
				self.report(format_args!("failed to encode payload: {e}"));
				return Err(TransportError::Encoding(e));
			}
		};

		let response = match self
			.http_client
			.post(&config.endpoint)
			.header(CONTENT_TYPE, "application/json")
			.body(body)
			.send()
			.await
		{
			Ok(response) => response,
			Err(e) => {
				self.report(format_args!("POST failed: {e}"));
				return Err(TransportError::Network(e));
			}
		};

		let status = response.status();
		let retry_after_secs = response
			.headers()
			.get(RETRY_AFTER)
			.and_then(|value| value.to_str().ok())
			.and_then(|value| value.trim().parse::<u64>().ok());

		// Drain the body so the connection can be reused.
		let _ = response.bytes().await;

		if status == StatusCode::OK {
			debug!("payload delivered");
			return Ok(());
		}

		self.report(format_args!("received response: {status}"));
		if status == StatusCode::TOO_MANY_REQUESTS {
			Err(TransportError::RateLimited { retry_after_secs })
		} else {
			Err(TransportError::UnexpectedStatus {
				status: status.as_u16(),
			})
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::logger::testing::RecordingLogger;
	use crate::transport::testing::{endpoint, payload, ITEM_PATH};
	use wiremock::matchers::{header, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn base(config: TransportConfig) -> (BaseTransport, Arc<RecordingLogger>) {
		let logger = Arc::new(RecordingLogger::default());
		let base = BaseTransport::new(config, logger.clone(), None).unwrap();
		(base, logger)
	}

	#[tokio::test]
	async fn post_succeeds_on_200() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path(ITEM_PATH))
			.and(header("content-type", "application/json"))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;

		let (base, logger) = base(TransportConfig::new("token", endpoint(&server)));
		let config = base.snapshot();

		base.post(&config, &payload(1)).await.unwrap();
		assert!(logger.lines().is_empty());

		let requests = server.received_requests().await.unwrap();
		let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
		assert_eq!(body["data"]["n"], 1);
	}

	#[tokio::test]
	async fn post_maps_429_to_rate_limited() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(429).insert_header("retry-after", "12"))
			.mount(&server)
			.await;

		let (base, logger) = base(TransportConfig::new("token", endpoint(&server)));
		let config = base.snapshot();

		let err = base.post(&config, &payload(1)).await.unwrap_err();
		assert!(matches!(
			err,
			TransportError::RateLimited {
				retry_after_secs: Some(12)
			}
		));
		assert!(logger.contains("flare error: received response: 429"));
	}

	#[tokio::test]
	async fn post_maps_other_status_to_unexpected() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(500))
			.mount(&server)
			.await;

		let (base, _logger) = base(TransportConfig::new("token", endpoint(&server)));
		let config = base.snapshot();

		let err = base.post(&config, &payload(1)).await.unwrap_err();
		assert!(matches!(err, TransportError::UnexpectedStatus { status: 500 }));
	}

	#[tokio::test]
	async fn post_with_empty_token_skips_request() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200))
			.expect(0)
			.mount(&server)
			.await;

		let (base, _logger) = base(TransportConfig::new("", endpoint(&server)));
		let config = base.snapshot();

		base.post(&config, &payload(1)).await.unwrap();
	}

	#[test]
	fn update_swaps_snapshot() {
		let (base, _logger) = base(TransportConfig::default());
		let before = base.snapshot();

		base.update(|config| config.retry_attempts = 9);

		assert_eq!(before.retry_attempts, crate::transport::DEFAULT_RETRY_ATTEMPTS);
		assert_eq!(base.snapshot().retry_attempts, 9);
	}
}
