// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Queued background delivery.

use std::sync::Arc;

use async_trait::async_trait;
use flare_common_http::RetryableError;
use flare_core::{AccessToken, Payload};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::base::BaseTransport;
use super::{Transport, TransportConfig};
use crate::error::{ClientError, Result, TransportError};
use crate::logger::SharedLogger;
use crate::queue::{BoundedQueue, PushError};

struct QueuedItem {
	payload: Payload,
	retries_left: u32,
}

struct Shared {
	base: BaseTransport,
	queue: BoundedQueue<QueuedItem>,
	cancel: CancellationToken,
}

/// Queues payloads and delivers them from a single background task.
///
/// `send` returns as soon as the payload is queued. Delivery problems go to
/// the diagnostic sink. Temporary failures are retried by putting the item
/// back at the tail of the queue with one less retry.
pub struct AsyncTransport {
	shared: Arc<Shared>,
	worker: Mutex<Option<JoinHandle<()>>>,
}

impl AsyncTransport {
	pub(super) fn spawn(
		config: TransportConfig,
		buffer: usize,
		logger: SharedLogger,
		http_client: Option<reqwest::Client>,
		cancel: CancellationToken,
	) -> std::result::Result<Self, ClientError> {
		if buffer == 0 {
			return Err(ClientError::InvalidBufferSize);
		}
		let runtime = tokio::runtime::Handle::try_current().map_err(|_| ClientError::NoRuntime)?;

		let shared = Arc::new(Shared {
			base: BaseTransport::new(config, logger, http_client)?,
			queue: BoundedQueue::new(buffer),
			cancel,
		});

		let worker = runtime.spawn(run_worker(Arc::clone(&shared)));
		info!(buffer, "async transport started");

		Ok(Self {
			shared,
			worker: Mutex::new(Some(worker)),
		})
	}

	/// Abort delivery. Queued and in-flight payloads are written to the sink.
	pub fn cancel(&self) {
		self.shared.cancel.cancel();
	}

	/// Payloads accepted but not yet finished.
	pub fn pending(&self) -> usize {
		self.shared.queue.pending()
	}
}

impl Drop for AsyncTransport {
	fn drop(&mut self) {
		self.shared.queue.close();
	}
}

#[async_trait]
impl Transport for AsyncTransport {
	async fn send(&self, payload: Payload) -> Result<()> {
		let shared = &self.shared;
		let config = shared.base.snapshot();

		if shared.cancel.is_cancelled() {
			shared.base.dump_payload_always(&payload);
			return Err(TransportError::Cancelled);
		}

		let item = QueuedItem {
			payload,
			retries_left: config.retry_attempts,
		};
		match shared.queue.try_push(item) {
			Ok(()) => Ok(()),
			Err(PushError::Full(item)) => {
				shared.base.report(format_args!("buffer full, dropping item"));
				shared.base.dump_payload(&config, &item.payload);
				Err(TransportError::BufferFull)
			}
			Err(PushError::Closed(item)) => {
				shared.base.report(format_args!("transport is closed, dropping item"));
				shared.base.dump_payload(&config, &item.payload);
				Err(TransportError::ChannelClosed)
			}
		}
	}

	async fn wait(&self) {
		self.shared.queue.wait_idle().await;
	}

	async fn close(&self) -> Result<()> {
		self.shared.queue.close();
		self.shared.queue.wait_idle().await;

		let worker = self.worker.lock().take();
		if let Some(worker) = worker {
			let _ = worker.await;
			info!("async transport closed");
		}
		Ok(())
	}

	fn config(&self) -> TransportConfig {
		TransportConfig::clone(&self.shared.base.snapshot())
	}

	fn set_token(&self, token: AccessToken) {
		self.shared.base.update(|config| config.token = token);
	}

	fn set_endpoint(&self, endpoint: String) {
		self.shared.base.update(|config| config.endpoint = endpoint);
	}

	fn set_logger(&self, logger: SharedLogger) {
		self.shared.base.set_logger(logger);
	}

	fn set_retry_attempts(&self, retry_attempts: u32) {
		self.shared.base.update(|config| config.retry_attempts = retry_attempts);
	}

	fn set_items_per_minute(&self, items_per_minute: u32) {
		self.shared.base.update(|config| config.items_per_minute = items_per_minute);
	}

	fn set_print_payload_on_error(&self, enabled: bool) {
		self.shared.base.update(|config| config.print_payload_on_error = enabled);
	}
}

async fn run_worker(shared: Arc<Shared>) {
	loop {
		let next = tokio::select! {
			biased;
			_ = shared.cancel.cancelled() => break,
			item = shared.queue.pop() => item,
		};
		let Some(item) = next else {
			break;
		};
		process(&shared, item).await;
	}

	if shared.cancel.is_cancelled() {
		drain_cancelled(&shared);
	}
	debug!("async transport worker stopped");
}

async fn process(shared: &Shared, mut item: QueuedItem) {
	let config = shared.base.snapshot();

	let Some(reservation) = shared.base.acquire(&config) else {
		debug!(
			items_per_minute = config.items_per_minute,
			"rate limit reached, skipping item"
		);
		shared.queue.complete();
		return;
	};

	let outcome = tokio::select! {
		biased;
		_ = shared.cancel.cancelled() => None,
		result = shared.base.post(&config, &item.payload) => Some(result),
	};

	if !matches!(outcome, Some(Ok(()))) {
		shared.base.release(reservation);
	}

	match outcome {
		None => {
			shared.base.dump_payload_always(&item.payload);
			shared.queue.complete();
		}
		Some(Ok(())) => {
			shared.queue.complete();
		}
		Some(Err(e)) if e.is_retryable() && item.retries_left > 0 => {
			item.retries_left -= 1;
			debug!(error = %e, retries_left = item.retries_left, "requeueing item");
			if let Err(item) = shared.queue.requeue(item) {
				shared
					.base
					.report(format_args!("buffer full, dropping item after failed retry"));
				shared.base.dump_payload(&config, &item.payload);
				shared.queue.complete();
			}
		}
		Some(Err(_)) => {
			shared.base.dump_payload(&config, &item.payload);
			shared.queue.complete();
		}
	}
}

/// Refuse further items and write everything still queued to the sink.
fn drain_cancelled(shared: &Shared) {
	shared.queue.close();
	while let Some(item) = shared.queue.try_pop() {
		shared.base.dump_payload_always(&item.payload);
		shared.queue.complete();
	}
}
