// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flare error and message reporting SDK.
//!
//! A [`Client`] turns errors (with their cause chains and stacks) and plain
//! messages into JSON items and hands them to a [`Transport`]:
//!
//! - [`AsyncTransport`] queues items in a bounded buffer and delivers them
//!   from a background task. Sending never waits on the network; a full buffer
//!   drops the item.
//! - [`SyncTransport`] delivers inline and returns the outcome.
//!
//! Both retry temporary failures (network errors, HTTP 429), honour an
//! optional per-minute limit, and write undeliverable items to a
//! [`ClientLogger`].
//!
//! # Example
//!
//! ```ignore
//! use flare::{Client, Level};
//!
//! let client = Client::builder()
//!     .access_token("project-token")
//!     .environment("production")
//!     .code_version(env!("CARGO_PKG_VERSION"))
//!     .build()?;
//!
//! if let Err(e) = do_work() {
//!     client.error(Level::Error, &e).await?;
//! }
//! client.close().await?;
//! ```

mod chain;
mod client;
mod env;
mod error;
mod inspect;
mod logger;
mod payload;
mod queue;
mod rate_limit;
mod request;
mod stack;
mod transport;

use std::sync::OnceLock;

pub use chain::{build_chain, MAX_CHAIN_LENGTH};
pub use client::{Client, ClientBuilder, Delivery, TransportKind, DEFAULT_ENVIRONMENT};
pub use env::{load_token_env, EnvConfig, ENV_PREFIX};
pub use error::{ClientError, ConfigError, Result, TransportError};
pub use inspect::{Classifier, ErrorInspector, StackTracer, TraceExt, TracedError, Unwrapper};
pub use logger::{default_logger, ClientLogger, SharedLogger, TracingLogger};
pub use payload::{CheckIgnore, LANGUAGE, NOTIFIER_NAME, NOTIFIER_VERSION};
pub use queue::{BoundedQueue, PushError};
pub use rate_limit::{RateLimiter, Reservation, RATE_LIMIT_WINDOW};
pub use request::{request_details, DEFAULT_SCRUB_FIELDS, DEFAULT_SCRUB_HEADERS, FILTERED};
pub use stack::{capture_stack, capture_stack_limited};
pub use transport::{
	AsyncTransport, SyncTransport, Transport, TransportBuilder, TransportConfig, DEFAULT_BUFFER,
	DEFAULT_ENDPOINT, DEFAULT_REQUEST_TIMEOUT, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY,
};

pub use flare_core::{
	error_class, message_checksum, stack_fingerprint, AccessToken, ChainEntry, ExceptionInfo, Frame,
	Level, Payload, Stack, TraceChain, PLACEHOLDER_TITLE, UNKNOWN_FRAME,
};

static DEFAULT_CLIENT: OnceLock<Client> = OnceLock::new();

/// Install the process-wide default client.
///
/// Only the first call succeeds; later calls hand their client back.
pub fn init(client: Client) -> std::result::Result<(), Client> {
	DEFAULT_CLIENT.set(client)
}

/// The process-wide default client, if [`init`] has been called.
pub fn client() -> Option<&'static Client> {
	DEFAULT_CLIENT.get()
}
