// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Flare error reporting client.
//!
//! This crate holds the pure, I/O-free pieces shared by the SDK:
//!
//! - [`Frame`] and [`Stack`]: a captured call stack, innermost call first
//! - [`fingerprint`]: deterministic digests of stacks used for server-side grouping
//! - [`ChainEntry`] and [`TraceChain`]: an error and its causes, each paired with a stack
//! - [`Level`]: the severity attached to every reported item
//! - [`AccessToken`]: the project token, redacted in logs

pub mod chain;
pub mod error;
pub mod fingerprint;
pub mod frame;
pub mod level;
pub mod token;

pub use chain::{error_class, ChainEntry, ExceptionInfo, TraceChain, PLACEHOLDER_TITLE};
pub use error::{CoreError, Result};
pub use fingerprint::{message_checksum, stack_fingerprint};
pub use frame::{Frame, Stack, UNKNOWN_FRAME};
pub use level::Level;
pub use token::AccessToken;

/// Opaque payload handed to a transport.
///
/// The layout is agreed with the remote collector; transports only serialise it.
pub type Payload = serde_json::Map<String, serde_json::Value>;
