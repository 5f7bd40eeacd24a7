// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Trace chain types: an error and its causes, each paired with a stack.

use serde::{Deserialize, Serialize};

use crate::fingerprint::message_checksum;
use crate::frame::Stack;

/// Title used for an entry whose error has no displayable message.
pub const PLACEHOLDER_TITLE: &str = "<nil>";

/// Class and message of one error in a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
	pub class: String,
	pub message: String,
}

/// One `(error, stack)` pair of a [`TraceChain`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEntry {
	pub frames: Stack,
	pub exception: ExceptionInfo,
}

impl ChainEntry {
	/// Build an entry, substituting [`PLACEHOLDER_TITLE`] for an empty message.
	pub fn new(class: impl Into<String>, message: impl Into<String>, frames: Stack) -> Self {
		let message = message.into();
		let message = if message.is_empty() {
			PLACEHOLDER_TITLE.to_string()
		} else {
			message
		};

		Self {
			frames,
			exception: ExceptionInfo {
				class: class.into(),
				message,
			},
		}
	}

	pub fn class(&self) -> &str {
		&self.exception.class
	}

	pub fn message(&self) -> &str {
		&self.exception.message
	}
}

/// Ordered chain of entries: head is the reported error, tail the deepest cause.
///
/// Serialises as `{"trace_chain": [...]}`; the combined fingerprint travels
/// separately in the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceChain {
	#[serde(rename = "trace_chain")]
	entries: Vec<ChainEntry>,
	#[serde(skip)]
	fingerprint: String,
}

impl TraceChain {
	pub fn new() -> Self {
		Self::default()
	}

	/// Append an entry and fold its stack fingerprint into the running one.
	pub fn push(&mut self, entry: ChainEntry) {
		if !entry.frames.is_empty() {
			self.fingerprint.push_str(&entry.frames.fingerprint());
		}
		self.entries.push(entry);
	}

	pub fn entries(&self) -> &[ChainEntry] {
		&self.entries
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Concatenation of the fingerprints of every non-empty stack, head first.
	pub fn fingerprint(&self) -> &str {
		&self.fingerprint
	}
}

/// Derive a low-cardinality class label for an error.
///
/// A known type name is used with any reference or pointer prefix stripped.
/// Without one the class is a checksum of the message, so anonymous errors
/// with the same text still group together.
pub fn error_class(type_name: Option<&str>, message: &str) -> String {
	let Some(name) = type_name else {
		return message_checksum(message);
	};

	let mut name = name.trim();
	loop {
		let stripped = name
			.strip_prefix('&')
			.or_else(|| name.strip_prefix("mut "))
			.or_else(|| name.strip_prefix("*const "))
			.or_else(|| name.strip_prefix("*mut "));
		match stripped {
			Some(rest) => name = rest.trim_start(),
			None => break,
		}
	}

	if name.is_empty() {
		"panic".to_string()
	} else {
		name.to_string()
	}
}
