// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Stack frame types.

use serde::{Deserialize, Serialize};

use crate::fingerprint::stack_fingerprint;

/// Placeholder used when a frame's symbol or location cannot be resolved.
pub const UNKNOWN_FRAME: &str = "???";

/// A single call-stack location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frame {
	pub filename: String,
	pub lineno: u32,
	/// Demangled function path without the trailing hash.
	pub method: String,
}

impl Frame {
	pub fn new(filename: impl Into<String>, lineno: u32, method: impl Into<String>) -> Self {
		Self {
			filename: filename.into(),
			lineno,
			method: method.into(),
		}
	}

	/// Frame emitted when symbol resolution fails for an address.
	pub fn unresolved() -> Self {
		Self::new(UNKNOWN_FRAME, 0, UNKNOWN_FRAME)
	}

	pub fn is_unresolved(&self) -> bool {
		self.method == UNKNOWN_FRAME && self.filename == UNKNOWN_FRAME
	}
}

/// An ordered call stack, innermost call first.
///
/// Serialises as a bare array of frames.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stack {
	frames: Vec<Frame>,
}

impl Stack {
	pub fn new(frames: Vec<Frame>) -> Self {
		Self { frames }
	}

	pub fn empty() -> Self {
		Self::default()
	}

	pub fn frames(&self) -> &[Frame] {
		&self.frames
	}

	pub fn len(&self) -> usize {
		self.frames.len()
	}

	pub fn is_empty(&self) -> bool {
		self.frames.is_empty()
	}

	/// Deterministic digest of the frame sequence. Empty for an empty stack.
	pub fn fingerprint(&self) -> String {
		stack_fingerprint(&self.frames)
	}
}

impl From<Vec<Frame>> for Stack {
	fn from(frames: Vec<Frame>) -> Self {
		Self::new(frames)
	}
}

impl FromIterator<Frame> for Stack {
	fn from_iter<I: IntoIterator<Item = Frame>>(iter: I) -> Self {
		Self::new(iter.into_iter().collect())
	}
}
