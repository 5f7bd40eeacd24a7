// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fingerprinting for grouping reported errors on the collector side.

use sha2::{Digest, Sha256};

use crate::frame::Frame;

/// Hex characters kept from the digest of a stack.
pub const FINGERPRINT_LEN: usize = 16;

/// Compute the fingerprint of a frame sequence.
///
/// Every frame contributes `filename:lineno:method|` in order, so the result
/// is order-sensitive and identical sequences always produce identical
/// fingerprints. An empty sequence yields an empty string, which keeps it
/// neutral when fingerprints of a chain are concatenated.
pub fn stack_fingerprint(frames: &[Frame]) -> String {
	if frames.is_empty() {
		return String::new();
	}

	let mut hasher = Sha256::new();
	for frame in frames {
		hasher.update(frame.filename.as_bytes());
		hasher.update(b":");
		hasher.update(frame.lineno.to_string().as_bytes());
		hasher.update(b":");
		hasher.update(frame.method.as_bytes());
		hasher.update(b"|");
	}

	let mut digest = hex::encode(hasher.finalize());
	digest.truncate(FINGERPRINT_LEN);
	digest
}

/// Short checksum of an error message, formatted as a bracketed hex tag.
///
/// Used as the class of errors whose concrete type is unknown, e.g. `{1a2b3c}`.
pub fn message_checksum(message: &str) -> String {
	let digest = Sha256::digest(message.as_bytes());
	let value = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
	format!("{{{value:x}}}")
}
