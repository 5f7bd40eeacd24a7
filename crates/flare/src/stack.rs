// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Call stack capture.

use backtrace::Symbol;
use flare_core::{Frame, Stack, UNKNOWN_FRAME};
use rustc_demangle::demangle;

/// Frames belonging to the unwinder itself, never useful in a report.
const CAPTURE_PREFIXES: &[&str] = &["backtrace::", "<backtrace::"];

/// Marker for this module's capture entry points.
const CAPTURE_MARKER: &str = "stack::capture_stack";

/// Capture the current call stack, innermost call first.
///
/// `skip` drops that many frames above the caller, so a helper that captures
/// on behalf of its own caller passes `1`.
#[inline(never)]
pub fn capture_stack(skip: usize) -> Stack {
	capture_frames(skip, None)
}

/// Like [`capture_stack`], keeping at most `max_depth` frames.
#[inline(never)]
pub fn capture_stack_limited(skip: usize, max_depth: usize) -> Stack {
	capture_frames(skip, Some(max_depth))
}

#[inline(never)]
fn capture_frames(skip: usize, max_depth: Option<usize>) -> Stack {
	let mut raw = Vec::new();
	backtrace::trace(|frame| {
		raw.push(frame.clone());
		true
	});

	let mut frames = Vec::new();
	for raw_frame in &raw {
		let before = frames.len();
		backtrace::resolve_frame(raw_frame, |symbol| frames.push(to_frame(symbol)));
		if frames.len() == before {
			frames.push(Frame::unresolved());
		}
	}

	let start = first_caller_frame(&frames).saturating_add(skip);
	let limit = max_depth.unwrap_or(usize::MAX);
	frames.into_iter().skip(start).take(limit).collect()
}

/// Index of the first frame above the capture entry points.
///
/// Falls back to skipping unwinder frames when the entry points were inlined
/// away or could not be symbolised.
fn first_caller_frame(frames: &[Frame]) -> usize {
	if let Some(pos) = frames.iter().rposition(|f| f.method.contains(CAPTURE_MARKER)) {
		return pos + 1;
	}

	frames
		.iter()
		.position(|f| !is_capture_frame(&f.method) && !f.method.contains("capture_frames"))
		.unwrap_or(frames.len())
}

fn is_capture_frame(method: &str) -> bool {
	CAPTURE_PREFIXES.iter().any(|prefix| method.starts_with(prefix))
}

fn to_frame(symbol: &Symbol) -> Frame {
	let method = symbol
		.name()
		.map(|name| match name.as_str() {
			Some(raw) => format!("{:#}", demangle(raw)),
			None => format!("{name:#}"),
		})
		.unwrap_or_else(|| UNKNOWN_FRAME.to_string());

	let filename = symbol
		.filename()
		.map(|path| path.display().to_string())
		.unwrap_or_else(|| UNKNOWN_FRAME.to_string());

	Frame::new(filename, symbol.lineno().unwrap_or(0), method)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[inline(never)]
	fn nested_capture() -> Stack {
		capture_stack(0)
	}

	#[test]
	fn capture_excludes_unwinder_frames() {
		let stack = nested_capture();
		assert!(!stack.is_empty());
		assert!(stack.frames().iter().all(|f| !is_capture_frame(&f.method)));
	}

	#[test]
	fn capture_respects_depth_limit() {
		let stack = capture_stack_limited(0, 2);
		assert!(stack.len() <= 2);
	}

	#[test]
	fn skipping_past_the_stack_is_empty() {
		let stack = capture_stack(usize::MAX / 2);
		assert!(stack.is_empty());
	}

	#[test]
	fn first_caller_follows_marker() {
		let frames = vec![
			Frame::new("a.rs", 1, "backtrace::trace"),
			Frame::new("b.rs", 2, "flare::stack::capture_frames"),
			Frame::new("b.rs", 3, "flare::stack::capture_stack"),
			Frame::new("c.rs", 4, "my_app::handler"),
		];
		assert_eq!(first_caller_frame(&frames), 3);
	}

	#[test]
	fn first_caller_without_marker_skips_unwinder() {
		let frames = vec![
			Frame::new("a.rs", 1, "backtrace::backtrace::trace"),
			Frame::new("c.rs", 4, "my_app::handler"),
		];
		assert_eq!(first_caller_frame(&frames), 1);
	}
}
