// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client-side per-minute send limit.

use std::time::{Duration, Instant};

/// Length of one rate-limit window.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Fixed-window counter of deliveries.
///
/// Slots are reserved before a delivery starts and handed back with
/// [`release`](Self::release) when it fails, so concurrent senders cannot all
/// pass the check before any of them is counted.
#[derive(Debug, Clone)]
pub struct RateLimiter {
	window_start: Instant,
	sent_in_window: u32,
}

/// A slot held in one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "an unused reservation keeps its slot; release it if the item is not delivered"]
pub struct Reservation {
	window_start: Instant,
}

impl RateLimiter {
	pub fn new(now: Instant) -> Self {
		Self {
			window_start: now,
			sent_in_window: 0,
		}
	}

	/// Reserve a slot for one item at `now` under a limit of `items_per_minute`.
	///
	/// Starts a new window once a full minute has passed. A limit of zero means
	/// unlimited. Returns `None` when the window is full.
	pub fn try_acquire(&mut self, items_per_minute: u32, now: Instant) -> Option<Reservation> {
		if now.saturating_duration_since(self.window_start) >= RATE_LIMIT_WINDOW {
			self.window_start = now;
			self.sent_in_window = 0;
		}

		if items_per_minute != 0 && self.sent_in_window >= items_per_minute {
			return None;
		}

		self.sent_in_window = self.sent_in_window.saturating_add(1);
		Some(Reservation {
			window_start: self.window_start,
		})
	}

	/// Give back a slot whose item was not delivered.
	///
	/// A reservation from an earlier window is ignored; that window's count is
	/// already gone.
	pub fn release(&mut self, reservation: Reservation) {
		if reservation.window_start == self.window_start {
			self.sent_in_window = self.sent_in_window.saturating_sub(1);
		}
	}

	pub fn sent_in_window(&self) -> u32 {
		self.sent_in_window
	}
}

impl Default for RateLimiter {
	fn default() -> Self {
		Self::new(Instant::now())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn zero_limit_is_unlimited() {
		let now = Instant::now();
		let mut limiter = RateLimiter::new(now);
		for _ in 0..10_000 {
			assert!(limiter.try_acquire(0, now).is_some());
		}
	}

	#[test]
	fn window_resets_after_a_minute() {
		let start = Instant::now();
		let mut limiter = RateLimiter::new(start);
		assert!(limiter.try_acquire(1, start).is_some());
		assert!(limiter.try_acquire(1, start + Duration::from_secs(59)).is_none());

		assert!(limiter.try_acquire(1, start + RATE_LIMIT_WINDOW).is_some());
		assert_eq!(limiter.sent_in_window(), 1);
	}

	#[test]
	fn released_slot_can_be_reused() {
		let now = Instant::now();
		let mut limiter = RateLimiter::new(now);
		let reservation = limiter.try_acquire(1, now).unwrap();
		assert!(limiter.try_acquire(1, now).is_none());

		limiter.release(reservation);

		assert_eq!(limiter.sent_in_window(), 0);
		assert!(limiter.try_acquire(1, now).is_some());
	}

	#[test]
	fn release_from_previous_window_is_ignored() {
		let start = Instant::now();
		let mut limiter = RateLimiter::new(start);
		let stale = limiter.try_acquire(2, start).unwrap();
		let later = start + RATE_LIMIT_WINDOW;
		let _current = limiter.try_acquire(2, later).unwrap();

		limiter.release(stale);

		assert_eq!(limiter.sent_in_window(), 1);
	}

	proptest! {
		#[test]
		fn only_items_past_the_limit_are_skipped(limit in 1u32..200, extra in 1u32..50) {
			let now = Instant::now();
			let mut limiter = RateLimiter::new(now);
			let mut sent = 0;
			let mut skipped = 0;

			for _ in 0..(limit + extra) {
				match limiter.try_acquire(limit, now) {
					Some(_) => sent += 1,
					None => skipped += 1,
				}
			}

			prop_assert_eq!(sent, limit);
			prop_assert_eq!(skipped, extra);
		}
	}
}
