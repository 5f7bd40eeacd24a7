// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bounded FIFO queue with pending-item tracking for the async transport.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Why an item could not be pushed. The item is handed back.
#[derive(Debug)]
pub enum PushError<T> {
	Full(T),
	Closed(T),
}

impl<T> PushError<T> {
	pub fn into_inner(self) -> T {
		match self {
			PushError::Full(item) | PushError::Closed(item) => item,
		}
	}
}

/// A fixed-capacity queue shared between producers and a single consumer.
///
/// `pending` counts items accepted by [`try_push`](Self::try_push) whose
/// processing has not been [`complete`](Self::complete)d. Requeued items keep
/// their original pending slot.
pub struct BoundedQueue<T> {
	items: Mutex<VecDeque<T>>,
	capacity: usize,
	pending: AtomicUsize,
	closed: AtomicBool,
	item_ready: Notify,
	idle: Notify,
}

impl<T> BoundedQueue<T> {
	pub fn new(capacity: usize) -> Self {
		Self {
			items: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
			capacity,
			pending: AtomicUsize::new(0),
			closed: AtomicBool::new(false),
			item_ready: Notify::new(),
			idle: Notify::new(),
		}
	}

	/// Enqueue without waiting. Never blocks on a full queue.
	pub fn try_push(&self, item: T) -> Result<(), PushError<T>> {
		let mut items = self.items.lock();
		if self.closed.load(Ordering::SeqCst) {
			return Err(PushError::Closed(item));
		}
		if items.len() >= self.capacity {
			return Err(PushError::Full(item));
		}
		items.push_back(item);
		self.pending.fetch_add(1, Ordering::SeqCst);
		drop(items);

		self.item_ready.notify_one();
		Ok(())
	}

	/// Put an item that is already pending back at the tail.
	///
	/// Allowed after [`close`](Self::close) so in-flight retries can finish.
	pub fn requeue(&self, item: T) -> Result<(), T> {
		let mut items = self.items.lock();
		if items.len() >= self.capacity {
			return Err(item);
		}
		items.push_back(item);
		drop(items);

		self.item_ready.notify_one();
		Ok(())
	}

	pub fn try_pop(&self) -> Option<T> {
		self.items.lock().pop_front()
	}

	/// Wait for the next item. Returns `None` once closed and empty.
	pub async fn pop(&self) -> Option<T> {
		loop {
			let notified = self.item_ready.notified();
			if let Some(item) = self.try_pop() {
				return Some(item);
			}
			if self.closed.load(Ordering::SeqCst) {
				return None;
			}
			notified.await;
		}
	}

	/// Mark one pending item as finished, whatever its outcome.
	pub fn complete(&self) {
		let previous = self
			.pending
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
		if previous == Ok(1) {
			self.idle.notify_waiters();
		}
	}

	/// Wait until every accepted item has been completed.
	pub async fn wait_idle(&self) {
		loop {
			let notified = self.idle.notified();
			if self.pending.load(Ordering::SeqCst) == 0 {
				return;
			}
			notified.await;
		}
	}

	/// Stop accepting new items. Items already queued are still delivered.
	pub fn close(&self) {
		let _items = self.items.lock();
		self.closed.store(true, Ordering::SeqCst);
		self.item_ready.notify_waiters();
		self.item_ready.notify_one();
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	pub fn len(&self) -> usize {
		self.items.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.lock().is_empty()
	}

	pub fn pending(&self) -> usize {
		self.pending.load(Ordering::SeqCst)
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}
}
