//! Thread-safe message-id counter for outgoing commands.
//!
//! Every command a target sends carries an integer `id`.  The remote end
//! echoes that id in its response, which is the only thing that ties a reply
//! back to the call that caused it.  Ids are therefore:
//!
//! - **Unique per target** – two in-flight calls never share an id.
//! - **Strictly increasing** – the n-th call gets a larger id than the
//!   (n-1)-th, regardless of the order in which replies arrive.
//! - **Never reused** – a completed id is gone for good, so a late or
//!   duplicated reply can never be mistaken for a newer call.
//!
//! # Thread safety
//!
//! The counter uses `AtomicU64` internally, so `next()` can be called from
//! several tasks at once without a lock and without two callers observing
//! the same value.

use std::sync::atomic::{AtomicU64, Ordering};

/// The first id handed out by a fresh counter.
///
/// The remote end treats `0` as "no id" in some implementations, so ids start
/// at 1.
pub const FIRST_MESSAGE_ID: u64 = 1;

/// A thread-safe, strictly increasing counter for command message ids.
///
/// # Examples
///
/// ```rust
/// use inspector_core::MessageIdCounter;
///
/// let counter = MessageIdCounter::new();
/// assert_eq!(counter.next(), 1);
/// assert_eq!(counter.next(), 2);
/// ```
#[derive(Debug)]
pub struct MessageIdCounter {
    inner: AtomicU64,
}

impl MessageIdCounter {
    /// Creates a new counter whose first id is [`FIRST_MESSAGE_ID`].
    pub fn new() -> Self {
        Self {
            inner: AtomicU64::new(FIRST_MESSAGE_ID),
        }
    }

    /// Returns the next message id and atomically advances the counter.
    ///
    /// `SeqCst` keeps the allocation order identical to the order in which the
    /// envelopes are handed to the connection by the (serialised) send path.
    pub fn next(&self) -> u64 {
        // `fetch_add` returns the value *before* the addition.
        self.inner.fetch_add(1, Ordering::SeqCst)
    }

    /// Returns the id the next call to [`next`](Self::next) would hand out.
    ///
    /// Every id strictly below this value has already been issued.
    pub fn peek(&self) -> u64 {
        self.inner.load(Ordering::SeqCst)
    }

    /// Returns `true` if `id` was handed out by this counter at some point.
    pub fn was_issued(&self, id: u64) -> bool {
        (FIRST_MESSAGE_ID..self.peek()).contains(&id)
    }
}

impl Default for MessageIdCounter {
    fn default() -> Self {
        Self::new()
    }
}
