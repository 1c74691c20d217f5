// src/pool/queue.rs

use std::collections::VecDeque;

use tokio::sync::oneshot;
use tracing::debug;

/// Identifies one pending request in a [`WaitQueue`].
pub type Ticket = u64;

#[derive(Debug)]
struct Waiter<T> {
    ticket: Ticket,
    tx: oneshot::Sender<T>,
}

/// FIFO of pending acquisition requests.
///
/// Semantics:
/// - Each entry is a token holding the sending half of a single-resolution
///   channel; the requester awaits the receiving half.
/// - [`WaitQueue::hand_off`] always serves the oldest *live* entry. Entries
///   whose receiver has been dropped are abandoned and skipped.
/// - The queue itself knows nothing about capacity; the pool decides whether
///   another entry may be pushed.
#[derive(Debug)]
pub struct WaitQueue<T> {
    waiters: VecDeque<Waiter<T>>,
    next_ticket: Ticket,
}

impl<T> Default for WaitQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WaitQueue<T> {
    pub fn new() -> Self {
        Self {
            waiters: VecDeque::new(),
            next_ticket: 0,
        }
    }

    /// Number of entries, including abandoned ones not yet pruned.
    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    /// Append a new request and return its ticket plus the channel the
    /// requester should await.
    pub fn push(&mut self) -> (Ticket, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.waiters.push_back(Waiter { ticket, tx });
        (ticket, rx)
    }

    /// Drop every entry whose requester has gone away.
    ///
    /// Returns the number of entries removed.
    pub fn prune_abandoned(&mut self) -> usize {
        let before = self.waiters.len();
        self.waiters.retain(|w| !w.tx.is_closed());
        let removed = before - self.waiters.len();
        if removed > 0 {
            debug!(removed, "pruned abandoned queue entries");
        }
        removed
    }

    /// Give `value` to the oldest live entry.
    ///
    /// Returns the ticket that received it, or hands the value back when no
    /// live entry is left.
    pub fn hand_off(&mut self, mut value: T) -> Result<Ticket, T> {
        while let Some(waiter) = self.waiters.pop_front() {
            match waiter.tx.send(value) {
                Ok(()) => return Ok(waiter.ticket),
                Err(returned) => {
                    debug!(ticket = waiter.ticket, "skipping abandoned queue entry");
                    value = returned;
                }
            }
        }
        Err(value)
    }

    /// Drop all entries; their requesters observe a closed channel.
    pub fn clear(&mut self) {
        self.waiters.clear();
    }
}
