//! Body scroll lock, shared by every overlay in a session.
//!
//! Holds stack. The first hold locks the body; each hold remembers the offset it found and
//! the last release restores the offset the page had before the first overlay opened.

use super::document::Document;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

struct Hold {
    token: u64,
    owner: String,
    saved_offset: f64,
}

struct Shared {
    document: Arc<dyn Document>,
    holds: Mutex<Vec<Hold>>,
    next_token: AtomicU64,
}

/// Cloneable handle to the session's scroll lock.
#[derive(Clone)]
pub struct ScrollLock {
    shared: Arc<Shared>,
}

impl ScrollLock {
    pub fn new(document: Arc<dyn Document>) -> Self {
        Self {
            shared: Arc::new(Shared {
                document,
                holds: Mutex::new(Vec::new()),
                next_token: AtomicU64::new(1),
            }),
        }
    }

    /// Lock background scrolling on behalf of `owner`.
    pub fn acquire(&self, owner: &str) -> ScrollGuard {
        let token = self.shared.next_token.fetch_add(1, Ordering::SeqCst);
        let saved_offset = self.shared.document.scroll_offset();
        let mut holds = self.holds();
        if holds.is_empty() {
            self.shared.document.set_scroll_locked(true);
        }
        holds.push(Hold {
            token,
            owner: owner.to_string(),
            saved_offset,
        });
        debug!(owner, depth = holds.len(), saved_offset, "Scroll locked");
        ScrollGuard {
            lock: self.clone(),
            token,
        }
    }

    pub fn is_locked(&self) -> bool {
        !self.holds().is_empty()
    }

    pub fn depth(&self) -> usize {
        self.holds().len()
    }

    pub fn holder(&self) -> Option<String> {
        self.holds().last().map(|h| h.owner.clone())
    }

    fn release(&self, token: u64) {
        let mut holds = self.holds();
        let Some(pos) = holds.iter().position(|h| h.token == token) else {
            return;
        };
        let hold = holds.remove(pos);

        if pos < holds.len() {
            // Released out of order: the hold above inherits the older offset.
            holds[pos].saved_offset = hold.saved_offset;
        } else {
            self.shared.document.scroll_to(hold.saved_offset);
        }
        if holds.is_empty() {
            self.shared.document.set_scroll_locked(false);
        }
        debug!(owner = %hold.owner, depth = holds.len(), "Scroll released");
    }

    fn holds(&self) -> MutexGuard<'_, Vec<Hold>> {
        self.shared
            .holds
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Releases its hold (restoring the saved offset) when dropped.
pub struct ScrollGuard {
    lock: ScrollLock,
    token: u64,
}

impl Drop for ScrollGuard {
    fn drop(&mut self) {
        self.lock.release(self.token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::document::HeadlessDocument;

    #[test]
    fn test_nested_holds_restore_original_offset() {
        let document = HeadlessDocument::new();
        document.scroll_to(120.0);
        let lock = ScrollLock::new(document.clone());

        let outer = lock.acquire("outer");
        document.scroll_to(0.0);
        let inner = lock.acquire("inner");
        assert_eq!(lock.depth(), 2);
        assert_eq!(lock.holder().as_deref(), Some("inner"));

        drop(inner);
        assert!(document.is_scroll_locked());
        assert_eq!(document.scroll_offset(), 0.0);

        drop(outer);
        assert!(!document.is_scroll_locked());
        assert_eq!(document.scroll_offset(), 120.0);
    }

    #[test]
    fn test_out_of_order_release_keeps_oldest_offset() {
        let document = HeadlessDocument::new();
        document.scroll_to(300.0);
        let lock = ScrollLock::new(document.clone());

        let outer = lock.acquire("outer");
        document.scroll_to(10.0);
        let inner = lock.acquire("inner");

        drop(outer);
        assert!(lock.is_locked());
        drop(inner);
        assert!(!lock.is_locked());
        assert_eq!(document.scroll_offset(), 300.0);
    }
}
