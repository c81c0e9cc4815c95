//! Key Rotator: the process-wide credential pool used by Dialect A.
//!
//! One pre-initialized handle per credential (spec.md §3's KeyPool: "handle
//! `i` uses credential `i`"). `current_index` is shared across all
//! concurrent requests and its mutation is guarded by a mutex, matching
//! spec.md §5's "the key-rotator `current_index` is shared across all
//! concurrent requests; its mutation is guarded."

use std::sync::Mutex;

pub struct KeyRotator<P> {
    handles: Vec<P>,
    current_index: Mutex<usize>,
}

impl<P> KeyRotator<P> {
    pub fn new(handles: Vec<P>) -> Self {
        assert!(!handles.is_empty(), "key rotator requires at least one handle");
        Self {
            handles,
            current_index: Mutex::new(0),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.handles.len()
    }

    /// Index to try first for a new request.
    pub fn current(&self) -> usize {
        *self.current_index.lock().unwrap()
    }

    /// Advance the shared index by one, wrapping modulo pool size. Called by
    /// the driver on request completion, success or non-quota failure — NOT
    /// during the quota-retry walk itself (spec.md §4.4.4).
    pub fn advance(&self) {
        let mut idx = self.current_index.lock().unwrap();
        *idx = (*idx + 1) % self.handles.len();
    }

    pub fn handle_at(&self, index: usize) -> &P {
        &self.handles[index % self.handles.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_wraps_modulo_pool_size() {
        let rotator = KeyRotator::new(vec!["a", "b", "c"]);
        assert_eq!(rotator.current(), 0);
        rotator.advance();
        rotator.advance();
        rotator.advance();
        assert_eq!(rotator.current(), 0);
    }

    #[test]
    fn test_handle_at_returns_correct_credential() {
        let rotator = KeyRotator::new(vec!["a", "b", "c"]);
        assert_eq!(*rotator.handle_at(1), "b");
    }

    #[test]
    #[should_panic]
    fn test_empty_pool_panics() {
        let _: KeyRotator<&str> = KeyRotator::new(vec![]);
    }
}
