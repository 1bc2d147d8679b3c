//! Single-flight guard — at most one in-flight operation per key.
//!
//! Backups and restores are expensive and idempotent enough that a second
//! caller should get an immediate "already running" answer instead of
//! queuing. The guard is RAII: the key is released when the `FlightGuard`
//! drops, including on error and panic paths.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
pub struct SingleFlight {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`. `None` means an operation for this key is already
    /// running and the caller should report `InProgress`.
    pub fn begin(&self, key: &str) -> Option<FlightGuard> {
        let mut set = self.in_flight.lock();
        if !set.insert(key.to_string()) {
            debug!(key = %key, "Operation already in flight");
            return None;
        }
        Some(FlightGuard {
            key: key.to_string(),
            registry: Arc::clone(&self.in_flight),
        })
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.lock().contains(key)
    }

    pub fn active(&self) -> usize {
        self.in_flight.lock().len()
    }
}

pub struct FlightGuard {
    key: String,
    registry: Arc<Mutex<HashSet<String>>>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_caller_rejected() {
        let sf = SingleFlight::new();
        let guard = sf.begin("ws1");
        assert!(guard.is_some());
        assert!(sf.begin("ws1").is_none());
        drop(guard);
        assert!(sf.begin("ws1").is_some());
    }

    #[test]
    fn test_distinct_keys_independent() {
        let sf = SingleFlight::new();
        let _a = sf.begin("ws1").unwrap();
        let _b = sf.begin("ws2").unwrap();
        assert_eq!(sf.active(), 2);
    }

    #[test]
    fn test_guard_released_on_panic() {
        let sf = Arc::new(SingleFlight::new());
        let sf2 = Arc::clone(&sf);
        let result = std::thread::spawn(move || {
            let _guard = sf2.begin("ws1").unwrap();
            panic!("apply failed");
        })
        .join();
        assert!(result.is_err());
        assert!(!sf.is_in_flight("ws1"));
    }
}
