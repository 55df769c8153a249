//! Test helper modules for menuboard-sync integration tests
//!
//! Provides reusable test infrastructure components:
//! - CountingStorage: storage backend that counts writes
//! - ScriptedTransport: remote transport with queued responses
//! - MockBackend: in-process HTTP backend for the real transport

#![allow(dead_code)]

pub mod counting_storage;
pub mod mock_backend;
pub mod scripted_transport;

use std::time::Duration;

pub use counting_storage::{BrokenStorage, CountingStorage};
pub use mock_backend::MockBackend;
pub use scripted_transport::ScriptedTransport;

/// Poll `condition` until it holds, failing the test after two seconds
pub async fn eventually<F>(what: &str, condition: F)
where
    F: Fn() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}
