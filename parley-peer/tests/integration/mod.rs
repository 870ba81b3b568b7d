//! Integration tests for parley-peer.
//!
//! Tests are organized by functionality:
//! - `role_tests` - who offers, full negotiations between two participants
//! - `idempotency_tests` - repeated and malformed messages
//! - `buffering_tests` - candidates that arrive before their description
//! - `lifecycle_tests` - leaving, failures and teardown

pub mod buffering_tests;

use tracing::Level;

/// Initialize tracing for tests (call once per test).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Room shared by every test; each test gets its own relay.
pub const ROOM: &str = "abc";
