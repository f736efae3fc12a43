//! Test support: a scriptable in-memory driver.
//!
//! [`MockDriver`] counts opens, issued statements and handle frees so tests can assert that
//! slots and handles are reclaimed on every path.

mod mock;

pub use mock::{MockConnection, MockDriver, MockHandle, MockOutcome, mysql_escape};
