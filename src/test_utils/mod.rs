//! Support code for integration tests that need a live server.

#[cfg(feature = "test-utils-postgres")]
pub mod postgres;
