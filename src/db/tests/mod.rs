//! Shared database repository tests.
//!
//! Each repository has a test module containing shared test functions that
//! take `&dyn XxxRepo` (or a context of several repos), plus a `sqlite_tests`
//! module that runs them against an in-memory database with the real
//! migrations applied.

pub mod harness;
