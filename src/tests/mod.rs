//! End-to-end tests that drive the full router against a mock identity
//! provider and an in-memory database.
