//! Wire types shared across HTTP handlers.

mod error;

pub use error::*;
