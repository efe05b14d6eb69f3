//! Shared types

mod error;

pub use error::{ArchiveError, Result};
