//! Test support utilities for the storage-engine workspace.
//!
//! Provides command builders (the tests speak `Command` directly, since SQL
//! parsing lives outside this workspace), seeded database fixtures, and
//! assertion helpers.

pub mod assertions;
pub mod commands;
pub mod fixtures;

/// Convenient re-exports for common testing patterns.
pub mod prelude {
    pub use crate::assertions::*;
    pub use crate::commands::*;
    pub use crate::fixtures::*;
}
