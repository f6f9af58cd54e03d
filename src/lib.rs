//! Phase-based system scheduling with pipelines, hooks and plugins.
//!

pub use rubine_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use rubine_internal::prelude::*;
}
