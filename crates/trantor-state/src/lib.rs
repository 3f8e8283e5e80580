//! trantor-state: recorded state of applied stacks.
//!
//! Backed by [redb](https://docs.rs/redb). Each stack keeps its exported
//! outputs in the `stacks` table and one record per realized resource in the
//! `resources` table, keyed `{stack}:{resource}` so a stack's resources are
//! found with a prefix scan.
//!
//! The `StateStore` is cheap to clone (backed by `Arc<Database>`), which lets
//! the engine and the stack linker share one handle.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
