//! trantor-engine: turns a declared [`StackGraph`](trantor_core::StackGraph)
//! into realized resources.
//!
//! A run reads the stack's recorded state, plans each resource as create,
//! update, same or delete by comparing spec hashes, then walks the graph in
//! dependency order through a [`Provider`]. Every realized resource is
//! persisted before the next one is submitted.

pub mod engine;
pub mod error;
pub mod hash;
pub mod linker;
pub mod local;
pub mod plan;
pub mod provider;

pub use engine::{DestroyResult, Engine, UpResult};
pub use error::{EngineError, EngineResult};
pub use linker::{LinkError, StackLinker};
pub use local::LocalProvider;
pub use plan::{Plan, PlanAction, PlanStep};
pub use provider::{Provider, ProviderError, ProviderResult, ResourceRequest};
