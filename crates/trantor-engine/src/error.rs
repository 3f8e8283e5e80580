use thiserror::Error;
use trantor_core::GraphError;
use trantor_core::resolve::ResolveError;
use trantor_state::StateError;

use crate::linker::LinkError;
use crate::provider::ProviderError;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid graph: {0}")]
    Graph(#[from] GraphError),

    #[error("failed to resolve '{name}': {source}")]
    Resolve {
        name: String,
        #[source]
        source: ResolveError,
    },

    #[error("'{0}' still depends on unknown values at apply time")]
    Unknown(String),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("provider failed on '{resource}': {source}")]
    Provider {
        resource: String,
        #[source]
        source: ProviderError,
    },

    #[error("state store: {0}")]
    State(#[from] StateError),
}
