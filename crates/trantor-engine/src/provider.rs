//! The seam between the engine and whatever realizes resources.

use serde_json::Value;
use thiserror::Error;
use trantor_core::{Attributes, ResourceKind};
use trantor_state::ResourceRecord;

pub type ProviderResult<T> = Result<T, ProviderError>;

/// A failure reported by the provider, message kept verbatim.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One resource to create or update, with fully resolved inputs.
#[derive(Debug, Clone, Copy)]
pub struct ResourceRequest<'a> {
    pub stack: &'a str,
    pub name: &'a str,
    pub kind: ResourceKind,
    pub inputs: &'a Value,
    /// Attributes of the provider resource this one is bound to, if any.
    pub connection: Option<&'a Attributes>,
}

pub trait Provider {
    /// Realize a new resource and report its attributes.
    fn create(&self, request: &ResourceRequest<'_>) -> ProviderResult<Attributes>;

    /// Bring an existing resource in line with new inputs.
    fn update(&self, request: &ResourceRequest<'_>, prior: &Attributes) -> ProviderResult<Attributes>;

    fn delete(&self, record: &ResourceRecord) -> ProviderResult<()>;
}
