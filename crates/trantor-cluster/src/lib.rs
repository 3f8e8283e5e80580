//! trantor-cluster: the infrastructure stack.
//!
//! Declares the network, a managed Kubernetes cluster with an OIDC provider,
//! and the AWS load-balancer controller (IAM policy, federated role, service
//! account and Helm release). The kubeconfig is exported for workload stacks
//! to link against.

pub mod iam;
pub mod spec;
pub mod stack;

pub use spec::{Capacity, ClusterSpec, ClusterStackSpec};
pub use stack::{EXPORTS, build_cluster_stack, declare_cluster_stack};

use thiserror::Error;
use trantor_core::ConfigError;
use trantor_core::graph::GraphError;
use trantor_network::NetworkError;

pub type ClusterResult<T> = Result<T, ClusterError>;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("node counts must satisfy 1 <= min <= desired <= max, got min={min} desired={desired} max={max}")]
    InvalidNodeCounts { min: u32, desired: u32, max: u32 },

    #[error("invalid spot price '{0}'")]
    InvalidSpotPrice(String),

    #[error("the load-balancer controller requires an OIDC provider")]
    OidcRequired,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("failed to encode policy document: {0}")]
    Encode(#[from] serde_json::Error),
}
