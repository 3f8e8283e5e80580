//! trantor-workload: the application stack for one service.
//!
//! From the stack configuration this crate derives a [`WorkloadSpec`] (names
//! by tier, image, resources, scaling policy, routing) and declares the
//! namespace, config map, deployment, service, autoscaler and ingress. The
//! same objects can be rendered as a plain Kubernetes `List`.
//!
//! The cluster connection comes from a [`KubeconfigSource`]: either linked to
//! the cluster stack's `kubeconfig` output, or the ambient kubeconfig of the
//! machine running the tool.

pub mod k8s;
pub mod manifests;
pub mod scaling;
pub mod source;
pub mod spec;
pub mod stack;

pub use manifests::render_manifests;
pub use scaling::{ScaleDownBehavior, ScalingPolicy};
pub use source::KubeconfigSource;
pub use spec::{AppSettings, WorkloadSpec};
pub use stack::{build_workload_stack, declare_workload};

use thiserror::Error;
use trantor_core::ConfigError;
use trantor_core::graph::GraphError;
use trantor_core::naming::NamingError;
use trantor_core::stack::StackNameError;

pub type WorkloadResult<T> = Result<T, WorkloadError>;

#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("replica bounds must satisfy 1 <= min <= max, got min={min} max={max}")]
    InvalidReplicaBounds { min: u32, max: u32 },

    #[error("desired replicas {desired} outside [{min}, {max}]")]
    DesiredOutOfBounds { desired: u32, min: u32, max: u32 },

    #[error("{what} must be in (0, 100], got {value}")]
    TargetOutOfRange { what: &'static str, value: u32 },

    #[error("scale-down period must be positive")]
    ZeroScaleDownPeriod,

    #[error("{0} must be a non-zero port")]
    ZeroPort(&'static str),

    #[error("health path '{0}' must start with '/'")]
    InvalidHealthPath(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error(transparent)]
    StackName(#[from] StackNameError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("failed to encode manifest: {0}")]
    Encode(#[from] serde_json::Error),
}
