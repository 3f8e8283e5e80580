use trantor_core::{Config, StackName, StackOutputRef};

use crate::WorkloadResult;

/// Stack read for the kubeconfig when linking is enabled and no
/// `infra_stack_name` is configured.
pub const DEFAULT_INFRA_STACK: &str = "ry111/foundation/day";

/// Where the workload stack gets its cluster connection from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KubeconfigSource {
    /// The `kubeconfig` output of another stack, read before apply.
    Linked { stack: StackName },
    /// Whatever kubeconfig the provider finds on this machine.
    Ambient,
}

impl KubeconfigSource {
    /// `use_stack_reference` (default true) and `infra_stack_name`.
    pub fn from_config(cfg: &Config) -> WorkloadResult<Self> {
        if !cfg.bool_or("use_stack_reference", true)? {
            return Ok(Self::Ambient);
        }
        let stack = cfg.str_or("infra_stack_name", DEFAULT_INFRA_STACK).parse()?;
        Ok(Self::Linked { stack })
    }

    pub fn kubeconfig_ref(&self) -> Option<StackOutputRef> {
        match self {
            Self::Linked { stack } => Some(StackOutputRef {
                stack: stack.clone(),
                output: "kubeconfig".to_string(),
            }),
            Self::Ambient => None,
        }
    }

    pub fn is_linked(&self) -> bool {
        matches!(self, Self::Linked { .. })
    }
}
