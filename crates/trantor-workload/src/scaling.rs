//! Autoscaling policy.
//!
//! A [`ScalingPolicy`] can only be obtained through [`ScalingPolicy::new`],
//! which enforces the replica bounds and utilization targets, so every
//! autoscaler this crate emits is valid.

use serde::Serialize;

use crate::k8s::{HpaBehavior, HpaScalingPolicy, HpaScalingRules};
use crate::WorkloadError;

/// Gradual scale-down: remove at most `percent` of the pods per
/// `period_seconds`, after `stabilization_seconds` of sustained low load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScaleDownBehavior {
    pub stabilization_seconds: u32,
    pub percent: u32,
    pub period_seconds: u32,
}

impl ScaleDownBehavior {
    pub fn to_k8s(&self) -> HpaBehavior {
        HpaBehavior {
            scale_down: HpaScalingRules {
                stabilization_window_seconds: self.stabilization_seconds,
                policies: vec![HpaScalingPolicy {
                    type_: "Percent".to_string(),
                    value: self.percent,
                    period_seconds: self.period_seconds,
                }],
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScalingPolicy {
    min: u32,
    max: u32,
    desired: Option<u32>,
    cpu_target: u32,
    memory_target: u32,
    scale_down: Option<ScaleDownBehavior>,
}

fn check_percent(what: &'static str, value: u32) -> Result<(), WorkloadError> {
    if value == 0 || value > 100 {
        return Err(WorkloadError::TargetOutOfRange { what, value });
    }
    Ok(())
}

impl ScalingPolicy {
    pub fn new(
        min: u32,
        max: u32,
        cpu_target: u32,
        memory_target: u32,
    ) -> Result<Self, WorkloadError> {
        if min < 1 || min > max {
            return Err(WorkloadError::InvalidReplicaBounds { min, max });
        }
        check_percent("cpu target", cpu_target)?;
        check_percent("memory target", memory_target)?;
        Ok(Self {
            min,
            max,
            desired: None,
            cpu_target,
            memory_target,
            scale_down: None,
        })
    }

    pub fn with_desired(mut self, desired: u32) -> Result<Self, WorkloadError> {
        if desired < self.min || desired > self.max {
            return Err(WorkloadError::DesiredOutOfBounds {
                desired,
                min: self.min,
                max: self.max,
            });
        }
        self.desired = Some(desired);
        Ok(self)
    }

    pub fn with_scale_down(mut self, behavior: ScaleDownBehavior) -> Result<Self, WorkloadError> {
        check_percent("scale-down percent", behavior.percent)?;
        if behavior.period_seconds == 0 {
            return Err(WorkloadError::ZeroScaleDownPeriod);
        }
        self.scale_down = Some(behavior);
        Ok(self)
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn desired(&self) -> Option<u32> {
        self.desired
    }

    pub fn cpu_target(&self) -> u32 {
        self.cpu_target
    }

    pub fn memory_target(&self) -> u32 {
        self.memory_target
    }

    pub fn scale_down(&self) -> Option<&ScaleDownBehavior> {
        self.scale_down.as_ref()
    }
}
