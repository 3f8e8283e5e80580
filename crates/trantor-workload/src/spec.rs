use serde::Serialize;
use tracing::debug;
use trantor_core::naming::{self, NameSet, NamingPolicy, Tier};
use trantor_core::Config;

use crate::k8s::{ResourceQuantities, ResourceRequirements};
use crate::scaling::{ScaleDownBehavior, ScalingPolicy};
use crate::{WorkloadError, WorkloadResult};

/// Values injected into the container through the config map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppSettings {
    pub log_level: String,
    pub database_host: String,
    pub cache_ttl: u32,
    pub feature_new_ui: bool,
}

/// Resolved description of one service deployment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkloadSpec {
    pub namespace: String,
    pub names: NameSet,
    pub image: String,
    /// Replica count at rollout. Within the scaling bounds when autoscaling.
    pub replicas: u32,
    pub scaling: Option<ScalingPolicy>,
    pub resources: ResourceRequirements,
    pub settings: AppSettings,
    pub container_port: u16,
    pub service_port: u16,
    pub health_path: String,
    pub alb_group_name: String,
}

impl WorkloadSpec {
    pub fn from_config(cfg: &Config) -> WorkloadResult<Self> {
        let namespace = cfg.str_or("namespace", "production");
        naming::validate_name(&namespace)?;
        let service = cfg.str_or("service_name", "day");
        let tier = Tier::from_namespace(&namespace);

        let image_registry = cfg.str_or("image_registry", "your-registry");
        let image_name = cfg.str_or("image_name", &service);
        let image_tag = cfg.str_or("image_tag", "latest");

        let policy = NamingPolicy {
            domain: cfg.str_or("domain", trantor_core::naming::DEFAULT_DOMAIN),
            ..NamingPolicy::default()
        };
        let names = policy.derive(&service, tier, Some(&image_tag))?;

        let replicas = cfg.get_or("replicas", 3)?;
        let scaling = if cfg.bool_or("autoscaling", true)? {
            let policy = ScalingPolicy::new(
                cfg.get_or("min_replicas", 2)?,
                cfg.get_or("max_replicas", 10)?,
                cfg.get_or("cpu_target", 70)?,
                cfg.get_or("memory_target", 80)?,
            )?
            .with_scale_down(ScaleDownBehavior {
                stabilization_seconds: cfg.get_or("scale_down_stabilization_seconds", 300)?,
                percent: cfg.get_or("scale_down_percent", 50)?,
                period_seconds: cfg.get_or("scale_down_period_seconds", 60)?,
            })?
            .with_desired(replicas)?;
            Some(policy)
        } else {
            None
        };

        let health_path = cfg.str_or("health_path", "/health");
        if !health_path.starts_with('/') {
            return Err(WorkloadError::InvalidHealthPath(health_path));
        }

        let container_port = port(cfg, "container_port", 8001)?;
        let service_port = port(cfg, "service_port", 80)?;

        let spec = Self {
            image: format!("{image_registry}/{image_name}:{image_tag}"),
            replicas,
            scaling,
            resources: ResourceRequirements {
                requests: ResourceQuantities {
                    cpu: cfg.str_or("cpu_request", "100m"),
                    memory: cfg.str_or("memory_request", "128Mi"),
                },
                limits: ResourceQuantities {
                    cpu: cfg.str_or("cpu_limit", "500m"),
                    memory: cfg.str_or("memory_limit", "512Mi"),
                },
            },
            settings: AppSettings {
                log_level: cfg.str_or("log_level", "INFO"),
                database_host: cfg.str_or("database_host", "postgres.production.svc.cluster.local"),
                cache_ttl: cfg.get_or("cache_ttl", 300)?,
                feature_new_ui: cfg.bool_or("feature_new_ui", true)?,
            },
            container_port,
            service_port,
            health_path,
            alb_group_name: cfg.str_or("alb_group_name", "trantor-cluster"),
            namespace,
            names,
        };
        debug!(
            service = %spec.names.service,
            tier = %spec.names.tier,
            namespace = %spec.namespace,
            autoscaling = spec.scaling.is_some(),
            "resolved workload spec"
        );
        Ok(spec)
    }

    pub fn tier(&self) -> Tier {
        self.names.tier
    }
}

fn port(cfg: &Config, key: &'static str, default: u16) -> WorkloadResult<u16> {
    match cfg.get_or(key, default)? {
        0 => Err(WorkloadError::ZeroPort(key)),
        port => Ok(port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trantor_core::{ConfigError, ConfigValue};

    fn cfg(values: &[(&str, ConfigValue)]) -> Config {
        Config::new("foundation").with_stored(values.iter().cloned())
    }

    #[test]
    fn defaults() {
        let spec = WorkloadSpec::from_config(&cfg(&[])).unwrap();
        assert_eq!(spec.namespace, "production");
        assert_eq!(spec.tier(), Tier::Production);
        assert_eq!(spec.image, "your-registry/day:latest");
        assert_eq!(spec.replicas, 3);
        let scaling = spec.scaling.as_ref().unwrap();
        assert_eq!((scaling.min(), scaling.max()), (2, 10));
        assert_eq!((scaling.cpu_target(), scaling.memory_target()), (70, 80));
        assert_eq!(scaling.scale_down().unwrap().stabilization_seconds, 300);
        assert_eq!(spec.resources.limits.memory, "512Mi");
        assert_eq!(spec.settings.cache_ttl, 300);
        assert!(spec.settings.feature_new_ui);
        assert_eq!((spec.container_port, spec.service_port), (8001, 80));
    }

    #[test]
    fn rc_namespace_selects_rc_tier() {
        let spec = WorkloadSpec::from_config(&cfg(&[
            ("namespace", "production-rc".into()),
            ("image_registry", "123.dkr.ecr.us-east-1.amazonaws.com".into()),
            ("image_tag", "v2.0.0-rc1".into()),
        ]))
        .unwrap();
        assert_eq!(spec.tier(), Tier::ReleaseCandidate);
        assert_eq!(spec.names.deployment_name, "day-rc");
        assert_eq!(spec.names.hostname, "day-rc.example.com");
        assert_eq!(spec.image, "123.dkr.ecr.us-east-1.amazonaws.com/day:v2.0.0-rc1");
    }

    #[test]
    fn feature_flag_can_be_disabled() {
        let spec = WorkloadSpec::from_config(&cfg(&[("feature_new_ui", false.into())])).unwrap();
        assert!(!spec.settings.feature_new_ui);
    }

    #[test]
    fn autoscaling_off() {
        let spec = WorkloadSpec::from_config(&cfg(&[("autoscaling", "false".into())])).unwrap();
        assert!(spec.scaling.is_none());
    }

    #[test]
    fn invalid_scaling_fails_at_build_time() {
        let err = WorkloadSpec::from_config(&cfg(&[
            ("min_replicas", ConfigValue::Int(12)),
            ("max_replicas", ConfigValue::Int(4)),
        ]))
        .unwrap_err();
        assert!(matches!(err, WorkloadError::InvalidReplicaBounds { min: 12, max: 4 }));

        let err = WorkloadSpec::from_config(&cfg(&[("cpu_target", ConfigValue::Int(120))])).unwrap_err();
        assert!(matches!(err, WorkloadError::TargetOutOfRange { value: 120, .. }));
    }

    #[test]
    fn desired_replicas_must_fit_the_scaling_bounds() {
        let err = WorkloadSpec::from_config(&cfg(&[
            ("replicas", ConfigValue::Int(50)),
            ("min_replicas", ConfigValue::Int(2)),
            ("max_replicas", ConfigValue::Int(10)),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            WorkloadError::DesiredOutOfBounds { desired: 50, min: 2, max: 10 }
        ));

        let spec = WorkloadSpec::from_config(&cfg(&[("replicas", ConfigValue::Int(4))])).unwrap();
        assert_eq!(spec.scaling.unwrap().desired(), Some(4));

        let fixed = WorkloadSpec::from_config(&cfg(&[
            ("autoscaling", false.into()),
            ("replicas", ConfigValue::Int(50)),
        ]))
        .unwrap();
        assert_eq!(fixed.replicas, 50);
    }

    #[test]
    fn invalid_namespace() {
        let err = WorkloadSpec::from_config(&cfg(&[("namespace", "Prod_NS!".into())])).unwrap_err();
        assert!(matches!(err, WorkloadError::Naming(_)));
    }

    #[test]
    fn zero_ports_are_rejected() {
        let err = WorkloadSpec::from_config(&cfg(&[("container_port", ConfigValue::Int(0))])).unwrap_err();
        assert!(matches!(err, WorkloadError::ZeroPort("container_port")));
        let err = WorkloadSpec::from_config(&cfg(&[("service_port", ConfigValue::Int(0))])).unwrap_err();
        assert!(matches!(err, WorkloadError::ZeroPort("service_port")));
    }

    #[test]
    fn uncoercible_value_is_reported() {
        let err = WorkloadSpec::from_config(&cfg(&[("replicas", "three".into())])).unwrap_err();
        assert!(matches!(err, WorkloadError::Config(ConfigError::Coercion { .. })));
    }

    #[test]
    fn invalid_service_name() {
        let err = WorkloadSpec::from_config(&cfg(&[("service_name", "Day_Service".into())])).unwrap_err();
        assert!(matches!(err, WorkloadError::Naming(_)));
    }
}
