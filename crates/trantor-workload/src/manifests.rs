//! Kubernetes objects for a [`WorkloadSpec`].

use std::collections::BTreeMap;

use serde_json::{Value, json};

use crate::k8s::{
    ConfigMap, ConfigMapEnvSource, Container, ContainerPort, CrossVersionObjectReference,
    Deployment, DeploymentSpec, DeploymentStrategy, EnvFromSource, HorizontalPodAutoscaler,
    HpaSpec, HttpIngressPath, HttpIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, LabelSelector, MetricSpec, Namespace, ObjectMeta,
    PodSpec, PodTemplateSpec, Probe, Service, ServiceBackendPort, ServicePort, ServiceSpec,
    TemplateMeta,
};
use crate::spec::WorkloadSpec;
use crate::WorkloadResult;

pub const INGRESS_CLASS: &str = "alb";
const TERMINATION_GRACE_SECONDS: u32 = 30;

impl WorkloadSpec {
    fn meta(&self, name: &str) -> ObjectMeta {
        ObjectMeta::new(name, &self.namespace).with_labels(self.names.resource_labels(&self.namespace))
    }

    pub fn namespace_object(&self) -> Namespace {
        let mut ns = Namespace::new(&self.namespace);
        ns.metadata.labels = self.names.namespace_labels(&self.namespace);
        ns
    }

    pub fn config_map(&self) -> ConfigMap {
        let s = &self.settings;
        let mut cm = ConfigMap::new(&self.names.config_name, &self.namespace)
            .with_data("LOG_LEVEL", &s.log_level)
            .with_data("DATABASE_HOST", &s.database_host)
            .with_data("CACHE_TTL", s.cache_ttl.to_string())
            .with_data("FEATURE_NEW_UI", s.feature_new_ui.to_string())
            .with_data("SERVICE_NAME", &self.names.service)
            .with_data("NAMESPACE", &self.namespace);
        cm.metadata.labels = self.names.resource_labels(&self.namespace);
        cm
    }

    pub fn deployment(&self) -> Deployment {
        let port = self.container_port;
        let container = Container {
            name: self.names.service.clone(),
            image: self.image.clone(),
            ports: vec![ContainerPort {
                name: "http".to_string(),
                container_port: port,
                protocol: "TCP".to_string(),
            }],
            env_from: vec![EnvFromSource {
                config_map_ref: ConfigMapEnvSource {
                    name: self.names.config_name.clone(),
                },
            }],
            resources: Some(self.resources.clone()),
            liveness_probe: Some(Probe::http(&self.health_path, port, 30, 10, 5, 3)),
            readiness_probe: Some(Probe::http(&self.health_path, port, 5, 5, 3, 3)),
        };

        Deployment {
            api_version: "apps/v1".to_string(),
            kind: "Deployment".to_string(),
            metadata: self.meta(&self.names.deployment_name),
            spec: DeploymentSpec {
                replicas: match self.scaling {
                    Some(_) => None,
                    None => Some(self.replicas),
                },
                selector: LabelSelector {
                    match_labels: self.names.selector.clone(),
                },
                template: PodTemplateSpec {
                    metadata: TemplateMeta {
                        labels: self.names.pod_labels.clone(),
                    },
                    spec: PodSpec {
                        containers: vec![container],
                        termination_grace_period_seconds: TERMINATION_GRACE_SECONDS,
                    },
                },
                strategy: DeploymentStrategy::rolling(1, 1),
            },
        }
    }

    pub fn service(&self) -> Service {
        Service {
            api_version: "v1".to_string(),
            kind: "Service".to_string(),
            metadata: self.meta(&self.names.service_name),
            spec: ServiceSpec {
                type_: "ClusterIP".to_string(),
                selector: self.names.selector.clone(),
                ports: vec![ServicePort {
                    name: "http".to_string(),
                    port: self.service_port,
                    target_port: self.container_port,
                    protocol: "TCP".to_string(),
                }],
            },
        }
    }

    /// `None` when autoscaling is disabled.
    pub fn autoscaler(&self) -> Option<HorizontalPodAutoscaler> {
        let policy = self.scaling.as_ref()?;
        Some(HorizontalPodAutoscaler {
            api_version: "autoscaling/v2".to_string(),
            kind: "HorizontalPodAutoscaler".to_string(),
            metadata: self.meta(&self.names.autoscaler_name),
            spec: HpaSpec {
                scale_target_ref: CrossVersionObjectReference {
                    api_version: "apps/v1".to_string(),
                    kind: "Deployment".to_string(),
                    name: self.names.deployment_name.clone(),
                },
                min_replicas: policy.min(),
                max_replicas: policy.max(),
                metrics: vec![
                    MetricSpec::utilization("cpu", policy.cpu_target()),
                    MetricSpec::utilization("memory", policy.memory_target()),
                ],
                behavior: policy.scale_down().map(|b| b.to_k8s()),
            },
        })
    }

    pub fn ingress_annotations(&self) -> BTreeMap<String, String> {
        let alb = |key: &str| format!("alb.ingress.kubernetes.io/{key}");
        BTreeMap::from([
            ("kubernetes.io/ingress.class".to_string(), INGRESS_CLASS.to_string()),
            (alb("group.name"), self.alb_group_name.clone()),
            (alb("scheme"), "internet-facing".to_string()),
            (alb("target-type"), "ip".to_string()),
            (alb("healthcheck-path"), self.health_path.clone()),
            (alb("healthcheck-interval-seconds"), "15".to_string()),
            (alb("healthcheck-timeout-seconds"), "5".to_string()),
            (alb("healthy-threshold-count"), "2".to_string()),
            (alb("unhealthy-threshold-count"), "2".to_string()),
        ])
    }

    pub fn ingress(&self) -> Ingress {
        let mut metadata = self.meta(&self.names.ingress_name);
        metadata.annotations = self.ingress_annotations();
        Ingress {
            api_version: "networking.k8s.io/v1".to_string(),
            kind: "Ingress".to_string(),
            metadata,
            spec: IngressSpec {
                ingress_class_name: INGRESS_CLASS.to_string(),
                rules: vec![IngressRule {
                    host: self.names.hostname.clone(),
                    http: HttpIngressRuleValue {
                        paths: vec![HttpIngressPath {
                            path: "/".to_string(),
                            path_type: "Prefix".to_string(),
                            backend: IngressBackend {
                                service: IngressServiceBackend {
                                    name: self.names.service_name.clone(),
                                    port: ServiceBackendPort {
                                        number: self.service_port,
                                    },
                                },
                            },
                        }],
                    },
                }],
            },
        }
    }
}

/// Every object of the workload as one `kind: List`, in apply order.
pub fn render_manifests(spec: &WorkloadSpec) -> WorkloadResult<Value> {
    let mut items = vec![
        serde_json::to_value(spec.namespace_object())?,
        serde_json::to_value(spec.config_map())?,
        serde_json::to_value(spec.deployment())?,
        serde_json::to_value(spec.service())?,
    ];
    if let Some(hpa) = spec.autoscaler() {
        items.push(serde_json::to_value(hpa)?);
    }
    items.push(serde_json::to_value(spec.ingress())?);
    Ok(json!({
        "apiVersion": "v1",
        "kind": "List",
        "items": items,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use trantor_core::{Config, ConfigValue};

    fn spec(values: &[(&str, ConfigValue)]) -> WorkloadSpec {
        WorkloadSpec::from_config(&Config::new("foundation").with_stored(values.iter().cloned()))
            .unwrap()
    }

    #[test]
    fn deployment_and_service_share_selector() {
        for ns in ["production", "production-rc"] {
            let s = spec(&[("namespace", ns.into())]);
            let deployment = s.deployment();
            let service = s.service();
            assert_eq!(deployment.spec.selector.match_labels, service.spec.selector);
            for (k, v) in &deployment.spec.selector.match_labels {
                assert_eq!(deployment.spec.template.metadata.labels.get(k), Some(v));
            }
        }
    }

    #[test]
    fn container_wiring() {
        let s = spec(&[]);
        let d = s.deployment();
        let c = &d.spec.template.spec.containers[0];
        assert_eq!(c.name, "day");
        assert_eq!(c.ports[0].container_port, 8001);
        assert_eq!(c.env_from[0].config_map_ref.name, "day-config");
        let live = c.liveness_probe.as_ref().unwrap();
        assert_eq!(
            (live.initial_delay_seconds, live.period_seconds, live.timeout_seconds, live.failure_threshold),
            (30, 10, 5, 3)
        );
        let ready = c.readiness_probe.as_ref().unwrap();
        assert_eq!(
            (ready.initial_delay_seconds, ready.period_seconds, ready.timeout_seconds, ready.failure_threshold),
            (5, 5, 3, 3)
        );
        assert_eq!(ready.http_get.path, "/health");
        assert_eq!(d.spec.template.spec.termination_grace_period_seconds, 30);
        assert_eq!(d.spec.strategy.rolling_update.max_unavailable, 1);
    }

    #[test]
    fn replicas_only_without_autoscaler() {
        assert_eq!(spec(&[]).deployment().spec.replicas, None);
        let fixed = spec(&[("autoscaling", false.into()), ("replicas", ConfigValue::Int(4))]);
        assert_eq!(fixed.deployment().spec.replicas, Some(4));
        assert!(fixed.autoscaler().is_none());
    }

    #[test]
    fn config_map_data() {
        let cm = spec(&[("namespace", "production-rc".into())]).config_map();
        assert_eq!(cm.metadata.name, "day-rc-config");
        assert_eq!(cm.data["FEATURE_NEW_UI"], "true");
        assert_eq!(cm.data["CACHE_TTL"], "300");
        assert_eq!(cm.data["SERVICE_NAME"], "day");
        assert_eq!(cm.data["NAMESPACE"], "production-rc");
        assert_eq!(cm.metadata.labels["tier"], "rc");
    }

    #[test]
    fn ingress_routes_to_service() {
        let s = spec(&[("namespace", "production-rc".into()), ("domain", "apps.example.org".into())]);
        let ing = s.ingress();
        assert_eq!(ing.metadata.name, "day-rc-ingress");
        let rule = &ing.spec.rules[0];
        assert_eq!(rule.host, "day-rc.apps.example.org");
        let backend = &rule.http.paths[0].backend.service;
        assert_eq!(backend.name, "day-rc");
        assert_eq!(backend.port.number, 80);
        assert_eq!(ing.metadata.annotations["alb.ingress.kubernetes.io/group.name"], "trantor-cluster");
        assert_eq!(ing.metadata.annotations["alb.ingress.kubernetes.io/healthcheck-path"], "/health");
    }

    #[test]
    fn render_list() {
        let list = render_manifests(&spec(&[])).unwrap();
        assert_eq!(list["kind"], "List");
        let kinds: Vec<&str> = list["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["kind"].as_str().unwrap())
            .collect();
        assert_eq!(
            kinds,
            vec!["Namespace", "ConfigMap", "Deployment", "Service", "HorizontalPodAutoscaler", "Ingress"]
        );
        let hpa = &list["items"][4];
        assert_eq!(hpa["spec"]["behavior"]["scaleDown"]["policies"][0]["value"], 50);
        assert!(list["items"][2]["spec"].get("replicas").is_none());
    }
}
