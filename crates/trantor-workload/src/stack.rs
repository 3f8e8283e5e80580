use tracing::info;
use trantor_core::graph::{OutputRef, Resource, ResourceKind, StackGraph};
use trantor_core::{Config, PropertyValue, StackName};

use crate::source::KubeconfigSource;
use crate::spec::WorkloadSpec;
use crate::WorkloadResult;

/// Name of the provider resource declared in linked mode.
pub const PROVIDER_RESOURCE: &str = "k8s-provider";

/// Ingress attribute carrying the load balancer's DNS name.
pub const LOAD_BALANCER_HOSTNAME: &str = "loadBalancerHostname";

/// Resolve configuration and declare the workload stack.
pub fn build_workload_stack(
    cfg: &Config,
    stack: &StackName,
    source: &KubeconfigSource,
) -> WorkloadResult<StackGraph> {
    let spec = WorkloadSpec::from_config(cfg)?;
    let mut graph = StackGraph::new(stack.clone());
    declare_workload(&mut graph, &spec, source)?;
    graph.validate()?;
    Ok(graph)
}

pub fn declare_workload(
    graph: &mut StackGraph,
    spec: &WorkloadSpec,
    source: &KubeconfigSource,
) -> WorkloadResult<()> {
    let provider = match source.kubeconfig_ref() {
        Some(kubeconfig) => Some(
            graph.add(
                Resource::new(ResourceKind::KubernetesProvider, PROVIDER_RESOURCE)
                    .with("kubeconfig", kubeconfig),
            )?,
        ),
        None => None,
    };
    let provider = provider.as_ref().map(|p| p.name());
    let names = &spec.names;

    let namespace = graph.add(
        Resource::new(ResourceKind::Namespace, format!("{}-namespace", spec.namespace))
            .with_all(PropertyValue::serialize(&spec.namespace_object())?)
            .with_provider(provider),
    )?;

    let namespaced = |kind, name: String, object: PropertyValue| {
        Resource::new(kind, name)
            .with_all(object)
            .with_provider(provider)
            .depends_on(namespace.name())
    };

    graph.add(namespaced(
        ResourceKind::ConfigMap,
        format!("{}-configmap", names.config_name),
        PropertyValue::serialize(&spec.config_map())?,
    ))?;
    graph.add(namespaced(
        ResourceKind::Deployment,
        format!("{}-deployment", names.deployment_name),
        PropertyValue::serialize(&spec.deployment())?,
    ))?;
    graph.add(namespaced(
        ResourceKind::Service,
        format!("{}-service", names.service_name),
        PropertyValue::serialize(&spec.service())?,
    ))?;
    if let Some(hpa) = spec.autoscaler() {
        graph.add(namespaced(
            ResourceKind::HorizontalPodAutoscaler,
            names.autoscaler_name.clone(),
            PropertyValue::serialize(&hpa)?,
        ))?;
    }
    let ingress = graph.add(namespaced(
        ResourceKind::Ingress,
        names.ingress_name.clone(),
        PropertyValue::serialize(&spec.ingress())?,
    ))?;

    graph.export("deployment_name", &names.deployment_name);
    graph.export("service_name", &names.service_name);
    if spec.scaling.is_some() {
        graph.export("hpa_name", &names.autoscaler_name);
    }
    graph.export("ingress_name", &names.ingress_name);
    graph.export("configmap_name", &names.config_name);
    graph.export("namespace", &spec.namespace);
    graph.export("tier", spec.tier().as_str());
    graph.export("replicas", spec.replicas);
    graph.export("image", &spec.image);
    graph.export("ingress_host", &names.hostname);
    graph.export(
        "alb_hostname",
        OutputRef::new(ingress.name(), LOAD_BALANCER_HOSTNAME).or("pending"),
    );
    graph.export("using_stack_reference", source.is_linked());
    if let KubeconfigSource::Linked { stack } = source {
        graph.export("infra_stack_referenced", stack.to_string());
    }

    info!(
        stack = %graph.stack(),
        service = %names.service,
        tier = %names.tier,
        resources = graph.len(),
        linked = source.is_linked(),
        "workload stack declared"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use trantor_core::ConfigValue;

    fn build(values: &[(&str, ConfigValue)], source: &KubeconfigSource) -> StackGraph {
        let cfg = Config::new("foundation").with_stored(values.iter().cloned());
        build_workload_stack(&cfg, &"foundation/day".parse().unwrap(), source).unwrap()
    }

    fn linked() -> KubeconfigSource {
        KubeconfigSource::Linked {
            stack: "ry111/foundation/day".parse().unwrap(),
        }
    }

    #[test]
    fn linked_stack_uses_provider_everywhere() {
        let graph = build(&[], &linked());
        assert_eq!(graph.len(), 7);
        for r in graph.resources().iter().filter(|r| r.kind.is_kubernetes()) {
            assert_eq!(r.provider.as_deref(), Some(PROVIDER_RESOURCE), "{}", r.name);
        }
        assert_eq!(graph.stack_refs().len(), 1);
        assert_eq!(
            graph.exports()["infra_stack_referenced"],
            PropertyValue::from("ry111/foundation/day")
        );
    }

    #[test]
    fn ambient_stack_has_no_provider() {
        let graph = build(&[], &KubeconfigSource::Ambient);
        assert_eq!(graph.len(), 6);
        assert!(graph.resources().iter().all(|r| r.provider.is_none()));
        assert!(graph.stack_refs().is_empty());
        assert_eq!(graph.exports()["using_stack_reference"], PropertyValue::Bool(false));
        assert!(!graph.exports().contains_key("infra_stack_referenced"));
    }

    #[test]
    fn namespaced_resources_follow_namespace() {
        let graph = build(&[], &KubeconfigSource::Ambient);
        let order: Vec<&str> = graph
            .topological_order()
            .unwrap()
            .into_iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(order[0], "production-namespace");
        for r in graph.resources().iter().skip(1) {
            assert!(r.depends_on.contains(&"production-namespace".to_string()));
        }
    }

    #[test]
    fn rc_exports() {
        let graph = build(&[("namespace", "production-rc".into())], &linked());
        let exports = graph.exports();
        assert_eq!(exports["deployment_name"], PropertyValue::from("day-rc"));
        assert_eq!(exports["hpa_name"], PropertyValue::from("day-rc-hpa"));
        assert_eq!(exports["tier"], PropertyValue::from("rc"));
        assert_eq!(exports["ingress_host"], PropertyValue::from("day-rc.example.com"));
        assert_eq!(
            exports["alb_hostname"],
            PropertyValue::from(OutputRef::new("day-rc-ingress", LOAD_BALANCER_HOSTNAME).or("pending"))
        );
        assert!(graph.get("day-rc-deployment").is_some());
        assert!(graph.get("day-rc-service").is_some());
    }

    #[test]
    fn fixed_replicas_skip_autoscaler() {
        let graph = build(&[("autoscaling", false.into())], &KubeconfigSource::Ambient);
        assert_eq!(graph.len(), 5);
        assert!(graph.get("day-hpa").is_none());
        assert!(!graph.exports().contains_key("hpa_name"));
    }
}
