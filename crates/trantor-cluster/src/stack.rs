use tracing::{debug, info};
use trantor_core::graph::{Resource, ResourceKind, StackGraph};
use trantor_core::{Config, PropertyValue, StackName};
use trantor_network::{common_tags, declare_network};

use crate::iam::{self, CONTROLLER_NAME, CONTROLLER_NAMESPACE};
use crate::spec::{Capacity, ClusterStackSpec};
use crate::ClusterResult;

pub const CONTROLLER_CHART_REPO: &str = "https://aws.github.io/eks-charts";

/// Names of the values the cluster stack exports.
pub const EXPORTS: [&str; 8] = [
    "cluster_name",
    "cluster_endpoint",
    "kubeconfig",
    "vpc_id",
    "oidc_provider_arn",
    "oidc_provider_url",
    "region",
    "alb_controller_role_arn",
];

/// Resolve configuration and declare the whole cluster stack.
pub fn build_cluster_stack(cfg: &Config, stack: &StackName) -> ClusterResult<StackGraph> {
    let spec = ClusterStackSpec::from_config(cfg)?;
    let mut graph = StackGraph::new(stack.clone());
    declare_cluster_stack(&mut graph, spec)?;
    graph.validate()?;
    Ok(graph)
}

pub fn declare_cluster_stack(graph: &mut StackGraph, mut spec: ClusterStackSpec) -> ClusterResult<()> {
    spec.cluster.validate()?;
    let tags = common_tags(graph.stack(), &spec.service_tag());
    spec.network.tags = tags.clone();
    let stack_suffix = graph.stack().stack().to_string();
    let prefix = spec.name_prefix.as_str();

    let network = declare_network(graph, &spec.network)?;

    let c = &spec.cluster;
    let mut cluster_tags = tags.clone();
    cluster_tags.insert("Name".into(), format!("{}-{stack_suffix}", c.name));
    let mut cluster = Resource::new(ResourceKind::EksCluster, &c.name)
        .with("vpcId", network.vpc.output("id"))
        .with("subnetIds", network.subnet_ids())
        .with("instanceType", &c.instance_type)
        .with("desiredCapacity", c.desired_size)
        .with("minSize", c.min_size)
        .with("maxSize", c.max_size)
        .with("nodeAssociatePublicIpAddress", c.public_node_ips)
        .with("createOidcProvider", c.create_oidc_provider)
        .with("tags", cluster_tags);
    if let Capacity::Spot { max_price } = &c.capacity {
        cluster = cluster.with("spotPrice", max_price);
    }
    let cluster = graph.add(cluster)?;
    debug!(cluster = %c.name, capacity = ?c.capacity, "declared cluster");

    let k8s = graph.add(
        Resource::new(ResourceKind::KubernetesProvider, format!("{prefix}-k8s"))
            .with("kubeconfig", cluster.output("kubeconfig")),
    )?;

    let policy = graph.add(
        Resource::new(ResourceKind::IamPolicy, format!("{prefix}-alb-controller-policy"))
            .with(
                "policy",
                PropertyValue::json(PropertyValue::serialize(&iam::controller_policy())?),
            )
            .with("tags", tags.clone()),
    )?;

    let role = graph.add(
        Resource::new(ResourceKind::IamRole, format!("{prefix}-alb-controller-role"))
            .with(
                "assumeRolePolicy",
                iam::controller_trust_policy(
                    cluster.output_ref("oidcProviderUrl"),
                    cluster.output_ref("oidcProviderArn"),
                ),
            )
            .with("tags", tags),
    )?;

    let attachment = graph.add(
        Resource::new(
            ResourceKind::IamRolePolicyAttachment,
            format!("{prefix}-alb-controller-policy-attachment"),
        )
        .with("role", role.output("name"))
        .with("policyArn", policy.output("arn")),
    )?;

    let service_account = graph.add(
        Resource::new(ResourceKind::ServiceAccount, format!("{prefix}-alb-controller-sa"))
            .with(
                "metadata",
                PropertyValue::map([
                    ("name", PropertyValue::from(CONTROLLER_NAME)),
                    ("namespace", PropertyValue::from(CONTROLLER_NAMESPACE)),
                    (
                        "annotations",
                        PropertyValue::map([("eks.amazonaws.com/role-arn", role.output("arn"))]),
                    ),
                ]),
            )
            .with_provider(Some(k8s.name()))
            .depends_on(cluster.name()),
    )?;

    graph.add(
        Resource::new(ResourceKind::HelmRelease, format!("{prefix}-alb-controller"))
            .with("chart", CONTROLLER_NAME)
            .with("repositoryOpts", PropertyValue::map([("repo", CONTROLLER_CHART_REPO)]))
            .with("namespace", CONTROLLER_NAMESPACE)
            .with(
                "values",
                PropertyValue::map([
                    ("clusterName", cluster.output("name")),
                    (
                        "serviceAccount",
                        PropertyValue::map([
                            ("create", PropertyValue::from(false)),
                            ("name", PropertyValue::from(CONTROLLER_NAME)),
                        ]),
                    ),
                    ("region", PropertyValue::from(&spec.region)),
                    ("vpcId", network.vpc.output("id")),
                ]),
            )
            .with_provider(Some(k8s.name()))
            .depends_on(service_account.name())
            .depends_on(attachment.name()),
    )?;

    graph.export("cluster_name", cluster.output("name"));
    graph.export("cluster_endpoint", cluster.output("endpoint"));
    graph.export("kubeconfig", cluster.output("kubeconfig"));
    graph.export("vpc_id", network.vpc.output("id"));
    graph.export("oidc_provider_arn", cluster.output("oidcProviderArn"));
    graph.export("oidc_provider_url", cluster.output("oidcProviderUrl"));
    graph.export("region", &spec.region);
    graph.export("alb_controller_role_arn", role.output("arn"));

    info!(
        stack = %graph.stack(),
        resources = graph.len(),
        region = %spec.region,
        "cluster stack declared"
    );
    Ok(())
}
