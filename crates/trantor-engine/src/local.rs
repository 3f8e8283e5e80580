//! A provider that realizes resources locally.
//!
//! Attributes are derived from a SHA-256 of `{stack}/{name}`, so the same
//! resource gets the same id, endpoint and hostnames on every run. Nothing
//! outside the state store is touched.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tracing::debug;
use trantor_core::{Attributes, ResourceKind};
use trantor_state::ResourceRecord;

use crate::provider::{Provider, ProviderError, ProviderResult, ResourceRequest};

const ACCOUNT_ID: &str = "000000000000";
const REGION: &str = "local";
const GROUP_ANNOTATION: &str = "alb.ingress.kubernetes.io/group.name";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

/// One call the provider received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCall {
    pub operation: Operation,
    pub resource: String,
}

#[derive(Debug, Default)]
pub struct LocalProvider {
    failures: BTreeMap<String, String>,
    calls: Mutex<Vec<ProviderCall>>,
}

impl LocalProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation on `resource` fail with `message`.
    pub fn fail_on(mut self, resource: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.insert(resource.into(), message.into());
        self
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, operation: Operation, resource: &str) -> ProviderResult<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(ProviderCall {
                operation,
                resource: resource.to_string(),
            });
        }
        match self.failures.get(resource) {
            Some(message) => Err(ProviderError::new(message.clone())),
            None => Ok(()),
        }
    }

    fn realize(&self, request: &ResourceRequest<'_>) -> ProviderResult<Attributes> {
        if request.kind.is_kubernetes() {
            if let Some(connection) = request.connection {
                if !connection.get("kubeconfig").is_some_and(Value::is_string) {
                    return Err(ProviderError::new(format!(
                        "no kubeconfig available to reach the cluster for '{}'",
                        request.name
                    )));
                }
            }
        }
        let attrs = synthesize(request);
        debug!(resource = %request.name, kind = %request.kind, attributes = attrs.len(), "realized locally");
        Ok(attrs)
    }
}

impl Provider for LocalProvider {
    fn create(&self, request: &ResourceRequest<'_>) -> ProviderResult<Attributes> {
        self.record(Operation::Create, request.name)?;
        self.realize(request)
    }

    fn update(&self, request: &ResourceRequest<'_>, _prior: &Attributes) -> ProviderResult<Attributes> {
        self.record(Operation::Update, request.name)?;
        self.realize(request)
    }

    fn delete(&self, record: &ResourceRecord) -> ProviderResult<()> {
        self.record(Operation::Delete, &record.name)
    }
}

fn digest(stack: &str, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stack.as_bytes());
    hasher.update(b"/");
    hasher.update(name.as_bytes());
    hex::encode(hasher.finalize())
}

/// (service, resource type, id prefix) for ids and ARNs.
fn identity(kind: ResourceKind) -> (&'static str, &'static str, &'static str) {
    match kind {
        ResourceKind::Vpc => ("ec2", "vpc", "vpc-"),
        ResourceKind::InternetGateway => ("ec2", "internet-gateway", "igw-"),
        ResourceKind::Subnet => ("ec2", "subnet", "subnet-"),
        ResourceKind::RouteTable => ("ec2", "route-table", "rtb-"),
        ResourceKind::RouteTableAssociation => ("ec2", "route-table-association", "rtbassoc-"),
        ResourceKind::EksCluster => ("eks", "cluster", ""),
        ResourceKind::IamPolicy => ("iam", "policy", "ANPA"),
        ResourceKind::IamRole => ("iam", "role", "AROA"),
        ResourceKind::IamRolePolicyAttachment => ("iam", "role-policy-attachment", ""),
        ResourceKind::KubernetesProvider => ("kubernetes", "provider", ""),
        ResourceKind::Namespace => ("kubernetes", "namespace", ""),
        ResourceKind::ConfigMap => ("kubernetes", "configmap", ""),
        ResourceKind::ServiceAccount => ("kubernetes", "serviceaccount", ""),
        ResourceKind::Deployment => ("kubernetes", "deployment", ""),
        ResourceKind::Service => ("kubernetes", "service", ""),
        ResourceKind::HorizontalPodAutoscaler => ("kubernetes", "horizontalpodautoscaler", ""),
        ResourceKind::Ingress => ("kubernetes", "ingress", ""),
        ResourceKind::HelmRelease => ("kubernetes", "release", ""),
    }
}

fn synthesize(request: &ResourceRequest<'_>) -> Attributes {
    let d = digest(request.stack, request.name);
    let (service, rtype, prefix) = identity(request.kind);
    let id = match (request.kind, prefix) {
        (_, p) if !p.is_empty() => format!("{p}{}", &d[..17]),
        (ResourceKind::EksCluster, _) => request.name.to_string(),
        _ => format!("{}-{}", request.name, &d[..8]),
    };

    let mut attrs = Attributes::new();
    attrs.insert("id".into(), json!(id));
    attrs.insert("name".into(), json!(request.name));
    attrs.insert(
        "arn".into(),
        json!(format!("arn:aws:{service}:{REGION}:{ACCOUNT_ID}:{rtype}/{}", request.name)),
    );

    match request.kind {
        ResourceKind::EksCluster => {
            let issuer = d[..32].to_uppercase();
            let endpoint = format!("https://{issuer}.gr7.{REGION}.eks.amazonaws.com");
            attrs.insert("kubeconfig".into(), json!(kubeconfig(request.name, &endpoint)));
            attrs.insert("endpoint".into(), json!(endpoint));
            if request.inputs.get("createOidcProvider") != Some(&Value::Bool(false)) {
                let host = format!("oidc.eks.{REGION}.amazonaws.com/id/{issuer}");
                attrs.insert("oidcProviderUrl".into(), json!(format!("https://{host}")));
                attrs.insert(
                    "oidcProviderArn".into(),
                    json!(format!("arn:aws:iam::{ACCOUNT_ID}:oidc-provider/{host}")),
                );
            }
        }
        ResourceKind::KubernetesProvider => {
            if let Some(kubeconfig) = request.inputs.get("kubeconfig") {
                attrs.insert("kubeconfig".into(), kubeconfig.clone());
            }
        }
        ResourceKind::Ingress => {
            let group = request
                .inputs
                .pointer("/metadata/annotations")
                .and_then(|a| a.get(GROUP_ANNOTATION))
                .and_then(Value::as_str)
                .unwrap_or("default");
            attrs.insert(
                "loadBalancerHostname".into(),
                json!(format!("k8s-{group}-{}.{REGION}.elb.amazonaws.com", &d[..10])),
            );
        }
        _ => {}
    }
    attrs
}

fn kubeconfig(cluster: &str, endpoint: &str) -> String {
    format!(
        "apiVersion: v1
kind: Config
clusters:
- cluster:
    server: {endpoint}
  name: {cluster}
contexts:
- context:
    cluster: {cluster}
    user: {cluster}
  name: {cluster}
current-context: {cluster}
users:
- name: {cluster}
  user: {{}}
"
    )
}
