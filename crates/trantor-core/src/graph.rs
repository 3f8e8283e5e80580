//! Declarative resource graph.
//!
//! A [`StackGraph`] holds the resources of one provisioning run, in
//! declaration order, plus the values it exports. Resources reference each
//! other through [`OutputRef`]s (attributes known only once the referenced
//! resource is realized) and reference other stacks through
//! [`StackOutputRef`]s. Every reference is an edge; the graph must be acyclic.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stack::StackName;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate resource name '{0}'")]
    DuplicateName(String),

    #[error("resource '{from}' references undeclared resource '{to}'")]
    UnknownReference { from: String, to: String },

    #[error("dependency cycle between resources: {}", .0.join(", "))]
    Cycle(Vec<String>),
}

/// Resource types understood by providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Vpc,
    InternetGateway,
    Subnet,
    RouteTable,
    RouteTableAssociation,
    EksCluster,
    IamPolicy,
    IamRole,
    IamRolePolicyAttachment,
    KubernetesProvider,
    Namespace,
    ConfigMap,
    ServiceAccount,
    Deployment,
    Service,
    HorizontalPodAutoscaler,
    Ingress,
    HelmRelease,
}

impl ResourceKind {
    /// Fully-qualified type token, as shown in plans.
    pub fn type_token(&self) -> &'static str {
        match self {
            ResourceKind::Vpc => "aws:ec2/vpc:Vpc",
            ResourceKind::InternetGateway => "aws:ec2/internetGateway:InternetGateway",
            ResourceKind::Subnet => "aws:ec2/subnet:Subnet",
            ResourceKind::RouteTable => "aws:ec2/routeTable:RouteTable",
            ResourceKind::RouteTableAssociation => {
                "aws:ec2/routeTableAssociation:RouteTableAssociation"
            }
            ResourceKind::EksCluster => "aws:eks/cluster:Cluster",
            ResourceKind::IamPolicy => "aws:iam/policy:Policy",
            ResourceKind::IamRole => "aws:iam/role:Role",
            ResourceKind::IamRolePolicyAttachment => {
                "aws:iam/rolePolicyAttachment:RolePolicyAttachment"
            }
            ResourceKind::KubernetesProvider => "trantor:providers:kubernetes",
            ResourceKind::Namespace => "kubernetes:core/v1:Namespace",
            ResourceKind::ConfigMap => "kubernetes:core/v1:ConfigMap",
            ResourceKind::ServiceAccount => "kubernetes:core/v1:ServiceAccount",
            ResourceKind::Deployment => "kubernetes:apps/v1:Deployment",
            ResourceKind::Service => "kubernetes:core/v1:Service",
            ResourceKind::HorizontalPodAutoscaler => {
                "kubernetes:autoscaling/v2:HorizontalPodAutoscaler"
            }
            ResourceKind::Ingress => "kubernetes:networking.k8s.io/v1:Ingress",
            ResourceKind::HelmRelease => "kubernetes:helm.sh/v3:Release",
        }
    }

    /// Whether the resource lives inside a Kubernetes cluster.
    pub fn is_kubernetes(&self) -> bool {
        matches!(
            self,
            ResourceKind::Namespace
                | ResourceKind::ConfigMap
                | ResourceKind::ServiceAccount
                | ResourceKind::Deployment
                | ResourceKind::Service
                | ResourceKind::HorizontalPodAutoscaler
                | ResourceKind::Ingress
                | ResourceKind::HelmRelease
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_token())
    }
}

/// An attribute of another resource in the same stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputRef {
    pub resource: String,
    pub attribute: String,
    /// Used when the realized resource never reports the attribute.
    pub fallback: Option<String>,
}

impl OutputRef {
    pub fn new(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            attribute: attribute.into(),
            fallback: None,
        }
    }

    pub fn or(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }
}

/// A named output of another stack, read at apply time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackOutputRef {
    pub stack: StackName,
    pub output: String,
}

impl fmt::Display for StackOutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.stack, self.output)
    }
}

/// A property value: literal, structure, reference or computed string.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<PropertyValue>),
    Map(BTreeMap<String, PropertyValue>),
    Output(OutputRef),
    StackOutput(StackOutputRef),
    /// String concatenation of the resolved parts.
    Concat(Vec<PropertyValue>),
    /// The resolved inner value, encoded as a JSON string.
    Json(Box<PropertyValue>),
    /// The resolved inner string with a leading prefix removed.
    TrimPrefix(Box<PropertyValue>, String),
}

impl PropertyValue {
    /// Convert a plain JSON document.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => PropertyValue::Null,
            serde_json::Value::Bool(b) => PropertyValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => PropertyValue::Int(i),
                None => PropertyValue::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => PropertyValue::String(s),
            serde_json::Value::Array(items) => {
                PropertyValue::List(items.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(map) => PropertyValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert any serializable value via its JSON form.
    pub fn serialize<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self::from_json)
    }

    pub fn map<K, V, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<PropertyValue>,
    {
        PropertyValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn concat<I, V>(parts: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<PropertyValue>,
    {
        PropertyValue::Concat(parts.into_iter().map(Into::into).collect())
    }

    pub fn json(inner: impl Into<PropertyValue>) -> Self {
        PropertyValue::Json(Box::new(inner.into()))
    }

    pub fn trim_prefix(inner: impl Into<PropertyValue>, prefix: impl Into<String>) -> Self {
        PropertyValue::TrimPrefix(Box::new(inner.into()), prefix.into())
    }

    /// Set a nested map entry, creating intermediate maps.
    ///
    /// Returns false when a non-map value sits on the path.
    pub fn set_path(&mut self, path: &[&str], value: PropertyValue) -> bool {
        let Some((last, parents)) = path.split_last() else {
            *self = value;
            return true;
        };
        let mut cursor = self;
        for key in parents {
            let PropertyValue::Map(map) = cursor else {
                return false;
            };
            cursor = map
                .entry((*key).to_string())
                .or_insert_with(|| PropertyValue::Map(BTreeMap::new()));
        }
        match cursor {
            PropertyValue::Map(map) => {
                map.insert((*last).to_string(), value);
                true
            }
            _ => false,
        }
    }

    /// Every same-stack reference in this value.
    pub fn output_refs(&self) -> Vec<&OutputRef> {
        let mut out = Vec::new();
        self.walk(&mut |v| {
            if let PropertyValue::Output(r) = v {
                out.push(r);
            }
        });
        out
    }

    /// Every cross-stack reference in this value.
    pub fn stack_refs(&self) -> Vec<&StackOutputRef> {
        let mut out = Vec::new();
        self.walk(&mut |v| {
            if let PropertyValue::StackOutput(r) = v {
                out.push(r);
            }
        });
        out
    }

    fn walk<'a>(&'a self, f: &mut impl FnMut(&'a PropertyValue)) {
        f(self);
        match self {
            PropertyValue::List(items) | PropertyValue::Concat(items) => {
                for item in items {
                    item.walk(f);
                }
            }
            PropertyValue::Map(map) => {
                for item in map.values() {
                    item.walk(f);
                }
            }
            PropertyValue::Json(inner) | PropertyValue::TrimPrefix(inner, _) => inner.walk(f),
            _ => {}
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<&String> for PropertyValue {
    fn from(s: &String) -> Self {
        PropertyValue::String(s.clone())
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Int(i)
    }
}

impl From<u32> for PropertyValue {
    fn from(i: u32) -> Self {
        PropertyValue::Int(i64::from(i))
    }
}

impl From<u16> for PropertyValue {
    fn from(i: u16) -> Self {
        PropertyValue::Int(i64::from(i))
    }
}

impl From<OutputRef> for PropertyValue {
    fn from(r: OutputRef) -> Self {
        PropertyValue::Output(r)
    }
}

impl From<StackOutputRef> for PropertyValue {
    fn from(r: StackOutputRef) -> Self {
        PropertyValue::StackOutput(r)
    }
}

impl<T: Into<PropertyValue>> From<Vec<T>> for PropertyValue {
    fn from(items: Vec<T>) -> Self {
        PropertyValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<PropertyValue>> From<BTreeMap<String, T>> for PropertyValue {
    fn from(map: BTreeMap<String, T>) -> Self {
        PropertyValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

pub type Properties = BTreeMap<String, PropertyValue>;

/// One declared resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub name: String,
    pub kind: ResourceKind,
    pub properties: Properties,
    /// Explicit ordering edges, on top of the implicit reference edges.
    pub depends_on: Vec<String>,
    /// Provider resource used to realize this one.
    pub provider: Option<String>,
}

impl Resource {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            properties: Properties::new(),
            depends_on: Vec::new(),
            provider: None,
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Merge the entries of a map value into the top-level properties.
    pub fn with_all(mut self, value: PropertyValue) -> Self {
        if let PropertyValue::Map(map) = value {
            self.properties.extend(map);
        }
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.depends_on.contains(&name) {
            self.depends_on.push(name);
        }
        self
    }

    pub fn with_provider(mut self, provider: Option<&str>) -> Self {
        self.provider = provider.map(str::to_string);
        self
    }

    pub fn output(&self, attribute: &str) -> PropertyValue {
        OutputRef::new(&self.name, attribute).into()
    }

    /// Names of every resource this one must follow.
    pub fn dependencies(&self) -> BTreeSet<&str> {
        let mut deps: BTreeSet<&str> = self.depends_on.iter().map(String::as_str).collect();
        deps.extend(self.provider.as_deref());
        for value in self.properties.values() {
            for r in value.output_refs() {
                deps.insert(r.resource.as_str());
            }
        }
        deps
    }

    pub fn stack_refs(&self) -> Vec<&StackOutputRef> {
        self.properties
            .values()
            .flat_map(PropertyValue::stack_refs)
            .collect()
    }
}

/// Handle to a declared resource, for building references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    name: String,
}

impl ResourceHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output(&self, attribute: &str) -> PropertyValue {
        OutputRef::new(&self.name, attribute).into()
    }

    pub fn output_ref(&self, attribute: &str) -> OutputRef {
        OutputRef::new(&self.name, attribute)
    }
}

/// All resources and exports of one stack.
#[derive(Debug, Clone)]
pub struct StackGraph {
    stack: StackName,
    resources: Vec<Resource>,
    index: HashMap<String, usize>,
    exports: BTreeMap<String, PropertyValue>,
}

impl StackGraph {
    pub fn new(stack: StackName) -> Self {
        Self {
            stack,
            resources: Vec::new(),
            index: HashMap::new(),
            exports: BTreeMap::new(),
        }
    }

    pub fn stack(&self) -> &StackName {
        &self.stack
    }

    /// Declare a resource. Names must be unique within the stack.
    pub fn add(&mut self, resource: Resource) -> Result<ResourceHandle, GraphError> {
        if self.index.contains_key(&resource.name) {
            return Err(GraphError::DuplicateName(resource.name));
        }
        let handle = ResourceHandle {
            name: resource.name.clone(),
        };
        self.index.insert(resource.name.clone(), self.resources.len());
        self.resources.push(resource);
        Ok(handle)
    }

    pub fn export(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.exports.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.index.get(name).map(|&i| &self.resources[i])
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn exports(&self) -> &BTreeMap<String, PropertyValue> {
        &self.exports
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Distinct cross-stack references used by resources and exports.
    pub fn stack_refs(&self) -> Vec<&StackOutputRef> {
        let mut refs: BTreeSet<&StackOutputRef> = BTreeSet::new();
        for resource in &self.resources {
            refs.extend(resource.stack_refs());
        }
        for value in self.exports.values() {
            refs.extend(value.stack_refs());
        }
        refs.into_iter().collect()
    }

    /// Check references and acyclicity.
    pub fn validate(&self) -> Result<(), GraphError> {
        self.topological_order().map(|_| ())
    }

    /// Resources ordered so every dependency precedes its dependents.
    ///
    /// Ties keep declaration order, so the result is deterministic.
    pub fn topological_order(&self) -> Result<Vec<&Resource>, GraphError> {
        let n = self.resources.len();
        let mut indegree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (i, resource) in self.resources.iter().enumerate() {
            for dep in resource.dependencies() {
                let Some(&j) = self.index.get(dep) else {
                    return Err(GraphError::UnknownReference {
                        from: resource.name.clone(),
                        to: dep.to_string(),
                    });
                };
                indegree[i] += 1;
                dependents[j].push(i);
            }
        }
        for (name, value) in &self.exports {
            for r in value.output_refs() {
                if !self.index.contains_key(&r.resource) {
                    return Err(GraphError::UnknownReference {
                        from: format!("export '{name}'"),
                        to: r.resource.clone(),
                    });
                }
            }
        }

        let mut ready: BTreeSet<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = ready.pop_first() {
            order.push(&self.resources[i]);
            for &d in &dependents[i] {
                indegree[d] -= 1;
                if indegree[d] == 0 {
                    ready.insert(d);
                }
            }
        }

        if order.len() < n {
            let stuck = (0..n)
                .filter(|&i| indegree[i] > 0)
                .map(|i| self.resources[i].name.clone())
                .collect();
            return Err(GraphError::Cycle(stuck));
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> StackGraph {
        StackGraph::new("foundation/test".parse().unwrap())
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut g = graph();
        g.add(Resource::new(ResourceKind::Vpc, "vpc")).unwrap();
        let err = g.add(Resource::new(ResourceKind::Vpc, "vpc")).unwrap_err();
        assert_eq!(err, GraphError::DuplicateName("vpc".into()));
    }

    #[test]
    fn references_order_resources() {
        let mut g = graph();
        // Declared out of order on purpose.
        g.add(Resource::new(ResourceKind::Subnet, "subnet").with("vpcId", OutputRef::new("vpc", "id")))
            .unwrap();
        g.add(Resource::new(ResourceKind::InternetGateway, "igw").depends_on("vpc"))
            .unwrap();
        g.add(Resource::new(ResourceKind::Vpc, "vpc")).unwrap();

        let order: Vec<&str> = g
            .topological_order()
            .unwrap()
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(order, vec!["vpc", "subnet", "igw"]);
    }

    #[test]
    fn ties_keep_declaration_order() {
        let mut g = graph();
        for name in ["c", "a", "b"] {
            g.add(Resource::new(ResourceKind::ConfigMap, name)).unwrap();
        }
        let order: Vec<&str> = g
            .topological_order()
            .unwrap()
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn unknown_reference_rejected() {
        let mut g = graph();
        g.add(Resource::new(ResourceKind::Subnet, "subnet").with("vpcId", OutputRef::new("vpc", "id")))
            .unwrap();
        assert_eq!(
            g.validate().unwrap_err(),
            GraphError::UnknownReference {
                from: "subnet".into(),
                to: "vpc".into()
            }
        );
    }

    #[test]
    fn unknown_export_reference_rejected() {
        let mut g = graph();
        g.export("vpc_id", OutputRef::new("vpc", "id"));
        assert!(matches!(
            g.validate(),
            Err(GraphError::UnknownReference { .. })
        ));
    }

    #[test]
    fn cycles_rejected() {
        let mut g = graph();
        g.add(Resource::new(ResourceKind::IamRole, "a").depends_on("b")).unwrap();
        g.add(Resource::new(ResourceKind::IamRole, "b").with("x", OutputRef::new("a", "arn")))
            .unwrap();
        g.add(Resource::new(ResourceKind::IamRole, "c")).unwrap();
        assert_eq!(
            g.validate().unwrap_err(),
            GraphError::Cycle(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn dependencies_collect_nested_refs_and_provider() {
        let mut props = PropertyValue::map([("name", "x")]);
        assert!(props.set_path(&["metadata", "annotations", "arn"], OutputRef::new("role", "arn").into()));
        let r = Resource::new(ResourceKind::ServiceAccount, "sa")
            .with("spec", props)
            .with("policy", PropertyValue::json(PropertyValue::concat([
                PropertyValue::from("prefix:"),
                OutputRef::new("cluster", "oidcProviderUrl").into(),
            ])))
            .with_provider(Some("k8s"));
        let deps: Vec<&str> = r.dependencies().into_iter().collect();
        assert_eq!(deps, vec!["cluster", "k8s", "role"]);
    }

    #[test]
    fn set_path_refuses_to_overwrite_scalars() {
        let mut v = PropertyValue::map([("metadata", "scalar")]);
        assert!(!v.set_path(&["metadata", "name"], "x".into()));
    }

    #[test]
    fn stack_refs_are_deduplicated() {
        let stack: StackName = "org/foundation/day".parse().unwrap();
        let kubeconfig = StackOutputRef {
            stack,
            output: "kubeconfig".into(),
        };
        let mut g = graph();
        g.add(Resource::new(ResourceKind::KubernetesProvider, "p1").with("kubeconfig", kubeconfig.clone()))
            .unwrap();
        g.add(Resource::new(ResourceKind::KubernetesProvider, "p2").with("kubeconfig", kubeconfig.clone()))
            .unwrap();
        assert_eq!(g.stack_refs(), vec![&kubeconfig]);
    }

    #[test]
    fn from_json_maps_structure() {
        let v = PropertyValue::from_json(serde_json::json!({"a": [1, 2.5, "x", null, true]}));
        let PropertyValue::Map(map) = v else {
            panic!("expected map");
        };
        assert_eq!(
            map["a"],
            PropertyValue::List(vec![
                PropertyValue::Int(1),
                PropertyValue::Float(2.5),
                PropertyValue::String("x".into()),
                PropertyValue::Null,
                PropertyValue::Bool(true),
            ])
        );
    }
}
