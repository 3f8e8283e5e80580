//! Tier-aware resource naming and labeling.
//!
//! Every name, label set and hostname a workload needs is derived here, once.
//! Builders consume the resulting [`NameSet`] and never recompute suffixes,
//! so the deployment selector and the service selector cannot drift apart.
//!
//! | field | production | release candidate |
//! |---|---|---|
//! | deployment / service | `day` | `day-rc` |
//! | ingress | `day-ingress` | `day-rc-ingress` |
//! | config map | `day-config` | `day-rc-config` |
//! | autoscaler | `day-hpa` | `day-rc-hpa` |
//! | hostname | `day.example.com` | `day-rc.example.com` |

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_DOMAIN: &str = "example.com";
pub const DEFAULT_CLUSTER_LABEL: &str = "trantor";
pub const MANAGED_BY: &str = "trantor";

pub type Labels = BTreeMap<String, String>;

static DNS_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("static regex"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NamingError {
    #[error("invalid name '{0}': must be a lowercase RFC 1123 label of at most 63 characters")]
    InvalidName(String),

    #[error("unknown tier '{0}': expected 'production' or 'rc'")]
    UnknownTier(String),
}

/// Deployment variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    #[default]
    Production,
    ReleaseCandidate,
}

impl Tier {
    /// Suffix carried by every derived name; `None` for the default tier.
    pub fn suffix(&self) -> Option<&'static str> {
        match self {
            Tier::Production => None,
            Tier::ReleaseCandidate => Some("rc"),
        }
    }

    /// Short label value (`production` / `rc`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Production => "production",
            Tier::ReleaseCandidate => "rc",
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Tier::Production)
    }

    /// Namespaces with an `rc` segment (`production-rc`, `rc-eu`) host the
    /// release-candidate tier. Words that merely contain the letters, like
    /// `orchestration`, do not.
    pub fn from_namespace(namespace: &str) -> Self {
        if namespace.split('-').any(|segment| segment == "rc") {
            Tier::ReleaseCandidate
        } else {
            Tier::Production
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = NamingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Tier::Production),
            "rc" | "release-candidate" => Ok(Tier::ReleaseCandidate),
            other => Err(NamingError::UnknownTier(other.to_string())),
        }
    }
}

/// Check that `name` can be used as a Kubernetes object name / DNS label.
pub fn validate_name(name: &str) -> Result<(), NamingError> {
    if name.len() > 63 || !DNS_LABEL.is_match(name) {
        return Err(NamingError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Everything a workload needs to be addressed consistently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameSet {
    pub service: String,
    pub tier: Tier,
    pub deployment_name: String,
    pub service_name: String,
    pub ingress_name: String,
    pub config_name: String,
    pub autoscaler_name: String,
    pub hostname: String,
    /// Label selector shared by the deployment and the service.
    pub selector: Labels,
    /// Labels on the pod template; always a superset of `selector`.
    pub pod_labels: Labels,
    pub image_tag: Option<String>,
    cluster: String,
}

impl NameSet {
    /// Labels for namespaced objects (deployment, service, ...).
    pub fn resource_labels(&self, namespace: &str) -> Labels {
        let mut labels = Labels::new();
        labels.insert("app".into(), self.service.clone());
        labels.insert("managed-by".into(), MANAGED_BY.into());
        labels.insert("environment".into(), namespace.to_string());
        labels.insert("tier".into(), self.tier.to_string());
        labels.insert("cluster".into(), self.cluster.clone());
        if let Some(tag) = &self.image_tag {
            labels.insert("version".into(), tag.clone());
        }
        labels
    }

    /// Labels for the namespace object itself.
    pub fn namespace_labels(&self, namespace: &str) -> Labels {
        let mut labels = Labels::new();
        labels.insert("name".into(), namespace.to_string());
        labels.insert("managed-by".into(), MANAGED_BY.into());
        labels.insert("app".into(), self.service.clone());
        labels.insert("tier".into(), self.tier.to_string());
        labels.insert("cluster".into(), self.cluster.clone());
        labels.insert(
            "environment".into(),
            if self.tier.is_default() { "production" } else { "rc" }.into(),
        );
        labels
    }

    /// All object names, in a fixed order.
    pub fn object_names(&self) -> [&str; 5] {
        [
            &self.deployment_name,
            &self.service_name,
            &self.ingress_name,
            &self.config_name,
            &self.autoscaler_name,
        ]
    }
}

/// Naming knobs that are not per-service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingPolicy {
    pub domain: String,
    pub cluster_label: String,
}

impl Default for NamingPolicy {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            cluster_label: DEFAULT_CLUSTER_LABEL.to_string(),
        }
    }
}

impl NamingPolicy {
    pub fn derive(
        &self,
        service: &str,
        tier: Tier,
        image_tag: Option<&str>,
    ) -> Result<NameSet, NamingError> {
        validate_name(service)?;

        let base = match tier.suffix() {
            Some(suffix) => format!("{service}-{suffix}"),
            None => service.to_string(),
        };

        let mut selector = Labels::new();
        selector.insert("app".into(), service.to_string());
        if !tier.is_default() {
            selector.insert("tier".into(), tier.to_string());
        }

        let mut pod_labels = selector.clone();
        pod_labels.insert("tier".into(), tier.to_string());
        pod_labels.insert("cluster".into(), self.cluster_label.clone());

        let names = NameSet {
            service: service.to_string(),
            tier,
            deployment_name: base.clone(),
            service_name: base.clone(),
            ingress_name: format!("{base}-ingress"),
            config_name: format!("{base}-config"),
            autoscaler_name: format!("{base}-hpa"),
            hostname: format!("{base}.{}", self.domain),
            selector,
            pod_labels,
            image_tag: image_tag.map(str::to_string),
            cluster: self.cluster_label.clone(),
        };

        for name in names.object_names() {
            validate_name(name)?;
        }
        Ok(names)
    }
}

/// Derive names with the default policy and no image tag.
pub fn derive_names(service: &str, tier: Tier) -> Result<NameSet, NamingError> {
    NamingPolicy::default().derive(service, tier, None)
}
