use serde::Serialize;
use trantor_core::Config;
use trantor_network::{Ipv4Cidr, NetworkSpec};

use crate::{ClusterError, ClusterResult};

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_NAME_PREFIX: &str = "dawn";
pub const DEFAULT_VPC_CIDR: &str = "10.0.0.0/16";
pub const DEFAULT_INSTANCE_TYPE: &str = "t3.small";
pub const DEFAULT_SPOT_PRICE: &str = "0.0104";

/// How worker nodes are purchased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Capacity {
    OnDemand,
    Spot { max_price: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterSpec {
    pub name: String,
    pub instance_type: String,
    pub min_size: u32,
    pub desired_size: u32,
    pub max_size: u32,
    pub capacity: Capacity,
    pub public_node_ips: bool,
    pub create_oidc_provider: bool,
}

impl ClusterSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instance_type: DEFAULT_INSTANCE_TYPE.to_string(),
            min_size: 1,
            desired_size: 2,
            max_size: 3,
            capacity: Capacity::Spot {
                max_price: DEFAULT_SPOT_PRICE.to_string(),
            },
            public_node_ips: true,
            create_oidc_provider: true,
        }
    }

    pub fn validate(&self) -> ClusterResult<()> {
        if self.min_size < 1 || self.min_size > self.desired_size || self.desired_size > self.max_size
        {
            return Err(ClusterError::InvalidNodeCounts {
                min: self.min_size,
                desired: self.desired_size,
                max: self.max_size,
            });
        }
        if !self.create_oidc_provider {
            return Err(ClusterError::OidcRequired);
        }
        if let Capacity::Spot { max_price } = &self.capacity {
            if max_price.parse::<f64>().map_or(true, |p| p <= 0.0) {
                return Err(ClusterError::InvalidSpotPrice(max_price.clone()));
            }
        }
        Ok(())
    }
}

/// Everything the cluster stack is built from.
#[derive(Debug, Clone)]
pub struct ClusterStackSpec {
    pub region: String,
    pub name_prefix: String,
    pub network: NetworkSpec,
    pub cluster: ClusterSpec,
}

impl ClusterStackSpec {
    pub fn from_config(cfg: &Config) -> ClusterResult<Self> {
        let region = cfg.str_or("aws:region", DEFAULT_REGION);
        let name_prefix = cfg.str_or("name_prefix", DEFAULT_NAME_PREFIX);

        let cidr = parse_cidr(cfg, "vpc_cidr", &cfg.str_or("vpc_cidr", DEFAULT_VPC_CIDR))?;
        let mut network = NetworkSpec::new(&name_prefix, cidr, &region);
        network.subnet_count = cfg.get_or("subnet_count", network.subnet_count)?;
        network.reserved = cfg
            .list_or_empty("network_reserved_cidrs")
            .iter()
            .map(|c| parse_cidr(cfg, "network_reserved_cidrs", c))
            .collect::<ClusterResult<_>>()?;

        let mut cluster = ClusterSpec::new(format!("{name_prefix}-cluster"));
        cluster.instance_type = cfg.str_or("node_instance_type", DEFAULT_INSTANCE_TYPE);
        cluster.min_size = cfg.get_or("node_min", cluster.min_size)?;
        cluster.desired_size = cfg.get_or("node_desired", cluster.desired_size)?;
        cluster.max_size = cfg.get_or("node_max", cluster.max_size)?;
        cluster.public_node_ips = cfg.bool_or("node_public_ip", true)?;
        cluster.capacity = if cfg.bool_or("use_spot", true)? {
            Capacity::Spot {
                max_price: cfg.str_or("spot_price", DEFAULT_SPOT_PRICE),
            }
        } else {
            Capacity::OnDemand
        };
        cluster.validate()?;

        Ok(Self {
            region,
            name_prefix,
            network,
            cluster,
        })
    }

    /// `Service` tag value: the name prefix, capitalized.
    pub fn service_tag(&self) -> String {
        let mut chars = self.name_prefix.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

fn parse_cidr(cfg: &Config, key: &str, value: &str) -> ClusterResult<Ipv4Cidr> {
    value.parse().map_err(|e: trantor_network::NetworkError| {
        ClusterError::Config(trantor_core::ConfigError::Invalid {
            key: cfg.full_key(key),
            reason: e.to_string(),
        })
    })
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
        let spec = ClusterStackSpec::from_config(&cfg(&[])).unwrap();
        assert_eq!(spec.region, "us-east-1");
        assert_eq!(spec.network.cidr.to_string(), "10.0.0.0/16");
        assert_eq!(spec.network.subnet_count, 2);
        assert_eq!(spec.cluster.name, "dawn-cluster");
        assert_eq!(spec.cluster.instance_type, "t3.small");
        assert_eq!(
            (spec.cluster.min_size, spec.cluster.desired_size, spec.cluster.max_size),
            (1, 2, 3)
        );
        assert_eq!(
            spec.cluster.capacity,
            Capacity::Spot {
                max_price: "0.0104".into()
            }
        );
        assert_eq!(spec.service_tag(), "Dawn");
    }

    #[test]
    fn overrides_from_config() {
        let spec = ClusterStackSpec::from_config(&cfg(&[
            ("aws:region", "eu-west-1".into()),
            ("name_prefix", "dusk".into()),
            ("vpc_cidr", "10.20.0.0/16".into()),
            ("subnet_count", ConfigValue::Int(3)),
            ("use_spot", false.into()),
            ("node_max", "5".into()),
        ]))
        .unwrap();
        assert_eq!(spec.network.availability_zone(3), "eu-west-1c");
        assert_eq!(spec.network.subnet_count, 3);
        assert_eq!(spec.cluster.name, "dusk-cluster");
        assert_eq!(spec.cluster.capacity, Capacity::OnDemand);
        assert_eq!(spec.cluster.max_size, 5);
    }

    #[test]
    fn node_counts_are_ordered() {
        let err = ClusterStackSpec::from_config(&cfg(&[("node_desired", ConfigValue::Int(4))]))
            .unwrap_err();
        assert!(matches!(
            err,
            ClusterError::InvalidNodeCounts {
                min: 1,
                desired: 4,
                max: 3
            }
        ));

        let mut spec = ClusterSpec::new("c");
        spec.min_size = 0;
        spec.desired_size = 0;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn invalid_cidr_is_a_config_error() {
        let err = ClusterStackSpec::from_config(&cfg(&[("vpc_cidr", "10.0.0.0".into())]))
            .unwrap_err();
        assert!(matches!(
            err,
            ClusterError::Config(ConfigError::Invalid { ref key, .. }) if key == "foundation:vpc_cidr"
        ));
    }

    #[test]
    fn bad_spot_price() {
        let mut spec = ClusterSpec::new("c");
        spec.capacity = Capacity::Spot {
            max_price: "cheap".into(),
        };
        assert!(matches!(spec.validate(), Err(ClusterError::InvalidSpotPrice(_))));
    }
}
