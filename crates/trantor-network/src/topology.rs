use tracing::{debug, info};
use trantor_core::graph::{Resource, ResourceHandle, ResourceKind, StackGraph};
use trantor_core::naming::{Labels, MANAGED_BY};
use trantor_core::{PropertyValue, StackName};

use crate::{Ipv4Cidr, NetworkError};

pub const DEFAULT_SUBNET_PREFIX_LEN: u8 = 24;
pub const DEFAULT_SUBNET_COUNT: u32 = 2;
const ELB_ROLE_TAG: &str = "kubernetes.io/role/elb";

/// Tags carried by every cloud resource of a stack.
pub fn common_tags(stack: &StackName, service: &str) -> Labels {
    let mut tags = Labels::new();
    tags.insert("Project".into(), stack.project().to_string());
    tags.insert("Stack".into(), stack.stack().to_string());
    tags.insert("ManagedBy".into(), MANAGED_BY.to_string());
    tags.insert("Service".into(), service.to_string());
    tags
}

/// Requested network layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSpec {
    /// Prefix of every resource name (`dawn` gives `dawn-vpc`).
    pub name_prefix: String,
    pub cidr: Ipv4Cidr,
    pub subnet_prefix_len: u8,
    pub subnet_count: u32,
    pub region: String,
    /// Blocks the VPC must not overlap (peered networks, on-prem ranges).
    pub reserved: Vec<Ipv4Cidr>,
    pub tags: Labels,
}

/// One derived public subnet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetPlan {
    /// 1-based.
    pub index: u32,
    pub cidr: Ipv4Cidr,
    pub availability_zone: String,
}

impl NetworkSpec {
    pub fn new(name_prefix: impl Into<String>, cidr: Ipv4Cidr, region: impl Into<String>) -> Self {
        Self {
            name_prefix: name_prefix.into(),
            cidr,
            subnet_prefix_len: DEFAULT_SUBNET_PREFIX_LEN,
            subnet_count: DEFAULT_SUBNET_COUNT,
            region: region.into(),
            reserved: Vec::new(),
            tags: Labels::new(),
        }
    }

    /// Availability zone for subnet `index`: `{region}a`, `{region}b`, ...
    pub fn availability_zone(&self, index: u32) -> String {
        let letter = (b'a' + ((index.saturating_sub(1)) % 26) as u8) as char;
        format!("{}{letter}", self.region)
    }

    /// Derive the subnet plan without the cross-checks of [`validate`](Self::validate).
    pub fn subnets(&self) -> Result<Vec<SubnetPlan>, NetworkError> {
        (1..=self.subnet_count)
            .map(|index| {
                Ok(SubnetPlan {
                    index,
                    cidr: self.cidr.subnet(self.subnet_prefix_len, u64::from(index))?,
                    availability_zone: self.availability_zone(index),
                })
            })
            .collect()
    }

    /// Pre-flight checks, run before anything is submitted.
    pub fn validate(&self) -> Result<Vec<SubnetPlan>, NetworkError> {
        if self.subnet_count < 2 {
            return Err(NetworkError::TooFewSubnets(self.subnet_count));
        }
        if self.subnet_prefix_len <= self.cidr.prefix_len() || self.subnet_prefix_len > 32 {
            return Err(NetworkError::SubnetPrefixTooShort {
                block: self.cidr,
                subnet_len: self.subnet_prefix_len,
            });
        }
        // Index 0 stays unused, so one slot is lost.
        let available = self.cidr.subnet_capacity(self.subnet_prefix_len) - 1;
        if u64::from(self.subnet_count) > available {
            return Err(NetworkError::BlockTooSmall {
                block: self.cidr,
                subnet_len: self.subnet_prefix_len,
                requested: u64::from(self.subnet_count),
                available,
            });
        }
        for reserved in &self.reserved {
            if self.cidr.overlaps(reserved) {
                return Err(NetworkError::ReservedOverlap {
                    block: self.cidr,
                    reserved: *reserved,
                });
            }
        }

        let plan = self.subnets()?;
        for (i, a) in plan.iter().enumerate() {
            if !self.cidr.contains_block(&a.cidr) {
                return Err(NetworkError::SubnetOutsideBlock {
                    subnet: a.cidr,
                    block: self.cidr,
                });
            }
            for b in &plan[i + 1..] {
                if a.cidr.overlaps(&b.cidr) {
                    return Err(NetworkError::SubnetOverlap(a.cidr, b.cidr));
                }
                if a.availability_zone == b.availability_zone {
                    return Err(NetworkError::DuplicateZone(a.availability_zone.clone()));
                }
            }
        }
        Ok(plan)
    }

    fn name(&self, suffix: &str) -> String {
        format!("{}-{suffix}", self.name_prefix)
    }

    fn tags_named(&self, name: &str, stack: &StackName) -> Labels {
        let mut tags = self.tags.clone();
        tags.insert("Name".into(), format!("{name}-{}", stack.stack()));
        tags
    }
}

/// Handles to the declared network resources.
#[derive(Debug, Clone)]
pub struct NetworkHandles {
    pub vpc: ResourceHandle,
    pub internet_gateway: ResourceHandle,
    pub subnets: Vec<ResourceHandle>,
    pub route_table: ResourceHandle,
    pub plan: Vec<SubnetPlan>,
}

impl NetworkHandles {
    /// `[subnet.id, ...]`, in subnet order.
    pub fn subnet_ids(&self) -> PropertyValue {
        PropertyValue::List(self.subnets.iter().map(|s| s.output("id")).collect())
    }
}

/// Validate `spec` and declare its resources.
pub fn declare_network(
    graph: &mut StackGraph,
    spec: &NetworkSpec,
) -> Result<NetworkHandles, NetworkError> {
    let plan = spec.validate()?;
    let stack = graph.stack().clone();

    let vpc_name = spec.name("vpc");
    let vpc = graph.add(
        Resource::new(ResourceKind::Vpc, &vpc_name)
            .with("cidrBlock", spec.cidr.to_string())
            .with("enableDnsHostnames", true)
            .with("enableDnsSupport", true)
            .with("tags", spec.tags_named(&vpc_name, &stack)),
    )?;

    let igw_name = spec.name("igw");
    let internet_gateway = graph.add(
        Resource::new(ResourceKind::InternetGateway, &igw_name)
            .with("vpcId", vpc.output("id"))
            .with("tags", spec.tags_named(&igw_name, &stack)),
    )?;

    let mut subnets = Vec::with_capacity(plan.len());
    for subnet in &plan {
        let name = spec.name(&format!("public-subnet-{}", subnet.index));
        let mut tags = spec.tags_named(&name, &stack);
        tags.insert(ELB_ROLE_TAG.into(), "1".into());
        debug!(subnet = %name, cidr = %subnet.cidr, zone = %subnet.availability_zone, "declaring subnet");
        subnets.push(
            graph.add(
                Resource::new(ResourceKind::Subnet, &name)
                    .with("vpcId", vpc.output("id"))
                    .with("cidrBlock", subnet.cidr.to_string())
                    .with("availabilityZone", &subnet.availability_zone)
                    .with("mapPublicIpOnLaunch", true)
                    .with("tags", tags),
            )?,
        );
    }

    let rt_name = spec.name("public-rt");
    let route_table = graph.add(
        Resource::new(ResourceKind::RouteTable, &rt_name)
            .with("vpcId", vpc.output("id"))
            .with(
                "routes",
                PropertyValue::List(vec![PropertyValue::map([
                    ("cidrBlock", PropertyValue::from("0.0.0.0/0")),
                    ("gatewayId", internet_gateway.output("id")),
                ])]),
            )
            .with("tags", spec.tags_named(&rt_name, &stack)),
    )?;

    for (subnet, handle) in plan.iter().zip(&subnets) {
        graph.add(
            Resource::new(
                ResourceKind::RouteTableAssociation,
                spec.name(&format!("public-rt-assoc-{}", subnet.index)),
            )
            .with("subnetId", handle.output("id"))
            .with("routeTableId", route_table.output("id")),
        )?;
    }

    info!(vpc = %vpc_name, cidr = %spec.cidr, subnets = plan.len(), "network declared");
    Ok(NetworkHandles {
        vpc,
        internet_gateway,
        subnets,
        route_table,
        plan,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(cidr: &str) -> NetworkSpec {
        NetworkSpec::new("dawn", cidr.parse().unwrap(), "us-east-1")
    }

    #[test]
    fn default_layout_matches_segment_substitution() {
        let plan = spec("10.0.0.0/16").validate().unwrap();
        let cidrs: Vec<String> = plan.iter().map(|s| s.cidr.to_string()).collect();
        assert_eq!(cidrs, vec!["10.0.1.0/24", "10.0.2.0/24"]);
        assert_eq!(plan[0].availability_zone, "us-east-1a");
        assert_eq!(plan[1].availability_zone, "us-east-1b");
    }

    #[test]
    fn derived_subnets_are_disjoint_subsets() {
        for (block, len, count) in [
            ("10.0.0.0/16", 24, 6),
            ("172.16.0.0/12", 20, 4),
            ("192.168.0.0/24", 26, 3),
        ] {
            let mut s = spec(block);
            s.subnet_prefix_len = len;
            s.subnet_count = count;
            let plan = s.validate().unwrap();
            assert_eq!(plan.len(), count as usize);
            for (i, a) in plan.iter().enumerate() {
                assert!(s.cidr.contains_block(&a.cidr));
                for b in &plan[i + 1..] {
                    assert!(!a.cidr.overlaps(&b.cidr), "{} overlaps {}", a.cidr, b.cidr);
                }
            }
        }
    }

    #[test]
    fn too_few_subnets() {
        let mut s = spec("10.0.0.0/16");
        s.subnet_count = 1;
        assert!(matches!(s.validate(), Err(NetworkError::TooFewSubnets(1))));
    }

    #[test]
    fn prefix_must_be_longer_than_block() {
        let mut s = spec("10.0.0.0/24");
        s.subnet_prefix_len = 24;
        assert!(matches!(
            s.validate(),
            Err(NetworkError::SubnetPrefixTooShort { subnet_len: 24, .. })
        ));
    }

    #[test]
    fn block_too_small() {
        let mut s = spec("10.0.0.0/23");
        s.subnet_count = 2;
        assert!(matches!(
            s.validate(),
            Err(NetworkError::BlockTooSmall {
                requested: 2,
                available: 1,
                ..
            })
        ));
    }

    #[test]
    fn zones_must_be_distinct() {
        let mut s = spec("10.0.0.0/16");
        s.subnet_count = 27;
        assert!(matches!(s.validate(), Err(NetworkError::DuplicateZone(ref z)) if z == "us-east-1a"));
    }

    #[test]
    fn reserved_blocks_are_rejected() {
        let mut s = spec("10.0.0.0/16");
        s.reserved = vec!["192.168.0.0/16".parse().unwrap(), "10.0.128.0/17".parse().unwrap()];
        assert!(matches!(s.validate(), Err(NetworkError::ReservedOverlap { .. })));
    }

    #[test]
    fn declares_resources_in_dependency_order() {
        let stack: StackName = "foundation/day".parse().unwrap();
        let mut graph = StackGraph::new(stack.clone());
        let mut s = spec("10.0.0.0/16");
        s.tags = common_tags(&stack, "Dawn");
        let handles = declare_network(&mut graph, &s).unwrap();

        assert_eq!(graph.len(), 7);
        assert_eq!(handles.subnets.len(), 2);

        let order: Vec<&str> = graph
            .topological_order()
            .unwrap()
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(
            order,
            vec![
                "dawn-vpc",
                "dawn-igw",
                "dawn-public-subnet-1",
                "dawn-public-subnet-2",
                "dawn-public-rt",
                "dawn-public-rt-assoc-1",
                "dawn-public-rt-assoc-2",
            ]
        );

        let subnet = graph.get("dawn-public-subnet-2").unwrap();
        let PropertyValue::Map(tags) = &subnet.properties["tags"] else {
            panic!("tags must be a map");
        };
        assert_eq!(tags["Name"], PropertyValue::from("dawn-public-subnet-2-day"));
        assert_eq!(tags["kubernetes.io/role/elb"], PropertyValue::from("1"));
        assert_eq!(tags["ManagedBy"], PropertyValue::from("trantor"));
        assert_eq!(tags["Project"], PropertyValue::from("foundation"));
    }

    #[test]
    fn invalid_spec_declares_nothing() {
        let mut graph = StackGraph::new("foundation/day".parse().unwrap());
        let mut s = spec("10.0.0.0/16");
        s.subnet_count = 0;
        assert!(declare_network(&mut graph, &s).is_err());
        assert!(graph.is_empty());
    }
}
