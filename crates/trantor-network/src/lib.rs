//! trantor-network: VPC layout for the cluster stack.
//!
//! Computes the subnet plan for a CIDR block and declares the network
//! resources (VPC, internet gateway, public subnets, route table and its
//! associations) into a [`StackGraph`](trantor_core::StackGraph).
//!
//! Subnet `i` (1-based) is the `i`-th block of the subnet prefix length
//! inside the VPC block, so with the defaults `10.0.0.0/16` yields
//! `10.0.1.0/24`, `10.0.2.0/24`, ... Index 0 is left unused.

pub mod cidr;
pub mod topology;

pub use cidr::Ipv4Cidr;
pub use topology::{NetworkHandles, NetworkSpec, SubnetPlan, common_tags, declare_network};

use thiserror::Error;
use trantor_core::graph::GraphError;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("invalid IPv4 address: {0}")]
    InvalidAddress(String),

    #[error("invalid CIDR prefix: {0}")]
    InvalidPrefix(String),

    #[error("at least 2 subnets are required, got {0}")]
    TooFewSubnets(u32),

    #[error("subnet prefix /{subnet_len} must be longer than the block prefix of {block}")]
    SubnetPrefixTooShort { block: Ipv4Cidr, subnet_len: u8 },

    #[error("{block} has room for {available} /{subnet_len} subnets, {requested} requested")]
    BlockTooSmall {
        block: Ipv4Cidr,
        subnet_len: u8,
        requested: u64,
        available: u64,
    },

    #[error("subnets {0} and {1} overlap")]
    SubnetOverlap(Ipv4Cidr, Ipv4Cidr),

    #[error("subnet {subnet} lies outside {block}")]
    SubnetOutsideBlock { subnet: Ipv4Cidr, block: Ipv4Cidr },

    #[error("availability zone {0} is used by more than one subnet")]
    DuplicateZone(String),

    #[error("{block} overlaps reserved block {reserved}")]
    ReservedOverlap { block: Ipv4Cidr, reserved: Ipv4Cidr },

    #[error(transparent)]
    Graph(#[from] GraphError),
}
