//! IPv4 CIDR blocks.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::NetworkError;

/// An IPv4 block in CIDR notation. The address is always masked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Cidr {
    address: Ipv4Addr,
    prefix_len: u8,
}

impl Ipv4Cidr {
    pub fn new(address: Ipv4Addr, prefix_len: u8) -> Result<Self, NetworkError> {
        if prefix_len > 32 {
            return Err(NetworkError::InvalidPrefix(format!(
                "prefix length {prefix_len} exceeds 32"
            )));
        }
        Ok(Self {
            address: mask_ipv4(address, prefix_len),
            prefix_len,
        })
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Number of addresses in the block.
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix_len))
    }

    /// Last address in the block.
    pub fn last(&self) -> Ipv4Addr {
        let base = u64::from(u32::from(self.address));
        Ipv4Addr::from((base + self.size() - 1) as u32)
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        mask_ipv4(addr, self.prefix_len) == self.address
    }

    /// Whether `other` lies entirely inside this block.
    pub fn contains_block(&self, other: &Ipv4Cidr) -> bool {
        other.prefix_len >= self.prefix_len && self.contains(other.address)
    }

    pub fn overlaps(&self, other: &Ipv4Cidr) -> bool {
        self.contains_block(other) || other.contains_block(self)
    }

    /// How many `/prefix_len` blocks fit in this one.
    pub fn subnet_capacity(&self, prefix_len: u8) -> u64 {
        if prefix_len < self.prefix_len || prefix_len > 32 {
            return 0;
        }
        1u64 << (prefix_len - self.prefix_len)
    }

    /// The `index`-th `/prefix_len` block inside this one (0-based).
    pub fn subnet(&self, prefix_len: u8, index: u64) -> Result<Ipv4Cidr, NetworkError> {
        if prefix_len < self.prefix_len || prefix_len > 32 {
            return Err(NetworkError::InvalidPrefix(format!(
                "/{prefix_len} cannot be carved from {self}"
            )));
        }
        if index >= self.subnet_capacity(prefix_len) {
            return Err(NetworkError::BlockTooSmall {
                block: *self,
                subnet_len: prefix_len,
                requested: index + 1,
                available: self.subnet_capacity(prefix_len),
            });
        }
        let step = 1u64 << (32 - u32::from(prefix_len));
        let base = u64::from(u32::from(self.address));
        Ipv4Cidr::new(Ipv4Addr::from((base + index * step) as u32), prefix_len)
    }
}

fn mask_ipv4(addr: Ipv4Addr, prefix_len: u8) -> Ipv4Addr {
    let bits = u32::from(addr);
    let mask = match prefix_len {
        0 => 0,
        n if n >= 32 => u32::MAX,
        n => u32::MAX << (32 - n),
    };
    Ipv4Addr::from(bits & mask)
}

impl FromStr for Ipv4Cidr {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let Some((addr_str, prefix_str)) = s.split_once('/') else {
            return Err(NetworkError::InvalidPrefix(format!("missing '/' in CIDR: {s}")));
        };
        let address = Ipv4Addr::from_str(addr_str)
            .map_err(|_| NetworkError::InvalidAddress(addr_str.to_string()))?;
        let prefix_len = prefix_str
            .parse::<u8>()
            .map_err(|_| NetworkError::InvalidPrefix(prefix_str.to_string()))?;
        Self::new(address, prefix_len)
    }
}

impl TryFrom<String> for Ipv4Cidr {
    type Error = NetworkError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Ipv4Cidr> for String {
    fn from(c: Ipv4Cidr) -> Self {
        c.to_string()
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cidr(s: &str) -> Ipv4Cidr {
        s.parse().unwrap()
    }

    #[test]
    fn parse_masks_host_bits() {
        let c = cidr("10.0.7.9/16");
        assert_eq!(c.to_string(), "10.0.0.0/16");
        assert_eq!(c.size(), 65536);
        assert_eq!(c.last(), Ipv4Addr::new(10, 0, 255, 255));
    }

    #[test]
    fn parse_errors() {
        assert!(matches!("10.0.0.0".parse::<Ipv4Cidr>(), Err(NetworkError::InvalidPrefix(_))));
        assert!(matches!("10.0.0/16".parse::<Ipv4Cidr>(), Err(NetworkError::InvalidAddress(_))));
        assert!(matches!("10.0.0.0/33".parse::<Ipv4Cidr>(), Err(NetworkError::InvalidPrefix(_))));
    }

    #[test]
    fn containment_and_overlap() {
        let vpc = cidr("10.0.0.0/16");
        assert!(vpc.contains(Ipv4Addr::new(10, 0, 200, 1)));
        assert!(!vpc.contains(Ipv4Addr::new(10, 1, 0, 1)));
        assert!(vpc.contains_block(&cidr("10.0.3.0/24")));
        assert!(!cidr("10.0.3.0/24").contains_block(&vpc));
        assert!(vpc.overlaps(&cidr("10.0.0.0/8")));
        assert!(!vpc.overlaps(&cidr("10.1.0.0/16")));
    }

    #[test]
    fn subnet_carving() {
        let vpc = cidr("10.0.0.0/16");
        assert_eq!(vpc.subnet_capacity(24), 256);
        assert_eq!(vpc.subnet(24, 1).unwrap(), cidr("10.0.1.0/24"));
        assert_eq!(vpc.subnet(24, 2).unwrap(), cidr("10.0.2.0/24"));
        assert_eq!(vpc.subnet(20, 3).unwrap(), cidr("10.0.48.0/20"));
        assert!(matches!(vpc.subnet(24, 256), Err(NetworkError::BlockTooSmall { .. })));
        assert!(vpc.subnet(8, 0).is_err());
    }
}
