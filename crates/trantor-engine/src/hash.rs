//! Spec hashes of resolved resource inputs.

use serde_json::Value;
use sha2::{Digest, Sha256};
use trantor_core::ResourceKind;

/// Hex SHA-256 over the kind's type token and the inputs' JSON text.
///
/// `serde_json` keeps object keys sorted, so equal inputs always encode to
/// the same bytes.
pub fn spec_hash(kind: ResourceKind, inputs: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.type_token().as_bytes());
    hasher.update([0u8]);
    hasher.update(inputs.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_matter() {
        let a: Value = serde_json::from_str(r#"{"b": 1, "a": [1, 2]}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": [1, 2], "b": 1}"#).unwrap();
        assert_eq!(spec_hash(ResourceKind::Vpc, &a), spec_hash(ResourceKind::Vpc, &b));
    }

    #[test]
    fn kind_and_inputs_change_hash() {
        let inputs = json!({"cidrBlock": "10.0.0.0/16"});
        let base = spec_hash(ResourceKind::Vpc, &inputs);
        assert_eq!(base.len(), 64);
        assert_ne!(base, spec_hash(ResourceKind::Subnet, &inputs));
        assert_ne!(base, spec_hash(ResourceKind::Vpc, &json!({"cidrBlock": "10.1.0.0/16"})));
    }
}
