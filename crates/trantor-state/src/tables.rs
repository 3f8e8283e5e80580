//! redb table definitions.
//!
//! Values are JSON documents stored as raw bytes.

use redb::TableDefinition;

/// Stack state keyed by the full stack name (`org/project/stack`).
pub const STACKS: TableDefinition<&str, &[u8]> = TableDefinition::new("stacks");

/// Resource records keyed by `{stack}:{resource}`.
pub const RESOURCES: TableDefinition<&str, &[u8]> = TableDefinition::new("resources");
