pub mod config;
pub mod graph;
pub mod naming;
pub mod resolve;
pub mod stack;
pub mod stack_file;

pub use config::{Config, ConfigError, ConfigResult, ConfigValue, Overrides};
pub use graph::{
    GraphError, OutputRef, PropertyValue, Resource, ResourceHandle, ResourceKind, StackGraph,
    StackOutputRef,
};
pub use naming::{NameSet, NamingPolicy, Tier};
pub use resolve::{Attributes, OutputLookup, Resolved, UNKNOWN};
pub use stack::StackName;
pub use stack_file::{Program, StackFile};
