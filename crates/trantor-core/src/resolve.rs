//! Second-phase evaluation: turn property values into plain JSON.
//!
//! References to resources that are not realized yet resolve to the
//! [`UNKNOWN`] placeholder and mark the result as unknown, so a plan can be
//! shown before anything exists. Once every dependency is realized the same
//! call yields the final inputs.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::graph::{PropertyValue, StackOutputRef};

/// Placeholder for values that only exist after apply.
pub const UNKNOWN: &str = "<computed>";

/// Attributes reported by a provider for a realized resource.
pub type Attributes = BTreeMap<String, Value>;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("resource '{resource}' has no output '{attribute}'")]
    MissingAttribute { resource: String, attribute: String },

    #[error("cross-stack output {0} was not resolved")]
    UnresolvedStackOutput(String),

    #[error("cannot interpolate a {0} into a string")]
    NonScalarInterpolation(&'static str),

    #[error("failed to encode JSON document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Source of realized values.
pub trait OutputLookup {
    /// Attributes of a realized resource, `None` while it is not realized.
    fn resource_outputs(&self, resource: &str) -> Option<&Attributes>;

    /// A cross-stack output fetched before evaluation started.
    fn stack_output(&self, reference: &StackOutputRef) -> Option<&Value>;
}

/// Result of resolving one value.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub value: Value,
    /// True when some part depends on a not-yet-realized resource.
    pub unknown: bool,
}

impl Resolved {
    fn known(value: Value) -> Self {
        Self {
            value,
            unknown: false,
        }
    }

    fn unknown() -> Self {
        Self {
            value: Value::String(UNKNOWN.to_string()),
            unknown: true,
        }
    }
}

pub fn resolve(value: &PropertyValue, lookup: &dyn OutputLookup) -> Result<Resolved, ResolveError> {
    match value {
        PropertyValue::Null => Ok(Resolved::known(Value::Null)),
        PropertyValue::Bool(b) => Ok(Resolved::known(Value::Bool(*b))),
        PropertyValue::Int(i) => Ok(Resolved::known(Value::from(*i))),
        PropertyValue::Float(f) => Ok(Resolved::known(Value::from(*f))),
        PropertyValue::String(s) => Ok(Resolved::known(Value::String(s.clone()))),
        PropertyValue::List(items) => {
            let mut unknown = false;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let r = resolve(item, lookup)?;
                unknown |= r.unknown;
                out.push(r.value);
            }
            Ok(Resolved {
                value: Value::Array(out),
                unknown,
            })
        }
        PropertyValue::Map(map) => resolve_map(map, lookup),
        PropertyValue::Output(r) => {
            let Some(attrs) = lookup.resource_outputs(&r.resource) else {
                return Ok(Resolved::unknown());
            };
            match (attrs.get(&r.attribute), &r.fallback) {
                (Some(v), _) if !v.is_null() => Ok(Resolved::known(v.clone())),
                (_, Some(fallback)) => Ok(Resolved::known(Value::String(fallback.clone()))),
                _ => Err(ResolveError::MissingAttribute {
                    resource: r.resource.clone(),
                    attribute: r.attribute.clone(),
                }),
            }
        }
        PropertyValue::StackOutput(r) => lookup
            .stack_output(r)
            .map(|v| Resolved::known(v.clone()))
            .ok_or_else(|| ResolveError::UnresolvedStackOutput(r.to_string())),
        PropertyValue::Concat(parts) => {
            let mut out = String::new();
            let mut unknown = false;
            for part in parts {
                let r = resolve(part, lookup)?;
                if r.unknown {
                    unknown = true;
                    continue;
                }
                match r.value {
                    Value::String(s) => out.push_str(&s),
                    Value::Number(n) => out.push_str(&n.to_string()),
                    Value::Bool(b) => out.push_str(&b.to_string()),
                    Value::Null => {}
                    Value::Array(_) => return Err(ResolveError::NonScalarInterpolation("list")),
                    Value::Object(_) => return Err(ResolveError::NonScalarInterpolation("map")),
                }
            }
            if unknown {
                Ok(Resolved::unknown())
            } else {
                Ok(Resolved::known(Value::String(out)))
            }
        }
        PropertyValue::Json(inner) => {
            let r = resolve(inner, lookup)?;
            if r.unknown {
                return Ok(Resolved::unknown());
            }
            Ok(Resolved::known(Value::String(serde_json::to_string(&r.value)?)))
        }
        PropertyValue::TrimPrefix(inner, prefix) => {
            let r = resolve(inner, lookup)?;
            if r.unknown {
                return Ok(Resolved::unknown());
            }
            match r.value {
                Value::String(s) => {
                    let trimmed = s.strip_prefix(prefix.as_str()).unwrap_or(&s);
                    Ok(Resolved::known(Value::String(trimmed.to_string())))
                }
                Value::Array(_) => Err(ResolveError::NonScalarInterpolation("list")),
                Value::Object(_) => Err(ResolveError::NonScalarInterpolation("map")),
                other => Ok(Resolved::known(other)),
            }
        }
    }
}

pub fn resolve_map(
    map: &BTreeMap<String, PropertyValue>,
    lookup: &dyn OutputLookup,
) -> Result<Resolved, ResolveError> {
    let mut unknown = false;
    let mut out = serde_json::Map::new();
    for (k, v) in map {
        let r = resolve(v, lookup)?;
        unknown |= r.unknown;
        out.insert(k.clone(), r.value);
    }
    Ok(Resolved {
        value: Value::Object(out),
        unknown,
    })
}
