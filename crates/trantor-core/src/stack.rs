//! Fully-qualified stack names (`[org/]project/stack`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid stack name '{0}': expected [org/]project/stack")]
pub struct StackNameError(pub String);

/// Identifier of one independently-applied provisioning run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StackName {
    org: Option<String>,
    project: String,
    stack: String,
}

impl StackName {
    pub fn new(project: &str, stack: &str) -> Result<Self, StackNameError> {
        format!("{project}/{stack}").parse()
    }

    pub fn org(&self) -> Option<&str> {
        self.org.as_deref()
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }
}

fn valid_segment(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl FromStr for StackName {
    type Err = StackNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        if !parts.iter().all(|p| valid_segment(p)) {
            return Err(StackNameError(s.to_string()));
        }
        match parts.as_slice() {
            [project, stack] => Ok(Self {
                org: None,
                project: project.to_string(),
                stack: stack.to_string(),
            }),
            [org, project, stack] => Ok(Self {
                org: Some(org.to_string()),
                project: project.to_string(),
                stack: stack.to_string(),
            }),
            _ => Err(StackNameError(s.to_string())),
        }
    }
}

impl TryFrom<String> for StackName {
    type Error = StackNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StackName> for String {
    fn from(name: StackName) -> Self {
        name.to_string()
    }
}

impl fmt::Display for StackName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.org {
            Some(org) => write!(f, "{org}/{}/{}", self.project, self.stack),
            None => write!(f, "{}/{}", self.project, self.stack),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_with_org() {
        let name: StackName = "ry111/foundation/day".parse().unwrap();
        assert_eq!(name.org(), Some("ry111"));
        assert_eq!(name.project(), "foundation");
        assert_eq!(name.stack(), "day");
        assert_eq!(name.to_string(), "ry111/foundation/day");
    }

    #[test]
    fn parse_without_org() {
        let name: StackName = "foundation/day".parse().unwrap();
        assert_eq!(name.org(), None);
        assert_eq!(name.to_string(), "foundation/day");
    }

    #[test]
    fn rejects_malformed() {
        assert!("day".parse::<StackName>().is_err());
        assert!("a/b/c/d".parse::<StackName>().is_err());
        assert!("a//c".parse::<StackName>().is_err());
        assert!("a/b c".parse::<StackName>().is_err());
    }

    #[test]
    fn serde_as_string() {
        let name: StackName = "org/proj/dev".parse().unwrap();
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"org/proj/dev\"");
        let back: StackName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, name);
    }
}
