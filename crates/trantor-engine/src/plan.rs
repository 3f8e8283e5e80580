//! What a run would do, per resource.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use trantor_core::ResourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanAction {
    Create,
    Update,
    /// The recorded resource has a different kind: delete it, then create.
    Replace,
    Same,
    Delete,
}

impl PlanAction {
    /// Marker shown in front of a plan line.
    pub fn symbol(&self) -> char {
        match self {
            PlanAction::Create => '+',
            PlanAction::Update => '~',
            PlanAction::Replace => '!',
            PlanAction::Same => ' ',
            PlanAction::Delete => '-',
        }
    }
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlanAction::Create => "create",
            PlanAction::Update => "update",
            PlanAction::Replace => "replace",
            PlanAction::Same => "same",
            PlanAction::Delete => "delete",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanStep {
    pub name: String,
    pub kind: ResourceKind,
    pub action: PlanAction,
    /// Resolved inputs; parts not known before apply read `<computed>`.
    pub inputs: Value,
    pub unknown: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub stack: String,
    /// Declared resources in apply order, then deletions.
    pub steps: Vec<PlanStep>,
    pub outputs: BTreeMap<String, Value>,
}

impl Plan {
    pub fn step(&self, name: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn count(&self, action: PlanAction) -> usize {
        self.steps.iter().filter(|s| s.action == action).count()
    }

    pub fn has_changes(&self) -> bool {
        self.steps.iter().any(|s| s.action != PlanAction::Same)
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} to create, {} to update, {} to delete, {} unchanged",
            self.count(PlanAction::Create),
            self.count(PlanAction::Update),
            self.count(PlanAction::Delete),
            self.count(PlanAction::Same),
        );
        let replaced = self.count(PlanAction::Replace);
        if replaced > 0 {
            summary.push_str(&format!(", {replaced} to replace"));
        }
        summary
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Stack {}", self.stack)?;
        for step in &self.steps {
            writeln!(
                f,
                "  {} {:<48} {}",
                step.action.symbol(),
                step.name,
                step.kind.type_token()
            )?;
        }
        if !self.outputs.is_empty() {
            writeln!(f, "Outputs:")?;
            for (name, value) in &self.outputs {
                match value {
                    Value::String(s) if s.contains('\n') => writeln!(f, "  {name}: [multi-line]")?,
                    Value::String(s) => writeln!(f, "  {name}: {s}")?,
                    other => writeln!(f, "  {name}: {other}")?,
                }
            }
        }
        write!(f, "{}", self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(name: &str, action: PlanAction) -> PlanStep {
        PlanStep {
            name: name.to_string(),
            kind: ResourceKind::Namespace,
            action,
            inputs: json!({}),
            unknown: false,
        }
    }

    #[test]
    fn summary_and_text() {
        let plan = Plan {
            stack: "foundation/day-app".to_string(),
            steps: vec![
                step("production-namespace", PlanAction::Same),
                step("day-deployment", PlanAction::Update),
                step("day-old-ingress", PlanAction::Delete),
            ],
            outputs: BTreeMap::from([("namespace".to_string(), json!("production"))]),
        };
        assert!(plan.has_changes());
        assert_eq!(plan.summary(), "0 to create, 1 to update, 1 to delete, 1 unchanged");
        let text = plan.to_string();
        assert!(text.contains("~ day-deployment"));
        assert!(text.contains("- day-old-ingress"));
        assert!(text.contains("namespace: production"));
    }

    #[test]
    fn replacements_are_summarized_when_present() {
        let plan = Plan {
            stack: "foundation/day-app".to_string(),
            steps: vec![step("day-config", PlanAction::Replace)],
            outputs: BTreeMap::new(),
        };
        assert!(plan.has_changes());
        assert_eq!(
            plan.summary(),
            "0 to create, 0 to update, 0 to delete, 0 unchanged, 1 to replace"
        );
        assert!(plan.to_string().contains("! day-config"));
    }

    #[test]
    fn actions_serialize_lowercase() {
        let value = serde_json::to_value(step("x", PlanAction::Create)).unwrap();
        assert_eq!(value["action"], "create");
        assert_eq!(value["kind"], "namespace");
    }
}
