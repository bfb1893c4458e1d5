//! Planned stack actions and their results

use serde::{Deserialize, Serialize};

/// A planned change to one stack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Unique identifier for the action
    pub id: String,

    pub action_type: ActionType,

    pub stack_name: String,

    pub region: String,

    pub description: String,

    /// Template body to deploy (absent for no-ops)
    pub template: Option<serde_json::Value>,
}

impl Action {
    pub fn new(
        action_type: ActionType,
        stack_name: impl Into<String>,
        region: impl Into<String>,
        template: Option<serde_json::Value>,
    ) -> Self {
        let stack_name = stack_name.into();
        let region = region.into();
        Self {
            id: format!("{action_type}:{stack_name}"),
            description: format!("{action_type} stack {stack_name} in {region}"),
            action_type,
            stack_name,
            region,
            template,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Create,
    Update,
    /// Deployed template already matches
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Result of applying a plan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyResult {
    pub succeeded: Vec<ActionResult>,

    pub failed: Vec<ActionResult>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn add_success(&mut self, action_id: String, message: String) {
        self.succeeded.push(ActionResult {
            action_id,
            success: true,
            message,
            error: None,
        });
    }

    pub fn add_failure(&mut self, action_id: String, error: String) {
        self.failed.push(ActionResult {
            action_id,
            success: false,
            message: String::new(),
            error: Some(error),
        });
    }

    /// First failure message, for surfacing in stage outcomes
    pub fn first_error(&self) -> Option<&str> {
        self.failed.first().and_then(|r| r.error.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub action_id: String,

    pub success: bool,

    pub message: String,

    pub error: Option<String>,
}

/// Ordered actions for one provisioning run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Actions in apply order
    pub actions: Vec<Action>,

    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions.iter().any(|a| a.action_type != ActionType::NoOp);
        Self {
            actions,
            has_changes,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            update: self.actions_by_type(ActionType::Update).len(),
            no_change: self.actions_by_type(ActionType::NoOp).len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} unchanged",
            self.create, self.update, self.no_change
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_summary() {
        let plan = Plan::new(vec![
            Action::new(ActionType::Create, "dev-SiteCloudFrontStack-dev", "us-east-1", None),
            Action::new(ActionType::NoOp, "SitePipelineStack", "us-east-1", None),
        ]);

        assert!(plan.has_changes);
        assert_eq!(
            plan.summary().to_string(),
            "1 to create, 0 to update, 1 unchanged"
        );
    }

    #[test]
    fn test_noop_plan_has_no_changes() {
        let plan = Plan::new(vec![Action::new(ActionType::NoOp, "s", "us-east-1", None)]);
        assert!(!plan.has_changes);
        assert!(!Plan::empty().has_changes);
    }

    #[test]
    fn test_action_id() {
        let action = Action::new(ActionType::Update, "prod-Stack", "eu-west-1", None);
        assert_eq!(action.id, "update:prod-Stack");
        assert_eq!(action.description, "update stack prod-Stack in eu-west-1");
    }

    #[test]
    fn test_apply_result_first_error() {
        let mut result = ApplyResult::new();
        assert!(result.is_success());
        result.add_failure("create:a".into(), "boom".into());
        assert_eq!(result.first_error(), Some("boom"));
    }
}
