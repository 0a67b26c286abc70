use serde::{Deserialize, Serialize};

/// Progress of one governed invocation.
///
/// ```text
/// Received → AuthorizationChecked → ApprovalChecked → SecretGovernanceChecked
///          → DecisionRecorded → Executed → ExecutionRecorded
/// ```
///
/// Any of the three checks may end in `Denied` instead; the decision is still
/// recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStage {
    Received,
    AuthorizationChecked,
    ApprovalChecked,
    SecretGovernanceChecked,
    DecisionRecorded,
    Executed,
    ExecutionRecorded,
    Denied,
}

impl InvocationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationStage::Received => "received",
            InvocationStage::AuthorizationChecked => "authorization_checked",
            InvocationStage::ApprovalChecked => "approval_checked",
            InvocationStage::SecretGovernanceChecked => "secret_governance_checked",
            InvocationStage::DecisionRecorded => "decision_recorded",
            InvocationStage::Executed => "executed",
            InvocationStage::ExecutionRecorded => "execution_recorded",
            InvocationStage::Denied => "denied",
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InvocationStage::ExecutionRecorded | InvocationStage::Denied
        )
    }
}

impl std::fmt::Display for InvocationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
