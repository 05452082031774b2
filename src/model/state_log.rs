//! State log records and their associated entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::ValidationIssue;

use super::flow::{Flow, State};

/// Which class of entity a state log tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityClass {
    Payment,
    Employee,
    ReferenceFile,
}

impl EntityClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityClass::Payment => "payment",
            EntityClass::Employee => "employee",
            EntityClass::ReferenceFile => "reference_file",
        }
    }
}

/// The entity a state log is associated with.
///
/// Exactly one of payment / employee / reference file - the sum type makes
/// the mutual-exclusivity invariant unrepresentable rather than relying on
/// three nullable columns staying consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateLogEntity {
    Payment(Uuid),
    Employee(Uuid),
    ReferenceFile(Uuid),
}

impl StateLogEntity {
    pub fn class(&self) -> EntityClass {
        match self {
            StateLogEntity::Payment(_) => EntityClass::Payment,
            StateLogEntity::Employee(_) => EntityClass::Employee,
            StateLogEntity::ReferenceFile(_) => EntityClass::ReferenceFile,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            StateLogEntity::Payment(id)
            | StateLogEntity::Employee(id)
            | StateLogEntity::ReferenceFile(id) => *id,
        }
    }
}

/// Structured result of a transition: a message plus any validation issues
/// collected while processing the record. Serialized as JSON on the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_issues: Vec<ValidationIssue>,
}

impl Outcome {
    pub fn message(message: impl Into<String>) -> Outcome {
        Outcome {
            message: message.into(),
            validation_issues: Vec::new(),
        }
    }

    pub fn with_issues(message: impl Into<String>, issues: Vec<ValidationIssue>) -> Outcome {
        Outcome {
            message: message.into(),
            validation_issues: issues,
        }
    }
}

/// One historical transition record for one entity within one flow.
///
/// `prev_state_log_id` forms a linked history chain per (entity, flow);
/// the chain is a single linear history ending at the current head, which
/// the `latest_state_log` table points at.
#[derive(Debug, Clone)]
pub struct StateLog {
    pub state_log_id: i64,
    pub flow: Flow,
    /// The previous head's end state. `None` means genesis.
    pub start_state: Option<State>,
    /// `None` means still in-flight / unresolved.
    pub end_state: Option<State>,
    pub outcome: Option<Outcome>,
    /// `None` only occurs for cleanup flows; pipeline code must go through
    /// [`StateLog::require_entity`].
    pub entity: Option<StateLogEntity>,
    pub prev_state_log_id: Option<i64>,
    pub import_log_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// An unassociated state log turned up where an entity was required.
#[derive(Debug, Clone, thiserror::Error)]
#[error("state log {state_log_id} has no associated entity")]
pub struct MissingEntity {
    pub state_log_id: i64,
}

impl StateLog {
    /// The associated entity.
    ///
    /// Unassociated state logs are a recognized-but-invalid edge case; any
    /// step that expected an entity treats the error as fatal for that
    /// record rather than silently skipping it.
    pub fn require_entity(&self) -> Result<StateLogEntity, MissingEntity> {
        self.entity.ok_or(MissingEntity {
            state_log_id: self.state_log_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(entity: Option<StateLogEntity>) -> StateLog {
        StateLog {
            state_log_id: 7,
            flow: Flow::DelegatedPayment,
            start_state: None,
            end_state: Some(State::PaymentValidated),
            outcome: None,
            entity,
            prev_state_log_id: None,
            import_log_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_require_entity_rejects_unassociated_logs() {
        let payment = StateLogEntity::Payment(Uuid::new_v4());
        assert_eq!(log(Some(payment)).require_entity().unwrap(), payment);
        let err = log(None).require_entity().unwrap_err();
        assert_eq!(err.state_log_id, 7);
    }
}
