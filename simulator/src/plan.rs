use serde::{Deserialize, Serialize};
use sql_emulation::{RowValues, SqlType};
use std::fs;
use std::path::Path;

use crate::runner::ErrorClass;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Plan {
    pub(crate) interactions: Vec<Interaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Interaction {
    pub(crate) action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) expect: Option<Expectation>,
}

/// One call against the connection. Statements live in numbered slots so a
/// plan can interleave several of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum Action {
    Prepare { slot: usize, sql: String },
    Bind {
        slot: usize,
        position: usize,
        value: SimValue,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        declared: Option<SqlType>,
    },
    Execute { slot: usize },
    Fetch { slot: usize },
    FetchAll { slot: usize },
    Finish { slot: usize },
    Destroy { slot: usize },
    Do { sql: String, params: Vec<SimValue> },
    SetAutocommit { on: bool },
    Commit,
    Rollback,
    /// Drop every server session, as a server restart would.
    KillSessions,
}

/// Serializable stand-in for a parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub(crate) enum SimValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<&SimValue> for RowValues {
    fn from(value: &SimValue) -> Self {
        match value {
            SimValue::Null => RowValues::Null,
            SimValue::Int(v) => RowValues::Int(*v),
            SimValue::Float(v) => RowValues::Float(*v),
            SimValue::Text(v) => RowValues::Text(v.clone()),
            SimValue::Blob(v) => RowValues::Blob(v.clone()),
        }
    }
}

/// What a scenario step must produce, checked in both execution modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum Expectation {
    Ok,
    Error { class: ErrorClass },
    Rows { count: usize },
    Value { column: String, equals: SimValue },
}

impl Interaction {
    pub(crate) fn new(action: Action) -> Self {
        Self {
            action,
            expect: None,
        }
    }

    pub(crate) fn expecting(action: Action, expect: Expectation) -> Self {
        Self {
            action,
            expect: Some(expect),
        }
    }
}

impl Plan {
    pub(crate) fn from_json_path(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|err| format!("failed to read plan file {}: {err}", path.display()))?;
        serde_json::from_str(&content)
            .map_err(|err| format!("failed to parse plan JSON {}: {err}", path.display()))
    }

    /// Highest statement slot referenced, plus one.
    pub(crate) fn slot_count(&self) -> usize {
        self.interactions
            .iter()
            .filter_map(|interaction| interaction.action.slot())
            .max()
            .map_or(0, |slot| slot + 1)
    }
}

impl Action {
    pub(crate) fn slot(&self) -> Option<usize> {
        match self {
            Action::Prepare { slot, .. }
            | Action::Bind { slot, .. }
            | Action::Execute { slot }
            | Action::Fetch { slot }
            | Action::FetchAll { slot }
            | Action::Finish { slot }
            | Action::Destroy { slot } => Some(*slot),
            Action::Do { .. }
            | Action::SetAutocommit { .. }
            | Action::Commit
            | Action::Rollback
            | Action::KillSessions => None,
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            Action::Prepare { .. } => "prepare",
            Action::Bind { .. } => "bind",
            Action::Execute { .. } => "execute",
            Action::Fetch { .. } => "fetch",
            Action::FetchAll { .. } => "fetch_all",
            Action::Finish { .. } => "finish",
            Action::Destroy { .. } => "destroy",
            Action::Do { .. } => "do",
            Action::SetAutocommit { .. } => "set_autocommit",
            Action::Commit => "commit",
            Action::Rollback => "rollback",
            Action::KillSessions => "kill_sessions",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plans_round_trip_through_json() {
        let plan = Plan {
            interactions: vec![
                Interaction::new(Action::Prepare {
                    slot: 2,
                    sql: "SELECT 1".into(),
                }),
                Interaction::expecting(
                    Action::Bind {
                        slot: 2,
                        position: 1,
                        value: SimValue::Text("it's".into()),
                        declared: Some(SqlType::Varchar),
                    },
                    Expectation::Ok,
                ),
            ],
        };
        let json = serde_json::to_string(&plan).expect("serialize");
        let parsed: Plan = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed.interactions[1].action, plan.interactions[1].action);
        assert_eq!(parsed.slot_count(), 3);
    }
}
