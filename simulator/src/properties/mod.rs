use clap::ValueEnum;
use serde::Serialize;

use crate::plan::{Action, Expectation, Interaction, Plan, SimValue};
use crate::runner::ErrorClass;

/// Scripted scenarios with checked outcomes. Each runs on its own table
/// and in both execution modes.
#[derive(Debug, Clone, Copy, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum PropertyKind {
    ReconnectRetries,
    /// Leaves the connection down for the rest of the plan.
    NoReconnectWithoutAutocommit,
    CursorSequence,
    LargeValueRefetch,
    LimitInjection,
    QuotedValues,
}

impl PropertyKind {
    pub(crate) fn build_plan(self) -> Plan {
        let interactions = match self {
            PropertyKind::ReconnectRetries => reconnect_retries(),
            PropertyKind::NoReconnectWithoutAutocommit => no_reconnect_without_autocommit(),
            PropertyKind::CursorSequence => cursor_sequence(),
            PropertyKind::LargeValueRefetch => large_value_refetch(),
            PropertyKind::LimitInjection => limit_injection(),
            PropertyKind::QuotedValues => quoted_values(),
        };
        Plan { interactions }
    }
}

const SLOT: usize = 0;

fn run(sql: String) -> Interaction {
    Interaction::expecting(
        Action::Do {
            sql,
            params: Vec::new(),
        },
        Expectation::Ok,
    )
}

fn insert(sql: String, params: Vec<SimValue>) -> Interaction {
    Interaction::expecting(Action::Do { sql, params }, Expectation::Ok)
}

fn prepare(sql: String) -> Interaction {
    Interaction::expecting(Action::Prepare { slot: SLOT, sql }, Expectation::Ok)
}

fn bind(position: usize, value: SimValue) -> Interaction {
    Interaction::expecting(
        Action::Bind {
            slot: SLOT,
            position,
            value,
            declared: None,
        },
        Expectation::Ok,
    )
}

fn execute(expect: Expectation) -> Interaction {
    Interaction::expecting(Action::Execute { slot: SLOT }, expect)
}

fn fetch(expect: Expectation) -> Interaction {
    Interaction::expecting(Action::Fetch { slot: SLOT }, expect)
}

fn value(column: &str, equals: SimValue) -> Expectation {
    Expectation::Value {
        column: column.to_string(),
        equals,
    }
}

fn error(class: ErrorClass) -> Expectation {
    Expectation::Error { class }
}

fn destroy() -> Interaction {
    Interaction::new(Action::Destroy { slot: SLOT })
}

fn reconnect_retries() -> Vec<Interaction> {
    let table = "sim_reconnect";
    vec![
        run(format!("CREATE TABLE {table} (id INT, label VARCHAR(16))")),
        insert(
            format!("INSERT INTO {table} (id, label) VALUES (?, ?)"),
            vec![SimValue::Int(1), SimValue::Text("first".into())],
        ),
        prepare(format!("SELECT label FROM {table} WHERE id = ?")),
        bind(1, SimValue::Int(1)),
        Interaction::new(Action::KillSessions),
        execute(Expectation::Ok),
        fetch(value("label", SimValue::Text("first".into()))),
        destroy(),
    ]
}

fn no_reconnect_without_autocommit() -> Vec<Interaction> {
    let table = "sim_no_reconnect";
    vec![
        run(format!("CREATE TABLE {table} (id INT)")),
        prepare(format!("SELECT id FROM {table}")),
        Interaction::expecting(Action::SetAutocommit { on: false }, Expectation::Ok),
        Interaction::new(Action::KillSessions),
        execute(error(ErrorClass::ConnectionLost)),
        Interaction::expecting(Action::Commit, error(ErrorClass::ConnectionLost)),
        destroy(),
    ]
}

fn cursor_sequence() -> Vec<Interaction> {
    let table = "sim_cursor";
    vec![
        run(format!("CREATE TABLE {table} (id INT)")),
        insert(format!("INSERT INTO {table} (id) VALUES (?)"), vec![SimValue::Int(1)]),
        prepare(format!("SELECT id FROM {table}")),
        fetch(error(ErrorClass::Sequence)),
        execute(Expectation::Ok),
        fetch(value("id", SimValue::Int(1))),
        fetch(Expectation::Ok),
        fetch(error(ErrorClass::Sequence)),
        Interaction::expecting(Action::Finish { slot: SLOT }, Expectation::Ok),
        Interaction::expecting(Action::Finish { slot: SLOT }, error(ErrorClass::Sequence)),
        Interaction::expecting(
            Action::Bind {
                slot: SLOT,
                position: 2,
                value: SimValue::Int(1),
                declared: None,
            },
            error(ErrorClass::IllegalParam),
        ),
        destroy(),
    ]
}

fn large_value_refetch() -> Vec<Interaction> {
    let table = "sim_lob";
    let body = "lob-".repeat(150);
    let data: Vec<u8> = (0..=255u8).cycle().take(700).collect();
    vec![
        run(format!("CREATE TABLE {table} (id INT, body TEXT, data BLOB)")),
        insert(
            format!("INSERT INTO {table} (id, body, data) VALUES (?, ?, ?)"),
            vec![
                SimValue::Int(1),
                SimValue::Text(body.clone()),
                SimValue::Blob(data.clone()),
            ],
        ),
        prepare(format!("SELECT body, data FROM {table} WHERE id = ?")),
        bind(1, SimValue::Int(1)),
        execute(Expectation::Ok),
        fetch(value("body", SimValue::Text(body))),
        execute(Expectation::Ok),
        fetch(value("data", SimValue::Blob(data))),
        destroy(),
    ]
}

fn limit_injection() -> Vec<Interaction> {
    let table = "sim_limit";
    let mut steps = vec![run(format!("CREATE TABLE {table} (id INT)"))];
    for id in 1..=3 {
        steps.push(insert(
            format!("INSERT INTO {table} (id) VALUES (?)"),
            vec![SimValue::Int(id)],
        ));
    }
    steps.extend([
        prepare(format!("SELECT id FROM {table} ORDER BY id LIMIT ?")),
        bind(1, SimValue::Text(format!("2; DROP TABLE {table}"))),
        execute(Expectation::Ok),
        Interaction::expecting(
            Action::FetchAll { slot: SLOT },
            Expectation::Rows { count: 2 },
        ),
        Interaction::expecting(
            Action::Do {
                sql: format!("SELECT id FROM {table}"),
                params: Vec::new(),
            },
            Expectation::Rows { count: 3 },
        ),
        destroy(),
    ]);
    steps
}

fn quoted_values() -> Vec<Interaction> {
    let table = "sim_quoted";
    let label = r"it's a \ back?slash";
    vec![
        run(format!("CREATE TABLE {table} (id INT, label VARCHAR(40))")),
        insert(
            format!("INSERT INTO {table} (id, label) VALUES (?, ?)"),
            vec![SimValue::Int(1), SimValue::Text(label.into())],
        ),
        prepare(format!("SELECT label FROM {table} WHERE label = ?")),
        bind(1, SimValue::Text(label.into())),
        execute(Expectation::Ok),
        fetch(value("label", SimValue::Text(label.into()))),
        bind(1, SimValue::Null),
        execute(Expectation::Ok),
        fetch(Expectation::Ok),
        destroy(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_property_uses_its_own_table_and_cleans_up() {
        for kind in PropertyKind::value_variants() {
            let plan = kind.build_plan();
            let Some(Action::Do { sql, .. }) = plan.interactions.first().map(|i| &i.action) else {
                panic!("{kind:?} must start by creating its table");
            };
            assert!(sql.starts_with("CREATE TABLE sim_"), "{sql}");
            assert!(!sql.contains(crate::generation::TABLE), "{sql}");
            assert!(matches!(
                plan.interactions.last().map(|i| &i.action),
                Some(Action::Destroy { slot: SLOT })
            ));
        }
    }

    #[test]
    fn properties_carry_expectations() {
        for kind in PropertyKind::value_variants() {
            let plan = kind.build_plan();
            let checked = plan
                .interactions
                .iter()
                .filter(|i| i.expect.is_some())
                .count();
            assert!(checked >= 3, "{kind:?} checks only {checked} steps");
        }
    }
}
