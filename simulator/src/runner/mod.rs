use serde::{Deserialize, Serialize};
use sql_emulation::error::codes;
use sql_emulation::test_utils::{FakeConnector, FakeServer, connect_fake};
use sql_emulation::{
    Connection, ConnectionOptions, ReconnectStats, ResultSet, RowValues, SqlEmulationError,
    Statement, StatementOptions, TxOutcome,
};

use crate::args::SimConfig;
use crate::plan::{Action, Expectation, Plan};

/// Which execution path the connection prefers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum RunMode {
    Emulated,
    Native,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Emulated => f.write_str("emulated"),
            RunMode::Native => f.write_str("native"),
        }
    }
}

/// Coarse error kind compared across modes. A lost connection surfaces as
/// "server has gone away" on one path and as a stale cursor on the other, so
/// both map to [`ErrorClass::ConnectionLost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ErrorClass {
    ConnectionLost,
    Sequence,
    IllegalParam,
    NotActive,
    Query,
    NotImplemented,
    Server(u32),
    Other(u32),
}

impl ErrorClass {
    pub(crate) fn of(err: &SqlEmulationError) -> Self {
        match err {
            SqlEmulationError::ConnectionError(_) => ErrorClass::ConnectionLost,
            SqlEmulationError::Server(server)
                if server.is_gone_away() || server.code == codes::CR_SERVER_LOST =>
            {
                ErrorClass::ConnectionLost
            }
            SqlEmulationError::Server(server) => ErrorClass::Server(server.code),
            SqlEmulationError::Sequence(_) => ErrorClass::Sequence,
            SqlEmulationError::IllegalParam { .. } => ErrorClass::IllegalParam,
            SqlEmulationError::NotActive(_) => ErrorClass::NotActive,
            SqlEmulationError::Query(_) => ErrorClass::Query,
            SqlEmulationError::NotImplemented(_) => ErrorClass::NotImplemented,
            other => ErrorClass::Other(other.code()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunErrorKind {
    Connect,
    Expectation,
    Leak,
}

#[derive(Debug, Clone)]
pub(crate) struct RunError {
    pub(crate) kind: RunErrorKind,
    pub(crate) step: usize,
    pub(crate) action: Option<Action>,
    pub(crate) reason: String,
}

#[derive(Debug, Clone)]
pub(crate) struct ActionError {
    pub(crate) class: ErrorClass,
    pub(crate) message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Observation {
    Done,
    /// The slot was empty; nothing was sent.
    NoStatement,
    Prepared {
        params: usize,
    },
    Executed {
        rows: Option<u64>,
        has_result_set: bool,
        insert_id: u64,
    },
    Row {
        columns: Vec<String>,
        values: Option<Vec<String>>,
    },
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Affected(Option<u64>),
    Tx(TxOutcome),
}

#[derive(Debug, Clone)]
pub(crate) enum StepResult {
    Ok(Observation),
    Err(ActionError),
}

#[derive(Debug, Clone)]
pub(crate) struct StepOutcome {
    pub(crate) step: usize,
    pub(crate) action: Action,
    pub(crate) result: StepResult,
}

#[derive(Debug, Clone)]
pub(crate) struct PlanRun {
    pub(crate) mode: RunMode,
    pub(crate) outcomes: Vec<StepOutcome>,
    pub(crate) error: Option<RunError>,
    pub(crate) stats: ReconnectStats,
}

fn options_for(mode: RunMode, config: &SimConfig) -> ConnectionOptions {
    ConnectionOptions::builder()
        .server_prepare(mode == RunMode::Native)
        .use_result(config.use_result)
        .chop_blanks(config.chop_blanks)
        .bind_type_guessing(config.inference)
        .fetch_buffer_cap(config.fetch_buffer_cap)
        .auto_reconnect(true)
        .finish()
}

/// Run `plan` against a fresh server. Statement failures are observations;
/// only unmet expectations and leaked server resources end the run early.
pub(crate) async fn execute_plan(plan: &Plan, mode: RunMode, config: &SimConfig) -> PlanRun {
    let server = FakeServer::new();
    let mut run = PlanRun {
        mode,
        outcomes: Vec::with_capacity(plan.interactions.len()),
        error: None,
        stats: ReconnectStats::default(),
    };

    let mut conn = match connect_fake(&server, options_for(mode, config)).await {
        Ok(conn) => conn,
        Err(err) => {
            run.error = Some(RunError {
                kind: RunErrorKind::Connect,
                step: 0,
                action: None,
                reason: format!("connect failed: {err}"),
            });
            return run;
        }
    };
    let mut slots: Vec<Option<Statement>> = Vec::new();
    slots.resize_with(plan.slot_count(), || None);

    for (step, interaction) in plan.interactions.iter().enumerate() {
        let action = &interaction.action;
        let result = apply_action(&server, &mut conn, &mut slots, action).await;
        tracing::debug!(
            "plan_step={} mode={} action={} ok={}",
            step,
            mode,
            action.label(),
            result.is_ok()
        );

        let result = match result {
            Ok(observation) => StepResult::Ok(observation),
            Err(err) => StepResult::Err(ActionError {
                class: ErrorClass::of(&err),
                message: err.to_string(),
            }),
        };
        if let Some(expect) = &interaction.expect
            && let Err(reason) = verify_expectation(expect, &result)
        {
            run.error = Some(RunError {
                kind: RunErrorKind::Expectation,
                step,
                action: Some(action.clone()),
                reason,
            });
        }
        run.outcomes.push(StepOutcome {
            step,
            action: action.clone(),
            result,
        });
        if run.error.is_some() {
            break;
        }
    }

    for stmt in slots.into_iter().flatten() {
        // Best effort: a statement on a dead session has nothing left to free.
        let _ = stmt.destroy(&mut conn).await;
    }
    run.stats = conn.stats();
    if run.error.is_none() {
        run.error = check_leaks(&server, run.outcomes.len());
    }
    conn.disconnect().await;
    run
}

fn check_leaks(server: &FakeServer, step: usize) -> Option<RunError> {
    let results = server.live_results();
    let statements = server.open_statements();
    if results == 0 && statements == 0 {
        return None;
    }
    Some(RunError {
        kind: RunErrorKind::Leak,
        step,
        action: None,
        reason: format!("leaked {results} result set(s) and {statements} prepared statement(s)"),
    })
}

async fn apply_action(
    server: &FakeServer,
    conn: &mut Connection<FakeConnector>,
    slots: &mut [Option<Statement>],
    action: &Action,
) -> Result<Observation, SqlEmulationError> {
    match action {
        Action::Prepare { slot, sql } => {
            if let Some(previous) = slots[*slot].take() {
                let _ = previous.destroy(conn).await;
            }
            let stmt = conn.prepare(sql, StatementOptions::default()).await?;
            let params = stmt.num_params();
            slots[*slot] = Some(stmt);
            Ok(Observation::Prepared { params })
        }
        Action::Bind {
            slot,
            position,
            value,
            declared,
        } => {
            let Some(stmt) = slots[*slot].as_mut() else {
                return Ok(Observation::NoStatement);
            };
            stmt.bind(*position, RowValues::from(value), *declared)?;
            Ok(Observation::Done)
        }
        Action::Execute { slot } => {
            let Some(stmt) = slots[*slot].as_mut() else {
                return Ok(Observation::NoStatement);
            };
            let outcome = stmt.execute(conn).await?;
            Ok(Observation::Executed {
                rows: outcome.rows.known(),
                has_result_set: outcome.has_result_set,
                insert_id: stmt.insert_id(),
            })
        }
        Action::Fetch { slot } => {
            let Some(stmt) = slots[*slot].as_mut() else {
                return Ok(Observation::NoStatement);
            };
            let row = stmt.fetch(conn).await?;
            Ok(Observation::Row {
                columns: row
                    .as_ref()
                    .map(|r| r.column_names.as_ref().clone())
                    .unwrap_or_default(),
                values: row.map(|r| r.rows.iter().map(normalize_value).collect()),
            })
        }
        Action::FetchAll { slot } => {
            let Some(stmt) = slots[*slot].as_mut() else {
                return Ok(Observation::NoStatement);
            };
            let result = stmt.fetch_all(conn).await?;
            Ok(observe_rows(&result))
        }
        Action::Finish { slot } => {
            let Some(stmt) = slots[*slot].as_mut() else {
                return Ok(Observation::NoStatement);
            };
            stmt.finish(conn).await?;
            Ok(Observation::Done)
        }
        Action::Destroy { slot } => {
            let Some(stmt) = slots[*slot].take() else {
                return Ok(Observation::NoStatement);
            };
            stmt.destroy(conn).await?;
            Ok(Observation::Done)
        }
        Action::Do { sql, params } => {
            let params: Vec<RowValues> = params.iter().map(RowValues::from).collect();
            let rows = conn.do_statement(sql, &params).await?;
            Ok(Observation::Affected(rows.known()))
        }
        Action::SetAutocommit { on } => {
            conn.set_autocommit(*on).await?;
            Ok(Observation::Done)
        }
        Action::Commit => Ok(Observation::Tx(conn.commit().await?)),
        Action::Rollback => Ok(Observation::Tx(conn.rollback().await?)),
        Action::KillSessions => {
            server.kill_sessions();
            Ok(Observation::Done)
        }
    }
}

fn observe_rows(result: &ResultSet) -> Observation {
    let columns = result
        .get_column_names()
        .map(|names| names.as_ref().clone())
        .or_else(|| result.results.first().map(|row| row.column_names.as_ref().clone()))
        .unwrap_or_default();
    let rows = result
        .results
        .iter()
        .map(|row| row.rows.iter().map(normalize_value).collect())
        .collect();
    Observation::Rows { columns, rows }
}

fn verify_expectation(expect: &Expectation, result: &StepResult) -> Result<(), String> {
    match (expect, result) {
        (Expectation::Ok, StepResult::Ok(_)) => Ok(()),
        (Expectation::Error { class }, StepResult::Err(err)) if err.class == *class => Ok(()),
        (Expectation::Error { class }, StepResult::Err(err)) => Err(format!(
            "expected {class:?} error, got {:?}: {}",
            err.class, err.message
        )),
        (Expectation::Error { class }, StepResult::Ok(obs)) => {
            Err(format!("expected {class:?} error, but step succeeded with {obs:?}"))
        }
        (Expectation::Rows { count }, StepResult::Ok(obs)) => {
            let actual = match obs {
                Observation::Rows { rows, .. } => Some(rows.len() as u64),
                Observation::Executed { rows, .. } | Observation::Affected(rows) => *rows,
                _ => None,
            };
            if actual == Some(*count as u64) {
                Ok(())
            } else {
                Err(format!("expected {count} row(s), got {obs:?}"))
            }
        }
        (Expectation::Value { column, equals }, StepResult::Ok(obs)) => {
            let wanted = normalize_value(&RowValues::from(equals));
            let actual = match obs {
                Observation::Row {
                    columns,
                    values: Some(values),
                } => columns
                    .iter()
                    .position(|c| c == column)
                    .and_then(|idx| values.get(idx)),
                _ => None,
            };
            if actual == Some(&wanted) {
                Ok(())
            } else {
                Err(format!("expected {column} = {wanted}, got {obs:?}"))
            }
        }
        (_, StepResult::Err(err)) => Err(format!("step failed: {}", err.message)),
    }
}

pub(crate) fn normalize_value(value: &RowValues) -> String {
    match value {
        RowValues::Int(val) => format!("i:{val}"),
        RowValues::Float(val) => format!("f:{val}"),
        RowValues::Text(val) => format!("s:{val}"),
        RowValues::Bool(val) => format!("b:{val}"),
        RowValues::Timestamp(val) => {
            format!("t:{}", val.format("%Y-%m-%dT%H:%M:%S%.6f"))
        }
        RowValues::Null => "null".to_string(),
        RowValues::JSON(val) => format!("j:{val}"),
        RowValues::Blob(bytes) => format!("blob:{}", hex_encode(bytes)),
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut encoded = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(encoded, "{byte:02x}");
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::PropertyKind;
    use sql_emulation::ServerError;

    #[test]
    fn lost_connections_share_a_class() {
        let gone = SqlEmulationError::Server(ServerError::gone_away());
        let stale = SqlEmulationError::ConnectionError("stale".into());
        assert_eq!(ErrorClass::of(&gone), ErrorClass::ConnectionLost);
        assert_eq!(ErrorClass::of(&stale), ErrorClass::ConnectionLost);
        let missing = SqlEmulationError::Server(ServerError::new(1146, "no table"));
        assert_eq!(ErrorClass::of(&missing), ErrorClass::Server(1146));
    }

    #[test]
    fn values_normalize_by_kind() {
        assert_eq!(normalize_value(&RowValues::Int(3)), "i:3");
        assert_eq!(normalize_value(&RowValues::Blob(vec![0, 255])), "blob:00ff");
        assert_eq!(normalize_value(&RowValues::Null), "null");
    }

    #[tokio::test]
    async fn scripted_properties_hold_in_both_modes() {
        let config = SimConfig::from_args(<crate::args::Args as clap::Parser>::parse_from([
            "simulator",
            "--seed",
            "1",
        ]));
        for kind in <PropertyKind as clap::ValueEnum>::value_variants() {
            let plan = kind.build_plan();
            for mode in [RunMode::Emulated, RunMode::Native] {
                let run = execute_plan(&plan, mode, &config).await;
                assert!(run.error.is_none(), "{kind:?} in {mode}: {:?}", run.error);
                assert_eq!(run.outcomes.len(), plan.interactions.len());
            }
        }
    }
}
