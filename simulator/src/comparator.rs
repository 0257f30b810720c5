use crate::runner::{Observation, PlanRun, StepOutcome, StepResult};

#[derive(Debug, Clone, Copy)]
pub(crate) struct ComparisonConfig {
    pub(crate) compare_error_messages: bool,
}

#[derive(Debug)]
pub(crate) struct ComparisonMismatch {
    pub(crate) step: usize,
    pub(crate) reason: String,
}

/// Both runs executed the same plan; every step must have behaved the same.
pub(crate) fn compare_runs(
    left: &PlanRun,
    right: &PlanRun,
    config: ComparisonConfig,
) -> Result<(), ComparisonMismatch> {
    for (left_step, right_step) in left.outcomes.iter().zip(right.outcomes.iter()) {
        compare_step(left_step, right_step, config).map_err(|reason| ComparisonMismatch {
            step: left_step.step,
            reason: format!("{} vs {}: {reason}", left.mode, right.mode),
        })?;
    }

    if left.outcomes.len() != right.outcomes.len() {
        return Err(ComparisonMismatch {
            step: left.outcomes.len().min(right.outcomes.len()),
            reason: format!(
                "step count mismatch: {}={} {}={}",
                left.mode,
                left.outcomes.len(),
                right.mode,
                right.outcomes.len()
            ),
        });
    }

    Ok(())
}

fn compare_step(
    left: &StepOutcome,
    right: &StepOutcome,
    config: ComparisonConfig,
) -> Result<(), String> {
    if left.step != right.step || left.action != right.action {
        return Err(format!(
            "plans diverged: left step {} {:?}, right step {} {:?}",
            left.step, left.action, right.step, right.action
        ));
    }

    match (&left.result, &right.result) {
        (StepResult::Ok(left_obs), StepResult::Ok(right_obs)) => {
            compare_observation(left_obs, right_obs)
        }
        (StepResult::Err(left_err), StepResult::Err(right_err)) => {
            if left_err.class != right_err.class {
                return Err(format!(
                    "error class mismatch: {:?} vs {:?}",
                    left_err.class, right_err.class
                ));
            }
            if config.compare_error_messages && left_err.message != right_err.message {
                return Err(format!(
                    "error message mismatch: {} vs {}",
                    left_err.message, right_err.message
                ));
            }
            Ok(())
        }
        (StepResult::Ok(obs), StepResult::Err(err)) => {
            Err(format!("left ok ({obs:?}), right error: {}", err.message))
        }
        (StepResult::Err(err), StepResult::Ok(obs)) => {
            Err(format!("left error: {}, right ok ({obs:?})", err.message))
        }
    }
}

fn compare_observation(left: &Observation, right: &Observation) -> Result<(), String> {
    match (left, right) {
        (
            Observation::Rows {
                columns: left_columns,
                rows: left_rows,
            },
            Observation::Rows {
                columns: right_columns,
                rows: right_rows,
            },
        ) => {
            if left_columns != right_columns {
                return Err(format!(
                    "columns mismatch: {left_columns:?} vs {right_columns:?}"
                ));
            }
            if left_rows.len() != right_rows.len() {
                return Err(format!(
                    "row count mismatch: {} vs {}",
                    left_rows.len(),
                    right_rows.len()
                ));
            }
            match left_rows.iter().zip(right_rows).position(|(l, r)| l != r) {
                Some(idx) => Err(format!(
                    "row {idx} mismatch: {:?} vs {:?}",
                    left_rows[idx], right_rows[idx]
                )),
                None => Ok(()),
            }
        }
        (left, right) if left == right => Ok(()),
        (left, right) => Err(format!("observation mismatch: {left:?} vs {right:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Action;
    use crate::runner::{ActionError, ErrorClass, RunMode};
    use sql_emulation::ReconnectStats;

    fn run(mode: RunMode, results: Vec<StepResult>) -> PlanRun {
        PlanRun {
            mode,
            outcomes: results
                .into_iter()
                .enumerate()
                .map(|(step, result)| StepOutcome {
                    step,
                    action: Action::Execute { slot: 0 },
                    result,
                })
                .collect(),
            error: None,
            stats: ReconnectStats::default(),
        }
    }

    fn rows(values: &[&str]) -> StepResult {
        StepResult::Ok(Observation::Rows {
            columns: vec!["a".into()],
            rows: values.iter().map(|v| vec![(*v).to_string()]).collect(),
        })
    }

    fn error(class: ErrorClass, message: &str) -> StepResult {
        StepResult::Err(ActionError {
            class,
            message: message.into(),
        })
    }

    const LENIENT: ComparisonConfig = ComparisonConfig {
        compare_error_messages: false,
    };

    #[test]
    fn identical_runs_match() {
        let left = run(RunMode::Emulated, vec![rows(&["i:1"]), error(ErrorClass::Sequence, "x")]);
        let right = run(RunMode::Native, vec![rows(&["i:1"]), error(ErrorClass::Sequence, "y")]);
        assert!(compare_runs(&left, &right, LENIENT).is_ok());
        let strict = ComparisonConfig {
            compare_error_messages: true,
        };
        let mismatch = compare_runs(&left, &right, strict).expect_err("messages differ");
        assert_eq!(mismatch.step, 1);
    }

    #[test]
    fn differing_rows_are_reported_with_their_index() {
        let left = run(RunMode::Emulated, vec![rows(&["i:1", "i:2"])]);
        let right = run(RunMode::Native, vec![rows(&["i:1", "i:3"])]);
        let mismatch = compare_runs(&left, &right, LENIENT).expect_err("rows differ");
        assert!(mismatch.reason.contains("row 1 mismatch"), "{}", mismatch.reason);
    }

    #[test]
    fn ok_versus_error_is_a_mismatch() {
        let left = run(RunMode::Emulated, vec![StepResult::Ok(Observation::Done)]);
        let right = run(RunMode::Native, vec![error(ErrorClass::ConnectionLost, "gone")]);
        assert!(compare_runs(&left, &right, LENIENT).is_err());
    }
}
