use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::args::SimConfig;
use crate::plan::{Action, Plan};
use crate::runner::RunMode;
use crate::shrinker::ShrinkReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum BugRecordKind {
    /// The two execution paths disagreed.
    Mismatch,
    /// A scripted step did not produce what it expected.
    Expectation,
    /// Result sets or prepared statements were left open on the server.
    Leak,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct BugRecord {
    pub(crate) kind: BugRecordKind,
    pub(crate) seed: Option<u64>,
    pub(crate) modes: Vec<RunMode>,
    pub(crate) step: Option<usize>,
    pub(crate) action: Option<Action>,
    pub(crate) reason: String,
}

#[derive(Serialize)]
struct Failure<'a> {
    recorded_at: String,
    #[serde(flatten)]
    record: &'a BugRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    shrink: Option<ShrinkSummary>,
}

#[derive(Serialize)]
struct ShrinkSummary {
    original_steps: usize,
    shrunk_steps: usize,
    rounds: usize,
    attempts: usize,
}

/// Directory of reproducible failures: one subdirectory per bug holding the
/// plan, the config, what went wrong, and the shrunk plan when there is one.
#[derive(Debug)]
pub(crate) struct BugBase {
    root: PathBuf,
}

impl BugBase {
    pub(crate) fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub(crate) fn store_failure(
        &self,
        config: &SimConfig,
        plan: &Plan,
        shrunk: Option<(&Plan, &ShrinkReport)>,
        record: &BugRecord,
    ) -> Result<PathBuf, String> {
        fs::create_dir_all(&self.root)
            .map_err(|err| format!("failed to create bugbase dir {}: {err}", self.root.display()))?;
        let dir = create_unique_dir(&self.root, &entry_name(record))?;

        write_json(&dir.join("plan.json"), plan)?;
        write_json(&dir.join("config.json"), config)?;
        let failure = Failure {
            recorded_at: unix_timestamp(),
            record,
            shrink: shrunk.map(|(_, report)| ShrinkSummary {
                original_steps: report.original_steps,
                shrunk_steps: report.shrunk_steps,
                rounds: report.rounds,
                attempts: report.attempts,
            }),
        };
        write_json(&dir.join("failure.json"), &failure)?;
        if let Some((shrunk_plan, _)) = shrunk {
            write_json(&dir.join("shrunk_plan.json"), shrunk_plan)?;
        }
        Ok(dir)
    }
}

fn entry_name(record: &BugRecord) -> String {
    let kind = match record.kind {
        BugRecordKind::Mismatch => "mismatch",
        BugRecordKind::Expectation => "expectation",
        BugRecordKind::Leak => "leak",
    };
    match record.seed {
        Some(seed) => format!("{kind}-{seed}"),
        None => format!("{kind}-replay"),
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    let content = serde_json::to_string_pretty(value)
        .map_err(|err| format!("failed to serialize {}: {err}", path.display()))?;
    fs::write(path, content).map_err(|err| format!("failed to write {}: {err}", path.display()))
}

fn create_unique_dir(root: &Path, base: &str) -> Result<PathBuf, String> {
    for attempt in 0u32.. {
        let dir = if attempt == 0 {
            root.join(base)
        } else {
            root.join(format!("{base}-{attempt}"))
        };
        match fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(err) => {
                return Err(format!("failed to create bugbase entry {}: {err}", dir.display()));
            }
        }
    }
    Err(format!("no free bugbase entry name for {base}"))
}

fn unix_timestamp() -> String {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    format!("{}.{:06}", now.as_secs(), now.subsec_micros())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::Args;
    use crate::plan::Interaction;
    use clap::Parser;

    #[test]
    fn failures_are_stored_under_unique_names() {
        let root = std::env::temp_dir().join(format!(
            "sql-emulation-bugbase-{}-{}",
            std::process::id(),
            unix_timestamp()
        ));
        let bugbase = BugBase::new(root.clone());
        let config = SimConfig::from_args(Args::parse_from(["simulator", "--seed", "3"]));
        let plan = Plan {
            interactions: vec![Interaction::new(Action::KillSessions)],
        };
        let record = BugRecord {
            kind: BugRecordKind::Leak,
            seed: Some(3),
            modes: vec![RunMode::Native],
            step: None,
            action: None,
            reason: "leaked 1 result set(s)".into(),
        };

        let first = bugbase
            .store_failure(&config, &plan, None, &record)
            .expect("store");
        let second = bugbase
            .store_failure(&config, &plan, None, &record)
            .expect("store");
        assert!(first.ends_with("leak-3"));
        assert!(second.ends_with("leak-3-1"));
        assert!(first.join("plan.json").exists());
        assert!(!first.join("shrunk_plan.json").exists());
        let failure = fs::read_to_string(first.join("failure.json")).expect("read");
        assert!(failure.contains("\"kind\": \"leak\""), "{failure}");

        let _ = fs::remove_dir_all(root);
    }
}
