mod args;
mod bugbase;
mod comparator;
mod generation;
mod logging;
mod plan;
mod properties;
mod runner;
mod shrinker;

use std::time::{Duration, Instant};

use clap::Parser;
use tracing::Level;

use crate::args::{Args, SimConfig};
use crate::bugbase::{BugBase, BugRecord, BugRecordKind};
use crate::comparator::{ComparisonConfig, compare_runs};
use crate::generation::{bootstrap_plan, generate_plan};
use crate::logging::LogWriter;
use crate::plan::Plan;
use crate::runner::{PlanRun, RunErrorKind, RunMode, execute_plan};
use crate::shrinker::shrink_plan;

#[derive(Debug, Default)]
struct Summary {
    plans: u64,
    steps: u64,
    reconnects_ok: u64,
    reconnects_failed: u64,
}

impl Summary {
    fn add(&mut self, run: &PlanRun) {
        self.steps += run.outcomes.len() as u64;
        self.reconnects_ok += run.stats.auto_reconnects_ok;
        self.reconnects_failed += run.stats.auto_reconnects_failed;
    }
}

fn main() {
    let args = Args::parse();
    let config = SimConfig::from_args(args);
    let writer = LogWriter::new(config.log.clone()).unwrap_or_else(|err| {
        eprintln!("failed to open log file: {err}");
        std::process::exit(2);
    });

    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_target(false)
        .with_max_level(Level::INFO)
        .init();

    let config_json = serde_json::to_string_pretty(&config).unwrap_or_else(|_| "{}".to_string());
    tracing::info!("config: {}", config_json);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!("failed to start runtime: {err}");
            std::process::exit(2);
        }
    };
    let code = runtime.block_on(run(&config));
    std::process::exit(code);
}

async fn run(config: &SimConfig) -> i32 {
    let bugbase = BugBase::new(config.bugbase.clone());
    let mut summary = Summary::default();

    if let Some(path) = &config.plan {
        let plan = match Plan::from_json_path(path) {
            Ok(plan) => plan,
            Err(err) => {
                tracing::error!("{err}");
                return 2;
            }
        };
        tracing::info!("replaying {} ({} steps)", path.display(), plan.interactions.len());
        return match check_plan(&plan, config, None, &mut summary).await {
            Some(record) => report_failure(&bugbase, config, plan, 0, record).await,
            None => {
                log_summary(&summary, Duration::ZERO);
                0
            }
        };
    }

    let started = Instant::now();
    let deadline = config.duration_ms.map(Duration::from_millis);
    let mut index = 0u64;
    loop {
        match deadline {
            Some(limit) if started.elapsed() >= limit => break,
            None if index >= config.iterations => break,
            _ => {}
        }
        let seed = config.plan_seed(index);
        let plan = match generate_plan(config, seed) {
            Ok(plan) => plan,
            Err(err) => {
                tracing::error!("plan generation failed for seed {seed}: {err}");
                return 2;
            }
        };
        if let Some(record) = check_plan(&plan, config, Some(seed), &mut summary).await {
            return report_failure(&bugbase, config, plan, bootstrap_plan().len(), record).await;
        }
        index += 1;
    }

    log_summary(&summary, started.elapsed());
    0
}

/// Run `plan` in both modes. Returns the first problem found: an unmet
/// expectation or leak in either run, then any divergence between them.
async fn check_plan(
    plan: &Plan,
    config: &SimConfig,
    seed: Option<u64>,
    summary: &mut Summary,
) -> Option<BugRecord> {
    let emulated = execute_plan(plan, RunMode::Emulated, config).await;
    let native = execute_plan(plan, RunMode::Native, config).await;
    summary.plans += 1;
    summary.add(&emulated);
    summary.add(&native);

    for run in [&emulated, &native] {
        if let Some(err) = &run.error {
            let kind = match err.kind {
                RunErrorKind::Leak => BugRecordKind::Leak,
                RunErrorKind::Connect | RunErrorKind::Expectation => BugRecordKind::Expectation,
            };
            return Some(BugRecord {
                kind,
                seed,
                modes: vec![run.mode],
                step: Some(err.step),
                action: err.action.clone(),
                reason: err.reason.clone(),
            });
        }
    }

    let comparison = ComparisonConfig {
        compare_error_messages: config.compare_error_messages,
    };
    compare_runs(&emulated, &native, comparison)
        .err()
        .map(|mismatch| BugRecord {
            kind: BugRecordKind::Mismatch,
            seed,
            modes: vec![emulated.mode, native.mode],
            step: Some(mismatch.step),
            action: emulated
                .outcomes
                .get(mismatch.step)
                .map(|outcome| outcome.action.clone()),
            reason: mismatch.reason,
        })
}

async fn report_failure(
    bugbase: &BugBase,
    config: &SimConfig,
    plan: Plan,
    keep: usize,
    record: BugRecord,
) -> i32 {
    tracing::error!(
        "{:?} at step {:?} ({}): {}",
        record.kind,
        record.step,
        record.modes.iter().map(ToString::to_string).collect::<Vec<_>>().join("/"),
        record.reason
    );

    let shrunk = if config.shrink_rounds > 0 {
        let kind = record.kind;
        let seed = record.seed;
        let result = shrink_plan(plan.clone(), keep, config.shrink_rounds, |candidate| {
            let candidate = candidate.clone();
            async move {
                let mut scratch = Summary::default();
                check_plan(&candidate, config, seed, &mut scratch)
                    .await
                    .is_some_and(|again| again.kind == kind)
            }
        })
        .await;
        tracing::info!(
            "shrunk plan from {} to {} steps in {} attempts",
            result.report.original_steps,
            result.report.shrunk_steps,
            result.report.attempts
        );
        Some(result)
    } else {
        None
    };

    match bugbase.store_failure(
        config,
        &plan,
        shrunk.as_ref().map(|result| (&result.plan, &result.report)),
        &record,
    ) {
        Ok(dir) => tracing::info!("failure stored in {}", dir.display()),
        Err(err) => tracing::error!("{err}"),
    }
    1
}

fn log_summary(summary: &Summary, elapsed: Duration) {
    tracing::info!(
        "ok: {} plans, {} steps, reconnects {} ok / {} failed, {:.1}s",
        summary.plans,
        summary.steps,
        summary.reconnects_ok,
        summary.reconnects_failed,
        elapsed.as_secs_f64()
    );
}
