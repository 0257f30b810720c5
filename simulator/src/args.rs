use clap::Parser;
use serde::Serialize;
use sql_emulation::TypeInference;
use std::path::PathBuf;
use std::time::Duration;

use crate::properties::PropertyKind;

#[derive(Parser, Debug)]
#[command(author, version, about = "Deterministic emulated-vs-native statement simulator")]
pub(crate) struct Args {
    /// Replay a saved plan instead of generating one.
    #[arg(long)]
    pub(crate) plan: Option<PathBuf>,
    #[arg(long, value_enum)]
    pub(crate) property: Option<PropertyKind>,
    #[arg(long, value_parser = humantime::parse_duration)]
    pub(crate) duration: Option<Duration>,
    /// Number of generated plans to run.
    #[arg(long)]
    pub(crate) iterations: Option<u64>,
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    #[arg(long, default_value_t = 200)]
    pub(crate) steps: usize,
    #[arg(long, default_value_t = 4)]
    pub(crate) slots: usize,
    #[arg(long, default_value_t = 0.01)]
    pub(crate) kill_rate: f64,
    #[arg(long, default_value_t = 0.05)]
    pub(crate) misuse_rate: f64,
    #[arg(long, value_enum, default_value = "off")]
    pub(crate) inference: TypeInference,
    #[arg(long)]
    pub(crate) use_result: bool,
    #[arg(long)]
    pub(crate) chop_blanks: bool,
    #[arg(long, default_value_t = 64)]
    pub(crate) fetch_buffer_cap: usize,
    #[arg(long, default_value_t = 8)]
    pub(crate) shrink_rounds: usize,
    #[arg(long, default_value = "bugbase")]
    pub(crate) bugbase: PathBuf,
    #[arg(long)]
    pub(crate) compare_error_messages: bool,
    #[arg(long)]
    pub(crate) log: Option<PathBuf>,
    #[arg(long)]
    pub(crate) quick: bool,
    #[arg(long)]
    pub(crate) stress: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SimConfig {
    pub(crate) plan: Option<PathBuf>,
    pub(crate) property: Option<PropertyKind>,
    pub(crate) duration_ms: Option<u64>,
    pub(crate) iterations: u64,
    pub(crate) seed: u64,
    pub(crate) steps: usize,
    pub(crate) slots: usize,
    pub(crate) kill_rate: f64,
    pub(crate) misuse_rate: f64,
    pub(crate) inference: TypeInference,
    pub(crate) use_result: bool,
    pub(crate) chop_blanks: bool,
    pub(crate) fetch_buffer_cap: usize,
    pub(crate) shrink_rounds: usize,
    pub(crate) bugbase: PathBuf,
    pub(crate) compare_error_messages: bool,
    pub(crate) log: Option<PathBuf>,
    pub(crate) preset: Option<String>,
}

impl SimConfig {
    pub(crate) fn from_args(args: Args) -> Self {
        let mut config = SimConfig {
            plan: args.plan,
            property: args.property,
            duration_ms: args
                .duration
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            iterations: args.iterations.unwrap_or(1).max(1),
            seed: args.seed.unwrap_or_else(random_seed),
            steps: args.steps.max(1),
            slots: args.slots.max(1),
            kill_rate: clamp_rate(args.kill_rate),
            misuse_rate: clamp_rate(args.misuse_rate),
            inference: args.inference,
            use_result: args.use_result,
            chop_blanks: args.chop_blanks,
            fetch_buffer_cap: args.fetch_buffer_cap.max(1),
            shrink_rounds: args.shrink_rounds,
            bugbase: args.bugbase,
            compare_error_messages: args.compare_error_messages,
            log: args.log,
            preset: None,
        };

        if args.quick {
            config.apply_quick();
        }
        if args.stress {
            config.apply_stress();
        }

        config
    }

    /// Seed for the `index`-th generated plan.
    pub(crate) fn plan_seed(&self, index: u64) -> u64 {
        self.seed.wrapping_add(index.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    fn apply_quick(&mut self) {
        self.preset = Some("quick".to_string());
        self.iterations = 50;
        self.duration_ms = None;
        self.steps = 100;
        self.slots = 3;
        self.kill_rate = 0.01;
        self.misuse_rate = 0.05;
    }

    fn apply_stress(&mut self) {
        self.preset = Some("stress".to_string());
        self.iterations = 5_000;
        self.duration_ms = None;
        self.steps = 600;
        self.slots = 8;
        self.kill_rate = 0.03;
        self.misuse_rate = 0.1;
        self.fetch_buffer_cap = 8;
    }
}

fn clamp_rate(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

fn random_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    now.as_secs() ^ u64::from(now.subsec_nanos())
}
