use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Seeded soak test for sql-txn update batches")]
pub(crate) struct Args {
    #[arg(long, value_parser = humantime::parse_duration)]
    pub(crate) duration: Option<Duration>,
    #[arg(long)]
    pub(crate) rounds: Option<u64>,
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    #[arg(long, default_value_t = 4)]
    pub(crate) pool_size: u32,
    #[arg(long, default_value_t = 8)]
    pub(crate) tasks: usize,
    #[arg(long, default_value_t = 4)]
    pub(crate) workers: usize,
    #[arg(long, default_value_t = 6)]
    pub(crate) max_batch: usize,
    #[arg(long, default_value_t = 0.2)]
    pub(crate) fail_rate: f64,
    #[arg(long, default_value_t = 0.01)]
    pub(crate) panic_rate: f64,
    /// Database file; a temporary one is used when omitted.
    #[arg(long)]
    pub(crate) db: Option<PathBuf>,
    #[arg(long)]
    pub(crate) log: Option<PathBuf>,
    #[arg(long)]
    pub(crate) verbose: bool,
    #[arg(long)]
    pub(crate) quick: bool,
    #[arg(long)]
    pub(crate) stress: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SimConfig {
    pub(crate) duration_ms: Option<u64>,
    pub(crate) rounds: Option<u64>,
    pub(crate) seed: u64,
    pub(crate) pool_size: u32,
    pub(crate) tasks: usize,
    pub(crate) workers: usize,
    pub(crate) max_batch: usize,
    pub(crate) fail_rate: f64,
    pub(crate) panic_rate: f64,
    pub(crate) db: Option<PathBuf>,
    pub(crate) log: Option<PathBuf>,
    pub(crate) verbose: bool,
    pub(crate) preset: Option<String>,
}

impl SimConfig {
    pub(crate) fn from_args(args: Args) -> Self {
        let mut config = SimConfig {
            duration_ms: args
                .duration
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            rounds: args.rounds,
            seed: args.seed.unwrap_or_else(random_seed),
            pool_size: args.pool_size.max(1),
            tasks: args.tasks.max(1),
            workers: args.workers.max(1),
            max_batch: args.max_batch.max(1),
            fail_rate: clamp_rate(args.fail_rate),
            panic_rate: clamp_rate(args.panic_rate),
            db: args.db,
            log: args.log,
            verbose: args.verbose,
            preset: None,
        };

        if args.quick {
            config.apply_quick();
        }
        if args.stress {
            config.apply_stress();
        }
        if config.rounds.is_none() && config.duration_ms.is_none() {
            config.rounds = Some(100);
        }

        config
    }

    fn apply_quick(&mut self) {
        self.preset = Some("quick".to_string());
        self.rounds = Some(50);
        self.duration_ms = None;
        self.pool_size = 2;
        self.tasks = 4;
        self.max_batch = 4;
        self.fail_rate = 0.2;
        self.panic_rate = 0.01;
    }

    fn apply_stress(&mut self) {
        self.preset = Some("stress".to_string());
        self.rounds = Some(5_000);
        self.duration_ms = None;
        self.pool_size = 16;
        self.tasks = 64;
        self.max_batch = 12;
        self.fail_rate = 0.3;
        self.panic_rate = 0.02;
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
