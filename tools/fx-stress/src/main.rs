//! FX-Stress: drive many concurrent exchanges over a simulated device.

use std::time::Duration;

use clap::Parser;
use fx_stress::{run_stress, StressConfig};
use fx_telemetry::{init_telemetry, log_event, TelemetryConfig};

/// FX-Stress: concurrent exchange stress harness
#[derive(Parser, Debug)]
#[command(name = "fx-stress")]
#[command(about = "Race responses, timeouts and supersession across shared correlation keys")]
struct Args {
    /// Number of concurrent senders
    #[arg(short, long, default_value = "40")]
    senders: usize,

    /// Number of distinct correlation keys
    #[arg(short, long, default_value = "3")]
    keys: usize,

    /// Send and response timeout in milliseconds
    #[arg(short, long, default_value = "50")]
    timeout_ms: u64,

    /// Minimum simulated answer delay in milliseconds
    #[arg(long, default_value = "0")]
    min_delay_ms: u64,

    /// Answer delay step in milliseconds
    #[arg(long, default_value = "10")]
    delay_step_ms: u64,

    /// Number of distinct answer delays
    #[arg(long, default_value = "5")]
    delay_buckets: usize,

    /// Random extra answer delay bound in milliseconds
    #[arg(long, default_value = "0")]
    jitter_ms: u64,

    /// Dispatcher pause after each frame in milliseconds
    #[arg(long, default_value = "10")]
    frame_gap_ms: u64,

    /// RNG seed for reproducible jitter
    #[arg(long)]
    seed: Option<u64>,

    /// Number of rounds to run
    #[arg(short, long, default_value = "1")]
    rounds: usize,

    /// Log level (overrides FX_LOG_LEVEL)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn stress_config(&self) -> StressConfig {
        StressConfig {
            senders: self.senders,
            keys: self.keys,
            min_delay: Duration::from_millis(self.min_delay_ms),
            delay_step: Duration::from_millis(self.delay_step_ms),
            delay_buckets: self.delay_buckets,
            jitter: Duration::from_millis(self.jitter_ms),
            timeout: Duration::from_millis(self.timeout_ms),
            frame_gap: Duration::from_millis(self.frame_gap_ms),
            seed: self.seed,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut telemetry = TelemetryConfig::for_service("fx-stress");
    if let Some(level) = &args.log_level {
        telemetry = telemetry.with_log_level(level.clone());
    }
    let _guard = init_telemetry(telemetry)?;

    let config = args.stress_config();
    let mut dirty_rounds = 0;

    for round in 1..=args.rounds.max(1) {
        let report = run_stress(&config).await?;
        if !report.is_clean() {
            dirty_rounds += 1;
            log_event!(
                warn,
                "fx-stress",
                "Round left unaccounted senders or registry entries",
                round = round,
                lost = report.lost,
                residual = report.residual_entries
            );
        }
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if dirty_rounds > 0 {
        anyhow::bail!("{dirty_rounds} round(s) were not clean");
    }
    Ok(())
}
