//! Replay stored ping observations through the trends pipeline.
//!
//! Reads a JSON-lines observation file or a SQLite row store and prints one
//! JSON response per probe on stdout.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use trends_core::{check_window, Config, MeasurementMeta, MeasurementParameters, RawObservation};
use trends_ingestion::{MemoryRowSource, RowScan, RowSource, SqliteRowSource};
use trends_summary::{ProbeInput, ReportKind, RttBandClassifier, TrendsPipeline};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON-lines file, one observation per line.
    #[arg(long, value_name = "FILE", conflicts_with = "db", required_unless_present = "db")]
    input: Option<PathBuf>,

    /// SQLite row store.
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,

    /// Measurement id used in row keys.
    #[arg(long)]
    msm_id: i64,

    /// Probe to replay. Repeatable; defaults to every probe in the input file.
    #[arg(long = "probe", value_name = "ID")]
    probes: Vec<i64>,

    /// Measurement metadata (JSON). Supplies interval, start, spread and
    /// jitter, and is checked for trend eligibility.
    #[arg(long, value_name = "FILE")]
    meta: Option<PathBuf>,

    /// Measurement interval in seconds.
    #[arg(long, required_unless_present = "meta")]
    interval: Option<i64>,

    /// Measurement start (epoch seconds).
    #[arg(long, required_unless_present = "meta")]
    start_epoch: Option<i64>,

    /// Spread in seconds. Defaults to half the interval.
    #[arg(long)]
    spread: Option<f64>,

    /// Probe jitter in seconds.
    #[arg(long, default_value_t = 0.0)]
    jitter: f64,

    /// Window start (epoch seconds). Defaults to the measurement start.
    #[arg(long)]
    seek_start: Option<i64>,

    /// Number of ticks requested.
    #[arg(long)]
    ticks: u32,

    /// Output representation: raw or summary.
    #[arg(long, default_value = "summary")]
    report: ReportKind,

    /// TOML configuration file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the number of batch workers.
    #[arg(long, env = "TRENDS_WORKERS")]
    workers: Option<u32>,

    /// Log the per-run trace line.
    #[arg(long, default_value_t = false)]
    trace: bool,

    /// Pretty-print responses.
    #[arg(long, default_value_t = false)]
    pretty: bool,

    /// Verbose logging (DEBUG level)
    #[arg(long, short, default_value_t = false)]
    verbose: bool,
}

impl Args {
    /// Parameters from flags alone.
    fn parameters(&self) -> Result<MeasurementParameters> {
        let (Some(interval), Some(start_epoch)) = (self.interval, self.start_epoch) else {
            bail!("--interval and --start-epoch are required without --meta");
        };
        let params = MeasurementParameters {
            interval_seconds: interval,
            start_epoch,
            spread_seconds: self.spread.unwrap_or(interval as f64 / 2.0),
            jitter_seconds: self.jitter,
            seek_start_epoch: self.seek_start.unwrap_or(start_epoch),
            requested_tick_count: self.ticks,
        };
        params.validate()?;
        Ok(params)
    }

    /// Parameters from a metadata file, after the eligibility checks.
    fn parameters_from_meta(&self, path: &Path, config: &Config) -> Result<MeasurementParameters> {
        let text =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let meta: MeasurementMeta = serde_json::from_str(&text)
            .with_context(|| format!("{}: invalid measurement metadata", path.display()))?;

        let rejections = meta.check_eligibility(Utc::now(), config.validation.min_ticks);
        if !rejections.is_empty() {
            for rejection in &rejections {
                error!(msm_id = meta.msm_id, "{rejection}");
            }
            bail!("measurement {} is not eligible for trends", meta.msm_id);
        }

        let seek_start = self.seek_start.unwrap_or(meta.start_time);
        Ok(meta.parameters(seek_start, self.ticks)?)
    }

    fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => Config::default(),
        };
        if let Some(workers) = self.workers {
            config.batch.workers = workers;
        }
        if self.trace {
            config.reconcile.emit_trace = true;
        }
        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn epoch_to_utc(ts: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0).with_context(|| format!("timestamp {ts} out of range"))
}

/// Load a JSON-lines file into memory, returning the store and its probe ids.
fn load_jsonl(path: &Path, msm_id: i64) -> Result<(MemoryRowSource, BTreeSet<i64>)> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut source = MemoryRowSource::new();
    let mut probes = BTreeSet::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let obs: RawObservation = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid observation", path.display(), n + 1))?;
        probes.insert(obs.probe_id);
        source.insert_observation(msm_id, &obs)?;
    }
    info!(observations = source.len(), probes = probes.len(), "loaded {}", path.display());
    Ok((source, probes))
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = args.config()?;
    let params = match &args.meta {
        Some(path) => args.parameters_from_meta(path, &config)?,
        None => args.parameters()?,
    };
    check_window(&params, &config.validation)?;

    let (source, mut probes): (Box<dyn RowSource>, BTreeSet<i64>) =
        match (&args.input, &args.db) {
            (Some(path), _) => {
                let (source, probes) = load_jsonl(path, args.msm_id)?;
                (Box::new(source) as Box<dyn RowSource>, probes)
            }
            (None, Some(path)) => {
                let source = SqliteRowSource::open(path)
                    .with_context(|| format!("opening {}", path.display()))?;
                (Box::new(source) as Box<dyn RowSource>, BTreeSet::new())
            }
            (None, None) => bail!("either --input or --db is required"),
        };
    if !args.probes.is_empty() {
        probes = args.probes.iter().copied().collect();
    }
    if probes.is_empty() {
        bail!("no probes to replay; pass --probe");
    }

    let window_start = epoch_to_utc(params.seek_start_epoch)?;
    let window_stop = epoch_to_utc(
        params.seek_start_epoch + params.interval_seconds * i64::from(params.requested_tick_count),
    )?;

    let mut inputs = Vec::with_capacity(probes.len());
    for probe_id in probes {
        let scan = RowScan::for_window(args.msm_id, probe_id, window_start, window_stop);
        let rows = source.scan(&scan)?;
        inputs.push(ProbeInput { probe_id, rows });
    }

    let classifier = RttBandClassifier::new(config.bands.clone());
    let pipeline = TrendsPipeline::new(&config, Box::new(classifier));
    let outcomes = pipeline.run_batch(inputs, &params, args.report);

    let mut failed = 0;
    for outcome in outcomes {
        match outcome.result {
            Ok(response) => {
                let json = if args.pretty {
                    serde_json::to_string_pretty(&response)?
                } else {
                    serde_json::to_string(&response)?
                };
                println!("{json}");
            }
            Err(e) => {
                failed += 1;
                error!(probe_id = outcome.probe_id, error = %e, "probe failed");
            }
        }
    }

    if failed > 0 {
        info!(failed, "some probes produced no response");
    }
    Ok(())
}
