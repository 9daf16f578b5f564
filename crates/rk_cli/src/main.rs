//! rk CLI
//!
//! Loads server records through the provider chain and runs the forecast
//! engine over them:
//! - `stats`     headline statistics and opening-time patterns
//! - `forecast`  ARIMA/SARIMA forecast of openings per bucket
//! - `next`      next server(s): time, id, map type, district
//! - `rotation`  map-type rotation and transition analysis
//! - `alerts`    upcoming openings due for an announcement
//! - `export`    series and predictions as CSV files

#[cfg(feature = "live")]
mod live;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use rk_core::analysis::{
    analyze_time_patterns, district_counts, due_alerts, pattern_compliance, predict_map_types,
    transition_matrix, year_over_year, yearly_map_types,
};
use rk_core::data::{CsvProvider, JsonFileProvider, ProviderChain, SampleProvider};
use rk_core::export::{forecast_rows, next_server_rows, series_rows, to_json_pretty, write_csv};
use rk_core::{
    build_series, calculate_statistics, forecast_auto, predict_next_servers, AnalysisConfig,
    Granularity, MapType, SeriesFilter, ServerRecord,
};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rk", version)]
#[command(about = "Forecast server openings from the server directory", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Analysis config file (.yaml, .yml or .json)
    #[arg(long, global = true, env = "RK_CONFIG")]
    config: Option<PathBuf>,

    /// Preset used when no config file is given (default, quick, seasonal);
    /// falls back to RK_ANALYSIS_PROFILE
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Fallback file read when the live API is unavailable
    #[arg(long, global = true, env = "RK_FALLBACK_PATH", default_value = "data/fallback_data.json")]
    fallback: PathBuf,

    /// Read records from a local CSV export instead
    #[arg(long, global = true)]
    csv: Option<PathBuf>,

    /// Skip the live API
    #[arg(long, global = true)]
    offline: bool,

    /// Use only the embedded sample dataset
    #[arg(long, global = true)]
    sample: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[cfg(feature = "live")]
    #[command(flatten)]
    live: live::LiveArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Dataset statistics and opening-time patterns
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Forecast openings per bucket
    Forecast {
        #[arg(long, value_enum)]
        granularity: Option<Bucket>,

        /// Buckets to forecast
        #[arg(long)]
        horizon: Option<usize>,

        #[command(flatten)]
        filter: FilterArgs,

        /// Write the forecast as CSV
        #[arg(long)]
        out: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Predict the next server openings
    Next {
        /// Number of servers to predict [default: next_server.count]
        #[arg(long)]
        count: Option<usize>,

        /// Write the predictions as CSV
        #[arg(long)]
        out: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Map-type rotation analysis
    Rotation {
        /// Upcoming map types to list [default: next_server.count]
        #[arg(long)]
        count: Option<usize>,
    },

    /// Announcements due now for upcoming openings
    Alerts {
        /// Server id announced by the previous run
        #[arg(long)]
        last_notified: Option<u32>,

        #[arg(long)]
        json: bool,
    },

    /// Write daily/weekly/monthly series and next-server predictions as CSV
    Export {
        /// Output directory
        #[arg(long)]
        out: PathBuf,

        /// Servers to predict [default: next_server.count]
        #[arg(long)]
        count: Option<usize>,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Print the effective analysis config as JSON
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum Bucket {
    Day,
    Week,
    Month,
}

impl From<Bucket> for Granularity {
    fn from(bucket: Bucket) -> Self {
        match bucket {
            Bucket::Day => Granularity::Day,
            Bucket::Week => Granularity::Week,
            Bucket::Month => Granularity::Month,
        }
    }
}

#[derive(clap::Args)]
struct FilterArgs {
    /// Keep only these map types (repeatable)
    #[arg(long = "map-type")]
    map_types: Vec<String>,

    /// First opening date, inclusive (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last opening date, inclusive (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    #[arg(long)]
    year: Option<i32>,
}

impl FilterArgs {
    fn to_filter(&self) -> SeriesFilter {
        let mut filter = SeriesFilter::all().with_range(self.from, self.to);
        if !self.map_types.is_empty() {
            filter = filter.with_map_types(self.map_types.iter().map(String::as_str));
        }
        if let Some(year) = self.year {
            filter = filter.with_year(year);
        }
        filter
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;

    if let Commands::Config = cli.command {
        println!("{}", to_json_pretty(&config)?);
        return Ok(());
    }

    let chain = provider_chain(&cli)?;
    let (source, records) = chain
        .fetch_with_source()
        .context("no data source produced server records")?;
    println!("📡 {} servers loaded from {}", records.len(), source);

    match &cli.command {
        Commands::Stats { json } => run_stats(&records, *json)?,
        Commands::Forecast {
            granularity,
            horizon,
            filter,
            out,
            json,
        } => {
            let mut config = config;
            if let Some(bucket) = granularity {
                config.series.granularity = (*bucket).into();
            }
            if let Some(horizon) = horizon {
                config.forecast.horizon = *horizon;
            }
            config.validate()?;
            run_forecast(&records, &config, &filter.to_filter(), out.as_deref(), *json)?;
        }
        Commands::Next { count, out, json } => {
            let count = count.unwrap_or(config.next_server.count);
            run_next(&records, &config, count, out.as_deref(), *json)?
        }
        Commands::Rotation { count } => {
            run_rotation(&records, &config, count.unwrap_or(config.next_server.count))?
        }
        Commands::Alerts {
            last_notified,
            json,
        } => run_alerts(&records, &config, *last_notified, *json)?,
        Commands::Export { out, count, filter } => {
            let count = count.unwrap_or(config.next_server.count);
            run_export(&records, &config, &filter.to_filter(), out, count)?
        }
        Commands::Config => {}
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "rk=debug,rk_core=debug"
    } else {
        "rk=info,rk_core=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<AnalysisConfig> {
    if let Some(path) = &cli.config {
        return AnalysisConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()));
    }
    match &cli.profile {
        Some(profile) => AnalysisConfig::from_profile(profile)
            .with_context(|| format!("unknown profile {profile:?} (expected default, quick or seasonal)")),
        None => Ok(AnalysisConfig::from_env_or_default()),
    }
}

/// Sources in priority order: live API, fallback file, embedded sample.
fn provider_chain(cli: &Cli) -> Result<ProviderChain> {
    if cli.sample {
        return Ok(ProviderChain::new().with(SampleProvider));
    }
    if let Some(csv) = &cli.csv {
        return Ok(ProviderChain::new().with(CsvProvider::new(csv)));
    }

    let mut chain = ProviderChain::new();
    #[cfg(feature = "live")]
    if !cli.offline {
        let provider = live::LiveProvider::new(cli.live.clone(), &cli.fallback)
            .context("failed to build HTTP client")?;
        chain.push(Box::new(provider));
    }
    chain.push(Box::new(JsonFileProvider::new(&cli.fallback)));
    chain.push(Box::new(SampleProvider));
    Ok(chain)
}

// ============================================================================
// Commands
// ============================================================================

fn run_stats(records: &[ServerRecord], json: bool) -> Result<()> {
    let summary = calculate_statistics(records);
    let patterns = analyze_time_patterns(records);
    let map_shares = yearly_map_types(records);
    let districts = district_counts(records);
    let months = year_over_year(records);
    if json {
        println!("{}", to_json_pretty(&(summary, patterns, map_shares, districts, months))?);
        return Ok(());
    }

    println!("📊 Dataset");
    println!("   Servers:          {}", summary.total_servers);
    if let (Some(first), Some(last)) = (summary.first_opening, summary.last_opening) {
        println!("   First opening:    {}", first.format("%Y-%m-%d %H:%M"));
        println!("   Last opening:     {}", last.format("%Y-%m-%d %H:%M"));
    }
    println!("   Days per server:  {:.2}", summary.avg_days_per_server);
    println!("   Map types:        {}", summary.map_type_count);
    if let Some(map) = &summary.most_common_map_type {
        println!("   Most common map:  {map}");
    }
    println!("   Servers/month:    {:.2} (max {})", summary.avg_monthly_servers, summary.max_monthly_servers);

    println!("🕒 Opening times");
    if let Some(day) = patterns.most_common_weekday_name() {
        println!("   Weekday:          {} ({:.0}%)", day, patterns.weekdays.consistency * 100.0);
    }
    if let Some(hour) = patterns.hours.mode {
        println!("   Hour (UTC):       {:02}:00 ({:.0}%)", hour, patterns.hours.consistency * 100.0);
    }
    if let Some(mean) = patterns.mean_hours_between {
        println!("   Mean gap:         {:.1}h", mean);
    }
    if let Some(median) = patterns.median_hours_between {
        println!("   Median gap:       {:.1}h", median);
    }

    println!("🗺️  Map types by year");
    for share in &map_shares {
        println!(
            "   {} {:<24} {:>4} ({:.0}%)",
            share.year,
            share.map_type.as_str(),
            share.count,
            share.share * 100.0
        );
    }
    println!("🏙️  Districts");
    for (district, count) in &districts {
        println!("   {district:>4}  {count}");
    }
    println!("📅 Month over years");
    for month in &months {
        let counts: Vec<String> = month.counts.iter().map(|(y, c)| format!("{y}: {c}")).collect();
        match month.yoy_change_pct {
            Some(change) => println!("   {:02}  {}  ({:+.0}%)", month.month, counts.join(", "), change),
            None => println!("   {:02}  {}", month.month, counts.join(", ")),
        }
    }
    Ok(())
}

fn run_forecast(
    records: &[ServerRecord],
    config: &AnalysisConfig,
    filter: &SeriesFilter,
    out: Option<&Path>,
    json: bool,
) -> Result<()> {
    let series = build_series(records, config.series.granularity, filter, &config.series)?;
    let outcome = forecast_auto(&series, config)?;
    info!(buckets = series.len(), degraded = outcome.degraded, "forecast complete");

    if let Some(path) = out {
        let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        write_csv(file, &forecast_rows(&outcome.result))?;
        println!("💾 Forecast written to {}", path.display());
    }
    if json {
        println!("{}", to_json_pretty(&outcome)?);
        return Ok(());
    }

    let model = outcome
        .result
        .model
        .map_or_else(|| format!("{:?}", outcome.result.method), |m| m.to_string());
    println!("📈 {} over {} buckets", model, series.len());
    println!("   Mean per bucket:  {:.2}", series.mean());
    if outcome.result.method.is_naive() {
        println!("   ⚠️  model fit failed, naive fallback used");
    }
    if let Some(period) = outcome.decomposition.period {
        println!("   Seasonal period:  {period}");
    }
    println!(
        "   {:<12} {:>8} {:>8} {:>8}",
        "bucket", "value", "lower", "upper"
    );
    for point in &outcome.result.points {
        println!(
            "   {:<12} {:>8.2} {:>8.2} {:>8.2}",
            point.bucket.to_string(),
            point.value,
            point.lower,
            point.upper
        );
    }
    Ok(())
}

fn run_next(
    records: &[ServerRecord],
    config: &AnalysisConfig,
    count: usize,
    out: Option<&Path>,
    json: bool,
) -> Result<()> {
    let predictions = predict_next_servers(records, count.max(1), config, Utc::now())?;

    if let Some(path) = out {
        let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        write_csv(file, &next_server_rows(&predictions))?;
        println!("💾 Predictions written to {}", path.display());
    }
    if json {
        println!("{}", to_json_pretty(&predictions)?);
        return Ok(());
    }

    for p in &predictions {
        println!("🏰 Server {}", p.server_id);
        println!("   Opens:       {}", p.estimated_open_time.format("%Y-%m-%d %H:%M UTC"));
        println!("   Countdown:   {}", p.countdown_label());
        println!("   Map type:    {}", p.predicted_map_type);
        println!("   District:    {}", p.predicted_district_id);
        println!(
            "   Confidence:  {:.0}% (timing {:.0}%, map {:.0}%, district {:.0}%, id {:.0}%)",
            p.confidence * 100.0,
            p.components.timing * 100.0,
            p.components.map_type * 100.0,
            p.components.district * 100.0,
            p.components.server_id * 100.0
        );
    }
    Ok(())
}

fn run_rotation(records: &[ServerRecord], config: &AnalysisConfig, count: usize) -> Result<()> {
    let maps: Vec<MapType> = records.iter().map(|r| r.map_type.clone()).collect();
    let forecast = predict_map_types(&maps, count.max(1), &config.rotation)?;

    match &forecast.pattern {
        Some(pattern) => {
            let cycle: Vec<&str> = pattern.sequence.iter().map(MapType::as_str).collect();
            println!(
                "🔁 Rotation of length {} ({:.0}% consistent over {} servers)",
                pattern.period_length,
                pattern.consistency_score * 100.0,
                pattern.compared
            );
            println!("   Cycle: {}", cycle.join(" → "));
            if let Some(compliance) = pattern_compliance(&maps, pattern.period_length) {
                println!("   Whole-history compliance: {:.0}%", compliance.compliance * 100.0);
            }
        }
        None => println!("🔁 No rotation found, using the most frequent recent map type"),
    }

    println!("   Upcoming ({:.0}% confidence):", forecast.confidence * 100.0);
    for (k, map) in forecast.labels.iter().enumerate() {
        println!("   +{} {}", k + 1, map);
    }

    let matrix = transition_matrix(&maps);
    println!("🔀 Transitions");
    for from in matrix.counts.keys() {
        if let Some((next, p)) = matrix.most_likely_next(from) {
            println!("   {from} → {next} ({:.0}%)", p * 100.0);
        }
    }
    Ok(())
}

fn run_alerts(
    records: &[ServerRecord],
    config: &AnalysisConfig,
    last_notified: Option<u32>,
    json: bool,
) -> Result<()> {
    let predictions = predict_next_servers(records, config.alerts.lookahead, config, Utc::now())?;
    let alerts = due_alerts(&predictions, Utc::now(), &config.alerts, last_notified);

    if json {
        println!("{}", to_json_pretty(&alerts)?);
        return Ok(());
    }
    if alerts.is_empty() {
        println!(
            "🔕 No opening due in the next {:.0}-{:.0}h",
            config.alerts.lead_hours,
            config.alerts.lead_hours + config.alerts.window_hours
        );
    }
    for alert in &alerts {
        println!("🔔 {}", alert.message);
    }
    Ok(())
}

fn run_export(
    records: &[ServerRecord],
    config: &AnalysisConfig,
    filter: &SeriesFilter,
    dir: &Path,
    count: usize,
) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    for (name, granularity) in [
        ("daily", Granularity::Day),
        ("weekly", Granularity::Week),
        ("monthly", Granularity::Month),
    ] {
        let series = build_series(records, granularity, filter, &config.series)?;
        let path = dir.join(format!("{name}_series.csv"));
        write_csv(File::create(&path)?, &series_rows(&series))?;
        println!("💾 {} ({} buckets)", path.display(), series.len());
    }

    let predictions = predict_next_servers(records, count.max(1), config, Utc::now())?;
    let path = dir.join("next_servers.csv");
    write_csv(File::create(&path)?, &next_server_rows(&predictions))?;
    println!("💾 {} ({} servers)", path.display(), predictions.len());
    Ok(())
}
