use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand, ValueEnum};
use hrvlog_lib::{
    analyze, analyze_batch, classify_latest, estimate_psd, frequency_domain,
    io::{records as records_io, text as text_io},
    plot::{figure_from_intervals, figure_from_log, figure_from_psd, Figure, Series},
    stats::log_report,
    time_domain, HrvError, IntervalSeries, PipelineConfig, SessionInput, SessionMeta,
    SessionStore, ValidationReport,
};
use hrvlog_store::{load_config, CsvSessionStore};
use log::{info, warn};
use plotters::prelude::*;
use serde::Serialize;
use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "hrvlog",
    version,
    about = "hrvlog: heart-rate-variability metrics and session log tools"
)]
struct Cli {
    /// TOML pipeline config; omitted keys keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum PlotKind {
    /// One metric across the stored log
    #[value(name = "trend")]
    Trend,
    /// Interval tachogram of a single recording
    #[value(name = "intervals")]
    Intervals,
    /// Welch spectrum of a single recording
    #[value(name = "psd")]
    Psd,
}

#[derive(Subcommand)]
enum Commands {
    /// Time-domain HRV from newline-delimited intervals (ms), stdin or --input
    HrvTime {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Frequency-domain HRV (Welch PSD) from newline-delimited intervals (ms)
    HrvPsd {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        resample_hz: Option<f64>,
    },
    /// Full analysis of one recording (.txt intervals or .csv beat records)
    Analyze {
        #[arg(long)]
        input: PathBuf,
        /// Defaults to the file stem
        #[arg(long)]
        session_id: Option<String>,
        /// `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` or RFC 3339
        #[arg(long)]
        date: Option<String>,
        /// Upsert the result into this CSV log
        #[arg(long)]
        store: Option<PathBuf>,
        /// Extra `key=value` fields carried on the session
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    /// Analyze every .txt/.csv recording in a directory and upsert into the log
    Ingest {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        store: PathBuf,
    },
    /// Classify the most recent session in the log
    Status {
        #[arg(long)]
        store: PathBuf,
    },
    /// Summary statistics over the whole log
    Report {
        #[arg(long)]
        store: PathBuf,
    },
    /// Render a figure to PNG via plotters
    Plot {
        #[arg(long, value_enum, default_value = "trend")]
        kind: PlotKind,
        #[arg(long)]
        store: Option<PathBuf>,
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, default_value = "rmssd")]
        metric: String,
        #[arg(long, default_value_t = 7)]
        window: usize,
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let cfg = match cli.config.as_deref() {
        Some(path) => load_config(path)?,
        None => PipelineConfig::default(),
    };
    match cli.command {
        Commands::HrvTime { input } => cmd_hrv_time(input.as_deref(), &cfg)?,
        Commands::HrvPsd { input, resample_hz } => {
            cmd_hrv_psd(input.as_deref(), resample_hz, &cfg)?
        }
        Commands::Analyze {
            input,
            session_id,
            date,
            store,
            fields,
        } => cmd_analyze(
            &input,
            session_id,
            date.as_deref(),
            store.as_deref(),
            fields,
            &cfg,
        )?,
        Commands::Ingest { dir, store } => cmd_ingest(&dir, &store, &cfg)?,
        Commands::Status { store } => cmd_status(&store, &cfg)?,
        Commands::Report { store } => cmd_report(&store)?,
        Commands::Plot {
            kind,
            store,
            input,
            metric,
            window,
            out,
        } => cmd_plot(
            kind,
            store.as_deref(),
            input.as_deref(),
            &metric,
            window,
            &out,
            &cfg,
        )?,
    }
    Ok(())
}

fn parse_field(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.trim().to_string())),
        _ => Err(format!("expected key=value, got `{raw}`")),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDateTime> {
    if let Some(ts) = records_io::parse_timestamp(raw) {
        return Ok(ts);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| anyhow!("unrecognised date `{raw}`"))
}

fn read_samples(input: Option<&Path>) -> Result<Vec<f64>> {
    match input {
        Some(path) => Ok(text_io::read_rr_ms(path)?),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(text_io::parse_rr_ms(&buf)?)
        }
    }
}

fn series_from_input(
    input: Option<&Path>,
    cfg: &PipelineConfig,
) -> Result<(IntervalSeries, ValidationReport)> {
    let rr_ms = read_samples(input)?;
    Ok(IntervalSeries::from_millis(&rr_ms, None, &cfg.validation)?)
}

/// Metrics together with the intervals that were dropped to compute them.
#[derive(Serialize)]
struct Checked<T> {
    metrics: T,
    validation: ValidationReport,
}

fn cmd_hrv_time(input: Option<&Path>, cfg: &PipelineConfig) -> Result<()> {
    let (series, validation) = series_from_input(input, cfg)?;
    let metrics = time_domain(&series, cfg.time_domain.sd2);
    println!("{}", serde_json::to_string(&Checked { metrics, validation })?);
    Ok(())
}

fn cmd_hrv_psd(input: Option<&Path>, resample_hz: Option<f64>, cfg: &PipelineConfig) -> Result<()> {
    let mut cfg = cfg.clone();
    if let Some(fs) = resample_hz {
        cfg.spectral.resample_hz = fs;
    }
    cfg.validate()?;
    let (series, validation) = series_from_input(input, &cfg)?;
    let psd = estimate_psd(&series, &cfg.spectral)?;
    let metrics = frequency_domain(&psd, cfg.spectral.integration);
    println!("{}", serde_json::to_string(&Checked { metrics, validation })?);
    Ok(())
}

/// Intervals plus what the file says about the session. Auxiliary CSV
/// channels land in `meta.extras`.
fn load_recording(path: &Path) -> Result<SessionInput> {
    let is_csv = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    let (rr_ms, start, extras) = if is_csv {
        let records = records_io::read_records(path)
            .with_context(|| format!("reading beat records {}", path.display()))?;
        (
            records_io::rr_ms(&records),
            records_io::session_start(&records),
            records_io::session_extras(&records),
        )
    } else {
        let rr = text_io::read_rr_ms(path)
            .with_context(|| format!("reading intervals {}", path.display()))?;
        (rr, None, Default::default())
    };
    let date = match start {
        Some(ts) => ts,
        None => modified_time(path)?,
    };
    let session_id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("cannot derive a session id from {}", path.display()))?
        .to_string();
    let mut meta = SessionMeta::new(session_id, date);
    meta.source = Some(path.display().to_string());
    meta.extras = extras;
    Ok(SessionInput { meta, rr_ms })
}

fn modified_time(path: &Path) -> Result<NaiveDateTime> {
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("reading modification time of {}", path.display()))?;
    Ok(DateTime::<Local>::from(modified).naive_local())
}

fn cmd_analyze(
    input: &Path,
    session_id: Option<String>,
    date: Option<&str>,
    store: Option<&Path>,
    fields: Vec<(String, String)>,
    cfg: &PipelineConfig,
) -> Result<()> {
    let SessionInput { mut meta, rr_ms } = load_recording(input)?;
    if let Some(id) = session_id {
        meta.session_id = id;
    }
    if let Some(raw) = date {
        meta.date = parse_date(raw)?;
    }
    meta.extras.extend(fields);
    let result = analyze(&rr_ms, meta, cfg)
        .with_context(|| format!("analyzing {}", input.display()))?;
    if let Some(path) = store {
        let mut store = CsvSessionStore::open(path)?;
        if store.upsert(result.clone())?.is_some() {
            info!("replaced existing session {}", result.session_id());
        }
    }
    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

#[derive(Serialize)]
struct IngestFailure {
    source: String,
    error: String,
}

#[derive(Serialize)]
struct IngestSummary {
    ingested: usize,
    replaced: usize,
    failed: Vec<IngestFailure>,
    total_sessions: usize,
}

fn recordings_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        let wanted = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("txt") || ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if path.is_file() && wanted {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn cmd_ingest(dir: &Path, store_path: &Path, cfg: &PipelineConfig) -> Result<()> {
    cfg.validate()?;
    let mut failed = Vec::new();
    let mut inputs = Vec::new();
    for path in recordings_in(dir)? {
        match load_recording(&path) {
            Ok(input) => inputs.push(input),
            Err(err) => {
                warn!("skipping {}: {err:#}", path.display());
                failed.push(IngestFailure {
                    source: path.display().to_string(),
                    error: format!("{err:#}"),
                });
            }
        }
    }
    let mut results = Vec::new();
    for (id, outcome) in analyze_batch(inputs, cfg) {
        match outcome {
            Ok(result) => results.push(result),
            Err(err) => failed.push(IngestFailure {
                source: id,
                error: err.to_string(),
            }),
        }
    }
    let ingested = results.len();
    let mut store = CsvSessionStore::open(store_path)?;
    let replaced = store.upsert_many(results)?;
    info!(
        "ingested {ingested} sessions into {} ({} failed)",
        store_path.display(),
        failed.len()
    );
    let summary = IngestSummary {
        ingested,
        replaced,
        failed,
        total_sessions: store.len(),
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn cmd_status(store_path: &Path, cfg: &PipelineConfig) -> Result<()> {
    let store = CsvSessionStore::open(store_path)?;
    let status = classify_latest(&store, &cfg.classifier).map_err(|err| match err {
        HrvError::NoData => anyhow!("no sessions in {}", store_path.display()),
        other => other.into(),
    })?;
    println!("{}", serde_json::to_string(&status)?);
    Ok(())
}

fn cmd_report(store_path: &Path) -> Result<()> {
    let store = CsvSessionStore::open(store_path)?;
    let report = log_report(store.sessions());
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn cmd_plot(
    kind: PlotKind,
    store: Option<&Path>,
    input: Option<&Path>,
    metric: &str,
    window: usize,
    out: &Path,
    cfg: &PipelineConfig,
) -> Result<()> {
    let fig = match kind {
        PlotKind::Trend => {
            let path = store.ok_or_else(|| anyhow!("--store is required for a trend plot"))?;
            let store = CsvSessionStore::open(path)?;
            if store.is_empty() {
                bail!("no sessions in {}", path.display());
            }
            let fig = figure_from_log(store.sessions(), metric, window);
            if fig.bounds().is_none() {
                bail!("metric `{metric}` has no values in {}", path.display());
            }
            fig
        }
        PlotKind::Intervals => figure_from_intervals(&series_from_input(input, cfg)?.0, 4096),
        PlotKind::Psd => {
            let (series, _) = series_from_input(input, cfg)?;
            figure_from_psd(&estimate_psd(&series, &cfg.spectral)?, 4096)
        }
    };
    draw_plotters_figure(out, &fig)
        .with_context(|| format!("rendering {}", out.display()))?;
    Ok(())
}

fn rgb(color: hrvlog_lib::plot::Color) -> RGBColor {
    RGBColor(
        ((color.0 >> 16) & 0xFF) as u8,
        ((color.0 >> 8) & 0xFF) as u8,
        (color.0 & 0xFF) as u8,
    )
}

fn padded(lo: f64, hi: f64) -> (f64, f64) {
    if hi > lo {
        let pad = (hi - lo) * 0.05;
        (lo - pad, hi + pad)
    } else {
        (lo - 1.0, hi + 1.0)
    }
}

fn draw_plotters_figure(path: &Path, fig: &Figure) -> Result<()> {
    let (x_min, x_max, y_min, y_max) = fig.bounds().unwrap_or((0.0, 1.0, 0.0, 1.0));
    let (x_min, x_max) = padded(x_min, x_max);
    let (y_min, y_max) = padded(y_min, y_max);
    let backend = BitMapBackend::new(path, (800, 480));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(
            fig.title.clone().unwrap_or_else(|| "Plot".into()),
            ("sans-serif", 24),
        )
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    chart
        .configure_mesh()
        .x_desc(fig.x.label.clone().unwrap_or_default())
        .y_desc(fig.y.label.clone().unwrap_or_default())
        .draw()?;
    for series in &fig.series {
        match series {
            Series::Line(line) => {
                let width = line.style.width.round().max(1.0) as u32;
                let style = rgb(line.style.color).stroke_width(width);
                let points = line.points.iter().map(|p| (p[0], p[1]));
                match line.style.dash {
                    Some([size, gap]) => {
                        chart.draw_series(DashedLineSeries::new(
                            points,
                            size.round() as u32,
                            gap.round() as u32,
                            style,
                        ))?;
                    }
                    None => {
                        chart.draw_series(LineSeries::new(points, style))?;
                    }
                }
            }
            Series::Scatter(scatter) => {
                let color = rgb(scatter.color);
                let radius = scatter.radius.round().max(1.0) as u32;
                chart.draw_series(
                    scatter
                        .points
                        .iter()
                        .map(|p| Circle::new((p[0], p[1]), radius, color.filled())),
                )?;
            }
        }
    }
    root.present()?;
    Ok(())
}
