//! Focus Sensor Agent CLI
//!
//! Camera-based study focus scoring from facial landmarks.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use focus_sensor_agent::{
    collector::{Collector, CollectorConfig, FrameSource},
    config::Config,
    core::{EngineState, FocusEngine, FocusSample, ReportBuilder, SessionRecorder, SessionReport},
    transparency::{create_shared_log_with_persistence, read_counts, Counter},
    PRIVACY_DECLARATION, VERSION,
};

#[cfg(feature = "verifier")]
use focus_sensor_agent::{BlockingVerifierClient, VerifierConfig};

#[derive(Parser)]
#[command(name = "focus-sensor")]
#[command(version = VERSION)]
#[command(about = "Camera-based study focus scoring from facial landmarks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a stream of landmark frames and record the session
    Run {
        /// JSON Lines frame source (a file path, or - for stdin)
        #[arg(long, short, default_value = "-")]
        input: String,

        /// Replay pace in frames per second (default: as fast as read)
        #[arg(long)]
        fps: Option<f64>,

        /// Do not print per-second samples
        #[arg(long)]
        quiet: bool,
    },

    /// Show configuration and cumulative statistics
    Status,

    /// Display privacy declaration
    Privacy,

    /// Combine exported session reports
    Export {
        /// Directory holding session reports
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Export format (json or jsonl)
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Show configuration
    Config,

    /// Verify a face snapshot against an expected user
    #[cfg(feature = "verifier")]
    Verify {
        /// JPEG snapshot to verify
        #[arg(long)]
        image: PathBuf,

        /// Expected user name
        #[arg(long)]
        user: String,

        /// Verifier base URL
        #[arg(long, default_value = "http://localhost:8000")]
        url: String,
    },

    /// Host focus sessions over HTTP
    #[cfg(feature = "server")]
    Serve {
        /// Port to bind on 127.0.0.1
        #[arg(long, default_value = "8787")]
        port: u16,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { input, fps, quiet } => {
            cmd_run(&input, fps, quiet);
        }
        Commands::Status => {
            cmd_status();
        }
        Commands::Privacy => {
            cmd_privacy();
        }
        Commands::Export { output, format } => {
            cmd_export(output, &format);
        }
        Commands::Config => {
            cmd_config();
        }
        #[cfg(feature = "verifier")]
        Commands::Verify { image, user, url } => {
            cmd_verify(image, &user, url);
        }
        #[cfg(feature = "server")]
        Commands::Serve { port } => {
            cmd_serve(port);
        }
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`).
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: {e}; using default configuration");
        Config::default()
    })
}

fn cmd_run(input: &str, fps: Option<f64>, quiet: bool) {
    println!("Focus Sensor Agent v{VERSION}");
    println!();

    let config = load_config();
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let source = FrameSource::from_arg(input);
    println!("Starting session...");
    match &source {
        FrameSource::Stdin => println!("  Frames: stdin"),
        FrameSource::File(path) => println!("  Frames: {}", path.display()),
    }
    println!(
        "  Calibration: first {} frames",
        config.engine.calibration.frames
    );
    println!("  Sample interval: {}s", config.sample_interval.as_secs());
    println!();
    println!("Keep looking at your study material while calibrating.");
    println!("Press Ctrl+C to stop");
    println!();

    let transparency_log =
        create_shared_log_with_persistence(config.data_path.join("transparency.json"));

    let mut collector = Collector::new(CollectorConfig { source, fps });
    if let Err(e) = collector.start() {
        eprintln!("Error starting collector: {e}");
        std::process::exit(1);
    }

    let report_builder = match config.tz() {
        Ok(tz) => ReportBuilder::new().with_timezone(tz),
        Err(e) => {
            eprintln!("Warning: {e}; reporting in UTC");
            ReportBuilder::new()
        }
    };
    println!("Instance ID: {}", report_builder.instance_id());

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    let mut engine = FocusEngine::new(config.engine.clone());
    let session_id = uuid::Uuid::new_v4().to_string();
    let mut recorder: Option<SessionRecorder> = None;
    let mut last_timestamp: Option<DateTime<Utc>> = None;
    let mut was_calibrated = false;

    let receiver = collector.receiver().clone();

    while running.load(Ordering::SeqCst) {
        let event = match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => event,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                println!("Frame source exhausted");
                break;
            }
        };

        let frame = event.frame();
        let rejected_before = engine.rejected_frames();
        let sample = engine.process(frame.as_ref());

        transparency_log.record_frame(frame.is_some());
        transparency_log.add(
            Counter::FramesRejected,
            engine.rejected_frames() - rejected_before,
        );

        if !was_calibrated && engine.is_calibrated() {
            was_calibrated = true;
            println!("[{}] Calibration complete", event.timestamp.format("%H:%M:%S"));
        }

        // The session clock starts at the first frame, so replays of old
        // recordings keep their own timeline.
        let recorder = recorder.get_or_insert_with(|| {
            SessionRecorder::new(session_id.clone(), event.timestamp, config.sample_interval)
        });
        if recorder.record(event.timestamp, &sample) {
            transparency_log.increment(Counter::SamplesRecorded);
            if !quiet {
                print_sample(event.timestamp, &sample, engine.state());
            }
        }
        last_timestamp = Some(event.timestamp);
    }

    println!();
    println!("Stopping session...");
    collector.stop();

    let skipped = collector.skipped_lines();
    if skipped > 0 {
        eprintln!("Warning: skipped {skipped} malformed frame line(s)");
    }

    if let Some(recorder) = recorder.filter(|r| !r.is_empty()) {
        let ended_at = last_timestamp.unwrap_or_else(Utc::now);
        let report = report_builder.build(&recorder, ended_at);
        print_summary(&report);

        let export_path = config
            .export_path
            .join(report_file_name(Utc::now(), recorder.session_id()));

        if let Some(parent) = export_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        match serde_json::to_string_pretty(&report) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&export_path, json) {
                    eprintln!("Error writing report: {e}");
                } else {
                    println!("Exported session report to {export_path:?}");
                    transparency_log.increment(Counter::ReportsExported);
                }
            }
            Err(e) => {
                eprintln!("Error serializing report: {e}");
            }
        }
    } else {
        println!("No frames received; nothing to export.");
    }

    if let Err(e) = transparency_log.save() {
        eprintln!("Warning: Could not save transparency log: {e}");
    }

    println!();
    println!("{}", transparency_log.summary());
}

/// `session_<utc time>_<id prefix>.json`; the id keeps runs that end
/// in the same second apart.
fn report_file_name(ended_at: DateTime<Utc>, session_id: &str) -> String {
    let prefix: String = session_id.chars().filter(|c| *c != '-').take(8).collect();
    format!("session_{}_{prefix}.json", ended_at.format("%Y%m%d_%H%M%S"))
}

fn print_sample(timestamp: DateTime<Utc>, sample: &FocusSample, state: EngineState) {
    let label = sample
        .distraction_type
        .map(|d| d.as_str())
        .unwrap_or("-");
    let mode = match state {
        EngineState::Calibrating {
            collected,
            required,
        } => format!("calibrating {collected}/{required}"),
        EngineState::Focused => "focused".to_string(),
        EngineState::MinorDeviation => "minor deviation".to_string(),
        EngineState::Distracted => "distracted".to_string(),
        EngineState::FaceLost => "face lost".to_string(),
    };
    println!(
        "[{}] score {:>3} | {:<7} | {:<17} | {}",
        timestamp.format("%H:%M:%S"),
        sample.focus_score,
        sample.gaze_direction.as_str(),
        label,
        mode
    );
}

fn print_summary(report: &SessionReport) {
    let summary = &report.summary;
    println!();
    println!("Session Summary:");
    println!("  Started: {}", report.started_at_local);
    println!("  Duration: {}s", summary.duration_secs);
    println!("  Effective duration: {}s", summary.effective_duration_secs);
    println!("  Average score: {:.1}", summary.average_score);
    println!("  Focused: {:.0}%", summary.focused_ratio * 100.0);
    println!("  Distracted: {}s", summary.distraction_count);
    for (kind, secs) in &summary.distraction_breakdown {
        println!("    {kind}: {secs}s");
    }
}

fn cmd_status() {
    let config = load_config();

    println!("Focus Sensor Agent Status");
    println!("=========================");
    println!();

    println!("Configuration:");
    println!(
        "  Calibration frames: {}",
        config.engine.calibration.frames
    );
    println!("  Sample interval: {}s", config.sample_interval.as_secs());
    println!("  Timezone: {}", config.timezone);
    println!("  Export path: {:?}", config.export_path);
    println!();

    match read_counts(&config.data_path.join("transparency.json")) {
        Ok(Some(counts)) => {
            println!("Cumulative Statistics:");
            for counter in Counter::ALL {
                println!("  {}: {}", counter.label(), counts.get(counter));
            }
        }
        Ok(None) => println!("No previous session data found."),
        Err(e) => eprintln!("Warning: could not read statistics: {e}"),
    }
}

fn cmd_privacy() {
    println!("{PRIVACY_DECLARATION}");
}

fn cmd_export(output: Option<PathBuf>, format: &str) {
    if format != "json" && format != "jsonl" {
        eprintln!("Error: unknown export format '{format}' (expected json or jsonl)");
        std::process::exit(1);
    }

    let config = load_config();
    let export_dir = output.unwrap_or(config.export_path.clone());

    let mut session_files: Vec<PathBuf> = std::fs::read_dir(&export_dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.extension().map(|e| e == "json").unwrap_or(false)
                        && p.file_name()
                            .and_then(|n| n.to_str())
                            .is_some_and(|n| n.starts_with("session_"))
                })
                .collect()
        })
        .unwrap_or_default();
    session_files.sort();

    if session_files.is_empty() {
        println!("No session reports found in {export_dir:?}");
        println!("Run 'focus-sensor run' to record a session.");
        return;
    }

    println!(
        "Found {} session file(s) in {:?}",
        session_files.len(),
        export_dir
    );

    let mut reports: Vec<SessionReport> = Vec::new();
    for file in &session_files {
        match std::fs::read_to_string(file)
            .map_err(|e| e.to_string())
            .and_then(|c| serde_json::from_str::<SessionReport>(&c).map_err(|e| e.to_string()))
        {
            Ok(report) => reports.push(report),
            Err(e) => eprintln!("Warning: skipping {file:?}: {e}"),
        }
    }

    println!("Total sessions: {}", reports.len());

    let output_path = export_dir.join(format!(
        "export_{}.{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        format
    ));

    let result = if format == "jsonl" {
        let lines: Vec<String> = reports
            .iter()
            .filter_map(|r| serde_json::to_string(r).ok())
            .collect();
        std::fs::write(&output_path, lines.join("\n"))
    } else {
        match serde_json::to_string_pretty(&reports) {
            Ok(json) => std::fs::write(&output_path, json),
            Err(e) => {
                eprintln!("Error serializing: {e}");
                return;
            }
        }
    };

    match result {
        Ok(_) => println!("Exported to {output_path:?}"),
        Err(e) => eprintln!("Error writing export: {e}"),
    }
}

fn cmd_config() {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

#[cfg(feature = "verifier")]
fn cmd_verify(image: PathBuf, user: &str, url: String) {
    let client = match BlockingVerifierClient::new(VerifierConfig::new(url)) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    match client.verify_file(&image, user) {
        Ok(verification) => {
            println!("{verification}");
            if !verification.is_verified() {
                std::process::exit(2);
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(feature = "server")]
fn cmd_serve(port: u16) {
    use focus_sensor_agent::server::{run, ServerConfig};

    let config = load_config();
    let server_config = match ServerConfig::from_config(&config, port) {
        Ok(server_config) => server_config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error creating runtime: {e}");
            std::process::exit(1);
        }
    };

    runtime.block_on(async {
        let (addr, shutdown_tx) = match run(server_config).await {
            Ok(started) => started,
            Err(e) => {
                eprintln!("Error starting server: {e}");
                std::process::exit(1);
            }
        };
        println!("Serving focus sessions on http://{addr}");
        println!("Press Ctrl+C to stop");

        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("Error waiting for Ctrl+C: {e}");
        }
        let _ = shutdown_tx.send(());
    });
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }
}
