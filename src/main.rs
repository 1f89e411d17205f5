mod cli;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{warn, Level};

use cli::{Cli, Command};
use voxrange::analysis::batch::{AnalysisReport, BatchAnalyzer};
use voxrange::audio::capture::MicCapture;
use voxrange::audio::session::SessionContext;
use voxrange::audio::{devices, wav};
use voxrange::config::{self, AppConfig};
use voxrange::display::{self, ConsoleDisplay};
use voxrange::dsp::frames::SampleBuffer;
use voxrange::dsp::pitch::EstimatorKind;
use voxrange::paths;

/// How often the record loop redraws and polls the keyboard.
const UI_TICK: Duration = Duration::from_millis(50);

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Devices => {
            let devices = devices::list_input_devices()?;
            display::print_devices(&devices);
            Ok(())
        }

        Command::Record {
            save,
            json,
            estimator,
        } => {
            let config = load_with_override(estimator)?;
            let report = record(config, save.as_deref())?;
            emit(&report, json)
        }

        Command::Analyze {
            path,
            json,
            estimator,
        } => {
            let config = load_with_override(estimator)?;
            let report = analyze_file(config, &path)?;
            emit(&report, json)
        }

        Command::Config => {
            let config = config::load_config()?;
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }

        Command::Paths => {
            println!("Config: {}", paths::config_file().display());
            Ok(())
        }
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn load_with_override(estimator: Option<EstimatorKind>) -> Result<AppConfig> {
    let mut config = config::load_config()?;
    if let Some(kind) = estimator {
        config.analysis.estimator = kind;
    }
    Ok(config)
}

fn emit(report: &AnalysisReport, json: bool) -> Result<()> {
    if json {
        println!("{}", display::report_json(report)?);
    } else {
        display::print_report(report);
    }
    Ok(())
}

/// Record until Enter, showing live pitch, then analyze in the background
/// behind a progress bar.
fn record(config: AppConfig, save: Option<&Path>) -> Result<AnalysisReport> {
    let device = config.capture.device.clone();
    let window_size = config.monitor.window_size;
    let ctx = SessionContext::new(config)?;

    println!();
    println!("  {}", style("Sing!").bold());
    println!("  Press {} to stop.", style("Enter").cyan().bold());
    println!();

    let session = ctx.start(|| MicCapture::start(&device, window_size))?;
    let live = session.live_state();
    let console = ConsoleDisplay::new();

    let waited = wait_for_enter(|| console.render_live(&live.snapshot()).map_err(Into::into));
    if let Err(e) = console.finish_live() {
        warn!("failed to clear the live line: {e}");
    }

    // Stop before reporting a keyboard error so the device is released.
    let finished = session.finish()?;
    waited?;

    if let Some(path) = save {
        save_recording(path, finished.buffer());
    }

    let handle = finished.analyze_in_background();
    let pb = progress_bar(handle.progress().1);
    while !handle.is_finished() {
        pb.set_position(handle.progress().0 as u64);
        std::thread::sleep(UI_TICK);
    }
    pb.finish_and_clear();

    Ok(handle.join()?)
}

/// Write the recording to `path`. A failed save is reported but does not
/// stop the analysis that follows.
fn save_recording(path: &Path, buffer: &SampleBuffer) -> bool {
    match wav::save_samples(path, buffer) {
        Ok(()) => {
            println!("  Saved: {}", path.display());
            true
        }
        Err(e) => {
            warn!(path = %path.display(), "failed to save recording: {e}");
            eprintln!(
                "  {} could not save {}: {e}",
                style("Warning:").yellow().bold(),
                path.display()
            );
            false
        }
    }
}

fn analyze_file(config: AppConfig, path: &Path) -> Result<AnalysisReport> {
    let buffer = wav::load_samples(path)
        .with_context(|| format!("Failed to load WAV file: {}", path.display()))?;
    let analyzer = BatchAnalyzer::new(config.analysis)?;

    let pb = progress_bar(analyzer.window_count(buffer.len()));
    let report = analyzer.analyze_with_progress(&buffer, |done| pb.set_position(done as u64));
    pb.finish_and_clear();

    Ok(report?)
}

fn progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::with_template("  Analyzing {bar:30.green/dim} {pos}/{len}") {
        pb.set_style(style);
    }
    pb
}

/// Block until the user presses Enter, calling `on_tick` between polls.
fn wait_for_enter(mut on_tick: impl FnMut() -> Result<()>) -> Result<()> {
    crossterm::terminal::enable_raw_mode()?;

    let result = loop {
        if let Err(e) = on_tick() {
            break Err(e);
        }
        match event::poll(UI_TICK) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press && key.code == KeyCode::Enter => {
                    break Ok(());
                }
                Ok(_) => {}
                Err(e) => break Err(e.into()),
            },
            Ok(false) => {}
            Err(e) => break Err(e.into()),
        }
    };

    crossterm::terminal::disable_raw_mode()?;
    result
}
