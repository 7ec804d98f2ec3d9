// OncoPredict intake wizard
// Main library entry point

pub mod api;
pub mod config;
pub mod models;
pub mod persistence;
pub mod render;
pub mod report;
pub mod tui;
pub mod utils;
pub mod wizard;

use api::analysis::{AnalysisPipeline, AnalysisProgress, ProgressEmitter};
use api::client::HttpAnalysisClient;
use log::{error, info, warn};
use models::fields::FieldSchema;
use models::state::WizardSession;
use persistence::{FileStorage, MemoryStorage, PersistenceManager, Storage};
use report::ReportExporter;
use std::path::Path;
use std::sync::Arc;
use utils::clock::{Clock, SystemClock};

/// Initialize logging system with dual format (JSON + human-readable)
fn init_logging(with_stdout: bool, configured: Option<&Path>) -> anyhow::Result<()> {
    let log_dir = utils::path_resolver::resolve_log_folder(configured)?;
    std::fs::create_dir_all(&log_dir)?;

    let timestamp = chrono::Utc::now().format("%Y-%m-%d-%H%M%S");
    let json_log_file = log_dir.join(format!("oncopredict-{}.log", timestamp));
    let txt_log_file = log_dir.join(format!("oncopredict-{}.txt", timestamp));

    // stdout stays off while the TUI owns the terminal.
    let mut dispatch = fern::Dispatch::new().level(log::LevelFilter::Debug);

    if with_stdout {
        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .level(log::LevelFilter::Info)
                .format(|out, message, record| {
                    out.finish(format_args!("{}", human_line(&message.to_string(), record)))
                })
                .chain(std::io::stdout()),
        );
    }

    dispatch = dispatch
        .chain(
            fern::Dispatch::new()
                .format(|out, message, record| {
                    let timestamp_utc = chrono::Utc::now().to_rfc3339();
                    let message_str = message.to_string();
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let json_line = utils::logging::format_json_log(
                        &timestamp_utc,
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                    );
                    out.finish(format_args!("{}\n", json_line));
                })
                .chain(fern::log_file(json_log_file)?),
        )
        .chain(
            fern::Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!("{}\n", human_line(&message.to_string(), record)))
                })
                .chain(fern::log_file(txt_log_file)?),
        );

    dispatch.apply()?;

    info!(
        "[PHASE: initialization] Logging initialized, log directory: {:?}",
        log_dir
    );
    Ok(())
}

fn human_line(message: &str, record: &log::Record<'_>) -> String {
    let timestamp_local = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    let (phase, step, cleaned_message) = utils::logging::parse_log_metadata(message);
    utils::logging::format_human_readable_log(
        &timestamp_local.to_string(),
        record.level(),
        record.target(),
        &cleaned_message,
        phase.as_deref(),
        step.as_deref(),
    )
}

fn load_settings() -> config::Settings {
    match config::Settings::load() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Invalid configuration: {:#}", e);
            std::process::exit(2);
        }
    }
}

fn new_runtime() -> tokio::runtime::Runtime {
    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    }
}

/// Wire the session, auto-save, analysis pipeline and exporter from settings.
pub fn build_context(
    settings: &config::Settings,
    storage: Arc<dyn Storage>,
) -> anyhow::Result<tui::TuiContext> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let session = Arc::new(WizardSession::new(
        Arc::new(FieldSchema::oncopredict()),
        clock.clone(),
    ));
    let persistence = Arc::new(PersistenceManager::new(
        storage,
        clock.clone(),
        settings.autosave_debounce(),
    ));
    let client = HttpAnalysisClient::new(settings.service_base()?, settings.request_timeout())?;
    let pipeline = Arc::new(AnalysisPipeline::new(
        Arc::new(client),
        persistence.clone(),
        settings.settle_delay(),
    ));
    let export_dir = utils::path_resolver::resolve_export_folder(settings.export_dir.as_deref())?;

    Ok(tui::TuiContext {
        session,
        persistence,
        pipeline,
        exporter: ReportExporter::new(export_dir, clock),
    })
}

pub fn run_tui() {
    let settings = load_settings();

    // Initialize logging (no stdout to avoid corrupting the TUI)
    if let Err(e) = init_logging(false, settings.log_dir.as_deref()) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!(
        "[PHASE: initialization] OncoPredict wizard starting at {}, service {}",
        chrono::Utc::now(),
        settings.service_base_url
    );

    let autosave_path =
        match utils::path_resolver::resolve_autosave_path(settings.autosave_path.as_deref()) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Failed to resolve auto-save location: {}", e);
                std::process::exit(1);
            }
        };
    info!(
        "[PHASE: initialization] [STEP: autosave] Auto-save file: {:?}",
        autosave_path
    );

    let rt = new_runtime();
    let result = rt.block_on(async {
        let ctx = build_context(&settings, Arc::new(FileStorage::new(autosave_path)))?;
        tui::run(ctx).await
    });

    if let Err(e) = result {
        error!("[PHASE: tui] TUI exited with error: {:#}", e);
        eprintln!("TUI error: {:#}", e);
        std::process::exit(1);
    }
}

/// Render one frame of `target` to the terminal and exit. No service calls, no auto-save.
pub fn run_tui_smoke(target: Option<String>) {
    let settings = load_settings();
    if let Err(e) = init_logging(false, settings.log_dir.as_deref()) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let target = target.as_deref().unwrap_or("intake");
    let session = Arc::new(WizardSession::new(
        Arc::new(FieldSchema::oncopredict()),
        Arc::new(SystemClock),
    ));

    match tui::smoke(session, target) {
        Ok(frame) => {
            print!("{}", frame);
            info!("[PHASE: tui] [STEP: smoke] Smoke target {} rendered", target);
        }
        Err(e) => {
            error!("[PHASE: tui] [STEP: smoke] Smoke target {} failed: {:#}", target, e);
            eprintln!("TUI smoke failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Headless end-to-end run: demo patient, one analysis against the configured service,
/// report written to the export folder. Exits non-zero on failure.
pub fn run_demo_smoke() {
    let settings = load_settings();
    if let Err(e) = init_logging(true, settings.log_dir.as_deref()) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let rt = new_runtime();
    let outcome = rt.block_on(async {
        // The smoke run never touches the user's auto-save file.
        let ctx = build_context(&settings, Arc::new(MemoryStorage::new()))?;
        ctx.session.load_demo();
        while ctx.session.current_step() < wizard::WizardStep::Biomarkers {
            ctx.session.advance()?;
        }

        let bar = indicatif::ProgressBar::new(100);
        bar.set_style(
            indicatif::ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {msg}")
                .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar()),
        );
        let progress_bar = bar.clone();
        let emit: ProgressEmitter = Arc::new(move |p: AnalysisProgress| {
            progress_bar.set_position(u64::from(p.percent));
            progress_bar.set_message(p.message);
        });

        let result = ctx.pipeline.run(&ctx.session, &emit).await;
        bar.finish_and_clear();
        let result = result?;

        println!(
            "Risk level: {} ({}%)",
            result.risk_level, result.risk_score
        );
        let summary = ctx.session.summary();
        let path = ctx.exporter.export(summary.as_deref(), Some(&result))?;
        println!("Report written to {}", path.display());
        anyhow::Ok(())
    });

    if let Err(e) = outcome {
        error!("[PHASE: demo_smoke] Demo smoke failed: {:#}", e);
        eprintln!("Demo smoke failed: {:#}", e);
        std::process::exit(1);
    }
}

/// Probe the analysis service root and print its greeting.
pub fn run_check_service() {
    let settings = load_settings();
    if let Err(e) = init_logging(true, settings.log_dir.as_deref()) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let rt = new_runtime();
    let outcome = rt.block_on(async {
        let client =
            HttpAnalysisClient::new(settings.service_base()?, settings.request_timeout())?;
        let message = client.probe().await?;
        anyhow::Ok(message)
    });

    match outcome {
        Ok(message) => println!("Service OK: {}", message),
        Err(e) => {
            warn!("[PHASE: check_service] Service probe failed: {:#}", e);
            eprintln!("{:#}", e);
            std::process::exit(1);
        }
    }
}
