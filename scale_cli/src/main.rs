mod cli;
mod commands;
mod error_fmt;
mod hw;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::{Result, WrapErr};
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::commands::{RunOpts, SettingsPatch};

fn main() {
    // Pretty panic/report hooks; ignore a second install in tests
    let _ = color_eyre::install();

    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = real_main(cli) {
        let json = JSON_MODE.get().copied().unwrap_or(false);
        if json {
            println!("{}", error_fmt::format_error_json(&e));
        } else {
            eprintln!("{}", error_fmt::humanize(&e));
        }
        std::process::exit(error_fmt::exit_code_for_error(&e));
    }
}

fn real_main(cli: Cli) -> Result<()> {
    let cfg = match &cli.config {
        Some(path) => scale_config::load_file(path)?,
        None => scale_config::Config::default(),
    };
    // Dropped when this returns, which drains the file writer before exit
    let _log_guard = init_tracing(&cli, &cfg.logging);
    tracing::debug!(config = ?cli.config, "configuration loaded");

    let image = hw::image_path(&cfg, cli.image.as_deref());

    match cli.cmd {
        Commands::Run {
            cycles,
            load,
            steps,
            tare_at,
            undo_at,
            noise,
            power_save_ms,
            realtime,
        } => {
            let shutdown = Arc::new(AtomicBool::new(false));
            {
                let flag = Arc::clone(&shutdown);
                ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
                    .wrap_err("install Ctrl-C handler")?;
            }
            let opts = RunOpts {
                cycles,
                load,
                steps,
                tare_at,
                undo_at,
                noise,
                power_save_ms,
                realtime,
            };
            commands::run(&cfg, &image, &opts, cli.json, &shutdown)?;
        }
        Commands::Inspect => commands::inspect(&cfg, &image, cli.json)?,
        Commands::Calibrate {
            factor,
            nudge,
            load,
        } => commands::calibrate(&cfg, &image, factor, nudge, load, cli.json)?,
        Commands::Settings {
            brightness,
            auto_off,
            auto_dim,
            auto_zero,
            units,
            tare_lock,
        } => {
            let patch = SettingsPatch {
                brightness,
                auto_off,
                auto_dim,
                auto_zero,
                units,
                tare_lock,
            };
            commands::settings(&cfg, &image, patch, cli.json)?;
        }
        Commands::SelfCheck => commands::self_check(&cfg, &image, cli.json)?,
    }
    Ok(())
}

type BoxedLayer = Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>;

/// Console logs go to stderr so stdout stays clean for results.
/// Level precedence: RUST_LOG, then --log-level, then logging.level, then info.
fn init_tracing(
    cli: &Cli,
    logging: &scale_config::Logging,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let level = cli
        .log_level
        .clone()
        .or_else(|| logging.level.clone())
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if cli.json {
        layers.push(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(false)
                .boxed(),
        );
    } else {
        layers.push(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .boxed(),
        );
    }

    let mut guard = None;
    if let Some(path) = logging.file.as_deref() {
        let path = std::path::Path::new(path);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        let name = path
            .file_name()
            .map_or_else(|| "scale.log".into(), |n| n.to_string_lossy().into_owned());
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, g) = tracing_appender::non_blocking(appender);
        guard = Some(g);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        );
    }

    let _ = tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init();
    guard
}
