//! sensord - simulated sensor registry
//!
//! CLI entry point: runs the registry tree, drives simulated sensors, shows logs.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info, warn};

use sensord::cli::{Cli, Command, OutputFormat, get_log_path};
use sensord::config::Config;
use sensord::group::TemperatureReading;
use sensord::simulation::{GroupReport, Simulation};
use sensord::supervisor::Supervisor;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sensord")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("sensord.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs never replace the file when only reading it
    if let Some(Command::Logs { lines }) = cli.command {
        return cmd_logs(lines);
    }

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        query_timeout_ms = config.registry.query_timeout_ms,
        mailbox_buffer = config.registry.mailbox_buffer,
        "sensord loaded config"
    );

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Demo {
            groups,
            devices,
            stop,
            format,
        }) => {
            debug!(?groups, ?devices, stop, ?format, "main: matched Demo command");
            cmd_demo(config, groups, devices, stop, format).await
        }
        Some(Command::Logs { lines }) => cmd_logs(lines),
        Some(Command::Run) | None => {
            debug!("main: matched Run command");
            cmd_run(&config).await
        }
    }
}

/// Run the registry tree until SIGINT/SIGTERM
async fn cmd_run(config: &Config) -> Result<()> {
    debug!("cmd_run: called");
    let supervisor = Supervisor::start(&config.registry);
    println!("sensord running. Press Ctrl+C to stop.");
    info!("Registry running. Press Ctrl+C to stop.");

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => warn!("SIGINT received"),
            _ = sigterm.recv() => warn!("SIGTERM received"),
            _ = supervisor.registry().stopped() => warn!("Registry exited on its own"),
        }
    }

    #[cfg(not(unix))]
    {
        debug!("cmd_run: waiting for ctrl_c (non-Unix)");
        tokio::signal::ctrl_c().await?;
    }

    info!("Shutting down...");
    supervisor.stop().await;
    debug!("cmd_run: shutdown complete");
    Ok(())
}

/// Run the simulation once and print each group's aggregate response
async fn cmd_demo(
    mut config: Config,
    groups: Option<usize>,
    devices: Option<usize>,
    stop: usize,
    format: OutputFormat,
) -> Result<()> {
    debug!(?groups, ?devices, stop, ?format, "cmd_demo: called");
    if let Some(groups) = groups {
        config.simulation.groups = groups;
    }
    if let Some(devices) = devices {
        config.simulation.devices_per_group = devices;
    }

    let supervisor = Supervisor::start(&config.registry);
    let simulation = Simulation::new(config.simulation.clone(), stop);
    let result = simulation.run(supervisor.registry()).await;
    supervisor.stop().await;
    let reports = result.context("Simulation failed")?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&reports).context("Failed to serialize reports")?;
            println!("{}", json);
        }
        OutputFormat::Text => print_reports(&reports),
    }

    Ok(())
}

fn print_reports(reports: &[GroupReport]) {
    for report in reports {
        println!(
            "{} {} (request {})",
            "Group".bold(),
            report.group_id.cyan().bold(),
            report.response.request_id
        );
        for (device_id, reading) in &report.response.temperatures {
            let shown = match reading {
                TemperatureReading::Value(_) => reading.to_string().green(),
                TemperatureReading::NotAvailable => reading.to_string().yellow(),
                TemperatureReading::DeviceUnreachable | TemperatureReading::TimedOut => reading.to_string().red(),
            };
            println!("  {:<12} {}", device_id, shown);
        }
        if !report.stopped.is_empty() {
            println!("  {} {}", "stopped:".dimmed(), report.stopped.join(", ").dimmed());
        }
        println!();
    }
}

/// Print the last N lines of the log file
fn cmd_logs(lines: usize) -> Result<()> {
    let log_path = get_log_path();

    if !log_path.exists() {
        println!("No log file found at: {}", log_path.display());
        println!("sensord may not have been started yet.");
        return Ok(());
    }

    let file = fs::File::open(&log_path).context("Failed to open log file")?;
    let reader = BufReader::new(file);
    let all_lines: Vec<String> = reader.lines().map_while(Result::ok).collect();

    let start = all_lines.len().saturating_sub(lines);
    for line in &all_lines[start..] {
        println!("{}", line);
    }

    Ok(())
}
