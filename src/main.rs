use std::{any::Any, panic, path::PathBuf, process::ExitCode};

use anyhow::{Context, Error};
use clap::Parser;
use log::{debug, error, info, LevelFilter};

use ephemeral_storage_setup::{
    cli::{Cli, Commands, LogFormat},
    config, host::check_dependencies, provision, scan_report, EngineContext, JsonLog,
    MultiLogger, SystemHost, VERSION,
};
use storage_api::error::{InternalError, ReportError, SetupError, SetupResultExt};

fn run_command(args: &Cli, command: &Commands) -> Result<(), SetupError> {
    let candidates = config::candidate_paths(command.config().map(PathBuf::as_path));
    let (config_path, config) = config::load(&candidates)?;

    if let Ok(Some(level)) = config.log_level_filter() {
        debug!("Switching log level to {level} as configured");
        log::set_max_level(level);
    }

    if matches!(command, Commands::Setup { .. }) {
        check_dependencies(&config.mkfs)?;
    }

    match command {
        Commands::Validate { .. } => {
            info!("Configuration '{}' is valid", config_path.display());
            Ok(())
        }
        Commands::Scan { .. } => {
            let report = scan_report(&SystemHost, &config.selection_criteria())?;
            let rendered = serde_yaml::to_string(&report)
                .structured(InternalError::Internal("Failed to render scan report"))?;
            print!("{rendered}");
            Ok(())
        }
        Commands::Setup { .. } => {
            let ctx = EngineContext::new(&SystemHost, &config).with_fstab_path(&args.fstab_path);
            let provisioned = provision(&ctx)?;
            info!(
                "Provisioned '{}' from {} member(s), filesystem '{}' on '{}'",
                provisioned.array.display(),
                provisioned.members.len(),
                provisioned.filesystem_uuid,
                provisioned.mount_point.display()
            );
            Ok(())
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        format!("{payload:?}")
    }
}

fn run(args: &Cli) -> Result<(), SetupError> {
    // Log version ASAP
    info!("ephemeral-storage-setup version: {VERSION}");

    let command = args.command();
    let res = panic::catch_unwind(|| run_command(args, &command));

    let res = match res {
        Err(e) => Err(SetupError::new(InternalError::Panic(panic_message(e)))),
        Ok(r) => r,
    };

    if let (Some(error_path), Err(e)) = (&args.error, &res) {
        if let Err(e2) = std::fs::write(error_path, serde_yaml::to_string(e).unwrap_or_default())
        {
            error!("Failed to write error to file: {e2}");
        }
    }

    res.message(format!("Failed to execute '{command}' command"))
}

fn setup_logging(args: &Cli) -> Result<(), Error> {
    let mut multilogger = MultiLogger::new().with_max_level(args.verbosity);

    match args.log_format {
        LogFormat::Json => multilogger.add_logger(JsonLog::stdout().into_logger()),
        // Writes to stderr
        LogFormat::Text => multilogger.add_logger(Box::new(
            env_logger::builder()
                .format_timestamp(None)
                .filter_level(LevelFilter::Trace)
                .build(),
        )),
    }

    if let Some(log_file) = &args.log_file {
        multilogger.add_logger(JsonLog::file(log_file)?.into_logger());
    }

    multilogger.init().context("Logger already registered")
}

fn main() -> ExitCode {
    // Parse args
    let args = Cli::parse();

    // Initialize the loggers
    if let Err(e) = setup_logging(&args) {
        eprintln!("Failed to initialize logging: {e:?}");
        return ExitCode::from(1);
    }

    if let Err(e) = run(&args) {
        error!("ephemeral-storage-setup failed: {e:?}");
        return ExitCode::from(2);
    }

    ExitCode::SUCCESS
}
