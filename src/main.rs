use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use ferry::cli::{CheckArgs, Cli, Command, TransferArgs};
use ferry::config::Config;
use ferry::error::Result as FerryResult;
use ferry::path::{is_remote_path, split_remote_path};
use ferry::rclone::{remote, CommonFlags, Executor, RcloneCommand, TransferOptions};
use ferry::retry::RetryConfig;
use ferry::transfer::TransferStore;
use ferry::ui::{self, DashboardTheme};
use ferry::validate;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let rclone_bin = cli
        .rclone
        .clone()
        .unwrap_or_else(|| config.rclone_path.clone());

    match cli.command {
        Command::Copy(args) => {
            let command = if args.single {
                RcloneCommand::CopyTo
            } else {
                RcloneCommand::Copy
            };
            run_transfer(command, args, &config, &rclone_bin).await
        }
        Command::Move(args) => {
            let command = if args.single {
                RcloneCommand::MoveTo
            } else {
                RcloneCommand::Move
            };
            run_transfer(command, args, &config, &rclone_bin).await
        }
        Command::Sync(args) => {
            anyhow::ensure!(!args.single, "--single is not supported for sync");
            run_transfer(RcloneCommand::Sync, args, &config, &rclone_bin).await
        }
        Command::Ls { path, recursive } => {
            for entry in remote::list_files(&path, recursive).await? {
                println!("{entry}");
            }
            Ok(())
        }
        Command::Remotes => {
            for name in remote::list_remotes().await? {
                println!("{name}");
            }
            Ok(())
        }
        Command::Version => {
            println!("{}", remote::rclone_version().await?);
            Ok(())
        }
        Command::Check(args) => run_checks(args).await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("FERRY_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_transfer(
    command: RcloneCommand,
    args: TransferArgs,
    config: &Config,
    rclone_bin: &str,
) -> anyhow::Result<()> {
    if !args.no_checks {
        preflight(&args, rclone_bin).await?;
    }

    let store = TransferStore::new();
    let executor = Executor::with_binary(store.clone(), rclone_bin);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, cancelling transfer");
                cancel.cancel();
            }
        });
    }

    let id = transfer_id(&args.source);
    store.add(&id, &args.source, &args.destination);

    let common = CommonFlags {
        transfers: args.transfers.unwrap_or(0),
        checkers: args.checkers.unwrap_or(0),
        bandwidth_kbps: args.bwlimit.unwrap_or(0),
        ignore_checksum: args.ignore_checksum,
        no_traverse: args.no_traverse,
        exclude: args.exclude.clone(),
        include: args.include.clone(),
        min_age: args.min_age.clone(),
        max_age: args.max_age.clone(),
        ..CommonFlags::default()
    };

    let stats_interval = args
        .stats_interval_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.stats_interval());

    let mut builder = TransferOptions::new(&args.source, &args.destination)
        .command(command)
        .common_flags(&common)
        .flags(args.extra.iter().cloned())
        .stats_interval(stats_interval)
        .cancel(cancel.clone());
    if args.dry_run {
        builder = builder.dry_run();
    }
    let opts = builder.build();

    let retry_cfg = RetryConfig {
        max_attempts: args.retries.unwrap_or(config.retry.max_attempts),
        initial_delay: args
            .retry_delay_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(config.retry.initial_delay_ms)),
        max_delay: args
            .max_delay_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(config.retry.max_delay_ms)),
        multiplier: config.retry.multiplier,
    }
    .normalized();

    store.start(&id);
    let worker = {
        let store = store.clone();
        let executor = executor.clone();
        let id = id.clone();
        tokio::spawn(async move {
            match executor.execute_with_retry(&id, &opts, retry_cfg).await {
                Ok(()) => {
                    store.complete(&id);
                    true
                }
                Err(err) => {
                    tracing::error!(id = %id, %err, "transfer failed");
                    store.fail(&id, err);
                    false
                }
            }
        })
    };

    if !args.no_dashboard {
        ui::run_dashboard(store.clone(), DashboardTheme::default()).await?;
    }
    let ok = worker.await.context("transfer task panicked")?;

    ui::render_summary(&store);
    anyhow::ensure!(ok, "transfer failed");
    Ok(())
}

async fn preflight(args: &TransferArgs, rclone_bin: &str) -> anyhow::Result<()> {
    // A custom binary path is trusted; the PATH lookup only makes sense
    // for the default name.
    if rclone_bin == "rclone" {
        validate::ensure_rclone_installed()?;
    }
    validate::validate_source_path(&args.source)?;
    validate::validate_destination_path(&args.destination)?;

    if is_remote_path(&args.destination) {
        let (remote_name, _) = split_remote_path(&args.destination);
        validate::validate_remote(remote_name, Duration::from_secs(10)).await?;
    } else if let Ok(size) = validate::file_size(&args.source).await {
        validate::check_disk_space(&args.destination, size)?;
    }
    Ok(())
}

fn transfer_id(source: &str) -> String {
    Path::new(source)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "transfer".to_string())
}

fn report(label: &str, result: FerryResult<()>) -> bool {
    match result {
        Ok(()) => {
            println!("{} {label}", "ok".green().bold());
            true
        }
        Err(err) => {
            println!("{} {label}: {err}", "failed".red().bold());
            false
        }
    }
}

async fn run_checks(args: CheckArgs) -> anyhow::Result<()> {
    let timeout = Duration::from_secs(args.timeout_secs);
    let mut failed = 0usize;

    if !report("rclone installed", validate::ensure_rclone_installed()) {
        failed += 1;
    }
    match remote::rclone_version().await {
        Ok(version) => println!("{} {version}", "ok".green().bold()),
        Err(err) => {
            println!("{} rclone version: {err}", "failed".red().bold());
            failed += 1;
        }
    }

    if !report("source path", validate::validate_source_path(&args.source)) {
        failed += 1;
    }
    if !report(
        "destination path",
        validate::validate_destination_path(&args.destination),
    ) {
        failed += 1;
    }

    if is_remote_path(&args.destination) {
        let (remote_name, _) = split_remote_path(&args.destination);
        if !report(
            "remote reachable",
            validate::validate_remote(remote_name, timeout).await,
        ) {
            failed += 1;
        }
    } else {
        match validate::file_size(&args.source).await {
            Ok(size) => {
                if !report(
                    "disk space",
                    validate::check_disk_space(&args.destination, size),
                ) {
                    failed += 1;
                }
            }
            Err(err) => println!("{} could not size source: {err}", "warn".yellow().bold()),
        }

        match validate::has_partial_files(Path::new(&args.destination)) {
            Ok(true) => println!(
                "{} destination contains partial downloads",
                "warn".yellow().bold()
            ),
            Ok(false) => {}
            Err(err) => println!("{} partial-file scan: {err}", "warn".yellow().bold()),
        }
    }

    let names = vec![transfer_id(&args.source)];
    match remote::check_duplicates(&args.destination, &names).await {
        Ok(duplicates) if !duplicates.is_empty() => println!(
            "{} already present at destination: {}",
            "warn".yellow().bold(),
            names[0]
        ),
        Ok(_) => {}
        Err(err) => println!("{} duplicate check: {err}", "warn".yellow().bold()),
    }

    anyhow::ensure!(failed == 0, "{failed} pre-flight check(s) failed");
    println!("{}", "all checks passed".green().bold());
    Ok(())
}
