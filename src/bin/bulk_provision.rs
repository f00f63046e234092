//! bulk-provision: rate-limited bulk creation of directory users
//!
//! Usage:
//!   bulk-provision create [OPTIONS]          Create generated users one by one
//!   bulk-provision create-batch [OPTIONS]    Create generated users in $batch requests
//!   bulk-provision import <file> [OPTIONS]   Create the users listed in a JSON file

use anyhow::{bail, Context};
use bulk_provision::config::AppSettings;
use bulk_provision::job::{JobReport, JobRunner, UnitMode};
use bulk_provision::service::{HttpRecordService, InMemoryRecordService};
use bulk_provision::types::UsersFile;
use bulk_provision::RecordService;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const SHOWN_FAILURES: usize = 10;

#[derive(Debug, Default)]
struct CliOptions {
    users: Option<i64>,
    rate: Option<i64>,
    max_inflight: Option<usize>,
    timeout_ms: Option<u64>,
    config: Option<PathBuf>,
    dry_run: bool,
    positional: Vec<String>,
}

fn parse_options(args: &[String]) -> anyhow::Result<CliOptions> {
    fn value<'a>(args: &'a [String], i: usize, flag: &str) -> anyhow::Result<&'a str> {
        args.get(i + 1)
            .map(String::as_str)
            .with_context(|| format!("{flag} needs a value"))
    }

    let mut opts = CliOptions::default();
    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        match arg {
            "-u" | "--users" => {
                opts.users = Some(value(args, i, arg)?.parse().context("--users")?);
                i += 1;
            }
            "-r" | "--rate" => {
                opts.rate = Some(value(args, i, arg)?.parse().context("--rate")?);
                i += 1;
            }
            "--max-inflight" => {
                opts.max_inflight = Some(value(args, i, arg)?.parse().context("--max-inflight")?);
                i += 1;
            }
            "--timeout-ms" => {
                opts.timeout_ms = Some(value(args, i, arg)?.parse().context("--timeout-ms")?);
                i += 1;
            }
            "-c" | "--config" => {
                opts.config = Some(PathBuf::from(value(args, i, arg)?));
                i += 1;
            }
            "--dry-run" => opts.dry_run = true,
            other if other.starts_with('-') => bail!("Unknown option: {other}"),
            other => opts.positional.push(other.to_string()),
        }
        i += 1;
    }
    Ok(opts)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let (mode, import) = match args[1].as_str() {
        "create" => (UnitMode::Single, false),
        "create-batch" => (UnitMode::Batch, false),
        "import" => (UnitMode::Single, true),
        "version" | "--version" | "-V" => {
            cmd_version();
            return Ok(());
        }
        "help" | "--help" | "-h" => {
            print_usage();
            return Ok(());
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    let opts = parse_options(&args[2..])?;
    let mut settings = AppSettings::load_or_default(opts.config.as_deref())
        .context("loading settings")?
        .apply_env();
    if let Some(n) = opts.users {
        settings.job.users = Some(n);
    }
    if let Some(n) = opts.rate {
        settings.job.rate_limit = Some(n);
    }
    if let Some(n) = opts.max_inflight {
        settings.job.max_inflight = Some(n);
    }
    if let Some(ms) = opts.timeout_ms {
        settings.job.unit_timeout_ms = Some(ms);
    }

    let service: Arc<dyn RecordService> = if opts.dry_run {
        Arc::new(InMemoryRecordService::new().with_latency(Duration::from_millis(20)))
    } else {
        Arc::new(HttpRecordService::from_settings(&settings).context("building HTTP client")?)
    };

    let runner = JobRunner::new(service, settings.job_config(mode));
    let cancel = runner.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted; cancelling outstanding submissions...");
            cancel.cancel();
        }
    });

    let result = if import {
        let path = opts
            .positional
            .first()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&settings.users_file_name));
        let file = UsersFile::load(&path)
            .with_context(|| format!("reading users from {}", path.display()))?;
        println!("Importing {} users from {}", file.users.len(), path.display());
        runner.run_create(file.users).await
    } else {
        println!(
            "Creating {} users ({} mode, {} per second)",
            runner.config().target_count,
            mode,
            runner.config().rate_per_interval
        );
        runner.run_generated().await
    };

    match result {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: job could not complete: {e}");
            std::process::exit(1);
        }
    }
}

fn print_report(report: &JobReport) {
    let summary = &report.summary;
    println!();
    println!("=== Job {} ===", report.job_id);
    println!("Total:     {}", summary.total);
    println!("Succeeded: {}", summary.succeeded);
    println!("Failed:    {}", summary.failed);
    println!("Elapsed:   {:.3} seconds", summary.elapsed_seconds());

    if report.failures.is_empty() {
        return;
    }
    println!();
    println!("First failures:");
    for failure in report.failures.iter().take(SHOWN_FAILURES) {
        let name = failure
            .record
            .sign_in_name()
            .unwrap_or(failure.record.display_name.as_str());
        println!("  {name}: {}", failure.cause);
    }
    if report.failures.len() > SHOWN_FAILURES {
        println!("  ... and {} more", report.failures.len() - SHOWN_FAILURES);
    }
}

fn print_usage() {
    println!(
        r#"bulk-provision: rate-limited bulk creation of directory users

USAGE:
    bulk-provision <COMMAND> [OPTIONS]

COMMANDS:
    create                  Create generated users, one request per user
    create-batch            Create generated users in $batch requests of 20
    import [<file>]         Create the users listed in a {{"users":[...]}} file
    version                 Show version information
    help                    Show this help message

OPTIONS:
    -u, --users <n>         Number of users to generate (default 1000)
    -r, --rate <n>          Requests started per second (default 300)
        --max-inflight <n>  Upper bound on requests in flight
        --timeout-ms <ms>   Per-request deadline
    -c, --config <path>     Settings file (JSON or YAML, default appsettings.json)
        --dry-run           Submit to an in-memory service instead of the network

ENVIRONMENT:
    BULK_SERVICE_URL, BULK_ACCESS_TOKEN, BULK_TENANT_ID, BULK_USERS,
    BULK_RATE_LIMIT, BULK_BATCH_SIZE, BULK_MAX_INFLIGHT, BULK_UNIT_TIMEOUT_MS,
    BULK_HTTP_TIMEOUT_SECS
    RUST_LOG                Log filter, e.g. bulk_provision=debug"#
    );
}

fn cmd_version() {
    println!("bulk-provision {}", env!("CARGO_PKG_VERSION"));
}
