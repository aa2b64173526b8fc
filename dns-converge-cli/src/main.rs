//! `dnsconverge` - declarative DNS from the command line
//!
//! Reads the desired state from a JSON config and provider credentials from a
//! separate JSON file, then previews or pushes the changes needed to make every
//! configured zone match.
//!
//! Exit codes: `0` success, `1` one or more zones failed, `2` configuration or
//! validation error.

mod adapters;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use adapters::JsonFileCredentialStore;
use dns_converge_core::services::batch_exit_code;
use dns_converge_core::types::{
    CorrectionStatus, DEFAULT_CONCURRENCY, DesiredConfig, DomainConfig, EXIT_INVALID,
    ReconcileOptions, RunMode, RunReport, ZoneStatus,
};
use dns_converge_core::{
    CoreResult, InMemoryProviderRegistry, ReconcileService, ServiceContext, ZoneService,
};

#[derive(Parser, Debug)]
#[command(name = "dnsconverge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Desired-state configuration file
    #[arg(short = 'c', long = "config", env = "DNSCONVERGE_CONFIG", default_value = "dnsconfig.json")]
    config: PathBuf,

    /// Provider credentials file
    #[arg(long = "creds", env = "DNSCONVERGE_CREDS", default_value = "creds.json")]
    creds: PathBuf,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct Selection {
    /// Only process these zones (comma separated)
    #[arg(long = "domains", value_delimiter = ',')]
    domains: Option<Vec<String>>,

    /// Zones processed in parallel
    #[arg(long = "concurrency", default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Print a JSON report on stdout instead of text
    #[arg(long = "json")]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the corrections that would be applied, without changing anything
    Preview {
        #[command(flatten)]
        selection: Selection,
    },
    /// Apply the corrections
    Push {
        #[command(flatten)]
        selection: Selection,

        /// Stop a zone at its first failed correction
        #[arg(long = "abort-on-error")]
        abort_on_error: bool,

        /// Create missing zones before pushing
        #[arg(long = "create-domains")]
        create_domains: bool,
    },
    /// Print the records currently served for each zone
    GetZones {
        #[command(flatten)]
        selection: Selection,
    },
    /// Create every configured zone that does not exist yet
    CreateDomains {
        #[command(flatten)]
        selection: Selection,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let directives = log_directives(cli.verbose, std::env::var(EnvFilter::DEFAULT_ENV).ok());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .without_time(),
        )
        .with(EnvFilter::new(directives))
        .init();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling outstanding work");
                cancel.cancel();
            }
        });
    }

    match run(cli, &cancel).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::from(EXIT_INVALID)
        }
    }
}

/// RUST_LOG 非空时原样使用，否则由 `-v` 决定级别
fn log_directives(verbose: bool, rust_log: Option<String>) -> String {
    match rust_log {
        Some(directives) if !directives.trim().is_empty() => directives,
        _ if verbose => tracing::Level::DEBUG.to_string(),
        _ => tracing::Level::INFO.to_string(),
    }
}

async fn run(cli: Cli, cancel: &CancellationToken) -> CoreResult<u8> {
    let configs = DesiredConfig::load(&cli.config).await?.to_domain_configs()?;
    tracing::debug!("Loaded {} zone(s) from {}", configs.len(), cli.config.display());

    let ctx = Arc::new(ServiceContext::new(
        Arc::new(JsonFileCredentialStore::new(&cli.creds)),
        Arc::new(InMemoryProviderRegistry::new()),
    ));
    let count = ctx.restore_providers().await?;
    tracing::debug!("{count} provider instance(s) ready");

    match cli.command {
        Commands::Preview { selection } => {
            let opts = reconcile_options(RunMode::Preview, &selection);
            reconcile(&ctx, &configs, &opts, selection.json, cancel).await
        }
        Commands::Push {
            selection,
            abort_on_error,
            create_domains,
        } => {
            let opts = reconcile_options(RunMode::Push, &selection)
                .with_continue_on_error(!abort_on_error)
                .with_create_domains(create_domains);
            reconcile(&ctx, &configs, &opts, selection.json, cancel).await
        }
        Commands::GetZones { selection } => {
            let service = ZoneService::new(ctx).with_concurrency(selection.concurrency);
            let results = service
                .get_zones(&configs, selection.domains.as_deref(), cancel)
                .await?;
            if selection.json {
                let snapshots: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
                println!("{}", serde_json::to_string_pretty(&snapshots)?);
            } else {
                for r in &results {
                    match r {
                        Ok(snapshot) => print!("{}", snapshot.to_zone_file()),
                        Err(e) => println!("; {e}"),
                    }
                }
            }
            Ok(batch_exit_code(&results))
        }
        Commands::CreateDomains { selection } => {
            let service = ZoneService::new(ctx).with_concurrency(selection.concurrency);
            let results = service
                .create_domains(&configs, selection.domains.as_deref(), cancel)
                .await?;
            for r in &results {
                match r {
                    Ok((zone, provider)) => println!("{zone} @ {provider}: ok"),
                    Err(e) => println!("{e}"),
                }
            }
            Ok(batch_exit_code(&results))
        }
    }
}

fn reconcile_options(mode: RunMode, selection: &Selection) -> ReconcileOptions {
    let mut opts = ReconcileOptions {
        mode,
        ..ReconcileOptions::default()
    }
    .with_concurrency(selection.concurrency);
    if let Some(domains) = &selection.domains {
        opts = opts.with_domains(domains.clone());
    }
    opts
}

async fn reconcile(
    ctx: &Arc<ServiceContext>,
    configs: &[DomainConfig],
    opts: &ReconcileOptions,
    json: bool,
    cancel: &CancellationToken,
) -> CoreResult<u8> {
    let report = ReconcileService::new(Arc::clone(ctx))
        .run(configs, opts, cancel)
        .await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report));
    }
    Ok(report.exit_code())
}

fn status_tag(status: CorrectionStatus) -> &'static str {
    match status {
        CorrectionStatus::Planned => "",
        CorrectionStatus::Applied => " [applied]",
        CorrectionStatus::Failed => " [FAILED]",
        CorrectionStatus::Skipped => " [skipped]",
        CorrectionStatus::Cancelled => " [cancelled]",
    }
}

/// 文本报告：每个 zone 一段，correction 逐条编号
fn render_report(report: &RunReport) -> String {
    let mut out = String::new();
    for zone in &report.zones {
        out.push_str(&format!("******** {} ({})\n", zone.zone, zone.provider));
        if let Some(err) = &zone.error {
            out.push_str(&format!("  ERROR: {err}\n"));
        }
        for (i, c) in zone.corrections.iter().enumerate() {
            out.push_str(&format!("#{}{}: {}\n", i + 1, status_tag(c.status), c.message));
            if let Some(err) = &c.error {
                out.push_str(&format!("  {err}\n"));
            }
        }
        if zone.status == ZoneStatus::Ok && zone.corrections.is_empty() {
            out.push_str("  no changes\n");
        }
    }

    let verb = match report.mode {
        RunMode::Preview => "planned",
        RunMode::Push => "applied",
    };
    let done: usize = report
        .zones
        .iter()
        .map(|z| match report.mode {
            RunMode::Preview => z.planned(),
            RunMode::Push => z.applied(),
        })
        .sum();
    let failed = report
        .zones
        .iter()
        .filter(|z| z.status != ZoneStatus::Ok)
        .count();
    out.push_str(&format!(
        "Done. {done} correction(s) {verb}, {failed} zone(s) with errors.\n"
    ));
    out
}
