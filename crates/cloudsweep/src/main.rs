//! cloudsweep: multi-region AWS inventory scanner
//!
//! Scans every enabled region for compute, storage, database, key and NAT
//! gateway resources and flags orphaned and idle ones.

use anyhow::Result;
use clap::{Parser, Subcommand};
use cloudsweep::aws::{AwsContext, AwsError, AwsProvider};
use cloudsweep::config::{
    AwsConfig, DatabaseToggles, FamilyToggles, OutputConfig, OutputFormat, RegionSelection,
    ScanConfig,
};
use cloudsweep::report::{print_report, report_json, write_report_files};
use cloudsweep::scan::Scanner;
use cloudsweep_common::ResourceFamily;
use cloudsweep_common::defaults::{DEFAULT_HOME_REGION, DEFAULT_MAX_CONCURRENCY, DEFAULT_OUTPUT_DIR};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Exit code when the scan completed but at least one region failed
const EXIT_REGION_ERROR: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "cloudsweep")]
#[command(about = "Multi-region AWS inventory scanner that flags orphaned and idle resources")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

/// Arguments for the scan command (extracted to reduce enum size)
#[derive(clap::Args, Debug)]
struct ScanArgs {
    /// Comma-separated regions to scan (default: every enabled region)
    #[arg(long, value_delimiter = ',')]
    regions: Option<Vec<String>>,

    /// Region used to list regions and validate credentials
    #[arg(long, default_value = DEFAULT_HOME_REGION)]
    home_region: String,

    /// Maximum number of regions scanned at once
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENCY)]
    concurrency: usize,

    /// Comma-separated families to scan: compute, storage, database, keys, gateway
    #[arg(long, value_delimiter = ',', value_parser = parse_family)]
    families: Option<Vec<ResourceFamily>>,

    /// Skip Aurora clusters
    #[arg(long)]
    no_clusters: bool,

    /// Skip DB and DB cluster snapshots
    #[arg(long)]
    no_snapshots: bool,

    /// Skip reserved DB instances
    #[arg(long)]
    no_reserved: bool,

    /// Skip DB proxies
    #[arg(long)]
    no_proxies: bool,

    /// AWS profile to use (overrides AWS_PROFILE env var)
    #[arg(long)]
    aws_profile: Option<String>,

    /// Console output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Also write JSON and CSV report files into this directory
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_OUTPUT_DIR)]
    output_dir: Option<PathBuf>,

    /// Exit with status 2 when any region failed
    #[arg(long)]
    fail_on_region_error: bool,
}

fn parse_family(s: &str) -> Result<ResourceFamily, String> {
    ResourceFamily::parse(s).ok_or_else(|| {
        format!("unknown family '{s}' (expected compute, storage, database, keys or gateway)")
    })
}

impl From<ScanArgs> for ScanConfig {
    fn from(args: ScanArgs) -> Self {
        Self {
            aws: AwsConfig {
                aws_profile: args.aws_profile,
                home_region: args.home_region,
            },
            regions: RegionSelection {
                regions: args.regions,
                max_concurrency: args.concurrency,
            },
            families: args
                .families
                .map(|f| FamilyToggles::only(&f))
                .unwrap_or_default(),
            database: DatabaseToggles {
                clusters: !args.no_clusters,
                snapshots: !args.no_snapshots,
                reserved: !args.no_reserved,
                proxies: !args.no_proxies,
            },
            output: OutputConfig {
                format: args.format,
                output_dir: args.output_dir,
                fail_on_region_error: args.fail_on_region_error,
            },
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan regions and report every resource found
    Scan(Box<ScanArgs>),

    /// Print the regions a scan would cover
    Regions {
        /// Comma-separated regions (default: every enabled region)
        #[arg(long, value_delimiter = ',')]
        regions: Option<Vec<String>>,

        /// Region used to list regions
        #[arg(long, default_value = DEFAULT_HOME_REGION)]
        home_region: String,

        /// AWS profile to use (overrides AWS_PROFILE env var)
        #[arg(long)]
        aws_profile: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            print_error(&e);
            std::process::exit(1);
        }
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if let Some(hint) = error_hint(e) {
        let _ = writeln!(stderr, "\n  \x1b[36mHint:\x1b[0m {hint}");
    }

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    } else {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}

/// Suggestion for the first classified AWS error in the chain
fn error_hint(e: &anyhow::Error) -> Option<String> {
    e.chain()
        .find_map(|cause| cause.downcast_ref::<AwsError>())
        .and_then(AwsError::suggestion)
}

fn init_tracing() -> Result<()> {
    // Logs go to stderr so `--format json` output stays machine-readable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
                .add_directive("aws_config=warn".parse()?)
                .add_directive("aws_sdk=warn".parse()?)
                .add_directive("aws_smithy=warn".parse()?),
        )
        .init();
    Ok(())
}

async fn run() -> Result<i32> {
    let args = Args::parse();
    init_tracing()?;

    match args.command {
        Command::Scan(scan_args) => handle_scan((*scan_args).into()).await,
        Command::Regions {
            regions,
            home_region,
            aws_profile,
        } => {
            handle_regions(ScanConfig {
                aws: AwsConfig {
                    aws_profile,
                    home_region,
                },
                regions: RegionSelection {
                    regions,
                    ..Default::default()
                },
                ..Default::default()
            })
            .await?;
            Ok(0)
        }
    }
}

async fn provider(config: &ScanConfig) -> Arc<AwsProvider> {
    if let Some(profile) = config.aws_profile() {
        info!(profile = %profile, "Using AWS profile");
    }
    let ctx = AwsContext::new(config.aws_profile(), config.home_region()).await;
    Arc::new(AwsProvider::new(ctx))
}

/// Handle the scan command
async fn handle_scan(config: ScanConfig) -> Result<i32> {
    let provider = provider(&config).await;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, reporting partial results");
                cancel.cancel();
            }
        }
    });

    let report = Scanner::new(provider, config.clone())
        .with_cancellation(cancel)
        .run()
        .await?;

    match config.output.format {
        OutputFormat::Table => print_report(&report),
        OutputFormat::Json => println!("{}", report_json(&report)?),
    }

    if let Some(dir) = &config.output.output_dir {
        let written = write_report_files(&report, dir)?;
        info!(
            json = %written.json.display(),
            csv = %written.csv.display(),
            "Reports saved"
        );
    }

    if config.output.fail_on_region_error && !report.failed_regions().is_empty() {
        warn!(failed = ?report.failed_regions(), "Some regions failed");
        return Ok(EXIT_REGION_ERROR);
    }
    Ok(0)
}

/// Handle the regions command
async fn handle_regions(config: ScanConfig) -> Result<()> {
    let provider = provider(&config).await;
    let regions = Scanner::new(provider, config).resolve_regions().await?;
    for region in regions {
        println!("{region}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_args_build_config() {
        let args = Args::parse_from([
            "cloudsweep",
            "scan",
            "--regions",
            "us-east-1,eu-west-1",
            "--families",
            "compute,kms",
            "--no-proxies",
            "--concurrency",
            "4",
            "--format",
            "json",
            "--output-dir",
            "--fail-on-region-error",
        ]);
        let Command::Scan(scan) = args.command else {
            panic!("expected scan command");
        };
        let config: ScanConfig = (*scan).into();

        assert_eq!(
            config.regions.regions,
            Some(vec!["us-east-1".to_string(), "eu-west-1".to_string()])
        );
        assert_eq!(config.max_concurrency(), 4);
        assert!(config.families.compute && config.families.keys);
        assert!(!config.families.storage);
        assert!(!config.database.proxies && config.database.clusters);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.output.output_dir, Some(PathBuf::from(DEFAULT_OUTPUT_DIR)));
        assert!(config.output.fail_on_region_error);
    }

    #[test]
    fn defaults_scan_everything() {
        let args = Args::parse_from(["cloudsweep", "scan"]);
        let Command::Scan(scan) = args.command else {
            panic!("expected scan command");
        };
        let config: ScanConfig = (*scan).into();
        assert!(config.regions.regions.is_none());
        assert_eq!(config.families, FamilyToggles::all());
        assert_eq!(config.home_region(), DEFAULT_HOME_REGION);
        assert!(config.output.output_dir.is_none());
    }

    #[test]
    fn hint_found_behind_context() {
        let err = anyhow::Error::from(AwsError::Sdk {
            code: Some("ExpiredToken".to_string()),
            message: "The security token included in the request is expired".to_string(),
        })
        .context("Failed to get AWS caller identity - check credentials");
        let err = anyhow::Error::from(cloudsweep::scan::ScanError::NoCredentials { source: err });

        let hint = error_hint(&err).expect("hint for expired token");
        assert!(hint.contains("credentials"), "{hint}");
        assert!(error_hint(&anyhow::anyhow!("plain failure")).is_none());
    }

    #[test]
    fn unknown_family_is_rejected() {
        let result = Args::try_parse_from(["cloudsweep", "scan", "--families", "lambda"]);
        assert!(result.is_err());
    }
}
