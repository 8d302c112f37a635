//! Harvester CLI
//!
//! Local execution entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use harvester::{error::Result, models::Config, pipeline};

/// Harvester - Contact Address Crawler
#[derive(Parser, Debug)]
#[command(
    name = "harvester",
    version,
    about = "Collects contact addresses from company websites"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "harvester.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl every site listed in the input file and write the report
    Run {
        /// Input file with `name;url` rows (default: paths.input_file)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Report file (default: paths.output_file)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Sites processed concurrently (default: scheduler.concurrency)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Never start a headless browser
        #[arg(long)]
        no_render: bool,
    },

    /// Crawl a single site and print the classified result as JSON
    Crawl {
        /// Site URL, e.g. https://www.example.com
        url: String,

        /// Never start a headless browser
        #[arg(long)]
        no_render: bool,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);
    log::debug!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Run {
            input,
            output,
            concurrency,
            no_render,
        } => {
            if let Some(input) = input {
                config.paths.input_file = input;
            }
            if let Some(output) = output {
                config.paths.output_file = output;
            }
            if let Some(concurrency) = concurrency {
                config.scheduler.concurrency = concurrency;
            }
            if no_render {
                config.render.enabled = false;
            }
            config.validate()?;

            log::info!("Harvester starting...");
            pipeline::run_harvest(&config).await?;
        }

        Command::Crawl { url, no_render } => {
            if no_render {
                config.render.enabled = false;
            }
            config.validate()?;

            let report = pipeline::inspect_site(&config, &url).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }

            log::info!("✓ Config OK");
            log::info!("  Input: {}", config.paths.input_file.display());
            log::info!("  Output: {}", config.paths.output_file.display());
            log::info!("  Concurrency: {}", config.scheduler.concurrency);
            log::info!(
                "  Requests per crawl: {} ({} pages at a time)",
                config.crawler.max_requests_per_crawl,
                config.crawler.page_concurrency
            );
            log::info!(
                "  Rendering: {}",
                if config.render.enabled {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            log::info!(
                "  Path filters: {} include, {} exclude",
                config.filters.include.len(),
                config.filters.exclude.len()
            );
        }
    }

    Ok(())
}
