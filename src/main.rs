//! rozgar - geospatial job matching and live worker radar

use anyhow::Result;
use clap::Parser;
use owo_colors::{OwoColorize, Stream::Stderr};
use tracing::Level;

use rozgar::cli::{self, Cli, Commands};
use rozgar::{db, logging};

fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        owo_colors::set_override(false);
    }

    let result = match &cli.command {
        Commands::Serve(args) => cmd_serve(&cli, args),
        Commands::Info => cmd_info(&cli),
        Commands::Completions(args) => {
            args.generate();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!(
            "{}: {}",
            "error"
                .if_supports_color(Stderr, |text| text.red())
                .if_supports_color(Stderr, |text| text.bold()),
            e
        );
        // Print the error chain if there are causes
        for cause in e.chain().skip(1) {
            eprintln!(
                "  {}: {}",
                "caused by".if_supports_color(Stderr, |text| text.yellow()),
                cause
            );
        }
        std::process::exit(1);
    }
}

/// Base log level derived from -v/-q flags.
fn log_level(cli: &Cli) -> Level {
    if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

/// Run the HTTP API server.
fn cmd_serve(cli: &Cli, args: &cli::ServeArgs) -> Result<()> {
    use rozgar::ratelimit::RateLimitConfig;
    use rozgar::server::{ServerConfig, run_server};
    use std::time::Duration;

    let mut log_config = logging::LogConfig::for_server().with_level(log_level(cli));
    if let Some(ref format) = args.log_format {
        log_config = log_config.with_format(format.parse().map_err(anyhow::Error::msg)?);
    }
    logging::init(log_config.with_env_overrides());

    let config = ServerConfig {
        host: args.host.clone(),
        port: args.port,
        db_path: cli.db_path.clone(),
        cors: args.cors || args.cors_origins.is_some(),
        cors_origins: args.cors_origins.clone(),
        db_connections: args.db_connections,
        db_timeout: Duration::from_secs(args.db_timeout_secs),
        rate_limit: RateLimitConfig {
            window: Duration::from_secs(args.rate_limit_window_secs),
            max_requests: args.rate_limit_max,
            max_keys: args.rate_limit_keys,
        },
        freshness: Duration::from_secs(args.freshness_secs),
        feed_buffer: args.feed_buffer,
        webhook_verify_token: args.webhook_verify_token.clone(),
        webhook_app_secret: args.webhook_app_secret.clone(),
        messaging_url: args.messaging_url.clone(),
        messaging_token: args.messaging_token.clone(),
    };

    let rt = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");
    rt.block_on(run_server(config))?;
    Ok(())
}

/// Print catalog statistics as a table.
fn cmd_info(cli: &Cli) -> Result<()> {
    use comfy_table::{Table, presets::UTF8_FULL};

    let db = db::Database::open_readonly(&cli.db_path)?;
    let stats = db::queries::get_stats(db.connection())?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec!["Database".to_string(), cli.db_path.display().to_string()]);
    table.add_row(vec!["Total jobs".to_string(), stats.total_jobs.to_string()]);
    table.add_row(vec!["Open jobs".to_string(), stats.open_jobs.to_string()]);
    table.add_row(vec!["Filled jobs".to_string(), stats.filled_jobs.to_string()]);
    table.add_row(vec!["Closed jobs".to_string(), stats.closed_jobs.to_string()]);
    table.add_row(vec!["Geocoded jobs".to_string(), stats.geocoded_jobs.to_string()]);
    table.add_row(vec!["Worker profiles".to_string(), stats.total_profiles.to_string()]);
    table.add_row(vec![
        "Premium profiles".to_string(),
        stats.premium_profiles.to_string(),
    ]);
    table.add_row(vec![
        "Newest job".to_string(),
        stats
            .newest_job
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string()),
    ]);

    println!("{table}");
    Ok(())
}
