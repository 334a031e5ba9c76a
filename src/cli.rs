//! Command-line interface definitions using clap.

use crate::paths;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Geospatial job matching and live worker radar service.
#[derive(Parser, Debug)]
#[command(name = "rozgar")]
#[command(author, about, long_about = None)]
#[command(version = crate::version::clap_version())]
pub struct Cli {
    /// Path to the jobs/profiles database.
    #[arg(long, env = "ROZGAR_DB_PATH", default_value_os_t = paths::get_db_path())]
    pub db_path: PathBuf,

    /// Enable verbose output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output.
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API server.
    Serve(ServeArgs),

    /// Show catalog statistics.
    Info,

    /// Generate shell completions.
    Completions(CompletionsArgs),
}

/// Arguments for the serve command.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Host address to bind to.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Enable CORS for all origins.
    #[arg(long)]
    pub cors: bool,

    /// Allow specific CORS origins (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// Maximum concurrent database operations.
    #[arg(long, default_value_t = 8)]
    pub db_connections: usize,

    /// Timeout for a single database operation, in seconds.
    #[arg(long, default_value_t = 30)]
    pub db_timeout_secs: u64,

    /// Rate limit window length, in seconds.
    #[arg(long, default_value_t = 60)]
    pub rate_limit_window_secs: u64,

    /// Requests admitted per source per window.
    #[arg(long, default_value_t = 20)]
    pub rate_limit_max: u32,

    /// Maximum tracked rate-limit keys before LRU eviction.
    #[arg(long, default_value_t = 500)]
    pub rate_limit_keys: usize,

    /// Seconds before an unrefreshed worker location counts as offline.
    #[arg(long, default_value_t = 600)]
    pub freshness_secs: u64,

    /// Per-subscriber live feed event buffer.
    #[arg(long, default_value_t = 256)]
    pub feed_buffer: usize,

    /// Shared token for the messaging-provider verification handshake.
    #[arg(long, env = "ROZGAR_WEBHOOK_VERIFY_TOKEN", default_value = "rozgar-verify-token")]
    pub webhook_verify_token: String,

    /// App secret for webhook signature verification (unchecked when unset).
    #[arg(long, env = "ROZGAR_WEBHOOK_APP_SECRET", hide_env_values = true)]
    pub webhook_app_secret: Option<String>,

    /// Messaging provider endpoint for outbound replies and alerts.
    #[arg(long, env = "ROZGAR_MESSAGING_URL")]
    pub messaging_url: Option<String>,

    /// Messaging provider access token.
    #[arg(long, env = "ROZGAR_MESSAGING_TOKEN", hide_env_values = true)]
    pub messaging_token: Option<String>,

    /// Log format: pretty, compact, or json.
    #[arg(long)]
    pub log_format: Option<String>,
}

/// Arguments for shell completions.
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for.
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate and print completions to stdout.
    pub fn generate(&self) {
        clap_complete::generate(
            self.shell,
            &mut Cli::command(),
            "rozgar",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_serve_defaults() {
        let cli = Cli::parse_from(["rozgar", "serve"]);
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.host, "127.0.0.1");
                assert_eq!(args.port, 8080);
                assert_eq!(args.rate_limit_max, 20);
                assert_eq!(args.rate_limit_window_secs, 60);
                assert_eq!(args.freshness_secs, 600);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_cli_parses_overrides() {
        let cli = Cli::parse_from([
            "rozgar",
            "serve",
            "--port",
            "9000",
            "--cors",
            "--rate-limit-max",
            "50",
        ]);
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.port, 9000);
                assert!(args.cors);
                assert_eq!(args.rate_limit_max, 50);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_verbose_quiet_conflict() {
        assert!(Cli::try_parse_from(["rozgar", "-v", "-q", "info"]).is_err());
    }
}
