//! ccr - run Claude Code through a shared, reference-counted router service

use anyhow::Result;
use ccr::config::{Config, ConfigResolver};
use clap::{Parser, Subcommand};

mod commands;
mod logging;

use commands::{cmd_code, cmd_config, cmd_start, cmd_statusline, cmd_status, cmd_stop};
use logging::{init_cli_logging, init_service_logging};

#[derive(Parser)]
#[command(name = "ccr")]
#[command(about = "Run Claude Code through a shared router service")]
#[command(after_help = "\
QUICK START:
  ccr code                        # Start Claude Code (starts the service if needed)
  ccr code --provider openrouter  # Pin this session to a provider
  ccr status                      # Show service state and active sessions

CONFIG LOCATIONS (first found wins):
  ./config.json
  ./.claude-code-router/config.json
  ~/.claude-code-router/config.json (or $CCR_HOME/config.json)")]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run Claude Code through the router
  #[command(after_help = "\
EXAMPLES:
  ccr code
  ccr code --resume
  ccr code --provider openrouter --strip-system \"explain this repo\"")]
  Code {
    /// Route this session to the first model of the named provider
    #[arg(long)]
    provider: Option<String>,
    /// Drop the system prompt for this session
    #[arg(long)]
    strip_system: bool,
    /// Do not start the service if it is not running
    #[arg(long)]
    no_start: bool,
    /// Arguments passed through to Claude Code
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
  },
  /// Run the router service in the foreground
  Start,
  /// Stop the router service, even if sessions still use it
  Stop,
  /// Show service status
  Status,
  /// Show the effective configuration
  Config {
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
  /// Render Claude Code's status line (reads JSON on stdin)
  Statusline,
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  // Use file logging for the service host, console-only for other commands
  let guard = match &cli.command {
    Commands::Start => {
      let resolver = ConfigResolver::from_env();
      let config = resolver.resolve().await.unwrap_or_else(|_| Config::default());
      init_service_logging(&config, resolver.home())
    }
    _ => {
      init_cli_logging();
      None
    }
  };

  let exit_code = match cli.command {
    Commands::Code {
      provider,
      strip_system,
      no_start,
      args,
    } => cmd_code(provider, strip_system, no_start, args).await?,
    Commands::Start => cmd_start().await.map(|()| 0)?,
    Commands::Stop => cmd_stop().await.map(|()| 0)?,
    Commands::Status => cmd_status().await.map(|()| 0)?,
    Commands::Config { json } => cmd_config(json).await.map(|()| 0)?,
    Commands::Statusline => cmd_statusline().await.map(|()| 0)?,
  };

  if exit_code != 0 {
    drop(guard);
    std::process::exit(exit_code);
  }

  Ok(())
}
