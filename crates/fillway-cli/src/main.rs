//! Fillway CLI - terminal interface for the Fillway platform.

mod commands;
mod context;
mod output;

use clap::{Parser, Subcommand};

/// Fillway CLI for authentication and account status.
#[derive(Parser)]
#[command(name = "fillway")]
#[command(about = "Fillway CLI for authentication and account status")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in through the browser
    Login,

    /// Sign out and clear stored credentials
    Logout,

    /// Show authentication status
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    cli_config_and_utils::init_logging(&cli.log_level);

    let context = match context::AppContext::bootstrap() {
        Ok(context) => context,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Login => commands::login(&context, &cli.format).await,
        Commands::Logout => commands::logout(&context, &cli.format).await,
        Commands::Status => commands::status(&context, &cli.format).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
