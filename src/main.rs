use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use worldcoins::cli::setup::{setup, setup_at_path};
use worldcoins::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for worldcoins::AppCommand {
    fn from(cmd: Commands) -> worldcoins::AppCommand {
        match cmd {
            Commands::List => worldcoins::AppCommand::List,
            Commands::Convert {
                from,
                to,
                amount,
                swap,
            } => worldcoins::AppCommand::Convert {
                from,
                to,
                amount,
                swap,
            },
            Commands::Watch { from, to, amount } => {
                worldcoins::AppCommand::Watch { from, to, amount }
            }
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration (at --config-path when given)
    Setup,
    /// List all known currencies and their rates
    List,
    /// Convert an amount between two currencies (codes or names)
    Convert {
        from: String,
        to: String,
        #[arg(allow_hyphen_values = true)]
        amount: String,
        /// Print the reverse of the conversion
        #[arg(long)]
        swap: bool,
    },
    /// Keep a conversion up to date as rates refresh, until Ctrl-C
    Watch {
        from: String,
        to: String,
        #[arg(allow_hyphen_values = true)]
        amount: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => setup_at_path(path),
            None => setup(),
        },
        Some(cmd) => worldcoins::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
