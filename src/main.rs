use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, info};

use gator::logging::{self, DEFAULT_LEVEL};
use gator::{
    Builtin, Command, Commands, ConfigFile, Database, FeedFetcher, GatorError, Result, State,
};

/// Gator - a command-line RSS feed aggregator.
#[derive(Debug, Parser)]
#[command(name = "gator", version, about)]
struct Cli {
    /// Configuration file (default: ~/.gatorconfig.json).
    #[arg(long, env = "GATOR_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "GATOR_LOG", default_value = DEFAULT_LEVEL)]
    log_level: String,

    /// Command to run.
    command: Option<String>,

    /// Command arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let commands = Commands::standard();
    match run(cli, &commands).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_usage() => {
            eprintln!("Error: {e}");
            if matches!(e.root(), GatorError::NoCommand) {
                print_commands(&commands);
            }
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, commands: &Commands) -> Result<()> {
    let command = Command::new(cli.command.unwrap_or_default(), cli.args);

    // Reject bad names before touching config or database
    if command.name.is_empty() {
        return Err(GatorError::NoCommand);
    }
    if !commands.contains(&command.name) {
        return Err(GatorError::UnknownCommand(command.name));
    }

    let path = match cli.config {
        Some(path) => path,
        None => ConfigFile::default_path()?,
    };
    let config_file = ConfigFile::load(&path)?;

    // Overrides apply to this run only and are never written back
    let mut config = config_file.config().clone();
    config.apply_env_overrides();
    config.validate()?;

    let db = Database::open(&config.db_url).await?;
    let fetcher = FeedFetcher::new()?;
    let mut state = State::new(config_file, db.clone(), fetcher);

    if command.name == Builtin::Agg.name() {
        let shutdown = state.shutdown();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, stopping");
                shutdown.notify_one();
            }
        });
    }

    debug!(command = %command.name, "dispatching");
    let result = commands.run(&mut state, &command).await;
    db.close().await;
    result
}

fn print_commands(commands: &Commands) {
    eprintln!("Commands:");
    for name in commands.names() {
        if let Some(usage) = commands.usage(name) {
            eprintln!("  {usage}");
        }
    }
}
