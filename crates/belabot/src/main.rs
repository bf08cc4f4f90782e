mod cli;
mod commands;
mod error;
mod twitch;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // `run` is a long-lived service; everything else is a one-shot command.
    let serving = matches!(cli.command, None | Some(Command::Run));
    init_tracing(cli.global.verbose, serving);

    // Both websocket clients use rustls; pick the ring backend once.
    let _ = rustls::crypto::ring::default_provider().install_default();

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, serving: bool) {
    let filter = match (verbosity, serving) {
        (0, false) => "warn",
        (0, true) | (1, _) => "info",
        (2, _) => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        None | Some(Command::Run) => commands::run::handle(&cli.global).await,

        Some(Command::Config(args)) => commands::config_cmd::handle(args, &cli.global),

        Some(Command::Completions(args)) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "belabot", &mut std::io::stdout());
            Ok(())
        }
    }
}
