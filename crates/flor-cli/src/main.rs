//! flor - ROS recipe regeneration CLI

use clap::Parser;
use crossterm::style::Stylize;
use tracing_subscriber::EnvFilter;

use flor_cli::cmd;
use flor_cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let cli = Cli::parse_from(&args);

    let result = match cli.command {
        Commands::Yocto(yocto) => cmd::yocto::run(&yocto, &args).await,
        Commands::Gentoo(gentoo) => cmd::gentoo::run(&gentoo, &args).await,
        Commands::Completions { shell } => {
            cmd::completions::completions(shell);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}", format!("!!!! {e:#}").red());
        std::process::exit(1);
    }
}
