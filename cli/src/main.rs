use clap::{Parser, Subcommand};
use std::error::Error;
use tracing::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod serve;
mod trivia;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Serve(serve::Command),
    Catalog(trivia::Command),
}

fn get_rust_log(verbose: u8) -> String {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let mut original = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| format!("trivia={0},lobby={0},catalog={0}", level));

    if !original.contains("tower_http=") {
        original.push_str(",tower_http=info");
    }

    original
}

fn main() -> Result<(), Box<dyn Error>> {
    color_backtrace::install();

    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(get_rust_log(cli.verbose)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("initialized, ready");

    match &cli.command {
        Some(Commands::Serve(cmd)) => Ok(serve::execute_command(cmd)?),
        Some(Commands::Catalog(cmd)) => Ok(trivia::execute_command(cmd)?),
        None => Ok(()),
    }
}
