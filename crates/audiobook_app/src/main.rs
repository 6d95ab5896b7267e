mod cli;
mod platform;

use clap::Parser;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = cli.run().await {
        eprintln!("audiobook error: {:#}", err);
        std::process::exit(1);
    }
}
