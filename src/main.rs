use clap::Parser;
use pmp_cache_proxy::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve(Default::default())) {
        Command::Serve(args) => cli::serve::run(args).await,
    }
}
