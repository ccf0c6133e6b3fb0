//! CLI module for the cache proxy

pub mod serve;

use clap::{Parser, Subcommand};

/// PMP Cache Proxy - exact and semantic response caching in front of a text generation service
#[derive(Parser)]
#[command(name = "pmp-cache-proxy")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the proxy server (default)
    Serve(serve::ServeArgs),
}
