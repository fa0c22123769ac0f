use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "clipfetch")]
#[command(about = "Track media conversion jobs on a remote service", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $CLIPFETCH_CONFIG or config/clipfetch.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit a source URL and follow the job until it is ready or fails
    Fetch(FetchArgs),
    /// Run the local stub conversion service
    Stub(StubArgs),
    /// Print the effective configuration
    Config,
}

#[derive(clap::Args, Debug)]
pub struct FetchArgs {
    /// Source URL to convert
    pub url: String,

    /// Extract audio (MP3) instead of video (MP4)
    #[arg(long)]
    pub audio_only: bool,

    /// Override service.base_url
    #[arg(long)]
    pub base_url: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct StubArgs {
    /// Address to bind the stub service to
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub address: SocketAddr,
}
