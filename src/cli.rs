//! Shared CLI helpers and small reusable Clap fragments

use crate::protocol::DEFAULT_PORT;
use clap::Parser;
use std::path::PathBuf;

/// Daemon options used by ferryd
#[derive(Clone, Debug, Parser)]
pub struct DaemonOpts {
    /// Bind address (host:port)
    #[arg(long, default_value = "0.0.0.0:27015")]
    pub bind: String,

    /// Root directory to serve
    #[arg(long, default_value = ".")]
    pub root: PathBuf,
}

/// Client options used by ferry
#[derive(Clone, Debug, Parser)]
#[command(author, version, about = "Fetch files from a ferryd file server")]
pub struct ClientOpts {
    /// Server address: hostname, IPv4/IPv6 literal, or host:port
    pub server: String,

    /// Files to fetch; with none given, prompt interactively
    pub files: Vec<String>,

    /// Directory to write downloads into
    #[arg(long, default_value = ".")]
    pub out: PathBuf,

    /// Server port, when not part of the address
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
}
