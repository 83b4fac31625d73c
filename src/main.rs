//! ferry - fetch files from a ferryd daemon
//!
//! Given file names on the command line, fetches each in order over one
//! connection. With no names, prompts interactively until EOF or "quit".

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{BufRead, Write};
use std::net::{Ipv6Addr, SocketAddr};
use std::path::Path;
use tokio::net::TcpStream;

use fileferry::cli::ClientOpts;
use fileferry::net::client::{self, Fetched};
use fileferry::Error;

fn main() -> Result<()> {
    let opts = ClientOpts::parse();

    if !opts.out.is_dir() {
        anyhow::bail!("output path is not a directory: {}", opts.out.display());
    }

    let (host, port) = parse_server(&opts.server, opts.port)?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    rt.block_on(run(&host, port, &opts))
}

/// Split the server argument into host and port. Accepts `host`,
/// `host:port`, bare IPv4/IPv6 literals, and `[v6]:port`.
fn parse_server(server: &str, default_port: u16) -> Result<(String, u16)> {
    // Full socket address first: covers `1.2.3.4:9000` and `[::1]:9000`.
    if let Ok(addr) = server.parse::<SocketAddr>() {
        return Ok((addr.ip().to_string(), addr.port()));
    }
    // A bare IPv6 literal is all colons; splitting it would mangle it.
    if server.parse::<Ipv6Addr>().is_ok() {
        return Ok((server.to_string(), default_port));
    }
    match server.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .with_context(|| format!("invalid port in address: {server}"))?;
            Ok((host.to_string(), port))
        }
        None => Ok((server.to_string(), default_port)),
    }
}

async fn run(host: &str, port: u16, opts: &ClientOpts) -> Result<()> {
    let mut stream = client::connect(host, port).await?;
    eprintln!("Connected to {host}:{port}");

    if !opts.files.is_empty() {
        for name in &opts.files {
            fetch_one(&mut stream, name, &opts.out).await?;
        }
        return Ok(());
    }

    let stdin = std::io::stdin();
    loop {
        print!("file> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let name = line.trim();
        if name.is_empty() || name == "quit" {
            break;
        }
        match fetch_one(&mut stream, name, &opts.out).await {
            Ok(()) => {}
            // A refusal leaves the stream in sync (fetch drains any payload
            // it already announced), so keep the session.
            Err(e)
                if e.downcast_ref::<Error>()
                    .is_some_and(|e| matches!(e, Error::PathRejected(_))) =>
            {
                eprintln!("refused: {e}");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

async fn fetch_one(stream: &mut TcpStream, name: &str, out: &Path) -> Result<()> {
    match client::fetch(stream, name, out).await? {
        Fetched::Written { path, bytes } => {
            println!("{name}: {bytes} bytes -> {}", path.display());
        }
        Fetched::NotFound => {
            println!("{name}: not found on server");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_server_forms() {
        let p = fileferry::protocol::DEFAULT_PORT;
        assert_eq!(parse_server("example.com", p).unwrap(), ("example.com".into(), p));
        assert_eq!(parse_server("example.com:9000", p).unwrap(), ("example.com".into(), 9000));
        assert_eq!(parse_server("10.0.0.5:9000", p).unwrap(), ("10.0.0.5".into(), 9000));
        assert_eq!(parse_server("::1", p).unwrap(), ("::1".into(), p));
        assert_eq!(parse_server("[::1]:9000", p).unwrap(), ("::1".into(), 9000));
        assert!(parse_server("example.com:notaport", p).is_err());
    }
}
