//! Madder CLI - talk to the editor backend from a terminal.
//!
//! Sends one request over the framed TCP protocol and prints every success
//! body as JSON on stdout. Application errors are printed on stderr and make
//! the process exit non-zero.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use madder_client::config::NetConfig;
use madder_client::{net, Communicator, ConnectionState, Receiver, Request};
use serde_json::Value;
use std::cell::Cell;
use std::net::SocketAddr;
use std::rc::Rc;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "madder-cli")]
#[command(about = "Command-line client for the madder editor backend")]
struct Args {
    /// Backend host
    #[arg(long, default_value = NetConfig::DEFAULT_HOST)]
    host: String,

    /// Backend port
    #[arg(short, long, default_value_t = NetConfig::DEFAULT_PORT)]
    port: u16,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Keep printing responses until one carries `"done": true`
    #[arg(short, long, global = true)]
    follow: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a resource
    Get { path: String },
    /// Create a resource from a JSON entity
    Create { path: String, entity: String },
    /// Update a resource with a JSON entity
    Update { path: String, entity: String },
    /// Delete a resource
    Delete {
        path: String,
        #[arg(default_value = "{}")]
        entity: String,
    },
}

impl Command {
    fn into_request(self) -> Result<Request> {
        Ok(match self {
            Command::Get { path } => Request::get(path),
            Command::Create { path, entity } => Request::create(path, parse_entity(&entity)?),
            Command::Update { path, entity } => Request::update(path, parse_entity(&entity)?),
            Command::Delete { path, entity } => Request::delete(path, parse_entity(&entity)?),
        })
    }
}

fn parse_entity(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("Entity is not valid JSON: {}", raw))
}

fn print_body(body: &Value) {
    match serde_json::to_string_pretty(body) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{}", body),
    }
}

/// Resolve `host` (a name or a literal address) to the first socket address.
async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("Failed to resolve {}:{}", host, port))?
        .next()
        .with_context(|| format!("No address found for {}:{}", host, port))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the response bodies.
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let addr = resolve(&args.host, args.port).await?;
    let request = args.command.into_request()?;
    debug!("{} {} -> {}", request.method(), request.path(), addr);

    let failed = Rc::new(Cell::new(false));
    let on_error = {
        let failed = failed.clone();
        move |body: Value| {
            failed.set(true);
            eprintln!("error: {}", body);
        }
    };

    let (channel, mut events) = net::connect(addr);
    let mut communicator = Communicator::builder(channel, on_error)
        .on_abort(|aborted| {
            eprintln!("aborted: {} {}", aborted.method, aborted.path);
        })
        .build();

    let receiver = if args.follow {
        Receiver::receive_until(|body| print_body(&body), |body| body["done"] == Value::Bool(true))
    } else {
        Receiver::receive(|body| print_body(&body))
    };
    communicator.send(request, receiver)?;

    let state = net::pump_until_idle(&mut communicator, &mut events).await?;
    if state == ConnectionState::Closed {
        bail!("Connection to {} closed before the response arrived", addr);
    }
    if failed.get() {
        bail!("Backend reported an error");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_hostname() {
        let addr = resolve("localhost", NetConfig::DEFAULT_PORT).await.unwrap();
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), NetConfig::DEFAULT_PORT);
    }

    #[tokio::test]
    async fn test_resolve_literal_address() {
        let addr = resolve(NetConfig::DEFAULT_HOST, 4000).await.unwrap();
        assert_eq!(addr, SocketAddr::from(([127, 0, 0, 1], 4000)));
    }

    #[test]
    fn test_delete_entity_defaults_to_empty_object() {
        let args = Args::try_parse_from(["madder-cli", "delete", "/component/3"]).unwrap();
        let request = args.command.into_request().unwrap();
        assert_eq!(request.path(), "/component/3");
        assert_eq!(request.entity(), &serde_json::json!({}));
    }
}
