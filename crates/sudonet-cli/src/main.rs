//! # sudonet CLI Entry Point
//!
//! Main binary for the sudonet peer-to-peer sudoku search network. Starts
//! coordination nodes and talks to their HTTP front-end.
//!
//! ## Usage
//!
//! ```bash
//! # Start the first node (HTTP on 8000, peers on 7000)
//! sudonet node -p 8000 -s 7000
//!
//! # Join an existing network through any member
//! sudonet node -p 8001 -s 7001 -a 127.0.0.1:7000
//!
//! # Slow down every validity check by 5ms
//! sudonet node -p 8002 -s 7002 -a 127.0.0.1:7000 --handicap 5
//!
//! # Submit a puzzle (outputs raw JSON)
//! sudonet solve http://127.0.0.1:8000 puzzle.json
//!
//! # Inspect the cluster
//! sudonet stats http://127.0.0.1:8000
//! sudonet network http://127.0.0.1:8001 | jq .
//! ```
//!
//! ## URL Format
//!
//! Client commands take the node's HTTP address with its scheme:
//! - ✅ `http://127.0.0.1:8000`
//! - ❌ `127.0.0.1:8000`

use anyhow::{Context, Result};
use argh::FromArgs;
use serde_json::Value;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use sudonet_common::NodeAddress;
use sudonet_node::{CoordinationNode, HttpServer, NodeConfig};

/// Validates that a URL string starts with http:// or https://
fn validate_http_url(url: &str, description: &str) -> Result<()> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!(
            "Invalid {}: '{}' must start with http:// or https://",
            description,
            url
        );
    }
    Ok(())
}

#[derive(FromArgs)]
/// sudonet - distributed sudoku search over a self-organising peer network
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Node(NodeArgs),
    Solve(SolveArgs),
    Stats(StatsArgs),
    Network(NetworkArgs),
}

/// Arguments for running a coordination node.
///
/// A node without `--anchor` becomes a rendezvous point and starts
/// listening immediately. With an anchor it joins through that peer first
/// and only accepts inbound peers once it has announced itself.
#[derive(FromArgs)]
#[argh(subcommand, name = "node")]
/// start a sudonet node
struct NodeArgs {
    /// port for the HTTP front-end (bound on all interfaces)
    #[argh(option, short = 'p')]
    http_port: u16,

    /// port for peer-to-peer traffic
    #[argh(option, short = 's')]
    p2p_port: u16,

    /// address (host:port) of any existing member to join through
    #[argh(option, short = 'a')]
    anchor: Option<String>,

    /// artificial delay added to every validity check, in milliseconds
    #[argh(option, long = "handicap", default = "0")]
    handicap_ms: u64,

    /// host this node advertises to its peers
    ///
    /// Peers dial this name back, so it must be reachable from them.
    #[argh(option, long = "host", default = "\"127.0.0.1\".into()")]
    host: String,

    /// seconds between heartbeats
    #[argh(option, long = "heartbeat-interval", default = "5")]
    heartbeat_interval_secs: u64,

    /// seconds of silence before a peer is evicted
    #[argh(option, long = "peer-timeout", default = "20")]
    peer_timeout_secs: u64,

    /// largest candidate list a single puzzle may expand to
    #[argh(option, long = "max-candidates", default = "1_000_000")]
    max_candidates: usize,
}

impl NodeArgs {
    fn to_config(&self) -> Result<NodeConfig> {
        let mut config = NodeConfig::new(self.p2p_port)
            .with_host(self.host.clone())
            .with_handicap(Duration::from_millis(self.handicap_ms))
            .with_heartbeat_interval(Duration::from_secs(self.heartbeat_interval_secs))
            .with_peer_timeout(Duration::from_secs(self.peer_timeout_secs))
            .with_max_candidates(self.max_candidates);

        if let Some(anchor) = &self.anchor {
            let anchor: NodeAddress = anchor
                .parse()
                .with_context(|| format!("Invalid anchor address '{}'", anchor))?;
            config = config.with_anchor(anchor);
        }

        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid node configuration: {}", e))?;
        Ok(config)
    }
}

/// Arguments for submitting a puzzle.
///
/// The file holds the grid as a 9x9 JSON array with `0` for empty cells.
/// A full request body (`{"sudoku": [...]}`) is accepted as well.
///
/// # Example
///
/// ```bash
/// sudonet solve http://127.0.0.1:8000 puzzle.json | jq '.solution'
/// ```
#[derive(FromArgs)]
#[argh(subcommand, name = "solve")]
/// submit a puzzle to a node and print the result
struct SolveArgs {
    /// HTTP address of the node (e.g. http://127.0.0.1:8000)
    #[argh(positional)]
    server_address: String,

    /// path to the puzzle JSON file
    #[argh(positional)]
    puzzle: String,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "stats")]
/// print cluster validation statistics
struct StatsArgs {
    /// HTTP address of the node
    #[argh(positional)]
    server_address: String,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "network")]
/// print the node's view of the peer graph
struct NetworkArgs {
    /// HTTP address of the node
    #[argh(positional)]
    server_address: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    match cli.command {
        Commands::Node(args) => {
            // Client commands keep stdout clean for piping
            let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
            tracing_subscriber::fmt().with_env_filter(env_filter).init();

            run_node(args).await
        }
        Commands::Solve(args) => {
            validate_http_url(&args.server_address, "server address")?;
            let body = load_puzzle(Path::new(&args.puzzle))?;
            let client = reqwest::Client::new();
            let response = client
                .post(format!("{}/solve", args.server_address.trim_end_matches('/')))
                .json(&body)
                .send()
                .await?;
            print_response(response).await
        }
        Commands::Stats(args) => get_and_print(&args.server_address, "stats").await,
        Commands::Network(args) => get_and_print(&args.server_address, "network").await,
    }
}

/// Runs a node and its HTTP front-end until ctrl-c, then leaves the
/// network gracefully.
async fn run_node(args: NodeArgs) -> Result<()> {
    let config = args.to_config()?;
    let max_candidates = config.max_candidates;

    tracing::info!("Starting sudonet node on {}:{}", config.host, config.p2p_port);
    match &config.anchor {
        Some(anchor) => tracing::info!("Joining through anchor {}", anchor),
        None => tracing::info!("No anchor given, starting a new network"),
    }
    if !config.handicap.is_zero() {
        tracing::info!("Validity check handicap: {:?}", config.handicap);
    }

    let (node, handle) = CoordinationNode::bind(config).await?;
    let mut node_task = tokio::spawn(node.run());

    let http_addr = SocketAddr::from(([0, 0, 0, 0], args.http_port));
    let server = HttpServer::new(handle.clone(), max_candidates);

    tokio::select! {
        result = server.run(http_addr) => {
            result?;
        }
        result = &mut node_task => {
            result??;
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received ctrl-c, leaving the network");
        }
    }

    if let Err(e) = handle.shutdown().await {
        tracing::warn!("Node already stopped: {}", e);
    }
    node_task.await??;
    Ok(())
}

/// Reads a puzzle file into a `/solve` request body.
fn load_puzzle(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read puzzle file {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;

    match value {
        Value::Object(ref map) if map.contains_key("sudoku") => Ok(value),
        Value::Array(_) => Ok(serde_json::json!({ "sudoku": value })),
        _ => anyhow::bail!(
            "{} must contain a 9x9 array or an object with a \"sudoku\" field",
            path.display()
        ),
    }
}

async fn get_and_print(server_address: &str, endpoint: &str) -> Result<()> {
    validate_http_url(server_address, "server address")?;
    let url = format!("{}/{}", server_address.trim_end_matches('/'), endpoint);
    let response = reqwest::get(url).await?;
    print_response(response).await
}

/// Prints a successful body as-is; failures go to stderr via the error.
async fn print_response(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        anyhow::bail!("Server returned {}: {}", status, body);
    }
    println!("{}", body);
    Ok(())
}
