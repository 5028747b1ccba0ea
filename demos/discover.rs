//! Spins up a local swarm of nodes joining one after another, then runs lookups across it.
//!
//! Run: `cargo run --example discover -- --nodes 20`

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::Level;

use kademlia_routing::rpc::Config;
use kademlia_routing::{Dht, Id};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of nodes in the swarm
    #[arg(short, long, default_value_t = 10)]
    nodes: usize,
    /// Target to look up, a random one if omitted
    #[arg(short, long)]
    target: Option<String>,
    /// Request timeout in milliseconds
    #[arg(long, default_value_t = 500)]
    timeout: u64,
    /// Log every lookup step
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::TRACE
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let target = match &cli.target {
        Some(hex) => Id::from_str(hex).expect("invalid target"),
        None => Id::random(),
    };

    let config = |bootstrap: Vec<SocketAddr>| Config {
        bind_address: SocketAddr::from(([127, 0, 0, 1], 0)),
        bootstrap,
        request_timeout: Duration::from_millis(cli.timeout),
        ..Default::default()
    };

    println!("\nStarting {} nodes ...\n", cli.nodes);

    let mut swarm: Vec<Dht> = Vec::with_capacity(cli.nodes);
    for _ in 0..cli.nodes {
        // Each node only knows the one that joined right before it.
        let bootstrap = swarm.last().map(|dht| vec![dht.local_addr()]).unwrap_or_default();
        swarm.push(Dht::new(config(bootstrap)).expect("failed to start node"));
    }

    println!("\n=== DISCOVERY ===");
    for dht in &swarm {
        dht.discover();
    }
    for dht in &swarm {
        println!("{} {:>4} peers", dht.local().id, dht.table().len());
    }

    println!("\n=== LOOKUP {target} ===");
    let start = Instant::now();
    let closest = swarm[0].find(target);
    println!(
        "Found {} nodes in {:?} seconds",
        closest.len(),
        start.elapsed().as_secs_f32()
    );
    for node in &closest {
        println!("{} {} {:?}", node.id, node.id.xor(&target), node.address);
    }

    for dht in &swarm {
        dht.shutdown();
    }
}
