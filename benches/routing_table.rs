//! Micro-benchmarks for RoutingTable operations: update, find_closest and delete
//! at varying table sizes. Reports nanoseconds-per-operation.
//!
//! Run: `cargo bench --bench routing_table`

use std::net::SocketAddr;
use std::time::Instant;

use kademlia_routing::{Id, Node, RoutingTable, BUCKET_SIZE};

fn main() {
    println!("routing_table\n");

    bench_update();
    bench_find_closest();
    bench_delete();
}

fn address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6881))
}

fn filled(size: usize) -> (RoutingTable, Vec<Node>) {
    let table = RoutingTable::new(Node::new(Id::random(), address()));
    let mut admitted = Vec::with_capacity(size);

    for _ in 0..size {
        let node = Node::new(Id::random(), address());
        if let Ok(true) = table.update(node.clone()) {
            admitted.push(node);
        }
    }

    (table, admitted)
}

fn bench_update() {
    println!("update");

    for size in [0, 100, 400] {
        let (table, _) = filled(size);

        // Pre-generate nodes outside the timed section
        let fresh: Vec<_> = (0..1000).map(|_| Node::new(Id::random(), address())).collect();

        let start = Instant::now();
        for node in fresh {
            let _ = table.update(node);
        }
        let per_op = start.elapsed().as_nanos() / 1000;
        println!(
            "{size:>4} nodes: {per_op}ns/op (final size: {})",
            table.len()
        );
    }

    // Refreshing a known node moves it to the most recently seen end.
    {
        let (table, admitted) = filled(400);

        let start = Instant::now();
        for node in admitted.iter().cycle().take(1000).cloned() {
            let _ = table.update(node);
        }
        let per_op = start.elapsed().as_nanos() / 1000;
        println!("refresh:    {per_op}ns/op");
    }

    println!();
}

fn bench_find_closest() {
    println!("find_closest");

    for size in [16, 100, 400] {
        let (table, _) = filled(size);
        let targets: Vec<_> = (0..1000).map(|_| Id::random()).collect();

        let start = Instant::now();
        for target in &targets {
            let closest = table.find_closest(target, BUCKET_SIZE);
            std::hint::black_box(closest);
        }
        let per_op = start.elapsed().as_nanos() / 1000;
        println!("{size:>4} nodes: {per_op}ns/op");
    }

    println!();
}

fn bench_delete() {
    println!("delete");

    let (table, admitted) = filled(400);
    let count = admitted.len().max(1) as u128;

    let start = Instant::now();
    for node in &admitted {
        table.delete(&node.id);
    }
    let per_op = start.elapsed().as_nanos() / count;
    println!("{} nodes: {per_op}ns/op", admitted.len());

    println!();
}
