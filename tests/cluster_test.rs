//! sudonet Cluster Tests
//!
//! Multi-node scenarios over real loopback TCP:
//! - Join protocol and peer-list convergence
//! - Searches on one node and across several
//! - Eviction of silent peers and reclaiming their ranges
//! - Graceful leave
//!
//! Every node binds an ephemeral port, so the tests can run in parallel.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sudonet::common::transport::{JsonCodec, TcpTransport};
use sudonet::common::{JoinRequest, SendWork, SolutionFound, UpdateAction};
use sudonet::{
    CandidateValidator, CoordinationNode, Grid, JobOutcome, Message, NodeAddress, NodeConfig, NodeHandle,
    NodeSnapshot, Range,
};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

// ============================================================================
// Helpers
// ============================================================================

/// Candidates told apart by their first cell, which holds the index.
fn tagged_candidates(n: usize) -> Vec<Grid> {
    assert!(n <= 256);
    (0..n)
        .map(|i| {
            let mut grid = Grid::empty();
            grid.set(0, 0, i as u8);
            grid
        })
        .collect()
}

fn accept_index(index: u8) -> Arc<dyn CandidateValidator> {
    Arc::new(move |grid: &Grid| grid.cell(0, 0) == index)
}

/// Short heartbeats and timeouts so failure detection fits in a test.
fn fast_config() -> NodeConfig {
    NodeConfig::new(0)
        .with_heartbeat_interval(Duration::from_millis(100))
        .with_peer_timeout(Duration::from_millis(600))
        .with_poll_interval(Duration::from_millis(20))
}

async fn start_node(config: NodeConfig, validator: Arc<dyn CandidateValidator>) -> NodeHandle {
    let (node, handle) = CoordinationNode::bind_with_validator(config, validator)
        .await
        .unwrap();
    tokio::spawn(node.run());
    handle
}

async fn wait_for(handle: &NodeHandle, what: &str, predicate: impl Fn(&NodeSnapshot) -> bool) -> NodeSnapshot {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let snapshot = handle.inspect().await.unwrap();
        if predicate(&snapshot) {
            return snapshot;
        }
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {}: {:?}",
            what,
            snapshot
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

async fn solve(handle: &NodeHandle, candidates: Vec<Grid>) -> JobOutcome {
    tokio::time::timeout(Duration::from_secs(15), handle.solve(candidates))
        .await
        .expect("search timed out")
        .unwrap()
}

/// A hand-driven peer speaking the wire protocol directly.
struct FakePeer {
    address: NodeAddress,
    stream: TcpStream,
    transport: TcpTransport,
}

impl FakePeer {
    async fn connect(to: &NodeAddress, advertised_port: u16) -> Self {
        let transport = TcpTransport::new();
        let stream = transport.connect(to).await.unwrap();
        Self {
            address: NodeAddress::new("127.0.0.1", advertised_port),
            stream,
            transport,
        }
    }

    async fn send(&mut self, message: Message) {
        TcpTransport::send_message(&mut self.stream, &message).await.unwrap();
    }

    /// Next message, or `None` once the node closes the connection.
    async fn recv(&mut self) -> Option<Message> {
        let frame = tokio::time::timeout(Duration::from_secs(10), self.transport.receive_frame(&mut self.stream))
            .await
            .expect("timed out waiting for a frame")
            .ok()??;
        Some(JsonCodec::decode(&frame).unwrap())
    }

    /// Asks the node for its peer list, then announces itself.
    async fn join(&mut self) -> Vec<NodeAddress> {
        self.send(Message::join_request(self.address.clone())).await;
        let known = match self.recv().await {
            Some(Message::JoinAck(ack)) => ack.nodes,
            other => panic!("expected join_ack, got {:?}", other),
        };
        self.send(Message::update_nodes(self.address.clone(), UpdateAction::Insert))
            .await;
        known
    }
}

// ============================================================================
// Membership
// ============================================================================

#[tokio::test]
async fn test_join_convergence() {
    let never = accept_index(255);
    let a = start_node(NodeConfig::new(0), never.clone()).await;

    let b = start_node(NodeConfig::new(0).with_anchor(a.address().clone()), never.clone()).await;
    wait_for(&a, "A to learn B", |s| s.peers.contains(b.address())).await;

    let c = start_node(NodeConfig::new(0).with_anchor(a.address().clone()), never).await;

    for (node, others) in [
        (&a, [b.address(), c.address()]),
        (&b, [a.address(), c.address()]),
        (&c, [a.address(), b.address()]),
    ] {
        let snapshot = wait_for(node, "peer table to converge", |s| {
            s.peers.len() == 2 && others.iter().all(|o| s.connected.contains(o))
        })
        .await;
        assert!(!snapshot.peers.contains(node.address()));
        assert!(snapshot.accepting);
    }
}

#[tokio::test]
async fn test_join_ack_lists_known_peers() {
    let never = accept_index(255);
    let a = start_node(NodeConfig::new(0), never.clone()).await;
    let b = start_node(NodeConfig::new(0).with_anchor(a.address().clone()), never).await;
    wait_for(&a, "A to learn B", |s| s.peers.contains(b.address())).await;

    let mut fake = FakePeer::connect(a.address(), 1).await;
    let known = fake.join().await;
    assert_eq!(known, vec![b.address().clone()]);

    wait_for(&a, "A to learn the fake peer", |s| s.peers.contains(&fake.address)).await;
}

#[tokio::test]
async fn test_unknown_message_keeps_connection() {
    let a = start_node(NodeConfig::new(0), accept_index(255)).await;
    let mut fake = FakePeer::connect(a.address(), 1).await;

    let body = br#"{"type": "solve_sudoku", "data": {"solutions": []}}"#;
    fake.stream.write_all(&(body.len() as u32).to_be_bytes()).await.unwrap();
    fake.stream.write_all(body).await.unwrap();

    // Missing fields are discarded the same way
    let body = br#"{"type": "join_request", "data": {"node_ip": "127.0.0.1"}}"#;
    fake.stream.write_all(&(body.len() as u32).to_be_bytes()).await.unwrap();
    fake.stream.write_all(body).await.unwrap();

    fake.send(Message::JoinRequest(JoinRequest {
        node: fake.address.clone(),
    }))
    .await;
    assert!(matches!(fake.recv().await, Some(Message::JoinAck(_))));
}

// ============================================================================
// Searching
// ============================================================================

#[tokio::test]
async fn test_single_node_search() {
    let a = start_node(NodeConfig::new(0), accept_index(5)).await;

    match solve(&a, tagged_candidates(9)).await {
        JobOutcome::Solved { index, solution } => {
            assert_eq!(index, 5);
            assert_eq!(solution.cell(0, 0), 5);
        }
        other => panic!("expected a solution, got {:?}", other),
    }

    let snapshot = a.inspect().await.unwrap();
    assert!(snapshot.assignments.is_empty());
    assert_eq!(snapshot.active_job, None);
    assert_eq!(snapshot.available, vec![a.address().clone()]);
}

#[tokio::test]
async fn test_exhausted_search() {
    let a = start_node(NodeConfig::new(0), accept_index(255)).await;
    assert_eq!(solve(&a, tagged_candidates(30)).await, JobOutcome::Exhausted);

    let stats = a.stats().await.unwrap();
    assert_eq!(stats.all.validations, 30);
    assert_eq!(stats.all.solved, 0);
}

#[tokio::test]
async fn test_empty_search_is_rejected() {
    let a = start_node(NodeConfig::new(0), accept_index(0)).await;
    assert!(a.solve(Vec::new()).await.is_err());
}

#[tokio::test]
async fn test_queued_searches_run_in_order() {
    let a = start_node(NodeConfig::new(0), accept_index(40)).await;

    let (first, second) = tokio::join!(solve(&a, tagged_candidates(50)), solve(&a, tagged_candidates(30)));
    assert!(matches!(first, JobOutcome::Solved { index: 40, .. }));
    assert_eq!(second, JobOutcome::Exhausted);
}

#[tokio::test]
async fn test_search_across_two_nodes() {
    let a = start_node(fast_config(), accept_index(90)).await;
    let b = start_node(fast_config().with_anchor(a.address().clone()), accept_index(90)).await;
    wait_for(&a, "A to learn B", |s| s.available.contains(b.address())).await;

    match solve(&a, tagged_candidates(100)).await {
        JobOutcome::Solved { index, .. } => assert_eq!(index, 90),
        other => panic!("expected a solution, got {:?}", other),
    }

    // B's share of the work shows up in A's stats through its heartbeats
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let stats = a.stats().await.unwrap();
        let b_validations = stats
            .nodes
            .iter()
            .find(|n| n.address == b.address().to_string())
            .map(|n| n.validations)
            .unwrap_or(0);
        if b_validations > 0 {
            assert!(stats.nodes[0].validations > 0);
            break;
        }
        assert!(Instant::now() < deadline, "B never reported validations: {:?}", stats);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn test_peer_receives_work_and_reports_back() {
    let a = start_node(NodeConfig::new(0), accept_index(255)).await;
    let mut fake = FakePeer::connect(a.address(), 1).await;
    fake.join().await;
    wait_for(&a, "fake peer available", |s| s.available.contains(&fake.address)).await;

    let search = {
        let a = a.clone();
        tokio::spawn(async move { a.solve(tagged_candidates(100)).await })
    };

    // ratio(100, 2) = 5: the node keeps [0, 4] and sends [5, 9]
    let work = loop {
        match fake.recv().await {
            Some(Message::SendWork(work)) => break work,
            Some(_) => continue,
            None => panic!("connection closed before send_work"),
        }
    };
    assert_eq!(work.range, Range::new(5, 9));
    assert_eq!(work.node, *a.address());
    assert_eq!(work.solutions.len(), 5);
    assert_eq!(work.solutions[0].cell(0, 0), 5);

    fake.send(Message::SolutionFound(SolutionFound {
        node: fake.address.clone(),
        solution_index: 7,
        job_id: work.job_id,
    }))
    .await;

    match search.await.unwrap().unwrap() {
        JobOutcome::Solved { index, solution } => {
            assert_eq!(index, 7);
            assert_eq!(solution.cell(0, 0), 7);
        }
        other => panic!("expected a solution, got {:?}", other),
    }

    let snapshot = wait_for(&a, "fake peer back in the available set", |s| {
        s.available.contains(&fake.address)
    })
    .await;
    assert!(snapshot.assignments.is_empty());
}

// ============================================================================
// Failure detection
// ============================================================================

#[tokio::test]
async fn test_silent_peer_is_evicted_and_its_range_reclaimed() {
    let a = start_node(fast_config(), accept_index(7)).await;
    let mut fake = FakePeer::connect(a.address(), 1).await;
    fake.join().await;
    wait_for(&a, "fake peer available", |s| s.available.contains(&fake.address)).await;

    let search = {
        let a = a.clone();
        tokio::spawn(async move { a.solve(tagged_candidates(100)).await })
    };

    // The fake peer holds [5, 9] and never answers or sends hello; index 7
    // can only be found after the node takes that range back.
    let mut assigned = Vec::new();
    while let Some(message) = fake.recv().await {
        if let Message::SendWork(SendWork { range, .. }) = message {
            assigned.push(range);
        }
    }
    assert_eq!(assigned, vec![Range::new(5, 9)]);

    match search.await.unwrap().unwrap() {
        JobOutcome::Solved { index, .. } => assert_eq!(index, 7),
        other => panic!("expected a solution, got {:?}", other),
    }

    let snapshot = a.inspect().await.unwrap();
    assert!(!snapshot.peers.contains(&fake.address));
    assert!(!snapshot.available.contains(&fake.address));
}

#[tokio::test]
async fn test_dropped_connection_evicts_peer() {
    let a = start_node(NodeConfig::new(0), accept_index(255)).await;
    let mut fake = FakePeer::connect(a.address(), 1).await;
    fake.join().await;
    wait_for(&a, "fake peer known", |s| s.peers.contains(&fake.address)).await;

    drop(fake);
    wait_for(&a, "fake peer evicted", |s| s.peers.is_empty() && s.available.len() == 1).await;
}

#[tokio::test]
async fn test_departed_peer_connection_closed_on_eviction() {
    let a = start_node(fast_config(), accept_index(255)).await;
    let mut fake = FakePeer::connect(a.address(), 1).await;
    fake.join().await;
    wait_for(&a, "fake peer available", |s| s.available.contains(&fake.address)).await;

    // Announce departure but keep the socket open and stay silent
    fake.send(Message::update_nodes(fake.address.clone(), UpdateAction::Remove))
        .await;
    wait_for(&a, "fake peer dropped from the peer table", |s| !s.peers.contains(&fake.address)).await;
    wait_for(&a, "fake peer evicted", |s| !s.available.contains(&fake.address)).await;

    // Only heartbeats sent before the departure may still be buffered; after
    // that the node must have closed its end.
    while let Some(message) = fake.recv().await {
        assert!(
            matches!(message, Message::Hello(_)),
            "connection of an evicted peer still served: {:?}",
            message
        );
    }

    let _ = fake.stream.write_all(b"\0\0\0\x02{}").await;
    assert_eq!(fake.recv().await, None);
}

#[tokio::test]
async fn test_graceful_leave() {
    let never = accept_index(255);
    let a = start_node(fast_config(), never.clone()).await;
    let b = start_node(fast_config().with_anchor(a.address().clone()), never).await;
    wait_for(&a, "A to learn B", |s| s.peers.contains(b.address())).await;

    b.shutdown().await.unwrap();

    wait_for(&a, "A to drop B from its peer table", |s| s.peers.is_empty()).await;
    // The heartbeat timeout then clears B from the available set
    wait_for(&a, "B to leave the available set", |s| s.available == vec![s.address.clone()]).await;
}
