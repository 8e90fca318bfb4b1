// Copyright 2025 sudonet Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The coordination node.
//!
//! A [`CoordinationNode`] owns every piece of cluster state (peer table,
//! available set, range assignments, heartbeat ledger, stats) and mutates it
//! from a single task. Everything else talks to it through channels:
//!
//! - peer connections report frames and closures as [`ConnectionEvent`]s
//! - the acceptor hands over inbound streams
//! - the worker thread reports finished ranges
//! - external callers (the HTTP front-end, tests) use a [`NodeHandle`]
//!
//! The loop wakes at least every `poll_interval` so heartbeats go out and
//! silent peers are evicted even when no traffic arrives.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sudonet_common::transport::TcpTransport;
use sudonet_common::{
    generate_job_id, Grid, Hello, JobId, JoinAck, JoinRequest, Message, NodeAddress, Range, Result,
    SendWork, SolutionFound, SudonetError, UpdateAction, UpdateNodes, WorkDone,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::NodeConfig;
use crate::connection::{spawn_acceptor, Connection, ConnectionEvent, ConnectionId};
use crate::distributor::{Completion, Discovery, Dispatch, WorkDistributor};
use crate::failure_detector::HeartbeatLedger;
use crate::membership::PeerTable;
use crate::puzzle::SudokuValidator;
use crate::stats::{ClusterStats, NetworkView, StatsSnapshot};
use crate::worker::{spawn_worker, CandidateValidator, ScanResult, WorkItem, WorkOutcome};

/// How long a leaving node waits for its goodbye messages to flush.
const LEAVE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// How a search ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Solved { index: usize, solution: Grid },
    /// Every candidate was checked and none was valid.
    Exhausted,
}

/// Point-in-time view of a node's internal state.
#[derive(Debug, Clone)]
pub struct NodeSnapshot {
    pub address: NodeAddress,
    pub peers: Vec<NodeAddress>,
    pub connected: Vec<NodeAddress>,
    pub available: Vec<NodeAddress>,
    /// Outstanding ranges of the active job; `None` marks a pending range.
    pub assignments: Vec<(Range, Option<NodeAddress>)>,
    pub active_job: Option<JobId>,
    pub queued_jobs: usize,
    pub accepting: bool,
}

enum Command {
    Solve {
        candidates: Vec<Grid>,
        reply: oneshot::Sender<Result<JobOutcome>>,
    },
    Stats(oneshot::Sender<StatsSnapshot>),
    Network(oneshot::Sender<BTreeMap<String, Vec<String>>>),
    Inspect(oneshot::Sender<NodeSnapshot>),
    Shutdown,
}

/// Cloneable handle for talking to a running node.
#[derive(Debug, Clone)]
pub struct NodeHandle {
    address: NodeAddress,
    commands: mpsc::Sender<Command>,
}

impl NodeHandle {
    /// The address this node advertises to its peers.
    pub fn address(&self) -> &NodeAddress {
        &self.address
    }

    /// Searches `candidates` across the cluster and waits for the outcome.
    ///
    /// Searches are run one at a time; a call made while another search is
    /// in progress waits its turn.
    pub async fn solve(&self, candidates: Vec<Grid>) -> Result<JobOutcome> {
        self.request(|reply| Command::Solve { candidates, reply }).await?
    }

    pub async fn stats(&self) -> Result<StatsSnapshot> {
        self.request(Command::Stats).await
    }

    pub async fn network(&self) -> Result<BTreeMap<String, Vec<String>>> {
        self.request(Command::Network).await
    }

    pub async fn inspect(&self) -> Result<NodeSnapshot> {
        self.request(Command::Inspect).await
    }

    /// Asks the node to announce its departure and stop.
    pub async fn shutdown(&self) -> Result<()> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| SudonetError::NodeStopped)
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| SudonetError::NodeStopped)?;
        rx.await.map_err(|_| SudonetError::NodeStopped)
    }
}

struct QueuedJob {
    candidates: Vec<Grid>,
    reply: oneshot::Sender<Result<JobOutcome>>,
}

struct ActiveJob {
    id: JobId,
    reply: oneshot::Sender<Result<JobOutcome>>,
    started: Instant,
}

/// Receiving ends of every source the event loop multiplexes.
struct Inbox {
    connections: mpsc::UnboundedReceiver<ConnectionEvent>,
    accepted: mpsc::UnboundedReceiver<(TcpStream, SocketAddr)>,
    outcomes: mpsc::UnboundedReceiver<WorkOutcome>,
    commands: mpsc::Receiver<Command>,
}

/// A peer in the search cluster.
///
/// # Example
///
/// ```no_run
/// use sudonet_node::{CoordinationNode, NodeConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let (node, handle) = CoordinationNode::bind(NodeConfig::new(9001)).await?;
/// tokio::spawn(node.run());
///
/// println!("{:?}", handle.stats().await?);
/// # Ok(())
/// # }
/// ```
pub struct CoordinationNode {
    state: NodeState,
    inbox: Inbox,
}

impl CoordinationNode {
    /// Binds the peer listener and joins the cluster through the configured
    /// anchor, checking candidates with a [`SudokuValidator`].
    pub async fn bind(config: NodeConfig) -> Result<(Self, NodeHandle)> {
        let validator = Arc::new(SudokuValidator::with_handicap(config.handicap));
        Self::bind_with_validator(config, validator).await
    }

    /// Like [`bind`](Self::bind) with a custom candidate check.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid, the listener cannot be bound,
    /// or the anchor cannot be reached. Nothing after startup is fatal.
    pub async fn bind_with_validator(
        config: NodeConfig,
        validator: Arc<dyn CandidateValidator>,
    ) -> Result<(Self, NodeHandle)> {
        config.validate().map_err(SudonetError::InvalidConfig)?;

        let bind_addr = format!("{}:{}", config.host, config.p2p_port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|source| SudonetError::Bind {
                addr: bind_addr.clone(),
                source,
            })?;
        let address = NodeAddress::new(config.host.clone(), listener.local_addr()?.port());

        let (connections_tx, connections_rx) = mpsc::unbounded_channel();
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        let (work_tx, work_rx) = mpsc::unbounded_channel();
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::channel(64);

        spawn_worker(validator, work_rx, outcomes_tx)?;

        let now = Instant::now();
        let transport = TcpTransport::new().with_max_frame_size(config.max_frame_size);
        let mut state = NodeState {
            address: address.clone(),
            transport,
            listener: Some(listener),
            acceptor: None,
            peers: PeerTable::new(address.clone()),
            connections: HashMap::new(),
            departed: HashMap::new(),
            next_connection: 0,
            distributor: WorkDistributor::new(address.clone()),
            ledger: HeartbeatLedger::new(config.heartbeat_interval, config.peer_timeout, now),
            stats: ClusterStats::new(address.clone()),
            network: NetworkView::new(),
            queue: VecDeque::new(),
            active: None,
            connections_tx,
            accepted_tx,
            work_tx,
            config,
        };

        match state.config.anchor.clone() {
            Some(anchor) => state.join(anchor).await?,
            None => state.start_accepting(),
        }

        let handle = NodeHandle {
            address,
            commands: commands_tx,
        };
        let node = CoordinationNode {
            state,
            inbox: Inbox {
                connections: connections_rx,
                accepted: accepted_rx,
                outcomes: outcomes_rx,
                commands: commands_rx,
            },
        };

        Ok((node, handle))
    }

    pub fn address(&self) -> &NodeAddress {
        &self.state.address
    }

    /// Runs the event loop until shutdown is requested or every handle is dropped.
    pub async fn run(self) -> Result<()> {
        let CoordinationNode { mut state, mut inbox } = self;

        let mut tick = tokio::time::interval(state.config.poll_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!("Node {} running", state.address);

        loop {
            tokio::select! {
                Some(event) = inbox.connections.recv() => state.on_connection_event(event),
                Some((stream, remote)) = inbox.accepted.recv() => state.on_accepted(stream, remote),
                Some(outcome) = inbox.outcomes.recv() => state.on_work_outcome(outcome),
                command = inbox.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => state.on_command(command),
                },
                _ = tick.tick() => {}
            }

            state.maintain(Instant::now());
        }

        state.leave().await;
        Ok(())
    }
}

struct NodeState {
    config: NodeConfig,
    address: NodeAddress,
    transport: TcpTransport,
    /// Held until the node has announced itself, then moved to the acceptor.
    listener: Option<TcpListener>,
    acceptor: Option<JoinHandle<()>>,
    peers: PeerTable,
    connections: HashMap<ConnectionId, Connection>,
    /// Connections of peers that announced their departure, kept open until
    /// the peer is evicted.
    departed: HashMap<NodeAddress, ConnectionId>,
    next_connection: ConnectionId,
    distributor: WorkDistributor,
    ledger: HeartbeatLedger,
    stats: ClusterStats,
    network: NetworkView,
    queue: VecDeque<QueuedJob>,
    active: Option<ActiveJob>,
    connections_tx: mpsc::UnboundedSender<ConnectionEvent>,
    accepted_tx: mpsc::UnboundedSender<(TcpStream, SocketAddr)>,
    work_tx: mpsc::UnboundedSender<WorkItem>,
}

impl NodeState {
    fn peer_count(&self) -> usize {
        1 + self.peers.len()
    }

    fn next_connection_id(&mut self) -> ConnectionId {
        self.next_connection += 1;
        self.next_connection
    }

    // ---- membership -------------------------------------------------------

    /// Connects to the anchor and asks for its peer list. Failure is fatal.
    async fn join(&mut self, anchor: NodeAddress) -> Result<()> {
        let stream = self.transport.connect(&anchor).await?;
        let id = self.next_connection_id();
        let connection = Connection::spawn(id, stream, self.transport.clone(), self.connections_tx.clone());
        connection.send(Message::join_request(self.address.clone()))?;

        self.connections.insert(id, connection);
        self.peers.attach(anchor.clone(), id);
        self.distributor.add_available(anchor.clone());
        self.ledger.track(anchor.clone(), Instant::now());

        info!("Sent join request to anchor {}", anchor);
        Ok(())
    }

    fn start_accepting(&mut self) {
        if let Some(listener) = self.listener.take() {
            info!("Node {} accepting peer connections", self.address);
            self.acceptor = Some(spawn_acceptor(listener, self.accepted_tx.clone()));
        }
    }

    fn on_accepted(&mut self, stream: TcpStream, remote: SocketAddr) {
        let id = self.next_connection_id();
        debug!("Accepted connection {} from {}", id, remote);
        let connection = Connection::spawn(id, stream, self.transport.clone(), self.connections_tx.clone());
        self.connections.insert(id, connection);
    }

    /// Opens a connection to a known peer that has none yet.
    fn dial(&mut self, addr: &NodeAddress) -> ConnectionId {
        let id = self.next_connection_id();
        let connection = Connection::dial(id, addr.clone(), self.transport.clone(), self.connections_tx.clone());
        self.connections.insert(id, connection);
        self.peers.attach(addr.clone(), id);
        self.distributor.add_available(addr.clone());
        self.ledger.track(addr.clone(), Instant::now());
        id
    }

    /// Sends `update_nodes` for this node to every known peer, connecting to
    /// the ones learned from a `join_ack` on the way.
    fn announce(&mut self, action: UpdateAction) {
        for addr in self.peers.unconnected() {
            self.dial(&addr);
        }

        let message = Message::update_nodes(self.address.clone(), action);
        for (addr, conn) in self.peers.connected() {
            if let Err(e) = self.send_on(conn, message.clone()) {
                warn!("Failed to send update_nodes to {}: {}", addr, e);
            }
        }
    }

    fn on_join_request(&mut self, conn: ConnectionId, request: JoinRequest) {
        let known = self.peers.join_ack_for(&request.node);
        info!("Join request from {}, sending {} known peer(s)", request.node, known.len());
        if let Err(e) = self.send_on(conn, Message::join_ack(known)) {
            warn!("Failed to answer join request from {}: {}", request.node, e);
        }
    }

    fn on_join_ack(&mut self, ack: JoinAck) {
        let learned = self.peers.absorb(ack.nodes);
        info!("Joined cluster, learned {} new peer(s)", learned.len());

        self.announce(UpdateAction::Insert);
        self.start_accepting();
        self.redistribute();
    }

    fn on_update_nodes(&mut self, conn: ConnectionId, update: UpdateNodes) {
        if update.node == self.address {
            return;
        }

        match update.action {
            UpdateAction::Insert => {
                let stale = self
                    .peers
                    .attach(update.node.clone(), conn)
                    .into_iter()
                    .chain(self.departed.remove(&update.node))
                    .filter(|old| *old != conn);
                for replaced in stale {
                    debug!("Replacing connection {} to {} with {}", replaced, update.node, conn);
                    self.connections.remove(&replaced);
                }
                self.distributor.add_available(update.node.clone());
                self.ledger.track(update.node.clone(), Instant::now());
                info!("Peer {} joined", update.node);
                self.redistribute();
            }
            UpdateAction::Remove => {
                // Work held by the peer is reclaimed when it is evicted
                if let Some(detached) = self.peers.remove(&update.node) {
                    info!("Peer {} left", update.node);
                    if let Some(detached) = detached {
                        self.departed.insert(update.node.clone(), detached);
                    }
                }
            }
        }
    }

    // ---- failure detection ------------------------------------------------

    fn maintain(&mut self, now: Instant) {
        if self.ledger.heartbeat_due(now) {
            self.send_hello();
        }

        for addr in self.ledger.expired(now) {
            warn!("Peer {} timed out", addr);
            self.evict(&addr);
        }
    }

    fn send_hello(&mut self) {
        let message = Message::Hello(Hello {
            node: self.address.clone(),
            stats: self.stats.hello_stats(),
            network: self.peers.addresses(),
        });
        for (addr, conn) in self.peers.connected() {
            if let Err(e) = self.send_on(conn, message.clone()) {
                debug!("Failed to send hello to {}: {}", addr, e);
            }
        }
    }

    fn on_hello(&mut self, hello: Hello) {
        self.ledger.record(hello.node.clone(), Instant::now());
        self.stats.merge(&hello.node, hello.stats);
        self.network.update(hello.node, hello.network);
    }

    /// Removes every trace of a peer and reclaims its ranges, without
    /// handing them out again.
    fn forget_peer(&mut self, addr: &NodeAddress) {
        let attached = self.peers.remove(addr).flatten();
        for conn in attached.into_iter().chain(self.departed.remove(addr)) {
            self.connections.remove(&conn);
        }
        self.ledger.forget(addr);
        self.network.forget(addr);

        let reclaimed = self.distributor.remove_peer(addr);
        if reclaimed.is_empty() {
            info!("Evicted peer {}", addr);
        } else {
            warn!("Evicted peer {}, reclaimed {} range(s)", addr, reclaimed.len());
        }
    }

    fn evict(&mut self, addr: &NodeAddress) {
        self.forget_peer(addr);
        self.redistribute();
    }

    // ---- connections ------------------------------------------------------

    fn send_on(&self, conn: ConnectionId, message: Message) -> Result<()> {
        self.connections
            .get(&conn)
            .ok_or_else(|| SudonetError::PeerUnavailable(format!("connection {} is gone", conn)))?
            .send(message)
    }

    fn send_to(&self, addr: &NodeAddress, message: Message) -> Result<()> {
        let conn = self
            .peers
            .connection(addr)
            .ok_or_else(|| SudonetError::PeerUnavailable(addr.to_string()))?;
        self.send_on(conn, message)
    }

    fn on_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Frame { conn, message } => {
                if self.connections.contains_key(&conn) {
                    self.on_message(conn, message);
                }
            }
            ConnectionEvent::Closed { conn, reason } => {
                if self.connections.remove(&conn).is_none() {
                    return;
                }
                let departed = self
                    .departed
                    .iter()
                    .find(|(_, c)| **c == conn)
                    .map(|(addr, _)| addr);
                match self.peers.address_of(conn).or(departed).cloned() {
                    Some(addr) => {
                        warn!("Lost connection to {}: {}", addr, reason);
                        self.evict(&addr);
                    }
                    None => debug!("Connection {} closed: {}", conn, reason),
                }
            }
        }
    }

    fn on_message(&mut self, conn: ConnectionId, message: Message) {
        debug!("Received {} on connection {}", message.kind(), conn);

        match message {
            Message::JoinRequest(request) => self.on_join_request(conn, request),
            Message::JoinAck(ack) => self.on_join_ack(ack),
            Message::UpdateNodes(update) => self.on_update_nodes(conn, update),
            Message::SendWork(work) => self.on_send_work(conn, work),
            Message::WorkAck(ack) => debug!("Work acknowledged by {}", ack.node),
            Message::SolutionFound(found) => {
                self.on_solution_found(found.job_id, found.solution_index, &found.node)
            }
            Message::WorkDone(done) => self.on_work_done(done.job_id, done.range, &done.node),
            Message::Hello(hello) => self.on_hello(hello),
        }
    }

    // ---- work -------------------------------------------------------------

    fn on_send_work(&mut self, conn: ConnectionId, work: SendWork) {
        debug!("Assigned range {} by {}", work.range, work.node);
        let item = WorkItem {
            job_id: work.job_id,
            origin: work.node,
            reply_via: Some(conn),
            range: work.range,
            offset: work.range.start,
            candidates: Arc::new(work.solutions),
        };
        if self.work_tx.send(item).is_err() {
            error!("Worker thread is gone, dropping range {}", work.range);
            return;
        }

        if let Err(e) = self.send_on(conn, Message::work_ack(self.address.clone())) {
            debug!("Failed to acknowledge work: {}", e);
        }
    }

    fn on_work_outcome(&mut self, outcome: WorkOutcome) {
        self.stats.record_validations(outcome.validations);
        if matches!(outcome.result, ScanResult::Found { .. }) {
            self.stats.record_solved();
        }

        if outcome.origin == self.address {
            let me = self.address.clone();
            match outcome.result {
                ScanResult::Found { index } => self.on_solution_found(outcome.job_id, index, &me),
                ScanResult::Exhausted => self.on_work_done(outcome.job_id, outcome.range, &me),
            }
            return;
        }

        let report = match outcome.result {
            ScanResult::Found { index } => Message::SolutionFound(SolutionFound {
                node: self.address.clone(),
                solution_index: index,
                job_id: outcome.job_id,
            }),
            ScanResult::Exhausted => Message::WorkDone(WorkDone {
                node: self.address.clone(),
                range: outcome.range,
                job_id: outcome.job_id,
            }),
        };

        let sent = match outcome.reply_via.filter(|conn| self.connections.contains_key(conn)) {
            Some(conn) => self.send_on(conn, report),
            None => self.send_to(&outcome.origin, report),
        };
        if let Err(e) = sent {
            warn!("Could not report range {} to {}: {}", outcome.range, outcome.origin, e);
        }
    }

    fn on_solution_found(&mut self, job_id: Option<JobId>, index: usize, reporter: &NodeAddress) {
        match self.distributor.solution_found(job_id, index) {
            Discovery::Deliver { job_id, index, solution } => {
                info!("Job {} solved by {} at index {}", job_id, reporter, index);
                self.finish_job(job_id, JobOutcome::Solved { index, solution });
            }
            Discovery::Duplicate => debug!("Ignoring late solution {} from {}", index, reporter),
        }
        self.redistribute();
    }

    fn on_work_done(&mut self, job_id: Option<JobId>, range: Range, reporter: &NodeAddress) {
        let peer_count = self.peer_count();
        match self.distributor.complete_range(job_id, range, reporter, peer_count) {
            Completion::Continue(dispatches) => self.dispatch(dispatches),
            Completion::Exhausted(job_id) => {
                info!("Job {} exhausted without a valid candidate", job_id);
                self.finish_job(job_id, JobOutcome::Exhausted);
            }
            Completion::Stale => debug!("Late work_done for {} from {}", range, reporter),
            Completion::Unknown => debug!("Ignoring work_done for unassigned range {} from {}", range, reporter),
        }
    }

    fn finish_job(&mut self, job_id: JobId, outcome: JobOutcome) {
        match self.active.take() {
            Some(active) if active.id == job_id => {
                debug!("Job {} finished in {}ms", job_id, active.started.elapsed().as_millis());
                let _ = active.reply.send(Ok(outcome));
            }
            other => self.active = other,
        }
        self.start_next_job();
    }

    fn start_next_job(&mut self) {
        while self.active.is_none() {
            let Some(job) = self.queue.pop_front() else {
                return;
            };

            let id = generate_job_id();
            let count = job.candidates.len();
            let peer_count = self.peer_count();
            match self.distributor.start_job(id, job.candidates, peer_count) {
                Ok(dispatches) => {
                    info!("Started job {} over {} candidate(s) and {} peer(s)", id, count, peer_count);
                    self.active = Some(ActiveJob {
                        id,
                        reply: job.reply,
                        started: Instant::now(),
                    });
                    self.dispatch(dispatches);
                }
                Err(e) => {
                    let _ = job.reply.send(Err(e));
                }
            }
        }
    }

    fn redistribute(&mut self) {
        let peer_count = self.peer_count();
        let dispatches = self.distributor.redistribute(peer_count);
        self.dispatch(dispatches);
    }

    /// Executes dispatches locally or sends them as `send_work`.
    ///
    /// A peer that cannot be reached is evicted on the spot and its range
    /// handed to the next available peer.
    fn dispatch(&mut self, dispatches: Vec<Dispatch>) {
        let mut queue = VecDeque::from(dispatches);

        while let Some(dispatch) = queue.pop_front() {
            if dispatch.assignee == self.address {
                let item = WorkItem {
                    job_id: Some(dispatch.job_id),
                    origin: self.address.clone(),
                    reply_via: None,
                    range: dispatch.range,
                    offset: 0,
                    candidates: dispatch.candidates,
                };
                if self.work_tx.send(item).is_err() {
                    error!("Worker thread is gone, range {} will not be scanned", dispatch.range);
                }
                continue;
            }

            let message = Message::SendWork(SendWork {
                node: self.address.clone(),
                range: dispatch.range,
                solutions: dispatch.slice().to_vec(),
                job_id: Some(dispatch.job_id),
            });
            match self.send_to(&dispatch.assignee, message) {
                Ok(()) => debug!("Sent range {} to {}", dispatch.range, dispatch.assignee),
                Err(e) => {
                    warn!("Failed to send range {} to {}: {}", dispatch.range, dispatch.assignee, e);
                    self.forget_peer(&dispatch.assignee);
                    let peer_count = self.peer_count();
                    queue.extend(self.distributor.redistribute(peer_count));
                }
            }
        }
    }

    // ---- commands ---------------------------------------------------------

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Solve { candidates, reply } => {
                if candidates.is_empty() {
                    let _ = reply.send(Err(SudonetError::EmptyJob));
                    return;
                }
                self.queue.push_back(QueuedJob { candidates, reply });
                if self.active.is_some() {
                    info!("Search queued behind the active job ({} waiting)", self.queue.len());
                }
                self.start_next_job();
            }
            Command::Stats(reply) => {
                let _ = reply.send(self.stats.snapshot());
            }
            Command::Network(reply) => {
                let _ = reply.send(self.network.snapshot(&self.address, &self.peers.addresses()));
            }
            Command::Inspect(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown => {}
        }
    }

    fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            address: self.address.clone(),
            peers: self.peers.addresses(),
            connected: self.peers.connected().into_iter().map(|(addr, _)| addr).collect(),
            available: self.distributor.available().to_vec(),
            assignments: self.distributor.assignments(),
            active_job: self.distributor.active_job(),
            queued_jobs: self.queue.len(),
            accepting: self.acceptor.is_some(),
        }
    }

    /// Tells every connected peer this node is leaving and waits briefly for
    /// the messages to go out.
    async fn leave(mut self) {
        info!("Node {} leaving the cluster", self.address);

        let message = Message::update_nodes(self.address.clone(), UpdateAction::Remove);
        for (_, conn) in self.peers.connected() {
            let _ = self.send_on(conn, message.clone());
        }

        if let Some(acceptor) = self.acceptor.take() {
            acceptor.abort();
        }

        let flushing: Vec<_> = self
            .connections
            .drain()
            .filter_map(|(_, connection)| connection.finish())
            .collect();
        let _ = tokio::time::timeout(LEAVE_FLUSH_TIMEOUT, futures::future::join_all(flushing)).await;
    }
}
