use std::{
	collections::HashMap,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc, RwLock
	},
	time::Duration
};
use tarpc::{
	context,
	tokio_serde::formats::Bincode,
	server::Channel,
	serde::Serialize,
	serde::Deserialize
};
use futures::{future, prelude::*};
use log::{info, warn, debug, error};
use tokio::time::MissedTickBehavior;
use crate::{
	client::setup_client,
	config::Config,
	error::{
		DhtResult, RpcFailure, RpcResult,
		DhtError::*
	},
	finger::{finger_start, FingerTable},
	keyspace::{between, between_right_inclusive, Key, M},
	rpc::{NodeMetadata, NodeService, NodeServiceClient},
	server::ServerManager,
	store::{KvStore, MemoryStore, Value}
};

// Data part of the node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
	pub id: Key,
	pub addr: String
}

impl std::fmt::Display for Node {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Node({}, {})", self.id, self.addr)
	}
}

/// The Chord state machine: successor, predecessor, finger table,
/// local store and interned outbound channels. Every mutable field
/// sits behind its own lock; no lock is ever held across an
/// outbound RPC.
#[derive(Clone)]
pub struct NodeServer {
	node: Node,
	port: String,
	config: Config,
	store: MemoryStore,
	// Successor is never None (for correctness); a solo node is
	// its own successor
	successor: Arc<RwLock<Node>>,
	predecessor: Arc<RwLock<Option<Node>>>,
	finger_table: Arc<RwLock<FingerTable>>,
	// connection to remote nodes, interned by peer id
	connection_map: Arc<RwLock<HashMap<Key, NodeServiceClient>>>,
	shutdown: Arc<AtomicBool>
}

impl NodeServer {
	pub fn new(node: Node, config: Config) -> Self {
		let port = match node.addr.rfind(':') {
			Some(i) => node.addr[i + 1..].to_string(),
			None => String::new()
		};
		// init a ring with only one node
		// (see second part of n.join in Figure 6 of the Chord paper)
		let finger_table = FingerTable::new(&node);

		NodeServer {
			successor: Arc::new(RwLock::new(node.clone())),
			predecessor: Arc::new(RwLock::new(None)),
			finger_table: Arc::new(RwLock::new(finger_table)),
			connection_map: Arc::new(RwLock::new(HashMap::new())),
			store: MemoryStore::new(),
			shutdown: Arc::new(AtomicBool::new(false)),
			port,
			config,
			node
		}
	}

	pub fn get_successor(&self) -> Node {
		self.successor.read().unwrap().clone()
	}

	pub fn set_successor(&self, node: Node) {
		*self.successor.write().unwrap() = node;
	}

	pub fn get_predecessor(&self) -> Option<Node> {
		self.predecessor.read().unwrap().clone()
	}

	pub fn set_predecessor(&self, node: Option<Node>) {
		*self.predecessor.write().unwrap() = node;
	}

	/// Read a value from the local store, bypassing routing
	pub fn get_local(&self, key: Key) -> Option<Value> {
		self.store.get(&key)
	}

	/// Write a value to the local store, bypassing routing.
	/// A None value removes the key.
	pub fn set_local(&self, key: Key, value: Option<Value>) {
		match value {
			Some(v) => self.store.set(key, v),
			None => self.store.del(&key)
		}
	}

	/// Snapshot of the identifiers stored locally
	pub fn local_keys(&self) -> Vec<Key> {
		self.store.keys()
	}

	/// Diagnostics snapshot of this node's view of the ring
	pub fn metadata(&self) -> NodeMetadata {
		NodeMetadata {
			id: self.node.id,
			addr: self.node.addr.clone(),
			port: self.port.clone(),
			predecessor: self.get_predecessor(),
			successor: self.get_successor(),
			finger_table: self.finger_table.read().unwrap().ids()
		}
	}

	/// Stop serving: periodic stabilization observes the flag via
	/// the watch channel, inbound RPCs are rejected from now on and
	/// every cached outbound channel is dropped.
	pub fn shutdown(&self) {
		self.shutdown.store(true, Ordering::Release);
		self.connection_map.write().unwrap().clear();
	}

	fn ensure_running(&self) -> RpcResult<()> {
		if self.shutdown.load(Ordering::Acquire) {
			return Err(ShuttingDown.into());
		}
		Ok(())
	}

	/// Start the server
	/// Returns once the listener is up and the node has joined
	pub async fn start(&mut self, join_node: Option<Node>) -> DhtResult<ServerManager> {
		// channel used to shut the tasks down (true means shutdown)
		let (tx, rx) = tokio::sync::watch::channel(false);

		// Listen locally first so peers can call back during join
		let mut listener = tarpc::serde_transport::tcp::listen(&self.node.addr, Bincode::default).await?;
		let server = self.clone();
		let mut listener_rx = rx.clone();
		let listener_handle = tokio::spawn(async move {
			listener.config_mut().max_frame_length(usize::MAX);
			let listener_fut = listener
				.filter_map(|r| future::ready(r.ok()))
				.map(tarpc::server::BaseChannel::with_defaults)
				.map(|channel| async {
					// Clone a new server to share the data in Arc
					channel.execute(server.clone().serve()).await;
				})
				.buffer_unordered(server.config.max_connections as usize)
				.for_each(|_| async {});

			debug!("{}: listening", server.node);
			tokio::select! {
				_ = listener_fut => {
					warn!("{}: listener terminated", server.node);
				},
				_ = listener_rx.changed() => {
					debug!("{}: listener stopped gracefully", server.node);
				}
			};
		});

		if let Some(n) = join_node.as_ref() {
			if let Err(e) = self.join(n).await {
				let _ = tx.send(true);
				return Err(JoinFailure {
					node: n.clone(),
					message: e.to_string()
				});
			}
		}

		// One periodic task: refresh the next finger, stabilize,
		// then check the predecessor
		let mut server = self.clone();
		let mut stabilize_rx = rx.clone();
		let stabilize_interval = self.config.stabilize_interval;
		let stabilize_handle = tokio::spawn(async move {
			if stabilize_interval == 0 {
				return;
			}
			let mut interval = tokio::time::interval(
				Duration::from_millis(stabilize_interval)
			);
			// a slow tick must not cause a burst of queued ticks
			interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
			let mut next = 0;

			loop {
				tokio::select! {
					_ = interval.tick() => {
						server.fix_finger(next).await;
						next = (next + 1) % M;
						server.stabilize().await;
						server.check_predecessor().await;
					},
					_ = stabilize_rx.changed() => {
						debug!("{}: stabilizer stopped gracefully", server.node);
						break;
					}
				};
			}
		});

		info!("{}: listening at {}", self.node, self.node.addr);
		let handle = future::join_all(vec![listener_handle, stabilize_handle]);

		Ok(ServerManager {
			server: self.clone(),
			handle,
			tx
		})
	}

	async fn get_connection(&mut self, node: &Node) -> DhtResult<NodeServiceClient> {
		// Use block to drop map immediately after use
		{
			let map = self.connection_map.read().unwrap();
			if let Some(c) = map.get(&node.id) {
				// clients can be cloned at low cost
				return Ok(c.clone());
			}
		}
		let c = setup_client(&node.addr).await?;
		debug!("{}: connected to {}", self.node, node);
		let mut map = self.connection_map.write().unwrap();
		map.insert(node.id, c.clone());
		Ok(c)
	}

	fn remove_connection(&self, id: Key) {
		self.connection_map.write().unwrap().remove(&id);
	}

	// Figure 7: n.join
	pub async fn join(&mut self, peer: &Node) -> DhtResult<()> {
		if peer.id == self.node.id {
			return Err(SelfJoin {
				addr: peer.addr.clone()
			});
		}

		info!("{}: joining ring via {}", self.node, peer);
		self.set_predecessor(None);
		let conn = self.get_connection(peer).await?;
		let succ = conn.find_successor_rpc(context::current(), self.node.id).await??;
		info!("{}: successor set to {}", self.node, succ);
		self.set_successor(succ.clone());

		// the successor hands over the part of its arc that is ours now
		if succ.id != self.node.id {
			let conn = self.get_connection(&succ).await?;
			conn.transfer_keys_rpc(context::current(), self.node.clone()).await??;
		}
		info!("{}: joined ring", self.node);
		Ok(())
	}

	/// Resolve the first node whose identifier is >= id on the ring
	pub async fn find_successor(&mut self, id: Key) -> DhtResult<Node> {
		let succ = self.get_successor();
		if between_right_inclusive(id, self.node.id, succ.id) {
			return Ok(succ);
		}

		let cp = self.closest_preceding_node(id);
		if cp.id == self.node.id {
			// no finger precedes id: we are the best known predecessor
			return Ok(self.node.clone());
		}

		let conn = match self.get_connection(&cp).await {
			Ok(c) => c,
			Err(e) => {
				// inconsistent finger entry: answer with self
				// instead of aborting the lookup
				error!("{}: finger {} unreachable: {}", self.node, cp, e);
				return Ok(self.node.clone());
			}
		};
		Ok(conn.find_successor_rpc(context::current(), id).await??)
	}

	// Figure 4: n.closest_preceding_finger
	// Scanning from the top picks the largest jump that does not
	// overshoot id.
	fn closest_preceding_node(&self, id: Key) -> Node {
		let table = self.finger_table.read().unwrap();
		for k in (0..M).rev() {
			let f = table.get(k);
			if between(f.id, self.node.id, id) {
				return f.clone();
			}
		}
		self.node.clone()
	}

	// Figure 7: n.stabilize
	pub async fn stabilize(&mut self) {
		let succ = self.get_successor();

		if succ.id == self.node.id {
			// ring of one: adopt the predecessor once it shows up
			if let Some(p) = self.get_predecessor() {
				if p.id != self.node.id {
					info!("{}: successor set to {}", self.node, p);
					self.set_successor(p);
				}
			}
			return;
		}

		let ctx = context::current();
		let conn = match self.get_connection(&succ).await {
			Ok(c) => c,
			Err(e) => {
				error!("{}: failed to reach successor {}: {}", self.node, succ, e);
				return;
			}
		};
		match conn.get_predecessor_rpc(ctx).await {
			Ok(Ok(Some(p))) => {
				// p joined between us and our successor
				if between(p.id, self.node.id, succ.id) {
					info!("{}: successor set to {}", self.node, p);
					self.set_successor(p);
				}
			},
			// the successor has not heard from its predecessor yet
			Ok(Ok(None)) => (),
			Ok(Err(e)) => {
				warn!("{}: successor {} refused get_predecessor: {}", self.node, succ, e);
				return;
			},
			Err(e) => {
				error!("{}: failed to stabilize: {}", self.node, e);
				return;
			}
		}

		// tell the (possibly new) successor we believe we are its
		// predecessor
		let succ = self.get_successor();
		match self.get_connection(&succ).await {
			Ok(conn) => match conn.notify_rpc(ctx, self.node.clone()).await {
				Ok(Err(e)) => warn!("{}: notify refused by {}: {}", self.node, succ, e),
				Err(e) => warn!("{}: failed to notify {}: {}", self.node, succ, e),
				_ => ()
			},
			Err(e) => error!("{}: failed to reach successor {}: {}", self.node, succ, e)
		}
	}

	// Figure 7: n.fix_fingers
	pub async fn fix_finger(&mut self, index: usize) {
		let target = finger_start(self.node.id, index);
		match self.find_successor(target).await {
			Ok(succ) => {
				let mut table = self.finger_table.write().unwrap();
				table.set(index, succ);
			},
			Err(e) => error!("{}: failed to fix finger {}: {}", self.node, index, e)
		}
	}

	/// Ping the predecessor; any error or timeout means it is gone
	pub async fn check_predecessor(&mut self) {
		let pred = match self.get_predecessor() {
			Some(p) => p,
			None => return
		};

		let alive = match self.get_connection(&pred).await {
			Ok(conn) => {
				let ping = tokio::time::timeout(
					Duration::from_millis(self.config.rpc_timeout),
					conn.ping_rpc(context::current())
				).await;
				matches!(ping, Ok(Ok(Ok(()))))
			},
			Err(_) => false
		};

		if !alive {
			info!("{}: predecessor {} unresponsive, clearing", self.node, pred);
			self.set_predecessor(None);
			self.remove_connection(pred.id);
		}
	}

	// Figure 7: n.notify
	pub async fn notify(&mut self, node: Node) -> DhtResult<()> {
		let adopt = match self.get_predecessor() {
			Some(p) => between(node.id, p.id, self.node.id),
			None => true
		};
		if !adopt {
			return Ok(());
		}

		info!("{}: predecessor set to {}", self.node, node);
		self.set_predecessor(Some(node.clone()));

		// pull over anything the new predecessor still holds from
		// our arc
		if node.id != self.node.id {
			let conn = self.get_connection(&node).await?;
			conn.transfer_keys_rpc(context::current(), self.node.clone()).await??;
		}
		Ok(())
	}

	/// Hand every local key outside our remaining arc (target, self]
	/// over to the target, which owns it now. Uses ring arithmetic,
	/// so arcs crossing the wraparound point transfer correctly.
	pub async fn transfer_keys(&mut self, target: &Node) -> DhtResult<()> {
		if target.id == self.node.id {
			return Ok(());
		}

		let moved: Vec<Key> = self.store.keys()
			.into_iter()
			.filter(|k| !between_right_inclusive(*k, target.id, self.node.id))
			.collect();
		if moved.is_empty() {
			return Ok(());
		}

		info!("{}: transferring {} keys to {}", self.node, moved.len(), target);
		let conn = self.get_connection(target).await?;
		let ctx = context::current();
		for k in moved {
			if let Some(v) = self.store.get(&k) {
				conn.set_local_rpc(ctx, k, Some(v)).await??;
				// drop our copy only once the new owner has it
				self.store.del(&k);
			}
		}
		Ok(())
	}

	/// Resolve the owner of the key, then read from it
	pub async fn get(&mut self, key: Key) -> DhtResult<Option<Value>> {
		let owner = self.find_successor(key).await?;
		if owner.id == self.node.id {
			return Ok(self.get_local(key));
		}
		let conn = self.get_connection(&owner).await?;
		Ok(conn.get_local_rpc(context::current(), key).await??)
	}

	/// Resolve the owner of the key, then write to it.
	/// A None value removes the key.
	pub async fn set(&mut self, key: Key, value: Option<Value>) -> DhtResult<()> {
		let owner = self.find_successor(key).await?;
		if owner.id == self.node.id {
			self.set_local(key, value);
			return Ok(());
		}
		let conn = self.get_connection(&owner).await?;
		Ok(conn.set_local_rpc(context::current(), key, value).await??)
	}
}

#[tarpc::server]
impl NodeService for NodeServer {
	async fn ping_rpc(self, _: context::Context) -> RpcResult<()> {
		self.ensure_running()
	}

	async fn get_predecessor_rpc(self, _: context::Context) -> RpcResult<Option<Node>> {
		self.ensure_running()?;
		Ok(self.get_predecessor())
	}

	async fn get_successor_rpc(self, _: context::Context) -> RpcResult<Node> {
		self.ensure_running()?;
		Ok(self.get_successor())
	}

	async fn find_successor_rpc(mut self, _: context::Context, id: Key) -> RpcResult<Node> {
		self.ensure_running()?;
		self.find_successor(id).await.map_err(RpcFailure::from)
	}

	async fn notify_rpc(mut self, _: context::Context, node: Node) -> RpcResult<()> {
		self.ensure_running()?;
		self.notify(node).await.map_err(RpcFailure::from)
	}

	async fn transfer_keys_rpc(mut self, _: context::Context, node: Node) -> RpcResult<()> {
		self.ensure_running()?;
		self.transfer_keys(&node).await.map_err(RpcFailure::from)
	}

	async fn get_local_rpc(self, _: context::Context, key: Key) -> RpcResult<Option<Value>> {
		self.ensure_running()?;
		Ok(self.get_local(key))
	}

	async fn set_local_rpc(self, _: context::Context, key: Key, value: Option<Value>) -> RpcResult<()> {
		self.ensure_running()?;
		self.set_local(key, value);
		Ok(())
	}

	async fn get_rpc(mut self, _: context::Context, key: Key) -> RpcResult<Option<Value>> {
		self.ensure_running()?;
		self.get(key).await.map_err(RpcFailure::from)
	}

	async fn set_rpc(mut self, _: context::Context, key: Key, value: Option<Value>) -> RpcResult<()> {
		self.ensure_running()?;
		self.set(key, value).await.map_err(RpcFailure::from)
	}

	async fn get_node_metadata_rpc(self, _: context::Context) -> RpcResult<NodeMetadata> {
		self.ensure_running()?;
		Ok(self.metadata())
	}
}
