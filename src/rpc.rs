use serde::{Serialize, Deserialize};
use crate::{
	error::RpcResult,
	keyspace::Key,
	node::Node,
	store::Value
};

/// Read-only diagnostics snapshot of a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMetadata {
	pub id: Key,
	pub addr: String,
	pub port: String,
	pub predecessor: Option<Node>,
	pub successor: Node,
	pub finger_table: Vec<Key>
}

#[tarpc::service]
pub trait NodeService {
	/// Liveness check
	async fn ping_rpc() -> RpcResult<()>;

	async fn get_predecessor_rpc() -> RpcResult<Option<Node>>;
	async fn get_successor_rpc() -> RpcResult<Node>;
	async fn find_successor_rpc(id: Key) -> RpcResult<Node>;
	/// The caller believes it is our predecessor
	async fn notify_rpc(node: Node) -> RpcResult<()>;
	/// Hand over every local key that belongs to the given node's arc
	async fn transfer_keys_rpc(node: Node) -> RpcResult<()>;

	// Get or set a key locally (routing already chose this node)
	async fn get_local_rpc(key: Key) -> RpcResult<Option<Value>>;
	async fn set_local_rpc(key: Key, value: Option<Value>) -> RpcResult<()>;
	// Get or set a key anywhere on the ring
	async fn get_rpc(key: Key) -> RpcResult<Option<Value>>;
	async fn set_rpc(key: Key, value: Option<Value>) -> RpcResult<()>;

	async fn get_node_metadata_rpc() -> RpcResult<NodeMetadata>;
}
