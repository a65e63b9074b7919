pub mod keyspace;
pub mod store;
pub mod finger;
pub mod node;
pub mod rpc;
pub mod client;
pub mod server;
pub mod config;
pub mod error;

pub use node::*;
pub use config::*;
pub use error::*;

use keyspace::generate;

/// Derive a node identity from its listen address
pub fn construct_node(addr: &str) -> Node {
	Node {
		addr: addr.to_string(),
		id: generate(addr.as_bytes())
	}
}
