use serde::{Serialize, Deserialize};
use thiserror::Error;
use std::{
	result::Result,
	error,
	fmt
};
use crate::node::Node;

/// Fail to execute the RPC at the server side
#[derive(Serialize, Deserialize, Debug)]
pub struct RpcFailure {
	/// Error message
	message: String
}

impl fmt::Display for RpcFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "RPC failed: {}", self.message)
	}
}

/// Convert DhtError to RpcFailure to serialize it for RPC call
impl From<DhtError> for RpcFailure {
	fn from(e: DhtError) -> Self {
		Self {
			message: e.to_string()
		}
	}
}

impl error::Error for RpcFailure {
}


#[derive(Error, Debug)]
pub enum DhtError {
	/// Joining through a peer with our own identifier
	#[error("cannot join ring through own address {addr}")]
	SelfJoin {
		addr: String
	},
	#[error("{node}: join failed: {message}")]
	JoinFailure {
		node: Node,
		message: String
	},
	/// RPC arrived after the shutdown signal
	#[error("node is shutting down")]
	ShuttingDown,
	/// Error returned by the remote handler
	#[error("RPC failure")]
	RpcFailure(#[from] RpcFailure),
	/// Error when calling the RPC
	#[error("RPC internal error")]
	RpcError(#[from] tarpc::client::RpcError),
	#[error("IO error")]
	IoError(#[from] std::io::Error)
}

pub type DhtResult<T> = Result<T, DhtError>;
pub type RpcResult<T> = Result<T, RpcFailure>;
