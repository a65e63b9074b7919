use futures::future;
use log::error;
use tokio::{sync::watch, task::JoinHandle};
use crate::{
	error::DhtResult,
	node::NodeServer
};

/// Handle on a started node: the listener and stabilizer tasks
/// plus the shutdown signal.
pub struct ServerManager {
	pub(crate) server: NodeServer,
	pub(crate) handle: future::JoinAll<JoinHandle<()>>,
	pub(crate) tx: watch::Sender<bool>
}

impl ServerManager {
	/// Shut the node down: reject further RPCs, stop the tasks and
	/// close every cached outbound channel.
	pub async fn stop(self) -> DhtResult<()> {
		self.server.shutdown();
		// tasks observe the signal and exit
		let _ = self.tx.send(true);
		for r in self.handle.await {
			if let Err(e) = r {
				error!("server task failed: {}", e);
			}
		}
		Ok(())
	}

	/// Park on the node's tasks until they exit
	pub async fn wait(self) -> DhtResult<()> {
		for r in self.handle.await {
			if let Err(e) = r {
				error!("server task failed: {}", e);
			}
		}
		Ok(())
	}
}
