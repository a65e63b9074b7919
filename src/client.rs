use crate::rpc::NodeServiceClient;
use tarpc::tokio_serde::formats::Bincode;
use log::debug;

/// Open a persistent outbound channel to a peer.
/// The returned client can be cloned cheaply; all clones share
/// one underlying channel, closed when the last clone is dropped.
pub async fn setup_client(addr: &str) -> std::io::Result<NodeServiceClient> {
	debug!("connecting to {}", addr);
	let transport = tarpc::serde_transport::tcp::connect(addr, Bincode::default).await?;
	debug!("connected to {}", addr);
	Ok(NodeServiceClient::new(tarpc::client::Config::default(), transport).spawn())
}
