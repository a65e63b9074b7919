use chord_kv::{
	construct_node,
	Config,
	Node,
	NodeServer
};
use clap::Parser;

#[derive(Parser)]
struct Args {
	/// Local addr to bind (<host>:<port>)
	addr: String,

	/// Join an existing node on init (<host>:<port>)
	#[clap(short, long)]
	join: Option<String>,

	/// Interval between stabilization ticks in ms (0 disables)
	#[clap(short, long, default_value_t = 1000)]
	stabilize_interval: u64
}


#[tokio::main]
async fn main() -> anyhow::Result<()> {
	env_logger::init();
	let args = Args::parse();

	let node = construct_node(&args.addr);
	let join_node: Option<Node> = args.join.as_deref().map(construct_node);

	let config = Config {
		stabilize_interval: args.stabilize_interval,
		..Config::default()
	};
	let mut server = NodeServer::new(node, config);
	let manager = server.start(join_node).await?;
	manager.wait().await?;
	Ok(())
}
