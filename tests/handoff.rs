use std::collections::HashSet;
use chord_kv::{
	client::setup_client,
	keyspace::{between_right_inclusive, Key},
	Config,
	Node,
	NodeServer
};
use rand::prelude::*;
use tarpc::context;

mod common;
use common::*;

/// A node joining a loaded ring takes over exactly the keys of its
/// arc: the total count is preserved and nothing is duplicated.
#[tokio::test]
async fn test_key_handoff_on_join() -> anyhow::Result<()> {
	let _ = env_logger::builder().is_test(true).try_init();

	let na = Node {
		addr: "localhost:9840".to_string(),
		id: 0
	};
	let nb = Node {
		addr: "localhost:9841".to_string(),
		id: u32::MAX / 2
	};

	let config = Config {
		stabilize_interval: 0,
		..Config::default()
	};

	let mut sa = NodeServer::new(na.clone(), config.clone());
	let ma = sa.start(None).await?;
	let ca = setup_client(&na.addr).await?;

	// load the solo node with 100 distinct keys
	let mut rng = StdRng::seed_from_u64(7);
	let mut keys = HashSet::new();
	while keys.len() < 100 {
		keys.insert(rng.gen::<Key>());
	}
	for k in keys.iter() {
		ca.set_rpc(context::current(), *k, Some(k.to_be_bytes().to_vec())).await??;
	}
	assert_eq!(sa.local_keys().len(), 100);

	// the join itself pulls B's arc over from A
	let mut sb = NodeServer::new(nb.clone(), config.clone());
	let mb = sb.start(Some(na.clone())).await?;

	let partition_ok = |a_keys: &[Key], b_keys: &[Key]| {
		assert_eq!(a_keys.len() + b_keys.len(), 100);
		let a_set: HashSet<Key> = a_keys.iter().copied().collect();
		let b_set: HashSet<Key> = b_keys.iter().copied().collect();
		assert!(a_set.is_disjoint(&b_set));
		for k in a_keys {
			assert!(
				between_right_inclusive(*k, nb.id, na.id),
				"key {} stranded on the wrong side", k
			);
		}
		for k in b_keys {
			assert!(between_right_inclusive(*k, na.id, nb.id));
		}
	};
	partition_ok(&sa.local_keys(), &sb.local_keys());

	// stabilization moves nothing further
	sb.stabilize().await;
	sa.stabilize().await;
	sa.stabilize().await;
	fix_all_fingers(&mut sa).await;
	fix_all_fingers(&mut sb).await;
	partition_ok(&sa.local_keys(), &sb.local_keys());

	// every key is still readable through either node
	let cb = setup_client(&nb.addr).await?;
	for k in keys.iter().take(10) {
		let expected = Some(k.to_be_bytes().to_vec());
		assert_eq!(ca.get_rpc(context::current(), *k).await??, expected);
		assert_eq!(cb.get_rpc(context::current(), *k).await??, expected);
	}

	ma.stop().await?;
	mb.stop().await?;
	Ok(())
}
