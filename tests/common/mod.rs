use chord_kv::{
	keyspace::{between_right_inclusive, Key, M},
	NodeServer
};
use rand::Rng;

pub async fn fix_all_fingers(server: &mut NodeServer) {
	for k in 0..M {
		server.fix_finger(k).await;
	}
}

// Random identifier in the arc (start, end]
pub fn key_in_range<T: Rng>(rng: &mut T, start: Key, end: Key) -> Key {
	loop {
		let id = rng.gen::<Key>();
		if between_right_inclusive(id, start, end) {
			return id;
		}
	}
}
