use std::{
	collections::hash_map::DefaultHasher,
	hash::{Hash, Hasher},
	mem::size_of
};

/// Ring identifier: an unsigned integer on the circle Z/2^M
pub type Key = u32;
// number of bits in the ring
pub const M: usize = size_of::<Key>() * 8;

/// Hash arbitrary bytes to a ring identifier.
/// DefaultHasher uses fixed keys, so every node derives
/// the same identifier from the same bytes.
pub fn generate(data: &[u8]) -> Key {
	let mut hasher = DefaultHasher::new();
	data.hash(&mut hasher);
	hasher.finish() as Key
}

// Strictly in range: x in (a, b), wrapping around the ring.
// When a == b the interval is the whole circle minus that point.
pub fn between(x: Key, a: Key, b: Key) -> bool {
	if a < b {
		// (a, x, b)
		x > a && x < b
	}
	else {
		// b <= a
		// case 1: (a, x, b + 2^M)
		// case 2: (a, x + 2^M, b + 2^M)
		x > a || x < b
	}
}

// Same interval but closed on the right: x in (a, b].
// When a == b this covers the whole circle.
pub fn between_right_inclusive(x: Key, a: Key, b: Key) -> bool {
	between(x, a, b) || x == b
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::prelude::*;

	#[test]
	fn test_generate_deterministic() {
		assert_eq!(generate(b"localhost:3000"), generate(b"localhost:3000"));
		assert_ne!(generate(b"localhost:3000"), generate(b"localhost:3001"));
	}

	#[test]
	fn test_between() {
		assert!(between(5, 1, 10));
		assert!(!between(1, 1, 10));
		assert!(!between(10, 1, 10));

		// wraparound: (u32::MAX - 1, 3)
		assert!(between(u32::MAX, u32::MAX - 1, 3));
		assert!(between(0, u32::MAX - 1, 3));
		assert!(between(2, u32::MAX - 1, 3));
		assert!(!between(3, u32::MAX - 1, 3));
		assert!(!between(5, u32::MAX - 1, 3));

		// degenerate interval: whole circle minus the point
		assert!(between(1, 5, 5));
		assert!(!between(5, 5, 5));
	}

	#[test]
	fn test_between_right_inclusive() {
		assert!(between_right_inclusive(10, 1, 10));
		assert!(between_right_inclusive(5, 1, 10));
		assert!(!between_right_inclusive(1, 1, 10));

		assert!(between_right_inclusive(3, u32::MAX - 1, 3));
		assert!(!between_right_inclusive(u32::MAX - 1, u32::MAX - 1, 3));

		// a == b covers the whole circle
		assert!(between_right_inclusive(0, 5, 5));
		assert!(between_right_inclusive(5, 5, 5));
	}

	/// For distinct a, b every x lies in (a, b), in (b, a),
	/// or on one of the endpoints.
	#[test]
	fn test_interval_tautology() {
		let mut rng = StdRng::seed_from_u64(42);
		for _ in 0..1000 {
			let a: Key = rng.gen();
			let b: Key = rng.gen();
			let x: Key = rng.gen();
			if a == b {
				continue;
			}
			assert!(
				between(x, a, b) || between(x, b, a) || x == a || x == b,
				"x={} a={} b={}", x, a, b
			);
			assert!(between_right_inclusive(b, a, b));
			assert!(!between(a, a, b));
		}
	}
}
