use std::default::Default;

#[derive(Clone)]
pub struct Config {
	/// Interval between stabilization ticks in ms (0 disables the task)
	pub stabilize_interval: u64,
	/// Deadline for liveness pings in ms
	pub rpc_timeout: u64,
	/// Max number of concurrent inbound channels
	pub max_connections: u64
}

impl Default for Config {
	fn default() -> Self {
		Self {
			stabilize_interval: 1000,
			rpc_timeout: 1000,
			max_connections: 16
		}
	}
}
