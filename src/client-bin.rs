use chord_kv::{
	client::setup_client,
	keyspace::generate,
	rpc::{NodeMetadata, NodeServiceClient}
};
use tarpc::context;
use clap::Parser;
use inquire::{Text, CustomUserError, autocompletion::{Autocomplete, Replacement}};
use anyhow::anyhow;

#[derive(Parser)]
struct Args {
	/// Server addr to connect to (<host>:<port>)
	addr: String,
}

const COMMANDS: [&str; 4] = [
	"get",
	"set",
	"del",
	"meta"
];

fn suggest_command(v: &str) -> Result<Vec<String>, CustomUserError> {
	let mut result = Vec::new();
	for command in COMMANDS {
		if v.len() > 0 && command.starts_with(v) {
			result.push(command.to_string());
		}
	}
	Ok(result)
}

fn complete_command(v: &str) -> Result<Option<String>, CustomUserError> {
	let result = suggest_command(v)?;
	let command = if result.len() > 0 {
		Some(result[0].clone() + " ")
	}
	else {
		None
	};
	Ok(command)
}

#[derive(Clone)]
struct CommandCompleter;

impl Autocomplete for CommandCompleter {
	fn get_suggestions(&mut self, input: &str) -> Result<Vec<String>, CustomUserError> {
		suggest_command(input)
	}

	fn get_completion(&mut self, input: &str, _highlighted_suggestion: Option<String>) -> Result<Replacement, CustomUserError> {
		complete_command(input)
	}
}

fn print_metadata(meta: &NodeMetadata) {
	println!("node:        {} @ {} (port {})", meta.id, meta.addr, meta.port);
	match meta.predecessor.as_ref() {
		Some(p) => println!("predecessor: {}", p),
		None => println!("predecessor: (none)")
	};
	println!("successor:   {}", meta.successor);
	println!("fingers:");
	for (k, id) in meta.finger_table.iter().enumerate() {
		println!("  [{:2}] {}", k, id);
	}
}

async fn execute_command(client: &NodeServiceClient, command: &str) -> anyhow::Result<()> {
	let words: Vec<_> = command.split_whitespace().collect();
	if words.len() == 0 {
		return Err(anyhow!("invalid command"));
	}

	let ctx = context::current();
	match words[0] {
		"get" => {
			if words.len() != 2 {
				return Err(anyhow!("get: invalid number of arguments"));
			}
			let key = generate(words[1].as_bytes());
			let value = client.get_rpc(ctx, key).await??;
			match value {
				Some(v) => println!("{}", String::from_utf8_lossy(&v)),
				None => return Err(anyhow!("get: key doesn't exist"))
			};
		},
		"set" => {
			if words.len() != 3 {
				return Err(anyhow!("set: invalid number of arguments"));
			}
			let key = generate(words[1].as_bytes());
			client.set_rpc(ctx, key, Some(words[2].as_bytes().to_vec())).await??;
		},
		"del" => {
			if words.len() != 2 {
				return Err(anyhow!("del: invalid number of arguments"));
			}
			let key = generate(words[1].as_bytes());
			client.set_rpc(ctx, key, None).await??;
		},
		"meta" => {
			if words.len() != 1 {
				return Err(anyhow!("meta: no arguments expected"));
			}
			let meta = client.get_node_metadata_rpc(ctx).await??;
			print_metadata(&meta);
		},
		_ => {
			return Err(anyhow!("invalid command"));
		}
	};
	Ok(())
}


#[tokio::main]
async fn main() -> anyhow::Result<()> {
	env_logger::init();
	let args = Args::parse();
	let client = setup_client(&args.addr).await?;

	loop {
		let command = Text::new("")
			.with_autocomplete(CommandCompleter)
			.prompt()?;

		match execute_command(&client, &command).await {
			Ok(_) => (),
			Err(e) => println!("Error: {}", e)
		};
	}
}
