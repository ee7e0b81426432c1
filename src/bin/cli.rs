//! ShardKV CLI Client
//!
//! Command-line interface for interacting with ShardKV.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use shardkv::network::{load_dataset, run_benchmark, BenchMode, Client};
use shardkv::{KvError, Result};

/// ShardKV CLI
#[derive(Parser, Debug)]
#[command(name = "shardkv-cli")]
#[command(about = "CLI for ShardKV key-value store")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:6000")]
    server: String,

    /// Connect/read/write timeout in milliseconds
    #[arg(short, long, default_value = "5000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// List values of all keys starting with a prefix
    Prefix {
        /// The prefix to match
        prefix: String,
    },

    /// Ping the server
    Ping,

    /// Read commands from stdin until `quit`
    Interactive,

    /// Replay random requests from a dataset for a fixed time
    Benchmark {
        /// Dataset in history-log format (`ts,key,value[,phase]` per line)
        #[arg(short, long)]
        dataset: PathBuf,

        /// `r` for gets only, `rw` for 50% gets and 50% sets
        #[arg(short, long, value_enum, default_value = "r")]
        mode: ModeArg,

        /// Run time in seconds
        #[arg(short = 'e', long, default_value = "60")]
        exp_time: u64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    R,
    Rw,
}

impl From<ModeArg> for BenchMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::R => BenchMode::Read,
            ModeArg::Rw => BenchMode::ReadWrite,
        }
    }
}

fn main() {
    let args = Args::parse();

    let mut client = match Client::connect(&args.server, Duration::from_millis(args.timeout_ms)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    let result = match args.command {
        Commands::Get { key } => run_get(&mut client, &key),
        Commands::Set { key, value } => run_set(&mut client, &key, &value),
        Commands::Prefix { prefix } => run_prefix(&mut client, &prefix),
        Commands::Ping => run_ping(&mut client),
        Commands::Interactive => interactive(&mut client),
        Commands::Benchmark {
            dataset,
            mode,
            exp_time,
        } => run_bench(
            &mut client,
            &dataset,
            mode.into(),
            Duration::from_secs(exp_time),
        ),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        process::exit(if e.is_not_found() { 2 } else { 1 });
    }
}

fn run_get(client: &mut Client, key: &str) -> Result<()> {
    println!("{}", client.get(key)?);
    Ok(())
}

fn run_set(client: &mut Client, key: &str, value: &str) -> Result<()> {
    client.set(key, value)?;
    println!("OK");
    Ok(())
}

fn run_prefix(client: &mut Client, prefix: &str) -> Result<()> {
    for value in client.get_prefix(prefix)? {
        println!("{}", value);
    }
    Ok(())
}

fn run_ping(client: &mut Client) -> Result<()> {
    client.ping()?;
    println!("PONG");
    Ok(())
}

fn run_bench(client: &mut Client, dataset: &Path, mode: BenchMode, duration: Duration) -> Result<()> {
    let dataset = load_dataset(dataset)?;
    let report = run_benchmark(client, &dataset, mode, duration, &mut rand::thread_rng())?;
    println!(
        "elapsed: {:.2?} gets: {} sets: {} total: {} errors: {} ({:.0} ops/s)",
        report.elapsed,
        report.gets,
        report.sets,
        report.total(),
        report.errors,
        report.ops_per_sec()
    );
    Ok(())
}

fn interactive(client: &mut Client) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("shardkv> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }

        let mut parts = line.split_whitespace();
        let result = match (parts.next(), parts.next(), parts.next()) {
            (None, _, _) => continue,
            (Some("quit" | "exit"), None, None) => return Ok(()),
            (Some("get"), Some(key), None) => run_get(client, key),
            (Some("set"), Some(key), Some(value)) if parts.next().is_none() => {
                run_set(client, key, value)
            }
            (Some("prefix"), Some(prefix), None) => run_prefix(client, prefix),
            (Some("ping"), None, None) => run_ping(client),
            _ => {
                println!("usage: get <key> | set <key> <value> | prefix <prefix> | ping | quit");
                continue;
            }
        };

        match result {
            Ok(()) => {}
            Err(KvError::NotFound(msg)) => println!("(not found) {}", msg),
            Err(KvError::Remote(msg)) => println!("(error) {}", msg),
            Err(KvError::Unavailable) => println!("(unavailable) server is still recovering"),
            Err(e) => return Err(e),
        }
    }
}
