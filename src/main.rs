mod cli_utils;

use std::{io::Write, sync::Arc, thread};

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use rand::Rng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use skip_index::{DeleteOutcome, InsertOutcome, SkipListIndex, SkipListOptions};

#[derive(Parser)]
#[clap(name = "", no_binary_name = true)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Insert {
        #[clap(allow_hyphen_values = true)]
        key: i64,
        #[clap(allow_hyphen_values = true)]
        value: i64,
    },
    Search {
        #[clap(allow_hyphen_values = true)]
        key: i64,
    },
    Delete {
        #[clap(allow_hyphen_values = true)]
        key: i64,
    },
    Size,
    Print,
    Fill {
        #[clap(allow_hyphen_values = true)]
        lower: i64,
        #[clap(allow_hyphen_values = true)]
        upper: i64,
    },
    Stress {
        threads: usize,
        ops: usize,
    },
    Quit,
}

#[derive(Debug)]
enum StressEvent {
    Insert(InsertOutcome),
    Delete(DeleteOutcome),
}

#[derive(Debug, Default)]
struct StressSummary {
    inserted: usize,
    already_exists: usize,
    deleted: usize,
    not_found: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = SkipListOptions::from_env()?;
    info!(?options, "starting skip-index shell");
    let index = Arc::new(SkipListIndex::open(options)?);
    loop {
        print!("$ ");
        std::io::stdout().flush()?;

        let Some(line) = cli_utils::readline()? else {
            return Ok(());
        };
        let args = shlex::split(&line).unwrap_or_default();
        if args.is_empty() {
            continue;
        }
        let cli = match Cli::try_parse_from(args) {
            Ok(cli) => cli,
            Err(e) => {
                e.print()?;
                continue;
            }
        };
        match cli.command {
            Command::Insert { key, value } => match index.insert(key, value)? {
                InsertOutcome::Inserted => println!("inserted {}:{}", key, value),
                InsertOutcome::AlreadyExists => println!("key {} exists", key),
            },
            Command::Search { key } => match index.search(key) {
                Some(value) => println!("{}={}", key, value),
                None => println!("key {} not found", key),
            },
            Command::Delete { key } => match index.delete(key) {
                DeleteOutcome::Deleted => println!("deleted {}", key),
                DeleteOutcome::NotFound => println!("key {} not found", key),
            },
            Command::Size => println!("{}", index.size()),
            Command::Print => print!("{}", index),
            Command::Fill { lower, upper } => {
                let mut inserted = 0;
                for key in lower..=upper {
                    if index.insert(key, key.saturating_mul(10))? == InsertOutcome::Inserted {
                        inserted += 1;
                    }
                }
                println!("inserted {} keys", inserted);
            }
            Command::Stress { threads, ops } => {
                let summary = stress(&index, threads, ops)?;
                println!(
                    "inserted={} exists={} deleted={} not_found={} size={}",
                    summary.inserted,
                    summary.already_exists,
                    summary.deleted,
                    summary.not_found,
                    index.size()
                );
            }
            Command::Quit => return Ok(()),
        }
    }
}

// Runs `threads` writers, each doing `ops` random inserts and deletes over a
// shared key range, and tallies the outcomes they report.
fn stress(index: &Arc<SkipListIndex>, threads: usize, ops: usize) -> anyhow::Result<StressSummary> {
    let key_space = (ops.max(1) as i64).saturating_mul(2);
    let (sender, receiver) = crossbeam_channel::unbounded();
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let index = index.clone();
            let sender = sender.clone();
            thread::spawn(move || -> anyhow::Result<()> {
                let mut rng = rand::rng();
                for _ in 0..ops {
                    let key = rng.random_range(0..key_space);
                    let event = if rng.random_bool(0.5) {
                        StressEvent::Insert(index.insert(key, key)?)
                    } else {
                        StressEvent::Delete(index.delete(key))
                    };
                    sender.send(event)?;
                }
                Ok(())
            })
        })
        .collect();
    // the receiver loop ends once every worker's sender is gone
    drop(sender);

    let mut summary = StressSummary::default();
    for event in receiver {
        match event {
            StressEvent::Insert(InsertOutcome::Inserted) => summary.inserted += 1,
            StressEvent::Insert(InsertOutcome::AlreadyExists) => summary.already_exists += 1,
            StressEvent::Delete(DeleteOutcome::Deleted) => summary.deleted += 1,
            StressEvent::Delete(DeleteOutcome::NotFound) => summary.not_found += 1,
        }
    }
    for handle in handles {
        handle
            .join()
            .map_err(|e| anyhow!("stress worker panicked: {:?}", e))??;
    }

    let listed = index.iter().count();
    if listed != index.size() {
        return Err(anyhow!(
            "size mismatch after stress: size={} listed={}",
            index.size(),
            listed
        ));
    }
    Ok(summary)
}
