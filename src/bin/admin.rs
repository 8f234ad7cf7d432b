//! RoseKV Admin Binary
//!
//! Offline maintenance for a RoseKV data directory.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use rosekv::config::CONFIG_FILE;
use rosekv::storage::Segment;
use rosekv::{Config, DataType, Engine, Result, RwMethod};
use tracing_subscriber::{fmt, EnvFilter};

/// RoseKV maintenance tool
#[derive(Parser, Debug)]
#[command(name = "rosekv-admin")]
#[command(about = "Inspect, merge and back up a RoseKV data directory")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print segment layout and key counts per data type
    Stat {
        /// Data directory
        #[arg(short, long)]
        dir: PathBuf,
    },

    /// Run one merge pass
    Merge {
        /// Data directory
        #[arg(short, long)]
        dir: PathBuf,
    },

    /// Print every entry of one segment file
    Dump {
        /// Data directory
        #[arg(short, long)]
        dir: PathBuf,

        /// Data type: str, list, hash, set or zset
        #[arg(short = 't', long = "type", value_parser = parse_data_type)]
        data_type: DataType,

        /// Segment id
        #[arg(short, long)]
        id: u32,
    },

    /// Copy the data directory
    Backup {
        /// Data directory
        #[arg(short, long)]
        dir: PathBuf,

        /// Destination directory
        #[arg(long)]
        to: PathBuf,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rosekv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();
    tracing::info!("RoseKV admin v{}", rosekv::VERSION);

    let outcome = match args.command {
        Command::Stat { dir } => stat(&dir),
        Command::Merge { dir } => merge(&dir),
        Command::Dump { dir, data_type, id } => dump(&dir, data_type, id),
        Command::Backup { dir, to } => backup(&dir, &to),
    };

    if let Err(e) = outcome {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn stat(dir: &Path) -> Result<()> {
    let engine = Engine::open(load_config(dir))?;
    println!("{:<6} {:>8} {:>12} {:>9} {:>10}", "type", "active", "active size", "archived", "keys");
    for data_type in DataType::ALL {
        let stats = engine.segment_stats(data_type)?;
        println!(
            "{:<6} {:>8} {:>12} {:>9} {:>10}",
            data_type,
            stats.active_id,
            stats.active_size,
            stats.archived_ids.len(),
            stats.keys
        );
    }
    engine.close()
}

fn merge(dir: &Path) -> Result<()> {
    let engine = Engine::open(load_config(dir))?;
    let outcome = engine.start_merge();
    engine.close()?;
    outcome?;
    println!("merge complete");
    Ok(())
}

fn dump(dir: &Path, data_type: DataType, id: u32) -> Result<()> {
    let path = rosekv::storage::segment_path(dir, id, data_type);
    if !path.is_file() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        )
        .into());
    }

    let config = load_config(dir);
    let segment = Segment::open(dir, id, data_type, RwMethod::FileIo, config.block_size)?;
    for item in segment.iter() {
        let (offset, entry) = item?;
        println!(
            "{:>10}  mark={:<2} ts={:<20} key={:?} value={:?} extra={:?}",
            offset,
            entry.get_mark(),
            entry.timestamp,
            String::from_utf8_lossy(&entry.key),
            String::from_utf8_lossy(&entry.value),
            String::from_utf8_lossy(&entry.extra),
        );
    }
    Ok(())
}

fn backup(dir: &Path, to: &Path) -> Result<()> {
    let engine = Engine::open(load_config(dir))?;
    let outcome = engine.backup(to);
    engine.close()?;
    outcome?;
    println!("backup written to {}", to.display());
    Ok(())
}

/// The config saved by the last close, rooted at `dir`
fn load_config(dir: &Path) -> Config {
    let mut config = match Config::load_saved(dir) {
        Ok(config) => config,
        Err(e) => {
            if dir.join(CONFIG_FILE).exists() {
                tracing::warn!("ignoring unreadable {}: {}", CONFIG_FILE, e);
            }
            Config::default()
        }
    };
    config.dir_path = dir.to_path_buf();
    config
}

fn parse_data_type(s: &str) -> std::result::Result<DataType, String> {
    DataType::from_suffix(s).ok_or_else(|| format!("unknown data type '{}'", s))
}
