//! pakctl - Command-line tool for Unreal Engine `.pak` and IoStore
//! `.utoc`/`.ucas` asset containers.
//!
//! This is the main entry point for the pakctl command-line
//! application.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use pak_reader::prelude::*;

/// Progress stage for detailed visualization.
#[derive(Clone, Copy)]
enum Stage {
    Extract,
}

impl Stage {
    fn prefix(self) -> &'static str {
        match self {
            Stage::Extract => "EXTRACT",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Stage::Extract => "cyan",
        }
    }
}

/// Create a progress bar with stage-aware template.
fn create_progress_bar(len: u64, stage: Stage) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let template = format!(
        "{{spinner:.{}}} [{{elapsed_precise}}] [{{bar:40.{}/blue}}] {{pos}}/{{len}} ({{per_sec}}) {{msg}}",
        stage.color(),
        stage.color()
    );
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&template)
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}

/// Format a file path for display (truncate if too long).
fn format_path_for_display(path: &str, max_len: usize) -> String {
    if path.len() <= max_len {
        path.to_string()
    } else {
        let start = path.len() - max_len + 3;
        format!("...{}", &path[start..])
    }
}

fn set_progress_message(pb: &ProgressBar, stage: Stage, file: &str) {
    let display_path = format_path_for_display(file, 50);
    pb.set_message(format!("[{}] {}", stage.prefix(), display_path));
}

/// pakctl - Unreal Engine game file extraction tool.
#[derive(Parser)]
#[command(name = "pakctl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// `GUID=hex` pair describing an AES key to register before opening
/// an archive. May be repeated.
#[derive(Clone)]
struct KeyArg {
    guid: String,
    hex: String,
}

impl std::str::FromStr for KeyArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (guid, hex) = s
            .split_once('=')
            .ok_or_else(|| "expected GUID=HEXKEY".to_string())?;
        Ok(KeyArg {
            guid: guid.to_string(),
            hex: hex.to_string(),
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List entries in a PAK or IoStore container.
    List {
        /// Path to the `.pak` file or `.utoc` file.
        #[arg(short, long, env = "INPUT_PAK")]
        path: PathBuf,

        /// Glob-style filter pattern (e.g. `*.uasset`).
        #[arg(short, long)]
        filter: Option<String>,

        /// Show size, compression, and encryption flags per entry.
        #[arg(short, long)]
        detailed: bool,

        /// AES key as `GUID=HEXKEY`, repeatable.
        #[arg(long = "key")]
        keys: Vec<KeyArg>,
    },

    /// Extract entries from a PAK or IoStore container to a directory.
    Extract {
        /// Path to the `.pak` file or `.utoc` file.
        #[arg(short, long, env = "INPUT_PAK")]
        path: PathBuf,

        /// Output directory.
        #[arg(short, long, env = "OUTPUT_FOLDER")]
        output: PathBuf,

        /// Glob-style filter pattern (e.g. `*.uasset`).
        #[arg(short, long)]
        filter: Option<String>,

        /// Number of parallel workers (0 = auto).
        #[arg(long, short = 'j', default_value = "0")]
        parallel: usize,

        /// AES key as `GUID=HEXKEY`, repeatable.
        #[arg(long = "key")]
        keys: Vec<KeyArg>,
    },

    /// Print metadata for a single entry without extracting it.
    Info {
        /// Path to the `.pak` file or `.utoc` file.
        #[arg(short, long, env = "INPUT_PAK")]
        path: PathBuf,

        /// The entry's virtual path inside the container.
        entry: String,

        /// AES key as `GUID=HEXKEY`, repeatable.
        #[arg(long = "key")]
        keys: Vec<KeyArg>,
    },

    /// Mount one or more containers (highest priority first) and read
    /// a single entry through the composited virtual file system.
    Mount {
        /// Containers to mount, highest priority first.
        containers: Vec<PathBuf>,

        /// The virtual path to resolve and read.
        #[arg(short, long)]
        get: String,

        /// AES key as `GUID=HEXKEY`, repeatable.
        #[arg(long = "key")]
        keys: Vec<KeyArg>,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}

fn parse_hex(s: &str) -> Result<Vec<u8>> {
    if s.len() % 2 != 0 {
        bail!("hex string must have an even number of digits");
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| e.into()))
        .collect()
}

fn build_key_registry(keys: &[KeyArg]) -> Result<Arc<KeyRegistry>> {
    let registry = KeyRegistry::new();
    for key in keys {
        let bytes = parse_hex(&key.hex).with_context(|| format!("invalid hex key for {}", key.guid))?;
        registry
            .add(&key.guid, bytes)
            .with_context(|| format!("invalid key length for {}", key.guid))?;
    }
    Ok(Arc::new(registry))
}

/// Whether `path` names an IoStore `.utoc` container rather than a PAK.
fn is_iostore(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()).map(|e| e.eq_ignore_ascii_case("utoc")).unwrap_or(false)
}

enum AnyArchive {
    Pak(PakArchive),
    IoStore(IoStoreArchive),
}

impl AnyArchive {
    fn open(path: &Path, keys: &KeyRegistry) -> Result<Self> {
        if is_iostore(path) {
            Ok(AnyArchive::IoStore(
                IoStoreArchive::open(path, keys).with_context(|| format!("opening {}", path.display()))?,
            ))
        } else {
            Ok(AnyArchive::Pak(
                PakArchive::open_any(path, keys).with_context(|| format!("opening {}", path.display()))?,
            ))
        }
    }

    fn list(&self, pattern: &str) -> Vec<EntryInfo> {
        match self {
            AnyArchive::Pak(a) => a.list(pattern).into_iter().map(Into::into).collect(),
            AnyArchive::IoStore(a) => a.list(pattern),
        }
    }

    fn info(&self, path: &str) -> Option<EntryInfo> {
        match self {
            AnyArchive::Pak(a) => a.info(path),
            AnyArchive::IoStore(a) => a.info(path),
        }
    }

    fn get(&self, path: &str, keys: &KeyRegistry, compress: &CompressRegistry) -> Result<Option<Vec<u8>>> {
        match self {
            AnyArchive::Pak(a) => Ok(a.get(path, keys, compress)?),
            AnyArchive::IoStore(a) => Ok(a.get(path, keys, compress)?),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::List { path, filter, detailed, keys } => cmd_list(&path, filter.as_deref(), detailed, &keys),
        Commands::Extract {
            path,
            output,
            filter,
            parallel,
            keys,
        } => cmd_extract(&path, &output, filter.as_deref(), parallel, &keys),
        Commands::Info { path, entry, keys } => cmd_info(&path, &entry, &keys),
        Commands::Mount { containers, get, keys } => cmd_mount(&containers, &get, &keys),
    }
}

fn cmd_list(path: &Path, filter: Option<&str>, detailed: bool, key_args: &[KeyArg]) -> Result<()> {
    let keys = build_key_registry(key_args)?;
    let archive = AnyArchive::open(path, &keys)?;
    let pattern = filter.unwrap_or("*");
    let entries = archive.list(pattern);

    for entry in &entries {
        if detailed {
            println!(
                "{:>12} {} {} {}",
                entry.size,
                if entry.compressed { "C" } else { "-" },
                if entry.encrypted { "E" } else { "-" },
                entry.path,
            );
        } else {
            println!("{}", entry.path);
        }
    }
    eprintln!("{} entries", entries.len());
    Ok(())
}

fn cmd_info(path: &Path, entry_path: &str, key_args: &[KeyArg]) -> Result<()> {
    let keys = build_key_registry(key_args)?;
    let archive = AnyArchive::open(path, &keys)?;
    match archive.info(entry_path) {
        Some(info) => {
            println!("path:       {}", info.path);
            println!("size:       {}", info.size);
            println!("compressed: {}", info.compressed);
            println!("encrypted:  {}", info.encrypted);
        }
        None => bail!("entry not found: {entry_path}"),
    }
    Ok(())
}

fn cmd_extract(
    path: &Path,
    output: &Path,
    filter: Option<&str>,
    parallel: usize,
    key_args: &[KeyArg],
) -> Result<()> {
    let keys = build_key_registry(key_args)?;
    let compress = Arc::new(CompressRegistry::new());
    let archive = Arc::new(AnyArchive::open(path, &keys)?);

    let pattern = filter.unwrap_or("*");
    let entries = archive.list(pattern);
    std::fs::create_dir_all(output)?;

    if parallel != 1 {
        let pool = rayon::ThreadPoolBuilder::new();
        let pool = if parallel == 0 { pool } else { pool.num_threads(parallel) };
        let pool = pool.build().context("building thread pool")?;
        let pb = create_progress_bar(entries.len() as u64, Stage::Extract);
        pool.install(|| -> Result<()> {
            use rayon::prelude::*;
            entries
                .par_iter()
                .try_for_each(|entry| extract_one(&archive, &keys, &compress, entry, output, &pb))
        })?;
        pb.finish_with_message("done");
    } else {
        let pb = create_progress_bar(entries.len() as u64, Stage::Extract);
        for entry in &entries {
            extract_one(&archive, &keys, &compress, entry, output, &pb)?;
        }
        pb.finish_with_message("done");
    }

    Ok(())
}

fn extract_one(
    archive: &AnyArchive,
    keys: &KeyRegistry,
    compress: &CompressRegistry,
    entry: &EntryInfo,
    output: &Path,
    pb: &ProgressBar,
) -> Result<()> {
    set_progress_message(pb, Stage::Extract, &entry.path);
    let data = archive
        .get(&entry.path, keys, compress)
        .with_context(|| format!("extracting {}", entry.path))?
        .with_context(|| format!("entry disappeared: {}", entry.path))?;

    let dest = output.join(entry.path.trim_start_matches('/'));
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&dest, data)?;
    pb.inc(1);
    Ok(())
}

fn cmd_mount(containers: &[PathBuf], get: &str, key_args: &[KeyArg]) -> Result<()> {
    if containers.is_empty() {
        bail!("at least one container must be given");
    }

    let keys = build_key_registry(key_args)?;
    let compress = Arc::new(CompressRegistry::new());
    let vfs = Vfs::new(VfsConfig::default(), keys, compress);

    for (i, path) in containers.iter().enumerate() {
        let priority = match i {
            0 => LoadPriority::Critical,
            1 => LoadPriority::High,
            _ => LoadPriority::Normal,
        };
        if is_iostore(path) {
            vfs.mount_iostore(path, "", priority)?;
        } else {
            vfs.mount_pak(path, "", priority)?;
        }
    }

    match vfs.get_sync(get)? {
        Some(data) => {
            println!("{} bytes", data.len());
        }
        None => bail!("entry not found in any mounted container: {get}"),
    }

    let stats = vfs.stats();
    eprintln!(
        "mounts={} cache_hits={} cache_misses={}",
        stats.mount_count, stats.cache.hits, stats.cache.misses
    );
    Ok(())
}
