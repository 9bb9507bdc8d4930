//! cdna: chaotic-DNA content store CLI
//!
//! Commands:
//!   ingest <file>        - chunk, deduplicate, compress, and DNA-encrypt a file
//!   retrieve <hash>      - decrypt, verify, and write a stored file back out
//!   show <hash>          - print a file's manifest and encryption metadata
//!   list                 - list every stored file
//!   export <hash>        - write the raw A/T/C/G ciphertext
//!   status               - check storage reachability
//!   config show          - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use cdna_cipher::BaseDistribution;
use cdna_core::config::CdnaConfig;
use cdna_pipeline::{
    EncryptionMetadata, IngestReport, IntegrityStatus, Manifest, Pipeline, ProgressFn,
};
use cdna_storage::S3Credentials;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "cdna",
    version,
    about = "Chaotic-DNA content store",
    long_about = "cdna: deduplicating chunk store that keeps every file as a \
                  compressed, DNA-encoded, logistic-map-encrypted artifact"
)]
struct Cli {
    /// Path to cdna config.toml
    #[arg(long, short = 'c', env = "CDNA_CONFIG", default_value = "/etc/cdna/config.toml")]
    config: PathBuf,

    /// Log level or filter directive (overrides [logging] level)
    #[arg(long, env = "CDNA_LOG", global = true)]
    log: Option<String>,

    /// Log format (overrides [logging] format)
    #[arg(long, env = "CDNA_LOG_FORMAT", global = true)]
    log_format: Option<LogFormat>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chunk, store, and encrypt a local file
    Ingest {
        /// Local file to ingest
        path: PathBuf,
        /// Name to record (default: the file's base name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Decrypt a stored file, verify its hash, and write it out
    Retrieve {
        /// Whole-file content hash (64 hex chars)
        file_hash: String,
        /// Destination path (default: the recorded filename in the current dir)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Write the recovered bytes even if verification fails
        #[arg(long)]
        force: bool,
    },

    /// Show a file's manifest and encryption metadata
    Show {
        file_hash: String,
    },

    /// List stored files
    List,

    /// Write a file's DNA ciphertext without decrypting it
    Export {
        file_hash: String,
        /// Destination path (default: <filename>.dna in the current dir)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Show storage backend status
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Clone, Debug, ValueEnum, PartialEq)]
enum LogFormat {
    Json,
    Text,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = load_config(&cli.config).await?;

    let level = cli
        .log
        .clone()
        .unwrap_or_else(|| loaded.config.logging.level.clone());
    let format = cli.log_format.clone().unwrap_or_else(|| {
        LogFormat::from_str(&loaded.config.logging.format, true).unwrap_or(LogFormat::Text)
    });
    init_logging(&level, &format);

    if !loaded.from_file {
        warn!(
            "config file not found: {}  (using defaults)",
            cli.config.display()
        );
    }
    let config = loaded.config;
    let json = cli.json;

    match cli.command {
        Commands::Ingest { path, name } => cmd_ingest(&config, &path, name.as_deref(), json).await,
        Commands::Retrieve {
            file_hash,
            output,
            force,
        } => cmd_retrieve(&config, &file_hash, output.as_deref(), force, json).await,
        Commands::Show { file_hash } => cmd_show(&config, &file_hash, json).await,
        Commands::List => cmd_list(&config, json).await,
        Commands::Export { file_hash, output } => {
            cmd_export(&config, &file_hash, output.as_deref(), json).await
        }
        Commands::Status => cmd_status(&config, json).await,
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &cli.config, loaded.from_file),
    }
}

struct LoadedConfig {
    config: CdnaConfig,
    from_file: bool,
}

async fn load_config(path: &Path) -> Result<LoadedConfig> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config: {}", path.display()))?;
        let config = CdnaConfig::from_toml_str(&content)
            .with_context(|| format!("loading config: {}", path.display()))?;
        Ok(LoadedConfig {
            config,
            from_file: true,
        })
    } else {
        Ok(LoadedConfig {
            config: CdnaConfig::default(),
            from_file: false,
        })
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout is reserved for command output
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn s3_credentials_from_env() -> Option<S3Credentials> {
    let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
        .or_else(|_| std::env::var("CDNA_ACCESS_KEY_ID"))
        .ok()?;
    let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
        .or_else(|_| std::env::var("CDNA_SECRET_ACCESS_KEY"))
        .ok()?;
    Some(S3Credentials {
        access_key_id,
        secret_access_key,
    })
}

fn build_operator(config: &CdnaConfig) -> Result<opendal::Operator> {
    let creds = s3_credentials_from_env();
    cdna_storage::build_operator(&config.storage, creds.as_ref())
        .context("building storage operator")
}

fn build_pipeline(config: &CdnaConfig) -> Result<Pipeline> {
    let op = build_operator(config)?;
    Pipeline::from_config(op, config).context("invalid configuration")
}

// ── Output helpers ────────────────────────────────────────────────────────────

fn make_spinner(prefix: &str, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("serializing output")?;
    println!("{rendered}");
    Ok(())
}

/// Recorded filenames come from storage; keep only the final component so a
/// default destination never escapes the working directory.
fn safe_file_name(recorded: &str, fallback: &str) -> PathBuf {
    Path::new(recorded)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(fallback))
}

async fn write_atomic(dest: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating dir: {}", parent.display()))?;
    }
    let tmp = dest.with_extension("cdna_tmp");
    tokio::fs::write(&tmp, data)
        .await
        .with_context(|| format!("writing tmp: {}", tmp.display()))?;
    tokio::fs::rename(&tmp, dest)
        .await
        .with_context(|| format!("renaming to: {}", dest.display()))?;
    Ok(())
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn fmt_distribution(d: &BaseDistribution) -> String {
    format!("A={} T={} C={} G={}", d.a, d.t, d.c, d.g)
}

// ── `cdna ingest` ─────────────────────────────────────────────────────────────

async fn cmd_ingest(config: &CdnaConfig, path: &Path, name: Option<&str>, json: bool) -> Result<()> {
    let pipeline = build_pipeline(config)?;

    let filename = match name {
        Some(n) => n.to_string(),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .with_context(|| format!("{} has no file name; pass --name", path.display()))?,
    };
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("opening {}", path.display()))?;

    let pb = make_spinner("ingest", json);
    pb.set_message(filename.clone());
    let pb_clone = pb.clone();
    let progress: ProgressFn = Box::new(move |_done, _total, msg| {
        pb_clone.set_message(msg.to_string());
    });

    let report = pipeline
        .ingest_with_progress(&filename, file, Some(&progress))
        .await
        .with_context(|| format!("ingesting {}", path.display()));
    pb.finish_and_clear();
    let report = report?;

    if json {
        return print_json(&report);
    }
    print_ingest(&report);
    Ok(())
}

fn print_ingest(r: &IngestReport) {
    if r.reused {
        println!("Ingested {} (content already stored, artifact reused)", r.filename);
    } else {
        println!("Ingested {}", r.filename);
    }
    println!("  hash:       {}", r.file_hash);
    println!("  manifest:   {}", r.manifest_key);
    println!(
        "  fragments:  {} ({} new, {} bound)",
        r.fragments.len(),
        r.new_chunks,
        fmt_bytes(r.chunk_size_bytes)
    );
    println!(
        "  size:       {} → {} ({:.2}% saved)",
        fmt_bytes(r.compression.original_size),
        fmt_bytes(r.compression.compressed_size),
        r.compression.ratio
    );
    println!("  symbols:    {}", r.encryption.symbol_length);
    println!("  seed:       x0={} r={}", r.encryption.x0, r.encryption.r);
    println!("  plain:      {}", fmt_distribution(&r.encryption.plain_distribution));
    println!("  cipher:     {}", fmt_distribution(&r.encryption.cipher_distribution));
    if !r.reused {
        println!("  elapsed:    {} ms", r.encryption.elapsed_ms);
    }
}

// ── `cdna retrieve` ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct RetrieveOutput<'a> {
    filename: &'a str,
    file_hash: &'a str,
    output: String,
    bytes: usize,
    integrity: &'a IntegrityStatus,
}

async fn cmd_retrieve(
    config: &CdnaConfig,
    file_hash: &str,
    output: Option<&Path>,
    force: bool,
    json: bool,
) -> Result<()> {
    let pipeline = build_pipeline(config)?;

    let pb = make_spinner("retrieve", json);
    pb.set_message("decrypting".to_string());
    let retrieved = pipeline
        .retrieve(file_hash)
        .await
        .with_context(|| format!("retrieving {file_hash}"));
    pb.finish_and_clear();
    let retrieved = retrieved?;

    if let IntegrityStatus::Mismatch { expected, actual } = &retrieved.integrity {
        if !force {
            anyhow::bail!(
                "integrity check failed for {file_hash}: expected {expected}, recovered {actual}\n\
                 (use --force to write the recovered bytes anyway)"
            );
        }
        warn!(%expected, %actual, "writing unverified data (--force)");
    }

    let dest = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| safe_file_name(&retrieved.filename, file_hash));
    write_atomic(&dest, &retrieved.data).await?;
    info!(dest = %dest.display(), bytes = retrieved.data.len(), "written");

    if json {
        return print_json(&RetrieveOutput {
            filename: &retrieved.filename,
            file_hash: &retrieved.file_hash,
            output: dest.display().to_string(),
            bytes: retrieved.data.len(),
            integrity: &retrieved.integrity,
        });
    }

    println!("Retrieved {}", retrieved.filename);
    println!("  local:      {}", dest.display());
    println!("  bytes:      {}", fmt_bytes(retrieved.data.len() as u64));
    match &retrieved.integrity {
        IntegrityStatus::Verified => println!("  integrity:  verified"),
        IntegrityStatus::Mismatch { actual, .. } => {
            println!("  integrity:  MISMATCH (recovered {actual})")
        }
    }
    Ok(())
}

// ── `cdna show` ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ShowOutput<'a> {
    manifest: &'a Manifest,
    metadata: Option<&'a EncryptionMetadata>,
}

async fn cmd_show(config: &CdnaConfig, file_hash: &str, json: bool) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let manifest = pipeline
        .manifest(file_hash)
        .await
        .with_context(|| format!("reading manifest for {file_hash}"))?;
    let metadata = match pipeline.metadata(file_hash).await {
        Ok(meta) => Some(meta),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(anyhow::Error::new(e).context("reading encryption metadata")),
    };

    if json {
        return print_json(&ShowOutput {
            manifest: &manifest,
            metadata: metadata.as_ref(),
        });
    }

    println!("{}", manifest.filename);
    println!("  hash:       {} ({})", manifest.file_hash, manifest.hash_algorithm);
    println!("  size:       {}", fmt_bytes(manifest.file_size));
    println!("  created:    {}", manifest.created_at);
    println!(
        "  fragments:  {} of up to {}",
        manifest.fragments.len(),
        fmt_bytes(manifest.chunk_size_bytes)
    );
    for frag in &manifest.fragments {
        println!(
            "    #{:<4} @{:<12} {:>10}  {}",
            frag.index,
            frag.offset,
            fmt_bytes(frag.size),
            &frag.chunk_hash[..16.min(frag.chunk_hash.len())]
        );
    }

    match metadata {
        Some(meta) => {
            let params = meta.params();
            println!("  encryption:");
            println!("    compressed: {}", fmt_bytes(meta.compressed_size));
            println!("    symbols:    {}", meta.symbol_length);
            println!("    x0:         {} ({:016x})", params.x0(), params.x0().to_bits());
            println!("    r:          {} ({:016x})", params.r(), params.r().to_bits());
            println!("    iterations: {}", meta.chaotic_parameters.iterations);
            println!("    plain:      {}", fmt_distribution(&meta.plain_distribution));
            println!("    cipher:     {}", fmt_distribution(&meta.cipher_distribution));
        }
        None => println!("  encryption: not present"),
    }
    Ok(())
}

// ── `cdna list` ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ListEntry {
    file_hash: String,
    filename: Option<String>,
    file_size: Option<u64>,
}

async fn cmd_list(config: &CdnaConfig, json: bool) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let hashes = pipeline.list().await.context("listing manifests")?;

    let mut entries = Vec::with_capacity(hashes.len());
    for hash in hashes {
        let file_hash = hash.to_hex();
        let manifest = match pipeline.manifest(&file_hash).await {
            Ok(m) => Some(m),
            Err(e) => {
                warn!(hash = %file_hash, error = %e, "unreadable manifest");
                None
            }
        };
        entries.push(ListEntry {
            filename: manifest.as_ref().map(|m| m.filename.clone()),
            file_size: manifest.as_ref().map(|m| m.file_size),
            file_hash,
        });
    }

    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("no files stored");
        return Ok(());
    }
    for e in &entries {
        println!(
            "{}  {:>10}  {}",
            e.file_hash,
            e.file_size.map(fmt_bytes).unwrap_or_else(|| "?".into()),
            e.filename.as_deref().unwrap_or("<unreadable manifest>")
        );
    }
    Ok(())
}

// ── `cdna export` ─────────────────────────────────────────────────────────────

async fn cmd_export(
    config: &CdnaConfig,
    file_hash: &str,
    output: Option<&Path>,
    json: bool,
) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let artifact = pipeline
        .fetch_ciphertext(file_hash)
        .await
        .with_context(|| format!("fetching ciphertext for {file_hash}"))?;

    let dest = output.map(Path::to_path_buf).unwrap_or_else(|| {
        let mut name = safe_file_name(&artifact.filename, file_hash).into_os_string();
        name.push(".dna");
        PathBuf::from(name)
    });
    write_atomic(&dest, &artifact.ciphertext).await?;

    if json {
        return print_json(&serde_json::json!({
            "filename": artifact.filename,
            "file_hash": artifact.file_hash,
            "output": dest.display().to_string(),
            "symbols": artifact.ciphertext.len(),
        }));
    }
    println!("Exported {} ciphertext", artifact.filename);
    println!("  local:      {}", dest.display());
    println!("  symbols:    {}", artifact.ciphertext.len());
    Ok(())
}

// ── `cdna status` ─────────────────────────────────────────────────────────────

async fn cmd_status(config: &CdnaConfig, json: bool) -> Result<()> {
    let op = build_operator(config)?;
    let location = match config.storage.backend.as_str() {
        "fs" => config.storage.root.display().to_string(),
        "s3" => format!("{}/{}", config.storage.endpoint, config.storage.bucket),
        _ => "in-memory".to_string(),
    };
    let health = cdna_storage::check_health(&op).await;

    if json {
        print_json(&serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "backend": config.storage.backend,
            "location": location,
            "prefix": config.storage.prefix,
            "healthy": health.is_ok(),
            "error": health.as_ref().err().map(|e| format!("{e:#}")),
        }))?;
    } else {
        println!("cdna v{}", env!("CARGO_PKG_VERSION"));
        println!("  backend:    {} ({location})", config.storage.backend);
        println!("  prefix:     {}", config.storage.prefix);
        match &health {
            Ok(()) => println!("  storage:    ok"),
            Err(e) => println!("  storage:    UNREACHABLE ({e:#})"),
        }
    }

    health.context("storage unreachable")
}

// ── `cdna config show` ────────────────────────────────────────────────────────

fn cmd_config_show(config: &CdnaConfig, config_path: &Path, from_file: bool) -> Result<()> {
    if from_file {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
