use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};

use feedmux::config::{self, Config};

#[derive(Parser, Debug)]
#[command(
    name = "feedmux",
    about = "Merges multiple podcast RSS feeds into one combined feed"
)]
struct Args {
    /// TOML file of configuration keys (overlays the environment)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the combined feed here instead of stdout
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,
}

/// Atomically write a file using write-to-temp-then-rename.
/// The destination is never left in a partial state.
fn atomic_write(dst: &Path, content: &str) -> Result<()> {
    use std::time::{SystemTime, UNIX_EPOCH};
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dst.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut temp_file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .with_context(|| {
            format!(
                "Failed to create temporary file '{}': check directory permissions or disk space",
                temp_path.display()
            )
        })?;

    temp_file.write_all(content.as_bytes()).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to write to temporary file '{}': disk may be full",
            temp_path.display()
        )
    })?;

    temp_file.sync_all().with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to sync temporary file '{}' to disk: disk may be full",
            temp_path.display()
        )
    })?;

    drop(temp_file);

    std::fs::rename(&temp_path, dst).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to rename '{}' to '{}': check permissions",
            temp_path.display(),
            dst.display()
        )
    })?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout is reserved for the feed document.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let keys = config::collect_keys(args.config.as_deref())
        .context("Failed to collect configuration keys")?;
    let config = Config::resolve(&keys).context("Failed to resolve feed configuration")?;

    let client = reqwest::Client::builder()
        .user_agent(concat!("feedmux/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let now = Local::now().fixed_offset();
    let xml = feedmux::build_combined_feed(&client, &config, now)
        .await
        .context("Failed to build combined feed")?;

    match &args.output {
        Some(path) => {
            atomic_write(path, &xml)?;
            tracing::info!(path = %path.display(), bytes = xml.len(), "Combined feed written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(xml.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }

    Ok(())
}
