//! # Ledger I/O
//!
//! JSON inputs and atomic persistence of run artifacts.
//!
//! ## Files Written
//! - `ledger.json` - Canonical ledger JSON (compact, deterministic)
//! - `ledger.sha256` - SHA-256 of `ledger.json` in sha256sum format
//! - `run_report.json` - Run report (pretty)
//!
//! The sidecar hash is `AllocationLedger::digest()`: the file holds exactly
//! `AllocationLedger::canonical_json()`.

use anyhow::{Context, Result};
use dccs_engine::RunReport;
use dccs_models::{AllocationLedger, LineItem, ScheduleSource, sha256_hex};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const LEDGER_FILE: &str = "ledger.json";
pub const LEDGER_SHA_FILE: &str = "ledger.sha256";
pub const REPORT_FILE: &str = "run_report.json";

/// Paths and hash of persisted run artifacts.
#[derive(Debug, Clone)]
pub struct PersistResult {
    pub ledger_path: PathBuf,
    pub sha_path: PathBuf,
    pub report_path: PathBuf,
    /// SHA-256 of the ledger JSON (lowercase hex)
    pub sha256: String,
    pub bytes_len: usize,
}

/// Replace `path` with `bytes` through a temp file in the same directory.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let mut staged = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to stage a write in {}", dir.display()))?;
    staged.write_all(bytes).context("Failed to write staged file")?;
    staged.as_file().sync_all().context("Failed to sync staged file")?;
    staged
        .persist(path)
        .with_context(|| format!("Failed to move staged file onto {}", path.display()))?;
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse JSON in {:?}", path))
}

pub fn load_schedule(path: &Path) -> Result<ScheduleSource> {
    load_json(path)
}

pub fn load_line_items(path: &Path) -> Result<Vec<LineItem>> {
    load_json(path)
}

pub fn load_ledger(path: &Path) -> Result<AllocationLedger> {
    load_json(path)
}

/// Prior ledger if configured and present on disk. A missing file means
/// "nothing to preserve"; an unreadable one is an error.
pub fn load_prior_ledger(path: Option<&Path>) -> Result<Option<AllocationLedger>> {
    match path {
        Some(p) if p.exists() => load_ledger(p).map(Some),
        Some(p) => {
            tracing::info!(path = ?p, "No prior ledger on disk, taking new allocation wholesale");
            Ok(None)
        }
        None => Ok(None),
    }
}

/// Write `value` as pretty JSON, atomically.
pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).context("Failed to serialize JSON")?;
    write_atomic(path, &bytes)
}

/// Persist ledger, hash sidecar and report into `dir`.
pub fn persist_run(
    dir: &Path,
    ledger: &AllocationLedger,
    report: &RunReport,
) -> Result<PersistResult> {
    let bytes = ledger.canonical_json().context("Failed to serialize ledger")?;
    let sha256 = sha256_hex(&bytes);

    let ledger_path = dir.join(LEDGER_FILE);
    let sha_path = dir.join(LEDGER_SHA_FILE);
    let report_path = dir.join(REPORT_FILE);

    write_atomic(&ledger_path, &bytes)
        .with_context(|| format!("Failed to write ledger: {:?}", ledger_path))?;

    let hash_content = format!("{}  {}\n", sha256, LEDGER_FILE);
    write_atomic(&sha_path, hash_content.as_bytes())
        .with_context(|| format!("Failed to write hash file: {:?}", sha_path))?;

    write_json_pretty(&report_path, report)
        .with_context(|| format!("Failed to write report: {:?}", report_path))?;

    Ok(PersistResult {
        ledger_path,
        sha_path,
        report_path,
        sha256,
        bytes_len: bytes.len(),
    })
}

/// Check `ledger.json` in `dir` against its sidecar hash.
pub fn verify_ledger(dir: &Path) -> Result<bool> {
    let bytes = fs::read(dir.join(LEDGER_FILE)).context("Failed to read ledger file")?;
    let sha_content =
        fs::read_to_string(dir.join(LEDGER_SHA_FILE)).context("Failed to read hash file")?;
    let expected = sha_content
        .split_whitespace()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty hash file"))?;
    Ok(sha256_hex(&bytes) == expected)
}
