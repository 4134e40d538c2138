use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::resource::PinResourceState;

pub const STATE_VERSION: u32 = 1;

/// The durable document mapping declaration keys to pin records. Loaded at
/// the start of a run and rewritten atomically after every successful
/// transition, so a crash mid-run never leaves a half-written file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDoc {
    pub version: u32,
    pub pins: BTreeMap<String, PinRecord>,
}

impl Default for StateDoc {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            pins: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinRecord {
    #[serde(flatten)]
    pub state: PinResourceState,
    pub updated_at: String,
}

impl PinRecord {
    pub fn new(state: PinResourceState) -> Self {
        Self {
            state,
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

pub fn load(path: &Path) -> Result<StateDoc> {
    if !path.is_file() {
        return Ok(StateDoc::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| Error::msg(format!("failed to read state {}: {e}", path.display())))?;
    serde_json::from_str::<StateDoc>(&raw)
        .map_err(|e| Error::msg(format!("failed to parse state {}: {e}", path.display())))
}

pub fn save(path: &Path, doc: &StateDoc) -> Result<()> {
    let body = serde_json::to_string_pretty(doc)
        .map_err(|e| Error::msg(format!("failed to encode state: {e}")))?;
    atomic_write_text(path, &body)
        .map_err(|e| e.context(format!("failed to write state {}", path.display())))
}

fn atomic_write_text(path: &Path, body: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::msg(format!("failed to create {}: {e}", parent.display())))?;
    }
    let file_name = path.file_name().and_then(|s| s.to_str()).ok_or_else(|| {
        Error::msg(format!(
            "invalid file path for atomic write: {}",
            path.display()
        ))
    })?;
    let tmp = path.with_file_name(format!(
        ".{}.tmp.{}.{}",
        file_name,
        std::process::id(),
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    fs::write(&tmp, body)
        .map_err(|e| Error::msg(format!("failed to write temp file {}: {e}", tmp.display())))?;
    fs::rename(&tmp, path).map_err(|e| {
        Error::msg(format!(
            "failed to rename {} -> {}: {e}",
            tmp.display(),
            path.display()
        ))
    })?;
    Ok(())
}
