use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Name of the ledger file kept in the source root.
pub const LEDGER_FILE_NAME: &str = ".albumkit-imported.json";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Source files already imported into the output tree, keyed by their path
/// relative to the source root, with the size they had at import time.
///
/// Imported files get renamed and merged downstream, so their presence in the
/// output tree cannot be checked by path. The ledger keeps later runs from
/// importing them again.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ImportLedger {
    #[serde(default)]
    imported: BTreeMap<String, u64>,
    #[serde(skip)]
    path: PathBuf,
}

fn key(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}

impl ImportLedger {
    /// Ledger of `source_root`. A missing file is an empty ledger, an
    /// unreadable one is reported and also treated as empty.
    pub fn load(source_root: &Path) -> Self {
        let path = source_root.join(LEDGER_FILE_NAME);
        let mut ledger = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("ignoring unreadable {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        };
        ledger.path = path;
        ledger
    }

    pub fn is_imported(&self, rel: &Path, size: u64) -> bool {
        self.imported.get(&key(rel)) == Some(&size)
    }

    pub fn record(&mut self, rel: &Path, size: u64) {
        self.imported.insert(key(rel), size);
    }

    pub fn save(&self) -> Result<(), LedgerError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}
