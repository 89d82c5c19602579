use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use fs_err as fs;
use serde::Serialize;
use serde_json::to_string_pretty;
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::orchestrator::AttemptLedger;
use crate::wire::Project;

/// Per-transaction diagnostic files under `<root>/tx/<txid>/`.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    save_responses: bool,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>, save_responses: bool) -> Self {
        Self {
            root: root.into(),
            save_responses,
        }
    }

    pub fn tx_dir(&self, tx: Uuid) -> PathBuf {
        self.root.join("tx").join(tx.to_string())
    }

    /// Raw backend text; skipped unless responses are being kept.
    pub fn save_raw(&self, tx: Uuid, attempt: u32, model: &str, text: &str) -> anyhow::Result<Option<PathBuf>> {
        if !self.save_responses {
            return Ok(None);
        }
        let path = self
            .tx_dir(tx)
            .join(format!("attempt-{attempt}.{}.raw.txt", file_safe(model)));
        write_atomic(&path, text.as_bytes())?;
        Ok(Some(path))
    }

    pub fn save_project(&self, tx: Uuid, project: &Project) -> anyhow::Result<PathBuf> {
        self.save_json(tx, "project.json", project)
    }

    pub fn save_ledger(&self, tx: Uuid, ledger: &AttemptLedger) -> anyhow::Result<PathBuf> {
        self.save_json(tx, "ledger.json", ledger)
    }

    fn save_json<T: Serialize>(&self, tx: Uuid, name: &str, value: &T) -> anyhow::Result<PathBuf> {
        let path = self.tx_dir(tx).join(name);
        write_atomic(&path, to_string_pretty(value)?.as_bytes())?;
        Ok(path)
    }
}

/// Write through a sibling temp file so readers never see a partial file.
pub fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path)
        .with_context(|| format!("persisting {}", path.display()))?;
    Ok(())
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{AttemptOutcome, TerminalReason};
    use chrono::Utc;

    #[test]
    fn writes_transaction_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), true);
        let tx = Uuid::new_v4();

        let raw = store.save_raw(tx, 1, "ollama:llama3", "hello").unwrap().unwrap();
        assert_eq!(raw.file_name().unwrap(), "attempt-1.ollama_llama3.raw.txt");
        assert_eq!(fs::read_to_string(&raw).unwrap(), "hello");

        let mut ledger = AttemptLedger::new();
        ledger.record("m", false, Utc::now(), 5, AttemptOutcome::Timeout);
        ledger.finish(TerminalReason::Exhausted);
        let path = store.save_ledger(tx, &ledger).unwrap();
        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["terminal"], "exhausted");

        let project_path = store.save_project(tx, &Project::default()).unwrap();
        assert_eq!(project_path, store.tx_dir(tx).join("project.json"));
    }

    #[test]
    fn raw_responses_are_opt_in() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), false);
        assert!(store.save_raw(Uuid::new_v4(), 1, "m", "x").unwrap().is_none());
    }

    #[test]
    fn overwrite_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b.txt");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
    }
}
