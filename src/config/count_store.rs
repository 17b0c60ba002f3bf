use crate::core::CountStore;
use crate::domain::model::TipCountRecord;
use crate::utils::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// 以 JSON 檔保存各工具的 tip 用量
#[derive(Debug, Clone)]
pub struct JsonCountStore {
    path: PathBuf,
}

impl JsonCountStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CountStore for JsonCountStore {
    fn load(&self) -> Result<Option<TipCountRecord>> {
        if !self.path.exists() {
            tracing::debug!("No tip count file at {}", self.path.display());
            return Ok(None);
        }
        let data = fs::read(&self.path)?;
        let record = serde_json::from_slice(&data)?;
        Ok(Some(record))
    }

    fn save(&self, record: &TipCountRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(record)?;
        fs::write(&self.path, json)?;
        tracing::debug!("Tip counts written to {}", self.path.display());
        Ok(())
    }
}

/// 不保存任何計數
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCountStore;

impl CountStore for NoopCountStore {
    fn load(&self) -> Result<Option<TipCountRecord>> {
        Ok(None)
    }

    fn save(&self, _record: &TipCountRecord) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_none() {
        let dir = TempDir::new().unwrap();
        let store = JsonCountStore::new(dir.path().join("counts.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonCountStore::new(dir.path().join("state").join("counts.json"));

        let mut record = TipCountRecord {
            updated_at: Some(chrono::Utc::now()),
            ..Default::default()
        };
        record.tools.insert("right".to_string(), 17);
        store.save(&record).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.tools["right"], 17);
        assert_eq!(loaded.updated_at, record.updated_at);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("counts.json");
        fs::write(&path, "not json").unwrap();

        assert!(JsonCountStore::new(path).load().is_err());
    }
}
