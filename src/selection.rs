use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

const FILE_NAME: &str = "selected_employee.json";

/// The employee picked on the list page, handed to the detail page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedEmployee {
    pub employee_id: String,
    pub full_name: String,
}

pub struct SelectionStore {
    path: PathBuf,
}

impl SelectionStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(FILE_NAME),
        }
    }

    pub fn store(&self, selected: &SelectedEmployee) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let body = serde_json::to_string_pretty(selected)?;
        std::fs::write(&self.path, body)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }

    pub fn load(&self) -> anyhow::Result<Option<SelectedEmployee>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let body = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let selected = serde_json::from_str(&body)
            .with_context(|| format!("{} is not a valid selection", self.path.display()))?;
        Ok(Some(selected))
    }

    /// Unconditional; a missing file is not an error.
    pub fn clear(&self) -> anyhow::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("failed to clear {}", self.path.display()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bankperf-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn store_then_load_then_clear() {
        let dir = scratch_dir("selection");
        let store = SelectionStore::new(&dir);
        assert_eq!(store.load().unwrap(), None);

        let selected = SelectedEmployee {
            employee_id: "e-7".into(),
            full_name: "Dana Cho".into(),
        };
        store.store(&selected).unwrap();
        assert_eq!(store.load().unwrap(), Some(selected));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        store.clear().unwrap();

        let _ = std::fs::remove_dir_all(&dir);
    }
}
