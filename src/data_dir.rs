use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const DATA_DIR_ENV_VAR: &str = "CLAUSESEEK_DATA_DIR";

const APP_NAME: &str = "clauseseek";
const CONFIG_DB_FILE: &str = "config.redb";
const INDICES_DB_FILE: &str = "indices.redb";

/// Where clauseseek keeps its two redb stores.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Pick the directory (`--data-dir`, then `CLAUSESEEK_DATA_DIR`, then
    /// `$XDG_DATA_HOME/clauseseek`) and make sure it exists.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var_os(DATA_DIR_ENV_VAR)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let root = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(root) => root,
            None => xdg_data_home()?,
        };

        if let Err(e) = std::fs::create_dir_all(&root) {
            tracing::debug!(path = %root.display(), "cannot create data dir: {e}");
            return Err(Error::DataDir(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stored document text, metadata and embedder settings.
    pub fn config_db(&self) -> PathBuf {
        self.root.join(CONFIG_DB_FILE)
    }

    /// Encoded per-document indices and build markers.
    pub fn indices_db(&self) -> PathBuf {
        self.root.join(INDICES_DB_FILE)
    }
}

fn xdg_data_home() -> Result<PathBuf> {
    xdg::BaseDirectories::with_prefix(APP_NAME)
        .get_data_home()
        .ok_or_else(|| {
            Error::Config("no XDG data home; pass --data-dir".to_string())
        })
}
