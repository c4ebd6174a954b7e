use std::{
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::{
    codec::{decode_index, encode_index},
    document::DocumentIndex,
    error::{Error, Result},
};

const INDICES: TableDefinition<&str, &[u8]> = TableDefinition::new("indices");

/// Document names with a build in progress, mapped to its start time
/// (seconds since the epoch).
const BUILDS: TableDefinition<&str, u64> = TableDefinition::new("builds");

/// Stores encoded [`DocumentIndex`] records keyed by document name.
///
/// Stored indices are replaced whole, never edited in place.
pub struct IndexDb {
    db: Database,
}

impl IndexDb {
    /// Open or create an index database at the given path.
    ///
    /// # Examples
    ///
    /// ```
    /// # let tmp = tempfile::tempdir().unwrap();
    /// use clauseseek::IndexDb;
    ///
    /// let db = IndexDb::open(&tmp.path().join("indices.redb")).unwrap();
    /// assert!(db.list_names().unwrap().is_empty());
    /// ```
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        txn.open_table(INDICES)?;
        txn.open_table(BUILDS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    /// Store (or replace) the index of a document.
    pub fn store(&self, name: &str, index: &DocumentIndex) -> Result<()> {
        let bytes = encode_index(index);
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(INDICES)?;
            table.insert(name, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Load the index of a document, or `None` if it was never stored.
    pub fn load(&self, name: &str) -> Result<Option<DocumentIndex>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(INDICES)?;

        let Some(guard) = table.get(name)? else {
            return Ok(None);
        };
        decode_index(guard.value()).map(Some)
    }

    /// Remove the index and any build marker of a document.
    pub fn remove(&self, name: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut indices = txn.open_table(INDICES)?;
            let mut builds = txn.open_table(BUILDS)?;
            builds.remove(name)?;
            indices.remove(name)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }

    /// Names of all stored indices, sorted.
    pub fn list_names(&self) -> Result<Vec<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(INDICES)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, _) = entry?;
            result.push(k.value().to_string());
        }
        Ok(result)
    }

    /// Claim the right to build `name`.
    ///
    /// Fails with [`Error::BuildInProgress`] while another claim is held.
    /// The claim is released when the guard is finished or dropped.
    pub fn begin_build(&self, name: &str) -> Result<BuildGuard<'_>> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(BUILDS)?;
            if table.get(name)?.is_some() {
                return Err(Error::BuildInProgress(name.to_string()));
            }
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_secs());
            table.insert(name, now)?;
        }
        txn.commit()?;

        Ok(BuildGuard {
            db: self,
            name: name.to_string(),
            finished: false,
        })
    }

    /// Drop a stale build marker, e.g. one left behind by a killed process.
    pub fn clear_build(&self, name: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let cleared = {
            let mut table = txn.open_table(BUILDS)?;
            table.remove(name)?.is_some()
        };
        txn.commit()?;
        Ok(cleared)
    }

    /// Documents with a build marker, with the marker's start time.
    pub fn builds_in_progress(&self) -> Result<Vec<(String, u64)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(BUILDS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            result.push((k.value().to_string(), v.value()));
        }
        Ok(result)
    }
}

impl std::fmt::Debug for IndexDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexDb").finish_non_exhaustive()
    }
}

/// An exclusive claim on building one document's index.
pub struct BuildGuard<'a> {
    db: &'a IndexDb,
    name: String,
    finished: bool,
}

impl BuildGuard<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store the finished index and release the claim in one transaction.
    pub fn finish(mut self, index: &DocumentIndex) -> Result<()> {
        let bytes = encode_index(index);
        let txn = self.db.db.begin_write()?;
        {
            let mut indices = txn.open_table(INDICES)?;
            indices.insert(self.name.as_str(), bytes.as_slice())?;
            let mut builds = txn.open_table(BUILDS)?;
            builds.remove(self.name.as_str())?;
        }
        txn.commit()?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.db.clear_build(&self.name) {
            tracing::warn!(document = %self.name, "failed to release build claim: {e}");
        }
    }
}
