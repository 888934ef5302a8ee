//! Saves and loads the index and metadata artifacts as a matched pair.
//!
//! Both artifacts are written to temporary siblings and fsynced before
//! either is renamed into place. `metadata.json` is renamed first and
//! `index.bin` last, so the index rename is the commit point. A crash
//! between the two renames leaves the metadata exactly one save ahead of
//! the index, which [`PersistenceManager::load`] detects and rolls back.

use crate::error::{BudgetIndexError, Result};
use crate::flat_index::FlatIndex;
use crate::persistence::serialization::{self, IndexArtifact};
use crate::storage::VectorStore;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of the index artifact under the storage root.
pub const INDEX_FILE: &str = "index.bin";
/// File name of the metadata artifact under the storage root.
pub const METADATA_FILE: &str = "metadata.json";

/// Reads and writes the persisted [`VectorStore`] under a storage root.
#[derive(Debug, Clone)]
pub struct PersistenceManager {
    root: PathBuf,
}

impl PersistenceManager {
    /// Create a manager for the given storage root. Nothing is touched on disk.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    /// Persist the whole store, replacing both artifacts.
    pub fn save(&self, store: &VectorStore) -> Result<()> {
        fs::create_dir_all(&self.root)?;

        let metadata_bytes = serialization::encode_metadata(store.metadata())?;
        let metadata_crc = crc32fast::hash(&metadata_bytes);
        let index_bytes = serialization::encode_index(store.index(), metadata_crc)?;

        let metadata_tmp = write_temp(&self.metadata_path(), &metadata_bytes)?;
        let index_tmp = write_temp(&self.index_path(), &index_bytes)?;

        fs::rename(&metadata_tmp, self.metadata_path())?;
        fs::rename(&index_tmp, self.index_path())?;

        debug!(
            entries = store.len(),
            index_bytes = index_bytes.len(),
            metadata_bytes = metadata_bytes.len(),
            "saved store to {}",
            self.root.display()
        );
        Ok(())
    }

    /// Load the persisted store, or an empty one if nothing was saved yet.
    ///
    /// `dimension` is the expected vector width; a persisted index of a
    /// different width is an error.
    pub fn load(&self, dimension: usize) -> Result<VectorStore> {
        let index_path = self.index_path();
        let metadata_path = self.metadata_path();

        match (index_path.exists(), metadata_path.exists()) {
            (false, false) => {
                info!("no persisted index under {}, starting empty", self.root.display());
                return Ok(VectorStore::new(dimension));
            }
            (true, false) | (false, true) => {
                return Err(BudgetIndexError::StorageError(format!(
                    "{} and {} must both exist or both be absent",
                    index_path.display(),
                    metadata_path.display()
                )));
            }
            (true, true) => {}
        }

        let artifact = serialization::decode_index(&fs::read(&index_path)?)?;
        if artifact.dimension != dimension {
            return Err(BudgetIndexError::StorageError(format!(
                "persisted index has dimension {}, configured dimension is {}",
                artifact.dimension, dimension
            )));
        }
        let IndexArtifact {
            dimension,
            count,
            metadata_crc,
            vectors,
            ..
        } = artifact;
        let index = FlatIndex::from_raw(dimension, vectors)?;
        if index.len() != count {
            return Err(BudgetIndexError::StorageError(format!(
                "index artifact declares {} vectors but holds {}",
                count,
                index.len()
            )));
        }

        let metadata_bytes = fs::read(&metadata_path)?;
        let mut metadata = serialization::decode_metadata(&metadata_bytes)?;

        let matches = crc32fast::hash(&metadata_bytes) == metadata_crc;
        if !(matches && metadata.len() == count) {
            if metadata.len() <= count {
                return Err(BudgetIndexError::Inconsistent {
                    index_len: count,
                    metadata_len: metadata.len(),
                });
            }

            // Metadata committed without its index: roll it back to the
            // prefix the index was saved with.
            let ahead = metadata.len();
            metadata.truncate(count);
            let rolled_back = serialization::encode_metadata(&metadata)?;
            if crc32fast::hash(&rolled_back) != metadata_crc {
                return Err(BudgetIndexError::Inconsistent {
                    index_len: count,
                    metadata_len: ahead,
                });
            }
            warn!(
                index_len = count,
                metadata_len = ahead,
                "metadata ahead of index after interrupted save, rolling back"
            );
            let tmp = write_temp(&metadata_path, &rolled_back)?;
            fs::rename(&tmp, &metadata_path)?;
        }

        let store = VectorStore::from_parts(index, metadata)?;
        info!(
            entries = store.len(),
            dimension = store.dimension(),
            "loaded index from {}",
            self.root.display()
        );
        Ok(store)
    }
}

/// Write `bytes` to a `.tmp` sibling of `path` and fsync it.
fn write_temp(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(tmp)
}
