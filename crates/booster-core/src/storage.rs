// ─────────────────────────────────────────────────────────────────────
// Spinfoam Boosters — Booster Cache Storage
// ─────────────────────────────────────────────────────────────────────
//! Persistent storage backends for computed booster tensors.
//!
//! The disk backend names every entry deterministically from its key
//! and the Immirzi parameter, and publishes files atomically: a tensor
//! is written to a temporary file in the same directory and renamed
//! into place, so a half-written entry is never observable under its
//! final name. Entries are never modified or deleted once published.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use booster_types::{BoosterConfig, BoosterError, BoosterKey, BoosterResult};

use crate::tensor::BoosterTensor;

/// Tag written at the head of every stored tensor.
const TENSOR_TAG: [u8; 4] = *b"B4T6";

/// Trait for booster cache backends.
pub trait BoosterStorage: Send + Sync {
    /// True if a complete tensor is stored under `key`.
    fn contains(&self, key: &BoosterKey) -> bool;

    fn load(&self, key: &BoosterKey) -> BoosterResult<BoosterTensor>;

    /// Publish `tensor` under `key`. An existing entry is kept as is.
    fn save(&self, key: &BoosterKey, tensor: &BoosterTensor) -> BoosterResult<()>;
}

/// On-disk layout: tag, six axis extents, then the packed entries.
#[derive(Serialize)]
struct StoredTensorRef<'a> {
    tag: [u8; 4],
    dims: [u64; 6],
    data: &'a [f64],
}

#[derive(Deserialize)]
struct StoredTensor {
    tag: [u8; 4],
    dims: [u64; 6],
    data: Vec<f64>,
}

fn serde_error(path: &Path, err: impl ToString) -> BoosterError {
    BoosterError::Storage(format!(
        "malformed booster tensor {}: {}",
        path.display(),
        err.to_string()
    ))
}

/// Write `tensor` to `path` through a temporary sibling file.
pub fn write_tensor(path: &Path, tensor: &BoosterTensor) -> BoosterResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".b4-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| BoosterError::io(dir, e))?;
    let tmp_path = tmp.path().to_path_buf();

    let stored = StoredTensorRef {
        tag: TENSOR_TAG,
        dims: tensor.dims().map(|d| d as u64),
        data: tensor.data(),
    };
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        bincode::serialize_into(&mut writer, &stored).map_err(|e| serde_error(path, e))?;
        writer.flush().map_err(|e| BoosterError::io(&tmp_path, e))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| BoosterError::io(&tmp_path, e))?;

    tmp.persist(path)
        .map_err(|e| BoosterError::io(path, e.error))?;
    Ok(())
}

/// Read a tensor written by [`write_tensor`].
pub fn read_tensor(path: &Path) -> BoosterResult<BoosterTensor> {
    let file = File::open(path).map_err(|e| BoosterError::io(path, e))?;
    let stored: StoredTensor =
        bincode::deserialize_from(BufReader::new(file)).map_err(|e| serde_error(path, e))?;
    if stored.tag != TENSOR_TAG {
        return Err(serde_error(path, "unknown tensor tag"));
    }
    let dims = stored.dims.map(|d| d as usize);
    BoosterTensor::from_parts(dims, stored.data).map_err(|e| serde_error(path, e))
}

/// Filesystem-backed booster cache.
pub struct DiskStorage {
    dir: PathBuf,
    immirzi: f64,
}

impl DiskStorage {
    /// Open (creating if needed) the boosters directory of `config`.
    pub fn open(config: &BoosterConfig) -> BoosterResult<Self> {
        let dir = config.boosters_dir();
        std::fs::create_dir_all(&dir).map_err(|e| BoosterError::io(&dir, e))?;
        if !dir.is_dir() {
            return Err(BoosterError::Storage(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
        Ok(Self {
            dir,
            immirzi: config.immirzi,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache filename for `key`, e.g.
    /// `b4__2-2-2-2__gf-1__imm-0.123__dl-3.b4t`.
    pub fn file_name(&self, key: &BoosterKey) -> String {
        let [ja, jb, jc, jd] = key.two_js;
        format!(
            "b4__{ja}-{jb}-{jc}-{jd}__gf-{}__imm-{:.3}__dl-{}.b4t",
            key.gauge.index(),
            self.immirzi,
            key.dl
        )
    }

    pub fn path(&self, key: &BoosterKey) -> PathBuf {
        self.dir.join(self.file_name(key))
    }
}

impl BoosterStorage for DiskStorage {
    fn contains(&self, key: &BoosterKey) -> bool {
        self.path(key).is_file()
    }

    fn load(&self, key: &BoosterKey) -> BoosterResult<BoosterTensor> {
        read_tensor(&self.path(key))
    }

    fn save(&self, key: &BoosterKey, tensor: &BoosterTensor) -> BoosterResult<()> {
        let path = self.path(key);
        if path.is_file() {
            log::debug!("{key} already stored at {}, keeping it", path.display());
            return Ok(());
        }
        write_tensor(&path, tensor)?;
        log::info!("stored {key} at {}", path.display());
        Ok(())
    }
}

/// In-memory booster cache for tests and single-run jobs.
#[derive(Default)]
pub struct InMemoryStorage {
    entries: Mutex<HashMap<BoosterKey, BoosterTensor>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl BoosterStorage for InMemoryStorage {
    fn contains(&self, key: &BoosterKey) -> bool {
        self.entries.lock().contains_key(key)
    }

    fn load(&self, key: &BoosterKey) -> BoosterResult<BoosterTensor> {
        self.entries
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| BoosterError::Storage(format!("no stored tensor for {key}")))
    }

    fn save(&self, key: &BoosterKey, tensor: &BoosterTensor) -> BoosterResult<()> {
        self.entries
            .lock()
            .entry(*key)
            .or_insert_with(|| tensor.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BoosterTensor {
        BoosterTensor::from_parts([3, 2, 1, 2, 1, 1], (0..12).map(|v| v as f64 * 0.5).collect())
            .unwrap()
    }

    fn disk(root: &Path, immirzi: f64) -> DiskStorage {
        let cfg = BoosterConfig {
            immirzi,
            ..BoosterConfig::with_root(root)
        };
        DiskStorage::open(&cfg).unwrap()
    }

    #[test]
    fn test_file_name_format() {
        let root = tempfile::tempdir().unwrap();
        let store = disk(root.path(), 0.123);
        let key = BoosterKey::from_raw(2, [1, 3, 4, 2], 7).unwrap();
        assert_eq!(store.file_name(&key), "b4__1-3-4-2__gf-2__imm-0.123__dl-7.b4t");
        assert_eq!(store.dir(), root.path().join("boosters"));
    }

    #[test]
    fn test_disk_save_then_load() {
        let root = tempfile::tempdir().unwrap();
        let store = disk(root.path(), 1.0);
        let key = BoosterKey::from_raw(1, [2, 2, 2, 2], 0).unwrap();
        assert!(!store.contains(&key));
        store.save(&key, &sample()).unwrap();
        assert!(store.contains(&key));
        assert_eq!(store.load(&key).unwrap(), sample());
    }

    #[test]
    fn test_no_temp_files_left() {
        let root = tempfile::tempdir().unwrap();
        let store = disk(root.path(), 1.0);
        let key = BoosterKey::from_raw(4, [2, 2, 2, 2], 1).unwrap();
        store.save(&key, &sample()).unwrap();
        let names: Vec<String> = std::fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![store.file_name(&key)]);
    }

    #[test]
    fn test_immirzi_separates_entries() {
        let root = tempfile::tempdir().unwrap();
        let a = disk(root.path(), 1.0);
        let b = disk(root.path(), 0.5);
        let key = BoosterKey::from_raw(1, [2, 2, 2, 2], 0).unwrap();
        a.save(&key, &sample()).unwrap();
        assert!(a.contains(&key));
        assert!(!b.contains(&key));
    }

    #[test]
    fn test_corrupt_entry_is_storage_error() {
        let root = tempfile::tempdir().unwrap();
        let store = disk(root.path(), 1.0);
        let key = BoosterKey::from_raw(1, [2, 2, 2, 2], 0).unwrap();
        std::fs::write(store.path(&key), b"not a tensor").unwrap();
        assert!(matches!(store.load(&key), Err(BoosterError::Storage(_))));
    }

    #[test]
    fn test_missing_entry_is_io_error() {
        let root = tempfile::tempdir().unwrap();
        let store = disk(root.path(), 1.0);
        let key = BoosterKey::from_raw(1, [2, 2, 2, 2], 3).unwrap();
        assert!(matches!(store.load(&key), Err(BoosterError::Io { .. })));
    }

    #[test]
    fn test_unwritable_root_fails() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let cfg = BoosterConfig::with_root(&blocker);
        assert!(DiskStorage::open(&cfg).is_err());
    }

    #[test]
    fn test_disk_entries_published_once() {
        let root = tempfile::tempdir().unwrap();
        let store = disk(root.path(), 1.0);
        let key = BoosterKey::from_raw(2, [2, 2, 2, 2], 0).unwrap();
        store.save(&key, &sample()).unwrap();
        let other = BoosterTensor::zeros(sample().dims());
        store.save(&key, &other).unwrap();
        assert_eq!(store.load(&key).unwrap(), sample());
    }

    #[test]
    fn test_in_memory_entries_published_once() {
        let store = InMemoryStorage::new();
        let key = BoosterKey::from_raw(2, [2, 2, 2, 2], 0).unwrap();
        store.save(&key, &sample()).unwrap();
        store
            .save(&key, &BoosterTensor::zeros(sample().dims()))
            .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.load(&key).unwrap(), sample());
    }

    #[test]
    fn test_in_memory_storage() {
        let store = InMemoryStorage::new();
        let key = BoosterKey::from_raw(3, [1, 1, 2, 2], 2).unwrap();
        assert!(store.is_empty());
        assert!(store.load(&key).is_err());
        store.save(&key, &sample()).unwrap();
        assert!(store.contains(&key));
        assert_eq!(store.len(), 1);
        assert_eq!(store.load(&key).unwrap(), sample());
    }
}
