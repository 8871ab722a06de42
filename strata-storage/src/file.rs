// Copyright 2026 strata Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    fmt::Debug,
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    marker::PhantomData,
    path::{Path, PathBuf},
};

use hashbrown::HashMap;
use parking_lot::RwLock;
use strata_common::{
    code::{StorageKey, StorageValue},
    error::{Error, ErrorKind, Result},
};
use tempfile::TempDir;

use crate::storage::Storage;

const ENTRY_FILE_PREFIX: &str = "entry-";
const TEMP_FILE_PREFIX: &str = ".tmp-entry-";

type EntryId = u64;

#[derive(Debug)]
struct FileIndex<K> {
    entries: HashMap<K, EntryId>,
    next: EntryId,
}

/// Storage that keeps every entry in its own file under a directory.
///
/// Each file holds a `bincode` encoded `(key, value)` pair. Writes go to a temporary sibling file that
/// is renamed into place, so an entry file is either the old entry or the new one.
///
/// The directory is scanned on [`FileStorage::open`] and entries left by a previous instance are
/// recovered.
pub struct FileStorage<K, V>
where
    K: StorageKey,
    V: StorageValue,
{
    dir: PathBuf,
    index: RwLock<FileIndex<K>>,
    /// Keeps the directory alive for storages created by [`FileStorage::temp`].
    _temp: Option<TempDir>,
    _marker: PhantomData<V>,
}

impl<K, V> Debug for FileStorage<K, V>
where
    K: StorageKey,
    V: StorageValue,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStorage")
            .field("dir", &self.dir)
            .field("len", &self.len())
            .finish()
    }
}

impl<K, V> FileStorage<K, V>
where
    K: StorageKey,
    V: StorageValue,
{
    /// Create a storage in a private temporary directory that is deleted when the storage is dropped.
    pub fn temp() -> Result<Self> {
        let temp = tempfile::Builder::new().prefix("strata-").tempdir()?;
        let dir = temp.path().to_path_buf();
        tracing::info!("[file storage]: created temporary storage at {dir:?}");
        Ok(Self {
            dir,
            index: RwLock::new(FileIndex {
                entries: HashMap::new(),
                next: 0,
            }),
            _temp: Some(temp),
            _marker: PhantomData,
        })
    }

    /// Open a storage in `dir`, creating the directory if it does not exist.
    ///
    /// Entries written by a previous storage in the same directory are recovered. Entry files that fail
    /// to decode are skipped and left on disk.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if dir.exists() && !dir.is_dir() {
            return Err(
                Error::invalid_argument("storage path is not a directory").with_context("path", dir.display()),
            );
        }
        fs::create_dir_all(&dir).map_err(|e| Error::from(e).with_context("path", dir.display()))?;

        let index = Self::recover(&dir)?;
        tracing::info!(
            "[file storage]: opened storage at {dir:?}, recovered {} entries",
            index.entries.len()
        );

        Ok(Self {
            dir,
            index: RwLock::new(index),
            _temp: None,
            _marker: PhantomData,
        })
    }

    /// Directory that holds the entry files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn recover(dir: &Path) -> Result<FileIndex<K>> {
        let mut index = FileIndex {
            entries: HashMap::new(),
            next: 0,
        };

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();

            if name.starts_with(TEMP_FILE_PREFIX) {
                // Leftover of an interrupted write.
                fs::remove_file(entry.path())?;
                continue;
            }
            let Some(id) = name
                .strip_prefix(ENTRY_FILE_PREFIX)
                .and_then(|id| EntryId::from_str_radix(id, 16).ok())
            else {
                continue;
            };
            let Some(next) = id.checked_add(1) else {
                tracing::warn!("[file storage]: skip entry file {:?} with the largest id", entry.path());
                continue;
            };
            index.next = index.next.max(next);

            let key = match Self::read_entry(&entry.path()) {
                Ok((key, _)) => key,
                Err(e) => {
                    tracing::warn!("[file storage]: skip undecodable entry file {:?}: {e}", entry.path());
                    continue;
                }
            };

            match index.entries.get(&key).copied() {
                // Keep the newer file of a duplicated key.
                Some(old) if old > id => fs::remove_file(entry.path())?,
                Some(old) => {
                    fs::remove_file(Self::entry_path(dir, old))?;
                    index.entries.insert(key, id);
                }
                None => {
                    index.entries.insert(key, id);
                }
            }
        }

        Ok(index)
    }

    fn entry_path(dir: &Path, id: EntryId) -> PathBuf {
        dir.join(format!("{ENTRY_FILE_PREFIX}{id:016x}"))
    }

    fn read_entry(path: &Path) -> Result<(K, V)> {
        let file = File::open(path).map_err(|e| Error::from(e).with_context("path", path.display()))?;
        let entry = bincode::deserialize_from(BufReader::new(file))
            .map_err(|e| Error::from(e).with_context("path", path.display()))?;
        Ok(entry)
    }

    fn write_entry(&self, id: EntryId, key: &K, value: &V) -> Result<()> {
        let path = Self::entry_path(&self.dir, id);
        let temp = self.dir.join(format!("{TEMP_FILE_PREFIX}{id:016x}"));

        let res = (|| -> Result<()> {
            {
                let mut writer = BufWriter::new(File::create(&temp)?);
                bincode::serialize_into(&mut writer, &(key, value))?;
                writer.flush()?;
            }
            fs::rename(&temp, &path)?;
            Ok(())
        })();

        if let Err(e) = res {
            let _ = fs::remove_file(&temp);
            return Err(e.with_context("path", path.display()));
        }
        Ok(())
    }
}

impl<K, V> Storage<K, V> for FileStorage<K, V>
where
    K: StorageKey,
    V: StorageValue,
{
    fn put(&self, key: K, value: V) -> Result<Option<V>> {
        let mut index = self.index.write();

        match index.entries.get(&key).copied() {
            Some(id) => {
                let (_, old) = Self::read_entry(&Self::entry_path(&self.dir, id))?;
                self.write_entry(id, &key, &value)?;
                Ok(Some(old))
            }
            None => {
                let id = index.next;
                let next = id
                    .checked_add(1)
                    .ok_or_else(|| Error::new(ErrorKind::OutOfRange, "entry file ids exhausted"))?;
                self.write_entry(id, &key, &value)?;
                index.next = next;
                index.entries.insert(key, id);
                Ok(None)
            }
        }
    }

    fn get(&self, key: &K) -> Result<Option<V>> {
        let index = self.index.read();
        let Some(id) = index.entries.get(key).copied() else {
            return Ok(None);
        };
        let (_, value) = Self::read_entry(&Self::entry_path(&self.dir, id))?;
        Ok(Some(value))
    }

    fn contains(&self, key: &K) -> bool {
        self.index.read().entries.contains_key(key)
    }

    fn remove(&self, key: &K) -> Result<Option<V>> {
        let mut index = self.index.write();
        let Some(id) = index.entries.get(key).copied() else {
            return Ok(None);
        };
        let path = Self::entry_path(&self.dir, id);
        let (_, value) = Self::read_entry(&path)?;
        fs::remove_file(&path).map_err(|e| Error::from(e).with_context("path", path.display()))?;
        index.entries.remove(key);
        Ok(Some(value))
    }

    fn clear(&self) -> Result<()> {
        let mut index = self.index.write();
        let ids = index.entries.values().copied().collect::<Vec<_>>();
        for id in ids {
            let path = Self::entry_path(&self.dir, id);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::from(e).with_context("path", path.display())),
            }
            index.entries.retain(|_, v| *v != id);
        }
        Ok(())
    }

    fn keys(&self) -> Vec<K> {
        self.index.read().entries.keys().cloned().collect()
    }

    fn len(&self) -> usize {
        self.index.read().entries.len()
    }
}
