//! Drum catalog built from a one-time scan of the drum root.

use crate::error::{OdbError, Result, StorageError};
use crate::storage::store::{BucketStore, MemoryStore};
use std::borrow::Cow;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Entries whose name starts with this are never drums
pub const HIDDEN_MARKER: char = '.';

/// A namespace backed by one directory under the drum root
pub struct Drum {
    name: String,
    path: PathBuf,
    store: Box<dyn BucketStore>,
}

impl Drum {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::with_store(name, path, Box::new(MemoryStore::new()))
    }

    pub fn with_store(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        store: Box<dyn BucketStore>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            store,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store(&self) -> &dyn BucketStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn BucketStore {
        self.store.as_mut()
    }
}

impl fmt::Debug for Drum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Drum")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("buckets", &self.store.len())
            .finish()
    }
}

/// Every drum discovered at startup, in discovery order
#[derive(Debug, Default)]
pub struct Catalog {
    root: PathBuf,
    drums: Vec<Drum>,
    by_name: HashMap<String, usize>,
}

impl Catalog {
    /// Scan the immediate subdirectories of `root`.
    ///
    /// Hidden entries, non-directories and symlinks are skipped. Order follows
    /// directory iteration and is not sorted. A name that is not UTF-8 is
    /// addressed by its lossy form.
    pub fn enumerate<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let mut catalog = Catalog {
            root: root.to_path_buf(),
            ..Default::default()
        };

        for entry in fs::read_dir(root)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();

            if name.starts_with(HIDDEN_MARKER) {
                continue;
            }
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Cow::Owned(lossy) = &name {
                warn!(entry = ?file_name, drum = %lossy, "Drum name is not UTF-8");
            }

            let drum = Drum::new(name.into_owned(), entry.path());
            info!(
                "[ drum {} ] @ {}",
                catalog.drums.len() + 1,
                drum.path().display()
            );
            catalog.insert(drum);
        }

        Ok(catalog)
    }

    /// Enumerate and refuse an empty result
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let catalog = Self::enumerate(&root)?;
        if catalog.is_empty() {
            return Err(OdbError::NoDrums(root.as_ref().to_path_buf()));
        }
        Ok(catalog)
    }

    fn insert(&mut self, drum: Drum) {
        match self.by_name.entry(drum.name.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(self.drums.len());
            }
            Entry::Occupied(_) => {
                warn!(
                    drum = %drum.name,
                    path = %drum.path.display(),
                    "Drum name already taken, not addressable"
                );
            }
        }
        self.drums.push(drum);
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.drums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drums.is_empty()
    }

    pub fn drums(&self) -> impl Iterator<Item = &Drum> {
        self.drums.iter()
    }

    pub fn get(&self, name: &str) -> std::result::Result<&Drum, StorageError> {
        self.by_name
            .get(name)
            .map(|&idx| &self.drums[idx])
            .ok_or_else(|| StorageError::UnknownDrum(name.to_string()))
    }

    pub fn get_mut(&mut self, name: &str) -> std::result::Result<&mut Drum, StorageError> {
        match self.by_name.get(name) {
            Some(&idx) => Ok(&mut self.drums[idx]),
            None => Err(StorageError::UnknownDrum(name.to_string())),
        }
    }

    /// Replay `<drum>/<file>` into every drum that has one
    pub fn load_snapshots(&mut self, file: &str) -> Result<usize> {
        let mut total = 0;
        for drum in &mut self.drums {
            let path = drum.path.join(file);
            if !path.is_file() {
                continue;
            }
            let mut reader = BufReader::new(File::open(&path)?);
            let loaded = drum.store.load_snapshot(&mut reader)?;
            debug!(drum = %drum.name, buckets = loaded, "Loaded snapshot");
            total += loaded;
        }
        Ok(total)
    }

    /// Write every drum's buckets to `<drum>/<file>`
    pub fn flush_snapshots(&self, file: &str) -> Result<usize> {
        let mut total = 0;
        for drum in &self.drums {
            let path = drum.path.join(file);
            let tmp = drum.path.join(format!("{file}.tmp"));
            {
                let mut writer = BufWriter::new(File::create(&tmp)?);
                total += drum.store.write_snapshot(&mut writer)?;
            }
            fs::rename(&tmp, &path)?;
            debug!(drum = %drum.name, path = %path.display(), "Wrote snapshot");
        }
        Ok(total)
    }
}
