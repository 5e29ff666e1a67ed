use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

const ITEM_EXTENSION: &str = "item";
const ENCODED_PREFIX: char = '~';
/// Encoded key plus extension has to fit common 255-byte filename limits.
const MAX_FILE_STEM: usize = 240;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("local storage is unavailable")]
    Unavailable,
    #[error("storage key is too long to store on disk ({len} bytes)")]
    KeyTooLong { len: usize },
    #[error("storage I/O failed for `{key}`: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
}

/// Durable string key/value storage.
///
/// Every key maps to one file below the root directory. Writes land in a
/// temporary file first and are renamed into place, so a reader only ever
/// observes a complete value and the last writer wins.
#[derive(Clone)]
pub struct LocalStore {
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Disk(PathBuf),
    Memory(Arc<RwLock<BTreeMap<String, String>>>),
    Unavailable,
}

impl LocalStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StorageError::Io {
            key: root.display().to_string(),
            source,
        })?;
        Ok(Self {
            backend: Backend::Disk(root),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(RwLock::new(BTreeMap::new()))),
        }
    }

    /// A store whose every operation fails, like browser storage in a
    /// private window.
    pub fn unavailable() -> Self {
        Self {
            backend: Backend::Unavailable,
        }
    }

    pub fn root(&self) -> Option<&Path> {
        match &self.backend {
            Backend::Disk(root) => Some(root),
            _ => None,
        }
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match &self.backend {
            Backend::Disk(root) => match fs::read_to_string(item_path(root, key)?) {
                Ok(value) => Ok(Some(value)),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(source) => Err(io_error(key, source)),
            },
            Backend::Memory(map) => Ok(map.read().get(key).cloned()),
            Backend::Unavailable => Err(StorageError::Unavailable),
        }
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        match &self.backend {
            Backend::Disk(root) => {
                let path = item_path(root, key)?;
                let mut temp_file = NamedTempFile::new_in(root).map_err(|e| io_error(key, e))?;
                temp_file
                    .write_all(value.as_bytes())
                    .map_err(|e| io_error(key, e))?;
                temp_file
                    .persist(path)
                    .map_err(|err| io_error(key, err.error))?;
                Ok(())
            }
            Backend::Memory(map) => {
                map.write().insert(key.to_string(), value.to_string());
                Ok(())
            }
            Backend::Unavailable => Err(StorageError::Unavailable),
        }
    }

    /// Removing a key that does not exist is not an error.
    pub fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        match &self.backend {
            Backend::Disk(root) => match fs::remove_file(item_path(root, key)?) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(source) => Err(io_error(key, source)),
            },
            Backend::Memory(map) => {
                map.write().remove(key);
                Ok(())
            }
            Backend::Unavailable => Err(StorageError::Unavailable),
        }
    }

    pub fn keys(&self) -> Result<Vec<String>, StorageError> {
        match &self.backend {
            Backend::Disk(root) => {
                let entries = fs::read_dir(root).map_err(|e| io_error("*", e))?;
                let mut keys = Vec::new();
                for entry in entries {
                    let path = entry.map_err(|e| io_error("*", e))?.path();
                    if path.extension().and_then(|ext| ext.to_str()) != Some(ITEM_EXTENSION) {
                        continue;
                    }
                    if let Some(key) = path
                        .file_stem()
                        .and_then(|stem| stem.to_str())
                        .and_then(decode_key)
                    {
                        keys.push(key);
                    }
                }
                keys.sort();
                Ok(keys)
            }
            Backend::Memory(map) => Ok(map.read().keys().cloned().collect()),
            Backend::Unavailable => Err(StorageError::Unavailable),
        }
    }
}

fn io_error(key: &str, source: io::Error) -> StorageError {
    StorageError::Io {
        key: key.to_string(),
        source,
    }
}

fn item_path(root: &Path, key: &str) -> Result<PathBuf, StorageError> {
    let stem = encode_key(key);
    if stem.len() > MAX_FILE_STEM {
        return Err(StorageError::KeyTooLong { len: key.len() });
    }
    Ok(root.join(format!("{stem}.{ITEM_EXTENSION}")))
}

fn is_plain_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
fn encode_key(key: &str) -> String {
    if is_plain_key(key) {
        return key.to_string();
    }
    let mut encoded = String::with_capacity(key.len() * 2 + 1);
    encoded.push(ENCODED_PREFIX);
    for byte in key.as_bytes() {
        encoded.push_str(&format!("{byte:02x}"));
    }
    encoded
}

fn decode_key(stem: &str) -> Option<String> {
    let Some(hex) = stem.strip_prefix(ENCODED_PREFIX) else {
        return is_plain_key(stem).then(|| stem.to_string());
    };
    if hex.len() % 2 != 0 {
        return None;
    }
    let bytes = (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}
