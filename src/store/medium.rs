//! Storage Medium Module
//!
//! The persistence surface consumed by the second cache tier: a flat,
//! namespace-agnostic text key/value area with enumerable names. Media may
//! refuse writes (full disk, quota); readers treat unreadable items as
//! absent.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

// == Storage Medium Trait ==
/// A slow, origin-local text key/value area.
///
/// All operations are synchronous and infallible except `set_item`, which
/// surfaces write failures so the tier above can reclaim space.
pub trait StorageMedium: Send + Sync {
    /// Returns the stored text for `name`, or None if absent or unreadable.
    fn get_item(&self, name: &str) -> Option<String>;

    /// Stores `contents` under `name`, overwriting any previous value.
    fn set_item(&self, name: &str, contents: &str) -> io::Result<()>;

    /// Removes the item, if present.
    fn remove_item(&self, name: &str);

    /// Lists every stored item name.
    fn item_names(&self) -> Vec<String>;
}

impl<M: StorageMedium + ?Sized> StorageMedium for Arc<M> {
    fn get_item(&self, name: &str) -> Option<String> {
        (**self).get_item(name)
    }

    fn set_item(&self, name: &str, contents: &str) -> io::Result<()> {
        (**self).set_item(name, contents)
    }

    fn remove_item(&self, name: &str) {
        (**self).remove_item(name)
    }

    fn item_names(&self) -> Vec<String> {
        (**self).item_names()
    }
}

// == Directory Medium ==
/// Disk-backed medium storing one file per item under a single directory.
///
/// Item names are hex-encoded into file names so arbitrary cache keys
/// (slashes, colons, unicode) stay filesystem-safe and collision-free.
#[derive(Debug)]
pub struct DirMedium {
    root: PathBuf,
}

impl DirMedium {
    /// Opens a directory medium rooted at `root`, creating the directory
    /// if needed. Fails only if the directory cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(encode_name(name))
    }
}

impl StorageMedium for DirMedium {
    fn get_item(&self, name: &str) -> Option<String> {
        std::fs::read_to_string(self.path_for(name)).ok()
    }

    fn set_item(&self, name: &str, contents: &str) -> io::Result<()> {
        std::fs::write(self.path_for(name), contents)
    }

    fn remove_item(&self, name: &str) {
        let _ = std::fs::remove_file(self.path_for(name));
    }

    fn item_names(&self) -> Vec<String> {
        let Ok(dir) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };
        dir.filter_map(|entry| entry.ok())
            .filter_map(|entry| decode_name(&entry.file_name().to_string_lossy()))
            .collect()
    }
}

// == Memory Medium ==
/// In-memory medium with an optional byte quota.
///
/// Used in headless contexts that still want a second tier, and in tests
/// that need to provoke quota failures deterministically.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    items: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a medium that rejects writes once the total stored bytes
    /// would exceed `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StorageMedium for MemoryMedium {
    fn get_item(&self, name: &str) -> Option<String> {
        self.lock().get(name).cloned()
    }

    fn set_item(&self, name: &str, contents: &str) -> io::Result<()> {
        let mut items = self.lock();
        if let Some(quota) = self.quota_bytes {
            let used: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != name)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + name.len() + contents.len() > quota {
                return Err(io::Error::new(
                    io::ErrorKind::StorageFull,
                    "medium quota exceeded",
                ));
            }
        }
        items.insert(name.to_string(), contents.to_string());
        Ok(())
    }

    fn remove_item(&self, name: &str) {
        self.lock().remove(name);
    }

    fn item_names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}

// == Name Encoding ==
fn encode_name(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len() * 2);
    for byte in name.bytes() {
        encoded.push_str(&format!("{byte:02x}"));
    }
    encoded
}

fn decode_name(encoded: &str) -> Option<String> {
    if encoded.len() % 2 != 0 {
        return None;
    }
    let bytes: Option<Vec<u8>> = (0..encoded.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&encoded[i..i + 2], 16).ok())
        .collect();
    String::from_utf8(bytes?).ok()
}
