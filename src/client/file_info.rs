//! Filesystem-style view of a stored key

use std::borrow::Cow;
use std::time::SystemTime;

use crate::item::{Item, Stat};

/// Permission bits reported for every key: read-only for everyone
pub const READ_ONLY_MODE: u32 = 0o444;

/// A key presented as a read-only regular file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    name: Vec<u8>,
    stat: Stat,
}

impl FileInfo {
    pub fn new(name: impl Into<Vec<u8>>, stat: Stat) -> Self {
        Self {
            name: name.into(),
            stat,
        }
    }

    /// Key as text; invalid UTF-8 is replaced
    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    pub fn name_bytes(&self) -> &[u8] {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.stat.size
    }

    pub fn mode(&self) -> u32 {
        READ_ONLY_MODE
    }

    /// Last-used time of the key
    pub fn mod_time(&self) -> SystemTime {
        self.stat.last_used()
    }

    pub fn is_dir(&self) -> bool {
        false
    }

    pub fn stat(&self) -> &Stat {
        &self.stat
    }
}

impl From<Item> for FileInfo {
    fn from(item: Item) -> Self {
        Self::new(item.key, item.stat)
    }
}
