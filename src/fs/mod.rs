//! Filesystem view over the media manager.
//!
//! [`Filesystem`] is the contract a host drives; [`MediaFs`] implements it on
//! top of the directory cache and the media client.

pub mod media_fs;
pub mod object;
pub mod path_utils;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

pub use media_fs::{MediaFs, RootKind};
pub use object::Object;

/// How precisely modification times can be stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// Times are reported but can't be set
    NotSupported,
    Exact(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashType {
    Md5,
    Sha1,
    Sha256,
}

/// Optional capabilities advertised to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Features {
    pub can_have_empty_directories: bool,
    pub can_set_mod_time: bool,
    pub can_move: bool,
    pub can_dir_move: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            can_have_empty_directories: true,
            can_set_mod_time: false,
            can_move: true,
            can_dir_move: true,
        }
    }
}

/// A directory in a listing
#[derive(Debug, Clone, PartialEq)]
pub struct Directory {
    pub remote: String,
    pub id: String,
    pub mod_time: DateTime<Utc>,
}

impl Directory {
    pub fn name(&self) -> &str {
        path_utils::split_path(&self.remote).1
    }
}

/// One listing entry
#[derive(Clone)]
pub enum DirEntry {
    Object(Object),
    Dir(Directory),
}

impl DirEntry {
    /// Path relative to the filesystem root
    pub fn remote(&self) -> &str {
        match self {
            DirEntry::Object(object) => object.remote(),
            DirEntry::Dir(dir) => &dir.remote,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DirEntry::Object(object) => object.name(),
            DirEntry::Dir(dir) => dir.name(),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, DirEntry::Dir(_))
    }

    pub fn size(&self) -> u64 {
        match self {
            DirEntry::Object(object) => object.size(),
            DirEntry::Dir(_) => 0,
        }
    }
}

impl std::fmt::Debug for DirEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirEntry::Object(object) => write!(f, "Object({})", object.remote()),
            DirEntry::Dir(dir) => write!(f, "Dir({})", dir.remote),
        }
    }
}

/// Operations a host performs on a filesystem. Paths are relative to the root.
#[async_trait]
pub trait Filesystem: Send + Sync {
    fn name(&self) -> &str;

    fn root(&self) -> &str;

    fn precision(&self) -> Precision;

    fn hashes(&self) -> Vec<HashType>;

    fn features(&self) -> &Features;

    async fn list(&self, dir: &str) -> Result<Vec<DirEntry>>;

    async fn new_object(&self, remote: &str) -> Result<Object>;

    async fn put(&self, remote: &str, content: &[u8], size_hint: Option<u64>) -> Result<Object>;

    async fn delete(&self, remote: &str) -> Result<()>;

    async fn mkdir(&self, dir: &str) -> Result<()>;

    async fn rmdir(&self, dir: &str) -> Result<()>;

    /// Move an object. `object` reflects the new location even when an error
    /// is returned.
    async fn move_object(&self, object: &mut Object, remote: &str) -> Result<()>;

    async fn dir_move(&self, src: &str, dst: &str) -> Result<()>;
}
