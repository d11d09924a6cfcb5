//! Directory cache: resolves slash separated paths to folder ids.
//!
//! Entries are filled lazily as paths are resolved, created or listed, and
//! live as long as the cache. Moving a directory must flush it with
//! [`DirCache::flush_dir`] so that no entry below the old path survives.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use tokio::sync::RwLock;

use crate::error::{MediaFsError, Result};
use crate::fs::path_utils::{is_within, normalize, split_path};
use crate::shopware_service::shopware_models::ParentId;

/// Remote lookups the cache needs to resolve one path segment
#[async_trait]
pub trait LeafResolver: Send + Sync {
    /// Id of the folder `leaf` directly below `parent`, if any
    async fn find_leaf(&self, parent: &ParentId, leaf: &str) -> Result<Option<String>>;

    /// Create folder `leaf` below `parent` and return its id
    async fn create_dir(&self, parent: &ParentId, leaf: &str) -> Result<String>;
}

/// Where a directory move goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirMoveTarget {
    pub src_id: String,
    pub dst_parent: ParentId,
    pub dst_leaf: String,
}

pub struct DirCache {
    resolver: Arc<dyn LeafResolver>,
    cache: RwLock<HashMap<String, String>>,
}

impl DirCache {
    pub fn new(resolver: Arc<dyn LeafResolver>) -> Self {
        Self {
            resolver,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Cached id for `path`; the root is always known
    pub async fn get(&self, path: &str) -> Option<ParentId> {
        let path = normalize(path);
        if path.is_empty() {
            return Some(ParentId::Root);
        }
        self.cache.read().await.get(&path).cloned().map(ParentId::Id)
    }

    pub async fn put(&self, path: &str, id: &str) {
        let path = normalize(path);
        if path.is_empty() {
            return;
        }
        debug!("Caching {} -> {}", path, id);
        self.cache.write().await.insert(path, id.to_string());
    }

    /// Remove `path` and everything below it
    pub async fn flush_dir(&self, path: &str) {
        let path = normalize(path);
        let mut cache = self.cache.write().await;
        let before = cache.len();
        cache.retain(|cached, _| !is_within(cached, &path));
        debug!("Flushed {} entries under '{}'", before - cache.len(), path);
    }

    /// Resolve a directory path to its id, creating missing levels if asked
    pub async fn find_dir(&self, path: &str, create: bool) -> Result<ParentId> {
        let path = normalize(path);
        if let Some(id) = self.get(&path).await {
            return Ok(id);
        }

        let mut current = ParentId::Root;
        let mut walked = String::new();
        for segment in path.split('/') {
            if !walked.is_empty() {
                walked.push('/');
            }
            walked.push_str(segment);

            if let Some(id) = self.get(&walked).await {
                current = id;
                continue;
            }

            let id = match self.resolver.find_leaf(&current, segment).await? {
                Some(id) => id,
                None if create => {
                    debug!("Creating missing directory {}", walked);
                    self.resolver.create_dir(&current, segment).await?
                }
                None => return Err(MediaFsError::NotFound(walked)),
            };
            self.put(&walked, &id).await;
            current = ParentId::Id(id);
        }

        Ok(current)
    }

    /// Split `path` into leaf and the id of the directory holding it
    pub async fn find_path(&self, path: &str, create: bool) -> Result<(String, ParentId)> {
        let path = normalize(path);
        let (dir, leaf) = split_path(&path);
        let dir_id = self.find_dir(dir, create).await?;
        Ok((leaf.to_string(), dir_id))
    }

    /// Check a directory move and resolve both ends.
    ///
    /// The source must exist and the destination must not. The destination's
    /// parent is created if missing.
    pub async fn dir_move(&self, src: &str, dst: &str) -> Result<DirMoveTarget> {
        let src = normalize(src);
        let dst = normalize(dst);
        if src.is_empty() || dst.is_empty() {
            return Err(MediaFsError::CantMove("can't move the root directory".to_string()));
        }
        if is_within(&dst, &src) {
            return Err(MediaFsError::CantMove(format!(
                "can't move {} into itself ({})",
                src, dst
            )));
        }

        let src_id = match self.find_dir(&src, false).await? {
            ParentId::Id(id) => id,
            ParentId::Root => {
                return Err(MediaFsError::CantMove("can't move the root directory".to_string()))
            }
        };

        match self.find_dir(&dst, false).await {
            Ok(_) => return Err(MediaFsError::DirExists(dst)),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        let (dst_leaf, dst_parent) = self.find_path(&dst, true).await?;
        Ok(DirMoveTarget {
            src_id,
            dst_parent,
            dst_leaf,
        })
    }
}
