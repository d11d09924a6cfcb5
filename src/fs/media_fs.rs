use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};

use crate::dir_cache::DirCache;
use crate::error::{MediaFsError, Result, ResultExt};
use crate::fs::object::{parse_shopware_date, Object};
use crate::fs::path_utils::{join, normalize, split_extension, split_path};
use crate::fs::{DirEntry, Directory, Features, Filesystem, HashType, Precision};
use crate::shopware_service::shopware_client::{new_resource_id, ShopwareClient};
use crate::shopware_service::shopware_models::{MediaFolderPatch, MediaItem, MediaPatch, ParentId};

/// What the configured root turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootKind {
    /// An existing directory, or a path that doesn't exist yet
    Directory,
    /// An existing file; the filesystem root was moved to its parent and the
    /// value is the file's name within it
    File(String),
}

/// Filesystem over the media manager of one shop
pub struct MediaFs {
    name: String,
    root: String,
    client: ShopwareClient,
    dir_cache: Arc<DirCache>,
    features: Features,
}

impl MediaFs {
    fn with_root(name: &str, root: &str, client: ShopwareClient, dir_cache: Arc<DirCache>) -> Self {
        Self {
            name: name.to_string(),
            root: normalize(root),
            client,
            dir_cache,
            features: Features::default(),
        }
    }

    /// Open a filesystem rooted at `root`.
    ///
    /// If `root` names an existing file rather than a directory, the returned
    /// filesystem is rooted at the file's parent and [`RootKind::File`] says so.
    pub async fn new(name: &str, root: &str, client: ShopwareClient) -> Result<(Self, RootKind)> {
        let dir_cache = Arc::new(DirCache::new(Arc::new(client.clone())));
        let fs = Self::with_root(name, root, client, dir_cache);

        match fs.dir_cache.find_dir(&fs.root, false).await {
            Ok(_) => return Ok((fs, RootKind::Directory)),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        let full_root = fs.root.clone();
        let (parent, leaf) = split_path(&full_root);
        if leaf.is_empty() {
            return Ok((fs, RootKind::Directory));
        }

        let parent_fs = Self::with_root(name, parent, fs.client.clone(), fs.dir_cache.clone());
        match parent_fs.dir_cache.find_dir(&parent_fs.root, false).await {
            Ok(_) => {}
            Err(err) if err.is_not_found() => return Ok((fs, RootKind::Directory)),
            Err(err) => return Err(err),
        }

        match parent_fs.new_object(leaf).await {
            Ok(_) => {
                info!("Root {} is a file, using {} as root", full_root, parent_fs.root);
                Ok((parent_fs, RootKind::File(leaf.to_string())))
            }
            Err(err) if err.is_not_found() => Ok((fs, RootKind::Directory)),
            Err(err) => Err(err),
        }
    }

    pub fn client(&self) -> &ShopwareClient {
        &self.client
    }

    pub fn dir_cache(&self) -> &Arc<DirCache> {
        &self.dir_cache
    }

    /// Path from the media root for a path relative to this filesystem
    fn full_path(&self, remote: &str) -> String {
        join(&self.root, remote)
    }

    /// Create a new item: metadata record first, then its content.
    ///
    /// A failed upload leaves an empty record behind, which is removed again
    /// on a best-effort basis.
    async fn put_new(&self, remote: &str, content: &[u8]) -> Result<Object> {
        let remote = normalize(remote);
        let (dir, leaf) = split_path(&remote);
        let (base, extension) = split_extension(leaf);
        let extension = extension.ok_or_else(|| MediaFsError::ExtensionNotAllowed(leaf.to_string()))?;

        let (_, dir_id) = self.dir_cache.find_path(&self.full_path(&remote), true).await?;

        let record = MediaItem::new_record(new_resource_id(), &dir_id, leaf);
        self.client
            .create_media(&record)
            .await
            .with_context(|| format!("couldn't create media record for {}", remote))?;

        if let Err(err) = self
            .client
            .upload_media(&record.id, extension, base, content)
            .await
        {
            warn!(
                "Upload of {} failed, removing empty media record {}",
                remote, record.id
            );
            if let Err(cleanup) = self.client.delete_media(&record.id).await {
                warn!("Couldn't remove orphaned media record {}: {}", record.id, cleanup);
            }
            return Err(err).with_context(|| format!("couldn't upload {}", remote));
        }

        let item = self
            .client
            .find_file_by_id(&record.id)
            .await
            .with_context(|| format!("couldn't read back {}", remote))?
            .ok_or_else(|| MediaFsError::ObjectNotFound(remote.clone()))?;
        Ok(Object::from_item(self.client.clone(), dir, leaf, &item))
    }
}

impl std::fmt::Debug for MediaFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaFs")
            .field("name", &self.name)
            .field("root", &self.root)
            .finish()
    }
}

impl std::fmt::Display for MediaFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "shopware root '{}'", self.root)
    }
}

#[async_trait]
impl Filesystem for MediaFs {
    fn name(&self) -> &str {
        &self.name
    }

    fn root(&self) -> &str {
        &self.root
    }

    fn precision(&self) -> Precision {
        Precision::NotSupported
    }

    fn hashes(&self) -> Vec<HashType> {
        Vec::new()
    }

    fn features(&self) -> &Features {
        &self.features
    }

    async fn list(&self, dir: &str) -> Result<Vec<DirEntry>> {
        let dir = normalize(dir);
        let full_dir = self.full_path(&dir);
        let dir_id = self.dir_cache.find_dir(&full_dir, false).await?;
        debug!("Listing {} ({})", full_dir, dir_id);

        let (files, folders) = tokio::try_join!(
            self.client.list_files_in_folder(&dir_id),
            self.client.list_folders_in_folder(&dir_id)
        )?;

        let mut entries = Vec::with_capacity(files.len() + folders.len());
        for file in &files {
            let name = file.display_name();
            entries.push(DirEntry::Object(Object::from_item(
                self.client.clone(),
                &dir,
                &name,
                file,
            )));
        }
        for folder in folders {
            self.dir_cache
                .put(&join(&full_dir, &folder.name), &folder.id)
                .await;
            entries.push(DirEntry::Dir(Directory {
                remote: join(&dir, &folder.name),
                mod_time: parse_shopware_date(folder.created_at.as_deref()),
                id: folder.id,
            }));
        }

        Ok(entries)
    }

    async fn new_object(&self, remote: &str) -> Result<Object> {
        let remote = normalize(remote);
        let (leaf, dir_id) = self.dir_cache.find_path(&self.full_path(&remote), false).await?;

        let item = self
            .client
            .find_file_by_name(&dir_id, &leaf)
            .await?
            .ok_or_else(|| MediaFsError::ObjectNotFound(remote.clone()))?;

        let (dir, _) = split_path(&remote);
        Ok(Object::from_item(self.client.clone(), dir, &leaf, &item))
    }

    async fn put(&self, remote: &str, content: &[u8], size_hint: Option<u64>) -> Result<Object> {
        let normalized = normalize(remote);
        let (_, leaf) = split_path(&normalized);
        if split_extension(leaf).1.is_none() {
            return Err(MediaFsError::ExtensionNotAllowed(leaf.to_string()));
        }
        if let Some(size) = size_hint {
            if size != content.len() as u64 {
                warn!(
                    "Size hint {} for {} doesn't match {} bytes of content",
                    size,
                    remote,
                    content.len()
                );
            }
        }

        match self.new_object(remote).await {
            Ok(mut existing) => {
                debug!("{} exists as {}, updating in place", remote, existing.id());
                existing.update(content).await?;
                Ok(existing)
            }
            Err(err) if err.is_not_found() => self.put_new(remote, content).await,
            Err(err) => Err(err),
        }
    }

    async fn delete(&self, remote: &str) -> Result<()> {
        self.new_object(remote).await?.remove().await
    }

    async fn mkdir(&self, dir: &str) -> Result<()> {
        self.dir_cache.find_dir(&self.full_path(dir), true).await?;
        Ok(())
    }

    async fn rmdir(&self, dir: &str) -> Result<()> {
        let full_dir = self.full_path(dir);
        let id = match self.dir_cache.find_dir(&full_dir, false).await? {
            ParentId::Id(id) => id,
            ParentId::Root => {
                return Err(MediaFsError::Unsupported(
                    "can't remove the media root".to_string(),
                ))
            }
        };

        self.client
            .delete_folder(&id)
            .await
            .with_context(|| format!("couldn't remove directory {}", full_dir))?;
        self.dir_cache.flush_dir(&full_dir).await;
        Ok(())
    }

    /// Rename then reparent. The two requests are independent: when one of
    /// them fails the object is still updated and the failure is returned.
    async fn move_object(&self, object: &mut Object, remote: &str) -> Result<()> {
        let remote = normalize(remote);
        let full = self.full_path(&remote);
        let (dir, leaf) = split_path(&full);

        let dir_id = match self.dir_cache.find_dir(dir, false).await {
            Ok(id) => id,
            Err(err) if err.is_not_found() => {
                debug!("Cannot find target folder {}", dir);
                return Err(MediaFsError::CantMove(format!(
                    "target directory {} not found",
                    dir
                )));
            }
            Err(err) => return Err(err),
        };

        let (new_base, new_extension) = split_extension(leaf);
        let (_, old_extension) = split_extension(object.name());
        if new_extension != old_extension {
            warn!(
                "Extension of {} can't change on move, keeping .{}",
                object.name(),
                old_extension.unwrap_or_default()
            );
        }
        let new_name = match old_extension {
            Some(ext) => format!("{}.{}", new_base, ext),
            None => new_base.to_string(),
        };

        let renamed = self
            .client
            .rename_media(object.id(), new_base)
            .await
            .with_context(|| format!("couldn't rename {} to {}", object.remote(), new_base));
        let reparented = self
            .client
            .patch_media(
                object.id(),
                &MediaPatch {
                    media_folder_id: dir_id.to_remote(),
                },
            )
            .await
            .with_context(|| format!("couldn't move {} to {}", object.remote(), dir));

        object.relocate(&remote, new_name);

        match (renamed, reparented) {
            (Ok(()), Ok(())) => {
                info!("Moved {} to {}", object.id(), object.remote());
                Ok(())
            }
            (Err(err), Ok(())) => {
                warn!("{} was moved but not renamed", object.id());
                Err(err)
            }
            (renamed, Err(err)) => {
                if renamed.is_ok() {
                    warn!("{} was renamed but not moved", object.id());
                }
                Err(err)
            }
        }
    }

    async fn dir_move(&self, src: &str, dst: &str) -> Result<()> {
        let full_src = self.full_path(src);
        let full_dst = self.full_path(dst);
        let target = self.dir_cache.dir_move(&full_src, &full_dst).await?;

        let patched = self
            .client
            .patch_folder(
                &target.src_id,
                &MediaFolderPatch {
                    name: target.dst_leaf.clone(),
                    parent_id: target.dst_parent.to_remote(),
                },
            )
            .await
            .with_context(|| format!("couldn't move directory {} to {}", full_src, full_dst));

        self.dir_cache.flush_dir(&full_src).await;
        patched?;
        self.dir_cache.put(&full_dst, &target.src_id).await;
        info!("Moved directory {} to {}", full_src, full_dst);
        Ok(())
    }
}
