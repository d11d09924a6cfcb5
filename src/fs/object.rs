use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::error::{MediaFsError, Result, ResultExt};
use crate::fs::path_utils::{join, split_extension, split_path};
use crate::fs::HashType;
use crate::shopware_service::shopware_client::ShopwareClient;
use crate::shopware_service::shopware_models::MediaItem;

/// Parse an RFC 3339 timestamp from the API, falling back to now
pub fn parse_shopware_date(date: Option<&str>) -> DateTime<Utc> {
    match date {
        None | Some("") => Utc::now(),
        Some(date) => match DateTime::parse_from_rfc3339(date) {
            Ok(parsed) => parsed.with_timezone(&Utc),
            Err(e) => {
                warn!("Failed to parse date {}: {}", date, e);
                Utc::now()
            }
        },
    }
}

/// A file in the media manager
#[derive(Clone)]
pub struct Object {
    client: ShopwareClient,
    remote: String,
    name: String,
    id: String,
    size: u64,
    url: Option<String>,
    mod_time: DateTime<Utc>,
}

impl Object {
    /// Build from a media item found under `dir` (relative to the fs root)
    pub(crate) fn from_item(client: ShopwareClient, dir: &str, name: &str, item: &MediaItem) -> Self {
        Self {
            client,
            remote: join(dir, name),
            name: name.to_string(),
            id: item.id.clone(),
            size: item.file_size.unwrap_or(0),
            url: item.url.clone(),
            mod_time: parse_shopware_date(item.uploaded_at.as_deref()),
        }
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Upload time reported by the server
    pub fn mod_time(&self) -> DateTime<Utc> {
        self.mod_time
    }

    pub fn storable(&self) -> bool {
        true
    }

    pub fn hash(&self, _hash: HashType) -> Result<String> {
        Err(MediaFsError::HashUnsupported)
    }

    pub fn set_mod_time(&mut self, _mod_time: DateTime<Utc>) -> Result<()> {
        Err(MediaFsError::ModTimeNotSettable)
    }

    /// Download the content
    pub async fn open(&self) -> Result<Vec<u8>> {
        let url = self
            .url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| MediaFsError::ObjectNotFound(format!("{} has no content yet", self.remote)))?;
        self.client.download(url).await
    }

    /// Replace the content, keeping the id, base name and extension
    pub async fn update(&mut self, content: &[u8]) -> Result<()> {
        let (base, extension) = split_extension(&self.name);
        let extension =
            extension.ok_or_else(|| MediaFsError::ExtensionNotAllowed(self.name.clone()))?;
        let base = base.to_string();
        let extension = extension.to_string();

        self.client
            .upload_media(&self.id, &extension, &base, content)
            .await
            .with_context(|| format!("couldn't upload {}", self.remote))?;
        self.refresh().await
    }

    pub async fn remove(&self) -> Result<()> {
        self.client
            .delete_media(&self.id)
            .await
            .with_context(|| format!("couldn't remove {}", self.remote))
    }

    /// Re-read size, url and upload time from the server
    pub async fn refresh(&mut self) -> Result<()> {
        let item = self
            .client
            .find_file_by_id(&self.id)
            .await
            .with_context(|| format!("couldn't refresh {}", self.remote))?
            .ok_or_else(|| MediaFsError::ObjectNotFound(self.remote.clone()))?;
        self.apply(&item);
        Ok(())
    }

    pub(crate) fn apply(&mut self, item: &MediaItem) {
        self.size = item.file_size.unwrap_or(0);
        self.url = item.url.clone();
        self.mod_time = parse_shopware_date(item.uploaded_at.as_deref());
        debug!("{} is {} bytes at {:?}", self.remote, self.size, self.url);
    }

    /// Point the object at its new location after a move
    pub(crate) fn relocate(&mut self, remote: &str, name: String) {
        let (dir, _) = split_path(remote);
        self.remote = join(dir, &name);
        self.name = name;
        self.mod_time = Utc::now();
    }
}

impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("remote", &self.remote)
            .field("id", &self.id)
            .field("size", &self.size)
            .finish()
    }
}

impl std::fmt::Display for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
