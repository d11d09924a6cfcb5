use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::dir_cache::LeafResolver;
use crate::error::{MediaFsError, Result, ResultExt};
use crate::pacer::{should_retry, Pacer};
use crate::shopware_service::http_client::{ApiRequest, ApiResponse, Transport};
use crate::shopware_service::mime::mime_for_extension;
use crate::shopware_service::shopware_models::{
    MediaDetailResponse, MediaFolderItem, MediaFolderPatch, MediaItem, MediaPatch, ParentId,
    RenameRequest, Search, SearchFilter, SearchResult, FILE_NAME_CUSTOM_FIELD, FOLDER_INCLUDES,
    MEDIA_INCLUDES,
};

const MEDIA_ENTITY: &str = "media";
const FOLDER_ENTITY: &str = "media-folder";

/// Fresh client-side id for a resource about to be created
pub fn new_resource_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Client for media items and media folders.
///
/// Every request goes through the pacer. Item creation and item moves are two
/// separate requests each with nothing tying them together remotely.
#[derive(Clone)]
pub struct ShopwareClient {
    transport: Arc<dyn Transport>,
    pacer: Arc<Pacer>,
}

impl ShopwareClient {
    pub fn new(transport: Arc<dyn Transport>, pacer: Arc<Pacer>) -> Self {
        Self { transport, pacer }
    }

    pub fn pacer(&self) -> &Arc<Pacer> {
        &self.pacer
    }

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.pacer
            .call_remote(|| self.transport.send(request.clone()))
            .await
    }

    /// Send a request whose 400 answer means the content was rejected
    async fn send_content(&self, request: ApiRequest, what: &str) -> Result<ApiResponse> {
        self.pacer
            .call(|| {
                let request = request.clone();
                async move {
                    let result = self.transport.send(request).await;
                    match result {
                        Err(err) if err.status() == Some(400) => {
                            (false, Err(MediaFsError::ExtensionNotAllowed(what.to_string())))
                        }
                        result => (should_retry(&result), result),
                    }
                }
            })
            .await
    }

    // Generic resource operations

    pub async fn search_media(&self, search: &Search) -> Result<SearchResult<MediaItem>> {
        let request = ApiRequest::post("/search/media").json(search)?;
        self.send(request).await?.json()
    }

    pub async fn search_folders(&self, search: &Search) -> Result<SearchResult<MediaFolderItem>> {
        let request = ApiRequest::post("/search/media-folder").json(search)?;
        self.send(request).await?.json()
    }

    pub async fn search_folder_ids(&self, search: &Search) -> Result<SearchResult<String>> {
        let request = ApiRequest::post("/search-ids/media-folder").json(search)?;
        self.send(request).await?.json()
    }

    /// Read one item's metadata directly
    pub async fn get_media(&self, id: &str) -> Result<MediaItem> {
        let request = ApiRequest::get(format!("/media/{}", urlencoding::encode(id)));
        let response: MediaDetailResponse = self
            .send(request)
            .await
            .with_context(|| format!("couldn't read metadata for {}", id))?
            .json()?;
        Ok(response.data)
    }

    /// Create the metadata record of a new item. No content yet.
    pub async fn create_media(&self, item: &MediaItem) -> Result<()> {
        let request = ApiRequest::post("/media").json(item)?;
        self.send(request).await?;
        info!("Created media record {}", item.id);
        Ok(())
    }

    /// Upload content for an existing item id
    pub async fn upload_media(
        &self,
        id: &str,
        extension: &str,
        base_name: &str,
        content: &[u8],
    ) -> Result<()> {
        let path = format!("/_action/media/{}/upload", urlencoding::encode(id));
        let request = ApiRequest::post(path)
            .query("extension", extension)
            .query("fileName", base_name)
            .bytes(mime_for_extension(extension), content.to_vec());
        self.send_content(request, extension).await?;
        info!(
            "Uploaded {} bytes to media {} as {}.{}",
            content.len(),
            id,
            base_name,
            extension
        );
        Ok(())
    }

    /// Change the base name of an item
    pub async fn rename_media(&self, id: &str, base_name: &str) -> Result<()> {
        let path = format!("/_action/media/{}/rename", urlencoding::encode(id));
        let request = ApiRequest::post(path).json(&RenameRequest {
            file_name: base_name.to_string(),
        })?;
        self.send_content(request, base_name).await?;
        info!("Renamed media {} to {}", id, base_name);
        Ok(())
    }

    pub async fn patch_media(&self, id: &str, patch: &MediaPatch) -> Result<()> {
        let request = ApiRequest::patch(format!("/media/{}", urlencoding::encode(id))).json(patch)?;
        self.send(request).await?;
        debug!("Patched media {}", id);
        Ok(())
    }

    pub async fn delete_media(&self, id: &str) -> Result<()> {
        self.send(ApiRequest::delete(format!("/media/{}", urlencoding::encode(id)))).await?;
        info!("Deleted media {}", id);
        Ok(())
    }

    pub async fn create_folder(&self, folder: &MediaFolderItem) -> Result<()> {
        let request = ApiRequest::post("/media-folder").json(folder)?;
        self.send(request).await?;
        info!("Created folder {} ({})", folder.name, folder.id);
        Ok(())
    }

    pub async fn patch_folder(&self, id: &str, patch: &MediaFolderPatch) -> Result<()> {
        let request = ApiRequest::patch(format!("/media-folder/{}", urlencoding::encode(id))).json(patch)?;
        self.send(request).await?;
        info!("Patched folder {}", id);
        Ok(())
    }

    pub async fn delete_folder(&self, id: &str) -> Result<()> {
        self.send(ApiRequest::delete(format!("/media-folder/{}", urlencoding::encode(id))))
            .await?;
        info!("Deleted folder {}", id);
        Ok(())
    }

    /// Download item content from its URL
    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.pacer
            .call_remote(|| self.transport.download(url))
            .await
            .with_context(|| format!("couldn't download {}", url))
    }

    // Lookups used by the filesystem

    /// Find an item in `parent` by its structured name or its original filename
    pub async fn find_file_by_name(&self, parent: &ParentId, name: &str) -> Result<Option<MediaItem>> {
        let (base, extension) = crate::fs::path_utils::split_extension(name);
        let structured = SearchFilter::and(vec![
            SearchFilter::equals("fileName", base),
            match extension {
                Some(ext) => SearchFilter::equals("fileExtension", ext),
                None => SearchFilter::Equals {
                    field: "fileExtension".to_string(),
                    value: None,
                },
            },
        ]);
        let search = Search::new()
            .include(MEDIA_ENTITY, MEDIA_INCLUDES)
            .filter(SearchFilter::or(vec![
                structured,
                SearchFilter::equals(&format!("customFields.{}", FILE_NAME_CUSTOM_FIELD), name),
            ]))
            .filter(SearchFilter::parent("mediaFolderId", parent));

        let result = self
            .search_media(&search)
            .await
            .with_context(|| format!("couldn't list file by name {}", name))?;
        Ok(result.data.into_iter().next())
    }

    pub async fn find_file_by_id(&self, id: &str) -> Result<Option<MediaItem>> {
        let search = Search::new()
            .include(MEDIA_ENTITY, MEDIA_INCLUDES)
            .ids(vec![id.to_string()]);

        let result = self
            .search_media(&search)
            .await
            .with_context(|| format!("couldn't get file by id {}", id))?;
        Ok(result.data.into_iter().next())
    }

    pub async fn list_files_in_folder(&self, parent: &ParentId) -> Result<Vec<MediaItem>> {
        let search = Search::new()
            .include(MEDIA_ENTITY, MEDIA_INCLUDES)
            .filter(SearchFilter::parent("mediaFolderId", parent));

        let result = self
            .search_media(&search)
            .await
            .context("couldn't list files")?;
        Ok(result.data)
    }

    /// Id of the folder named `name` under `parent`; first match wins
    pub async fn find_folder_by_name(&self, parent: &ParentId, name: &str) -> Result<Option<String>> {
        let search = Search::new()
            .include(FOLDER_ENTITY, &["id", "name", "parentId"])
            .filter(SearchFilter::parent("parentId", parent))
            .filter(SearchFilter::equals("name", name));

        let result = self
            .search_folder_ids(&search)
            .await
            .with_context(|| format!("couldn't find folder by name {}", name))?;
        if result.total > 1 || result.data.len() > 1 {
            warn!(
                "Found {} folders named {} under {}, using the first",
                result.total.max(result.data.len() as u64),
                name,
                parent
            );
        }
        Ok(result.data.into_iter().next())
    }

    pub async fn list_folders_in_folder(&self, parent: &ParentId) -> Result<Vec<MediaFolderItem>> {
        let search = Search::new()
            .include(FOLDER_ENTITY, FOLDER_INCLUDES)
            .filter(SearchFilter::parent("parentId", parent));

        let result = self
            .search_folders(&search)
            .await
            .context("couldn't list folders")?;
        Ok(result.data)
    }
}

#[async_trait]
impl LeafResolver for ShopwareClient {
    async fn find_leaf(&self, parent: &ParentId, leaf: &str) -> Result<Option<String>> {
        self.find_folder_by_name(parent, leaf).await
    }

    async fn create_dir(&self, parent: &ParentId, leaf: &str) -> Result<String> {
        let folder = MediaFolderItem::new_folder(new_resource_id(), parent, leaf);
        self.create_folder(&folder)
            .await
            .with_context(|| format!("couldn't create folder {}", leaf))?;
        Ok(folder.id)
    }
}
