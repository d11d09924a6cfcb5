use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use shopware_mediafs::error::{MediaFsError, Result};
use shopware_mediafs::shopware_service::http_client::{
    ApiRequest, ApiResponse, RequestBody, Transport,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use uuid::Uuid;

/// Base of the download URLs handed out for uploaded content
pub const MEDIA_URL_BASE: &str = "https://shop.test/media";

/// Extensions the mock media service refuses on upload
const REJECTED_EXTENSIONS: &[&str] = &["exe", "php"];

#[derive(Debug, Default)]
struct MockState {
    media: Vec<Value>,
    folders: Vec<Value>,
    content: HashMap<String, Vec<u8>>,
    requests: Vec<ApiRequest>,
    call_counter: HashMap<String, usize>,
    /// Statuses to answer with, per route, before behaving normally again
    failures: HashMap<String, VecDeque<u16>>,
}

/// In-memory media manager speaking the admin API's JSON.
///
/// Routes are named after the client operation that uses them: `search_media`,
/// `search_folders`, `search_folder_ids`, `get_media`, `create_media`,
/// `upload_media`, `rename_media`, `patch_media`, `delete_media`,
/// `create_folder`, `patch_folder`, `delete_folder` and `download`.
#[derive(Debug, Default)]
pub struct MockShopware {
    state: Mutex<MockState>,
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn http(status: u16, body: &str) -> MediaFsError {
    MediaFsError::Http {
        status,
        body: body.to_string(),
    }
}

fn json_response(value: Value) -> Result<ApiResponse> {
    Ok(ApiResponse::new(200, serde_json::to_vec(&value)?))
}

static NULL: Value = Value::Null;

/// Field lookup with dotted paths, missing fields read as null
fn field<'a>(item: &'a Value, path: &str) -> &'a Value {
    let mut current = item;
    for part in path.split('.') {
        current = match current.get(part) {
            Some(value) => value,
            None => return &NULL,
        };
    }
    current
}

fn matches_filter(item: &Value, filter: &Value) -> bool {
    match filter["type"].as_str() {
        Some("equals") => {
            let actual = field(item, filter["field"].as_str().unwrap_or_default());
            match &filter["value"] {
                Value::Null => actual.is_null(),
                expected => actual == expected,
            }
        }
        Some("multi") => {
            let queries = filter["queries"].as_array().cloned().unwrap_or_default();
            match filter["operator"].as_str() {
                Some("or") => queries.iter().any(|q| matches_filter(item, q)),
                _ => queries.iter().all(|q| matches_filter(item, q)),
            }
        }
        other => panic!("mock media service got unknown filter type {:?}", other),
    }
}

/// Apply a search body: ids and the top level filter list are all required
fn search<'a>(items: &'a [Value], body: &Value) -> Vec<&'a Value> {
    let ids: Vec<&str> = body["ids"]
        .as_array()
        .map(|ids| ids.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let filters = body["filter"].as_array().cloned().unwrap_or_default();

    items
        .iter()
        .filter(|item| ids.is_empty() || ids.contains(&item["id"].as_str().unwrap_or_default()))
        .filter(|item| filters.iter().all(|f| matches_filter(item, f)))
        .collect()
}

fn merge(target: &mut Value, patch: &Value) {
    if let (Some(target), Some(patch)) = (target.as_object_mut(), patch.as_object()) {
        for (key, value) in patch {
            target.insert(key.clone(), value.clone());
        }
    }
}

fn media_url(item: &Value) -> String {
    format!(
        "{}/{}.{}",
        MEDIA_URL_BASE,
        item["fileName"].as_str().unwrap_or_default(),
        item["fileExtension"].as_str().unwrap_or_default()
    )
}

impl MockShopware {
    pub fn new() -> Self {
        Self::default()
    }

    // Seeding

    /// Add a folder below `parent` (`None` for the root) and return its id
    pub fn add_folder(&self, parent: Option<&str>, name: &str) -> String {
        let id = new_id();
        self.state.lock().unwrap().folders.push(json!({
            "id": id,
            "name": name,
            "parentId": parent,
            "createdAt": "2024-01-02T03:04:05.000+00:00",
        }));
        id
    }

    /// Add an uploaded item and return its id
    pub fn add_media(&self, folder: Option<&str>, file_name: &str, extension: &str, content: &[u8]) -> String {
        let id = new_id();
        let mut item = json!({
            "id": id,
            "fileName": file_name,
            "fileExtension": extension,
            "fileSize": content.len(),
            "mediaFolderId": folder,
            "uploadedAt": "2024-01-02T03:04:05.000+00:00",
            "customFields": { "FileName": format!("{}.{}", file_name, extension) },
        });
        let url = media_url(&item);
        item["url"] = json!(url);

        let mut state = self.state.lock().unwrap();
        state.content.insert(url, content.to_vec());
        state.media.push(item);
        id
    }

    // Failure injection

    /// Answer the next calls to `route` with `statuses`, one per call
    pub fn fail_next(&self, route: &str, statuses: &[u16]) {
        let mut state = self.state.lock().unwrap();
        state
            .failures
            .entry(route.to_string())
            .or_default()
            .extend(statuses.iter().copied());
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    // Inspection

    pub fn get_call_count(&self, route: &str) -> usize {
        *self
            .state
            .lock()
            .unwrap()
            .call_counter
            .get(route)
            .unwrap_or(&0)
    }

    pub fn get_all_call_counts(&self) -> HashMap<String, usize> {
        self.state.lock().unwrap().call_counter.clone()
    }

    pub fn reset_call_counters(&self) {
        let mut state = self.state.lock().unwrap();
        state.call_counter.clear();
        state.requests.clear();
    }

    /// Every request received, in order
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn media(&self, id: &str) -> Option<Value> {
        let state = self.state.lock().unwrap();
        state.media.iter().find(|m| m["id"] == id).cloned()
    }

    pub fn all_media(&self) -> Vec<Value> {
        self.state.lock().unwrap().media.clone()
    }

    pub fn folder(&self, id: &str) -> Option<Value> {
        let state = self.state.lock().unwrap();
        state.folders.iter().find(|f| f["id"] == id).cloned()
    }

    pub fn all_folders(&self) -> Vec<Value> {
        self.state.lock().unwrap().folders.clone()
    }

    /// Ids of folders named `name` directly below `parent`
    pub fn folder_ids_named(&self, parent: Option<&str>, name: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .folders
            .iter()
            .filter(|f| f["name"] == name && f["parentId"].as_str() == parent)
            .filter_map(|f| f["id"].as_str().map(str::to_string))
            .collect()
    }

    // Routing

    fn count_and_maybe_fail(&self, route: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        *state.call_counter.entry(route.to_string()).or_insert(0) += 1;
        if let Some(status) = state.failures.get_mut(route).and_then(VecDeque::pop_front) {
            return Err(http(status, "scripted failure"));
        }
        Ok(())
    }

    fn route(request: &ApiRequest) -> Option<(&'static str, Option<String>)> {
        let segments: Vec<&str> = request.path.trim_start_matches('/').split('/').collect();
        let id = |i: usize| segments.get(i).map(|s| s.to_string());
        let route = match (request.method.as_str(), segments.as_slice()) {
            ("POST", ["search", "media"]) => ("search_media", None),
            ("POST", ["search", "media-folder"]) => ("search_folders", None),
            ("POST", ["search-ids", "media-folder"]) => ("search_folder_ids", None),
            ("POST", ["media"]) => ("create_media", None),
            ("GET", ["media", _]) => ("get_media", id(1)),
            ("PATCH", ["media", _]) => ("patch_media", id(1)),
            ("DELETE", ["media", _]) => ("delete_media", id(1)),
            ("POST", ["_action", "media", _, "upload"]) => ("upload_media", id(2)),
            ("POST", ["_action", "media", _, "rename"]) => ("rename_media", id(2)),
            ("POST", ["media-folder"]) => ("create_folder", None),
            ("PATCH", ["media-folder", _]) => ("patch_folder", id(1)),
            ("DELETE", ["media-folder", _]) => ("delete_folder", id(1)),
            _ => return None,
        };
        Some(route)
    }

    fn handle(&self, route: &str, id: Option<String>, request: &ApiRequest) -> Result<ApiResponse> {
        let id = id.unwrap_or_default();
        let body = request.json_body().cloned().unwrap_or(Value::Null);
        let mut state = self.state.lock().unwrap();

        match route {
            "search_media" => {
                let data: Vec<Value> = search(&state.media, &body).into_iter().cloned().collect();
                json_response(json!({ "total": data.len(), "data": data }))
            }
            "search_folders" => {
                let data: Vec<Value> = search(&state.folders, &body).into_iter().cloned().collect();
                json_response(json!({ "total": data.len(), "data": data }))
            }
            "search_folder_ids" => {
                let data: Vec<Value> = search(&state.folders, &body)
                    .into_iter()
                    .map(|f| f["id"].clone())
                    .collect();
                json_response(json!({ "total": data.len(), "data": data }))
            }
            "get_media" => match state.media.iter().find(|m| m["id"] == id.as_str()) {
                Some(item) => json_response(json!({ "data": item })),
                None => Err(http(404, "media not found")),
            },
            "create_media" => {
                if !body.is_object() || body["id"].as_str().is_none() {
                    return Err(http(400, "media record needs an id"));
                }
                state.media.push(body);
                Ok(ApiResponse::no_content())
            }
            "patch_media" => {
                let item = state
                    .media
                    .iter_mut()
                    .find(|m| m["id"] == id.as_str())
                    .ok_or_else(|| http(404, "media not found"))?;
                merge(item, &body);
                Ok(ApiResponse::no_content())
            }
            "delete_media" => {
                let before = state.media.len();
                state.media.retain(|m| m["id"] != id.as_str());
                if state.media.len() == before {
                    return Err(http(404, "media not found"));
                }
                Ok(ApiResponse::no_content())
            }
            "upload_media" => {
                let query: HashMap<&str, &str> = request
                    .query
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect();
                let extension = query.get("extension").copied().unwrap_or_default();
                let file_name = query.get("fileName").copied().unwrap_or_default();
                if extension.is_empty() || REJECTED_EXTENSIONS.contains(&extension) {
                    return Err(http(400, "file extension not allowed"));
                }
                let data = match &request.body {
                    RequestBody::Bytes { data, .. } => data.clone(),
                    _ => return Err(http(400, "upload without content")),
                };

                let item = state
                    .media
                    .iter_mut()
                    .find(|m| m["id"] == id.as_str())
                    .ok_or_else(|| http(404, "media not found"))?;
                item["fileName"] = json!(file_name);
                item["fileExtension"] = json!(extension);
                item["fileSize"] = json!(data.len());
                item["uploadedAt"] = json!(Utc::now().to_rfc3339());
                let url = media_url(item);
                item["url"] = json!(url);
                state.content.insert(url, data);
                Ok(ApiResponse::no_content())
            }
            "rename_media" => {
                let file_name = body["fileName"].as_str().unwrap_or_default().to_string();
                if file_name.is_empty() {
                    return Err(http(400, "file name must not be empty"));
                }
                let item = state
                    .media
                    .iter_mut()
                    .find(|m| m["id"] == id.as_str())
                    .ok_or_else(|| http(404, "media not found"))?;
                let old_url = media_url(item);
                item["fileName"] = json!(file_name);
                let new_url = media_url(item);
                item["url"] = json!(new_url);
                if let Some(data) = state.content.remove(&old_url) {
                    state.content.insert(new_url, data);
                }
                Ok(ApiResponse::no_content())
            }
            "create_folder" => {
                let mut folder = match body {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                if folder.get("id").and_then(Value::as_str).is_none() {
                    return Err(http(400, "folder needs an id"));
                }
                folder
                    .entry("createdAt")
                    .or_insert_with(|| json!(Utc::now().to_rfc3339()));
                state.folders.push(Value::Object(folder));
                Ok(ApiResponse::no_content())
            }
            "patch_folder" => {
                let folder = state
                    .folders
                    .iter_mut()
                    .find(|f| f["id"] == id.as_str())
                    .ok_or_else(|| http(404, "folder not found"))?;
                merge(folder, &body);
                Ok(ApiResponse::no_content())
            }
            "delete_folder" => {
                if !state.folders.iter().any(|f| f["id"] == id.as_str()) {
                    return Err(http(404, "folder not found"));
                }
                // the folder, its subfolders and everything in them
                let mut doomed = vec![id];
                let mut i = 0;
                while i < doomed.len() {
                    let parent = doomed[i].clone();
                    for folder in &state.folders {
                        if folder["parentId"] == parent.as_str() {
                            if let Some(child) = folder["id"].as_str() {
                                doomed.push(child.to_string());
                            }
                        }
                    }
                    i += 1;
                }
                state
                    .folders
                    .retain(|f| !doomed.iter().any(|d| f["id"] == d.as_str()));
                state.media.retain(|m| {
                    !doomed
                        .iter()
                        .any(|d| m["mediaFolderId"] == d.as_str())
                });
                Ok(ApiResponse::no_content())
            }
            other => Err(http(404, &format!("no route {}", other))),
        }
    }
}

#[async_trait]
impl Transport for MockShopware {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.state.lock().unwrap().requests.push(request.clone());
        let (route, id) = match Self::route(&request) {
            Some(route) => route,
            None => return Err(http(404, &format!("{} {}", request.method, request.path))),
        };
        self.count_and_maybe_fail(route)?;
        self.handle(route, id, &request)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.count_and_maybe_fail("download")?;
        self.state
            .lock()
            .unwrap()
            .content
            .get(url)
            .cloned()
            .ok_or_else(|| http(404, "no content at url"))
    }
}
