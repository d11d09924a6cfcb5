use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Custom field holding the original full filename of an uploaded item.
pub const FILE_NAME_CUSTOM_FIELD: &str = "FileName";

/// Sentinel id of the filesystem root. Never sent to the remote service.
pub const ROOT_ID: &str = "root";

/// Fields requested for media items
pub const MEDIA_INCLUDES: &[&str] = &[
    "id",
    "fileName",
    "fileExtension",
    "fileSize",
    "mediaFolderId",
    "url",
    "uploadedAt",
    "customFields",
];

/// Fields requested for media folders
pub const FOLDER_INCLUDES: &[&str] = &["id", "name", "parentId", "createdAt"];

/// ParentId: the folder an item or folder lives in.
///
/// The root has no remote counterpart; filters and payloads addressing it
/// carry `null` instead of an id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParentId {
    Root,
    Id(String),
}

impl ParentId {
    /// Value to send remotely: `None` for the root
    pub fn as_remote(&self) -> Option<&str> {
        match self {
            ParentId::Root => None,
            ParentId::Id(id) => Some(id.as_str()),
        }
    }

    pub fn to_remote(&self) -> Option<String> {
        self.as_remote().map(str::to_string)
    }

    /// Build from a value received remotely
    pub fn from_remote(id: Option<String>) -> Self {
        match id {
            Some(id) if !id.is_empty() && id != ROOT_ID => ParentId::Id(id),
            _ => ParentId::Root,
        }
    }
}

impl std::fmt::Display for ParentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParentId::Root => write!(f, "{}", ROOT_ID),
            ParentId::Id(id) => write!(f, "{}", id),
        }
    }
}

/// MediaItem: one file in the media manager.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    /// `null` places the item in the root
    #[serde(default)]
    pub media_folder_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<HashMap<String, serde_json::Value>>,
}

impl MediaItem {
    /// Metadata record for a new item, before any content is uploaded
    pub fn new_record(id: String, folder: &ParentId, full_name: &str) -> Self {
        let mut custom_fields = HashMap::new();
        custom_fields.insert(
            FILE_NAME_CUSTOM_FIELD.to_string(),
            serde_json::Value::String(full_name.to_string()),
        );
        Self {
            id,
            media_folder_id: folder.to_remote(),
            custom_fields: Some(custom_fields),
            ..Default::default()
        }
    }

    /// Name as seen on the filesystem: `fileName.fileExtension`.
    ///
    /// Records without uploaded content have no structured name yet and fall
    /// back to the original filename, then to their id.
    pub fn display_name(&self) -> String {
        match self.file_name.as_deref().filter(|base| !base.is_empty()) {
            Some(base) => match self.file_extension.as_deref() {
                Some(ext) if !ext.is_empty() => format!("{}.{}", base, ext),
                _ => base.to_string(),
            },
            None => self
                .original_name()
                .filter(|name| !name.is_empty())
                .unwrap_or(&self.id)
                .to_string(),
        }
    }

    /// Original full filename from the custom field, if recorded
    pub fn original_name(&self) -> Option<&str> {
        self.custom_fields
            .as_ref()
            .and_then(|fields| fields.get(FILE_NAME_CUSTOM_FIELD))
            .and_then(|value| value.as_str())
    }
}

/// Partial update of a media item
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaPatch {
    pub media_folder_id: Option<String>,
}

/// Body of the rename action
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    pub file_name: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct MediaFolderConfiguration {
    pub private: bool,
}

/// MediaFolderItem: one directory level.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaFolderItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<MediaFolderConfiguration>,
}

impl MediaFolderItem {
    pub fn new_folder(id: String, parent: &ParentId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            parent_id: parent.to_remote(),
            created_at: None,
            configuration: Some(MediaFolderConfiguration { private: false }),
        }
    }
}

/// Partial update of a folder: rename and/or reparent
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaFolderPatch {
    pub name: String,
    pub parent_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    And,
    Or,
}

/// SearchFilter: boolean predicate tree understood by the search endpoints.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SearchFilter {
    Equals {
        field: String,
        value: Option<String>,
    },
    Multi {
        operator: FilterOperator,
        queries: Vec<SearchFilter>,
    },
}

impl SearchFilter {
    pub fn equals(field: &str, value: &str) -> Self {
        SearchFilter::Equals {
            field: field.to_string(),
            value: Some(value.to_string()),
        }
    }

    /// Equality on a parent reference, `null` for the root
    pub fn parent(field: &str, parent: &ParentId) -> Self {
        SearchFilter::Equals {
            field: field.to_string(),
            value: parent.to_remote(),
        }
    }

    pub fn and(queries: Vec<SearchFilter>) -> Self {
        SearchFilter::Multi {
            operator: FilterOperator::And,
            queries,
        }
    }

    pub fn or(queries: Vec<SearchFilter>) -> Self {
        SearchFilter::Multi {
            operator: FilterOperator::Or,
            queries,
        }
    }
}

/// Search criteria body
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Search {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub includes: HashMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<SearchFilter>,
}

impl Search {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict returned fields of `entity`
    pub fn include(mut self, entity: &str, fields: &[&str]) -> Self {
        self.includes.insert(
            entity.to_string(),
            fields.iter().map(|f| f.to_string()).collect(),
        );
        self
    }

    pub fn filter(mut self, filter: SearchFilter) -> Self {
        self.filter.push(filter);
        self
    }

    pub fn ids(mut self, ids: Vec<String>) -> Self {
        self.ids = ids;
        self
    }
}

/// Response of the search endpoints
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SearchResult<T> {
    #[serde(default)]
    pub total: u64,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// Response of `GET /media/{id}`
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MediaDetailResponse {
    pub data: MediaItem,
}

/// Access token issued by the token endpoint
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_expires_in() -> u64 {
    600
}
