//! Girder REST backend
//!
//! Implements Repository against the Girder v1 API with a blocking HTTP
//! client. Requests carry the session token in the `Girder-Token` header.
//!
//! ## Security
//!
//! Ids interpolated into request paths are validated first. Girder ids are
//! hex object ids, so only ASCII alphanumerics are accepted.

use std::time::Duration;

use reqwest::Method;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use super::{
    MetadataTarget, ParentRef, RemoteAnnotation, RemoteNode, Repository, RepositoryError,
};
use crate::config::RepositoryConfig;
use crate::models::{AccessControl, AnnotationDocument};

/// Maximum accepted length of an id used in a request path
const MAX_ID_LENGTH: usize = 64;

/// Validate an id before it becomes part of a URL path
fn validate_path_id(id: &str) -> Result<(), RepositoryError> {
    if id.is_empty() {
        return Err(RepositoryError::Backend("Id cannot be empty".to_string()));
    }
    if id.len() > MAX_ID_LENGTH {
        return Err(RepositoryError::Backend(format!(
            "Id too long (max {} characters)",
            MAX_ID_LENGTH
        )));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(RepositoryError::Backend(format!(
            "Id contains invalid characters: {}",
            id
        )));
    }
    Ok(())
}

fn string_field(doc: &Value, key: &str) -> Option<String> {
    doc.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Convert a collection, folder or item document
fn node_from_value(doc: &Value) -> Result<RemoteNode, RepositoryError> {
    let id = string_field(doc, "_id")
        .ok_or_else(|| RepositoryError::InvalidResponse("Document without _id".to_string()))?;
    Ok(RemoteNode {
        id,
        name: string_field(doc, "name").unwrap_or_default(),
        description: string_field(doc, "description"),
        created: string_field(doc, "created"),
        updated: string_field(doc, "updated"),
        meta: doc
            .get("meta")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
        size: doc.get("size").and_then(Value::as_u64),
    })
}

fn annotation_from_value(doc: &Value) -> Result<RemoteAnnotation, RepositoryError> {
    let id = string_field(doc, "_id")
        .ok_or_else(|| RepositoryError::InvalidResponse("Annotation without _id".to_string()))?;
    let annotation = match doc.get("annotation") {
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            RepositoryError::InvalidResponse(format!("Malformed annotation {}: {}", id, e))
        })?,
        None => AnnotationDocument::default(),
    };
    Ok(RemoteAnnotation {
        item_id: string_field(doc, "itemId").unwrap_or_default(),
        creator_id: string_field(doc, "creatorId"),
        created: string_field(doc, "created"),
        updated: string_field(doc, "updated"),
        annotation,
        id,
    })
}

/// Repository backed by a Girder server
pub struct GirderRepository {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl GirderRepository {
    /// Create a backend using an existing session token
    ///
    /// # Arguments
    ///
    /// * `base_url` - API root, e.g. "https://girder.example.com/api/v1"
    /// * `token` - Optional Girder session token
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client: Client::new(),
        }
    }

    /// Exchange an API key for a session token
    pub fn from_api_key(
        base_url: impl Into<String>,
        api_key: &str,
    ) -> Result<Self, RepositoryError> {
        let mut repo = Self::new(base_url, None);
        repo.authenticate(api_key)?;
        Ok(repo)
    }

    /// Build a backend from configuration. An API key takes precedence over
    /// a configured token.
    pub fn from_config(config: &RepositoryConfig) -> Result<Self, RepositoryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RepositoryError::Network(format!("Failed to build HTTP client: {}", e)))?;
        let mut repo = Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            client,
        };
        if let Some(ref key) = config.api_key {
            repo.authenticate(key)?;
        }
        Ok(repo)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authenticate(&mut self, api_key: &str) -> Result<(), RepositoryError> {
        let response: Value = self.send_json(
            self.build_request(Method::POST, "api_key/token")
                .query(&[("key", api_key)]),
            "authenticate",
        )?;
        let token = response
            .get("authToken")
            .and_then(|t| t.get("token"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                RepositoryError::InvalidResponse("Token response without authToken".to_string())
            })?;
        self.token = Some(token.to_string());
        debug!("Authenticated against {}", self.base_url);
        Ok(())
    }

    /// Build a request with authentication headers
    fn build_request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        let mut request = self.client.request(method, &url);

        if let Some(ref token) = self.token {
            request = request.header("Girder-Token", token);
        }

        request
    }

    fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, RepositoryError> {
        let response = request
            .send()
            .map_err(|e| RepositoryError::Network(format!("Failed to {}: {}", what, e)))?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(RepositoryError::NotFound(what.to_string())),
            status => {
                let body = response.text().unwrap_or_default();
                Err(RepositoryError::Backend(format!(
                    "{} failed: {} {}",
                    what, status, body
                )))
            }
        }
    }

    fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, RepositoryError> {
        self.send(request, what)?.json().map_err(|e| {
            RepositoryError::InvalidResponse(format!("Failed to parse {} response: {}", what, e))
        })
    }

    fn list_nodes(&self, request: RequestBuilder, what: &str) -> Result<Vec<RemoteNode>, RepositoryError> {
        let docs: Vec<Value> = self.send_json(request, what)?;
        docs.iter().map(node_from_value).collect()
    }
}

impl Repository for GirderRepository {
    fn list_collections(&self) -> Result<Vec<RemoteNode>, RepositoryError> {
        self.list_nodes(
            self.build_request(Method::GET, "collection")
                .query(&[("limit", "0")]),
            "list collections",
        )
    }

    fn list_folders(&self, parent: &ParentRef) -> Result<Vec<RemoteNode>, RepositoryError> {
        validate_path_id(parent.id())?;
        self.list_nodes(
            self.build_request(Method::GET, "folder").query(&[
                ("parentType", parent.kind()),
                ("parentId", parent.id()),
                ("limit", "0"),
            ]),
            &format!("list folders of {} {}", parent.kind(), parent.id()),
        )
    }

    fn list_items(&self, folder_id: &str) -> Result<Vec<RemoteNode>, RepositoryError> {
        validate_path_id(folder_id)?;
        self.list_nodes(
            self.build_request(Method::GET, "item")
                .query(&[("folderId", folder_id), ("limit", "0")]),
            &format!("list items of folder {}", folder_id),
        )
    }

    fn list_annotations(&self, item_id: &str) -> Result<Vec<RemoteAnnotation>, RepositoryError> {
        validate_path_id(item_id)?;
        let docs: Vec<Value> = self.send_json(
            self.build_request(Method::GET, &format!("annotation/item/{}", item_id)),
            &format!("list annotations of item {}", item_id),
        )?;
        docs.iter().map(annotation_from_value).collect()
    }

    fn get_annotation(&self, annotation_id: &str) -> Result<RemoteAnnotation, RepositoryError> {
        validate_path_id(annotation_id)?;
        let doc: Value = self.send_json(
            self.build_request(Method::GET, &format!("annotation/{}", annotation_id)),
            &format!("get annotation {}", annotation_id),
        )?;
        annotation_from_value(&doc)
    }

    fn get_annotation_access(
        &self,
        annotation_id: &str,
    ) -> Result<AccessControl, RepositoryError> {
        validate_path_id(annotation_id)?;
        self.send_json(
            self.build_request(Method::GET, &format!("annotation/{}/access", annotation_id)),
            &format!("get access of annotation {}", annotation_id),
        )
    }

    fn create_collection(
        &mut self,
        name: &str,
        description: &str,
    ) -> Result<RemoteNode, RepositoryError> {
        let doc: Value = self.send_json(
            self.build_request(Method::POST, "collection").query(&[
                ("name", name),
                ("description", description),
                ("public", "false"),
            ]),
            &format!("create collection {}", name),
        )?;
        node_from_value(&doc)
    }

    fn create_folder(
        &mut self,
        parent: &ParentRef,
        name: &str,
    ) -> Result<RemoteNode, RepositoryError> {
        validate_path_id(parent.id())?;
        let doc: Value = self.send_json(
            self.build_request(Method::POST, "folder").query(&[
                ("parentType", parent.kind()),
                ("parentId", parent.id()),
                ("name", name),
            ]),
            &format!("create folder {}", name),
        )?;
        node_from_value(&doc)
    }

    fn create_item(&mut self, folder_id: &str, name: &str) -> Result<RemoteNode, RepositoryError> {
        validate_path_id(folder_id)?;
        let doc: Value = self.send_json(
            self.build_request(Method::POST, "item")
                .query(&[("folderId", folder_id), ("name", name)]),
            &format!("create item {}", name),
        )?;
        node_from_value(&doc)
    }

    fn create_annotation(
        &mut self,
        item_id: &str,
        document: &AnnotationDocument,
    ) -> Result<RemoteAnnotation, RepositoryError> {
        validate_path_id(item_id)?;
        let doc: Value = self.send_json(
            self.build_request(Method::POST, "annotation")
                .query(&[("itemId", item_id)])
                .json(document),
            &format!("create annotation on item {}", item_id),
        )?;
        annotation_from_value(&doc)
    }

    fn set_metadata(
        &mut self,
        target: &MetadataTarget,
        meta: &Map<String, Value>,
    ) -> Result<(), RepositoryError> {
        validate_path_id(target.id())?;
        self.send(
            self.build_request(
                Method::PUT,
                &format!("{}/{}/metadata", target.kind(), target.id()),
            )
            .json(meta),
            &format!("set metadata on {} {}", target.kind(), target.id()),
        )?;
        Ok(())
    }

    fn set_annotation_access(
        &mut self,
        annotation_id: &str,
        access: &AccessControl,
    ) -> Result<(), RepositoryError> {
        validate_path_id(annotation_id)?;
        let encoded = serde_json::to_string(access).map_err(|e| {
            RepositoryError::Backend(format!("Failed to encode access block: {}", e))
        })?;
        self.send(
            self.build_request(Method::PUT, &format!("annotation/{}/access", annotation_id))
                .query(&[("access", encoded.as_str()), ("public", "false")]),
            &format!("set access on annotation {}", annotation_id),
        )?;
        Ok(())
    }
}
