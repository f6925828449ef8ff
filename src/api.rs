//! Access to the VSD REST API.
//!
//! [`Connection`] holds the base url and the Basic auth string and offers one
//! method per endpoint the workflows in [`crate::helper`] need.

use super::folder::FolderTree;
use super::locator;
use super::model::*;
use super::segmentation::ObjectSource;
use super::transfer::{downloader, uploader, ProgressListener};
use base64::Engine;
use reqwest::{Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use std::{env, io, path::Path, sync::Arc};
use thiserror::Error;
use tracing::debug;

/// The public VSD instance.
pub const DEFAULT_URL: &str = "https://www.virtualskeleton.ch/api";

pub const ENV_USERNAME: &str = "VSD_USERNAME";
pub const ENV_PASSWORD: &str = "VSD_PASSWORD";
pub const ENV_URL: &str = "VSD_URL";

#[derive(Error, Debug)]
pub enum Error {
    #[error("Reqwest error: {0:?}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("Serde JSON parsing error: {0:?}. Response: {1}")]
    SerdeJSONError(#[source] serde_json::Error, String),
    #[error("IO error: {0:?}")]
    IoError(#[from] io::Error),
    #[error("Download error: {0}")]
    DownloadError(#[from] downloader::Error),
    #[error("Invalid locator: {0}")]
    LocatorError(#[from] locator::Error),
    #[error("Environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("The upload path has no file name: {0}")]
    NoFileName(String),
    #[error("The server created {0} without returning its id")]
    MissingId(String),
}

#[derive(Clone, Debug)]
pub struct Connection {
    client: Client,
    url: String,
    auth: String,
}

impl Connection {
    /// Connects with a username and password.
    pub fn new(username: impl AsRef<str>, password: impl AsRef<str>) -> Self {
        let auth = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", username.as_ref(), password.as_ref()));
        Connection::with_auth_string(auth)
    }

    /// Connects with an already encoded Basic auth string.
    pub fn with_auth_string(auth: impl Into<String>) -> Self {
        Connection {
            client: Client::new(),
            url: DEFAULT_URL.to_owned(),
            auth: auth.into(),
        }
    }

    /// Reads the credentials from `VSD_USERNAME` and `VSD_PASSWORD`, and the
    /// base url from `VSD_URL` if it is set.
    pub fn from_env() -> Result<Self, Error> {
        let username = env::var(ENV_USERNAME).map_err(|_| Error::MissingEnv(ENV_USERNAME))?;
        let password = env::var(ENV_PASSWORD).map_err(|_| Error::MissingEnv(ENV_PASSWORD))?;
        let mut connection = Connection::new(username, password);
        if let Ok(url) = env::var(ENV_URL) {
            connection.set_url(url);
        }
        Ok(connection)
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        let url: String = url.into();
        self.url = url.trim_end_matches('/').to_owned();
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn auth_string(&self) -> &str {
        &self.auth
    }

    /// The locator of the object `id` on this server.
    pub fn object_url(&self, id: u64) -> String {
        format!("{}/objects/{}", self.url, id)
    }

    fn authorized(&self, method: Method, url: &str) -> RequestBuilder {
        debug!(%method, url, "request");
        self.client
            .request(method, url)
            .header("accept", "application/json")
            .header("Authorization", format!("Basic {}", self.auth))
    }

    fn endpoint(&self, request: &str) -> String {
        format!("{}{}", self.url, request)
    }

    async fn fetch<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, Error> {
        let result = req.send().await?.error_for_status()?.text().await?;
        serde_json::from_str(&result).map_err(|e| Error::SerdeJSONError(e, result))
    }

    /// GET `request` relative to the base url.
    pub async fn get_request<T: DeserializeOwned>(&self, request: &str) -> Result<T, Error> {
        self.fetch(self.authorized(Method::GET, &self.endpoint(request)))
            .await
    }

    /// OPTIONS `request` relative to the base url.
    pub async fn options_request<T: DeserializeOwned>(&self, request: &str) -> Result<T, Error> {
        self.fetch(self.authorized(Method::OPTIONS, &self.endpoint(request)))
            .await
    }

    /// POST `data` as JSON to `request` relative to the base url.
    pub async fn post_request<T: DeserializeOwned>(
        &self,
        request: &str,
        data: &impl Serialize,
    ) -> Result<T, Error> {
        self.fetch(self.authorized(Method::POST, &self.endpoint(request)).json(data))
            .await
    }

    /// PUT `data` as JSON to `request` relative to the base url.
    pub async fn put_request<T: DeserializeOwned>(
        &self,
        request: &str,
        data: &impl Serialize,
    ) -> Result<T, Error> {
        self.fetch(self.authorized(Method::PUT, &self.endpoint(request)).json(data))
            .await
    }

    /// PUT without a body to `request` relative to the base url.
    pub async fn put_request_simple<T: DeserializeOwned>(&self, request: &str) -> Result<T, Error> {
        self.fetch(self.authorized(Method::PUT, &self.endpoint(request)))
            .await
    }

    pub async fn get_object(&self, id: u64) -> Result<ObjectRecord, Error> {
        self.get_request(&format!("/objects/{}", id)).await
    }

    /// GET an absolute locator such as a `selfUrl`.
    pub async fn get_object_by_url<T: DeserializeOwned>(&self, url: &str) -> Result<T, Error> {
        self.fetch(self.authorized(Method::GET, url)).await
    }

    pub async fn get_folder_list(&self) -> Result<FolderListing, Error> {
        self.get_request("/folders").await
    }

    pub async fn get_folder(&self, id: u64) -> Result<FolderRecord, Error> {
        self.get_request(&format!("/folders/{}", id)).await
    }

    /// Ids of the objects contained in the folder `id`.
    pub async fn get_file_ids_in_folder(&self, id: u64) -> Result<Vec<u64>, Error> {
        Ok(self.get_folder(id).await?.contained_object_ids())
    }

    /// Fetches the folder listing and links it into a tree.
    pub async fn folder_tree(&self) -> Result<FolderTree, Error> {
        let listing = self.get_folder_list().await?;
        Ok(FolderTree::from_listing(&listing))
    }

    pub async fn put_folder(&self, folder: &FolderRecord) -> Result<FolderRecord, Error> {
        self.put_request("/folders", folder).await
    }

    /// Uploads a file as multipart form data.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        progress_listener: Option<ProgressListener>,
    ) -> Result<UploadResponse, Error> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|x| x.to_string_lossy().into_owned())
            .ok_or_else(|| Error::NoFileName(path.display().to_string()))?;
        let data = tokio::fs::read(path).await?;
        debug!(file = %file_name, len = data.len(), "uploading");

        let form = uploader::upload_form(file_name, data, progress_listener);
        self.fetch(
            self.authorized(Method::POST, &self.endpoint("/upload"))
                .multipart(form),
        )
        .await
    }

    /// Streams the body behind `url` into `writer`.
    pub async fn download_to<W: io::Write>(
        &self,
        url: &str,
        name: Arc<String>,
        part: usize,
        writer: W,
        progress_listener: Option<ProgressListener>,
    ) -> Result<W, Error> {
        let mut downloader = downloader::Downloader::new(progress_listener, writer);
        downloader
            .download(name, part, self.authorized(Method::GET, url))
            .await?;
        Ok(downloader.into_inner())
    }

    /// Creates an ontology relation and commits it.
    pub async fn add_ontology_relation(
        &self,
        relation: &OntologyRelation,
    ) -> Result<OntologyRelation, Error> {
        let request = format!("/object-ontologies/{}", relation.ontology_type);
        let created: OntologyRelation = self.post_request(&request, relation).await?;
        let commit = commit_request(&request, &created)?;
        let _: serde_json::Value = self.put_request_simple(&commit).await?;
        Ok(created)
    }

    /// Links two objects.
    pub async fn add_link(&self, object1: u64, object2: u64) -> Result<ObjectLink, Error> {
        let link = ObjectLink {
            id: None,
            object1: Reference::new(self.object_url(object1)),
            object2: Reference::new(self.object_url(object2)),
        };
        self.post_request("/object-links", &link).await
    }

    pub async fn put_group_right(&self, right: &GroupRight) -> Result<serde_json::Value, Error> {
        self.put_request("/object-group-rights", right).await
    }

    pub async fn put_user_right(&self, right: &UserRight) -> Result<serde_json::Value, Error> {
        self.put_request("/object-user-rights", right).await
    }
}

// A relation is only effective once it has been PUT back under its new id.
fn commit_request(request: &str, created: &OntologyRelation) -> Result<String, Error> {
    created
        .id
        .map(|id| format!("{}/{}", request, id))
        .ok_or_else(|| Error::MissingId(request.to_owned()))
}

impl ObjectSource for Connection {
    type Error = Error;

    async fn fetch_object(&self, id: u64) -> Result<ObjectRecord, Error> {
        self.get_object(id).await
    }
}
