//! Locates the segmentation object created by a file upload.
//!
//! The upload response names a related object, but that id does not always
//! point at the finalized segmentation record yet. The record usually sits on
//! one of the following ids, so the resolver probes a small, fixed number of
//! consecutive ids and accepts the first segmentation whose first file is the
//! uploaded one.

use super::locator;
use super::model::{ObjectRecord, UploadResponse};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Number of probes used by the upload workflows.
pub const DEFAULT_MAX_PROBES: usize = 3;

/// Anything objects can be fetched from by id.
#[allow(async_fn_in_trait)]
pub trait ObjectSource {
    type Error;

    async fn fetch_object(&self, id: u64) -> Result<ObjectRecord, Self::Error>;
}

#[derive(Error, Debug)]
pub enum Error<E: std::error::Error + 'static> {
    #[error("The related object locator of the upload is invalid")]
    Locator(#[from] locator::Error),
    #[error("Fetching object {id} failed")]
    Fetch {
        id: u64,
        #[source]
        source: E,
    },
    #[error("No segmentation object for file {file} within {probes} probes starting at object {start}")]
    NotFound {
        start: u64,
        probes: usize,
        file: String,
    },
}

/// Returns true if `object` is the segmentation record of `upload`.
pub fn matches_upload(object: &ObjectRecord, upload: &UploadResponse) -> bool {
    object.is_segmentation()
        && object
            .first_file()
            .map(|x| x.self_url == upload.file.self_url)
            .unwrap_or(false)
}

/// Probes the ids `start, start + 1, ..` for at most `max_probes` fetches,
/// where `start` is the id of the upload's related object, and returns the
/// first id whose record [matches](matches_upload) the upload.
///
/// A fetch failure stops the probing and is returned as is.
pub async fn resolve_segmentation<S>(
    source: &S,
    upload: &UploadResponse,
    max_probes: usize,
) -> Result<u64, Error<S::Error>>
where
    S: ObjectSource,
    S::Error: std::error::Error + 'static,
{
    let start = upload.related_object.id()?;

    let mut probes = 0;
    while probes < max_probes {
        let Some(id) = start.checked_add(probes as u64) else {
            break;
        };
        probes += 1;

        debug!(id, probe = probes, max_probes, "probing for segmentation object");
        let object = source
            .fetch_object(id)
            .await
            .map_err(|source| Error::Fetch { id, source })?;

        if matches_upload(&object, upload) {
            info!(id, file = %upload.file.self_url, "found segmentation object");
            return Ok(id);
        }
    }

    warn!(start, probes, file = %upload.file.self_url, "segmentation object not found");
    Err(Error::NotFound {
        start,
        probes,
        file: upload.file.self_url.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ObjectType, Reference};
    use serde_json::Map;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const FILE: &str = "https://www.virtualskeleton.ch/api/files/900";

    #[derive(Error, Debug)]
    #[error("connection refused")]
    struct Offline;

    #[derive(Default)]
    struct FakeServer {
        objects: HashMap<u64, ObjectRecord>,
        offline: Vec<u64>,
        calls: Mutex<Vec<u64>>,
    }

    impl FakeServer {
        fn with(mut self, id: u64, object_type: ObjectType, file: &str) -> Self {
            self.objects.insert(
                id,
                ObjectRecord {
                    id,
                    object_type,
                    files: Some(vec![Reference::new(file)]),
                    download_url: None,
                    ontology_items: None,
                    ontology_item_relations: None,
                    object_group_rights: None,
                    object_user_rights: None,
                    extra: Map::new(),
                },
            );
            self
        }

        fn calls(&self) -> Vec<u64> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ObjectSource for FakeServer {
        type Error = Offline;

        async fn fetch_object(&self, id: u64) -> Result<ObjectRecord, Offline> {
            self.calls.lock().unwrap().push(id);
            if self.offline.contains(&id) {
                return Err(Offline);
            }
            Ok(self.objects.get(&id).cloned().unwrap_or(ObjectRecord {
                id,
                object_type: ObjectType::DICOM,
                files: None,
                download_url: None,
                ontology_items: None,
                ontology_item_relations: None,
                object_group_rights: None,
                object_user_rights: None,
                extra: Map::new(),
            }))
        }
    }

    fn upload(related: u64) -> UploadResponse {
        UploadResponse {
            file: Reference::new(FILE),
            related_object: Reference::new(format!(
                "https://www.virtualskeleton.ch/api/objects/{}",
                related
            )),
            extra: Map::new(),
        }
    }

    #[tokio::test]
    async fn first_probe_matches() {
        let server = FakeServer::default().with(40, ObjectType::SEGMENTATION, FILE);
        let id = resolve_segmentation(&server, &upload(40), DEFAULT_MAX_PROBES)
            .await
            .unwrap();
        assert_eq!(id, 40);
        assert_eq!(server.calls(), vec![40]);
    }

    #[tokio::test]
    async fn later_probe_matches() {
        let server = FakeServer::default()
            .with(40, ObjectType::DICOM, FILE)
            .with(41, ObjectType::SEGMENTATION, "https://www.virtualskeleton.ch/api/files/1")
            .with(42, ObjectType::SEGMENTATION, FILE);
        let id = resolve_segmentation(&server, &upload(40), 3).await.unwrap();
        assert_eq!(id, 42);
        assert_eq!(server.calls(), vec![40, 41, 42]);
    }

    #[tokio::test]
    async fn exhausted_probes_fail() {
        let server = FakeServer::default().with(43, ObjectType::SEGMENTATION, FILE);
        let err = resolve_segmentation(&server, &upload(40), 3).await.unwrap_err();
        assert!(matches!(
            err,
            Error::NotFound {
                start: 40,
                probes: 3,
                ..
            }
        ));
        assert_eq!(server.calls(), vec![40, 41, 42]);
    }

    #[tokio::test]
    async fn fetch_errors_stop_probing() {
        let server = FakeServer {
            offline: vec![41],
            ..Default::default()
        };
        let err = resolve_segmentation(&server, &upload(40), 3).await.unwrap_err();
        assert!(matches!(err, Error::Fetch { id: 41, source: Offline }));
        assert_eq!(server.calls(), vec![40, 41]);
    }

    #[tokio::test]
    async fn invalid_related_object() {
        let server = FakeServer::default();
        let mut response = upload(1);
        response.related_object = Reference::new("https://www.virtualskeleton.ch/api/objects/");
        let err = resolve_segmentation(&server, &response, 3).await.unwrap_err();
        assert!(matches!(err, Error::Locator(_)));
        assert!(server.calls().is_empty());
    }

    #[tokio::test]
    async fn zero_probes_fetch_nothing() {
        let server = FakeServer::default().with(40, ObjectType::SEGMENTATION, FILE);
        let err = resolve_segmentation(&server, &upload(40), 0).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { probes: 0, .. }));
        assert!(server.calls().is_empty());
    }
}
