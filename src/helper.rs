//! Multi-step workflows built on [`Connection`].

use super::api::{self, Connection};
use super::model::*;
use super::segmentation::{self, resolve_segmentation, DEFAULT_MAX_PROBES};
use super::transfer::ProgressListener;
use thiserror::Error;
use tracing::{debug, info};

use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

#[derive(Error, Debug)]
pub enum Error {
    #[error("API error")]
    ApiError(#[from] api::Error),
    #[error("Segmentation lookup error")]
    SegmentationError(#[from] segmentation::Error<api::Error>),
    #[error("IO error")]
    IoError(#[from] io::Error),
    #[error("Serde JSON error")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("Object {0} has nothing to download")]
    NothingToDownload(u64),
}

/// Adds the object `object_id` to the contained objects of folder `folder_id`.
pub async fn add_file_to_folder(
    connection: &Connection,
    object_id: u64,
    folder_id: u64,
) -> Result<FolderRecord, Error> {
    let folder = connection.get_folder(folder_id).await?;
    let folder = with_contained_object(folder, connection.object_url(object_id));
    debug!(folder = folder_id, object = object_id, "adding object to folder");
    Ok(connection.put_folder(&folder).await?)
}

/// Appends `object_url` to the contained objects of `folder`, starting a new
/// list if the folder had none.
pub fn with_contained_object(mut folder: FolderRecord, object_url: String) -> FolderRecord {
    folder
        .contained_objects
        .get_or_insert_with(Vec::new)
        .push(Reference::new(object_url));
    folder
}

/// Attaches the ontology item `ontology_id` of type `ontology_type` to an
/// object, after its existing relations.
pub async fn add_ontology_by_type_and_id(
    connection: &Connection,
    object_id: u64,
    ontology_type: u32,
    ontology_id: u64,
) -> Result<OntologyRelation, Error> {
    let object = connection.get_object(object_id).await?;
    let relation = appended_relation(&object, connection.url(), ontology_type, ontology_id);
    Ok(connection.add_ontology_relation(&relation).await?)
}

/// A new relation from `object` to an ontology item, positioned after the
/// relations the object already has.
pub fn appended_relation(
    object: &ObjectRecord,
    base_url: &str,
    ontology_type: u32,
    ontology_id: u64,
) -> OntologyRelation {
    let position = object
        .ontology_item_relations
        .as_ref()
        .map(|x| x.len())
        .unwrap_or(0);

    OntologyRelation {
        id: None,
        position: Some(position),
        ontology_type,
        object: Reference::new(format!("{}/objects/{}", base_url, object.id)),
        ontology_item: Reference::new(format!(
            "{}/ontologies/{}/{}",
            base_url, ontology_type, ontology_id
        )),
    }
}

/// Uploads a segmentation of the object `object_id` and returns the id of the
/// new segmentation object.
///
/// The new object is linked to the original one and receives a copy of every
/// ontology relation of the original.
pub async fn upload_segmentation(
    connection: &Connection,
    object_id: u64,
    path: impl AsRef<Path>,
    progress_listener: Option<ProgressListener>,
) -> Result<u64, Error> {
    let original = connection.get_object(object_id).await?;

    let upload = connection.upload_file(path, progress_listener).await?;
    let segmentation_id = resolve_segmentation(connection, &upload, DEFAULT_MAX_PROBES).await?;

    connection.add_link(object_id, segmentation_id).await?;

    for relation in original.ontology_item_relations.iter().flatten() {
        let existing: OntologyRelation = connection.get_object_by_url(&relation.self_url).await?;
        let copy = relation_for(existing, connection.object_url(segmentation_id));
        connection.add_ontology_relation(&copy).await?;
    }

    info!(object = object_id, segmentation = segmentation_id, "uploaded segmentation");
    Ok(segmentation_id)
}

/// The relation `existing` re-pointed at `object_url`, as a new unpositioned
/// relation.
pub fn relation_for(existing: OntologyRelation, object_url: String) -> OntologyRelation {
    OntologyRelation {
        id: None,
        position: None,
        ontology_type: existing.ontology_type,
        object: Reference::new(object_url),
        ontology_item: existing.ontology_item,
    }
}

/// Grants the object `object_id` every group and user right the object
/// `reference_id` has.
pub async fn set_rights_based_on_reference_object(
    connection: &Connection,
    object_id: u64,
    reference_id: u64,
) -> Result<(), Error> {
    let reference = connection.get_object(reference_id).await?;
    let object_url = connection.object_url(object_id);

    for right in reference.object_group_rights.iter().flatten() {
        let existing: GroupRight = connection.get_object_by_url(&right.self_url).await?;
        connection
            .put_group_right(&retarget_group_right(existing, object_url.clone()))
            .await?;
    }

    for right in reference.object_user_rights.iter().flatten() {
        let existing: UserRight = connection.get_object_by_url(&right.self_url).await?;
        connection
            .put_user_right(&retarget_user_right(existing, object_url.clone()))
            .await?;
    }

    debug!(object = object_id, reference = reference_id, "copied rights");
    Ok(())
}

/// The group right `existing` granted on `object_url` instead.
pub fn retarget_group_right(existing: GroupRight, object_url: String) -> GroupRight {
    GroupRight {
        related_object: Reference::new(object_url),
        ..existing
    }
}

/// The user right `existing` granted on `object_url` instead.
pub fn retarget_user_right(existing: UserRight, object_url: String) -> UserRight {
    UserRight {
        related_object: Reference::new(object_url),
        ..existing
    }
}

/// The local base name of a downloaded object: its ontology terms with spaces
/// replaced by underscores, a dash, and the object id.
pub fn object_base_name(terms: &[String], id: u64) -> String {
    let mut name = terms
        .iter()
        .map(|x| x.replace(' ', "_"))
        .collect::<String>();
    name.push('-');
    name.push_str(&id.to_string());
    name
}

/// Where each file of `object` goes, as `(url, local path)` pairs.
///
/// DICOM objects get a directory named after `base` with one `.dcm` file per
/// object file, anything else is a single `.nii` file next to it.
pub fn download_targets(object: &ObjectRecord, base: &str, output_dir: &Path) -> Vec<(String, PathBuf)> {
    let files = object.files.as_deref().unwrap_or_default();

    if object.object_type == ObjectType::DICOM {
        let dir = output_dir.join(base);
        files
            .iter()
            .enumerate()
            .map(|(i, file)| {
                (
                    format!("{}/download", file.self_url),
                    dir.join(format!("{}_{}.dcm", base, i)),
                )
            })
            .collect()
    } else {
        object
            .download_url
            .clone()
            .or_else(|| files.first().map(|x| format!("{}/download", x.self_url)))
            .map(|url| vec![(url, output_dir.join(format!("{}.nii", base)))])
            .unwrap_or_default()
    }
}

/// Downloads every file of the object `id` into `output_dir` and writes the
/// object record next to them as JSON. Returns the written data files.
pub async fn download_object(
    connection: &Connection,
    id: u64,
    output_dir: impl AsRef<Path>,
    progress_listener: Option<ProgressListener>,
) -> Result<Vec<PathBuf>, Error> {
    let output_dir = output_dir.as_ref();
    tokio::fs::create_dir_all(output_dir).await?;

    let object = connection.get_object(id).await?;

    let mut terms = vec![];
    for item in object.ontology_items.iter().flatten() {
        let item: OntologyItem = connection.get_object_by_url(&item.self_url).await?;
        terms.push(item.term);
    }
    let base = object_base_name(&terms, id);

    let targets = download_targets(&object, &base, output_dir);
    if targets.is_empty() {
        return Err(Error::NothingToDownload(id));
    }

    let name = Arc::new(base.clone());
    let mut written = vec![];
    for (part, (url, path)) in targets.into_iter().enumerate() {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        debug!(url = %url, path = %path.display(), "downloading");
        let file = File::create(&path)?;
        connection
            .download_to(&url, name.clone(), part, file, progress_listener.clone())
            .await?;
        written.push(path);
    }

    tokio::fs::write(output_dir.join(format!("{}.json", base)), serde_json::to_vec(&object)?).await?;

    info!(object = id, files = written.len(), "downloaded object");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: serde_json::Value) -> ObjectRecord {
        serde_json::from_value(value).unwrap()
    }

    const URL: &str = "https://www.virtualskeleton.ch/api";

    fn folder(value: serde_json::Value) -> FolderRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn contained_objects_list_is_created() {
        let empty = folder(json!({"id": 3, "name": "Liver", "containedObjects": null, "level": 1}));
        let updated = with_contained_object(empty, format!("{}/objects/9", URL));
        assert_eq!(
            serde_json::to_value(&updated).unwrap(),
            json!({
                "id": 3,
                "name": "Liver",
                "level": 1,
                "parentFolder": null,
                "childFolders": null,
                "containedObjects": [{"selfUrl": "https://www.virtualskeleton.ch/api/objects/9"}],
            })
        );

        let filled = folder(json!({
            "id": 4,
            "name": "Knee",
            "containedObjects": [{"selfUrl": "https://www.virtualskeleton.ch/api/objects/1"}],
        }));
        let updated = with_contained_object(filled, format!("{}/objects/2", URL));
        assert_eq!(updated.contained_object_ids(), vec![1, 2]);
    }

    #[test]
    fn appended_relation_follows_existing_ones() {
        let with_two = object(json!({
            "id": 12,
            "type": 1,
            "ontologyItemRelations": [
                {"selfUrl": "https://www.virtualskeleton.ch/api/object-ontologies/0/1"},
                {"selfUrl": "https://www.virtualskeleton.ch/api/object-ontologies/0/2"},
            ],
        }));
        let relation = appended_relation(&with_two, URL, 0, 1234);
        assert_eq!(relation.id, None);
        assert_eq!(relation.position, Some(2));
        assert_eq!(relation.ontology_type, 0);
        assert_eq!(relation.object.self_url, "https://www.virtualskeleton.ch/api/objects/12");
        assert_eq!(
            relation.ontology_item.self_url,
            "https://www.virtualskeleton.ch/api/ontologies/0/1234"
        );

        let without = object(json!({"id": 13, "type": 1, "ontologyItemRelations": null}));
        assert_eq!(appended_relation(&without, URL, 0, 1).position, Some(0));
    }

    #[test]
    fn relations_are_copied_onto_the_segmentation() {
        let existing = OntologyRelation {
            id: Some(77),
            position: Some(3),
            ontology_type: 0,
            object: Reference::new(format!("{}/objects/12", URL)),
            ontology_item: Reference::new(format!("{}/ontologies/0/1234", URL)),
        };
        let copy = relation_for(existing, format!("{}/objects/40", URL));
        assert_eq!(
            serde_json::to_value(&copy).unwrap(),
            json!({
                "type": 0,
                "object": {"selfUrl": "https://www.virtualskeleton.ch/api/objects/40"},
                "ontologyItem": {"selfUrl": "https://www.virtualskeleton.ch/api/ontologies/0/1234"},
            })
        );
    }

    #[test]
    fn rights_are_retargeted() {
        let group: GroupRight = serde_json::from_value(json!({
            "relatedObject": {"selfUrl": "https://www.virtualskeleton.ch/api/objects/12"},
            "relatedGroup": {"selfUrl": "https://www.virtualskeleton.ch/api/groups/5"},
            "relatedRights": [{"selfUrl": "https://www.virtualskeleton.ch/api/object_rights/2"}],
        }))
        .unwrap();
        let moved = retarget_group_right(group.clone(), format!("{}/objects/40", URL));
        assert_eq!(moved.related_object.self_url, "https://www.virtualskeleton.ch/api/objects/40");
        assert_eq!(moved.related_group, group.related_group);
        assert_eq!(moved.related_rights, group.related_rights);

        let user: UserRight = serde_json::from_value(json!({
            "relatedObject": {"selfUrl": "https://www.virtualskeleton.ch/api/objects/12"},
            "relatedUser": {"selfUrl": "https://www.virtualskeleton.ch/api/users/8"},
            "relatedRights": [{"selfUrl": "https://www.virtualskeleton.ch/api/object_rights/1"}],
        }))
        .unwrap();
        let moved = retarget_user_right(user.clone(), format!("{}/objects/40", URL));
        assert_eq!(moved.related_object.self_url, "https://www.virtualskeleton.ch/api/objects/40");
        assert_eq!(moved.related_user, user.related_user);
        assert_eq!(moved.related_rights, user.related_rights);
    }

    #[test]
    fn base_name_from_terms() {
        let terms = vec!["left femur".to_owned(), "CT".to_owned()];
        assert_eq!(object_base_name(&terms, 12), "left_femurCT-12");
        assert_eq!(object_base_name(&[], 12), "-12");
    }

    #[test]
    fn dicom_files_go_into_a_directory() {
        let object = object(json!({
            "id": 12,
            "type": 1,
            "files": [
                {"selfUrl": "https://host/api/files/1"},
                {"selfUrl": "https://host/api/files/2"},
            ],
        }));
        let dir = tempfile::tempdir().unwrap();
        let targets = download_targets(&object, "CT-12", dir.path());
        assert_eq!(
            targets,
            vec![
                (
                    "https://host/api/files/1/download".to_owned(),
                    dir.path().join("CT-12").join("CT-12_0.dcm")
                ),
                (
                    "https://host/api/files/2/download".to_owned(),
                    dir.path().join("CT-12").join("CT-12_1.dcm")
                ),
            ]
        );
    }

    #[test]
    fn other_objects_download_once() {
        let with_url = object(json!({
            "id": 30,
            "type": 2,
            "downloadUrl": "https://host/api/objects/30/download",
            "files": [
                {"selfUrl": "https://host/api/files/5"},
                {"selfUrl": "https://host/api/files/6"},
            ],
        }));
        let out = Path::new("out");
        assert_eq!(
            download_targets(&with_url, "-30", out),
            vec![(
                "https://host/api/objects/30/download".to_owned(),
                out.join("-30.nii")
            )]
        );

        let without_url = object(json!({
            "id": 31,
            "type": 2,
            "files": [{"selfUrl": "https://host/api/files/7"}],
        }));
        assert_eq!(
            download_targets(&without_url, "-31", out)[0].0,
            "https://host/api/files/7/download"
        );

        let empty = object(json!({"id": 32, "type": 2}));
        assert!(download_targets(&empty, "-32", out).is_empty());
    }
}
