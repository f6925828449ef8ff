//! Records exchanged with the VSD REST API.
//!
//! Records that the client fetches, edits and sends back keep every field
//! they don't model in `extra`, so a round trip through this crate does not
//! drop server-side data.

use super::locator;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A reference to another resource by its locator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    #[serde(rename = "selfUrl")]
    pub self_url: String,
}

impl Reference {
    pub fn new(self_url: impl Into<String>) -> Self {
        Reference {
            self_url: self_url.into(),
        }
    }

    pub fn id(&self) -> Result<u64, locator::Error> {
        locator::id_from_locator(&self.self_url)
    }
}

/// The type tag of an object.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ObjectType(pub u32);

impl ObjectType {
    /// A raw DICOM image series.
    pub const DICOM: ObjectType = ObjectType(1);
    /// A derived annotation file linked to an original image object.
    pub const SEGMENTATION: ObjectType = ObjectType(2);
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FolderRecord {
    pub id: u64,
    pub name: String,
    #[serde(rename = "parentFolder", default)]
    pub parent_folder: Option<Reference>,
    #[serde(rename = "childFolders", default)]
    pub child_folders: Option<Vec<Reference>>,
    #[serde(rename = "containedObjects", default)]
    pub contained_objects: Option<Vec<Reference>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FolderRecord {
    /// Ids of the contained objects. Locators without a numeric id are skipped.
    pub fn contained_object_ids(&self) -> Vec<u64> {
        self.contained_objects
            .iter()
            .flatten()
            .filter_map(|x| x.id().ok())
            .collect()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FolderListing {
    pub items: Vec<FolderRecord>,
    #[serde(rename = "totalCount", default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    #[serde(rename = "nextPageUrl", default, skip_serializing_if = "Option::is_none")]
    pub next_page_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ObjectRecord {
    pub id: u64,
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    #[serde(default)]
    pub files: Option<Vec<Reference>>,
    #[serde(rename = "downloadUrl", default)]
    pub download_url: Option<String>,
    #[serde(rename = "ontologyItems", default)]
    pub ontology_items: Option<Vec<Reference>>,
    #[serde(rename = "ontologyItemRelations", default)]
    pub ontology_item_relations: Option<Vec<Reference>>,
    #[serde(rename = "objectGroupRights", default)]
    pub object_group_rights: Option<Vec<Reference>>,
    #[serde(rename = "objectUserRights", default)]
    pub object_user_rights: Option<Vec<Reference>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ObjectRecord {
    pub fn first_file(&self) -> Option<&Reference> {
        self.files.as_ref().and_then(|x| x.first())
    }

    pub fn is_segmentation(&self) -> bool {
        self.object_type == ObjectType::SEGMENTATION
    }
}

/// Response of a file upload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UploadResponse {
    pub file: Reference,
    #[serde(rename = "relatedObject")]
    pub related_object: Reference,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OntologyRelation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    #[serde(rename = "type")]
    pub ontology_type: u32,
    pub object: Reference,
    #[serde(rename = "ontologyItem")]
    pub ontology_item: Reference,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OntologyItem {
    pub id: u64,
    #[serde(rename = "type")]
    pub ontology_type: u32,
    pub term: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ObjectLink {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub object1: Reference,
    pub object2: Reference,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GroupRight {
    #[serde(rename = "relatedObject")]
    pub related_object: Reference,
    #[serde(rename = "relatedGroup")]
    pub related_group: Value,
    #[serde(rename = "relatedRights")]
    pub related_rights: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserRight {
    #[serde(rename = "relatedObject")]
    pub related_object: Reference,
    #[serde(rename = "relatedUser")]
    pub related_user: Value,
    #[serde(rename = "relatedRights")]
    pub related_rights: Value,
}
