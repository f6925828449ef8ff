//! `vsd` is a crate to access the REST API of the Virtual Skeleton Database
//! (<https://www.virtualskeleton.ch/>), a repository for medical images and
//! their segmentations.
//!
//! These features are supported:
//! * Objects, folders, ontology relations, links and rights.
//! * Rebuilding the folder hierarchy from the flat folder listing.
//! * Uploading a segmentation and attaching it to its original image object.
//! * Downloading objects with progress reporting.
//!
//! ## Example
//!
//! To print the full path of every folder:
//! ```rust,no_run
//! # async fn run() -> Result<(), vsd::api::Error> {
//! let connection = vsd::api::Connection::new("demo@virtualskeleton.ch", "demo");
//! let tree = connection.folder_tree().await?;
//! for folder in tree.iter() {
//!     println!("{} {}", folder.id(), folder.full_name().unwrap_or(&folder.name));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! To upload a segmentation of object 42:
//! ```rust,no_run
//! # async fn run() -> Result<(), vsd::helper::Error> {
//! # let connection = vsd::api::Connection::new("demo@virtualskeleton.ch", "demo");
//! let segmentation_id = vsd::helper::upload_segmentation(
//!     &connection,
//!     42,  // the original image object
//!     "liver.nii",  // the segmentation file
//!     None,  // the progress listener
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod folder;
pub mod helper;
pub mod locator;
pub mod model;
pub mod segmentation;
pub mod transfer;

pub use api::Connection;
pub use folder::{Folder, FolderTree};
pub use segmentation::{resolve_segmentation, ObjectSource};
