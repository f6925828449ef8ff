//! Folder tree reconstruction.
//!
//! The server returns folders as a flat listing in which every record refers
//! to its parent and children by locator. [`FolderTree::build`] links those
//! records into a tree owned by a single id-keyed map. Parent and child links
//! are ids into that map.

use super::model::{FolderListing, FolderRecord};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct Folder {
    id: u64,
    pub name: String,
    parent: Option<u64>,
    children: Vec<u64>,
    contained_objects: Option<BTreeMap<u64, String>>,
    full_name: OnceLock<String>,
}

impl Folder {
    fn new(id: u64, name: String) -> Self {
        Folder {
            id,
            name,
            parent: None,
            children: vec![],
            contained_objects: None,
            full_name: OnceLock::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn parent(&self) -> Option<u64> {
        self.parent
    }

    pub fn children(&self) -> &[u64] {
        &self.children
    }

    /// Object id to locator, if the source record listed contained objects.
    pub fn contained_objects(&self) -> Option<&BTreeMap<u64, String>> {
        self.contained_objects.as_ref()
    }

    /// The memoized full path, `None` until it has been resolved by the tree.
    pub fn full_name(&self) -> Option<&str> {
        self.full_name.get().map(String::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FolderTree {
    folders: HashMap<u64, Folder>,
}

impl FolderTree {
    /// Builds the tree from a flat listing.
    ///
    /// References to ids that are not part of `records` are dropped, and so
    /// are contained-object locators without a numeric id. A parent link that
    /// would close a cycle is rejected, so the parent links always form a
    /// forest. Every full name is resolved before returning.
    pub fn build(records: &[FolderRecord]) -> Self {
        let mut tree = FolderTree::default();

        let mut accepted = Vec::with_capacity(records.len());
        for record in records {
            if tree.folders.contains_key(&record.id) {
                warn!(folder = record.id, "duplicate folder id in listing, keeping the first record");
                continue;
            }
            tree.folders
                .insert(record.id, Folder::new(record.id, record.name.clone()));
            accepted.push(record);
        }

        for record in accepted {
            tree.link(record);
        }

        let ids = tree.folders.keys().copied().collect::<Vec<_>>();
        for id in ids {
            tree.full_name(id);
        }

        debug!(folders = tree.folders.len(), "built folder tree");
        tree
    }

    pub fn from_listing(listing: &FolderListing) -> Self {
        FolderTree::build(&listing.items)
    }

    fn link(&mut self, record: &FolderRecord) {
        let id = record.id;

        for child in record.child_folders.iter().flatten() {
            match child.id() {
                Ok(child_id) if self.folders.contains_key(&child_id) => {
                    if let Some(folder) = self.folders.get_mut(&id) {
                        folder.children.push(child_id);
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(folder = id, error = %e, "skipping child folder reference"),
            }
        }

        if let Some(parent) = record.parent_folder.as_ref() {
            match parent.id() {
                Ok(parent_id) if self.folders.contains_key(&parent_id) => {
                    if self.is_ancestor_or_self(id, parent_id) {
                        warn!(folder = id, parent = parent_id, "rejecting parent link that closes a cycle");
                    } else if let Some(folder) = self.folders.get_mut(&id) {
                        folder.parent = Some(parent_id);
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(folder = id, error = %e, "skipping parent folder reference"),
            }
        }

        if let Some(objects) = record.contained_objects.as_ref() {
            let mut contained = BTreeMap::new();
            for object in objects {
                match object.id() {
                    Ok(object_id) => {
                        contained.insert(object_id, object.self_url.clone());
                    }
                    Err(e) => warn!(folder = id, error = %e, "skipping contained object reference"),
                }
            }
            if let Some(folder) = self.folders.get_mut(&id) {
                folder.contained_objects = Some(contained);
            }
        }
    }

    // Walks the parent chain starting at `from`. Parent links form a forest,
    // so the walk ends at a root.
    fn is_ancestor_or_self(&self, id: u64, from: u64) -> bool {
        let mut cursor = Some(from);
        while let Some(current) = cursor {
            if current == id {
                return true;
            }
            cursor = self.folders.get(&current).and_then(|x| x.parent);
        }
        false
    }

    /// Resolves the full path of a folder, memoizing it and every uncached
    /// ancestor on the way.
    pub fn full_name(&self, id: u64) -> Option<&str> {
        let folder = self.folders.get(&id)?;
        if let Some(name) = folder.full_name() {
            return Some(name);
        }

        let mut chain = vec![folder];
        let mut prefix: Option<&str> = None;
        let mut cursor = folder.parent;
        while let Some(parent_id) = cursor {
            let Some(parent) = self.folders.get(&parent_id) else {
                break;
            };
            if let Some(name) = parent.full_name() {
                prefix = Some(name);
                break;
            }
            chain.push(parent);
            cursor = parent.parent;
        }

        for node in chain.into_iter().rev() {
            let resolved = node.full_name.get_or_init(|| match prefix {
                Some(p) => format!("{}/{}", p, node.name),
                None => node.name.clone(),
            });
            prefix = Some(resolved.as_str());
        }
        prefix
    }

    pub fn get(&self, id: u64) -> Option<&Folder> {
        self.folders.get(&id)
    }

    /// Mutable access to a folder. Already resolved full names are kept.
    pub fn get_mut(&mut self, id: u64) -> Option<&mut Folder> {
        self.folders.get_mut(&id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.folders.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Folder> {
        self.folders.values()
    }

    pub fn parent(&self, id: u64) -> Option<&Folder> {
        self.folders
            .get(&id)
            .and_then(|x| x.parent)
            .and_then(|x| self.folders.get(&x))
    }

    pub fn children(&self, id: u64) -> impl Iterator<Item = &Folder> {
        self.folders
            .get(&id)
            .map(|x| x.children.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|x| self.folders.get(x))
    }

    /// Folders without a parent, ordered by id.
    pub fn roots(&self) -> Vec<&Folder> {
        let mut roots = self
            .folders
            .values()
            .filter(|x| x.parent.is_none())
            .collect::<Vec<_>>();
        roots.sort_by_key(|x| x.id);
        roots
    }

    /// Number of ancestors of a folder.
    pub fn depth(&self, id: u64) -> Option<usize> {
        let mut folder = self.folders.get(&id)?;
        let mut depth = 0;
        while let Some(parent) = folder.parent.and_then(|x| self.folders.get(&x)) {
            depth += 1;
            folder = parent;
        }
        Some(depth)
    }

    /// The folder with the lowest id whose full name equals `path`.
    pub fn find_by_path(&self, path: &str) -> Option<&Folder> {
        self.folders
            .values()
            .filter(|x| self.full_name(x.id) == Some(path))
            .min_by_key(|x| x.id)
    }

    fn fmt_folder(
        &self,
        f: &mut fmt::Formatter<'_>,
        folder: &Folder,
        indent: usize,
        visited: &mut HashSet<u64>,
    ) -> fmt::Result {
        if !visited.insert(folder.id) {
            return Ok(());
        }
        writeln!(f, "{:indent$}{} [{}]", "", folder.name, folder.id, indent = indent * 2)?;
        for child in self.children(folder.id) {
            self.fmt_folder(f, child, indent + 1, visited)?;
        }
        Ok(())
    }
}

impl fmt::Display for FolderTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut visited = HashSet::new();
        for root in self.roots() {
            self.fmt_folder(f, root, 0, &mut visited)?;
        }
        Ok(())
    }
}
