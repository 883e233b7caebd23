//! An in-memory snapshot of the folder table.
//!
//! Load it once per operation and use it for every path lookup in that
//! operation. That keeps a listing consistent with itself, and it's a lot
//! cheaper than walking parents in the database.

use std::collections::{HashMap, HashSet};

use futures::TryStreamExt as _;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::error::{bug_msg, CatalogError};

use super::{Folder, FolderNode};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FolderMap {
    folders: HashMap<Uuid, Folder>,
}

impl FolderMap {
    pub fn new(folders: impl IntoIterator<Item = Folder>) -> Self {
        Self {
            folders: folders.into_iter().map(|f| (f.id, f)).collect(),
        }
    }

    /// Reads every folder in one scan.
    #[tracing::instrument(skip_all)]
    pub async fn load(conn: &mut SqliteConnection) -> Result<Self, CatalogError> {
        let mut rows = sqlx::query_as::<_, Folder>(
            "SELECT id, name, parent_id, created_at FROM folders",
        )
        .fetch(conn);

        let mut folders = HashMap::new();
        while let Some(folder) = rows.try_next().await? {
            folders.insert(folder.id, folder);
        }

        tracing::debug!("Loaded {} folders into the snapshot.", folders.len());
        Ok(Self { folders })
    }

    pub fn get(&self, id: &Uuid) -> Option<&Folder> {
        self.folders.get(id)
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    /// The names from the root down to (and including) the given folder.
    ///
    /// The walk stops quietly at a parent that isn't in the snapshot. An
    /// unknown `id` gives an empty path.
    pub fn resolve_path(&self, id: &Uuid) -> Vec<String> {
        let mut names = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(*id);

        while let Some(cur) = current {
            if !seen.insert(cur) {
                tracing::error!("Folder `{cur}` is its own ancestor! {}", bug_msg());
                break;
            }

            let Some(folder) = self.folders.get(&cur) else {
                break;
            };

            names.push(folder.name.clone());
            current = folder.parent_id;
        }

        names.reverse();
        names
    }

    /// Builds the folder forest. Siblings are sorted by name.
    ///
    /// A folder whose parent isn't in the snapshot shows up nowhere.
    pub fn tree(&self) -> Vec<FolderNode> {
        let mut roots = Vec::new();
        let mut children: HashMap<Uuid, Vec<&Folder>> = HashMap::new();

        for folder in self.folders.values() {
            match folder.parent_id {
                None => roots.push(folder),
                Some(parent) if self.folders.contains_key(&parent) => {
                    children.entry(parent).or_default().push(folder)
                }
                Some(parent) => tracing::warn!(
                    "Folder `{}` points to missing parent `{parent}`. Leaving it out of the tree. {}",
                    folder.id,
                    bug_msg()
                ),
            }
        }

        sort_siblings(&mut roots);
        for siblings in children.values_mut() {
            sort_siblings(siblings);
        }

        roots
            .into_iter()
            .map(|root| build_node(root, &children))
            .collect()
    }
}

fn sort_siblings(siblings: &mut [&Folder]) {
    siblings.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
}

fn build_node(folder: &Folder, children: &HashMap<Uuid, Vec<&Folder>>) -> FolderNode {
    FolderNode {
        id: folder.id,
        name: folder.name.clone(),
        parent_id: folder.parent_id,
        children: children
            .get(&folder.id)
            .map(|kids| kids.iter().map(|kid| build_node(kid, children)).collect())
            .unwrap_or_default(),
    }
}
