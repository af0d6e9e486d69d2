//-
// Copyright (c) 2026, The Evimail Developers
//
// This file is part of Evimail.
//
// Evimail is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Evimail is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Evimail. If not, see <http://www.gnu.org/licenses/>.

use crate::model::{Evidence, FolderId, TreeNode};
use crate::store::TreeStore;
use crate::support::error::Error;

/// Index of a node within a `FolderTreeBuilder`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(usize);

/// Reconstructs the folder hierarchy of one evidence item.
///
/// Nodes are held in an arena and linked to their parent by index. Every
/// node is persisted the moment it is created, and a node can only be
/// created under a node that already exists in the arena, so the store
/// never sees a child before its parent.
pub struct FolderTreeBuilder<'a> {
    store: &'a mut dyn TreeStore,
    nodes: Vec<(TreeNode, Option<Slot>)>,
}

impl<'a> FolderTreeBuilder<'a> {
    pub fn new(store: &'a mut dyn TreeStore) -> Self {
        FolderTreeBuilder {
            store,
            nodes: Vec::new(),
        }
    }

    /// Create and persist the synthetic root for `evidence`.
    pub fn plant_root(&mut self, evidence: &Evidence) -> Result<Slot, Error> {
        self.insert(TreeNode::root(evidence), None)
    }

    /// Create and persist a folder named `title` under `parent`.
    pub fn add_child(
        &mut self,
        parent: Slot,
        title: String,
    ) -> Result<Slot, Error> {
        let node = self.nodes[parent.0].0.child(title);
        self.insert(node, Some(parent))
    }

    fn insert(
        &mut self,
        node: TreeNode,
        parent: Option<Slot>,
    ) -> Result<Slot, Error> {
        self.store.save_node(&node)?;
        self.nodes.push((node, parent));
        Ok(Slot(self.nodes.len() - 1))
    }

    pub fn node(&self, slot: Slot) -> &TreeNode {
        &self.nodes[slot.0].0
    }

    pub fn id(&self, slot: Slot) -> &FolderId {
        &self.node(slot).id
    }

    pub fn parent(&self, slot: Slot) -> Option<Slot> {
        self.nodes[slot.0].1
    }

    /// The titles from the root down to `slot`, inclusive.
    pub fn path(&self, slot: Slot) -> Vec<&str> {
        let mut path = Vec::new();
        let mut cursor = Some(slot);
        while let Some(s) = cursor {
            path.push(self.node(s).title.as_str());
            cursor = self.parent(s);
        }
        path.reverse();
        path
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}
