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

//! The collaborators the pipeline persists into and reads back from.
//!
//! Each is a trait so that ingestion can run against the local
//! implementations in this module as well as test fakes.

use std::fmt;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::model::*;
use crate::support::error::Error;

pub mod object_store;
pub mod spool;
pub mod tree_db;

/// Relational storage of evidence records and the folder forest.
pub trait TreeStore {
    /// Insert `evidence`, or update the `parsed` flag of an existing record.
    fn save_evidence(&mut self, evidence: &Evidence) -> Result<(), Error>;
    fn load_evidence(
        &mut self,
        id: &EvidenceId,
    ) -> Result<Option<Evidence>, Error>;
    /// Find the evidence record of `project` whose container has the given
    /// content hash.
    fn find_evidence(
        &mut self,
        project: &ProjectId,
        file_hash: &str,
    ) -> Result<Option<Evidence>, Error>;
    /// Insert `node`. Its parent, if any, must already have been saved.
    fn save_node(&mut self, node: &TreeNode) -> Result<(), Error>;
    /// Delete every node belonging to `evidence`, returning how many there
    /// were.
    fn discard_nodes(&mut self, evidence: &EvidenceId) -> Result<usize, Error>;
    fn root_nodes(&mut self, project: &ProjectId)
        -> Result<Vec<TreeNode>, Error>;
    fn children(&mut self, node: &FolderId) -> Result<Vec<TreeNode>, Error>;

    /// Build the views of every descendant of `node`.
    fn walk(&mut self, node: &FolderId) -> Result<Vec<TreeNodeView>, Error> {
        let mut views = Vec::new();
        for child in self.children(node)? {
            let children = self.walk(&child.id)?;
            views.push(TreeNodeView {
                value: child.id,
                label: child.title,
                children,
            });
        }
        Ok(views)
    }

    /// The IDs of every descendant of `node`, in pre-order.
    fn walk_ids(&mut self, node: &FolderId) -> Result<Vec<FolderId>, Error> {
        let mut ids = Vec::new();
        let mut stack = self.children(node)?;
        stack.reverse();
        while let Some(next) = stack.pop() {
            let mut children = self.children(&next.id)?;
            children.reverse();
            stack.extend(children);
            ids.push(next.id);
        }
        Ok(ids)
    }
}

/// One folder, with its descendants, as presented to a reviewer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TreeNodeView {
    pub value: FolderId,
    pub label: String,
    pub children: Vec<TreeNodeView>,
}

/// Names one stored attachment.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    pub project: ProjectId,
    pub attachment: AttachmentId,
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.project, self.attachment)
    }
}

/// Durable storage of attachment payloads.
pub trait AttachmentSink {
    /// Store the content of the file at `src` under `key`.
    fn put(&self, key: &ObjectKey, src: &Path) -> Result<ObjectKey, Error>;
    /// Open the content stored under `key`.
    ///
    /// Fails with `Error::ObjectNotFound` if nothing is stored there.
    fn get(&self, key: &ObjectKey) -> Result<Box<dyn Read>, Error>;
}

/// One record handed to the message bus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusRecord {
    pub key: String,
    pub payload: Vec<u8>,
}

impl BusRecord {
    pub fn for_message(message: &Message) -> Result<Self, Error> {
        Ok(BusRecord {
            key: message.id.to_string(),
            payload: message.payload()?,
        })
    }
}

/// The batched channel to the indexer.
pub trait MessageBus {
    /// Publish `batch` as one unit. Delivery to consumers happens
    /// asynchronously; this does not wait for it.
    fn publish_batch(&self, batch: &[BusRecord]) -> Result<(), Error>;
}

/// Read access to the indexed messages.
pub trait Corpus {
    fn messages(&self, project: &ProjectId) -> Result<Vec<Message>, Error>;
}
