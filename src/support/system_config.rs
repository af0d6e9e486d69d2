//-
// Copyright (c) 2020, Jason Lingle
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

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The system-wide configuration for Evimail.
///
/// This is stored in a file named `evimail.toml` under the Evimail root. All
/// relative paths within are resolved against that root.
#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct SystemConfig {
    /// Where the tree database, attachments, and scratch files live.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Configuration for the outbound message bus.
    #[serde(default)]
    pub bus: BusConfig,

    /// Policy knobs for evidence ingestion.
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Configuration for live mailbox ingestion.
    #[serde(default)]
    pub live: LiveConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// The SQLite database holding evidence rows and tree nodes.
    pub tree_db: PathBuf,
    /// Root of the attachment object store.
    pub objects: PathBuf,
    /// Directory for temporary attachment files.
    ///
    /// This should be on the same file system as `objects` so that uploads
    /// can be renamed into place.
    pub scratch: PathBuf,
    /// Directory holding uploaded evidence containers, named by content hash.
    pub evidence: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            tree_db: "tree.sqlite".into(),
            objects: "objects".into(),
            scratch: "tmp".into(),
            evidence: "evidence".into(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct BusConfig {
    /// The directory batches are spooled into for the indexer.
    pub spool: PathBuf,
    /// The number of messages per published batch.
    pub batch_size: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        BusConfig {
            spool: "spool".into(),
            batch_size: 100,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestConfig {
    /// If true, failing to extract or upload any attachment aborts the
    /// ingestion of the whole evidence item.
    ///
    /// By default such failures are logged and the message is published with
    /// the attachment still listed, so that later exports report it as
    /// missing.
    pub strict_attachments: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LiveConfig {
    /// How many times a closed connection is re-established before the live
    /// ingestion gives up.
    pub max_reconnects: u32,
}

impl Default for LiveConfig {
    fn default() -> Self {
        LiveConfig { max_reconnects: 5 }
    }
}

impl StorageConfig {
    /// Return a copy with all paths resolved against `root`.
    pub fn resolve(&self, root: &Path) -> Self {
        StorageConfig {
            tree_db: root.join(&self.tree_db),
            objects: root.join(&self.objects),
            scratch: root.join(&self.scratch),
            evidence: root.join(&self.evidence),
        }
    }
}
