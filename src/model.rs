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

//! Core records produced and consumed by ingestion.

use std::fmt;
use std::path::Path;

use rand::{rngs::OsRng, Rng};
use serde::{Deserialize, Serialize};

use crate::support::error::Error;
use crate::support::file_ops;

/// The value the indexer treats as an explicit null.
///
/// The indexer rejects truly empty strings as missing fields, so every blank
/// string field is replaced with this before publication.
pub const NULL_SENTINEL: &str = "NULL";

/// The name given to attachments whose source supplies none.
pub const UNNAMED_ATTACHMENT: &str = "EMPTY_FILENAME";

fn new_id() -> String {
    format!("{:032x}", OsRng.gen::<u128>())
}

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Allocate a fresh, random identity.
            pub fn generate() -> Self {
                $name(new_id())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

id_type!(
    /// Identifies a project, the namespace all other records live in.
    ProjectId
);
id_type!(EvidenceId);
id_type!(
    /// Identifies one `TreeNode`, i.e. one reconstructed folder.
    FolderId
);
id_type!(
    /// Identifies one canonical message record.
    ///
    /// This is distinct from the `Message-ID` header, which is neither
    /// mandatory nor unique across folders.
    RecordId
);
id_type!(AttachmentId);

/// One ingested container.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub id: EvidenceId,
    pub project: ProjectId,
    /// Hex SHA3-256 of the container.
    pub file_hash: String,
    /// The stored file name, `<upload id>-<original name>`.
    pub file_name: String,
    /// Set exactly once, when ingestion completes successfully.
    pub parsed: bool,
}

impl Evidence {
    pub fn new(
        project: ProjectId,
        file_hash: String,
        original_name: &str,
    ) -> Self {
        let id = EvidenceId::generate();
        let file_name = format!("{}-{}", id, original_name);
        Evidence {
            id,
            project,
            file_hash,
            file_name,
            parsed: false,
        }
    }

    /// Create an evidence record for the container at `src`, hashing its
    /// content.
    pub fn register(
        project: ProjectId,
        src: &Path,
        original_name: &str,
    ) -> Result<Self, Error> {
        let hash = file_ops::sha3_hex(std::fs::File::open(src)?)?;
        Ok(Evidence::new(project, hash, original_name))
    }

    /// The name shown for the evidence, i.e. the file name without the
    /// upload prefix.
    pub fn display_name(&self) -> &str {
        match self.file_name.split_once('-') {
            Some((_, rest)) if !rest.is_empty() => rest,
            _ => &self.file_name,
        }
    }

    /// The lower-cased extension of the file name, including the leading
    /// dot.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()))
    }
}

/// One folder of the reconstructed hierarchy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: FolderId,
    pub evidence: EvidenceId,
    pub project: ProjectId,
    pub title: String,
    /// `None` for the synthetic root of an evidence item.
    pub parent: Option<FolderId>,
}

impl TreeNode {
    /// Create the synthetic root node for `evidence`.
    pub fn root(evidence: &Evidence) -> Self {
        TreeNode {
            id: FolderId::generate(),
            evidence: evidence.id.clone(),
            project: evidence.project.clone(),
            title: evidence.display_name().to_owned(),
            parent: None,
        }
    }

    /// Create a node for a folder directly beneath `self`.
    pub fn child(&self, title: String) -> Self {
        TreeNode {
            id: FolderId::generate(),
            evidence: self.evidence.clone(),
            project: self.project.clone(),
            title,
            parent: Some(self.id.clone()),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "uuid")]
    pub id: AttachmentId,
    pub name: String,
}

/// The canonical, format-independent message record.
///
/// The serialised form of this is the payload published to the bus. Blank
/// strings and absent values are written as `NULL_SENTINEL` and read back as
/// blank/absent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "uuid")]
    pub id: RecordId,
    #[serde(rename = "project_uuid")]
    pub project: ProjectId,
    #[serde(with = "null_sentinel")]
    pub message_id: String,
    #[serde(with = "null_sentinel")]
    pub subject: String,
    #[serde(with = "null_sentinel")]
    pub from: String,
    #[serde(with = "null_sentinel")]
    pub to: String,
    #[serde(with = "null_sentinel")]
    pub cc: String,
    /// Seconds since the UNIX epoch; never negative.
    pub received: i64,
    #[serde(with = "null_sentinel::size")]
    pub size: Option<u64>,
    #[serde(with = "null_sentinel")]
    pub body: String,
    #[serde(with = "null_sentinel")]
    pub headers: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(rename = "folder_uuid", with = "null_sentinel::id")]
    pub folder: Option<FolderId>,
    #[serde(rename = "evidence_uuid", with = "null_sentinel::id")]
    pub evidence: Option<EvidenceId>,
}

impl Message {
    /// Create an empty message in `project` with a fresh identity.
    pub fn new(project: ProjectId) -> Self {
        Message {
            id: RecordId::generate(),
            project,
            message_id: String::new(),
            subject: String::new(),
            from: String::new(),
            to: String::new(),
            cc: String::new(),
            received: 0,
            size: None,
            body: String::new(),
            headers: String::new(),
            attachments: Vec::new(),
            folder: None,
            evidence: None,
        }
    }

    /// Serialise this message into its wire payload.
    pub fn payload(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self, Error> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Whether this message carries a usable `Message-ID`.
    pub fn has_message_id(&self) -> bool {
        !self.message_id.trim().is_empty()
    }
}

/// The envelope of a message read from a live mailbox.
///
/// Live ingestion only carries these fields; there are no bodies, headers,
/// or attachments.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Envelope {
    pub message_id: String,
    pub subject: String,
    pub from: Vec<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    /// Seconds since the UNIX epoch, if the server reported a date.
    pub date: Option<i64>,
}

mod null_sentinel {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::NULL_SENTINEL;

    pub fn serialize<S: Serializer>(
        value: &str,
        ser: S,
    ) -> Result<S::Ok, S::Error> {
        if value.trim().is_empty() {
            ser.serialize_str(NULL_SENTINEL)
        } else {
            ser.serialize_str(value)
        }
    }

    pub fn deserialize<'a, D: Deserializer<'a>>(
        de: D,
    ) -> Result<String, D::Error> {
        String::deserialize(de).map(|s| {
            if NULL_SENTINEL == s {
                String::new()
            } else {
                s
            }
        })
    }

    pub mod size {
        use serde::{Deserialize, Deserializer, Serializer};

        use super::NULL_SENTINEL;

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        pub fn serialize<S: Serializer>(
            value: &Option<u64>,
            ser: S,
        ) -> Result<S::Ok, S::Error> {
            match *value {
                Some(n) => ser.serialize_u64(n),
                None => ser.serialize_str(NULL_SENTINEL),
            }
        }

        pub fn deserialize<'a, D: Deserializer<'a>>(
            de: D,
        ) -> Result<Option<u64>, D::Error> {
            Ok(match Raw::deserialize(de)? {
                Raw::Number(n) => Some(n),
                Raw::Text(s) => s.trim().parse().ok(),
            })
        }
    }

    pub mod id {
        use serde::{Deserialize, Deserializer, Serializer};

        use super::NULL_SENTINEL;

        pub fn serialize<T: AsRef<str>, S: Serializer>(
            value: &Option<T>,
            ser: S,
        ) -> Result<S::Ok, S::Error> {
            match *value {
                Some(ref id) if !id.as_ref().trim().is_empty() => {
                    ser.serialize_str(id.as_ref())
                }
                _ => ser.serialize_str(NULL_SENTINEL),
            }
        }

        pub fn deserialize<'a, T: From<String>, D: Deserializer<'a>>(
            de: D,
        ) -> Result<Option<T>, D::Error> {
            String::deserialize(de).map(|s| {
                if NULL_SENTINEL == s || s.is_empty() {
                    None
                } else {
                    Some(T::from(s))
                }
            })
        }
    }
}
