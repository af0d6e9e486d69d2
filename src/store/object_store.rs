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

//! File-system implementation of `AttachmentSink`.
//!
//! Objects live at `<root>/<project>/<attachment>`. Files are staged in a
//! scratch directory and moved into place atomically, so a reader never
//! observes a partial object.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::debug;

use super::{AttachmentSink, ObjectKey};
use crate::support::error::Error;
use crate::support::file_ops::{self, ErrorTransforms};
use crate::support::safe_name::is_safe_name;

pub struct FsObjectStore {
    root: PathBuf,
    tmp: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: PathBuf, tmp: PathBuf) -> Result<Self, Error> {
        fs::create_dir_all(&root)?;
        fs::create_dir_all(&tmp)?;
        Ok(FsObjectStore { root, tmp })
    }

    fn path_for(&self, key: &ObjectKey) -> Result<PathBuf, Error> {
        if !is_safe_name(key.project.as_str())
            || !is_safe_name(key.attachment.as_str())
        {
            return Err(Error::UnsafeName);
        }

        Ok(self
            .root
            .join(key.project.as_str())
            .join(key.attachment.as_str()))
    }
}

impl AttachmentSink for FsObjectStore {
    fn put(&self, key: &ObjectKey, src: &Path) -> Result<ObjectKey, Error> {
        let dst = self.path_for(key)?;
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }

        let size = file_ops::spit_from(&self.tmp, &dst, false, 0o440, src)?;
        debug!("Stored {} bytes as {}", size, key);
        Ok(key.clone())
    }

    fn get(&self, key: &ObjectKey) -> Result<Box<dyn Read>, Error> {
        let file = fs::File::open(self.path_for(key)?)
            .on_not_found(Error::ObjectNotFound(key.to_string()))?;
        Ok(Box::new(file))
    }
}
