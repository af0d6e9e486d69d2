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

//! ZIP archives of RFC 822 message files.
//!
//! Directories inside the archive become folders and every regular file is
//! treated as one message. Entries are only ever read into memory; their
//! names never touch the file system.

use std::fs;
use std::io::Read;
use std::path::Path;

use log::debug;

use super::rfc822::Rfc822Message;
use super::{
    Container, Folder, FolderRef, FormatDecoder, MessageRef, SourceMessage,
};
use crate::support::error::Error;

#[derive(Clone, Copy, Debug, Default)]
pub struct ZipDecoder;

impl FormatDecoder for ZipDecoder {
    fn name(&self) -> &'static str {
        "ZIP"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".zip"]
    }

    fn sniff(&self, head: &[u8]) -> bool {
        head.starts_with(b"PK\x03\x04")
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Container>, Error> {
        let archive = zip::ZipArchive::new(fs::File::open(path)?)
            .map_err(|e| Error::BadContainer(e.to_string()))?;
        Ok(Box::new(ZipContainer::new(archive)?))
    }
}

struct ZipFolder {
    name: String,
    children: Vec<usize>,
    entries: Vec<usize>,
}

impl ZipFolder {
    fn new(name: String) -> Self {
        ZipFolder {
            name,
            children: Vec::new(),
            entries: Vec::new(),
        }
    }
}

pub struct ZipContainer<R> {
    archive: zip::ZipArchive<R>,
    folders: Vec<ZipFolder>,
}

impl<R: Read + std::io::Seek> ZipContainer<R> {
    pub fn new(mut archive: zip::ZipArchive<R>) -> Result<Self, Error> {
        let mut folders = vec![ZipFolder::new(String::new())];

        for ix in 0..archive.len() {
            let (name, is_dir) = {
                let entry = archive
                    .by_index_raw(ix)
                    .map_err(|e| Error::BadContainer(e.to_string()))?;
                (entry.name().to_owned(), entry.is_dir())
            };

            let mut segments = name
                .split(|c| '/' == c || '\\' == c)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>();
            if Some(&"__MACOSX") == segments.first() {
                continue;
            }

            let leaf = if is_dir { None } else { segments.pop() };
            if !is_dir && leaf.is_none() {
                continue;
            }

            let mut folder = 0;
            for segment in segments {
                folder = child_folder(&mut folders, folder, segment);
            }

            if leaf.is_some() {
                folders[folder].entries.push(ix);
            }
        }

        debug!(
            "Indexed {} folders in archive of {} entries",
            folders.len(),
            archive.len()
        );

        Ok(ZipContainer { archive, folders })
    }

    fn folder(&self, folder: FolderRef) -> Result<&ZipFolder, Error> {
        self.folders.get(folder.0).ok_or_else(|| {
            Error::BadContainer(format!("no such folder {}", folder.0))
        })
    }
}

fn child_folder(
    folders: &mut Vec<ZipFolder>,
    parent: usize,
    name: &str,
) -> usize {
    if let Some(&existing) = folders[parent]
        .children
        .iter()
        .find(|&&child| folders[child].name == name)
    {
        return existing;
    }

    let ix = folders.len();
    folders.push(ZipFolder::new(name.to_owned()));
    folders[parent].children.push(ix);
    ix
}

impl<R: Read + std::io::Seek> Container for ZipContainer<R> {
    fn root_folder(&self) -> FolderRef {
        FolderRef(0)
    }

    fn sub_folders(&self, folder: FolderRef) -> Result<Vec<Folder>, Error> {
        Ok(self
            .folder(folder)?
            .children
            .iter()
            .map(|&child| Folder {
                handle: FolderRef(child),
                name: self.folders[child].name.clone(),
            })
            .collect())
    }

    fn messages(&self, folder: FolderRef) -> Result<Vec<MessageRef>, Error> {
        Ok(self
            .folder(folder)?
            .entries
            .iter()
            .map(|&ix| MessageRef(ix))
            .collect())
    }

    fn open_message(
        &mut self,
        message: MessageRef,
    ) -> Result<Box<dyn SourceMessage>, Error> {
        let mut entry = self
            .archive
            .by_index(message.0)
            .map_err(|e| Error::Unparseable(e.to_string()))?;
        let mut data = Vec::with_capacity(capacity_hint(entry.size()));
        entry.read_to_end(&mut data).map_err(|e| {
            Error::Unparseable(format!("{}: {}", entry.name(), e))
        })?;

        Ok(Box::new(Rfc822Message::parse(&data)?))
    }
}

/// Entry sizes come from the archive headers, so they only bound the
/// initial allocation.
const MAX_CAPACITY_HINT: u64 = 1 << 20;

fn capacity_hint(declared: u64) -> usize {
    declared.min(MAX_CAPACITY_HINT) as usize
}
