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

//! Unix mbox files.
//!
//! An mbox has no folder structure of its own, so everything lives in the
//! root folder.

use std::fs;
use std::path::Path;

use super::rfc822::Rfc822Message;
use super::{
    Container, Folder, FolderRef, FormatDecoder, MessageRef, SourceMessage,
};
use crate::support::error::Error;

#[derive(Clone, Copy, Debug, Default)]
pub struct MboxDecoder;

impl FormatDecoder for MboxDecoder {
    fn name(&self) -> &'static str {
        "mbox"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".mbox", ".mbx"]
    }

    fn sniff(&self, head: &[u8]) -> bool {
        head.starts_with(b"From ")
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Container>, Error> {
        Ok(Box::new(MboxContainer::new(&fs::read(path)?)?))
    }
}

pub struct MboxContainer {
    messages: Vec<Vec<u8>>,
}

impl MboxContainer {
    pub fn new(data: &[u8]) -> Result<Self, Error> {
        if !data.is_empty() && !data.starts_with(b"From ") {
            return Err(Error::BadContainer(
                "mbox does not start with a From_ line".to_owned(),
            ));
        }

        Ok(MboxContainer {
            messages: split_messages(data),
        })
    }
}

/// Split the content of an mbox into its messages, dropping the `From_`
/// separator lines and undoing `>From` quoting.
fn split_messages(data: &[u8]) -> Vec<Vec<u8>> {
    let mut messages: Vec<Vec<u8>> = Vec::new();

    for line in data.split_inclusive(|&b| b'\n' == b) {
        if line.starts_with(b"From ") {
            messages.push(Vec::new());
            continue;
        }

        let current = match messages.last_mut() {
            Some(current) => current,
            None => continue,
        };

        let quotes = line.iter().take_while(|&&b| b'>' == b).count();
        if quotes > 0 && line[quotes..].starts_with(b"From ") {
            current.extend_from_slice(&line[1..]);
        } else {
            current.extend_from_slice(line);
        }
    }

    // The blank line before each separator belongs to the mbox format, not
    // to the message.
    for message in &mut messages {
        if message.ends_with(b"\r\n\r\n") {
            message.truncate(message.len() - 2);
        } else if message.ends_with(b"\n\n") {
            message.truncate(message.len() - 1);
        }
    }

    messages
}

impl Container for MboxContainer {
    fn root_folder(&self) -> FolderRef {
        FolderRef(0)
    }

    fn sub_folders(&self, _: FolderRef) -> Result<Vec<Folder>, Error> {
        Ok(Vec::new())
    }

    fn messages(&self, folder: FolderRef) -> Result<Vec<MessageRef>, Error> {
        if self.root_folder() == folder {
            Ok((0..self.messages.len()).map(MessageRef).collect())
        } else {
            Ok(Vec::new())
        }
    }

    fn open_message(
        &mut self,
        message: MessageRef,
    ) -> Result<Box<dyn SourceMessage>, Error> {
        let raw = self.messages.get(message.0).ok_or_else(|| {
            Error::BadContainer(format!("no such message {}", message.0))
        })?;
        Ok(Box::new(Rfc822Message::parse(raw)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn splits_on_from_lines() {
        let mbox = b"From alice@example.com Mon Jan  2 15:04:05 2006\n\
                     From: alice@example.com\n\
                     Subject: one\n\
                     \n\
                     >From the top\n\
                     \n\
                     From bob@example.com Mon Jan  2 16:04:05 2006\n\
                     From: bob@example.com\n\
                     Subject: two\n\
                     \n\
                     body\n";
        let mut container = MboxContainer::new(mbox).unwrap();
        let root = container.root_folder();
        assert!(container.sub_folders(root).unwrap().is_empty());

        let messages = container.messages(root).unwrap();
        assert_eq!(2, messages.len());
        assert_eq!(
            b"From: alice@example.com\nSubject: one\n\nFrom the top\n".to_vec(),
            container.messages[0]
        );

        let second = container.open_message(messages[1]).unwrap();
        assert_eq!("two", second.subject().unwrap());
        assert!(second.body_plain().unwrap().starts_with("body"));
    }

    #[test]
    fn rejects_non_mbox() {
        assert_matches!(
            Err(Error::BadContainer(_)),
            MboxContainer::new(b"Subject: hi\n\nbody\n").map(|_| ())
        );
        assert!(MboxContainer::new(b"").unwrap().messages.is_empty());
    }
}
