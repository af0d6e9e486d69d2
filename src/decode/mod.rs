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

//! The format decoder capability set.
//!
//! A `FormatDecoder` opens one kind of evidence container and exposes it as
//! a generic `Container` of folders and messages. Nothing downstream of this
//! module knows which concrete format it is reading.

use std::fmt;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use log::debug;

use crate::support::error::Error;

pub mod mbox;
pub mod rfc822;
pub mod zip_archive;

/// Opaque handle to a folder within a `Container`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FolderRef(pub usize);

/// Opaque handle to a message within a `Container`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageRef(pub usize);

/// A folder as listed by its parent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Folder {
    pub handle: FolderRef,
    pub name: String,
}

/// What kind of item a message is, which decides how its body is rendered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageClass {
    Note,
    Appointment,
    Contact,
    Other(String),
}

/// Optional per-class properties of a message.
///
/// Every property is independently fallible; a decoder that has no notion
/// of a property simply reports it as unavailable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Property {
    AllAttendees,
    Location,
    StartTime,
    EndTime,
    GivenName,
    EmailDisplayName,
    CompanyName,
    BusinessPhone,
    MobilePhone,
}

impl Property {
    pub fn name(self) -> &'static str {
        match self {
            Property::AllAttendees => "all attendees",
            Property::Location => "location",
            Property::StartTime => "start time",
            Property::EndTime => "end time",
            Property::GivenName => "given name",
            Property::EmailDisplayName => "email display name",
            Property::CompanyName => "company name",
            Property::BusinessPhone => "business phone number",
            Property::MobilePhone => "mobile phone number",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A message as exposed by a decoder.
///
/// Each accessor fails independently of the others.
pub trait SourceMessage {
    fn message_class(&self) -> Result<MessageClass, Error>;
    fn subject(&self) -> Result<String, Error>;
    fn from(&self) -> Result<String, Error>;
    fn to(&self) -> Result<String, Error>;
    fn cc(&self) -> Result<String, Error>;
    fn message_id(&self) -> Result<String, Error>;
    /// Seconds since the UNIX epoch. May be negative.
    fn received(&self) -> Result<i64, Error>;
    fn headers(&self) -> Result<String, Error>;
    fn body_html(&self) -> Result<String, Error>;
    fn body_plain(&self) -> Result<String, Error>;
    fn size(&self) -> Result<u64, Error>;

    fn property(&self, property: Property) -> Result<String, Error> {
        Err(Error::FieldUnavailable(property.name()))
    }

    fn attachments(&self) -> Result<Vec<Box<dyn SourceAttachment + '_>>, Error>;
}

pub trait SourceAttachment {
    fn filename(&self) -> Result<String, Error>;
    /// Write the attachment payload to `dst`, returning the byte count.
    fn write_to(&self, dst: &mut dyn Write) -> Result<u64, Error>;
}

/// An opened evidence container.
pub trait Container {
    fn root_folder(&self) -> FolderRef;
    fn sub_folders(&self, folder: FolderRef) -> Result<Vec<Folder>, Error>;
    fn messages(&self, folder: FolderRef) -> Result<Vec<MessageRef>, Error>;
    fn open_message(
        &mut self,
        message: MessageRef,
    ) -> Result<Box<dyn SourceMessage>, Error>;
}

pub trait FormatDecoder: Send + Sync {
    fn name(&self) -> &'static str;
    /// Lower-case file extensions, including the dot.
    fn extensions(&self) -> &'static [&'static str];
    /// Whether `head`, the first bytes of a file, look like this format.
    fn sniff(&self, _head: &[u8]) -> bool {
        false
    }
    fn open(&self, path: &Path) -> Result<Box<dyn Container>, Error>;
}

/// Selects the decoder for a piece of evidence.
#[derive(Default)]
pub struct DecoderRegistry {
    decoders: Vec<Box<dyn FormatDecoder>>,
}

impl DecoderRegistry {
    /// A registry holding every built-in decoder.
    pub fn builtin() -> Self {
        let mut this = Self::default();
        this.register(Box::new(zip_archive::ZipDecoder));
        this.register(Box::new(mbox::MboxDecoder));
        this
    }

    pub fn register(&mut self, decoder: Box<dyn FormatDecoder>) {
        self.decoders.push(decoder);
    }

    /// Find the decoder for a file whose name has the given extension.
    ///
    /// If no decoder claims the extension, the content at `path` is sniffed
    /// instead. Fails if neither identifies a decoder.
    pub fn select(
        &self,
        extension: Option<&str>,
        path: &Path,
    ) -> Result<&dyn FormatDecoder, Error> {
        if let Some(extension) = extension {
            if let Some(decoder) = self
                .decoders
                .iter()
                .find(|d| d.extensions().contains(&extension))
            {
                return Ok(&**decoder);
            }
        }

        let mut head = Vec::with_capacity(16);
        fs::File::open(path)?.take(16).read_to_end(&mut head)?;
        if let Some(decoder) = self.decoders.iter().find(|d| d.sniff(&head)) {
            debug!(
                "Content of {} identified as {}",
                path.display(),
                decoder.name()
            );
            return Ok(&**decoder);
        }

        Err(Error::NoDecoder(extension.unwrap_or("").to_owned()))
    }
}
