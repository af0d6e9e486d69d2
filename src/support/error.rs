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

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Evidence is already parsed")]
    AlreadyParsed,
    #[error("No decoder supports '{0}'")]
    NoDecoder(String),
    #[error("Container is not usable: {0}")]
    BadContainer(String),
    #[error("Field '{0}' unavailable")]
    FieldUnavailable(&'static str),
    #[error("Message could not be parsed: {0}")]
    Unparseable(String),
    #[error("Parent folder {0} does not exist in this evidence")]
    NxParent(String),
    #[error("Unsafe object key or file name")]
    UnsafeName,
    #[error("The specified key does not exist: {0}")]
    ObjectNotFound(String),
    #[error("Message bus rejected batch: {0}")]
    Bus(String),
    #[error("Mailbox connection closed")]
    ConnectionClosed,
    #[error("The specified message set is invalid")]
    InvalidMessageSet,
    #[error("Gave up after {0} reconnects")]
    ReconnectLimit(u32),
    #[error("Envelope fetch thread panicked")]
    FetchPanicked,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}
