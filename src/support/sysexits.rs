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

//! Constants from `sysexits.h`
//!
//! The command line exits with these so that scripts driving ingestion can
//! tell bad input apart from environmental failures.

use std::io;

use super::error::Error;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Sysexit(pub i32);

pub const EX_USAGE: Sysexit = Sysexit(64);
pub const EX_DATAERR: Sysexit = Sysexit(65);
pub const EX_NOINPUT: Sysexit = Sysexit(66);
pub const EX_UNAVAILABLE: Sysexit = Sysexit(69);
pub const EX_SOFTWARE: Sysexit = Sysexit(70);
pub const EX_IOERR: Sysexit = Sysexit(74);
pub const EX_TEMPFAIL: Sysexit = Sysexit(75);
pub const EX_CONFIG: Sysexit = Sysexit(78);

impl Sysexit {
    pub fn exit(self) -> ! {
        std::process::exit(self.0)
    }
}

impl From<&Error> for Sysexit {
    fn from(e: &Error) -> Self {
        match *e {
            Error::AlreadyParsed
            | Error::NoDecoder(_)
            | Error::BadContainer(_)
            | Error::FieldUnavailable(_)
            | Error::Unparseable(_)
            | Error::UnsafeName => EX_DATAERR,
            Error::ObjectNotFound(_) => EX_NOINPUT,
            Error::Io(ref e) if io::ErrorKind::NotFound == e.kind() => {
                EX_NOINPUT
            },
            Error::Io(_) | Error::Sqlite(_) | Error::Zip(_) => EX_IOERR,
            Error::Bus(_) | Error::ReconnectLimit(_) => EX_UNAVAILABLE,
            Error::ConnectionClosed | Error::InvalidMessageSet => EX_TEMPFAIL,
            Error::NxParent(_) | Error::FetchPanicked | Error::Json(_) => {
                EX_SOFTWARE
            },
        }
    }
}
