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

use std::borrow::Cow;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddrSpec<'a> {
    pub local: Vec<Cow<'a, [u8]>>,
    pub domain: Vec<Cow<'a, [u8]>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailboxSpec<'a> {
    pub addr: AddrSpec<'a>,
    pub name: Vec<Cow<'a, [u8]>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupSpec<'a> {
    pub name: Vec<Cow<'a, [u8]>>,
    pub boxes: Vec<MailboxSpec<'a>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Address<'a> {
    Mailbox(MailboxSpec<'a>),
    Group(GroupSpec<'a>),
}

impl AddrSpec<'_> {
    /// Render as `local@domain`.
    pub fn to_address(&self) -> String {
        let mut s = join(&self.local, ".");
        s.push('@');
        s.push_str(&join(&self.domain, "."));
        s
    }
}

impl MailboxSpec<'_> {
    pub fn display_name(&self) -> String {
        join(&self.name, " ")
    }
}

impl<'a> Address<'a> {
    /// All the mailboxes named by this address; groups are flattened.
    pub fn mailboxes(&self) -> Vec<&MailboxSpec<'a>> {
        match *self {
            Address::Mailbox(ref mb) => vec![mb],
            Address::Group(ref group) => group.boxes.iter().collect(),
        }
    }
}

fn join(parts: &[Cow<'_, [u8]>], sep: &str) -> String {
    parts
        .iter()
        .map(|p| String::from_utf8_lossy(p))
        .collect::<Vec<_>>()
        .join(sep)
}
