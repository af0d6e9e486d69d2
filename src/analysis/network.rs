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

//! Derivation of the contact network of a project.
//!
//! The network only shows conversations: an address appears only if it has
//! both sent mail to and received mail from some other address.

use std::collections::{BTreeMap, HashSet};

use log::error;
use serde::Serialize;

use crate::mime::header::parse_address_list;
use crate::model::Message;

/// Upper bound of `NetworkNode::size`.
pub const MAX_NODE_SIZE: u64 = 30;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NetworkNode {
    pub id: String,
    pub size: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NetworkLink {
    pub source: String,
    pub target: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Network {
    pub nodes: Vec<NetworkNode>,
    pub links: Vec<NetworkLink>,
    pub first_sent_message_date: i64,
    pub last_sent_message_date: i64,
}

/// Extract the addresses named by an address header as stored on a
/// `Message`.
///
/// Values arrive in one of three shapes. A `;` means a list already
/// flattened by a decoder. A value without `@` is a single bare name, kept
/// verbatim. Anything else is parsed as an RFC 2822 address list; if that
/// fails, the header contributes no addresses.
pub fn header_addresses(header: &str) -> Vec<String> {
    let header = header.trim();
    if header.is_empty() {
        return Vec::new();
    }

    if header.contains(';') {
        header
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect()
    } else if !header.contains('@') {
        vec![header.to_owned()]
    } else {
        match parse_address_list(header.as_bytes()) {
            Some(list) => list
                .iter()
                .flat_map(|address| address.mailboxes())
                .map(|mailbox| mailbox.addr.to_address())
                .collect(),
            None => {
                error!("Failed to parse address list: {:?}", header);
                Vec::new()
            },
        }
    }
}

/// Build the contact network from every indexed message of a project.
///
/// Messages sharing a `Message-ID` are counted once, since the same mail is
/// commonly filed in several folders.
pub fn build_network(messages: &[Message]) -> Network {
    let mut seen_ids = HashSet::new();
    let mut sent = BTreeMap::<(String, String), u64>::new();
    let mut first = None::<i64>;
    let mut last = None::<i64>;

    for message in messages {
        if message.has_message_id()
            && !seen_ids.insert(message.message_id.trim())
        {
            continue;
        }

        let received = message.received;
        first = Some(first.map_or(received, |f| f.min(received)));
        last = Some(last.map_or(received, |l| l.max(received)));

        let recipients = header_addresses(&message.to)
            .into_iter()
            .chain(header_addresses(&message.cc))
            .collect::<Vec<_>>();
        for from in header_addresses(&message.from) {
            for recipient in &recipients {
                *sent
                    .entry((from.clone(), recipient.clone()))
                    .or_insert(0) += 1;
            }
        }
    }

    let mut sizes = BTreeMap::<&str, u64>::new();
    let mut links = Vec::new();
    for (&(ref from, ref to), &out) in &sent {
        // Each unordered pair is handled once, from its lesser side.
        if from >= to {
            continue;
        }

        let back = match sent.get(&(to.clone(), from.clone())) {
            Some(&back) if back > 0 => back,
            _ => continue,
        };

        let size = out.saturating_mul(back).min(MAX_NODE_SIZE);
        for address in &[from, to] {
            let entry = sizes.entry(address.as_str()).or_insert(0);
            *entry = (*entry).max(size);
        }
        links.push(NetworkLink {
            source: from.clone(),
            target: to.clone(),
        });
    }

    Network {
        nodes: sizes
            .into_iter()
            .map(|(id, size)| NetworkNode {
                id: id.to_owned(),
                size,
            })
            .collect(),
        links,
        first_sent_message_date: first.unwrap_or(0),
        last_sent_message_date: last.unwrap_or(0),
    }
}
