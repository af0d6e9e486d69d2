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

//! Mapping of decoder-native messages onto the canonical `Message`.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;

use log::{error, warn};

use crate::decode::{MessageClass, Property, SourceAttachment, SourceMessage};
use crate::model::*;
use crate::store::{AttachmentSink, ObjectKey};
use crate::support::error::Error;
use crate::support::log_prefix::LogPrefix;

const APPOINTMENT_FIELDS: &[(&str, Property)] = &[
    ("All attendees", Property::AllAttendees),
    ("Location", Property::Location),
    ("Start time", Property::StartTime),
    ("End time", Property::EndTime),
];

const CONTACT_FIELDS: &[(&str, Property)] = &[
    ("Given name", Property::GivenName),
    ("Email display name", Property::EmailDisplayName),
    ("Company name", Property::CompanyName),
    ("Business phone number", Property::BusinessPhone),
    ("Mobile phone number", Property::MobilePhone),
];

/// Build the canonical record for `source`.
///
/// Every field is read independently; a field the decoder cannot produce is
/// left blank. Attachments, folder and evidence are filled in by the caller.
pub fn normalize(
    log_prefix: &LogPrefix,
    project: &ProjectId,
    source: &dyn SourceMessage,
) -> Message {
    let mut message = Message::new(project.clone());
    message.message_id = source.message_id().unwrap_or_default();
    message.subject = source.subject().unwrap_or_default();
    message.from = source.from().unwrap_or_default();
    message.to = source.to().unwrap_or_default();
    message.cc = source.cc().unwrap_or_default();
    message.headers = source.headers().unwrap_or_default();
    message.size = source.size().ok();
    message.body = render_body(source);
    message.received = match source.received() {
        Ok(received) => clamp_received(log_prefix, received),
        Err(e) => {
            error!("{} Failed to get received date: {}", log_prefix, e);
            0
        },
    };
    message
}

/// Build the canonical record for an envelope read from a live mailbox.
pub fn normalize_envelope(
    log_prefix: &LogPrefix,
    project: &ProjectId,
    envelope: &Envelope,
) -> Message {
    let mut message = Message::new(project.clone());
    message.message_id = envelope.message_id.clone();
    message.subject = envelope.subject.clone();
    message.from = envelope.from.join(", ");
    message.to = envelope.to.join(", ");
    message.cc = envelope.cc.join(", ");
    message.received = match envelope.date {
        Some(date) => clamp_received(log_prefix, date),
        None => 0,
    };
    message
}

fn clamp_received(log_prefix: &LogPrefix, received: i64) -> i64 {
    if received < 0 {
        error!(
            "{} Negative received date {} for message, using epoch",
            log_prefix, received
        );
        0
    } else {
        received
    }
}

/// Calendar and contact items get a synthesised preamble of whichever
/// properties are available, followed by the rich body if there is one and
/// the plain body otherwise.
fn render_body(source: &dyn SourceMessage) -> String {
    let mut body = String::new();

    let fields = match source.message_class() {
        Ok(MessageClass::Appointment) => APPOINTMENT_FIELDS,
        Ok(MessageClass::Contact) => CONTACT_FIELDS,
        _ => &[],
    };
    for &(label, property) in fields {
        if let Ok(value) = source.property(property) {
            let _ = writeln!(body, "{}: {}", label, value);
        }
    }

    if let Ok(text) = source.body_html().or_else(|_| source.body_plain()) {
        body.push('\n');
        body.push_str(&text);
    }

    body
}

/// Create the record for one attachment, defaulting its name if the source
/// does not supply one.
pub fn attachment_record(
    log_prefix: &LogPrefix,
    source: &dyn SourceAttachment,
) -> Attachment {
    let name = match source.filename() {
        Ok(name) => name,
        Err(e) => {
            warn!(
                "{} Failed to get attachment filename, using default: {}",
                log_prefix, e
            );
            UNNAMED_ATTACHMENT.to_owned()
        },
    };

    Attachment {
        id: AttachmentId::generate(),
        name,
    }
}

/// Copy the payload of `source` into `sink` under the identity of
/// `record`.
///
/// The payload is staged in a temporary file in `scratch`, which is removed
/// once the upload has completed.
pub fn store_attachment(
    project: &ProjectId,
    record: &Attachment,
    source: &dyn SourceAttachment,
    sink: &dyn AttachmentSink,
    scratch: &Path,
) -> Result<ObjectKey, Error> {
    let mut staged = tempfile::NamedTempFile::new_in(scratch)?;
    source.write_to(staged.as_file_mut())?;
    staged.as_file_mut().flush()?;

    let key = sink.put(
        &ObjectKey {
            project: project.clone(),
            attachment: record.id.clone(),
        },
        staged.path(),
    )?;

    staged.close()?;
    Ok(key)
}
