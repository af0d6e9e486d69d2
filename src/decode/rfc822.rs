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

//! RFC 822 messages, as found inside ZIP archives and mbox files.

use std::borrow::Cow;
use std::io::Write;

use chrono::NaiveDateTime;
use mail_parser::{MessageParser, MimeHeaders, PartType};

use super::{MessageClass, Property, SourceAttachment, SourceMessage};
use crate::mime::encoded_word::decode_header_value;
use crate::mime::header::parse_datetime;
use crate::support::error::Error;

/// A fully-decoded RFC 822 message.
///
/// Header fields are scanned directly from the raw text so that repeated
/// fields resolve to their last occurrence; bodies and attachments come from
/// `mail-parser`.
#[derive(Debug)]
pub struct Rfc822Message {
    size: u64,
    header_block: String,
    fields: Vec<(String, String)>,
    class: MessageClass,
    html: Option<String>,
    text: Option<String>,
    attachments: Vec<PartAttachment>,
    content_lines: Vec<ContentLine>,
}

#[derive(Debug)]
struct PartAttachment {
    name: Option<String>,
    contents: Vec<u8>,
}

/// One unfolded iCalendar or vCard content line.
#[derive(Debug, PartialEq, Eq)]
struct ContentLine {
    name: String,
    params: String,
    value: String,
}

impl Rfc822Message {
    pub fn parse(raw: &[u8]) -> Result<Self, Error> {
        let (header_block, fields) = scan_header_fields(raw)?;

        let message = MessageParser::default()
            .parse(raw)
            .ok_or_else(|| Error::Unparseable("MIME structure".to_owned()))?;
        let root = message.root_part();

        let content_type = root.content_type().map(|ct| {
            format!("{}/{}", ct.ctype(), ct.subtype().unwrap_or(""))
                .to_ascii_lowercase()
        });
        let class = match content_type.as_deref() {
            Some("text/calendar") => MessageClass::Appointment,
            Some("text/vcard") | Some("text/x-vcard") => MessageClass::Contact,
            _ => MessageClass::Note,
        };
        let content_lines = if MessageClass::Note == class {
            Vec::new()
        } else {
            content_lines(&String::from_utf8_lossy(root.contents()))
        };

        // body_html() would synthesise HTML from a plain text part, which
        // would hide the plain rendering, so only take genuine HTML.
        let html = message.html_part(0).and_then(|part| match part.body {
            PartType::Html(ref html) => Some(html.to_string()),
            _ => None,
        });
        let text = message.body_text(0).map(Cow::into_owned);

        let attachments = message
            .attachments()
            .map(|part| PartAttachment {
                name: part.attachment_name().map(str::to_owned),
                contents: part.contents().to_vec(),
            })
            .collect();

        Ok(Rfc822Message {
            size: raw.len() as u64,
            header_block,
            fields,
            class,
            html,
            text,
            attachments,
            content_lines,
        })
    }

    /// The decoded value of the last occurrence of header `name`.
    fn last_field(
        &self,
        name: &str,
        what: &'static str,
    ) -> Result<String, Error> {
        self.fields
            .iter()
            .rev()
            .find(|&&(ref n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, ref v)| decode_header_value(v.trim()))
            .ok_or(Error::FieldUnavailable(what))
    }

    fn content_line(
        &self,
        name: &str,
        what: &'static str,
    ) -> Result<&ContentLine, Error> {
        self.content_lines
            .iter()
            .find(|l| l.name == name && !l.value.is_empty())
            .ok_or(Error::FieldUnavailable(what))
    }

    fn telephone(
        &self,
        kind: &str,
        what: &'static str,
    ) -> Result<String, Error> {
        self.content_lines
            .iter()
            .find(|l| "TEL" == l.name && l.params.contains(kind))
            .map(|l| l.value.clone())
            .ok_or(Error::FieldUnavailable(what))
    }
}

impl SourceMessage for Rfc822Message {
    fn message_class(&self) -> Result<MessageClass, Error> {
        Ok(self.class.clone())
    }

    fn subject(&self) -> Result<String, Error> {
        self.last_field("Subject", "subject")
    }

    fn from(&self) -> Result<String, Error> {
        self.last_field("From", "from")
    }

    fn to(&self) -> Result<String, Error> {
        self.last_field("To", "to")
    }

    fn cc(&self) -> Result<String, Error> {
        self.last_field("Cc", "cc")
    }

    fn message_id(&self) -> Result<String, Error> {
        self.last_field("Message-ID", "message id")
    }

    fn received(&self) -> Result<i64, Error> {
        let date = self.last_field("Date", "received")?;
        parse_datetime(&date)
            .map(|dt| dt.timestamp())
            .ok_or_else(|| Error::Unparseable(format!("Date: {}", date)))
    }

    fn headers(&self) -> Result<String, Error> {
        Ok(self.header_block.clone())
    }

    fn body_html(&self) -> Result<String, Error> {
        self.html.clone().ok_or(Error::FieldUnavailable("HTML body"))
    }

    fn body_plain(&self) -> Result<String, Error> {
        self.text.clone().ok_or(Error::FieldUnavailable("body"))
    }

    fn size(&self) -> Result<u64, Error> {
        Ok(self.size)
    }

    fn property(&self, property: Property) -> Result<String, Error> {
        let what = property.name();
        match property {
            Property::AllAttendees => {
                let attendees = self
                    .content_lines
                    .iter()
                    .filter(|l| "ATTENDEE" == l.name)
                    .map(|l| strip_mailto(&l.value))
                    .collect::<Vec<_>>();
                if attendees.is_empty() {
                    Err(Error::FieldUnavailable(what))
                } else {
                    Ok(attendees.join("; "))
                }
            },
            Property::Location => {
                Ok(self.content_line("LOCATION", what)?.value.clone())
            },
            Property::StartTime => {
                Ok(calendar_time(&self.content_line("DTSTART", what)?.value))
            },
            Property::EndTime => {
                Ok(calendar_time(&self.content_line("DTEND", what)?.value))
            },
            Property::GivenName => self
                .content_line("N", what)?
                .value
                .split(';')
                .nth(1)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .ok_or(Error::FieldUnavailable(what)),
            Property::EmailDisplayName => {
                let full_name = self.content_line("FN", what).ok();
                let email = self.content_line("EMAIL", what).ok();
                match (full_name, email) {
                    (Some(name), Some(email)) => {
                        Ok(format!("{} ({})", name.value, email.value))
                    },
                    (Some(only), None) | (None, Some(only)) => {
                        Ok(only.value.clone())
                    },
                    (None, None) => Err(Error::FieldUnavailable(what)),
                }
            },
            Property::CompanyName => Ok(self
                .content_line("ORG", what)?
                .value
                .split(';')
                .next()
                .unwrap_or_default()
                .to_owned()),
            Property::BusinessPhone => self.telephone("WORK", what),
            Property::MobilePhone => self.telephone("CELL", what),
        }
    }

    fn attachments(
        &self,
    ) -> Result<Vec<Box<dyn SourceAttachment + '_>>, Error> {
        Ok(self
            .attachments
            .iter()
            .map(|a| Box::new(a) as Box<dyn SourceAttachment + '_>)
            .collect())
    }
}

impl SourceAttachment for &PartAttachment {
    fn filename(&self) -> Result<String, Error> {
        self.name
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or(Error::FieldUnavailable("attachment filename"))
    }

    fn write_to(&self, dst: &mut dyn Write) -> Result<u64, Error> {
        dst.write_all(&self.contents)?;
        Ok(self.contents.len() as u64)
    }
}

/// Split off the header block of `raw` and return it together with its
/// unfolded fields.
fn scan_header_fields(
    raw: &[u8],
) -> Result<(String, Vec<(String, String)>), Error> {
    let end = find_subslice(raw, b"\r\n\r\n")
        .map(|ix| ix + 2)
        .or_else(|| find_subslice(raw, b"\n\n").map(|ix| ix + 1))
        .unwrap_or_else(|| raw.len());
    let header_block = String::from_utf8_lossy(&raw[..end]).into_owned();

    let mut fields: Vec<(String, String)> = Vec::new();
    for line in header_block.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            match fields.last_mut() {
                Some(&mut (_, ref mut value)) => value.push_str(line),
                None => {
                    return Err(Error::Unparseable(
                        "continuation before first header".to_owned(),
                    ))
                },
            }
        } else if let Some((name, value)) = line.split_once(':') {
            let name = name.trim_end();
            if name.is_empty() || name.contains(' ') {
                return Err(Error::Unparseable(format!(
                    "header line {:?}",
                    line
                )));
            }
            fields.push((name.to_owned(), value.to_owned()));
        } else if !line.is_empty() {
            return Err(Error::Unparseable(format!("header line {:?}", line)));
        }
    }

    if fields.is_empty() {
        return Err(Error::Unparseable("no header fields".to_owned()));
    }

    Ok((header_block, fields))
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn content_lines(text: &str) -> Vec<ContentLine> {
    let mut unfolded: Vec<String> = Vec::new();
    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = unfolded.last_mut() {
                last.push_str(&line[1..]);
            }
        } else if !line.is_empty() {
            unfolded.push(line.to_owned());
        }
    }

    unfolded
        .into_iter()
        .filter_map(|line| {
            let (head, value) = line.split_once(':')?;
            let (name, params) = head.split_once(';').unwrap_or((head, ""));
            Some(ContentLine {
                name: name.trim().to_ascii_uppercase(),
                params: params.to_ascii_uppercase(),
                value: unescape(value.trim()),
            })
        })
        .collect()
}

fn unescape(value: &str) -> String {
    value
        .replace("\\n", "\n")
        .replace("\\N", "\n")
        .replace("\\,", ",")
        .replace("\\;", ";")
        .replace("\\\\", "\\")
}

fn strip_mailto(value: &str) -> String {
    match value.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("mailto:") => {
            value[7..].to_owned()
        },
        _ => value.to_owned(),
    }
}

/// Render an iCalendar date-time (`20200102T150405Z`) readably, or return
/// it unchanged if it is in some other form.
fn calendar_time(value: &str) -> String {
    let (stamp, utc) = match value.strip_suffix('Z') {
        Some(stamp) => (stamp, true),
        None => (value, false),
    };

    match NaiveDateTime::parse_from_str(stamp, "%Y%m%dT%H%M%S") {
        Ok(dt) if utc => format!("{} UTC", dt.format("%Y-%m-%d %H:%M:%S")),
        Ok(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        Err(_) => value.to_owned(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_data::*;

    #[test]
    fn last_header_wins() {
        let msg = Rfc822Message::parse(REPEATED_HEADERS).unwrap();
        assert_eq!("Second subject", msg.subject().unwrap());
        assert_eq!("carol@example.com", msg.to().unwrap());
        assert_eq!(
            "Alice Example <alice@example.com>",
            msg.from().unwrap()
        );
        assert_matches!(Err(Error::FieldUnavailable("cc")), msg.cc());
    }

    #[test]
    fn plain_message_fields() {
        let msg = Rfc822Message::parse(PLAIN_EML).unwrap();
        assert_eq!(MessageClass::Note, msg.message_class().unwrap());
        assert_eq!("Quarterly résumé", msg.subject().unwrap());
        assert_eq!("<plain-1@example.com>", msg.message_id().unwrap());
        assert_eq!(1_136_239_445, msg.received().unwrap());
        assert_eq!(
            "bob@example.com, \"Smith, Dave\" <dave@example.com>",
            msg.to().unwrap()
        );
        assert_eq!("carol@example.com", msg.cc().unwrap());
        assert!(msg.body_plain().unwrap().contains("See attached."));
        assert_matches!(Err(Error::FieldUnavailable(_)), msg.body_html());
        assert!(msg.headers().unwrap().starts_with("From: "));
        assert_eq!(PLAIN_EML.len() as u64, msg.size().unwrap());
        assert_matches!(
            Err(Error::FieldUnavailable("location")),
            msg.property(Property::Location)
        );

        let attachments = msg.attachments().unwrap();
        assert_eq!(1, attachments.len());
        assert_eq!("report.txt", attachments[0].filename().unwrap());
        let mut data = Vec::new();
        assert_eq!(13, attachments[0].write_to(&mut data).unwrap());
        assert_eq!(b"hello, world\n".to_vec(), data);
    }

    #[test]
    fn html_body_is_preferred_input() {
        let msg = Rfc822Message::parse(HTML_EML).unwrap();
        assert!(msg.body_html().unwrap().contains("<b>bold</b>"));
        assert!(msg.body_plain().unwrap().contains("bold"));
    }

    #[test]
    fn pre_epoch_dates_are_negative() {
        let msg = Rfc822Message::parse(PRE_EPOCH_EML).unwrap();
        assert!(msg.received().unwrap() < 0);
    }

    #[test]
    fn calendar_properties() {
        let msg = Rfc822Message::parse(APPOINTMENT_EML).unwrap();
        assert_eq!(MessageClass::Appointment, msg.message_class().unwrap());
        assert_eq!(
            "alice@example.com; bob@example.com",
            msg.property(Property::AllAttendees).unwrap()
        );
        assert_eq!(
            "Room 1, Building 2",
            msg.property(Property::Location).unwrap()
        );
        assert_eq!(
            "2020-01-02 15:00:00 UTC",
            msg.property(Property::StartTime).unwrap()
        );
        assert_matches!(
            Err(Error::FieldUnavailable("end time")),
            msg.property(Property::EndTime)
        );
    }

    #[test]
    fn non_ascii_attendees() {
        let msg = Rfc822Message::parse(
            "From: alice@example.com\r\n\
             Subject: Planning\r\n\
             MIME-Version: 1.0\r\n\
             Content-Type: text/calendar; charset=utf-8\r\n\
             Content-Transfer-Encoding: 8bit\r\n\
             \r\n\
             BEGIN:VEVENT\r\n\
             ATTENDEE:abcdefé@example.com\r\n\
             ATTENDEE:MAILTO:josé@example.com\r\n\
             ATTENDEE:é\r\n\
             END:VEVENT\r\n"
                .as_bytes(),
        )
        .unwrap();
        assert_eq!(
            "abcdefé@example.com; josé@example.com; é",
            msg.property(Property::AllAttendees).unwrap()
        );
    }

    #[test]
    fn contact_properties() {
        let msg = Rfc822Message::parse(CONTACT_EML).unwrap();
        assert_eq!(MessageClass::Contact, msg.message_class().unwrap());
        assert_eq!("Jane", msg.property(Property::GivenName).unwrap());
        assert_eq!(
            "Jane Doe (jane@example.com)",
            msg.property(Property::EmailDisplayName).unwrap()
        );
        assert_eq!("Acme", msg.property(Property::CompanyName).unwrap());
        assert_eq!(
            "+1 555 0100",
            msg.property(Property::BusinessPhone).unwrap()
        );
        assert_matches!(
            Err(Error::FieldUnavailable("mobile phone number")),
            msg.property(Property::MobilePhone)
        );
    }

    #[test]
    fn garbage_is_unparseable() {
        assert_matches!(
            Err(Error::Unparseable(_)),
            Rfc822Message::parse(b"\x89PNG\r\n\x1a\n binary junk")
        );
        assert_matches!(Err(Error::Unparseable(_)), Rfc822Message::parse(b""));
    }

    #[test]
    fn content_line_unfolding() {
        let lines = content_lines(
            "BEGIN:VEVENT\r\nLOCATION:Long\r\n  name\\, here\r\nEND:VEVENT\r\n",
        );
        assert_eq!(
            ContentLine {
                name: "LOCATION".to_owned(),
                params: String::new(),
                value: "Long name, here".to_owned(),
            },
            lines[1]
        );
    }
}
