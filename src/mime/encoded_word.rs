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

use encoding_rs::Encoding;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ENCODED_WORD: Regex =
        Regex::new(r"^=\?([!->@-~]*)\?([!->@-~]*)\?([!->@-~]*)\?=$").unwrap();
}

/// Decode every RFC 2047 encoded word in an unstructured header value.
///
/// Whitespace between two adjacent encoded words is deleted; all other text
/// is passed through unchanged.
pub fn decode_header_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_encoded = false;
    let mut rest = value;

    while !rest.is_empty() {
        let ws_len = rest
            .find(|c: char| !c.is_whitespace())
            .unwrap_or_else(|| rest.len());
        let (ws, tail) = rest.split_at(ws_len);
        let word_len =
            tail.find(char::is_whitespace).unwrap_or_else(|| tail.len());
        let (word, tail) = tail.split_at(word_len);
        rest = tail;

        if word.is_empty() {
            // Trailing whitespace
            out.push_str(ws);
            break;
        }

        match ew_decode(word) {
            Some(decoded) => {
                if !prev_encoded {
                    out.push_str(ws);
                }
                out.push_str(&decoded);
                prev_encoded = true;
            },
            None => {
                out.push_str(ws);
                out.push_str(word);
                prev_encoded = false;
            },
        }
    }

    out
}

/// Test if `word` (in its entirety) is an RFC 2047 "encoded word".
///
/// If it is, decode it and return its decoded value.
///
/// Returns `None` if it is not an encoded word or if it could not be decoded.
/// The distinction matters to `decode_header_value`, since whitespace is only
/// deleted between adjacent encoded words.
pub fn ew_decode(word: &str) -> Option<Cow<str>> {
    // RFC 2047 limits encoded words to 75 characters, but mail exported from
    // real clients routinely exceeds that, so no limit is imposed.
    let captures = ENCODED_WORD.captures(word)?;

    let charset = captures.get(1)?.as_str();
    let transfer_encoding = captures.get(2)?.as_str();
    let content = captures.get(3)?.as_str().as_bytes();

    let content = match transfer_encoding {
        "q" | "Q" => q_decode(content)?,
        "b" | "B" => base64::decode(content).ok()?,
        _ => return None,
    };

    // encoding_rs has no UTF-7, and neither do we
    let encoding = Encoding::for_label_no_replacement(charset.as_bytes())?;
    Some(Cow::Owned(
        encoding.decode_with_bom_removal(&content).0.into_owned(),
    ))
}

/// The "Q" encoding of RFC 2047 4.2: quoted-printable where `_` is a space.
fn q_decode(content: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(content.len());
    let mut bytes = content.iter().copied();
    while let Some(b) = bytes.next() {
        match b {
            b'_' => out.push(b' '),
            b'=' => {
                let hi = hex_digit(bytes.next()?)?;
                let lo = hex_digit(bytes.next()?)?;
                out.push(hi << 4 | lo);
            },
            b => out.push(b),
        }
    }
    Some(out)
}

fn hex_digit(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}
