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

//! Utilities for working with individual RFC 2822 headers.

use std::borrow::Cow;

use chrono::prelude::*;
use nom::{
    branch::alt,
    bytes::complete::{is_a, is_not, take, take_while1, take_while_m_n},
    character::complete::char,
    combinator::{all_consuming, map, opt},
    multi::{
        fold_many0, many0, many0_count, many1_count, separated_nonempty_list,
    },
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use super::model::*;

/// Parse `value` as an RFC 2822 `address-list`.
///
/// Returns `None` if the whole value does not conform.
pub fn parse_address_list(value: &[u8]) -> Option<Vec<Address<'_>>> {
    all_consuming(address_list)(value).ok().map(|(_, list)| list)
}

/// Parse `value` as an RFC 2822 `date-time`.
///
/// The day of week and the seconds are optional, and a trailing comment
/// (such as `(PST)`) is ignored.
pub fn parse_datetime(value: &str) -> Option<DateTime<FixedOffset>> {
    all_consuming(preceded(opt(cfws), date_time))(value.as_bytes())
        .ok()
        .and_then(|(_, dt)| dt)
}

fn ascii_digit(b: u8) -> bool {
    b.is_ascii_digit()
}

fn decimal(s: &[u8]) -> u32 {
    s.iter().fold(0, |acc, &d| acc * 10 + u32::from(d - b'0'))
}

// RFC 2822 3.2.2 "quoted-pair", including the 8-bit clean "obsolete" syntax
fn quoted_pair(i: &[u8]) -> IResult<&[u8], &[u8]> {
    preceded(char('\\'), take(1usize))(i)
}

// RFC 2822 3.2.3 "Folding white space".
// Headers reaching here have already been unfolded, so the line-ending
// characters are simply treated as whitespace.
fn fws(i: &[u8]) -> IResult<&[u8], &[u8]> {
    map(is_a(" \t\r\n"), |_| &b" "[..])(i)
}

// RFC 2822 3.2.3 "Comment text".
fn ctext(i: &[u8]) -> IResult<&[u8], &[u8]> {
    is_not("()\\ \t\r\n")(i)
}

// RFC 2822 3.2.3 "Comment content".
// The original definition includes FWS in the comment syntax instead of here,
// which makes it a lot more complicated.
fn ccontent(i: &[u8]) -> IResult<&[u8], ()> {
    alt((
        map(ctext, |_| ()),
        map(quoted_pair, |_| ()),
        map(fws, |_| ()),
        comment,
    ))(i)
}

// RFC 2822 3.2.3 "Comment". Note it is recursive.
fn comment(i: &[u8]) -> IResult<&[u8], ()> {
    map(delimited(char('('), many0_count(ccontent), char(')')), |_| ())(i)
}

// RFC 2822 3.2.3 "Comment or folding white space".
fn cfws(i: &[u8]) -> IResult<&[u8], ()> {
    map(many0_count(alt((map(fws, |_| ()), comment))), |_| ())(i)
}

// RFC 2822 3.2.4 "Atom text"
// Amended by RFC 6532 to include all non-ASCII characters
fn atext(i: &[u8]) -> IResult<&[u8], &[u8]> {
    take_while1(|ch: u8| {
        ch.is_ascii_alphanumeric() ||
            // RFC 2822 non-specials
            b"!#$%&'*+-/=?^_`{|}~".contains(&ch) ||
            // RFC 6532 Unicode
            ch >= 0x80
    })(i)
}

// RFC 2822 3.2.4 "Atom"
fn atom(i: &[u8]) -> IResult<&[u8], &[u8]> {
    delimited(opt(cfws), atext, opt(cfws))(i)
}

// RFC 2822 3.2.5 "Quoted [string] text"
// Amended by RFC 6532 to include all non-ASCII characters
fn qtext(i: &[u8]) -> IResult<&[u8], &[u8]> {
    is_not(" \t\r\n\\\"")(i)
}

// RFC 2822 3.2.5 "Quoted [string] content"
fn qcontent(i: &[u8]) -> IResult<&[u8], &[u8]> {
    alt((qtext, quoted_pair, fws))(i)
}

// RFC 2822 3.2.5 "Quoted string"
fn quoted_string<'a>(i: &'a [u8]) -> IResult<&'a [u8], Cow<'a, [u8]>> {
    delimited(
        pair(opt(cfws), char('"')),
        fold_many0(
            qcontent,
            Cow::Borrowed(&[] as &[u8]),
            |mut acc: Cow<'a, [u8]>, item: &'a [u8]| {
                if acc.is_empty() {
                    acc = Cow::Borrowed(item);
                } else {
                    acc.to_mut().extend_from_slice(item);
                }
                acc
            },
        ),
        pair(char('"'), opt(cfws)),
    )(i)
}

// RFC 2822 3.2.6 "word"
fn word(i: &[u8]) -> IResult<&[u8], Cow<[u8]>> {
    alt((map(atom, Cow::Borrowed), quoted_string))(i)
}

// Not formally specified by RFC 2822, but part of the `obs-phrase` grammar.
fn obs_dot(i: &[u8]) -> IResult<&[u8], Cow<[u8]>> {
    terminated(map(char('.'), |_| Cow::Borrowed(&b"."[..])), opt(cfws))(i)
}

// RFC 2822 3.2.6 "phrase", plus "obsolete phrase" syntax which accounts for
// the '.' that many agents put unquoted into display names.
fn phrase(i: &[u8]) -> IResult<&[u8], Vec<Cow<[u8]>>> {
    map(pair(word, many0(alt((word, obs_dot)))), |(head, mut tail)| {
        tail.insert(0, head);
        tail
    })(i)
}

// RFC 2822 3.3 date/time syntax, including obsolete forms.
fn year(i: &[u8]) -> IResult<&[u8], i32> {
    map(take_while_m_n(2, 4, ascii_digit), |s: &[u8]| {
        let mut y = decimal(s) as i32;
        // Y2K compliance workarounds described by RFC 2822 4.3
        if s.len() == 2 && y < 50 {
            y += 2000;
        } else if s.len() < 4 {
            y += 1900;
        }
        y
    })(i)
}

fn month(i: &[u8]) -> IResult<&[u8], u32> {
    map(take_while_m_n(3, 3, |c: u8| c.is_ascii_alphabetic()), |s: &[u8]| {
        match s.to_ascii_lowercase().as_slice() {
            b"jan" => 1,
            b"feb" => 2,
            b"mar" => 3,
            b"apr" => 4,
            b"may" => 5,
            b"jun" => 6,
            b"jul" => 7,
            b"aug" => 8,
            b"sep" => 9,
            b"oct" => 10,
            b"nov" => 11,
            b"dec" => 12,
            _ => 0,
        }
    })(i)
}

fn day(i: &[u8]) -> IResult<&[u8], u32> {
    map(take_while_m_n(1, 2, ascii_digit), decimal)(i)
}

fn date(i: &[u8]) -> IResult<&[u8], (i32, u32, u32)> {
    map(
        tuple((
            terminated(day, opt(cfws)),
            terminated(month, opt(cfws)),
            terminated(year, opt(cfws)),
        )),
        |(d, m, y)| (y, m, d),
    )(i)
}

fn two_digit(i: &[u8]) -> IResult<&[u8], u32> {
    map(take_while_m_n(2, 2, ascii_digit), decimal)(i)
}

fn time_of_day(i: &[u8]) -> IResult<&[u8], (u32, u32, u32)> {
    map(
        tuple((
            terminated(two_digit, tuple((opt(cfws), char(':'), opt(cfws)))),
            terminated(two_digit, opt(cfws)),
            opt(preceded(
                pair(char(':'), opt(cfws)),
                terminated(two_digit, opt(cfws)),
            )),
        )),
        |(h, m, s)| (h, m, s.unwrap_or(0)),
    )(i)
}

// Result is the offset in seconds east of UTC.
fn numeric_zone(i: &[u8]) -> IResult<&[u8], i32> {
    map(
        pair(
            alt((char('+'), char('-'))),
            take_while_m_n(4, 4, ascii_digit),
        ),
        |(sign, s): (char, &[u8])| {
            let hhmm = decimal(s) as i32;
            let secs = hhmm / 100 * 3600 + hhmm % 100 * 60;
            if '-' == sign {
                -secs
            } else {
                secs
            }
        },
    )(i)
}

fn named_zone(name: &[u8]) -> i32 {
    match name.to_ascii_lowercase().as_slice() {
        // US time zones
        b"edt" => -4 * 3600,
        b"est" | b"cdt" => -5 * 3600,
        b"cst" | b"mdt" => -6 * 3600,
        b"mst" | b"pdt" => -7 * 3600,
        b"pst" => -8 * 3600,
        // UT, GMT, military, and unrecognised zones. RFC 2822 indicates that
        // the military time zones were so poorly defined that they must be
        // treated as 0 unless additional information is available. Unknown
        // time zones must also be treated as 0.
        _ => 0,
    }
}

fn zone(i: &[u8]) -> IResult<&[u8], i32> {
    alt((numeric_zone, map(atext, named_zone)))(i)
}

fn time(i: &[u8]) -> IResult<&[u8], ((u32, u32, u32), i32)> {
    terminated(pair(time_of_day, zone), opt(cfws))(i)
}

fn date_time(i: &[u8]) -> IResult<&[u8], Option<DateTime<FixedOffset>>> {
    map(
        // We don't care what day of week it was
        preceded(opt(tuple((atom, char(','), opt(cfws)))), pair(date, time)),
        |((year, month, day), ((hour, minute, second), zone))| {
            FixedOffset::east_opt(zone).and_then(|off| {
                off.with_ymd_and_hms(year, month, day, hour, minute, second)
                    .single()
            })
        },
    )(i)
}

// RFC 2822 3.4.1 local part of address
// Formally, this is `dot-atom / quoted-string / obs-local-part`, with
// `obs-local-part` being `word *("." word)`. Any dot-atom or quoted-string
// conforms to obs-local-part, so we just parse that.
fn local_part(i: &[u8]) -> IResult<&[u8], Vec<Cow<[u8]>>> {
    separated_nonempty_list(char('.'), word)(i)
}

// RFC 2822 4.4 obsolete domain format
fn obs_domain(i: &[u8]) -> IResult<&[u8], Vec<Cow<[u8]>>> {
    separated_nonempty_list(char('.'), map(atom, Cow::Borrowed))(i)
}

// RFC 2822 3.4.1 domain name text
// Amended by RFC 6532 to include all non-ASCII
fn dtext(i: &[u8]) -> IResult<&[u8], &[u8]> {
    is_not("[]\\ \t\r\n")(i)
}

// RFC 2822 3.4.1 domain literal content
fn dcontent(i: &[u8]) -> IResult<&[u8], &[u8]> {
    alt((dtext, quoted_pair, fws))(i)
}

// RFC 2822 3.4.1 domain literal
fn domain_literal(i: &[u8]) -> IResult<&[u8], Vec<u8>> {
    map(
        delimited(
            pair(opt(cfws), char('[')),
            fold_many0(dcontent, vec![b'['], |mut acc: Vec<u8>, item| {
                acc.extend_from_slice(item);
                acc
            }),
            pair(char(']'), opt(cfws)),
        ),
        |mut res| {
            res.push(b']');
            res
        },
    )(i)
}

// RFC 2822 3.4.1 domain
// dot-atom is encompassed by obs_domain
fn domain(i: &[u8]) -> IResult<&[u8], Vec<Cow<[u8]>>> {
    alt((obs_domain, map(domain_literal, |v| vec![Cow::Owned(v)])))(i)
}

// RFC 2822 3.4.1 address specification
fn addr_spec(i: &[u8]) -> IResult<&[u8], AddrSpec> {
    map(
        pair(local_part, preceded(char('@'), domain)),
        |(local, domain)| AddrSpec { local, domain },
    )(i)
}

// RFC 2822 3.4 angle-delimited address. The obsolete routing information of
// RFC 2822 4.4 is not supported.
fn angle_addr(i: &[u8]) -> IResult<&[u8], AddrSpec> {
    delimited(
        pair(opt(cfws), char('<')),
        addr_spec,
        pair(char('>'), opt(cfws)),
    )(i)
}

// RFC 2822 3.4 mailbox
fn mailbox(i: &[u8]) -> IResult<&[u8], MailboxSpec> {
    map(
        alt((
            pair(opt(phrase), angle_addr),
            map(addr_spec, |a| (None, a)),
        )),
        |(name, addr)| MailboxSpec {
            name: name.unwrap_or_default(),
            addr,
        },
    )(i)
}

// Used in obsolete list syntax
fn obs_list_delim(i: &[u8]) -> IResult<&[u8], ()> {
    map(many1_count(tuple((opt(cfws), char(','), opt(cfws)))), |_| ())(i)
}

// RFC 2822 3.4 mailbox list, including 4.4 obsolete syntax
fn mailbox_list(i: &[u8]) -> IResult<&[u8], Vec<MailboxSpec>> {
    separated_nonempty_list(obs_list_delim, mailbox)(i)
}

// RFC 2822 3.4 group
fn group(i: &[u8]) -> IResult<&[u8], GroupSpec> {
    map(
        pair(
            terminated(phrase, char(':')),
            terminated(
                opt(mailbox_list),
                tuple((opt(cfws), char(';'), opt(cfws))),
            ),
        ),
        |(name, boxes)| GroupSpec {
            name,
            boxes: boxes.unwrap_or_default(),
        },
    )(i)
}

// RFC 2822 3.4 address
fn address(i: &[u8]) -> IResult<&[u8], Address> {
    alt((map(mailbox, Address::Mailbox), map(group, Address::Group)))(i)
}

// RFC 2822 3.4 address list, including 4.4 obsolete syntax
fn address_list(i: &[u8]) -> IResult<&[u8], Vec<Address>> {
    delimited(
        opt(obs_list_delim),
        separated_nonempty_list(obs_list_delim, address),
        opt(obs_list_delim),
    )(i)
}
