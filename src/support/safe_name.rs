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

/// Determine whether the given name is "safe".
///
/// This is used to validate the components of object keys and the names of
/// files written during export, all of which end up as file system elements.
/// It excludes empty names and patterns that cause directory traversal or
/// other unwanted behaviours.
///
/// This does not care about whether the name is ultimately a valid file name;
/// for that, we simply rely on the OS rejecting it.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty() &&
        // Block directory traversal through .. and creation of hidden files on
        // UNIX
        name.chars().next() != Some('.') &&
        name.find('/').is_none() &&
        // Only a path separator on Windows, but always block since it has high
        // potential of causing problems
        name.find('\\').is_none() &&
        // Don't allow any ASCII control characters
        name.find(|c| c < ' ' || c == '\x7F').is_none()
}

/// Turn an arbitrary attachment name from evidence into something that
/// passes `is_safe_name`.
///
/// Attachment names are attacker-controlled, so everything dubious is
/// replaced rather than rejected; an export must not lose an item over its
/// name.
pub fn sanitise_file_name(name: &str) -> String {
    let mut clean: String = name
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c < ' ' || c == '\x7F' {
                '_'
            } else {
                c
            }
        })
        .collect();

    while clean.starts_with('.') {
        clean.replace_range(..1, "_");
    }

    if clean.is_empty() {
        clean.push('_');
    }

    clean
}
