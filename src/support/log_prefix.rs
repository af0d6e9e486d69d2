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

use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex};

/// Tracks text that should be included in at the start of every log statement.
///
/// Clones of a `LogPrefix` share the same underlying data.
#[derive(Clone)]
pub struct LogPrefix {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Clone)]
struct Inner {
    activity: String,
    project: Option<String>,
    evidence: Option<String>,
    mailbox: Option<String>,
}

impl LogPrefix {
    pub fn new(activity: String) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                activity,
                project: None,
                evidence: None,
                mailbox: None,
            })),
        }
    }

    pub fn set_project(&self, project: String) {
        self.lock().project = Some(sanitise(project));
    }

    pub fn set_evidence(&self, evidence: String) {
        self.lock().evidence = Some(sanitise(evidence));
    }

    pub fn set_mailbox(&self, mailbox: Option<String>) {
        self.lock().mailbox = mailbox.map(sanitise);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave the strings in an
        // inconsistent state, so poisoning is ignored.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl fmt::Display for LogPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = self.lock();
        write!(f, "{}", inner.activity)?;
        if inner.project.is_some()
            || inner.evidence.is_some()
            || inner.mailbox.is_some()
        {
            write!(f, "[")?;
            let mut first = true;
            if let Some(ref project) = inner.project {
                write!(f, "{}", project)?;
                first = false;
            }

            if let Some(ref evidence) = inner.evidence {
                if first {
                    write!(f, "{}", evidence)?;
                } else {
                    write!(f, "/{}", evidence)?;
                }
                first = false;
            }

            if let Some(ref mailbox) = inner.mailbox {
                if !mem::take(&mut first) {
                    write!(f, " ")?;
                }
                write!(f, "mailbox={}", mailbox)?;
            }
            write!(f, "]")?;
        }

        Ok(())
    }
}

fn sanitise(mut s: String) -> String {
    s.retain(|c| !c.is_control());
    if let Some((truncate_len, _)) = s.char_indices().nth(64) {
        s.truncate(truncate_len);
    }

    s
}
