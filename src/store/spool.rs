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

//! A message bus backed by a spool directory of JSON-lines files.
//!
//! Every published batch becomes one file, written atomically, which the
//! indexer consumes at its own pace. The same directory doubles as the
//! corpus read back by the analysis and export passes.

use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{info, warn};
use rand::{rngs::OsRng, Rng};

use super::{BusRecord, Corpus, MessageBus};
use crate::model::{Message, ProjectId};
use crate::support::error::Error;
use crate::support::file_ops::{self, IgnoreKinds};

const SPOOL_EXTENSION: &str = "jsonl";

pub struct SpoolBus {
    dir: PathBuf,
    tmp: PathBuf,
}

impl SpoolBus {
    pub fn new(dir: PathBuf, tmp: PathBuf) -> Result<Self, Error> {
        fs::create_dir_all(&dir)?;
        fs::create_dir_all(&tmp)?;
        Ok(SpoolBus { dir, tmp })
    }
}

impl MessageBus for SpoolBus {
    fn publish_batch(&self, batch: &[BusRecord]) -> Result<(), Error> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut data = Vec::new();
        for record in batch {
            data.extend_from_slice(&record.payload);
            data.push(b'\n');
        }

        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let name = format!(
            "{:013}-{:08x}.{}",
            millis,
            OsRng.gen::<u32>(),
            SPOOL_EXTENSION
        );

        file_ops::spit(&self.tmp, self.dir.join(&name), false, 0o640, &data)
            .map_err(|e| Error::Bus(format!("{}: {}", name, e)))?;
        info!("Delivered {} records as {}", batch.len(), name);
        Ok(())
    }
}

pub struct SpoolCorpus {
    dir: PathBuf,
}

impl SpoolCorpus {
    pub fn new(dir: PathBuf) -> Self {
        SpoolCorpus { dir }
    }
}

impl Corpus for SpoolCorpus {
    fn messages(&self, project: &ProjectId) -> Result<Vec<Message>, Error> {
        let mut paths = fs::read_dir(&self.dir)
            .and_then(|entries| {
                entries
                    .map(|e| e.map(|e| e.path()))
                    .collect::<io::Result<Vec<_>>>()
            })
            .ignore_not_found()?;
        paths.retain(|p| {
            p.extension().and_then(|e| e.to_str()) == Some(SPOOL_EXTENSION)
        });
        paths.sort();

        let mut messages = Vec::new();
        for path in paths {
            let reader = BufReader::new(fs::File::open(&path)?);
            for (lineno, line) in reader.split(b'\n').enumerate() {
                let line = line?;
                if line.is_empty() {
                    continue;
                }

                match Message::from_payload(&line) {
                    Ok(message) => {
                        if message.project == *project {
                            messages.push(message);
                        }
                    },
                    Err(e) => warn!(
                        "Skipping corrupt record {}:{}: {}",
                        path.display(),
                        lineno + 1,
                        e
                    ),
                }
            }
        }

        Ok(messages)
    }
}
