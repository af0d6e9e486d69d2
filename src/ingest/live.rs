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

//! Ingestion of envelopes from a live mailbox account.
//!
//! The transport is supplied through `MailboxConnector`; this module owns
//! the traversal of mailboxes, recovery from dropped connections, and
//! progress reporting.

use std::collections::BTreeSet;

use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, error, info, warn};

use super::normalize::normalize_envelope;
use super::publisher::BatchPublisher;
use crate::model::{Envelope, ProjectId};
use crate::store::MessageBus;
use crate::support::error::Error;
use crate::support::log_prefix::LogPrefix;

/// Establishes authenticated sessions to one mailbox account.
pub trait MailboxConnector {
    fn connect(&self) -> Result<Box<dyn MailboxSession>, Error>;
}

/// One authenticated session.
///
/// Implementations report a dropped connection as
/// `Error::ConnectionClosed` and a sequence range the server refuses as
/// `Error::InvalidMessageSet`.
pub trait MailboxSession: Send {
    fn list_mailboxes(&mut self) -> Result<Vec<String>, Error>;
    /// Select `mailbox`, returning the number of messages in it.
    fn select(&mut self, mailbox: &str) -> Result<u32, Error>;
    /// Send the envelopes of messages `first..=last` of the selected mailbox
    /// to `out`, in sequence order.
    ///
    /// Implementations should stop early once `out` is disconnected.
    fn fetch_envelopes(
        &mut self,
        first: u32,
        last: u32,
        out: &Sender<Envelope>,
    ) -> Result<(), Error>;
    fn logout(&mut self) -> Result<(), Error>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LiveReport {
    pub mailboxes: usize,
    /// Mailboxes that ended with an invalid message set.
    pub incomplete_mailboxes: usize,
    pub messages: usize,
    pub reconnects: u32,
}

/// Progress percentages for an observer which may stop listening.
struct Progress {
    tx: Sender<u8>,
    observer_gone: bool,
}

impl Progress {
    fn send(&mut self, log_prefix: &LogPrefix, percent: u8) {
        if self.observer_gone {
            return;
        }

        if self.tx.send(percent).is_err() {
            debug!("{} Progress observer has gone away", log_prefix);
            self.observer_gone = true;
        }
    }
}

pub struct LiveIngestor<'a> {
    log_prefix: LogPrefix,
    project: ProjectId,
    connector: &'a dyn MailboxConnector,
    bus: &'a dyn MessageBus,
    batch_size: usize,
    max_reconnects: u32,
}

impl<'a> LiveIngestor<'a> {
    pub fn new(
        log_prefix: LogPrefix,
        project: ProjectId,
        connector: &'a dyn MailboxConnector,
        bus: &'a dyn MessageBus,
        batch_size: usize,
        max_reconnects: u32,
    ) -> Self {
        log_prefix.set_project(project.to_string());
        LiveIngestor {
            log_prefix,
            project,
            connector,
            bus,
            batch_size: batch_size.max(1),
            max_reconnects,
        }
    }

    /// Ingest every mailbox of the account.
    ///
    /// Percentages are sent to `progress` as batches are published. The
    /// channel is closed when this returns, successfully or not.
    pub fn run(&self, progress: Sender<u8>) -> Result<LiveReport, Error> {
        let mut session = self.connector.connect()?;
        let mailboxes = session.list_mailboxes()?;
        info!(
            "{} Account has {} mailboxes",
            self.log_prefix,
            mailboxes.len()
        );

        let mut progress = Progress {
            tx: progress,
            observer_gone: false,
        };
        let mut report = LiveReport::default();
        let mut done = BTreeSet::<&str>::new();

        'connection: loop {
            for mailbox in &mailboxes {
                if done.contains(mailbox.as_str()) {
                    continue;
                }

                self.log_prefix.set_mailbox(Some(mailbox.clone()));
                let (published, outcome) =
                    self.ingest_mailbox(&mut *session, mailbox, &mut progress);
                report.messages += published;
                match outcome {
                    Ok(()) => (),
                    Err(Error::InvalidMessageSet) => {
                        warn!(
                            "{} Message set is invalid, \
                             treating mailbox as done",
                            self.log_prefix
                        );
                        report.incomplete_mailboxes += 1;
                    },
                    Err(Error::ConnectionClosed) => {
                        report.reconnects += 1;
                        if report.reconnects > self.max_reconnects {
                            error!(
                                "{} Connection closed again, giving up",
                                self.log_prefix
                            );
                            return Err(Error::ReconnectLimit(
                                self.max_reconnects,
                            ));
                        }

                        warn!(
                            "{} Connection closed, reconnecting ({} of {}); \
                             {} of {} mailboxes remain",
                            self.log_prefix,
                            report.reconnects,
                            self.max_reconnects,
                            mailboxes.len() - done.len(),
                            mailboxes.len()
                        );
                        session = self.connector.connect()?;
                        continue 'connection;
                    },
                    Err(e) => return Err(e),
                }

                done.insert(mailbox.as_str());
                report.mailboxes += 1;
            }

            break;
        }

        self.log_prefix.set_mailbox(None);
        drop(progress);
        session.logout()?;
        info!(
            "{} Done: {} mailboxes ({} incomplete), {} messages, \
             {} reconnects",
            self.log_prefix,
            report.mailboxes,
            report.incomplete_mailboxes,
            report.messages,
            report.reconnects
        );
        Ok(report)
    }

    /// Stream and publish one mailbox.
    ///
    /// Envelopes are fetched on a separate thread while this thread
    /// normalises and publishes them. Whatever was consumed is published even
    /// if the fetch fails part-way, so the number of messages published is
    /// returned alongside the outcome.
    fn ingest_mailbox(
        &self,
        session: &mut dyn MailboxSession,
        mailbox: &str,
        progress: &mut Progress,
    ) -> (usize, Result<(), Error>) {
        let count = match session.select(mailbox) {
            Ok(count) => count,
            Err(e) => return (0, Err(e)),
        };
        if 0 == count {
            info!("{} Mailbox is empty", self.log_prefix);
            return (0, Ok(()));
        }
        info!("{} Fetching {} envelopes", self.log_prefix, count);

        let scoped = crossbeam::scope(|s| {
            let (tx, rx) = channel::bounded(self.batch_size);
            let producer =
                s.spawn(move |_| session.fetch_envelopes(1, count, &tx));

            let consumed = self.consume(count, &rx, progress);
            // Unblocks the producer if consumption stopped early.
            drop(rx);
            (consumed, producer.join())
        });

        match scoped {
            Err(_) => (0, Err(Error::FetchPanicked)),
            Ok((Err(e), _)) => (0, Err(e)),
            Ok((Ok(published), fetched)) => (
                published,
                fetched.map_err(|_| Error::FetchPanicked).and_then(|r| r),
            ),
        }
    }

    fn consume(
        &self,
        count: u32,
        envelopes: &Receiver<Envelope>,
        progress: &mut Progress,
    ) -> Result<usize, Error> {
        let mut publisher = BatchPublisher::new(self.bus, self.batch_size);
        for envelope in envelopes.iter() {
            let message =
                normalize_envelope(&self.log_prefix, &self.project, &envelope);
            if publisher.push(&message)? {
                let percent =
                    (publisher.published() as u64 * 100 / u64::from(count))
                        .min(100);
                progress.send(&self.log_prefix, percent as u8);
            }
        }

        if publisher.finish()? {
            progress.send(&self.log_prefix, 100);
        }

        Ok(publisher.published())
    }
}
