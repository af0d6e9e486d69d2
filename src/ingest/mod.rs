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

//! Evidence ingestion.
//!
//! An evidence container is walked depth-first. Each folder becomes a
//! `TreeNode` before any of its messages are read; each message is
//! normalised, has its attachments moved into the sink, and is queued on a
//! single `BatchPublisher` for the whole run. The evidence is only marked
//! parsed once the final batch has been published.

use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::decode::{Container, DecoderRegistry, FolderRef, SourceMessage};
use crate::model::*;
use crate::store::{AttachmentSink, MessageBus, TreeStore};
use crate::support::error::Error;
use crate::support::log_prefix::LogPrefix;

pub mod export;
pub mod folder_tree;
pub mod live;
pub mod normalize;
pub mod publisher;

use self::folder_tree::{FolderTreeBuilder, Slot};
use self::publisher::BatchPublisher;

/// Policy for one `Ingestor`.
#[derive(Clone, Debug)]
pub struct IngestSettings {
    pub batch_size: usize,
    /// Whether a failed attachment aborts the whole evidence item.
    pub strict_attachments: bool,
    /// Where attachment payloads are staged before upload.
    pub scratch: PathBuf,
}

/// What one successful ingestion did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub folders: usize,
    pub messages: usize,
    /// Messages the decoder could not parse.
    pub skipped: usize,
    pub attachments: usize,
    /// Attachments listed on a message whose payload never reached the sink.
    pub failed_attachments: usize,
    pub batches: usize,
}

pub struct Ingestor<'a> {
    log_prefix: LogPrefix,
    registry: &'a DecoderRegistry,
    tree: &'a mut dyn TreeStore,
    sink: &'a dyn AttachmentSink,
    bus: &'a dyn MessageBus,
    settings: IngestSettings,
}

struct Pending {
    folder: FolderRef,
    parent: Slot,
    title: String,
}

/// State shared across the traversal of one container.
struct Run<'r, 'b> {
    log_prefix: &'r LogPrefix,
    evidence: &'r Evidence,
    sink: &'r dyn AttachmentSink,
    settings: &'r IngestSettings,
    container: &'r mut dyn Container,
    publisher: BatchPublisher<'b>,
    report: IngestReport,
}

/// Register the container at `src` as evidence of `project`.
///
/// An upload whose content matches earlier evidence of the same project
/// resumes that evidence if its ingestion never completed, and fails with
/// `Error::AlreadyParsed` if it did.
pub fn admit_evidence(
    tree: &mut dyn TreeStore,
    project: ProjectId,
    src: &Path,
    original_name: &str,
) -> Result<Evidence, Error> {
    let evidence = Evidence::register(project, src, original_name)?;
    match tree.find_evidence(&evidence.project, &evidence.file_hash)? {
        Some(existing) if existing.parsed => {
            warn!(
                "{} was already ingested as evidence {}",
                original_name, existing.id
            );
            Err(Error::AlreadyParsed)
        },
        Some(existing) => {
            info!(
                "{} resumes unfinished evidence {}",
                original_name, existing.id
            );
            Ok(existing)
        },
        None => Ok(evidence),
    }
}

impl<'a> Ingestor<'a> {
    pub fn new(
        log_prefix: LogPrefix,
        registry: &'a DecoderRegistry,
        tree: &'a mut dyn TreeStore,
        sink: &'a dyn AttachmentSink,
        bus: &'a dyn MessageBus,
        settings: IngestSettings,
    ) -> Self {
        Ingestor {
            log_prefix,
            registry,
            tree,
            sink,
            bus,
            settings,
        }
    }

    /// Ingest the container at `path`, which holds the content of
    /// `evidence`.
    ///
    /// Fails with `Error::AlreadyParsed`, before touching anything, if the
    /// evidence has already been ingested. Any other error leaves the
    /// evidence unparsed and discards the folders created so far, so that the
    /// ingestion can be retried. Batches already published stay published.
    pub fn ingest(
        &mut self,
        evidence: &mut Evidence,
        path: &Path,
    ) -> Result<IngestReport, Error> {
        self.log_prefix.set_project(evidence.project.to_string());
        self.log_prefix.set_evidence(evidence.id.to_string());

        let stored_parsed = self
            .tree
            .load_evidence(&evidence.id)?
            .map_or(false, |e| e.parsed);
        if evidence.parsed || stored_parsed {
            warn!("{} Refusing to ingest parsed evidence", self.log_prefix);
            return Err(Error::AlreadyParsed);
        }

        let decoder = self
            .registry
            .select(evidence.extension().as_deref(), path)?;
        info!(
            "{} Ingesting {} as {}",
            self.log_prefix,
            evidence.display_name(),
            decoder.name()
        );
        let mut container = decoder.open(path)?;
        self.tree.save_evidence(evidence)?;

        // Leftovers of an earlier attempt whose cleanup did not complete.
        let stale = self.tree.discard_nodes(&evidence.id)?;
        if stale > 0 {
            warn!(
                "{} Discarded {} folders of an earlier failed attempt",
                self.log_prefix, stale
            );
        }

        let walked = {
            let mut tree = FolderTreeBuilder::new(&mut *self.tree);
            let mut run = Run {
                log_prefix: &self.log_prefix,
                evidence,
                sink: self.sink,
                settings: &self.settings,
                container: &mut *container,
                publisher: BatchPublisher::new(
                    self.bus,
                    self.settings.batch_size,
                ),
                report: IngestReport::default(),
            };
            let result = run
                .walk(&mut tree)
                .and_then(|()| run.publisher.finish().map(|_| ()));
            run.report.batches = run.publisher.batches();
            result.map(|()| run.report)
        };

        let report = match walked {
            Ok(report) => report,
            Err(e) => {
                self.discard_partial_tree(&evidence.id);
                return Err(e);
            },
        };

        evidence.parsed = true;
        self.tree.save_evidence(evidence)?;
        info!(
            "{} Done: {} folders, {} messages ({} skipped), \
             {} attachments ({} failed), {} batches",
            self.log_prefix,
            report.folders,
            report.messages,
            report.skipped,
            report.attachments,
            report.failed_attachments,
            report.batches
        );
        Ok(report)
    }
}

impl Ingestor<'_> {
    fn discard_partial_tree(&mut self, evidence: &EvidenceId) {
        match self.tree.discard_nodes(evidence) {
            Ok(n) => warn!(
                "{} Ingestion failed, discarded {} folders",
                self.log_prefix, n
            ),
            Err(e) => error!(
                "{} Failed to discard partial folder tree: {}",
                self.log_prefix, e
            ),
        }
    }
}

impl Run<'_, '_> {
    fn walk(&mut self, tree: &mut FolderTreeBuilder<'_>) -> Result<(), Error> {
        let root = tree.plant_root(self.evidence)?;
        self.report.folders += 1;

        let mut stack = Vec::new();
        self.visit(tree, self.container.root_folder(), root, &mut stack)?;

        while let Some(Pending {
            folder,
            parent,
            title,
        }) = stack.pop()
        {
            let slot = tree.add_child(parent, title)?;
            self.report.folders += 1;
            self.visit(tree, folder, slot, &mut stack)?;
        }

        Ok(())
    }

    /// Process the messages of `folder`, which has already been persisted as
    /// `slot`, then queue its sub-folders so that the first is visited next.
    fn visit(
        &mut self,
        tree: &FolderTreeBuilder<'_>,
        folder: FolderRef,
        slot: Slot,
        stack: &mut Vec<Pending>,
    ) -> Result<(), Error> {
        for message_ref in self.container.messages(folder)? {
            let source = match self.container.open_message(message_ref) {
                Ok(source) => source,
                Err(Error::Unparseable(why)) => {
                    warn!(
                        "{} Skipping message in {}: {}",
                        self.log_prefix,
                        tree.path(slot).join("/"),
                        why
                    );
                    self.report.skipped += 1;
                    continue;
                },
                Err(e) => return Err(e),
            };

            let mut message = normalize::normalize(
                self.log_prefix,
                &self.evidence.project,
                &*source,
            );
            message.folder = Some(tree.id(slot).clone());
            message.evidence = Some(self.evidence.id.clone());
            message.attachments = self.extract_attachments(&*source)?;

            self.publisher.push(&message)?;
            self.report.messages += 1;
        }

        let mut sub_folders = self.container.sub_folders(folder)?;
        sub_folders.reverse();
        stack.extend(sub_folders.into_iter().map(|f| Pending {
            folder: f.handle,
            parent: slot,
            title: f.name,
        }));
        Ok(())
    }

    fn extract_attachments(
        &mut self,
        source: &dyn SourceMessage,
    ) -> Result<Vec<Attachment>, Error> {
        let sources = match source.attachments() {
            Ok(sources) => sources,
            Err(e) if self.settings.strict_attachments => return Err(e),
            Err(e) => {
                error!("{} Failed to list attachments: {}", self.log_prefix, e);
                return Ok(Vec::new());
            },
        };

        let mut records = Vec::with_capacity(sources.len());
        for attachment in sources {
            let record =
                normalize::attachment_record(self.log_prefix, &*attachment);
            self.report.attachments += 1;

            if let Err(e) = normalize::store_attachment(
                &self.evidence.project,
                &record,
                &*attachment,
                self.sink,
                &self.settings.scratch,
            ) {
                if self.settings.strict_attachments {
                    return Err(e);
                }

                error!(
                    "{} Failed to store attachment {} ({}): {}",
                    self.log_prefix, record.id, record.name, e
                );
                self.report.failed_attachments += 1;
            }

            records.push(record);
        }

        Ok(records)
    }
}
