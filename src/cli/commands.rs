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

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use super::main::{ExportSubcommand, IngestSubcommand, ProjectOptions};
use crate::analysis::network::build_network;
use crate::decode::DecoderRegistry;
use crate::ingest::export::export_attachments;
use crate::ingest::{admit_evidence, IngestSettings, Ingestor};
use crate::model::{FolderId, ProjectId};
use crate::store::object_store::FsObjectStore;
use crate::store::spool::{SpoolBus, SpoolCorpus};
use crate::store::tree_db::TreeDb;
use crate::store::{Corpus, TreeNodeView, TreeStore};
use crate::support::error::Error;
use crate::support::file_ops::{self, IgnoreKinds};
use crate::support::log_prefix::LogPrefix;
use crate::support::safe_name::sanitise_file_name;
use crate::support::system_config::{StorageConfig, SystemConfig};

fn open_tree(storage: &StorageConfig) -> Result<TreeDb, Error> {
    if let Some(parent) = storage.tree_db.parent() {
        fs::create_dir_all(parent)?;
    }
    TreeDb::open(&storage.tree_db)
}

fn spool_dir(config: &SystemConfig, root: &Path) -> PathBuf {
    root.join(&config.bus.spool)
}

fn print_json(value: &impl Serialize) -> Result<(), Error> {
    let stdout = io::stdout();
    let mut stdout = stdout.lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

pub(super) fn ingest(
    config: &SystemConfig,
    root: &Path,
    cmd: IngestSubcommand,
) -> Result<(), Error> {
    let storage = config.storage.resolve(root);
    let project = ProjectId::from(cmd.common.project);
    let original_name = cmd
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .map(sanitise_file_name)
        .ok_or(Error::UnsafeName)?;

    fs::create_dir_all(&storage.evidence)?;
    fs::create_dir_all(&storage.scratch)?;
    let mut tree = open_tree(&storage)?;
    let mut evidence =
        admit_evidence(&mut tree, project, &cmd.file, &original_name)?;

    // Identical uploads share one stored copy.
    let stored = storage.evidence.join(&evidence.file_hash);
    file_ops::spit_from(&storage.scratch, &stored, false, 0o440, &cmd.file)
        .ignore_already_exists()?;
    info!(
        "Stored {} as {} (evidence {})",
        cmd.file.display(),
        evidence.file_hash,
        evidence.id
    );

    let registry = DecoderRegistry::builtin();
    let sink = FsObjectStore::new(storage.objects, storage.scratch.clone())?;
    let bus = SpoolBus::new(spool_dir(config, root), storage.scratch.clone())?;
    let report = Ingestor::new(
        LogPrefix::new("ingest".to_owned()),
        &registry,
        &mut tree,
        &sink,
        &bus,
        IngestSettings {
            batch_size: config.bus.batch_size,
            strict_attachments: config.ingest.strict_attachments,
            scratch: storage.scratch,
        },
    )
    .ingest(&mut evidence, &stored)?;

    println!(
        "Ingested evidence {}: {} folders, {} messages ({} skipped), \
         {} attachments ({} failed), {} batches",
        evidence.id,
        report.folders,
        report.messages,
        report.skipped,
        report.attachments,
        report.failed_attachments,
        report.batches
    );
    Ok(())
}

pub(super) fn tree(
    config: &SystemConfig,
    root: &Path,
    cmd: ProjectOptions,
) -> Result<(), Error> {
    let storage = config.storage.resolve(root);
    let mut tree = open_tree(&storage)?;
    let project = ProjectId::from(cmd.project);

    let mut forest = Vec::new();
    for node in tree.root_nodes(&project)? {
        let children = tree.walk(&node.id)?;
        forest.push(TreeNodeView {
            value: node.id,
            label: node.title,
            children,
        });
    }

    print_json(&forest)
}

pub(super) fn network(
    config: &SystemConfig,
    root: &Path,
    cmd: ProjectOptions,
) -> Result<(), Error> {
    let corpus = SpoolCorpus::new(spool_dir(config, root));
    let messages = corpus.messages(&ProjectId::from(cmd.project))?;
    info!("Building network from {} messages", messages.len());
    print_json(&build_network(&messages))
}

pub(super) fn export(
    config: &SystemConfig,
    root: &Path,
    cmd: ExportSubcommand,
) -> Result<(), Error> {
    let storage = config.storage.resolve(root);
    let mut tree = open_tree(&storage)?;
    let corpus = SpoolCorpus::new(spool_dir(config, root));
    let sink = FsObjectStore::new(storage.objects, storage.scratch)?;
    let project = ProjectId::from(cmd.common.project);
    let folder = cmd.folder.map(FolderId::from);

    let log_prefix = LogPrefix::new("export".to_owned());
    log_prefix.set_project(project.to_string());
    let report = export_attachments(
        &log_prefix,
        &corpus,
        &sink,
        &mut tree,
        &project,
        &cmd.extensions,
        folder.as_ref(),
        &cmd.out,
    )?;

    println!(
        "Exported {} attachments to {} ({} missing)",
        report.exported,
        cmd.out.display(),
        report.missing
    );
    Ok(())
}
