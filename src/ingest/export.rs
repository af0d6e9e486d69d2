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

//! Bulk export of stored attachments into a ZIP archive.

use std::collections::HashSet;
use std::io;
use std::path::Path;

use log::{info, warn};

use crate::model::{Attachment, FolderId, ProjectId};
use crate::store::{AttachmentSink, Corpus, ObjectKey, TreeStore};
use crate::support::error::Error;
use crate::support::log_prefix::LogPrefix;
use crate::support::safe_name::sanitise_file_name;

/// Matches every attachment name.
pub const ANY_EXTENSION: &str = "*";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub exported: usize,
    /// Attachments that are listed on a message but were never stored.
    pub missing: usize,
}

fn extension_matches(name: &str, extensions: &[String]) -> bool {
    let name = name.to_lowercase();
    extensions
        .iter()
        .any(|ext| ANY_EXTENSION == ext || name.ends_with(&ext.to_lowercase()))
}

/// The name an attachment gets inside the export archive.
///
/// The attachment ID is inserted before the extension so that attachments
/// sharing a name do not collide.
pub fn export_name(attachment: &Attachment) -> String {
    let name = sanitise_file_name(&attachment.name);
    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 => name.split_at(dot),
        _ => (name.as_str(), ""),
    };
    format!("{}-{}{}", stem, attachment.id, ext)
}

/// Write every attachment of `project` whose name ends with one of
/// `extensions` into a new ZIP archive at `dest`.
///
/// If `folder` is given, only messages from that folder or its descendants
/// are considered. Attachments missing from `sink` are skipped with a
/// warning; any other failure aborts the export and leaves nothing at
/// `dest`.
pub fn export_attachments(
    log_prefix: &LogPrefix,
    corpus: &dyn Corpus,
    sink: &dyn AttachmentSink,
    tree: &mut dyn TreeStore,
    project: &ProjectId,
    extensions: &[String],
    folder: Option<&FolderId>,
    dest: &Path,
) -> Result<ExportReport, Error> {
    let folders = match folder {
        None => None,
        Some(folder) => {
            let mut ids = tree.walk_ids(folder)?;
            ids.push(folder.clone());
            Some(ids.into_iter().collect::<HashSet<_>>())
        },
    };

    let parent = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let staged = tempfile::NamedTempFile::new_in(parent)?;
    let mut zip = zip::ZipWriter::new(staged.reopen()?);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    let mut report = ExportReport::default();
    let mut seen = HashSet::new();
    for message in corpus.messages(project)? {
        if let Some(ref folders) = folders {
            if !message.folder.as_ref().map_or(false, |f| folders.contains(f))
            {
                continue;
            }
        }

        for attachment in &message.attachments {
            if !extension_matches(&attachment.name, extensions)
                || !seen.insert(attachment.id.clone())
            {
                continue;
            }

            let key = ObjectKey {
                project: project.clone(),
                attachment: attachment.id.clone(),
            };
            let mut src = match sink.get(&key) {
                Ok(src) => src,
                Err(Error::ObjectNotFound(k)) => {
                    warn!(
                        "{} Failed to export attachment {}: not stored",
                        log_prefix, k
                    );
                    report.missing += 1;
                    continue;
                },
                Err(e) => return Err(e),
            };

            zip.start_file(export_name(attachment), options)?;
            io::copy(&mut src, &mut zip)?;
            report.exported += 1;
        }
    }

    zip.finish()?;
    staged.persist(dest).map_err(|e| e.error)?;
    info!(
        "{} Exported {} attachments ({} missing) to {}",
        log_prefix,
        report.exported,
        report.missing,
        dest.display()
    );
    Ok(report)
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::io::Read;

    use tempfile::TempDir;

    use super::*;
    use crate::model::{AttachmentId, Evidence, Message, TreeNode};
    use crate::test_data::*;

    fn attachment(id: &str, name: &str) -> Attachment {
        Attachment {
            id: AttachmentId::from(id),
            name: name.to_owned(),
        }
    }

    fn message_in(folder: &FolderId, attachments: Vec<Attachment>) -> Message {
        let mut message = Message::new(ProjectId::from("p1"));
        message.folder = Some(folder.clone());
        message.attachments = attachments;
        message
    }

    fn entries(path: &Path) -> Vec<(String, Vec<u8>)> {
        let mut archive = zip::ZipArchive::new(fs::File::open(path).unwrap())
            .unwrap();
        let mut entries = (0..archive.len())
            .map(|ix| {
                let mut entry = archive.by_index(ix).unwrap();
                let mut data = Vec::new();
                entry.read_to_end(&mut data).unwrap();
                (entry.name().to_owned(), data)
            })
            .collect::<Vec<_>>();
        entries.sort();
        entries
    }

    #[test]
    fn names_keep_extension_after_id() {
        assert_eq!(
            "report-a1.PDF",
            export_name(&attachment("a1", "report.PDF"))
        );
        assert_eq!("README-a1", export_name(&attachment("a1", "README")));
        assert_eq!(
            "_profile-a1",
            export_name(&attachment("a1", ".profile"))
        );
        assert!(crate::support::safe_name::is_safe_name(&export_name(
            &attachment("a1", "../etc/passwd")
        )));
        assert_eq!(
            "EMPTY_FILENAME-a1",
            export_name(&attachment("a1", crate::model::UNNAMED_ATTACHMENT))
        );
    }

    #[test]
    fn extension_filter() {
        let exts = vec![".pdf".to_owned(), ".DOCX".to_owned()];
        assert!(extension_matches("a.pdf", &exts));
        assert!(extension_matches("A.PDF", &exts));
        assert!(extension_matches("b.docx", &exts));
        assert!(!extension_matches("c.txt", &exts));
        assert!(extension_matches("c.txt", &["*".to_owned()]));
        assert!(!extension_matches("c.txt", &[]));
    }

    #[test]
    fn exports_matching_attachments_and_skips_missing() {
        let dir = TempDir::new().unwrap();
        let mut tree = MemoryTreeStore::default();
        let ev = Evidence::new(ProjectId::from("p1"), "00".to_owned(), "x.zip");
        let root = TreeNode::root(&ev);
        let inbox = root.child("Inbox".to_owned());
        let work = inbox.child("Work".to_owned());
        let sent = root.child("Sent".to_owned());
        for node in &[&root, &inbox, &work, &sent] {
            tree.save_node(node).unwrap();
        }

        let sink = MemorySink::default();
        sink.insert("p1", "a1", b"one");
        sink.insert("p1", "a2", b"two");
        sink.insert("p1", "a4", b"four");

        let corpus = MemoryCorpus(vec![
            message_in(
                &inbox.id,
                vec![attachment("a1", "one.pdf"), attachment("a9", "gone.pdf")],
            ),
            message_in(&work.id, vec![attachment("a2", "two.PDF")]),
            message_in(&sent.id, vec![attachment("a4", "four.pdf")]),
            message_in(&work.id, vec![attachment("a3", "notes.txt")]),
        ]);

        let dest = dir.path().join("out.zip");
        let report = export_attachments(
            &LogPrefix::new("export".to_owned()),
            &corpus,
            &sink,
            &mut tree,
            &ProjectId::from("p1"),
            &[".pdf".to_owned()],
            Some(&inbox.id),
            &dest,
        )
        .unwrap();

        assert_eq!(
            ExportReport {
                exported: 2,
                missing: 1,
            },
            report
        );
        assert_eq!(
            vec![
                ("one-a1.pdf".to_owned(), b"one".to_vec()),
                ("two-a2.PDF".to_owned(), b"two".to_vec()),
            ],
            entries(&dest)
        );
    }

    #[test]
    fn sink_failure_aborts_without_output() {
        let dir = TempDir::new().unwrap();
        let mut tree = MemoryTreeStore::default();
        let sink = MemorySink::rejecting();
        let corpus = MemoryCorpus(vec![message_in(
            &FolderId::from("f1"),
            vec![attachment("a1", "one.pdf")],
        )]);

        let dest = dir.path().join("out.zip");
        assert!(export_attachments(
            &LogPrefix::new("export".to_owned()),
            &corpus,
            &sink,
            &mut tree,
            &ProjectId::from("p1"),
            &["*".to_owned()],
            None,
            &dest,
        )
        .is_err());
        assert!(!dest.exists());
        assert_eq!(0, fs::read_dir(dir.path()).unwrap().count());
    }
}
