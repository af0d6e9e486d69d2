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

//! Fixtures and fakes shared by the unit tests.

use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crossbeam::channel::Sender;

use crate::decode::*;
use crate::ingest::live::{MailboxConnector, MailboxSession};
use crate::model::*;
use crate::store::*;
use crate::support::error::Error;

/// Multipart message with a plain body, a folded `To`, an encoded subject,
/// and one base64 attachment `report.txt` containing `hello, world\n`.
pub static PLAIN_EML: &[u8] = include_bytes!("plain.eml");
/// `multipart/alternative` with both plain and HTML bodies.
pub static HTML_EML: &[u8] = include_bytes!("html.eml");
/// Dated one minute before the UNIX epoch.
pub static PRE_EPOCH_EML: &[u8] = include_bytes!("pre_epoch.eml");
/// `To` and `Subject` each appear twice.
pub static REPEATED_HEADERS: &[u8] = include_bytes!("repeated_headers.eml");
/// A meeting request with two attendees, a location, and a start time but
/// no end time.
pub static APPOINTMENT_EML: &[u8] = include_bytes!("appointment.eml");
/// A vCard with a work phone but no mobile phone.
pub static CONTACT_EML: &[u8] = include_bytes!("contact.eml");

/// Build an in-memory ZIP archive.
///
/// Entries with no content are directories.
pub fn zip_of(entries: &[(&str, Option<&[u8]>)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for &(name, content) in entries {
        match content {
            None => zip.add_directory(name, options).unwrap(),
            Some(data) => {
                zip.start_file(name, options).unwrap();
                zip.write_all(data).unwrap();
            },
        }
    }
    zip.finish().unwrap().into_inner()
}

/// `n` envelopes whose subjects are `<prefix><index>`.
pub fn envelopes(prefix: &str, n: usize) -> Vec<Envelope> {
    (0..n)
        .map(|i| Envelope {
            message_id: format!("<{}{}@example.com>", prefix, i),
            subject: format!("{}{}", prefix, i),
            from: vec!["sender@example.com".to_owned()],
            to: vec!["recipient@example.com".to_owned()],
            cc: vec![],
            date: Some(1_000 + i as i64),
        })
        .collect()
}

#[derive(Clone, Debug)]
pub struct FakeAttachment {
    pub name: Option<String>,
    pub data: Vec<u8>,
}

impl FakeAttachment {
    pub fn new(name: Option<&str>, data: &[u8]) -> Self {
        FakeAttachment {
            name: name.map(str::to_owned),
            data: data.to_vec(),
        }
    }
}

impl SourceAttachment for FakeAttachment {
    fn filename(&self) -> Result<String, Error> {
        self.name
            .clone()
            .ok_or(Error::FieldUnavailable("attachment filename"))
    }

    fn write_to(&self, dst: &mut dyn Write) -> Result<u64, Error> {
        dst.write_all(&self.data)?;
        Ok(self.data.len() as u64)
    }
}

/// A decoder-native message whose every field can be made unavailable.
#[derive(Clone, Debug)]
pub struct FakeMessage {
    pub class: Option<MessageClass>,
    pub subject: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub cc: Option<String>,
    pub message_id: Option<String>,
    pub received: Option<i64>,
    pub html: Option<String>,
    pub plain: Option<String>,
    pub size: Option<u64>,
    pub properties: Vec<(Property, String)>,
    pub attachments: Vec<FakeAttachment>,
}

impl FakeMessage {
    pub fn note(subject: &str, received: i64) -> Self {
        FakeMessage {
            class: Some(MessageClass::Note),
            subject: Some(subject.to_owned()),
            from: Some("alice@example.com".to_owned()),
            to: Some("bob@example.com".to_owned()),
            cc: None,
            message_id: Some(format!("<{}@example.com>", received)),
            received: Some(received),
            html: Some(format!("<p>{}</p>", subject)),
            plain: Some(subject.to_owned()),
            size: Some(42),
            properties: Vec::new(),
            attachments: Vec::new(),
        }
    }
}

fn field<T: Clone>(value: &Option<T>, what: &'static str) -> Result<T, Error> {
    value.clone().ok_or(Error::FieldUnavailable(what))
}

impl SourceMessage for FakeMessage {
    fn message_class(&self) -> Result<MessageClass, Error> {
        field(&self.class, "class")
    }

    fn subject(&self) -> Result<String, Error> {
        field(&self.subject, "subject")
    }

    fn from(&self) -> Result<String, Error> {
        field(&self.from, "from")
    }

    fn to(&self) -> Result<String, Error> {
        field(&self.to, "to")
    }

    fn cc(&self) -> Result<String, Error> {
        field(&self.cc, "cc")
    }

    fn message_id(&self) -> Result<String, Error> {
        field(&self.message_id, "message id")
    }

    fn received(&self) -> Result<i64, Error> {
        field(&self.received, "received")
    }

    fn headers(&self) -> Result<String, Error> {
        Err(Error::FieldUnavailable("headers"))
    }

    fn body_html(&self) -> Result<String, Error> {
        field(&self.html, "HTML body")
    }

    fn body_plain(&self) -> Result<String, Error> {
        field(&self.plain, "body")
    }

    fn size(&self) -> Result<u64, Error> {
        field(&self.size, "size")
    }

    fn property(&self, property: Property) -> Result<String, Error> {
        self.properties
            .iter()
            .find(|&&(p, _)| p == property)
            .map(|&(_, ref v)| v.clone())
            .ok_or(Error::FieldUnavailable(property.name()))
    }

    fn attachments(
        &self,
    ) -> Result<Vec<Box<dyn SourceAttachment + '_>>, Error> {
        Ok(self
            .attachments
            .iter()
            .map(|a| Box::new(a.clone()) as Box<dyn SourceAttachment + '_>)
            .collect())
    }
}

#[derive(Clone, Debug, Default)]
struct FakeFolder {
    name: String,
    children: Vec<usize>,
    messages: Vec<usize>,
}

/// An in-memory container. Folder 0 is the root.
#[derive(Clone, Debug)]
pub struct FakeContainer {
    folders: Vec<FakeFolder>,
    /// `None` entries fail to open as unparseable.
    messages: Vec<Option<FakeMessage>>,
}

impl Default for FakeContainer {
    fn default() -> Self {
        FakeContainer {
            folders: vec![FakeFolder::default()],
            messages: Vec::new(),
        }
    }
}

impl FakeContainer {
    pub fn root(&self) -> FolderRef {
        FolderRef(0)
    }

    pub fn add_folder(&mut self, parent: FolderRef, name: &str) -> FolderRef {
        let ix = self.folders.len();
        self.folders.push(FakeFolder {
            name: name.to_owned(),
            ..FakeFolder::default()
        });
        self.folders[parent.0].children.push(ix);
        FolderRef(ix)
    }

    pub fn add_message(&mut self, folder: FolderRef, message: FakeMessage) {
        self.folders[folder.0].messages.push(self.messages.len());
        self.messages.push(Some(message));
    }

    pub fn add_broken_message(&mut self, folder: FolderRef) {
        self.folders[folder.0].messages.push(self.messages.len());
        self.messages.push(None);
    }
}

impl Container for FakeContainer {
    fn root_folder(&self) -> FolderRef {
        FolderRef(0)
    }

    fn sub_folders(&self, folder: FolderRef) -> Result<Vec<Folder>, Error> {
        Ok(self.folders[folder.0]
            .children
            .iter()
            .map(|&ix| Folder {
                handle: FolderRef(ix),
                name: self.folders[ix].name.clone(),
            })
            .collect())
    }

    fn messages(&self, folder: FolderRef) -> Result<Vec<MessageRef>, Error> {
        Ok(self.folders[folder.0]
            .messages
            .iter()
            .map(|&ix| MessageRef(ix))
            .collect())
    }

    fn open_message(
        &mut self,
        message: MessageRef,
    ) -> Result<Box<dyn SourceMessage>, Error> {
        match self.messages[message.0] {
            Some(ref m) => Ok(Box::new(m.clone())),
            None => Err(Error::Unparseable("broken fixture".to_owned())),
        }
    }
}

/// Opens a copy of the wrapped container for any `.fake` file.
pub struct FakeDecoder(pub FakeContainer);

impl FormatDecoder for FakeDecoder {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".fake"]
    }

    fn open(&self, _path: &Path) -> Result<Box<dyn Container>, Error> {
        Ok(Box::new(self.0.clone()))
    }
}

/// Records every published batch, optionally failing after some number of
/// successful ones.
#[derive(Default)]
pub struct RecordingBus {
    batches: Mutex<Vec<Vec<BusRecord>>>,
    fail_after: Option<usize>,
}

impl RecordingBus {
    pub fn failing_after(batches: usize) -> Self {
        RecordingBus {
            batches: Mutex::new(Vec::new()),
            fail_after: Some(batches),
        }
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(|r| Message::from_payload(&r.payload).unwrap())
            .collect()
    }
}

impl MessageBus for RecordingBus {
    fn publish_batch(&self, batch: &[BusRecord]) -> Result<(), Error> {
        let mut batches = self.batches.lock().unwrap();
        if let Some(limit) = self.fail_after {
            if batches.len() >= limit {
                return Err(Error::Bus("rejected by test".to_owned()));
            }
        }
        batches.push(batch.to_vec());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySink {
    objects: Mutex<HashMap<ObjectKey, Vec<u8>>>,
    reject: bool,
}

impl MemorySink {
    /// A sink whose every operation fails with an I/O error.
    pub fn rejecting() -> Self {
        MemorySink {
            objects: Mutex::new(HashMap::new()),
            reject: true,
        }
    }

    pub fn object(&self, key: &ObjectKey) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn insert(&self, project: &str, attachment: &str, data: &[u8]) {
        self.objects.lock().unwrap().insert(
            ObjectKey {
                project: ProjectId::from(project),
                attachment: AttachmentId::from(attachment),
            },
            data.to_vec(),
        );
    }

    fn check(&self) -> Result<(), Error> {
        if self.reject {
            Err(Error::Io(io::Error::new(
                io::ErrorKind::Other,
                "sink offline",
            )))
        } else {
            Ok(())
        }
    }
}

impl AttachmentSink for MemorySink {
    fn put(&self, key: &ObjectKey, src: &Path) -> Result<ObjectKey, Error> {
        self.check()?;
        let mut data = Vec::new();
        std::fs::File::open(src)?.read_to_end(&mut data)?;
        self.objects.lock().unwrap().insert(key.clone(), data);
        Ok(key.clone())
    }

    fn get(&self, key: &ObjectKey) -> Result<Box<dyn Read>, Error> {
        self.check()?;
        self.object(key)
            .map(|data| Box::new(Cursor::new(data)) as Box<dyn Read>)
            .ok_or_else(|| Error::ObjectNotFound(key.to_string()))
    }
}

#[derive(Default)]
pub struct MemoryTreeStore {
    evidence: HashMap<EvidenceId, Evidence>,
    nodes: Vec<TreeNode>,
}

impl MemoryTreeStore {
    /// Every node, in the order saved.
    pub fn saved_nodes(&self) -> Vec<TreeNode> {
        self.nodes.clone()
    }
}

impl TreeStore for MemoryTreeStore {
    fn save_evidence(&mut self, evidence: &Evidence) -> Result<(), Error> {
        self.evidence
            .entry(evidence.id.clone())
            .or_insert_with(|| evidence.clone())
            .parsed = evidence.parsed;
        Ok(())
    }

    fn load_evidence(
        &mut self,
        id: &EvidenceId,
    ) -> Result<Option<Evidence>, Error> {
        Ok(self.evidence.get(id).cloned())
    }

    fn find_evidence(
        &mut self,
        project: &ProjectId,
        file_hash: &str,
    ) -> Result<Option<Evidence>, Error> {
        let mut matching = self
            .evidence
            .values()
            .filter(|e| e.project == *project && e.file_hash == file_hash)
            .collect::<Vec<_>>();
        matching.sort_by_key(|e| !e.parsed);
        Ok(matching.first().map(|&e| e.clone()))
    }

    fn save_node(&mut self, node: &TreeNode) -> Result<(), Error> {
        if let Some(ref parent) = node.parent {
            if !self
                .nodes
                .iter()
                .any(|n| n.id == *parent && n.evidence == node.evidence)
            {
                return Err(Error::NxParent(parent.to_string()));
            }
        }
        self.nodes.push(node.clone());
        Ok(())
    }

    fn discard_nodes(&mut self, evidence: &EvidenceId) -> Result<usize, Error> {
        let before = self.nodes.len();
        self.nodes.retain(|n| n.evidence != *evidence);
        Ok(before - self.nodes.len())
    }

    fn root_nodes(
        &mut self,
        project: &ProjectId,
    ) -> Result<Vec<TreeNode>, Error> {
        Ok(self
            .nodes
            .iter()
            .filter(|n| n.project == *project && n.is_root())
            .cloned()
            .collect())
    }

    fn children(&mut self, node: &FolderId) -> Result<Vec<TreeNode>, Error> {
        Ok(self
            .nodes
            .iter()
            .filter(|n| n.parent.as_ref() == Some(node))
            .cloned()
            .collect())
    }
}

/// A tree store that fails once a given number of nodes have been saved.
pub struct FailingTreeStore {
    inner: MemoryTreeStore,
    max_nodes: usize,
}

impl FailingTreeStore {
    pub fn after_nodes(max_nodes: usize) -> Self {
        FailingTreeStore {
            inner: MemoryTreeStore::default(),
            max_nodes,
        }
    }

    pub fn saved_nodes(&self) -> Vec<TreeNode> {
        self.inner.saved_nodes()
    }

    pub fn evidence_parsed(&self, id: &EvidenceId) -> bool {
        self.inner.evidence.get(id).map_or(false, |e| e.parsed)
    }
}

impl TreeStore for FailingTreeStore {
    fn save_evidence(&mut self, evidence: &Evidence) -> Result<(), Error> {
        self.inner.save_evidence(evidence)
    }

    fn load_evidence(
        &mut self,
        id: &EvidenceId,
    ) -> Result<Option<Evidence>, Error> {
        self.inner.load_evidence(id)
    }

    fn find_evidence(
        &mut self,
        project: &ProjectId,
        file_hash: &str,
    ) -> Result<Option<Evidence>, Error> {
        self.inner.find_evidence(project, file_hash)
    }

    fn save_node(&mut self, node: &TreeNode) -> Result<(), Error> {
        if self.inner.nodes.len() >= self.max_nodes {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.inner.save_node(node)
    }

    fn discard_nodes(&mut self, evidence: &EvidenceId) -> Result<usize, Error> {
        self.inner.discard_nodes(evidence)
    }

    fn root_nodes(
        &mut self,
        project: &ProjectId,
    ) -> Result<Vec<TreeNode>, Error> {
        self.inner.root_nodes(project)
    }

    fn children(&mut self, node: &FolderId) -> Result<Vec<TreeNode>, Error> {
        self.inner.children(node)
    }
}

pub struct MemoryCorpus(pub Vec<Message>);

impl Corpus for MemoryCorpus {
    fn messages(&self, project: &ProjectId) -> Result<Vec<Message>, Error> {
        Ok(self
            .0
            .iter()
            .filter(|m| m.project == *project)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct Script {
    mailboxes: Vec<(String, Vec<Envelope>)>,
    close_on_select: HashMap<String, usize>,
    invalid_after: HashMap<String, usize>,
    selected: Vec<String>,
    fetched: Vec<String>,
    connections: usize,
    logouts: usize,
}

/// A mailbox account whose failures are scripted per mailbox.
///
/// All sessions it creates share the same account state and event log.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnector {
    pub fn new(mailboxes: Vec<(&str, Vec<Envelope>)>) -> Self {
        let this = Self::default();
        this.script.lock().unwrap().mailboxes = mailboxes
            .into_iter()
            .map(|(name, envelopes)| (name.to_owned(), envelopes))
            .collect();
        this
    }

    /// The next `times` selections of `mailbox` report a closed connection.
    pub fn close_on_select(&self, mailbox: &str, times: usize) {
        self.script
            .lock()
            .unwrap()
            .close_on_select
            .insert(mailbox.to_owned(), times);
    }

    /// Fetching `mailbox` yields `n` envelopes, then reports an invalid
    /// message set.
    pub fn invalid_after(&self, mailbox: &str, n: usize) {
        self.script
            .lock()
            .unwrap()
            .invalid_after
            .insert(mailbox.to_owned(), n);
    }

    pub fn selected(&self) -> Vec<String> {
        self.script.lock().unwrap().selected.clone()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.script.lock().unwrap().fetched.clone()
    }

    pub fn connections(&self) -> usize {
        self.script.lock().unwrap().connections
    }

    pub fn logouts(&self) -> usize {
        self.script.lock().unwrap().logouts
    }
}

impl MailboxConnector for ScriptedConnector {
    fn connect(&self) -> Result<Box<dyn MailboxSession>, Error> {
        self.script.lock().unwrap().connections += 1;
        Ok(Box::new(ScriptedSession {
            script: Arc::clone(&self.script),
            selected: None,
        }))
    }
}

struct ScriptedSession {
    script: Arc<Mutex<Script>>,
    selected: Option<String>,
}

impl MailboxSession for ScriptedSession {
    fn list_mailboxes(&mut self) -> Result<Vec<String>, Error> {
        Ok(self
            .script
            .lock()
            .unwrap()
            .mailboxes
            .iter()
            .map(|&(ref name, _)| name.clone())
            .collect())
    }

    fn select(&mut self, mailbox: &str) -> Result<u32, Error> {
        let mut script = self.script.lock().unwrap();
        script.selected.push(mailbox.to_owned());
        if let Some(times) = script.close_on_select.get_mut(mailbox) {
            if *times > 0 {
                *times -= 1;
                return Err(Error::ConnectionClosed);
            }
        }

        let count = script
            .mailboxes
            .iter()
            .find(|&&(ref name, _)| name == mailbox)
            .map_or(0, |&(_, ref envelopes)| envelopes.len());
        self.selected = Some(mailbox.to_owned());
        Ok(count as u32)
    }

    fn fetch_envelopes(
        &mut self,
        first: u32,
        last: u32,
        out: &Sender<Envelope>,
    ) -> Result<(), Error> {
        let mailbox = self.selected.clone().unwrap_or_default();
        let (envelopes, limit) = {
            let mut script = self.script.lock().unwrap();
            script.fetched.push(mailbox.clone());
            let envelopes = script
                .mailboxes
                .iter()
                .find(|&&(ref name, _)| *name == mailbox)
                .map(|&(_, ref envelopes)| {
                    envelopes[first as usize - 1..last as usize].to_vec()
                })
                .unwrap_or_default();
            (envelopes, script.invalid_after.get(&mailbox).copied())
        };

        for (ix, envelope) in envelopes.into_iter().enumerate() {
            if Some(ix) == limit {
                return Err(Error::InvalidMessageSet);
            }
            if out.send(envelope).is_err() {
                return Ok(());
            }
        }

        match limit {
            Some(_) => Err(Error::InvalidMessageSet),
            None => Ok(()),
        }
    }

    fn logout(&mut self) -> Result<(), Error> {
        self.script.lock().unwrap().logouts += 1;
        Ok(())
    }
}
