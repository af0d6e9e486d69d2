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

//! SQLite implementation of `TreeStore`.

use std::path::Path;
use std::time::Duration;

use log::info;
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::OptionalExtension as _;

use super::TreeStore;
use crate::model::*;
use crate::support::error::Error;

macro_rules! transparent_sql {
    ($t:ident) => {
        impl ToSql for $t {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                self.0.to_sql()
            }
        }

        impl FromSql for $t {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                FromSql::column_result(value).map(Self)
            }
        }
    };
}

transparent_sql!(ProjectId);
transparent_sql!(EvidenceId);
transparent_sql!(FolderId);

static MIGRATIONS: &[&str] = &[
    include_str!("tree_db.v1.sql"),
    include_str!("tree_db.v2.sql"),
];

fn from_single<T: FromSql>(row: &rusqlite::Row<'_>) -> rusqlite::Result<T> {
    row.get(0)
}

fn node_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TreeNode> {
    Ok(TreeNode {
        id: row.get(0)?,
        evidence: row.get(1)?,
        project: row.get(2)?,
        title: row.get(3)?,
        parent: row.get(4)?,
    })
}

fn evidence_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Evidence> {
    Ok(Evidence {
        id: row.get(0)?,
        project: row.get(1)?,
        file_hash: row.get(2)?,
        file_name: row.get(3)?,
        parsed: row.get(4)?,
    })
}

const EVIDENCE_COLUMNS: &str =
    "SELECT `id`, `project`, `file_hash`, `file_name`, `parsed` \
     FROM `evidence`";

const NODE_COLUMNS: &str =
    "SELECT `id`, `evidence`, `project`, `title`, `parent_id` \
     FROM `tree_node`";

/// A connection to the tree database.
pub struct TreeDb {
    cxn: rusqlite::Connection,
}

impl TreeDb {
    pub fn open(path: &Path) -> Result<Self, Error> {
        Self::init(rusqlite::Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        Self::init(rusqlite::Connection::open_in_memory()?)
    }

    fn init(mut cxn: rusqlite::Connection) -> Result<Self, Error> {
        cxn.pragma_update(None, "foreign_keys", true)?;
        cxn.busy_timeout(Duration::from_secs(10))?;
        apply_migrations(&mut cxn)?;
        Ok(Self { cxn })
    }

    fn query_nodes(
        &mut self,
        filter: &str,
        param: &dyn ToSql,
    ) -> Result<Vec<TreeNode>, Error> {
        let mut stmt = self.cxn.prepare_cached(&format!(
            "{} WHERE {} ORDER BY `rowid`",
            NODE_COLUMNS, filter
        ))?;
        let nodes = stmt
            .query_map([param], node_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(nodes)
    }
}

fn apply_migrations(cxn: &mut rusqlite::Connection) -> Result<(), Error> {
    let txn = cxn
        .transaction_with_behavior(rusqlite::TransactionBehavior::Exclusive)?;
    txn.execute(
        "CREATE TABLE IF NOT EXISTS `migration` (\
         `version` INTEGER NOT NULL PRIMARY KEY, \
         `applied_at` INTEGER NOT NULL\
         ) STRICT",
        (),
    )?;

    let current_version = txn
        .query_row(
            "SELECT MAX(`version`) FROM `migration`",
            (),
            from_single::<Option<usize>>,
        )?
        .unwrap_or(0);

    for (version, migration) in MIGRATIONS
        .iter()
        .copied()
        .enumerate()
        .map(|(ix, migration)| (ix + 1, migration))
        .skip(current_version)
    {
        info!("Applying #{} migration to tree DB", version);
        txn.execute_batch(migration)?;
        txn.execute(
            "INSERT INTO `migration` (`version`, `applied_at`) \
             VALUES (?, ?)",
            (version, chrono::Utc::now().timestamp()),
        )?;
    }

    txn.commit()?;
    Ok(())
}

impl TreeStore for TreeDb {
    fn save_evidence(&mut self, evidence: &Evidence) -> Result<(), Error> {
        self.cxn.execute(
            "INSERT INTO `evidence` \
             (`id`, `project`, `file_hash`, `file_name`, `parsed`) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT (`id`) DO UPDATE SET `parsed` = excluded.`parsed`",
            (
                &evidence.id,
                &evidence.project,
                &evidence.file_hash,
                &evidence.file_name,
                evidence.parsed,
            ),
        )?;
        Ok(())
    }

    fn load_evidence(
        &mut self,
        id: &EvidenceId,
    ) -> Result<Option<Evidence>, Error> {
        let evidence = self
            .cxn
            .query_row(
                &format!("{} WHERE `id` = ?", EVIDENCE_COLUMNS),
                (id,),
                evidence_from_row,
            )
            .optional()?;
        Ok(evidence)
    }

    fn find_evidence(
        &mut self,
        project: &ProjectId,
        file_hash: &str,
    ) -> Result<Option<Evidence>, Error> {
        // A parsed record wins over any unparsed duplicate.
        let evidence = self
            .cxn
            .query_row(
                &format!(
                    "{} WHERE `project` = ? AND `file_hash` = ? \
                     ORDER BY `parsed` DESC, `rowid` LIMIT 1",
                    EVIDENCE_COLUMNS
                ),
                (project, file_hash),
                evidence_from_row,
            )
            .optional()?;
        Ok(evidence)
    }

    fn save_node(&mut self, node: &TreeNode) -> Result<(), Error> {
        let txn = self.cxn.transaction()?;

        if let Some(ref parent) = node.parent {
            let parent_evidence = txn
                .query_row(
                    "SELECT `evidence` FROM `tree_node` WHERE `id` = ?",
                    (parent,),
                    from_single::<EvidenceId>,
                )
                .optional()?;
            if Some(&node.evidence) != parent_evidence.as_ref() {
                return Err(Error::NxParent(parent.to_string()));
            }
        }

        txn.execute(
            "INSERT INTO `tree_node` \
             (`id`, `evidence`, `project`, `title`, `parent_id`) \
             VALUES (?, ?, ?, ?, ?)",
            (
                &node.id,
                &node.evidence,
                &node.project,
                &node.title,
                &node.parent,
            ),
        )?;
        txn.commit()?;
        Ok(())
    }

    fn discard_nodes(&mut self, evidence: &EvidenceId) -> Result<usize, Error> {
        let txn = self.cxn.transaction()?;
        // Parents always precede their children in rowid order, so deleting
        // newest first never strands a child.
        let ids = txn
            .prepare(
                "SELECT `id` FROM `tree_node` WHERE `evidence` = ? \
                 ORDER BY `rowid` DESC",
            )?
            .query_map((evidence,), from_single::<FolderId>)?
            .collect::<Result<Vec<_>, _>>()?;
        for id in &ids {
            txn.execute("DELETE FROM `tree_node` WHERE `id` = ?", (id,))?;
        }
        txn.commit()?;
        Ok(ids.len())
    }

    fn root_nodes(
        &mut self,
        project: &ProjectId,
    ) -> Result<Vec<TreeNode>, Error> {
        self.query_nodes("`project` = ? AND `parent_id` IS NULL", project)
    }

    fn children(&mut self, node: &FolderId) -> Result<Vec<TreeNode>, Error> {
        self.query_nodes("`parent_id` = ?", node)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::TreeNodeView;

    fn evidence() -> Evidence {
        Evidence::new(ProjectId::from("p1"), "cafe".to_owned(), "mail.zip")
    }

    #[test]
    fn evidence_upsert_only_touches_parsed() {
        let mut db = TreeDb::open_in_memory().unwrap();
        let mut ev = evidence();
        db.save_evidence(&ev).unwrap();

        ev.parsed = true;
        ev.file_name = "renamed".to_owned();
        db.save_evidence(&ev).unwrap();

        let loaded = db.load_evidence(&ev.id).unwrap().unwrap();
        assert!(loaded.parsed);
        assert!(loaded.file_name.ends_with("-mail.zip"));
        assert_eq!(None, db.load_evidence(&EvidenceId::from("nx")).unwrap());
    }

    #[test]
    fn forest_queries() {
        let mut db = TreeDb::open_in_memory().unwrap();
        let ev = evidence();
        let root = TreeNode::root(&ev);
        let inbox = root.child("Inbox".to_owned());
        let work = inbox.child("Work".to_owned());
        let sent = root.child("Sent".to_owned());
        for node in &[&root, &inbox, &work, &sent] {
            db.save_node(node).unwrap();
        }

        assert_eq!(
            vec![root.clone()],
            db.root_nodes(&ProjectId::from("p1")).unwrap()
        );
        assert!(db.root_nodes(&ProjectId::from("p2")).unwrap().is_empty());
        assert_eq!(
            vec![inbox.clone(), sent.clone()],
            db.children(&root.id).unwrap()
        );
        assert_eq!(
            vec![inbox.id.clone(), work.id.clone(), sent.id.clone()],
            db.walk_ids(&root.id).unwrap()
        );
        assert_eq!(
            vec![
                TreeNodeView {
                    value: inbox.id.clone(),
                    label: "Inbox".to_owned(),
                    children: vec![TreeNodeView {
                        value: work.id.clone(),
                        label: "Work".to_owned(),
                        children: vec![],
                    }],
                },
                TreeNodeView {
                    value: sent.id.clone(),
                    label: "Sent".to_owned(),
                    children: vec![],
                },
            ],
            db.walk(&root.id).unwrap()
        );
    }

    #[test]
    fn orphans_are_rejected() {
        let mut db = TreeDb::open_in_memory().unwrap();
        let ev = evidence();
        let root = TreeNode::root(&ev);
        let child = root.child("Inbox".to_owned());
        assert_matches!(Err(Error::NxParent(_)), db.save_node(&child));

        db.save_node(&root).unwrap();
        let other = Evidence::new(ev.project.clone(), "beef".to_owned(), "x");
        let mut foreign = TreeNode::root(&other);
        foreign.parent = Some(root.id.clone());
        assert_matches!(Err(Error::NxParent(_)), db.save_node(&foreign));
    }

    #[test]
    fn discarding_removes_only_one_evidence() {
        let mut db = TreeDb::open_in_memory().unwrap();
        let ev = evidence();
        let root = TreeNode::root(&ev);
        let inbox = root.child("Inbox".to_owned());
        let work = inbox.child("Work".to_owned());
        let other = Evidence::new(ev.project.clone(), "beef".to_owned(), "y");
        let other_root = TreeNode::root(&other);
        for node in &[&root, &inbox, &work, &other_root] {
            db.save_node(node).unwrap();
        }

        assert_eq!(3, db.discard_nodes(&ev.id).unwrap());
        assert_eq!(
            vec![other_root],
            db.root_nodes(&ProjectId::from("p1")).unwrap()
        );
        assert!(db.children(&root.id).unwrap().is_empty());
        assert_eq!(0, db.discard_nodes(&ev.id).unwrap());
    }

    #[test]
    fn evidence_found_by_content_hash() {
        let mut db = TreeDb::open_in_memory().unwrap();
        let p1 = ProjectId::from("p1");
        let first = evidence();
        let mut second = evidence();
        db.save_evidence(&first).unwrap();
        db.save_evidence(&second).unwrap();

        assert_eq!(
            Some(first.id.clone()),
            db.find_evidence(&p1, "cafe").unwrap().map(|e| e.id)
        );

        second.parsed = true;
        db.save_evidence(&second).unwrap();
        assert_eq!(
            Some(second.id.clone()),
            db.find_evidence(&p1, "cafe").unwrap().map(|e| e.id)
        );

        assert_eq!(None, db.find_evidence(&p1, "beef").unwrap());
        assert_eq!(
            None,
            db.find_evidence(&ProjectId::from("p2"), "cafe").unwrap()
        );
    }

    #[test]
    fn migrations_are_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tree.sqlite");
        let ev = evidence();
        TreeDb::open(&path).unwrap().save_evidence(&ev).unwrap();
        let mut db = TreeDb::open(&path).unwrap();
        assert_eq!(Some(ev.clone()), db.load_evidence(&ev.id).unwrap());
    }
}
