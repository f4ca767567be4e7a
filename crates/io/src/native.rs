// Native store: sheet snapshots and per-turn pieces in SQLite

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use memgrid_engine::cell_id::RandomUids;
use memgrid_engine::error::StoreError;
use memgrid_engine::sheet::Sheet;
use memgrid_engine::snapshot::{PieceSnapshot, SheetSnapshot};
use memgrid_engine::store::SheetStore;

use crate::error::IoError;
use crate::NATIVE_FORMAT_VERSION;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sheets (
    uid TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    snapshot TEXT NOT NULL,     -- SheetSnapshot as JSON
    updated_at TEXT NOT NULL    -- RFC 3339
);

CREATE TABLE IF NOT EXISTS pieces (
    piece_id TEXT NOT NULL,
    sheet_uid TEXT NOT NULL,
    hash_sheet TEXT NOT NULL,   -- coordinate array as JSON
    created_at TEXT NOT NULL,
    PRIMARY KEY (piece_id, sheet_uid)
);

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// One row of the sheet listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetSummary {
    pub uid: String,
    pub name: String,
    pub updated_at: String,
}

pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").field("path", &self.path).finish()
    }
}

impl SqliteStore {
    /// Open or create a store file.
    pub fn open(path: &Path) -> Result<Self, IoError> {
        let conn = Connection::open(path)?;
        let store = Self { conn, path: Some(path.to_path_buf()) };
        store.init_schema()?;
        log::debug!("opened store {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, IoError> {
        let store = Self { conn: Connection::open_in_memory()?, path: None };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), IoError> {
        self.conn.execute_batch(SCHEMA)?;

        let version: Option<String> = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = 'format_version'", [], |row| row.get(0))
            .optional()?;
        match version {
            None => {
                self.conn.execute(
                    "INSERT INTO meta (key, value) VALUES (?1, ?2)",
                    params!["format_version", NATIVE_FORMAT_VERSION.to_string()],
                )?;
            }
            Some(v) if v != NATIVE_FORMAT_VERSION.to_string() => {
                log::warn!("store format version {} differs from {}", v, NATIVE_FORMAT_VERSION);
            }
            Some(_) => {}
        }
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Every stored sheet, most recently updated first.
    pub fn summaries(&self) -> Result<Vec<SheetSummary>, IoError> {
        let mut stmt = self
            .conn
            .prepare("SELECT uid, name, updated_at FROM sheets ORDER BY updated_at DESC, uid")?;
        let rows = stmt.query_map([], |row| {
            Ok(SheetSummary {
                uid: row.get(0)?,
                name: row.get(1)?,
                updated_at: row.get(2)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Resolve a sheet by uid, or by name when no uid matches.
    pub fn find(&self, key: &str) -> Result<Option<SheetSnapshot>, IoError> {
        if let Some(snapshot) = self.read_sheet(key)? {
            return Ok(Some(snapshot));
        }
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT snapshot FROM sheets WHERE name = ?1 ORDER BY updated_at DESC LIMIT 1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| serde_json::from_str(&j).map_err(IoError::from))
            .transpose()
    }

    /// Load a live sheet; new cells get random uids.
    pub fn load_sheet(&self, key: &str) -> Result<Option<Sheet>, IoError> {
        Ok(self
            .find(key)?
            .map(|snapshot| Sheet::from_snapshot(&snapshot, Box::new(RandomUids))))
    }

    fn read_sheet(&self, uid: &str) -> Result<Option<SheetSnapshot>, IoError> {
        let json: Option<String> = self
            .conn
            .query_row("SELECT snapshot FROM sheets WHERE uid = ?1", params![uid], |row| row.get(0))
            .optional()?;
        json.map(|j| serde_json::from_str(&j).map_err(IoError::from))
            .transpose()
    }

    fn write_sheet(&self, snapshot: &SheetSnapshot) -> Result<(), IoError> {
        let json = serde_json::to_string(snapshot)?;
        self.conn.execute(
            "INSERT INTO sheets (uid, name, snapshot, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(uid) DO UPDATE SET name = excluded.name, snapshot = excluded.snapshot, updated_at = excluded.updated_at",
            params![&snapshot.uid, &snapshot.name, json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn write_piece(&self, piece_id: &str, piece: &PieceSnapshot) -> Result<(), IoError> {
        let json = serde_json::to_string(&piece.hash_sheet)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO pieces (piece_id, sheet_uid, hash_sheet, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![piece_id, &piece.sheet_uid, json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn read_piece(&self, piece_id: &str, sheet_uid: &str) -> Result<Option<PieceSnapshot>, IoError> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT hash_sheet FROM pieces WHERE piece_id = ?1 AND sheet_uid = ?2",
                params![piece_id, sheet_uid],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(j) => Ok(Some(PieceSnapshot {
                sheet_uid: sheet_uid.to_string(),
                hash_sheet: serde_json::from_str(&j)?,
            })),
            None => Ok(None),
        }
    }

    fn read_pieces(&self, sheet_uid: &str) -> Result<Vec<(String, PieceSnapshot)>, IoError> {
        let mut stmt = self
            .conn
            .prepare("SELECT piece_id, hash_sheet FROM pieces WHERE sheet_uid = ?1 ORDER BY piece_id")?;
        let rows = stmt.query_map(params![sheet_uid], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (piece_id, json) = row?;
            let piece = PieceSnapshot {
                sheet_uid: sheet_uid.to_string(),
                hash_sheet: serde_json::from_str(&json)?,
            };
            out.push((piece_id, piece));
        }
        Ok(out)
    }

    fn remove_sheet(&mut self, uid: &str) -> Result<bool, IoError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM pieces WHERE sheet_uid = ?1", params![uid])?;
        let removed = tx.execute("DELETE FROM sheets WHERE uid = ?1", params![uid])?;
        tx.commit()?;
        Ok(removed > 0)
    }
}

impl SheetStore for SqliteStore {
    fn put_sheet(&mut self, snapshot: &SheetSnapshot) -> Result<(), StoreError> {
        if snapshot.uid.is_empty() {
            return Err(StoreError::MissingKey);
        }
        Ok(self.write_sheet(snapshot)?)
    }

    fn get_sheet(&self, uid: &str) -> Result<Option<SheetSnapshot>, StoreError> {
        Ok(self.read_sheet(uid)?)
    }

    fn list_sheets(&self) -> Result<Vec<String>, StoreError> {
        let mut uids: Vec<String> = self.summaries()?.into_iter().map(|s| s.uid).collect();
        uids.sort();
        Ok(uids)
    }

    fn delete_sheet(&mut self, uid: &str) -> Result<bool, StoreError> {
        Ok(self.remove_sheet(uid)?)
    }

    fn put_piece(&mut self, piece_id: &str, piece: &PieceSnapshot) -> Result<(), StoreError> {
        if piece_id.is_empty() || piece.sheet_uid.is_empty() {
            return Err(StoreError::MissingKey);
        }
        Ok(self.write_piece(piece_id, piece)?)
    }

    fn get_piece(&self, piece_id: &str, sheet_uid: &str) -> Result<Option<PieceSnapshot>, StoreError> {
        Ok(self.read_piece(piece_id, sheet_uid)?)
    }

    fn pieces_for(&self, sheet_uid: &str) -> Result<Vec<(String, PieceSnapshot)>, StoreError> {
        Ok(self.read_pieces(sheet_uid)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memgrid_engine::snapshot::SnapshotForm;
    use tempfile::NamedTempFile;

    fn people() -> Sheet {
        let mut sheet = Sheet::new("People", 1, 1);
        sheet.rebuild_from_value_matrix(&[
            vec!["".into(), "Name".into(), "City".into()],
            vec!["".into(), "Alice".into(), "Paris".into()],
        ]);
        sheet
    }

    #[test]
    fn test_sheet_persists_across_reopen() {
        let file = NamedTempFile::new().unwrap();
        let mut sheet = people();
        {
            let mut store = SqliteStore::open(file.path()).unwrap();
            sheet.save(Some(&mut store)).unwrap();
        }

        let store = SqliteStore::open(file.path()).unwrap();
        let snapshot = store.get_sheet(sheet.uid()).unwrap().unwrap();
        assert_eq!(snapshot, sheet.to_snapshot(SnapshotForm::Full));

        let loaded = store.load_sheet("People").unwrap().unwrap();
        assert_eq!(loaded.uid(), sheet.uid());
        assert_eq!(loaded.to_content_matrix(true), sheet.to_content_matrix(true));
    }

    #[test]
    fn test_put_sheet_upserts() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut sheet = people();
        sheet.save(Some(&mut store)).unwrap();
        let uid = sheet.hash_sheet()[1][2].clone();
        assert!(sheet.set_value(&uid, "Rome").unwrap().is_applied());
        sheet.save(Some(&mut store)).unwrap();

        assert_eq!(store.list_sheets().unwrap().len(), 1);
        let snapshot = store.get_sheet(sheet.uid()).unwrap().unwrap();
        assert_eq!(snapshot.content[1][2], "Rome");
    }

    #[test]
    fn test_save_hook_writes_through_store() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let store = Rc::new(RefCell::new(SqliteStore::open_in_memory().unwrap()));
        let mut sheet = people();
        let target = Rc::clone(&store);
        sheet.set_save_hook(Box::new(move |snapshot| target.borrow_mut().put_sheet(snapshot)));

        let uid = sheet.hash_sheet()[1][1].clone();
        assert!(sheet.set_value(&uid, "Ann").unwrap().is_applied());

        let snapshot = store.borrow().get_sheet(sheet.uid()).unwrap().unwrap();
        assert_eq!(snapshot.content[1][1], "Ann");
    }

    #[test]
    fn test_pieces_roundtrip() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let sheet = people();
        let piece = sheet.piece_snapshot();
        store.put_piece("turn-7", &piece).unwrap();

        assert_eq!(store.get_piece("turn-7", sheet.uid()).unwrap(), Some(piece));
        assert_eq!(store.get_piece("turn-8", sheet.uid()).unwrap(), None);
        assert_eq!(store.pieces_for(sheet.uid()).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_sheet() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut sheet = people();
        sheet.save(Some(&mut store)).unwrap();
        store.put_piece("turn-1", &sheet.piece_snapshot()).unwrap();

        assert!(store.delete_sheet(sheet.uid()).unwrap());
        assert!(store.get_sheet(sheet.uid()).unwrap().is_none());
        assert!(store.pieces_for(sheet.uid()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_key_rejected() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let err = store.put_sheet(&SheetSnapshot::default()).unwrap_err();
        assert!(matches!(err, StoreError::MissingKey));
    }
}
