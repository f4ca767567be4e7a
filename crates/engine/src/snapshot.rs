//! Persisted sheet shapes and loading.
//!
//! Two forms share one struct. The light form carries only `content` (the
//! full value matrix) and is rehydrated with fresh cells on load. The full
//! form adds `hashSheet` and `cellHistory` so provenance survives a reload.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::cell::{Cell, CellKind};
use crate::cell_id::{CellUid, UidSource};
use crate::edit::EditOutcome;
use crate::error::{GridError, Rejection};
use crate::sheet::{EditClass, GridMode, Persist, Sheet, SheetConfig, SheetDomain, SheetKind, SourceData};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotForm {
    /// Identity + value matrix.
    Light,
    /// Light plus coordinate array and complete history.
    #[default]
    Full,
}

/// One entry of a persisted history.
///
/// Records that fail to parse as a cell are kept as raw JSON so a single
/// corrupt entry does not sink the whole load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HistoryRecord {
    Cell(Cell),
    Malformed(serde_json::Value),
}

/// The allow-list of persisted sheet fields.
///
/// Missing fields take the values a freshly created sheet has.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SheetSnapshot {
    pub uid: String,
    pub name: String,
    pub domain: SheetDomain,
    #[serde(rename = "type")]
    pub kind: SheetKind,
    pub enable: bool,
    pub required: bool,
    pub tochat: bool,
    pub trigger_send: bool,
    pub trigger_send_deep: i64,
    pub config: SheetConfig,
    pub source_data: SourceData,
    pub content: Vec<Vec<String>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub template: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_sheet: Option<Vec<Vec<CellUid>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell_history: Option<Vec<HistoryRecord>>,
}

impl Default for SheetSnapshot {
    fn default() -> Self {
        Self {
            uid: String::new(),
            name: String::new(),
            domain: SheetDomain::default(),
            kind: SheetKind::default(),
            enable: true,
            required: false,
            tochat: true,
            trigger_send: false,
            trigger_send_deep: 1,
            config: SheetConfig::default(),
            source_data: SourceData::default(),
            content: Vec::new(),
            template: false,
            hash_sheet: None,
            cell_history: None,
        }
    }
}

/// The coordinate array of one sheet as of one chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceSnapshot {
    pub sheet_uid: String,
    pub hash_sheet: Vec<Vec<CellUid>>,
}

impl Sheet {
    pub fn to_snapshot(&self, form: SnapshotForm) -> SheetSnapshot {
        let mut snapshot = SheetSnapshot {
            uid: self.uid.clone(),
            name: self.name.clone(),
            domain: self.domain,
            kind: self.kind,
            enable: self.enable,
            required: self.required,
            tochat: self.tochat,
            trigger_send: self.trigger_send,
            trigger_send_deep: self.trigger_send_deep,
            config: self.config.clone(),
            source_data: self.source_data.clone(),
            content: self.to_content_matrix(true),
            template: self.is_template(),
            hash_sheet: None,
            cell_history: None,
        };
        if form == SnapshotForm::Full {
            snapshot.hash_sheet = Some(self.hash_sheet.clone());
            snapshot.cell_history = Some(
                self.cell_history
                    .iter()
                    .cloned()
                    .map(HistoryRecord::Cell)
                    .collect(),
            );
        }
        snapshot
    }

    /// Build a sheet from a snapshot, minting new uids from `uids`.
    pub fn from_snapshot(snapshot: &SheetSnapshot, uids: Box<dyn UidSource>) -> Self {
        let mode = if snapshot.template { GridMode::Template } else { GridMode::Full };
        let mut sheet = Sheet::blank(&snapshot.name, mode, uids);
        sheet.load_from_snapshot(snapshot);
        sheet
    }

    /// Replace this sheet's state with the snapshot's.
    ///
    /// Never fails: malformed history records are skipped, and uids the
    /// layout references without a surviving record become placeholders.
    pub fn load_from_snapshot(&mut self, snapshot: &SheetSnapshot) -> &mut Self {
        if !snapshot.uid.is_empty() {
            self.uid = snapshot.uid.clone();
        }
        self.name = snapshot.name.clone();
        self.domain = snapshot.domain;
        self.kind = snapshot.kind;
        self.enable = snapshot.enable;
        self.required = snapshot.required;
        self.tochat = snapshot.tochat;
        self.trigger_send = snapshot.trigger_send;
        self.trigger_send_deep = snapshot.trigger_send_deep;
        self.config = snapshot.config.clone();
        self.source_data = snapshot.source_data.clone();
        self.mode = if snapshot.template { GridMode::Template } else { GridMode::Full };

        self.cell_history.clear();
        self.cells.clear();
        self.hash_sheet.clear();
        self.position.mark_dirty();

        match (&snapshot.hash_sheet, &snapshot.cell_history) {
            (Some(layout), Some(history)) if is_rectangular(layout) => {
                let layout: &[Vec<CellUid>] = match self.mode {
                    GridMode::Template if layout.len() > 1 => {
                        log::warn!("sheet {}: template keeps only the header row of {} rows", self.uid, layout.len());
                        &layout[..1]
                    }
                    _ => layout,
                };
                self.replay(layout, history);
            }
            (Some(_), Some(_)) => {
                log::warn!("sheet {}: stored layout is not rectangular, using content", self.uid);
                self.rebuild_from_value_matrix(&snapshot.content);
            }
            _ if !snapshot.content.is_empty() => {
                self.rebuild_from_value_matrix(&snapshot.content);
            }
            _ => {
                log::warn!("sheet {}: snapshot has no cells, initializing empty", self.uid);
                self.init(1, 1);
            }
        }
        self
    }

    fn replay(&mut self, layout: &[Vec<CellUid>], history: &[HistoryRecord]) {
        let mut skipped = 0usize;
        for record in history {
            match record {
                HistoryRecord::Cell(cell) if !self.cells.contains_key(&cell.uid) => {
                    let mut cell = cell.clone();
                    if cell.coord_uid.is_empty() {
                        cell.coord_uid = cell.uid.as_str().to_string();
                    }
                    self.register(cell);
                }
                HistoryRecord::Cell(cell) => {
                    log::warn!("sheet {}: duplicate history record {}, keeping the first", self.uid, cell.uid);
                    skipped += 1;
                }
                HistoryRecord::Malformed(raw) => {
                    log::warn!("sheet {}: skipping malformed history record: {}", self.uid, raw);
                    skipped += 1;
                }
            }
        }
        if skipped > 0 {
            log::warn!("sheet {}: {} history record(s) skipped on load", self.uid, skipped);
        }

        self.hash_sheet = layout.to_vec();
        self.heal_layout(true);
    }

    /// Materialize placeholders for uids the layout references but history
    /// lacks; optionally re-tag every referenced cell by its position.
    fn heal_layout(&mut self, retag: bool) {
        for r in 0..self.hash_sheet.len() {
            for c in 0..self.hash_sheet[r].len() {
                let uid = self.hash_sheet[r][c].clone();
                let kind = CellKind::for_position(r, c);
                match self.cells.get(&uid) {
                    Some(&slot) => {
                        if retag {
                            self.cell_history[slot].kind = kind;
                        }
                    }
                    None => {
                        log::warn!("sheet {}: cell {} missing from history, using an empty placeholder", self.uid, uid);
                        self.register(Cell::placeholder(uid, kind));
                    }
                }
            }
        }
        self.position.mark_dirty();
    }

    // =========================================================================
    // Pieces
    // =========================================================================

    /// Capture the current layout for the chat turn being saved.
    pub fn piece_snapshot(&self) -> PieceSnapshot {
        PieceSnapshot {
            sheet_uid: self.uid.clone(),
            hash_sheet: self.hash_sheet.clone(),
        }
    }

    /// Reinstate a layout captured by [`piece_snapshot`](Self::piece_snapshot).
    pub fn restore_piece(&mut self, piece: &PieceSnapshot) -> Result<EditOutcome, GridError> {
        if piece.sheet_uid != self.uid {
            return Err(GridError::ForeignPiece {
                expected: self.uid.clone(),
                found: piece.sheet_uid.clone(),
            });
        }
        if let Some(rejection) = self
            .check_kind(EditClass::Row, "layout restores")
            .or_else(|| self.check_kind(EditClass::Column, "layout restores"))
        {
            return Ok(self.reject(rejection));
        }
        if !is_rectangular(&piece.hash_sheet) {
            return Ok(self.reject(Rejection::MalformedPiece));
        }
        if self.mode == GridMode::Template && piece.hash_sheet.len() > 1 {
            return Ok(self.reject(Rejection::TemplateHeaderOnly));
        }
        self.hash_sheet = piece.hash_sheet.clone();
        self.heal_layout(false);
        self.autosave(Persist::Save);
        Ok(EditOutcome::Applied)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Drop history entries no longer reachable from the grid.
    ///
    /// Returns how many records were dropped.
    pub fn compact_history(&mut self) -> usize {
        self.compact_history_keeping(&[])
    }

    /// Like [`compact_history`](Self::compact_history), also keeping every
    /// cell referenced by `pieces`.
    pub fn compact_history_keeping(&mut self, pieces: &[&PieceSnapshot]) -> usize {
        let reachable: FxHashSet<&CellUid> = self
            .hash_sheet
            .iter()
            .chain(pieces.iter().flat_map(|p| p.hash_sheet.iter()))
            .flatten()
            .collect();

        let before = self.cell_history.len();
        let kept: Vec<Cell> = self
            .cell_history
            .iter()
            .filter(|cell| reachable.contains(&cell.uid))
            .cloned()
            .collect();

        self.cell_history.clear();
        self.cells.clear();
        for cell in kept {
            self.register(cell);
        }
        let dropped = before - self.cell_history.len();
        if dropped > 0 {
            log::info!("sheet {}: compacted history, dropped {} record(s)", self.uid, dropped);
        }
        dropped
    }
}

fn is_rectangular(layout: &[Vec<CellUid>]) -> bool {
    match layout.first() {
        Some(first) if !first.is_empty() => layout.iter().all(|row| row.len() == first.len()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell_id::SequentialUids;

    fn sheet(cols: usize, rows: usize) -> Sheet {
        Sheet::with_uids("Test", cols, rows, Box::new(SequentialUids::default()))
    }

    fn edited_sheet() -> Sheet {
        let mut s = sheet(3, 3);
        let header = s.hash_sheet()[0][1].clone();
        assert!(s.set_value(&header, "Name").unwrap().is_applied());
        let cell = s.hash_sheet()[1][1].clone();
        assert!(s.set_value(&cell, "Ann").unwrap().is_applied());
        s.source_data.note = "people met".to_string();
        s.trigger_send_deep = 3;
        s
    }

    #[test]
    fn test_full_snapshot_round_trip_keeps_provenance() {
        let a = edited_sheet();
        let snap = a.to_snapshot(SnapshotForm::Full);

        let b = Sheet::from_snapshot(&snap, Box::new(SequentialUids::new("x")));
        assert_eq!(b.uid(), a.uid());
        assert_eq!(b.to_content_matrix(true), a.to_content_matrix(true));
        assert_eq!(b.history().len(), a.history().len());
        assert_eq!(b.hash_sheet(), a.hash_sheet());
        assert_eq!(b.source_data.note, "people met");
        assert_eq!(b.trigger_send_deep, 3);
    }

    #[test]
    fn test_light_snapshot_round_trip_rehydrates_content() {
        let a = edited_sheet();
        let snap = a.to_snapshot(SnapshotForm::Light);
        assert!(snap.hash_sheet.is_none());
        assert!(snap.cell_history.is_none());

        let b = Sheet::from_snapshot(&snap, Box::new(SequentialUids::new("x")));
        assert_eq!(b.to_content_matrix(true), a.to_content_matrix(true));
        assert_eq!(b.history().len(), 9);
    }

    #[test]
    fn test_snapshot_json_field_names() {
        let snap = edited_sheet().to_snapshot(SnapshotForm::Light);
        let json = serde_json::to_value(&snap).unwrap();
        for key in ["uid", "name", "domain", "type", "enable", "required", "triggerSend",
                    "triggerSendDeep", "config", "sourceData", "content"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        assert!(json.get("hashSheet").is_none());
        assert!(json.get("template").is_none());
        assert_eq!(json["type"], "free");
        assert_eq!(json["domain"], "chat");
    }

    #[test]
    fn test_load_heals_missing_and_malformed_records() {
        let snap: SheetSnapshot = serde_json::from_value(serde_json::json!({
            "uid": "sheet_x",
            "name": "Broken",
            "hashSheet": [["a", "b"], ["c", "d"]],
            "cellHistory": [
                {"uid": "a", "type": "cell", "data": {"value": ""}},
                {"uid": "b", "data": {"value": "Name"}},
                42,
                {"uid": "d", "data": {"value": "Ann"}}
            ]
        }))
        .unwrap();

        let s = Sheet::from_snapshot(&snap, Box::new(SequentialUids::default()));
        assert_eq!(s.row_count(), 2);
        // Re-tagged by position
        assert_eq!(s.cell_at(0, 0).unwrap().kind, CellKind::Origin);
        assert_eq!(s.cell_at(0, 1).unwrap().kind, CellKind::ColumnHeader);
        // "c" was never recorded: placeholder
        let healed = s.cell_at(1, 0).unwrap();
        assert_eq!(healed.kind, CellKind::RowHeader);
        assert_eq!(healed.value(), "");
        assert_eq!(s.cell_at(1, 1).unwrap().value(), "Ann");
        assert_eq!(s.history().len(), 4);
    }

    #[test]
    fn test_load_ragged_layout_falls_back_to_content() {
        let snap: SheetSnapshot = serde_json::from_value(serde_json::json!({
            "name": "Ragged",
            "content": [["", "H"], ["", "v"]],
            "hashSheet": [["a", "b"], ["c"]],
            "cellHistory": []
        }))
        .unwrap();
        let s = Sheet::from_snapshot(&snap, Box::new(SequentialUids::default()));
        assert_eq!(s.to_content_matrix(false), vec![vec!["v".to_string()]]);
    }

    #[test]
    fn test_load_empty_snapshot_initializes() {
        let s = Sheet::from_snapshot(&SheetSnapshot::default(), Box::new(SequentialUids::default()));
        assert_eq!(s.row_count(), 1);
        assert_eq!(s.col_count(), 1);
    }

    #[test]
    fn test_piece_restore() {
        let mut s = sheet(2, 2);
        let piece = s.piece_snapshot();
        let uid = s.hash_sheet()[1][1].clone();
        assert!(s.set_value(&uid, "later").unwrap().is_applied());

        assert!(s.restore_piece(&piece).unwrap().is_applied());
        assert_eq!(s.cell_at(1, 1).unwrap().value(), "");
        assert_eq!(s.position_of(&uid), Some((1, 1)));
    }

    #[test]
    fn test_piece_restore_rejected_on_static_sheet() {
        let mut s = sheet(2, 2);
        let piece = s.piece_snapshot();
        let uid = s.hash_sheet()[1][1].clone();
        let EditOutcome::Edited(later) = s.set_value(&uid, "later").unwrap() else {
            panic!("edit failed");
        };
        s.kind = SheetKind::Static;

        assert_eq!(
            s.restore_piece(&piece).unwrap(),
            EditOutcome::Rejected(Rejection::KindForbids { kind: SheetKind::Static, what: "layout restores" })
        );
        assert_eq!(s.cell_at(1, 1).unwrap().uid, later);
        assert_eq!(s.cell_at(1, 1).unwrap().value(), "later");
    }

    #[test]
    fn test_piece_restore_rejected_on_fixed_and_dynamic_sheets() {
        for kind in [SheetKind::Fixed, SheetKind::Dynamic] {
            let mut s = sheet(2, 2);
            let piece = s.piece_snapshot();
            s.kind = kind;
            assert!(matches!(
                s.restore_piece(&piece).unwrap(),
                EditOutcome::Rejected(Rejection::KindForbids { .. })
            ));
        }
    }

    #[test]
    fn test_piece_restore_keeps_template_single_row() {
        let mut t = Sheet::new_template_with("Tpl", 2, Box::new(SequentialUids::default()));
        let mut piece = t.piece_snapshot();
        let extra = vec![CellUid::new("r1"), CellUid::new("r2")];
        piece.hash_sheet.push(extra);

        assert_eq!(
            t.restore_piece(&piece).unwrap(),
            EditOutcome::Rejected(Rejection::TemplateHeaderOnly)
        );
        assert!(t.is_template());
        assert_eq!(t.row_count(), 1);

        piece.hash_sheet.truncate(1);
        assert!(t.restore_piece(&piece).unwrap().is_applied());
        assert_eq!(t.row_count(), 1);
    }

    #[test]
    fn test_load_template_keeps_header_row_only() {
        let snap: SheetSnapshot = serde_json::from_value(serde_json::json!({
            "uid": "sheet_t",
            "name": "Tpl",
            "template": true,
            "hashSheet": [["a", "b"], ["c", "d"]],
            "cellHistory": [
                {"uid": "a", "data": {"value": ""}},
                {"uid": "b", "data": {"value": "Name"}},
                {"uid": "c", "data": {"value": ""}},
                {"uid": "d", "data": {"value": "Ann"}}
            ]
        }))
        .unwrap();

        let s = Sheet::from_snapshot(&snap, Box::new(SequentialUids::default()));
        assert!(s.is_template());
        assert_eq!(s.row_count(), 1);
        assert_eq!(s.header(), vec!["Name"]);
        assert_eq!(s.render_grid(None).rows.len(), 1);
        // The dropped row stays in history
        assert_eq!(s.history().len(), 4);
    }

    #[test]
    fn test_light_snapshot_defaults_match_new_sheet() {
        let snap: SheetSnapshot = serde_json::from_value(serde_json::json!({
            "uid": "sheet_l",
            "name": "Light",
            "content": [["", "Name"], ["", "Ann"]]
        }))
        .unwrap();

        let s = Sheet::from_snapshot(&snap, Box::new(SequentialUids::default()));
        let fresh = sheet(2, 2);
        assert_eq!(s.enable, fresh.enable);
        assert_eq!(s.tochat, fresh.tochat);
        assert_eq!(s.required, fresh.required);
        assert_eq!(s.trigger_send_deep, fresh.trigger_send_deep);
        assert!(s.enable && s.tochat);
        assert_eq!(s.trigger_send_deep, 1);
    }

    #[test]
    fn test_foreign_piece_is_error() {
        let mut s = sheet(2, 2);
        let mut piece = s.piece_snapshot();
        piece.sheet_uid = "sheet_other".to_string();
        assert!(matches!(s.restore_piece(&piece), Err(GridError::ForeignPiece { .. })));
    }

    #[test]
    fn test_compact_history() {
        let mut s = sheet(2, 2);
        let first = s.hash_sheet()[1][1].clone();
        let EditOutcome::Edited(second) = s.set_value(&first, "1").unwrap() else {
            panic!("edit failed");
        };
        let piece = s.piece_snapshot();
        assert!(s.set_value(&second, "2").unwrap().is_applied());
        assert_eq!(s.history().len(), 6);

        let dropped = s.compact_history_keeping(&[&piece]);
        assert_eq!(dropped, 1);
        assert!(s.cell_by_uid(&first).is_none());
        assert!(s.cell_by_uid(&second).is_some());

        assert_eq!(s.compact_history(), 1);
        assert_eq!(s.history().len(), 4);
        assert_eq!(s.cell_at(1, 1).unwrap().value(), "2");
    }
}
