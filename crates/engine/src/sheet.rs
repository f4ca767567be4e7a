use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::address;
use crate::cell::{Cell, CellKind, ValueBag, VALUE_KEY};
use crate::cell_id::{CellUid, RandomUids, UidSource};
use crate::error::{GridError, StoreError};
use crate::position::PositionIndex;
use crate::snapshot::{SheetSnapshot, SnapshotForm};
use crate::store::SheetStore;

/// Where a sheet lives in the host application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetDomain {
    Global,
    Role,
    #[default]
    Chat,
}

/// Which edits a sheet accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetKind {
    /// Any structural or value edit.
    #[default]
    Free,
    /// Rows come and go; the column set is fixed.
    Dynamic,
    /// Shape is fixed; values are editable.
    Fixed,
    /// Read-only.
    Static,
}

/// Class of edit checked against [`SheetKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EditClass {
    Value,
    Row,
    Column,
}

impl SheetKind {
    pub(crate) fn allows(self, class: EditClass) -> bool {
        match self {
            SheetKind::Free => true,
            SheetKind::Dynamic => class != EditClass::Column,
            SheetKind::Fixed => class == EditClass::Value,
            SheetKind::Static => false,
        }
    }
}

/// Template sheets hold only the header row; full sheets hold data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GridMode {
    Template,
    #[default]
    Full,
}

/// Presentation and injection options stored with a sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SheetConfig {
    pub to_chat: bool,
    pub use_custom_style: bool,
    pub trigger_send_to_chat: bool,
    pub alternate_table: bool,
    pub insert_table: bool,
    pub alternate_level: u32,
    pub skip_top: bool,
    pub selected_custom_style_key: String,
    pub custom_styles: BTreeMap<String, String>,
}

/// Guidance strings describing how the table is meant to be maintained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SourceData {
    pub note: String,
    pub init_node: String,
    pub insert_node: String,
    pub update_node: String,
    pub delete_node: String,
}

/// Called with a fresh snapshot after every persisted mutation.
pub type SaveHook = Box<dyn FnMut(&SheetSnapshot) -> Result<(), StoreError>>;

/// Whether a mutation should reach the save hook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Persist {
    #[default]
    Save,
    Skip,
}

/// A versioned grid of cells.
///
/// `hash_sheet` holds the current layout as uids; `cell_history` holds every
/// cell version ever minted, in creation order. `cells` maps a uid to its
/// slot in history, so current and historical cells share storage.
pub struct Sheet {
    pub(crate) uid: String,
    pub name: String,
    pub domain: SheetDomain,
    pub kind: SheetKind,
    pub enable: bool,
    pub required: bool,
    pub tochat: bool,
    pub trigger_send: bool,
    pub trigger_send_deep: i64,
    pub config: SheetConfig,
    pub source_data: SourceData,
    pub(crate) mode: GridMode,
    pub(crate) hash_sheet: Vec<Vec<CellUid>>,
    pub(crate) cell_history: Vec<Cell>,
    pub(crate) cells: FxHashMap<CellUid, usize>,
    pub(crate) position: PositionIndex,
    uids: Box<dyn UidSource>,
    save_hook: Option<SaveHook>,
    snapshot_form: SnapshotForm,
    last_save_error: Option<String>,
}

impl std::fmt::Debug for Sheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sheet")
            .field("uid", &self.uid)
            .field("name", &self.name)
            .field("domain", &self.domain)
            .field("kind", &self.kind)
            .field("mode", &self.mode)
            .field("rows", &self.row_count())
            .field("cols", &self.col_count())
            .field("history", &self.cell_history.len())
            .field("has_save_hook", &self.save_hook.is_some())
            .finish()
    }
}

impl Sheet {
    /// Create a full sheet of `cols` x `rows` (header row/column included).
    pub fn new(name: &str, cols: usize, rows: usize) -> Self {
        Self::with_uids(name, cols, rows, Box::new(RandomUids))
    }

    pub fn with_uids(name: &str, cols: usize, rows: usize, uids: Box<dyn UidSource>) -> Self {
        let mut sheet = Self::blank(name, GridMode::Full, uids);
        sheet.init(cols, rows);
        sheet
    }

    /// A sheet with identity but no cells. Callers must init or load it.
    pub(crate) fn blank(name: &str, mode: GridMode, mut uids: Box<dyn UidSource>) -> Self {
        let uid = format!("sheet_{}", uids.next_uid());
        Self {
            uid,
            name: name.to_string(),
            domain: SheetDomain::default(),
            kind: SheetKind::default(),
            enable: true,
            required: false,
            tochat: true,
            trigger_send: false,
            trigger_send_deep: 1,
            config: SheetConfig::default(),
            source_data: SourceData::default(),
            mode,
            hash_sheet: Vec::new(),
            cell_history: Vec::new(),
            cells: FxHashMap::default(),
            position: PositionIndex::new(),
            uids,
            save_hook: None,
            snapshot_form: SnapshotForm::Full,
            last_save_error: None,
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Discard all cells and history and lay out a fresh grid.
    ///
    /// Templates always get a single row.
    pub fn init(&mut self, cols: usize, rows: usize) -> &mut Self {
        let cols = cols.max(1);
        let rows = match self.mode {
            GridMode::Template => 1,
            GridMode::Full => rows.max(1),
        };

        self.cell_history.clear();
        self.cells.clear();
        let mut layout = Vec::with_capacity(rows);
        for r in 0..rows {
            let mut uids = Vec::with_capacity(cols);
            for c in 0..cols {
                uids.push(self.mint(CellKind::for_position(r, c), ValueBag::new()));
            }
            layout.push(uids);
        }
        self.hash_sheet = layout;
        self.position.mark_dirty();
        log::debug!("sheet {}: initialized {}x{}", self.uid, rows, cols);
        self
    }

    /// Replace the layout with fresh cells built from raw values.
    ///
    /// Ragged rows are padded to the widest row. History is kept; the old
    /// cells simply become unreachable from the grid.
    pub fn rebuild_from_value_matrix(&mut self, matrix: &[Vec<String>]) -> &mut Self {
        let rows: &[Vec<String>] = match self.mode {
            GridMode::Template if matrix.len() > 1 => {
                log::warn!("sheet {}: template keeps only the header row of {} rows", self.uid, matrix.len());
                &matrix[..1]
            }
            _ => matrix,
        };
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        if rows.is_empty() || width == 0 {
            log::warn!("sheet {}: empty value matrix, falling back to a bare origin cell", self.uid);
            let origin = self.mint(CellKind::Origin, ValueBag::new());
            self.hash_sheet = vec![vec![origin]];
            self.position.mark_dirty();
            return self;
        }

        let mut layout = Vec::with_capacity(rows.len());
        for (r, values) in rows.iter().enumerate() {
            let mut uids = Vec::with_capacity(width);
            for c in 0..width {
                let mut data = ValueBag::new();
                data.insert(VALUE_KEY.to_string(), values.get(c).cloned().unwrap_or_default());
                uids.push(self.mint(CellKind::for_position(r, c), data));
            }
            layout.push(uids);
        }
        self.hash_sheet = layout;
        self.position.mark_dirty();
        self
    }

    /// Mint a brand-new cell (fresh uid and coord uid) and register it.
    pub(crate) fn mint(&mut self, kind: CellKind, data: ValueBag) -> CellUid {
        let uid = self.next_cell_uid();
        let mut cell = Cell::new(uid, format!("coord_{}", self.uids.next_uid()), kind);
        cell.data.extend(data);
        self.register(cell)
    }

    pub(crate) fn next_cell_uid(&mut self) -> CellUid {
        CellUid::new(format!("cell_{}", self.uids.next_uid()))
    }

    /// Append to history and index by uid. History is never rewritten.
    pub(crate) fn register(&mut self, cell: Cell) -> CellUid {
        let uid = cell.uid.clone();
        self.cells.insert(uid.clone(), self.cell_history.len());
        self.cell_history.push(cell);
        uid
    }

    // =========================================================================
    // Identity & shape
    // =========================================================================

    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Give the sheet a new identity, e.g. after importing a copy of a
    /// stored sheet. Cells keep their uids.
    pub fn reassign_uid(&mut self) -> &str {
        self.uid = format!("sheet_{}", self.uids.next_uid());
        log::debug!("sheet renamed to {}", self.uid);
        &self.uid
    }

    pub fn mode(&self) -> GridMode {
        self.mode
    }

    pub fn is_template(&self) -> bool {
        self.mode == GridMode::Template
    }

    pub fn row_count(&self) -> usize {
        self.hash_sheet.len()
    }

    pub fn col_count(&self) -> usize {
        self.hash_sheet.first().map(Vec::len).unwrap_or(0)
    }

    /// Rows below the header.
    pub fn data_row_count(&self) -> usize {
        self.row_count().saturating_sub(1)
    }

    /// Columns right of the row header.
    pub fn data_col_count(&self) -> usize {
        self.col_count().saturating_sub(1)
    }

    /// A grid with no data rows.
    pub fn is_empty(&self) -> bool {
        self.row_count() <= 1
    }

    pub fn hash_sheet(&self) -> &[Vec<CellUid>] {
        &self.hash_sheet
    }

    /// Every cell version, oldest first.
    pub fn history(&self) -> &[Cell] {
        &self.cell_history
    }

    pub fn position_index(&self) -> &PositionIndex {
        &self.position
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Any cell this sheet ever minted, current or historical.
    pub fn cell_by_uid(&self, uid: &CellUid) -> Option<&Cell> {
        self.cells.get(uid).map(|&slot| &self.cell_history[slot])
    }

    pub fn cell_at(&self, row: usize, col: usize) -> Option<&Cell> {
        let uid = self.hash_sheet.get(row)?.get(col)?;
        self.cell_by_uid(uid)
    }

    /// Current position of a uid; historical uids are not on the grid.
    pub fn position_of(&self, uid: &CellUid) -> Option<(usize, usize)> {
        self.position.lookup(uid, &self.hash_sheet)
    }

    pub fn position_or_sentinel(&self, uid: &CellUid) -> (i64, i64) {
        self.position.lookup_or_sentinel(uid, &self.hash_sheet)
    }

    /// Resolve an address like `B3` against the current grid.
    pub fn cell_from_address(&self, addr: &str) -> Option<&Cell> {
        let (row, col) = address::parse_address(addr)?;
        self.cell_at(row, col)
    }

    /// Read one attribute from a cell's value bag.
    pub fn get(&self, uid: &CellUid, key: &str) -> Option<&str> {
        self.cell_by_uid(uid)?.get(key)
    }

    /// Column header values, corner excluded.
    pub fn header(&self) -> Vec<&str> {
        self.row_values(0)
            .map(|values| values.into_iter().skip(1).collect())
            .unwrap_or_default()
    }

    /// Values of one grid row, row header included.
    pub fn row_values(&self, row: usize) -> Option<Vec<&str>> {
        let uids = self.hash_sheet.get(row)?;
        Some(
            uids.iter()
                .map(|uid| self.cell_by_uid(uid).map(Cell::value).unwrap_or(""))
                .collect(),
        )
    }

    /// Current cells whose value equals `value`, row-major.
    pub fn find_cells_by_value(&self, value: &str) -> Vec<&Cell> {
        self.hash_sheet
            .iter()
            .flatten()
            .filter_map(|uid| self.cell_by_uid(uid))
            .filter(|cell| cell.value() == value)
            .collect()
    }

    /// Every version of one logical cell, oldest first.
    pub fn history_of(&self, coord_uid: &str) -> Vec<&Cell> {
        self.cell_history
            .iter()
            .filter(|cell| cell.coord_uid == coord_uid)
            .collect()
    }

    /// Values as a matrix.
    ///
    /// With `include_header` the full grid is returned (header row and
    /// row-header column included), which is the form snapshots persist.
    /// Without it both headers are stripped, and a grid with no data rows
    /// yields an empty matrix.
    pub fn to_content_matrix(&self, include_header: bool) -> Vec<Vec<String>> {
        if include_header {
            return (0..self.row_count())
                .filter_map(|r| self.row_values(r))
                .map(|row| row.into_iter().map(str::to_string).collect())
                .collect();
        }
        if self.is_empty() {
            return Vec::new();
        }
        (1..self.row_count())
            .filter_map(|r| self.row_values(r))
            .map(|row| row.into_iter().skip(1).map(str::to_string).collect())
            .collect()
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    pub fn set_save_hook(&mut self, hook: SaveHook) {
        self.save_hook = Some(hook);
    }

    pub fn clear_save_hook(&mut self) {
        self.save_hook = None;
    }

    /// Form written by [`save`](Self::save).
    pub fn set_snapshot_form(&mut self, form: SnapshotForm) {
        self.snapshot_form = form;
    }

    pub fn snapshot_form(&self) -> SnapshotForm {
        self.snapshot_form
    }

    /// Persist the current state to `target`, or to the installed hook.
    ///
    /// Having neither is not an error.
    pub fn save(&mut self, target: Option<&mut dyn SheetStore>) -> Result<&mut Self, GridError> {
        let snapshot = self.to_snapshot(self.snapshot_form);
        if let Some(store) = target {
            store.put_sheet(&snapshot)?;
            return Ok(self);
        }
        match self.save_hook.as_mut() {
            Some(hook) => hook(&snapshot)?,
            None => log::debug!("sheet {}: no save target, skipping", self.uid),
        }
        Ok(self)
    }

    /// Save after a mutation. Failures are recorded, never rolled back.
    pub(crate) fn autosave(&mut self, persist: Persist) {
        if persist == Persist::Skip {
            return;
        }
        match self.save(None) {
            Ok(_) => self.last_save_error = None,
            Err(e) => {
                log::error!("sheet {}: save failed: {}", self.uid, e);
                self.last_save_error = Some(e.to_string());
            }
        }
    }

    /// The most recent autosave failure, cleared on read.
    pub fn take_save_error(&mut self) -> Option<String> {
        self.last_save_error.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell_id::SequentialUids;

    fn sheet(cols: usize, rows: usize) -> Sheet {
        Sheet::with_uids("Test", cols, rows, Box::new(SequentialUids::default()))
    }

    #[test]
    fn test_init_tags_headers() {
        let s = sheet(2, 2);
        assert_eq!(s.row_count(), 2);
        assert_eq!(s.col_count(), 2);
        assert_eq!(s.cell_at(0, 0).unwrap().kind, CellKind::Origin);
        assert_eq!(s.cell_at(0, 1).unwrap().kind, CellKind::ColumnHeader);
        assert_eq!(s.cell_at(1, 0).unwrap().kind, CellKind::RowHeader);
        assert_eq!(s.cell_at(1, 1).unwrap().kind, CellKind::Data);
        assert_eq!(s.history().len(), 4);
    }

    #[test]
    fn test_init_discards_history() {
        let mut s = sheet(3, 3);
        assert_eq!(s.history().len(), 9);
        s.init(2, 1);
        assert_eq!(s.history().len(), 2);
        assert_eq!(s.row_count(), 1);
    }

    #[test]
    fn test_reassign_uid_keeps_cells() {
        let mut s = sheet(2, 2);
        let before = s.uid().to_string();
        let origin = s.hash_sheet()[0][0].clone();
        let after = s.reassign_uid().to_string();
        assert_ne!(before, after);
        assert!(after.starts_with("sheet_"));
        assert_eq!(s.hash_sheet()[0][0], origin);
    }

    #[test]
    fn test_init_clamps_to_one_cell() {
        let s = sheet(0, 0);
        assert_eq!(s.row_count(), 1);
        assert_eq!(s.col_count(), 1);
    }

    #[test]
    fn test_rebuild_from_value_matrix_pads_ragged_rows() {
        let mut s = sheet(1, 1);
        s.rebuild_from_value_matrix(&[
            vec!["".into(), "Name".into(), "City".into()],
            vec!["".into(), "Ann".into()],
        ]);
        assert_eq!(s.col_count(), 3);
        assert_eq!(s.row_values(1).unwrap(), vec!["", "Ann", ""]);
        assert_eq!(s.cell_at(0, 2).unwrap().kind, CellKind::ColumnHeader);
        assert_eq!(s.header(), vec!["Name", "City"]);
    }

    #[test]
    fn test_rebuild_from_empty_matrix_keeps_origin() {
        let mut s = sheet(2, 2);
        s.rebuild_from_value_matrix(&[]);
        assert_eq!(s.row_count(), 1);
        assert_eq!(s.col_count(), 1);
        assert_eq!(s.cell_at(0, 0).unwrap().kind, CellKind::Origin);
    }

    #[test]
    fn test_content_matrix_forms() {
        let mut s = sheet(1, 1);
        let full = vec![
            vec!["".to_string(), "A".to_string(), "B".to_string()],
            vec!["".to_string(), "1".to_string(), "2".to_string()],
        ];
        s.rebuild_from_value_matrix(&full);
        assert_eq!(s.to_content_matrix(true), full);
        assert_eq!(s.to_content_matrix(false), vec![vec!["1".to_string(), "2".to_string()]]);
    }

    #[test]
    fn test_content_matrix_of_header_only_grid() {
        let s = sheet(3, 1);
        assert!(s.to_content_matrix(false).is_empty());
        assert_eq!(s.to_content_matrix(true).len(), 1);
    }

    #[test]
    fn test_content_matrix_round_trip() {
        let mut a = sheet(1, 1);
        a.rebuild_from_value_matrix(&[
            vec!["".into(), "Who".into(), "Where".into()],
            vec!["".into(), "Ann".into(), "Oslo".into()],
            vec!["".into(), "Bo".into(), "Rome".into()],
        ]);
        let mut b = sheet(1, 1);
        b.rebuild_from_value_matrix(&a.to_content_matrix(true));
        assert_eq!(b.to_content_matrix(true), a.to_content_matrix(true));
    }

    #[test]
    fn test_cell_from_address() {
        let mut s = sheet(1, 1);
        s.rebuild_from_value_matrix(&[
            vec!["".into(), "Name".into()],
            vec!["".into(), "Ann".into()],
        ]);
        assert_eq!(s.cell_from_address("A1").unwrap().kind, CellKind::Origin);
        assert_eq!(s.cell_from_address("B2").unwrap().value(), "Ann");
        assert!(s.cell_from_address("ZZ99").is_none());
        assert!(s.cell_from_address("1A").is_none());
    }

    #[test]
    fn test_find_cells_by_value() {
        let mut s = sheet(1, 1);
        s.rebuild_from_value_matrix(&[
            vec!["".into(), "x".into()],
            vec!["".into(), "x".into()],
            vec!["".into(), "y".into()],
        ]);
        assert_eq!(s.find_cells_by_value("x").len(), 2);
        assert!(s.find_cells_by_value("nope").is_empty());
    }

    #[test]
    fn test_save_without_target_is_noop() {
        let mut s = sheet(2, 2);
        assert!(s.save(None).is_ok());
        assert!(s.take_save_error().is_none());
    }

    #[test]
    fn test_save_hook_receives_snapshot() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut s = sheet(2, 2);
        s.set_save_hook(Box::new(move |snap| {
            sink.borrow_mut().push(snap.uid.clone());
            Ok(())
        }));

        s.save(None).unwrap();
        assert_eq!(seen.borrow().as_slice(), &[s.uid().to_string()]);
    }

    #[test]
    fn test_kind_policy() {
        assert!(SheetKind::Free.allows(EditClass::Column));
        assert!(SheetKind::Dynamic.allows(EditClass::Row));
        assert!(!SheetKind::Dynamic.allows(EditClass::Column));
        assert!(SheetKind::Fixed.allows(EditClass::Value));
        assert!(!SheetKind::Fixed.allows(EditClass::Row));
        assert!(!SheetKind::Static.allows(EditClass::Value));
    }
}
