//! Value and structural edits.
//!
//! Every edit follows the same shape: resolve the acting cell through the
//! position index, check policy, append new cells to history, rewrite the
//! affected slice of the coordinate array, mark the index dirty, save.
//! Nothing already in history is touched.

use std::collections::BTreeMap;

use crate::cell::{patch, Cell, CellAction, CellKind, ValueBag, VALUE_KEY};
use crate::cell_id::CellUid;
use crate::error::{GridError, Rejection};
use crate::sheet::{EditClass, GridMode, Persist, Sheet};

/// Result of an edit request that did not hard-fail.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum EditOutcome {
    /// A value edit; carries the uid of the new cell version.
    Edited(CellUid),
    /// A structural edit or batch was applied.
    Applied,
    /// Refused by policy. Already logged.
    Rejected(Rejection),
}

impl EditOutcome {
    pub fn is_applied(&self) -> bool {
        !matches!(self, EditOutcome::Rejected(_))
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            EditOutcome::Rejected(r) => Some(r),
            _ => None,
        }
    }
}

/// Which side of the acting cell an insert goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Before,
    After,
}

impl Sheet {
    // =========================================================================
    // Value edits
    // =========================================================================

    /// Replace a cell with a successor whose bag is `old ∪ patch`.
    pub fn edit_cell(&mut self, uid: &CellUid, patch: ValueBag) -> Result<EditOutcome, GridError> {
        self.edit_cell_with(uid, patch, Persist::Save)
    }

    pub fn edit_cell_with(
        &mut self,
        uid: &CellUid,
        patch: ValueBag,
        persist: Persist,
    ) -> Result<EditOutcome, GridError> {
        if patch.is_empty() {
            return Ok(self.reject(Rejection::EmptyPatch));
        }
        if let Some(rejection) = self.check_kind(EditClass::Value, "value edits") {
            return Ok(self.reject(rejection));
        }
        let Some((row, col)) = self.resolve(uid)? else {
            return Ok(self.reject(Rejection::StaleCell(uid.clone())));
        };

        let new_uid = self.replace_at(row, col, &patch);
        self.autosave(persist);
        Ok(EditOutcome::Edited(new_uid))
    }

    /// Write one attribute. Routes through [`edit_cell`](Self::edit_cell).
    pub fn set(&mut self, uid: &CellUid, key: &str, value: impl Into<String>) -> Result<EditOutcome, GridError> {
        self.edit_cell(uid, patch(key, value))
    }

    /// Shorthand for setting the display value.
    pub fn set_value(&mut self, uid: &CellUid, value: impl Into<String>) -> Result<EditOutcome, GridError> {
        self.set(uid, VALUE_KEY, value)
    }

    /// Mint the successor of the cell at (row, col) and point the slot at it.
    pub(crate) fn replace_at(&mut self, row: usize, col: usize, patch: &ValueBag) -> CellUid {
        let old_uid = self.hash_sheet[row][col].clone();
        let new_uid = self.next_cell_uid();
        let successor = match self.cell_by_uid(&old_uid) {
            Some(old) => old.successor(new_uid, patch),
            None => Cell::placeholder(old_uid, CellKind::for_position(row, col)).successor(new_uid, patch),
        };
        let new_uid = self.register(successor);
        self.hash_sheet[row][col] = new_uid.clone();
        self.position.mark_dirty();
        new_uid
    }

    // =========================================================================
    // Structural edits
    // =========================================================================

    pub fn insert_column(&mut self, acting: &CellUid, side: Side) -> Result<EditOutcome, GridError> {
        let Some((_, col)) = self.resolve(acting)? else {
            return Ok(self.reject(Rejection::StaleCell(acting.clone())));
        };
        let at = match side {
            Side::Before => col,
            Side::After => col + 1,
        };
        Ok(self.insert_column_at(at))
    }

    pub fn insert_row(&mut self, acting: &CellUid, side: Side) -> Result<EditOutcome, GridError> {
        let Some((row, _)) = self.resolve(acting)? else {
            return Ok(self.reject(Rejection::StaleCell(acting.clone())));
        };
        let at = match side {
            Side::Before => row,
            Side::After => row + 1,
        };
        Ok(self.insert_row_at(at, &BTreeMap::new()))
    }

    pub fn delete_column(&mut self, acting: &CellUid) -> Result<EditOutcome, GridError> {
        let Some((_, col)) = self.resolve(acting)? else {
            return Ok(self.reject(Rejection::StaleCell(acting.clone())));
        };
        Ok(self.delete_column_at(col))
    }

    pub fn delete_row(&mut self, acting: &CellUid) -> Result<EditOutcome, GridError> {
        let Some((row, _)) = self.resolve(acting)? else {
            return Ok(self.reject(Rejection::StaleCell(acting.clone())));
        };
        Ok(self.delete_row_at(row))
    }

    /// Splice a fresh column in at grid index `at` (1..=cols).
    pub(crate) fn insert_column_at(&mut self, at: usize) -> EditOutcome {
        if let Some(rejection) = self.check_kind(EditClass::Column, "column changes") {
            return self.reject(rejection);
        }
        if at == 0 {
            return self.reject(Rejection::HeaderProtected);
        }
        let at = at.min(self.col_count());

        for row in 0..self.row_count() {
            let uid = self.mint(CellKind::for_position(row, at), ValueBag::new());
            self.hash_sheet[row].insert(at, uid);
        }
        self.position.mark_dirty();
        log::debug!("sheet {}: inserted column at {}", self.uid, at);
        self.autosave(Persist::Save);
        EditOutcome::Applied
    }

    /// Splice a fresh row in at grid index `at` (1..=rows), pre-filling data
    /// columns from `values` (keyed by data-column index).
    pub(crate) fn insert_row_at(&mut self, at: usize, values: &BTreeMap<usize, String>) -> EditOutcome {
        if self.mode == GridMode::Template {
            return self.reject(Rejection::TemplateHeaderOnly);
        }
        if let Some(rejection) = self.check_kind(EditClass::Row, "row changes") {
            return self.reject(rejection);
        }
        if at == 0 {
            return self.reject(Rejection::HeaderProtected);
        }
        let at = at.min(self.row_count());

        let mut row = Vec::with_capacity(self.col_count());
        for col in 0..self.col_count() {
            let mut data = ValueBag::new();
            if col > 0 {
                if let Some(value) = values.get(&(col - 1)) {
                    data.insert(VALUE_KEY.to_string(), value.clone());
                }
            }
            row.push(self.mint(CellKind::for_position(at, col), data));
        }
        self.hash_sheet.insert(at, row);
        self.position.mark_dirty();
        log::debug!("sheet {}: inserted row at {}", self.uid, at);
        self.autosave(Persist::Save);
        EditOutcome::Applied
    }

    pub(crate) fn delete_column_at(&mut self, col: usize) -> EditOutcome {
        if let Some(rejection) = self.check_kind(EditClass::Column, "column changes") {
            return self.reject(rejection);
        }
        if col == 0 {
            return self.reject(Rejection::HeaderProtected);
        }
        if self.col_count() < 3 {
            return self.reject(Rejection::MinimumSize);
        }

        for row in &mut self.hash_sheet {
            row.remove(col);
        }
        self.position.mark_dirty();
        log::debug!("sheet {}: deleted column {}", self.uid, col);
        self.autosave(Persist::Save);
        EditOutcome::Applied
    }

    pub(crate) fn delete_row_at(&mut self, row: usize) -> EditOutcome {
        if self.mode == GridMode::Template {
            return self.reject(Rejection::TemplateHeaderOnly);
        }
        if let Some(rejection) = self.check_kind(EditClass::Row, "row changes") {
            return self.reject(rejection);
        }
        if row == 0 {
            return self.reject(Rejection::HeaderProtected);
        }
        if row >= self.row_count() {
            return self.reject(Rejection::RowOutOfRange {
                row: row - 1,
                rows: self.data_row_count(),
            });
        }
        if self.row_count() < 3 {
            return self.reject(Rejection::MinimumSize);
        }

        self.hash_sheet.remove(row);
        self.position.mark_dirty();
        log::debug!("sheet {}: deleted row {}", self.uid, row);
        self.autosave(Persist::Save);
        EditOutcome::Applied
    }

    /// Reset the sheet's content.
    ///
    /// The intended semantics are undecided, so this always fails.
    pub fn clear_sheet(&mut self) -> Result<EditOutcome, GridError> {
        log::error!("sheet {}: clear_sheet requested but not implemented", self.uid);
        Err(GridError::NotImplemented("clear_sheet"))
    }

    /// Dispatch a menu action triggered from `uid`.
    pub fn apply_action(&mut self, uid: &CellUid, action: CellAction) -> Result<EditOutcome, GridError> {
        match action {
            CellAction::EditCell(patch) => self.edit_cell(uid, patch),
            CellAction::InsertLeftColumn => self.insert_column(uid, Side::Before),
            CellAction::InsertRightColumn => self.insert_column(uid, Side::After),
            CellAction::InsertUpRow => self.insert_row(uid, Side::Before),
            CellAction::InsertDownRow => self.insert_row(uid, Side::After),
            CellAction::DeleteSelfColumn => self.delete_column(uid),
            CellAction::DeleteSelfRow => self.delete_row(uid),
            CellAction::ClearSheet => self.clear_sheet(),
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Current position of `uid`.
    ///
    /// `Ok(None)` means the uid is historical (a stale reference from the UI);
    /// a uid this sheet never minted is a consistency error.
    pub(crate) fn resolve(&self, uid: &CellUid) -> Result<Option<(usize, usize)>, GridError> {
        if let Some(pos) = self.position_of(uid) {
            return Ok(Some(pos));
        }
        if self.cells.contains_key(uid) {
            return Ok(None);
        }
        Err(GridError::UnknownCell(uid.clone()))
    }

    pub(crate) fn check_kind(&self, class: EditClass, what: &'static str) -> Option<Rejection> {
        if self.kind.allows(class) {
            None
        } else {
            Some(Rejection::KindForbids { kind: self.kind, what })
        }
    }

    pub(crate) fn reject(&self, rejection: Rejection) -> EditOutcome {
        log::warn!("sheet {} ({}): edit rejected: {}", self.name, self.uid, rejection);
        EditOutcome::Rejected(rejection)
    }
}
