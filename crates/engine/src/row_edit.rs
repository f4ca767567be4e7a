//! Row-addressed edits, as issued by the chat model.
//!
//! Rows and columns here are data indices: row 0 is the first row below the
//! header, column 0 the first column right of the row header.

use std::collections::BTreeMap;

use crate::cell::{patch, VALUE_KEY};
use crate::edit::EditOutcome;
use crate::error::{GridError, Rejection};
use crate::sheet::{EditClass, GridMode, Persist, Sheet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowEdit {
    /// Append a row with the given column values.
    Insert { values: BTreeMap<usize, String> },
    /// Overwrite the given columns of an existing row.
    Update { row: usize, values: BTreeMap<usize, String> },
    Delete { row: usize },
}

impl Sheet {
    pub fn apply_row_edit(&mut self, edit: &RowEdit) -> Result<EditOutcome, GridError> {
        match edit {
            RowEdit::Insert { values } => {
                let values = self.in_range_columns(values);
                Ok(self.insert_row_at(self.row_count(), &values))
            }
            RowEdit::Update { row, values } => self.update_row(*row, values),
            RowEdit::Delete { row } => {
                if *row >= self.data_row_count() {
                    return Ok(self.reject(Rejection::RowOutOfRange {
                        row: *row,
                        rows: self.data_row_count(),
                    }));
                }
                Ok(self.delete_row_at(row + 1))
            }
        }
    }

    /// Edit each changed column through the value-edit path and save once.
    fn update_row(&mut self, row: usize, values: &BTreeMap<usize, String>) -> Result<EditOutcome, GridError> {
        if self.mode == GridMode::Template {
            return Ok(self.reject(Rejection::TemplateHeaderOnly));
        }
        if let Some(rejection) = self.check_kind(EditClass::Value, "value edits") {
            return Ok(self.reject(rejection));
        }
        if row >= self.data_row_count() {
            return Ok(self.reject(Rejection::RowOutOfRange {
                row,
                rows: self.data_row_count(),
            }));
        }

        let mut changed = 0;
        for (col, value) in self.in_range_columns(values) {
            let uid = self.hash_sheet[row + 1][col + 1].clone();
            if self.get(&uid, VALUE_KEY) == Some(value.as_str()) {
                continue;
            }
            let outcome = self.edit_cell_with(&uid, patch(VALUE_KEY, value), Persist::Skip)?;
            if outcome.is_applied() {
                changed += 1;
            }
        }
        if changed > 0 {
            self.autosave(Persist::Save);
        }
        log::debug!("sheet {}: updated {} cells in data row {}", self.uid, changed, row);
        Ok(EditOutcome::Applied)
    }

    fn in_range_columns(&self, values: &BTreeMap<usize, String>) -> BTreeMap<usize, String> {
        let cols = self.data_col_count();
        values
            .iter()
            .filter(|&(&col, _)| {
                if col >= cols {
                    log::warn!("sheet {}: column {} is out of range ({} columns), ignored", self.uid, col, cols);
                }
                col < cols
            })
            .map(|(&col, value)| (col, value.clone()))
            .collect()
    }
}
