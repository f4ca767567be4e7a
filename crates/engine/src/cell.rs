use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cell_id::CellUid;

/// Key under which a cell's display value lives in its value bag.
pub const VALUE_KEY: &str = "value";

/// Open mapping of named attributes carried by a cell.
pub type ValueBag = BTreeMap<String, String>;

/// Role of a cell, derived from where it sat when it was created or loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellKind {
    /// (0, 0)
    #[serde(rename = "sheet_origin")]
    Origin,
    /// Row 0, col > 0
    #[serde(rename = "column_header")]
    ColumnHeader,
    /// Col 0, row > 0
    #[serde(rename = "row_header")]
    RowHeader,
    #[default]
    #[serde(rename = "cell")]
    Data,
}

impl CellKind {
    pub fn for_position(row: usize, col: usize) -> Self {
        match (row, col) {
            (0, 0) => CellKind::Origin,
            (0, _) => CellKind::ColumnHeader,
            (_, 0) => CellKind::RowHeader,
            _ => CellKind::Data,
        }
    }

    pub fn is_header(self) -> bool {
        !matches!(self, CellKind::Data)
    }
}

/// One immutable cell version.
///
/// Cells are only ever appended to a sheet's history. An edit produces a
/// successor (see [`Cell::successor`]) that keeps the `coord_uid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub uid: CellUid,
    #[serde(rename = "coordUid", default)]
    pub coord_uid: String,
    #[serde(rename = "type", default)]
    pub kind: CellKind,
    #[serde(default)]
    pub data: ValueBag,
}

impl Cell {
    pub fn new(uid: CellUid, coord_uid: impl Into<String>, kind: CellKind) -> Self {
        let mut data = ValueBag::new();
        data.insert(VALUE_KEY.to_string(), String::new());
        Self {
            uid,
            coord_uid: coord_uid.into(),
            kind,
            data,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.data.insert(VALUE_KEY.to_string(), value.into());
        self
    }

    /// Stand-in for a uid the grid references but history lost.
    pub(crate) fn placeholder(uid: CellUid, kind: CellKind) -> Self {
        let coord_uid = uid.as_str().to_string();
        Self::new(uid, coord_uid, kind)
    }

    /// The next version of this cell: same coordinate identity and kind,
    /// value bag merged with `patch` (patch wins).
    pub fn successor(&self, uid: CellUid, patch: &ValueBag) -> Self {
        let mut data = self.data.clone();
        data.extend(patch.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self {
            uid,
            coord_uid: self.coord_uid.clone(),
            kind: self.kind,
            data,
        }
    }

    pub fn value(&self) -> &str {
        self.get(VALUE_KEY).unwrap_or("")
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn is_header(&self) -> bool {
        self.kind.is_header()
    }
}

/// Menu-level actions a user can trigger from a cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellAction {
    EditCell(ValueBag),
    InsertLeftColumn,
    InsertRightColumn,
    InsertUpRow,
    InsertDownRow,
    DeleteSelfColumn,
    DeleteSelfRow,
    ClearSheet,
}

/// Build a single-key patch.
pub fn patch(key: &str, value: impl Into<String>) -> ValueBag {
    let mut bag = ValueBag::new();
    bag.insert(key.to_string(), value.into());
    bag
}
