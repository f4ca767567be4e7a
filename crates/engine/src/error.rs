use thiserror::Error;

use crate::cell_id::CellUid;
use crate::sheet::SheetKind;

/// Hard failures. Policy rejections are not errors; see [`Rejection`].
#[derive(Debug, Error)]
pub enum GridError {
    /// The operation exists but has no behavior yet.
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    /// The uid was never minted by this sheet.
    #[error("cell {0} does not belong to this sheet")]
    UnknownCell(CellUid),

    /// A piece snapshot recorded for a different sheet.
    #[error("piece belongs to sheet {found}, not {expected}")]
    ForeignPiece { expected: String, found: String },

    #[error("save failed: {0}")]
    Store(#[from] StoreError),
}

/// Why a well-formed edit request was refused.
///
/// Rejections are logged and returned as values: stale menus and repeated
/// clicks trigger them routinely.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("empty patch")]
    EmptyPatch,

    #[error("cell {0} is no longer on the grid")]
    StaleCell(CellUid),

    #[error("header row and column cannot be removed or displaced")]
    HeaderProtected,

    #[error("a sheet keeps at least one data row and one data column")]
    MinimumSize,

    #[error("{kind:?} sheets do not allow {what}")]
    KindForbids { kind: SheetKind, what: &'static str },

    #[error("templates hold only a header row")]
    TemplateHeaderOnly,

    #[error("data row {row} is out of range (sheet has {rows})")]
    RowOutOfRange { row: usize, rows: usize },

    #[error("piece snapshot is empty or not rectangular")]
    MalformedPiece,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("store backend failed: {0}")]
    Backend(String),

    #[error("snapshot has no uid to key it by")]
    MissingKey,
}
