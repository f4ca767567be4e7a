//! Persistence seam for sheets and per-turn piece snapshots.

use std::collections::BTreeMap;

use crate::error::StoreError;
use crate::snapshot::{PieceSnapshot, SheetSnapshot};

/// Durable home for sheet snapshots.
///
/// Sheets are keyed by uid. Pieces are keyed by `(piece_id, sheet_uid)`,
/// where a piece id names one chat turn.
pub trait SheetStore {
    fn put_sheet(&mut self, snapshot: &SheetSnapshot) -> Result<(), StoreError>;

    fn get_sheet(&self, uid: &str) -> Result<Option<SheetSnapshot>, StoreError>;

    /// Uids of every stored sheet, sorted.
    fn list_sheets(&self) -> Result<Vec<String>, StoreError>;

    fn delete_sheet(&mut self, uid: &str) -> Result<bool, StoreError>;

    fn put_piece(&mut self, piece_id: &str, piece: &PieceSnapshot) -> Result<(), StoreError>;

    fn get_piece(&self, piece_id: &str, sheet_uid: &str) -> Result<Option<PieceSnapshot>, StoreError>;

    /// Every piece recorded for one sheet, ordered by piece id.
    fn pieces_for(&self, sheet_uid: &str) -> Result<Vec<(String, PieceSnapshot)>, StoreError>;
}

/// In-process store, for tests and throwaway sessions.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    sheets: BTreeMap<String, SheetSnapshot>,
    pieces: BTreeMap<(String, String), PieceSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

impl SheetStore for MemoryStore {
    fn put_sheet(&mut self, snapshot: &SheetSnapshot) -> Result<(), StoreError> {
        if snapshot.uid.is_empty() {
            return Err(StoreError::MissingKey);
        }
        self.sheets.insert(snapshot.uid.clone(), snapshot.clone());
        Ok(())
    }

    fn get_sheet(&self, uid: &str) -> Result<Option<SheetSnapshot>, StoreError> {
        Ok(self.sheets.get(uid).cloned())
    }

    fn list_sheets(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.sheets.keys().cloned().collect())
    }

    fn delete_sheet(&mut self, uid: &str) -> Result<bool, StoreError> {
        let existed = self.sheets.remove(uid).is_some();
        self.pieces.retain(|(_, sheet_uid), _| sheet_uid != uid);
        Ok(existed)
    }

    fn put_piece(&mut self, piece_id: &str, piece: &PieceSnapshot) -> Result<(), StoreError> {
        if piece_id.is_empty() || piece.sheet_uid.is_empty() {
            return Err(StoreError::MissingKey);
        }
        self.pieces
            .insert((piece_id.to_string(), piece.sheet_uid.clone()), piece.clone());
        Ok(())
    }

    fn get_piece(&self, piece_id: &str, sheet_uid: &str) -> Result<Option<PieceSnapshot>, StoreError> {
        Ok(self
            .pieces
            .get(&(piece_id.to_string(), sheet_uid.to_string()))
            .cloned())
    }

    fn pieces_for(&self, sheet_uid: &str) -> Result<Vec<(String, PieceSnapshot)>, StoreError> {
        Ok(self
            .pieces
            .iter()
            .filter(|((_, uid), _)| uid == sheet_uid)
            .map(|((piece_id, _), piece)| (piece_id.clone(), piece.clone()))
            .collect())
    }
}
