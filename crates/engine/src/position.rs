//! Lazily rebuilt uid -> (row, col) cache.
//!
//! Invalidation is batched: structural edits only flip a dirty flag, and the
//! next lookup rebuilds the whole map in a single pass over the coordinate
//! array. Lookups go through `&self`, so the map sits in a `RefCell`.

use std::cell::RefCell;

use rustc_hash::FxHashMap;

use crate::cell_id::CellUid;

/// Sentinel callers use for "not on the grid".
pub const NOT_FOUND: (i64, i64) = (-1, -1);

#[derive(Debug)]
pub struct PositionIndex {
    state: RefCell<IndexState>,
}

#[derive(Debug)]
struct IndexState {
    positions: FxHashMap<CellUid, (usize, usize)>,
    dirty: bool,
    rebuilds: u64,
}

impl Default for PositionIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionIndex {
    /// A new index starts dirty; the first lookup builds it.
    pub fn new() -> Self {
        Self {
            state: RefCell::new(IndexState {
                positions: FxHashMap::default(),
                dirty: true,
                rebuilds: 0,
            }),
        }
    }

    pub fn mark_dirty(&mut self) {
        self.state.get_mut().dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.state.borrow().dirty
    }

    /// Number of full rebuilds performed so far.
    pub fn rebuild_count(&self) -> u64 {
        self.state.borrow().rebuilds
    }

    pub fn lookup(&self, uid: &CellUid, grid: &[Vec<CellUid>]) -> Option<(usize, usize)> {
        let mut state = self.state.borrow_mut();
        if state.dirty {
            state.rebuild(grid);
        }
        state.positions.get(uid).copied()
    }

    /// Same as [`lookup`](Self::lookup) but with the `(-1, -1)` sentinel.
    pub fn lookup_or_sentinel(&self, uid: &CellUid, grid: &[Vec<CellUid>]) -> (i64, i64) {
        self.lookup(uid, grid)
            .map(|(r, c)| (r as i64, c as i64))
            .unwrap_or(NOT_FOUND)
    }
}

impl IndexState {
    fn rebuild(&mut self, grid: &[Vec<CellUid>]) {
        self.positions.clear();
        for (row, uids) in grid.iter().enumerate() {
            for (col, uid) in uids.iter().enumerate() {
                // First occurrence wins; a uid should only ever sit in one slot.
                self.positions.entry(uid.clone()).or_insert((row, col));
            }
        }
        self.dirty = false;
        self.rebuilds += 1;
        log::trace!("position index rebuilt ({} cells)", self.positions.len());
    }
}
