//! Display tree for hosts that draw the grid.
//!
//! The engine does not know about widgets. It produces plain nodes in
//! row-major order and lets the host decorate them, either inline through a
//! visitor or afterwards through bindings collected during the build.

use crate::address;
use crate::cell::{Cell, CellKind};
use crate::cell_id::CellUid;
use crate::sheet::{GridMode, Sheet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayNode {
    pub cell: CellUid,
    pub row: usize,
    pub col: usize,
    pub kind: CellKind,
    /// What the host should show: the value for headers and data cells,
    /// the data-row number for row headers, nothing for the origin.
    pub text: String,
}

impl DisplayNode {
    /// `B3`-style address of this node.
    pub fn address(&self) -> String {
        address::to_address(self.row, self.col)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayTree {
    pub sheet_uid: String,
    pub title: String,
    pub rows: Vec<Vec<DisplayNode>>,
}

impl DisplayTree {
    pub fn node_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DisplayNode> {
        self.rows.iter().flatten()
    }
}

/// A handler the host attaches to the node at `(row, col)` once mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding<H> {
    pub row: usize,
    pub col: usize,
    pub cell: CellUid,
    pub handler: H,
}

impl Sheet {
    /// Build the display tree, calling `visitor` after each node is made.
    ///
    /// Templates render their header row only.
    pub fn render_grid(&self, mut visitor: Option<&mut dyn FnMut(&Cell, &DisplayNode)>) -> DisplayTree {
        self.walk(|cell, node| {
            if let Some(visit) = visitor.as_mut() {
                visit(cell, node);
            }
        })
    }

    /// Two-phase render: the tree, plus one binding per cell for which
    /// `binder` returned a handler.
    pub fn build_display_tree<H>(&self, mut binder: impl FnMut(&Cell) -> Option<H>) -> (DisplayTree, Vec<Binding<H>>) {
        let mut bindings = Vec::new();
        let tree = self.walk(|cell, node| {
            if let Some(handler) = binder(cell) {
                bindings.push(Binding {
                    row: node.row,
                    col: node.col,
                    cell: node.cell.clone(),
                    handler,
                });
            }
        });
        (tree, bindings)
    }

    fn walk(&self, mut on_node: impl FnMut(&Cell, &DisplayNode)) -> DisplayTree {
        let visible = match self.mode {
            GridMode::Template => self.row_count().min(1),
            GridMode::Full => self.row_count(),
        };

        let mut rows = Vec::with_capacity(visible);
        for (r, uids) in self.hash_sheet.iter().take(visible).enumerate() {
            let mut nodes = Vec::with_capacity(uids.len());
            for (c, uid) in uids.iter().enumerate() {
                let Some(cell) = self.cell_by_uid(uid) else {
                    log::warn!("sheet {}: no cell for {} at {}, not rendered", self.uid, uid, address::to_address(r, c));
                    continue;
                };
                let kind = CellKind::for_position(r, c);
                let text = match kind {
                    CellKind::Origin => String::new(),
                    CellKind::RowHeader => r.to_string(),
                    CellKind::ColumnHeader | CellKind::Data => cell.value().to_string(),
                };
                let node = DisplayNode {
                    cell: uid.clone(),
                    row: r,
                    col: c,
                    kind,
                    text,
                };
                on_node(cell, &node);
                nodes.push(node);
            }
            rows.push(nodes);
        }

        DisplayTree {
            sheet_uid: self.uid.clone(),
            title: self.name.clone(),
            rows,
        }
    }
}
