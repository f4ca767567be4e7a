//! Template sheets: a header row used as the schema for new chat sheets.

use crate::cell::{CellKind, ValueBag};
use crate::cell_id::{RandomUids, UidSource};
use crate::sheet::{GridMode, Sheet, SheetDomain};

impl Sheet {
    /// A template with `cols` header columns (corner included).
    pub fn new_template(name: &str, cols: usize) -> Self {
        Self::new_template_with(name, cols, Box::new(RandomUids))
    }

    pub fn new_template_with(name: &str, cols: usize, uids: Box<dyn UidSource>) -> Self {
        let mut sheet = Sheet::blank(name, GridMode::Template, uids);
        sheet.domain = SheetDomain::Global;
        sheet.init(cols, 1);
        sheet
    }

    /// Instantiate a chat-scoped sheet from a template's header row.
    pub fn from_template(template: &Sheet) -> Self {
        Self::from_template_with(template, Box::new(RandomUids))
    }

    /// Header cells are copied by value; the new sheet gets its own identity,
    /// uids and history.
    pub fn from_template_with(template: &Sheet, uids: Box<dyn UidSource>) -> Self {
        let mut sheet = Sheet::blank(&template.name, GridMode::Full, uids);
        sheet.domain = SheetDomain::Chat;
        sheet.kind = template.kind;
        sheet.enable = template.enable;
        sheet.required = template.required;
        sheet.tochat = template.tochat;
        sheet.trigger_send = template.trigger_send;
        sheet.trigger_send_deep = template.trigger_send_deep;
        sheet.config = template.config.clone();
        sheet.source_data = template.source_data.clone();

        let header_bags: Vec<(CellKind, ValueBag)> = template
            .hash_sheet
            .first()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(c, uid)| {
                        let data = template.cell_by_uid(uid).map(|cell| cell.data.clone()).unwrap_or_default();
                        (CellKind::for_position(0, c), data)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut header = Vec::with_capacity(header_bags.len().max(1));
        for (kind, data) in header_bags {
            header.push(sheet.mint(kind, data));
        }
        if header.is_empty() {
            header.push(sheet.mint(CellKind::Origin, ValueBag::new()));
        }
        sheet.hash_sheet = vec![header];
        sheet.position.mark_dirty();
        log::debug!("sheet {}: instantiated from template {}", sheet.uid, template.uid);
        sheet
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell_id::SequentialUids;
    use crate::edit::Side;
    use crate::error::Rejection;
    use crate::sheet::SheetKind;

    fn template() -> Sheet {
        let mut t = Sheet::new_template_with("People", 3, Box::new(SequentialUids::new("t")));
        let a = t.hash_sheet()[0][1].clone();
        let b = t.hash_sheet()[0][2].clone();
        assert!(t.set_value(&a, "Name").unwrap().is_applied());
        assert!(t.set(&b, "note", "home town").unwrap().is_applied());
        let b = t.hash_sheet()[0][2].clone();
        assert!(t.set_value(&b, "City").unwrap().is_applied());
        t.kind = SheetKind::Dynamic;
        t
    }

    #[test]
    fn test_template_has_single_row() {
        let t = template();
        assert!(t.is_template());
        assert_eq!(t.row_count(), 1);
        assert_eq!(t.header(), vec!["Name", "City"]);
        assert_eq!(t.domain, SheetDomain::Global);
    }

    #[test]
    fn test_template_rejects_row_edits() {
        let mut t = template();
        let header = t.hash_sheet()[0][1].clone();
        let outcome = t.insert_row(&header, Side::After).unwrap();
        assert_eq!(outcome.rejection(), Some(&Rejection::TemplateHeaderOnly));
        let outcome = t.delete_row(&header).unwrap();
        assert_eq!(outcome.rejection(), Some(&Rejection::TemplateHeaderOnly));
    }

    #[test]
    fn test_template_column_edits_allowed() {
        let mut t = Sheet::new_template_with("Cols", 3, Box::new(SequentialUids::default()));
        let header = t.hash_sheet()[0][1].clone();
        assert!(t.insert_column(&header, Side::After).unwrap().is_applied());
        assert_eq!(t.col_count(), 4);
        assert!(t.delete_column(&header).unwrap().is_applied());
        assert_eq!(t.col_count(), 3);
    }

    #[test]
    fn test_instantiate_copies_header_by_value() {
        let t = template();
        let s = Sheet::from_template_with(&t, Box::new(SequentialUids::new("s")));

        assert!(!s.is_template());
        assert_eq!(s.domain, SheetDomain::Chat);
        assert_eq!(s.kind, SheetKind::Dynamic);
        assert_ne!(s.uid(), t.uid());
        assert_eq!(s.header(), vec!["Name", "City"]);
        assert_eq!(s.cell_at(0, 2).unwrap().get("note"), Some("home town"));
        assert_eq!(s.cell_at(0, 0).unwrap().kind, CellKind::Origin);
        // Fresh identity and history
        assert_eq!(s.history().len(), 3);
        for (a, b) in s.hash_sheet()[0].iter().zip(t.hash_sheet()[0].iter()) {
            assert_ne!(a, b);
        }
    }

    #[test]
    fn test_template_rebuild_keeps_header_only() {
        let mut t = Sheet::new_template_with("T", 2, Box::new(SequentialUids::default()));
        t.rebuild_from_value_matrix(&[
            vec!["".into(), "H".into()],
            vec!["".into(), "v".into()],
        ]);
        assert_eq!(t.row_count(), 1);
        assert_eq!(t.header(), vec!["H"]);
    }
}
