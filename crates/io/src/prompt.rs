// Descriptive text export for prompt injection

use memgrid_engine::sheet::Sheet;

/// Prior chat turns, most recent last.
pub trait ChatHistory {
    fn turn_count(&self) -> usize;

    fn turn(&self, index: usize) -> Option<&str>;

    /// The last `depth` turns, oldest first.
    fn recent(&self, depth: usize) -> Vec<&str> {
        let count = self.turn_count();
        (count.saturating_sub(depth)..count)
            .filter_map(|i| self.turn(i))
            .collect()
    }
}

impl ChatHistory for [String] {
    fn turn_count(&self) -> usize {
        self.len()
    }

    fn turn(&self, index: usize) -> Option<&str> {
        self.get(index).map(String::as_str)
    }
}

impl ChatHistory for Vec<String> {
    fn turn_count(&self) -> usize {
        self.len()
    }

    fn turn(&self, index: usize) -> Option<&str> {
        self.get(index).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextOptions {
    /// Position of the table among those sent to the model, shown in the
    /// title so edit commands can refer to it.
    pub table_index: Option<usize>,
    pub include_note: bool,
    pub include_rules: bool,
    /// Overrides the sheet's own trigger depth.
    pub trigger_depth: Option<i64>,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            table_index: None,
            include_note: true,
            include_rules: true,
            trigger_depth: None,
        }
    }
}

/// Render a sheet as prompt text.
///
/// When the sheet has `trigger_send` set, the body keeps only rows whose
/// first data column is mentioned in the recent chat turns. A depth of zero
/// or less keeps nothing.
pub fn to_text(sheet: &Sheet, options: &TextOptions, history: Option<&dyn ChatHistory>) -> String {
    let mut out = String::new();

    match options.table_index {
        Some(index) => out.push_str(&format!("* {}:{}\n", index, sheet.name)),
        None => out.push_str(&format!("* {}\n", sheet.name)),
    }

    let note = sheet.source_data.note.trim();
    if options.include_note && !note.is_empty() {
        out.push_str("Note: ");
        out.push_str(note);
        out.push('\n');
    }

    let columns: Vec<String> = sheet
        .header()
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{}:{}", i, name))
        .collect();
    out.push_str("Columns: ");
    out.push_str(&columns.join(", "));
    out.push('\n');

    let rows = body_rows(sheet, options, history);
    if rows.is_empty() {
        out.push_str("(no rows)\n");
    } else {
        out.push_str(&csv_lines(&rows));
    }

    if options.include_rules {
        let rules = rules_block(sheet);
        if !rules.is_empty() {
            out.push_str("Rules:\n");
            out.push_str(&rules);
        }
    }

    out
}

/// Data rows as `[index, values...]`, after the trigger-send filter.
fn body_rows(sheet: &Sheet, options: &TextOptions, history: Option<&dyn ChatHistory>) -> Vec<Vec<String>> {
    let rows: Vec<Vec<String>> = sheet
        .to_content_matrix(false)
        .into_iter()
        .enumerate()
        .map(|(i, values)| std::iter::once(i.to_string()).chain(values).collect())
        .collect();

    if !sheet.trigger_send {
        return rows;
    }

    let depth = options.trigger_depth.unwrap_or(sheet.trigger_send_deep);
    if depth <= 0 {
        log::debug!("sheet {}: trigger depth {} leaves the body empty", sheet.uid(), depth);
        return Vec::new();
    }
    let turns = history
        .map(|h| h.recent(depth as usize))
        .unwrap_or_default();

    rows.into_iter()
        .filter(|row| {
            let key = row.get(1).map(|s| s.trim()).unwrap_or("");
            !key.is_empty() && turns.iter().any(|turn| turn.contains(key))
        })
        .collect()
}

fn csv_lines(rows: &[Vec<String>]) -> String {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    for row in rows {
        if let Err(e) = writer.write_record(row) {
            log::warn!("prompt row could not be written: {}", e);
        }
    }
    match writer.into_inner() {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            log::warn!("prompt body could not be flushed: {}", e);
            String::new()
        }
    }
}

fn rules_block(sheet: &Sheet) -> String {
    let source = &sheet.source_data;
    [
        ("init", &source.init_node),
        ("insert", &source.insert_node),
        ("update", &source.update_node),
        ("delete", &source.delete_node),
    ]
    .iter()
    .filter(|(_, text)| !text.trim().is_empty())
    .map(|(label, text)| format!("- {}: {}\n", label, text.trim()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use memgrid_engine::cell_id::SequentialUids;

    fn sheet() -> Sheet {
        let mut s = Sheet::with_uids("Places", 3, 1, Box::new(SequentialUids::default()));
        s.rebuild_from_value_matrix(&[
            vec!["".into(), "Key".into(), "Where".into()],
            vec!["".into(), "foo".into(), "attic".into()],
            vec!["".into(), "bar".into(), "cellar, left".into()],
            vec!["".into(), "baz".into(), "garden".into()],
        ]);
        s
    }

    fn history() -> Vec<String> {
        vec![
            "we talked about baz".to_string(),
            "then foo came up".to_string(),
            "and nothing else".to_string(),
        ]
    }

    #[test]
    fn test_to_text_layout() {
        let mut s = sheet();
        s.source_data.note = "Where things are kept".into();
        s.source_data.insert_node = "Add a row for each new item".into();
        let text = to_text(&s, &TextOptions { table_index: Some(0), ..TextOptions::default() }, None);

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "* 0:Places");
        assert_eq!(lines[1], "Note: Where things are kept");
        assert_eq!(lines[2], "Columns: 0:Key, 1:Where");
        assert_eq!(lines[3], "0,foo,attic");
        assert_eq!(lines[4], "1,bar,\"cellar, left\"");
        assert_eq!(lines[5], "2,baz,garden");
        assert_eq!(lines[6], "Rules:");
        assert_eq!(lines[7], "- insert: Add a row for each new item");
        assert_eq!(lines.len(), 8);
    }

    #[test]
    fn test_options_hide_note_and_rules() {
        let mut s = sheet();
        s.source_data.note = "hidden".into();
        s.source_data.delete_node = "hidden".into();
        let options = TextOptions {
            include_note: false,
            include_rules: false,
            ..TextOptions::default()
        };
        let text = to_text(&s, &options, None);
        assert!(!text.contains("hidden"));
        assert!(text.starts_with("* Places\n"));
    }

    #[test]
    fn test_trigger_send_filters_by_recent_turns() {
        let mut s = sheet();
        s.trigger_send = true;
        s.trigger_send_deep = 2;
        let turns = history();
        let text = to_text(&s, &TextOptions::default(), Some(&turns));

        assert!(text.contains("0,foo,attic"));
        assert!(!text.contains("baz"));
        assert!(!text.contains("bar"));
    }

    #[test]
    fn test_trigger_send_zero_depth_is_empty() {
        let mut s = sheet();
        s.trigger_send = true;
        s.trigger_send_deep = 0;
        let turns = history();
        let text = to_text(&s, &TextOptions::default(), Some(&turns));
        assert!(text.contains("(no rows)"));
        assert!(!text.contains("foo"));

        let options = TextOptions { trigger_depth: Some(-3), ..TextOptions::default() };
        assert!(to_text(&s, &options, Some(&turns)).contains("(no rows)"));
    }

    #[test]
    fn test_trigger_send_depth_override() {
        let mut s = sheet();
        s.trigger_send = true;
        s.trigger_send_deep = 1;
        let turns = history();
        let options = TextOptions { trigger_depth: Some(3), ..TextOptions::default() };
        let text = to_text(&s, &options, Some(&turns));
        assert!(text.contains("foo"));
        assert!(text.contains("baz"));
        assert!(!text.contains("bar"));
    }

    #[test]
    fn test_trigger_send_blank_key_never_matches() {
        let mut s = Sheet::with_uids("Places", 3, 1, Box::new(SequentialUids::default()));
        s.rebuild_from_value_matrix(&[
            vec!["".into(), "Key".into(), "Where".into()],
            vec!["".into(), "".into(), "shed".into()],
            vec!["".into(), "  ".into(), "loft".into()],
            vec!["".into(), "foo".into(), "attic".into()],
        ]);
        s.trigger_send = true;
        s.trigger_send_deep = 3;
        let turns = history();
        let text = to_text(&s, &TextOptions::default(), Some(&turns));

        assert!(text.contains("2,foo,attic"));
        assert!(!text.contains("shed"));
        assert!(!text.contains("loft"));
    }

    #[test]
    fn test_recent_turns() {
        let turns = history();
        assert_eq!(turns.recent(2), vec!["then foo came up", "and nothing else"]);
        assert_eq!(turns.recent(10).len(), 3);
        assert!(turns.recent(0).is_empty());
    }
}
