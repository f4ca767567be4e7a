// Table edit commands emitted by the chat model
//
//   <tableEdit>
//   insertRow(0, {"0":"Alice","1":"Paris"})
//   updateRow(0, 1, {"1":"Rome"})
//   deleteRow(0, 2)
//   </tableEdit>
//
// The first argument is the table index as listed in the prompt. Row and
// column numbers are data indices (see `memgrid_engine::row_edit`).

use std::collections::BTreeMap;

use regex::Regex;

use memgrid_engine::edit::EditOutcome;
use memgrid_engine::row_edit::RowEdit;
use memgrid_engine::sheet::Sheet;

use crate::error::IoError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEdit {
    pub table_index: usize,
    pub edit: RowEdit,
}

/// Counts from one [`apply_table_edits`] batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: usize,
    pub rejected: usize,
    /// Edits naming a table that does not exist.
    pub skipped: usize,
}

struct Patterns {
    block: Regex,
    call: Regex,
    insert_args: Regex,
    update_args: Regex,
    delete_args: Regex,
}

impl Patterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            block: Regex::new(r"(?s)<tableEdit>(.*?)</tableEdit>")?,
            call: Regex::new(r"\b(insertRow|updateRow|deleteRow)\s*\(")?,
            insert_args: Regex::new(r"(?s)^\s*(\d+)\s*,\s*(\{.*\})\s*$")?,
            update_args: Regex::new(r"(?s)^\s*(\d+)\s*,\s*(\d+)\s*,\s*(\{.*\})\s*$")?,
            delete_args: Regex::new(r"^\s*(\d+)\s*,\s*(\d+)\s*$")?,
        })
    }
}

/// Extract every command from the `<tableEdit>` blocks in `text`.
///
/// Line comments (`//`) are ignored and HTML comment markers are stripped,
/// so commands wrapped in `<!-- -->` still count. Malformed calls are logged
/// and skipped.
pub fn parse_table_edits(text: &str) -> Result<Vec<TableEdit>, IoError> {
    let patterns = Patterns::new()?;
    let mut edits = Vec::new();

    for block in patterns.block.captures_iter(text) {
        let body: String = block[1]
            .replace("<!--", "")
            .replace("-->", "")
            .lines()
            .filter(|line| !line.trim_start().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");

        for call in patterns.call.captures_iter(&body) {
            let (Some(whole), Some(name)) = (call.get(0), call.get(1)) else {
                continue;
            };
            let Some(args) = call_arguments(&body[whole.end()..]) else {
                log::warn!("unterminated {} call in table edit, skipped", name.as_str());
                continue;
            };
            match parse_call(&patterns, name.as_str(), args) {
                Some(edit) => edits.push(edit),
                None => log::warn!("malformed table edit {}({}), skipped", name.as_str(), args.trim()),
            }
        }
    }

    log::debug!("parsed {} table edits", edits.len());
    Ok(edits)
}

/// Text up to the closing parenthesis, honoring strings and braces.
fn call_arguments(rest: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in rest.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => depth = depth.saturating_sub(1),
            ')' if depth == 0 => return Some(&rest[..i]),
            _ => {}
        }
    }
    None
}

fn parse_call(patterns: &Patterns, name: &str, args: &str) -> Option<TableEdit> {
    match name {
        "insertRow" => {
            let caps = patterns.insert_args.captures(args)?;
            Some(TableEdit {
                table_index: caps[1].parse().ok()?,
                edit: RowEdit::Insert { values: parse_values(&caps[2])? },
            })
        }
        "updateRow" => {
            let caps = patterns.update_args.captures(args)?;
            Some(TableEdit {
                table_index: caps[1].parse().ok()?,
                edit: RowEdit::Update {
                    row: caps[2].parse().ok()?,
                    values: parse_values(&caps[3])?,
                },
            })
        }
        "deleteRow" => {
            let caps = patterns.delete_args.captures(args)?;
            Some(TableEdit {
                table_index: caps[1].parse().ok()?,
                edit: RowEdit::Delete { row: caps[2].parse().ok()? },
            })
        }
        _ => None,
    }
}

/// `{"0":"Alice","1":30}` keyed by data-column index. Non-numeric keys are
/// dropped; scalars are stringified and null becomes empty.
fn parse_values(json: &str) -> Option<BTreeMap<usize, String>> {
    let object: serde_json::Map<String, serde_json::Value> = match serde_json::from_str(json) {
        Ok(object) => object,
        Err(e) => {
            log::warn!("table edit values are not a JSON object: {}", e);
            return None;
        }
    };

    let mut values = BTreeMap::new();
    for (key, value) in object {
        let Ok(col) = key.trim().parse::<usize>() else {
            log::warn!("table edit column {:?} is not an index, ignored", key);
            continue;
        };
        let text = match value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        };
        values.insert(col, text);
    }
    Some(values)
}

/// Apply one edit to the sheet its table index names.
pub fn apply_table_edit(sheets: &mut [Sheet], edit: &TableEdit) -> Result<EditOutcome, IoError> {
    let count = sheets.len();
    let sheet = sheets
        .get_mut(edit.table_index)
        .ok_or(IoError::NoSuchTable { index: edit.table_index, count })?;
    Ok(sheet.apply_row_edit(&edit.edit)?)
}

/// Apply a batch in model order, except that deletes run last and from the
/// bottom up, so row numbers in the batch keep referring to the rows the
/// model saw.
pub fn apply_table_edits(sheets: &mut [Sheet], edits: &[TableEdit]) -> Result<ApplyReport, IoError> {
    let (mut deletes, others): (Vec<&TableEdit>, Vec<&TableEdit>) =
        edits.iter().partition(|e| matches!(e.edit, RowEdit::Delete { .. }));
    deletes.sort_by_key(|e| {
        let row = match e.edit {
            RowEdit::Delete { row } => row,
            _ => 0,
        };
        (e.table_index, std::cmp::Reverse(row))
    });

    let mut report = ApplyReport::default();
    for edit in others.into_iter().chain(deletes) {
        match apply_table_edit(sheets, edit) {
            Ok(outcome) if outcome.is_applied() => report.applied += 1,
            Ok(_) => report.rejected += 1,
            Err(IoError::NoSuchTable { index, count }) => {
                log::warn!("table edit targets table {} but only {} exist, skipped", index, count);
                report.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }
    log::info!(
        "table edits: {} applied, {} rejected, {} skipped",
        report.applied,
        report.rejected,
        report.skipped
    );
    Ok(report)
}
