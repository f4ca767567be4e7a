//! Store-backed sheet commands.
//!
//! Every command loads the sheets it needs from the SQLite store, runs one
//! engine operation and writes the result back. Sheets are addressed by uid
//! or by name.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use memgrid_config::settings::Settings;
use memgrid_engine::cell_id::CellUid;
use memgrid_engine::edit::{EditOutcome, Side};
use memgrid_engine::sheet::{Sheet, SheetKind};
use memgrid_engine::store::SheetStore;
use memgrid_io::native::SqliteStore;
use memgrid_io::prompt::{self, TextOptions};
use memgrid_io::table_edit;

use crate::CliError;

pub struct Workspace {
    store: SqliteStore,
    settings: Settings,
}

impl Workspace {
    /// Open the store named on the command line, or the configured one.
    pub fn open(store: Option<PathBuf>, config: Option<PathBuf>) -> Result<Self, CliError> {
        let settings = match config {
            Some(path) => Settings::load_from(&path)?,
            None => Settings::load()?,
        };
        let path = store.unwrap_or_else(|| settings.effective_store_path());
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| CliError::error(format!("cannot create {}: {}", parent.display(), e)))?;
        }
        let store = SqliteStore::open(&path)?;
        Ok(Self { store, settings })
    }

    pub fn load(&self, key: &str) -> Result<Sheet, CliError> {
        self.store
            .load_sheet(key)?
            .ok_or_else(|| CliError::not_found(format!("no sheet named or with uid '{}'", key)))
    }

    pub fn save(&mut self, sheet: &mut Sheet) -> Result<(), CliError> {
        sheet.set_snapshot_form(self.settings.snapshot_form);
        sheet.save(Some(&mut self.store))?;
        Ok(())
    }
}

fn cell_uid(sheet: &Sheet, address: &str) -> Result<CellUid, CliError> {
    if memgrid_engine::address::parse_address(address).is_none() {
        return Err(CliError::args(format!("'{}' is not a cell address", address))
            .with_hint("use column letters then a row number, e.g. B3"));
    }
    sheet
        .cell_from_address(address)
        .map(|cell| cell.uid.clone())
        .ok_or_else(|| {
            CliError::not_found(format!(
                "{} is outside the {}x{} grid of '{}'",
                address,
                sheet.row_count(),
                sheet.col_count(),
                sheet.name
            ))
        })
}

fn require_applied(outcome: EditOutcome) -> Result<EditOutcome, CliError> {
    match outcome {
        EditOutcome::Rejected(rejection) => Err(CliError::rejected(rejection.to_string())),
        other => Ok(other),
    }
}

fn out() -> io::StdoutLock<'static> {
    io::stdout().lock()
}

fn write_line(line: impl std::fmt::Display) -> Result<(), CliError> {
    writeln!(out(), "{}", line).map_err(|e| CliError::error(e.to_string()))
}

// ============================================================================
// new / list / delete
// ============================================================================

pub struct NewSheet {
    pub name: String,
    pub cols: Option<usize>,
    pub rows: Option<usize>,
    pub template: bool,
    pub from_template: Option<String>,
    pub kind: Option<SheetKind>,
    pub trigger_send: bool,
}

pub fn cmd_new(ws: &mut Workspace, args: NewSheet) -> Result<(), CliError> {
    let cols = args.cols.unwrap_or(ws.settings.default_columns);
    let rows = args.rows.unwrap_or(ws.settings.default_rows);

    let mut sheet = match (&args.from_template, args.template) {
        (Some(_), true) => {
            return Err(CliError::args("--template and --from-template are mutually exclusive"));
        }
        (Some(key), false) => {
            let template = ws.load(key)?;
            if !template.is_template() {
                return Err(CliError::args(format!("'{}' is not a template", key)));
            }
            let mut sheet = Sheet::from_template(&template);
            sheet.name = args.name.clone();
            sheet
        }
        (None, true) => Sheet::new_template(&args.name, cols),
        (None, false) => {
            let mut sheet = Sheet::new(&args.name, cols, rows);
            sheet.trigger_send_deep = ws.settings.trigger_send_deep;
            sheet
        }
    };
    if let Some(kind) = args.kind {
        sheet.kind = kind;
    }
    if args.trigger_send {
        sheet.trigger_send = true;
    }

    ws.save(&mut sheet)?;
    log::info!("created sheet {} ({})", sheet.uid(), sheet.name);
    write_line(sheet.uid())
}

pub fn cmd_list(ws: &Workspace) -> Result<(), CliError> {
    for summary in ws.store.summaries()? {
        write_line(format_args!("{}\t{}\t{}", summary.uid, summary.name, summary.updated_at))?;
    }
    Ok(())
}

pub fn cmd_delete(ws: &mut Workspace, key: &str) -> Result<(), CliError> {
    let sheet = ws.load(key)?;
    ws.store.delete_sheet(sheet.uid())?;
    write_line(format_args!("deleted {}", sheet.uid()))
}

// ============================================================================
// show / get
// ============================================================================

pub struct ShowArgs {
    pub key: String,
    pub index: Option<usize>,
    pub chat: Option<PathBuf>,
    pub depth: Option<i64>,
    pub no_note: bool,
    pub no_rules: bool,
}

pub fn cmd_show(ws: &Workspace, args: ShowArgs) -> Result<(), CliError> {
    let sheet = ws.load(&args.key)?;
    let turns = match &args.chat {
        Some(path) => read_turns(path)?,
        None => Vec::new(),
    };
    let options = TextOptions {
        table_index: args.index,
        include_note: ws.settings.include_note && !args.no_note,
        include_rules: ws.settings.include_rules && !args.no_rules,
        trigger_depth: args.depth,
    };
    let text = prompt::to_text(&sheet, &options, Some(&turns));
    write!(out(), "{}", text).map_err(|e| CliError::error(e.to_string()))
}

/// One chat turn per non-empty line.
fn read_turns(path: &Path) -> Result<Vec<String>, CliError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CliError::args(format!("cannot read {}: {}", path.display(), e)))?;
    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect())
}

pub fn cmd_get(ws: &Workspace, key: &str, address: &str, attr: &str) -> Result<(), CliError> {
    let sheet = ws.load(key)?;
    let uid = cell_uid(&sheet, address)?;
    write_line(sheet.get(&uid, attr).unwrap_or(""))
}

// ============================================================================
// set / structural edits
// ============================================================================

pub fn cmd_set(ws: &mut Workspace, key: &str, address: &str, attr: &str, value: &str) -> Result<(), CliError> {
    let mut sheet = ws.load(key)?;
    let uid = cell_uid(&sheet, address)?;
    let outcome = require_applied(sheet.set(&uid, attr, value)?)?;
    ws.save(&mut sheet)?;
    if let EditOutcome::Edited(new_uid) = outcome {
        log::debug!("{} now {}", address, new_uid);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub enum Structural {
    InsertRow(Side),
    InsertColumn(Side),
    DeleteRow,
    DeleteColumn,
}

pub fn cmd_structural(ws: &mut Workspace, key: &str, address: &str, op: Structural) -> Result<(), CliError> {
    let mut sheet = ws.load(key)?;
    let uid = cell_uid(&sheet, address)?;
    let outcome = match op {
        Structural::InsertRow(side) => sheet.insert_row(&uid, side)?,
        Structural::InsertColumn(side) => sheet.insert_column(&uid, side)?,
        Structural::DeleteRow => sheet.delete_row(&uid)?,
        Structural::DeleteColumn => sheet.delete_column(&uid)?,
    };
    require_applied(outcome)?;
    ws.save(&mut sheet)?;
    write_line(format_args!("{}x{}", sheet.row_count(), sheet.col_count()))
}

pub fn cmd_clear(ws: &mut Workspace, key: &str) -> Result<(), CliError> {
    let mut sheet = ws.load(key)?;
    require_applied(sheet.clear_sheet()?)?;
    ws.save(&mut sheet)
}

// ============================================================================
// import / export
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Tsv,
    Json,
    Snapshot,
}

pub fn cmd_export(ws: &Workspace, key: &str, format: ExportFormat, output: &Path) -> Result<(), CliError> {
    let sheet = ws.load(key)?;
    match format {
        ExportFormat::Csv => memgrid_io::csv::export(&sheet, output)?,
        ExportFormat::Tsv => memgrid_io::csv::export_tsv(&sheet, output)?,
        ExportFormat::Json => memgrid_io::json::export(&sheet, output)?,
        ExportFormat::Snapshot => memgrid_io::json::save_snapshot(&sheet, ws.settings.snapshot_form, output)?,
    }
    log::info!("exported {} to {}", sheet.uid(), output.display());
    Ok(())
}

pub fn cmd_import(ws: &mut Workspace, input: &Path, name: Option<String>) -> Result<(), CliError> {
    let is_json = input.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let is_tsv = input.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("tsv"));
    let mut sheet = if is_json {
        let mut sheet = memgrid_io::json::load_snapshot(input)?;
        sheet.reassign_uid();
        sheet
    } else if is_tsv {
        memgrid_io::csv::import_tsv(input)?
    } else {
        memgrid_io::csv::import(input)?
    };
    if let Some(name) = name {
        sheet.name = name;
    }
    ws.save(&mut sheet)?;
    write_line(sheet.uid())
}

// ============================================================================
// apply (table edits from stdin)
// ============================================================================

pub fn cmd_apply(ws: &mut Workspace, keys: &[String]) -> Result<(), CliError> {
    let mut text = String::new();
    io::stdin()
        .read_to_string(&mut text)
        .map_err(|e| CliError::error(format!("reading stdin: {}", e)))?;

    let mut sheets = keys.iter().map(|key| ws.load(key)).collect::<Result<Vec<_>, _>>()?;
    let edits = table_edit::parse_table_edits(&text)?;
    let report = table_edit::apply_table_edits(&mut sheets, &edits)?;

    for sheet in &mut sheets {
        ws.save(sheet)?;
    }
    write_line(format_args!(
        "applied {}, rejected {}, skipped {}",
        report.applied, report.rejected, report.skipped
    ))
}

// ============================================================================
// history / compact / pieces
// ============================================================================

pub fn cmd_history(ws: &Workspace, key: &str, address: &str) -> Result<(), CliError> {
    let sheet = ws.load(key)?;
    let uid = cell_uid(&sheet, address)?;
    let coord = sheet
        .cell_by_uid(&uid)
        .map(|cell| cell.coord_uid.clone())
        .unwrap_or_default();
    for cell in sheet.history_of(&coord) {
        let marker = if cell.uid == uid { "*" } else { " " };
        write_line(format_args!("{} {}\t{}", marker, cell.uid, cell.value()))?;
    }
    Ok(())
}

pub fn cmd_compact(ws: &mut Workspace, key: &str) -> Result<(), CliError> {
    let mut sheet = ws.load(key)?;
    let pieces = ws.store.pieces_for(sheet.uid())?;
    let keep: Vec<_> = pieces.iter().map(|(_, piece)| piece).collect();
    let dropped = sheet.compact_history_keeping(&keep);
    ws.save(&mut sheet)?;
    write_line(format_args!("dropped {} of {} records", dropped, dropped + sheet.history().len()))
}

pub fn cmd_piece_save(ws: &mut Workspace, key: &str, piece_id: &str) -> Result<(), CliError> {
    let sheet = ws.load(key)?;
    ws.store.put_piece(piece_id, &sheet.piece_snapshot())?;
    Ok(())
}

pub fn cmd_piece_restore(ws: &mut Workspace, key: &str, piece_id: &str) -> Result<(), CliError> {
    let mut sheet = ws.load(key)?;
    let piece = ws
        .store
        .get_piece(piece_id, sheet.uid())?
        .ok_or_else(|| CliError::not_found(format!("no piece '{}' for sheet {}", piece_id, sheet.uid())))?;
    require_applied(sheet.restore_piece(&piece)?)?;
    ws.save(&mut sheet)
}

