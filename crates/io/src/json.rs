// JSON export and snapshot files

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use memgrid_engine::cell_id::RandomUids;
use memgrid_engine::sheet::Sheet;
use memgrid_engine::snapshot::{SheetSnapshot, SnapshotForm};

use crate::error::IoError;

/// Export data rows as an array of arrays, column header row first.
pub fn export(sheet: &Sheet, path: &Path) -> Result<(), IoError> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);

    let rows: Vec<Vec<String>> = sheet
        .to_content_matrix(true)
        .into_iter()
        .map(|row| row.into_iter().skip(1).collect())
        .collect();

    serde_json::to_writer_pretty(writer, &rows)?;
    Ok(())
}

pub fn save_snapshot(sheet: &Sheet, form: SnapshotForm, path: &Path) -> Result<(), IoError> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &sheet.to_snapshot(form))?;
    log::debug!("wrote {:?} snapshot of sheet {} to {}", form, sheet.uid(), path.display());
    Ok(())
}

pub fn read_snapshot(path: &Path) -> Result<SheetSnapshot, IoError> {
    let file = File::open(path)?;
    let snapshot = serde_json::from_reader(BufReader::new(file))?;
    Ok(snapshot)
}

pub fn load_snapshot(path: &Path) -> Result<Sheet, IoError> {
    let snapshot = read_snapshot(path)?;
    Ok(Sheet::from_snapshot(&snapshot, Box::new(RandomUids)))
}
