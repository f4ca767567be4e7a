// CSV/TSV import/export
//
// Files hold the column header row followed by the data rows. The row-header
// column is a grid artifact and is never written; import adds it back.

use std::io::Read;
use std::path::Path;

use memgrid_engine::sheet::Sheet;

use crate::error::IoError;

pub fn import(path: &Path) -> Result<Sheet, IoError> {
    let content = read_file_as_utf8(path)?;
    let delimiter = sniff_delimiter(&content);
    import_from_string(&sheet_name(path), &content, delimiter)
}

pub fn import_tsv(path: &Path) -> Result<Sheet, IoError> {
    let content = read_file_as_utf8(path)?;
    import_from_string(&sheet_name(path), &content, b'\t')
}

fn sheet_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Imported".to_string())
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        // Consistent lines times field count; wider wins ties
        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8 if needed (Windows-1252 fallback).
pub fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    let mut file = std::fs::File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            log::debug!("{}: not UTF-8, decoding as Windows-1252", path.display());
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

pub fn import_from_string(name: &str, content: &str, delimiter: u8) -> Result<Sheet, IoError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut matrix: Vec<Vec<String>> = Vec::new();
    for result in reader.records() {
        let record = result?;
        let row = std::iter::once(String::new())
            .chain(record.iter().map(str::to_string))
            .collect();
        matrix.push(row);
    }

    let mut sheet = Sheet::new(name, 1, 1);
    sheet.rebuild_from_value_matrix(&matrix);
    log::info!("imported {} rows into sheet {}", matrix.len(), sheet.uid());
    Ok(sheet)
}

pub fn export(sheet: &Sheet, path: &Path) -> Result<(), IoError> {
    export_with_delimiter(sheet, path, b',')
}

pub fn export_tsv(sheet: &Sheet, path: &Path) -> Result<(), IoError> {
    export_with_delimiter(sheet, path, b'\t')
}

fn export_with_delimiter(sheet: &Sheet, path: &Path, delimiter: u8) -> Result<(), IoError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)?;

    for row in sheet.to_content_matrix(true) {
        writer.write_record(row.iter().skip(1))?;
    }

    writer.flush()?;
    Ok(())
}
