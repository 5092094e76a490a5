//! CSV reading sources and engineered-frame output

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::{FeatureRow, FeatureValue, RawValue, Reading};
use crate::schema::columns;

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];

/// Parse a timestamp cell. An explicit offset is kept as logged; naive
/// values are taken as UTC.
pub fn parse_timestamp(cell: &str) -> Option<DateTime<FixedOffset>> {
    let cell = cell.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(cell) {
        return Some(dt);
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(cell, format) {
            return Some(naive.and_utc().into());
        }
    }
    NaiveDate::parse_from_str(cell, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().into())
}

/// Read readings from a CSV file with a header row
pub fn load_readings(path: &Path) -> Result<Vec<Reading>> {
    let file = File::open(path)?;
    let readings = read_readings(file)?;
    info!(path = %path.display(), rows = readings.len(), "Loaded readings");
    Ok(readings)
}

/// Read readings from any CSV source. Rows without a usable timestamp are
/// skipped.
pub fn read_readings<R: Read>(source: R) -> Result<Vec<Reading>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(source);
    let headers = reader.headers()?.clone();

    let mut readings = Vec::new();
    let mut skipped = 0usize;
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let mut site_id = None;
        let mut timestamp = None;
        let mut values = BTreeMap::new();

        for (header, cell) in headers.iter().zip(record.iter()) {
            match header {
                columns::SITE_ID => {
                    let cell = cell.trim();
                    if !cell.is_empty() {
                        site_id = Some(cell.to_string());
                    }
                }
                columns::TIMESTAMP => timestamp = parse_timestamp(cell),
                _ => {
                    values.insert(header.to_string(), RawValue::parse(cell));
                }
            }
        }

        match timestamp {
            Some(timestamp) => readings.push(Reading {
                site_id,
                timestamp,
                values,
            }),
            None => {
                skipped += 1;
                warn!(line = line + 2, "Skipping reading without a parseable timestamp");
            }
        }
    }

    if skipped > 0 {
        warn!(skipped, "Readings skipped during load");
    }
    Ok(readings)
}

/// Cross-sectional frame read straight into training rows
#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Header order
    pub columns: Vec<String>,
    /// Columns holding at least one non-numeric cell
    pub categorical: Vec<String>,
    pub rows: Vec<FeatureRow>,
}

/// Read a cross-sectional CSV table from a file
pub fn load_table(path: &Path) -> Result<Table> {
    let file = File::open(path)?;
    let table = read_table(file)?;
    info!(
        path = %path.display(),
        rows = table.rows.len(),
        columns = table.columns.len(),
        categorical = table.categorical.len(),
        "Loaded table"
    );
    Ok(table)
}

/// Read a cross-sectional CSV table. Missing numeric cells are left out of
/// the row; categorical cells keep their text. Rows carry no clock, so each
/// is stamped with its record index to keep file order under a
/// chronological split.
pub fn read_table<R: Read>(source: R) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut records = Vec::new();
    let mut categorical = BTreeSet::new();
    for record in reader.records() {
        let record = record?;
        let cells: Vec<RawValue> = record.iter().map(RawValue::parse).collect();
        for (name, cell) in headers.iter().zip(&cells) {
            if matches!(cell, RawValue::Text(_)) {
                categorical.insert(name.clone());
            }
        }
        records.push(cells);
    }

    let rows = records
        .iter()
        .enumerate()
        .map(|(index, cells)| {
            let mut values = BTreeMap::new();
            for (name, cell) in headers.iter().zip(cells) {
                if categorical.contains(name) {
                    values.insert(name.clone(), FeatureValue::Category(cell.coerce_category()));
                } else if !cell.is_missing() {
                    values.insert(name.clone(), FeatureValue::Number(cell.coerce_f64()));
                }
            }
            let stamp = DateTime::<Utc>::from_timestamp(index as i64, 0).unwrap_or_default();
            FeatureRow {
                site_id: columns::DEFAULT_SITE.to_string(),
                timestamp: stamp.into(),
                values,
            }
        })
        .collect();

    let categorical = headers
        .iter()
        .filter(|name| categorical.contains(*name))
        .cloned()
        .collect();
    Ok(Table {
        columns: headers,
        categorical,
        rows,
    })
}

/// Write engineered rows as CSV, columns in stable engine order
pub fn write_feature_rows<W: Write>(rows: &[FeatureRow], sink: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(sink);
    let Some(first) = rows.first() else {
        writer.flush()?;
        return Ok(());
    };
    let names = first.columns();

    let mut header = vec![columns::SITE_ID.to_string(), columns::TIMESTAMP.to_string()];
    header.extend(names.iter().cloned());
    writer.write_record(&header)?;

    for row in rows {
        let mut record = vec![row.site_id.clone(), row.timestamp.to_rfc3339()];
        for name in &names {
            let cell = match row.get(name) {
                Some(value) if columns::is_categorical(name) => value.as_category(),
                Some(value) => value.as_f64().to_string(),
                None => "0".to_string(),
            };
            record.push(cell);
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}
