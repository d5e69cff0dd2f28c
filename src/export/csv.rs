use std::io::Write;
use std::path::Path;

use super::{DayRecord, ExportError};

/// Column headers of the daily export
pub const HEADERS: [&str; 6] = ["Date", "HRV (ms)", "Command", "Followed", "Energy", "Source"];

/// Write day records as CSV to any writer
pub fn write_day_records<W: Write>(records: &[DayRecord], writer: W) -> Result<(), ExportError> {
    let mut csv_writer = ::csv::Writer::from_writer(writer);
    csv_writer.write_record(HEADERS)?;

    for record in records {
        csv_writer.write_record([
            record.date.format("%Y-%m-%d").to_string(),
            record.hrv.map_or(String::new(), |v| v.to_string()),
            record.command.map_or(String::new(), |c| c.to_string()),
            record.followed.map_or(String::new(), |f| f.to_string()),
            record.energy.map_or(String::new(), |e| e.to_string()),
            record.source.clone().unwrap_or_default(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Render day records as a CSV string
pub fn day_records_to_string(records: &[DayRecord]) -> Result<String, ExportError> {
    let mut buffer = Vec::new();
    write_day_records(records, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| ExportError::SerializationError(e.to_string()))
}

/// Export day records to a CSV file
pub fn export_day_records<P: AsRef<Path>>(
    records: &[DayRecord],
    output_path: P,
) -> Result<(), ExportError> {
    let file = std::fs::File::create(output_path)?;
    write_day_records(records, file)
}
