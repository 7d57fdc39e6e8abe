//! Report exporter: joined attendance rows serialized to CSV or XLSX,
//! one file per invocation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use rollcall_store::ReportRow;
use rust_xlsxwriter::Workbook;

const HEADERS: [&str; 5] = ["Roll Number", "Name", "Date", "Time", "Status"];

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Csv,
    Xlsx,
}

impl ReportFormat {
    fn extension(self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Xlsx => "xlsx",
        }
    }
}

/// Writes report files into a designated output directory.
pub struct ReportExporter {
    dir: PathBuf,
}

impl ReportExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Serialize rows to `<dir>/<stem>.<ext>` and return the path written.
    pub fn write(&self, stem: &str, rows: &[ReportRow], format: ReportFormat) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating report directory {}", self.dir.display()))?;
        let path = self.dir.join(format!("{stem}.{}", format.extension()));

        match format {
            ReportFormat::Csv => write_csv(&path, rows)?,
            ReportFormat::Xlsx => write_xlsx(&path, rows)?,
        }

        tracing::info!(path = %path.display(), rows = rows.len(), "report written");
        Ok(path)
    }
}

fn write_csv(path: &Path, rows: &[ReportRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(HEADERS)?;
    for row in rows {
        let date = row.date.to_string();
        let time = row.time.format("%H:%M:%S").to_string();
        writer.write_record([
            row.roll_number.as_str(),
            row.name.as_str(),
            date.as_str(),
            time.as_str(),
            row.status.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_xlsx(path: &Path, rows: &[ReportRow]) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Attendance")?;

    for (col, header) in HEADERS.iter().enumerate() {
        sheet.write_string(0, col as u16, *header)?;
    }
    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        sheet.write_string(r, 0, &row.roll_number)?;
        sheet.write_string(r, 1, &row.name)?;
        sheet.write_string(r, 2, row.date.to_string())?;
        sheet.write_string(r, 3, row.time.format("%H:%M:%S").to_string())?;
        sheet.write_string(r, 4, row.status.as_str())?;
    }

    workbook
        .save(path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_store::Status;

    fn rows() -> Vec<ReportRow> {
        vec![
            ReportRow {
                roll_number: "R1".into(),
                name: "Alice".into(),
                date: "2024-01-01".parse().unwrap(),
                time: "09:00:00".parse().unwrap(),
                status: Status::Present,
            },
            ReportRow {
                roll_number: "R2".into(),
                name: "Bob, Jr.".into(),
                date: "2024-01-01".parse().unwrap(),
                time: "09:05:30".parse().unwrap(),
                status: Status::Present,
            },
        ]
    }

    #[test]
    fn test_csv_report_contents() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = ReportExporter::new(dir.path());
        let path = exporter
            .write("attendance_2024-01-01", &rows(), ReportFormat::Csv)
            .unwrap();
        assert_eq!(path.extension().unwrap(), "csv");

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Roll Number,Name,Date,Time,Status");
        assert_eq!(lines[1], "R1,Alice,2024-01-01,09:00:00,Present");
        // Comma in the name gets quoted.
        assert_eq!(lines[2], "R2,\"Bob, Jr.\",2024-01-01,09:05:30,Present");
    }

    #[test]
    fn test_csv_empty_rows_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = ReportExporter::new(dir.path());
        let path = exporter.write("empty", &[], ReportFormat::Csv).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim(), "Roll Number,Name,Date,Time,Status");
    }

    #[test]
    fn test_xlsx_report_written() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = ReportExporter::new(dir.path());
        let path = exporter
            .write("attendance_full_20240101_090000", &rows(), ReportFormat::Xlsx)
            .unwrap();
        assert_eq!(path.extension().unwrap(), "xlsx");
        let meta = std::fs::metadata(&path).unwrap();
        assert!(meta.len() > 0);
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = ReportExporter::new(dir.path().join("nested/reports"));
        let path = exporter.write("r", &rows(), ReportFormat::Csv).unwrap();
        assert!(path.exists());
    }
}
