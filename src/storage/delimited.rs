// src/storage/delimited.rs

//! `;`-delimited input reader and report writer.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, Trim, WriterBuilder};

use crate::error::{AppError, Result};
use crate::models::{ClassifiedResult, InputRow};
use crate::storage::ReportSink;

/// Report column names, in order.
pub const REPORT_HEADER: [&str; 5] = [
    "Nombre de la empresa",
    "URL de la web",
    "Accesible",
    "Emails de contacto",
    "Emails de terceros",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Read `name;url` rows from a file.
pub fn read_input(path: impl AsRef<Path>) -> Result<Vec<InputRow>> {
    let file = File::open(path.as_ref())?;
    read_input_from(file)
}

/// Read `name;url` rows from any reader.
///
/// Every line is one row: quotes carry no meaning, so a stray `"` cannot
/// swallow the lines after it. Blank lines are skipped, extra columns ignored
/// and fields trimmed. A line with a single field is kept with an empty URL so
/// it still gets a report row. Records the parser cannot read are logged and
/// skipped.
pub fn read_input_from<R: Read>(reader: R) -> Result<Vec<InputRow>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .trim(Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                let line = e
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(index + 1);
                let error = AppError::MalformedRow {
                    line,
                    message: e.to_string(),
                };
                log::warn!("{error}");
                continue;
            }
        };

        let name = record.get(0).unwrap_or_default();
        let raw_url = record.get(1).unwrap_or_default();
        if name.is_empty() && raw_url.is_empty() {
            continue;
        }
        rows.push(InputRow::new(name, raw_url));
    }

    Ok(rows)
}

/// Report writer producing the BOM, the header and one row per result.
pub struct CsvReport<W: Write> {
    writer: csv::Writer<W>,
}

impl CsvReport<File> {
    /// Create (or truncate) the report file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_writer(File::create(path.as_ref())?)
    }
}

impl<W: Write> CsvReport<W> {
    pub fn from_writer(mut inner: W) -> Result<Self> {
        inner.write_all(UTF8_BOM)?;
        let mut writer = WriterBuilder::new().delimiter(b';').from_writer(inner);
        writer.write_record(REPORT_HEADER)?;
        Ok(Self { writer })
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| AppError::Io(io::Error::other(e.to_string())))
    }
}

impl<W: Write + Send> ReportSink for CsvReport<W> {
    fn write_result(&mut self, result: &ClassifiedResult) -> Result<()> {
        self.writer.write_record(result.to_record())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DomainEntry, NormalizedDomain};

    fn written(results: &[ClassifiedResult]) -> String {
        let mut report = CsvReport::from_writer(Vec::new()).unwrap();
        for result in results {
            report.write_result(result).unwrap();
        }
        let bytes = report.into_inner().unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap()
    }

    #[test]
    fn test_read_input_rows() {
        let input = "Acme; https://www.acme.test ;extra\n\n  \nSolo\nBeta;https://beta.example/contact\n";
        let rows = read_input_from(input.as_bytes()).unwrap();
        assert_eq!(
            rows,
            vec![
                InputRow::new("Acme", "https://www.acme.test"),
                InputRow::new("Solo", ""),
                InputRow::new("Beta", "https://beta.example/contact"),
            ]
        );
    }

    #[test]
    fn test_stray_quote_does_not_merge_lines() {
        let input = "\"Acme;https://acme.test\nBeta;https://beta.test\nGamma \"G\";https://gamma.test\n";
        let rows = read_input_from(input.as_bytes()).unwrap();
        assert_eq!(
            rows,
            vec![
                InputRow::new("\"Acme", "https://acme.test"),
                InputRow::new("Beta", "https://beta.test"),
                InputRow::new("Gamma \"G\"", "https://gamma.test"),
            ]
        );
    }

    #[test]
    fn test_read_input_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.csv");
        std::fs::write(&path, "Acme;https://acme.test\n").unwrap();
        let rows = read_input(&path).unwrap();
        assert_eq!(rows, vec![InputRow::new("Acme", "https://acme.test")]);
    }

    #[test]
    fn test_missing_input_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let error = read_input(dir.path().join("missing.csv")).unwrap_err();
        assert!(matches!(error, AppError::Io(_)));
    }

    #[test]
    fn test_report_header_and_unreachable_row() {
        let entry = DomainEntry {
            name: "Acme".into(),
            domain: NormalizedDomain::from_host("acme.test"),
        };
        let output = written(&[ClassifiedResult::unreachable(&entry)]);
        assert_eq!(
            output,
            "Nombre de la empresa;URL de la web;Accesible;Emails de contacto;Emails de terceros\n\
             Acme;acme.test;false;;\n"
        );
    }

    #[test]
    fn test_report_joins_address_lists() {
        let result = ClassifiedResult {
            name: "Beta".into(),
            domain: NormalizedDomain::from_host("beta.example"),
            https_reachable: true,
            host_emails: vec!["info@beta.example".into(), "sales@beta.example".into()],
            third_party_emails: vec!["agency@partner.example".into()],
        };
        let output = written(&[result]);
        let row = output.lines().nth(1).unwrap();
        assert_eq!(
            row,
            "Beta;beta.example;true;info@beta.example,sales@beta.example;agency@partner.example"
        );
    }

    #[test]
    fn test_report_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        {
            let mut report = CsvReport::create(&path).unwrap();
            report.flush().unwrap();
        }
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        assert!(String::from_utf8_lossy(&bytes).contains("Emails de terceros"));
    }
}
