//! Input and report files.
//!
//! Both files are `;`-delimited. The report starts with a UTF-8 byte order
//! mark so spreadsheet tools pick the right encoding:
//!
//! ```text
//! Nombre de la empresa;URL de la web;Accesible;Emails de contacto;Emails de terceros
//! Acme;acme.test;true;info@acme.test;agency@partner.example
//! ```

pub mod delimited;

use crate::error::Result;
use crate::models::ClassifiedResult;

pub use delimited::{CsvReport, REPORT_HEADER, read_input, read_input_from};

/// Destination for report rows, written batch by batch.
pub trait ReportSink: Send {
    /// Append one row.
    fn write_result(&mut self, result: &ClassifiedResult) -> Result<()>;

    /// Make every row written so far durable.
    fn flush(&mut self) -> Result<()>;
}
