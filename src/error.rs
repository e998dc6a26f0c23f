use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, UnifyError>;

/// Error type covering the failures that can occur while loading, rewriting,
/// or persisting the consolidated workbook.
#[derive(Debug, Error)]
pub enum UnifyError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when the JSON run report cannot be serialised.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when the spreadsheet package cannot be opened as a zip archive.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Raised when a package part contains malformed XML.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when an input path exists but is not a regular file.
    #[error("input path is not a file: {0}")]
    NotAFile(PathBuf),

    /// Raised when an input does not carry a recognised spreadsheet extension.
    #[error("unsupported format for '{name}', expected one of: {expected}")]
    UnsupportedExtension { name: String, expected: String },

    /// Raised when the caller does not supply exactly three input workbooks.
    #[error("exactly {expected} input files are required, got {actual}")]
    InputCount { expected: usize, actual: usize },

    /// Raised when an input workbook has no worksheet to consolidate.
    #[error("workbook has no sheets: {0}")]
    EmptyWorkbook(PathBuf),

    /// Raised when a package does not follow the expected OOXML conventions.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// Raised when a cell coordinate falls outside the worksheet limits.
    #[error("invalid cell address: row {row}, column {column}")]
    InvalidAddress { row: u32, column: u32 },

    /// Raised when an A1-style reference cannot be parsed.
    #[error("invalid cell reference '{0}'")]
    InvalidReference(String),

    /// Raised when a merge would overlap an existing merged range.
    #[error("range {requested} overlaps merged range {existing}")]
    MergeOverlap { requested: String, existing: String },

    /// Raised when the background worker terminates without a result.
    #[error("consolidation worker panicked")]
    WorkerPanicked,

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
