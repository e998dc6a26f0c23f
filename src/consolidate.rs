//! Loading the three input workbooks into one, running the formula pipeline
//! and saving the result, optionally on a background worker.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Result, UnifyError};
use crate::io::{excel_read, excel_write};
use crate::layout::{INPUT_COUNT, SUPPORTED_EXTENSIONS, TARGET_SHEET_TITLES};
use crate::model::Workbook;
use crate::pipeline::{self, PipelineReport, ProgressObserver};

/// Stem of the default output file name.
pub const DEFAULT_OUTPUT_STEM: &str = "Planilha_Consolidada";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
/// Characters spreadsheet applications reject in sheet titles.
const FORBIDDEN_TITLE_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| extension.eq_ignore_ascii_case(supported))
        })
}

/// Checks that `path` exists, is a regular file and has a spreadsheet
/// extension.
pub fn validate_input_file(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(UnifyError::MissingInput(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(UnifyError::NotAFile(path.to_path_buf()));
    }
    if !has_supported_extension(path) {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let expected = SUPPORTED_EXTENSIONS
            .iter()
            .map(|extension| format!(".{extension}"))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(UnifyError::UnsupportedExtension { name, expected });
    }
    Ok(())
}

/// Checks the input count and every input file.
pub fn validate_inputs(paths: &[PathBuf]) -> Result<()> {
    if paths.len() != INPUT_COUNT {
        return Err(UnifyError::InputCount {
            expected: INPUT_COUNT,
            actual: paths.len(),
        });
    }
    paths.iter().try_for_each(|path| validate_input_file(path))
}

/// The platform downloads folder, else `~/Downloads`, else the working
/// directory.
fn default_output_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Output path for a run. A requested path keeps its spreadsheet extension or
/// gets `.xlsx`; without a request the file lands in the downloads folder
/// with a timestamped name.
pub fn build_output_path(requested: Option<&Path>) -> PathBuf {
    match requested {
        Some(path) if has_supported_extension(path) => path.to_path_buf(),
        Some(path) => path.with_extension("xlsx"),
        None => {
            let stamp = chrono::Local::now().format(TIMESTAMP_FORMAT);
            default_output_dir().join(format!("{DEFAULT_OUTPUT_STEM}_{stamp}.xlsx"))
        }
    }
}

/// Title for a new sheet: forbidden characters become `_`, then the
/// workbook's length and collision rules apply.
pub fn unique_sheet_title(workbook: &Workbook, desired: &str) -> String {
    let cleaned: String = desired
        .chars()
        .map(|ch| if FORBIDDEN_TITLE_CHARS.contains(&ch) { '_' } else { ch })
        .collect();
    workbook.unique_title(&cleaned)
}

/// Reads the first sheet of each input into a new workbook under the fixed
/// target titles.
pub fn load_consolidated(
    paths: &[PathBuf],
    progress: &mut dyn ProgressObserver,
) -> Result<Workbook> {
    validate_inputs(paths)?;
    progress.progress(5, "Creating the consolidated workbook");
    let mut workbook = Workbook::new();

    for (index, (path, target)) in paths.iter().zip(TARGET_SHEET_TITLES).enumerate() {
        let step = 5 + 10 * index as u8;
        progress.progress(step, &format!("Loading {}", path.display()));
        let mut sheet = excel_read::read_first_sheet(path)?;

        progress.progress(step + 5, &format!("Copying into '{target}'"));
        let source_title = std::mem::take(&mut sheet.title);
        sheet.title = unique_sheet_title(&workbook, target);
        let added = workbook.add_sheet(sheet);
        info!(
            input = %path.display(),
            source = %source_title,
            sheet = %added.title,
            "input sheet copied"
        );
    }
    Ok(workbook)
}

/// Result of a finished run.
#[derive(Debug, Serialize)]
pub struct ConsolidationOutcome {
    pub output: PathBuf,
    pub report: PipelineReport,
}

/// Loads the inputs, runs every pipeline stage and saves the workbook.
pub fn consolidate(
    inputs: &[PathBuf],
    output: &Path,
    progress: &mut dyn ProgressObserver,
) -> Result<ConsolidationOutcome> {
    let workbook = load_consolidated(inputs, progress)?;
    let (workbook, report) = pipeline::run(workbook, progress);

    progress.progress(95, "Saving the consolidated workbook");
    excel_write::write_workbook(output, &workbook)?;
    progress.progress(100, "Done");

    if report.warning_count() > 0 {
        warn!(
            warnings = report.warning_count(),
            skipped = report.skipped_stages().count(),
            "consolidation finished with warnings"
        );
    }
    info!(
        output = %output.display(),
        formulas = report.formula_count(),
        "consolidation finished"
    );
    Ok(ConsolidationOutcome {
        output: output.to_path_buf(),
        report,
    })
}

/// Progress notification sent from the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub percent: u8,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ConsolidationRequest {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
}

/// A consolidation running on a background thread. The worker owns the
/// workbook until [`join`](Self::join) returns.
#[derive(Debug)]
pub struct ConsolidationHandle {
    events: mpsc::Receiver<ProgressEvent>,
    worker: JoinHandle<Result<ConsolidationOutcome>>,
}

impl ConsolidationHandle {
    /// Progress events; the channel closes when the worker finishes.
    pub fn events(&self) -> &mpsc::Receiver<ProgressEvent> {
        &self.events
    }

    /// Waits for the worker. Events not yet read are discarded.
    pub fn join(self) -> Result<ConsolidationOutcome> {
        let ConsolidationHandle { events, worker } = self;
        drop(events);
        worker.join().map_err(|_| UnifyError::WorkerPanicked)?
    }
}

/// Starts [`consolidate`] on a worker thread.
pub fn spawn_consolidation(request: ConsolidationRequest) -> ConsolidationHandle {
    let (tx, rx) = mpsc::channel();
    let worker = thread::spawn(move || {
        let mut notify = |percent: u8, message: &str| {
            tx.send(ProgressEvent {
                percent,
                message: message.to_string(),
            })
            .ok();
        };
        consolidate(&request.inputs, &request.output, &mut notify)
    });
    ConsolidationHandle { events: rx, worker }
}
