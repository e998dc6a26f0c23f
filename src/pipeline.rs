//! Ordered stage runner over the consolidated workbook.
//!
//! Stages share one mutable [`StageContext`] and run strictly in the order of
//! [`STAGES`]; each one relies on the structural edits left by the stages
//! before it. A stage never aborts the run: errors and panics raised inside it
//! are recorded on its [`StageReport`] and the next stage starts.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use serde::Serialize;
use tracing::{info, warn};

use crate::codes::AmbiguousCodes;
use crate::error::Result;
use crate::layout::{abc, compositions, synthetic};
use crate::model::{Sheet, Workbook};
use crate::stages;

/// Which of the three template sheets a stage works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetRole {
    Compositions,
    Abc,
    Synthetic,
}

impl fmt::Display for SheetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetRole::Compositions => f.write_str("compositions"),
            SheetRole::Abc => f.write_str("ABC curve"),
            SheetRole::Synthetic => f.write_str("synthetic budget"),
        }
    }
}

/// Sheet indices bound to each role, resolved once before the first stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SheetRoles {
    pub compositions: Option<usize>,
    pub abc: Option<usize>,
    pub synthetic: Option<usize>,
}

impl SheetRoles {
    /// Binds roles by title fragment. The compositions role falls back to
    /// the first sheet when no title matches.
    pub fn resolve(workbook: &Workbook) -> Self {
        let compositions = workbook
            .position(|title| {
                compositions::TITLE_FRAGMENTS
                    .iter()
                    .any(|fragment| title.contains(fragment))
            })
            .or_else(|| (!workbook.sheets().is_empty()).then_some(0));
        let roles = Self {
            compositions,
            abc: workbook.position(|title| title.contains(abc::TITLE_FRAGMENT)),
            synthetic: workbook.position(|title| title.contains(synthetic::TITLE_FRAGMENT)),
        };

        for role in [SheetRole::Compositions, SheetRole::Abc, SheetRole::Synthetic] {
            if roles.index(role).is_none() {
                warn!(%role, "no sheet bound to role");
            }
        }
        roles
    }

    pub fn index(&self, role: SheetRole) -> Option<usize> {
        match role {
            SheetRole::Compositions => self.compositions,
            SheetRole::Abc => self.abc,
            SheetRole::Synthetic => self.synthetic,
        }
    }
}

/// Mutable state threaded through every stage.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub workbook: Workbook,
    pub roles: SheetRoles,
    /// Filled by the ambiguity scan; empty before it runs.
    pub ambiguous: AmbiguousCodes,
}

impl StageContext {
    pub fn new(workbook: Workbook) -> Self {
        let roles = SheetRoles::resolve(&workbook);
        Self {
            workbook,
            roles,
            ambiguous: AmbiguousCodes::default(),
        }
    }

    pub fn sheet(&self, role: SheetRole) -> Option<&Sheet> {
        self.roles
            .index(role)
            .and_then(|index| self.workbook.sheet(index))
    }

    pub fn sheet_mut(&mut self, role: SheetRole) -> Option<&mut Sheet> {
        let index = self.roles.index(role)?;
        self.workbook.sheet_mut(index)
    }

    pub fn title(&self, role: SheetRole) -> Option<String> {
        self.sheet(role).map(|sheet| sheet.title.clone())
    }

    pub fn into_workbook(self) -> Workbook {
        self.workbook
    }
}

/// One recorded fault. `row` is set for row-level faults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageWarning {
    pub row: Option<u32>,
    pub message: String,
}

/// Outcome of a single stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub name: String,
    pub percent: u8,
    pub message: String,
    pub skipped: bool,
    pub formulas: usize,
    pub warnings: Vec<StageWarning>,
}

impl StageReport {
    pub fn new(name: impl Into<String>, percent: u8, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            percent,
            message: message.into(),
            skipped: false,
            formulas: 0,
            warnings: Vec::new(),
        }
    }

    /// Marks the stage as skipped because a precondition is missing.
    pub fn skip(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(stage = %self.name, %reason, "stage skipped");
        self.skipped = true;
        self.warnings.push(StageWarning {
            row: None,
            message: reason,
        });
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(stage = %self.name, %message);
        self.warnings.push(StageWarning { row: None, message });
    }

    pub fn warn_row(&mut self, row: u32, message: impl fmt::Display) {
        let message = message.to_string();
        warn!(stage = %self.name, row, %message, "row skipped");
        self.warnings.push(StageWarning {
            row: Some(row),
            message,
        });
    }

    pub fn count_formulas(&mut self, amount: usize) {
        self.formulas += amount;
    }
}

/// Full record of a pipeline run, serialisable for `--report`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub ambiguous_codes: Vec<String>,
    pub stages: Vec<StageReport>,
}

impl PipelineReport {
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|stage| stage.name == name)
    }

    pub fn formula_count(&self) -> usize {
        self.stages.iter().map(|stage| stage.formulas).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.stages.iter().map(|stage| stage.warnings.len()).sum()
    }

    pub fn skipped_stages(&self) -> impl Iterator<Item = &StageReport> {
        self.stages.iter().filter(|stage| stage.skipped)
    }
}

/// Receives `(percent, message)` after each completed step.
pub trait ProgressObserver {
    fn progress(&mut self, percent: u8, message: &str);
}

impl<F> ProgressObserver for F
where
    F: FnMut(u8, &str),
{
    fn progress(&mut self, percent: u8, message: &str) {
        self(percent, message)
    }
}

/// Observer that discards every notification.
pub struct Silent;

impl ProgressObserver for Silent {
    fn progress(&mut self, _percent: u8, _message: &str) {}
}

pub type StageFn = fn(&mut StageContext, &mut StageReport) -> Result<()>;

/// A named, ordered pipeline step.
#[derive(Clone, Copy)]
pub struct Stage {
    pub name: &'static str,
    pub percent: u8,
    pub message: &'static str,
    pub run: StageFn,
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("percent", &self.percent)
            .finish()
    }
}

impl Stage {
    /// Runs the stage, turning errors and panics into warnings.
    pub fn execute(&self, context: &mut StageContext) -> StageReport {
        let mut report = StageReport::new(self.name, self.percent, self.message);
        info!(stage = self.name, "running stage");

        let outcome = catch_unwind(AssertUnwindSafe(|| (self.run)(context, &mut report)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(error)) => report.warn(format!("stage failed: {error}")),
            Err(payload) => {
                let detail = payload
                    .downcast_ref::<&str>()
                    .map(|text| text.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                report.warn(format!("stage panicked: {detail}"));
            }
        }

        info!(
            stage = self.name,
            formulas = report.formulas,
            warnings = report.warnings.len(),
            skipped = report.skipped,
            "stage finished"
        );
        report
    }
}

macro_rules! stage {
    ($name:literal, $percent:literal, $message:literal, $run:path) => {
        Stage {
            name: $name,
            percent: $percent,
            message: $message,
            run: $run,
        }
    };
}

/// Every stage in execution order.
pub static STAGES: [Stage; 26] = [
    stage!("unmerge_all", 40, "Unmerging cells", stages::unmerge_all),
    stage!("abc_prepare", 45, "Preparing the ABC curve", stages::abc::prepare),
    stage!("abc_item_formulas", 47, "Pricing ABC items", stages::abc::item_formulas),
    stage!("abc_totals", 49, "Totalling the ABC curve", stages::abc::totals),
    stage!("abc_share_total", 51, "Closing the ABC curve", stages::abc::share_total),
    stage!("compositions_prepare", 53, "Preparing compositions", stages::compositions::prepare),
    stage!("compositions_clear_footers", 55, "Clearing composition footers", stages::compositions::clear_footers),
    stage!("compositions_costs", 57, "Costing compositions", stages::compositions::costs),
    stage!("compositions_auxiliary_links", 59, "Linking auxiliary compositions", stages::compositions::auxiliary_links),
    stage!("abc_ambiguity_scan", 60, "Scanning ambiguous codes", stages::abc::scan_ambiguity),
    stage!("compositions_input_lookups", 62, "Looking up input prices", stages::compositions::input_lookups),
    stage!("compositions_clear_empty", 64, "Clearing empty compositions", stages::compositions::clear_empty),
    stage!("compositions_bands", 66, "Formatting composition bands", stages::compositions::bands),
    stage!("synthetic_prepare", 68, "Preparing the synthetic budget", stages::synthetic::prepare),
    stage!("synthetic_line_totals", 70, "Totalling budget lines", stages::synthetic::line_totals),
    stage!("synthetic_price_lookups", 72, "Looking up budget prices", stages::synthetic::price_lookups),
    stage!("synthetic_hierarchy", 74, "Aggregating the outline", stages::synthetic::aggregate_hierarchy),
    stage!("synthetic_grand_totals", 76, "Writing grand totals", stages::synthetic::grand_totals),
    stage!("synthetic_weights", 78, "Computing weights", stages::synthetic::weights),
    stage!("synthetic_level_one_totals", 80, "Totalling top-level items", stages::synthetic::level_one_totals),
    stage!("synthetic_borders", 82, "Formatting the synthetic budget", stages::synthetic::borders),
    stage!("synthetic_merges", 84, "Merging synthetic headers", stages::synthetic::merges),
    stage!("abc_links", 86, "Linking the ABC curve", stages::finishing::abc_links),
    stage!("header_bands", 88, "Recoloring header bands", stages::finishing::header_bands),
    stage!("final_headers", 90, "Finalizing headers", stages::finishing::final_headers),
    stage!("hierarchy_codes", 92, "Normalizing hierarchy codes", stages::finishing::hierarchy_codes),
];

/// Looks a stage up by name.
pub fn stage(name: &str) -> Option<&'static Stage> {
    STAGES.iter().find(|stage| stage.name == name)
}

/// Runs every stage over `workbook`, notifying `progress` after each one.
pub fn run(workbook: Workbook, progress: &mut dyn ProgressObserver) -> (Workbook, PipelineReport) {
    let mut context = StageContext::new(workbook);
    let mut report = PipelineReport::default();

    for stage in &STAGES {
        let stage_report = stage.execute(&mut context);
        progress.progress(stage.percent, stage.message);
        report.stages.push(stage_report);
    }

    report.ambiguous_codes = context.ambiguous.iter().map(str::to_string).collect();
    (context.into_workbook(), report)
}
