//! Run-length encoding of row lists into range tokens for `SUM` arguments.

use crate::model::column_letter;

/// A maximal block of consecutive rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRun {
    pub start: u32,
    pub end: u32,
}

/// Groups sorted, distinct rows into maximal runs of consecutive rows.
///
/// Unsorted input is sorted and deduplicated first, so the result always
/// describes exactly the input set in ascending order.
pub fn collect_runs(rows: &[u32]) -> Vec<RowRun> {
    let mut sorted = rows.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut runs: Vec<RowRun> = Vec::new();
    for row in sorted {
        match runs.last_mut() {
            Some(run) if run.end + 1 == row => run.end = row,
            _ => runs.push(RowRun { start: row, end: row }),
        }
    }
    runs
}

/// Range tokens for one column: `H5:H9` for runs, `H12` for single rows.
pub fn range_tokens(column: u32, rows: &[u32]) -> Vec<String> {
    let letter = column_letter(column);
    collect_runs(rows)
        .into_iter()
        .map(|run| {
            if run.start == run.end {
                format!("{letter}{}", run.start)
            } else {
                format!("{letter}{}:{letter}{}", run.start, run.end)
            }
        })
        .collect()
}

/// Expands tokens produced by [`range_tokens`] back into row numbers.
pub fn expand_tokens(tokens: &[String]) -> Vec<u32> {
    let row_of = |token: &str| -> Option<u32> {
        token
            .trim_start_matches(|ch: char| ch.is_ascii_alphabetic() || ch == '$')
            .parse()
            .ok()
    };
    let mut rows = Vec::new();
    for token in tokens {
        match token.split_once(':') {
            Some((first, last)) => {
                if let (Some(start), Some(end)) = (row_of(first), row_of(last)) {
                    rows.extend(start..=end);
                }
            }
            None => rows.extend(row_of(token)),
        }
    }
    rows
}
