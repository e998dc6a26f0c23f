//! Cross-sheet code index: detects input codes shared by several price banks.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::layout::abc;
use crate::model::Sheet;
use crate::text::code_key;

/// How a consuming row should look its unit price up in the ABC curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStrategy {
    /// Match the code column directly.
    ByCode,
    /// Match the description column; used when the code is ambiguous.
    ByDescription,
}

/// Codes that appear on several ABC rows with different banks.
///
/// Computed once from the ABC sheet before any stage consumes it and never
/// refreshed, even when later stages delete rows of that sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmbiguousCodes {
    codes: BTreeSet<String>,
}

impl AmbiguousCodes {
    /// Scans every row from row 2 onward, keeping the first bank seen for
    /// each code and flagging the code once a different bank shows up.
    pub fn scan(sheet: &Sheet) -> Self {
        let mut first_bank: HashMap<String, String> = HashMap::new();
        let mut codes = BTreeSet::new();

        for row in abc::FIRST_DATA_SCAN_ROW..=sheet.max_row() {
            let code = code_key(sheet.value(row, abc::CODE_COLUMN));
            if code.is_empty() {
                continue;
            }
            let bank = sheet.text(row, abc::BANK_COLUMN);
            match first_bank.get(&code) {
                Some(seen) if *seen != bank => {
                    codes.insert(code);
                }
                Some(_) => {}
                None => {
                    first_bank.insert(code, bank);
                }
            }
        }

        debug!(ambiguous = codes.len(), "scanned ABC codes");
        Self { codes }
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }

    pub fn strategy_for(&self, code: &str) -> LookupStrategy {
        if self.contains(code) {
            LookupStrategy::ByDescription
        } else {
            LookupStrategy::ByCode
        }
    }
}
