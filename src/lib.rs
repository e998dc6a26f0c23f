//! Core library for the budget-unifier command line application.
//!
//! Three exported budget workbooks (unit-price compositions, the ABC curve of
//! inputs and the synthetic budget) are merged into one workbook whose cells
//! are then rewritten into live formulas. Reading and writing live under
//! [`io`], the in-memory grid under [`model`], the ordered formula stages
//! under [`pipeline`] and [`stages`], and the end-to-end orchestration,
//! including the background worker, under [`consolidate`].

pub mod codes;
pub mod color;
pub mod consolidate;
pub mod error;
pub mod formula;
pub mod hierarchy;
pub mod io;
pub mod layout;
pub mod model;
pub mod pipeline;
pub mod ranges;
pub mod stages;
pub mod text;

pub use error::{Result, UnifyError};
