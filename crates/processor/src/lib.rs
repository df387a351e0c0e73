//! # processor
//!
//! The Get/Test/Apply engine: binds normalized configuration units to
//! resolved resource providers and drives them with invocation discipline.
//!
//! - [`UnitProcessor`] enforces intent gating and limit-mode invocation
//!   counts per unit, and translates provider failures into result records
//!   instead of propagating them, so a multi-unit run continues past one
//!   unit's failure.
//! - [`SetRun`] coordinates a whole configuration set: resolving and
//!   installing providers, testing asserts before applying, and guarding
//!   against concurrent high-level operations with a fail-fast busy flag.
//! - [`DiagnosticsSink`] and [`ProgressSink`] expose the engine's event
//!   surface without binding it to any UI.

#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod invoke;
pub mod results;
pub mod set;
pub mod unit;

pub use error::{Error, Result};
pub use events::{
    DiagnosticLevel, DiagnosticsSink, LogSink, NullSink, ProgressSink, ProgressUpdate,
};
pub use invoke::{InvokeError, ResourceProvider};
pub use results::{
    ApplyResult, GetResult, ResultInformation, ResultSource, TestOutcome, TestResult,
};
pub use set::{SetApplyResult, SetGetResult, SetRun, SetTestResult, UnitDetails};
pub use unit::UnitProcessor;
