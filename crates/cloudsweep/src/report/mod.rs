//! Report sinks
//!
//! - table: comfy-table rendering for the console
//! - writer: JSON and CSV report files

pub mod table;
pub mod writer;

pub use table::print_report;
pub use writer::{WrittenReport, report_json, write_report_files};
