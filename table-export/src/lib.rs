//! CSV export of canonical records.
//!
//! Records of different kinds carry different fields. The output column set
//! is inferred from a prefix of the records ([`ColumnPolicy`]); cells for
//! fields a record lacks are left empty.

pub mod columns;
pub mod reader;
pub mod table;

pub use columns::{ColumnPolicy, DEFAULT_SAMPLE_SIZE};
pub use reader::ExportedTable;
pub use table::{default_output_path, export_csv, RecordTable};
