//! Policy set emitters
//!
//! - **sql**: MySQL/MariaDB script for the `peaauth` database
//! - **json**: JSON lines, one record per line

pub mod json;
pub mod sql;

use crate::engine::{GenerationResult, PolicySet};
use crate::types::OutputFormat;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::debug;

// Re-export all public types for convenience
pub use json::write_json_lines;
pub use sql::{sql_literal, write_sql};

/// Write a policy set in the given format
pub fn write_policy_set<W: Write>(set: &PolicySet, format: OutputFormat, out: &mut W) -> io::Result<()> {
    match format {
        OutputFormat::Sql => write_sql(set, out),
        OutputFormat::Json => write_json_lines(set, out),
    }
}

/// Write a policy set to a file, replacing any existing content
pub fn write_policy_file<P: AsRef<Path>>(
    set: &PolicySet,
    format: OutputFormat,
    path: P,
) -> GenerationResult<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    write_policy_set(set, format, &mut writer)?;
    writer.flush()?;
    debug!(path = %path.display(), rules = set.rules.len(), format = %format, "Wrote policy set");
    Ok(())
}
