// ============================================================================
// EXPORT - Write a month of reflections as CSV
// ============================================================================

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::calendar::month_bounds;
use crate::models::{Framework, ReflectionRecord, find_framework, framework_label};

/// One row per filled field: date, framework, field label, value.
pub fn write_csv<W: Write>(
    writer: W,
    records: &[&ReflectionRecord],
    frameworks: &[Framework],
) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["date", "framework", "field", "value"])?;

    let mut rows = 0;
    for record in records {
        let framework = find_framework(frameworks, &record.framework_id);
        let label = framework_label(frameworks, &record.framework_id);
        for (field, value) in record.ordered_content(framework) {
            if value.trim().is_empty() {
                continue;
            }
            wtr.write_record([record.date.as_str(), label.as_str(), field.as_str(), value.as_str()])?;
            rows += 1;
        }
    }
    wtr.flush()?;
    Ok(rows)
}

/// Export the given month to `<dir>/reflections-YYYY-MM.csv`.
pub fn export_month(
    dir: &Path,
    year: i32,
    month: u32,
    records: &[ReflectionRecord],
    frameworks: &[Framework],
) -> Result<PathBuf> {
    let (first, last) = month_bounds(year, month)
        .ok_or_else(|| anyhow::anyhow!("Invalid month {year}-{month}"))?;
    let mut selected: Vec<&ReflectionRecord> = records
        .iter()
        .filter(|r| r.parsed_date().is_some_and(|d| d >= first && d <= last))
        .collect();
    selected.sort_by(|a, b| a.date.cmp(&b.date).then(a.created_at.cmp(&b.created_at)));

    fs::create_dir_all(dir).with_context(|| format!("Failed to create export directory: {:?}", dir))?;
    let path = dir.join(format!("reflections-{year:04}-{month:02}.csv"));
    let file = fs::File::create(&path).with_context(|| format!("Failed to create {:?}", path))?;
    let rows = write_csv(file, &selected, frameworks)?;
    info!("Exported {} rows to {:?}", rows, path);
    Ok(path)
}
