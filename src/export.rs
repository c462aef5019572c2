use crate::dataset::Dataset;
use crate::partition::PartitionReport;
use std::io::Write;

pub const GROUP_COLUMN: &str = "Group Number";

/// Writes the dataset as CSV with an extra `Group Number` column holding each
/// row's 1-based group.
pub fn write_csv<W: Write>(
    dataset: &Dataset,
    report: &PartitionReport,
    out: W,
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);

    let mut header: Vec<&str> = dataset.columns.iter().map(String::as_str).collect();
    header.push(GROUP_COLUMN);
    writer.write_record(&header)?;

    for (row, group) in dataset.rows.iter().zip(&report.assignments) {
        let group = group.to_string();
        writer.write_record(row.iter().map(String::as_str).chain([group.as_str()]))?;
    }

    writer.flush()?;
    Ok(())
}

pub fn to_csv(dataset: &Dataset, report: &PartitionReport) -> Result<String, csv::Error> {
    let mut buffer = Vec::new();
    write_csv(dataset, report, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
