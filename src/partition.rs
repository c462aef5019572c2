//! Splitting the rows of a dataset into a requested number of groups.
//!
//! Selected columns are first turned into numeric derived columns (label
//! encoding for text, equal-width interval bins for numbers and dates). The
//! rows are then ordered by a sort key and cut into consecutive slices of equal
//! size, the last slice taking the remainder. A split is accepted when the
//! largest and smallest groups differ by at most ten percent.

use crate::dataset::{ColumnKind, Dataset};
use log::debug;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use thiserror::Error;

/// Largest accepted spread between group sizes, in percent of the largest group.
pub const MAX_SIZE_SPREAD_PERCENT: f64 = 10.0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PartitionError {
    #[error("select a file to start partitioning")]
    NoFileSelected,
    #[error("invalid number of groups; enter a different number of partitions")]
    InvalidGroupCount,
    #[error("select columns to start partitioning")]
    NoColumnsSelected,
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("the file contains no rows")]
    EmptyDataset,
}

/// A validated partitioning request.
#[derive(Debug, Clone)]
pub struct PartitionJob {
    columns: Vec<String>,
    num_groups: usize,
}

/// Smallest and largest value of one selected column inside a group.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRange {
    pub column: String,
    pub min: Option<String>,
    pub max: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    /// 1-based group number.
    pub number: usize,
    pub size: usize,
    pub percentage: f64,
    pub ranges: Vec<ColumnRange>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartitionReport {
    /// Human readable progress and result text.
    pub log: String,
    /// Summaries of the non-empty groups.
    pub groups: Vec<GroupSummary>,
    pub balanced: bool,
    /// Group number of every dataset row, in original row order.
    pub assignments: Vec<usize>,
}

struct DerivedColumn {
    name: String,
    values: Vec<Option<f64>>,
}

impl PartitionJob {
    /// Checks a request in the order the user is expected to fill it in:
    /// file, group count, columns.
    pub fn new(file: &str, num_groups: u64, columns: &[String]) -> Result<Self, PartitionError> {
        if file.trim().is_empty() {
            return Err(PartitionError::NoFileSelected);
        }
        let num_groups = usize::try_from(num_groups)
            .ok()
            .filter(|n| *n > 0)
            .ok_or(PartitionError::InvalidGroupCount)?;

        let mut unique: Vec<String> = Vec::with_capacity(columns.len());
        for column in columns {
            if !unique.contains(column) {
                unique.push(column.clone());
            }
        }
        if unique.is_empty() {
            return Err(PartitionError::NoColumnsSelected);
        }

        Ok(PartitionJob {
            columns: unique,
            num_groups,
        })
    }

    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn run(&self, dataset: &Dataset) -> Result<PartitionReport, PartitionError> {
        let selected: Vec<(usize, ColumnKind)> = self
            .columns
            .iter()
            .map(|name| {
                dataset
                    .column_index(name)
                    .map(|idx| (idx, dataset.column_kind(idx)))
                    .ok_or_else(|| PartitionError::UnknownColumn(name.clone()))
            })
            .collect::<Result<_, _>>()?;

        if dataset.row_count() == 0 {
            return Err(PartitionError::EmptyDataset);
        }

        let mut log = String::new();
        let _ = writeln!(log, "Selected columns: [{}]", self.columns.join(", "));
        let _ = writeln!(log, "Number of partitions: {}", self.num_groups);

        let mut derived = Vec::with_capacity(selected.len());
        let mut sort_column: Option<usize> = None;
        for (name, &(idx, kind)) in self.columns.iter().zip(&selected) {
            match kind {
                ColumnKind::Text => {
                    let column = label_encode(dataset, idx, name);
                    let _ = writeln!(
                        log,
                        "Applied label encoding to column '{}', new column '{}' created.",
                        name, column.name
                    );
                    derived.push(column);
                }
                ColumnKind::Numeric | ColumnKind::Date => {
                    if kind == ColumnKind::Numeric && sort_column.is_none() {
                        sort_column = Some(idx);
                    }
                    let values = dataset.numeric_values(idx, kind);
                    derived.push(interval_partition(&values, name, self.num_groups));
                    let _ = writeln!(
                        log,
                        "Uniform partitioning of numeric data done for column '{}'.",
                        name
                    );
                }
            }
        }

        let processed: Vec<&str> = derived.iter().map(|c| c.name.as_str()).collect();
        let _ = writeln!(log);
        let _ = writeln!(log, "List of processed columns: [{}]", processed.join(", "));

        let sort_key = match sort_column {
            Some(idx) => {
                debug!("sorting by numeric column '{}'", dataset.columns[idx]);
                dataset.numeric_values(idx, ColumnKind::Numeric)
            }
            None => {
                debug!("sorting by derived column '{}'", derived[0].name);
                derived[0].values.clone()
            }
        };

        let order = sorted_row_order(&sort_key);
        let total = dataset.row_count();
        let slices = if self.num_groups > total {
            // Every group but the last would be empty.
            debug!(
                "{} groups requested for {} rows, summarising only the last group",
                self.num_groups, total
            );
            vec![(self.num_groups, 0..total)]
        } else {
            split_even(total, self.num_groups)
                .into_iter()
                .enumerate()
                .map(|(i, range)| (i + 1, range))
                .collect()
        };

        let mut assignments = vec![0; total];
        for (number, range) in &slices {
            for &row in &order[range.clone()] {
                assignments[row] = *number;
            }
        }

        let balanced = self.num_groups <= total
            && is_balanced(&slices.iter().map(|(_, r)| r.len()).collect::<Vec<_>>());

        let groups: Vec<GroupSummary> = slices
            .iter()
            .map(|(number, range)| {
                let rows = &order[range.clone()];
                GroupSummary {
                    number: *number,
                    size: rows.len(),
                    percentage: rows.len() as f64 / total as f64 * 100.0,
                    ranges: self
                        .columns
                        .iter()
                        .zip(&selected)
                        .map(|(name, &(idx, kind))| column_range(dataset, rows, idx, kind, name))
                        .collect(),
                }
            })
            .collect();

        if balanced {
            let _ = writeln!(
                log,
                "Partitioning is possible. Final number of groups: {}",
                groups.len()
            );
            for group in &groups {
                let _ = writeln!(log, "{}", format_group(group));
            }
        } else {
            let _ = writeln!(log);
            let _ = writeln!(log, "Partitioning under the given conditions is not possible");
        }

        Ok(PartitionReport {
            log,
            groups,
            balanced,
            assignments,
        })
    }
}

/// Maps the sorted distinct values of a text column to `0..k`.
/// Missing cells form their own class after every present value.
fn label_encode(dataset: &Dataset, col: usize, name: &str) -> DerivedColumn {
    let cells: Vec<Option<&str>> = (0..dataset.row_count())
        .map(|r| dataset.value(r, col))
        .collect();

    let mut classes: BTreeMap<&str, usize> = BTreeMap::new();
    for value in cells.iter().flatten() {
        classes.insert(*value, 0);
    }
    for (code, slot) in classes.values_mut().enumerate() {
        *slot = code;
    }
    let missing_code = classes.len();

    let values = cells
        .iter()
        .map(|cell| {
            let code = match cell {
                Some(v) => classes[v],
                None => missing_code,
            };
            Some(code as f64)
        })
        .collect();

    DerivedColumn {
        name: format!("{}_encoded", name),
        values,
    }
}

/// Assigns each value to one of `bins` equal-width intervals between the
/// column minimum and maximum. The lowest edge is inclusive.
fn interval_partition(values: &[Option<f64>], name: &str, bins: usize) -> DerivedColumn {
    let present = values.iter().flatten().copied();
    let (min, max) = present.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });

    let values = values
        .iter()
        .map(|value| value.map(|v| interval_bin(v, min, max, bins) as f64))
        .collect();

    DerivedColumn {
        name: format!("{}_interval", name),
        values,
    }
}

fn interval_bin(value: f64, min: f64, max: f64, bins: usize) -> usize {
    if max <= min {
        return 0;
    }
    let width = (max - min) / bins as f64;
    let bin = ((value - min) / width).ceil() - 1.0;
    if bin <= 0.0 {
        0
    } else {
        (bin as usize).min(bins - 1)
    }
}

/// Row indices ordered by key, ascending and stable, missing keys last.
fn sorted_row_order(keys: &[Option<f64>]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by(|&a, &b| match (keys[a], keys[b]) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    order
}

/// Consecutive slices of `total / groups` items; the last slice takes the rest.
fn split_even(total: usize, groups: usize) -> Vec<std::ops::Range<usize>> {
    let size = total / groups;
    let mut start = 0;
    (0..groups)
        .map(|i| {
            let end = if i == groups - 1 { total } else { start + size };
            let range = start..end;
            start = end;
            range
        })
        .collect()
}

fn is_balanced(sizes: &[usize]) -> bool {
    let max = sizes.iter().copied().max().unwrap_or(0);
    let min = sizes.iter().copied().min().unwrap_or(0);
    if max == 0 {
        return false;
    }
    (max - min) as f64 / max as f64 * 100.0 <= MAX_SIZE_SPREAD_PERCENT
}

fn column_range(
    dataset: &Dataset,
    rows: &[usize],
    col: usize,
    kind: ColumnKind,
    name: &str,
) -> ColumnRange {
    let present = rows.iter().filter_map(|&r| dataset.value(r, col));

    let (min, max) = match kind {
        ColumnKind::Text => (present.clone().min(), present.max()),
        ColumnKind::Numeric | ColumnKind::Date => {
            let parse = |v: &str| match kind {
                ColumnKind::Numeric => crate::dataset::parse_number(v),
                _ => crate::dataset::parse_timestamp(v),
            };
            let keyed: Vec<(f64, &str)> =
                present.filter_map(|v| parse(v).map(|k| (k, v))).collect();
            (
                keyed.iter().min_by(|a, b| a.0.total_cmp(&b.0)).map(|(_, v)| *v),
                keyed.iter().max_by(|a, b| a.0.total_cmp(&b.0)).map(|(_, v)| *v),
            )
        }
    };

    ColumnRange {
        column: name.to_string(),
        min: min.map(str::to_string),
        max: max.map(str::to_string),
    }
}

fn format_group(group: &GroupSummary) -> String {
    let keys: Vec<String> = group
        .ranges
        .iter()
        .map(|range| {
            format!(
                "{}: ({}, {})",
                range.column,
                range.min.as_deref().unwrap_or("nan"),
                range.max.as_deref().unwrap_or("nan")
            )
        })
        .collect();
    format!(
        "Group {} ({} records, {:.2}%): ({})",
        group.number,
        group.size,
        group.percentage,
        keys.join(" , ")
    )
}
