use polars::prelude::*;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{ClaimCostError, Result};
use crate::records::{columns, ClaimRecord};

/// The three input tables of a run, every column held as text.
#[derive(Debug, Clone)]
pub struct InputTables {
    pub train: DataFrame,
    pub test: DataFrame,
    pub submission: DataFrame,
}

/// DataLoader reads the claims CSV files and extracts typed records from them
pub struct DataLoader {
    target_column: String,
}

impl DataLoader {
    pub fn new(target_column: impl Into<String>) -> Self {
        Self {
            target_column: target_column.into(),
        }
    }

    /// Reads a CSV file with a header row. Every column is read as text so
    /// headers, column order and cell contents survive unchanged.
    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
        let path = path.as_ref();
        debug!("Reading CSV from {}", path.display());
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;
        debug!(shape = ?df.shape(), "Read {}", path.display());
        Ok(df)
    }

    pub fn load_tables<P: AsRef<Path>>(&self, train: P, test: P, submission: P) -> Result<InputTables> {
        let tables = InputTables {
            train: Self::read_csv(train)?,
            test: Self::read_csv(test)?,
            submission: Self::read_csv(submission)?,
        };
        info!(
            train_rows = tables.train.height(),
            test_rows = tables.test.height(),
            submission_rows = tables.submission.height(),
            "Loaded input tables"
        );
        Ok(tables)
    }

    /// Extracts training records; every row must carry a target value.
    pub fn training_records(&self, df: &DataFrame) -> Result<Vec<ClaimRecord>> {
        let mut records = extract_records(df)?;
        let targets = numeric_column(df, &self.target_column)?;
        for (row, (record, target)) in records.iter_mut().zip(targets).enumerate() {
            match target {
                Some(value) => record.ultimate_cost = Some(value),
                None => {
                    return Err(ClaimCostError::MissingTarget {
                        column: self.target_column.clone(),
                        row,
                    })
                }
            }
        }
        Ok(records)
    }

    pub fn test_records(&self, df: &DataFrame) -> Result<Vec<ClaimRecord>> {
        extract_records(df)
    }
}

fn extract_records(df: &DataFrame) -> Result<Vec<ClaimRecord>> {
    let accident = text_column(df, columns::DATE_TIME_OF_ACCIDENT)?;
    let reported = text_column(df, columns::DATE_REPORTED)?;
    let age = numeric_column(df, columns::AGE)?;
    let gender = text_column(df, columns::GENDER)?;
    let marital = text_column(df, columns::MARITAL_STATUS)?;
    let children = numeric_column(df, columns::DEPENDENT_CHILDREN)?;
    let others = numeric_column(df, columns::DEPENDENTS_OTHER)?;
    let wages = numeric_column(df, columns::WEEKLY_WAGES)?;
    let employment = text_column(df, columns::PART_TIME_FULL_TIME)?;
    let hours = numeric_column(df, columns::HOURS_WORKED_PER_WEEK)?;
    let days = numeric_column(df, columns::DAYS_WORKED_PER_WEEK)?;

    let records = (0..df.height())
        .map(|i| ClaimRecord {
            date_time_of_accident: accident[i].clone(),
            date_reported: reported[i].clone(),
            age: age[i],
            gender: gender[i].clone(),
            marital_status: marital[i].clone(),
            dependent_children: children[i],
            dependents_other: others[i],
            weekly_wages: wages[i],
            part_time_full_time: employment[i].clone(),
            hours_worked_per_week: hours[i],
            days_worked_per_week: days[i],
            ultimate_cost: None,
        })
        .collect();
    Ok(records)
}

fn text_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| ClaimCostError::MissingColumn(name.to_string()))?;
    let values = column
        .cast(&DataType::String)?
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect();
    Ok(values)
}

fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    text_column(df, name)?
        .into_iter()
        .enumerate()
        .map(|(row, value)| match value {
            Some(text) => parse_number(&text).ok_or_else(|| ClaimCostError::InvalidNumber {
                column: name.to_string(),
                row,
                value: text,
            }),
            None => Ok(None),
        })
        .collect()
}

/// Empty and `NaN` cells are missing. Unparsable and infinite values are
/// rejected with `None`.
fn parse_number(text: &str) -> Option<Option<f64>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(None);
    }
    let value: f64 = trimmed.parse().ok()?;
    match value {
        v if v.is_nan() => Some(None),
        v if v.is_infinite() => None,
        v => Some(Some(v)),
    }
}
