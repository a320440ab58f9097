use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use ndarray::Array2;
use tracing::{debug, instrument, warn};

use crate::error::{ClaimCostError, Result};
use crate::records::{
    columns, ClaimRecord, EncodedRow, EngineeredRecord, Feature, FeatureRow, FEATURE_COUNT,
};

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Derives the time and ratio columns of each claim. Holds no state, so train
/// and test tables are engineered independently.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeatureEngineer;

impl FeatureEngineer {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip_all, fields(rows = records.len()))]
    pub fn engineer(&self, records: &[ClaimRecord]) -> Result<Vec<EngineeredRecord>> {
        let engineered = records
            .iter()
            .enumerate()
            .map(|(row, record)| self.engineer_record(row, record))
            .collect::<Result<Vec<_>>>()?;
        debug!("Engineered {} records", engineered.len());
        Ok(engineered)
    }

    pub fn engineer_record(&self, row: usize, record: &ClaimRecord) -> Result<EngineeredRecord> {
        let accident = required_timestamp(
            columns::DATE_TIME_OF_ACCIDENT,
            row,
            record.date_time_of_accident.as_deref(),
        )?;
        let reported =
            required_timestamp(columns::DATE_REPORTED, row, record.date_reported.as_deref())?;

        Ok(EngineeredRecord {
            claim: record.clone(),
            report_delay_days: (reported - accident).num_days(),
            accident_month: accident.month(),
            accident_hour: accident.hour(),
            wage_per_hour: wage_per_hour(record.weekly_wages, record.hours_worked_per_week),
            total_dependents: total_dependents(record.dependent_children, record.dependents_other),
        })
    }

    /// Projects engineered records onto the twelve modeling columns.
    pub fn select_features(&self, records: &[EngineeredRecord]) -> Vec<FeatureRow> {
        records.iter().map(FeatureRow::from).collect()
    }
}

/// Parses a timestamp cell. Values with an offset are normalized to UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    if let Some(dt) = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    {
        return Some(dt);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

fn required_timestamp(column: &str, row: usize, raw: Option<&str>) -> Result<NaiveDateTime> {
    raw.and_then(parse_timestamp)
        .ok_or_else(|| ClaimCostError::InvalidTimestamp {
            column: column.to_string(),
            row,
            value: raw.unwrap_or_default().to_string(),
        })
}

/// Zero hours worked has no defined rate and yields a missing value.
pub fn wage_per_hour(weekly_wages: Option<f64>, hours_worked: Option<f64>) -> Option<f64> {
    match (weekly_wages, hours_worked) {
        (Some(wages), Some(hours)) if hours != 0.0 => Some(wages / hours),
        _ => None,
    }
}

pub fn total_dependents(children: Option<f64>, others: Option<f64>) -> Option<f64> {
    Some(children? + others?)
}

/// Cells filled by `impute_missing_with_zero`, per feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImputationReport {
    pub filled: [usize; FEATURE_COUNT],
}

impl ImputationReport {
    pub fn total(&self) -> usize {
        self.filled.iter().sum()
    }

    pub fn filled_for(&self, feature: Feature) -> usize {
        self.filled[feature.index()]
    }
}

/// Replaces every missing value with zero and densifies the rows.
///
/// Zero is not neutral for every column: an imputed wage-per-hour cannot be
/// told apart from a true zero wage. Each affected feature is logged.
pub fn impute_missing_with_zero(rows: &[EncodedRow]) -> (Array2<f64>, ImputationReport) {
    let mut report = ImputationReport::default();
    let mut matrix = Array2::<f64>::zeros((rows.len(), FEATURE_COUNT));

    for (i, row) in rows.iter().enumerate() {
        for (j, value) in row.values.iter().enumerate() {
            match value {
                Some(v) => matrix[[i, j]] = *v,
                None => report.filled[j] += 1,
            }
        }
    }

    for feature in Feature::ALL {
        let filled = report.filled_for(feature);
        if filled > 0 {
            warn!(
                feature = feature.name(),
                filled,
                rows = rows.len(),
                "Imputed missing values with zero"
            );
        }
    }
    (matrix, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{CategoricalEncoder, UnseenCategoryPolicy};
    use approx::assert_relative_eq;

    fn claim(accident: &str, reported: &str) -> ClaimRecord {
        ClaimRecord {
            date_time_of_accident: Some(accident.to_string()),
            date_reported: Some(reported.to_string()),
            age: Some(30.0),
            gender: Some("M".to_string()),
            marital_status: Some("S".to_string()),
            dependent_children: Some(1.0),
            dependents_other: Some(2.0),
            weekly_wages: Some(600.0),
            part_time_full_time: Some("F".to_string()),
            hours_worked_per_week: Some(40.0),
            days_worked_per_week: Some(5.0),
            ultimate_cost: None,
        }
    }

    #[test]
    fn test_time_features() {
        let engineer = FeatureEngineer::new();
        let record = engineer
            .engineer_record(0, &claim("2002-04-09T07:00:00Z", "2002-07-05T00:00:00Z"))
            .unwrap();
        assert_eq!(record.report_delay_days, 86);
        assert_eq!(record.accident_month, 4);
        assert_eq!(record.accident_hour, 7);
        assert_eq!(record.wage_per_hour, Some(15.0));
        assert_eq!(record.total_dependents, Some(3.0));
    }

    #[test]
    fn test_partial_day_truncated() {
        let engineer = FeatureEngineer::new();
        let record = engineer
            .engineer_record(0, &claim("2005-01-01 23:00:00", "2005-01-03 22:59:59"))
            .unwrap();
        assert_eq!(record.report_delay_days, 1);
    }

    #[test]
    fn test_out_of_order_timestamps_negative() {
        let engineer = FeatureEngineer::new();
        let record = engineer
            .engineer_record(0, &claim("2005-03-10", "2005-03-01"))
            .unwrap();
        assert_eq!(record.report_delay_days, -9);
    }

    #[test]
    fn test_offset_normalized_to_utc() {
        let dt = parse_timestamp("2002-04-09T23:30:00-02:00").unwrap();
        assert_eq!(dt.day(), 10);
        assert_eq!(dt.hour(), 1);
    }

    #[test]
    fn test_malformed_timestamp_fails() {
        let engineer = FeatureEngineer::new();
        let records = vec![
            claim("2002-04-09T07:00:00Z", "2002-07-05T00:00:00Z"),
            claim("09/04/2002", "2002-07-05T00:00:00Z"),
        ];
        let err = engineer.engineer(&records).unwrap_err();
        assert!(matches!(
            err,
            ClaimCostError::InvalidTimestamp { row: 1, ref value, .. } if value == "09/04/2002"
        ));
    }

    #[test]
    fn test_missing_timestamp_fails() {
        let engineer = FeatureEngineer::new();
        let mut record = claim("2002-04-09", "2002-07-05");
        record.date_reported = None;
        assert!(engineer.engineer_record(3, &record).is_err());
    }

    #[test]
    fn test_wage_per_hour() {
        assert_eq!(wage_per_hour(Some(600.0), Some(40.0)), Some(15.0));
        assert_eq!(wage_per_hour(Some(600.0), Some(0.0)), None);
        assert_eq!(wage_per_hour(Some(0.0), Some(0.0)), None);
        assert_eq!(wage_per_hour(None, Some(40.0)), None);
        assert_relative_eq!(wage_per_hour(Some(500.0), Some(38.0)).unwrap(), 500.0 / 38.0);
    }

    #[test]
    fn test_total_dependents() {
        assert_eq!(total_dependents(Some(2.0), Some(1.0)), Some(3.0));
        assert_eq!(total_dependents(None, Some(1.0)), None);
        assert_eq!(total_dependents(Some(0.0), None), None);
    }

    #[test]
    fn test_imputed_wage_per_hour() {
        let engineer = FeatureEngineer::new();
        let mut first = claim("2010-01-01", "2010-01-05");
        first.age = Some(30.0);
        let mut second = claim("2010-01-01", "2010-01-05");
        second.age = Some(45.0);
        second.weekly_wages = Some(0.0);
        second.hours_worked_per_week = Some(0.0);

        let engineered = engineer.engineer(&[first, second]).unwrap();
        let rows = engineer.select_features(&engineered);
        let encoder = CategoricalEncoder::fit(&rows);
        let encoded = encoder.transform(&rows, UnseenCategoryPolicy::Fail).unwrap();
        let (matrix, report) = impute_missing_with_zero(&encoded);

        let wph = Feature::WagePerHour.index();
        assert_eq!(matrix[[0, wph]], 15.0);
        assert_eq!(matrix[[1, wph]], 0.0);
        assert_eq!(matrix[[1, Feature::Age.index()]], 45.0);
        assert_eq!(report.filled_for(Feature::WagePerHour), 1);
        assert_eq!(report.total(), 1);
    }

    #[test]
    fn test_impute_empty() {
        let (matrix, report) = impute_missing_with_zero(&[]);
        assert_eq!(matrix.dim(), (0, FEATURE_COUNT));
        assert_eq!(report.total(), 0);
    }
}
