//! Typed rows flowing between pipeline stages.
//!
//! `ClaimRecord` → `EngineeredRecord` → `FeatureRow` → `EncodedRow`, after
//! which rows are imputed into a dense feature matrix.

use std::fmt;

/// Source column names of the claims tables.
pub mod columns {
    pub const DATE_TIME_OF_ACCIDENT: &str = "DateTimeOfAccident";
    pub const DATE_REPORTED: &str = "DateReported";
    pub const AGE: &str = "Age";
    pub const GENDER: &str = "Gender";
    pub const MARITAL_STATUS: &str = "MaritalStatus";
    pub const DEPENDENT_CHILDREN: &str = "DependentChildren";
    pub const DEPENDENTS_OTHER: &str = "DependentsOther";
    pub const WEEKLY_WAGES: &str = "WeeklyWages";
    pub const PART_TIME_FULL_TIME: &str = "PartTimeFullTime";
    pub const HOURS_WORKED_PER_WEEK: &str = "HoursWorkedPerWeek";
    pub const DAYS_WORKED_PER_WEEK: &str = "DaysWorkedPerWeek";
}

/// One raw row of the training or test table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaimRecord {
    pub date_time_of_accident: Option<String>,
    pub date_reported: Option<String>,
    pub age: Option<f64>,
    pub gender: Option<String>,
    pub marital_status: Option<String>,
    pub dependent_children: Option<f64>,
    pub dependents_other: Option<f64>,
    pub weekly_wages: Option<f64>,
    pub part_time_full_time: Option<String>,
    pub hours_worked_per_week: Option<f64>,
    pub days_worked_per_week: Option<f64>,
    /// Ultimate incurred claim cost; only present in the training table.
    pub ultimate_cost: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineeredRecord {
    pub claim: ClaimRecord,
    /// Whole days between accident and report, negative when out of order.
    pub report_delay_days: i64,
    pub accident_month: u32,
    pub accident_hour: u32,
    pub wage_per_hour: Option<f64>,
    pub total_dependents: Option<f64>,
}

/// The twelve modeling columns, in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Age,
    WeeklyWages,
    HoursWorkedPerWeek,
    DaysWorkedPerWeek,
    ReportDelay,
    AccidentMonth,
    AccidentHour,
    WagePerHour,
    TotalDependents,
    Gender,
    MaritalStatus,
    PartTimeFullTime,
}

pub const FEATURE_COUNT: usize = 12;

impl Feature {
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::Age,
        Feature::WeeklyWages,
        Feature::HoursWorkedPerWeek,
        Feature::DaysWorkedPerWeek,
        Feature::ReportDelay,
        Feature::AccidentMonth,
        Feature::AccidentHour,
        Feature::WagePerHour,
        Feature::TotalDependents,
        Feature::Gender,
        Feature::MaritalStatus,
        Feature::PartTimeFullTime,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::Age => columns::AGE,
            Feature::WeeklyWages => columns::WEEKLY_WAGES,
            Feature::HoursWorkedPerWeek => columns::HOURS_WORKED_PER_WEEK,
            Feature::DaysWorkedPerWeek => columns::DAYS_WORKED_PER_WEEK,
            Feature::ReportDelay => "ReportDelay",
            Feature::AccidentMonth => "AccidentMonth",
            Feature::AccidentHour => "AccidentHour",
            Feature::WagePerHour => "WagePerHour",
            Feature::TotalDependents => "TotalDependents",
            Feature::Gender => columns::GENDER,
            Feature::MaritalStatus => columns::MARITAL_STATUS,
            Feature::PartTimeFullTime => columns::PART_TIME_FULL_TIME,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_categorical(self) -> bool {
        matches!(
            self,
            Feature::Gender | Feature::MaritalStatus | Feature::PartTimeFullTime
        )
    }

    /// Column indices of the label-encoded features.
    pub fn categorical_indices() -> Vec<usize> {
        Self::ALL
            .iter()
            .filter(|f| f.is_categorical())
            .map(|f| f.index())
            .collect()
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An engineered record projected onto the modeling columns, categories still
/// as text.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub age: Option<f64>,
    pub weekly_wages: Option<f64>,
    pub hours_worked_per_week: Option<f64>,
    pub days_worked_per_week: Option<f64>,
    pub report_delay: Option<f64>,
    pub accident_month: Option<f64>,
    pub accident_hour: Option<f64>,
    pub wage_per_hour: Option<f64>,
    pub total_dependents: Option<f64>,
    pub gender: String,
    pub marital_status: String,
    pub part_time_full_time: String,
}

impl FeatureRow {
    /// Category text for a categorical feature. A missing cell is the empty
    /// string.
    pub fn category(&self, feature: Feature) -> Option<&str> {
        match feature {
            Feature::Gender => Some(&self.gender),
            Feature::MaritalStatus => Some(&self.marital_status),
            Feature::PartTimeFullTime => Some(&self.part_time_full_time),
            _ => None,
        }
    }

    /// Value of a numeric feature; `None` for missing values and for
    /// categorical features.
    pub fn numeric(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Age => self.age,
            Feature::WeeklyWages => self.weekly_wages,
            Feature::HoursWorkedPerWeek => self.hours_worked_per_week,
            Feature::DaysWorkedPerWeek => self.days_worked_per_week,
            Feature::ReportDelay => self.report_delay,
            Feature::AccidentMonth => self.accident_month,
            Feature::AccidentHour => self.accident_hour,
            Feature::WagePerHour => self.wage_per_hour,
            Feature::TotalDependents => self.total_dependents,
            Feature::Gender | Feature::MaritalStatus | Feature::PartTimeFullTime => None,
        }
    }
}

impl From<&EngineeredRecord> for FeatureRow {
    fn from(record: &EngineeredRecord) -> Self {
        let claim = &record.claim;
        Self {
            age: claim.age,
            weekly_wages: claim.weekly_wages,
            hours_worked_per_week: claim.hours_worked_per_week,
            days_worked_per_week: claim.days_worked_per_week,
            report_delay: Some(record.report_delay_days as f64),
            accident_month: Some(f64::from(record.accident_month)),
            accident_hour: Some(f64::from(record.accident_hour)),
            wage_per_hour: record.wage_per_hour,
            total_dependents: record.total_dependents,
            gender: claim.gender.clone().unwrap_or_default(),
            marital_status: claim.marital_status.clone().unwrap_or_default(),
            part_time_full_time: claim.part_time_full_time.clone().unwrap_or_default(),
        }
    }
}

/// A fully numeric row in `Feature::ALL` order. Missing values stay `None`
/// until imputation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodedRow {
    pub values: [Option<f64>; FEATURE_COUNT],
}

impl EncodedRow {
    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.values[feature.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_order_matches_index() {
        for (i, feature) in Feature::ALL.iter().enumerate() {
            assert_eq!(feature.index(), i);
        }
        assert_eq!(Feature::categorical_indices(), vec![9, 10, 11]);
    }

    #[test]
    fn test_feature_row_from_engineered() {
        let record = EngineeredRecord {
            claim: ClaimRecord {
                age: Some(30.0),
                gender: Some("M".to_string()),
                ..Default::default()
            },
            report_delay_days: -3,
            accident_month: 4,
            accident_hour: 7,
            wage_per_hour: None,
            total_dependents: Some(2.0),
        };
        let row = FeatureRow::from(&record);
        assert_eq!(row.numeric(Feature::Age), Some(30.0));
        assert_eq!(row.numeric(Feature::ReportDelay), Some(-3.0));
        assert_eq!(row.numeric(Feature::WagePerHour), None);
        assert_eq!(row.category(Feature::Gender), Some("M"));
        assert_eq!(row.category(Feature::MaritalStatus), Some(""));
        assert_eq!(row.numeric(Feature::Gender), None);
    }
}
