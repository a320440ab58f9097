//! Label encoding of the categorical claim columns.
//!
//! Codes are the index of the category text in the sorted set of categories
//! seen while fitting, so a fit is a pure function of the training values.

use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::debug;

use crate::error::{ClaimCostError, Result};
use crate::records::{EncodedRow, Feature, FeatureRow, FEATURE_COUNT};

/// What to do with a category that was not seen while fitting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnseenCategoryPolicy {
    /// Abort with `ClaimCostError::UnknownCategory`.
    #[default]
    Fail,
    /// Map to the reserved code one past the last fitted category.
    Reserve,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryEncoding {
    column: String,
    classes: Vec<String>,
}

impl CategoryEncoding {
    pub fn fit<'a, I>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let classes: BTreeSet<&str> = values.into_iter().collect();
        Self {
            column: column.into(),
            classes: classes.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn code(&self, value: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(value))
            .ok()
    }

    /// Code assigned to unseen values under `UnseenCategoryPolicy::Reserve`.
    pub fn reserved_code(&self) -> usize {
        self.classes.len()
    }

    pub fn encode(&self, value: &str, policy: UnseenCategoryPolicy) -> Result<usize> {
        match (self.code(value), policy) {
            (Some(code), _) => Ok(code),
            (None, UnseenCategoryPolicy::Reserve) => Ok(self.reserved_code()),
            (None, UnseenCategoryPolicy::Fail) => Err(ClaimCostError::UnknownCategory {
                column: self.column.clone(),
                value: value.to_string(),
            }),
        }
    }
}

/// One `CategoryEncoding` per categorical feature, fitted on the training rows.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalEncoder {
    encodings: Vec<(Feature, CategoryEncoding)>,
}

impl CategoricalEncoder {
    pub fn fit(rows: &[FeatureRow]) -> Self {
        let encodings = Feature::ALL
            .iter()
            .copied()
            .filter(|f| f.is_categorical())
            .map(|feature| {
                let encoding = CategoryEncoding::fit(
                    feature.name(),
                    rows.iter().filter_map(|row| row.category(feature)),
                );
                debug!(
                    column = feature.name(),
                    classes = ?encoding.classes(),
                    "Fitted category encoding"
                );
                (feature, encoding)
            })
            .collect();
        Self { encodings }
    }

    pub fn encoding(&self, feature: Feature) -> Option<&CategoryEncoding> {
        self.encodings
            .iter()
            .find(|(f, _)| *f == feature)
            .map(|(_, encoding)| encoding)
    }

    pub fn transform(
        &self,
        rows: &[FeatureRow],
        policy: UnseenCategoryPolicy,
    ) -> Result<Vec<EncodedRow>> {
        rows.iter().map(|row| self.transform_row(row, policy)).collect()
    }

    fn transform_row(&self, row: &FeatureRow, policy: UnseenCategoryPolicy) -> Result<EncodedRow> {
        let mut values = [None; FEATURE_COUNT];
        for feature in Feature::ALL {
            values[feature.index()] = match (self.encoding(feature), row.category(feature)) {
                (Some(encoding), Some(text)) => Some(encoding.encode(text, policy)? as f64),
                _ => row.numeric(feature),
            };
        }
        Ok(EncodedRow { values })
    }
}
