//! PII classification and masking
//!
//! Decides from column names alone which fields of a structured result are
//! sensitive, then rewrites those cells before the result leaves the
//! coordinator.

pub mod mask;
pub mod rules;

pub use mask::{mask, mask_with, REDACTED};
pub use rules::{
    CategoryRule, FieldCategory, MaskingRule, MaskingRuleTable, MaskingStrategy, RuleTableConfig,
};

use crate::models::StructuredResult;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct PiiClassifier {
    table: MaskingRuleTable,
}

impl PiiClassifier {
    pub fn new(table: MaskingRuleTable) -> Self {
        Self { table }
    }

    /// Map every sensitive column to the rule that applies to it
    pub fn classify<S: AsRef<str>>(&self, columns: &[S]) -> BTreeMap<String, MaskingRule> {
        columns
            .iter()
            .filter_map(|column| {
                let column = column.as_ref();
                self.table
                    .match_column(column)
                    .map(|rule| (column.to_string(), rule))
            })
            .collect()
    }

    /// Mask sensitive cells in place; returns masked column names in column order.
    pub fn protect(&self, result: &mut StructuredResult) -> Vec<String> {
        let rules = self.classify(&result.columns);
        if rules.is_empty() {
            return Vec::new();
        }

        let targets: Vec<(usize, MaskingRule)> = result
            .columns
            .iter()
            .enumerate()
            .filter_map(|(i, column)| rules.get(column).map(|rule| (i, *rule)))
            .collect();

        for row in result.rows.iter_mut() {
            for (index, rule) in &targets {
                if let Some(cell) = row.get_mut(*index) {
                    *cell = mask(cell, rule);
                }
            }
        }

        let mut masked_fields: Vec<String> = Vec::with_capacity(targets.len());
        for (index, _) in &targets {
            let column = &result.columns[*index];
            if !masked_fields.contains(column) {
                masked_fields.push(column.clone());
            }
        }

        debug!(
            masked = ?masked_fields,
            rows = result.rows.len(),
            "PII masking applied"
        );

        masked_fields
    }
}
