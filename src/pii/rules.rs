//! Masking rule table
//!
//! Maps field categories to masking strategies and to the column-name
//! patterns that identify them. The table is built once at startup (built-in
//! or loaded from JSON) and only read afterwards.

use crate::error::CoordinatorError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Shorter patterns only match run-together names at the start or end,
/// so `cell` finds `mobilecell` but not `cancelled`.
const MIN_EMBEDDED_PATTERN_LEN: usize = 5;

/// Declaration order is match priority: a column matching several
/// categories takes the first one listed here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum FieldCategory {
    NationalIdentifier,
    Email,
    Phone,
    PersonalName,
    PostalAddress,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MaskingStrategy {
    /// Keep the domain, mask the local part
    Email,
    /// Keep the last four digits
    Phone,
    PersonalName,
    GenericIdentifier,
    /// Mask the street line, keep the remaining comma-separated parts
    PostalAddress,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MaskingRule {
    pub category: FieldCategory,
    pub strategy: MaskingStrategy,
}

/// One entry of the configurable rule table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRule {
    pub category: FieldCategory,
    pub strategy: MaskingStrategy,
    pub patterns: Vec<String>,
    /// Column names that match only when they are the entire name, e.g. `name`
    #[serde(default)]
    pub exact: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleTableConfig {
    pub rules: Vec<CategoryRule>,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: MaskingRule,
    /// Each pattern as a token sequence, e.g. `first_name` → [first, name]
    patterns: Vec<Vec<String>>,
    exact: Vec<String>,
}

impl CompiledRule {
    fn compile(rule: CategoryRule) -> Self {
        Self {
            rule: MaskingRule {
                category: rule.category,
                strategy: rule.strategy,
            },
            patterns: rule
                .patterns
                .iter()
                .map(|p| tokenize(p))
                .filter(|tokens| !tokens.is_empty())
                .collect(),
            exact: rule
                .exact
                .iter()
                .map(|e| tokenize(e).concat())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    fn matches(&self, tokens: &[String], squashed: &str) -> bool {
        self.exact.iter().any(|e| e == squashed)
            || self.patterns.iter().any(|p| {
                contains_sequence(tokens, p) || contains_squashed(squashed, &p.concat())
            })
    }
}

#[derive(Debug, Clone)]
pub struct MaskingRuleTable {
    entries: Vec<CompiledRule>,
}

impl MaskingRuleTable {
    pub fn from_rules(rules: Vec<CategoryRule>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(rules.len());

        for rule in rules {
            if !seen.insert(rule.category) {
                return Err(CoordinatorError::InvalidMaskingRule(format!(
                    "category {:?} defined more than once",
                    rule.category
                )));
            }

            let compiled = CompiledRule::compile(rule);
            if compiled.patterns.is_empty() && compiled.exact.is_empty() {
                return Err(CoordinatorError::InvalidMaskingRule(format!(
                    "category {:?} has no usable patterns",
                    compiled.rule.category
                )));
            }

            entries.push(compiled);
        }

        // Priority is fixed by category, not by file order
        entries.sort_by_key(|e| e.rule.category);

        Ok(Self { entries })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: RuleTableConfig = serde_json::from_str(json)?;
        Self::from_rules(config.rules)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn builtin() -> Self {
        let entries = default_rules().into_iter().map(CompiledRule::compile).collect();

        Self { entries }
    }

    /// First matching rule in priority order. Case-insensitive; a pattern
    /// matches as a word sequence or inside the name with separators removed.
    pub fn match_column(&self, column: &str) -> Option<MaskingRule> {
        let tokens = tokenize(column);
        if tokens.is_empty() {
            return None;
        }
        let squashed = tokens.concat();

        self.entries
            .iter()
            .find(|entry| entry.matches(&tokens, &squashed))
            .map(|entry| entry.rule)
    }

    pub fn categories(&self) -> Vec<FieldCategory> {
        self.entries.iter().map(|e| e.rule.category).collect()
    }
}

impl Default for MaskingRuleTable {
    fn default() -> Self {
        Self::builtin()
    }
}

pub fn default_rules() -> Vec<CategoryRule> {
    let rule = |category, strategy, patterns: &[&str]| CategoryRule {
        category,
        strategy,
        patterns: patterns.iter().map(|p| p.to_string()).collect(),
        exact: Vec::new(),
    };

    vec![
        rule(
            FieldCategory::NationalIdentifier,
            MaskingStrategy::GenericIdentifier,
            &["ssn", "social_security", "tax_id", "national_id", "passport_number", "tin"],
        ),
        rule(
            FieldCategory::Email,
            MaskingStrategy::Email,
            &["email", "e_mail", "emailaddress"],
        ),
        rule(
            FieldCategory::Phone,
            MaskingStrategy::Phone,
            &["phone", "telephone", "mobile", "cell", "contact_number", "fax"],
        ),
        CategoryRule {
            exact: vec!["name".to_string()],
            ..rule(
                FieldCategory::PersonalName,
                MaskingStrategy::PersonalName,
                &[
                    "first_name",
                    "last_name",
                    "full_name",
                    "middle_name",
                    "given_name",
                    "customer_name",
                    "surname",
                    "firstname",
                    "lastname",
                    "fullname",
                ],
            )
        },
        rule(
            FieldCategory::PostalAddress,
            MaskingStrategy::PostalAddress,
            &["address", "addr", "street", "postal_code", "zip", "zip_code"],
        ),
    ]
}

/// Lowercase word tokens; splits on punctuation, whitespace and camelCase.
pub(crate) fn tokenize(name: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in name.trim().chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }

        if c.is_uppercase() && prev_lower && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }

        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

fn contains_squashed(column: &str, pattern: &str) -> bool {
    if pattern.len() >= MIN_EMBEDDED_PATTERN_LEN {
        column.contains(pattern)
    } else {
        column.starts_with(pattern) || column.ends_with(pattern)
    }
}

fn contains_sequence(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty()
        && haystack.len() >= needle.len()
        && haystack.windows(needle.len()).any(|w| w == needle)
}
