//! Run configuration records.
//!
//! Rules arrive in the persisted JSON shape, where the source side is either
//! `s_col` (column letters) or `source_cell` (a coordinate) and the template
//! side is either `t_col` or `template_col`. They are turned into
//! [`ColumnRule`] values before the mapping engine sees them.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::reconcile::error::{ReconcileError, Result};
use crate::reconcile::geocode::PostFunction;
use crate::reconcile::mapping::{ColumnRule, HeaderLayout, RuleSet};
use crate::reconcile::model::reference::{MAX_ROW, row_of_cell};

/// An explicit rule as stored in template definitions and request payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s_col: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_cell: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t_col: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_col: Option<String>,
}

impl RuleRecord {
    /// Rule with a source column given by letters.
    pub fn columns(source: &str, template: &str) -> Self {
        Self {
            s_col: Some(source.to_string()),
            t_col: Some(template.to_string()),
            ..Self::default()
        }
    }

    /// Rule with a source column given by a cell coordinate.
    pub fn cell(source_cell: &str, template: &str) -> Self {
        Self {
            source_cell: Some(source_cell.to_string()),
            template_col: Some(template.to_string()),
            ..Self::default()
        }
    }

    /// Converts the record into a typed rule. `s_col` wins over
    /// `source_cell` and `t_col` over `template_col`; blank fields count as
    /// absent. Returns `None` when a side is missing entirely.
    pub fn to_rule(&self) -> Option<ColumnRule> {
        let template = non_blank(&self.t_col).or_else(|| non_blank(&self.template_col))?;
        if let Some(source) = non_blank(&self.s_col) {
            return Some(ColumnRule::ColumnLetter {
                source: source.to_string(),
                template: template.to_string(),
            });
        }
        let source_cell = non_blank(&self.source_cell)?;
        Some(ColumnRule::CellCoordinate {
            source_cell: source_cell.to_string(),
            template: template.to_string(),
        })
    }
}

fn non_blank(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

fn to_rules(records: &[RuleRecord]) -> Vec<ColumnRule> {
    records
        .iter()
        .filter_map(|record| {
            let rule = record.to_rule();
            if rule.is_none() {
                debug!(?record, "dropping incomplete rule record");
            }
            rule
        })
        .collect()
}

/// Configuration record consumed by a reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Header row of the source sheet.
    pub s_start_row: u32,
    /// Header row of the template sheet.
    pub t_start_row: u32,
    #[serde(default)]
    pub template_rules: Vec<RuleRecord>,
    #[serde(default)]
    pub private_rules: Vec<RuleRecord>,
    #[serde(default)]
    pub post_function: PostFunction,
}

impl RunConfig {
    pub fn new(s_start_row: u32, t_start_row: u32) -> Self {
        Self {
            s_start_row,
            t_start_row,
            template_rules: Vec::new(),
            private_rules: Vec::new(),
            post_function: PostFunction::None,
        }
    }

    /// Loads a configuration record from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let config: RunConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects header rows that cannot exist on a worksheet.
    pub fn validate(&self) -> Result<()> {
        for (side, row) in [("source", self.s_start_row), ("template", self.t_start_row)] {
            if !(1..=MAX_ROW).contains(&row) {
                return Err(ReconcileError::InvalidConfig(format!(
                    "{side} header row {row} is outside 1..={MAX_ROW}"
                )));
            }
        }
        Ok(())
    }

    pub fn layout(&self) -> HeaderLayout {
        HeaderLayout {
            source_row: self.s_start_row,
            template_row: self.t_start_row,
        }
    }

    /// Typed rule sets; incomplete records are dropped.
    pub fn rules(&self) -> RuleSet {
        RuleSet {
            private: to_rules(&self.private_rules),
            template: to_rules(&self.template_rules),
        }
    }
}

/// A saved template as kept by the template store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDefinition {
    #[serde(alias = "template_name")]
    pub name: String,
    /// File name of the template workbook inside the store.
    #[serde(default)]
    pub excel_file: Option<String>,
    #[serde(default)]
    pub s_start_row: Option<u32>,
    #[serde(default)]
    pub t_start_row: Option<u32>,
    /// Legacy form of `t_start_row`, e.g. `"A3"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_start_cell: Option<String>,
    #[serde(default)]
    pub rules: Vec<RuleRecord>,
    #[serde(default)]
    pub private_rules: Vec<RuleRecord>,
    #[serde(default)]
    pub post_function: Option<PostFunction>,
}

impl TemplateDefinition {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Template header row, falling back to the legacy header cell.
    pub fn template_header_row(&self) -> Option<u32> {
        self.t_start_row
            .or_else(|| self.header_start_cell.as_deref().and_then(row_of_cell))
    }

    /// Builds the run configuration. `source_row` and `template_row` override
    /// the stored header rows; for each side one of the two must be present.
    pub fn to_run_config(
        &self,
        source_row: Option<u32>,
        template_row: Option<u32>,
    ) -> Result<RunConfig> {
        let s_start_row = source_row.or(self.s_start_row).ok_or_else(|| {
            ReconcileError::InvalidConfig(format!(
                "template '{}' does not define a source header row",
                self.name
            ))
        })?;
        let t_start_row = template_row.or_else(|| self.template_header_row()).ok_or_else(|| {
            ReconcileError::InvalidConfig(format!(
                "template '{}' does not define a template header row",
                self.name
            ))
        })?;
        let config = RunConfig {
            s_start_row,
            t_start_row,
            template_rules: self.rules.clone(),
            private_rules: self.private_rules.clone(),
            post_function: self.post_function.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Parses a header position given either as a row number or a cell
/// coordinate (`"3"`, `"A3"`).
pub fn parse_header_row(raw: &str) -> Result<u32> {
    row_of_cell(raw).ok_or_else(|| {
        ReconcileError::InvalidConfig(format!("cannot read a row number from '{raw}'"))
    })
}
