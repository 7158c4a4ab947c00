//! Column mapping engine.
//!
//! Resolution runs four stages in strict priority order: private explicit
//! rules, template explicit rules, synonym-dictionary matches, and fuzzy
//! auto-matches. A single [`ClaimSet`] spans all stages, so a column claimed
//! by an earlier stage is invisible to every later one.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::reconcile::dictionary::SynonymIndex;
use crate::reconcile::fuzzy::{self, MATCH_THRESHOLD};
use crate::reconcile::model::reference::{column_index, column_of_cell};
use crate::reconcile::model::{Header, Sheet};
use crate::reconcile::normalize::normalize_header;

/// An author-specified column pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnRule {
    /// Source given directly as column letters.
    ColumnLetter { source: String, template: String },
    /// Source given as a cell coordinate whose column letters are used.
    CellCoordinate { source_cell: String, template: String },
}

impl ColumnRule {
    /// Resolves the rule to `(source_column, template_column)`.
    ///
    /// Returns `None` when either reference is blank or unparseable.
    pub fn columns(&self) -> Option<(u32, u32)> {
        let (source, template) = match self {
            ColumnRule::ColumnLetter { source, template } => (column_index(source)?, template),
            ColumnRule::CellCoordinate {
                source_cell,
                template,
            } => (column_index(column_of_cell(source_cell)?)?, template),
        };
        Some((source, column_index(template)?))
    }
}

/// The two explicit rule sets consumed by the first two stages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    /// Per-run override rules; highest priority.
    pub private: Vec<ColumnRule>,
    /// Rules carried by the template definition.
    pub template: Vec<ColumnRule>,
}

/// Header row of each sheet. Data starts on the following row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderLayout {
    pub source_row: u32,
    pub template_row: u32,
}

/// Which stage committed a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStage {
    PrivateRule,
    TemplateRule,
    Synonym,
    Fuzzy { score: u8 },
}

impl fmt::Display for MatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStage::PrivateRule => f.write_str("private rule"),
            MatchStage::TemplateRule => f.write_str("template rule"),
            MatchStage::Synonym => f.write_str("synonym"),
            MatchStage::Fuzzy { score } => write!(f, "fuzzy ({score})"),
        }
    }
}

/// A committed source → template column pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMapping {
    pub source: u32,
    pub template: u32,
    pub stage: MatchStage,
}

/// Columns already consumed on each side. Add-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimSet {
    source: BTreeSet<u32>,
    template: BTreeSet<u32>,
}

impl ClaimSet {
    pub fn is_source_claimed(&self, column: u32) -> bool {
        self.source.contains(&column)
    }

    pub fn is_template_claimed(&self, column: u32) -> bool {
        self.template.contains(&column)
    }

    /// Claims both columns, or neither if either one is already taken.
    pub fn try_claim(&mut self, source: u32, template: u32) -> bool {
        if self.is_source_claimed(source) || self.is_template_claimed(template) {
            return false;
        }
        self.source.insert(source);
        self.template.insert(template);
        true
    }

    pub fn source_columns(&self) -> impl Iterator<Item = u32> + '_ {
        self.source.iter().copied()
    }

    pub fn template_columns(&self) -> impl Iterator<Item = u32> + '_ {
        self.template.iter().copied()
    }
}

/// Outcome of one resolution call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Mappings in commit order.
    pub mappings: Vec<ColumnMapping>,
    pub claims: ClaimSet,
}

impl Resolution {
    fn commit(&mut self, source: u32, template: u32, stage: MatchStage) -> bool {
        if !self.claims.try_claim(source, template) {
            return false;
        }
        debug!(source, template, %stage, "column mapping committed");
        self.mappings.push(ColumnMapping {
            source,
            template,
            stage,
        });
        true
    }

    /// Template column linked to the given source column.
    pub fn template_for(&self, source: u32) -> Option<u32> {
        self.mappings
            .iter()
            .find(|mapping| mapping.source == source)
            .map(|mapping| mapping.template)
    }

    /// Source column linked to the given template column.
    pub fn source_for(&self, template: u32) -> Option<u32> {
        self.mappings
            .iter()
            .find(|mapping| mapping.template == template)
            .map(|mapping| mapping.source)
    }
}

/// Resolves the column mapping between `source` and `template`.
///
/// Never fails: rules that cannot be applied and headers without a match are
/// skipped.
#[instrument(
    level = "info",
    skip_all,
    fields(source_row = layout.source_row, template_row = layout.template_row)
)]
pub fn resolve(
    source: &Sheet,
    template: &Sheet,
    layout: HeaderLayout,
    rules: &RuleSet,
    synonyms: &SynonymIndex,
) -> Resolution {
    let mut resolution = Resolution::default();

    apply_rules(&mut resolution, &rules.private, MatchStage::PrivateRule);
    apply_rules(&mut resolution, &rules.template, MatchStage::TemplateRule);

    let source_headers = source.headers(layout.source_row);
    let template_headers = template.headers(layout.template_row);

    apply_synonyms(&mut resolution, &source_headers, &template_headers, synonyms);
    apply_fuzzy(&mut resolution, &source_headers, &template_headers);

    info!(
        mapped = resolution.mappings.len(),
        source_headers = source_headers.len(),
        template_headers = template_headers.len(),
        "column mapping resolved"
    );
    resolution
}

fn apply_rules(resolution: &mut Resolution, rules: &[ColumnRule], stage: MatchStage) {
    for rule in rules {
        let Some((source, template)) = rule.columns() else {
            debug!(?rule, %stage, "skipping rule with unparseable reference");
            continue;
        };
        if !resolution.commit(source, template, stage) {
            debug!(source, template, %stage, "skipping rule on claimed column");
        }
    }
}

fn apply_synonyms(
    resolution: &mut Resolution,
    source_headers: &[Header],
    template_headers: &[Header],
    synonyms: &SynonymIndex,
) {
    if synonyms.is_empty() {
        return;
    }

    for header in source_headers {
        if resolution.claims.is_source_claimed(header.column) {
            continue;
        }
        let Some(canonical) = synonyms.canonical(&header.normalized()) else {
            continue;
        };
        let wanted = normalize_header(canonical);
        let target = template_headers.iter().find(|candidate| {
            !resolution.claims.is_template_claimed(candidate.column)
                && candidate.normalized() == wanted
        });
        if let Some(target) = target {
            resolution.commit(header.column, target.column, MatchStage::Synonym);
        }
    }
}

fn apply_fuzzy(resolution: &mut Resolution, source_headers: &[Header], template_headers: &[Header]) {
    let sources = unclaimed(source_headers, |column| {
        resolution.claims.is_source_claimed(column)
    });
    let templates = unclaimed(template_headers, |column| {
        resolution.claims.is_template_claimed(column)
    });

    for pair in fuzzy::assign_greedy(&sources, &templates, MATCH_THRESHOLD) {
        resolution.commit(
            pair.source,
            pair.template,
            MatchStage::Fuzzy { score: pair.score },
        );
    }

    for (column, header) in &sources {
        if resolution.claims.is_source_claimed(*column) {
            continue;
        }
        debug!(column, header = %header, "source column left unmapped");
    }
}

fn unclaimed(headers: &[Header], claimed: impl Fn(u32) -> bool) -> Vec<(u32, String)> {
    headers
        .iter()
        .filter(|header| !claimed(header.column))
        .map(|header| (header.column, header.normalized()))
        .collect()
}
