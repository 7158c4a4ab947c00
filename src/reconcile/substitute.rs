use tracing::{info, instrument};

use crate::reconcile::dictionary::SubstitutionIndex;
use crate::reconcile::model::{CellValue, Sheet};

/// Replaces text cells that exactly equal a known literal with its
/// replacement, header rows included. Returns the number of replacements.
#[instrument(level = "info", skip_all, fields(rules = index.len()))]
pub fn substitute_values(sheet: &mut Sheet, index: &SubstitutionIndex) -> usize {
    if index.is_empty() {
        return 0;
    }

    let mut replaced = 0;
    for (_, cell) in sheet.cells_mut() {
        let Some(replacement) = cell.value.as_text().and_then(|text| index.replacement(text))
        else {
            continue;
        };
        cell.value = CellValue::Text(replacement.to_string());
        replaced += 1;
    }

    info!(replaced, "value substitution finished");
    replaced
}
