use tracing::{info, instrument};

use crate::reconcile::mapping::{ColumnMapping, HeaderLayout};
use crate::reconcile::model::Sheet;
use crate::reconcile::progress::RunContext;

/// Rows between two progress updates while copying.
pub const PROGRESS_INTERVAL: usize = 100;

/// Counters produced by [`copy_rows`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub rows: usize,
    pub cells: usize,
    pub hyperlinks: usize,
}

/// Copies every data row of `source` into `template` for each mapping.
///
/// Rows are aligned by offset from each sheet's header row, not by absolute
/// row number. Source hyperlinks are carried over and styled; a destination
/// keeps its own hyperlink when the source cell has none.
#[instrument(level = "info", skip_all, fields(mappings = mappings.len()))]
pub fn copy_rows(
    source: &Sheet,
    template: &mut Sheet,
    layout: HeaderLayout,
    mappings: &[ColumnMapping],
    context: &RunContext<'_>,
) -> CopyStats {
    let mut stats = CopyStats::default();
    let (Some(first_row), Some(first_target)) = (
        layout.source_row.checked_add(1),
        layout.template_row.checked_add(1),
    ) else {
        return stats;
    };
    let last_row = source.last_row();
    if mappings.is_empty() || last_row < first_row {
        return stats;
    }

    for (offset, source_row) in (first_row..=last_row).enumerate() {
        let Some(target_row) = u32::try_from(offset)
            .ok()
            .and_then(|offset| first_target.checked_add(offset))
        else {
            break;
        };
        for mapping in mappings {
            let value = source.value(source_row, mapping.source).clone();
            template.set_value(target_row, mapping.template, value);
            stats.cells += 1;
            if let Some(target) = source.hyperlink(source_row, mapping.source) {
                template.set_hyperlink(target_row, mapping.template, target);
                stats.hyperlinks += 1;
            }
        }
        stats.rows += 1;

        if stats.rows % PROGRESS_INTERVAL == 0 {
            context.report(&format!("Copying data: row {}", stats.rows), 50);
        }
    }

    info!(
        rows = stats.rows,
        cells = stats.cells,
        hyperlinks = stats.hyperlinks,
        "rows copied"
    );
    stats
}
