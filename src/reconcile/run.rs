use std::path::Path;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::reconcile::config::RunConfig;
use crate::reconcile::copy::{CopyStats, copy_rows};
use crate::reconcile::dictionary::{Dictionary, SubstitutionIndex, SynonymIndex};
use crate::reconcile::error::{ReconcileError, Result};
use crate::reconcile::geocode::{self, GeocodeReport, Geocoder, PostFunction};
use crate::reconcile::io::{excel_read, excel_write};
use crate::reconcile::mapping::{self, ColumnMapping};
use crate::reconcile::model::Sheet;
use crate::reconcile::progress::RunContext;
use crate::reconcile::substitute::substitute_values;

/// Lookup indexes shared, read-only, by every run.
#[derive(Debug, Clone, Default)]
pub struct Dictionaries {
    pub synonyms: SynonymIndex,
    pub substitutions: SubstitutionIndex,
}

impl Dictionaries {
    pub fn new(synonyms: &Dictionary, values: &Dictionary) -> Self {
        Self {
            synonyms: synonyms.synonym_index(),
            substitutions: values.substitution_index(),
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: Uuid,
    pub mappings: Vec<ColumnMapping>,
    pub copy: CopyStats,
    pub replacements: usize,
    pub geocode: GeocodeReport,
}

/// Locations of the workbooks taking part in a file-based run.
#[derive(Debug, Clone, Copy)]
pub struct WorkbookPaths<'p> {
    pub source: &'p Path,
    pub template: &'p Path,
    pub output: &'p Path,
}

/// Reconciles `source` into `template` in memory: mapping, row copy, value
/// substitution, then geocoding backfill.
#[instrument(level = "info", skip_all, fields(run_id = %context.id()))]
pub fn reconcile_sheets(
    context: &RunContext<'_>,
    source: &Sheet,
    template: &mut Sheet,
    config: &RunConfig,
    dictionaries: &Dictionaries,
    geocoder: Option<&dyn Geocoder>,
) -> Result<RunReport> {
    config.validate()?;
    let geocoder = match (config.post_function, geocoder) {
        (PostFunction::None, _) => None,
        (_, Some(geocoder)) => Some(geocoder),
        (mode, None) => {
            return Err(ReconcileError::InvalidConfig(format!(
                "post function '{mode}' requires a geocoder"
            )));
        }
    };

    let layout = config.layout();
    let rules = config.rules();
    debug!(
        private_rules = rules.private.len(),
        template_rules = rules.template.len(),
        "rules prepared"
    );

    context.report("Resolving column mapping...", 10);
    let resolution = mapping::resolve(source, template, layout, &rules, &dictionaries.synonyms);

    context.report("Copying data...", 40);
    let copy = copy_rows(source, template, layout, &resolution.mappings, context);

    context.report("Applying value dictionary...", 80);
    let replacements = substitute_values(template, &dictionaries.substitutions);

    let geocode = match geocoder {
        Some(geocoder) => {
            context.report("Running post-processing...", 85);
            geocode::backfill(
                template,
                layout.template_row,
                config.post_function,
                geocoder,
                context,
            )?
        }
        None => GeocodeReport::default(),
    };

    info!(
        mappings = resolution.mappings.len(),
        rows = copy.rows,
        replacements,
        "reconciliation finished"
    );
    Ok(RunReport {
        run_id: context.id(),
        mappings: resolution.mappings,
        copy,
        replacements,
        geocode,
    })
}

/// Loads both workbooks, reconciles them and writes the output workbook.
///
/// Any failure is pushed to the progress sink as the terminal status before
/// being returned; no output file is written in that case.
#[instrument(
    level = "info",
    skip_all,
    fields(
        run_id = %context.id(),
        source = %paths.source.display(),
        template = %paths.template.display(),
        output = %paths.output.display()
    )
)]
pub fn reconcile_workbooks(
    context: &RunContext<'_>,
    paths: WorkbookPaths<'_>,
    config: &RunConfig,
    dictionaries: &Dictionaries,
    geocoder: Option<&dyn Geocoder>,
) -> Result<RunReport> {
    let result = run_files(context, paths, config, dictionaries, geocoder);
    match &result {
        Ok(_) => context.report("Done!", 100),
        Err(error) => context.fail(error),
    }
    result
}

fn run_files(
    context: &RunContext<'_>,
    paths: WorkbookPaths<'_>,
    config: &RunConfig,
    dictionaries: &Dictionaries,
    geocoder: Option<&dyn Geocoder>,
) -> Result<RunReport> {
    context.report("Preparing...", 5);
    let source = excel_read::load_sheet(paths.source)?;
    let mut template = excel_read::load_sheet(paths.template)?;
    info!(
        source_rows = source.last_row(),
        template_rows = template.last_row(),
        "workbooks loaded"
    );

    let report = reconcile_sheets(context, &source, &mut template, config, dictionaries, geocoder)?;

    context.report("Saving result...", 95);
    excel_write::write_sheet(paths.output, &template)?;
    Ok(report)
}
