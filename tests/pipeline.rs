use sheet_reconcile::ReconcileError;
use sheet_reconcile::copy::copy_rows;
use sheet_reconcile::dictionary::Dictionary;
use sheet_reconcile::geocode::{self, Coordinates, Geocoder, LocalGeocoder, PostFunction};
use sheet_reconcile::mapping::{ColumnMapping, HeaderLayout, MatchStage};
use sheet_reconcile::model::{CellStyle, CellValue, Sheet};
use sheet_reconcile::progress::{RecordingProgress, RunContext};
use sheet_reconcile::substitute::substitute_values;

fn mapping(source: u32, template: u32) -> ColumnMapping {
    ColumnMapping {
        source,
        template,
        stage: MatchStage::PrivateRule,
    }
}

fn geo_template() -> Sheet {
    let mut sheet = Sheet::new("Sheet1");
    sheet.set_value(1, 1, "Широта");
    sheet.set_value(1, 2, "Долгота");
    sheet.set_value(1, 3, "Адрес");
    sheet
}

struct FailingGeocoder;

impl Geocoder for FailingGeocoder {
    fn coordinates(&self, _addresses: &[String]) -> sheet_reconcile::Result<Vec<Option<Coordinates>>> {
        Err(ReconcileError::Geocoder("service unavailable".into()))
    }

    fn addresses(&self, _points: &[Coordinates]) -> sheet_reconcile::Result<Vec<Option<String>>> {
        Err(ReconcileError::Geocoder("service unavailable".into()))
    }
}

#[test]
fn rows_align_by_offset_from_header() {
    let mut source = Sheet::new("src");
    source.set_value(3, 1, "Name");
    for offset in 1..=5 {
        source.set_value(3 + offset, 1, format!("row {offset}"));
    }
    let mut template = Sheet::new("tpl");
    template.set_value(1, 2, "Имя");
    let layout = HeaderLayout {
        source_row: 3,
        template_row: 1,
    };
    let progress = RecordingProgress::new();
    let context = RunContext::new(&progress);

    let stats = copy_rows(&source, &mut template, layout, &[mapping(1, 2)], &context);

    assert_eq!(stats.rows, 5);
    assert_eq!(stats.cells, 5);
    for offset in 1..=5 {
        assert_eq!(
            template.value(1 + offset, 2),
            &CellValue::Text(format!("row {offset}"))
        );
    }
    assert_eq!(template.value(1, 2), &CellValue::from("Имя"));
    assert!(template.value(7, 2).is_empty());
}

#[test]
fn copy_overwrites_destination_with_empty_source_cells() {
    let mut source = Sheet::new("src");
    source.set_value(1, 1, "Name");
    source.set_value(2, 1, "first");
    source.set_value(4, 1, "third");
    let mut template = Sheet::new("tpl");
    template.set_value(1, 1, "Name");
    template.set_value(3, 1, "stale");
    let layout = HeaderLayout {
        source_row: 1,
        template_row: 1,
    };
    let progress = RecordingProgress::new();
    let context = RunContext::new(&progress);

    let stats = copy_rows(&source, &mut template, layout, &[mapping(1, 1)], &context);

    assert_eq!(stats.rows, 3);
    assert!(template.value(3, 1).is_empty());
    assert_eq!(template.value(4, 1), &CellValue::from("third"));
}

#[test]
fn header_rows_at_the_integer_limit_copy_nothing() {
    let mut source = Sheet::new("src");
    source.set_value(1, 1, "Name");
    source.set_value(2, 1, "value");
    let mut template = Sheet::new("tpl");
    template.set_value(1, 1, "Name");
    let before = template.clone();
    let progress = RecordingProgress::new();
    let context = RunContext::new(&progress);

    for layout in [
        HeaderLayout {
            source_row: u32::MAX,
            template_row: 1,
        },
        HeaderLayout {
            source_row: 1,
            template_row: u32::MAX,
        },
    ] {
        let stats = copy_rows(&source, &mut template, layout, &[mapping(1, 1)], &context);
        assert_eq!(stats.rows, 0);
    }
    assert_eq!(template, before);
}

#[test]
fn hyperlinks_are_copied_with_style() {
    let mut source = Sheet::new("src");
    source.set_value(1, 1, "Link");
    source.set_value(2, 1, "Site");
    source.set_hyperlink(2, 1, "http://x");
    let mut template = Sheet::new("tpl");
    template.set_value(1, 3, "Link");
    let layout = HeaderLayout {
        source_row: 1,
        template_row: 1,
    };
    let progress = RecordingProgress::new();
    let context = RunContext::new(&progress);

    let stats = copy_rows(&source, &mut template, layout, &[mapping(1, 3)], &context);

    assert_eq!(stats.hyperlinks, 1);
    let cell = template.cell(2, 3).expect("copied cell");
    assert_eq!(cell.value, CellValue::from("Site"));
    assert_eq!(cell.hyperlink.as_deref(), Some("http://x"));
    assert_eq!(cell.style, CellStyle::Hyperlink);
}

#[test]
fn copy_reports_progress_every_hundred_rows() {
    let mut source = Sheet::new("src");
    source.set_value(1, 1, "n");
    for row in 2..=251 {
        source.set_value(row, 1, f64::from(row));
    }
    let mut template = Sheet::new("tpl");
    let layout = HeaderLayout {
        source_row: 1,
        template_row: 1,
    };
    let progress = RecordingProgress::new();
    let context = RunContext::new(&progress);

    copy_rows(&source, &mut template, layout, &[mapping(1, 1)], &context);

    let statuses: Vec<String> = progress
        .updates()
        .into_iter()
        .map(|update| update.status)
        .collect();
    assert_eq!(
        statuses,
        vec!["Copying data: row 100", "Copying data: row 200"]
    );
    assert!(progress.updates().iter().all(|update| update.run_id == context.id()));
}

#[test]
fn substitution_replaces_exact_literals_only() {
    let mut sheet = Sheet::new("tpl");
    sheet.set_value(1, 1, "Город");
    sheet.set_value(2, 1, "Moscow");
    sheet.set_value(3, 1, "Moscow City");
    sheet.set_value(4, 1, 7.0);
    let values: Dictionary = [("MSK", vec!["Moscow", "Москва"])].into_iter().collect();

    let replaced = substitute_values(&mut sheet, &values.substitution_index());

    assert_eq!(replaced, 1);
    assert_eq!(sheet.value(2, 1), &CellValue::from("MSK"));
    assert_eq!(sheet.value(3, 1), &CellValue::from("Moscow City"));
    assert_eq!(sheet.value(4, 1), &CellValue::Number(7.0));
}

#[test]
fn missing_geo_column_fails_without_touching_sheet() {
    let mut sheet = Sheet::new("tpl");
    sheet.set_value(1, 1, "Долгота");
    sheet.set_value(1, 2, "Адрес");
    sheet.set_value(2, 1, 37.6);
    let before = sheet.clone();
    let progress = RecordingProgress::new();
    let context = RunContext::new(&progress);
    let geocoder = LocalGeocoder::default();

    let error = geocode::backfill(
        &mut sheet,
        1,
        PostFunction::CoordsToAddress,
        &geocoder,
        &context,
    )
    .expect_err("latitude column is missing");

    match error {
        ReconcileError::MissingGeoColumns { missing } => {
            assert_eq!(missing, vec!["Широта".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(sheet, before);
}

#[test]
fn coordinates_fill_empty_addresses() {
    let mut sheet = geo_template();
    sheet.set_value(2, 1, 55.75);
    sheet.set_value(2, 2, 37.62);
    sheet.set_value(3, 1, "59,94");
    sheet.set_value(3, 2, "30,31");
    sheet.set_value(4, 1, 55.75);
    sheet.set_value(4, 2, 37.62);
    sheet.set_value(4, 3, "Existing");
    let mut geocoder = LocalGeocoder::default();
    geocoder.insert("Москва, Красная площадь", 55.7539, 37.6208);
    geocoder.insert("Санкт-Петербург, Дворцовая площадь", 59.9390, 30.3158);
    let progress = RecordingProgress::new();
    let context = RunContext::new(&progress);

    let report = geocode::backfill(
        &mut sheet,
        1,
        PostFunction::CoordsToAddress,
        &geocoder,
        &context,
    )
    .expect("backfill succeeds");

    assert_eq!(report.requested, 2);
    assert_eq!(report.filled, 2);
    assert_eq!(sheet.value(2, 3), &CellValue::from("Москва, Красная площадь"));
    assert_eq!(
        sheet.value(3, 3),
        &CellValue::from("Санкт-Петербург, Дворцовая площадь")
    );
    assert_eq!(sheet.value(4, 3), &CellValue::from("Existing"));
    assert_eq!(
        progress.last().map(|update| update.percent),
        Some(90)
    );
}

#[test]
fn addresses_fill_empty_coordinates() {
    let mut sheet = geo_template();
    sheet.set_value(2, 3, "Москва, Красная площадь");
    sheet.set_value(3, 3, "Unknown place");
    let geocoder = LocalGeocoder::from_reader(
        "address,latitude,longitude\n\"Москва, Красная площадь\",55.7539,37.6208\n".as_bytes(),
    )
    .expect("geobase parsed");
    let progress = RecordingProgress::new();
    let context = RunContext::new(&progress);

    let report = geocode::backfill(
        &mut sheet,
        1,
        PostFunction::AddressToCoords,
        &geocoder,
        &context,
    )
    .expect("backfill succeeds");

    assert_eq!(report.requested, 2);
    assert_eq!(report.filled, 1);
    assert_eq!(sheet.value(2, 1), &CellValue::Number(55.7539));
    assert_eq!(sheet.value(2, 2), &CellValue::Number(37.6208));
    assert!(sheet.value(3, 1).is_empty());
}

#[test]
fn resolver_failure_is_reported_not_raised() {
    let mut sheet = geo_template();
    sheet.set_value(2, 3, "Somewhere");
    let before = sheet.clone();
    let progress = RecordingProgress::new();
    let context = RunContext::new(&progress);

    let report = geocode::backfill(
        &mut sheet,
        1,
        PostFunction::AddressToCoords,
        &FailingGeocoder,
        &context,
    )
    .expect("resolver errors are absorbed");

    assert_eq!(report.filled, 0);
    assert!(
        report
            .failure
            .as_deref()
            .is_some_and(|message| message.contains("service unavailable"))
    );
    assert_eq!(sheet, before);
}
