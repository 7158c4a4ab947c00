use std::fs;

use sheet_reconcile::ReconcileError;
use sheet_reconcile::config::{RuleRecord, RunConfig, TemplateDefinition, parse_header_row};
use sheet_reconcile::dictionary::Dictionary;
use sheet_reconcile::geocode::PostFunction;
use sheet_reconcile::mapping::ColumnRule;
use sheet_reconcile::model::reference::MAX_ROW;
use tempfile::tempdir;

#[test]
fn rule_records_prefer_letters_over_cells() {
    let record: RuleRecord = serde_json::from_value(serde_json::json!({
        "s_col": "B",
        "source_cell": "D4",
        "t_col": "",
        "template_col": "E"
    }))
    .expect("rule record parsed");

    assert_eq!(
        record.to_rule(),
        Some(ColumnRule::ColumnLetter {
            source: "B".into(),
            template: "E".into(),
        })
    );
    assert_eq!(
        ColumnRule::CellCoordinate {
            source_cell: "$D$4".into(),
            template: "e".into(),
        }
        .columns(),
        Some((4, 5))
    );
    assert_eq!(RuleRecord::default().to_rule(), None);
}

#[test]
fn run_config_loads_with_defaults() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("run.json");
    fs::write(
        &path,
        r#"{
            "s_start_row": 3,
            "t_start_row": 1,
            "private_rules": [{"s_col": "A", "t_col": "C"}, {"t_col": "B"}],
            "post_function": "coords_to_address"
        }"#,
    )
    .expect("config written");

    let config = RunConfig::load(&path).expect("config loaded");

    assert_eq!(config.layout().source_row, 3);
    assert_eq!(config.post_function, PostFunction::CoordsToAddress);
    let rules = config.rules();
    assert_eq!(rules.private.len(), 1);
    assert!(rules.template.is_empty());
}

#[test]
fn zero_header_row_is_rejected() {
    let error = RunConfig::new(0, 1).validate().expect_err("row 0 rejected");
    assert!(matches!(error, ReconcileError::InvalidConfig(_)));
}

#[test]
fn header_rows_beyond_the_sheet_limit_are_rejected() {
    RunConfig::new(MAX_ROW, MAX_ROW)
        .validate()
        .expect("last worksheet row accepted");

    for config in [
        RunConfig::new(MAX_ROW + 1, 1),
        RunConfig::new(1, u32::MAX),
    ] {
        let error = config.validate().expect_err("row past the limit rejected");
        assert!(matches!(error, ReconcileError::InvalidConfig(_)));
    }

    let definition: TemplateDefinition = serde_json::from_value(serde_json::json!({
        "name": "Huge",
        "s_start_row": u32::MAX,
        "t_start_row": 1
    }))
    .expect("definition parsed");
    assert!(matches!(
        definition.to_run_config(None, None),
        Err(ReconcileError::InvalidConfig(_))
    ));
}

#[test]
fn template_row_override_completes_a_definition() {
    let definition: TemplateDefinition = serde_json::from_value(serde_json::json!({
        "name": "No header row",
        "s_start_row": 2
    }))
    .expect("definition parsed");

    assert!(matches!(
        definition.to_run_config(None, None),
        Err(ReconcileError::InvalidConfig(_))
    ));
    let config = definition
        .to_run_config(None, Some(4))
        .expect("override supplies the template row");
    assert_eq!((config.s_start_row, config.t_start_row), (2, 4));
}

#[test]
fn template_definition_falls_back_to_header_cell() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("template.json");
    fs::write(
        &path,
        r#"{
            "template_name": "Clients",
            "excel_file": "clients.xlsx",
            "s_start_row": 2,
            "header_start_cell": "A5",
            "rules": [{"source_cell": "C2", "template_col": "A"}]
        }"#,
    )
    .expect("definition written");

    let definition = TemplateDefinition::load(&path).expect("definition loaded");
    assert_eq!(definition.name, "Clients");
    assert_eq!(definition.template_header_row(), Some(5));

    let config = definition.to_run_config(None, None).expect("run config");
    assert_eq!((config.s_start_row, config.t_start_row), (2, 5));
    assert_eq!(config.post_function, PostFunction::None);
    assert_eq!(config.rules().template.len(), 1);

    let overridden = definition.to_run_config(Some(7), None).expect("run config");
    assert_eq!(overridden.s_start_row, 7);
}

#[test]
fn header_rows_parse_from_numbers_and_cells() {
    assert_eq!(parse_header_row("3").expect("number"), 3);
    assert_eq!(parse_header_row("B12").expect("cell"), 12);
    assert!(parse_header_row("ABC").is_err());
}

#[test]
fn dictionary_edits_persist() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("synonyms.json");

    let mut dictionary = Dictionary::load(&path);
    assert!(dictionary.is_empty());

    dictionary.upsert("Телефон", [" Тел. ", "Phone", "Phone", ""]);
    dictionary.upsert("Имя", ["ФИО"]);
    dictionary.save(&path).expect("dictionary saved");

    let mut reloaded = Dictionary::load(&path);
    assert_eq!(reloaded, dictionary);
    assert_eq!(
        reloaded.get("Телефон"),
        Some(&["Phone".to_string(), "Тел.".to_string()][..])
    );

    assert!(reloaded.remove("Имя"));
    assert!(!reloaded.remove("Имя"));
    assert_eq!(reloaded.len(), 1);
}

#[test]
fn synonym_index_includes_canonical_terms() {
    let dictionary: Dictionary = [("Дата рождения", vec!["ДР", "Birth date"])]
        .into_iter()
        .collect();
    let index = dictionary.synonym_index();

    assert_eq!(index.canonical("датарождения"), Some("Дата рождения"));
    assert_eq!(index.canonical("birthdate"), Some("Дата рождения"));
    assert_eq!(index.canonical("др"), Some("Дата рождения"));
    assert_eq!(index.canonical("phone"), None);
}

#[test]
fn corrupt_dictionary_loads_empty() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("values.json");
    fs::write(&path, "{not json").expect("file written");

    assert!(Dictionary::load(&path).is_empty());
}
