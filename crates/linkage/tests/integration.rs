use std::path::PathBuf;

use catlink_linkage::config::LinkConfig;
use catlink_linkage::engine::{run, LinkInput};
use catlink_linkage::model::{GroupKey, LinkOutcome};
use catlink_linkage::{EngineKind, LinkError, Measure};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn read_fixture(name: &str) -> String {
    let path = fixtures_dir().join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

fn load(config_file: &str) -> (LinkConfig, LinkInput) {
    let config = LinkConfig::from_toml(&read_fixture(config_file)).unwrap();
    let primary = read_fixture(&config.primary.file);
    let reference = read_fixture(&config.reference.file);
    let input = LinkInput::from_csv(&config, &primary, &reference).unwrap();
    (config, input)
}

fn load_and_run(config_file: &str) -> LinkOutcome {
    let (config, input) = load(config_file);
    run(&config, input).unwrap()
}

fn column<'a>(outcome: &'a LinkOutcome, group: &GroupKey, header: &str) -> Vec<&'a str> {
    let table = &outcome.tables[group];
    let idx = table.headers.iter().position(|h| h == header).unwrap();
    table.rows.iter().map(|r| r.cells[idx].as_str()).collect()
}

fn named(name: &str) -> GroupKey {
    GroupKey::Named(name.into())
}

// -------------------------------------------------------------------------
// Widget catalogue
// -------------------------------------------------------------------------

#[test]
fn widgets_link_and_group() {
    let outcome = load_and_run("widgets.link.toml");

    let keys: Vec<GroupKey> = outcome.tables.keys().cloned().collect();
    assert_eq!(keys, vec![named("G1"), named("G2"), GroupKey::Ungrouped]);

    assert_eq!(
        column(&outcome, &named("G1"), "matched_description"),
        vec!["Widget A", "NO MATCH"]
    );
    assert_eq!(
        column(&outcome, &named("G2"), "matched_description"),
        vec!["Widget B", "NO MATCH"]
    );
    assert_eq!(
        column(&outcome, &GroupKey::Ungrouped, "matched_description"),
        vec!["Widget A"]
    );
    assert_eq!(column(&outcome, &named("G2"), "match_score"), vec!["100.00", "0.00"]);
    // Input cells pass through untouched.
    assert_eq!(column(&outcome, &GroupKey::Ungrouped, "detail"), vec!["widget   A!"]);
    assert_eq!(column(&outcome, &named("G1"), "amount"), vec!["10.00", "20.00"]);

    let s = &outcome.report.summary;
    assert_eq!(s.total_records, 5);
    assert_eq!(s.matched, 3);
    assert_eq!(s.unmatched, 2);
    assert_eq!(s.empty_details, 1);
    assert_eq!(s.total_groups, 3);
    assert_eq!(s.group_counts["ungrouped"].rows, 1);
}

#[test]
fn widgets_every_record_lands_in_exactly_one_group() {
    let outcome = load_and_run("widgets.link.toml");
    let mut positions: Vec<usize> = outcome
        .tables
        .values()
        .flat_map(|t| t.rows.iter().map(|r| r.position))
        .collect();
    positions.sort_unstable();
    assert_eq!(positions, vec![0, 1, 2, 3, 4]);

    for table in outcome.tables.values() {
        let within: Vec<usize> = table.rows.iter().map(|r| r.position).collect();
        let mut sorted = within.clone();
        sorted.sort_unstable();
        assert_eq!(within, sorted, "group {} out of input order", table.group);
    }
}

#[test]
fn widgets_all_engine_and_execution_choices_agree() {
    let (base, input) = load("widgets.link.toml");
    let expected = run(&base, input.clone()).unwrap().tables;

    for engine in [EngineKind::Scan, EngineKind::Pruned] {
        for workers in [None, Some(2), Some(3)] {
            let mut config = base.clone();
            config.engine = engine;
            config.workers = workers;
            let outcome = run(&config, input.clone()).unwrap();
            assert_eq!(outcome.tables, expected, "engine {engine}, workers {workers:?}");
        }
    }
}

#[test]
fn widgets_exact_measure_needs_identical_text() {
    let (mut config, input) = load("widgets.link.toml");
    config.measure = Measure::Exact;
    config.threshold = 100.0;
    let outcome = run(&config, input).unwrap();
    // "widget a", "Widget B" and "widget   A!" all normalize to a reference.
    assert_eq!(outcome.report.summary.matched, 3);
}

#[test]
fn widgets_report_serializes() {
    let outcome = load_and_run("widgets.link.toml");
    let json = serde_json::to_value(&outcome.report).unwrap();
    assert_eq!(json["meta"]["config_name"], "Widget catalogue");
    assert_eq!(json["meta"]["measure"], "token_sort");
    assert_eq!(json["meta"]["engine"], "pruned");
    assert_eq!(json["summary"]["matched"], 3);
    let misses = json["near_misses"].as_array().unwrap();
    assert_eq!(misses.len(), 2);
    assert_eq!(misses[0]["detail"], "totally unrelated");
    assert!(misses[1].get("nearest").is_none());
    // Lines in widgets.csv, header on line 1.
    assert_eq!(misses[0]["source_line"], 3);
    assert_eq!(misses[1]["source_line"], 5);
}

// -------------------------------------------------------------------------
// Report-style inputs (title rows, code prefixes, exclusions)
// -------------------------------------------------------------------------

#[test]
fn economato_categories() {
    let outcome = load_and_run("economato.link.toml");

    let keys: Vec<GroupKey> = outcome.tables.keys().cloned().collect();
    assert_eq!(
        keys,
        vec![named("Banco do Brasil"), named("Caixa"), GroupKey::Ungrouped]
    );

    assert_eq!(
        column(&outcome, &named("Caixa"), "Categoria"),
        vec!["1.01 - Aluguel e Condomínio", "SEM CATEGORIA"]
    );
    assert_eq!(
        column(&outcome, &named("Banco do Brasil"), "Categoria"),
        vec!["1.02 - Energia Elétrica", "2.01 - Tarifas Bancárias", "SEM CATEGORIA"]
    );
    assert_eq!(
        column(&outcome, &GroupKey::Ungrouped, "Categoria"),
        vec!["1.03 - Água e Esgoto"]
    );

    // replace_detail overwrites matched details only.
    assert_eq!(
        column(&outcome, &named("Caixa"), "Detalhe"),
        vec!["1.01 - Aluguel e Condomínio", "Compra de material de escritorio"]
    );

    let s = &outcome.report.summary;
    // Opening balance and transfer rows were excluded.
    assert_eq!(s.total_records, 6);
    assert_eq!(s.matched, 4);
    assert_eq!(s.group_counts["sem_disponivel"].matched, 1);
    assert_eq!(outcome.report.meta.reference_candidates, 5);
}

#[test]
fn economato_near_misses_point_at_file_lines() {
    let outcome = load_and_run("economato.link.toml");
    let misses: Vec<(&str, Option<u64>)> = outcome
        .report
        .near_misses
        .iter()
        .map(|m| (m.detail.as_str(), m.source_line))
        .collect();
    // Title rows and excluded rows still count toward the line number.
    assert_eq!(
        misses,
        vec![
            ("Compra de material de escritorio", Some(10)),
            ("Pagamento fornecedor XPTO ref 123", Some(12)),
        ]
    );
}

#[test]
fn economato_import_template_layout() {
    let toml = read_fixture("economato.link.toml")
        + r#"
[[output.columns]]
name = "Data de Competência"
source = "Data"

[[output.columns]]
name = "Data de Pagamento"
source = 0

[[output.columns]]
name = "Valor"
source = "Valor"

[[output.columns]]
name = "Categoria"
source = "Categoria"

[[output.columns]]
name = "Descrição"
source = "Disponivel"
fallback = "Detalhe"
"#;
    let config = LinkConfig::from_toml(&toml).unwrap();
    let input = LinkInput::from_csv(
        &config,
        &read_fixture(&config.primary.file),
        &read_fixture(&config.reference.file),
    )
    .unwrap();
    let outcome = run(&config, input).unwrap();

    for table in outcome.tables.values() {
        assert_eq!(
            table.headers,
            vec!["Data de Competência", "Data de Pagamento", "Valor", "Categoria", "Descrição"]
        );
    }
    assert_eq!(
        outcome.tables[&named("Caixa")].rows[0].cells,
        vec!["2024-01-03", "2024-01-03", "-1200.00", "1.01 - Aluguel e Condomínio", "Caixa"]
    );
    // No group cell, so the description falls back to the (replaced) detail.
    assert_eq!(
        outcome.tables[&GroupKey::Ungrouped].rows[0].cells,
        vec!["2024-01-12", "2024-01-12", "-120.00", "1.03 - Água e Esgoto", "1.03 - Água e Esgoto"]
    );
}

#[test]
fn economato_is_deterministic() {
    let a = load_and_run("economato.link.toml");
    let b = load_and_run("economato.link.toml");
    assert_eq!(a.tables, b.tables);
    assert_eq!(a.report.summary, b.report.summary);
    assert_eq!(a.report.near_misses, b.report.near_misses);
}

// -------------------------------------------------------------------------
// Failures
// -------------------------------------------------------------------------

#[test]
fn empty_reference_is_fatal() {
    let (config, mut input) = load("widgets.link.toml");
    input.reference.clear();
    assert_eq!(run(&config, input).unwrap_err(), LinkError::EmptyReference);
}

#[test]
fn reference_column_out_of_range() {
    let toml = read_fixture("widgets.link.toml").replace("column = \"description\"", "column = 7");
    let config = LinkConfig::from_toml(&toml).unwrap();
    let err = LinkInput::from_csv(
        &config,
        &read_fixture("widgets.csv"),
        &read_fixture("widget-reference.csv"),
    )
    .unwrap_err();
    assert!(matches!(err, LinkError::MissingField { .. }), "{err}");
}

#[test]
fn missing_detail_column() {
    let toml = read_fixture("widgets.link.toml").replace("detail = \"detail\"", "detail = \"Detalhe\"");
    let config = LinkConfig::from_toml(&toml).unwrap();
    let input = LinkInput::from_csv(
        &config,
        &read_fixture("widgets.csv"),
        &read_fixture("widget-reference.csv"),
    )
    .unwrap();
    assert_eq!(
        run(&config, input).unwrap_err(),
        LinkError::MissingField { field: "Detalhe".into() }
    );
}
