mod common;

use common::{fixture_catalog, fixtures_dir};
use thinking_models::catalog::{ModelFilter, ModelType, loader};
use thinking_models::error::ErrorKind;
use thinking_models::prompt::PromptBuilder;

#[test]
fn loads_valid_fixtures_and_skips_broken_ones() {
    let catalog = fixture_catalog();
    let ids: Vec<&str> = catalog.ids().collect();
    assert_eq!(
        ids,
        vec!["eisenhower_matrix", "first_principles", "pomodoro", "swot"]
    );
    assert!(!catalog.contains("broken"));
}

#[test]
fn records_keep_examples_and_fields() {
    let catalog = fixture_catalog();
    let swot = catalog.get("swot").unwrap();
    assert_eq!(swot.model_type, ModelType::Solve);
    assert_eq!(swot.field.as_deref(), Some("business"));
    assert_eq!(swot.examples.len(), 2);
    assert!(swot.definition.starts_with("Evaluate a plan"));

    let fp = catalog.get("first_principles").unwrap();
    assert!(fp.examples.is_empty());
}

#[test]
fn every_listed_model_is_retrievable() {
    let catalog = fixture_catalog();
    for model in catalog.list(&ModelFilter::default()) {
        assert_eq!(catalog.get(&model.id).unwrap().id, model.id);
    }
}

#[test]
fn filters_compose_as_a_conjunction() {
    let catalog = fixture_catalog();
    let filter = ModelFilter {
        model_type: Some(ModelType::Solve),
        field: Some("*".into()),
        search: None,
    };
    let ids: Vec<&str> = catalog
        .list(&filter)
        .iter()
        .map(|m| m.id.as_str())
        .collect();
    assert_eq!(ids, vec!["eisenhower_matrix"]);

    let universal: Vec<&str> = catalog
        .universal()
        .iter()
        .map(|m| m.id.as_str())
        .collect();
    assert_eq!(universal, vec!["eisenhower_matrix", "first_principles"]);

    let found = catalog.list(&ModelFilter::search("URGENCY"));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "eisenhower_matrix");
}

#[test]
fn summary_counts_types_and_fields() {
    let summary = fixture_catalog().summary();
    assert_eq!(summary.total_models, 4);
    assert_eq!(summary.type_distribution["solve"], 3);
    assert_eq!(summary.type_distribution["explain"], 1);
    assert_eq!(summary.field_distribution["*"], 2);
    assert!(summary.fields.contains(&"productivity".to_string()));
}

#[test]
fn unknown_id_is_model_not_found() {
    let err = fixture_catalog().get("SWOT").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModelNotFound);
}

#[test]
fn missing_directory_is_config_error() {
    let err = loader::load_dir(&fixtures_dir().join("does-not-exist")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigurationError);
}

#[test]
fn selection_prompt_lists_whole_catalog_within_budget() {
    let catalog = fixture_catalog();
    let listing = PromptBuilder::new(40).render_catalog(&catalog);
    for id in catalog.ids() {
        assert!(listing.contains(id), "{id} missing from listing");
    }
    // "- id (type): definition..." where the bullet is not a word.
    let words: usize = listing
        .lines()
        .map(|l| l.split_whitespace().count() - 1)
        .sum();
    assert!(words <= 40, "listing used {words} words");
}
