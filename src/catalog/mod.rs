pub mod loader;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::warn;

/// Field marker for models that apply to every domain.
pub const UNIVERSAL_FIELD: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Solve,
    Explain,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Solve => "solve",
            Self::Explain => "explain",
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ModelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "solve" => Ok(Self::Solve),
            "explain" => Ok(Self::Explain),
            other => Err(Error::invalid_input(format!(
                "unknown model type '{other}' (expected 'solve' or 'explain')"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingModel {
    pub id: String,
    #[serde(rename = "type")]
    pub model_type: ModelType,
    #[serde(default)]
    pub field: Option<String>,
    pub definition: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

impl ThinkingModel {
    pub fn is_universal(&self) -> bool {
        self.field.as_deref() == Some(UNIVERSAL_FIELD)
    }
}

/// Listing filter. All set criteria must match.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelFilter {
    #[serde(default, rename = "type")]
    pub model_type: Option<ModelType>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

impl ModelFilter {
    pub fn by_type(model_type: ModelType) -> Self {
        Self {
            model_type: Some(model_type),
            ..Self::default()
        }
    }

    pub fn by_field(field: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            ..Self::default()
        }
    }

    pub fn search(needle: impl Into<String>) -> Self {
        Self {
            search: Some(needle.into()),
            ..Self::default()
        }
    }

    fn matches(&self, model: &ThinkingModel, needle: Option<&str>) -> bool {
        if let Some(t) = self.model_type
            && model.model_type != t
        {
            return false;
        }
        if let Some(ref field) = self.field
            && model.field.as_deref() != Some(field.as_str())
        {
            return false;
        }
        if let Some(needle) = needle {
            return model.id.to_lowercase().contains(needle)
                || model.definition.to_lowercase().contains(needle);
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogSummary {
    pub total_models: usize,
    pub type_distribution: BTreeMap<String, usize>,
    pub fields: Vec<String>,
    pub field_distribution: BTreeMap<String, usize>,
}

/// Immutable, insertion-ordered set of thinking models keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: Vec<ThinkingModel>,
    by_id: HashMap<String, usize>,
    by_lower_id: HashMap<String, usize>,
}

impl ModelCatalog {
    /// Build from loaded records. Later duplicates of an id are skipped.
    pub fn from_models(models: impl IntoIterator<Item = ThinkingModel>) -> Self {
        let mut catalog = Self::default();
        for model in models {
            if catalog.by_id.contains_key(&model.id) {
                warn!(id = %model.id, "duplicate thinking model id, skipping");
                continue;
            }
            let idx = catalog.models.len();
            catalog.by_id.insert(model.id.clone(), idx);
            catalog
                .by_lower_id
                .entry(model.id.to_lowercase())
                .or_insert(idx);
            catalog.models.push(model);
        }
        catalog
    }

    pub fn get(&self, id: &str) -> Result<&ThinkingModel> {
        self.by_id
            .get(id)
            .map(|&i| &self.models[i])
            .ok_or_else(|| Error::model_not_found(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Case-insensitive id lookup, returning the canonical id.
    pub fn resolve_id(&self, candidate: &str) -> Option<&str> {
        self.by_lower_id
            .get(&candidate.to_lowercase())
            .map(|&i| self.models[i].id.as_str())
    }

    pub fn list(&self, filter: &ModelFilter) -> Vec<&ThinkingModel> {
        let needle = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        self.models
            .iter()
            .filter(|m| filter.matches(m, needle.as_deref()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ThinkingModel> {
        self.models.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|m| m.id.as_str())
    }

    pub fn universal(&self) -> Vec<&ThinkingModel> {
        self.models.iter().filter(|m| m.is_universal()).collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn summary(&self) -> CatalogSummary {
        let mut type_distribution = BTreeMap::new();
        let mut field_distribution = BTreeMap::new();
        let mut fields = BTreeSet::new();
        for model in &self.models {
            *type_distribution
                .entry(model.model_type.to_string())
                .or_insert(0) += 1;
            if let Some(ref field) = model.field {
                fields.insert(field.clone());
                *field_distribution.entry(field.clone()).or_insert(0) += 1;
            }
        }
        CatalogSummary {
            total_models: self.models.len(),
            type_distribution,
            fields: fields.into_iter().collect(),
            field_distribution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(id: &str, t: ModelType, field: Option<&str>, def: &str) -> ThinkingModel {
        ThinkingModel {
            id: id.into(),
            model_type: t,
            field: field.map(String::from),
            definition: def.into(),
            examples: vec![],
        }
    }

    fn sample() -> ModelCatalog {
        ModelCatalog::from_models(vec![
            model(
                "swot",
                ModelType::Solve,
                Some("business"),
                "Strengths, weaknesses, opportunities, threats",
            ),
            model(
                "first_principles",
                ModelType::Solve,
                Some("*"),
                "Break a problem down to fundamentals",
            ),
            model(
                "occams_razor",
                ModelType::Explain,
                Some("*"),
                "Prefer the simplest explanation",
            ),
            model(
                "pomodoro",
                ModelType::Solve,
                None,
                "Work in focused 25 minute intervals",
            ),
        ])
    }

    #[test]
    fn get_returns_not_found_for_unknown_id() {
        let catalog = sample();
        assert_eq!(catalog.get("swot").unwrap().id, "swot");
        assert!(matches!(catalog.get("nope"), Err(Error::ModelNotFound(_))));
    }

    #[test]
    fn list_preserves_insertion_order() {
        let catalog = sample();
        let ids: Vec<_> = catalog
            .list(&ModelFilter::default())
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(ids, vec!["swot", "first_principles", "occams_razor", "pomodoro"]);
    }

    #[test]
    fn type_filter_agrees_with_summary() {
        let catalog = sample();
        let summary = catalog.summary();
        for t in [ModelType::Solve, ModelType::Explain] {
            let listed = catalog.list(&ModelFilter::by_type(t));
            assert!(listed.iter().all(|m| m.model_type == t));
            assert_eq!(listed.len(), summary.type_distribution[t.as_str()]);
        }
    }

    #[test]
    fn search_is_case_insensitive_over_id_and_definition() {
        let catalog = sample();
        assert_eq!(catalog.list(&ModelFilter::search("SWOT")).len(), 1);
        let hits = catalog.list(&ModelFilter::search("simplest"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "occams_razor");
    }

    #[test]
    fn field_filter_is_exact() {
        let catalog = sample();
        assert_eq!(catalog.universal().len(), 2);
        assert!(catalog.list(&ModelFilter::by_field("busi")).is_empty());
    }

    #[test]
    fn combined_filters_intersect() {
        let catalog = sample();
        let filter = ModelFilter {
            model_type: Some(ModelType::Solve),
            field: Some("*".into()),
            search: None,
        };
        let hits = catalog.list(&filter);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "first_principles");
    }

    #[test]
    fn summary_counts_fields() {
        let summary = sample().summary();
        assert_eq!(summary.total_models, 4);
        assert_eq!(summary.fields, vec!["*".to_string(), "business".to_string()]);
        assert_eq!(summary.field_distribution["*"], 2);
    }

    #[test]
    fn duplicate_ids_keep_first() {
        let catalog = ModelCatalog::from_models(vec![
            model("swot", ModelType::Solve, None, "first"),
            model("swot", ModelType::Explain, None, "second"),
        ]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("swot").unwrap().definition, "first");
    }

    #[test]
    fn resolve_id_ignores_case() {
        let catalog = sample();
        assert_eq!(catalog.resolve_id("Occams_Razor"), Some("occams_razor"));
        assert_eq!(catalog.resolve_id("razor"), None);
    }
}
