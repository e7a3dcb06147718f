//! Loads thinking-model records from a directory of tagged `.txt` files.
//!
//! ```text
//! <id>swot</id>
//! <type>solve</type>
//! <field>business</field>
//! <define>Strengths, weaknesses, ...</define>
//! <example>...</example>
//! <example>...</example>
//! ```

use super::{ModelCatalog, ModelType, ThinkingModel};
use crate::error::{Error, Result};
use fancy_regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

static TAG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)<(id|type|field|define)>(.*?)</\1>").ok());
static EXAMPLE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)<example>(.*?)</example>").ok());

/// Load every `.txt` record under `dir` (non-recursive, sorted by file name).
///
/// Unparseable files and duplicate ids are logged and skipped.
pub fn load_dir(dir: &Path) -> Result<ModelCatalog> {
    if !dir.is_dir() {
        return Err(Error::config(format!(
            "models directory {} does not exist",
            dir.display()
        )));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    files.sort();

    if files.is_empty() {
        warn!(dir = %dir.display(), "no .txt model files found");
    }

    let mut models = Vec::with_capacity(files.len());
    for path in &files {
        match load_file(path) {
            Ok(model) => {
                debug!(id = %model.id, path = %path.display(), "loaded thinking model");
                models.push(model);
            }
            Err(e) => warn!("skipping model file: {e}"),
        }
    }

    let catalog = ModelCatalog::from_models(models);
    info!(
        loaded = catalog.len(),
        files = files.len(),
        "thinking model catalog ready"
    );
    Ok(catalog)
}

pub fn load_file(path: &Path) -> Result<ThinkingModel> {
    let content = std::fs::read_to_string(path)?;
    parse_model(&content).map_err(|msg| Error::model_file(path.display().to_string(), msg))
}

/// Parse one record. Errors are plain messages; the caller attaches the path.
pub fn parse_model(content: &str) -> std::result::Result<ThinkingModel, String> {
    let tag = TAG.as_ref().ok_or("tag pattern failed to compile")?;
    let example = EXAMPLE.as_ref().ok_or("example pattern failed to compile")?;

    let mut id = None;
    let mut model_type = None;
    let mut field = None;
    let mut definition = None;

    for caps in tag.captures_iter(content) {
        let caps = caps.map_err(|e| format!("tag scan: {e}"))?;
        let (Some(name), Some(body)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let slot = match name.as_str() {
            "id" => &mut id,
            "type" => &mut model_type,
            "field" => &mut field,
            _ => &mut definition,
        };
        // First occurrence of a tag wins.
        if slot.is_none() {
            *slot = Some(body.as_str().trim().to_string());
        }
    }

    let id = id.filter(|s| !s.is_empty()).ok_or("missing <id>")?;
    let model_type: ModelType = model_type
        .filter(|s| !s.is_empty())
        .ok_or("missing <type>")?
        .parse()
        .map_err(|e: Error| e.to_string())?;
    let definition = definition
        .filter(|s| !s.is_empty())
        .ok_or("missing <define>")?;

    let mut examples = Vec::new();
    for caps in example.captures_iter(content) {
        let caps = caps.map_err(|e| format!("example scan: {e}"))?;
        if let Some(body) = caps.get(1) {
            let text = body.as_str().trim();
            if !text.is_empty() {
                examples.push(text.to_string());
            }
        }
    }

    Ok(ThinkingModel {
        id,
        model_type,
        field: field.filter(|s| !s.is_empty()),
        definition,
        examples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SWOT: &str = "<id>swot</id>
<type>solve</type>
<field>business</field>
<define>
Evaluate strengths, weaknesses,
opportunities and threats.
</define>
<example>A bakery weighs opening a second shop.</example>
<example>
A startup compares itself to incumbents.
</example>
";

    #[test]
    fn parses_multiline_tags_and_examples() {
        let model = parse_model(SWOT).unwrap();
        assert_eq!(model.id, "swot");
        assert_eq!(model.model_type, ModelType::Solve);
        assert_eq!(model.field.as_deref(), Some("business"));
        assert!(model.definition.starts_with("Evaluate strengths"));
        assert!(model.definition.ends_with("threats."));
        assert_eq!(model.examples.len(), 2);
        assert_eq!(model.examples[1], "A startup compares itself to incumbents.");
    }

    #[test]
    fn missing_field_is_none() {
        let model = parse_model("<id>x</id><type>explain</type><define>d</define>").unwrap();
        assert!(model.field.is_none());
        assert!(model.examples.is_empty());
    }

    #[test]
    fn rejects_missing_definition() {
        let err = parse_model("<id>x</id><type>solve</type>").unwrap_err();
        assert!(err.contains("<define>"));
    }

    #[test]
    fn rejects_unknown_type() {
        let err = parse_model("<id>x</id><type>ponder</type><define>d</define>").unwrap_err();
        assert!(err.contains("ponder"));
    }

    #[test]
    fn load_dir_skips_bad_and_duplicate_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a_swot.txt"), SWOT).unwrap();
        std::fs::write(dir.path().join("b_broken.txt"), "<id>broken</id>").unwrap();
        std::fs::write(
            dir.path().join("c_dup.txt"),
            "<id>swot</id><type>explain</type><define>dup</define>",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.md"), SWOT).unwrap();

        let catalog = load_dir(dir.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("swot").unwrap().model_type, ModelType::Solve);
    }

    #[test]
    fn load_dir_requires_directory() {
        let err = load_dir(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
