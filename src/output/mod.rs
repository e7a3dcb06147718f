use crate::error::{Error, Result};
use crate::query::{BatchResult, QueryResult};
use askama::Template;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Markdown,
}

#[derive(Template)]
#[template(path = "result.md", escape = "none")]
struct MarkdownReport {
    show_summary: bool,
    successful: usize,
    failed: usize,
    entries: Vec<EntryView>,
}

struct EntryView {
    index: usize,
    query: String,
    models: String,
    time: String,
    reasoning: String,
    solution: String,
    error: String,
}

impl EntryView {
    fn new(index: usize, result: &QueryResult) -> Self {
        Self {
            index,
            query: result.query.clone(),
            models: models_label(result),
            time: format!("{:.2}s", result.processing_time),
            reasoning: result.reasoning.clone().unwrap_or_default(),
            solution: result.solution.clone(),
            error: result
                .error
                .as_ref()
                .map(|e| format!("{} ({})", e.detail, e.kind))
                .unwrap_or_default(),
        }
    }
}

fn models_label(result: &QueryResult) -> String {
    if result.selected_models.is_empty() {
        "None".into()
    } else {
        result.selected_models.join(", ")
    }
}

pub fn render_result(result: &QueryResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(result),
        OutputFormat::Text => Ok(render_text(result)),
        OutputFormat::Markdown => render_markdown(MarkdownReport {
            show_summary: false,
            successful: usize::from(result.is_success()),
            failed: usize::from(!result.is_success()),
            entries: vec![EntryView::new(1, result)],
        }),
    }
}

pub fn render_batch(batch: &BatchResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(batch),
        OutputFormat::Text => {
            let mut out = String::new();
            for (i, result) in batch.results.iter().enumerate() {
                out.push_str(&format!("=== Query {} ===\n", i + 1));
                out.push_str(&render_text(result));
                out.push_str(&format!("\n{}\n\n", "=".repeat(50)));
            }
            out.push_str(&format!(
                "Processed {} queries: {} succeeded, {} failed ({:.2}s)\n",
                batch.results.len(),
                batch.successful,
                batch.failed,
                batch.total_processing_time
            ));
            Ok(out)
        }
        OutputFormat::Markdown => render_markdown(MarkdownReport {
            show_summary: true,
            successful: batch.successful,
            failed: batch.failed,
            entries: batch
                .results
                .iter()
                .enumerate()
                .map(|(i, r)| EntryView::new(i + 1, r))
                .collect(),
        }),
    }
}

/// Write a rendering to disk, creating parent directories.
pub fn export(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

fn render_text(result: &QueryResult) -> String {
    let mut out = format!("Query: {}\n", result.query);
    out.push_str(&format!("Selected Models: {}\n", models_label(result)));
    out.push_str(&format!("Processing Time: {:.2}s\n", result.processing_time));
    if let Some(ref reasoning) = result.reasoning {
        out.push_str(&format!("Reasoning: {reasoning}\n"));
    }
    if let Some(ref error) = result.error {
        out.push_str(&format!("\nError [{}]: {}\n", error.kind, error.detail));
    } else {
        out.push_str(&format!("\nSolution:\n{}\n", result.solution));
    }
    out
}

fn render_markdown(report: MarkdownReport) -> Result<String> {
    report.render().map_err(|e| Error::Template(e.to_string()))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| Error::Template(format!("serialize JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use chrono::Utc;
    use std::time::Duration;

    fn ok_result() -> QueryResult {
        QueryResult {
            query: "How do I grow?".into(),
            selected_models: vec!["swot".into()],
            reasoning: Some("strategy question".into()),
            solution: "Do a SWOT.".into(),
            processing_time: 1.234,
            timestamp: Utc::now(),
            error: None,
        }
    }

    #[test]
    fn text_lists_models_and_solution() {
        let text = render_result(&ok_result(), OutputFormat::Text).unwrap();
        assert!(text.contains("Selected Models: swot"));
        assert!(text.contains("Processing Time: 1.23s"));
        assert!(text.contains("Do a SWOT."));
    }

    #[test]
    fn json_omits_absent_error() {
        let json = render_result(&ok_result(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["selected_models"][0], "swot");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn markdown_renders_solution_section() {
        let md = render_result(&ok_result(), OutputFormat::Markdown).unwrap();
        assert!(md.contains("**Query:** How do I grow?"));
        assert!(md.contains("### Solution"));
        assert!(md.contains("strategy question"));
    }

    #[test]
    fn batch_markdown_reports_failures() {
        let failed = QueryResult::failed(
            "broken",
            &Error::invalid_response("empty"),
            Duration::from_millis(5),
        );
        let batch = BatchResult {
            results: vec![ok_result(), failed],
            successful: 1,
            failed: 1,
            total_processing_time: 2.0,
        };
        let md = render_batch(&batch, OutputFormat::Markdown).unwrap();
        assert!(md.contains("1 succeeded, 1 failed"));
        assert!(md.contains("## Query 2"));
        assert!(md.contains("invalid_response"));

        let text = render_batch(&batch, OutputFormat::Text).unwrap();
        assert!(text.contains("=== Query 2 ==="));
        assert!(text.contains("Error [invalid_response]"));
    }

    #[test]
    fn export_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.md");
        export(&path, "hello").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
    }
}
