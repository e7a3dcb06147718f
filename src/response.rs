use crate::catalog::ModelCatalog;
use crate::error::{Error, Result};
use crate::prompt::{MAX_SELECTED, NONE_TOKEN};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionResult {
    /// Catalog ids, first-seen order, at most three.
    pub model_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl SelectionResult {
    pub fn forced(id: impl Into<String>) -> Self {
        Self {
            model_ids: vec![id.into()],
            reasoning: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.model_ids.is_empty()
    }
}

/// Pull known catalog ids out of a free-text selection reply.
///
/// Never fails: anything unrecognizable is an empty selection. When the
/// selection precedes a `Reasoning:` line, only that part is scanned, so
/// models mentioned while explaining a rejection are not selected. A reply
/// that opens with its reasoning is scanned whole.
pub fn parse_selection(reply: &str, catalog: &ModelCatalog) -> SelectionResult {
    let (head, reasoning) = split_reasoning(reply);
    let leads_with_reasoning = tokenize(head).next().is_none();
    let (selection_text, reasoning) = if leads_with_reasoning {
        (reply, reasoning.and_then(|r| first_line(&r)))
    } else {
        (head, reasoning)
    };

    let mut tokens = tokenize(selection_text).peekable();
    if tokens
        .peek()
        .is_some_and(|t| t.eq_ignore_ascii_case(NONE_TOKEN) && catalog.resolve_id(t).is_none())
    {
        return SelectionResult {
            model_ids: Vec::new(),
            reasoning,
        };
    }

    let mut seen = HashSet::new();
    let mut model_ids = Vec::new();
    let mut unknown = 0usize;
    for token in tokens {
        match catalog.resolve_id(token) {
            Some(id) => {
                if seen.insert(id) {
                    model_ids.push(id.to_string());
                    if model_ids.len() == MAX_SELECTED {
                        break;
                    }
                }
            }
            None => unknown += 1,
        }
    }

    debug!(selected = ?model_ids, ignored_tokens = unknown, "parsed model selection");
    SelectionResult {
        model_ids,
        reasoning,
    }
}

/// Validate a solution reply: trimmed, non-empty.
pub fn parse_solution(reply: &str) -> Result<String> {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid_response("LLM returned an empty solution"));
    }
    Ok(trimmed.to_string())
}

/// Identifier-shaped runs: letters, digits, `_` and `-`.
fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-'))
        .map(|t| t.trim_matches('-'))
        .filter(|t| !t.is_empty())
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .next()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
}

fn split_reasoning(reply: &str) -> (&str, Option<String>) {
    let mut offset = 0;
    for line in reply.split_inclusive('\n') {
        let stripped = line
            .trim_start()
            .trim_start_matches(['*', '_', '#', '>', '-', ' ']);
        if stripped
            .get(..10)
            .is_some_and(|p| p.eq_ignore_ascii_case("reasoning:"))
        {
            let rest = reply[offset..]
                .split_once(':')
                .map(|(_, r)| r)
                .unwrap_or_default()
                .trim()
                .trim_start_matches(['*', '_'])
                .trim();
            let reasoning = (!rest.is_empty()).then(|| rest.to_string());
            return (&reply[..offset], reasoning);
        }
        offset += line.len();
    }
    (reply, None)
}
