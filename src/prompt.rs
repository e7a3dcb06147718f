use crate::catalog::{ModelCatalog, ThinkingModel};
use crate::llm::ChatMessage;

/// Most models the selection phase may return.
pub const MAX_SELECTED: usize = 3;

/// Reply token meaning "no model applies".
pub const NONE_TOKEN: &str = "NONE";

const SELECTION_SYSTEM_PROMPT: &str = r#"You are an expert at selecting thinking models for problem-solving.

You will be shown a catalog of thinking models (frameworks such as SWOT analysis or first-principles thinking), each with its id, its type (solve = a method for solving problems, explain = a lens for explaining phenomena) and a short definition. Then you will see a user query.

Select between 0 and 3 models from the catalog that would genuinely help with the query. Only select a model when it is truly useful; selecting none is a valid answer. Use the ids exactly as they appear in the catalog."#;

const SOLUTION_SYSTEM_PROMPT: &str = r#"You are an expert problem solver. You have been given thinking models that may help with the user's query.

For each thinking model provided, consider:
1. Its applicability to the problem
2. Whether applying its methodology adds value
3. If so, reference it explicitly and apply it step by step

Use the models as guidance where they help and do not force them where they don't. Give a clear, structured, actionable answer."#;

const GENERAL_SYSTEM_PROMPT: &str = r#"You are an expert problem solver. No specific thinking model was selected for this query, so answer it directly.

Give a clear, structured, actionable answer. Where a well-known reasoning approach would help, you may use it, but keep the focus on the user's problem."#;

/// Renders the selection and solution prompts. Same inputs, same text.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    catalog_word_budget: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(1200)
    }
}

impl PromptBuilder {
    pub fn new(catalog_word_budget: usize) -> Self {
        Self {
            catalog_word_budget: catalog_word_budget.max(1),
        }
    }

    pub fn catalog_word_budget(&self) -> usize {
        self.catalog_word_budget
    }

    pub fn selection_messages(&self, catalog: &ModelCatalog, query: &str) -> Vec<ChatMessage> {
        let listing = self.render_catalog(catalog);
        let user = format!(
            "Available thinking models:\n{listing}\n\nUser query: {query}\n\n\
             Respond on the first line with a comma-separated list of at most {MAX_SELECTED} model ids \
             from the catalog, most relevant first, or {NONE_TOKEN} if no model fits. \
             You may add a second line starting with \"Reasoning:\" that briefly explains the choice."
        );
        vec![
            ChatMessage::system(SELECTION_SYSTEM_PROMPT),
            ChatMessage::user(user),
        ]
    }

    pub fn solution_messages(&self, query: &str, models: &[&ThinkingModel]) -> Vec<ChatMessage> {
        if models.is_empty() {
            let user = format!(
                "User query: {query}\n\nProvide a comprehensive solution to the user's query:"
            );
            return vec![
                ChatMessage::system(GENERAL_SYSTEM_PROMPT),
                ChatMessage::user(user),
            ];
        }

        let mut framing = String::new();
        for (i, model) in models.iter().enumerate() {
            framing.push_str(&render_full_model(i + 1, model));
            framing.push('\n');
        }
        let user = format!(
            "User query: {query}\n\nRelevant thinking models:\n\n{framing}\
             Using these thinking models as guidance, provide a comprehensive solution to the user's query:"
        );
        vec![
            ChatMessage::system(SOLUTION_SYSTEM_PROMPT),
            ChatMessage::user(user),
        ]
    }

    /// One line per catalog entry. Definitions shrink proportionally when the
    /// whole listing would exceed the word budget; entries are never dropped.
    pub fn render_catalog(&self, catalog: &ModelCatalog) -> String {
        let definitions: Vec<Vec<&str>> = catalog
            .iter()
            .map(|m| m.definition.split_whitespace().collect())
            .collect();
        // id and type are kept whole and count against the budget.
        let overhead = catalog.len() * 2;
        let lengths: Vec<usize> = definitions.iter().map(Vec::len).collect();
        let allotted = allot_words(&lengths, self.catalog_word_budget.saturating_sub(overhead));

        catalog
            .iter()
            .zip(definitions.iter().zip(allotted))
            .map(|(model, (words, keep))| {
                let mut line = format!(
                    "- {} ({}): {}",
                    model.id,
                    model.model_type,
                    words[..keep].join(" ")
                );
                if keep < words.len() {
                    line.push_str("...");
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Two-pass proportional allotment: measure the total, then scale each entry.
///
/// When everything fits, every entry keeps its full length. Otherwise entry
/// `i` keeps `floor(len_i * budget / total)` words, but at least one word of
/// any non-empty entry.
pub fn allot_words(lengths: &[usize], budget: usize) -> Vec<usize> {
    let total: usize = lengths.iter().sum();
    if total <= budget {
        return lengths.to_vec();
    }
    lengths
        .iter()
        .map(|&len| {
            let scaled = len * budget / total;
            scaled.max(len.min(1))
        })
        .collect()
}

fn render_full_model(n: usize, model: &ThinkingModel) -> String {
    let mut out = format!("{n}. **{}** ({}", model.id, model.model_type);
    if let Some(ref field) = model.field {
        out.push_str(&format!(", field: {field}"));
    }
    out.push_str(")\n");
    out.push_str(&format!("   Definition: {}\n", model.definition));
    if !model.examples.is_empty() {
        out.push_str("   Examples:\n");
        for (j, example) in model.examples.iter().enumerate() {
            out.push_str(&format!("   {}. {}\n", j + 1, example));
        }
    }
    out
}
