use crate::config::Config;
use crate::output::{self, OutputFormat};
use crate::query::{QueryOrchestrator, QueryRequest};
use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
Commands:
  help         show this message
  models       list the thinking model catalog summary
  config       show the active LLM configuration
  quit | exit  leave interactive mode

Anything else is processed as a query, e.g.
  How can I improve my startup's marketing strategy?
  What's the best approach to solve scheduling conflicts?";

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Help,
    Models,
    Config,
    Quit,
    Query(&'a str),
    Empty,
}

fn parse_command(line: &str) -> Command<'_> {
    let line = line.trim();
    match line.to_lowercase().as_str() {
        "" => Command::Empty,
        "help" | "?" => Command::Help,
        "models" => Command::Models,
        "config" => Command::Config,
        "quit" | "exit" | "q" => Command::Quit,
        _ => Command::Query(line),
    }
}

pub async fn run(
    orchestrator: &QueryOrchestrator,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    println!("Thinking Models interactive mode. Type 'help' for commands, 'quit' to exit.");
    println!("{} thinking models loaded.", orchestrator.catalog().len());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nYour query> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match parse_command(&line) {
            Command::Empty => continue,
            Command::Quit => break,
            Command::Help => println!("{HELP}"),
            Command::Models => {
                let summary = orchestrator.summary();
                println!("Total models: {}", summary.total_models);
                for (t, count) in &summary.type_distribution {
                    println!("  {t}: {count}");
                }
                println!("Fields covered: {}", summary.fields.len());
            }
            Command::Config => {
                println!("Provider:    {:?}", config.llm.provider);
                println!(
                    "Endpoint:    {}",
                    config
                        .llm
                        .base_url
                        .as_deref()
                        .unwrap_or("(provider default)")
                );
                println!("Model:       {}", config.llm.model);
                println!("Temperature: {}", config.llm.temperature);
                println!("Max tokens:  {}", config.llm.max_tokens);
            }
            Command::Query(text) => {
                match orchestrator.process_query(&QueryRequest::new(text)).await {
                    Ok(result) => println!("{}", output::render_result(&result, format)?),
                    Err(e) => eprintln!("Error [{}]: {e}", e.kind()),
                }
            }
        }
    }
    println!("Goodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_are_case_insensitive() {
        assert_eq!(parse_command("  QUIT "), Command::Quit);
        assert_eq!(parse_command("Models"), Command::Models);
        assert_eq!(parse_command(""), Command::Empty);
    }

    #[test]
    fn other_text_is_a_query() {
        assert_eq!(
            parse_command(" How do I focus? "),
            Command::Query("How do I focus?")
        );
    }
}
