//! SQL agent: a thought/action/observation loop with database tools.

use crate::agent::QueryAnswerer;
use crate::agent::llm::{ChatMessage, ChatModel, OBSERVATION_STOP};
use crate::agent::prompt::{self, DEFAULT_AGENT_TEMPLATE};
use crate::config::AgentConfig;
use crate::data::DataHandle;
use crate::data::handle::quote_ident;
use crate::error::{Error, Result};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info};

const LIST_TABLES: &str = "sql_db_list_tables";
const SCHEMA: &str = "sql_db_schema";
const QUERY: &str = "sql_db_query";

/// Sample rows included with each table schema.
const SAMPLE_ROWS: usize = 3;

const FINAL_ANSWER: &str = "Final Answer:";

const TOOLS: [(&str, &str); 3] = [
    (
        QUERY,
        "Input to this tool is a detailed and correct SQL query, output is a result from the database. \
         If the query is not correct, an error message will be returned.",
    ),
    (
        SCHEMA,
        "Input to this tool is a comma-separated list of tables, output is the schema and sample rows for those tables. \
         Be sure that the tables actually exist by calling sql_db_list_tables first!",
    ),
    (
        LIST_TABLES,
        "Input is an empty string, output is a comma-separated list of tables in the database.",
    ),
];

/// One parsed model turn.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Final(String),
    Action { tool: String, input: String },
}

const ACTION_PATTERN: &str =
    r"(?s)Action\s*\d*\s*:[ \t]*(.*?)[ \t]*\n\s*Action\s*\d*\s*Input\s*\d*\s*:[ \t]*(.*)";

fn action_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ACTION_PATTERN).ok()).as_ref()
}

/// Parse a model turn. An action wins over a final answer that follows it.
fn parse_step(text: &str) -> Option<Step> {
    let final_pos = text.find(FINAL_ANSWER);

    if let Some(caps) = action_re().and_then(|re| re.captures(text)) {
        let start = caps.get(0).map_or(0, |m| m.start());
        if final_pos.is_none_or(|pos| start < pos) {
            let tool = caps[1].trim().trim_matches('`').to_string();
            let mut input = caps[2].to_string();
            if let Some(cut) = input.find(OBSERVATION_STOP) {
                input.truncate(cut);
            }
            if let Some(cut) = input.find(FINAL_ANSWER) {
                input.truncate(cut);
            }
            return Some(Step::Action {
                tool,
                input: clean_input(&input),
            });
        }
    }

    final_pos.map(|pos| Step::Final(text[pos + FINAL_ANSWER.len()..].trim().to_string()))
}

/// Strip code fences and wrapping quotes from an action input.
fn clean_input(raw: &str) -> String {
    let mut input = raw.trim();
    for fence in ["```sql", "```"] {
        input = input.strip_prefix(fence).unwrap_or(input);
    }
    input = input.strip_suffix("```").unwrap_or(input).trim();
    input.trim_matches('"').trim_matches('`').trim().to_string()
}

/// Agent that answers questions by querying a data handle.
#[derive(Debug)]
pub struct SqlAgent<M> {
    model: M,
    template: String,
    max_steps: usize,
    row_limit: usize,
}

impl<M: ChatModel> SqlAgent<M> {
    /// Create an agent with the default prompt template.
    #[must_use]
    pub fn new(model: M, config: &AgentConfig) -> Self {
        Self {
            model,
            template: DEFAULT_AGENT_TEMPLATE.to_string(),
            max_steps: config.max_steps,
            row_limit: config.row_limit,
        }
    }

    /// Replace the prompt template.
    #[must_use]
    pub fn with_template(mut self, template: String) -> Self {
        self.template = template;
        self
    }

    fn system_prompt(&self) -> String {
        let tools = TOOLS
            .iter()
            .map(|(name, description)| format!("{name}: {description}"))
            .collect::<Vec<_>>()
            .join("\n");
        let tool_names = TOOLS
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ");
        let top_k = self.row_limit.min(10).to_string();

        prompt::render(
            &self.template,
            &[
                ("dialect", "sqlite"),
                ("top_k", &top_k),
                ("tools", &tools),
                ("tool_names", &tool_names),
            ],
        )
    }

    /// Run one tool. Failures become observations for the model to read.
    fn run_tool(&self, handle: &DataHandle, tool: &str, input: &str) -> String {
        let result = match tool {
            LIST_TABLES => handle.table_names().map(|names| names.join(", ")),
            SCHEMA => describe_tables(handle, input),
            QUERY => handle
                .run_query(input, self.row_limit)
                .map(|result| result.to_tuple_list()),
            other => {
                let names: Vec<&str> = TOOLS.iter().map(|(name, _)| *name).collect();
                return format!(
                    "{other} is not a valid tool, try one of [{}].",
                    names.join(", ")
                );
            }
        };
        result.unwrap_or_else(|e| format!("Error: {e}"))
    }
}

/// Schema and sample rows for each table in a comma-separated list.
fn describe_tables(handle: &DataHandle, input: &str) -> Result<String> {
    let requested: Vec<&str> = input
        .split(',')
        .map(|t| t.trim().trim_matches('"').trim_matches('`'))
        .filter(|t| !t.is_empty())
        .collect();

    let mut sections = Vec::new();
    let mut missing = Vec::new();
    for table in &requested {
        match handle.table_ddl(table)? {
            Some(ddl) => {
                let sample = handle.run_query(
                    &format!("SELECT * FROM {}", quote_ident(table)),
                    SAMPLE_ROWS,
                )?;
                sections.push(format!(
                    "{ddl}\n\n/*\n{} rows from {table} table:\n{}\n*/",
                    sample.rows.len(),
                    sample.to_table()
                ));
            }
            None => missing.push(*table),
        }
    }

    if !missing.is_empty() {
        return Err(Error::Agent(format!(
            "table_names {{{}}} not found in database",
            missing.join(", ")
        )));
    }
    Ok(sections.join("\n\n"))
}

impl<M: ChatModel> QueryAnswerer for SqlAgent<M> {
    fn answer(&self, handle: &DataHandle, query: &str) -> Result<String> {
        let system = ChatMessage::system(self.system_prompt());
        let mut scratchpad = String::new();

        for step in 1..=self.max_steps {
            let messages = [
                system.clone(),
                ChatMessage::user(format!("Question: {query}\nThought:{scratchpad}")),
            ];
            let output = self.model.complete(&messages, &[OBSERVATION_STOP])?;

            let observation = match parse_step(&output) {
                Some(Step::Final(answer)) => {
                    info!(step, source = handle.label(), "agent finished");
                    return Ok(answer);
                }
                Some(Step::Action { tool, input }) => {
                    debug!(step, %tool, %input, "agent action");
                    self.run_tool(handle, &tool, &input)
                }
                None => {
                    debug!(step, "unparseable agent output");
                    "Invalid Format: Missing 'Action:' or 'Final Answer:' after 'Thought:'"
                        .to_string()
                }
            };

            scratchpad.push(' ');
            scratchpad.push_str(output.trim_end());
            scratchpad.push_str("\nObservation: ");
            scratchpad.push_str(&observation);
            scratchpad.push_str("\nThought:");
        }

        Err(Error::Agent(format!(
            "Agent stopped after {} steps without a final answer",
            self.max_steps
        )))
    }
}
