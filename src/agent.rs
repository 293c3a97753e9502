//! SQL reasoning agent: one language-model client bound to one database
//! session, reasoning zero-shot over tool descriptions.
//!
//! Each turn the model emits either an Action (list_tables, describe_tables,
//! query_sql) or a Final Answer. Tool results come back as Observation turns.
//! Undecodable turns are fed back for self-correction; if correction keeps
//! failing, the invocation ends with an `OutputParse` failure carrying the
//! raw model text for the resilient wrapper to recover from.

use crate::db::{is_connection_loss, DbSession};
use crate::error::{InsightError, Result};
use crate::llm::{ChatMessage, LlmClient};
use crate::prompts::AGENT_SYSTEM_PROMPT;
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

/// Consecutive undecodable turns tolerated before giving up.
const PARSE_RETRY_LIMIT: usize = 2;
/// Upper bound on reasoning steps per invocation.
const MAX_STEPS: usize = 15;
/// Observations longer than this are truncated in the transcript.
const OBSERVATION_LIMIT: usize = 4000;

const FORMAT_CORRECTION: &str = "Invalid format. Reply with either an Action and \
Action Input pair, or a Final Answer, exactly as instructed.";

/// Structured failure raised when the model's output cannot be decoded into
/// a step. The known result-bearing fields are explicit so recovery can test
/// them in priority order instead of probing attributes reflectively.
#[derive(Debug, Clone, Default)]
pub struct ParseFailure {
    pub output: Option<String>,
    pub response: Option<String>,
    pub llm_output: Option<String>,
    pub text: Option<String>,
    pub message: String,
}

impl ParseFailure {
    pub fn from_raw(raw: &str) -> Self {
        Self {
            llm_output: Some(raw.to_string()),
            message: format!("Could not parse LLM output: `{}`", raw),
            ..Default::default()
        }
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// One decoded model turn.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentAction {
    ListTables,
    DescribeTables(Vec<String>),
    RunSql(String),
    FinalAnswer(String),
}

impl AgentAction {
    fn name(&self) -> &'static str {
        match self {
            AgentAction::ListTables => "list_tables",
            AgentAction::DescribeTables(_) => "describe_tables",
            AgentAction::RunSql(_) => "query_sql",
            AgentAction::FinalAnswer(_) => "final_answer",
        }
    }

    fn input(&self) -> String {
        match self {
            AgentAction::ListTables => String::new(),
            AgentAction::DescribeTables(names) => names.join(", "),
            AgentAction::RunSql(sql) => sql.clone(),
            AgentAction::FinalAnswer(answer) => answer.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentStep {
    pub action: String,
    pub input: String,
    pub observation: String,
}

/// Structured result of one successful invocation.
#[derive(Debug, Clone, Serialize)]
pub struct AgentAnswer {
    pub input: String,
    pub output: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub intermediate_steps: Vec<AgentStep>,
}

/// Decode one model turn. Returns a description of the problem when the
/// turn does not follow the step format.
pub fn parse_step(turn: &str) -> std::result::Result<AgentAction, String> {
    let has_action = turn.contains("Action:");
    let has_final = turn.contains("Final Answer:");

    if has_final && !has_action {
        let pos = turn.find("Final Answer:").unwrap_or(0);
        let answer = turn[pos + "Final Answer:".len()..].trim();
        if answer.is_empty() {
            return Err("empty final answer".to_string());
        }
        return Ok(AgentAction::FinalAnswer(answer.to_string()));
    }
    if has_final && has_action {
        return Err("turn contains both an Action and a Final Answer".to_string());
    }
    if !has_action {
        return Err("no Action or Final Answer found".to_string());
    }

    let action_pos = turn.find("Action:").unwrap_or(0) + "Action:".len();
    let action_line = turn[action_pos..].lines().next().unwrap_or("");
    let name = action_line.trim().trim_matches(|c| c == '[' || c == ']' || c == '`');

    let input = match turn.find("Action Input:") {
        Some(pos) => strip_fences(turn[pos + "Action Input:".len()..].trim()),
        None => String::new(),
    };

    match name.to_lowercase().as_str() {
        "list_tables" => Ok(AgentAction::ListTables),
        "describe_tables" => {
            let names: Vec<String> = input
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if names.is_empty() {
                return Err("describe_tables requires at least one table name".to_string());
            }
            Ok(AgentAction::DescribeTables(names))
        }
        "query_sql" => {
            if input.is_empty() {
                return Err("query_sql requires a SQL statement".to_string());
            }
            Ok(AgentAction::RunSql(input))
        }
        other => Err(format!("unknown tool '{}'", other)),
    }
}

fn strip_fences(input: &str) -> String {
    input
        .trim()
        .trim_start_matches("```sql")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
        .to_string()
}

fn truncate(observation: String) -> String {
    if observation.len() <= OBSERVATION_LIMIT {
        return observation;
    }
    let mut cut = OBSERVATION_LIMIT;
    while !observation.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}... (truncated)", &observation[..cut])
}

/// The reasoning agent. Constructed per request and tied to its session for
/// its entire lifetime.
pub struct SqlAgent {
    llm: LlmClient,
    session: DbSession,
    max_steps: usize,
    handle_parsing_errors: bool,
}

impl SqlAgent {
    pub fn new(llm: LlmClient, session: DbSession) -> Self {
        Self {
            llm,
            session,
            max_steps: MAX_STEPS,
            handle_parsing_errors: true,
        }
    }

    /// Run the reasoning loop for one instruction. Blocking from the
    /// caller's perspective; no streaming, no partial results.
    pub async fn invoke(&self, instruction: &str) -> Result<AgentAnswer> {
        let mut transcript = vec![
            ChatMessage::system(AGENT_SYSTEM_PROMPT),
            ChatMessage::user(instruction),
        ];
        let mut steps: Vec<AgentStep> = Vec::new();
        let mut parse_failures = 0usize;

        for step in 1..=self.max_steps {
            let turn = self.llm.chat(&transcript).await?;

            match parse_step(&turn) {
                Ok(AgentAction::FinalAnswer(answer)) => {
                    info!(steps = step, "agent produced final answer");
                    return Ok(AgentAnswer {
                        input: instruction.to_string(),
                        output: answer,
                        intermediate_steps: steps,
                    });
                }
                Ok(action) => {
                    parse_failures = 0;
                    let observation = truncate(self.perform(&action).await?);
                    info!(action = action.name(), "agent action executed");
                    steps.push(AgentStep {
                        action: action.name().to_string(),
                        input: action.input(),
                        observation: observation.clone(),
                    });
                    transcript.push(ChatMessage::assistant(turn));
                    transcript.push(ChatMessage::user(format!("Observation: {}", observation)));
                }
                Err(reason) => {
                    parse_failures += 1;
                    warn!(%reason, attempt = parse_failures, "could not parse agent step");
                    if !self.handle_parsing_errors || parse_failures > PARSE_RETRY_LIMIT {
                        return Err(InsightError::OutputParse(ParseFailure::from_raw(&turn)));
                    }
                    transcript.push(ChatMessage::assistant(turn));
                    transcript.push(ChatMessage::user(FORMAT_CORRECTION));
                }
            }
        }

        Err(InsightError::Invocation(format!(
            "agent stopped after {} steps without a final answer",
            self.max_steps
        )))
    }

    /// Execute a tool action. Statement-level errors become observations so
    /// the agent can self-correct; a lost session ends the invocation.
    async fn perform(&self, action: &AgentAction) -> Result<String> {
        match action {
            AgentAction::ListTables => match self.session.usable_table_names().await {
                Ok(tables) if tables.is_empty() => {
                    Ok(format!("no tables visible in schema {}", self.session.schema()))
                }
                Ok(tables) => Ok(tables.join(", ")),
                Err(e) => observation_or_fail(e),
            },
            AgentAction::DescribeTables(names) => match self.session.describe_tables(names).await {
                Ok(description) => Ok(description),
                Err(e) => observation_or_fail(e),
            },
            AgentAction::RunSql(sql) => match self.session.run(sql).await {
                Ok(rows) => Ok(rows.render(20)),
                Err(e) => observation_or_fail(e),
            },
            AgentAction::FinalAnswer(answer) => Ok(answer.clone()),
        }
    }
}

fn observation_or_fail(error: InsightError) -> Result<String> {
    match error {
        InsightError::Sqlx(e) if is_connection_loss(&e) => Err(InsightError::Invocation(
            format!("database session lost: {}", e),
        )),
        other => Ok(format!("Error: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_final_answer() {
        let turn = "Thought: done\nFinal Answer: peak demand was 42 GW";
        assert_eq!(
            parse_step(turn).unwrap(),
            AgentAction::FinalAnswer("peak demand was 42 GW".to_string())
        );
    }

    #[test]
    fn parses_list_tables_action() {
        let turn = "Thought: need the schema\nAction: list_tables\nAction Input: none";
        assert_eq!(parse_step(turn).unwrap(), AgentAction::ListTables);
    }

    #[test]
    fn parses_multiline_sql_action() {
        let turn = "Thought: query it\nAction: query_sql\nAction Input: ```sql\nSELECT max(demand)\nFROM curated_demand_data\n```";
        match parse_step(turn).unwrap() {
            AgentAction::RunSql(sql) => {
                assert!(sql.starts_with("SELECT max(demand)"));
                assert!(sql.contains("FROM curated_demand_data"));
                assert!(!sql.contains("```"));
            }
            other => panic!("expected RunSql, got {:?}", other),
        }
    }

    #[test]
    fn parses_describe_tables_list() {
        let turn = "Action: describe_tables\nAction Input: curated_weather_data, demand_history";
        assert_eq!(
            parse_step(turn).unwrap(),
            AgentAction::DescribeTables(vec![
                "curated_weather_data".to_string(),
                "demand_history".to_string(),
            ])
        );
    }

    #[test]
    fn rejects_unknown_tool() {
        let turn = "Action: drop_everything\nAction Input: now";
        assert!(parse_step(turn).unwrap_err().contains("unknown tool"));
    }

    #[test]
    fn rejects_freeform_text() {
        assert!(parse_step("The answer is probably around 42.").is_err());
    }

    #[test]
    fn rejects_mixed_action_and_final_answer() {
        let turn = "Action: list_tables\nAction Input: none\nFinal Answer: 42";
        assert!(parse_step(turn).is_err());
    }

    #[test]
    fn parse_failure_display_carries_marker_and_raw_text() {
        let failure = ParseFailure::from_raw("I think the answer is 42");
        assert_eq!(
            failure.to_string(),
            "Could not parse LLM output: `I think the answer is 42`"
        );
        assert_eq!(failure.llm_output.as_deref(), Some("I think the answer is 42"));
        assert!(failure.output.is_none());
    }
}
