//! Resilient invocation wrapper around the SQL agent.
//!
//! The wrapper never propagates an output-parsing failure: when the agent's
//! result cannot be decoded into its structured envelope, the best-effort
//! raw text is recovered instead. Only non-parsing failures (lost session,
//! transport errors) surface to the caller.

use crate::agent::{AgentAnswer, ParseFailure, SqlAgent};
use crate::error::{InsightError, Result};
use crate::prompts::compose_instruction;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tracing::warn;

lazy_static! {
    static ref PARSE_MARKER: Regex =
        Regex::new(r"(?s)Could not parse LLM output:\s*`(.+?)`").expect("valid marker pattern");
}

/// What the caller renders: the agent's structured envelope, or the raw text
/// recovered from a parsing failure. Exactly one of the two per invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AgentReply {
    Structured(AgentAnswer),
    Recovered(String),
}

/// Send the composed instruction (fixed directive + verbatim question) to
/// the agent and return something renderable.
pub async fn ask(agent: &SqlAgent, question: &str) -> Result<AgentReply> {
    let instruction = compose_instruction(question);
    match agent.invoke(&instruction).await {
        Ok(answer) => Ok(AgentReply::Structured(answer)),
        Err(InsightError::OutputParse(failure)) => {
            warn!("recovering raw answer from output-parsing failure");
            Ok(AgentReply::Recovered(recover_raw_output(&failure)))
        }
        Err(other) => Err(other),
    }
}

/// Recover a human-readable answer from a parsing failure. Strategies are
/// tried in strict priority order and the first success wins:
/// 1. the known result-bearing fields (`output`, `response`, `llm_output`,
///    `text`),
/// 2. the backtick-quoted span after the `Could not parse LLM output:`
///    marker in the failure's textual form,
/// 3. the full textual form itself.
pub fn recover_raw_output(failure: &ParseFailure) -> String {
    for field in [&failure.output, &failure.response, &failure.llm_output, &failure.text] {
        if let Some(value) = field {
            if !value.trim().is_empty() {
                return value.clone();
            }
        }
    }

    let rendered = failure.to_string();
    if let Some(captures) = PARSE_MARKER.captures(&rendered) {
        return captures[1].to_string();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_failure(message: &str) -> ParseFailure {
        ParseFailure {
            message: message.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn primary_output_field_wins_over_all_others() {
        let failure = ParseFailure {
            output: Some("from output".to_string()),
            response: Some("from response".to_string()),
            llm_output: Some("from llm_output".to_string()),
            text: Some("from text".to_string()),
            message: "Could not parse LLM output: `from message`".to_string(),
        };
        assert_eq!(recover_raw_output(&failure), "from output");
    }

    #[test]
    fn response_field_wins_when_output_is_absent() {
        let failure = ParseFailure {
            response: Some("from response".to_string()),
            llm_output: Some("from llm_output".to_string()),
            message: "irrelevant".to_string(),
            ..Default::default()
        };
        assert_eq!(recover_raw_output(&failure), "from response");
    }

    #[test]
    fn marker_span_is_extracted_without_backticks() {
        let failure =
            bare_failure("Could not parse LLM output: `the raw narrated answer`");
        assert_eq!(recover_raw_output(&failure), "the raw narrated answer");
    }

    #[test]
    fn marker_span_extraction_handles_newlines() {
        let failure =
            bare_failure("Could not parse LLM output: `line one\nline two`");
        assert_eq!(recover_raw_output(&failure), "line one\nline two");
    }

    #[test]
    fn falls_back_to_full_text_when_nothing_matches() {
        let failure = bare_failure("something else entirely went wrong");
        assert_eq!(
            recover_raw_output(&failure),
            "something else entirely went wrong"
        );
    }

    #[test]
    fn empty_fields_do_not_shadow_later_strategies() {
        let failure = ParseFailure {
            output: Some("  ".to_string()),
            message: "Could not parse LLM output: `fallback span`".to_string(),
            ..Default::default()
        };
        assert_eq!(recover_raw_output(&failure), "fallback span");
    }

    #[test]
    fn recovered_reply_serializes_as_plain_string() {
        let reply = AgentReply::Recovered("raw answer".to_string());
        assert_eq!(serde_json::to_value(&reply).unwrap(), serde_json::json!("raw answer"));
    }
}
