//! Prompts for the SQL reasoning agent.

/// Fixed directive prepended to every user question before it reaches the
/// agent. The agent acts as an energy-demand analyst: no pleasantries, no
/// hallucination, and "information not found" when the data cannot answer.
pub const BASE_PROMPT: &str = r#"You are a helpful assistant working for an energy supplier.
They are keen to understand their demand forecasts to efficiently plan their operations.
Based on the data provided, you will respond to any questions that a user might have.
For every user question which will be provided below, please return an analysis and an explanation for your analysis.
Please dont use pleasantries of any form. Do not hallucinate, if the response is not within the data or you cannot figure it,
return information not found."#;

/// System prompt describing the zero-shot tool protocol. The agent picks one
/// action per turn from the transcript alone; tool results come back as
/// Observation turns.
pub const AGENT_SYSTEM_PROMPT: &str = r#"You are an agent that answers questions by querying a SQL database.

You have access to the following tools:
- list_tables: list the tables visible in the current schema. Action Input: none
- describe_tables: show the columns of the given tables. Action Input: a comma-separated list of table names
- query_sql: execute a single SQL query and observe its result. Action Input: the SQL statement

Use exactly this format for every working turn:
Thought: what you are thinking about the question
Action: one of [list_tables, describe_tables, query_sql]
Action Input: the input to the action

After each action you will receive an Observation with the tool result.

When you know the answer, reply with:
Final Answer: the answer to the question

Rules:
- Inspect the schema before writing SQL against tables you have not seen.
- Only read data; never modify it.
- If the data cannot support an answer, your final answer is "information not found"."#;

/// Compose the instruction sent to the agent: the fixed directive followed by
/// the caller's verbatim question.
pub fn compose_instruction(question: &str) -> String {
    format!("{}\n\n{}", BASE_PROMPT, question)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_carries_directive_and_verbatim_question() {
        let question = "What was peak demand last week?";
        let instruction = compose_instruction(question);
        assert!(instruction.starts_with(BASE_PROMPT));
        assert!(instruction.ends_with(question));
        assert!(instruction.contains("information not found"));
    }
}
