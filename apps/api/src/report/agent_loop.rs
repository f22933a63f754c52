//! Agentic Completion Loop: drives a tool-calling conversation to a finished report body.
//!
//! # Budgets
//! - `max_iterations` counts completion requests. Running out before the model
//!   stops asking for tools is [`ReportError::IterationBudgetExhausted`], and any
//!   partial text is discarded.
//! - `max_tool_rounds` counts assistant turns whose tool calls were dispatched.
//!   Once spent, a turn that still asks for tools is treated as the final turn:
//!   its text is kept and its tool calls are ignored.
//!
//! # Ordering
//! Tool calls of one turn run sequentially, in the order the model issued them,
//! and all of their results are appended before the next completion request.
//!
//! The only suspension points are the completion call and the tool calls, so
//! dropping the future (client disconnect, timeout) stops the loop there.

use tracing::{debug, info, warn};

use crate::config::ReportLimits;
use crate::llm_client::{ChatMessage, CompletionEndpoint, REPORT_SAMPLING};
use crate::report::error::ReportError;
use crate::report::tools::ToolProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopBudget {
    pub max_iterations: u32,
    pub max_tool_rounds: Option<u32>,
}

impl From<&ReportLimits> for LoopBudget {
    fn from(limits: &ReportLimits) -> Self {
        Self {
            max_iterations: limits.max_iterations,
            max_tool_rounds: limits.max_tool_rounds,
        }
    }
}

/// Result of a successful run. The conversation is returned for inspection only
/// and is never persisted.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// Every non-blank assistant text, in arrival order, newline-joined.
    pub body: String,
    pub conversation: Vec<ChatMessage>,
    pub iterations: u32,
    pub tool_rounds: u32,
}

pub async fn run(
    endpoint: &dyn CompletionEndpoint,
    tools: &dyn ToolProvider,
    initial_messages: Vec<ChatMessage>,
    budget: LoopBudget,
) -> Result<LoopOutcome, ReportError> {
    let catalog = tools.catalog();
    let mut conversation = initial_messages;
    let mut sections: Vec<String> = Vec::new();
    let mut tool_rounds = 0u32;

    for iteration in 1..=budget.max_iterations {
        debug!(
            "Completion round {iteration}/{} ({} messages)",
            budget.max_iterations,
            conversation.len()
        );
        let turn = endpoint
            .complete(&conversation, &catalog, REPORT_SAMPLING)
            .await?;

        if let Some(text) = turn.text_content() {
            sections.push(text.to_string());
        }

        let wants_tools = !turn.tool_calls.is_empty();
        let rounds_left = budget.max_tool_rounds.map_or(true, |cap| tool_rounds < cap);

        if wants_tools && rounds_left {
            tool_rounds += 1;
            let calls = turn.tool_calls.clone();
            conversation.push(turn.into_message(true));

            for call in &calls {
                info!(
                    "Tool round {tool_rounds}: dispatching {} (id {})",
                    call.name, call.id
                );
                let result = tools.invoke(&call.name, &call.arguments).await;
                conversation.push(ChatMessage::tool_result(call, result));
            }
            continue;
        }

        if wants_tools {
            warn!(
                "Tool-round budget of {tool_rounds} spent; ignoring {} further tool call(s)",
                turn.tool_calls.len()
            );
        }
        if turn.text_content().is_some() {
            conversation.push(turn.into_message(false));
        }

        let body = sections.join("\n");
        if body.trim().is_empty() {
            return Err(ReportError::EmptyContent);
        }

        info!(
            "Report loop finished after {iteration} round(s), {tool_rounds} tool round(s), {} chars",
            body.len()
        );
        return Ok(LoopOutcome {
            body,
            conversation,
            iterations: iteration,
            tool_rounds,
        });
    }

    Err(ReportError::IterationBudgetExhausted {
        iterations: budget.max_iterations,
    })
}
