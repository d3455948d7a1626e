use std::ops::Range;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::models::message::Message;
use crate::models::role::Role;
use crate::token_counter::TokenCounter;

/// How the buffer groups messages when evicting history
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TrimStrategy {
    /// Evict one message at a time, oldest first
    PerMessage,
    /// Evict an assistant message with tool calls together with the tool messages answering
    /// it, so trimming never leaves an orphaned tool result or an unanswered call
    #[default]
    ToolPairs,
}

/// Keeps the most recent slice of a conversation that fits a model's context window
pub struct ConversationBuffer {
    counter: TokenCounter,
    strategy: TrimStrategy,
}

impl ConversationBuffer {
    pub fn new(counter: TokenCounter, strategy: TrimStrategy) -> Self {
        Self { counter, strategy }
    }

    pub fn strategy(&self) -> TrimStrategy {
        self.strategy
    }

    pub fn token_counter(&self) -> &TokenCounter {
        &self.counter
    }

    /// Total tokens of the message contents; tool call metadata is not counted
    pub fn count_tokens(&self, messages: &[Message]) -> usize {
        messages
            .iter()
            .map(|message| self.counter.count_tokens(&message.content))
            .sum()
    }

    /// Trim `messages` to fit within `token_limit`.
    ///
    /// The result is always a suffix of the input. The most recent eviction unit is never
    /// dropped, so a final message larger than the whole budget is returned on its own.
    /// Surviving messages are re-emitted with role, content and tool linkage only.
    pub fn trim(&self, messages: &[Message], token_limit: usize) -> Vec<Message> {
        let counts: Vec<usize> = messages
            .iter()
            .map(|message| self.counter.count_tokens(&message.content))
            .collect();
        let units = self.eviction_units(messages);

        let mut total: usize = counts.iter().sum();
        let mut first_kept = 0;
        while total > token_limit && first_kept + 1 < units.len() {
            let evicted: usize = counts[units[first_kept].clone()].iter().sum();
            total -= evicted;
            first_kept += 1;
        }

        let cut = units.get(first_kept).map_or(messages.len(), |unit| unit.start);
        if cut > 0 {
            tracing::debug!(
                evicted = cut,
                kept = messages.len() - cut,
                tokens = total,
                token_limit,
                "trimmed conversation history"
            );
        }

        messages[cut..]
            .iter()
            .map(|message| Message {
                id: None,
                role: message.role,
                content: self.counter.rebuild(&message.content),
                timestamp: None,
                tool_calls: message.tool_calls.clone(),
                tool_call_id: message.tool_call_id.clone(),
            })
            .collect()
    }

    fn eviction_units(&self, messages: &[Message]) -> Vec<Range<usize>> {
        let mut units = Vec::new();
        let mut start = 0;
        while start < messages.len() {
            let mut end = start + 1;
            let message = &messages[start];
            if self.strategy == TrimStrategy::ToolPairs
                && message.role == Role::Assistant
                && message.has_tool_calls()
            {
                while end < messages.len() && messages[end].answers(&message.tool_calls) {
                    end += 1;
                }
            }
            units.push(start..end);
            start = end;
        }
        units
    }
}
