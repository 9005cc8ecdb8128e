//! Greedy decomposition of one line into `(channel, value)` pairs.
//!
//! The line is consumed front to back. At each step the registry selects a
//! definition by literal prefix, the prefix is stripped, and the
//! definition's pattern extracts the value from what remains. A line is
//! atomic: if any step fails, none of the values found so far are returned.

use regex::Match;

use crate::channel::ChannelName;
use crate::config::ValueMatch;
use crate::error::{FailureReason, ParseFailure};
use crate::registry::{ChannelDefinition, Registry};

/// One decoded channel of a line.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ChannelValue {
    pub name: ChannelName,
    pub value: String,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ParseOutcome {
    /// Every segment of the line decoded, in line order.
    Success(Vec<ChannelValue>),
    Failure(ParseFailure),
}

impl ParseOutcome {
    fn failure(line: &str, reason: FailureReason) -> Self {
        Self::Failure(ParseFailure {
            line: line.to_string(),
            reason,
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn into_result(self) -> Result<Vec<ChannelValue>, ParseFailure> {
        match self {
            Self::Success(channels) => Ok(channels),
            Self::Failure(failure) => Err(failure),
        }
    }
}

/// Decomposes `line` against `registry`. The empty line succeeds with no
/// channels.
pub fn tokenize(line: &str, registry: &Registry) -> ParseOutcome {
    let mut channels = Vec::new();
    let mut buffer = line;

    while !buffer.is_empty() {
        let Some((definition, rest)) = registry.match_prefix(buffer) else {
            let offset = line.len() - buffer.len();
            return ParseOutcome::failure(line, FailureReason::UnknownPrefix { offset });
        };

        let Some(found) = find_value(definition, rest, registry.value_match()) else {
            let offset = line.len() - rest.len();
            return ParseOutcome::failure(
                line,
                FailureReason::MissingValue {
                    channel: definition.name().to_string(),
                    offset,
                },
            );
        };

        channels.push(ChannelValue {
            name: definition.name().clone(),
            value: found.as_str().to_string(),
        });
        buffer = &rest[found.end()..];
    }

    ParseOutcome::Success(channels)
}

fn find_value<'h>(
    definition: &ChannelDefinition,
    rest: &'h str,
    value_match: ValueMatch,
) -> Option<Match<'h>> {
    let found = definition.pattern().find(rest)?;
    if found.is_empty() {
        return None;
    }
    match value_match {
        ValueMatch::Anywhere => Some(found),
        ValueMatch::Anchored if found.start() == 0 => Some(found),
        ValueMatch::Anchored => None,
    }
}
