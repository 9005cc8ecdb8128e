use regex::Regex;

use crate::channel::ChannelName;
use crate::config::{DefinitionSet, RawDefinition, ValueMatch};
use crate::error::ConfigurationError;

/// A validated channel rule: a literal prefix selects it, a compiled pattern
/// extracts its value.
#[derive(Debug, Clone)]
pub struct ChannelDefinition {
    name: ChannelName,
    prefix: String,
    pattern: Regex,
}

impl ChannelDefinition {
    pub fn compile(index: usize, raw: &RawDefinition) -> Result<Self, ConfigurationError> {
        let name = ChannelName::new(&raw.name).ok_or_else(|| ConfigurationError::InvalidName {
            index,
            name: raw.name.clone(),
        })?;
        if raw.prefix.is_empty() {
            return Err(ConfigurationError::EmptyPrefix {
                index,
                name: raw.name.clone(),
            });
        }
        let pattern = Regex::new(&raw.pattern).map_err(|source| ConfigurationError::Pattern {
            index,
            name: raw.name.clone(),
            source,
        })?;
        Ok(Self {
            name,
            prefix: raw.prefix.clone(),
            pattern,
        })
    }

    pub fn name(&self) -> &ChannelName {
        &self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }
}

/// Ordered, read-only set of channel definitions.
///
/// Selection is first-match-wins in load order: the first definition whose
/// prefix is a literal prefix of the buffer is chosen, even when a later one
/// has a longer or more specific prefix.
#[derive(Debug, Clone)]
pub struct Registry {
    definitions: Vec<ChannelDefinition>,
    value_match: ValueMatch,
}

impl Registry {
    /// Validates and compiles every definition. The first invalid definition
    /// fails the whole load, and so does an empty set.
    pub fn load(set: &DefinitionSet) -> Result<Self, ConfigurationError> {
        if set.definitions.is_empty() {
            return Err(ConfigurationError::NoDefinitions);
        }
        let definitions = set
            .definitions
            .iter()
            .enumerate()
            .map(|(index, raw)| ChannelDefinition::compile(index, raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            definitions,
            value_match: set.value_match,
        })
    }

    /// Returns the selected definition and the buffer with its prefix removed.
    pub fn match_prefix<'b>(&self, buffer: &'b str) -> Option<(&ChannelDefinition, &'b str)> {
        self.definitions.iter().find_map(|definition| {
            buffer
                .strip_prefix(definition.prefix.as_str())
                .map(|rest| (definition, rest))
        })
    }

    pub fn value_match(&self) -> ValueMatch {
        self.value_match
    }

    pub fn definitions(&self) -> &[ChannelDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
