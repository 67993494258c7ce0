use std::fmt;

use crate::{error_chain_fmt, TagSet};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReadPreferenceMode {
    #[default]
    Primary,
    PrimaryPreferred,
    Secondary,
    SecondaryPreferred,
    Nearest,
}

impl fmt::Display for ReadPreferenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Which members of a replica set a read may go to.
///
/// Tag sets are tried in order; the first one that matches any eligible member wins. An
/// empty tag set matches every member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ReadPreference {
    mode: ReadPreferenceMode,
    tag_sets: Vec<TagSet>,
}

impl ReadPreference {
    pub fn new(mode: ReadPreferenceMode, tag_sets: Vec<TagSet>) -> Result<Self, ReadPreferenceError> {
        if mode == ReadPreferenceMode::Primary && !tag_sets.is_empty() {
            return Err(ReadPreferenceError::TagSetsWithPrimary);
        }
        Ok(Self { mode, tag_sets })
    }

    pub fn primary() -> Self {
        Self::from_mode(ReadPreferenceMode::Primary)
    }

    pub fn primary_preferred() -> Self {
        Self::from_mode(ReadPreferenceMode::PrimaryPreferred)
    }

    pub fn secondary() -> Self {
        Self::from_mode(ReadPreferenceMode::Secondary)
    }

    pub fn secondary_preferred() -> Self {
        Self::from_mode(ReadPreferenceMode::SecondaryPreferred)
    }

    pub fn nearest() -> Self {
        Self::from_mode(ReadPreferenceMode::Nearest)
    }

    /// Replaces the tag sets, keeping the mode.
    pub fn with_tag_sets(self, tag_sets: Vec<TagSet>) -> Result<Self, ReadPreferenceError> {
        Self::new(self.mode, tag_sets)
    }

    pub fn mode(&self) -> ReadPreferenceMode {
        self.mode
    }

    pub fn tag_sets(&self) -> &[TagSet] {
        &self.tag_sets
    }

    fn from_mode(mode: ReadPreferenceMode) -> Self {
        Self {
            mode,
            tag_sets: Vec::new(),
        }
    }
}

impl fmt::Display for ReadPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ Mode: {}", self.mode)?;
        if !self.tag_sets.is_empty() {
            let tag_sets = self
                .tag_sets
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>();
            write!(f, ", TagSets: [{}]", tag_sets.join(", "))?;
        }
        write!(f, " }}")
    }
}

#[derive(thiserror::Error)]
pub enum ReadPreferenceError {
    #[error("Tag sets cannot be used with the Primary read preference mode.")]
    TagSetsWithPrimary,
}
impl std::fmt::Debug for ReadPreferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
