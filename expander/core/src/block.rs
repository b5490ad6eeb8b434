//! Block Identity and Fold State
//!
//! Types describing a host content block as far as the expander cares: an
//! opaque identifier and whether the host currently shows it collapsed.
//!
//! The expander never stores fold state. It reads it through the attribute
//! gateway and requests transitions through the command gateway.

use serde::{Deserialize, Serialize};

/// Block identifier assigned by the host application
///
/// Opaque: only equality is meaningful.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    /// Create a block ID from a string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BlockId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for BlockId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Fold state of a block as reported by the host
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FoldState {
    /// Block children are collapsed
    Folded,
    /// Block children are visible (or the block cannot fold)
    Unfolded,
}

impl FoldState {
    /// Value of the `fold` attribute on a folded block
    pub const FOLDED_FLAG: &'static str = "1";

    /// Interpret the host's `fold` attribute
    ///
    /// Only the exact flag `"1"` means folded; a missing attribute or any
    /// other value is treated as unfolded.
    #[must_use]
    pub fn from_attribute(value: Option<&str>) -> Self {
        if value == Some(Self::FOLDED_FLAG) {
            Self::Folded
        } else {
            Self::Unfolded
        }
    }

    /// Whether the block is currently folded
    #[must_use]
    pub fn is_folded(self) -> bool {
        matches!(self, Self::Folded)
    }
}

impl std::fmt::Display for FoldState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Folded => write!(f, "folded"),
            Self::Unfolded => write!(f, "unfolded"),
        }
    }
}
