//! Model selection as a ranked list of tiers.
//!
//! Each [`ModelTier`] pairs a model id with a [`Precondition`]. Tiers are
//! evaluated in order and the first one whose precondition holds serves
//! the request. The default two-tier setup sends text prompts to a fast
//! model and raw-byte (multimodal) prompts to a more capable one.

use serde::{Deserialize, Serialize};

/// What a request must offer before a tier will take it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precondition {
    /// The prompt carries extracted document text (no raw bytes).
    ExtractedText,
    /// Accepts anything.
    Any,
}

/// Facts about a request that preconditions are checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTraits {
    pub has_extracted_text: bool,
}

impl RequestTraits {
    pub fn text() -> Self {
        Self {
            has_extracted_text: true,
        }
    }

    pub fn raw_bytes() -> Self {
        Self {
            has_extracted_text: false,
        }
    }
}

impl Precondition {
    pub fn holds(&self, traits: RequestTraits) -> bool {
        match self {
            Precondition::ExtractedText => traits.has_extracted_text,
            Precondition::Any => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTier {
    pub model: String,
    pub requires: Precondition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPolicy {
    tiers: Vec<ModelTier>,
}

impl ModelPolicy {
    pub fn new(tiers: Vec<ModelTier>) -> Self {
        Self { tiers }
    }

    /// Fast model for text prompts, capable model for everything else.
    pub fn two_tier(fast: impl Into<String>, capable: impl Into<String>) -> Self {
        Self::new(vec![
            ModelTier {
                model: fast.into(),
                requires: Precondition::ExtractedText,
            },
            ModelTier {
                model: capable.into(),
                requires: Precondition::Any,
            },
        ])
    }

    pub fn tiers(&self) -> &[ModelTier] {
        &self.tiers
    }

    /// First tier whose precondition holds, if any.
    pub fn select(&self, traits: RequestTraits) -> Option<&str> {
        self.tiers
            .iter()
            .find(|tier| tier.requires.holds(traits))
            .map(|tier| tier.model.as_str())
    }
}
