//! Built-in prompt packs for benchmarking and monitoring.
//!
//! Each pack is designed to elicit a different response length and style so
//! metrics stay comparable across runs. The catalog is closed: pack ids
//! outside this set are rejected at the API boundary.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::errors::DomainError;

/// A named, static input prompt with an expected-output-size hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PromptPack {
    pub id: &'static str,
    pub name: &'static str,
    pub prompt: &'static str,
    pub expected_tokens: u32,
}

static PROMPT_PACKS: Lazy<IndexMap<&'static str, PromptPack>> = Lazy::new(|| {
    let packs = [
        PromptPack {
            id: "health_check",
            name: "Health Check",
            prompt: "Count from 1 to 20, each number on a new line.",
            expected_tokens: 30,
        },
        PromptPack {
            id: "shakespeare",
            name: "Shakespeare",
            prompt: "Write a short soliloquy in the style of Shakespeare about the nature of time. \
                     Use iambic pentameter and include at least one metaphor.",
            expected_tokens: 150,
        },
        PromptPack {
            id: "synthetic_short",
            name: "Synthetic Short",
            prompt: "Explain what an API is in exactly 3 sentences.",
            expected_tokens: 50,
        },
        PromptPack {
            id: "synthetic_medium",
            name: "Synthetic Medium",
            prompt: "Describe the process of photosynthesis in plants. Include the key molecules \
                     involved, the two main stages (light-dependent and light-independent \
                     reactions), and explain why this process is essential for life on Earth.",
            expected_tokens: 200,
        },
        PromptPack {
            id: "synthetic_long",
            name: "Synthetic Long",
            prompt: "Write a comprehensive guide on how to start a small business. Cover the following topics:\n\
                     1. Identifying a business idea and validating market demand\n\
                     2. Creating a business plan\n\
                     3. Legal structure and registration\n\
                     4. Funding options\n\
                     5. Setting up operations\n\
                     6. Marketing strategies\n\
                     7. Common mistakes to avoid\n\n\
                     Provide practical advice for each section.",
            expected_tokens: 500,
        },
        PromptPack {
            id: "code_generation",
            name: "Code Generation",
            prompt: "Write a Python function that implements a binary search algorithm. Include \
                     docstring, type hints, and handle edge cases. Then show an example of how to \
                     use it.",
            expected_tokens: 150,
        },
        PromptPack {
            id: "reasoning",
            name: "Reasoning",
            prompt: "A farmer has 17 sheep. All but 9 run away. How many sheep does the farmer \
                     have left? Explain your reasoning step by step.",
            expected_tokens: 100,
        },
    ];
    packs.into_iter().map(|p| (p.id, p)).collect()
});

/// Look up a prompt pack by id.
pub fn get_prompt_pack(pack_id: &str) -> Result<&'static PromptPack, DomainError> {
    PROMPT_PACKS
        .get(pack_id)
        .ok_or_else(|| DomainError::UnknownPromptPack(pack_id.to_string()))
}

/// Whether a pack id belongs to the catalog.
pub fn is_valid_prompt_pack(pack_id: &str) -> bool {
    PROMPT_PACKS.contains_key(pack_id)
}

/// All packs in catalog order.
pub fn list_prompt_packs() -> impl Iterator<Item = &'static PromptPack> {
    PROMPT_PACKS.values()
}
