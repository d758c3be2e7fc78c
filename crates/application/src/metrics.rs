//! Streaming measurement: TTFT, TPS, token counts, and cost estimation.
//!
//! The collector is wall-clock driven (monotonic `Instant`): `start` before
//! issuing the provider call, `record_token` for every non-empty content
//! chunk, `finalize` once the stream ends. TTFT falls back to total latency
//! on the non-streaming path where no content chunks were observed.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Model pricing data (USD per 1M tokens).
///
/// Sources:
/// - OpenAI: https://openai.com/api/pricing/
/// - Anthropic: https://www.anthropic.com/pricing
/// - Google: https://ai.google.dev/pricing
/// - AWS Bedrock: https://aws.amazon.com/bedrock/pricing/
const MODEL_PRICING: &[(&str, f64, f64)] = &[
    // OpenAI
    ("gpt-4o", 2.50, 10.00),
    ("gpt-4o-mini", 0.15, 0.60),
    ("gpt-4-turbo", 10.00, 30.00),
    ("gpt-4", 30.00, 60.00),
    ("gpt-3.5-turbo", 0.50, 1.50),
    // Anthropic Claude 4.5
    ("claude-opus-4-5-20251101", 5.00, 25.00),
    ("claude-opus-4-5", 5.00, 25.00),
    ("claude-sonnet-4-5-20250929", 3.00, 15.00),
    ("claude-sonnet-4-5", 3.00, 15.00),
    ("claude-haiku-4-5-20251001", 1.00, 5.00),
    ("claude-haiku-4-5", 1.00, 5.00),
    // Anthropic Claude 4.x
    ("claude-opus-4-1-20250805", 15.00, 75.00),
    ("claude-opus-4-0", 15.00, 75.00),
    ("claude-opus-4-20250514", 15.00, 75.00),
    ("claude-sonnet-4-0", 3.00, 15.00),
    ("claude-sonnet-4-20250514", 3.00, 15.00),
    // Anthropic Claude 3.7
    ("claude-3-7-sonnet-20250219", 3.00, 15.00),
    ("claude-3-7-sonnet-latest", 3.00, 15.00),
    // Anthropic Claude 3.5
    ("claude-3-5-sonnet-20241022", 3.00, 15.00),
    ("claude-3-5-haiku-20241022", 0.80, 4.00),
    ("claude-3-5-haiku-latest", 0.80, 4.00),
    // Anthropic Claude 3 (legacy)
    ("claude-3-opus-20240229", 15.00, 75.00),
    ("claude-3-opus-latest", 15.00, 75.00),
    ("claude-3-sonnet-20240229", 3.00, 15.00),
    ("claude-3-haiku-20240307", 0.25, 1.25),
    // Google
    ("gemini-2.0-flash-exp", 0.00, 0.00),
    ("gemini-1.5-pro", 1.25, 5.00),
    ("gemini-1.5-flash", 0.075, 0.30),
    // AWS Bedrock
    ("anthropic.claude-3-5-sonnet-20241022-v2:0", 3.00, 15.00),
    ("anthropic.claude-3-5-haiku-20241022-v1:0", 0.80, 4.00),
];

/// Prefixes stripped when normalising a model id for the price table.
const PRICING_PREFIXES: &[&str] = &["openai/", "anthropic/", "google/", "bedrock/", "azure/"];

/// The metric bundle produced by [`MetricsCollector::finalize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionMetrics {
    pub ttft_ms: f64,
    pub tps: f64,
    pub tps_excluding_ttft: f64,
    pub total_latency_ms: f64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub estimated_cost: Option<f64>,
}

impl CompletionMetrics {
    fn empty() -> Self {
        Self {
            ttft_ms: 0.0,
            tps: 0.0,
            tps_excluding_ttft: 0.0,
            total_latency_ms: 0.0,
            input_tokens: 0,
            output_tokens: 0,
            estimated_cost: None,
        }
    }
}

/// Collects timing and token metrics during one completion.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    start_time: Option<Instant>,
    ttft_time: Option<Instant>,
    token_count: i64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing measurement. Resets any prior state.
    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
        self.ttft_time = None;
        self.token_count = 0;
    }

    /// Record a token generation event. Empty content (metadata/role-only
    /// chunks) is not counted.
    pub fn record_token(&mut self, content: &str) {
        if content.is_empty() {
            return;
        }
        if self.ttft_time.is_none() {
            self.ttft_time = Some(Instant::now());
        }
        self.token_count += 1;
    }

    /// Stop the clock and compute the metric bundle.
    ///
    /// `output_tokens` falls back to the observed chunk count; `input_tokens`
    /// to zero. Cost is estimated only when `model_id` is priced.
    pub fn finalize(
        &mut self,
        model_id: Option<&str>,
        input_tokens: Option<i64>,
        output_tokens: Option<i64>,
    ) -> CompletionMetrics {
        let end = Instant::now();

        let Some(start) = self.start_time else {
            return CompletionMetrics::empty();
        };

        let input_tokens = input_tokens.unwrap_or(0);
        let output_tokens = output_tokens.unwrap_or(self.token_count);

        let total_seconds = end.duration_since(start).as_secs_f64();
        let total_latency_ms = total_seconds * 1000.0;

        // Non-streaming path: no content tokens observed, TTFT equals total
        let ttft_ms = match self.ttft_time {
            Some(ttft) => ttft.duration_since(start).as_secs_f64() * 1000.0,
            None => total_latency_ms,
        };

        let tps = if total_seconds > 0.0 {
            output_tokens as f64 / total_seconds
        } else {
            0.0
        };

        let generation_seconds = (total_seconds - ttft_ms / 1000.0).max(0.0);
        let tps_excluding_ttft = if generation_seconds > 0.0 {
            output_tokens as f64 / generation_seconds
        } else {
            0.0
        };

        let estimated_cost =
            model_id.and_then(|id| estimate_cost(id, input_tokens, output_tokens));

        CompletionMetrics {
            ttft_ms,
            tps,
            tps_excluding_ttft,
            total_latency_ms,
            input_tokens,
            output_tokens,
            estimated_cost,
        }
    }
}

/// Estimate the USD cost of a completion from the frozen price table.
///
/// The model id is normalised by stripping one leading provider prefix;
/// unpriced models return `None`.
pub fn estimate_cost(model_id: &str, input_tokens: i64, output_tokens: i64) -> Option<f64> {
    let mut normalized = model_id;
    for prefix in PRICING_PREFIXES {
        if let Some(stripped) = model_id.strip_prefix(prefix) {
            normalized = stripped;
            break;
        }
    }

    let (_, input_price, output_price) = MODEL_PRICING
        .iter()
        .find(|(id, _, _)| *id == normalized)?;

    let input_cost = (input_tokens as f64 / 1_000_000.0) * input_price;
    let output_cost = (output_tokens as f64 / 1_000_000.0) * output_price;
    Some(input_cost + output_cost)
}

/// Content delta inside one streaming chunk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// One choice inside a streaming chunk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Option<ChunkDelta>,
}

/// Typed streaming chunk payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

/// A streaming chunk in either of its wire shapes.
///
/// Providers deliver chunks as typed objects or loose JSON mappings;
/// [`extract_chunk_content`] is the only code aware of the difference.
#[derive(Debug, Clone)]
pub enum Chunk {
    Object(StreamChunk),
    Mapping(serde_json::Value),
}

/// Extract the content string from a streaming chunk, if present.
pub fn extract_chunk_content(chunk: &Chunk) -> Option<&str> {
    match chunk {
        Chunk::Object(parsed) => parsed
            .choices
            .first()
            .and_then(|choice| choice.delta.as_ref())
            .and_then(|delta| delta.content.as_deref()),
        Chunk::Mapping(value) => value
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("delta"))
            .and_then(|delta| delta.get("content"))
            .and_then(|content| content.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_ttft_and_tps_accuracy() {
        let mut collector = MetricsCollector::new();
        collector.start();

        tokio::time::sleep(Duration::from_millis(100)).await;
        collector.record_token("First");

        tokio::time::sleep(Duration::from_millis(100)).await;
        for _ in 0..9 {
            collector.record_token("token");
        }

        let metrics = collector.finalize(None, None, Some(10));

        // ~100ms to first token, ~200ms total, 10 tokens
        assert!(
            metrics.ttft_ms >= 90.0 && metrics.ttft_ms <= 160.0,
            "ttft_ms = {}",
            metrics.ttft_ms
        );
        assert!(
            metrics.tps >= 30.0 && metrics.tps <= 60.0,
            "tps = {}",
            metrics.tps
        );
        assert!(
            metrics.tps_excluding_ttft >= 55.0 && metrics.tps_excluding_ttft <= 120.0,
            "tps_excluding_ttft = {}",
            metrics.tps_excluding_ttft
        );
        assert!(metrics.total_latency_ms >= metrics.ttft_ms);
        assert_eq!(metrics.output_tokens, 10);
    }

    #[test]
    fn test_finalize_without_start_is_all_zeros() {
        let mut collector = MetricsCollector::new();
        let metrics = collector.finalize(Some("gpt-4o"), Some(100), Some(50));
        assert_eq!(metrics, CompletionMetrics::empty());
    }

    #[test]
    fn test_non_streaming_ttft_equals_total_latency() {
        let mut collector = MetricsCollector::new();
        collector.start();
        std::thread::sleep(Duration::from_millis(20));
        let metrics = collector.finalize(None, None, Some(5));
        assert_eq!(metrics.ttft_ms, metrics.total_latency_ms);
        assert!(metrics.ttft_ms >= 15.0);
    }

    #[test]
    fn test_empty_chunks_are_not_counted() {
        let mut collector = MetricsCollector::new();
        collector.start();
        collector.record_token("");
        collector.record_token("real");
        collector.record_token("");
        let metrics = collector.finalize(None, None, None);
        assert_eq!(metrics.output_tokens, 1);
    }

    #[test]
    fn test_explicit_token_counts_win() {
        let mut collector = MetricsCollector::new();
        collector.start();
        collector.record_token("a");
        collector.record_token("b");
        let metrics = collector.finalize(None, Some(42), Some(99));
        assert_eq!(metrics.input_tokens, 42);
        assert_eq!(metrics.output_tokens, 99);
    }

    #[test]
    fn test_cost_normalises_provider_prefix() {
        // (1000/1e6)·2.50 + (500/1e6)·10.00 = 0.0075
        let cost = estimate_cost("openai/gpt-4o", 1000, 500).unwrap();
        assert!((cost - 0.0075).abs() < 1e-12);

        let bare = estimate_cost("gpt-4o", 1000, 500).unwrap();
        assert_eq!(cost, bare);
    }

    #[test]
    fn test_unknown_model_has_no_cost() {
        assert!(estimate_cost("unknown-xyz", 1000, 500).is_none());
    }

    #[test]
    fn test_cost_flows_through_finalize() {
        let mut collector = MetricsCollector::new();
        collector.start();
        let metrics = collector.finalize(Some("gpt-4o-mini"), Some(1_000_000), Some(1_000_000));
        let cost = metrics.estimated_cost.unwrap();
        assert!((cost - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_extract_from_object_chunk() {
        let chunk = Chunk::Object(StreamChunk {
            choices: vec![ChunkChoice {
                delta: Some(ChunkDelta {
                    role: None,
                    content: Some("hello".to_string()),
                }),
            }],
        });
        assert_eq!(extract_chunk_content(&chunk), Some("hello"));
    }

    #[test]
    fn test_extract_from_mapping_chunk() {
        let chunk = Chunk::Mapping(serde_json::json!({
            "choices": [{"delta": {"content": "hi"}}]
        }));
        assert_eq!(extract_chunk_content(&chunk), Some("hi"));
    }

    #[test]
    fn test_extract_role_only_chunk_is_none() {
        let chunk = Chunk::Mapping(serde_json::json!({
            "choices": [{"delta": {"role": "assistant"}}]
        }));
        assert_eq!(extract_chunk_content(&chunk), None);

        let chunk = Chunk::Mapping(serde_json::json!({"choices": []}));
        assert_eq!(extract_chunk_content(&chunk), None);
    }
}
