//! Model pricing and cost estimation
//!
//! Static pricing table (USD per 1M tokens) for the models served by the
//! four configured backends, with conservative default rates for anything
//! not in the table.

use crate::providers::Backend;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default cost per 1M input tokens (USD) for unknown models
pub const DEFAULT_INPUT_COST_PER_MILLION: f64 = 5.0;

/// Default cost per 1M output tokens (USD) for unknown models
pub const DEFAULT_OUTPUT_COST_PER_MILLION: f64 = 15.0;

/// Pricing information for a model (per 1M tokens)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Model name
    pub model: String,
    /// Backend serving this model
    pub backend: Backend,
    /// Cost per 1M input tokens (USD)
    pub input_cost_per_million: f64,
    /// Cost per 1M output tokens (USD)
    pub output_cost_per_million: f64,
}

impl ModelPricing {
    /// Calculate cost for given token counts
    #[must_use]
    pub fn calculate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        let input_cost = (input_tokens as f64 / 1_000_000.0) * self.input_cost_per_million;
        let output_cost = (output_tokens as f64 / 1_000_000.0) * self.output_cost_per_million;
        input_cost + output_cost
    }
}

fn entry(model: &str, backend: Backend, input: f64, output: f64) -> (String, ModelPricing) {
    (
        model.to_string(),
        ModelPricing {
            model: model.to_string(),
            backend,
            input_cost_per_million: input,
            output_cost_per_million: output,
        },
    )
}

/// Default pricing for the models of the four backend families
#[must_use]
pub fn default_pricing() -> HashMap<String, ModelPricing> {
    HashMap::from([
        // Google Gemini
        entry("gemini-2.5-flash-lite", Backend::Gemini, 0.10, 0.40),
        entry("gemini-2.5-flash", Backend::Gemini, 0.075, 0.60),
        entry("gemini-2.5-pro", Backend::Gemini, 1.25, 15.00),
        // OpenAI
        entry("gpt-4o-mini", Backend::OpenAi, 0.15, 0.60),
        entry("gpt-4o", Backend::OpenAi, 2.50, 10.00),
        // Anthropic
        entry("claude-3-5-haiku-20241022", Backend::Anthropic, 0.25, 1.25),
        entry("claude-sonnet-4-20250514", Backend::Anthropic, 3.00, 15.00),
        // OpenRouter
        entry(
            "meta-llama/llama-3.1-70b-instruct",
            Backend::OpenRouter,
            0.35,
            0.40,
        ),
        entry("google/gemini-flash-1.5", Backend::OpenRouter, 0.075, 0.30),
        entry("openai/gpt-4o-mini", Backend::OpenRouter, 0.15, 0.60),
    ])
}

/// Cost model backed by the static pricing table.
///
/// Immutable after construction; adapters share one instance behind an
/// `Arc` and call [`CostModel::estimate_cost`] with their configured model.
#[derive(Debug)]
pub struct CostModel {
    pricing: HashMap<String, ModelPricing>,
}

impl Default for CostModel {
    fn default() -> Self {
        Self::new()
    }
}

impl CostModel {
    /// Create a cost model with the default pricing table
    #[must_use]
    pub fn new() -> Self {
        Self {
            pricing: default_pricing(),
        }
    }

    /// Add or override a pricing entry
    #[must_use]
    pub fn with_pricing(mut self, pricing: ModelPricing) -> Self {
        self.pricing.insert(pricing.model.clone(), pricing);
        self
    }

    /// Get pricing for a model, if known
    #[must_use]
    pub fn pricing_for(&self, model: &str) -> Option<&ModelPricing> {
        self.pricing.get(model)
    }

    /// Estimate cost for a call in USD.
    ///
    /// Unknown models are charged at conservative default rates so the
    /// estimate is always finite and non-negative.
    #[must_use]
    pub fn estimate_cost(&self, model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
        if let Some(pricing) = self.pricing.get(model) {
            pricing.calculate_cost(input_tokens, output_tokens)
        } else {
            (input_tokens as f64 / 1_000_000.0) * DEFAULT_INPUT_COST_PER_MILLION
                + (output_tokens as f64 / 1_000_000.0) * DEFAULT_OUTPUT_COST_PER_MILLION
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_cost_is_linear() {
        let pricing = ModelPricing {
            model: "test-model".to_string(),
            backend: Backend::OpenAi,
            input_cost_per_million: 10.0,
            output_cost_per_million: 20.0,
        };

        let cost = pricing.calculate_cost(1_000_000, 1_000_000);
        assert!((cost - 30.0).abs() < 1e-9);

        let cost = pricing.calculate_cost(1_000, 1_000);
        assert!((cost - 0.03).abs() < 1e-9);

        // Doubling both counts doubles the cost
        let single = pricing.calculate_cost(500, 700);
        let double = pricing.calculate_cost(1_000, 1_400);
        assert!((double - 2.0 * single).abs() < 1e-12);
    }

    #[test]
    fn test_estimate_cost_zero_tokens_is_free() {
        let model = CostModel::new();
        assert_eq!(model.estimate_cost("gpt-4o-mini", 0, 0), 0.0);
        assert_eq!(model.estimate_cost("unknown-model", 0, 0), 0.0);
    }

    #[test]
    fn test_estimate_cost_unknown_model_uses_defaults() {
        let model = CostModel::new();
        let cost = model.estimate_cost("unknown-model", 1_000_000, 1_000_000);
        assert!(cost.is_finite());
        assert!(
            (cost - (DEFAULT_INPUT_COST_PER_MILLION + DEFAULT_OUTPUT_COST_PER_MILLION)).abs()
                < 1e-9
        );
    }

    #[test]
    fn test_default_pricing_covers_all_backends() {
        let model = CostModel::new();

        assert!(model.pricing_for("gemini-2.5-flash").is_some());
        assert!(model.pricing_for("gpt-4o-mini").is_some());
        assert!(model.pricing_for("claude-3-5-haiku-20241022").is_some());
        assert!(model
            .pricing_for("meta-llama/llama-3.1-70b-instruct")
            .is_some());
    }

    #[test]
    fn test_with_pricing_overrides_entry() {
        let model = CostModel::new().with_pricing(ModelPricing {
            model: "gpt-4o-mini".to_string(),
            backend: Backend::OpenAi,
            input_cost_per_million: 1.0,
            output_cost_per_million: 2.0,
        });

        let cost = model.estimate_cost("gpt-4o-mini", 1_000_000, 1_000_000);
        assert!((cost - 3.0).abs() < 1e-9);
    }
}
