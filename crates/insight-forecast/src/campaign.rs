// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use insight_core::{clamp_unit, EngineError, Record};
use serde::{Deserialize, Serialize};
use tracing::debug;

const AB_SIGNIFICANCE_Z: f64 = 1.96;

/// Benchmark rates applied before content adjustments.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRates {
    pub open_rate: f64,
    pub click_rate: f64,
    pub conversion_rate: f64,
}

const DEFAULT_BENCHMARK: BenchmarkRates = BenchmarkRates {
    open_rate: 0.21,
    click_rate: 0.026,
    conversion_rate: 0.004,
};

fn industry_benchmark(industry: Option<&str>) -> BenchmarkRates {
    match industry.map(str::to_ascii_lowercase).as_deref() {
        Some("software") | Some("saas") | Some("technology") => BenchmarkRates {
            open_rate: 0.22,
            click_rate: 0.029,
            conversion_rate: 0.005,
        },
        Some("retail") | Some("ecommerce") => BenchmarkRates {
            open_rate: 0.18,
            click_rate: 0.022,
            conversion_rate: 0.006,
        },
        Some("finance") | Some("insurance") => BenchmarkRates {
            open_rate: 0.24,
            click_rate: 0.027,
            conversion_rate: 0.004,
        },
        Some("manufacturing") | Some("industrial") => BenchmarkRates {
            open_rate: 0.2,
            click_rate: 0.024,
            conversion_rate: 0.003,
        },
        _ => DEFAULT_BENCHMARK,
    }
}

/// Expected outcomes for one planned campaign.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CampaignForecast {
    pub entity_id: String,
    pub open_rate: f64,
    pub click_rate: f64,
    pub conversion_rate: f64,
    pub expected_opens: f64,
    pub expected_clicks: f64,
    pub expected_conversions: f64,
    pub expected_revenue: f64,
    pub expected_cost: f64,
    pub roi: f64,
    /// Which content adjustments fired, with their multipliers.
    pub adjustments: Vec<(String, f64)>,
}

/// Verdict of a two-arm conversion test.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AbTestEvaluation {
    pub z_score: f64,
    pub significant: bool,
    pub winner: Option<String>,
    pub recommendation: String,
}

/// Economics used to turn rates into volume outcomes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CampaignEconomics {
    pub revenue_per_conversion: f64,
    pub cost_per_send: f64,
}

impl Default for CampaignEconomics {
    fn default() -> Self {
        Self {
            revenue_per_conversion: 50.0,
            cost_per_send: 0.002,
        }
    }
}

/// Applies content/feature multipliers to industry benchmark rates and
/// derives expected volume outcomes and ROI.
pub struct CampaignPredictor {
    economics: CampaignEconomics,
}

impl Default for CampaignPredictor {
    fn default() -> Self {
        Self::new(CampaignEconomics::default()).expect("default economics are valid")
    }
}

impl CampaignPredictor {
    pub fn new(economics: CampaignEconomics) -> Result<Self, EngineError> {
        if !economics.revenue_per_conversion.is_finite()
            || economics.revenue_per_conversion < 0.0
            || !economics.cost_per_send.is_finite()
            || economics.cost_per_send < 0.0
        {
            return Err(EngineError::invalid_input(
                "campaign economics must be finite and >= 0",
            ));
        }
        Ok(Self { economics })
    }

    /// Predicts expected outcomes for one campaign record sent to `volume`
    /// recipients.
    pub fn predict(&self, record: &Record, volume: u64) -> Result<CampaignForecast, EngineError> {
        if volume == 0 {
            return Err(EngineError::invalid_input(
                "campaign volume must be >= 1",
            ));
        }

        let benchmark = industry_benchmark(record.str_field("industry"));
        let adjustments = content_adjustments(record);
        let multiplier: f64 = adjustments.iter().map(|(_, m)| m).product();

        let open_rate = clamp_unit(benchmark.open_rate * multiplier);
        let click_rate = clamp_unit(benchmark.click_rate * multiplier);
        let conversion_rate = clamp_unit(benchmark.conversion_rate * multiplier);

        let volume_f = volume as f64;
        let expected_conversions = conversion_rate * volume_f;
        let expected_revenue = expected_conversions * self.economics.revenue_per_conversion;
        let expected_cost = volume_f * self.economics.cost_per_send;
        let roi = if expected_cost > 0.0 {
            (expected_revenue - expected_cost) / expected_cost
        } else {
            0.0
        };

        debug!(
            entity = %record.id,
            open_rate, conversion_rate, roi, "campaign outcome predicted"
        );
        Ok(CampaignForecast {
            entity_id: record.id.clone(),
            open_rate,
            click_rate,
            conversion_rate,
            expected_opens: open_rate * volume_f,
            expected_clicks: click_rate * volume_f,
            expected_conversions,
            expected_revenue,
            expected_cost,
            roi,
            adjustments,
        })
    }

    /// Pooled two-proportion z-test over two arms with a shared per-arm
    /// sample size. Significance requires |z| > 1.96; anything less is a
    /// recommendation to keep testing.
    pub fn evaluate_ab_test(
        &self,
        conversions_a: u64,
        conversions_b: u64,
        sample_size: u64,
    ) -> Result<AbTestEvaluation, EngineError> {
        if sample_size == 0 {
            return Err(EngineError::invalid_input("sample_size must be >= 1"));
        }
        if conversions_a > sample_size || conversions_b > sample_size {
            return Err(EngineError::invalid_input(
                "conversions cannot exceed the arm sample size",
            ));
        }

        let n = sample_size as f64;
        let p_a = conversions_a as f64 / n;
        let p_b = conversions_b as f64 / n;
        let pooled = (conversions_a + conversions_b) as f64 / (2.0 * n);
        let variance = pooled * (1.0 - pooled) * (2.0 / n);
        let z = if variance > 0.0 {
            (p_b - p_a) / variance.sqrt()
        } else {
            0.0
        };

        let significant = z.abs() > AB_SIGNIFICANCE_Z;
        let (winner, recommendation) = if !significant {
            (
                None,
                "no significant difference yet; continue the test".to_string(),
            )
        } else if z > 0.0 {
            (
                Some("treatment".to_string()),
                format!("treatment wins at z={z:.2}; roll out the variant"),
            )
        } else {
            (
                Some("control".to_string()),
                format!("control wins at z={z:.2}; keep the original"),
            )
        };

        Ok(AbTestEvaluation {
            z_score: z,
            significant,
            winner,
            recommendation,
        })
    }
}

/// Multipliers for the content features the predictor understands.
fn content_adjustments(record: &Record) -> Vec<(String, f64)> {
    let mut adjustments = Vec::new();

    if let Some(subject) = record.str_field("subject") {
        let length = subject.chars().count();
        let (label, multiplier) = if (30..=60).contains(&length) {
            ("subject_length_optimal", 1.1)
        } else if length > 100 {
            ("subject_length_long", 0.85)
        } else if length < 10 {
            ("subject_length_short", 0.9)
        } else {
            ("subject_length_neutral", 1.0)
        };
        adjustments.push((label.to_string(), multiplier));
    }

    if record.bool_field("personalized") == Some(true) {
        adjustments.push(("personalization".to_string(), 1.15));
    }

    if let Some(cta) = record.f64_field("cta_count") {
        let multiplier = if (1.0..=3.0).contains(&cta) {
            1.05
        } else if cta > 5.0 {
            0.9
        } else {
            1.0
        };
        adjustments.push(("cta_count".to_string(), multiplier));
    }

    if let Some(images) = record.f64_field("image_count") {
        let multiplier = if (1.0..=5.0).contains(&images) {
            1.03
        } else if images > 10.0 {
            0.92
        } else {
            1.0
        };
        adjustments.push(("image_count".to_string(), multiplier));
    }

    if let Some(segment) = record.f64_field("segment_size") {
        let multiplier = if segment < 1_000.0 {
            1.05
        } else if segment > 100_000.0 {
            0.95
        } else {
            1.0
        };
        adjustments.push(("segmentation".to_string(), multiplier));
    }

    adjustments
}
