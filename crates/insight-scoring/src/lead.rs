// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::factors::{combine, reasons_from_factors, FactorWeights, ScoreResult};
use insight_core::{clamp_unit, EngineError, Record};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

const PLATINUM_CUTOFF: f64 = 0.85;
const GOLD_CUTOFF: f64 = 0.7;
const SILVER_CUTOFF: f64 = 0.5;
const BRONZE_CUTOFF: f64 = 0.3;

/// Relevance score when no profile keyword matches the lead's industry.
const RELEVANCE_BASELINE: f64 = 0.3;
const RELEVANCE_MATCH: f64 = 0.9;

/// Fields the completeness factor expects on a lead record.
const COMPLETENESS_FIELDS: [&str; 5] = ["email", "industry", "company_size", "country", "open_rate"];

const SIZE_LEVELS: [&str; 5] = ["micro", "small", "medium", "large", "enterprise"];

/// Discrete lead bucket derived from the continuous score.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadTier {
    Unqualified,
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl LeadTier {
    pub fn from_score(score: f64) -> Self {
        if score >= PLATINUM_CUTOFF {
            Self::Platinum
        } else if score >= GOLD_CUTOFF {
            Self::Gold
        } else if score >= SILVER_CUTOFF {
            Self::Silver
        } else if score >= BRONZE_CUTOFF {
            Self::Bronze
        } else {
            Self::Unqualified
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Platinum => "platinum",
            Self::Gold => "gold",
            Self::Silver => "silver",
            Self::Bronze => "bronze",
            Self::Unqualified => "unqualified",
        }
    }
}

/// Strictly ordered priority cutoffs: high > medium > low.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriorityThresholds {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for PriorityThresholds {
    fn default() -> Self {
        Self {
            high: 0.8,
            medium: 0.5,
            low: 0.3,
        }
    }
}

impl PriorityThresholds {
    pub fn validate(&self) -> Result<(), EngineError> {
        for (name, value) in [
            ("high", self.high),
            ("medium", self.medium),
            ("low", self.low),
        ] {
            if !value.is_finite() {
                return Err(EngineError::invalid_input(format!(
                    "priority threshold {name} must be finite, got {value}"
                )));
            }
        }
        if !(self.high > self.medium && self.medium > self.low) {
            return Err(EngineError::invalid_input(format!(
                "priority thresholds must satisfy high > medium > low, got high={}, medium={}, low={}",
                self.high, self.medium, self.low
            )));
        }
        Ok(())
    }

    pub fn priority(&self, score: f64) -> &'static str {
        if score >= self.high {
            "high"
        } else if score >= self.medium {
            "medium"
        } else if score >= self.low {
            "low"
        } else {
            "none"
        }
    }
}

/// Vertical-specific scoring profile selected per call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeadProfile {
    pub name: String,
    pub industry_keywords: Vec<String>,
    pub target_geographies: Vec<String>,
    /// Minimum size-bucket index into micro..enterprise.
    pub min_company_size: usize,
    pub geography_multiplier: f64,
    pub manufacturer_multiplier: f64,
}

impl LeadProfile {
    fn validate(&self) -> Result<(), EngineError> {
        if self.name.is_empty() {
            return Err(EngineError::invalid_input("profile name must be non-empty"));
        }
        if self.min_company_size >= SIZE_LEVELS.len() {
            return Err(EngineError::invalid_input(format!(
                "profile {} min_company_size must index the {} size levels",
                self.name,
                SIZE_LEVELS.len()
            )));
        }
        for (label, value) in [
            ("geography_multiplier", self.geography_multiplier),
            ("manufacturer_multiplier", self.manufacturer_multiplier),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::invalid_input(format!(
                    "profile {} {label} must be finite and >= 0, got {value}",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

fn builtin_profiles() -> Vec<LeadProfile> {
    vec![
        LeadProfile {
            name: "b2b-saas".to_string(),
            industry_keywords: vec![
                "software".to_string(),
                "saas".to_string(),
                "technology".to_string(),
                "cloud".to_string(),
                "it services".to_string(),
            ],
            target_geographies: vec!["US".to_string(), "CA".to_string(), "GB".to_string()],
            min_company_size: 1,
            geography_multiplier: 1.15,
            manufacturer_multiplier: 1.0,
        },
        LeadProfile {
            name: "manufacturing".to_string(),
            industry_keywords: vec![
                "manufacturing".to_string(),
                "industrial".to_string(),
                "automotive".to_string(),
                "machinery".to_string(),
            ],
            target_geographies: vec!["US".to_string(), "DE".to_string(), "JP".to_string()],
            min_company_size: 2,
            geography_multiplier: 1.1,
            manufacturer_multiplier: 1.1,
        },
        LeadProfile {
            name: "ecommerce".to_string(),
            industry_keywords: vec![
                "retail".to_string(),
                "ecommerce".to_string(),
                "consumer goods".to_string(),
                "marketplace".to_string(),
            ],
            target_geographies: vec!["US".to_string(), "GB".to_string(), "AU".to_string()],
            min_company_size: 0,
            geography_multiplier: 1.1,
            manufacturer_multiplier: 1.0,
        },
    ]
}

/// Profile-driven weighted lead scorer.
#[derive(Debug)]
pub struct LeadScoringEngine {
    weights: FactorWeights,
    profiles: HashMap<String, LeadProfile>,
    thresholds: PriorityThresholds,
}

impl Default for LeadScoringEngine {
    fn default() -> Self {
        Self::new(PriorityThresholds::default()).expect("builtin lead configuration is valid")
    }
}

impl LeadScoringEngine {
    pub fn new(thresholds: PriorityThresholds) -> Result<Self, EngineError> {
        thresholds.validate()?;
        let weights = FactorWeights::new(
            [
                ("company_relevance".to_string(), 0.3),
                ("company_size".to_string(), 0.2),
                ("geography".to_string(), 0.2),
                ("engagement".to_string(), 0.2),
                ("data_completeness".to_string(), 0.1),
            ]
            .into_iter()
            .collect(),
        )?;
        let mut engine = Self {
            weights,
            profiles: HashMap::new(),
            thresholds,
        };
        for profile in builtin_profiles() {
            engine.register_profile(profile)?;
        }
        Ok(engine)
    }

    /// Adds or replaces a named profile after validation.
    pub fn register_profile(&mut self, profile: LeadProfile) -> Result<(), EngineError> {
        profile.validate()?;
        self.profiles.insert(profile.name.clone(), profile);
        Ok(())
    }

    pub fn profile_names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }

    /// Scores one lead under the named profile.
    pub fn score(&self, profile_name: &str, record: &Record) -> Result<ScoreResult, EngineError> {
        let profile = self
            .profiles
            .get(profile_name)
            .ok_or_else(|| EngineError::unknown_profile(profile_name))?;

        let mut values: BTreeMap<String, Option<f64>> = BTreeMap::new();
        values.insert(
            "company_relevance".to_string(),
            Some(company_relevance(record, profile)),
        );
        values.insert("company_size".to_string(), company_size_score(record, profile));
        let geography_match = record
            .str_field("country")
            .map(|country| {
                profile
                    .target_geographies
                    .iter()
                    .any(|g| g.eq_ignore_ascii_case(country))
            });
        values.insert(
            "geography".to_string(),
            geography_match.map(|matched| if matched { 1.0 } else { 0.2 }),
        );
        values.insert("engagement".to_string(), engagement_signal(record));
        values.insert(
            "data_completeness".to_string(),
            Some(completeness(record)),
        );

        let mut bonuses = Vec::new();
        if geography_match == Some(true) && profile.geography_multiplier != 1.0 {
            bonuses.push(("geography_match".to_string(), profile.geography_multiplier));
        }
        if record.bool_field("is_manufacturer") == Some(true)
            && profile.manufacturer_multiplier != 1.0
        {
            bonuses.push(("manufacturer".to_string(), profile.manufacturer_multiplier));
        }

        let (total, factors) = combine(&self.weights, &values, &bonuses)?;
        let total = clamp_unit(total);
        let tier = LeadTier::from_score(total);

        let mut reasons = reasons_from_factors(&factors);
        for (name, multiplier) in &bonuses {
            reasons.push(format!("bonus applied: {name} (x{multiplier})"));
        }

        debug!(
            entity = %record.id,
            profile = profile_name,
            total,
            tier = tier.as_str(),
            "scored lead"
        );
        Ok(ScoreResult {
            entity_id: record.id.clone(),
            total,
            tier: tier.as_str().to_string(),
            factors,
            reasons,
            recommendation: format!(
                "{} priority follow-up",
                self.thresholds.priority(total)
            ),
        })
    }
}

fn company_relevance(record: &Record, profile: &LeadProfile) -> f64 {
    let Some(industry) = record.str_field("industry") else {
        return RELEVANCE_BASELINE;
    };
    let industry_lower = industry.to_ascii_lowercase();
    let matched = profile
        .industry_keywords
        .iter()
        .any(|keyword| industry_lower.contains(keyword.as_str()));
    if matched {
        RELEVANCE_MATCH
    } else {
        RELEVANCE_BASELINE
    }
}

fn company_size_score(record: &Record, profile: &LeadProfile) -> Option<f64> {
    let size = record.str_field("company_size")?;
    let index = SIZE_LEVELS
        .iter()
        .position(|level| level.eq_ignore_ascii_case(size))?;
    if index < profile.min_company_size {
        return Some(0.2);
    }
    // Meeting the minimum scores 0.6; each level above it adds headroom.
    let above = (index - profile.min_company_size) as f64;
    let max_above = (SIZE_LEVELS.len() - 1 - profile.min_company_size).max(1) as f64;
    Some(0.6 + 0.4 * (above / max_above))
}

fn engagement_signal(record: &Record) -> Option<f64> {
    let open = record.f64_field("open_rate");
    let click = record.f64_field("click_rate");
    match (open, click) {
        (Some(open), Some(click)) => Some(clamp_unit(0.6 * open + 0.4 * (click * 5.0))),
        (Some(open), None) => Some(clamp_unit(open)),
        (None, Some(click)) => Some(clamp_unit(click * 5.0)),
        (None, None) => None,
    }
}

fn completeness(record: &Record) -> f64 {
    let present = COMPLETENESS_FIELDS
        .iter()
        .filter(|field| record.has_field(field))
        .count();
    present as f64 / COMPLETENESS_FIELDS.len() as f64
}
