// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::report::AnomalyType;
use insight_core::Record;

const DISPOSABLE_DOMAINS: [&str; 8] = [
    "mailinator.com",
    "guerrillamail.com",
    "10minutemail.com",
    "tempmail.com",
    "temp-mail.org",
    "throwaway.email",
    "yopmail.com",
    "trashmail.com",
];

const SPAM_TRAP_LOCALS: [&str; 7] = [
    "spamtrap", "spam", "trap", "honeypot", "abuse", "test", "example",
];

const SPAM_TRAP_DOMAINS: [&str; 4] = ["example.com", "example.org", "example.net", "test.com"];

const BOT_MARKERS: [&str; 3] = ["bot", "crawler", "noreply-auto"];

const BOT_DIGIT_RUN: usize = 6;
const BOT_LONG_LOCAL: usize = 20;
const BOT_LONG_LOCAL_DIGIT_RATIO: f64 = 0.4;

/// One pattern check firing on a record.
#[derive(Clone, Debug, PartialEq)]
pub struct PatternHit {
    pub anomaly_type: AnomalyType,
    pub reason: String,
    /// Floor the entity's anomaly score is raised to when this fires.
    pub base_score: f64,
}

/// Fixed pattern checks that run regardless of the chosen algorithm:
/// disposable-domain services, spam-trap naming conventions, bot-like local
/// parts, and non-ASCII content.
pub fn pattern_checks(record: &Record) -> Vec<PatternHit> {
    let Some(email) = record.str_field("email") else {
        return vec![];
    };
    let mut hits = Vec::new();

    let parts = email.rsplit_once('@');
    let local = parts.map(|(l, _)| l).unwrap_or(email);
    let domain = parts.map(|(_, d)| d).unwrap_or("");
    let local_lower = local.to_ascii_lowercase();
    let domain_lower = domain.to_ascii_lowercase();

    if DISPOSABLE_DOMAINS.iter().any(|d| *d == domain_lower) {
        hits.push(PatternHit {
            anomaly_type: AnomalyType::DisposableDomain,
            reason: format!("disposable email service: {domain_lower}"),
            base_score: 0.8,
        });
    }

    let trap_local = SPAM_TRAP_LOCALS
        .iter()
        .any(|l| local_lower == *l || local_lower.starts_with(&format!("{l}.")) || local_lower.starts_with(&format!("{l}_")));
    let trap_domain = SPAM_TRAP_DOMAINS.iter().any(|d| *d == domain_lower);
    if trap_local || trap_domain {
        hits.push(PatternHit {
            anomaly_type: AnomalyType::SpamTrapPattern,
            reason: format!("spam-trap naming convention: {local_lower}@{domain_lower}"),
            base_score: 0.85,
        });
    }

    if looks_bot_like(&local_lower) {
        hits.push(PatternHit {
            anomaly_type: AnomalyType::BotPattern,
            reason: format!("bot-like local part: {local_lower}"),
            base_score: 0.7,
        });
    }

    if !email.is_ascii() {
        hits.push(PatternHit {
            anomaly_type: AnomalyType::NonAsciiContent,
            reason: "address contains non-ASCII characters".to_string(),
            base_score: 0.6,
        });
    }

    hits
}

fn looks_bot_like(local: &str) -> bool {
    if BOT_MARKERS.iter().any(|m| local.contains(m)) {
        return true;
    }

    let mut run = 0usize;
    for c in local.chars() {
        if c.is_ascii_digit() {
            run += 1;
            if run >= BOT_DIGIT_RUN {
                return true;
            }
        } else {
            run = 0;
        }
    }

    let length = local.chars().count();
    if length >= BOT_LONG_LOCAL {
        let digits = local.chars().filter(char::is_ascii_digit).count();
        if digits as f64 / length as f64 > BOT_LONG_LOCAL_DIGIT_RATIO {
            return true;
        }
    }
    false
}
