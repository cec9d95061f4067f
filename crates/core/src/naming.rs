//! # Naming Resolver
//!
//! Deterministic names derived from scenario text: the feature label, the
//! generated file name, test identifiers, and branch names. Nothing here
//! reads the clock except through an explicit timestamp argument.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

use crate::schema::TargetLanguage;

/// Maximum length of a feature label taken from the first line
const FIRST_LINE_LIMIT: usize = 50;

/// Maximum length of the feature part of a branch name
const BRANCH_SLUG_LIMIT: usize = 20;

fn feature_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Feature:\s*(.+)").expect("feature marker regex"))
}

fn non_alphanumeric_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("slug regex"))
}

fn proposal_url() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^\s'"<>)\]]+"#).expect("url regex"))
}

fn proposal_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/pull/(\d+)").expect("pull number regex"))
}

/// Feature label of a scenario.
///
/// Uses an explicit `Feature:` marker when present, otherwise the first
/// non-blank line truncated to 50 characters.
pub fn feature_label(scenario_text: &str) -> String {
    if let Some(caps) = feature_marker().captures(scenario_text) {
        return caps[1].trim().to_string();
    }

    let first_line = scenario_text.trim().lines().next().unwrap_or_default();
    first_line
        .chars()
        .take(FIRST_LINE_LIMIT)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Lower-case, underscore-joined token for a label
pub fn token(label: &str) -> String {
    let lower = label.to_lowercase();
    non_alphanumeric_runs()
        .replace_all(&lower, "_")
        .trim_matches('_')
        .to_string()
}

/// File name for the test generated from `scenario_text`
pub fn test_file_name(scenario_text: &str, language: TargetLanguage) -> String {
    let token = token(&feature_label(scenario_text));
    let token = if token.is_empty() {
        "scenario".to_string()
    } else {
        token
    };
    format!("test_{}.{}", token, language.extension())
}

/// Test function identifier for a scenario name
pub fn test_identifier(scenario_name: &str) -> String {
    let name: String = scenario_name
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    format!("test_{}", name)
}

/// Test class identifier for a feature name
pub fn class_identifier(feature_name: &str) -> String {
    let name: String = feature_name
        .split_whitespace()
        .map(capitalize)
        .collect::<String>()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();
    format!("Test{}", name)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Hyphenated slug of a feature label, capped for branch names
pub fn branch_slug(feature: &str) -> String {
    let lower: String = feature.to_lowercase().chars().take(BRANCH_SLUG_LIMIT).collect();
    non_alphanumeric_runs()
        .replace_all(&lower, "-")
        .trim_matches('-')
        .to_string()
}

/// Branch name of the form `{prefix}-{slug}-{YYYYMMDD-HHMMSS}`
pub fn branch_name(prefix: &str, feature: &str, at: DateTime<Utc>) -> String {
    let timestamp = at.format("%Y%m%d-%H%M%S");
    let slug = branch_slug(feature);
    if slug.is_empty() {
        format!("{}-{}", prefix, timestamp)
    } else {
        format!("{}-{}-{}", prefix, slug, timestamp)
    }
}

/// First URL in a command's output
pub fn find_proposal_url(output: &str) -> Option<String> {
    proposal_url()
        .find(output)
        .map(|m| m.as_str().trim_end_matches(['.', ',']).to_string())
}

/// Trailing numeric identifier of a proposal URL, if any
pub fn proposal_number(url: &str) -> Option<u64> {
    proposal_number_re()
        .captures_iter(url)
        .last()
        .and_then(|caps| caps[1].parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_feature_marker_wins() {
        let text = "Feature: Login\nScenario: succeeds";
        assert_eq!(feature_label(text), "Login");
        assert_eq!(test_file_name(text, TargetLanguage::Python), "test_login.py");
    }

    #[test]
    fn test_first_line_fallback_is_truncated() {
        let text = "  Verify that the create policy API rejects descriptions over the limit\nmore";
        let label = feature_label(text);
        assert_eq!(label.chars().count(), 50);
        assert!(label.starts_with("Verify that the create policy"));
    }

    #[test]
    fn test_file_name_is_deterministic() {
        let text = "Feature: Create Policy API -- description field\nScenario: too long";
        let first = test_file_name(text, TargetLanguage::Python);
        let second = test_file_name(text, TargetLanguage::Python);
        assert_eq!(first, second);
        assert_eq!(first, "test_create_policy_api_description_field.py");
    }

    #[test]
    fn test_different_features_different_names() {
        let a = test_file_name("Feature: Login\n", TargetLanguage::Python);
        let b = test_file_name("Feature: Logout\n", TargetLanguage::Python);
        assert_ne!(a, b);
    }

    #[test]
    fn test_token_collapses_and_trims() {
        assert_eq!(token("  __Shopping   Cart!!__ "), "shopping_cart");
        assert_eq!(token("!!!"), "");
        assert_eq!(test_file_name("!!!", TargetLanguage::Python), "test_scenario.py");
    }

    #[test]
    fn test_branch_name_format() {
        let at = Utc.with_ymd_and_hms(2026, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            branch_name("test/auto-generated", "User Login Page", at),
            "test/auto-generated-user-login-page-20260309-140507"
        );
        assert_eq!(
            branch_name("test/auto-generated", "A very long feature name indeed", at),
            "test/auto-generated-a-very-long-feature-20260309-140507"
        );
        assert_eq!(
            branch_name("test/auto-generated", "", at),
            "test/auto-generated-20260309-140507"
        );
    }

    #[test]
    fn test_proposal_url_and_number() {
        let out = "Creating pull request for x into main\n\nhttps://github.com/acme/shop/pull/128\n";
        let url = find_proposal_url(out).unwrap();
        assert_eq!(url, "https://github.com/acme/shop/pull/128");
        assert_eq!(proposal_number(&url), Some(128));
        assert_eq!(proposal_number("https://gitlab.example/merge/abc"), None);
        assert!(find_proposal_url("no link here").is_none());
    }
}
