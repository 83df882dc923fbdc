//! Shared factories for unit tests.

use crate::index::builder::build_index;
use crate::index::LicenseIndex;
use crate::models::Rule;

pub(crate) fn make_rule(identifier: &str, license_expression: &str, text: &str) -> Rule {
    Rule {
        identifier: identifier.to_string(),
        license_expression: license_expression.to_string(),
        text: text.to_string(),
        relevance: 100,
        minimum_coverage: 100,
        is_license_text: false,
        is_license_notice: false,
        is_license_tag: false,
        is_license_reference: false,
        is_continuous: false,
        is_false_positive: false,
        notes: None,
    }
}

pub(crate) fn make_rule_with_coverage(
    identifier: &str,
    license_expression: &str,
    text: &str,
    minimum_coverage: u8,
) -> Rule {
    Rule {
        minimum_coverage,
        ..make_rule(identifier, license_expression, text)
    }
}

pub(crate) fn make_false_positive(identifier: &str, text: &str) -> Rule {
    Rule {
        is_false_positive: true,
        ..make_rule(identifier, "unknown", text)
    }
}

pub(crate) fn build_test_index(rules: Vec<Rule>) -> LicenseIndex {
    build_index(rules).unwrap()
}
