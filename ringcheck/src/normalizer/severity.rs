//! Requirement category → severity table
//!
//! A tier-declared severity hint always wins. Otherwise the category comes
//! from the statement, then the candidate, then keyword inference over the
//! requirement text; an unknown category is `info`.

use crate::types::Severity;

/// Requirement categories with a fixed severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequirementCategory {
    PhiAtRestEncryption,
    PiiAtRestEncryption,
    TransportEncryption,
    Consent,
    ImpactAssessment,
    AccessControl,
    DataMasking,
    Retention,
    AuditLogging,
    Deletion,
    BreachNotification,
    Documentation,
}

const CATEGORY_TABLE: &[(RequirementCategory, &str, Severity)] = &[
    (RequirementCategory::PhiAtRestEncryption, "phi-at-rest-encryption", Severity::Critical),
    (RequirementCategory::PiiAtRestEncryption, "pii-at-rest-encryption", Severity::Critical),
    (RequirementCategory::TransportEncryption, "transport-encryption", Severity::High),
    (RequirementCategory::Consent, "consent", Severity::High),
    (RequirementCategory::ImpactAssessment, "impact-assessment", Severity::High),
    (RequirementCategory::AccessControl, "access-control", Severity::High),
    (RequirementCategory::DataMasking, "data-masking", Severity::High),
    (RequirementCategory::Retention, "retention", Severity::Medium),
    (RequirementCategory::AuditLogging, "audit-logging", Severity::Medium),
    (RequirementCategory::Deletion, "deletion", Severity::Medium),
    (RequirementCategory::BreachNotification, "breach-notification", Severity::Medium),
    (RequirementCategory::Documentation, "documentation", Severity::Low),
];

const HEALTH_TERMS: &[&str] = &["phi", "hipaa", "health", "medical", "patient", "diagnosis"];
const TRANSPORT_TERMS: &[&str] = &["transit", "transport", "tls", "https", "ssl", "wire"];

impl RequirementCategory {
    /// Parse a category key; `_`, spaces and case are ignored
    pub fn parse(key: &str) -> Option<Self> {
        let key = key.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        CATEGORY_TABLE
            .iter()
            .find(|(_, name, _)| *name == key)
            .map(|(category, _, _)| *category)
    }

    pub fn severity(self) -> Severity {
        CATEGORY_TABLE
            .iter()
            .find(|(category, _, _)| *category == self)
            .map(|(_, _, severity)| *severity)
            .unwrap_or(Severity::Info)
    }

    pub fn key(self) -> &'static str {
        CATEGORY_TABLE
            .iter()
            .find(|(category, _, _)| *category == self)
            .map(|(_, name, _)| *name)
            .unwrap_or("uncategorized")
    }

    /// Infer a category from a topic's action and subject tokens
    pub fn infer(action: Option<&str>, subject: &[String]) -> Option<Self> {
        let has = |terms: &[&str]| subject.iter().any(|t| terms.contains(&t.as_str()));

        match action? {
            "encrypt" if has(TRANSPORT_TERMS) => Some(RequirementCategory::TransportEncryption),
            "encrypt" if has(HEALTH_TERMS) => Some(RequirementCategory::PhiAtRestEncryption),
            "encrypt" => Some(RequirementCategory::PiiAtRestEncryption),
            "consent" => Some(RequirementCategory::Consent),
            "assess" => Some(RequirementCategory::ImpactAssessment),
            "restrict-access" => Some(RequirementCategory::AccessControl),
            "mask" => Some(RequirementCategory::DataMasking),
            "retain" => Some(RequirementCategory::Retention),
            "audit-log" => Some(RequirementCategory::AuditLogging),
            "delete" => Some(RequirementCategory::Deletion),
            "notify" => Some(RequirementCategory::BreachNotification),
            "document" => Some(RequirementCategory::Documentation),
            _ => None,
        }
    }
}

/// Resolve severity for one finding
///
/// # Arguments
/// * `hint` - Tier-declared severity
/// * `categories` - Explicit categories in priority order (statement, candidate)
/// * `inferred` - Category inferred from the topic
pub fn resolve_severity(
    hint: Option<Severity>,
    categories: &[Option<&str>],
    inferred: Option<RequirementCategory>,
) -> Severity {
    if let Some(severity) = hint {
        return severity;
    }
    categories
        .iter()
        .flatten()
        .find_map(|c| RequirementCategory::parse(c))
        .or(inferred)
        .map(RequirementCategory::severity)
        .unwrap_or(Severity::Info)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_table_lookup() {
        assert_eq!(
            RequirementCategory::parse("PII_at_rest_encryption"),
            Some(RequirementCategory::PiiAtRestEncryption)
        );
        assert_eq!(RequirementCategory::Consent.severity(), Severity::High);
        assert_eq!(RequirementCategory::Documentation.severity(), Severity::Low);
        assert_eq!(RequirementCategory::parse("astrology"), None);
    }

    #[test]
    fn test_inference() {
        assert_eq!(
            RequirementCategory::infer(Some("encrypt"), &words("patient record")),
            Some(RequirementCategory::PhiAtRestEncryption)
        );
        assert_eq!(
            RequirementCategory::infer(Some("encrypt"), &words("tls connection")),
            Some(RequirementCategory::TransportEncryption)
        );
        assert_eq!(RequirementCategory::infer(None, &words("anything")), None);
    }

    #[test]
    fn test_hint_overrides_table() {
        let severity = resolve_severity(
            Some(Severity::Low),
            &[Some("phi-at-rest-encryption")],
            None,
        );
        assert_eq!(severity, Severity::Low);
    }

    #[test]
    fn test_statement_category_before_candidate() {
        let severity = resolve_severity(None, &[Some("retention"), Some("consent")], None);
        assert_eq!(severity, Severity::Medium);

        let severity = resolve_severity(None, &[None, Some("consent")], None);
        assert_eq!(severity, Severity::High);
    }

    #[test]
    fn test_uncategorized_is_info() {
        assert_eq!(resolve_severity(None, &[None, Some("misc")], None), Severity::Info);
    }
}
