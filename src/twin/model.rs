//! Twin reference classification
//!
//! Bracketed leaves in a twin-selection expression name either a concrete
//! twin or a digital-twin model. Classification is pluggable because the
//! authoritative answer lives in the twin store; the default classifier
//! recognizes the `dtmi:` model-identifier shape and assumes everything
//! else is a twin id.

use regex::Regex;
use std::sync::OnceLock;

/// What a referenced name denotes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwinRefKind {
    /// A literal twin id, matched on `$dtId`
    TwinId,
    /// A model id in `dtmi:...;N` form, matched with `IS_OF_MODEL`
    ModelId,
    /// Neither; the reference only makes sense client-side
    Other,
}

/// Classifies names found in twin-selection expressions
///
/// Implemented by the caller over its twin store or cache; the visitor
/// only sees the verdicts.
pub trait TwinClassifier {
    fn classify(&self, name: &str) -> TwinRefKind;
}

/// Pattern-based classifier: `dtmi:` ids are models, the rest are twins
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultClassifier;

fn model_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^dtmi:[A-Za-z0-9_:]+;[0-9]+$").expect("model id pattern is valid")
    })
}

impl TwinClassifier for DefaultClassifier {
    fn classify(&self, name: &str) -> TwinRefKind {
        if model_id_pattern().is_match(name) {
            TwinRefKind::ModelId
        } else {
            TwinRefKind::TwinId
        }
    }
}

/// Escape single quotes for inclusion in a query string
pub fn safe_id(id: &str) -> String {
    id.replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_model_ids() {
        let classifier = DefaultClassifier;
        assert_eq!(
            classifier.classify("dtmi:com:example:AirHandlingUnit;1"),
            TwinRefKind::ModelId
        );
        assert_eq!(
            classifier.classify("dtmi:com:example:Zone;12"),
            TwinRefKind::ModelId
        );
    }

    #[test]
    fn test_classify_twin_ids() {
        let classifier = DefaultClassifier;
        assert_eq!(classifier.classify("MS-PS-B122"), TwinRefKind::TwinId);
        // Missing version suffix is not a model id
        assert_eq!(
            classifier.classify("dtmi:com:example:Zone"),
            TwinRefKind::TwinId
        );
    }

    #[test]
    fn test_safe_id_escapes_quotes() {
        assert_eq!(safe_id("O'Hare-T1"), "O\\'Hare-T1");
        assert_eq!(safe_id("plain"), "plain");
    }
}
