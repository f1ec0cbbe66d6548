/// Reconcile engine — Canonical Result Hashing
///
/// Deterministic canonical serialization + SHA-256 of a `PlanResult`.
/// Two passes with the same outcomes produce byte-identical output no matter
/// which order their top-level Steps were evaluated in.
///
/// Rules:
///   - format_version first
///   - Steps sorted by name (UTF-8 byte order)
///   - Step fields in fixed order: name, outcome, message
///   - UTF-8 JSON, no whitespace

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::domain::PlanResult;
use crate::RESULT_FORMAT_VERSION;

/// Canonical serialization of a PlanResult to UTF-8 JSON bytes.
pub fn canonical_serialize(result: &PlanResult) -> Vec<u8> {
    build_canonical_value(result).to_string().into_bytes()
}

/// SHA-256 of canonical serialization. Lowercase hex string.
pub fn canonical_hash(result: &PlanResult) -> String {
    let digest = Sha256::digest(canonical_serialize(result));
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Field order: format_version, steps, fully_reconciled.
fn build_canonical_value(result: &PlanResult) -> Value {
    // BTreeMap is already sorted by name
    let steps: Vec<Value> = result
        .results
        .iter()
        .map(|(name, r)| {
            let mut step = Map::new();
            step.insert("name".to_string(), Value::String(name.clone()));
            step.insert(
                "outcome".to_string(),
                Value::String(r.outcome.as_str().to_string()),
            );
            step.insert("message".to_string(), Value::String(r.message.clone()));
            Value::Object(step)
        })
        .collect();

    let mut root = Map::new();
    root.insert(
        "format_version".to_string(),
        Value::Number(RESULT_FORMAT_VERSION.into()),
    );
    root.insert("steps".to_string(), Value::Array(steps));
    root.insert(
        "fully_reconciled".to_string(),
        Value::Bool(result.fully_reconciled),
    );
    Value::Object(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StepResult;

    #[test]
    fn insertion_order_does_not_matter() {
        let mut a = PlanResult::default();
        a.record("zeta", StepResult::satisfied("ok"));
        a.record("alpha", StepResult::pending("creating"));

        let mut b = PlanResult::default();
        b.record("alpha", StepResult::pending("creating"));
        b.record("zeta", StepResult::satisfied("ok"));

        assert_eq!(canonical_serialize(&a), canonical_serialize(&b));
        assert_eq!(canonical_hash(&a), canonical_hash(&b));
        assert_eq!(canonical_hash(&a).len(), 64);
    }

    #[test]
    fn message_changes_hash() {
        let mut a = PlanResult::default();
        a.record("alpha", StepResult::pending("creating"));
        let mut b = PlanResult::default();
        b.record("alpha", StepResult::pending("created 1/3"));
        assert_ne!(canonical_hash(&a), canonical_hash(&b));
    }
}
