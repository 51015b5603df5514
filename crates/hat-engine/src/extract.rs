//! Extraction of values from a call's result record into the host's store.

use crate::error::ExtractionError;
use crate::route::Extractor;
use crate::store::StateStore;
use serde_json::Value;

/// Section of the record that paths may omit.
const RESPONSE_SECTION: &str = "response";

impl Extractor {
    /// Walk this extractor's path through `record`.
    ///
    /// Mapping nodes are addressed by key and sequence nodes by integer
    /// index. A path whose first segment is not a top-level field is resolved
    /// against the `response` section, so `body-object.id` and
    /// `response.body-object.id` address the same value.
    pub fn value_from(&self, record: &Value) -> Result<Value, ExtractionError> {
        let root = match (record.get(RESPONSE_SECTION), self.path_parts().next()) {
            (Some(response), Some(first)) if record.get(first).is_none() => response,
            _ => record,
        };

        let mut current = root;
        for part in self.path_parts() {
            let next = match current {
                Value::Object(map) => map.get(part),
                Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            current = next.ok_or_else(|| ExtractionError::Unresolvable {
                path: self.path.clone(),
                segment: part.to_string(),
            })?;
        }
        Ok(current.clone())
    }
}

/// Apply every extractor in order, overwriting existing keys.
///
/// Stops at the first unresolvable path; values written by earlier
/// extractors stay in the store.
pub fn apply_extractors(
    extractors: &[Extractor],
    record: &Value,
    store: &mut StateStore,
) -> Result<(), ExtractionError> {
    for extractor in extractors {
        let value = extractor.value_from(record)?;
        store.insert(extractor.key.clone(), value);
    }
    Ok(())
}
