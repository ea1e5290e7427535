//! Feature validation for ML inference
//!
//! Checks a submitted feature map against the ordered schema a model was
//! trained on. The schema is the sole authority on shape: keys it does not
//! name are dropped, keys it names must be present and finite.

use crate::error::ValidationError;
use crate::models::{FeatureSchema, FeatureVector, RawFeatureMap, RawValue};

/// Validate `raw` against `schema`, producing a vector ordered like the schema
pub fn validate(raw: &RawFeatureMap, schema: &FeatureSchema) -> Result<FeatureVector, ValidationError> {
    let missing: Vec<String> = schema
        .names()
        .iter()
        .filter(|name| !raw.contains_key(name.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingFeatures(missing));
    }

    let mut values = Vec::with_capacity(schema.len());
    let mut invalid = Vec::new();
    for name in schema.names() {
        match raw.get(name) {
            Some(RawValue::Number(v)) if v.is_finite() => values.push(*v),
            _ => invalid.push(name.clone()),
        }
    }
    if !invalid.is_empty() {
        return Err(ValidationError::NonNumeric(invalid));
    }

    Ok(FeatureVector::from_parts(schema.names().to_vec(), values))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(["dur", "spkts", "sbytes"])
    }

    fn raw(pairs: &[(&str, RawValue)]) -> RawFeatureMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_valid_map_follows_schema_order() {
        let map = raw(&[
            ("sbytes", RawValue::Number(3.0)),
            ("dur", RawValue::Number(1.0)),
            ("spkts", RawValue::Number(2.0)),
        ]);
        let fv = validate(&map, &schema()).unwrap();
        assert_eq!(fv.values(), &[1.0, 2.0, 3.0]);
        assert_eq!(fv.names(), schema().names());
    }

    #[test]
    fn test_extra_keys_dropped() {
        let map = raw(&[
            ("dur", RawValue::Number(1.0)),
            ("spkts", RawValue::Number(2.0)),
            ("sbytes", RawValue::Number(3.0)),
            ("target", RawValue::Number(1.0)),
            ("note", RawValue::Text("ignored".into())),
        ]);
        let fv = validate(&map, &schema()).unwrap();
        assert_eq!(fv.len(), 3);
        assert_eq!(fv.get("target"), None);
    }

    #[test]
    fn test_missing_dur_is_named() {
        let map = raw(&[
            ("spkts", RawValue::Number(2.0)),
            ("sbytes", RawValue::Number(3.0)),
        ]);
        let err = validate(&map, &schema()).unwrap_err();
        assert_eq!(err, ValidationError::MissingFeatures(vec!["dur".to_string()]));
    }

    #[test]
    fn test_every_missing_key_is_named() {
        let err = validate(&RawFeatureMap::new(), &schema()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingFeatures(vec![
                "dur".to_string(),
                "spkts".to_string(),
                "sbytes".to_string()
            ])
        );
    }

    #[test]
    fn test_missing_reported_before_type_errors() {
        let map = raw(&[("dur", RawValue::Text("fast".into()))]);
        let err = validate(&map, &schema()).unwrap_err();
        assert!(matches!(err, ValidationError::MissingFeatures(_)));
    }

    #[test]
    fn test_non_numeric_values_rejected() {
        let map = raw(&[
            ("dur", RawValue::Text("0.5".into())),
            ("spkts", RawValue::Bool(true)),
            ("sbytes", RawValue::Null),
        ]);
        let err = validate(&map, &schema()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::NonNumeric(vec![
                "dur".to_string(),
                "spkts".to_string(),
                "sbytes".to_string()
            ])
        );
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let map = raw(&[
            ("dur", RawValue::Number(f64::NAN)),
            ("spkts", RawValue::Number(f64::INFINITY)),
            ("sbytes", RawValue::Number(1.0)),
        ]);
        let err = validate(&map, &schema()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::NonNumeric(vec!["dur".to_string(), "spkts".to_string()])
        );
    }

    #[test]
    fn test_json_map_deserializes_into_raw_values() {
        let map: RawFeatureMap =
            serde_json::from_str(r#"{"dur": 1, "spkts": 2.5, "sbytes": "x", "flag": null}"#).unwrap();
        assert_eq!(map["dur"], RawValue::Number(1.0));
        assert_eq!(map["spkts"], RawValue::Number(2.5));
        assert_eq!(map["flag"], RawValue::Null);
        assert!(validate(&map, &schema()).is_err());
    }

    #[test]
    fn test_nested_values_reach_validation() {
        let map: RawFeatureMap =
            serde_json::from_str(r#"{"dur": [1], "spkts": {"v": 2}, "sbytes": 3}"#).unwrap();
        assert_eq!(map["dur"], RawValue::Other(serde_json::json!([1])));
        assert_eq!(
            validate(&map, &schema()).unwrap_err(),
            ValidationError::NonNumeric(vec!["dur".to_string(), "spkts".to_string()])
        );
    }
}
