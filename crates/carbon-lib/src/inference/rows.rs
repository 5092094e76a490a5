//! Schema-driven row builder for JSON samples

use serde_json::Value;

use super::Sample;
use crate::models::{finite_or_zero, FeatureValue};
use crate::schema::SchemaRegistry;

/// Build one schema-ordered row. Absent features and values that cannot be
/// read as numbers become zero; categorical columns keep their text.
pub fn build_row(sample: &Sample, schema: &SchemaRegistry) -> Vec<FeatureValue> {
    schema
        .features()
        .iter()
        .map(|name| cell(schema.is_categorical(name), sample.get(name)))
        .collect()
}

fn cell(categorical: bool, value: Option<&Value>) -> FeatureValue {
    match value {
        Some(Value::String(s)) if categorical => {
            FeatureValue::Category(s.clone())
        }
        Some(value) => FeatureValue::Number(numeric(value)),
        None => FeatureValue::Number(0.0),
    }
}

fn numeric(value: &Value) -> f64 {
    let v = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Value::Bool(true) => 1.0,
        Value::Bool(false) => 0.0,
        Value::Null | Value::Array(_) | Value::Object(_) => 0.0,
    };
    finite_or_zero(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::columns;
    use serde_json::json;

    fn sample(value: Value) -> Sample {
        match value {
            Value::Object(map) => map,
            _ => panic!("sample must be an object"),
        }
    }

    fn schema(features: &[&str]) -> SchemaRegistry {
        SchemaRegistry::new(
            features.iter().map(|f| f.to_string()).collect(),
            columns::TARGET,
        )
        .unwrap()
    }

    #[test]
    fn test_absent_features_default_to_zero() {
        let row = build_row(&sample(json!({"a": 5})), &schema(&["a", "b"]));
        assert_eq!(row, vec![FeatureValue::Number(5.0), FeatureValue::Number(0.0)]);
    }

    #[test]
    fn test_extra_keys_ignored() {
        let row = build_row(&sample(json!({"b": 1, "zzz": 9})), &schema(&["b"]));
        assert_eq!(row, vec![FeatureValue::Number(1.0)]);
    }

    #[test]
    fn test_coercion_rules() {
        let row = build_row(
            &sample(json!({
                "a": "12.5",
                "b": true,
                "c": null,
                "d": "oops",
                "e": [1, 2],
                "shift": "B"
            })),
            &schema(&["a", "b", "c", "d", "e", "shift"]),
        );
        assert_eq!(
            row,
            vec![
                FeatureValue::Number(12.5),
                FeatureValue::Number(1.0),
                FeatureValue::Number(0.0),
                FeatureValue::Number(0.0),
                FeatureValue::Number(0.0),
                FeatureValue::Category("B".to_string()),
            ]
        );
    }

    #[test]
    fn test_registry_categorical_columns_keep_text() {
        let table = SchemaRegistry::new(vec!["Region".into(), "Year".into()], "tons")
            .unwrap()
            .with_categorical(vec!["Region".into()])
            .unwrap();
        let row = build_row(&sample(json!({"Region": "EU", "Year": "2020", "shift": "A"})), &table);
        assert_eq!(
            row,
            vec![
                FeatureValue::Category("EU".to_string()),
                FeatureValue::Number(2020.0)
            ]
        );
    }

    #[test]
    fn test_numeric_shift_stays_number() {
        let row = build_row(&sample(json!({"shift": 2})), &schema(&["shift"]));
        assert_eq!(row[0].as_category(), "2");
    }
}
