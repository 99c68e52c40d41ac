use serde::Serialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::client::LlmError;

/// Pull the JSON payload out of a model reply.
///
/// Models wrap JSON in code fences or prose often enough that a bare
/// `serde_json::from_str` on the reply is not reliable.
pub fn extract_json(text: &str) -> Result<Value, LlmError> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end().trim_end_matches("```"))
        .unwrap_or(trimmed);

    let start = unfenced
        .find(['{', '['])
        .ok_or_else(|| LlmError::Parse("no JSON found in reply".into()))?;
    let close = if unfenced[start..].starts_with('{') { '}' } else { ']' };
    let end = unfenced
        .rfind(close)
        .filter(|end| *end > start)
        .ok_or_else(|| LlmError::Parse("unterminated JSON in reply".into()))?;

    serde_json::from_str(&unfenced[start..=end])
        .map_err(|e| LlmError::Parse(format!("invalid JSON: {e}")))
}

/// Structured filters the model derived from a free-text search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct SearchInterpretation {
    pub keywords: Vec<String>,
    pub category: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
}

impl SearchInterpretation {
    pub fn from_value(value: &Value) -> Result<Self, LlmError> {
        let keywords = value
            .get("keywords")
            .and_then(Value::as_array)
            .ok_or_else(|| LlmError::Parse("keywords must be an array".into()))?
            .iter()
            .filter_map(Value::as_str)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        let category = value
            .get("category")
            .and_then(Value::as_str)
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty());

        let mut min_price = value.get("min_price").and_then(as_amount);
        let mut max_price = value.get("max_price").and_then(as_amount);
        if let (Some(min), Some(max)) = (min_price, max_price) {
            if min > max {
                std::mem::swap(&mut min_price, &mut max_price);
            }
        }

        Ok(Self {
            keywords,
            category,
            min_price,
            max_price,
        })
    }
}

/// What the vision model recognized in a product photo.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RecognizedProduct {
    pub name: String,
    pub description: String,
    pub category: Option<String>,
    pub suggested_price: Option<i64>,
    #[schema(value_type = Object)]
    pub attributes: Value,
}

impl RecognizedProduct {
    pub fn from_value(value: &Value) -> Result<Self, LlmError> {
        let object = value
            .as_object()
            .ok_or_else(|| LlmError::Parse("expected a JSON object".into()))?;

        let name = object
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| LlmError::Parse("missing product name".into()))?
            .to_string();

        let description = object
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();

        let category = object
            .get("category")
            .and_then(Value::as_str)
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty());

        let attributes = match object.get("attributes") {
            Some(Value::Object(map)) => Value::Object(map.clone()),
            _ => Value::Object(Map::new()),
        };

        Ok(Self {
            name,
            description,
            category,
            suggested_price: object.get("suggested_price").and_then(as_amount),
            attributes,
        })
    }
}

fn as_amount(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.round() as i64))
        .filter(|amount| *amount >= 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_fenced_json() {
        let reply = "```json\n{\"keywords\": [\"mug\"]}\n```";
        assert_eq!(extract_json(reply).expect("json"), json!({"keywords": ["mug"]}));
    }

    #[test]
    fn extracts_json_surrounded_by_prose() {
        let reply = "Sure! Here you go: {\"name\": \"Lamp\"} Hope it helps.";
        assert_eq!(extract_json(reply).expect("json"), json!({"name": "Lamp"}));
    }

    #[test]
    fn reply_without_json_is_an_error() {
        assert!(matches!(extract_json("no idea"), Err(LlmError::Parse(_))));
    }

    #[test]
    fn search_requires_keyword_array() {
        let err = SearchInterpretation::from_value(&json!({"keywords": "mug"}));
        assert!(err.is_err());
    }

    #[test]
    fn search_normalizes_fields() {
        let parsed = SearchInterpretation::from_value(&json!({
            "keywords": [" red ", "", 3, "mug"],
            "category": " Kitchen ",
            "min_price": 2000,
            "max_price": 999.6
        }))
        .expect("valid interpretation");
        assert_eq!(parsed.keywords, vec!["red", "mug"]);
        assert_eq!(parsed.category.as_deref(), Some("kitchen"));
        assert_eq!(parsed.min_price, Some(1000));
        assert_eq!(parsed.max_price, Some(2000));
    }

    #[test]
    fn recognized_product_needs_a_name() {
        assert!(RecognizedProduct::from_value(&json!({"description": "x"})).is_err());
    }

    #[test]
    fn recognized_product_defaults_attributes() {
        let parsed = RecognizedProduct::from_value(&json!({
            "name": "Desk Lamp",
            "suggested_price": 4599,
            "attributes": ["not", "an", "object"]
        }))
        .expect("valid product");
        assert_eq!(parsed.suggested_price, Some(4599));
        assert_eq!(parsed.attributes, json!({}));
        assert!(parsed.description.is_empty());
    }
}
