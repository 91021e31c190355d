//! Declarative tool parameters: JSON schema and argument validation.

use fault::{Error, Result};
use serde_json::{Map, Value, json};

/// Accepted JSON shape of one parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    /// One of a fixed set of strings.
    Enum(Vec<&'static str>),
    Array {
        items: Box<ParamType>,
        min_items: Option<usize>,
    },
    Object(Vec<ParamSpec>),
    Any,
}

impl ParamType {
    pub fn array(items: ParamType) -> Self {
        Self::Array {
            items: Box::new(items),
            min_items: None,
        }
    }

    pub fn array_min(items: ParamType, min_items: usize) -> Self {
        Self::Array {
            items: Box::new(items),
            min_items: Some(min_items),
        }
    }

    /// Object with required `x`, `y` and `z` numbers.
    pub fn point() -> Self {
        Self::Object(vec![
            ParamSpec::new("x", Self::Number).required(),
            ParamSpec::new("y", Self::Number).required(),
            ParamSpec::new("z", Self::Number).required(),
        ])
    }

    /// Name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Enum(_) => "enum",
            Self::Array { .. } => "array",
            Self::Object(_) => "object",
            Self::Any => "any",
        }
    }

    pub fn schema(&self) -> Value {
        match self {
            Self::String => json!({"type": "string"}),
            Self::Integer => json!({"type": "integer"}),
            Self::Number => json!({"type": "number"}),
            Self::Boolean => json!({"type": "boolean"}),
            Self::Enum(values) => json!({"type": "string", "enum": values}),
            Self::Array { items, min_items } => {
                let mut schema = json!({"type": "array", "items": items.schema()});
                if let Some(min) = min_items {
                    schema["minItems"] = json!(min);
                }
                schema
            }
            Self::Object(fields) => object_schema(fields),
            Self::Any => json!({}),
        }
    }

    fn check(&self, path: &str, value: Value) -> Result<Value> {
        let invalid = |value: Value| Error::invalid_parameter(path, value, self.name());
        match self {
            Self::String if value.is_string() => Ok(value),
            Self::Integer if value.is_i64() || value.is_u64() => Ok(value),
            Self::Number if value.is_number() => Ok(value),
            Self::Boolean if value.is_boolean() => Ok(value),
            Self::Enum(allowed) => match value.as_str() {
                Some(s) if allowed.contains(&s) => Ok(value),
                _ => Err(Error::invalid_parameter(
                    path,
                    value,
                    format!("one of {}", allowed.join(", ")),
                )),
            },
            Self::Array { items, min_items } => {
                let Value::Array(elements) = value else {
                    return Err(invalid(value));
                };
                if let Some(min) = min_items.filter(|&min| elements.len() < min) {
                    return Err(Error::validation(
                        format!("Parameter '{path}' needs at least {min} items"),
                        Some(path),
                        Some(Value::Array(elements)),
                    ));
                }
                elements
                    .into_iter()
                    .enumerate()
                    .map(|(i, element)| items.check(&format!("{path}[{i}]"), element))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Array)
            }
            Self::Object(fields) => match value {
                Value::Object(map) => validate_fields(fields, map, Some(path)).map(Value::Object),
                other => Err(invalid(other)),
            },
            Self::Any => Ok(value),
            _ => Err(invalid(value)),
        }
    }
}

/// One named parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub ty: ParamType,
    pub required: bool,
    pub default: Option<Value>,
    pub description: Option<&'static str>,
}

impl ParamSpec {
    pub fn new(name: &'static str, ty: ParamType) -> Self {
        Self {
            name,
            ty,
            required: false,
            default: None,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Value filled in when the caller omits the parameter.
    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    pub fn schema(&self) -> Value {
        let mut schema = self.ty.schema();
        if let Value::Object(map) = &mut schema {
            if let Some(description) = self.description {
                map.insert("description".into(), json!(description));
            }
            if let Some(default) = &self.default {
                map.insert("default".into(), default.clone());
            }
        }
        schema
    }
}

/// JSON schema of an object with the given fields.
pub fn object_schema(fields: &[ParamSpec]) -> Value {
    let properties: Map<String, Value> = fields
        .iter()
        .map(|field| (field.name.to_string(), field.schema()))
        .collect();
    let required: Vec<&str> = fields
        .iter()
        .filter(|field| field.required)
        .map(|field| field.name)
        .collect();

    let mut schema = json!({"type": "object", "properties": properties});
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    schema
}

/// Check `arguments` against `fields` and return them normalized.
///
/// Defaults are filled in, `null` counts as absent and unknown keys are
/// dropped.
pub fn validate(fields: &[ParamSpec], arguments: Map<String, Value>) -> Result<Map<String, Value>> {
    validate_fields(fields, arguments, None)
}

fn validate_fields(
    fields: &[ParamSpec],
    mut arguments: Map<String, Value>,
    parent: Option<&str>,
) -> Result<Map<String, Value>> {
    let mut normalized = Map::new();
    for field in fields {
        let path = match parent {
            Some(parent) => format!("{parent}.{}", field.name),
            None => field.name.to_string(),
        };
        match arguments.remove(field.name).filter(|v| !v.is_null()) {
            Some(value) => {
                normalized.insert(field.name.to_string(), field.ty.check(&path, value)?);
            }
            None => match &field.default {
                Some(default) => {
                    normalized.insert(field.name.to_string(), default.clone());
                }
                None if field.required => return Err(Error::missing_parameter(path)),
                None => {}
            },
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fault::ErrorKind;

    fn fields() -> Vec<ParamSpec> {
        vec![
            ParamSpec::new("elementId", ParamType::String)
                .required()
                .describe("The ID of the element"),
            ParamSpec::new("limit", ParamType::Integer).default(json!(100)),
            ParamSpec::new("position", ParamType::point()),
            ParamSpec::new(
                "action",
                ParamType::Enum(vec!["Select", "Delete"]),
            ),
            ParamSpec::new("ids", ParamType::array_min(ParamType::Integer, 1)),
        ]
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn schema_lists_properties_and_required() {
        let schema = object_schema(&fields());
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["elementId"]));
        assert_eq!(schema["properties"]["elementId"]["description"], "The ID of the element");
        assert_eq!(schema["properties"]["limit"]["default"], 100);
        assert_eq!(schema["properties"]["position"]["required"], json!(["x", "y", "z"]));
        assert_eq!(schema["properties"]["action"]["enum"], json!(["Select", "Delete"]));
        assert_eq!(schema["properties"]["ids"]["minItems"], 1);
    }

    #[test]
    fn fills_defaults_and_drops_unknown_keys() {
        let normalized = validate(&fields(), args(json!({"elementId": "42", "extra": true}))).unwrap();
        assert_eq!(Value::Object(normalized), json!({"elementId": "42", "limit": 100}));
    }

    #[test]
    fn null_counts_as_absent() {
        let normalized =
            validate(&fields(), args(json!({"elementId": "42", "limit": null}))).unwrap();
        assert_eq!(normalized["limit"], 100);
    }

    #[test]
    fn missing_required_parameter() {
        let err = validate(&fields(), Map::new()).unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::MissingParameter {
                field: "elementId".to_string()
            }
        );
    }

    #[test]
    fn wrong_type_reports_field_and_expected() {
        let err = validate(&fields(), args(json!({"elementId": 42}))).unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::InvalidParameter {
                field: "elementId".to_string(),
                value: json!(42),
                expected: "string".to_string()
            }
        );
    }

    #[test]
    fn nested_paths_in_errors() {
        let err = validate(
            &fields(),
            args(json!({"elementId": "1", "position": {"x": 1, "y": "2", "z": 3}})),
        )
        .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidParameter { field, .. } if field == "position.y"));

        let err = validate(&fields(), args(json!({"elementId": "1", "position": {"x": 1}})))
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MissingParameter { field } if field == "position.y"));

        let err = validate(&fields(), args(json!({"elementId": "1", "ids": [1, "x"]}))).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidParameter { field, .. } if field == "ids[1]"));
    }

    #[test]
    fn enum_and_min_items() {
        let err = validate(&fields(), args(json!({"elementId": "1", "action": "Explode"})))
            .unwrap_err();
        assert!(err.message().contains("one of Select, Delete"));

        let err = validate(&fields(), args(json!({"elementId": "1", "ids": []}))).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ValidationFailed { .. }));
    }

    #[test]
    fn integer_rejects_fractions() {
        let err = validate(&fields(), args(json!({"elementId": "1", "limit": 2.5}))).unwrap_err();
        assert_eq!(err.code(), fault::ErrorCode::InvalidParameter);
    }
}
