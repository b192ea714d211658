use regex::Regex;
use serde_json::Value;

/// Lightweight JSON-ish type tag for a tool parameter (spec §3 ToolDefinition).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Array,
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    pub enum_values: Option<Vec<String>>,
    pub pattern: Option<String>,
    /// Enum constraint applied to each item, when `param_type == Array`.
    pub item_enum: Option<Vec<String>>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: true,
            enum_values: None,
            pattern: None,
            item_enum: None,
        }
    }

    pub fn optional(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type)
        }
    }

    pub fn with_enum(mut self, values: &[&str]) -> Self {
        self.enum_values = Some(values.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_item_enum(mut self, values: &[&str]) -> Self {
        self.item_enum = Some(values.iter().map(|s| s.to_string()).collect());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToolSchema {
    pub params: Vec<ParamSpec>,
}

impl ToolSchema {
    pub fn new(params: Vec<ParamSpec>) -> Self {
        Self { params }
    }

    /// Renders this schema as a plain JSON-Schema-ish object, suitable for
    /// handing to an LLM adapter as a tool's `parameters` descriptor.
    pub fn to_json_value(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for spec in &self.params {
            let mut prop = serde_json::Map::new();
            prop.insert(
                "type".to_string(),
                Value::String(
                    match spec.param_type {
                        ParamType::String => "string",
                        ParamType::Number => "number",
                        ParamType::Boolean => "boolean",
                        ParamType::Array => "array",
                    }
                    .to_string(),
                ),
            );
            if let Some(values) = &spec.enum_values {
                prop.insert("enum".to_string(), Value::from(values.clone()));
            }
            if let Some(pattern) = &spec.pattern {
                prop.insert("pattern".to_string(), Value::String(pattern.clone()));
            }
            if let Some(item_enum) = &spec.item_enum {
                prop.insert(
                    "items".to_string(),
                    serde_json::json!({"type": "string", "enum": item_enum}),
                );
            }
            if spec.required {
                required.push(Value::String(spec.name.clone()));
            }
            properties.insert(spec.name.clone(), Value::Object(prop));
        }
        serde_json::json!({
            "type": "object",
            "properties": Value::Object(properties),
            "required": required,
        })
    }
}

/// Validates `params` against `schema`, collecting every violation rather
/// than failing fast (spec §4.C step 2): required keys, enum membership,
/// type checks, array-item enums, and string regex patterns.
pub fn validate(schema: &ToolSchema, params: &Value) -> Result<(), String> {
    let mut problems = Vec::new();
    let obj = params.as_object().cloned().unwrap_or_default();

    for spec in &schema.params {
        let value = obj.get(&spec.name);
        match value {
            None => {
                if spec.required {
                    problems.push(format!("missing required parameter \"{}\"", spec.name));
                }
            }
            Some(v) => validate_one(spec, v, &mut problems),
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems.join("; "))
    }
}

fn validate_one(spec: &ParamSpec, v: &Value, problems: &mut Vec<String>) {
    match spec.param_type {
        ParamType::String => {
            let Some(s) = v.as_str() else {
                problems.push(format!("parameter \"{}\" must be a string", spec.name));
                return;
            };
            if let Some(enum_values) = &spec.enum_values {
                if !enum_values.iter().any(|e| e == s) {
                    problems.push(format!(
                        "parameter \"{}\" must be one of {:?}",
                        spec.name, enum_values
                    ));
                }
            }
            if let Some(pattern) = &spec.pattern {
                match Regex::new(pattern) {
                    Ok(re) if re.is_match(s) => {}
                    Ok(_) => problems.push(format!(
                        "parameter \"{}\" does not match required pattern",
                        spec.name
                    )),
                    Err(_) => problems.push(format!(
                        "parameter \"{}\" has an invalid validation pattern",
                        spec.name
                    )),
                }
            }
        }
        ParamType::Number => {
            if !v.is_number() {
                problems.push(format!("parameter \"{}\" must be a number", spec.name));
            }
        }
        ParamType::Boolean => {
            if !v.is_boolean() {
                problems.push(format!("parameter \"{}\" must be a boolean", spec.name));
            }
        }
        ParamType::Array => {
            let Some(items) = v.as_array() else {
                problems.push(format!("parameter \"{}\" must be an array", spec.name));
                return;
            };
            if let Some(item_enum) = &spec.item_enum {
                for item in items {
                    let matches = item
                        .as_str()
                        .map(|s| item_enum.iter().any(|e| e == s))
                        .unwrap_or(false);
                    if !matches {
                        problems.push(format!(
                            "parameter \"{}\" has an item not in {:?}",
                            spec.name, item_enum
                        ));
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn address_schema() -> ToolSchema {
        ToolSchema::new(vec![ParamSpec::required("address", ParamType::String)
            .with_pattern(r"^0x[a-fA-F0-9]{40}$")])
    }

    #[test]
    fn rejects_malformed_address() {
        let err = validate(&address_schema(), &json!({"address": "not-an-address"})).unwrap_err();
        assert!(err.contains("does not match required pattern"));
    }

    #[test]
    fn accepts_valid_address() {
        assert!(validate(
            &address_schema(),
            &json!({"address": "0x0000000000000000000000000000000000dEaD"})
        )
        .is_ok());
    }

    #[test]
    fn reports_missing_required_and_bad_enum_together() {
        let schema = ToolSchema::new(vec![
            ParamSpec::required("network", ParamType::String)
                .with_enum(&["ethereum", "polygon"]),
            ParamSpec::required("transactionType", ParamType::String),
        ]);
        let err = validate(&schema, &json!({"network": "solana"})).unwrap_err();
        assert!(err.contains("one of"));
        assert!(err.contains("missing required parameter \"transactionType\""));
    }
}
