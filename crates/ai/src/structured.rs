use schemars::JsonSchema;

/// Recursively rewrites a `schemars`-generated schema so OpenAI's strict
/// structured-output mode will accept it: every object gets
/// `additionalProperties: false` and all its properties listed in
/// `required`, `oneOf`-of-consts collapse to a plain `enum`, and
/// `anyOf: [T, null]` (how `Option<T>` renders) collapses to `T`.
fn fix_schema_for_strict(schema: &mut serde_json::Value) {
  let Some(obj) = schema.as_object_mut() else { return };

  if obj.contains_key("$ref") {
    obj.retain(|k, _| k == "$ref");
    return;
  }

  if let Some(one_of) = obj.get("oneOf").and_then(|v| v.as_array()).cloned() {
    let consts: Option<Vec<serde_json::Value>> = one_of.iter().map(|v| v.get("const").cloned()).collect();
    if let Some(values) = consts {
      obj.clear();
      obj.insert("type".to_owned(), serde_json::Value::String("string".to_owned()));
      obj.insert("enum".to_owned(), serde_json::Value::Array(values));
      return;
    }
  }

  if let Some(any_of) = obj.get("anyOf").and_then(|v| v.as_array()).cloned() {
    let non_null: Vec<&serde_json::Value> = any_of.iter().filter(|v| v.get("type").and_then(|t| t.as_str()) != Some("null")).collect();
    if non_null.len() == 1 {
      let inner = non_null[0].clone();
      obj.clear();
      obj.extend(inner.as_object().cloned().unwrap_or_default());
      fix_schema_for_strict(schema);
      return;
    }
  }

  if obj.contains_key("properties") {
    let keys: Vec<serde_json::Value> = obj["properties"].as_object().map(|p| p.keys().map(|k| serde_json::Value::String(k.clone())).collect()).unwrap_or_default();
    obj.insert("required".to_owned(), serde_json::Value::Array(keys));
    obj.insert("additionalProperties".to_owned(), serde_json::Value::Bool(false));
    if let Some(props) = obj.get_mut("properties").and_then(|p| p.as_object_mut()) {
      for v in props.values_mut() {
        fix_schema_for_strict(v);
      }
    }
  }

  if let Some(items) = obj.get_mut("items") {
    fix_schema_for_strict(items);
  }
  if let Some(defs) = obj.get_mut("definitions").and_then(|d| d.as_object_mut()) {
    for v in defs.values_mut() {
      fix_schema_for_strict(v);
    }
  }
  if let Some(defs) = obj.get_mut("$defs").and_then(|d| d.as_object_mut()) {
    for v in defs.values_mut() {
      fix_schema_for_strict(v);
    }
  }
}

/// A JSON schema plus the name/description OpenAI's structured-output
/// request wants alongside it. Built once per call site from the Rust type
/// the caller expects back, via [`SchemaSpec::for_type`].
#[derive(Debug, Clone)]
pub struct SchemaSpec {
  pub name: String,
  pub description: Option<String>,
  pub schema: serde_json::Value,
}

impl SchemaSpec {
  /// Derives a strict-mode-compatible JSON schema from `T` via `schemars`.
  #[must_use]
  pub fn for_type<T: JsonSchema>(name: impl Into<String>, description: Option<&str>) -> Self {
    let schema = schemars::schema_for!(T);
    let mut schema = serde_json::to_value(&schema).unwrap_or(serde_json::Value::Null);
    fix_schema_for_strict(&mut schema);
    Self {
      name: name.into(),
      description: description.map(ToOwned::to_owned),
      schema,
    }
  }
}

#[cfg(test)]
mod tests {
  use serde::Deserialize;

  use super::*;

  #[derive(Deserialize, JsonSchema)]
  struct Verdict {
    contradicting: bool,
    reason: Option<String>,
  }

  #[test]
  fn strict_fixup_marks_objects_closed_and_fully_required() {
    let spec = SchemaSpec::for_type::<Verdict>("verdict", Some("a yes/no contradiction verdict"));
    assert_eq!(spec.schema["additionalProperties"], serde_json::Value::Bool(false));
    let required = spec.schema["required"].as_array().unwrap();
    assert!(required.iter().any(|v| v == "contradicting"));
    assert!(required.iter().any(|v| v == "reason"));
  }
}
