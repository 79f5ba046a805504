use serde_json::{Map, Value};

use crate::outputs::NodeOutputs;

/// Resolve `{{logicalId.path.to.field}}` tokens against node outputs.
///
/// Token handling, in order:
/// - a token with no dot is left untouched (it belongs to the variable
///   grammar, see [`render_variables`])
/// - unknown node id: replaced with `[Node 'id' not found]`
/// - known node, unresolvable path: replaced with `[Field 'path' not found]`
///
/// The path is looked up in the node's `data` first and its `result` second;
/// an explicit leading `data`/`result` segment addresses one blob directly.
pub fn render_placeholders(input: &str, outputs: &NodeOutputs) -> String {
  render_tokens(input, |content| {
    let (node_ref, path) = content.split_once('.')?;

    let Some(output) = outputs.find(node_ref.trim()) else {
      return Some(format!("[Node '{}' not found]", node_ref.trim()));
    };

    let value = lookup_node_value(&output.data, &output.result, path);
    match value.and_then(value_to_string) {
      Some(s) => Some(s),
      None => Some(format!("[Field '{}' not found]", path)),
    }
  })
}

/// Resolve bare `{{variable}}` tokens against a flat variable map.
///
/// Unknown variables are left in place so a later placeholder pass can still
/// resolve `{{logicalId.field}}` tokens.
pub fn render_variables(input: &str, variables: &Map<String, Value>) -> String {
  render_tokens(input, |content| {
    let value = variables.get(content.trim())?;
    value_to_string(value)
  })
}

/// Read a dotted path out of a node's data/result pair.
fn lookup_node_value<'a>(data: &'a Value, result: &'a Value, path: &str) -> Option<&'a Value> {
  if let Some(value) = nested_value(data, path) {
    return Some(value);
  }
  if let Some(value) = nested_value(result, path) {
    return Some(value);
  }
  // Allow templates to name the blob explicitly, e.g. {{pdf1.result.url}}.
  match path.split_once('.') {
    Some(("result", rest)) => nested_value(result, rest),
    Some(("data", rest)) => nested_value(data, rest),
    _ => None,
  }
}

/// Walk a dotted path through nested objects.
///
/// Keys are matched exactly first; when that fails, a space-stripped,
/// lowercased comparison is tried so `{{form.Company Name}}` can match a
/// `companyName` key.
pub fn nested_value<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
  let mut current = value;
  for key in path.split('.') {
    let object = current.as_object()?;
    current = match object.get(key) {
      Some(v) => v,
      None => {
        let wanted = normalize_key(key);
        object
          .iter()
          .find(|(k, _)| normalize_key(k) == wanted)
          .map(|(_, v)| v)?
      }
    };
  }
  if current.is_null() { None } else { Some(current) }
}

fn normalize_key(key: &str) -> String {
  key
    .chars()
    .filter(|c| !c.is_whitespace())
    .flat_map(|c| c.to_lowercase())
    .collect()
}

/// Flatten nested objects into dotted keys, e.g. `{"a": {"b": 1}}` becomes
/// `{"a.b": 1}`. Arrays and scalars are kept as-is.
pub fn flatten_value(value: &Value, prefix: &str, out: &mut Map<String, Value>) {
  match value {
    Value::Object(map) => {
      for (key, inner) in map {
        let path = if prefix.is_empty() {
          key.clone()
        } else {
          format!("{}.{}", prefix, key)
        };
        flatten_value(inner, &path, out);
      }
    }
    other => {
      if !prefix.is_empty() {
        out.insert(prefix.to_string(), other.clone());
      }
    }
  }
}

fn value_to_string(value: &Value) -> Option<String> {
  match value {
    Value::Null => None,
    Value::String(s) => Some(s.clone()),
    Value::Bool(b) => Some(b.to_string()),
    Value::Number(n) => Some(n.to_string()),
    compound => serde_json::to_string(compound).ok(),
  }
}

/// Scan `input` for `{{...}}` tokens, replacing each with `resolve(content)`.
/// A `None` from the resolver leaves the token untouched.
fn render_tokens<F>(input: &str, mut resolve: F) -> String
where
  F: FnMut(&str) -> Option<String>,
{
  let mut out = String::with_capacity(input.len());
  let mut rest = input;

  while let Some(start) = rest.find("{{") {
    let after = &rest[start + 2..];
    let Some(end) = after.find("}}") else {
      break;
    };
    let content = &after[..end];
    out.push_str(&rest[..start]);
    match resolve(content) {
      Some(replacement) => out.push_str(&replacement),
      None => {
        out.push_str("{{");
        out.push_str(content);
        out.push_str("}}");
      }
    }
    rest = &after[end + 2..];
  }

  out.push_str(rest);
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::outputs::NodeOutput;
  use serde_json::json;

  fn outputs() -> NodeOutputs {
    let mut outputs = NodeOutputs::new();
    outputs.push(NodeOutput {
      ids: vec!["pdf1".to_string(), "pdf_node_1".to_string()],
      data: json!({}),
      result: json!({ "url": "https://x" }),
    });
    outputs.push(NodeOutput {
      ids: vec!["intake".to_string()],
      data: json!({ "Company Name": "Acme Corp", "contact": { "email": "a@acme.io" } }),
      result: json!({}),
    });
    outputs
  }

  #[test]
  fn resolves_result_field_with_explicit_prefix() {
    let rendered = render_placeholders("Link: {{pdf1.result.url}}", &outputs());
    assert_eq!(rendered, "Link: https://x");
  }

  #[test]
  fn resolves_result_field_without_prefix() {
    let rendered = render_placeholders("Link: {{pdf1.url}}", &outputs());
    assert_eq!(rendered, "Link: https://x");
  }

  #[test]
  fn unknown_field_yields_diagnostic_not_error() {
    let rendered = render_placeholders("{{pdf1.missing}}", &outputs());
    assert_eq!(rendered, "[Field 'missing' not found]");
  }

  #[test]
  fn unknown_node_yields_diagnostic() {
    let rendered = render_placeholders("{{ghost.url}}", &outputs());
    assert_eq!(rendered, "[Node 'ghost' not found]");
  }

  #[test]
  fn nested_paths_and_normalized_keys_match() {
    let rendered = render_placeholders(
      "{{intake.contact.email}} / {{intake.companyname}}",
      &outputs(),
    );
    assert_eq!(rendered, "a@acme.io / Acme Corp");
  }

  #[test]
  fn node_id_works_as_fallback_identifier() {
    let rendered = render_placeholders("{{pdf_node_1.url}}", &outputs());
    assert_eq!(rendered, "https://x");
  }

  #[test]
  fn bare_tokens_are_left_for_the_variable_pass() {
    let rendered = render_placeholders("hello {{name}}", &outputs());
    assert_eq!(rendered, "hello {{name}}");
  }

  #[test]
  fn variables_replace_known_keys_only() {
    let mut vars = Map::new();
    vars.insert("name".to_string(), json!("Ada"));
    vars.insert("count".to_string(), json!(3));

    let rendered = render_variables("{{name}} has {{count}} ({{other}})", &vars);
    assert_eq!(rendered, "Ada has 3 ({{other}})");
  }

  #[test]
  fn flatten_produces_dotted_keys() {
    let mut out = Map::new();
    flatten_value(&json!({ "a": { "b": 1 }, "c": "x" }), "", &mut out);
    assert_eq!(out.get("a.b"), Some(&json!(1)));
    assert_eq!(out.get("c"), Some(&json!("x")));
  }

  #[test]
  fn unterminated_token_is_preserved() {
    let rendered = render_placeholders("broken {{pdf1.url", &outputs());
    assert_eq!(rendered, "broken {{pdf1.url");
  }
}
