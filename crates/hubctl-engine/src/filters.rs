//! Filters available to stack templates and manifests

use minijinja::{Environment, Error, ErrorKind, Value};

/// Register every hubctl filter on `env`
pub fn register(env: &mut Environment<'_>) {
    env.add_filter("toyaml", toyaml);
    env.add_filter("quote", quote);
    env.add_filter("indent", indent);
    env.add_filter("nindent", nindent);
}

/// Serialize a value as block YAML, without document marker or trailing newline
///
/// Usage: {{ admins | toyaml }}
pub fn toyaml(value: Value) -> Result<String, Error> {
    let json: serde_json::Value = serde_json::to_value(&value)
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))?;

    let yaml = serde_yaml::to_string(&json)
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))?;

    Ok(yaml.trim_start_matches("---\n").trim_end().to_string())
}

/// Double-quote a scalar, escaping backslashes and quotes
///
/// Usage: {{ arn | quote }}
#[must_use]
pub fn quote(value: Value) -> String {
    let s = match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    };
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Indent every non-empty line after the first
///
/// Usage: {{ block | indent(4) }}
#[must_use]
pub fn indent(value: String, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    value
        .lines()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 || line.is_empty() {
                line.to_string()
            } else {
                format!("{}{}", pad, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Start on a new line and indent every non-empty line
///
/// Usage: {{ users | toyaml | nindent(4) }}
#[must_use]
pub fn nindent(value: String, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    let body = value
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", pad, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("\n{}", body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toyaml_mapping() {
        let value = Value::from_serialize(serde_json::json!({"userarn": "arn:aws:iam::1:user/ann", "groups": ["system:masters"]}));
        let yaml = toyaml(value).unwrap();
        assert!(yaml.contains("userarn: arn:aws:iam::1:user/ann"));
        assert!(yaml.contains("- system:masters"));
        assert!(!yaml.ends_with('\n'));
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote(Value::from("a\"b")), r#""a\"b""#);
        assert_eq!(quote(Value::from(42)), "\"42\"");
    }

    #[test]
    fn test_nindent_skips_blank_lines() {
        assert_eq!(nindent("a: 1\n\nb: 2".to_string(), 2), "\n  a: 1\n\n  b: 2");
    }

    #[test]
    fn test_indent_leaves_first_line() {
        assert_eq!(indent("a\nb".to_string(), 4), "a\n    b");
    }
}
