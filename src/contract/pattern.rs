//! Building blocks for expected bodies that match by shape instead of by value.

use serde_json::{Map, Value};

use super::pact::{MatchingRule, MatchingRules};

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// Must be equal, unless a parent pattern relaxes it to a type match.
    Literal(Value),
    Object(Vec<(String, Pattern)>),
    Array(Vec<Pattern>),
    /// Same JSON type as the example, recursively.
    Like(Box<Pattern>),
    /// An array with at least `min` elements, each shaped like the template.
    EachLike { template: Box<Pattern>, min: usize },
    /// A string matching `regex`.
    Term { regex: String, example: String },
}

pub fn like(example: impl Into<Pattern>) -> Pattern {
    Pattern::Like(Box::new(example.into()))
}

pub fn each_like(template: impl Into<Pattern>, min: usize) -> Pattern {
    Pattern::EachLike {
        template: Box::new(template.into()),
        min: min.max(1),
    }
}

pub fn term(regex: impl Into<String>, example: impl Into<String>) -> Pattern {
    Pattern::Term {
        regex: regex.into(),
        example: example.into(),
    }
}

impl Pattern {
    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, Pattern)>) -> Self {
        Pattern::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// The concrete value the mock provider serves and the contract records.
    pub fn example(&self) -> Value {
        match self {
            Pattern::Literal(value) => value.clone(),
            Pattern::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, pattern)| (key.clone(), pattern.example()))
                    .collect::<Map<_, _>>(),
            ),
            Pattern::Array(items) => Value::Array(items.iter().map(Pattern::example).collect()),
            Pattern::Like(inner) => inner.example(),
            Pattern::EachLike { template, min } => {
                let item = template.example();
                Value::Array(vec![item; *min])
            }
            Pattern::Term { example, .. } => Value::String(example.clone()),
        }
    }

    /// Header values are plain strings in the contract.
    pub fn example_string(&self) -> String {
        match self.example() {
            Value::String(s) => s,
            other => other.to_string(),
        }
    }

    /// Records the matching rules of this pattern and its children under `path`.
    pub fn collect_rules(&self, path: &str, rules: &mut MatchingRules) {
        match self {
            Pattern::Literal(_) => {}
            Pattern::Object(fields) => {
                for (key, pattern) in fields {
                    pattern.collect_rules(&child_path(path, key), rules);
                }
            }
            Pattern::Array(items) => {
                for (index, pattern) in items.iter().enumerate() {
                    pattern.collect_rules(&format!("{}[{}]", path, index), rules);
                }
            }
            Pattern::Like(inner) => {
                rules.insert(path, MatchingRule::type_match());
                inner.collect_rules(path, rules);
            }
            Pattern::EachLike { template, min } => {
                rules.insert(path, MatchingRule::min_type(*min));
                template.collect_rules(&format!("{}[*]", path), rules);
            }
            Pattern::Term { regex, .. } => {
                rules.insert(path, MatchingRule::regex(regex.clone()));
            }
        }
    }
}

fn child_path(parent: &str, key: &str) -> String {
    let plain = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if plain {
        format!("{}.{}", parent, key)
    } else {
        format!("{}['{}']", parent, key)
    }
}

impl From<Value> for Pattern {
    fn from(value: Value) -> Self {
        Pattern::Literal(value)
    }
}

impl From<&str> for Pattern {
    fn from(value: &str) -> Self {
        Pattern::Literal(Value::String(value.to_string()))
    }
}

impl From<String> for Pattern {
    fn from(value: String) -> Self {
        Pattern::Literal(Value::String(value))
    }
}
