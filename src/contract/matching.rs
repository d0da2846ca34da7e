//! Compares recorded expectations with what actually went over the wire.

use std::{collections::BTreeMap, fmt};

use http::HeaderMap;
use regex::Regex;
use serde_json::Value;

use super::pact::{MatchingRule, MatchingRules, PactRequest, PactResponse, RuleKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub path: String,
    pub message: String,
}

impl Mismatch {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(Debug, Clone)]
pub struct ActualRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct ActualResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

pub fn match_request(expected: &PactRequest, actual: &ActualRequest) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();

    if !expected.method.eq_ignore_ascii_case(&actual.method) {
        mismatches.push(Mismatch::new(
            "$.method",
            format!("expected {} but was {}", expected.method, actual.method),
        ));
    }

    match expected.matching_rules.get("$.path") {
        Some(rule) if rule.kind() == RuleKind::Regex => {
            if let Some(message) = regex_mismatch(rule, &actual.path) {
                mismatches.push(Mismatch::new("$.path", message));
            }
        }
        _ if expected.path != actual.path => mismatches.push(Mismatch::new(
            "$.path",
            format!("expected '{}' but was '{}'", expected.path, actual.path),
        )),
        _ => {}
    }

    let expected_query = normalize_query(expected.query.as_deref());
    let actual_query = normalize_query(actual.query.as_deref());
    if expected_query != actual_query {
        mismatches.push(Mismatch::new(
            "$.query",
            format!("expected {:?} but was {:?}", expected_query, actual_query),
        ));
    }

    mismatches.extend(match_headers(
        &expected.headers,
        &actual.headers,
        &expected.matching_rules,
    ));

    if let Some(expected_body) = &expected.body {
        match &actual.body {
            Some(actual_body) => mismatches.extend(match_body(
                expected_body,
                actual_body,
                &expected.matching_rules,
                false,
            )),
            None => mismatches.push(Mismatch::new("$.body", "expected a body but there was none")),
        }
    }

    mismatches
}

pub fn match_response(expected: &PactResponse, actual: &ActualResponse) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();

    if expected.status != actual.status {
        mismatches.push(Mismatch::new(
            "$.status",
            format!("expected {} but was {}", expected.status, actual.status),
        ));
    }

    mismatches.extend(match_headers(
        &expected.headers,
        &actual.headers,
        &expected.matching_rules,
    ));

    if let Some(expected_body) = &expected.body {
        match &actual.body {
            Some(actual_body) => mismatches.extend(match_body(
                expected_body,
                actual_body,
                &expected.matching_rules,
                true,
            )),
            None => mismatches.push(Mismatch::new("$.body", "expected a body but there was none")),
        }
    }

    mismatches
}

fn normalize_query(query: Option<&str>) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = query
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect();
    pairs.sort();
    pairs
}

/// Expected headers must be present; extra actual headers are fine.
pub fn match_headers(
    expected: &BTreeMap<String, String>,
    actual: &HeaderMap,
    rules: &MatchingRules,
) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();

    for (name, expected_value) in expected {
        let path = format!("$.headers.{}", name);
        let actual_value = actual.get(name.as_str()).and_then(|v| v.to_str().ok());

        let Some(actual_value) = actual_value else {
            mismatches.push(Mismatch::new(path, "header is missing"));
            continue;
        };

        let rule = rules
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(&path))
            .map(|(_, rule)| rule);

        let message = match rule {
            Some(rule) if rule.kind() == RuleKind::Regex => regex_mismatch(rule, actual_value),
            _ if name.eq_ignore_ascii_case("content-type") => {
                content_type_mismatch(expected_value, actual_value)
            }
            _ if expected_value.trim() != actual_value.trim() => Some(format!(
                "expected '{}' but was '{}'",
                expected_value, actual_value
            )),
            _ => None,
        };

        if let Some(message) = message {
            mismatches.push(Mismatch::new(path, message));
        }
    }

    mismatches
}

fn content_type_mismatch(expected: &str, actual: &str) -> Option<String> {
    let (expected_type, expected_params) = split_media_type(expected);
    let (actual_type, actual_params) = split_media_type(actual);

    if expected_type != actual_type {
        return Some(format!(
            "expected media type '{}' but was '{}'",
            expected_type, actual_type
        ));
    }

    expected_params
        .iter()
        .find(|param| !actual_params.contains(param))
        .map(|(key, value)| format!("expected parameter {}={} in '{}'", key, value, actual))
}

fn split_media_type(value: &str) -> (String, Vec<(String, String)>) {
    let mut parts = value.split(';');
    let media_type = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
    let params = parts
        .filter_map(|param| param.split_once('='))
        .map(|(k, v)| {
            (
                k.trim().to_ascii_lowercase(),
                v.trim().trim_matches('"').to_ascii_lowercase(),
            )
        })
        .collect();
    (media_type, params)
}

fn regex_mismatch(rule: &MatchingRule, actual: &str) -> Option<String> {
    let pattern = rule.regex.as_deref().unwrap_or_default();

    match Regex::new(&format!("^(?:{})$", pattern)) {
        Ok(re) if re.is_match(actual) => None,
        Ok(_) => Some(format!("'{}' does not match /{}/", actual, pattern)),
        Err(e) => Some(format!("invalid regex /{}/: {}", pattern, e)),
    }
}

/// Compares two bodies. Response bodies tolerate keys the contract does not mention.
pub fn match_body(
    expected: &Value,
    actual: &Value,
    rules: &MatchingRules,
    allow_unexpected_keys: bool,
) -> Vec<Mismatch> {
    let mut matcher = BodyMatcher {
        rules: rules
            .iter()
            .filter_map(|(path, rule)| parse_path(path).map(|segments| (segments, rule)))
            .collect(),
        allow_unexpected_keys,
        mismatches: Vec::new(),
    };

    let mut path = vec![Segment::Root, Segment::Field("body".to_string())];
    matcher.compare(expected, actual, &mut path, false);
    matcher.mismatches
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Root,
    Field(String),
    Index(usize),
    AnyField,
    AnyIndex,
}

impl Segment {
    fn matches(&self, concrete: &Segment) -> bool {
        match (self, concrete) {
            (Segment::AnyIndex, Segment::Index(_)) => true,
            (Segment::AnyField, Segment::Field(_) | Segment::Index(_)) => true,
            (rule, concrete) => rule == concrete,
        }
    }

    fn is_wildcard(&self) -> bool {
        matches!(self, Segment::AnyField | Segment::AnyIndex)
    }
}

/// Parses `$.body[*].name`, `$.body['odd key']`, `$.body.*` and friends.
pub fn parse_path(path: &str) -> Option<Vec<Segment>> {
    let rest = path.strip_prefix('$')?;
    let mut segments = vec![Segment::Root];
    let mut chars = rest.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    segments.push(Segment::AnyField);
                    continue;
                }
                let mut name = String::new();
                while let Some(&next) = chars.peek() {
                    if next == '.' || next == '[' {
                        break;
                    }
                    name.push(next);
                    chars.next();
                }
                if name.is_empty() {
                    return None;
                }
                segments.push(Segment::Field(name));
            }
            '[' => {
                let mut inner = String::new();
                for next in chars.by_ref() {
                    if next == ']' {
                        break;
                    }
                    inner.push(next);
                }
                let inner = inner.trim();
                let segment = if inner == "*" {
                    Segment::AnyIndex
                } else if let Some(quoted) = inner
                    .strip_prefix('\'')
                    .and_then(|s| s.strip_suffix('\''))
                {
                    Segment::Field(quoted.to_string())
                } else {
                    Segment::Index(inner.parse().ok()?)
                };
                segments.push(segment);
            }
            _ => return None,
        }
    }

    Some(segments)
}

fn render_path(path: &[Segment]) -> String {
    let mut rendered = String::new();
    for segment in path {
        match segment {
            Segment::Root => rendered.push('$'),
            Segment::Field(name) => {
                rendered.push('.');
                rendered.push_str(name);
            }
            Segment::Index(index) => rendered.push_str(&format!("[{}]", index)),
            Segment::AnyField => rendered.push_str(".*"),
            Segment::AnyIndex => rendered.push_str("[*]"),
        }
    }
    rendered
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn values_equal(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(e), Value::Number(a)) => match (e.as_f64(), a.as_f64()) {
            (Some(e), Some(a)) => e == a,
            _ => e == a,
        },
        _ => expected == actual,
    }
}

struct BodyMatcher<'a> {
    rules: Vec<(Vec<Segment>, &'a MatchingRule)>,
    allow_unexpected_keys: bool,
    mismatches: Vec<Mismatch>,
}

impl<'a> BodyMatcher<'a> {
    /// Most specific rule whose path matches; exact segments beat wildcards.
    fn rule_for(&self, path: &[Segment]) -> Option<&'a MatchingRule> {
        self.rules
            .iter()
            .filter(|(segments, _)| {
                segments.len() == path.len()
                    && segments.iter().zip(path).all(|(rule, seg)| rule.matches(seg))
            })
            .min_by_key(|(segments, _)| segments.iter().filter(|s| s.is_wildcard()).count())
            .map(|(_, rule)| *rule)
    }

    fn mismatch(&mut self, path: &[Segment], message: String) {
        self.mismatches.push(Mismatch::new(render_path(path), message));
    }

    fn compare(
        &mut self,
        expected: &Value,
        actual: &Value,
        path: &mut Vec<Segment>,
        inherited_type_match: bool,
    ) {
        let rule = self.rule_for(path);

        let type_match = match rule.map(MatchingRule::kind) {
            Some(RuleKind::Regex) => {
                let text = match actual {
                    Value::String(s) => s.clone(),
                    Value::Number(_) | Value::Bool(_) => actual.to_string(),
                    _ => {
                        self.mismatch(path, format!("expected a string but was {}", json_type(actual)));
                        return;
                    }
                };
                if let Some(message) = rule.and_then(|rule| regex_mismatch(rule, &text)) {
                    self.mismatch(path, message);
                }
                return;
            }
            Some(RuleKind::Integer) => {
                if !(actual.is_i64() || actual.is_u64()) {
                    self.mismatch(path, format!("expected an integer but was {}", actual));
                }
                return;
            }
            Some(RuleKind::Decimal) => {
                if !actual.is_number() {
                    self.mismatch(path, format!("expected a decimal but was {}", actual));
                }
                return;
            }
            Some(RuleKind::Type) => true,
            Some(RuleKind::Equality) => false,
            None => inherited_type_match,
        };

        match (expected, actual) {
            (Value::Object(expected_fields), Value::Object(actual_fields)) => {
                for (key, expected_value) in expected_fields {
                    path.push(Segment::Field(key.clone()));
                    match actual_fields.get(key) {
                        Some(actual_value) => {
                            self.compare(expected_value, actual_value, path, type_match)
                        }
                        None => self.mismatch(path, "expected key is missing".to_string()),
                    }
                    path.pop();
                }
                if !self.allow_unexpected_keys {
                    for key in actual_fields.keys() {
                        if !expected_fields.contains_key(key) {
                            path.push(Segment::Field(key.clone()));
                            self.mismatch(path, "unexpected key".to_string());
                            path.pop();
                        }
                    }
                }
            }
            (Value::Array(expected_items), Value::Array(actual_items)) => {
                if type_match {
                    let (min, max) = rule.map_or((None, None), |rule| (rule.min, rule.max));
                    if let Some(min) = min.filter(|min| actual_items.len() < *min) {
                        self.mismatch(
                            path,
                            format!("expected at least {} items but got {}", min, actual_items.len()),
                        );
                    }
                    if let Some(max) = max.filter(|max| actual_items.len() > *max) {
                        self.mismatch(
                            path,
                            format!("expected at most {} items but got {}", max, actual_items.len()),
                        );
                    }
                    for (index, actual_item) in actual_items.iter().enumerate() {
                        let Some(template) =
                            expected_items.get(index).or_else(|| expected_items.first())
                        else {
                            break;
                        };
                        path.push(Segment::Index(index));
                        self.compare(template, actual_item, path, true);
                        path.pop();
                    }
                } else {
                    if expected_items.len() != actual_items.len() {
                        self.mismatch(
                            path,
                            format!(
                                "expected {} items but got {}",
                                expected_items.len(),
                                actual_items.len()
                            ),
                        );
                    }
                    for (index, (expected_item, actual_item)) in
                        expected_items.iter().zip(actual_items).enumerate()
                    {
                        path.push(Segment::Index(index));
                        self.compare(expected_item, actual_item, path, false);
                        path.pop();
                    }
                }
            }
            _ if type_match => {
                if json_type(expected) != json_type(actual) {
                    self.mismatch(
                        path,
                        format!(
                            "expected {} but was {}",
                            json_type(expected),
                            json_type(actual)
                        ),
                    );
                }
            }
            _ => {
                if !values_equal(expected, actual) {
                    self.mismatch(path, format!("expected {} but was {}", expected, actual));
                }
            }
        }
    }
}
