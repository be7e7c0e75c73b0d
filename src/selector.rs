//! Label selectors.
//!
//! Supports the Kubernetes selector syntax: a comma separated list of
//! requirements that must all hold.
//!
//! - `key=value`, `key==value`, `key!=value`
//! - `key in (a,b)`, `key notin (a,b)`
//! - `key` (label present), `!key` (label absent)

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// SelectorError reports a malformed selector expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid label selector {selector:?}: {message}")]
pub struct SelectorError {
    pub selector: String,
    pub message: String,
}

/// Operator of a single requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

/// Requirement is one comma separated term of a selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub key: String,
    pub operator: Operator,
    pub values: Vec<String>,
}

impl Requirement {
    /// Returns true if the labels satisfy this requirement.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            Operator::Equals | Operator::In => {
                value.is_some_and(|v| self.values.iter().any(|want| want == v))
            }
            Operator::NotEquals | Operator::NotIn => {
                value.map_or(true, |v| self.values.iter().all(|want| want != v))
            }
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            Operator::Equals => write!(f, "{}={}", self.key, self.values[0]),
            Operator::NotEquals => write!(f, "{}!={}", self.key, self.values[0]),
            Operator::In => write!(f, "{} in ({})", self.key, self.values.join(",")),
            Operator::NotIn => write!(f, "{} notin ({})", self.key, self.values.join(",")),
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
        }
    }
}

/// Selector is a conjunction of requirements. The empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    /// Parses a selector expression.
    pub fn parse(input: &str) -> Result<Selector, SelectorError> {
        let err = |message: String| SelectorError {
            selector: input.to_string(),
            message,
        };

        let mut requirements = Vec::new();
        for term in split_terms(input).map_err(err)? {
            let term = term.trim();
            if term.is_empty() {
                if input.trim().is_empty() {
                    continue;
                }
                return Err(err("empty requirement".to_string()));
            }
            requirements.push(parse_requirement(term).map_err(err)?);
        }
        Ok(Selector { requirements })
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Returns true if the labels satisfy every requirement.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, r) in self.requirements.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", r)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selector::parse(s)
    }
}

/// Splits on commas that are not inside a parenthesized value set.
fn split_terms(input: &str) -> Result<Vec<&str>, String> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '(' => {
                if depth > 0 {
                    return Err("nested parentheses".to_string());
                }
                depth += 1;
            }
            ')' => {
                if depth == 0 {
                    return Err("unexpected ')'".to_string());
                }
                depth -= 1;
            }
            ',' if depth == 0 => {
                terms.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth > 0 {
        return Err("unterminated value set".to_string());
    }
    terms.push(&input[start..]);
    Ok(terms)
}

fn parse_requirement(term: &str) -> Result<Requirement, String> {
    if let Some(key) = term.strip_prefix('!') {
        return Ok(Requirement {
            key: parse_key(key.trim())?,
            operator: Operator::DoesNotExist,
            values: Vec::new(),
        });
    }

    if let Some((key, value)) = term.split_once("!=") {
        return equality(key, Operator::NotEquals, value);
    }
    if let Some((key, value)) = term.split_once("==") {
        return equality(key, Operator::Equals, value);
    }
    if let Some((key, value)) = term.split_once('=') {
        return equality(key, Operator::Equals, value);
    }

    let mut words = term.splitn(2, char::is_whitespace);
    let key = parse_key(words.next().unwrap_or_default())?;
    let rest = words.next().map(str::trim).unwrap_or_default();
    if rest.is_empty() {
        return Ok(Requirement {
            key,
            operator: Operator::Exists,
            values: Vec::new(),
        });
    }

    let (operator, set) = if let Some(set) = rest.strip_prefix("notin") {
        (Operator::NotIn, set)
    } else if let Some(set) = rest.strip_prefix("in") {
        (Operator::In, set)
    } else {
        return Err(format!("unknown operator in {:?}", term));
    };

    let set = set.trim();
    let inner = set
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| format!("expected a parenthesized value set for key {:?}", key))?;
    let values = inner
        .split(',')
        .map(|v| parse_value(v.trim()))
        .collect::<Result<Vec<_>, _>>()?;
    if values.iter().all(String::is_empty) {
        return Err(format!("empty value set for key {:?}", key));
    }

    Ok(Requirement {
        key,
        operator,
        values,
    })
}

fn equality(key: &str, operator: Operator, value: &str) -> Result<Requirement, String> {
    Ok(Requirement {
        key: parse_key(key.trim())?,
        operator,
        values: vec![parse_value(value.trim())?],
    })
}

fn parse_key(key: &str) -> Result<String, String> {
    if key.is_empty() {
        return Err("missing label key".to_string());
    }
    if !key.chars().all(is_label_char) {
        return Err(format!("invalid label key {:?}", key));
    }
    Ok(key.to_string())
}

fn parse_value(value: &str) -> Result<String, String> {
    if !value.chars().all(is_label_char) {
        return Err(format!("invalid label value {:?}", value));
    }
    Ok(value.to_string())
}

fn is_label_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/')
}
