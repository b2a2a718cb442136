//! Conditional inclusion rules applied while walking a template tree.

use std::fmt;
use std::sync::Arc;

use globset::{Glob, GlobMatcher, GlobSet};
use serde::Deserialize;
use serde_json::Value;

use crate::context::Context;
use crate::error::{Error, Result};

type RuleFn = dyn Fn(&str, bool, &Context) -> anyhow::Result<Decision> + Send + Sync;

/// What the walker does with an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Include,
    /// Skip this entry but keep walking its children.
    SkipEntry,
    /// Skip this entry and everything below it.
    SkipSubtree,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    #[default]
    Equals,
    NotEquals,
    /// The context value is a list containing `value`, or a string containing it.
    Contains,
}

/// A test of one context value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Condition {
    pub key: String,
    #[serde(default)]
    pub op: Op,
    pub value: Value,
}

impl Condition {
    pub fn equals<K: Into<String>>(key: K, value: Value) -> Self {
        Self { key: key.into(), op: Op::Equals, value }
    }

    pub fn not_equals<K: Into<String>>(key: K, value: Value) -> Self {
        Self { key: key.into(), op: Op::NotEquals, value }
    }

    pub fn contains<K: Into<String>>(key: K, value: Value) -> Self {
        Self { key: key.into(), op: Op::Contains, value }
    }

    /// Evaluates the condition. A key missing from the context is an error.
    pub fn holds(&self, context: &Context) -> Result<bool> {
        let actual = context.get(&self.key).map_err(|_| Error::MissingContextKey {
            key: self.key.clone(),
            location: format!("condition '{self}'"),
        })?;
        Ok(match self.op {
            Op::Equals => *actual == self.value,
            Op::NotEquals => *actual != self.value,
            Op::Contains => match (actual, &self.value) {
                (Value::Array(items), expected) => items.contains(expected),
                (Value::String(s), Value::String(needle)) => s.contains(needle.as_str()),
                _ => false,
            },
        })
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            Op::Equals => "==",
            Op::NotEquals => "!=",
            Op::Contains => "contains",
        };
        write!(f, "{} {} {}", self.key, op, self.value)
    }
}

/// True when every condition holds. An empty list always holds.
pub fn all_hold(conditions: &[Condition], context: &Context) -> Result<bool> {
    for condition in conditions {
        if !condition.holds(context)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// A glob over template-relative source paths.
#[derive(Debug, Clone)]
pub struct PathPattern {
    glob: String,
    matcher: GlobMatcher,
}

impl PathPattern {
    pub fn new(glob: &str) -> Result<Self> {
        let matcher = Glob::new(glob.trim_end_matches('/'))?.compile_matcher();
        Ok(Self { glob: glob.to_string(), matcher })
    }

    pub fn is_match(&self, relative: &str) -> bool {
        self.matcher.is_match(relative)
    }

    pub fn as_str(&self) -> &str {
        &self.glob
    }
}

/// One entry in a template's ordered rule list.
#[derive(Clone)]
pub enum Rule {
    /// Paths matching the set are never part of the output.
    Ignore(GlobSet),
    /// Matching paths are left out while all conditions hold.
    ExcludeIf { pattern: PathPattern, when: Vec<Condition> },
    /// Matching paths are only kept while all conditions hold.
    IncludeIf { pattern: PathPattern, when: Vec<Condition> },
    Custom { name: String, decide: Arc<RuleFn> },
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl Rule {
    pub fn exclude_if(pattern: &str, when: Vec<Condition>) -> Result<Self> {
        Ok(Rule::ExcludeIf { pattern: PathPattern::new(pattern)?, when })
    }

    pub fn include_if(pattern: &str, when: Vec<Condition>) -> Result<Self> {
        Ok(Rule::IncludeIf { pattern: PathPattern::new(pattern)?, when })
    }

    pub fn custom<N, F>(name: N, decide: F) -> Self
    where
        N: Into<String>,
        F: Fn(&str, bool, &Context) -> anyhow::Result<Decision> + Send + Sync + 'static,
    {
        Rule::Custom { name: name.into(), decide: Arc::new(decide) }
    }

    pub fn describe(&self) -> String {
        let join = |when: &[Condition]| {
            when.iter().map(ToString::to_string).collect::<Vec<_>>().join(" and ")
        };
        match self {
            Rule::Ignore(_) => "ignore patterns".to_string(),
            Rule::ExcludeIf { pattern, when } => {
                format!("exclude '{}' if {}", pattern.as_str(), join(when))
            }
            Rule::IncludeIf { pattern, when } => {
                format!("include '{}' only if {}", pattern.as_str(), join(when))
            }
            Rule::Custom { name, .. } => format!("rule '{name}'"),
        }
    }

    /// Decides what happens to the entry at `relative` (a `/`-separated source path).
    pub fn decide(&self, relative: &str, is_dir: bool, context: &Context) -> Result<Decision> {
        match self {
            Rule::Ignore(set) if set.is_match(relative) => Ok(Decision::SkipSubtree),
            Rule::Ignore(_) => Ok(Decision::Include),
            Rule::ExcludeIf { pattern, when } => {
                if pattern.is_match(relative) && all_hold(when, context)? {
                    Ok(Decision::SkipSubtree)
                } else {
                    Ok(Decision::Include)
                }
            }
            Rule::IncludeIf { pattern, when } => {
                if pattern.is_match(relative) && !all_hold(when, context)? {
                    Ok(Decision::SkipSubtree)
                } else {
                    Ok(Decision::Include)
                }
            }
            Rule::Custom { name, decide } => {
                decide(relative, is_dir, context).map_err(|e| Error::Template {
                    location: format!("rule '{name}' on '{relative}'"),
                    reason: e.to_string(),
                })
            }
        }
    }
}

/// Applies `rules` in order. The first rule that does not include the entry decides.
///
/// Returns the decision and, when the entry is skipped, a description of the rule.
pub fn evaluate(
    rules: &[Rule],
    relative: &str,
    is_dir: bool,
    context: &Context,
) -> Result<(Decision, Option<String>)> {
    for rule in rules {
        let decision = rule.decide(relative, is_dir, context)?;
        if decision != Decision::Include {
            return Ok((decision, Some(rule.describe())));
        }
    }
    Ok((Decision::Include, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(ci: &str) -> Context {
        let mut context = Context::new();
        context.insert("ci", json!(ci)).unwrap();
        context.insert("packages", json!(["api", "worker"])).unwrap();
        context
    }

    #[test]
    fn test_condition_ops() {
        let ctx = context("GitHub");
        assert!(Condition::equals("ci", json!("GitHub")).holds(&ctx).unwrap());
        assert!(Condition::not_equals("ci", json!("GitLab")).holds(&ctx).unwrap());
        assert!(Condition::contains("packages", json!("api")).holds(&ctx).unwrap());
        assert!(!Condition::contains("packages", json!("cli")).holds(&ctx).unwrap());
    }

    #[test]
    fn test_condition_on_missing_key_fails() {
        let ctx = context("GitHub");
        assert!(matches!(
            Condition::equals("docs", json!(true)).holds(&ctx),
            Err(Error::MissingContextKey { .. })
        ));
    }

    #[test]
    fn test_first_skipping_rule_wins() {
        let rules = vec![
            Rule::include_if(".github", vec![Condition::equals("ci", json!("GitHub"))]).unwrap(),
            Rule::custom("never", |_, _, _| Ok(Decision::SkipEntry)),
        ];
        let (decision, reason) = evaluate(&rules, ".github", true, &context("GitLab")).unwrap();
        assert_eq!(decision, Decision::SkipSubtree);
        assert!(reason.unwrap().contains(".github"));

        let (decision, reason) = evaluate(&rules, ".github", true, &context("GitHub")).unwrap();
        assert_eq!(decision, Decision::SkipEntry);
        assert_eq!(reason.unwrap(), "rule 'never'");
    }
}
