//! The executable artifact format.
//!
//! The compiler turns template source into a [`Program`], a small tree of
//! [`Node`]s, and stores it as pretty-printed JSON in the template cache. The
//! interpreter reads it back and executes it against a scope resolver.

use serde::{Deserialize, Serialize};

use crate::core::{Result, StrataError};

/// A compiled template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Name the template was compiled under
    pub template: String,
    /// Whether boundary comments were compiled in
    #[serde(default)]
    pub debug_comments: bool,
    pub nodes: Vec<Node>,
}

/// One instruction of a compiled template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Node {
    /// Literal output.
    Text { text: String },
    /// Render a lookup (`$A.B`).
    Value { path: Lookup },
    /// `<% if %>` with any `else_if` branches and an optional `else`.
    If {
        branches: Vec<Branch>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        otherwise: Vec<Node>,
    },
    /// `<% loop $X %>`: run the body once per element.
    Loop { path: Lookup, body: Vec<Node> },
    /// `<% with $X %>`: run the body with `$X` as the current item.
    With { path: Lookup, body: Vec<Node> },
    /// `<% include Name Arg=... %>`.
    Include {
        template: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<IncludeArg>,
    },
    /// `<% cached 'key', $Part %>`: memoize the body's output.
    Cached {
        /// Position of the block within its template
        index: usize,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        key: Vec<Argument>,
        body: Vec<Node>,
    },
}

/// A dotted lookup chain, `$A.B(1).C`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lookup {
    pub steps: Vec<Step>,
}

impl Lookup {
    pub fn single(name: impl Into<String>) -> Self {
        Self {
            steps: vec![Step::new(name)],
        }
    }

    /// The chain as written in the template, without the `$`.
    pub fn display(&self) -> String {
        self.steps.iter().map(|step| step.name.as_str()).collect::<Vec<_>>().join(".")
    }
}

/// One segment of a lookup chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Argument>,
}

impl Step {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }
}

/// A call argument, include argument or cache key part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Argument {
    Literal(serde_json::Value),
    Lookup(Lookup),
}

/// A condition and the nodes it guards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub condition: Condition,
    pub body: Vec<Node>,
}

/// `[not] $X`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub negated: bool,
    pub path: Lookup,
}

/// `Name=value` passed to an include.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncludeArg {
    pub name: String,
    pub value: Argument,
}

impl Program {
    /// Serialize to the artifact text stored in the cache.
    pub fn to_artifact(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| StrataError::CompileError {
            template: self.template.clone(),
            reason: format!("failed to serialize artifact: {e}"),
        })
    }

    /// Parse artifact text read from the cache.
    ///
    /// # Errors
    ///
    /// A corrupt artifact is a [`StrataError::RenderError`] for `template`.
    pub fn from_artifact(text: &str, template: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| StrataError::render(template, format!("corrupt compiled artifact: {e}")))
    }
}

/// Number the lines of an artifact for troubleshooting output.
///
/// Each line is prefixed with its 1-based number padded to five columns.
pub fn numbered_listing(artifact: &str) -> String {
    let mut out = String::with_capacity(artifact.len() + artifact.lines().count() * 5);
    for (num, line) in artifact.lines().enumerate() {
        out.push_str(&format!("{:<5}{line}\n", num + 1));
    }
    out
}
