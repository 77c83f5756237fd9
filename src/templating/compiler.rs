//! Template compilation.
//!
//! [`TemplateCompiler`] is the seam between the cache and the template grammar:
//! it turns source text into artifact text. [`MarkupCompiler`] is the built-in
//! implementation for a compact markup:
//!
//! | Syntax | Meaning |
//! |---|---|
//! | `$Title`, `$Author.Name`, `{$Author.Name}` | render a lookup |
//! | `$Pos(0)`, `$Modulus(2, 1)` | call with arguments |
//! | `<% if $X %>`, `<% if not $X %>`, `<% else_if $Y %>`, `<% else %>`, `<% end_if %>` | conditionals |
//! | `<% loop $Children %>` ... `<% end_loop %>` | iterate a collection |
//! | `<% with $Author %>` ... `<% end_with %>` | change the current item |
//! | `<% include Nav Title=$Title, Mode="compact" %>` | render another template |
//! | `<% cached 'nav', $ID %>` ... `<% end_cached %>` | memoize a fragment |
//! | `<%-- note --%>` | comment, dropped |
//!
//! Arguments are quoted strings, numbers, `true`/`false`, lookups (`$X`) or
//! bare words (taken as strings). Unbalanced blocks and unknown tags are
//! compile errors.

use regex::Regex;
use std::sync::OnceLock;

use super::artifact::{Argument, Branch, Condition, IncludeArg, Lookup, Node, Program, Step};
use crate::core::{Result, StrataError};

/// Turns template source into executable artifact text.
pub trait TemplateCompiler: Send + Sync {
    /// Compile `source`, known as `template`, optionally with boundary comments.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::CompileError`] when the source is invalid.
    fn compile(&self, source: &str, template: &str, debug_comments: bool) -> Result<String>;
}

const PATH_PATTERN: &str =
    r"[A-Za-z_][A-Za-z0-9_]*(?:\([^()]*\))?(?:\.[A-Za-z_][A-Za-z0-9_]*(?:\([^()]*\))?)*";

fn token_regex() -> std::result::Result<&'static Regex, &'static regex::Error> {
    static TOKENS: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    TOKENS
        .get_or_init(|| {
            Regex::new(&format!(
                r"(?s)(?P<comment><%--.*?--%>)|<%\s*(?P<tag>.*?)\s*%>|\{{\$(?P<braced>{PATH_PATTERN})\}}|\$(?P<bare>{PATH_PATTERN})"
            ))
        })
        .as_ref()
}

/// Compiler for the built-in markup.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkupCompiler;

impl MarkupCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Parse `source` into a [`Program`].
    pub fn parse(&self, source: &str, template: &str, debug_comments: bool) -> Result<Program> {
        let tokens = token_regex().map_err(|e| StrataError::CompileError {
            template: template.to_string(),
            reason: format!("invalid token pattern: {e}"),
        })?;

        let mut parser = Parser::new(template);
        let mut last = 0;

        for caps in tokens.captures_iter(source) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            parser.text(&source[last..whole.start()]);
            last = whole.end();
            parser.line = line_of(source, whole.start());

            if caps.name("comment").is_some() {
                continue;
            }
            if let Some(tag) = caps.name("tag") {
                parser.tag(tag.as_str().trim())?;
            } else if let Some(path) = caps.name("braced").or_else(|| caps.name("bare")) {
                let path = parser.path(path.as_str())?;
                parser.push(Node::Value {
                    path,
                });
            }
        }
        parser.text(&source[last..]);

        let mut nodes = parser.finish()?;
        if debug_comments {
            nodes.insert(
                0,
                Node::Text {
                    text: format!("<!-- template {template} -->"),
                },
            );
            nodes.push(Node::Text {
                text: format!("<!-- end template {template} -->"),
            });
        }

        Ok(Program {
            template: template.to_string(),
            debug_comments,
            nodes,
        })
    }
}

impl TemplateCompiler for MarkupCompiler {
    fn compile(&self, source: &str, template: &str, debug_comments: bool) -> Result<String> {
        let program = self.parse(source, template, debug_comments)?;
        tracing::debug!("Compiled template {template} ({} top-level nodes)", program.nodes.len());
        program.to_artifact()
    }
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}

enum BlockKind {
    If {
        branches: Vec<Branch>,
        // None once `else` has been seen
        pending: Option<Condition>,
    },
    Loop(Lookup),
    With(Lookup),
    Cached {
        index: usize,
        key: Vec<Argument>,
    },
}

impl BlockKind {
    fn name(&self) -> &'static str {
        match self {
            Self::If { .. } => "if",
            Self::Loop(_) => "loop",
            Self::With(_) => "with",
            Self::Cached { .. } => "cached",
        }
    }
}

struct OpenBlock {
    kind: BlockKind,
    nodes: Vec<Node>,
    line: usize,
}

struct Parser<'a> {
    template: &'a str,
    root: Vec<Node>,
    open: Vec<OpenBlock>,
    cached_blocks: usize,
    line: usize,
}

impl<'a> Parser<'a> {
    fn new(template: &'a str) -> Self {
        Self {
            template,
            root: Vec::new(),
            open: Vec::new(),
            cached_blocks: 0,
            line: 1,
        }
    }

    fn error(&self, reason: impl std::fmt::Display) -> StrataError {
        StrataError::CompileError {
            template: self.template.to_string(),
            reason: format!("line {}: {reason}", self.line),
        }
    }

    fn current(&mut self) -> &mut Vec<Node> {
        match self.open.last_mut() {
            Some(block) => &mut block.nodes,
            None => &mut self.root,
        }
    }

    fn push(&mut self, node: Node) {
        self.current().push(node);
    }

    fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let nodes = self.current();
        if let Some(Node::Text {
            text: previous,
        }) = nodes.last_mut()
        {
            previous.push_str(text);
        } else {
            nodes.push(Node::Text {
                text: text.to_string(),
            });
        }
    }

    fn open_block(&mut self, kind: BlockKind) {
        self.open.push(OpenBlock {
            kind,
            nodes: Vec::new(),
            line: self.line,
        });
    }

    fn close_block(&mut self, expected: &str) -> Result<OpenBlock> {
        match self.open.pop() {
            Some(block) if block.kind.name() == expected => Ok(block),
            Some(block) => {
                let err = self.error(format!(
                    "unexpected end_{expected}, <% {} %> opened on line {} is still open",
                    block.kind.name(),
                    block.line
                ));
                Err(err)
            }
            None => Err(self.error(format!("end_{expected} without a matching <% {expected} %>"))),
        }
    }

    fn tag(&mut self, tag: &str) -> Result<()> {
        let (keyword, rest) = match tag.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (tag, ""),
        };

        match keyword {
            "if" => {
                let condition = self.condition(rest)?;
                self.open_block(BlockKind::If {
                    branches: Vec::new(),
                    pending: Some(condition),
                });
            }
            "else_if" => {
                let condition = self.condition(rest)?;
                self.next_branch(Some(condition), "else_if")?;
            }
            "else" => {
                self.expect_no_args(keyword, rest)?;
                self.next_branch(None, "else")?;
            }
            "end_if" => {
                self.expect_no_args(keyword, rest)?;
                let block = self.close_block("if")?;
                if let BlockKind::If {
                    mut branches,
                    pending,
                } = block.kind
                {
                    let otherwise = match pending {
                        Some(condition) => {
                            branches.push(Branch {
                                condition,
                                body: block.nodes,
                            });
                            Vec::new()
                        }
                        None => block.nodes,
                    };
                    self.push(Node::If {
                        branches,
                        otherwise,
                    });
                }
            }
            "loop" => {
                let path = self.path(rest)?;
                self.open_block(BlockKind::Loop(path));
            }
            "end_loop" => {
                self.expect_no_args(keyword, rest)?;
                let block = self.close_block("loop")?;
                if let BlockKind::Loop(path) = block.kind {
                    self.push(Node::Loop {
                        path,
                        body: block.nodes,
                    });
                }
            }
            "with" => {
                let path = self.path(rest)?;
                self.open_block(BlockKind::With(path));
            }
            "end_with" => {
                self.expect_no_args(keyword, rest)?;
                let block = self.close_block("with")?;
                if let BlockKind::With(path) = block.kind {
                    self.push(Node::With {
                        path,
                        body: block.nodes,
                    });
                }
            }
            "include" => {
                let node = self.include(rest)?;
                self.push(node);
            }
            "cached" => {
                let key = split_top_level(rest, ',')
                    .into_iter()
                    .filter(|part| !part.is_empty())
                    .map(|part| self.argument(part))
                    .collect::<Result<Vec<_>>>()?;
                let index = self.cached_blocks;
                self.cached_blocks += 1;
                self.open_block(BlockKind::Cached {
                    index,
                    key,
                });
            }
            "end_cached" => {
                self.expect_no_args(keyword, rest)?;
                let block = self.close_block("cached")?;
                if let BlockKind::Cached {
                    index,
                    key,
                } = block.kind
                {
                    self.push(Node::Cached {
                        index,
                        key,
                        body: block.nodes,
                    });
                }
            }
            "" => return Err(self.error("empty tag")),
            other => return Err(self.error(format!("unknown tag '{other}'"))),
        }
        Ok(())
    }

    fn next_branch(&mut self, condition: Option<Condition>, keyword: &str) -> Result<()> {
        let open = self.open.last().map(|block| {
            let awaiting_branch = matches!(
                &block.kind,
                BlockKind::If {
                    pending: Some(_),
                    ..
                }
            );
            (block.kind.name(), awaiting_branch)
        });
        match open {
            None => return Err(self.error(format!("{keyword} outside of <% if %>"))),
            Some(("if", true)) => {}
            Some(("if", false)) => return Err(self.error(format!("{keyword} after else"))),
            Some((other, _)) => {
                return Err(self.error(format!("{keyword} inside <% {other} %>, expected <% if %>")));
            }
        }

        if let Some(OpenBlock {
            kind: BlockKind::If {
                branches,
                pending,
            },
            nodes,
            ..
        }) = self.open.last_mut()
            && let Some(previous) = pending.take()
        {
            branches.push(Branch {
                condition: previous,
                body: std::mem::take(nodes),
            });
            *pending = condition;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<Node>> {
        if let Some(block) = self.open.pop() {
            self.line = block.line;
            return Err(self.error(format!("unclosed <% {} %>", block.kind.name())));
        }
        Ok(self.root)
    }

    fn expect_no_args(&self, keyword: &str, rest: &str) -> Result<()> {
        if rest.is_empty() {
            Ok(())
        } else {
            Err(self.error(format!("{keyword} takes no arguments")))
        }
    }

    fn condition(&self, text: &str) -> Result<Condition> {
        let (negated, path) = match text.strip_prefix("not") {
            Some(rest) if rest.starts_with(char::is_whitespace) => (true, rest.trim()),
            _ => (false, text),
        };
        Ok(Condition {
            negated,
            path: self.path(path)?,
        })
    }

    fn path(&self, text: &str) -> Result<Lookup> {
        let text = text.trim();
        let text = text.strip_prefix('$').unwrap_or(text);
        if text.is_empty() {
            return Err(self.error("expected a lookup"));
        }

        let steps = split_top_level(text, '.')
            .into_iter()
            .map(|segment| self.step(segment))
            .collect::<Result<Vec<_>>>()?;
        Ok(Lookup {
            steps,
        })
    }

    fn step(&self, segment: &str) -> Result<Step> {
        let (name, args) = match segment.split_once('(') {
            Some((name, rest)) => {
                let Some(inner) = rest.strip_suffix(')') else {
                    return Err(self.error(format!("unbalanced parentheses in '{segment}'")));
                };
                let args = split_top_level(inner, ',')
                    .into_iter()
                    .filter(|arg| !arg.is_empty())
                    .map(|arg| self.argument(arg))
                    .collect::<Result<Vec<_>>>()?;
                (name, args)
            }
            None => (segment, Vec::new()),
        };

        if !is_identifier(name) {
            return Err(self.error(format!("invalid name '{name}'")));
        }
        Ok(Step {
            name: name.to_string(),
            args,
        })
    }

    fn argument(&self, text: &str) -> Result<Argument> {
        let text = text.trim();
        if text.starts_with('$') {
            return Ok(Argument::Lookup(self.path(text)?));
        }
        Ok(Argument::Literal(literal_value(text)))
    }

    fn include(&self, rest: &str) -> Result<Node> {
        let (template, args) = match rest.split_once(char::is_whitespace) {
            Some((template, args)) => (template, args.trim()),
            None => (rest, ""),
        };
        if template.is_empty() || !template.split(['/', '\\']).all(is_identifier) {
            return Err(self.error(format!("invalid include name '{template}'")));
        }

        let args = split_top_level(args, ',')
            .into_iter()
            .filter(|arg| !arg.is_empty())
            .map(|arg| {
                let Some((name, value)) = arg.split_once('=') else {
                    return Err(self.error(format!("include argument '{arg}' must be Name=value")));
                };
                let name = name.trim();
                if !is_identifier(name) {
                    return Err(self.error(format!("invalid include argument name '{name}'")));
                }
                Ok(IncludeArg {
                    name: name.to_string(),
                    value: self.argument(value)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Node::Include {
            template: template.to_string(),
            args,
        })
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn literal_value(text: &str) -> serde_json::Value {
    for quote in ['\'', '"'] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return serde_json::Value::String(text[1..text.len() - 1].to_string());
        }
    }
    if let Ok(int) = text.parse::<i64>() {
        return int.into();
    }
    if let Some(number) = text.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
        return serde_json::Value::Number(number);
    }
    match text {
        "true" => true.into(),
        "false" => false.into(),
        _ => serde_json::Value::String(text.to_string()),
    }
}

/// Split on `separator` outside quotes and parentheses, trimming each part.
fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, c) if c == separator && depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() || !parts.is_empty() {
        parts.push(tail);
    }
    parts
}
