//! Output file name templates.
//!
//! | directive          | expands to                                              |
//! |--------------------|---------------------------------------------------------|
//! | `%name%`           | name of the group or virtual layer being exported       |
//! | `%top_offs[N]%`    | copper groups between the top copper and this one, + N |
//! | `%bot_offs[N]%`    | same, counted from the bottom copper                    |
//! | `%var%`            | variable from the session's [`VarStore`], or nothing    |
//! | `%%`               | a literal `%`                                           |
//! | `$(key)`           | configuration value, or nothing                         |
//! | leading `~`        | the user's home directory                               |

use std::collections::BTreeMap;

use thiserror::Error;

use crate::vars::VarStore;

/// Longest accepted `%var%` name, in bytes.
pub const MAX_VAR_NAME: usize = 64;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unterminated '%' directive at byte {0}")]
    Unterminated(usize),

    #[error("unterminated '$(' at byte {0}")]
    UnterminatedConfig(usize),

    #[error("variable name too long ({} bytes, limit {}): '{name}'", .name.len(), MAX_VAR_NAME)]
    NameTooLong { name: String },

    #[error("invalid copper offset in '%{0}%'")]
    InvalidOffset(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Home,
    Name,
    TopOffs(i64),
    BotOffs(i64),
    Var(String),
    Config(String),
}

/// Per-target values a template is expanded against.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    pub name: &'a str,
    /// Copper distance from the top copper group; `None` when undefined.
    pub top_offs: Option<i64>,
    pub bot_offs: Option<i64>,
    pub vars: &'a VarStore,
    pub config: &'a BTreeMap<String, String>,
}

/// A compiled file name template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn compile(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;
        let mut pos = 0;

        if let Some(after) = rest.strip_prefix('~') {
            if after.is_empty() || after.starts_with('/') {
                segments.push(Segment::Home);
                rest = after;
                pos = 1;
            }
        }

        while let Some(c) = rest.chars().next() {
            match c {
                '%' => {
                    let close = rest[1..]
                        .find('%')
                        .ok_or(TemplateError::Unterminated(pos))?;
                    let body = &rest[1..1 + close];
                    if body.is_empty() {
                        literal.push('%');
                    } else {
                        flush(&mut literal, &mut segments);
                        segments.push(directive(body)?);
                    }
                    let used = close + 2;
                    rest = &rest[used..];
                    pos += used;
                }
                '$' if rest[1..].starts_with('(') => {
                    let close = rest
                        .find(')')
                        .ok_or(TemplateError::UnterminatedConfig(pos))?;
                    flush(&mut literal, &mut segments);
                    segments.push(Segment::Config(rest[2..close].trim().to_string()));
                    rest = &rest[close + 1..];
                    pos += close + 1;
                }
                _ => {
                    literal.push(c);
                    rest = &rest[c.len_utf8()..];
                    pos += c.len_utf8();
                }
            }
        }
        flush(&mut literal, &mut segments);

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The expansion depends on the target being exported.
    pub fn is_per_target(&self) -> bool {
        self.segments.iter().any(|s| {
            matches!(
                s,
                Segment::Name | Segment::TopOffs(_) | Segment::BotOffs(_)
            )
        })
    }

    pub fn expand(&self, ctx: &TemplateContext<'_>) -> String {
        let mut out = String::with_capacity(self.source.len() + ctx.name.len());
        for seg in &self.segments {
            match seg {
                Segment::Literal(s) => out.push_str(s),
                Segment::Home => match dirs::home_dir() {
                    Some(home) => out.push_str(&home.to_string_lossy()),
                    None => out.push('~'),
                },
                Segment::Name => out.push_str(ctx.name),
                Segment::TopOffs(tune) => {
                    if let Some(offs) = ctx.top_offs {
                        out.push_str(&(offs + tune).to_string());
                    }
                }
                Segment::BotOffs(tune) => {
                    if let Some(offs) = ctx.bot_offs {
                        out.push_str(&(offs + tune).to_string());
                    }
                }
                Segment::Var(name) => {
                    if let Some(v) = ctx.vars.get(name) {
                        out.push_str(v);
                    }
                }
                Segment::Config(key) => {
                    if let Some(v) = ctx.config.get(key) {
                        out.push_str(v);
                    }
                }
            }
        }
        out
    }
}

fn flush(literal: &mut String, segments: &mut Vec<Segment>) {
    if !literal.is_empty() {
        segments.push(Segment::Literal(std::mem::take(literal)));
    }
}

fn directive(body: &str) -> Result<Segment, TemplateError> {
    if body == "name" {
        return Ok(Segment::Name);
    }
    for (prefix, top) in [("top_offs", true), ("bot_offs", false)] {
        if let Some(tune) = body.strip_prefix(prefix) {
            let tune = if tune.is_empty() {
                0
            } else {
                tune.parse::<i64>()
                    .map_err(|_| TemplateError::InvalidOffset(body.to_string()))?
            };
            return Ok(if top {
                Segment::TopOffs(tune)
            } else {
                Segment::BotOffs(tune)
            });
        }
    }
    if body.len() > MAX_VAR_NAME {
        return Err(TemplateError::NameTooLong {
            name: body.to_string(),
        });
    }
    Ok(Segment::Var(body.to_string()))
}
