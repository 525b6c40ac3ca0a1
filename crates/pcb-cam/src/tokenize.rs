//! Splits the layer side of a CAM instruction into address clauses.
//!
//! A clause is `[params] locator(key=value, flag, ...)`. Clauses are separated
//! by commas at nesting level 0. A backslash escapes the next character
//! anywhere in the clause. Tokens are returned as slices of the input; only
//! tokens that contained escapes are copied.

use std::borrow::Cow;
use std::iter::Peekable;
use std::str::CharIndices;

use crate::{CamError, Result};

/// Upper bound on supplements in a single clause.
pub const MAX_SUPPLEMENTS: usize = 64;

/// Byte span in the tokenized text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn slice<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start..self.end]
    }
}

/// One `key[=value]` pair from a clause's parenthesized tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Supplement<'a> {
    pub key: Cow<'a, str>,
    pub value: Option<Cow<'a, str>>,
}

/// One address clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause<'a> {
    /// Whole clause, without the separating comma.
    pub span: Span,
    /// Tokens of a leading `[...]` block.
    pub params: Vec<Cow<'a, str>>,
    /// Trimmed bare locator.
    pub locator: Cow<'a, str>,
    pub supplements: Vec<Supplement<'a>>,
}

/// Remove backslash escapes. A trailing lone backslash is kept.
pub fn unescape(text: &str) -> Cow<'_, str> {
    if !text.contains('\\') {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            out.push(chars.next().unwrap_or('\\'));
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Add backslash escapes to characters that are syntax inside a clause.
pub fn escape(text: &str) -> Cow<'_, str> {
    const SPECIAL: &[char] = &['\\', ',', '(', ')', '[', ']', '='];
    if !text.contains(SPECIAL) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 4);
    for c in text.chars() {
        if SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    Cow::Owned(out)
}

/// Byte offset of the first `needle` not preceded by a backslash escape.
pub fn find_unescaped(text: &str, needle: char) -> Option<usize> {
    let mut escaped = false;
    for (idx, c) in text.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == needle {
            return Some(idx);
        }
    }
    None
}

/// Trim unescaped surrounding whitespace, then unescape. `foo\ ` keeps its
/// trailing space.
fn unescape_trimmed(text: &str) -> Cow<'_, str> {
    let text = text.trim_start();
    let mut end = text.trim_end().len();
    if let Some(next) = text[end..].chars().next() {
        let backslashes = text[..end].chars().rev().take_while(|c| *c == '\\').count();
        if backslashes % 2 == 1 {
            end += next.len_utf8();
        }
    }
    unescape(&text[..end])
}

fn trimmed(src: &str, span: Span) -> Cow<'_, str> {
    unescape_trimmed(span.slice(src))
}

/// Streaming clause splitter over an immutable string.
pub struct ClauseTokenizer<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> ClauseTokenizer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().peekable(),
        }
    }

    fn pos(&mut self) -> usize {
        self.chars.peek().map(|(i, _)| *i).unwrap_or(self.src.len())
    }

    fn skip_whitespace(&mut self) {
        while let Some((_, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
            } else {
                break;
            }
        }
    }

    /// Parse the next clause. `Ok(None)` means the input is exhausted.
    pub fn next_clause(&mut self) -> Result<Option<Clause<'a>>> {
        self.skip_whitespace();
        let start = self.pos();
        if start >= self.src.len() {
            return Ok(None);
        }

        let params = if matches!(self.chars.peek(), Some((_, '['))) {
            let p = self.parse_params()?;
            self.skip_whitespace();
            p
        } else {
            Vec::new()
        };

        let loc_start = self.pos();
        let loc_end = self.scan_locator()?;
        let locator = trimmed(self.src, Span::new(loc_start, loc_end));

        let mut supplements = Vec::new();
        if matches!(self.chars.peek(), Some((_, '('))) {
            supplements = self.parse_supplements()?;
            self.skip_whitespace();
            match self.chars.peek().copied() {
                None | Some((_, ',')) => {}
                Some((pos, found)) => return Err(CamError::TrailingGarbage { pos, found }),
            }
        }

        let end = self.pos();
        // clause separator
        if matches!(self.chars.peek(), Some((_, ','))) {
            self.chars.next();
        }

        log::trace!(
            "clause {:?}: locator={:?} supplements={}",
            &self.src[start..end],
            locator,
            supplements.len()
        );

        Ok(Some(Clause {
            span: Span::new(start, end),
            params,
            locator,
            supplements,
        }))
    }

    /// Consume a `[a,b,...]` block; the opening bracket is the next char.
    fn parse_params(&mut self) -> Result<Vec<Cow<'a, str>>> {
        let (open, _) = self.chars.next().unwrap_or((0, '['));
        let mut tokens = Vec::new();
        let mut tok_start = open + 1;
        while let Some((idx, c)) = self.chars.next() {
            match c {
                '\\' => {
                    self.chars.next();
                }
                ',' | ']' => {
                    let tok = trimmed(self.src, Span::new(tok_start, idx));
                    if !tok.is_empty() {
                        tokens.push(tok);
                    }
                    if c == ']' {
                        return Ok(tokens);
                    }
                    tok_start = idx + 1;
                }
                _ => {}
            }
        }
        Err(CamError::UnbalancedBracket(open))
    }

    /// Advance over the locator and return its end offset. Stops before an
    /// unescaped `(` or `,`.
    fn scan_locator(&mut self) -> Result<usize> {
        while let Some((idx, c)) = self.chars.peek().copied() {
            match c {
                '(' | ',' => return Ok(idx),
                ')' => return Err(CamError::UnexpectedCloseParen(idx)),
                '\\' => {
                    self.chars.next();
                    self.chars.next();
                }
                _ => {
                    self.chars.next();
                }
            }
        }
        Ok(self.src.len())
    }

    /// Consume a parenthesized supplement list; the `(` is the next char.
    fn parse_supplements(&mut self) -> Result<Vec<Supplement<'a>>> {
        let (open, _) = self.chars.next().unwrap_or((0, '('));
        let mut out = Vec::new();
        let mut depth = 1usize;
        let mut item_start = open + 1;

        while let Some((idx, c)) = self.chars.next() {
            match c {
                '\\' => {
                    self.chars.next();
                }
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        self.push_supplement(&mut out, Span::new(item_start, idx))?;
                        return Ok(out);
                    }
                }
                ',' if depth == 1 => {
                    self.push_supplement(&mut out, Span::new(item_start, idx))?;
                    item_start = idx + 1;
                }
                _ => {}
            }
        }
        Err(CamError::UnbalancedParen(open))
    }

    fn push_supplement(&self, out: &mut Vec<Supplement<'a>>, span: Span) -> Result<()> {
        let raw = span.slice(self.src);
        if raw.trim().is_empty() {
            return Ok(());
        }
        if out.len() >= MAX_SUPPLEMENTS {
            return Err(CamError::TooManySupplements);
        }
        let supplement = match find_unescaped(raw, '=') {
            Some(eq) => Supplement {
                key: unescape_trimmed(&raw[..eq]),
                value: Some(unescape_trimmed(&raw[eq + 1..])),
            },
            None => Supplement {
                key: unescape_trimmed(raw),
                value: None,
            },
        };
        out.push(supplement);
        Ok(())
    }
}

impl<'a> Iterator for ClauseTokenizer<'a> {
    type Item = Result<Clause<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_clause().transpose()
    }
}

/// Tokenize a whole clause list.
pub fn tokenize(src: &str) -> Result<Vec<Clause<'_>>> {
    ClauseTokenizer::new(src).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys<'a>(clause: &'a Clause<'_>) -> Vec<(&'a str, Option<&'a str>)> {
        clause
            .supplements
            .iter()
            .map(|s| (s.key.as_ref(), s.value.as_deref()))
            .collect()
    }

    #[test]
    fn test_plain_clauses() {
        let clauses = tokenize("#0, @top_silk ,top-copper:2").unwrap();
        let locators: Vec<_> = clauses.iter().map(|c| c.locator.as_ref()).collect();
        assert_eq!(locators, vec!["#0", "@top_silk", "top-copper:2"]);
        assert!(clauses.iter().all(|c| c.supplements.is_empty()));
    }

    #[test]
    fn test_supplements_split_on_first_equals() {
        let clauses = tokenize("top-copper( bloat = 0.2mm , wireframe, purpose=a=b )").unwrap();
        assert_eq!(clauses.len(), 1);
        assert_eq!(
            keys(&clauses[0]),
            vec![
                ("bloat", Some("0.2mm")),
                ("wireframe", None),
                ("purpose", Some("a=b")),
            ]
        );
    }

    #[test]
    fn test_escaped_trailing_space_is_kept() {
        let clauses = tokenize(r"@foo\ , @bar\\ (purpose=a\ )").unwrap();
        assert_eq!(clauses[0].locator, "@foo ");
        // an escaped backslash does not escape the space after it
        assert_eq!(clauses[1].locator, r"@bar\");
        assert_eq!(keys(&clauses[1]), vec![("purpose", Some("a "))]);
        assert_eq!(unescape_trimmed("  x\\ "), "x ");
    }

    #[test]
    fn test_comma_inside_parens_does_not_split_clause() {
        let clauses = tokenize("top-copper(faded,partial),bottom-silk").unwrap();
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[1].locator, "bottom-silk");
    }

    #[test]
    fn test_nested_and_escaped_parens() {
        let clauses = tokenize(r"top-copper(purpose=f(x\)y\)),#1").unwrap();
        assert_eq!(clauses.len(), 2);
        assert_eq!(keys(&clauses[0]), vec![("purpose", Some("f(x)y)"))]);

        let clauses = tokenize("top-copper(purpose=f(x)),#1").unwrap();
        assert_eq!(keys(&clauses[0]), vec![("purpose", Some("f(x)"))]);
        assert_eq!(clauses[1].locator, "#1");
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            tokenize("top-copper)"),
            Err(CamError::UnexpectedCloseParen(10))
        ));
        assert!(matches!(
            tokenize("top-copper(bloat=1"),
            Err(CamError::UnbalancedParen(10))
        ));
        assert!(matches!(
            tokenize("top-copper(faded)x"),
            Err(CamError::TrailingGarbage { found: 'x', .. })
        ));
        assert!(matches!(
            tokenize("[okempty top-copper"),
            Err(CamError::UnbalancedBracket(0))
        ));
    }

    #[test]
    fn test_supplement_capacity() {
        let flags = vec!["faded"; MAX_SUPPLEMENTS].join(",");
        assert!(tokenize(&format!("top-copper({flags})")).is_ok());
        let flags = vec!["faded"; MAX_SUPPLEMENTS + 1].join(",");
        assert!(matches!(
            tokenize(&format!("top-copper({flags})")),
            Err(CamError::TooManySupplements)
        ));
    }

    #[test]
    fn test_params_block() {
        let clauses = tokenize("[okempty-group, okempty-content] top-copper, bottom-copper").unwrap();
        assert_eq!(clauses[0].params, vec!["okempty-group", "okempty-content"]);
        assert_eq!(clauses[0].locator, "top-copper");
        assert!(clauses[1].params.is_empty());
    }

    #[test]
    fn test_escaped_comma_in_name() {
        let clauses = tokenize(r"@odd\,name,#2").unwrap();
        assert_eq!(clauses[0].locator, "@odd,name");
        assert!(matches!(clauses[0].locator, Cow::Owned(_)));
        assert!(matches!(clauses[1].locator, Cow::Borrowed(_)));
    }

    #[test]
    fn test_escape_roundtrip() {
        let name = "a(b),c=d";
        assert_eq!(unescape(&escape(name)), name);
        assert_eq!(find_unescaped(r"a\=b=c", '='), Some(4));
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("").unwrap().is_empty());
        assert!(tokenize("   ").unwrap().is_empty());
    }
}
