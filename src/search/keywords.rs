//! Boolean-mode keywords to an FTS5 match expression / 关键词转 FTS5 表达式
//!
//! Accepted syntax:
//! - `term` optional; at least one optional term must match when nothing is required
//! - `+term` required / 必须包含
//! - `-term` excluded / 排除
//! - `term*` prefix / 前缀匹配
//! - `"several words"` phrase / 短语
//!
//! `~ < > ( )` are accepted and ignored. Every term is emitted as a quoted
//! FTS5 string, so punctuation inside it (`e-mail`, `v1.2`, `C++`, `title:`)
//! only separates tokens and never reaches the FTS5 query parser.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Occur {
    Should,
    Must,
    MustNot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Term {
    occur: Occur,
    text: String,
    prefix: bool,
}

impl Term {
    fn to_fts(&self) -> String {
        if self.prefix {
            format!("\"{}\"*", self.text)
        } else {
            format!("\"{}\"", self.text)
        }
    }
}

fn parse(keywords: &str) -> Vec<Term> {
    let mut terms = Vec::new();
    let mut chars = keywords.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let mut occur = Occur::Should;
        while let Some(&c) = chars.peek() {
            match c {
                '+' => occur = Occur::Must,
                '-' => occur = Occur::MustNot,
                '~' | '<' | '>' | '(' | ')' => {}
                _ => break,
            }
            chars.next();
        }

        let mut raw = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            for c in chars.by_ref() {
                if c == '"' {
                    break;
                }
                raw.push(c);
            }
            if chars.peek() == Some(&'*') {
                raw.push('*');
                chars.next();
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                raw.push(c);
                chars.next();
            }
        }

        let prefix = raw.ends_with('*');
        let text: String = raw
            .trim_end_matches('*')
            .chars()
            .filter(|c| !matches!(c, '"' | '(' | ')'))
            .collect();

        // nothing the tokenizer would index
        if !text.chars().any(char::is_alphanumeric) {
            continue;
        }

        terms.push(Term { occur, text, prefix });
    }

    terms
}

/// FTS5 expression for `keywords`, `None` when no term can match / 生成匹配表达式
///
/// Required terms are ANDed; optional terms only count when nothing is
/// required, and are then ORed. Excluded terms alone never match anything.
pub fn match_expression(keywords: &str) -> Option<String> {
    let terms = parse(keywords);
    let phrases = |occur: Occur| -> Vec<String> {
        terms
            .iter()
            .filter(|t| t.occur == occur)
            .map(Term::to_fts)
            .collect()
    };

    let required = phrases(Occur::Must);
    let optional = phrases(Occur::Should);
    let positive = if !required.is_empty() {
        required.join(" AND ")
    } else if !optional.is_empty() {
        optional.join(" OR ")
    } else {
        return None;
    };

    let mut expression = format!("({})", positive);
    for excluded in phrases(Occur::MustNot) {
        expression.push_str(" NOT ");
        expression.push_str(&excluded);
    }
    Some(expression)
}
