//! Match engine: compiles raw patterns with match-from-start semantics and
//! provides the literal-token view of a pattern used by diagnostics.

use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};

/// Words too common to count as evidence that a pattern is "about" an input.
pub const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "you", "your", "with", "this", "that", "from", "into",
    "please", "can", "could", "would", "will", "what", "how", "who", "all", "any", "some",
    "about", "there", "here", "its", "it's", "our", "out", "has", "have", "had", "not", "but",
];

/// A compiled pattern. Matching is case-insensitive and anchored at the
/// start of the input; the end is only anchored if the raw pattern says so.
#[derive(Debug, Clone)]
pub struct Matcher {
    raw: String,
    anchored: Regex,
}

impl Matcher {
    /// Compile `raw` so that it only matches from the first character.
    ///
    /// # Errors
    ///
    /// Returns the regex engine error for invalid syntax.
    pub fn compile(raw: &str) -> Result<Self, regex::Error> {
        let anchored = build(&format!("^(?:{raw})"))?;
        Ok(Self {
            raw: raw.to_owned(),
            anchored,
        })
    }

    /// Byte span of the match if `text` matches from its start.
    pub fn find_at_start(&self, text: &str) -> Option<(usize, usize)> {
        self.anchored.find(text).map(|m| (m.start(), m.end()))
    }

    /// Whether `text` matches from its start.
    pub fn is_match(&self, text: &str) -> bool {
        self.anchored.is_match(text)
    }

    /// The raw pattern this matcher was built from.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

fn build(source: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(source).case_insensitive(true).build()
}

/// Unanchored search: does `raw` match anywhere in `text`?
///
/// # Errors
///
/// Returns the regex engine error for invalid syntax.
pub fn search(raw: &str, text: &str) -> Result<Option<(usize, usize)>, regex::Error> {
    Ok(build(raw)?.find(text).map(|m| (m.start(), m.end())))
}

/// Remove a leading `^` and an unescaped trailing `$`.
///
/// Returns `None` when the pattern carries neither anchor.
pub fn strip_anchors(raw: &str) -> Option<String> {
    let mut stripped = raw;
    let mut changed = false;
    if let Some(rest) = stripped.strip_prefix('^') {
        stripped = rest;
        changed = true;
    }
    if let Some(rest) = stripped.strip_suffix('$') {
        let trailing_backslashes = rest.chars().rev().take_while(|c| *c == '\\').count();
        if trailing_backslashes % 2 == 0 {
            stripped = rest;
            changed = true;
        }
    }
    changed.then(|| stripped.to_owned())
}

/// Lowercase literal words left in a pattern once regex syntax is removed.
///
/// `^turn (on|off) (?:the )?(.+) lights?$` yields
/// `["turn", "on", "off", "the", "light"]`.
pub fn literal_tokens(raw: &str) -> Vec<String> {
    let chars: Vec<char> = raw.chars().collect();
    let mut cleaned = String::with_capacity(raw.len());
    let mut i = 0;

    while let Some(&c) = chars.get(i) {
        match c {
            '\\' => {
                // Escapes (\s, \b, \., \?) never contribute literal words.
                cleaned.push(' ');
                i = i.saturating_add(2);
            }
            '[' => {
                cleaned.push(' ');
                i = skip_past(&chars, i.saturating_add(1), ']');
            }
            '{' => {
                cleaned.push(' ');
                i = skip_past(&chars, i.saturating_add(1), '}');
            }
            '(' if chars.get(i.saturating_add(1)) == Some(&'?') => {
                cleaned.push(' ');
                i = skip_group_prefix(&chars, i.saturating_add(2));
            }
            '?' | '*' => {
                // A quantifier directly on a letter makes that letter
                // optional: `lights?` reads as "light".
                if cleaned.chars().last().is_some_and(char::is_alphanumeric) {
                    cleaned.pop();
                }
                cleaned.push(' ');
                i = i.saturating_add(1);
            }
            c if c.is_alphanumeric() || c == '\'' => {
                cleaned.extend(c.to_lowercase());
                i = i.saturating_add(1);
            }
            _ => {
                cleaned.push(' ');
                i = i.saturating_add(1);
            }
        }
    }

    cleaned
        .split_whitespace()
        .map(|t| t.trim_matches('\'').to_owned())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Literal tokens that carry meaning: longer than two characters, not a stop
/// word, de-duplicated in first-seen order.
pub fn keyword_tokens(raw: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for token in literal_tokens(raw) {
        if token.chars().count() > 2
            && !STOP_WORDS.contains(&token.as_str())
            && !keywords.contains(&token)
        {
            keywords.push(token);
        }
    }
    keywords
}

/// Lowercase word tokens of an utterance.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Replace known misspellings word by word.
///
/// Returns `None` when no word was replaced, so callers can skip a retry.
pub fn apply_typo_variants(text: &str, variants: &BTreeMap<String, String>) -> Option<String> {
    if variants.is_empty() {
        return None;
    }
    let mut replaced = false;
    let words: Vec<String> = text
        .split_whitespace()
        .map(|word| match variants.get(&word.to_lowercase()) {
            Some(canonical) => {
                replaced = true;
                canonical.clone()
            }
            None => word.to_owned(),
        })
        .collect();
    replaced.then(|| words.join(" "))
}

fn skip_past(chars: &[char], mut i: usize, close: char) -> usize {
    while let Some(&c) = chars.get(i) {
        i = i.saturating_add(1);
        if c == '\\' {
            i = i.saturating_add(1);
        } else if c == close {
            break;
        }
    }
    i
}

/// Skip the syntax after `(?`: `:`, lookarounds, named groups, inline flags.
fn skip_group_prefix(chars: &[char], i: usize) -> usize {
    match chars.get(i) {
        Some(':' | '=' | '!') => i.saturating_add(1),
        Some('<') if matches!(chars.get(i.saturating_add(1)), Some('=' | '!')) => {
            i.saturating_add(2)
        }
        Some('<') => skip_past(chars, i.saturating_add(1), '>'),
        Some('P') if chars.get(i.saturating_add(1)) == Some(&'<') => {
            skip_past(chars, i.saturating_add(2), '>')
        }
        _ => {
            let mut j = i;
            while let Some(&c) = chars.get(j) {
                if c.is_ascii_alphabetic() || c == '-' {
                    j = j.saturating_add(1);
                } else {
                    break;
                }
            }
            match chars.get(j) {
                Some(':' | ')') => j.saturating_add(1),
                _ => j,
            }
        }
    }
}
