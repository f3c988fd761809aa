//! Token-level view of genetic code.
//!
//! Mutation operators work on this form instead of raw text so that an edit
//! aimed at an identifier or a trait value cannot spill into its neighbours.
//! Rendering a parsed genome reproduces the input exactly.

use regex::Regex;
use std::sync::OnceLock;

/// Marker token introducing the species declaration.
pub const SPECIES_MARKER: &str = "ORGANISM";

/// Species key used when no declaration is found.
pub const UNKNOWN_SPECIES: &str = "unknown";

static LEXER: OnceLock<Regex> = OnceLock::new();

fn lexer() -> &'static Regex {
    LEXER.get_or_init(|| {
        Regex::new(concat!(
            r"(?s)(?P<space>\s+)",
            r"|(?P<ident>[A-Za-z_][A-Za-z0-9_]*)",
            r"|(?P<num>[0-9]+(?:\.[0-9]+)?)",
            r"|(?P<sym>.)",
        ))
        .expect("valid genome lexer pattern")
    })
}

/// A lexical token of genetic code.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Whitespace run
    Space(String),
    /// Identifier (`[A-Za-z_][A-Za-z0-9_]*`)
    Ident(String),
    /// Unsigned numeric literal, kept as written
    Number(String),
    /// Any other single character
    Symbol(char),
}

impl Token {
    fn text(&self) -> std::borrow::Cow<'_, str> {
        match self {
            Token::Space(s) | Token::Ident(s) | Token::Number(s) => s.as_str().into(),
            Token::Symbol(c) => c.to_string().into(),
        }
    }
}

/// Parsed genetic code.
#[derive(Debug, Clone, PartialEq)]
pub struct Genome {
    tokens: Vec<Token>,
}

impl Genome {
    /// Tokenize genetic code.
    pub fn parse(code: &str) -> Self {
        let tokens = lexer()
            .captures_iter(code)
            .filter_map(|caps| {
                if let Some(m) = caps.name("space") {
                    Some(Token::Space(m.as_str().to_string()))
                } else if let Some(m) = caps.name("ident") {
                    Some(Token::Ident(m.as_str().to_string()))
                } else if let Some(m) = caps.name("num") {
                    Some(Token::Number(m.as_str().to_string()))
                } else {
                    caps.name("sym").and_then(|m| m.as_str().chars().next()).map(Token::Symbol)
                }
            })
            .collect();
        Self { tokens }
    }

    /// Tokens in source order.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Render back to text.
    pub fn render(&self) -> String {
        self.tokens.iter().map(|t| t.text()).collect()
    }

    /// Numeric literals in source order.
    pub fn numbers(&self) -> Vec<f64> {
        self.tokens
            .iter()
            .filter_map(|t| match t {
                Token::Number(n) => n.parse().ok(),
                _ => None,
            })
            .collect()
    }

    /// Keys of every `key: value` pair, in source order.
    pub fn trait_keys(&self) -> Vec<String> {
        (0..self.tokens.len())
            .filter_map(|i| match (&self.tokens[i], self.trait_value_span(i)) {
                (Token::Ident(key), Some(_)) => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    /// Value text of the first `key: value` pair for `key`.
    pub fn trait_value(&self, key: &str) -> Option<String> {
        (0..self.tokens.len()).find_map(|i| match &self.tokens[i] {
            Token::Ident(k) if k == key => self
                .trait_value_span(i)
                .map(|(start, end)| self.tokens[start..end].iter().map(|t| t.text()).collect()),
            _ => None,
        })
    }

    /// Replace every identifier token equal to `from` with `to`.
    pub fn substitute_ident(&mut self, from: &str, to: &str) -> usize {
        let mut replaced = 0;
        for token in &mut self.tokens {
            if let Token::Ident(ident) = token {
                if ident == from {
                    *ident = to.to_string();
                    replaced += 1;
                }
            }
        }
        replaced
    }

    /// Multiply numeric literals by `factor`.
    ///
    /// With `keys == None` every literal in the genome is shifted; otherwise
    /// only literals inside the values of the named traits.
    pub fn scale_numbers(&mut self, factor: f64, keys: Option<&[String]>) -> usize {
        let in_scope: Vec<bool> = match keys {
            None => vec![true; self.tokens.len()],
            Some(keys) => {
                let mut mask = vec![false; self.tokens.len()];
                for i in 0..self.tokens.len() {
                    let Token::Ident(key) = &self.tokens[i] else { continue };
                    if !keys.iter().any(|k| k == key) {
                        continue;
                    }
                    if let Some((start, end)) = self.trait_value_span(i) {
                        mask[start..end].iter_mut().for_each(|m| *m = true);
                    }
                }
                mask
            }
        };

        let mut shifted = 0;
        for (token, scoped) in self.tokens.iter_mut().zip(in_scope) {
            if !scoped {
                continue;
            }
            if let Token::Number(raw) = token {
                if let Ok(value) = raw.parse::<f64>() {
                    *raw = format_number(value * factor);
                    shifted += 1;
                }
            }
        }
        shifted
    }

    /// Set the value of every `key: value` pair for `key`.
    pub fn set_trait(&mut self, key: &str, value: &str) -> usize {
        let mut spans = Vec::new();
        for i in 0..self.tokens.len() {
            if matches!(&self.tokens[i], Token::Ident(k) if k == key) {
                if let Some(span) = self.trait_value_span(i) {
                    spans.push(span);
                }
            }
        }

        // Splice from the back so earlier spans keep their indices.
        for &(start, end) in spans.iter().rev() {
            let replacement = Genome::parse(value).tokens;
            self.tokens.splice(start..end, replacement);
        }
        spans.len()
    }

    /// Token range `[start, end)` of the value following the identifier at
    /// `key_index`, when it is written as `key: value`. The value runs up to
    /// the next whitespace.
    fn trait_value_span(&self, key_index: usize) -> Option<(usize, usize)> {
        if !matches!(self.tokens.get(key_index), Some(Token::Ident(_))) {
            return None;
        }
        let mut i = key_index + 1;
        if matches!(self.tokens.get(i), Some(Token::Space(s)) if !s.contains('\n')) {
            i += 1;
        }
        if self.tokens.get(i) != Some(&Token::Symbol(':')) {
            return None;
        }
        i += 1;
        if matches!(self.tokens.get(i), Some(Token::Space(s)) if !s.contains('\n')) {
            i += 1;
        }
        let start = i;
        while i < self.tokens.len() && !matches!(self.tokens[i], Token::Space(_)) {
            i += 1;
        }
        (i > start).then_some((start, i))
    }
}

/// Format a shifted literal: at most 10 decimals, trailing zeros trimmed.
pub fn format_number(value: f64) -> String {
    let fixed = format!("{:.10}", value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Derive the species key of a genetic code.
///
/// The key is the token following `ORGANISM` on the first line that starts
/// with that marker, with a trailing `{` removed; `unknown` otherwise.
pub fn species_key(code: &str) -> String {
    for line in code.lines() {
        let mut parts = line.split_whitespace();
        if parts.next() != Some(SPECIES_MARKER) {
            continue;
        }
        if let Some(name) = parts.next() {
            let name = name.trim_end_matches('{').trim();
            if !name.is_empty() {
                return name.to_string();
            }
        }
        break;
    }
    UNKNOWN_SPECIES.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CODE: &str =
        "ORGANISM Aurora {\n  gates: [h, cx, ry(0.5)]\n  coherence: 0.95\n  depth: 12\n  q0 -> cx\n}\n";

    #[test]
    fn test_render_roundtrip() {
        let genome = Genome::parse(CODE);
        assert_eq!(genome.render(), CODE);
    }

    #[test]
    fn test_identifiers_with_digits_are_not_numbers() {
        let genome = Genome::parse("q0 q12 3.5 7");
        assert_eq!(genome.numbers(), vec![3.5, 7.0]);
    }

    #[test]
    fn test_species_key() {
        assert_eq!(species_key(CODE), "Aurora");
        assert_eq!(species_key("// header\nORGANISM Nova{\n}"), "Nova");
        assert_eq!(species_key("ORGANISMS Nova"), UNKNOWN_SPECIES);
        assert_eq!(species_key("ORGANISM\n"), UNKNOWN_SPECIES);
        assert_eq!(species_key(""), UNKNOWN_SPECIES);
    }

    #[test]
    fn test_substitute_whole_identifiers_only() {
        let mut genome = Genome::parse("cx q0; cxx q1; rcx q2; cx q3");
        assert_eq!(genome.substitute_ident("cx", "cz"), 2);
        assert_eq!(genome.render(), "cz q0; cxx q1; rcx q2; cz q3");
    }

    #[test]
    fn test_scale_all_numbers() {
        let mut genome = Genome::parse("coherence: 0.5\ndepth: 10\nry(2) q0");
        assert_eq!(genome.scale_numbers(2.0, None), 3);
        assert_eq!(genome.render(), "coherence: 1\ndepth: 20\nry(4) q0");
    }

    #[test]
    fn test_scale_scoped_numbers() {
        let mut genome = Genome::parse("coherence: 0.5\ndepth: 10\nry(2) q0");
        let keys = vec!["depth".to_string()];
        assert_eq!(genome.scale_numbers(1.5, Some(&keys)), 1);
        assert_eq!(genome.render(), "coherence: 0.5\ndepth: 15\nry(2) q0");
    }

    #[test]
    fn test_set_trait() {
        let mut genome = Genome::parse(CODE);
        assert_eq!(genome.set_trait("coherence", "0.99"), 1);
        assert!(genome.render().contains("coherence: 0.99\n"));
        assert_eq!(genome.set_trait("missing", "1"), 0);
    }

    #[test]
    fn test_trait_keys() {
        let genome = Genome::parse(CODE);
        assert_eq!(genome.trait_keys(), vec!["gates", "coherence", "depth"]);
        assert_eq!(genome.trait_value("depth").as_deref(), Some("12"));
        assert_eq!(genome.trait_value("gates").as_deref(), Some("[h,"));
        assert_eq!(genome.trait_value("missing"), None);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(110.00000000000001), "110");
        assert_eq!(format_number(0.55), "0.55");
        assert_eq!(format_number(0.0), "0");
    }
}
