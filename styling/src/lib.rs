//! Incremental decoder for [XEP-0393] message styling markup.
//!
//! [`tokenize`] turns a styled message body into a sequence of [`Token`]s.
//! Concatenating every token's [`Token::data`] reproduces the original
//! input exactly; style information rides alongside as a bitmask so a
//! renderer can fold adjacent same-style runs however it likes.
//!
//! [XEP-0393]: https://xmpp.org/extensions/xep-0393.html

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#![warn(missing_docs)]

use bitflags::bitflags;

bitflags! {
    /// The style bitmask carried by a [`Token`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Style: u32 {
        /// Inside a preformatted block (``` ``` ```).
        const BLOCK_PRE = 1 << 0;
        /// This token is the block's opening fence.
        const BLOCK_PRE_START = 1 << 1;
        /// This token is the block's closing fence.
        const BLOCK_PRE_END = 1 << 2;
        /// Inside a block quote (`>`).
        const BLOCK_QUOTE = 1 << 3;
        /// This token begins (or deepens) a block quote.
        const BLOCK_QUOTE_START = 1 << 4;
        /// This token is a synthesized block-quote closer.
        const BLOCK_QUOTE_END = 1 << 5;
        /// Inside an `_emphasis_` span.
        const SPAN_EMPH = 1 << 6;
        /// This token is the span's opening `_`.
        const SPAN_EMPH_START = 1 << 7;
        /// This token is the span's closing `_`.
        const SPAN_EMPH_END = 1 << 8;
        /// Inside a `*strong*` span.
        const SPAN_STRONG = 1 << 9;
        /// This token is the span's opening `*`.
        const SPAN_STRONG_START = 1 << 10;
        /// This token is the span's closing `*`.
        const SPAN_STRONG_END = 1 << 11;
        /// Inside a `~strikethrough~` span.
        const SPAN_STRIKE = 1 << 12;
        /// This token is the span's opening `~`.
        const SPAN_STRIKE_START = 1 << 13;
        /// This token is the span's closing `~`.
        const SPAN_STRIKE_END = 1 << 14;
        /// Inside a `` `preformatted` `` span.
        const SPAN_PRE = 1 << 15;
        /// This token is the span's opening backtick.
        const SPAN_PRE_START = 1 << 16;
        /// This token is the span's closing backtick.
        const SPAN_PRE_END = 1 << 17;
    }
}

/// One tokenized run of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// The style bitmask active for this run.
    pub style: Style,
    /// The exact input bytes this token covers. May be empty for
    /// synthesized tokens such as a block-quote closer.
    pub data: &'a str,
    /// For a `BLOCK_PRE_START` token, the fence's info string (the text
    /// following the opening ` ``` ` on the same line).
    pub info: Option<&'a str>,
    /// The block-quote depth in effect for this token.
    pub quote_depth: u32,
}

const DIRECTIVES: [(char, Style, Style, Style); 4] = [
    ('_', Style::SPAN_EMPH, Style::SPAN_EMPH_START, Style::SPAN_EMPH_END),
    ('*', Style::SPAN_STRONG, Style::SPAN_STRONG_START, Style::SPAN_STRONG_END),
    ('~', Style::SPAN_STRIKE, Style::SPAN_STRIKE_START, Style::SPAN_STRIKE_END),
    ('`', Style::SPAN_PRE, Style::SPAN_PRE_START, Style::SPAN_PRE_END),
];

fn directive_for(c: char) -> Option<(Style, Style, Style)> {
    DIRECTIVES
        .iter()
        .find(|(d, ..)| *d == c)
        .map(|(_, base, start, end)| (*base, *start, *end))
}

/// Tokenize a complete styling document.
///
/// This operates on the whole input at once rather than byte-at-a-time,
/// but is structured line-by-line exactly as an incremental, chunk-fed
/// decoder would process it: each line's block-quote prefix, pre-block
/// fencing and span directives are resolved independently of the next.
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut depth = 0u32;
    let mut in_pre_block = false;

    let mut rest = input;
    while !rest.is_empty() {
        let (line, remainder, had_newline) = split_line(rest);
        rest = remainder;

        if in_pre_block {
            if line == "```" {
                in_pre_block = false;
                tokens.push(Token {
                    style: Style::BLOCK_PRE | Style::BLOCK_PRE_END,
                    data: line,
                    info: None,
                    quote_depth: depth,
                });
            } else {
                tokens.push(Token {
                    style: Style::BLOCK_PRE,
                    data: line,
                    info: None,
                    quote_depth: depth,
                });
            }
            if had_newline {
                tokens.push(Token {
                    style: Style::BLOCK_PRE,
                    data: "\n",
                    info: None,
                    quote_depth: depth,
                });
            }
            continue;
        }

        let (new_depth, content) = consume_quote_prefix(line, depth, &mut tokens);
        if new_depth == 0 && depth > 0 {
            tokens.push(Token {
                style: Style::BLOCK_QUOTE | Style::BLOCK_QUOTE_END,
                data: "",
                info: None,
                quote_depth: depth,
            });
        }
        depth = new_depth;

        if let Some(info) = content.strip_prefix("```") {
            in_pre_block = true;
            tokens.push(Token {
                style: Style::BLOCK_PRE | Style::BLOCK_PRE_START,
                data: line,
                info: Some(info),
                quote_depth: depth,
            });
        } else {
            tokenize_spans(content, depth, &mut tokens);
        }

        if had_newline {
            tokens.push(Token {
                style: if depth > 0 { Style::BLOCK_QUOTE } else { Style::empty() },
                data: "\n",
                info: None,
                quote_depth: depth,
            });
        }
    }

    if depth > 0 {
        tokens.push(Token {
            style: Style::BLOCK_QUOTE | Style::BLOCK_QUOTE_END,
            data: "",
            info: None,
            quote_depth: depth,
        });
    }

    tokens
}

/// Split off the next line (without its trailing `\n`) from `rest`,
/// returning `(line, remainder_after_newline, had_newline)`.
fn split_line(rest: &str) -> (&str, &str, bool) {
    match rest.find('\n') {
        Some(idx) => (&rest[..idx], &rest[idx + 1..], true),
        None => (rest, "", false),
    }
}

/// Consume a leading run of `>` markers (each optionally followed by a
/// single space, consumed as its own plain token), pushing the marker
/// tokens directly. Returns the new depth and the remaining line content.
fn consume_quote_prefix<'a>(line: &'a str, mut depth: u32, tokens: &mut Vec<Token<'a>>) -> (u32, &'a str) {
    let mut rest = line;
    let starting_depth = depth;
    while let Some(stripped) = rest.strip_prefix('>') {
        depth += 1;
        tokens.push(Token {
            style: Style::BLOCK_QUOTE | Style::BLOCK_QUOTE_START,
            data: &rest[..1],
            info: None,
            quote_depth: depth,
        });
        rest = stripped;
    }
    if depth == starting_depth {
        // No `>` prefix on this line at all: quote (if any) ends here.
        return (0, rest);
    }
    if let Some(stripped) = rest.strip_prefix(' ') {
        tokens.push(Token {
            style: Style::BLOCK_QUOTE,
            data: &rest[..1],
            info: None,
            quote_depth: depth,
        });
        rest = stripped;
    }
    (depth, rest)
}

/// Tokenize span directives within a single line's content (no `\n`).
fn tokenize_spans<'a>(mut content: &'a str, depth: u32, tokens: &mut Vec<Token<'a>>) {
    let quote_style = if depth > 0 { Style::BLOCK_QUOTE } else { Style::empty() };

    loop {
        match find_span_start(content) {
            None => {
                if !content.is_empty() {
                    tokens.push(Token {
                        style: quote_style,
                        data: content,
                        info: None,
                        quote_depth: depth,
                    });
                }
                return;
            }
            Some((start_idx, directive, base, start_flag, end_flag)) => {
                if start_idx > 0 {
                    tokens.push(Token {
                        style: quote_style,
                        data: &content[..start_idx],
                        info: None,
                        quote_depth: depth,
                    });
                }
                let after_start = start_idx + directive.len_utf8();
                match find_span_end(&content[after_start..], directive) {
                    Some(end_rel) => {
                        let end_idx = after_start + end_rel;
                        tokens.push(Token {
                            style: quote_style | base | start_flag,
                            data: &content[start_idx..after_start],
                            info: None,
                            quote_depth: depth,
                        });
                        tokens.push(Token {
                            style: quote_style | base,
                            data: &content[after_start..end_idx],
                            info: None,
                            quote_depth: depth,
                        });
                        let after_end = end_idx + directive.len_utf8();
                        tokens.push(Token {
                            style: quote_style | base | end_flag,
                            data: &content[end_idx..after_end],
                            info: None,
                            quote_depth: depth,
                        });
                        content = &content[after_end..];
                    }
                    None => {
                        // No valid closing directive: degrade to plain text
                        // and keep scanning after the candidate character.
                        tokens.push(Token {
                            style: quote_style,
                            data: &content[..after_start],
                            info: None,
                            quote_depth: depth,
                        });
                        content = &content[after_start..];
                    }
                }
            }
        }
    }
}

/// Find the first valid span-start directive in `content`: preceded by
/// start-of-line or whitespace, followed by a non-whitespace character.
fn find_span_start(content: &str) -> Option<(usize, char, Style, Style, Style)> {
    let mut prev: Option<char> = None;
    let mut chars = content.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if let Some((base, start_flag, end_flag)) = directive_for(c) {
            let preceded_ok = prev.is_none_or(|p| p.is_whitespace());
            let followed_ok = chars.peek().is_some_and(|(_, n)| !n.is_whitespace());
            if preceded_ok && followed_ok {
                return Some((idx, c, base, start_flag, end_flag));
            }
        }
        prev = Some(c);
    }
    None
}

/// Find the offset (relative to the start of `content`, which begins
/// right after the opening directive) of a valid closing directive:
/// preceded by a non-whitespace character, with at least one byte of
/// content before it.
fn find_span_end(content: &str, directive: char) -> Option<usize> {
    let mut prev: Option<char> = None;
    for (idx, c) in content.char_indices() {
        if c == directive && idx > 0 && prev.is_some_and(|p| !p.is_whitespace()) {
            return Some(idx);
        }
        prev = Some(c);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenation_reproduces_input() {
        let input = "> hello *world*\nplain";
        let tokens = tokenize(input);
        let joined: String = tokens.iter().map(|t| t.data).collect();
        assert_eq!(joined, input);
    }

    #[test]
    fn worked_example_matches_spec() {
        let tokens = tokenize("> hello *world*\nplain");
        let rendered: Vec<(&str, Style, u32)> =
            tokens.iter().map(|t| (t.data, t.style, t.quote_depth)).collect();
        assert_eq!(
            rendered,
            vec![
                (">", Style::BLOCK_QUOTE | Style::BLOCK_QUOTE_START, 1),
                (" ", Style::BLOCK_QUOTE, 1),
                ("hello ", Style::BLOCK_QUOTE, 1),
                ("*", Style::BLOCK_QUOTE | Style::SPAN_STRONG | Style::SPAN_STRONG_START, 1),
                ("world", Style::BLOCK_QUOTE | Style::SPAN_STRONG, 1),
                ("*", Style::BLOCK_QUOTE | Style::SPAN_STRONG | Style::SPAN_STRONG_END, 1),
                ("\n", Style::BLOCK_QUOTE, 1),
                ("", Style::BLOCK_QUOTE | Style::BLOCK_QUOTE_END, 1),
                ("plain", Style::empty(), 0),
            ]
        );
    }

    #[test]
    fn unmatched_directive_degrades_to_plain() {
        let tokens = tokenize("it's *not closed");
        assert!(tokens.iter().all(|t| t.style.is_empty()));
        let joined: String = tokens.iter().map(|t| t.data).collect();
        assert_eq!(joined, "it's *not closed");
    }

    #[test]
    fn span_requires_non_whitespace_after_start() {
        // "* " is not a valid start (space follows), so no span opens.
        let tokens = tokenize("a * b* c");
        assert!(tokens.iter().all(|t| !t.style.contains(Style::SPAN_STRONG)));
    }
}
