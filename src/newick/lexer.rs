//! Newick tokenizer.
//!
//! Two states: `Normal` splits structural punctuation from label and length
//! text, `InAnnotation` consumes a bracketed block while balancing nested
//! brackets, so commas and parentheses inside `[&...]` never reach the parser.
//! Brackets inside a double-quoted annotation value are not counted.
//!
//! Unquoted text runs up to the next punctuation character and may contain
//! spaces and apostrophes. A `'` only opens a quoted label at the start of a token.

use std::borrow::Cow;

use crate::error::{ParseError, ParseErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token<'a> {
    Open,
    Close,
    Comma,
    Colon,
    Semicolon,
    /// Label or branch length text, with quotes removed
    Text(Cow<'a, str>),
    /// Body of a `[&...]` block, without the leading `&`
    Annotation(&'a str),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned<'a> {
    pub token: Token<'a>,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Normal,
    InAnnotation {
        start: usize,
        depth: usize,
        quoted: bool,
    },
}

fn is_delimiter(c: char) -> bool {
    matches!(c, '(' | ')' | ',' | ':' | ';' | '[' | ']')
}

pub(crate) fn tokenize(text: &str) -> Result<Vec<Spanned<'_>>, ParseError> {
    let mut tokens = Vec::new();
    let mut state = State::Normal;
    let mut chars = text.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        match state {
            State::InAnnotation {
                start,
                depth,
                quoted,
            } => match c {
                '"' => {
                    state = State::InAnnotation {
                        start,
                        depth,
                        quoted: !quoted,
                    }
                }
                _ if quoted => {}
                '[' => {
                    state = State::InAnnotation {
                        start,
                        depth: depth + 1,
                        quoted,
                    }
                }
                ']' if depth == 1 => {
                    let body = &text[start + 1..offset];
                    if let Some(annotation) = body.strip_prefix('&') {
                        tokens.push(Spanned {
                            token: Token::Annotation(annotation),
                            offset: start,
                        });
                    }
                    state = State::Normal;
                }
                ']' => {
                    state = State::InAnnotation {
                        start,
                        depth: depth - 1,
                        quoted,
                    }
                }
                _ => {}
            },
            State::Normal => {
                let token = match c {
                    '(' => Token::Open,
                    ')' => Token::Close,
                    ',' => Token::Comma,
                    ':' => Token::Colon,
                    ';' => Token::Semicolon,
                    '[' => {
                        state = State::InAnnotation {
                            start: offset,
                            depth: 1,
                            quoted: false,
                        };
                        continue;
                    }
                    ']' => {
                        return Err(ParseError::new(
                            ParseErrorKind::UnexpectedToken,
                            &text[offset..],
                            offset,
                        ))
                    }
                    c if c.is_whitespace() => continue,
                    '\'' => Token::Text(quoted(text, offset, &mut chars)?),
                    _ => {
                        // Trailing whitespace is not part of the text
                        let mut end = offset + c.len_utf8();
                        while let Some(&(next, c)) = chars.peek() {
                            if is_delimiter(c) {
                                break;
                            }
                            if !c.is_whitespace() {
                                end = next + c.len_utf8();
                            }
                            chars.next();
                        }
                        Token::Text(Cow::Borrowed(&text[offset..end]))
                    }
                };
                tokens.push(Spanned { token, offset });
            }
        }
    }

    if let State::InAnnotation { start, .. } = state {
        return Err(ParseError::new(
            ParseErrorKind::UnterminatedAnnotation,
            &text[start..],
            start,
        ));
    }

    Ok(tokens)
}

/// Single-quoted label starting at `open`. A doubled quote stands for one quote.
fn quoted<'a>(
    text: &'a str,
    open: usize,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'a>>,
) -> Result<Cow<'a, str>, ParseError> {
    let start = open + 1;
    let mut owned: Option<String> = None;

    while let Some((offset, c)) = chars.next() {
        if c != '\'' {
            if let Some(owned) = owned.as_mut() {
                owned.push(c);
            }
            continue;
        }
        if matches!(chars.peek(), Some((_, '\''))) {
            chars.next();
            owned
                .get_or_insert_with(|| text[start..offset].to_string())
                .push('\'');
            continue;
        }
        return Ok(match owned {
            Some(owned) => Cow::Owned(owned),
            None => Cow::Borrowed(&text[start..offset]),
        });
    }

    Err(ParseError::new(
        ParseErrorKind::UnexpectedToken,
        &text[open..],
        open,
    ))
}
