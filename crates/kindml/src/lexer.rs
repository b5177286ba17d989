use crate::diagnostics::{Position, Range};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Constructor,
    TypeVar,
    Number,
    String,
    Keyword,
    Symbol,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} at {range}")]
pub struct LexError {
    pub message: String,
    pub range: Range,
}

const KEYWORDS: &[&str] = &[
    "let", "rec", "and", "in", "fun", "if", "then", "else", "match", "with", "type", "of",
    "true", "false", "ref", "mod", "as",
];

// Longest symbols first so that `::` wins over `:`.
const SYMBOLS: &[&str] = &[
    "->", "::", ":=", "==", "<>", "<=", ">=", "&&", "||", "(", ")", "[", "]", "{", "}", ",",
    ";", ":", "=", "<", ">", "+", "-", "*", "/", "^", "!", "|", ".",
];

pub fn lex(content: &str) -> Result<Vec<Token>, LexError> {
    let chars: Vec<char> = content.chars().collect();
    let mut tokens = Vec::new();
    let mut index = 0usize;
    let mut line = 1usize;
    let mut col = 1usize;

    while index < chars.len() {
        let ch = chars[index];

        if ch == '\n' {
            index += 1;
            line += 1;
            col = 1;
            continue;
        }
        if ch.is_whitespace() {
            index += 1;
            col += 1;
            continue;
        }

        // Line comments run to end-of-line.
        if ch == '-' && chars.get(index + 1) == Some(&'-') {
            while index < chars.len() && chars[index] != '\n' {
                index += 1;
                col += 1;
            }
            continue;
        }

        // Block comments nest.
        if ch == '(' && chars.get(index + 1) == Some(&'*') {
            let start = Position { line, column: col };
            let mut depth = 0usize;
            loop {
                if index >= chars.len() {
                    return Err(LexError {
                        message: "unterminated comment".to_string(),
                        range: Range::new(start, Position { line, column: col }),
                    });
                }
                let current = chars[index];
                let next = chars.get(index + 1).copied();
                if current == '(' && next == Some('*') {
                    depth += 1;
                    index += 2;
                    col += 2;
                } else if current == '*' && next == Some(')') {
                    depth -= 1;
                    index += 2;
                    col += 2;
                    if depth == 0 {
                        break;
                    }
                } else if current == '\n' {
                    index += 1;
                    line += 1;
                    col = 1;
                } else {
                    index += 1;
                    col += 1;
                }
            }
            continue;
        }

        let start = Position { line, column: col };

        if ch == '"' {
            index += 1;
            col += 1;
            let mut text = String::new();
            loop {
                let Some(&current) = chars.get(index) else {
                    return Err(LexError {
                        message: "unterminated string literal".to_string(),
                        range: Range::new(start, Position { line, column: col }),
                    });
                };
                index += 1;
                col += 1;
                match current {
                    '"' => break,
                    '\\' => {
                        let Some(&escaped) = chars.get(index) else {
                            continue;
                        };
                        index += 1;
                        col += 1;
                        text.push(decode_escape(escaped).ok_or_else(|| LexError {
                            message: format!("unknown escape sequence '\\{escaped}'"),
                            range: Range::new(
                                Position {
                                    line,
                                    column: col - 2,
                                },
                                Position { line, column: col },
                            ),
                        })?);
                    }
                    '\n' => {
                        text.push('\n');
                        line += 1;
                        col = 1;
                    }
                    other => text.push(other),
                }
            }
            tokens.push(Token {
                kind: TokenKind::String,
                text,
                range: Range::new(start, Position { line, column: col }),
            });
            continue;
        }

        if ch.is_ascii_digit() {
            let begin = index;
            while index < chars.len() && chars[index].is_ascii_digit() {
                index += 1;
                col += 1;
            }
            let text: String = chars[begin..index].iter().collect();
            let range = Range::new(start, Position { line, column: col });
            // The magnitude of `i64::MIN` is only valid after a prefix minus,
            // which the parser checks.
            if text
                .parse::<u64>()
                .map_or(true, |value| value > i64::MIN.unsigned_abs())
            {
                return Err(LexError {
                    message: format!("integer literal '{text}' is out of range"),
                    range,
                });
            }
            tokens.push(Token {
                kind: TokenKind::Number,
                text,
                range,
            });
            continue;
        }

        if ch == '\'' {
            let begin = index + 1;
            index += 1;
            col += 1;
            while index < chars.len() && is_ident_char(chars[index]) {
                index += 1;
                col += 1;
            }
            if index == begin {
                return Err(LexError {
                    message: "expected a type variable name after '''".to_string(),
                    range: Range::new(start, Position { line, column: col }),
                });
            }
            tokens.push(Token {
                kind: TokenKind::TypeVar,
                text: chars[begin..index].iter().collect(),
                range: Range::new(start, Position { line, column: col }),
            });
            continue;
        }

        if ch.is_alphabetic() || ch == '_' {
            let begin = index;
            while index < chars.len() && is_ident_char(chars[index]) {
                index += 1;
                col += 1;
            }
            let text: String = chars[begin..index].iter().collect();
            let kind = if KEYWORDS.contains(&text.as_str()) {
                TokenKind::Keyword
            } else if ch.is_uppercase() {
                TokenKind::Constructor
            } else {
                TokenKind::Ident
            };
            tokens.push(Token {
                kind,
                text,
                range: Range::new(start, Position { line, column: col }),
            });
            continue;
        }

        let rest: String = chars[index..chars.len().min(index + 2)].iter().collect();
        let Some(symbol) = SYMBOLS.iter().find(|symbol| rest.starts_with(**symbol)) else {
            return Err(LexError {
                message: format!("unexpected character '{ch}'"),
                range: Range::new(
                    start,
                    Position {
                        line,
                        column: col + 1,
                    },
                ),
            });
        };
        let width = symbol.chars().count();
        index += width;
        col += width;
        tokens.push(Token {
            kind: TokenKind::Symbol,
            text: symbol.to_string(),
            range: Range::new(start, Position { line, column: col }),
        });
    }

    let end = Position { line, column: col };
    tokens.push(Token {
        kind: TokenKind::Eof,
        text: String::new(),
        range: Range::new(end, end),
    });
    Ok(tokens)
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '\''
}

fn decode_escape(ch: char) -> Option<char> {
    match ch {
        'n' => Some('\n'),
        'r' => Some('\r'),
        't' => Some('\t'),
        '\\' => Some('\\'),
        '"' => Some('"'),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<(TokenKind, String)> {
        lex(source)
            .expect("lex")
            .into_iter()
            .map(|token| (token.kind, token.text))
            .collect()
    }

    #[test]
    fn splits_keywords_identifiers_and_symbols() {
        let tokens = kinds("let x = Some 1 :: [] in x");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Keyword, "let".to_string()),
                (TokenKind::Ident, "x".to_string()),
                (TokenKind::Symbol, "=".to_string()),
                (TokenKind::Constructor, "Some".to_string()),
                (TokenKind::Number, "1".to_string()),
                (TokenKind::Symbol, "::".to_string()),
                (TokenKind::Symbol, "[".to_string()),
                (TokenKind::Symbol, "]".to_string()),
                (TokenKind::Keyword, "in".to_string()),
                (TokenKind::Ident, "x".to_string()),
                (TokenKind::Eof, String::new()),
            ]
        );
    }

    #[test]
    fn decodes_string_escapes() {
        let tokens = kinds(r#""a\"b\n""#);
        assert_eq!(tokens[0], (TokenKind::String, "a\"b\n".to_string()));
    }

    #[test]
    fn skips_nested_comments() {
        let tokens = kinds("(* outer (* inner *) still *) 1 -- trailing\n 2");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].1, "1");
        assert_eq!(tokens[1].1, "2");
    }

    #[test]
    fn lexes_type_variables() {
        let tokens = kinds("'a list");
        assert_eq!(tokens[0], (TokenKind::TypeVar, "a".to_string()));
    }

    #[test]
    fn reports_unterminated_string() {
        let err = lex("\"abc").unwrap_err();
        assert!(err.message.contains("unterminated string"));
    }

    #[test]
    fn accepts_the_magnitude_of_the_smallest_integer() {
        let tokens = kinds("-9223372036854775808");
        assert_eq!(tokens[1], (TokenKind::Number, "9223372036854775808".to_string()));
        let err = lex("9223372036854775809").unwrap_err();
        assert!(err.message.contains("out of range"));
    }

    #[test]
    fn reports_unknown_character() {
        let err = lex("1 $ 2").unwrap_err();
        assert_eq!(err.message, "unexpected character '$'");
        assert!(!err.range.is_invalid());
    }
}
