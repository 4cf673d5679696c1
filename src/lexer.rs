//! Lexer for HolyLua
//!
//! The lexer converts source code into a stream of tokens. It uses the
//! `logos` crate for the scan itself; this wrapper adds 1-indexed line
//! tracking, newline tokens, and error recovery (a failing literal still
//! produces a placeholder token so one run can report several errors).

use crate::token::{NumberLit, Token, TokenKind};
use logos::Logos;
use thiserror::Error;

/// Lexer errors
#[derive(Error, Debug, Clone, PartialEq, Default)]
pub enum LexError {
    /// Placeholder logos yields on an unmatched input before the wrapper
    /// classifies the failure.
    #[default]
    #[error("Unexpected character")]
    Invalid,

    #[error("Unexpected character '{0}'")]
    UnexpectedChar(String),

    #[error("Unterminated string literal")]
    UnterminatedString,

    #[error("Number '{0}' is out of range")]
    NumberOutOfRange(String),

    #[error("Invalid number format '{0}'")]
    MalformedNumber(String),
}

/// The lexer for HolyLua
pub struct Lexer<'src> {
    inner: logos::Lexer<'src, TokenKind>,
    line: u32,
    errors: Vec<(LexError, u32)>,
    done: bool,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source code
    pub fn new(source: &'src str) -> Self {
        Self {
            inner: TokenKind::lexer(source),
            line: 1,
            errors: Vec::new(),
            done: false,
        }
    }

    /// Errors recorded so far, each with the line it occurred on
    pub fn errors(&self) -> &[(LexError, u32)] {
        &self.errors
    }

    /// Get the next token. After the end of input this keeps returning `Eof`.
    pub fn next_token(&mut self) -> Token {
        loop {
            match self.inner.next() {
                Some(Ok(kind)) => {
                    let line = self.line;
                    self.line += newline_count(self.inner.slice());
                    return Token::new(kind, line);
                }
                Some(Err(err)) => {
                    let line = self.line;
                    let slice = self.inner.slice();
                    match err {
                        LexError::NumberOutOfRange(_) | LexError::MalformedNumber(_) => {
                            // Report, then continue with a zero placeholder.
                            let placeholder = if slice.contains('.') {
                                NumberLit::Float(0.0)
                            } else {
                                NumberLit::Int(0)
                            };
                            self.errors.push((err, line));
                            return Token::new(TokenKind::Number(placeholder), line);
                        }
                        _ if slice.starts_with('"') => {
                            // An unterminated string consumes the rest of the input.
                            self.errors.push((LexError::UnterminatedString, line));
                            let rest = self.inner.remainder().len();
                            self.inner.bump(rest);
                            return Token::new(TokenKind::Str(String::new()), line);
                        }
                        _ => {
                            self.errors
                                .push((LexError::UnexpectedChar(slice.to_owned()), line));
                            continue;
                        }
                    }
                }
                None => {
                    self.done = true;
                    return Token::new(TokenKind::Eof, self.line);
                }
            }
        }
    }

    /// Collect all tokens (ending with a single `Eof`) and any errors
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<(LexError, u32)>) {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let at_end = token.kind == TokenKind::Eof;
            tokens.push(token);
            if at_end {
                break;
            }
        }
        (tokens, self.errors)
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        Some(self.next_token())
    }
}

fn newline_count(slice: &str) -> u32 {
    slice.bytes().filter(|&b| b == b'\n').count() as u32
}

/// Helper function to lex source code
pub fn lex(source: &str) -> (Vec<Token>, Vec<(LexError, u32)>) {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::NumberLit;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, errors) = lex(source);
        assert!(errors.is_empty(), "lex errors: {:?}", errors);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_empty_source() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            kinds("local global const function end"),
            vec![
                TokenKind::Local,
                TokenKind::Global,
                TokenKind::Const,
                TokenKind::Function,
                TokenKind::End,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("42 3.14"),
            vec![
                TokenKind::Number(NumberLit::Int(42)),
                TokenKind::Number(NumberLit::Float(3.14)),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_integer_followed_by_concat() {
        // "1..2" must lex as 1 .. 2, not as a malformed float
        assert_eq!(
            kinds("1..2"),
            vec![
                TokenKind::Number(NumberLit::Int(1)),
                TokenKind::DotDot,
                TokenKind::Number(NumberLit::Int(2)),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_boundary_integer_wraps() {
        assert_eq!(
            kinds("9223372036854775808"),
            vec![TokenKind::Number(NumberLit::Int(i64::MIN)), TokenKind::Eof]
        );
    }

    #[test]
    fn test_out_of_range_integer_reports_and_zeroes() {
        let (tokens, errors) = lex("99999999999999999999");
        assert_eq!(tokens[0].kind, TokenKind::Number(NumberLit::Int(0)));
        assert!(matches!(errors[0].0, LexError::NumberOutOfRange(_)));
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            kinds(r#""hello""#),
            vec![TokenKind::Str("hello".to_owned()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let (tokens, errors) = lex("\"abc");
        assert_eq!(tokens[0].kind, TokenKind::Str(String::new()));
        assert_eq!(errors[0].0, LexError::UnterminatedString);
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn test_compound_operators() {
        assert_eq!(
            kinds("== != <= >= ?? .. ** // += -= *= /= %= **= //="),
            vec![
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::QuestionQuestion,
                TokenKind::DotDot,
                TokenKind::StarStar,
                TokenKind::SlashSlash,
                TokenKind::PlusEq,
                TokenKind::MinusEq,
                TokenKind::StarEq,
                TokenKind::SlashEq,
                TokenKind::PercentEq,
                TokenKind::StarStarEq,
                TokenKind::SlashSlashEq,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            kinds("local x -- a comment\nx"),
            vec![
                TokenKind::Local,
                TokenKind::Ident("x".to_owned()),
                TokenKind::Newline,
                TokenKind::Ident("x".to_owned()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_line_tracking() {
        let (tokens, _) = lex("a\nb\nc");
        let lines: Vec<u32> = tokens.iter().map(|t| t.line).collect();
        // a NL b NL c EOF
        assert_eq!(lines, vec![1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn test_multiline_string_advances_line() {
        let (tokens, _) = lex("\"a\nb\" x");
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 2); // x
    }

    #[test]
    fn test_unexpected_character() {
        let (tokens, errors) = lex("@ local");
        assert!(matches!(errors[0].0, LexError::UnexpectedChar(_)));
        assert_eq!(tokens[0].kind, TokenKind::Local);
    }

    #[test]
    fn test_optional_annotation_tokens() {
        assert_eq!(
            kinds("local x: number? = nil"),
            vec![
                TokenKind::Local,
                TokenKind::Ident("x".to_owned()),
                TokenKind::Colon,
                TokenKind::TypeNumber,
                TokenKind::Question,
                TokenKind::Eq,
                TokenKind::Nil,
                TokenKind::Eof
            ]
        );
    }
}
