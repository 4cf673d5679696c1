//! Token definitions for HolyLua
//!
//! This module defines all the tokens that the lexer can produce.

use crate::lexer::LexError;
use logos::Logos;
use std::fmt;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// 1-indexed source line
    pub line: u32,
}

impl Token {
    pub fn new(kind: TokenKind, line: u32) -> Self {
        Self { kind, line }
    }
}

/// Numeric literal payload. A `.` followed by a digit promotes to float.
#[derive(Debug, Clone, PartialEq)]
pub enum NumberLit {
    Int(i64),
    Float(f64),
}

fn parse_number(lex: &mut logos::Lexer<TokenKind>) -> Result<NumberLit, LexError> {
    let slice = lex.slice();
    if slice.contains('.') {
        slice
            .parse::<f64>()
            .map(NumberLit::Float)
            .map_err(|_| LexError::MalformedNumber(slice.to_owned()))
    } else if slice == "9223372036854775808" {
        // The one intentional boundary value: kept as an integer by wrapping.
        Ok(NumberLit::Int(i64::MIN))
    } else {
        slice
            .parse::<i64>()
            .map(NumberLit::Int)
            .map_err(|_| LexError::NumberOutOfRange(slice.to_owned()))
    }
}

fn parse_string(lex: &mut logos::Lexer<TokenKind>) -> String {
    let slice = lex.slice();
    slice[1..slice.len() - 1].to_owned()
}

/// All possible token types in HolyLua
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexError)]
#[logos(skip r"[ \t\r\f]+")]
#[logos(skip r"--[^\n]*")]
pub enum TokenKind {
    // ============ Literals ============

    /// Number literal: 42, 3.14
    #[regex(r"[0-9]+(\.[0-9]+)?", parse_number)]
    Number(NumberLit),

    /// String literal: "hello" (double-quoted, no escapes, may span lines)
    #[regex(r#""[^"]*""#, parse_string)]
    Str(String),

    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("nil")]
    Nil,

    // ============ Keywords ============

    #[token("local")]
    Local,
    #[token("global")]
    Global,
    #[token("const")]
    Const,
    #[token("print")]
    Print,
    #[token("if")]
    If,
    #[token("then")]
    Then,
    #[token("elseif")]
    Elseif,
    #[token("else")]
    Else,
    #[token("end")]
    End,
    #[token("function")]
    Function,
    #[token("return")]
    Return,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("while")]
    While,
    #[token("do")]
    Do,
    #[token("for")]
    For,
    #[token("repeat")]
    Repeat,
    #[token("until")]
    Until,
    #[token("inline")]
    Inline,
    #[token("struct")]
    Struct,
    #[token("class")]
    Class,
    #[token("enum")]
    Enum,
    #[token("public")]
    Public,
    #[token("private")]
    Private,
    #[token("static")]
    Static,
    #[token("self")]
    SelfValue,

    // ============ Types ============

    #[token("number")]
    TypeNumber,
    #[token("string")]
    TypeString,
    #[token("bool")]
    TypeBool,

    // ============ Operators ============

    #[token("=")]
    Eq,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,
    #[token("**=")]
    StarStarEq,
    #[token("//=")]
    SlashSlashEq,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("**")]
    StarStar,
    #[token("/")]
    Slash,
    #[token("//")]
    SlashSlash,
    #[token("%")]
    Percent,

    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,

    #[token("!")]
    Bang,
    #[token("?")]
    Question,
    #[token("??")]
    QuestionQuestion,

    // ============ Punctuation ============

    #[token(":")]
    Colon,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("..")]
    DotDot,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,

    /// Line break (a statement separator in this grammar)
    #[token("\n")]
    Newline,

    // ============ Identifiers ============

    /// Identifier: foo, _bar, MyStruct
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_owned())]
    Ident(String),

    // ============ Special ============

    /// End of file
    Eof,
}

impl TokenKind {
    /// Source text of the token, used to reconstruct `inline C[[ ... ]]` blocks.
    pub fn lexeme(&self) -> String {
        match self {
            TokenKind::Number(NumberLit::Int(n)) => n.to_string(),
            TokenKind::Number(NumberLit::Float(x)) => x.to_string(),
            TokenKind::Str(s) => format!("\"{}\"", s),
            TokenKind::Ident(name) => name.clone(),
            TokenKind::Newline => "\n".to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Number(_) => "number literal",
            TokenKind::Str(_) => "string literal",
            TokenKind::Ident(_) => "identifier",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Nil => "nil",
            TokenKind::Local => "local",
            TokenKind::Global => "global",
            TokenKind::Const => "const",
            TokenKind::Print => "print",
            TokenKind::If => "if",
            TokenKind::Then => "then",
            TokenKind::Elseif => "elseif",
            TokenKind::Else => "else",
            TokenKind::End => "end",
            TokenKind::Function => "function",
            TokenKind::Return => "return",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Not => "not",
            TokenKind::While => "while",
            TokenKind::Do => "do",
            TokenKind::For => "for",
            TokenKind::Repeat => "repeat",
            TokenKind::Until => "until",
            TokenKind::Inline => "inline",
            TokenKind::Struct => "struct",
            TokenKind::Class => "class",
            TokenKind::Enum => "enum",
            TokenKind::Public => "public",
            TokenKind::Private => "private",
            TokenKind::Static => "static",
            TokenKind::SelfValue => "self",
            TokenKind::TypeNumber => "number",
            TokenKind::TypeString => "string",
            TokenKind::TypeBool => "bool",
            TokenKind::Eq => "=",
            TokenKind::PlusEq => "+=",
            TokenKind::MinusEq => "-=",
            TokenKind::StarEq => "*=",
            TokenKind::SlashEq => "/=",
            TokenKind::PercentEq => "%=",
            TokenKind::StarStarEq => "**=",
            TokenKind::SlashSlashEq => "//=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::StarStar => "**",
            TokenKind::Slash => "/",
            TokenKind::SlashSlash => "//",
            TokenKind::Percent => "%",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::LtEq => "<=",
            TokenKind::Gt => ">",
            TokenKind::GtEq => ">=",
            TokenKind::Bang => "!",
            TokenKind::Question => "?",
            TokenKind::QuestionQuestion => "??",
            TokenKind::Colon => ":",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::DotDot => "..",
            TokenKind::Dot => ".",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::Newline => "newline",
            TokenKind::Eof => "end of file",
        };
        write!(f, "{}", s)
    }
}
