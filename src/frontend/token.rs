//! Token definitions for minic

use crate::utils::Span;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn eof(span: Span) -> Self {
        Self { kind: TokenKind::Eof, span }
    }
}

/// Token kinds
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ============ Keywords ============
    /// int
    Int,
    /// char
    Char,
    /// void
    Void,
    /// struct
    Struct,
    /// if
    If,
    /// else
    Else,
    /// while
    While,
    /// return
    Return,
    /// sizeof
    Sizeof,
    /// #include
    Include,

    // ============ Identifiers and Literals ============
    /// Identifier (variable name, function name, etc.)
    Ident(String),
    /// Integer literal
    IntLit(i64),
    /// String literal
    StringLit(String),
    /// Character literal
    CharLit(char),

    // ============ Operators ============
    /// +
    Plus,
    /// -
    Minus,
    /// *
    Star,
    /// /
    Slash,
    /// %
    Percent,
    /// =
    Eq,
    /// ==
    EqEq,
    /// !=
    Ne,
    /// <
    Lt,
    /// <=
    Le,
    /// >
    Gt,
    /// >=
    Ge,
    /// &&
    AndAnd,
    /// ||
    OrOr,
    /// .
    Dot,

    // ============ Delimiters ============
    /// (
    LParen,
    /// )
    RParen,
    /// {
    LBrace,
    /// }
    RBrace,
    /// [
    LBracket,
    /// ]
    RBracket,
    /// ,
    Comma,
    /// ;
    Semicolon,

    // ============ Special ============
    /// End of file
    Eof,
    /// Unknown/invalid character
    Unknown(char),
}

impl TokenKind {
    /// Try to convert an identifier to a keyword
    pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
        match s {
            "int" => Some(TokenKind::Int),
            "char" => Some(TokenKind::Char),
            "void" => Some(TokenKind::Void),
            "struct" => Some(TokenKind::Struct),
            "if" => Some(TokenKind::If),
            "else" => Some(TokenKind::Else),
            "while" => Some(TokenKind::While),
            "return" => Some(TokenKind::Return),
            "sizeof" => Some(TokenKind::Sizeof),
            _ => None,
        }
    }

    /// Tokens that can start a type
    pub fn starts_type(&self) -> bool {
        matches!(
            self,
            TokenKind::Int | TokenKind::Char | TokenKind::Void | TokenKind::Struct
        )
    }
}
