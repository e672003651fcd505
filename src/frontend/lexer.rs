//! Lexer for minic
//!
//! Converts source code into a stream of tokens.

use crate::frontend::token::{Token, TokenKind};
use crate::utils::Span;

/// The lexer state
pub struct Lexer {
    /// Source code as chars
    source: Vec<char>,
    /// Current position in source
    pos: usize,
    /// Start position of current token
    start: usize,
    /// File ID for span tracking
    file_id: usize,
}

impl Lexer {
    /// Create a new lexer for the given source code
    pub fn new(source: &str, file_id: usize) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            start: 0,
            file_id,
        }
    }

    /// Get the current character without advancing
    fn peek(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    /// Get the next character without advancing
    fn peek_next(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    /// Advance to the next character
    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        c
    }

    /// Check if we've reached the end of input
    fn is_at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    /// Create a span from start to current position
    fn make_span(&self) -> Span {
        Span::new(self.start, self.pos, self.file_id)
    }

    /// Create a token with the current span
    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.make_span())
    }

    /// Consume `next` if it is the upcoming char, choosing between two kinds
    fn either(&mut self, next: char, matched: TokenKind, otherwise: TokenKind) -> TokenKind {
        if self.peek() == Some(next) {
            self.advance();
            matched
        } else {
            otherwise
        }
    }

    /// Skip whitespace and comments
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' | '\n' => {
                    self.advance();
                }
                // Line comment
                '/' if self.peek_next() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                // Block comment, not nested in C
                '/' if self.peek_next() == Some('*') => {
                    self.advance();
                    self.advance();
                    while !self.is_at_end() {
                        if self.peek() == Some('*') && self.peek_next() == Some('/') {
                            self.advance();
                            self.advance();
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    /// Read an identifier or keyword
    fn read_identifier(&mut self) -> Token {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let text: String = self.source[self.start..self.pos].iter().collect();

        let kind = TokenKind::keyword_from_str(&text)
            .unwrap_or(TokenKind::Ident(text));

        self.make_token(kind)
    }

    /// Read a decimal integer literal
    fn read_number(&mut self) -> Token {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }

        let text: String = self.source[self.start..self.pos].iter().collect();
        match text.parse() {
            Ok(value) => self.make_token(TokenKind::IntLit(value)),
            Err(_) => self.make_token(TokenKind::Unknown(self.source[self.start])),
        }
    }

    /// Read one escape sequence after the backslash
    fn read_escape(&mut self) -> Option<char> {
        let c = match self.peek()? {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            '0' => '\0',
            '\\' => '\\',
            '\'' => '\'',
            '"' => '"',
            other => other,
        };
        self.advance();
        Some(c)
    }

    /// Read a string literal
    fn read_string(&mut self) -> Token {
        self.advance(); // consume opening quote

        let mut value = String::new();

        while let Some(c) = self.peek() {
            if c == '"' {
                self.advance();
                return self.make_token(TokenKind::StringLit(value));
            } else if c == '\\' {
                self.advance();
                match self.read_escape() {
                    Some(esc) => value.push(esc),
                    None => break,
                }
            } else if c == '\n' {
                break;
            } else {
                value.push(c);
                self.advance();
            }
        }

        // Unterminated string
        self.make_token(TokenKind::Unknown('"'))
    }

    /// Read a character literal
    fn read_char(&mut self) -> Token {
        self.advance(); // consume opening quote

        let c = match self.peek() {
            Some('\\') => {
                self.advance();
                self.read_escape()
            }
            Some('\'') | Some('\n') | None => None,
            Some(_) => self.advance(),
        };

        match c {
            Some(c) if self.peek() == Some('\'') => {
                self.advance();
                self.make_token(TokenKind::CharLit(c))
            }
            _ => self.make_token(TokenKind::Unknown('\'')),
        }
    }

    /// Read `#include`; anything else after `#` is an unknown token
    fn read_directive(&mut self) -> Token {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphabetic() {
                self.advance();
            } else {
                break;
            }
        }
        let text: String = self.source[self.start..self.pos].iter().collect();
        if text == "#include" {
            self.make_token(TokenKind::Include)
        } else {
            self.make_token(TokenKind::Unknown('#'))
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        self.start = self.pos;

        let Some(c) = self.peek() else {
            return Token::eof(self.make_span());
        };

        if c.is_ascii_alphabetic() || c == '_' {
            return self.read_identifier();
        }
        if c.is_ascii_digit() {
            return self.read_number();
        }
        match c {
            '"' => return self.read_string(),
            '\'' => return self.read_char(),
            '#' => return self.read_directive(),
            _ => {}
        }

        self.advance();
        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '=' => self.either('=', TokenKind::EqEq, TokenKind::Eq),
            '!' => self.either('=', TokenKind::Ne, TokenKind::Unknown('!')),
            '<' => self.either('=', TokenKind::Le, TokenKind::Lt),
            '>' => self.either('=', TokenKind::Ge, TokenKind::Gt),
            '&' => self.either('&', TokenKind::AndAnd, TokenKind::Unknown('&')),
            '|' => self.either('|', TokenKind::OrOr, TokenKind::Unknown('|')),
            '.' => TokenKind::Dot,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            _ => TokenKind::Unknown(c),
        };

        self.make_token(kind)
    }

    /// Tokenize the entire source and return all tokens
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source, 0).tokenize().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_tokens() {
        let tokens = kinds("int main() { }");

        assert!(matches!(tokens[0], TokenKind::Int));
        assert!(matches!(tokens[1], TokenKind::Ident(ref s) if s == "main"));
        assert!(matches!(tokens[2], TokenKind::LParen));
        assert!(matches!(tokens[3], TokenKind::RParen));
        assert!(matches!(tokens[4], TokenKind::LBrace));
        assert!(matches!(tokens[5], TokenKind::RBrace));
        assert!(matches!(tokens[6], TokenKind::Eof));
    }

    #[test]
    fn test_operators() {
        let tokens = kinds("== != <= >= < > && || = . %");
        assert_eq!(
            tokens,
            vec![
                TokenKind::EqEq,
                TokenKind::Ne,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::Eq,
                TokenKind::Dot,
                TokenKind::Percent,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_literals() {
        let tokens = kinds(r#"42 'a' '\n' "hi\tthere""#);

        assert!(matches!(tokens[0], TokenKind::IntLit(42)));
        assert!(matches!(tokens[1], TokenKind::CharLit('a')));
        assert!(matches!(tokens[2], TokenKind::CharLit('\n')));
        assert!(matches!(tokens[3], TokenKind::StringLit(ref s) if s == "hi\tthere"));
    }

    #[test]
    fn test_comments_and_include() {
        let tokens = kinds("#include \"io.h\"\n// line\n/* block\n */ sizeof");
        assert!(matches!(tokens[0], TokenKind::Include));
        assert!(matches!(tokens[1], TokenKind::StringLit(ref s) if s == "io.h"));
        assert!(matches!(tokens[2], TokenKind::Sizeof));
    }

    #[test]
    fn test_spans() {
        let tokens = Lexer::new("int  x", 0).tokenize();
        assert_eq!(tokens[1].span, Span::new(5, 6, 0));
    }

    #[test]
    fn test_unterminated_literals() {
        assert!(matches!(kinds("\"abc")[0], TokenKind::Unknown('"')));
        assert!(matches!(kinds("'ab'")[0], TokenKind::Unknown('\'')));
        assert!(matches!(kinds("!")[0], TokenKind::Unknown('!')));
    }
}
