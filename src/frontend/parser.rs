//! Parser for minic
//!
//! Recursive descent, one function per precedence level. Every declaration and
//! expression node gets a fresh [`NodeId`] as it is built.

use crate::frontend::ast::*;
use crate::frontend::lexer::Lexer;
use crate::frontend::token::{Token, TokenKind};
use crate::types::Type;
use crate::utils::{Error, Result, Span};

/// The parser
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    next_id: u32,
}

impl Parser {
    /// Create a new parser from a lexer
    pub fn new(mut lexer: Lexer) -> Self {
        Self::from_tokens(lexer.tokenize())
    }

    /// Create a parser from pre-tokenized input
    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0, next_id: 0 }
    }

    // ==================== Helper Methods ====================

    fn current(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn kind_at(&self, offset: usize) -> &TokenKind {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + offset).min(last)].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.current_kind()) == std::mem::discriminant(kind)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    fn expect(&mut self, expected: TokenKind) -> Result<Token> {
        if self.check(&expected) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(format!("{:?}", expected)))
        }
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: impl Into<String>) -> Error {
        Error::UnexpectedToken {
            expected: expected.into(),
            got: format!("{:?}", self.current_kind()),
            span: self.current().span,
        }
    }

    /// Span from `start` to the last consumed token
    fn span_from(&self, start: Span) -> Span {
        start.merge(&self.tokens[self.pos.saturating_sub(1)].span)
    }

    fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn mk_expr(&mut self, kind: ExprKind, span: Span) -> Expr {
        Expr { id: self.fresh_id(), kind, span }
    }

    // ==================== Parsing Methods ====================

    /// Parse a complete program
    pub fn parse_program(&mut self) -> Result<Program> {
        self.parse_includes()?;

        let mut structs = Vec::new();
        while self.check(&TokenKind::Struct) && matches!(self.kind_at(2), TokenKind::LBrace) {
            structs.push(self.parse_struct_decl()?);
        }

        let mut globals = Vec::new();
        while self.current_kind().starts_type() && !self.at_fun_decl() {
            globals.push(self.parse_var_decl()?);
        }

        let mut funcs = Vec::new();
        while !self.is_at_end() {
            funcs.push(self.parse_fun_decl()?);
        }

        let mut program = Program::new(self.next_id);
        program.structs = structs;
        program.globals = globals;
        program.funcs = funcs;
        Ok(program)
    }

    /// `#include "file"` lines carry no meaning and are dropped
    fn parse_includes(&mut self) -> Result<()> {
        while self.consume(&TokenKind::Include) {
            match self.current_kind() {
                TokenKind::StringLit(_) => {
                    self.advance();
                }
                _ => return Err(self.unexpected("include path")),
            }
        }
        Ok(())
    }

    /// Looks past a type and a name for `(`
    fn at_fun_decl(&self) -> bool {
        let mut offset = match self.current_kind() {
            TokenKind::Struct => 2,
            _ => 1,
        };
        while matches!(self.kind_at(offset), TokenKind::Star) {
            offset += 1;
        }
        matches!(self.kind_at(offset), TokenKind::Ident(_))
            && matches!(self.kind_at(offset + 1), TokenKind::LParen)
    }

    fn parse_struct_decl(&mut self) -> Result<StructDecl> {
        let start = self.current().span;
        self.expect(TokenKind::Struct)?;
        let name = self.parse_ident()?;
        self.expect(TokenKind::LBrace)?;

        let mut fields = Vec::new();
        while self.current_kind().starts_type() {
            fields.push(self.parse_var_decl()?);
        }
        if fields.is_empty() {
            return Err(Error::ExpectedType { span: self.current().span });
        }

        self.expect(TokenKind::RBrace)?;
        self.expect(TokenKind::Semicolon)?;

        Ok(StructDecl {
            name,
            fields,
            span: self.span_from(start),
        })
    }

    /// `type name` with an optional `[N]`
    fn parse_declarator(&mut self) -> Result<VarDecl> {
        let start = self.current().span;
        let mut ty = self.parse_type()?;
        let name = self.parse_ident()?;

        if self.consume(&TokenKind::LBracket) {
            let count = match self.current_kind() {
                TokenKind::IntLit(n) if *n >= 0 => *n as usize,
                _ => return Err(Error::ExpectedArraySize { span: self.current().span }),
            };
            self.advance();
            self.expect(TokenKind::RBracket)?;
            ty = Type::array(ty, count);
        }

        Ok(VarDecl {
            id: self.fresh_id(),
            ty,
            name,
            span: self.span_from(start),
        })
    }

    fn parse_var_decl(&mut self) -> Result<VarDecl> {
        let decl = self.parse_declarator()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(decl)
    }

    fn parse_fun_decl(&mut self) -> Result<FunDecl> {
        let start = self.current().span;
        let ret = self.parse_type()?;
        let name = self.parse_ident()?;

        self.expect(TokenKind::LParen)?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen)?;

        let body = self.parse_block()?;

        Ok(FunDecl {
            id: self.fresh_id(),
            ret,
            name,
            params,
            body: Some(body),
            span: self.span_from(start),
        })
    }

    fn parse_params(&mut self) -> Result<Vec<VarDecl>> {
        let mut params = Vec::new();

        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            params.push(self.parse_declarator()?);
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }

        Ok(params)
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        let token = self.current().clone();
        match &token.kind {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Ident::new(name.clone(), token.span))
            }
            _ => Err(Error::ExpectedIdent { span: token.span }),
        }
    }

    /// `int | char | void | struct name`, then any number of `*`
    fn parse_type(&mut self) -> Result<Type> {
        let token = self.advance();
        let mut ty = match token.kind {
            TokenKind::Int => Type::INT,
            TokenKind::Char => Type::CHAR,
            TokenKind::Void => Type::VOID,
            TokenKind::Struct => Type::Struct(self.parse_ident()?.name),
            _ => return Err(Error::ExpectedType { span: token.span }),
        };
        while self.consume(&TokenKind::Star) {
            ty = Type::ptr(ty);
        }
        Ok(ty)
    }

    fn parse_block(&mut self) -> Result<Block> {
        let start = self.current().span;
        self.expect(TokenKind::LBrace)?;

        let mut decls = Vec::new();
        while self.current_kind().starts_type() {
            decls.push(self.parse_var_decl()?);
        }

        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            stmts.push(self.parse_stmt()?);
        }

        self.expect(TokenKind::RBrace)?;

        Ok(Block {
            decls,
            stmts,
            span: self.span_from(start),
        })
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        let start = self.current().span;
        match self.current_kind() {
            TokenKind::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            TokenKind::While => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                let body = self.parse_stmt()?;
                Ok(Stmt::While {
                    cond,
                    body: Box::new(body),
                    span: self.span_from(start),
                })
            }
            TokenKind::If => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                let then_branch = Box::new(self.parse_stmt()?);
                let else_branch = if self.consume(&TokenKind::Else) {
                    Some(Box::new(self.parse_stmt()?))
                } else {
                    None
                };
                Ok(Stmt::If {
                    cond,
                    then_branch,
                    else_branch,
                    span: self.span_from(start),
                })
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(TokenKind::Semicolon)?;
                Ok(Stmt::Return {
                    value,
                    span: self.span_from(start),
                })
            }
            _ => {
                let expr = self.parse_expr()?;
                if self.consume(&TokenKind::Eq) {
                    let rhs = self.parse_expr()?;
                    self.expect(TokenKind::Semicolon)?;
                    Ok(Stmt::Assign {
                        lhs: expr,
                        rhs,
                        span: self.span_from(start),
                    })
                } else {
                    self.expect(TokenKind::Semicolon)?;
                    Ok(Stmt::Expr(expr))
                }
            }
        }
    }

    // ==================== Expression Parsing ====================

    pub fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_binary(0)
    }

    const PRECEDENCE_LEVELS: usize = 6;

    /// Operator of the current token if it binds at `level`, lowest level first
    fn binary_op_at(&self, level: usize) -> Option<BinOp> {
        let op = match (level, self.current_kind()) {
            (0, TokenKind::OrOr) => BinOp::Or,
            (1, TokenKind::AndAnd) => BinOp::And,
            (2, TokenKind::EqEq) => BinOp::Eq,
            (2, TokenKind::Ne) => BinOp::Ne,
            (3, TokenKind::Lt) => BinOp::Lt,
            (3, TokenKind::Le) => BinOp::Le,
            (3, TokenKind::Gt) => BinOp::Gt,
            (3, TokenKind::Ge) => BinOp::Ge,
            (4, TokenKind::Plus) => BinOp::Add,
            (4, TokenKind::Minus) => BinOp::Sub,
            (5, TokenKind::Star) => BinOp::Mul,
            (5, TokenKind::Slash) => BinOp::Div,
            (5, TokenKind::Percent) => BinOp::Mod,
            _ => return None,
        };
        Some(op)
    }

    /// Left-associative binary expression at precedence `level`
    fn parse_binary(&mut self, level: usize) -> Result<Expr> {
        if level == Self::PRECEDENCE_LEVELS {
            return self.parse_unary();
        }

        let mut lhs = self.parse_binary(level + 1)?;
        while let Some(op) = self.binary_op_at(level) {
            self.advance();
            let rhs = self.parse_binary(level + 1)?;
            let span = lhs.span.merge(&rhs.span);
            lhs = self.mk_expr(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let start = self.current().span;
        match self.current_kind() {
            TokenKind::Star => {
                self.advance();
                let inner = self.parse_unary()?;
                let span = self.span_from(start);
                Ok(self.mk_expr(ExprKind::Deref(Box::new(inner)), span))
            }
            TokenKind::Sizeof => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let ty = self.parse_type()?;
                self.expect(TokenKind::RParen)?;
                let span = self.span_from(start);
                Ok(self.mk_expr(ExprKind::SizeOf(ty), span))
            }
            TokenKind::LParen if self.kind_at(1).starts_type() => {
                self.advance();
                let ty = self.parse_type()?;
                self.expect(TokenKind::RParen)?;
                let inner = self.parse_unary()?;
                let span = self.span_from(start);
                Ok(self.mk_expr(
                    ExprKind::Cast {
                        ty,
                        expr: Box::new(inner),
                    },
                    span,
                ))
            }
            // `-x` is `0 - x`
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                let zero = self.mk_expr(ExprKind::IntLit(0), start);
                let span = self.span_from(start);
                Ok(self.mk_expr(
                    ExprKind::Binary {
                        op: BinOp::Sub,
                        lhs: Box::new(zero),
                        rhs: Box::new(operand),
                    },
                    span,
                ))
            }
            _ => {
                let primary = self.parse_primary()?;
                self.parse_postfix(primary)
            }
        }
    }

    fn parse_postfix(&mut self, mut expr: Expr) -> Result<Expr> {
        loop {
            if self.consume(&TokenKind::LBracket) {
                let index = self.parse_expr()?;
                self.expect(TokenKind::RBracket)?;
                let span = self.span_from(expr.span);
                expr = self.mk_expr(
                    ExprKind::Index {
                        base: Box::new(expr),
                        index: Box::new(index),
                    },
                    span,
                );
            } else if self.consume(&TokenKind::Dot) {
                let field = self.parse_ident()?;
                let span = self.span_from(expr.span);
                expr = self.mk_expr(
                    ExprKind::Field {
                        base: Box::new(expr),
                        field,
                    },
                    span,
                );
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.current().clone();

        let kind = match token.kind {
            TokenKind::IntLit(n) => {
                self.advance();
                ExprKind::IntLit(n)
            }
            TokenKind::CharLit(c) => {
                self.advance();
                ExprKind::CharLit(c)
            }
            TokenKind::StringLit(s) => {
                self.advance();
                ExprKind::StrLit(s)
            }
            TokenKind::Ident(_) if matches!(self.kind_at(1), TokenKind::LParen) => {
                let name = self.parse_ident()?;
                self.expect(TokenKind::LParen)?;
                let mut args = Vec::new();
                while !self.check(&TokenKind::RParen) && !self.is_at_end() {
                    args.push(self.parse_expr()?);
                    if !self.consume(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RParen)?;
                ExprKind::Call { name, args }
            }
            TokenKind::Ident(name) => {
                self.advance();
                ExprKind::Var(name)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                return Ok(inner);
            }
            _ => return Err(Error::ExpectedExpr { span: token.span }),
        };

        let span = self.span_from(token.span);
        Ok(self.mk_expr(kind, span))
    }
}

/// Lex and parse a whole source file
pub fn parse_source(source: &str) -> Result<Program> {
    Parser::new(Lexer::new(source, 0)).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_function() {
        let program = parse_source("void main() {}").unwrap();
        assert_eq!(program.funcs.len(), 1);
        assert_eq!(program.funcs[0].name.name, "main");
        assert_eq!(program.funcs[0].ret, Type::VOID);
    }

    #[test]
    fn test_top_level_sections() {
        let program = parse_source(
            "#include \"minic-stdlib.h\"\n\
             struct point { int x; int y; };\n\
             int counter;\n\
             char buf[8];\n\
             struct point* origin;\n\
             int add(int a, int b) { return a + b; }\n\
             struct point* get() { return origin; }",
        )
        .unwrap();

        assert_eq!(program.structs.len(), 1);
        assert_eq!(program.structs[0].fields.len(), 2);
        assert_eq!(program.globals.len(), 3);
        assert_eq!(program.globals[1].ty, Type::array(Type::CHAR, 8));
        assert_eq!(program.globals[2].ty, Type::ptr(Type::Struct("point".into())));
        assert_eq!(program.funcs.len(), 2);
        assert_eq!(program.funcs[0].params.len(), 2);
        assert_eq!(program.funcs[1].ret, Type::ptr(Type::Struct("point".into())));
    }

    #[test]
    fn test_precedence() {
        let program = parse_source("int f() { return 1 + 2 * 3 < 4 || 0; }").unwrap();
        let body = program.funcs[0].body.as_ref().unwrap();
        let Stmt::Return { value: Some(expr), .. } = &body.stmts[0] else {
            panic!("expected return");
        };
        let ExprKind::Binary { op: BinOp::Or, lhs, .. } = &expr.kind else {
            panic!("expected ||");
        };
        let ExprKind::Binary { op: BinOp::Lt, lhs: sum, .. } = &lhs.kind else {
            panic!("expected <");
        };
        let ExprKind::Binary { op: BinOp::Add, rhs: product, .. } = &sum.kind else {
            panic!("expected +");
        };
        assert!(matches!(product.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn test_statements() {
        let program = parse_source(
            "void f() { int i; char* p; i = 0; while (i < 3) { i = i + 1; } \
             if (i == 3) print_i(i); else { *p = 'a'; } return; }",
        )
        .unwrap();
        let body = program.funcs[0].body.as_ref().unwrap();
        assert_eq!(body.decls.len(), 2);
        assert!(matches!(body.stmts[0], Stmt::Assign { .. }));
        assert!(matches!(body.stmts[1], Stmt::While { .. }));
        assert!(matches!(body.stmts[2], Stmt::If { else_branch: Some(_), .. }));
        assert!(matches!(body.stmts[3], Stmt::Return { value: None, .. }));
    }

    #[test]
    fn test_unary_forms() {
        let program = parse_source(
            "void f() { x = (int) c; y = sizeof(struct p); z = -a; w = s.f; v = arr[1]; }",
        )
        .unwrap();
        let body = program.funcs[0].body.as_ref().unwrap();
        let rhs: Vec<&ExprKind> = body
            .stmts
            .iter()
            .map(|s| match s {
                Stmt::Assign { rhs, .. } => &rhs.kind,
                _ => panic!("expected assignment"),
            })
            .collect();

        assert!(matches!(rhs[0], ExprKind::Cast { ty, .. } if *ty == Type::INT));
        assert!(matches!(rhs[1], ExprKind::SizeOf(Type::Struct(name)) if name == "p"));
        assert!(matches!(rhs[2], ExprKind::Binary { op: BinOp::Sub, .. }));
        assert!(matches!(rhs[3], ExprKind::Field { field, .. } if field.name == "f"));
        assert!(matches!(rhs[4], ExprKind::Index { .. }));
    }

    #[test]
    fn test_node_ids_are_unique() {
        let mut program = parse_source("int g; int f(int a) { int b; b = a + g; return b; }").unwrap();
        let mut ids = vec![program.globals[0].id, program.funcs[0].id, program.funcs[0].params[0].id];
        ids.push(program.funcs[0].body.as_ref().unwrap().decls[0].id);
        let fresh = program.fresh_id();
        ids.push(fresh);
        let count = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), count);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_source("int f() { return 1 }"),
            Err(Error::UnexpectedToken { .. })
        ));
        assert!(matches!(parse_source("int x[n];"), Err(Error::ExpectedArraySize { .. })));
        assert!(matches!(parse_source("int f() { x = ; }"), Err(Error::ExpectedExpr { .. })));
        assert!(matches!(parse_source("foo f() {}"), Err(Error::ExpectedType { .. })));
    }
}
