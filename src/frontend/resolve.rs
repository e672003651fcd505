//! Name resolution
//!
//! Binds every variable use and call to the declaration it names. Results go
//! into [`Bindings`], keyed by the expression's [`NodeId`]; the tree itself is
//! left alone. Errors are reported to [`Diagnostics`] and resolution carries
//! on, so one run finds every unbound or duplicated name.

use std::collections::HashMap;

use log::{debug, trace};

use crate::frontend::ast::*;
use crate::frontend::scope::{ScopeId, ScopeTree, Symbol};
use crate::stdlib::RuntimeLibrary;
use crate::types::Type;
use crate::utils::{Diagnostics, Error, Span};

/// What name resolution learned about a program
#[derive(Debug, Default)]
pub struct Bindings {
    /// Variable use -> variable declaration
    vars: HashMap<NodeId, NodeId>,
    /// Call -> function declaration
    calls: HashMap<NodeId, NodeId>,
    /// Runtime-library declarations visible from the root scope
    runtime: Vec<FunDecl>,
}

impl Bindings {
    /// Declaration a variable use refers to
    pub fn variable(&self, expr: NodeId) -> Option<NodeId> {
        self.vars.get(&expr).copied()
    }

    /// Function a call refers to
    pub fn callee(&self, expr: NodeId) -> Option<NodeId> {
        self.calls.get(&expr).copied()
    }

    pub fn runtime(&self) -> &[FunDecl] {
        &self.runtime
    }
}

/// Name resolver over one program
pub struct NameResolver<'a> {
    scopes: ScopeTree,
    bindings: Bindings,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> NameResolver<'a> {
    pub fn new(diagnostics: &'a mut Diagnostics) -> Self {
        Self {
            scopes: ScopeTree::new(),
            bindings: Bindings::default(),
            diagnostics,
        }
    }

    /// Resolve a whole program.
    ///
    /// The program is borrowed mutably only to mint ids for the runtime-library
    /// declarations.
    pub fn resolve(mut self, program: &mut Program) -> Bindings {
        let root = self.scopes.root();

        let runtime = RuntimeLibrary::new().declarations(program);
        for decl in &runtime {
            self.declare_function(root, decl);
        }
        self.bindings.runtime = runtime;

        for decl in &program.structs {
            self.resolve_struct(root, decl);
        }
        for decl in &program.globals {
            self.declare_var(root, decl);
        }
        for decl in &program.funcs {
            self.resolve_function(root, decl);
        }

        debug!(
            "resolved {} variable uses and {} calls across {} scopes",
            self.bindings.vars.len(),
            self.bindings.calls.len(),
            self.scopes.len()
        );
        self.bindings
    }

    fn report(&mut self, error: Error) {
        self.diagnostics.report(error);
    }

    fn declare(&mut self, scope: ScopeId, name: &Ident, symbol: Symbol) -> bool {
        match self.scopes.declare(scope, &name.name, symbol, name.span) {
            Ok(()) => true,
            Err(e) => {
                self.report(e);
                false
            }
        }
    }

    fn resolve_struct(&mut self, scope: ScopeId, decl: &StructDecl) {
        if decl.fields.is_empty() {
            self.resolve_struct_ref(scope, &decl.name.name, decl.name.span);
            return;
        }

        let fields_scope = self.scopes.child(scope);
        if !self.declare(scope, &decl.name, Symbol::Struct) {
            return;
        }

        for field in &decl.fields {
            if !self.declare_var(fields_scope, field) {
                // Remaining fields are not registered
                break;
            }
        }
        trace!("struct {} defined", decl.name.name);
    }

    /// `struct name` used inside a type must name a struct in scope
    fn resolve_struct_ref(&mut self, scope: ScopeId, name: &str, span: Span) {
        match self.scopes.resolve(scope, name) {
            Some(Symbol::Struct) => {}
            _ => self.report(Error::UnboundReference {
                name: format!("struct {}", name),
                span,
            }),
        }
    }

    fn resolve_type(&mut self, scope: ScopeId, ty: &Type, span: Span) {
        if let Some(name) = ty.struct_name() {
            self.resolve_struct_ref(scope, name, span);
        }
    }

    /// Returns false when the name was already taken in `scope`
    fn declare_var(&mut self, scope: ScopeId, decl: &VarDecl) -> bool {
        self.resolve_type(scope, &decl.ty, decl.span);
        self.declare(scope, &decl.name, Symbol::Variable(decl.id))
    }

    fn declare_function(&mut self, scope: ScopeId, decl: &FunDecl) -> Option<ScopeId> {
        let fn_scope = self.scopes.child(scope);
        if !self.declare(scope, &decl.name, Symbol::Function(decl.id)) {
            return None;
        }
        for param in &decl.params {
            self.declare_var(fn_scope, param);
        }
        Some(fn_scope)
    }

    fn resolve_function(&mut self, scope: ScopeId, decl: &FunDecl) {
        self.resolve_type(scope, &decl.ret, decl.name.span);

        let Some(fn_scope) = self.declare_function(scope, decl) else {
            debug!("skipping duplicate function {}", decl.name.name);
            return;
        };

        // Parameters and top-level locals share one scope
        if let Some(body) = &decl.body {
            self.resolve_block_in(fn_scope, body);
        }
    }

    fn resolve_block_in(&mut self, scope: ScopeId, block: &Block) {
        for decl in &block.decls {
            self.declare_var(scope, decl);
        }
        for stmt in &block.stmts {
            self.resolve_stmt(scope, stmt);
        }
    }

    fn resolve_stmt(&mut self, scope: ScopeId, stmt: &Stmt) {
        match stmt {
            Stmt::Block(block) => {
                let inner = self.scopes.child(scope);
                self.resolve_block_in(inner, block);
            }
            Stmt::While { cond, body, .. } => {
                self.resolve_expr(scope, cond);
                self.resolve_stmt(scope, body);
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.resolve_expr(scope, cond);
                self.resolve_stmt(scope, then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(scope, else_branch);
                }
            }
            Stmt::Assign { lhs, rhs, .. } => {
                self.resolve_expr(scope, lhs);
                self.resolve_expr(scope, rhs);
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.resolve_expr(scope, value);
                }
            }
            Stmt::Expr(expr) => self.resolve_expr(scope, expr),
        }
    }

    fn resolve_expr(&mut self, scope: ScopeId, expr: &Expr) {
        match &expr.kind {
            ExprKind::IntLit(_) | ExprKind::CharLit(_) | ExprKind::StrLit(_) => {}
            ExprKind::Var(name) => match self.scopes.resolve(scope, name) {
                Some(Symbol::Variable(decl)) => {
                    self.bindings.vars.insert(expr.id, decl);
                }
                _ => self.report(Error::UnboundReference {
                    name: name.clone(),
                    span: expr.span,
                }),
            },
            ExprKind::Call { name, args } => {
                match self.scopes.resolve(scope, &name.name) {
                    Some(Symbol::Function(decl)) => {
                        self.bindings.calls.insert(expr.id, decl);
                    }
                    _ => self.report(Error::UnboundReference {
                        name: name.name.clone(),
                        span: name.span,
                    }),
                }
                for arg in args {
                    self.resolve_expr(scope, arg);
                }
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.resolve_expr(scope, lhs);
                self.resolve_expr(scope, rhs);
            }
            ExprKind::Index { base, index } => {
                self.resolve_expr(scope, base);
                self.resolve_expr(scope, index);
            }
            ExprKind::Field { base, .. } => self.resolve_expr(scope, base),
            ExprKind::Deref(inner) => self.resolve_expr(scope, inner),
            ExprKind::SizeOf(ty) => self.resolve_type(scope, ty, expr.span),
            ExprKind::Cast { ty, expr: inner } => {
                self.resolve_type(scope, ty, expr.span);
                self.resolve_expr(scope, inner);
            }
        }
    }
}

/// Resolve `program`, reporting into `diagnostics`
pub fn resolve_names(program: &mut Program, diagnostics: &mut Diagnostics) -> Bindings {
    NameResolver::new(diagnostics).resolve(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::parse_source;
    use crate::utils::ErrorKind;
    use pretty_assertions::assert_eq;

    fn resolve(source: &str) -> (Program, Bindings, Diagnostics) {
        let mut program = parse_source(source).unwrap();
        let mut diags = Diagnostics::new();
        let bindings = resolve_names(&mut program, &mut diags);
        (program, bindings, diags)
    }

    /// Ids of every `Var` expression, in source order
    fn var_uses(stmts: &[Stmt]) -> Vec<NodeId> {
        fn walk_expr(expr: &Expr, out: &mut Vec<NodeId>) {
            match &expr.kind {
                ExprKind::Var(_) => out.push(expr.id),
                ExprKind::Call { args, .. } => args.iter().for_each(|a| walk_expr(a, out)),
                ExprKind::Binary { lhs, rhs, .. } => {
                    walk_expr(lhs, out);
                    walk_expr(rhs, out);
                }
                _ => {}
            }
        }
        fn walk(stmt: &Stmt, out: &mut Vec<NodeId>) {
            match stmt {
                Stmt::Block(b) => b.stmts.iter().for_each(|s| walk(s, out)),
                Stmt::Assign { lhs, rhs, .. } => {
                    walk_expr(lhs, out);
                    walk_expr(rhs, out);
                }
                Stmt::Expr(e) => walk_expr(e, out),
                _ => {}
            }
        }
        let mut out = Vec::new();
        stmts.iter().for_each(|s| walk(s, &mut out));
        out
    }

    #[test]
    fn test_duplicate_in_scope_reported_once() {
        let (program, bindings, diags) = resolve("void f() { int x; int x; x = 1; }");
        assert_eq!(diags.count(ErrorKind::DuplicateDeclaration), 1);
        assert_eq!(diags.error_count(), 1);

        // The use binds to the first declaration
        let body = program.funcs[0].body.as_ref().unwrap();
        let uses = var_uses(&body.stmts);
        assert_eq!(bindings.variable(uses[0]), Some(body.decls[0].id));
    }

    #[test]
    fn test_duplicate_function_skipped() {
        let (_, _, diags) = resolve("void f() {} void f() { y = 1; }");
        assert_eq!(diags.count(ErrorKind::DuplicateDeclaration), 1);
        // The skipped body is not resolved, so `y` goes unreported
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn test_shadowing() {
        let (program, bindings, diags) =
            resolve("void f() { int x; { int x; x = 1; } x = 2; }");
        assert!(!diags.has_errors());

        let body = program.funcs[0].body.as_ref().unwrap();
        let Stmt::Block(inner) = &body.stmts[0] else {
            panic!("expected block");
        };
        let uses = var_uses(&body.stmts);
        assert_eq!(bindings.variable(uses[0]), Some(inner.decls[0].id));
        assert_eq!(bindings.variable(uses[1]), Some(body.decls[0].id));
    }

    #[test]
    fn test_param_and_local_share_scope() {
        let (_, _, diags) = resolve("void f(int a) { int a; }");
        assert_eq!(diags.count(ErrorKind::DuplicateDeclaration), 1);
    }

    #[test]
    fn test_struct_definition_and_reference() {
        let (_, _, diags) = resolve(
            "struct point { int x; int y; };\n\
             struct point origin;\n\
             void f(struct point* p) { int n; n = sizeof(struct point); }",
        );
        assert!(!diags.has_errors());

        let (_, _, diags) = resolve("struct ghost g;");
        assert_eq!(diags.count(ErrorKind::UnboundReference), 1);
    }

    #[test]
    fn test_struct_name_must_be_a_struct() {
        let (_, _, diags) = resolve("int point; void f() { struct point* p; }");
        assert_eq!(diags.count(ErrorKind::UnboundReference), 1);
    }

    #[test]
    fn test_duplicate_field_stops_struct() {
        let (_, _, diags) = resolve("struct s { int a; int a; int b; };");
        assert_eq!(diags.count(ErrorKind::DuplicateDeclaration), 1);
    }

    #[test]
    fn test_unbound_names() {
        let (_, _, diags) = resolve("int g; void f() { x = g; g(); print_i(y); }");
        // `x`, `g()` on a variable, and the argument `y`
        assert_eq!(diags.count(ErrorKind::UnboundReference), 3);
    }

    #[test]
    fn test_function_used_as_variable() {
        let (_, _, diags) = resolve("int h() { return h; }");
        assert_eq!(diags.count(ErrorKind::UnboundReference), 1);
    }

    #[test]
    fn test_calls_bind_to_declarations() {
        let (program, bindings, diags) =
            resolve("int sq(int n) { return n * n; } void main() { print_i(sq(3)); }");
        assert!(!diags.has_errors());

        let body = program.funcs[1].body.as_ref().unwrap();
        let Stmt::Expr(Expr { id: outer, kind: ExprKind::Call { args, .. }, .. }) = &body.stmts[0] else {
            panic!("expected call");
        };
        let print_i = bindings.runtime().iter().find(|d| d.name.name == "print_i").unwrap();
        assert_eq!(bindings.callee(*outer), Some(print_i.id));
        assert_eq!(bindings.callee(args[0].id), Some(program.funcs[0].id));
    }

    #[test]
    fn test_runtime_names_are_taken() {
        let (_, _, diags) = resolve("void print_i(int x) {}");
        assert_eq!(diags.count(ErrorKind::DuplicateDeclaration), 1);
    }
}
