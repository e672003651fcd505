//! Type checking
//!
//! Walks a resolved program, computes the type of every expression and the
//! storage class of every variable. A visit that cannot produce a type returns
//! `None`; constructs with a `None` operand stay quiet so one mistake yields
//! one report.

use std::collections::HashMap;

use log::{debug, trace};

use crate::frontend::ast::*;
use crate::frontend::resolve::Bindings;
use crate::types::Type;
use crate::utils::{Diagnostics, Error, Span};

/// Where a variable lives at run time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Global,
    Parameter,
    Local,
}

/// What type checking learned about a program
#[derive(Debug, Default)]
pub struct TypeInfo {
    exprs: HashMap<NodeId, Type>,
    storage: HashMap<NodeId, Storage>,
    vars: HashMap<NodeId, Type>,
}

impl TypeInfo {
    pub fn type_of(&self, expr: NodeId) -> Option<&Type> {
        self.exprs.get(&expr)
    }

    pub fn storage(&self, decl: NodeId) -> Option<Storage> {
        self.storage.get(&decl).copied()
    }

    /// Declared type of a variable
    pub fn var_type(&self, decl: NodeId) -> Option<&Type> {
        self.vars.get(&decl)
    }
}

/// Type checker over one program
pub struct TypeChecker<'a> {
    bindings: &'a Bindings,
    functions: HashMap<NodeId, &'a FunDecl>,
    structs: HashMap<&'a str, &'a StructDecl>,
    diagnostics: &'a mut Diagnostics,
    info: TypeInfo,
    /// Return type of the function being checked
    current_ret: Type,
}

impl<'a> TypeChecker<'a> {
    pub fn new(program: &'a Program, bindings: &'a Bindings, diagnostics: &'a mut Diagnostics) -> Self {
        let functions = program
            .funcs
            .iter()
            .chain(bindings.runtime())
            .map(|f| (f.id, f))
            .collect();
        let structs = program
            .structs
            .iter()
            .filter(|s| !s.fields.is_empty())
            .map(|s| (s.name.name.as_str(), s))
            .collect();

        Self {
            bindings,
            functions,
            structs,
            diagnostics,
            info: TypeInfo::default(),
            current_ret: Type::VOID,
        }
    }

    pub fn check(mut self, program: &Program) -> TypeInfo {
        for decl in &program.globals {
            self.check_var_decl(decl, Storage::Global);
        }
        let bindings = self.bindings;
        for func in program.funcs.iter().chain(bindings.runtime()) {
            self.check_function(func);
        }

        debug!(
            "typed {} expressions and {} variables",
            self.info.exprs.len(),
            self.info.vars.len()
        );
        self.info
    }

    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.diagnostics.report(Error::type_error(message, span));
    }

    fn check_var_decl(&mut self, decl: &VarDecl, storage: Storage) {
        if decl.ty.is_void() || decl.ty.is_void_pointer() {
            self.error(
                format!("variable '{}' cannot have type {}", decl.name.name, decl.ty),
                decl.span,
            );
        }
        self.info.vars.insert(decl.id, decl.ty.clone());
        self.info.storage.insert(decl.id, storage);
    }

    fn check_function(&mut self, func: &FunDecl) {
        trace!("checking function {}", func.name.name);
        self.current_ret = func.ret.clone();

        for param in &func.params {
            self.check_var_decl(param, Storage::Parameter);
        }
        if let Some(body) = &func.body {
            self.check_block(body);
        }
    }

    fn check_block(&mut self, block: &Block) {
        for decl in &block.decls {
            self.check_var_decl(decl, Storage::Local);
        }
        for stmt in &block.stmts {
            self.check_stmt(stmt);
        }
    }

    fn check_condition(&mut self, cond: &Expr, construct: &str) {
        if let Some(ty) = self.check_expr(cond) {
            if ty != Type::INT {
                self.error(
                    format!("{} condition must be int, found {}", construct, ty),
                    cond.span,
                );
            }
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(block) => self.check_block(block),
            Stmt::While { cond, body, .. } => {
                self.check_condition(cond, "while");
                self.check_stmt(body);
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.check_condition(cond, "if");
                self.check_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.check_stmt(else_branch);
                }
            }
            Stmt::Assign { lhs, rhs, span } => {
                let lhs_ty = self.check_expr(lhs);
                let rhs_ty = self.check_expr(rhs);

                let assignable = matches!(
                    lhs.kind,
                    ExprKind::Var(_) | ExprKind::Index { .. } | ExprKind::Field { .. } | ExprKind::Deref(_)
                );
                if !assignable {
                    self.error("left side of assignment is not assignable", lhs.span);
                    return;
                }

                let (Some(lhs_ty), Some(rhs_ty)) = (lhs_ty, rhs_ty) else {
                    return;
                };
                if lhs_ty.is_void() || lhs_ty.is_array() {
                    self.error(format!("cannot assign to a value of type {}", lhs_ty), lhs.span);
                } else if lhs_ty != rhs_ty {
                    self.error(
                        format!("cannot assign {} to {}", rhs_ty, lhs_ty),
                        *span,
                    );
                }
            }
            Stmt::Return { value, span } => {
                let actual = match value {
                    Some(value) => match self.check_expr(value) {
                        Some(ty) if ty.is_void() => {
                            self.error("cannot return the result of a void call", value.span);
                            return;
                        }
                        Some(ty) => ty,
                        None => return,
                    },
                    None => Type::VOID,
                };
                if actual != self.current_ret {
                    let expected = self.current_ret.clone();
                    self.error(
                        format!("returning {} from a function returning {}", actual, expected),
                        *span,
                    );
                }
            }
            Stmt::Expr(expr) => {
                self.check_expr(expr);
            }
        }
    }

    /// Type of `expr`, recorded in the side table when known
    fn check_expr(&mut self, expr: &Expr) -> Option<Type> {
        let ty = self.infer_expr(expr)?;
        self.info.exprs.insert(expr.id, ty.clone());
        Some(ty)
    }

    fn infer_expr(&mut self, expr: &Expr) -> Option<Type> {
        match &expr.kind {
            ExprKind::IntLit(_) => Some(Type::INT),
            ExprKind::CharLit(_) => Some(Type::CHAR),
            ExprKind::StrLit(s) => Some(Type::array(Type::CHAR, s.chars().count() + 1)),
            ExprKind::SizeOf(_) => Some(Type::INT),
            ExprKind::Var(_) => {
                let decl = self.bindings.variable(expr.id)?;
                self.info.vars.get(&decl).cloned()
            }
            ExprKind::Call { name, args } => self.check_call(expr, name, args),
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs_ty = self.check_expr(lhs);
                let rhs_ty = self.check_expr(rhs);
                let (lhs_ty, rhs_ty) = (lhs_ty?, rhs_ty?);

                let ok = match op {
                    BinOp::Eq | BinOp::Ne => lhs_ty == rhs_ty && !lhs_ty.is_void(),
                    _ => lhs_ty == Type::INT && rhs_ty == Type::INT,
                };
                if !ok {
                    self.error(
                        format!("operator {} is not defined for {} and {}", op.symbol(), lhs_ty, rhs_ty),
                        expr.span,
                    );
                    return None;
                }
                Some(Type::INT)
            }
            ExprKind::Index { base, index } => {
                let base_ty = self.check_expr(base);
                let index_ty = self.check_expr(index);
                let (base_ty, index_ty) = (base_ty?, index_ty?);

                let Some(elem) = base_ty.element() else {
                    self.error(format!("cannot index a value of type {}", base_ty), base.span);
                    return None;
                };
                if index_ty != Type::INT {
                    self.error(format!("array index must be int, found {}", index_ty), index.span);
                    return None;
                }
                Some(elem.clone())
            }
            ExprKind::Deref(inner) => {
                let ty = self.check_expr(inner)?;
                match ty {
                    Type::Pointer(pointee) => Some(*pointee),
                    other => {
                        self.error(format!("cannot dereference a value of type {}", other), expr.span);
                        None
                    }
                }
            }
            ExprKind::Field { base, field } => {
                let base_ty = self.check_expr(base)?;
                let def = match &base_ty {
                    Type::Struct(name) => self.structs.get(name.as_str()).copied(),
                    _ => None,
                };
                let found = def.and_then(|d| d.fields.iter().find(|f| f.name.name == field.name));
                match found {
                    Some(decl) => Some(decl.ty.clone()),
                    None => {
                        self.error(format!("{} has no field '{}'", base_ty, field.name), field.span);
                        None
                    }
                }
            }
            ExprKind::Cast { ty, expr: inner } => {
                let from = self.check_expr(inner)?;
                let allowed = match (&from, ty) {
                    (from, to) if *from == Type::CHAR && *to == Type::INT => true,
                    (from, Type::Pointer(pointee)) => from.element() == Some(&**pointee),
                    _ => false,
                };
                if !allowed {
                    self.error(format!("cannot cast {} to {}", from, ty), expr.span);
                    return None;
                }
                Some(ty.clone())
            }
        }
    }

    fn check_call(&mut self, expr: &Expr, name: &Ident, args: &[Expr]) -> Option<Type> {
        let arg_types: Vec<Option<Type>> = args.iter().map(|arg| self.check_expr(arg)).collect();

        let callee = self.bindings.callee(expr.id)?;
        let func = *self.functions.get(&callee)?;

        if args.len() != func.params.len() {
            self.error(
                format!(
                    "'{}' takes {} argument(s) but {} were given",
                    name.name,
                    func.params.len(),
                    args.len()
                ),
                expr.span,
            );
            return None;
        }

        let mismatch = arg_types
            .iter()
            .zip(args)
            .zip(&func.params)
            .find(|((arg_ty, _), param)| matches!(arg_ty, Some(ty) if *ty != param.ty));
        if let Some(((Some(arg_ty), arg), param)) = mismatch {
            self.error(
                format!(
                    "argument '{}' of '{}' expects {}, found {}",
                    param.name.name, name.name, param.ty, arg_ty
                ),
                arg.span,
            );
            return None;
        }

        Some(func.ret.clone())
    }
}

/// Type-check `program`, then append the runtime-library declarations to its
/// function list
pub fn check_types(program: &mut Program, bindings: &Bindings, diagnostics: &mut Diagnostics) -> TypeInfo {
    let info = TypeChecker::new(program, bindings, diagnostics).check(program);
    program.funcs.extend(bindings.runtime().iter().cloned());
    info
}
