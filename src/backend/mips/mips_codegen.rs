//! MIPS code generator
//!
//! Walks a checked program and writes SPIM assembly into a data stream and a
//! text stream. Every function saves the whole temporary pool on entry, so a
//! value held in a register survives any call made while computing it.

use std::collections::HashMap;
use std::mem;

use log::{debug, info, trace};

use crate::backend::codegen::{Assembly, CodeGen};
use crate::backend::mips::frame::{saved_reg_offset, FrameLayout, FrameSlot, ENTRY_SP, HEADER, OLD_FP};
use crate::backend::mips::registers::{Reg, RegisterPool, TEMPORARIES};
use crate::config::CompilerOptions;
use crate::frontend::ast::*;
use crate::frontend::resolve::Bindings;
use crate::frontend::typeck::{Storage, TypeInfo};
use crate::stdlib::{RuntimeLibrary, Syscall};
use crate::types::{Type, WORD};
use crate::utils::{Error, Result};

/// Read-only inputs shared by every emitting method
struct Context<'p> {
    program: &'p Program,
    bindings: &'p Bindings,
    types: &'p TypeInfo,
    /// Global variable declaration -> data label
    globals: HashMap<NodeId, &'p str>,
}

impl<'p> Context<'p> {
    fn new(program: &'p Program, bindings: &'p Bindings, types: &'p TypeInfo) -> Self {
        let globals = program
            .globals
            .iter()
            .map(|g| (g.id, g.name.name.as_str()))
            .collect();
        Self {
            program,
            bindings,
            types,
            globals,
        }
    }
}

/// Where a variable's value lives
#[derive(Debug, Clone, Copy)]
enum Location<'p> {
    Global(&'p str),
    Parameter(usize),
    Local(usize),
}

struct Variable<'p> {
    location: Location<'p>,
    ty: &'p Type,
}

/// Memory access width of an element reached by indexing or dereference.
/// `char` elements are bytes, so `.asciiz` data reads back correctly; a
/// `char` array keeps its word-per-element allocation, which covers the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Width {
    Byte,
    Word,
}

impl Width {
    /// Width of the elements `ty` points to or holds
    fn of_elements(ty: Option<&Type>) -> Self {
        match ty.and_then(Type::element) {
            Some(elem) if *elem == Type::CHAR => Width::Byte,
            _ => Width::Word,
        }
    }

    fn load(self) -> &'static str {
        match self {
            Width::Byte => "lb",
            Width::Word => "lw",
        }
    }

    fn store(self) -> &'static str {
        match self {
            Width::Byte => "sb",
            Width::Word => "sw",
        }
    }
}

/// What the generator observed about one emitted function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSummary {
    pub name: String,
    /// Registers left in the pool once the function was emitted
    pub free_registers: usize,
    pub slots: Vec<(NodeId, FrameSlot)>,
}

/// MIPS (SPIM) code generator
pub struct MipsCodeGen {
    entry: String,
    annotate: bool,
    runtime: RuntimeLibrary,
    data: String,
    text: String,
    pool: RegisterPool,
    frame: FrameLayout,
    if_counter: usize,
    loop_counter: usize,
    string_counter: usize,
    /// Label of every string literal emitted so far, by text
    strings: HashMap<String, String>,
    /// Whether the function being emitted is the entry point
    in_entry: bool,
    summaries: Vec<FunctionSummary>,
}

impl MipsCodeGen {
    pub fn new(options: &CompilerOptions) -> Self {
        Self {
            entry: options.entry.clone(),
            annotate: options.annotate,
            runtime: RuntimeLibrary::new(),
            data: String::new(),
            text: String::new(),
            pool: RegisterPool::new(),
            frame: FrameLayout::new(),
            if_counter: 0,
            loop_counter: 0,
            string_counter: 0,
            strings: HashMap::new(),
            in_entry: false,
            summaries: Vec::new(),
        }
    }

    /// One summary per function of the last generated program, in order
    pub fn summaries(&self) -> &[FunctionSummary] {
        &self.summaries
    }

    fn reset(&mut self) {
        self.data.clear();
        self.text.clear();
        self.pool = RegisterPool::new();
        self.frame.reset();
        self.if_counter = 0;
        self.loop_counter = 0;
        self.string_counter = 0;
        self.strings.clear();
        self.in_entry = false;
        self.summaries.clear();
    }

    // ==================== Output Helpers ====================

    fn emit(&mut self, line: impl AsRef<str>) {
        self.text.push_str("    ");
        self.text.push_str(line.as_ref());
        self.text.push('\n');
    }

    fn label(&mut self, name: &str) {
        self.text.push_str(name);
        self.text.push_str(":\n");
    }

    fn comment(&mut self, text: impl AsRef<str>) {
        if self.annotate {
            self.emit(format!("# {}", text.as_ref()));
        }
    }

    fn data_line(&mut self, line: impl AsRef<str>) {
        self.data.push_str(line.as_ref());
        self.data.push('\n');
    }

    fn fresh_if(&mut self) -> usize {
        let n = self.if_counter;
        self.if_counter += 1;
        n
    }

    fn fresh_loop(&mut self) -> usize {
        let n = self.loop_counter;
        self.loop_counter += 1;
        n
    }

    fn acquire(&mut self) -> Result<Reg> {
        self.pool.acquire()
    }

    fn release(&mut self, reg: Reg) {
        self.pool.release(reg);
    }

    // ==================== Data Section ====================

    fn gen_global(&mut self, decl: &VarDecl) {
        let name = &decl.name.name;
        match &decl.ty {
            Type::Array { .. } => self.data_line(format!("{}: .space {}", name, decl.ty.size())),
            Type::Struct(_) => self.data_line(format!("{}: .space {}", name, decl.ty.word_size())),
            _ => self.data_line(format!("{}: .word 0", name)),
        }
    }

    /// Label holding `text`; the first occurrence emits the `.asciiz`
    fn intern_string(&mut self, text: &str) -> String {
        if let Some(label) = self.strings.get(text) {
            return label.clone();
        }
        let label = format!("str_label_{}", self.string_counter);
        self.string_counter += 1;
        self.data_line(format!("{}: .asciiz \"{}\"", label, escape_asciiz(text)));
        self.strings.insert(text.to_string(), label.clone());
        label
    }

    // ==================== Functions ====================

    fn gen_function(&mut self, cx: &Context<'_>, func: &FunDecl) -> Result<()> {
        let name = func.name.name.as_str();
        debug!("generating {}", name);
        debug_assert!(self.pool.is_full(), "register pool not full entering {}", name);

        self.frame.reset();
        self.in_entry = name == self.entry;

        self.label(name);
        self.gen_prologue();

        match &func.body {
            None => self.gen_runtime_body(name)?,
            Some(body) => {
                self.frame
                    .assign_params(func.params.iter().map(|p| (p.id, p.ty.word_size())));
                self.gen_block(cx, body)?;
                if self.in_entry {
                    self.gen_exit();
                } else {
                    self.gen_epilogue();
                }
            }
        }

        debug_assert!(self.pool.is_full(), "register pool not full leaving {}", name);
        let mut slots: Vec<_> = self.frame.slots().collect();
        slots.sort_by_key(|(id, _)| *id);
        self.summaries.push(FunctionSummary {
            name: name.to_string(),
            free_registers: self.pool.available(),
            slots,
        });
        Ok(())
    }

    fn gen_prologue(&mut self) {
        self.comment("save registers");
        for reg in TEMPORARIES.iter().chain([&Reg::FP]) {
            self.emit(format!("sw {}, 0({})", reg, Reg::SP));
            self.emit(format!("addi {}, {}, -{}", Reg::SP, Reg::SP, WORD));
        }
        self.emit(format!("move {}, {}", Reg::FP, Reg::SP));
    }

    fn gen_epilogue(&mut self) {
        self.comment("restore registers");
        for (i, reg) in TEMPORARIES.iter().enumerate() {
            self.emit(format!("lw {}, {}({})", reg, saved_reg_offset(i), Reg::FP));
        }
        self.emit(format!("addi {}, {}, {}", Reg::SP, Reg::FP, ENTRY_SP));
        self.emit(format!("lw {}, {}({})", Reg::FP, OLD_FP, Reg::FP));
        self.emit(format!("jr {}", Reg::RA));
    }

    fn gen_exit(&mut self) {
        self.emit(format!("li $v0, {}", Syscall::Exit.code()));
        self.emit("syscall");
    }

    fn gen_runtime_body(&mut self, name: &str) -> Result<()> {
        let syscall = self
            .runtime
            .get(name)
            .map(|f| f.syscall)
            .ok_or_else(|| Error::Unsupported(format!("function '{}' without a body", name)))?;

        if syscall.takes_argument() {
            self.emit(format!("lw {}, {}($fp)", Reg::A0, HEADER));
        }
        self.emit(format!("li $v0, {}", syscall.code()));
        self.emit("syscall");
        self.gen_epilogue();
        Ok(())
    }

    // ==================== Statements ====================

    fn gen_block(&mut self, cx: &Context<'_>, block: &Block) -> Result<()> {
        for decl in &block.decls {
            let size = decl.ty.word_size();
            let offset = self.frame.alloc_local(decl.id, size);
            trace!("local {} at -{}($fp)", decl.name.name, offset);
            self.comment(format!("local {}", decl.name.name));
            self.emit(format!("addi $sp, $sp, -{}", size));
        }
        for stmt in &block.stmts {
            self.gen_stmt(cx, stmt)?;
        }
        Ok(())
    }

    fn gen_stmt(&mut self, cx: &Context<'_>, stmt: &Stmt) -> Result<()> {
        let span = stmt.span();
        trace!("statement at {}..{}", span.start, span.end);

        match stmt {
            Stmt::Block(block) if block.decls.is_empty() => self.gen_block(cx, block),
            // `$sp` is reset to `fp - next_local` on entry and put back on exit,
            // whatever ran before
            Stmt::Block(block) => {
                let mark = local_offset(self.frame.next_local());
                self.emit(format!("addi {}, {}, {}", Reg::SP, Reg::FP, mark));
                self.gen_block(cx, block)?;
                self.emit(format!("addi {}, {}, {}", Reg::SP, Reg::FP, mark));
                Ok(())
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                let n = self.fresh_if();
                let else_label = format!("else_{}", n);
                let continue_label = format!("if_continue_{}", n);

                self.comment("if");
                self.gen_condition(cx, cond, &else_label)?;
                self.gen_stmt(cx, then_branch)?;
                self.emit(format!("j {}", continue_label));
                self.label(&else_label);
                if let Some(else_branch) = else_branch {
                    self.gen_stmt(cx, else_branch)?;
                }
                self.label(&continue_label);
                Ok(())
            }
            Stmt::While { cond, body, .. } => {
                let n = self.fresh_loop();
                let loop_label = format!("loop_{}", n);
                let check_label = format!("end_loop_{}", n);
                let exit_label = format!("loop_exit_{}", n);

                self.comment("while");
                self.emit(format!("j {}", check_label));
                self.label(&loop_label);
                self.gen_stmt(cx, body)?;
                self.label(&check_label);
                self.gen_condition(cx, cond, &exit_label)?;
                self.emit(format!("j {}", loop_label));
                self.label(&exit_label);
                Ok(())
            }
            Stmt::Assign { lhs, rhs, .. } => {
                let value = self.gen_value(cx, rhs)?;
                self.gen_store(cx, lhs, value)?;
                self.release(value);
                Ok(())
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    let reg = self.gen_value(cx, value)?;
                    self.emit(format!("move {}, {}", Reg::V0, reg));
                    self.release(reg);
                }
                if self.in_entry {
                    self.gen_exit();
                } else {
                    self.gen_epilogue();
                }
                Ok(())
            }
            Stmt::Expr(expr) => {
                if let Some(reg) = self.gen_expr(cx, expr)? {
                    self.release(reg);
                }
                Ok(())
            }
        }
    }

    /// Branch to `false_label` when `cond` is zero
    fn gen_condition(&mut self, cx: &Context<'_>, cond: &Expr, false_label: &str) -> Result<()> {
        if let ExprKind::Binary { op, lhs, rhs } = &cond.kind {
            if let Some(branch) = inverted_branch(*op) {
                let l = self.gen_value(cx, lhs)?;
                let r = self.gen_value(cx, rhs)?;
                self.emit(format!("{} {}, {}, {}", branch, l, r, false_label));
                self.release(r);
                self.release(l);
                return Ok(());
            }
        }

        let reg = self.gen_value(cx, cond)?;
        self.emit(format!("beq {}, {}, {}", reg, Reg::ZERO, false_label));
        self.release(reg);
        Ok(())
    }

    // ==================== Expressions ====================

    fn gen_value(&mut self, cx: &Context<'_>, expr: &Expr) -> Result<Reg> {
        self.gen_expr(cx, expr)?
            .ok_or_else(|| Error::Unsupported("void call used as a value".to_string()))
    }

    /// Evaluate `expr`. `None` only for calls to void functions.
    fn gen_expr(&mut self, cx: &Context<'_>, expr: &Expr) -> Result<Option<Reg>> {
        let reg = match &expr.kind {
            ExprKind::IntLit(n) => {
                let reg = self.acquire()?;
                self.emit(format!("li {}, {}", reg, n));
                reg
            }
            ExprKind::CharLit(c) => {
                let reg = self.acquire()?;
                self.emit(format!("li {}, {}", reg, *c as u32));
                reg
            }
            ExprKind::StrLit(s) => {
                let label = self.intern_string(s);
                let reg = self.acquire()?;
                self.emit(format!("la {}, {}", reg, label));
                reg
            }
            ExprKind::SizeOf(ty) => {
                let reg = self.acquire()?;
                self.emit(format!("li {}, {}", reg, ty.size()));
                reg
            }
            ExprKind::Var(name) => self.gen_load_var(cx, expr, name)?,
            ExprKind::Call { name, args } => return self.gen_call(cx, expr, name, args),
            ExprKind::Binary { op, lhs, rhs } => self.gen_binary(cx, *op, lhs, rhs)?,
            ExprKind::Index { base, index } => {
                let width = Width::of_elements(cx.types.type_of(base.id));
                let addr = self.gen_element_address(cx, base, index, width)?;
                self.emit(format!("{} {}, 0({})", width.load(), addr, addr));
                addr
            }
            ExprKind::Deref(inner) => {
                let width = Width::of_elements(cx.types.type_of(inner.id));
                let reg = self.gen_value(cx, inner)?;
                self.emit(format!("{} {}, 0({})", width.load(), reg, reg));
                reg
            }
            ExprKind::Cast { expr: inner, .. } => return self.gen_expr(cx, inner),
            ExprKind::Field { .. } => {
                return Err(Error::Unsupported("struct field access".to_string()));
            }
        };
        Ok(Some(reg))
    }

    fn variable<'p>(&self, cx: &Context<'p>, expr: &Expr, name: &str) -> Result<Variable<'p>> {
        let unresolved = || Error::Unsupported(format!("unresolved variable '{}'", name));

        let decl = cx.bindings.variable(expr.id).ok_or_else(unresolved)?;
        let ty = cx.types.var_type(decl).ok_or_else(unresolved)?;
        let location = match cx.types.storage(decl).ok_or_else(unresolved)? {
            Storage::Global => Location::Global(cx.globals.get(&decl).copied().ok_or_else(unresolved)?),
            Storage::Parameter | Storage::Local => match self.frame.slot(decl).ok_or_else(unresolved)? {
                FrameSlot::Parameter(offset) => Location::Parameter(offset),
                FrameSlot::Local(offset) => Location::Local(offset),
            },
        };
        Ok(Variable { location, ty })
    }

    /// Scalars load their value; arrays evaluate to their base address
    fn gen_load_var(&mut self, cx: &Context<'_>, expr: &Expr, name: &str) -> Result<Reg> {
        let var = self.variable(cx, expr, name)?;
        let reg = self.acquire()?;
        match var.location {
            Location::Global(label) => {
                self.emit(format!("la {}, {}", reg, label));
                if !var.ty.is_array() {
                    self.emit(format!("lw {}, 0({})", reg, reg));
                }
            }
            // Array parameters hold the address already
            Location::Parameter(offset) => {
                self.emit(format!("lw {}, {}($fp)", reg, offset));
            }
            Location::Local(offset) if var.ty.is_array() => {
                let lowest = offset + var.ty.word_size() - WORD;
                self.emit(format!("addi {}, $fp, {}", reg, local_offset(lowest)));
            }
            Location::Local(offset) => {
                self.emit(format!("lw {}, {}($fp)", reg, local_offset(offset)));
            }
        }
        Ok(reg)
    }

    fn gen_store(&mut self, cx: &Context<'_>, target: &Expr, value: Reg) -> Result<()> {
        match &target.kind {
            ExprKind::Var(name) => match self.variable(cx, target, name)?.location {
                Location::Global(label) => {
                    let addr = self.acquire()?;
                    self.emit(format!("la {}, {}", addr, label));
                    self.emit(format!("sw {}, 0({})", value, addr));
                    self.release(addr);
                }
                Location::Parameter(offset) => {
                    self.emit(format!("sw {}, {}($fp)", value, offset));
                }
                Location::Local(offset) => {
                    self.emit(format!("sw {}, {}($fp)", value, local_offset(offset)));
                }
            },
            ExprKind::Index { base, index } => {
                let width = Width::of_elements(cx.types.type_of(base.id));
                let addr = self.gen_element_address(cx, base, index, width)?;
                self.emit(format!("{} {}, 0({})", width.store(), value, addr));
                self.release(addr);
            }
            ExprKind::Deref(inner) => {
                let width = Width::of_elements(cx.types.type_of(inner.id));
                let addr = self.gen_value(cx, inner)?;
                self.emit(format!("{} {}, 0({})", width.store(), value, addr));
                self.release(addr);
            }
            ExprKind::Field { .. } => {
                return Err(Error::Unsupported("struct field access".to_string()));
            }
            _ => return Err(Error::Unsupported("assignment to a non-lvalue".to_string())),
        }
        Ok(())
    }

    /// `base + index` for bytes, `base + 4 * index` for words
    fn gen_element_address(&mut self, cx: &Context<'_>, base: &Expr, index: &Expr, width: Width) -> Result<Reg> {
        let addr = self.gen_value(cx, base)?;
        let offset = self.gen_value(cx, index)?;
        if width == Width::Word {
            self.emit(format!("sll {}, {}, 2", offset, offset));
        }
        self.emit(format!("add {}, {}, {}", addr, addr, offset));
        self.release(offset);
        Ok(addr)
    }

    fn gen_binary(&mut self, cx: &Context<'_>, op: BinOp, lhs: &Expr, rhs: &Expr) -> Result<Reg> {
        let l = self.gen_value(cx, lhs)?;
        let r = self.gen_value(cx, rhs)?;

        match op {
            BinOp::Add => self.emit_op("add", l, r),
            BinOp::Sub => self.emit_op("sub", l, r),
            BinOp::Mul => self.emit_op("mul", l, r),
            BinOp::Div => {
                self.emit(format!("div {}, {}", l, r));
                self.emit(format!("mflo {}", l));
            }
            BinOp::Mod => {
                self.emit(format!("div {}, {}", l, r));
                self.emit(format!("mfhi {}", l));
            }
            BinOp::Lt => self.emit_op("slt", l, r),
            BinOp::Gt => self.emit_op("sgt", l, r),
            BinOp::Le => self.emit_op("sle", l, r),
            BinOp::Ge => self.emit_op("sge", l, r),
            BinOp::Eq => self.emit_op("seq", l, r),
            BinOp::Ne => self.emit_op("sne", l, r),
            // No short circuit: both sides are normalised to 0/1 first
            BinOp::And | BinOp::Or => {
                self.emit_op("sne", l, Reg::ZERO);
                self.emit_op("sne", r, Reg::ZERO);
                self.emit_op(if op == BinOp::And { "and" } else { "or" }, l, r);
            }
        }

        self.release(r);
        Ok(l)
    }

    /// `instr dst, dst, src`
    fn emit_op(&mut self, instr: &str, dst: Reg, src: Reg) {
        self.emit(format!("{} {}, {}, {}", instr, dst, dst, src));
    }

    fn gen_call(&mut self, cx: &Context<'_>, expr: &Expr, name: &Ident, args: &[Expr]) -> Result<Option<Reg>> {
        let func = cx
            .bindings
            .callee(expr.id)
            .and_then(|id| cx.program.function(id))
            .ok_or_else(|| Error::Unsupported(format!("unresolved call to '{}'", name.name)))?;

        self.comment(format!("call {}", name.name));

        // Right to left, so the first argument ends up lowest
        let mut pushed = 0;
        for (arg, param) in args.iter().zip(&func.params).rev() {
            let reg = self.gen_value(cx, arg)?;
            let slot = param.ty.word_size();
            if slot > WORD {
                self.emit(format!("addi $sp, $sp, -{}", slot - WORD));
            }
            self.emit(format!("sw {}, 0($sp)", reg));
            self.emit(format!("addi $sp, $sp, -{}", WORD));
            self.release(reg);
            pushed += slot;
        }

        self.emit(format!("sw {}, 0($sp)", Reg::RA));
        self.emit(format!("addi $sp, $sp, -{}", WORD));
        self.emit(format!("jal {}", name.name));
        self.emit(format!("lw {}, {}($sp)", Reg::RA, WORD));
        self.emit(format!("addi $sp, $sp, {}", pushed + WORD));

        if func.ret.is_void() {
            return Ok(None);
        }
        let reg = self.acquire()?;
        self.emit(format!("move {}, {}", reg, Reg::V0));
        Ok(Some(reg))
    }
}

impl CodeGen for MipsCodeGen {
    fn generate(&mut self, program: &Program, bindings: &Bindings, types: &TypeInfo) -> Result<Assembly> {
        self.reset();
        let cx = Context::new(program, bindings, types);

        self.data_line(".data");
        self.data_line(".align 2");
        for decl in &program.globals {
            self.gen_global(decl);
        }

        self.text.push_str(".text\n");
        let entry = self.entry.clone();
        self.emit(format!("j {}", entry));
        for func in &cx.program.funcs {
            self.gen_function(&cx, func)?;
        }

        info!(
            "generated {} functions, {} strings",
            self.summaries.len(),
            self.string_counter
        );
        Ok(Assembly {
            data: mem::take(&mut self.data),
            text: mem::take(&mut self.text),
        })
    }

    fn target(&self) -> &str {
        "mips32-spim"
    }

    fn name(&self) -> &str {
        "mips"
    }
}

/// Branch taken when the comparison `op` is false
fn inverted_branch(op: BinOp) -> Option<&'static str> {
    let branch = match op {
        BinOp::Ge => "blt",
        BinOp::Le => "bgt",
        BinOp::Gt => "ble",
        BinOp::Lt => "bge",
        BinOp::Eq => "bne",
        BinOp::Ne => "beq",
        _ => return None,
    };
    Some(branch)
}

/// `-off` for a local slot, printed without a sign for zero
fn local_offset(offset: usize) -> i64 {
    -(offset as i64)
}

fn escape_asciiz(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::parse_source;
    use crate::frontend::resolve::resolve_names;
    use crate::frontend::typeck::check_types;
    use crate::utils::Diagnostics;
    use pretty_assertions::assert_eq;

    fn generate_with(source: &str, options: &CompilerOptions) -> (Result<Assembly>, MipsCodeGen) {
        let mut program = parse_source(source).unwrap();
        let mut diags = Diagnostics::new();
        let bindings = resolve_names(&mut program, &mut diags);
        let types = check_types(&mut program, &bindings, &mut diags);
        assert!(!diags.has_errors(), "{:?}", diags);

        let mut codegen = MipsCodeGen::new(options);
        let asm = codegen.generate(&program, &bindings, &types);
        (asm, codegen)
    }

    fn generate(source: &str) -> (Assembly, MipsCodeGen) {
        let options = CompilerOptions::default().with_annotations(false);
        let (asm, codegen) = generate_with(source, &options);
        (asm.unwrap(), codegen)
    }

    fn lines(text: &str) -> Vec<&str> {
        text.lines().map(str::trim).collect()
    }

    /// True if `needle` appears as consecutive lines
    fn has_sequence(text: &str, needle: &[&str]) -> bool {
        let lines = lines(text);
        lines.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_end_to_end_main() {
        let (asm, _) = generate("int main(){ int x; x = 1 + 2; print_i(x); return 0; }");
        let text = &asm.text;

        assert!(text.starts_with(".text\n"));
        assert!(has_sequence(text, &["j main", "main:"]));
        assert!(has_sequence(
            text,
            &["li $t0, 1", "li $t1, 2", "add $t0, $t0, $t1", "sw $t0, 0($fp)"]
        ));
        assert!(has_sequence(text, &["jal print_i", "lw $ra, 4($sp)", "addi $sp, $sp, 8"]));
        assert!(has_sequence(text, &["lw $a0, 84($fp)", "li $v0, 1", "syscall"]));
        // `return 0` in the entry function exits
        assert!(has_sequence(text, &["move $v0, $t0", "li $v0, 10", "syscall"]));
    }

    #[test]
    fn test_prologue_and_epilogue() {
        let (asm, _) = generate("void f() {} void main() { f(); }");
        let text = lines(&asm.text);
        let start = text.iter().position(|l| *l == "f:").unwrap();

        assert_eq!(text[start + 1], "sw $t0, 0($sp)");
        assert_eq!(text[start + 2], "addi $sp, $sp, -4");
        assert_eq!(text[start + 35], "sw $s7, 0($sp)");
        assert_eq!(&text[start + 37..start + 40], &["sw $fp, 0($sp)", "addi $sp, $sp, -4", "move $fp, $sp"]);
        assert_eq!(text[start + 40], "lw $t0, 76($fp)");
        assert_eq!(text[start + 57], "lw $s7, 8($fp)");
        assert_eq!(&text[start + 58..start + 61], &["addi $sp, $fp, 76", "lw $fp, 4($fp)", "jr $ra"]);
    }

    #[test]
    fn test_pool_is_full_after_every_function() {
        let (_, codegen) = generate(
            "int sq(int n) { return n * n; }\n\
             int main() {\n\
                 int i; int a[4];\n\
                 i = 0;\n\
                 while (i < 4) { a[i] = sq(i) + sq(i + 1) % 3; i = i + 1; }\n\
                 if (a[1] == 2 && i > 0 || read_i()) { print_i(a[0] / 2); } else { print_c('x'); }\n\
                 i = i < 3;\n\
                 return sq(i);\n\
             }",
        );
        assert_eq!(codegen.summaries().len(), 7);
        for summary in codegen.summaries() {
            assert_eq!(summary.free_registers, 18, "{}", summary.name);
        }
    }

    #[test]
    fn test_frame_offsets_are_disjoint() {
        let (_, codegen) = generate(
            "void f(int a, int b[3], char c) { int x; int y[2]; { int z; } { char w; } }\n\
             void main() {}",
        );
        let f = &codegen.summaries()[0];

        let params: Vec<usize> = f
            .slots
            .iter()
            .filter_map(|(_, s)| match s {
                FrameSlot::Parameter(off) => Some(*off),
                _ => None,
            })
            .collect();
        let locals: Vec<usize> = f
            .slots
            .iter()
            .filter_map(|(_, s)| match s {
                FrameSlot::Local(off) => Some(*off),
                _ => None,
            })
            .collect();

        assert_eq!(params, vec![84, 88, 100]);
        assert_eq!(locals, vec![0, 4, 12, 16]);
    }

    #[test]
    fn test_condition_branches_without_result_register() {
        let (asm, _) = generate("void main() { int a; int b; if (a < b) { a = 1; } }");
        assert!(has_sequence(
            &asm.text,
            &["lw $t0, 0($fp)", "lw $t1, -4($fp)", "bge $t0, $t1, else_0"]
        ));
        assert!(!asm.text.contains("slt"));
        assert!(has_sequence(&asm.text, &["j if_continue_0", "else_0:", "if_continue_0:"]));
    }

    #[test]
    fn test_value_comparison_is_boxed() {
        let (asm, _) = generate("void main() { int a; int b; a = a >= b; b = a && b; }");
        assert!(asm.text.contains("sge $t0, $t0, $t1"));
        assert!(has_sequence(
            &asm.text,
            &["sne $t0, $t0, $zero", "sne $t1, $t1, $zero", "and $t0, $t0, $t1"]
        ));
    }

    #[test]
    fn test_while_layout() {
        let (asm, _) = generate("void main() { int i; while (i != 3) i = i + 1; }");
        let text = lines(&asm.text);
        let jump = text.iter().position(|l| *l == "j end_loop_0").unwrap();
        assert_eq!(text[jump + 1], "loop_0:");
        let check = text.iter().position(|l| *l == "end_loop_0:").unwrap();
        assert!(check > jump);
        assert_eq!(text[check + 3], "beq $t0, $t1, loop_exit_0");
        assert_eq!(&text[check + 4..check + 6], &["j loop_0", "loop_exit_0:"]);
    }

    #[test]
    fn test_data_section() {
        let (asm, _) = generate(
            "struct p { int x; };\n\
             int n; char buf[3]; struct p origin;\n\
             void main() { print_s((char*) \"hi\\n\"); print_s((char*) \"bye\"); print_s((char*) \"hi\\n\"); }",
        );
        assert_eq!(
            lines(&asm.data),
            vec![
                ".data",
                ".align 2",
                "n: .word 0",
                "buf: .space 12",
                "origin: .space 4",
                "str_label_0: .asciiz \"hi\\n\"",
                "str_label_1: .asciiz \"bye\"",
            ]
        );
        assert_eq!(asm.text.matches("la $t0, str_label_0").count(), 2);
        assert_eq!(asm.text.matches("la $t0, str_label_1").count(), 1);
    }

    #[test]
    fn test_globals_and_arrays() {
        let (asm, _) = generate(
            "int g; int arr[4];\n\
             void main() { int loc[2]; g = arr[1]; loc[0] = g; }",
        );
        // Global array base, then element address
        assert!(has_sequence(
            &asm.text,
            &["la $t0, arr", "li $t1, 1", "sll $t1, $t1, 2", "add $t0, $t0, $t1", "lw $t0, 0($t0)"]
        ));
        assert!(has_sequence(&asm.text, &["la $t1, g", "sw $t0, 0($t1)"]));
        // Local array base is its lowest word
        assert!(has_sequence(&asm.text, &["addi $t1, $fp, -4", "li $t2, 0"]));
    }

    #[test]
    fn test_array_argument_slot() {
        let (asm, _) = generate(
            "int first(int a[3]) { return a[0]; }\n\
             void main() { int xs[3]; int r; r = first(xs); }",
        );
        assert!(has_sequence(
            &asm.text,
            &["addi $sp, $sp, -8", "sw $t0, 0($sp)", "addi $sp, $sp, -4"]
        ));
        assert!(has_sequence(&asm.text, &["jal first", "lw $ra, 4($sp)", "addi $sp, $sp, 16", "move $t0, $v0"]));
        // Inside `first`, the parameter holds the address
        assert!(asm.text.contains("lw $t0, 84($fp)"));
    }

    #[test]
    fn test_char_elements_are_bytes() {
        let (asm, _) = generate(
            "void main() { char* p; char c; p = (char*) \"abc\"; c = p[1]; c = *p; *p = c; }",
        );
        assert!(has_sequence(&asm.text, &["la $t0, str_label_0", "sw $t0, 0($fp)"]));
        assert!(has_sequence(
            &asm.text,
            &["lw $t0, 0($fp)", "li $t1, 1", "add $t0, $t0, $t1", "lb $t0, 0($t0)", "sw $t0, -4($fp)"]
        ));
        assert!(has_sequence(&asm.text, &["lw $t0, 0($fp)", "lb $t0, 0($t0)", "sw $t0, -4($fp)"]));
        assert!(has_sequence(&asm.text, &["lw $t0, -4($fp)", "lw $t1, 0($fp)", "sb $t0, 0($t1)"]));
        assert!(!asm.text.contains("sll"));
    }

    #[test]
    fn test_char_array_store_is_a_byte() {
        let (asm, _) = generate("void main() { char buf[3]; buf[1] = 'x'; }");
        assert!(has_sequence(
            &asm.text,
            &["li $t0, 120", "addi $t1, $fp, -8", "li $t2, 1", "add $t1, $t1, $t2", "sb $t0, 0($t1)"]
        ));
    }

    #[test]
    fn test_skipped_block_does_not_shift_later_locals() {
        let (asm, codegen) = generate(
            "void two(int a, int b) { print_i(a); }\n\
             void main() { int a; a = 0; if (a) { int z; z = 1; } { int w; w = 5; two(w, 7); } }",
        );
        // Entry and exit both put `$sp` just below the locals reserved so far
        assert!(has_sequence(
            &asm.text,
            &["addi $sp, $fp, -4", "addi $sp, $sp, -4", "li $t0, 1", "sw $t0, -4($fp)", "addi $sp, $fp, -4"]
        ));
        assert!(has_sequence(
            &asm.text,
            &["addi $sp, $fp, -8", "addi $sp, $sp, -4", "li $t0, 5", "sw $t0, -8($fp)"]
        ));
        // Arguments are pushed below `w`, whether or not the `if` ran
        assert!(has_sequence(&asm.text, &["li $t0, 7", "sw $t0, 0($sp)", "addi $sp, $sp, -4"]));

        let main = &codegen.summaries()[1];
        let mut locals: Vec<usize> = main
            .slots
            .iter()
            .filter_map(|(_, s)| match s {
                FrameSlot::Local(off) => Some(*off),
                _ => None,
            })
            .collect();
        locals.sort();
        assert_eq!(locals, vec![0, 4, 8]);
    }

    #[test]
    fn test_block_local_in_loop_keeps_stack_level() {
        let (asm, _) = generate("void main() { int i; while (i < 3) { int t; t = i; i = i + 1; } }");
        let text = lines(&asm.text);
        let body = text.iter().position(|l| *l == "loop_0:").unwrap();
        assert_eq!(&text[body + 1..body + 3], &["addi $sp, $fp, -4", "addi $sp, $sp, -4"]);
        let check = text.iter().position(|l| *l == "end_loop_0:").unwrap();
        assert_eq!(text[check - 1], "addi $sp, $fp, -4");
    }

    #[test]
    fn test_pointers_and_sizeof() {
        let (asm, _) = generate("void main() { int* p; int n; n = *p; *p = sizeof(char); }");
        assert!(has_sequence(&asm.text, &["lw $t0, 0($fp)", "lw $t0, 0($t0)", "sw $t0, -4($fp)"]));
        assert!(has_sequence(&asm.text, &["li $t0, 1", "lw $t1, 0($fp)", "sw $t0, 0($t1)"]));
    }

    #[test]
    fn test_runtime_functions_last() {
        let (asm, codegen) = generate("void main() {}");
        let names: Vec<_> = codegen.summaries().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["main", "print_s", "print_i", "print_c", "read_c", "read_i"]);
        assert!(has_sequence(&asm.text, &["lw $a0, 84($fp)", "li $v0, 11", "syscall"]));
        assert!(has_sequence(&asm.text, &["move $fp, $sp", "li $v0, 12", "syscall"]));
    }

    #[test]
    fn test_non_entry_return_uses_epilogue() {
        let (asm, _) = generate("int two() { return 2; } void main() {}");
        assert!(has_sequence(&asm.text, &["li $t0, 2", "move $v0, $t0", "lw $t0, 76($fp)"]));
    }

    #[test]
    fn test_custom_entry() {
        let options = CompilerOptions::default().with_entry("start").with_annotations(false);
        let (asm, _) = generate_with("void start() {} ", &options);
        let text = asm.unwrap().text;
        assert!(has_sequence(&text, &["j start", "start:"]));
        assert!(has_sequence(&text, &["move $fp, $sp", "li $v0, 10", "syscall"]));
    }

    #[test]
    fn test_annotations() {
        let (asm, _) = generate_with("void main() { int x; }", &CompilerOptions::default());
        assert!(asm.unwrap().text.contains("# local x"));
    }

    #[test]
    fn test_register_exhaustion() {
        let mut expr = String::from("1");
        for _ in 0..18 {
            expr = format!("1 + ({})", expr);
        }
        let source = format!("void main() {{ int x; x = {}; }}", expr);
        let (asm, _) = generate_with(&source, &CompilerOptions::default());
        assert_eq!(asm, Err(Error::RegisterExhaustion));
    }

    #[test]
    fn test_field_access_unsupported() {
        let source = "struct p { int x; }; struct p g; void main() { int i; i = g.x; }";
        let (asm, _) = generate_with(source, &CompilerOptions::default());
        assert!(matches!(asm, Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape_asciiz("a\"b\\c\td"), "a\\\"b\\\\c\\td");
    }
}
