//! Runtime library
//!
//! The five I/O functions every minic program can call. They have no source
//! body; the code generator emits a syscall for each.

use crate::frontend::ast::{FunDecl, Ident, Program, VarDecl};
use crate::types::Type;
use crate::utils::Span;

/// SPIM syscall service numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    PrintInt = 1,
    PrintString = 4,
    ReadInt = 5,
    /// Reserved; no runtime function allocates
    #[allow(dead_code)]
    Alloc = 9,
    Exit = 10,
    PrintChar = 11,
    ReadChar = 12,
}

impl Syscall {
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Print services take their argument in `$a0`
    pub fn takes_argument(self) -> bool {
        matches!(self, Syscall::PrintInt | Syscall::PrintString | Syscall::PrintChar)
    }
}

/// Signature of one runtime function
#[derive(Debug, Clone)]
pub struct RuntimeFunc {
    pub name: &'static str,
    pub params: Vec<(&'static str, Type)>,
    pub ret: Type,
    pub syscall: Syscall,
}

impl RuntimeFunc {
    /// Body-less declaration with ids minted from `program`
    pub fn declaration(&self, program: &mut Program) -> FunDecl {
        let params = self
            .params
            .iter()
            .map(|(name, ty)| VarDecl {
                id: program.fresh_id(),
                ty: ty.clone(),
                name: Ident::new(*name, Span::dummy()),
                span: Span::dummy(),
            })
            .collect();

        FunDecl {
            id: program.fresh_id(),
            ret: self.ret.clone(),
            name: Ident::new(self.name, Span::dummy()),
            params,
            body: None,
            span: Span::dummy(),
        }
    }
}

/// Table of runtime functions
pub struct RuntimeLibrary {
    functions: Vec<RuntimeFunc>,
}

impl RuntimeLibrary {
    pub fn new() -> Self {
        let func = |name, params: Vec<(&'static str, Type)>, ret, syscall| RuntimeFunc {
            name,
            params,
            ret,
            syscall,
        };

        Self {
            functions: vec![
                func("print_s", vec![("s", Type::ptr(Type::CHAR))], Type::VOID, Syscall::PrintString),
                func("print_i", vec![("i", Type::INT)], Type::VOID, Syscall::PrintInt),
                func("print_c", vec![("c", Type::CHAR)], Type::VOID, Syscall::PrintChar),
                func("read_c", vec![], Type::CHAR, Syscall::ReadChar),
                func("read_i", vec![], Type::INT, Syscall::ReadInt),
            ],
        }
    }

    pub fn get(&self, name: &str) -> Option<&RuntimeFunc> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuntimeFunc> {
        self.functions.iter()
    }

    /// Declarations for every runtime function, in table order
    pub fn declarations(&self, program: &mut Program) -> Vec<FunDecl> {
        self.iter().map(|f| f.declaration(program)).collect()
    }
}

impl Default for RuntimeLibrary {
    fn default() -> Self {
        Self::new()
    }
}
