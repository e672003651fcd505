//! Compilation pipeline
//!
//! lex -> parse -> resolve -> type-check -> codegen. Each semantic pass reports
//! into one [`Diagnostics`]; the pipeline stops after any pass that reported.

use log::{debug, info};
use thiserror::Error;

use crate::backend::{Assembly, CodeGen, MipsCodeGen};
use crate::config::CompilerOptions;
use crate::feedback::CompilationStats;
use crate::frontend::ast::Program;
use crate::frontend::parser::parse_source;
use crate::frontend::resolve::{resolve_names, Bindings};
use crate::frontend::typeck::{check_types, TypeInfo};
use crate::utils::{Diagnostics, Error, ErrorKind};

/// A program that passed every front-end check
#[derive(Debug)]
pub struct Analysis {
    pub program: Program,
    pub bindings: Bindings,
    pub types: TypeInfo,
}

/// Successful compilation
#[derive(Debug)]
pub struct Compilation {
    pub assembly: Assembly,
    pub stats: CompilationStats,
}

/// Failed compilation, with every error that was found
#[derive(Debug, Error)]
#[error("compilation failed with {} error(s)", .errors.len())]
pub struct CompileFailure {
    pub errors: Vec<Error>,
}

impl From<Error> for CompileFailure {
    fn from(error: Error) -> Self {
        Self { errors: vec![error] }
    }
}

impl From<Diagnostics> for CompileFailure {
    fn from(diagnostics: Diagnostics) -> Self {
        Self {
            errors: diagnostics.into_errors(),
        }
    }
}

/// Run the front end and both semantic passes
pub fn check_source(source: &str) -> Result<Analysis, CompileFailure> {
    let mut program = parse_source(source)?;
    debug!(
        "parsed {} structs, {} globals, {} functions",
        program.structs.len(),
        program.globals.len(),
        program.funcs.len()
    );

    let mut diagnostics = Diagnostics::new();
    let bindings = resolve_names(&mut program, &mut diagnostics);
    if diagnostics.has_errors() {
        info!(
            "name resolution reported {} error(s): {} duplicate, {} unbound",
            diagnostics.error_count(),
            diagnostics.count(ErrorKind::DuplicateDeclaration),
            diagnostics.count(ErrorKind::UnboundReference)
        );
        return Err(diagnostics.into());
    }

    let types = check_types(&mut program, &bindings, &mut diagnostics);
    if diagnostics.has_errors() {
        info!("type checking reported {} error(s)", diagnostics.error_count());
        return Err(diagnostics.into());
    }

    Ok(Analysis {
        program,
        bindings,
        types,
    })
}

/// Compile minic source to MIPS assembly
pub fn compile_source(source: &str, options: &CompilerOptions) -> Result<Compilation, CompileFailure> {
    let analysis = check_source(source)?;

    let mut codegen = MipsCodeGen::new(options);
    info!("generating code with the {} backend for {}", codegen.name(), codegen.target());
    let assembly = codegen.generate(&analysis.program, &analysis.bindings, &analysis.types)?;
    for summary in codegen.summaries() {
        debug!(
            "{}: {} frame slot(s), {} register(s) free at exit",
            summary.name,
            summary.slots.len(),
            summary.free_registers
        );
    }

    let stats = CompilationStats {
        asm_lines: assembly.data.lines().count() + assembly.text.lines().count(),
        ..stats_for(&analysis.program, source)
    };
    Ok(Compilation { assembly, stats })
}

pub fn stats_for(program: &Program, source: &str) -> CompilationStats {
    CompilationStats {
        function_count: program.funcs.iter().filter(|f| f.body.is_some()).count(),
        global_count: program.globals.len(),
        struct_count: program.structs.len(),
        loc: source.lines().count(),
        asm_lines: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn compile(source: &str) -> Result<Compilation, CompileFailure> {
        compile_source(source, &CompilerOptions::default())
    }

    fn kinds(failure: &CompileFailure) -> Vec<ErrorKind> {
        failure.errors.iter().map(Error::kind).collect()
    }

    #[test]
    fn test_compiles_main() {
        let compilation = compile("int main(){ int x; x = 1 + 2; print_i(x); return 0; }").unwrap();
        let asm = compilation.assembly.to_string();

        assert!(asm.starts_with(".data\n.align 2\n.text\n"));
        assert!(asm.contains("main:\n"));
        assert!(asm.contains("add $t0, $t0, $t1"));
        assert!(asm.contains("sw $t0, 0($fp)"));
        assert!(asm.contains("jal print_i"));
        assert!(asm.contains("li $v0, 1\n    syscall"));
        assert_eq!(compilation.stats.function_count, 1);
    }

    #[test]
    fn test_duplicate_function() {
        let failure = compile("void f(){} void f(){}").unwrap_err();
        assert_eq!(kinds(&failure), vec![ErrorKind::DuplicateDeclaration]);
    }

    #[test]
    fn test_type_error_stops_codegen() {
        let failure = compile("int g(){ return \"a\"; }").unwrap_err();
        assert_eq!(kinds(&failure), vec![ErrorKind::TypeError]);
    }

    #[test]
    fn test_errors_accumulate() {
        let failure = compile("void f() { a = 1; b = 2; g(); }").unwrap_err();
        assert_eq!(failure.errors.len(), 3);
        assert_eq!(failure.to_string(), "compilation failed with 3 error(s)");
    }

    #[test]
    fn test_syntax_error() {
        let failure = compile("int main( { }").unwrap_err();
        assert_eq!(kinds(&failure), vec![ErrorKind::Syntax]);
    }

    #[test]
    fn test_backend_error_is_fatal() {
        let failure = compile("struct p { int x; }; struct p s; void main() { int i; i = s.x; }").unwrap_err();
        assert_eq!(kinds(&failure), vec![ErrorKind::Backend]);
    }

    #[test]
    fn test_check_source_keeps_runtime() {
        let analysis = check_source("void main() { print_c(read_c()); }").unwrap();
        assert_eq!(analysis.program.funcs.len(), 6);
        assert_eq!(stats_for(&analysis.program, "x\ny").loc, 2);
    }

    #[test]
    fn test_larger_program() {
        let source = r#"
            #include "minic-stdlib.h"
            struct node { int value; struct node* next; };
            int counter;
            char name[8];

            int fact(int n) {
                if (n <= 1) return 1;
                return n * fact(n - 1);
            }

            void fill(int xs[4]) {
                int i;
                i = 0;
                while (i < 4) {
                    xs[i] = fact(i);
                    i = i + 1;
                }
            }

            int main() {
                int data[4];
                int i;
                char c;
                fill(data);
                i = 0;
                while (i < 4) {
                    print_i(data[i]);
                    print_c('\n');
                    i = i + 1;
                }
                c = read_c();
                counter = (int) c + read_i();
                print_s((char*) "done\n");
                return 0;
            }
        "#;
        let compilation = compile(source).unwrap();
        let text = &compilation.assembly.text;

        assert!(text.contains("jal fact"));
        assert!(text.contains("jal fill"));
        assert!(text.contains("bgt $t0, $t1, else_0"));
        assert!(compilation.assembly.data.contains("name: .space 32"));
        assert!(compilation.assembly.data.contains("str_label_0: .asciiz \"done\\n\""));
        assert_eq!(compilation.stats.function_count, 3);
        assert_eq!(compilation.stats.struct_count, 1);
    }
}
