//! Lexical scopes
//!
//! All scopes live in one arena and are addressed by [`ScopeId`]. Callers pass
//! the scope they are working in explicitly; the tree has no notion of a
//! "current" scope.

use std::collections::HashMap;

use crate::frontend::ast::NodeId;
use crate::utils::{Error, Result, Span};

/// Unique identifier for a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// What a name in a scope stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    /// Variable, parameter or struct field declaration
    Variable(NodeId),
    Function(NodeId),
    /// Struct tag; its fields sit in a scope of their own
    Struct,
}

#[derive(Debug)]
struct Scope {
    parent: Option<ScopeId>,
    symbols: HashMap<String, Symbol>,
}

/// Arena of scopes; index 0 is the program root
#[derive(Debug)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl ScopeTree {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                parent: None,
                symbols: HashMap::new(),
            }],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Create a scope nested in `parent`
    pub fn child(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent: Some(parent),
            symbols: HashMap::new(),
        });
        id
    }

    /// Bind `name` in `scope`. Only `scope` itself is checked for clashes;
    /// shadowing an outer binding is fine.
    pub fn declare(&mut self, scope: ScopeId, name: &str, symbol: Symbol, span: Span) -> Result<()> {
        let symbols = &mut self.scopes[scope.0].symbols;
        if symbols.contains_key(name) {
            return Err(Error::DuplicateDeclaration {
                name: name.to_string(),
                span,
            });
        }
        symbols.insert(name.to_string(), symbol);
        Ok(())
    }

    /// Look up a name, searching from `scope` outward
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Option<Symbol> {
        let mut scope_id = Some(scope);
        while let Some(id) = scope_id {
            if let Some(symbol) = self.scopes[id.0].symbols.get(name) {
                return Some(*symbol);
            }
            scope_id = self.scopes[id.0].parent;
        }
        None
    }

    /// Number of scopes created so far, root included
    pub fn len(&self) -> usize {
        self.scopes.len()
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}
