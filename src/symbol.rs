//! Lexical scopes with parent links.

use crate::types::TypeName;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Class,
    Method,
    Constructor,
    Variable,
    Parameter,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub declared_type: Option<TypeName>,
    pub used: bool,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, declared_type: Option<TypeName>) -> Self {
        Symbol {
            name: name.into(),
            kind,
            declared_type,
            used: false,
        }
    }
}

/// A single lexical scope. Scopes nest via `parent`; `SymbolTable` owns the
/// stack and is the only thing that creates/destroys them.
#[derive(Debug, Default)]
pub struct Scope {
    symbols: HashMap<String, Symbol>,
}

pub struct SymbolTable {
    stack: Vec<Scope>,
}

impl SymbolTable {
    /// A fresh table with one global scope, pre-populated with the built-in
    /// class names so `resolve` finds them without special-casing.
    pub fn new() -> Self {
        let mut table = SymbolTable { stack: vec![Scope::default()] };
        for builtin in ["Integer", "Real", "Boolean", "String", "Object", "Array", "List"] {
            table
                .define(builtin, SymbolKind::Class, None)
                .expect("builtin names are distinct");
        }
        table
    }

    pub fn enter_scope(&mut self) {
        self.stack.push(Scope::default());
    }

    pub fn exit_scope(&mut self) {
        self.stack.pop();
        debug_assert!(!self.stack.is_empty(), "popped the global scope");
    }

    /// Fails if `name` is already defined in the *current* scope (shadowing
    /// an enclosing scope is fine).
    pub fn define(
        &mut self,
        name: impl Into<String>,
        kind: SymbolKind,
        declared_type: Option<TypeName>,
    ) -> Result<(), String> {
        let name = name.into();
        let scope = self.stack.last_mut().expect("at least one scope");
        if scope.symbols.contains_key(&name) {
            return Err(format!("'{name}' is already declared in this scope"));
        }
        scope.symbols.insert(name.clone(), Symbol::new(name, kind, declared_type));
        Ok(())
    }

    /// Walk parents, first hit wins.
    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        self.stack.iter().rev().find_map(|scope| scope.symbols.get(name))
    }

    pub fn mark_used(&mut self, name: &str) {
        for scope in self.stack.iter_mut().rev() {
            if let Some(sym) = scope.symbols.get_mut(name) {
                sym.used = true;
                return;
            }
        }
    }

    /// Unused variables/parameters in the *current* (innermost) scope, for
    /// the analyzer's unused-variable warning.
    pub fn unused_in_current_scope(&self) -> Vec<&Symbol> {
        self.stack
            .last()
            .expect("at least one scope")
            .symbols
            .values()
            .filter(|s| !s.used && matches!(s.kind, SymbolKind::Variable | SymbolKind::Parameter))
            .collect()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_scope_has_builtin_classes() {
        let table = SymbolTable::new();
        assert!(table.resolve("Integer").is_some());
        assert_eq!(table.resolve("Integer").unwrap().kind, SymbolKind::Class);
    }

    #[test]
    fn redefinition_in_same_scope_fails() {
        let mut table = SymbolTable::new();
        table.define("x", SymbolKind::Variable, None).unwrap();
        assert!(table.define("x", SymbolKind::Variable, None).is_err());
    }

    #[test]
    fn shadowing_in_nested_scope_succeeds() {
        let mut table = SymbolTable::new();
        table.define("x", SymbolKind::Variable, None).unwrap();
        table.enter_scope();
        assert!(table.define("x", SymbolKind::Variable, None).is_ok());
        table.exit_scope();
    }

    #[test]
    fn resolve_walks_parent_scopes() {
        let mut table = SymbolTable::new();
        table.define("x", SymbolKind::Variable, None).unwrap();
        table.enter_scope();
        assert!(table.resolve("x").is_some());
        table.exit_scope();
    }

    #[test]
    fn exiting_a_scope_hides_its_symbols() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        table.define("y", SymbolKind::Variable, None).unwrap();
        table.exit_scope();
        assert!(table.resolve("y").is_none());
    }

    #[test]
    fn mark_used_and_unused_report() {
        let mut table = SymbolTable::new();
        table.define("a", SymbolKind::Variable, None).unwrap();
        table.define("b", SymbolKind::Variable, None).unwrap();
        table.mark_used("a");
        let unused: Vec<_> = table.unused_in_current_scope().iter().map(|s| s.name.clone()).collect();
        assert_eq!(unused, vec!["b".to_string()]);
    }
}
