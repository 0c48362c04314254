//! Tree-structured lexical scopes used by both the type checker and the
//! semantic analyzer.
//!
//! Each [`SymbolTable`] owns a reference-counted pointer to its parent, so a
//! whole chain of scopes can be kept alive as long as any descendant scope
//! is still reachable — `Rc<RefCell<_>>` frames, one per node instead of one
//! stack per analysis.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct VariableSymbol {
    pub name: String,
    pub type_name: String,
    pub is_mutable: bool,
}

impl VariableSymbol {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            is_mutable: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSymbol {
    pub name: String,
    pub return_type: String,
    pub parameters: Vec<VariableSymbol>,
    pub is_builtin: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Variable(VariableSymbol),
    Function(FunctionSymbol),
}

impl Symbol {
    pub fn name(&self) -> &str {
        match self {
            Symbol::Variable(v) => &v.name,
            Symbol::Function(f) => &f.name,
        }
    }
}

struct Node {
    name: String,
    symbols: HashMap<String, Symbol>,
    parent: Option<SymbolTable>,
}

/// A single lexical scope. Cheap to clone — clones share the same
/// underlying node, so a caller can stash a copy of the current scope
/// before descending and hand it back afterwards without walking anything.
#[derive(Clone)]
pub struct SymbolTable(Rc<RefCell<Node>>);

impl SymbolTable {
    /// Creates a fresh root scope with no parent.
    pub fn new_root(name: impl Into<String>) -> Self {
        SymbolTable(Rc::new(RefCell::new(Node {
            name: name.into(),
            symbols: HashMap::new(),
            parent: None,
        })))
    }

    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    /// Defines `symbol` in this scope, silently replacing any existing
    /// local binding of the same name. Callers that need redeclaration to
    /// be an error check `contains_local` first.
    pub fn define(&self, symbol: Symbol) {
        let name = symbol.name().to_string();
        self.0.borrow_mut().symbols.insert(name, symbol);
    }

    /// Resolves `name`, walking parent scopes outward until the first
    /// match or the root.
    pub fn resolve(&self, name: &str) -> Option<Symbol> {
        let node = self.0.borrow();
        if let Some(sym) = node.symbols.get(name) {
            return Some(sym.clone());
        }
        node.parent.as_ref().and_then(|parent| parent.resolve(name))
    }

    /// Resolves `name` in this scope only, without walking parents.
    pub fn resolve_local(&self, name: &str) -> Option<Symbol> {
        self.0.borrow().symbols.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.0.borrow().symbols.contains_key(name)
    }

    /// Creates a new child scope whose parent pointer is `self`. The
    /// parent pointer is fixed for the child's whole lifetime.
    pub fn create_child_scope(&self, label: impl Into<String>) -> SymbolTable {
        SymbolTable(Rc::new(RefCell::new(Node {
            name: label.into(),
            symbols: HashMap::new(),
            parent: Some(self.clone()),
        })))
    }
}

/// Guarded descent into a child scope with guaranteed restoration of the
/// parent on every exit path, replacing bare caller-managed save/restore
/// pairs.
///
/// `ScopeGuard` swaps `*current` to a fresh child scope on construction and
/// swaps it back to the saved parent on drop, including on an early return
/// or a propagated `?`. While a guard is alive it holds the only reference
/// to the scope slot it guards; callers operate on the guard itself
/// (`Deref`/`DerefMut` to [`SymbolTable`]) rather than the original
/// variable.
pub struct ScopeGuard<'a> {
    current: &'a mut SymbolTable,
    saved: SymbolTable,
}

impl<'a> ScopeGuard<'a> {
    pub fn enter(current: &'a mut SymbolTable, label: impl Into<String>) -> Self {
        let saved = current.clone();
        let child = saved.create_child_scope(label);
        *current = child;
        ScopeGuard { current, saved }
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        *self.current = self.saved.clone();
    }
}

impl std::ops::Deref for ScopeGuard<'_> {
    type Target = SymbolTable;

    fn deref(&self) -> &SymbolTable {
        self.current
    }
}

impl std::ops::DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut SymbolTable {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_and_resolve_local() {
        let table = SymbolTable::new_root("root");
        table.define(Symbol::Variable(VariableSymbol::new("x", "Int")));
        assert!(table.contains_local("x"));
        assert_eq!(table.resolve_local("x").unwrap().name(), "x");
    }

    #[test]
    fn resolve_walks_parents_but_resolve_local_does_not() {
        let parent = SymbolTable::new_root("root");
        parent.define(Symbol::Variable(VariableSymbol::new("outer", "Int")));
        let child = parent.create_child_scope("inner");

        assert!(child.contains("outer"));
        assert!(!child.contains_local("outer"));
        assert!(child.resolve_local("outer").is_none());
    }

    #[test]
    fn define_silently_replaces_existing_local_binding() {
        let table = SymbolTable::new_root("root");
        table.define(Symbol::Variable(VariableSymbol::new("x", "Int")));
        table.define(Symbol::Variable(VariableSymbol::new("x", "String")));
        match table.resolve_local("x").unwrap() {
            Symbol::Variable(v) => assert_eq!(v.type_name, "String"),
            other => panic!("expected a variable symbol, got {other:?}"),
        }
    }

    #[test]
    fn child_does_not_leak_into_parent() {
        let parent = SymbolTable::new_root("root");
        let child = parent.create_child_scope("inner");
        child.define(Symbol::Variable(VariableSymbol::new("y", "Int")));
        assert!(!parent.contains("y"));
    }

    #[test]
    fn scope_guard_restores_parent_on_drop() {
        let mut current = SymbolTable::new_root("root");
        current.define(Symbol::Variable(VariableSymbol::new("outer", "Int")));

        {
            let guard = ScopeGuard::enter(&mut current, "block");
            guard.define(Symbol::Variable(VariableSymbol::new("inner", "Int")));
            assert!(guard.contains("inner"));
            assert!(guard.contains("outer"));
        }

        assert!(!current.contains_local("inner"));
        assert!(current.contains_local("outer"));
    }

    #[test]
    fn scope_guard_restores_even_on_early_return() {
        fn helper(current: &mut SymbolTable) -> bool {
            let guard = ScopeGuard::enter(current, "block");
            guard.define(Symbol::Variable(VariableSymbol::new("temp", "Int")));
            return true;
        }

        let mut current = SymbolTable::new_root("root");
        assert!(helper(&mut current));
        assert!(!current.contains_local("temp"));
    }
}
