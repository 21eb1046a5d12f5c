//! Chained symbol table.
//!
//! Scopes form a stack: index 0 is the root scope and the last entry is the
//! innermost one. Lookups and updates walk from the innermost scope outwards;
//! inserts only ever touch the innermost scope. Control-flow constructs push a
//! scope on entry and pop it on exit, so nothing declared in a body survives it.

use std::collections::HashMap;

use udil_syntax::ast::TypeTag;

use crate::error::ScopeError;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub ty: TypeTag,
    pub value: Value,
}

/// What [`SymbolTable::delete`] removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delete {
    /// The nearest binding with this name
    Name(String),
    /// Every binding in every scope of the chain
    All,
}

#[derive(Debug, Clone, Default)]
struct Scope {
    vars: HashMap<String, Binding>,
}

#[derive(Debug, Clone)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    /// Number of scopes in the chain, root included.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Drops the innermost scope. The root scope is never dropped.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    fn innermost(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    pub fn insert(&mut self, name: &str, ty: TypeTag, value: Value) -> Result<(), ScopeError> {
        let scope = self.innermost();
        if scope.vars.contains_key(name) {
            return Err(ScopeError::AlreadyDeclared(name.to_string()));
        }
        scope.vars.insert(name.to_string(), Binding { ty, value });
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|s| s.vars.get(name))
    }

    /// Replaces the value of the nearest binding named `name`. The tag must
    /// match the binding's tag exactly.
    pub fn update(&mut self, name: &str, ty: TypeTag, value: Value) -> Result<(), ScopeError> {
        let binding = self
            .scopes
            .iter_mut()
            .rev()
            .find_map(|s| s.vars.get_mut(name))
            .ok_or_else(|| ScopeError::Undefined(name.to_string()))?;
        if binding.ty != ty {
            return Err(ScopeError::TypeMismatch {
                name: name.to_string(),
                expected: binding.ty,
                found: ty,
            });
        }
        binding.value = value;
        Ok(())
    }

    /// Returns whether anything was removed.
    pub fn delete(&mut self, target: &Delete) -> bool {
        match target {
            Delete::Name(name) => self
                .scopes
                .iter_mut()
                .rev()
                .find_map(|s| s.vars.remove(name))
                .is_some(),
            Delete::All => {
                let mut removed = false;
                for scope in &mut self.scopes {
                    removed |= !scope.vars.is_empty();
                    scope.vars.clear();
                }
                removed
            }
        }
    }

    /// Bindings of the root scope, sorted by name.
    pub fn root_bindings(&self) -> Vec<(String, Binding)> {
        let mut v: Vec<(String, Binding)> = self.scopes[0]
            .vars
            .iter()
            .map(|(k, b)| (k.clone(), b.clone()))
            .collect();
        v.sort_by(|a, b| a.0.cmp(&b.0));
        v
    }

    /// Every binding visible from the innermost scope, sorted by name.
    pub fn visible_bindings(&self) -> Vec<(String, Binding)> {
        let mut seen: HashMap<&str, &Binding> = HashMap::new();
        for scope in self.scopes.iter().rev() {
            for (k, b) in &scope.vars {
                seen.entry(k.as_str()).or_insert(b);
            }
        }
        let mut v: Vec<(String, Binding)> = seen
            .into_iter()
            .map(|(k, b)| (k.to_string(), b.clone()))
            .collect();
        v.sort_by(|a, b| a.0.cmp(&b.0));
        v
    }
}
