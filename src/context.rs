//! Build context: per-method name resolution used by the IL emitter. Shares
//! the `ClassTable` with the analyzer so field layout, overload resolution,
//! and inheritance are derived exactly once.

use crate::classtable::{ClassTable, CtorSig, FieldInfo, MethodSig};
use crate::types::TypeName;
use std::collections::HashMap;

/// Where a resolved name actually lives in the emitted frame: `this` and
/// declared parameters are `Arg`s (`this` is always arg 0), block locals get
/// their own monotonically increasing slot, and fields are addressed by
/// position in the class's full (inherited + own) field list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Arg(usize),
    Local(usize),
    Field(usize),
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub kind: BindingKind,
    pub ty: TypeName,
}

/// One method or constructor body's worth of name resolution. Locals never
/// reuse a slot even after their scope exits — the stack machine's frame is
/// sized to the method's peak local count, not reused, to keep the flat
/// `LoadLocal`/`StoreLocal` addressing simple.
pub struct BuildContext<'a> {
    table: &'a ClassTable,
    class_name: String,
    scopes: Vec<HashMap<String, Binding>>,
    next_local: usize,
}

impl<'a> BuildContext<'a> {
    pub fn new(table: &'a ClassTable, class_name: impl Into<String>) -> Self {
        BuildContext {
            table,
            class_name: class_name.into(),
            scopes: vec![HashMap::new()],
            next_local: 0,
        }
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn exit_scope(&mut self) {
        self.scopes.pop();
        debug_assert!(!self.scopes.is_empty());
    }

    /// `index` is 1-based among declared parameters; arg 0 is always `this`.
    pub fn bind_arg(&mut self, name: &str, index: usize, ty: TypeName) {
        self.scopes
            .last_mut()
            .expect("at least one scope")
            .insert(name.to_string(), Binding { kind: BindingKind::Arg(index), ty });
    }

    pub fn bind_local(&mut self, name: &str, ty: TypeName) -> usize {
        let slot = self.next_local;
        self.next_local += 1;
        self.scopes
            .last_mut()
            .expect("at least one scope")
            .insert(name.to_string(), Binding { kind: BindingKind::Local(slot), ty });
        slot
    }

    /// Resolves `name` against the current scope stack, then `this`, then
    /// the class's (inherited + own) fields. Panics if nothing matches —
    /// the check pass already guarantees every name the emitter sees here
    /// resolved to *something* during analysis.
    pub fn resolve(&self, name: &str) -> Binding {
        for scope in self.scopes.iter().rev() {
            if let Some(binding) = scope.get(name) {
                return binding.clone();
            }
        }
        if name == "this" {
            return Binding {
                kind: BindingKind::Arg(0),
                ty: TypeName::simple(&self.class_name),
            };
        }
        let fields = self.table.all_fields(&self.class_name);
        let index = fields
            .iter()
            .position(|f| f.name == name)
            .unwrap_or_else(|| panic!("'{name}' did not resolve to a local, arg, or field of '{}'", self.class_name));
        Binding {
            kind: BindingKind::Field(index),
            ty: fields[index].ty.clone(),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn local_count(&self) -> usize {
        self.next_local
    }

    pub fn resolve_type(&self, ty: &TypeName) -> TypeName {
        ty.clone()
    }

    pub fn find_field(&self, class: &str, name: &str) -> Option<&FieldInfo> {
        self.table.find_field(class, name)
    }

    pub fn find_method(&self, owner: &str, name: &str, arg_types: &[TypeName]) -> Option<&MethodSig> {
        self.table.find_method(owner, name, arg_types)
    }

    pub fn find_constructor(&self, class: &str, arg_types: &[TypeName]) -> Option<&CtorSig> {
        self.table.find_constructor(class, arg_types)
    }

    pub fn table(&self) -> &ClassTable {
        self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Program;

    fn table() -> ClassTable {
        ClassTable::register(&Program::new()).unwrap()
    }

    #[test]
    fn this_resolves_to_arg_zero() {
        let table = table();
        let ctx = BuildContext::new(&table, "M");
        let binding = ctx.resolve("this");
        assert_eq!(binding.kind, BindingKind::Arg(0));
    }

    #[test]
    fn locals_get_increasing_slots() {
        let table = table();
        let mut ctx = BuildContext::new(&table, "M");
        let a = ctx.bind_local("a", TypeName::simple("Integer"));
        let b = ctx.bind_local("b", TypeName::simple("Integer"));
        assert_eq!(a, 0);
        assert_eq!(b, 1);
    }

    #[test]
    fn nested_scope_shadows_and_restores() {
        let table = table();
        let mut ctx = BuildContext::new(&table, "M");
        ctx.bind_local("x", TypeName::simple("Integer"));
        ctx.enter_scope();
        ctx.bind_local("x", TypeName::simple("Real"));
        assert_eq!(ctx.resolve("x").ty.canonical(), "Real");
        ctx.exit_scope();
        assert_eq!(ctx.resolve("x").ty.canonical(), "Integer");
    }
}
