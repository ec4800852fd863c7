//! The check pass: member collection, then per-body validation — name
//! resolution, built-in method shape checks, overload resolution via the
//! shared `ClassTable`, and the handful of structural rules (every
//! non-void method body returns a value, forwards get an implementation)
//! that don't fit a pure type-inference framing.

use crate::ast::{
    Block, BlockItem, ClassDecl, ConstructorDecl, Expr, FieldDecl, LocalDecl, Member, MethodBody, MethodDecl,
    Program, Statement,
};
use crate::classtable::{ClassTable, CtorSig, FieldInfo, MethodSig};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::infer::{infer_type, member_access_type, object_type, Env};
use crate::symbol::{SymbolKind, SymbolTable};
use crate::types::TypeName;
use std::collections::HashMap;

const INTEGER_METHODS: &[(&str, usize)] = &[
    ("Plus", 1),
    ("Minus", 1),
    ("Mult", 1),
    ("Div", 1),
    ("Rem", 1),
    ("Less", 1),
    ("Greater", 1),
    ("LessEqual", 1),
    ("GreaterEqual", 1),
    ("Equal", 1),
    ("UnaryMinus", 0),
    ("toReal", 0),
    ("toBoolean", 0),
];

const REAL_METHODS: &[(&str, usize)] = &[
    ("Plus", 1),
    ("Minus", 1),
    ("Mult", 1),
    ("Div", 1),
    ("Less", 1),
    ("Greater", 1),
    ("LessEqual", 1),
    ("GreaterEqual", 1),
    ("Equal", 1),
    ("UnaryMinus", 0),
    ("toInteger", 0),
];

const BOOLEAN_METHODS: &[(&str, usize)] = &[("And", 1), ("Or", 1), ("Xor", 1), ("Not", 0), ("toInteger", 0)];

const ARRAY_METHODS: &[(&str, usize)] = &[("get", 1), ("set", 2), ("Length", 0)];

const LIST_METHODS: &[(&str, usize)] = &[("append", 1), ("head", 0), ("tail", 0), ("get", 1), ("Length", 0)];

/// Third traversal: walk classes base-first so that field-type inference
/// and inherited-field checks can consult an already-complete base class.
/// Mutates `table` in place.
pub fn collect_members(program: &Program, table: &mut ClassTable) -> Result<(), String> {
    for name in topo_order(table) {
        let class = program
            .find_class(&name)
            .expect("every name in the class table came from this program");
        let base = table.get(&name).and_then(|c| c.base.clone());
        for member in &class.members {
            match member {
                Member::Field(field) => collect_field(table, &name, base.as_deref(), field)?,
                Member::Constructor(ctor) => collect_constructor(table, &name, ctor)?,
                Member::Method(method) => collect_method(table, &name, method)?,
            }
        }
        // A class with no constructor of its own still gets a zero-arg one
        // (the codegen side builds it automatically too, chaining to the
        // base and running field initialisers).
        if table.get(&name).unwrap().constructors.is_empty() {
            table.get_mut(&name).unwrap().constructors.push(CtorSig { params: Vec::new() });
        }
        finalize_forwards(table, &name)?;
    }
    Ok(())
}

fn topo_order(table: &ClassTable) -> Vec<String> {
    fn visit(name: &str, table: &ClassTable, visited: &mut std::collections::HashSet<String>, order: &mut Vec<String>) {
        if !visited.insert(name.to_string()) {
            return;
        }
        let Some(info) = table.get(name) else { return };
        if let Some(base) = info.base.clone() {
            visit(&base, table, visited, order);
        }
        // Built-ins (including the implicit `Object` base) have no source
        // member declarations to collect — only user classes get queued.
        if !info.builtin {
            order.push(name.to_string());
        }
    }
    let mut visited = std::collections::HashSet::new();
    let mut order = Vec::new();
    for name in &table.order {
        visit(name, table, &mut visited, &mut order);
    }
    order
}

fn collect_field(table: &mut ClassTable, class_name: &str, base: Option<&str>, field: &FieldDecl) -> Result<(), String> {
    if table.get(class_name).unwrap().fields.iter().any(|f| f.name == field.name) {
        return Err(format!("field '{}' is already declared in class '{class_name}'", field.name));
    }
    if let Some(base_name) = base {
        if table.find_field(base_name, &field.name).is_some() {
            return Err(format!(
                "field '{}' in class '{class_name}' hides an inherited field of the same name",
                field.name
            ));
        }
    }
    let ty = match (&field.declared_type, &field.init) {
        (Some(t), _) => t.clone(),
        (None, Some(init)) => {
            let env = Env::new(class_name);
            infer_type(init, table, &env)
        }
        (None, None) => {
            return Err(format!(
                "field '{}' in class '{class_name}' has neither a declared type nor an initialiser",
                field.name
            ))
        }
    };
    table.get_mut(class_name).unwrap().fields.push(FieldInfo {
        name: field.name.clone(),
        ty,
    });
    Ok(())
}

fn collect_constructor(table: &mut ClassTable, class_name: &str, ctor: &ConstructorDecl) -> Result<(), String> {
    let params: Vec<TypeName> = ctor.params.iter().map(|p| p.type_name.clone()).collect();
    let info = table.get_mut(class_name).unwrap();
    if info.constructors.iter().any(|c| c.params == params) {
        return Err(format!(
            "class '{class_name}' already has a constructor with these parameter types"
        ));
    }
    info.constructors.push(CtorSig { params });
    Ok(())
}

fn collect_method(table: &mut ClassTable, class_name: &str, method: &MethodDecl) -> Result<(), String> {
    let params: Vec<TypeName> = method.params.iter().map(|p| p.type_name.clone()).collect();
    let is_forward = matches!(method.body, MethodBody::Forward);
    let info = table.get_mut(class_name).unwrap();
    if let Some(existing) = info.methods.iter_mut().find(|m| m.name == method.name && m.params == params) {
        return match (existing.is_forward, is_forward) {
            (true, true) => Err(format!(
                "method '{}' in class '{class_name}' is forward-declared twice",
                method.name
            )),
            (false, false) => Err(format!(
                "method '{}' in class '{class_name}' is already defined with these parameter types",
                method.name
            )),
            _ => {
                existing.is_forward = false;
                if existing.return_type.is_none() {
                    existing.return_type = method.return_type.clone();
                }
                Ok(())
            }
        };
    }
    info.methods.push(MethodSig {
        name: method.name.clone(),
        params,
        return_type: method.return_type.clone(),
        is_forward,
    });
    Ok(())
}

fn finalize_forwards(table: &ClassTable, class_name: &str) -> Result<(), String> {
    if let Some(m) = table.get(class_name).unwrap().methods.iter().find(|m| m.is_forward) {
        return Err(format!(
            "method '{}' in class '{class_name}' is forward-declared but never implemented",
            m.name
        ));
    }
    Ok(())
}

/// Runs member collection, then validates every constructor and method
/// body. On success returns the completed class table plus whatever
/// warnings the bodies accumulated; on failure returns every diagnostic
/// found (the driver decides whether to keep going).
pub fn check(program: &Program) -> Result<(ClassTable, DiagnosticSink), Vec<Diagnostic>> {
    let mut table = ClassTable::register(program).map_err(|e| vec![Diagnostic::semantic(e)])?;
    table.validate_inheritance().map_err(|e| vec![Diagnostic::semantic(e)])?;
    collect_members(program, &mut table).map_err(|e| vec![Diagnostic::semantic(e)])?;

    let mut sink = DiagnosticSink::new();
    let mut errors = Vec::new();
    for class in &program.classes {
        check_class_body(&table, &mut sink, class, &mut errors);
    }

    if errors.is_empty() {
        Ok((table, sink))
    } else {
        Err(errors)
    }
}

fn check_class_body(table: &ClassTable, sink: &mut DiagnosticSink, class: &ClassDecl, errors: &mut Vec<Diagnostic>) {
    for member in &class.members {
        let result = match member {
            Member::Field(_) => Ok(()),
            Member::Constructor(ctor) => check_constructor_body(table, sink, &class.name, ctor),
            Member::Method(method) => check_method_body(table, sink, &class.name, method),
        };
        if let Err(message) = result {
            errors.push(Diagnostic::semantic(message));
        }
    }
}

fn check_constructor_body(
    table: &ClassTable,
    sink: &mut DiagnosticSink,
    class_name: &str,
    ctor: &ConstructorDecl,
) -> Result<(), String> {
    let mut checker = BodyChecker::new(table, sink, class_name.to_string(), None);
    for param in &ctor.params {
        checker.define(&param.name, SymbolKind::Parameter, param.type_name.clone())?;
    }
    checker.check_block(&ctor.body)
}

fn check_method_body(
    table: &ClassTable,
    sink: &mut DiagnosticSink,
    class_name: &str,
    method: &MethodDecl,
) -> Result<(), String> {
    match &method.body {
        MethodBody::Forward => Ok(()),
        MethodBody::Arrow(expr) => {
            let mut checker = BodyChecker::new(table, sink, class_name.to_string(), method.return_type.clone());
            for param in &method.params {
                checker.define(&param.name, SymbolKind::Parameter, param.type_name.clone())?;
            }
            checker.check_expr(expr)?;
            Ok(())
        }
        MethodBody::Block(block) => {
            let mut checker = BodyChecker::new(table, sink, class_name.to_string(), method.return_type.clone());
            for param in &method.params {
                checker.define(&param.name, SymbolKind::Parameter, param.type_name.clone())?;
            }
            checker.check_block(block)?;
            if method.return_type.is_some() && !contains_return_with_value(block) {
                return Err(format!(
                    "method '{}' in class '{class_name}' declares a return type but its body never returns a value",
                    method.name
                ));
            }
            Ok(())
        }
    }
}

fn contains_return_with_value(block: &Block) -> bool {
    block.statements.iter().any(statement_returns_value)
}

fn statement_returns_value(stmt: &Statement) -> bool {
    match stmt {
        Statement::Return(Some(_)) => true,
        Statement::If {
            then_branch,
            else_branch,
            ..
        } => contains_return_with_value(then_branch) || else_branch.as_ref().is_some_and(contains_return_with_value),
        Statement::While { body, .. } => contains_return_with_value(body),
        _ => false,
    }
}

/// Per-body walker: a `SymbolTable` for scoping/usage tracking plus a
/// parallel type-scope stack so `infer_type` sees locals the symbol table
/// doesn't know the type of by itself.
struct BodyChecker<'a> {
    table: &'a ClassTable,
    symbols: SymbolTable,
    types: Vec<HashMap<String, TypeName>>,
    sink: &'a mut DiagnosticSink,
    current_class: String,
    current_return_type: Option<TypeName>,
}

impl<'a> BodyChecker<'a> {
    fn new(table: &'a ClassTable, sink: &'a mut DiagnosticSink, current_class: String, current_return_type: Option<TypeName>) -> Self {
        BodyChecker {
            table,
            symbols: SymbolTable::new(),
            types: vec![HashMap::new()],
            sink,
            current_class,
            current_return_type,
        }
    }

    fn enter_scope(&mut self) {
        self.symbols.enter_scope();
        self.types.push(HashMap::new());
    }

    fn exit_scope(&mut self) {
        for sym in self.symbols.unused_in_current_scope() {
            self.sink.warn(format!("unused variable '{}'", sym.name));
        }
        self.symbols.exit_scope();
        self.types.pop();
    }

    fn define(&mut self, name: &str, kind: SymbolKind, ty: TypeName) -> Result<(), String> {
        self.symbols.define(name, kind, Some(ty.clone()))?;
        self.types.last_mut().expect("at least one scope").insert(name.to_string(), ty);
        Ok(())
    }

    fn type_of(&self, name: &str) -> TypeName {
        for scope in self.types.iter().rev() {
            if let Some(ty) = scope.get(name) {
                return ty.clone();
            }
        }
        self.table
            .find_field(&self.current_class, name)
            .map(|f| f.ty.clone())
            .unwrap_or_else(object_type)
    }

    fn env(&self) -> Env<'_> {
        let mut env = Env::new(&self.current_class);
        for scope in &self.types {
            for (name, ty) in scope {
                env.bind(name.clone(), ty.clone());
            }
        }
        env
    }

    fn check_block(&mut self, block: &Block) -> Result<(), String> {
        self.enter_scope();
        let mut result = Ok(());
        for item in &block.body {
            let step = match item {
                BlockItem::Local(local) => self.check_local(local),
                BlockItem::Statement(stmt) => self.check_statement(stmt),
            };
            if step.is_err() {
                result = step;
                break;
            }
        }
        self.exit_scope();
        result
    }

    fn check_local(&mut self, local: &LocalDecl) -> Result<(), String> {
        let ty = match (&local.declared_type, &local.init) {
            (Some(t), Some(init)) => {
                let init_ty = self.check_expr(init)?;
                if !assignment_compatible(t, &init_ty, self.table) {
                    return Err(format!(
                        "local '{}' declared as '{t}' cannot be initialised with a value of type '{init_ty}'",
                        local.name
                    ));
                }
                t.clone()
            }
            (Some(t), None) => t.clone(),
            (None, Some(init)) => self.check_expr(init)?,
            (None, None) => {
                return Err(format!(
                    "local '{}' has neither a declared type nor an initialiser",
                    local.name
                ))
            }
        };
        self.define(&local.name, SymbolKind::Variable, ty)
    }

    fn check_statement(&mut self, stmt: &Statement) -> Result<(), String> {
        match stmt {
            Statement::Assign { target, value } => {
                if self.symbols.resolve(target).is_none() && self.table.find_field(&self.current_class, target).is_none() {
                    return Err(format!("assignment to undefined name '{target}'"));
                }
                let target_ty = self.type_of(target);
                let value_ty = self.check_expr(value)?;
                if !assignment_compatible(&target_ty, &value_ty, self.table) {
                    return Err(format!(
                        "cannot assign a value of type '{value_ty}' to '{target}' declared as '{target_ty}'"
                    ));
                }
                self.symbols.mark_used(target);
                Ok(())
            }
            Statement::Expr(expr) => {
                self.check_expr(expr)?;
                Ok(())
            }
            Statement::While { condition, body } => {
                let cond_ty = self.check_expr(condition)?;
                if cond_ty.head != "Boolean" {
                    self.sink.warn(format!("while condition has inferred type '{cond_ty}', expected Boolean"));
                }
                self.check_block(body)
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let cond_ty = self.check_expr(condition)?;
                if cond_ty.head != "Boolean" {
                    self.sink.warn(format!("if condition has inferred type '{cond_ty}', expected Boolean"));
                }
                self.check_block(then_branch)?;
                if let Some(else_b) = else_branch {
                    self.check_block(else_b)?;
                }
                Ok(())
            }
            Statement::Return(value) => match (&self.current_return_type, value) {
                (None, Some(_)) => Err("a constructor or void method cannot return a value".to_string()),
                (Some(_), None) => Err("method has a declared return type but this return has no value".to_string()),
                (Some(_), Some(expr)) => {
                    self.check_expr(expr)?;
                    Ok(())
                }
                (None, None) => Ok(()),
            },
        }
    }

    fn check_expr(&mut self, expr: &Expr) -> Result<TypeName, String> {
        match expr {
            Expr::IntLit(_) => Ok(TypeName::simple("Integer")),
            Expr::RealLit(_) => Ok(TypeName::simple("Real")),
            Expr::BoolLit(_) => Ok(TypeName::simple("Boolean")),
            Expr::StringLit(_) => Ok(TypeName::simple("String")),
            Expr::This => Ok(TypeName::simple(&self.current_class)),
            Expr::Ident(name) => {
                if self.symbols.resolve(name).is_none() && self.table.find_field(&self.current_class, name).is_none() {
                    return Err(format!("undefined name '{name}'"));
                }
                self.symbols.mark_used(name);
                Ok(self.type_of(name))
            }
            Expr::New { class_name, args } => {
                let arg_types = self.check_args(args)?;
                self.check_new(class_name, &arg_types)?;
                Ok(class_name.clone())
            }
            Expr::MemberAccess { target, member } => {
                let target_ty = self.check_expr(target)?;
                self.check_member(&target_ty, member, &[])?;
                Ok(member_access_type(&target_ty, member, &[], self.table))
            }
            Expr::Call { callee, args } => {
                let arg_types = self.check_args(args)?;
                match &**callee {
                    // `B()` written inside a method, with no explicit receiver,
                    // desugars in the parser to `this.B()` regardless of whether
                    // `B` is a class or a method — if it names a class, this is
                    // construction, not a self-call, and wins over any method or
                    // field of the same name.
                    Expr::MemberAccess { target, member }
                        if matches!(target.as_ref(), Expr::This) && self.table.get(member).is_some_and(|info| !info.builtin) =>
                    {
                        let class_ty = TypeName::simple(member.clone());
                        self.check_new(&class_ty, &arg_types)?;
                        Ok(class_ty)
                    }
                    Expr::MemberAccess { target, member } => {
                        let target_ty = self.check_expr(target)?;
                        self.check_member(&target_ty, member, &arg_types)?;
                        Ok(member_access_type(&target_ty, member, &arg_types, self.table))
                    }
                    _ => Err("a call target must be a member access".to_string()),
                }
            }
        }
    }

    fn check_args(&mut self, args: &[Expr]) -> Result<Vec<TypeName>, String> {
        args.iter().map(|a| self.check_expr(a)).collect()
    }

    fn check_new(&self, class_name: &TypeName, arg_types: &[TypeName]) -> Result<(), String> {
        if class_name.is_array() || class_name.is_list() {
            return Ok(());
        }
        let info = self
            .table
            .get(&class_name.head)
            .ok_or_else(|| format!("unknown class '{}'", class_name.head))?;
        if info.builtin {
            return Ok(());
        }
        if self.table.find_constructor(&class_name.head, arg_types).is_none() {
            return Err(format!(
                "no constructor of '{}' matches the given argument types",
                class_name.head
            ));
        }
        Ok(())
    }

    fn check_member(&self, target_ty: &TypeName, member: &str, arg_types: &[TypeName]) -> Result<(), String> {
        match target_ty.head.as_str() {
            "Integer" => check_builtin_arity(member, arg_types.len(), INTEGER_METHODS),
            "Real" => check_builtin_arity(member, arg_types.len(), REAL_METHODS),
            "Boolean" => check_builtin_arity(member, arg_types.len(), BOOLEAN_METHODS),
            _ if target_ty.is_array() => {
                check_builtin_arity(member, arg_types.len(), ARRAY_METHODS)?;
                check_index_is_integer(member, arg_types)
            }
            _ if target_ty.is_list() => {
                check_builtin_arity(member, arg_types.len(), LIST_METHODS)?;
                check_index_is_integer(member, arg_types)
            }
            _ => {
                if self.table.find_method(&target_ty.head, member, arg_types).is_some() {
                    return Ok(());
                }
                if arg_types.is_empty() && self.table.find_field(&target_ty.head, member).is_some() {
                    return Ok(());
                }
                Err(format!("'{}' has no member '{member}'", target_ty.head))
            }
        }
    }
}

fn check_builtin_arity(member: &str, arity: usize, table: &[(&str, usize)]) -> Result<(), String> {
    match table.iter().find(|(name, _)| *name == member) {
        Some((_, expected)) if *expected == arity => Ok(()),
        Some((_, expected)) => Err(format!("'{member}' expects {expected} argument(s), got {arity}")),
        None => Err(format!("no such built-in method '{member}'")),
    }
}

/// `Array`/`List` `get(i)` and `set(i, v)` both take the index as their
/// first argument.
fn check_index_is_integer(member: &str, arg_types: &[TypeName]) -> Result<(), String> {
    if matches!(member, "get" | "set") {
        if let Some(index_ty) = arg_types.first() {
            if index_ty.head != "Integer" {
                return Err(format!("'{member}' requires an Integer index, got '{index_ty}'"));
            }
        }
    }
    Ok(())
}

/// Same type exactly, Integer<->Real either direction, any source into an
/// Object-typed target, or a subclass value assigned to a base-class-typed
/// target — the last clause is what keeps `var a: A := b` (where `b`'s
/// static type is a subclass of `A`) type-checking at all.
fn assignment_compatible(target: &TypeName, source: &TypeName, table: &ClassTable) -> bool {
    if target == source {
        return true;
    }
    if target.head == "Object" {
        return true;
    }
    if matches!((target.head.as_str(), source.head.as_str()), ("Integer", "Real") | ("Real", "Integer")) {
        return true;
    }
    table.is_subclass_of(&source.head, &target.head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn check_src(src: &str) -> Result<(ClassTable, DiagnosticSink), Vec<Diagnostic>> {
        let program = parse(src).unwrap();
        check(&program)
    }

    #[test]
    fn field_type_inferred_from_initialiser() {
        let (table, _) = check_src("class C is var x := Integer(1) end").unwrap();
        assert_eq!(table.find_field("C", "x").unwrap().ty.canonical(), "Integer");
    }

    #[test]
    fn duplicate_field_name_is_rejected() {
        assert!(check_src("class C is var x: Integer var x: Real end").is_err());
    }

    #[test]
    fn non_void_method_without_return_value_is_rejected() {
        let src = "class C is method m(): Integer is var y: Integer end end";
        assert!(check_src(src).is_err());
    }

    #[test]
    fn forward_method_without_implementation_is_rejected() {
        assert!(check_src("class C is method m() end").is_err());
    }

    #[test]
    fn unknown_method_on_integer_is_rejected() {
        let src = "class C is method m(): Integer is return Integer(1).Frobnicate() end end";
        assert!(check_src(src).is_err());
    }

    #[test]
    fn undefined_identifier_is_rejected() {
        let src = "class C is method m() is ghost end end";
        assert!(check_src(src).is_err());
    }

    #[test]
    fn unused_local_is_warned_not_rejected() {
        let src = "class C is method m() is var y: Integer end end";
        let (_, sink) = check_src(src).unwrap();
        assert!(sink.warnings.iter().any(|w| w.to_string().contains("unused variable 'y'")));
    }
}
