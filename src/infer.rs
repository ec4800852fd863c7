//! Type inference shared between the semantic analyzer and the IL emitter:
//! the analyzer uses it to validate expressions, the emitter uses the very
//! same rules to pick opcodes.

use crate::ast::Expr;
use crate::classtable::ClassTable;
use crate::types::TypeName;
use std::collections::HashMap;

/// Everything `infer_type` needs to resolve a bare identifier: the locals/
/// parameters currently in scope, plus which class `this` refers to (field
/// lookup falls back to the class table).
pub struct Env<'a> {
    pub current_class: &'a str,
    pub bindings: HashMap<String, TypeName>,
}

impl<'a> Env<'a> {
    pub fn new(current_class: &'a str) -> Self {
        Env {
            current_class,
            bindings: HashMap::new(),
        }
    }

    pub fn bind(&mut self, name: impl Into<String>, ty: TypeName) {
        self.bindings.insert(name.into(), ty);
    }

    pub fn lookup(&self, table: &ClassTable, name: &str) -> Option<TypeName> {
        if let Some(ty) = self.bindings.get(name) {
            return Some(ty.clone());
        }
        table.find_field(self.current_class, name).map(|f| f.ty.clone())
    }
}

pub fn object_type() -> TypeName {
    TypeName::simple("Object")
}

/// Infer the static type of `expr`. Unresolvable expressions fall back to
/// `Object` — the analyzer's check pass is what turns an actually-invalid
/// access into a diagnostic; inference itself never fails.
pub fn infer_type(expr: &Expr, table: &ClassTable, env: &Env) -> TypeName {
    match expr {
        Expr::IntLit(_) => TypeName::simple("Integer"),
        Expr::RealLit(_) => TypeName::simple("Real"),
        Expr::BoolLit(_) => TypeName::simple("Boolean"),
        Expr::StringLit(_) => TypeName::simple("String"),
        Expr::This => TypeName::simple(env.current_class),
        Expr::Ident(name) => env.lookup(table, name).unwrap_or_else(object_type),
        Expr::New { class_name, .. } => class_name.clone(),
        Expr::MemberAccess { target, member } => {
            let target_ty = infer_type(target, table, env);
            member_access_type(&target_ty, member, &[], table)
        }
        Expr::Call { callee, args } => {
            let arg_types: Vec<TypeName> = args.iter().map(|a| infer_type(a, table, env)).collect();
            match &**callee {
                Expr::MemberAccess { target, member } => {
                    let target_ty = infer_type(target, table, env);
                    member_access_type(&target_ty, member, &arg_types, table)
                }
                _ => object_type(),
            }
        }
    }
}

/// Type of `target.member(args)` (or `target.member` when `args` is empty
/// and it's a property, not a call — the two share a return-type table).
pub fn member_access_type(target_ty: &TypeName, member: &str, args: &[TypeName], table: &ClassTable) -> TypeName {
    match target_ty.head.as_str() {
        "Integer" => integer_method_return(member, args),
        "Real" => real_method_return(member, args),
        "Boolean" => boolean_method_return(member),
        _ if target_ty.is_array() => array_method_return(target_ty, member),
        _ if target_ty.is_list() => list_method_return(target_ty, member),
        _ => {
            if let Some(sig) = table.find_method(&target_ty.head, member, args) {
                sig.return_type.clone().unwrap_or_else(|| TypeName::simple("void"))
            } else if let Some(field) = table.find_field(&target_ty.head, member) {
                field.ty.clone()
            } else {
                object_type()
            }
        }
    }
}

fn promote(target_is_real: bool, arg: Option<&TypeName>) -> TypeName {
    let is_real = target_is_real || arg.map(|a| a.head == "Real").unwrap_or(false);
    TypeName::simple(if is_real { "Real" } else { "Integer" })
}

fn integer_method_return(member: &str, args: &[TypeName]) -> TypeName {
    match member {
        "Plus" | "Minus" | "Mult" | "Div" | "Rem" => promote(false, args.first()),
        "Less" | "Greater" | "LessEqual" | "GreaterEqual" | "Equal" => TypeName::simple("Boolean"),
        "UnaryMinus" => TypeName::simple("Integer"),
        "toReal" => TypeName::simple("Real"),
        "toBoolean" => TypeName::simple("Boolean"),
        _ => object_type(),
    }
}

fn real_method_return(member: &str, args: &[TypeName]) -> TypeName {
    match member {
        "Plus" | "Minus" | "Mult" | "Div" => promote(true, args.first()),
        "Less" | "Greater" | "LessEqual" | "GreaterEqual" | "Equal" => TypeName::simple("Boolean"),
        "UnaryMinus" => TypeName::simple("Real"),
        "toInteger" => TypeName::simple("Integer"),
        _ => object_type(),
    }
}

fn boolean_method_return(member: &str) -> TypeName {
    match member {
        "And" | "Or" | "Xor" | "Not" => TypeName::simple("Boolean"),
        "toInteger" => TypeName::simple("Integer"),
        _ => object_type(),
    }
}

fn array_method_return(target_ty: &TypeName, member: &str) -> TypeName {
    match member {
        "get" => target_ty.element_type().cloned().unwrap_or_else(object_type),
        "set" => TypeName::simple("void"),
        "Length" => TypeName::simple("Integer"),
        _ => object_type(),
    }
}

fn list_method_return(target_ty: &TypeName, member: &str) -> TypeName {
    match member {
        "append" | "tail" => target_ty.clone(),
        "head" | "get" => target_ty.element_type().cloned().unwrap_or_else(object_type),
        "Length" => TypeName::simple("Integer"),
        _ => object_type(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Program;

    fn empty_table() -> ClassTable {
        ClassTable::register(&Program::new()).unwrap()
    }

    #[test]
    fn integer_literal_infers_integer() {
        let table = empty_table();
        let env = Env::new("M");
        assert_eq!(infer_type(&Expr::IntLit(1), &table, &env).canonical(), "Integer");
    }

    #[test]
    fn integer_comparison_infers_boolean() {
        let table = empty_table();
        let env = Env::new("M");
        let expr = Expr::Call {
            callee: Box::new(Expr::MemberAccess {
                target: Box::new(Expr::IntLit(1)),
                member: "Less".into(),
            }),
            args: vec![Expr::IntLit(2)],
        };
        assert_eq!(infer_type(&expr, &table, &env).canonical(), "Boolean");
    }

    #[test]
    fn integer_plus_real_promotes_to_real() {
        let table = empty_table();
        let env = Env::new("M");
        let expr = Expr::Call {
            callee: Box::new(Expr::MemberAccess {
                target: Box::new(Expr::IntLit(1)),
                member: "Plus".into(),
            }),
            args: vec![Expr::RealLit(2.0)],
        };
        assert_eq!(infer_type(&expr, &table, &env).canonical(), "Real");
    }

    #[test]
    fn array_get_infers_element_type() {
        let table = empty_table();
        let env = Env::new("M");
        let array_ty = TypeName::generic("Array", vec![TypeName::simple("Integer")]);
        let expr = Expr::Call {
            callee: Box::new(Expr::MemberAccess {
                target: Box::new(Expr::Ident("xs".into())),
                member: "get".into(),
            }),
            args: vec![Expr::IntLit(0)],
        };
        let mut env2 = Env::new("M");
        env2.bind("xs", array_ty);
        let _ = env;
        assert_eq!(infer_type(&expr, &table, &env2).canonical(), "Integer");
    }
}
