//! Per-class lowering: constructor protocol (base chain, then field
//! initialisers, then the user's own body) and method bodies.

use crate::ast::{ClassDecl, ConstructorDecl, Expr, Member, MethodBody, MethodDecl};
use crate::classtable::ClassTable;
use crate::codegen::expr::emit_expr;
use crate::codegen::stmt::emit_block;
use crate::codegen::{push_default_value, ClassDescriptor, FieldDescriptor, Instr, LabelGen, MethodDescriptor};
use crate::context::BuildContext;

pub fn emit_class(class: &ClassDecl, table: &ClassTable) -> ClassDescriptor {
    let info = table.get(&class.name).expect("classes are registered before emission");
    let fields = info
        .fields
        .iter()
        .map(|f| FieldDescriptor {
            name: f.name.clone(),
            ty: f.ty.clone(),
        })
        .collect();

    let mut constructors: Vec<MethodDescriptor> = class
        .members
        .iter()
        .filter_map(|m| match m {
            Member::Constructor(ctor) => Some(emit_constructor(class, ctor, table)),
            _ => None,
        })
        .collect();
    if constructors.is_empty() {
        constructors.push(emit_implicit_constructor(class, table));
    }

    let methods = class
        .members
        .iter()
        .filter_map(|m| match m {
            Member::Method(method) => emit_method(class, method, table),
            _ => None,
        })
        .collect();

    ClassDescriptor {
        name: class.name.clone(),
        base: class.base.clone(),
        fields,
        constructors,
        methods,
    }
}

fn emit_constructor(class: &ClassDecl, ctor: &ConstructorDecl, table: &ClassTable) -> MethodDescriptor {
    let mut ctx = BuildContext::new(table, class.name.clone());
    for (i, param) in ctor.params.iter().enumerate() {
        ctx.bind_arg(&param.name, i + 1, param.type_name.clone());
    }
    let mut labels = LabelGen::new();
    let mut code = Vec::new();
    emit_constructor_prologue(class, &mut ctx, &mut labels, &mut code, table);
    emit_block(&ctor.body, &mut ctx, &mut labels, &mut code);
    code.push(Instr::Ret);

    MethodDescriptor {
        name: "this".to_string(),
        param_types: ctor.params.iter().map(|p| p.type_name.clone()).collect(),
        return_type: None,
        local_count: ctx.local_count(),
        code,
    }
}

/// A class that declares no constructor of its own still gets one (chains
/// to the base, runs its own field initialisers, empty user body).
fn emit_implicit_constructor(class: &ClassDecl, table: &ClassTable) -> MethodDescriptor {
    let mut ctx = BuildContext::new(table, class.name.clone());
    let mut labels = LabelGen::new();
    let mut code = Vec::new();
    emit_constructor_prologue(class, &mut ctx, &mut labels, &mut code, table);
    code.push(Instr::Ret);
    MethodDescriptor {
        name: "this".to_string(),
        param_types: Vec::new(),
        return_type: None,
        local_count: ctx.local_count(),
        code,
    }
}

/// Emits, in order: the implicit zero-arg base-constructor chain (when the
/// base is a user class with one), then this class's own field initialisers
/// in source order.
fn emit_constructor_prologue(
    class: &ClassDecl,
    ctx: &mut BuildContext,
    labels: &mut LabelGen,
    code: &mut Vec<Instr>,
    table: &ClassTable,
) {
    if let Some(base) = &class.base {
        let base_is_user_class = table.get(base).map(|b| !b.builtin).unwrap_or(false);
        if base_is_user_class && table.find_constructor(base, &[]).is_some() {
            code.push(Instr::LoadArg(0));
            code.push(Instr::CallCtor {
                class: base.clone(),
                arg_count: 0,
            });
        }
    }

    let own_fields = &table.get(&class.name).expect("registered").fields;
    let all_fields = table.all_fields(&class.name);
    for field in own_fields {
        let index = all_fields
            .iter()
            .position(|f| f.name == field.name)
            .expect("own field is present in all_fields");
        code.push(Instr::LoadArg(0));
        match find_field_init(class, &field.name) {
            Some(init) => {
                emit_expr(init, ctx, labels, code);
            }
            None => push_default_value(&field.ty, code),
        }
        code.push(Instr::StoreField(index));
    }
}

fn find_field_init<'a>(class: &'a ClassDecl, field_name: &str) -> Option<&'a Expr> {
    class.members.iter().find_map(|m| match m {
        Member::Field(f) if f.name == field_name => f.init.as_ref(),
        _ => None,
    })
}

fn emit_method(class: &ClassDecl, method: &MethodDecl, table: &ClassTable) -> Option<MethodDescriptor> {
    let MethodBody::Block(_) | MethodBody::Arrow(_) = &method.body else {
        return None;
    };
    let mut ctx = BuildContext::new(table, class.name.clone());
    for (i, param) in method.params.iter().enumerate() {
        ctx.bind_arg(&param.name, i + 1, param.type_name.clone());
    }
    let mut labels = LabelGen::new();
    let mut code = Vec::new();
    match &method.body {
        MethodBody::Block(block) => {
            emit_block(block, &mut ctx, &mut labels, &mut code);
            if method.return_type.is_none() {
                code.push(Instr::Ret);
            }
        }
        MethodBody::Arrow(expr) => {
            emit_expr(expr, &mut ctx, &mut labels, &mut code);
            code.push(Instr::Ret);
        }
        MethodBody::Forward => unreachable!("filtered out above"),
    }

    Some(MethodDescriptor {
        name: method.name.clone(),
        param_types: method.params.iter().map(|p| p.type_name.clone()).collect(),
        return_type: method.return_type.clone(),
        local_count: ctx.local_count(),
        code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::check::collect_members;
    use crate::parser::parse;

    fn table_for(src: &str) -> ClassTable {
        let program = parse(src).unwrap();
        let mut table = ClassTable::register(&program).unwrap();
        table.validate_inheritance().unwrap();
        collect_members(&program, &mut table).unwrap();
        table
    }

    #[test]
    fn class_with_no_constructor_gets_an_implicit_one() {
        let src = "class C is var x: Integer end";
        let program = parse(src).unwrap();
        let table = table_for(src);
        let descriptor = emit_class(&program.classes[0], &table);
        assert_eq!(descriptor.constructors.len(), 1);
        assert!(descriptor.constructors[0].code.iter().any(|i| matches!(i, Instr::StoreField(_))));
    }

    #[test]
    fn derived_constructor_chains_to_base() {
        let src = "class A is this() is end end class B extends A is this() is end end";
        let program = parse(src).unwrap();
        let table = table_for(src);
        let descriptor = emit_class(&program.classes[1], &table);
        assert!(descriptor.constructors[0]
            .code
            .iter()
            .any(|i| matches!(i, Instr::CallCtor { class, .. } if class == "A")));
    }

    #[test]
    fn forward_method_produces_no_descriptor() {
        let src = "class C is method f(): Integer method f(): Integer is return 1 end end";
        let program = parse(src).unwrap();
        let table = table_for(src);
        let descriptor = emit_class(&program.classes[0], &table);
        assert_eq!(descriptor.methods.len(), 1);
    }
}
