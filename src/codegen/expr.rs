//! Expression lowering: pushes exactly the operand instructions to leave one
//! value on the stack, and returns that value's static type so the caller
//! (itself, recursively, or a statement emitter) can pick the right opcode.

use crate::ast::Expr;
use crate::codegen::{push_default_value, Const, Instr, LabelGen};
use crate::context::{BindingKind, BuildContext};
use crate::infer::member_access_type;
use crate::types::TypeName;

pub fn emit_expr(expr: &Expr, ctx: &mut BuildContext, labels: &mut LabelGen, out: &mut Vec<Instr>) -> TypeName {
    match expr {
        Expr::IntLit(n) => {
            out.push(Instr::LoadConst(Const::Int(*n)));
            TypeName::simple("Integer")
        }
        Expr::RealLit(n) => {
            out.push(Instr::LoadConst(Const::Real(*n)));
            TypeName::simple("Real")
        }
        Expr::BoolLit(b) => {
            out.push(Instr::LoadConst(Const::Bool(*b)));
            TypeName::simple("Boolean")
        }
        Expr::StringLit(s) => {
            out.push(Instr::LoadConst(Const::Str(s.clone())));
            TypeName::simple("String")
        }
        Expr::This => {
            out.push(Instr::LoadArg(0));
            TypeName::simple(ctx.class_name())
        }
        Expr::Ident(name) => {
            let binding = ctx.resolve(name);
            match binding.kind {
                BindingKind::Arg(i) => out.push(Instr::LoadArg(i)),
                BindingKind::Local(i) => out.push(Instr::LoadLocal(i)),
                BindingKind::Field(i) => out.push(Instr::LoadField(i)),
            }
            binding.ty
        }
        Expr::New { class_name, args } => emit_new(class_name, args, ctx, labels, out),
        Expr::MemberAccess { target, member } => {
            let target_ty = emit_expr(target, ctx, labels, out);
            emit_access(&target_ty, member, &[], ctx, labels, out)
        }
        Expr::Call { callee, args } => match &**callee {
            // `B()` with an implicit or explicit `this` receiver, where `B`
            // names a class rather than a method: the check pass accepts
            // this as construction, so lower it the same way `New` does
            // rather than evaluating `this` and dispatching virtually.
            Expr::MemberAccess { target, member }
                if matches!(target.as_ref(), Expr::This) && ctx.table().get(member).is_some_and(|info| !info.builtin) =>
            {
                emit_new(&TypeName::simple(member.clone()), args, ctx, labels, out)
            }
            Expr::MemberAccess { target, member } => {
                let target_ty = emit_expr(target, ctx, labels, out);
                emit_access(&target_ty, member, args, ctx, labels, out)
            }
            _ => unreachable!("the check pass only allows member-access call targets"),
        },
    }
}

/// Static type of `expr` without emitting anything — used to decide,
/// before the receiver's load instruction is followed by anything else,
/// whether a binary primitive op needs a numeric promotion inserted.
fn static_type(expr: &Expr, ctx: &BuildContext) -> TypeName {
    match expr {
        Expr::IntLit(_) => TypeName::simple("Integer"),
        Expr::RealLit(_) => TypeName::simple("Real"),
        Expr::BoolLit(_) => TypeName::simple("Boolean"),
        Expr::StringLit(_) => TypeName::simple("String"),
        Expr::This => TypeName::simple(ctx.class_name()),
        Expr::Ident(name) => ctx.resolve(name).ty,
        Expr::New { class_name, .. } => class_name.clone(),
        Expr::MemberAccess { target, member } => {
            let target_ty = static_type(target, ctx);
            member_access_type(&target_ty, member, &[], ctx.table())
        }
        Expr::Call { callee, args } => match &**callee {
            Expr::MemberAccess { target, member } => {
                let target_ty = static_type(target, ctx);
                let arg_types: Vec<TypeName> = args.iter().map(|a| static_type(a, ctx)).collect();
                member_access_type(&target_ty, member, &arg_types, ctx.table())
            }
            _ => TypeName::simple("Object"),
        },
    }
}

fn emit_new(class_name: &TypeName, args: &[Expr], ctx: &mut BuildContext, labels: &mut LabelGen, out: &mut Vec<Instr>) -> TypeName {
    if class_name.is_primitive() {
        // `Integer(2)` etc. wrap an already-primitive value; there is no
        // heap object or constructor behind it, so construction is just the
        // argument expression itself (Table D default with no argument).
        if args.is_empty() {
            push_default_value(class_name, out);
        } else {
            for arg in &args[..args.len() - 1] {
                emit_expr(arg, ctx, labels, out);
                out.push(Instr::Pop);
            }
            emit_expr(&args[args.len() - 1], ctx, labels, out);
        }
        return class_name.clone();
    }
    if class_name.is_array() {
        for arg in args {
            emit_expr(arg, ctx, labels, out);
        }
        out.push(Instr::NewArray {
            element: class_name.element_type().expect("is_array guarantees one arg").clone(),
        });
        return class_name.clone();
    }
    if class_name.is_list() {
        out.push(Instr::New { class: "List".to_string() });
        for arg in args {
            emit_expr(arg, ctx, labels, out);
            if class_name.element_type().is_some_and(|e| e.is_primitive()) {
                out.push(Instr::Box);
            }
            out.push(Instr::CallStatic {
                class: "List".to_string(),
                method: "append".to_string(),
                arg_count: 1,
            });
        }
        return class_name.clone();
    }
    out.push(Instr::New { class: class_name.head.clone() });
    out.push(Instr::Dup);
    for arg in args {
        emit_expr(arg, ctx, labels, out);
    }
    out.push(Instr::CallCtor {
        class: class_name.head.clone(),
        arg_count: args.len(),
    });
    class_name.clone()
}

/// Shared by bare `.member` access and `.member(args)` calls — the two
/// share a resolution order where a zero-arg method wins over a same-named
/// field. `args` is empty for a bare `MemberAccess`.
fn emit_access(
    target_ty: &TypeName,
    member: &str,
    args: &[Expr],
    ctx: &mut BuildContext,
    labels: &mut LabelGen,
    out: &mut Vec<Instr>,
) -> TypeName {
    if matches!(target_ty.head.as_str(), "Integer" | "Real" | "Boolean") {
        if args.len() == 1 && matches!(target_ty.head.as_str(), "Integer" | "Real") {
            let arg_ty = static_type(&args[0], ctx);
            if matches!(arg_ty.head.as_str(), "Integer" | "Real") && arg_ty.head != target_ty.head {
                // Receiver is already on the stack in its original type;
                // whichever side is Integer gets converted so the call
                // dispatches against Real's form of the operation.
                if target_ty.head == "Integer" {
                    out.push(Instr::ToReal);
                }
                emit_expr(&args[0], ctx, labels, out);
                if arg_ty.head == "Integer" {
                    out.push(Instr::ToReal);
                }
                out.push(Instr::CallStatic {
                    class: "Real".to_string(),
                    method: member.to_string(),
                    arg_count: 1,
                });
                return member_access_type(target_ty, member, std::slice::from_ref(&arg_ty), ctx.table());
            }
        }
        let arg_types: Vec<TypeName> = args.iter().map(|a| emit_expr(a, ctx, labels, out)).collect();
        out.push(Instr::CallStatic {
            class: target_ty.head.clone(),
            method: member.to_string(),
            arg_count: arg_types.len(),
        });
        return member_access_type(target_ty, member, &arg_types, ctx.table());
    }

    if target_ty.is_array() || target_ty.is_list() {
        return emit_container_access(target_ty, member, args, ctx, labels, out);
    }

    if member == "print" {
        // The receiver is already on the stack (pushed by the caller before
        // `emit_access` ran) but `print` is receiver-ignorant, so discard it
        // before pushing the one value the intrinsic actually prints.
        out.push(Instr::Pop);
        for arg in args {
            emit_expr(arg, ctx, labels, out);
        }
        out.push(Instr::PrintIntrinsic);
        return TypeName::simple("void");
    }

    if args.is_empty() {
        if let Some(sig) = ctx.find_method(&target_ty.head, member, &[]).cloned() {
            out.push(Instr::CallVirt {
                class: target_ty.head.clone(),
                method: member.to_string(),
                arg_count: 0,
            });
            return sig.return_type.unwrap_or_else(|| TypeName::simple("void"));
        }
        let fields = ctx.table().all_fields(&target_ty.head);
        let index = fields
            .iter()
            .position(|f| f.name == member)
            .expect("check pass verified this resolves to a method or field");
        out.push(Instr::LoadField(index));
        return fields[index].ty.clone();
    }

    let arg_types: Vec<TypeName> = args.iter().map(|a| emit_expr(a, ctx, labels, out)).collect();
    out.push(Instr::CallVirt {
        class: target_ty.head.clone(),
        method: member.to_string(),
        arg_count: arg_types.len(),
    });
    let sig = ctx
        .find_method(&target_ty.head, member, &arg_types)
        .expect("check pass verified this resolves");
    sig.return_type.clone().unwrap_or_else(|| TypeName::simple("void"))
}

/// `Array[T]`/`List[T]` built-ins box a primitive element going in (`set`,
/// `append`) and unbox one coming out (`get`, `head`) — their storage is
/// type-erased, everything else passes through untouched.
fn emit_container_access(
    target_ty: &TypeName,
    member: &str,
    args: &[Expr],
    ctx: &mut BuildContext,
    labels: &mut LabelGen,
    out: &mut Vec<Instr>,
) -> TypeName {
    let element = target_ty.element_type().cloned();
    let boxed_arg_index = match member {
        "append" => Some(0),
        "set" => Some(1),
        _ => None,
    };
    let mut arg_types = Vec::with_capacity(args.len());
    for (i, arg) in args.iter().enumerate() {
        let ty = emit_expr(arg, ctx, labels, out);
        if Some(i) == boxed_arg_index && element.as_ref().is_some_and(|e| e.is_primitive()) {
            out.push(Instr::Box);
        }
        arg_types.push(ty);
    }
    out.push(Instr::CallStatic {
        class: target_ty.head.clone(),
        method: member.to_string(),
        arg_count: arg_types.len(),
    });
    let result_ty = member_access_type(target_ty, member, &arg_types, ctx.table());
    if matches!(member, "get" | "head") && element.as_ref().is_some_and(|e| e.is_primitive()) {
        out.push(Instr::Unbox(element.expect("checked above")));
    }
    result_ty
}
