//! Statement and block lowering.

use crate::ast::{Block, BlockItem, LocalDecl, Statement};
use crate::codegen::expr::emit_expr;
use crate::codegen::{push_default_value, Instr, LabelGen};
use crate::context::{BindingKind, BuildContext};

pub fn emit_block(block: &Block, ctx: &mut BuildContext, labels: &mut LabelGen, out: &mut Vec<Instr>) {
    ctx.enter_scope();
    for item in &block.body {
        match item {
            BlockItem::Local(local) => emit_local(local, ctx, labels, out),
            BlockItem::Statement(stmt) => emit_statement(stmt, ctx, labels, out),
        }
    }
    ctx.exit_scope();
}

fn emit_local(local: &LocalDecl, ctx: &mut BuildContext, labels: &mut LabelGen, out: &mut Vec<Instr>) {
    let ty = match (&local.declared_type, &local.init) {
        (Some(t), Some(init)) => {
            emit_expr(init, ctx, labels, out);
            t.clone()
        }
        (Some(t), None) => {
            push_default_value(t, out);
            t.clone()
        }
        (None, Some(init)) => emit_expr(init, ctx, labels, out),
        (None, None) => unreachable!("the check pass rejects an untyped, uninitialised local"),
    };
    let slot = ctx.bind_local(&local.name, ty);
    out.push(Instr::StoreLocal(slot));
}

fn emit_statement(stmt: &Statement, ctx: &mut BuildContext, labels: &mut LabelGen, out: &mut Vec<Instr>) {
    match stmt {
        Statement::Assign { target, value } => {
            emit_expr(value, ctx, labels, out);
            let binding = ctx.resolve(target);
            match binding.kind {
                BindingKind::Arg(i) => out.push(Instr::StoreArg(i)),
                BindingKind::Local(i) => out.push(Instr::StoreLocal(i)),
                BindingKind::Field(i) => out.push(Instr::StoreField(i)),
            }
        }
        Statement::Expr(expr) => {
            let ty = emit_expr(expr, ctx, labels, out);
            if ty.head != "void" {
                out.push(Instr::Pop);
            }
        }
        Statement::While { condition, body } => {
            let top = labels.fresh();
            let end = labels.fresh();
            out.push(Instr::Label(top));
            emit_expr(condition, ctx, labels, out);
            out.push(Instr::BranchIfFalse(end));
            emit_block(body, ctx, labels, out);
            out.push(Instr::Jump(top));
            out.push(Instr::Label(end));
        }
        Statement::If {
            condition,
            then_branch,
            else_branch,
        } => {
            let else_label = labels.fresh();
            let end_label = labels.fresh();
            emit_expr(condition, ctx, labels, out);
            out.push(Instr::BranchIfFalse(else_label));
            emit_block(then_branch, ctx, labels, out);
            out.push(Instr::Jump(end_label));
            out.push(Instr::Label(else_label));
            if let Some(else_block) = else_branch {
                emit_block(else_block, ctx, labels, out);
            }
            out.push(Instr::Label(end_label));
        }
        Statement::Return(value) => {
            if let Some(expr) = value {
                emit_expr(expr, ctx, labels, out);
            }
            out.push(Instr::Ret);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, Program};
    use crate::classtable::ClassTable;
    use crate::types::TypeName;

    fn ctx(table: &ClassTable) -> BuildContext<'_> {
        BuildContext::new(table, "M")
    }

    #[test]
    fn local_with_init_emits_store_local() {
        let table = ClassTable::register(&Program::new()).unwrap();
        let mut c = ctx(&table);
        let mut labels = LabelGen::new();
        let mut out = Vec::new();
        let local = LocalDecl {
            name: "x".into(),
            declared_type: Some(TypeName::simple("Integer")),
            init: Some(Expr::IntLit(3)),
        };
        emit_local(&local, &mut c, &mut labels, &mut out);
        assert_eq!(out, vec![Instr::LoadConst(crate::codegen::Const::Int(3)), Instr::StoreLocal(0)]);
    }

    #[test]
    fn while_loop_emits_top_and_end_labels() {
        let table = ClassTable::register(&Program::new()).unwrap();
        let mut c = ctx(&table);
        let mut labels = LabelGen::new();
        let mut out = Vec::new();
        let stmt = Statement::While {
            condition: Expr::BoolLit(false),
            body: Block::new(),
        };
        emit_statement(&stmt, &mut c, &mut labels, &mut out);
        assert!(matches!(out[0], Instr::Label(_)));
        assert!(out.iter().any(|i| matches!(i, Instr::Jump(_))));
    }

    #[test]
    fn return_with_value_emits_ret_after_value() {
        let table = ClassTable::register(&Program::new()).unwrap();
        let mut c = ctx(&table);
        let mut labels = LabelGen::new();
        let mut out = Vec::new();
        emit_statement(&Statement::Return(Some(Expr::IntLit(1))), &mut c, &mut labels, &mut out);
        assert_eq!(out.last(), Some(&Instr::Ret));
    }
}
