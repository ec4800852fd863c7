//! The optimize pass: mutating rewrites applied after the check pass
//! succeeds. Every rewrite is logged via `DiagnosticSink::log_rewrite` so
//! the driver can report what changed.
//!
//! Usage analysis here is deliberately conservative: a bare identifier or a
//! `.member` access counts as "uses the name" even when it could really be a
//! shadowing local or an unrelated field on another class. That only means
//! fewer fields get dropped than a whole-program alias analysis would allow,
//! never more — an optimizer that stays silent is safe, one that guesses
//! wrong isn't.

use crate::ast::{Block, BlockItem, Expr, LocalDecl, Member, MethodBody, Program, Statement};
use crate::diagnostics::DiagnosticSink;

pub fn optimize(program: &mut Program, sink: &mut DiagnosticSink) {
    drop_unused_fields(program, sink);
    for class in &mut program.classes {
        let class_name = class.name.clone();
        for member in &mut class.members {
            match member {
                Member::Constructor(ctor) => simplify_block(&mut ctor.body, &class_name, sink),
                Member::Method(method) => {
                    if let MethodBody::Block(block) = &mut method.body {
                        simplify_block(block, &class_name, sink);
                    }
                }
                Member::Field(_) => {}
            }
        }
    }
}

fn drop_unused_fields(program: &mut Program, sink: &mut DiagnosticSink) {
    loop {
        let mut target = None;
        'search: for class in &program.classes {
            for member in &class.members {
                if let Member::Field(field) = member {
                    if !name_used_anywhere(program, &field.name) {
                        target = Some((class.name.clone(), field.name.clone()));
                        break 'search;
                    }
                }
            }
        }
        let Some((class_name, field_name)) = target else {
            break;
        };
        let class = program.classes.iter_mut().find(|c| c.name == class_name).expect("just found it");
        class.members.retain(|m| !matches!(m, Member::Field(f) if f.name == field_name));
        sink.log_rewrite(format!("removed unused field '{field_name}' from class '{class_name}'"));
    }
}

fn name_used_anywhere(program: &Program, name: &str) -> bool {
    for class in &program.classes {
        for member in &class.members {
            let used = match member {
                Member::Field(f) => f.init.as_ref().is_some_and(|e| expr_mentions(e, name)),
                Member::Constructor(ctor) => block_mentions(&ctor.body, name),
                Member::Method(method) => match &method.body {
                    MethodBody::Block(block) => block_mentions(block, name),
                    MethodBody::Arrow(expr) => expr_mentions(expr, name),
                    MethodBody::Forward => false,
                },
            };
            if used {
                return true;
            }
        }
    }
    false
}

fn expr_mentions(expr: &Expr, name: &str) -> bool {
    match expr {
        Expr::Ident(n) => n == name,
        Expr::MemberAccess { target, member } => member == name || expr_mentions(target, name),
        Expr::Call { callee, args } => expr_mentions(callee, name) || args.iter().any(|a| expr_mentions(a, name)),
        Expr::New { args, .. } => args.iter().any(|a| expr_mentions(a, name)),
        Expr::IntLit(_) | Expr::RealLit(_) | Expr::BoolLit(_) | Expr::StringLit(_) | Expr::This => false,
    }
}

fn stmt_mentions(stmt: &Statement, name: &str) -> bool {
    match stmt {
        Statement::Assign { target, value } => target == name || expr_mentions(value, name),
        Statement::Expr(expr) => expr_mentions(expr, name),
        Statement::While { condition, body } => expr_mentions(condition, name) || block_mentions(body, name),
        Statement::If {
            condition,
            then_branch,
            else_branch,
        } => {
            expr_mentions(condition, name)
                || block_mentions(then_branch, name)
                || else_branch.as_ref().is_some_and(|b| block_mentions(b, name))
        }
        Statement::Return(Some(expr)) => expr_mentions(expr, name),
        Statement::Return(None) => false,
    }
}

fn block_mentions(block: &Block, name: &str) -> bool {
    block.body.iter().any(|item| match item {
        BlockItem::Local(local) => local.init.as_ref().is_some_and(|e| expr_mentions(e, name)),
        BlockItem::Statement(stmt) => stmt_mentions(stmt, name),
    })
}

/// Rewrites `block` in place: recurses into nested blocks first, collapses
/// `if(true)`/`if(false)`/`while(false)` on literal conditions, then drops
/// everything after the first statement that unconditionally returns.
fn simplify_block(block: &mut Block, class_name: &str, sink: &mut DiagnosticSink) {
    let old_items = std::mem::take(&mut block.body);
    let mut new_items = Vec::with_capacity(old_items.len());
    let mut seen_return = false;
    for item in old_items {
        if seen_return {
            sink.log_rewrite(format!("dropped unreachable code in class '{class_name}' after a return"));
            continue;
        }
        for expanded in simplify_item(item, class_name, sink) {
            if matches!(expanded, BlockItem::Statement(Statement::Return(_))) {
                seen_return = true;
            }
            new_items.push(expanded);
        }
    }
    drop_unused_locals(&mut new_items, class_name, sink);
    rebuild_projections(block, new_items);
}

/// Drops a local never read anywhere later in its own block — same
/// criterion as `drop_unused_fields`, scoped to one block instead of the
/// whole program. Runs to a fixpoint: removing one local's only use can
/// make an earlier local in the same block unused too.
fn drop_unused_locals(items: &mut Vec<BlockItem>, class_name: &str, sink: &mut DiagnosticSink) {
    loop {
        let target = items.iter().enumerate().find_map(|(i, item)| match item {
            BlockItem::Local(local) if !local_used_after(items, i, &local.name) => Some((i, local.name.clone())),
            _ => None,
        });
        let Some((index, name)) = target else { break };
        items.remove(index);
        sink.log_rewrite(format!("removed unused local '{name}' in class '{class_name}'"));
    }
}

fn local_used_after(items: &[BlockItem], index: usize, name: &str) -> bool {
    items[index + 1..].iter().any(|item| match item {
        BlockItem::Local(local) => local.init.as_ref().is_some_and(|e| expr_mentions(e, name)),
        BlockItem::Statement(stmt) => stmt_mentions(stmt, name),
    })
}

fn rebuild_projections(block: &mut Block, items: Vec<BlockItem>) {
    block.locals = items
        .iter()
        .filter_map(|item| match item {
            BlockItem::Local(local) => Some(local.clone()),
            BlockItem::Statement(_) => None,
        })
        .collect::<Vec<LocalDecl>>();
    block.statements = items
        .iter()
        .filter_map(|item| match item {
            BlockItem::Statement(stmt) => Some(stmt.clone()),
            BlockItem::Local(_) => None,
        })
        .collect();
    block.body = items;
}

fn simplify_item(item: BlockItem, class_name: &str, sink: &mut DiagnosticSink) -> Vec<BlockItem> {
    match item {
        BlockItem::Local(local) => vec![BlockItem::Local(local)],
        BlockItem::Statement(stmt) => simplify_statement(stmt, class_name, sink),
    }
}

/// Recognises a condition whose value is known at compile time: a bare
/// `true`/`false` token, or `Boolean(true)`/`Boolean(false)` — the `New`
/// form `resolve_call` produces when the literal is written as a
/// constructor call rather than the bare keyword.
fn literal_bool(expr: &Expr) -> Option<bool> {
    match expr {
        Expr::BoolLit(b) => Some(*b),
        Expr::New { class_name, args } if class_name.head == "Boolean" && args.len() == 1 => {
            literal_bool(&args[0])
        }
        _ => None,
    }
}

fn simplify_statement(stmt: Statement, class_name: &str, sink: &mut DiagnosticSink) -> Vec<BlockItem> {
    match stmt {
        Statement::While { condition, mut body } => {
            simplify_block(&mut body, class_name, sink);
            if literal_bool(&condition) == Some(false) {
                sink.log_rewrite(format!("removed a while(false) loop in class '{class_name}'"));
                Vec::new()
            } else {
                vec![BlockItem::Statement(Statement::While { condition, body })]
            }
        }
        Statement::If {
            condition,
            mut then_branch,
            mut else_branch,
        } => {
            simplify_block(&mut then_branch, class_name, sink);
            if let Some(branch) = &mut else_branch {
                simplify_block(branch, class_name, sink);
            }
            match literal_bool(&condition) {
                Some(true) => {
                    sink.log_rewrite(format!("collapsed an if(true) in class '{class_name}'"));
                    then_branch.body
                }
                Some(false) => {
                    sink.log_rewrite(format!("collapsed an if(false) in class '{class_name}'"));
                    else_branch.map(|b| b.body).unwrap_or_default()
                }
                None => vec![BlockItem::Statement(Statement::If {
                    condition,
                    then_branch,
                    else_branch,
                })],
            }
        }
        other => vec![BlockItem::Statement(other)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn unused_field_is_removed_and_logged() {
        let mut program = parse("class C is var z: Integer this() is end end").unwrap();
        let mut sink = DiagnosticSink::new();
        optimize(&mut program, &mut sink);
        assert!(program.classes[0].members.iter().all(|m| !matches!(m, Member::Field(f) if f.name == "z")));
        assert!(sink.optimizer_log.iter().any(|l| l.contains("z")));
    }

    #[test]
    fn field_used_in_method_is_kept() {
        let src = "class C is var z: Integer this() is end method m() is z end end";
        let mut program = parse(src).unwrap();
        let mut sink = DiagnosticSink::new();
        optimize(&mut program, &mut sink);
        assert!(program.classes[0].members.iter().any(|m| matches!(m, Member::Field(f) if f.name == "z")));
    }

    #[test]
    fn if_true_collapses_to_then_branch() {
        let src = "class C is method m() is if true then var y: Integer print(y) end end end";
        let mut program = parse(src).unwrap();
        let mut sink = DiagnosticSink::new();
        optimize(&mut program, &mut sink);
        let Member::Method(m) = &program.classes[0].members[0] else { panic!() };
        let MethodBody::Block(block) = &m.body else { panic!() };
        assert_eq!(block.statements.len(), 1);
        assert_eq!(block.locals.len(), 1);
        assert!(sink.optimizer_log.iter().any(|l| l.contains("if(true)")));
    }

    #[test]
    fn if_boolean_true_constructor_call_also_collapses() {
        let src = "class C is method m() is if Boolean(true) then var y: Integer print(y) else var z: Integer print(z) end end end";
        let mut program = parse(src).unwrap();
        let mut sink = DiagnosticSink::new();
        optimize(&mut program, &mut sink);
        let Member::Method(m) = &program.classes[0].members[0] else { panic!() };
        let MethodBody::Block(block) = &m.body else { panic!() };
        assert_eq!(block.locals.len(), 1);
        assert_eq!(block.locals[0].name, "y");
        assert!(sink.optimizer_log.iter().any(|l| l.contains("if(true)")));
    }

    #[test]
    fn unused_local_is_dropped_and_logged() {
        let src = "class C is method m() is var y: Integer := Integer(1) end end";
        let mut program = parse(src).unwrap();
        let mut sink = DiagnosticSink::new();
        optimize(&mut program, &mut sink);
        let Member::Method(m) = &program.classes[0].members[0] else { panic!() };
        let MethodBody::Block(block) = &m.body else { panic!() };
        assert!(block.locals.is_empty());
        assert!(sink.optimizer_log.iter().any(|l| l.contains('y')));
    }

    #[test]
    fn local_used_in_a_later_statement_is_kept() {
        let src = "class C is method m() is var y: Integer := Integer(1) print(y) end end";
        let mut program = parse(src).unwrap();
        let mut sink = DiagnosticSink::new();
        optimize(&mut program, &mut sink);
        let Member::Method(m) = &program.classes[0].members[0] else { panic!() };
        let MethodBody::Block(block) = &m.body else { panic!() };
        assert_eq!(block.locals.len(), 1);
    }

    #[test]
    fn while_false_is_removed() {
        let src = "class C is method m() is while false loop end end end";
        let mut program = parse(src).unwrap();
        let mut sink = DiagnosticSink::new();
        optimize(&mut program, &mut sink);
        let Member::Method(m) = &program.classes[0].members[0] else { panic!() };
        let MethodBody::Block(block) = &m.body else { panic!() };
        assert!(block.body.is_empty());
    }

    #[test]
    fn code_after_return_is_dropped() {
        let src = "class C is method m() is return; var y: Integer end end";
        let mut program = parse(src).unwrap();
        let mut sink = DiagnosticSink::new();
        optimize(&mut program, &mut sink);
        let Member::Method(m) = &program.classes[0].members[0] else { panic!() };
        let MethodBody::Block(block) = &m.body else { panic!() };
        assert_eq!(block.body.len(), 1);
    }
}
