//! IL emission: lowers a checked `Program` plus its `ClassTable` to an
//! in-memory `Module` — our stand-in for the stack machine's unspecified
//! binary layout. `--compile-net` renders it to the deterministic text form
//! `Module::render` produces.

pub mod class;
pub mod entry;
pub mod expr;
pub mod stmt;

use crate::ast::Program;
use crate::classtable::ClassTable;
use crate::config::CompilerConfig;
use crate::diagnostics::Diagnostic;
use crate::types::TypeName;

#[derive(Debug, Clone, PartialEq)]
pub enum Const {
    Int(i64),
    Real(f64),
    Bool(bool),
    Str(String),
    /// The Table D default for `String`, `Array[T]`, `List[T]`, and every
    /// user class.
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    LoadLocal(usize),
    StoreLocal(usize),
    LoadArg(usize),
    StoreArg(usize),
    LoadField(usize),
    StoreField(usize),
    LoadConst(Const),
    /// Allocates a zeroed instance of `class`; always followed by `Dup` +
    /// `CallCtor` at a `New` expression's call site.
    New { class: String },
    NewArray { element: TypeName },
    /// Dynamic dispatch against the receiver's real (not static) type.
    CallVirt { class: String, method: String, arg_count: usize },
    /// Runs `class`'s constructor matching `arg_count` on the receiver
    /// already on the stack — used both at allocation sites and for a
    /// derived constructor's implicit base-constructor chain.
    CallCtor { class: String, arg_count: usize },
    /// A primitive or `Array`/`List` built-in operation; resolved at
    /// compile time, never part of a vtable.
    CallStatic { class: String, method: String, arg_count: usize },
    BranchIfFalse(usize),
    Jump(usize),
    Label(usize),
    /// Wraps a primitive value for storage in type-erased `Array`/`List`
    /// element slots.
    Box,
    Unbox(TypeName),
    /// Converts the top-of-stack `Integer` to a `Real`; inserted before a
    /// binary primitive op whose receiver and argument are `Integer` and
    /// `Real` in either order, since the op itself only has a `Real` form.
    ToReal,
    Dup,
    Pop,
    Ret,
    /// The language's one I/O intrinsic; every class inherits `print` from
    /// `Object`, so this has no user-visible vtable slot to dispatch through.
    PrintIntrinsic,
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: TypeName,
}

#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    pub name: String,
    pub param_types: Vec<TypeName>,
    pub return_type: Option<TypeName>,
    pub local_count: usize,
    pub code: Vec<Instr>,
}

#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    pub name: String,
    pub base: Option<String>,
    pub fields: Vec<FieldDescriptor>,
    pub constructors: Vec<MethodDescriptor>,
    pub methods: Vec<MethodDescriptor>,
}

#[derive(Debug, Clone)]
pub struct Module {
    pub classes: Vec<ClassDescriptor>,
    pub entry_class: String,
}

impl Module {
    /// Deterministic text rendering written by `--compile-net`: one line
    /// per instruction, indented by class and member.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for class in &self.classes {
            out.push_str("class ");
            out.push_str(&class.name);
            if let Some(base) = &class.base {
                out.push_str(" extends ");
                out.push_str(base);
            }
            out.push('\n');
            for field in &class.fields {
                out.push_str(&format!("  field {}: {}\n", field.name, field.ty));
            }
            for ctor in &class.constructors {
                out.push_str(&format!("  constructor({})\n", render_params(&ctor.param_types)));
                render_code(&ctor.code, &mut out);
            }
            for method in &class.methods {
                let ret = method
                    .return_type
                    .as_ref()
                    .map(|t| format!(": {t}"))
                    .unwrap_or_default();
                out.push_str(&format!("  method {}({}){ret}\n", method.name, render_params(&method.param_types)));
                render_code(&method.code, &mut out);
            }
        }
        out
    }
}

fn render_params(params: &[TypeName]) -> String {
    params.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ")
}

fn render_code(code: &[Instr], out: &mut String) {
    for instr in code {
        out.push_str(&format!("    {instr:?}\n"));
    }
}

/// Per-method label allocator; ids are only unique within one method body.
#[derive(Default)]
pub struct LabelGen(usize);

impl LabelGen {
    pub fn new() -> Self {
        LabelGen(0)
    }

    pub fn fresh(&mut self) -> usize {
        let id = self.0;
        self.0 += 1;
        id
    }
}

pub(crate) fn push_default_value(ty: &TypeName, out: &mut Vec<Instr>) {
    match ty.head.as_str() {
        "Integer" => out.push(Instr::LoadConst(Const::Int(0))),
        "Real" => out.push(Instr::LoadConst(Const::Real(0.0))),
        "Boolean" => out.push(Instr::LoadConst(Const::Bool(false))),
        _ => out.push(Instr::LoadConst(Const::Null)),
    }
}

/// Lowers every declared class, then appends the synthesised entry class.
pub fn emit_module(program: &Program, table: &ClassTable, config: &CompilerConfig) -> Result<Module, Diagnostic> {
    let mut classes: Vec<ClassDescriptor> = program.classes.iter().map(|c| class::emit_class(c, table)).collect();
    let entry = entry::synthesize_entry(program, table, config)?;
    let entry_class = entry.name.clone();
    classes.push(entry);
    Ok(Module { classes, entry_class })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_class_and_field_lines() {
        let module = Module {
            classes: vec![ClassDescriptor {
                name: "C".into(),
                base: None,
                fields: vec![FieldDescriptor {
                    name: "x".into(),
                    ty: TypeName::simple("Integer"),
                }],
                constructors: Vec::new(),
                methods: Vec::new(),
            }],
            entry_class: "$Entry".into(),
        };
        let text = module.render();
        assert!(text.contains("class C"));
        assert!(text.contains("field x: Integer"));
    }

    #[test]
    fn label_gen_never_repeats() {
        let mut gen = LabelGen::new();
        assert_ne!(gen.fresh(), gen.fresh());
    }
}
