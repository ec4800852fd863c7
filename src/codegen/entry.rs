//! Entry synthesis: a program doesn't name its own entry point, so the
//! emitter appends a synthetic class whose sole method allocates the start
//! class, runs its constructor, and calls `main`.

use crate::ast::Program;
use crate::classtable::ClassTable;
use crate::codegen::{ClassDescriptor, Instr, MethodDescriptor};
use crate::config::CompilerConfig;
use crate::diagnostics::Diagnostic;

pub const ENTRY_CLASS_NAME: &str = "$Entry";
pub const ENTRY_METHOD_NAME: &str = "main";

pub fn synthesize_entry(program: &Program, table: &ClassTable, config: &CompilerConfig) -> Result<ClassDescriptor, Diagnostic> {
    let start_name = resolve_start_class(program, config)?;
    let start_info = table
        .get(&start_name)
        .ok_or_else(|| Diagnostic::emit(format!("start class '{start_name}' was not found")))?;

    let has_zero_arg_ctor = start_info.constructors.is_empty() || start_info.constructors.iter().any(|c| c.params.is_empty());
    if !has_zero_arg_ctor {
        return Err(Diagnostic::emit(format!(
            "start class '{start_name}' has no zero-argument constructor to synthesise an entry call with"
        )));
    }

    let main_sig = table
        .find_method(&start_name, "main", &[])
        .ok_or_else(|| Diagnostic::emit(format!("start class '{start_name}' declares no zero-argument 'main' method")))?;

    let mut code = vec![
        Instr::New { class: start_name.clone() },
        Instr::Dup,
        Instr::CallCtor {
            class: start_name.clone(),
            arg_count: 0,
        },
        Instr::CallVirt {
            class: start_name.clone(),
            method: "main".to_string(),
            arg_count: 0,
        },
    ];
    if main_sig.return_type.is_some() {
        code.push(Instr::Pop);
    }
    code.push(Instr::Ret);

    Ok(ClassDescriptor {
        name: ENTRY_CLASS_NAME.to_string(),
        base: None,
        fields: Vec::new(),
        constructors: Vec::new(),
        methods: vec![MethodDescriptor {
            name: ENTRY_METHOD_NAME.to_string(),
            param_types: Vec::new(),
            return_type: None,
            local_count: 0,
            code,
        }],
    })
}

fn resolve_start_class(program: &Program, config: &CompilerConfig) -> Result<String, Diagnostic> {
    if let Some(name) = &config.start_class {
        return Ok(name.clone());
    }
    program
        .classes
        .last()
        .map(|c| c.name.clone())
        .ok_or_else(|| Diagnostic::emit("an empty program has no class to synthesise an entry point from"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::check::collect_members;
    use crate::parser::parse;

    fn compile(src: &str) -> (Program, ClassTable) {
        let program = parse(src).unwrap();
        let mut table = ClassTable::register(&program).unwrap();
        table.validate_inheritance().unwrap();
        collect_members(&program, &mut table).unwrap();
        (program, table)
    }

    #[test]
    fn entry_calls_ctor_then_main() {
        let (program, table) = compile("class C is method main() is end end");
        let entry = synthesize_entry(&program, &table, &CompilerConfig::default()).unwrap();
        assert!(entry.methods[0].code.iter().any(|i| matches!(i, Instr::CallCtor { class, .. } if class == "C")));
        assert!(entry.methods[0]
            .code
            .iter()
            .any(|i| matches!(i, Instr::CallVirt { method, .. } if method == "main")));
    }

    #[test]
    fn missing_main_is_an_error() {
        let (program, table) = compile("class C is end");
        assert!(synthesize_entry(&program, &table, &CompilerConfig::default()).is_err());
    }

    #[test]
    fn explicit_start_class_override_is_honoured() {
        let (program, table) = compile("class A is method main() is end end class B is end");
        let config = CompilerConfig {
            start_class: Some("A".to_string()),
            ..CompilerConfig::default()
        };
        let entry = synthesize_entry(&program, &table, &config).unwrap();
        assert!(entry.methods[0].code.iter().any(|i| matches!(i, Instr::New { class } if class == "A")));
    }
}
