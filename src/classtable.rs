//! Whole-program class registry: inheritance, fields, and overload sets.
//!
//! Built once from the parsed `Program` by the analyzer's check pass (three
//! traversals: register, validate inheritance, collect members) and then
//! shared, read-only, with the IL emitter's build context — the single
//! source of truth for "what does class X look like, including everything
//! it inherited".

use crate::ast::Program;
use crate::types::TypeName;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub ty: TypeName,
}

#[derive(Debug, Clone)]
pub struct MethodSig {
    pub name: String,
    pub params: Vec<TypeName>,
    pub return_type: Option<TypeName>,
    pub is_forward: bool,
}

#[derive(Debug, Clone)]
pub struct CtorSig {
    pub params: Vec<TypeName>,
}

#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub name: String,
    pub base: Option<String>,
    /// Fields declared directly on this class (not the inherited ones).
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodSig>,
    pub constructors: Vec<CtorSig>,
    /// True for the synthetic entries registered for `Integer`/`Real`/
    /// `Boolean`/`String`/`Object`/`Array`/`List`: these have no user-visible
    /// fields or methods here — their operations are the fixed built-in
    /// tables consulted separately by the analyzer and emitter.
    pub builtin: bool,
}

pub struct ClassTable {
    classes: HashMap<String, ClassInfo>,
    /// Declaration order, preserved for codegen: classes are processed in
    /// declaration order.
    pub order: Vec<String>,
}

pub const BUILTIN_CLASS_NAMES: &[&str] =
    &["Integer", "Real", "Boolean", "String", "Object", "Array", "List"];

impl ClassTable {
    /// First traversal: register every class name; duplicates fail. Also
    /// seeds the built-in class names (not user-declarable).
    pub fn register(program: &Program) -> Result<ClassTable, String> {
        let mut classes = HashMap::new();
        let mut order = Vec::new();
        for &builtin in BUILTIN_CLASS_NAMES {
            // `Object` carries the one method every class inherits regardless
            // of its declared base: `print`, the language's sole I/O intrinsic.
            let methods = if builtin == "Object" {
                vec![MethodSig {
                    name: "print".to_string(),
                    params: vec![TypeName::simple("Object")],
                    return_type: None,
                    is_forward: false,
                }]
            } else {
                Vec::new()
            };
            classes.insert(
                builtin.to_string(),
                ClassInfo {
                    name: builtin.to_string(),
                    base: None,
                    fields: Vec::new(),
                    methods,
                    constructors: Vec::new(),
                    builtin: true,
                },
            );
        }
        for class in &program.classes {
            if classes.contains_key(&class.name) {
                return Err(format!("class '{}' is already declared", class.name));
            }
            // Every class implicitly extends `Object` unless it names its own
            // base explicitly.
            let base = class.base.clone().or_else(|| (class.name != "Object").then(|| "Object".to_string()));
            classes.insert(
                class.name.clone(),
                ClassInfo {
                    name: class.name.clone(),
                    base,
                    fields: Vec::new(),
                    methods: Vec::new(),
                    constructors: Vec::new(),
                    builtin: false,
                },
            );
            order.push(class.name.clone());
        }
        Ok(ClassTable { classes, order })
    }

    pub fn get(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ClassInfo> {
        self.classes.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Second traversal: every declared base must resolve to a class, and
    /// the chain must be finite (cycle detection via visited-set).
    pub fn validate_inheritance(&self) -> Result<(), String> {
        for name in &self.order {
            let mut visited = vec![name.clone()];
            let mut current = self.classes[name].base.clone();
            while let Some(base_name) = current {
                if !self.contains(&base_name) {
                    return Err(format!(
                        "class '{name}' extends unknown class '{base_name}'"
                    ));
                }
                if visited.contains(&base_name) {
                    return Err(format!(
                        "cyclic inheritance detected involving class '{base_name}'"
                    ));
                }
                visited.push(base_name.clone());
                current = self.classes[&base_name].base.clone();
            }
        }
        Ok(())
    }

    /// The base chain, nearest ancestor first, not including `name` itself.
    pub fn base_chain(&self, name: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = self.classes.get(name).and_then(|c| c.base.clone());
        while let Some(base_name) = current {
            current = self.classes.get(&base_name).and_then(|c| c.base.clone());
            chain.push(base_name);
        }
        chain
    }

    /// Cascading field lookup: own fields first, then up the base chain.
    pub fn find_field(&self, class: &str, field_name: &str) -> Option<&FieldInfo> {
        let mut search = Some(class.to_string());
        while let Some(name) = search {
            let info = self.classes.get(&name)?;
            if let Some(f) = info.fields.iter().find(|f| f.name == field_name) {
                return Some(f);
            }
            search = info.base.clone();
        }
        None
    }

    /// All fields visible on `class`, inherited first (base-to-derived
    /// order), for constructor field-initialisation and hoisting.
    pub fn all_fields(&self, class: &str) -> Vec<FieldInfo> {
        let mut chain = self.base_chain(class);
        chain.reverse();
        chain.push(class.to_string());
        let mut out = Vec::new();
        for name in chain {
            if let Some(info) = self.classes.get(&name) {
                out.extend(info.fields.iter().cloned());
            }
        }
        out
    }

    fn exact_type_match(params: &[TypeName], args: &[TypeName]) -> bool {
        params.len() == args.len() && params.iter().zip(args).all(|(p, a)| p == a)
    }

    /// A parameter declared `Object` accepts any argument (the universal
    /// root type); an argument whose *statically* known type is `Object`
    /// (read back from type-erased generic storage) is likewise accepted
    /// against any parameter, since its real type is unknown until runtime.
    fn object_fallback_match(params: &[TypeName], args: &[TypeName]) -> bool {
        params.len() == args.len()
            && params
                .iter()
                .zip(args)
                .all(|(p, a)| p == a || *a == TypeName::simple("Object") || *p == TypeName::simple("Object"))
    }

    /// Overload resolution for `find_method`: exact match, then same-arity
    /// with an `Object`-erased argument accepted, then recurse into the
    /// base chain. Deterministic for a fixed call site.
    pub fn find_method(&self, owner: &str, name: &str, arg_types: &[TypeName]) -> Option<&MethodSig> {
        let mut search = Some(owner.to_string());
        while let Some(class_name) = search {
            let info = self.classes.get(&class_name)?;
            let candidates: Vec<&MethodSig> = info.methods.iter().filter(|m| m.name == name).collect();
            if let Some(m) = candidates.iter().find(|m| Self::exact_type_match(&m.params, arg_types)) {
                return Some(m);
            }
            if let Some(m) = candidates.iter().find(|m| Self::object_fallback_match(&m.params, arg_types)) {
                return Some(m);
            }
            search = info.base.clone();
        }
        None
    }

    /// Same algorithm as `find_method`, for constructors (unnamed overload
    /// set), used to resolve `New(UserClass, args)`.
    pub fn find_constructor(&self, class: &str, arg_types: &[TypeName]) -> Option<&CtorSig> {
        let info = self.classes.get(class)?;
        info.constructors
            .iter()
            .find(|c| Self::exact_type_match(&c.params, arg_types))
            .or_else(|| info.constructors.iter().find(|c| Self::object_fallback_match(&c.params, arg_types)))
    }

    /// Whether `sub` is `base` or inherits (directly/indirectly) from it.
    pub fn is_subclass_of(&self, sub: &str, base: &str) -> bool {
        sub == base || self.base_chain(sub).iter().any(|b| b == base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::analyzer::check::collect_members;

    fn table_for(src: &str) -> ClassTable {
        let program = parse(src).unwrap();
        let mut table = ClassTable::register(&program).unwrap();
        table.validate_inheritance().unwrap();
        collect_members(&program, &mut table).unwrap();
        table
    }

    #[test]
    fn registers_builtins_and_user_classes() {
        let table = table_for("class C is end");
        assert!(table.contains("Integer"));
        assert!(table.contains("C"));
    }

    #[test]
    fn duplicate_class_name_fails() {
        let program = parse("class C is end class C is end").unwrap();
        assert!(ClassTable::register(&program).is_err());
    }

    #[test]
    fn cyclic_inheritance_detected() {
        let program = parse("class A extends B is end class B extends A is end").unwrap();
        let table = ClassTable::register(&program).unwrap();
        assert!(table.validate_inheritance().is_err());
    }

    #[test]
    fn unknown_base_fails() {
        let program = parse("class A extends Ghost is end").unwrap();
        let table = ClassTable::register(&program).unwrap();
        assert!(table.validate_inheritance().is_err());
    }

    #[test]
    fn cascading_field_lookup_walks_base_chain() {
        let table = table_for("class A is var x: Integer end class B extends A is end");
        assert!(table.find_field("B", "x").is_some());
    }

    #[test]
    fn is_subclass_of_includes_self() {
        let table = table_for("class A is end");
        assert!(table.is_subclass_of("A", "A"));
    }
}
