//! Type names.
//!
//! Type names are strings; the syntactic form `Name[Inner]` or
//! `Name[A,B]` is a generic instantiation, canonicalised as `Name[arg1,arg2]`
//! with no spaces. Only `Array` and `List` are recognised generic heads.

use std::fmt;

/// A parsed, canonicalised type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeName {
    pub head: String,
    pub args: Vec<TypeName>,
}

impl TypeName {
    pub fn simple(name: impl Into<String>) -> Self {
        TypeName {
            head: name.into(),
            args: Vec::new(),
        }
    }

    pub fn generic(head: impl Into<String>, args: Vec<TypeName>) -> Self {
        TypeName {
            head: head.into(),
            args,
        }
    }

    pub fn is_array(&self) -> bool {
        self.head == "Array" && self.args.len() == 1
    }

    pub fn is_list(&self) -> bool {
        self.head == "List" && self.args.len() == 1
    }

    pub fn element_type(&self) -> Option<&TypeName> {
        if self.is_array() || self.is_list() {
            self.args.first()
        } else {
            None
        }
    }

    pub fn is_primitive(&self) -> bool {
        self.args.is_empty()
            && matches!(self.head.as_str(), "Integer" | "Real" | "Boolean" | "String")
    }

    /// The canonical textual form: `Name[arg1,arg2]`, no spaces.
    pub fn canonical(&self) -> String {
        if self.args.is_empty() {
            self.head.clone()
        } else {
            let args: Vec<String> = self.args.iter().map(|a| a.canonical()).collect();
            format!("{}[{}]", self.head, args.join(","))
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

pub const INTEGER: &str = "Integer";
pub const REAL: &str = "Real";
pub const BOOLEAN: &str = "Boolean";
pub const STRING: &str = "String";
pub const OBJECT: &str = "Object";
pub const VOID: &str = "void";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_form_has_no_spaces() {
        let t = TypeName::generic("Array", vec![TypeName::simple("Integer")]);
        assert_eq!(t.canonical(), "Array[Integer]");
    }

    #[test]
    fn multi_arg_generic_canonicalises_with_commas() {
        let t = TypeName::generic(
            "List",
            vec![TypeName::simple("Integer"), TypeName::simple("String")],
        );
        assert_eq!(t.canonical(), "List[Integer,String]");
    }

    #[test]
    fn simple_type_has_no_brackets() {
        assert_eq!(TypeName::simple("Foo").canonical(), "Foo");
    }

    #[test]
    fn array_and_list_recognised_as_generic_heads() {
        let arr = TypeName::generic("Array", vec![TypeName::simple("Integer")]);
        assert!(arr.is_array());
        assert!(!arr.is_list());
        assert_eq!(arr.element_type().unwrap().canonical(), "Integer");
    }

    #[test]
    fn primitives_are_recognised() {
        assert!(TypeName::simple("Integer").is_primitive());
        assert!(!TypeName::simple("Foo").is_primitive());
    }
}
