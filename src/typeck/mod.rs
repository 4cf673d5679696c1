//! Type checker for HolyLua
//!
//! A four-pass analyzer over the AST:
//!
//! 1. **Type discovery** — structs, classes and enums are registered and
//!    shape-checked; global variables are collected with inference from
//!    their initializers.
//! 2. **Function signatures** — global functions enter the function table;
//!    every parameter must carry an explicit annotation.
//! 3. **Bodies** — function return types are inferred or checked against
//!    their declarations; class constructors and methods are validated
//!    with `self` in scope.
//! 4. **Whole-program statement validation** — assignments, field access,
//!    nil narrowing, print arguments, calls and visibility.
//!
//! Errors accumulate; each pass runs to completion and the pipeline stops
//! at the first pass boundary with a non-zero error count.

mod collect;
mod context;
mod error;
mod exprs;
mod functions;
mod stmts;

pub use context::{ClassInfo, FunctionInfo, StructInfo, VarInfo};
pub use error::{TypeError, TypeErrorKind};
pub use functions::ReturnAnalysis;

use crate::ast::{Param, Program, ValueType};
use std::collections::{HashMap, HashSet};

/// Main entry point for type checking a program
pub fn check_program(program: &Program) -> Result<(), Vec<TypeError>> {
    let mut checker = TypeChecker::new();
    checker.check(program)
}

/// The four-pass type checker
pub struct TypeChecker {
    pub(crate) symbol_table: HashMap<String, VarInfo>,
    pub(crate) function_table: HashMap<String, FunctionInfo>,
    pub(crate) struct_table: HashMap<String, StructInfo>,
    pub(crate) class_table: HashMap<String, ClassInfo>,
    pub(crate) enum_table: HashMap<String, Vec<String>>,
    /// Variables currently proven non-nil by an enclosing condition
    pub(crate) non_nil_vars: HashSet<String>,
    pub(crate) current_function: String,
    pub(crate) current_class: String,
    pub(crate) errors: Vec<TypeError>,
    /// Non-zero while typing expressions whose errors are reported elsewhere
    pub(crate) quiet: u32,
    /// Const fields already assigned in the constructor being validated
    pub(crate) ctor_const_assigned: HashSet<String>,
}

impl TypeChecker {
    pub fn new() -> Self {
        Self {
            symbol_table: HashMap::new(),
            function_table: HashMap::new(),
            struct_table: HashMap::new(),
            class_table: HashMap::new(),
            enum_table: HashMap::new(),
            non_nil_vars: HashSet::new(),
            current_function: String::new(),
            current_class: String::new(),
            errors: Vec::new(),
            quiet: 0,
            ctor_const_assigned: HashSet::new(),
        }
    }

    /// Check a complete program
    pub fn check(&mut self, program: &Program) -> Result<(), Vec<TypeError>> {
        self.init_builtins();

        let _ = self.pass_types(program)
            && self.pass_signatures(program)
            && self.pass_bodies(program)
            && self.pass_statements(program);

        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }

    pub(crate) fn error(&mut self, kind: TypeErrorKind, line: u32) {
        if self.quiet == 0 {
            self.errors.push(TypeError::new(kind, line));
        }
    }

    /// A pass is clean when it added no errors; the pipeline stops at the
    /// first pass boundary that reported something.
    pub(crate) fn clean_since(&self, mark: usize) -> bool {
        self.errors.len() == mark
    }

    fn init_builtins(&mut self) {
        let builtin = |name: &str, params: Vec<Param>, ret: ValueType| FunctionInfo {
            name: name.to_owned(),
            return_type: ret,
            params,
            is_global: true,
        };
        let value_param = |ty: ValueType| Param {
            name: "value".to_owned(),
            ty,
            optional: false,
            type_name: String::new(),
        };

        self.function_table.insert(
            "tostring".to_owned(),
            builtin(
                "tostring",
                vec![value_param(ValueType::Inferred)],
                ValueType::String,
            ),
        );
        self.function_table.insert(
            "print".to_owned(),
            builtin(
                "print",
                vec![value_param(ValueType::Inferred)],
                ValueType::Inferred,
            ),
        );
        self.function_table.insert(
            "tonumber".to_owned(),
            builtin(
                "tonumber",
                vec![value_param(ValueType::String)],
                ValueType::Number,
            ),
        );
        self.function_table.insert(
            "type".to_owned(),
            builtin(
                "type",
                vec![value_param(ValueType::Inferred)],
                ValueType::String,
            ),
        );
    }
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn check_ok(source: &str) {
        let (program, errors) = parser::parse(source);
        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        if let Err(errors) = check_program(&program) {
            panic!("type errors: {:?}", errors);
        }
    }

    fn check_err(source: &str) -> Vec<TypeError> {
        let (program, errors) = parser::parse(source);
        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        check_program(&program).expect_err("expected type errors")
    }

    #[test]
    fn test_simple_declaration() {
        check_ok("local x: number = 5\nprint(x)");
    }

    #[test]
    fn test_literal_annotation_mismatch() {
        let errors = check_err("local x: number = \"five\"");
        assert!(matches!(
            errors[0].kind,
            TypeErrorKind::DeclTypeMismatch { .. }
        ));
    }

    #[test]
    fn test_uninitialized_non_optional() {
        let errors = check_err("local x: number");
        assert!(matches!(
            errors[0].kind,
            TypeErrorKind::NonOptionalNeedsInit { .. }
        ));
    }

    #[test]
    fn test_duplicate_variable() {
        let errors = check_err("local x = 1\nlocal x = 2");
        assert!(matches!(errors[0].kind, TypeErrorKind::VarAlreadyDeclared(_)));
    }

    #[test]
    fn test_const_reassignment() {
        let errors = check_err("local const x: number = 1\nx = 2");
        assert_eq!(errors[0].kind, TypeErrorKind::AssignToConst("x".into()));
        assert_eq!(errors[0].line, 2);
    }

    #[test]
    fn test_assign_nil_to_non_optional() {
        let errors = check_err("local x: number = 1\nx = nil");
        assert!(matches!(
            errors[0].kind,
            TypeErrorKind::AssignNilToNonOptional(_)
        ));
    }

    #[test]
    fn test_optional_assign_nil_ok() {
        check_ok("local x: number? = 1\nx = nil");
    }

    #[test]
    fn test_print_optional_rejected() {
        let errors = check_err("local x: number? = nil\nprint(x)");
        assert!(matches!(errors[0].kind, TypeErrorKind::PrintOptional(_)));
    }

    #[test]
    fn test_narrowing_with_nil_check() {
        check_ok("local x: number? = nil\nif x != nil then\nprint(x)\nend");
    }

    #[test]
    fn test_narrowing_with_bare_condition() {
        check_ok("local x: number? = nil\nif x then\nprint(x!)\nend");
    }

    #[test]
    fn test_narrowing_does_not_leak() {
        let errors =
            check_err("local x: number? = nil\nif x != nil then\nprint(x)\nend\nprint(x)");
        assert!(matches!(errors[0].kind, TypeErrorKind::PrintOptional(_)));
    }

    #[test]
    fn test_negated_check_narrows_else() {
        check_ok("local x: number? = nil\nif x == nil then\nprint(\"none\")\nelse\nprint(x)\nend");
    }

    #[test]
    fn test_compound_on_optional_rejected() {
        let errors = check_err("local x: number? = 1\nx += 1");
        assert!(matches!(errors[0].kind, TypeErrorKind::CompoundOnNilable(_)));
    }

    #[test]
    fn test_compound_requires_numbers() {
        let errors = check_err("local s: string = \"a\"\ns += 1");
        assert_eq!(errors[0].kind, TypeErrorKind::CompoundNeedsNumbers);
    }

    #[test]
    fn test_force_unwrap_non_optional_rejected() {
        let errors = check_err("local x: number = 1\nprint(x!)");
        assert_eq!(errors[0].kind, TypeErrorKind::ForceUnwrapNonOptional);
    }

    #[test]
    fn test_function_param_needs_annotation() {
        let errors = check_err("function f(a)\nreturn a\nend");
        assert!(matches!(errors[0].kind, TypeErrorKind::ParamNeedsType { .. }));
    }

    #[test]
    fn test_conflicting_return_types() {
        let errors = check_err(
            "function pick(flag: bool)\nif flag then\nreturn \"yes\"\nelse\nreturn 1\nend\nend",
        );
        assert!(matches!(
            errors[0].kind,
            TypeErrorKind::ConflictingReturns(_)
        ));
        let message = errors[0].to_string();
        assert!(message.contains("Line 3"), "message: {}", message);
        assert!(message.contains("Line 5"), "message: {}", message);
    }

    #[test]
    fn test_declared_return_type_mismatch() {
        let errors = check_err("function f(): string\nreturn 1\nend");
        assert!(matches!(
            errors[0].kind,
            TypeErrorKind::ReturnTypeMismatch { .. }
        ));
    }

    #[test]
    fn test_unknown_function_call() {
        let errors = check_err("local x = 1\nmissing(x)");
        assert!(matches!(
            errors[0].kind,
            TypeErrorKind::FunctionNotDeclared(_)
        ));
    }

    #[test]
    fn test_duplicate_struct() {
        let errors = check_err("struct S\nx: number = 0\nend\nstruct S\ny: number = 0\nend");
        assert!(matches!(errors[0].kind, TypeErrorKind::DuplicateStruct(_)));
    }

    #[test]
    fn test_struct_and_enum_composition() {
        check_ok(
            "enum Color\nRed\nGreen\nBlue\nend\nstruct Pixel\nc: Color\nv: number = 0\nend\nlocal p = Pixel{ c = Color.Green }\nprint(p.c, p.v)",
        );
    }

    #[test]
    fn test_unknown_struct_field() {
        let errors = check_err(
            "struct P\nx: number = 0\nend\nlocal p = P{}\nprint(p.missing)",
        );
        assert!(matches!(
            errors[0].kind,
            TypeErrorKind::NoSuchStructField { .. }
        ));
    }

    #[test]
    fn test_class_private_method_rejected_outside() {
        let errors = check_err(
            "class A\npublic x: number = 0\nprivate function hidden(): number\nreturn 1\nend\npublic function __init()\nself.x = 0\nend\nend\nlocal a = A()\na.hidden()",
        );
        assert!(matches!(errors[0].kind, TypeErrorKind::PrivateMethod { .. }));
    }

    #[test]
    fn test_class_private_field_rejected_outside() {
        let errors = check_err(
            "class A\nprivate secret: number = 1\npublic function __init()\nend\nend\nlocal a = A()\nprint(a.secret)",
        );
        assert!(matches!(errors[0].kind, TypeErrorKind::PrivateField { .. }));
    }

    #[test]
    fn test_uninitialized_public_field() {
        let errors = check_err(
            "class A\npublic x: number\npublic function __init()\nend\nend",
        );
        assert!(matches!(
            errors[0].kind,
            TypeErrorKind::UninitializedField { .. }
        ));
    }

    #[test]
    fn test_constructor_cannot_return_value() {
        let errors = check_err(
            "class A\npublic x: number = 0\npublic function __init()\nreturn 1\nend\nend",
        );
        assert!(errors
            .iter()
            .any(|e| e.kind == TypeErrorKind::CtorReturnsValue));
    }

    #[test]
    fn test_const_class_field_flow() {
        check_ok(
            "class Tag\nprivate const id: number = 0\npublic function __init()\nself.id = 7\nend\npublic function get(): number\nreturn self.id\nend\nend\nlocal t = Tag()\nprint(t.get())",
        );
    }

    #[test]
    fn test_brace_construction_of_class_rejected() {
        // `Name{...}` is struct syntax; classes must use `Name(...)`.
        let (program, errors) =
            parser::parse("class A\npublic x: number = 0\npublic function __init()\nend\nend\nlocal a = A{}");
        assert!(
            !errors.is_empty() || check_program(&program).is_err(),
            "brace-construction of a class must be rejected"
        );
    }

    #[test]
    fn test_methods_can_call_global_functions() {
        check_ok(
            "function double(n: number): number\nreturn n * 2\nend\nclass A\npublic x: number = 0\npublic function __init()\nself.x = double(2)\nend\nend\nlocal a = A()\nprint(a.x)",
        );
    }

    #[test]
    fn test_nil_coalesce_requires_optional() {
        let errors = check_err("local x: number = 1\nlocal y = x ?? 2");
        assert_eq!(errors[0].kind, TypeErrorKind::NilCoalesceNonOptional);
    }

    #[test]
    fn test_determinism() {
        let src = "local x: number? = nil\nprint(x)";
        let (program, _) = parser::parse(src);
        let first = check_program(&program).unwrap_err();
        let second = check_program(&program).unwrap_err();
        assert_eq!(first, second);
    }
}
