//! Symbol table entries for the type checker.
//!
//! The checker owns one table per kind of name: variables, functions,
//! structs, classes and enums. Tables grow in ascending pass order and
//! only shrink when a local scope is restored from its snapshot.

use crate::ast::{ClassField, Param, StructField, ValueType, Visibility};
use std::collections::HashMap;

/// One variable (or parameter) in scope
#[derive(Debug, Clone, PartialEq)]
pub struct VarInfo {
    pub ty: ValueType,
    pub is_const: bool,
    pub is_defined: bool,
    pub is_optional: bool,
    pub is_function: bool,
    pub is_struct: bool,
    /// Names the struct/class type for struct-typed variables,
    /// or the enum type for enum-typed ones
    pub struct_type_name: String,
}

impl VarInfo {
    pub fn new(ty: ValueType, is_optional: bool) -> Self {
        Self {
            ty,
            is_const: false,
            is_defined: true,
            is_optional,
            is_function: false,
            is_struct: false,
            struct_type_name: String::new(),
        }
    }

    pub fn with_struct(mut self, type_name: impl Into<String>) -> Self {
        self.is_struct = true;
        self.struct_type_name = type_name.into();
        self
    }
}

/// A global (or lifted nested) function signature
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionInfo {
    pub name: String,
    pub return_type: ValueType,
    pub params: Vec<Param>,
    pub is_global: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructInfo {
    pub name: String,
    pub fields: Vec<StructField>,
}

impl StructInfo {
    pub fn field(&self, name: &str) -> Option<&StructField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassInfo {
    pub name: String,
    pub fields: Vec<ClassField>,
    /// method name → (return type, visibility)
    pub method_info: HashMap<String, (ValueType, Visibility)>,
    pub method_static: HashMap<String, bool>,
    pub has_constructor: bool,
    pub constructor_params: Vec<Param>,
}

impl ClassInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            method_info: HashMap::new(),
            method_static: HashMap::new(),
            has_constructor: false,
            constructor_params: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&ClassField> {
        self.fields.iter().find(|f| f.name == name)
    }
}
