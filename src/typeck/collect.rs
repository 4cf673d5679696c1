//! Passes 1 and 2: type discovery and function signatures.
//!
//! Pass 1 registers every struct, class and enum, validates their shape,
//! and collects top-level variables (inferring from initializers). Pass 2
//! enters global function signatures into the function table; nested
//! functions are synthesized later by the code generator.

use super::context::{ClassInfo, FunctionInfo, StructInfo, VarInfo};
use super::error::TypeErrorKind;
use super::TypeChecker;
use crate::ast::*;

impl TypeChecker {
    // ============ Pass 1: type discovery ============

    pub(crate) fn pass_types(&mut self, program: &Program) -> bool {
        let mark = self.errors.len();

        for stmt in &program.statements {
            if let StmtKind::Enum(decl) = &stmt.kind {
                self.collect_enum(decl, stmt.line);
            }
        }
        for stmt in &program.statements {
            if let StmtKind::Struct(decl) = &stmt.kind {
                self.collect_struct(decl, stmt.line);
            }
        }
        for stmt in &program.statements {
            if let StmtKind::Class(decl) = &stmt.kind {
                self.collect_class(decl, stmt.line);
            }
        }
        for stmt in &program.statements {
            if let StmtKind::Class(decl) = &stmt.kind {
                self.validate_class_decl(decl, stmt.line);
            }
        }
        for stmt in &program.statements {
            if let StmtKind::VarDecl(decl) = &stmt.kind {
                self.process_var_declaration(decl, stmt.line);
            }
        }

        self.clean_since(mark)
    }

    fn collect_enum(&mut self, decl: &EnumDecl, line: u32) {
        if self.enum_table.contains_key(&decl.name)
            || self.struct_table.contains_key(&decl.name)
            || self.class_table.contains_key(&decl.name)
        {
            self.error(TypeErrorKind::DuplicateTypeName(decl.name.clone()), line);
            return;
        }
        let mut seen = std::collections::HashSet::new();
        for value in &decl.values {
            if !seen.insert(value.clone()) {
                self.error(
                    TypeErrorKind::DuplicateEnumValue {
                        owner: decl.name.clone(),
                        value: value.clone(),
                    },
                    line,
                );
            }
        }
        self.enum_table.insert(decl.name.clone(), decl.values.clone());
    }

    fn collect_struct(&mut self, decl: &StructDecl, line: u32) {
        if self.struct_table.contains_key(&decl.name) {
            self.error(TypeErrorKind::DuplicateStruct(decl.name.clone()), line);
            return;
        }
        if self.class_table.contains_key(&decl.name) || self.enum_table.contains_key(&decl.name) {
            self.error(TypeErrorKind::DuplicateTypeName(decl.name.clone()), line);
            return;
        }

        let mut seen = std::collections::HashSet::new();
        for field in &decl.fields {
            if !seen.insert(field.name.clone()) {
                self.error(
                    TypeErrorKind::DuplicateStructField {
                        field: field.name.clone(),
                        owner: decl.name.clone(),
                    },
                    line,
                );
            }
        }

        self.struct_table.insert(
            decl.name.clone(),
            StructInfo {
                name: decl.name.clone(),
                fields: decl.fields.clone(),
            },
        );
    }

    fn collect_class(&mut self, decl: &ClassDecl, line: u32) {
        if self.class_table.contains_key(&decl.name) {
            self.error(TypeErrorKind::DuplicateClass(decl.name.clone()), line);
            return;
        }
        if self.struct_table.contains_key(&decl.name) || self.enum_table.contains_key(&decl.name) {
            self.error(TypeErrorKind::DuplicateTypeName(decl.name.clone()), line);
            return;
        }

        let mut info = ClassInfo::new(decl.name.clone());
        info.fields = decl.fields.clone();
        for method in &decl.methods {
            info.method_info
                .insert(method.name.clone(), (method.return_type, method.visibility));
            info.method_static
                .insert(method.name.clone(), method.is_static);
        }
        if let Some(ctor) = &decl.constructor {
            info.has_constructor = true;
            info.constructor_params = ctor.params.clone();
            info.method_info.insert(
                "__init".to_owned(),
                (ValueType::Inferred, Visibility::Public),
            );
        }
        self.class_table.insert(decl.name.clone(), info);
    }

    fn validate_class_decl(&mut self, decl: &ClassDecl, line: u32) {
        let mut field_names = std::collections::HashSet::new();
        for field in &decl.fields {
            if !field_names.insert(field.name.clone()) {
                self.error(
                    TypeErrorKind::DuplicateClassField {
                        field: field.name.clone(),
                        owner: decl.name.clone(),
                    },
                    line,
                );
            }

            if field.ty == ValueType::Inferred {
                self.error(TypeErrorKind::FieldNeedsType(field.name.clone()), line);
                continue;
            }

            match field.ty {
                ValueType::Struct => {
                    if field.type_name.is_empty() {
                        self.error(
                            TypeErrorKind::FieldMissingTypeName(field.name.clone()),
                            line,
                        );
                    } else if !self.struct_table.contains_key(&field.type_name)
                        && !self.class_table.contains_key(&field.type_name)
                    {
                        self.error(
                            TypeErrorKind::UnknownFieldType {
                                type_name: field.type_name.clone(),
                                field: field.name.clone(),
                            },
                            line,
                        );
                    }
                }
                ValueType::Enum => {
                    if !self.enum_table.contains_key(&field.type_name) {
                        self.error(
                            TypeErrorKind::UnknownFieldType {
                                type_name: field.type_name.clone(),
                                field: field.name.clone(),
                            },
                            line,
                        );
                    }
                }
                _ => {}
            }

            if field.is_static {
                if let Some(default) = &field.default {
                    let default_ty = match default {
                        DefaultValue::Int(_) | DefaultValue::Float(_) => ValueType::Number,
                        DefaultValue::Str(_) => ValueType::String,
                        DefaultValue::Bool(_) => ValueType::Bool,
                        DefaultValue::Nil => ValueType::Inferred,
                    };
                    if default_ty != ValueType::Inferred && !field.ty.is_compatible(default_ty) {
                        self.error(
                            TypeErrorKind::StaticDefaultMismatch {
                                field: field.name.clone(),
                                expected: field.ty,
                                got: default_ty,
                            },
                            line,
                        );
                    }
                }
            }
        }

        let mut method_names = std::collections::HashSet::new();
        for method in &decl.methods {
            if !method_names.insert(method.name.clone()) {
                self.error(
                    TypeErrorKind::DuplicateMethod {
                        method: method.name.clone(),
                        owner: decl.name.clone(),
                    },
                    method.line,
                );
            }
            if method.name == "__init" {
                self.error(TypeErrorKind::ReservedInitName, method.line);
            }
        }

        self.check_class_fields_initialized(decl, line);
    }

    /// Public non-static fields without defaults must be assigned on `self`
    /// inside `__init`. Classes without a constructor are left alone; they
    /// fail later when instantiated.
    fn check_class_fields_initialized(&mut self, decl: &ClassDecl, line: u32) {
        let Some(ctor) = &decl.constructor else {
            return;
        };

        let mut initialized = std::collections::HashSet::new();
        for stmt in &ctor.body {
            if let StmtKind::FieldAssign { object, field, .. } = &stmt.kind {
                if matches!(object.kind, ExprKind::SelfRef) {
                    initialized.insert(field.clone());
                }
            }
        }

        for field in &decl.fields {
            if field.visibility == Visibility::Public
                && !field.is_static
                && field.default.is_none()
                && !initialized.contains(&field.name)
            {
                self.error(
                    TypeErrorKind::UninitializedField {
                        field: field.name.clone(),
                        owner: decl.name.clone(),
                    },
                    line,
                );
            }
        }
    }

    /// Top-level variable collection with inference from the initializer.
    fn process_var_declaration(&mut self, decl: &VarDecl, line: u32) {
        if self.symbol_table.contains_key(&decl.name) {
            self.error(TypeErrorKind::VarAlreadyDeclared(decl.name.clone()), line);
            return;
        }

        let mut ty = decl.ty;
        let mut is_function = false;
        let mut is_struct = false;
        let mut struct_type_name = String::new();

        if !decl.type_name.is_empty() {
            if self.struct_table.contains_key(&decl.type_name)
                || self.class_table.contains_key(&decl.type_name)
            {
                is_struct = true;
                ty = ValueType::Struct;
                struct_type_name = decl.type_name.clone();
            } else if self.enum_table.contains_key(&decl.type_name) {
                ty = ValueType::Enum;
                struct_type_name = decl.type_name.clone();
            } else if !matches!(decl.type_name.as_str(), "number" | "string" | "bool") {
                self.error(
                    TypeErrorKind::UnknownVarType {
                        type_name: decl.type_name.clone(),
                        var: decl.name.clone(),
                    },
                    line,
                );
                return;
            }
        }

        if let Some(value) = &decl.value {
            match &value.kind {
                ExprKind::Lambda(_) => {
                    is_function = true;
                    if decl.ty != ValueType::Inferred && decl.ty != ValueType::Function {
                        self.error(TypeErrorKind::LambdaTypeMismatch(decl.ty), line);
                        return;
                    }
                    ty = ValueType::Function;
                }
                ExprKind::StructLit { name, .. } => {
                    is_struct = true;
                    ty = ValueType::Struct;
                    if struct_type_name.is_empty() {
                        struct_type_name = name.clone();
                    }
                    if self.class_table.contains_key(name) {
                        self.error(TypeErrorKind::BraceConstructedClass(name.clone()), line);
                        return;
                    }
                    if !self.struct_table.contains_key(name) {
                        self.error(TypeErrorKind::StructNotDefined(name.clone()), line);
                        return;
                    }
                    if !decl.type_name.is_empty() && decl.type_name != *name {
                        self.error(
                            TypeErrorKind::DeclTypeMismatch {
                                declared: decl.type_name.clone(),
                                actual: name.clone(),
                            },
                            line,
                        );
                        return;
                    }
                }
                ExprKind::ClassNew { class, .. } => {
                    is_struct = true;
                    ty = ValueType::Struct;
                    if struct_type_name.is_empty() {
                        struct_type_name = class.clone();
                    }
                    if !self.class_table.contains_key(class) {
                        self.error(TypeErrorKind::ClassNotDefined(class.clone()), value.line);
                        return;
                    }
                    if !decl.type_name.is_empty() && decl.type_name != *class {
                        self.error(
                            TypeErrorKind::DeclTypeMismatch {
                                declared: decl.type_name.clone(),
                                actual: class.clone(),
                            },
                            line,
                        );
                        return;
                    }
                }
                ExprKind::EnumAccess { enum_name, .. } => {
                    if ty == ValueType::Inferred {
                        ty = ValueType::Enum;
                    }
                    if struct_type_name.is_empty() {
                        struct_type_name = enum_name.clone();
                    }
                }
                ExprKind::Int(_) | ExprKind::Float(_) => {
                    if ty == ValueType::Inferred {
                        ty = ValueType::Number;
                    } else if !ty.is_compatible(ValueType::Number) {
                        self.error(
                            TypeErrorKind::DeclTypeMismatch {
                                declared: ty.to_string(),
                                actual: ValueType::Number.to_string(),
                            },
                            line,
                        );
                        return;
                    }
                }
                ExprKind::Str(_) => {
                    if ty == ValueType::Inferred {
                        ty = ValueType::String;
                    } else if !ty.is_compatible(ValueType::String) {
                        self.error(
                            TypeErrorKind::DeclTypeMismatch {
                                declared: ty.to_string(),
                                actual: ValueType::String.to_string(),
                            },
                            line,
                        );
                        return;
                    }
                }
                ExprKind::Bool(_) => {
                    if ty == ValueType::Inferred {
                        ty = ValueType::Bool;
                    } else if !ty.is_compatible(ValueType::Bool) {
                        self.error(
                            TypeErrorKind::DeclTypeMismatch {
                                declared: ty.to_string(),
                                actual: ValueType::Bool.to_string(),
                            },
                            line,
                        );
                        return;
                    }
                }
                _ => {}
            }
        } else {
            if ty == ValueType::Inferred && !is_struct {
                self.error(TypeErrorKind::MustInitialize(decl.name.clone()), line);
                return;
            }
            if !decl.optional && !is_struct {
                self.error(
                    TypeErrorKind::NonOptionalNeedsInit {
                        name: decl.name.clone(),
                        ty,
                    },
                    line,
                );
                return;
            }
        }

        let info = VarInfo {
            ty,
            is_const: decl.is_const,
            is_defined: true,
            is_optional: decl.optional,
            is_function,
            is_struct,
            struct_type_name,
        };
        self.symbol_table.insert(decl.name.clone(), info);
    }

    /// Pre-collect local declarations so later usage in the same body sees
    /// them, recursing into branches and loops.
    pub(crate) fn collect_local_variables(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::VarDecl(decl) => {
                    if decl.is_global {
                        continue;
                    }

                    let mut ty = decl.ty;
                    let mut is_function = false;
                    let mut is_struct = false;
                    let mut struct_type_name = decl.type_name.clone();

                    if ty == ValueType::Inferred {
                        if let Some(value) = &decl.value {
                            match &value.kind {
                                ExprKind::Int(_) | ExprKind::Float(_) => ty = ValueType::Number,
                                ExprKind::Str(_) => ty = ValueType::String,
                                ExprKind::Bool(_) => ty = ValueType::Bool,
                                ExprKind::Lambda(_) => {
                                    ty = ValueType::Function;
                                    is_function = true;
                                }
                                ExprKind::StructLit { name, .. } => {
                                    ty = ValueType::Struct;
                                    is_struct = true;
                                    if struct_type_name.is_empty() {
                                        struct_type_name = name.clone();
                                    }
                                }
                                ExprKind::ClassNew { class, .. } => {
                                    ty = ValueType::Struct;
                                    is_struct = true;
                                    if struct_type_name.is_empty() {
                                        struct_type_name = class.clone();
                                    }
                                }
                                ExprKind::EnumAccess { enum_name, .. } => {
                                    ty = ValueType::Enum;
                                    struct_type_name = enum_name.clone();
                                }
                                _ => ty = ValueType::Number,
                            }
                        }
                    }

                    let info = VarInfo {
                        ty,
                        is_const: decl.is_const,
                        is_defined: true,
                        is_optional: decl.optional,
                        is_function,
                        is_struct: is_struct || ty == ValueType::Struct,
                        struct_type_name,
                    };
                    self.symbol_table.insert(decl.name.clone(), info);
                }
                StmtKind::If(if_stmt) => {
                    self.collect_local_variables(&if_stmt.then_block);
                    for (_, branch) in &if_stmt.elseif_branches {
                        self.collect_local_variables(branch);
                    }
                    self.collect_local_variables(&if_stmt.else_block);
                }
                StmtKind::While { body, .. } => self.collect_local_variables(body),
                StmtKind::For { var, body, .. } => {
                    self.symbol_table
                        .entry(var.clone())
                        .or_insert_with(|| VarInfo::new(ValueType::Number, false));
                    self.collect_local_variables(body);
                }
                StmtKind::Repeat { body, .. } => self.collect_local_variables(body),
                _ => {}
            }
        }
    }

    // ============ Pass 2: function signatures ============

    pub(crate) fn pass_signatures(&mut self, program: &Program) -> bool {
        let mark = self.errors.len();

        for stmt in &program.statements {
            if let StmtKind::Function(func) = &stmt.kind {
                self.collect_function_signature(func, stmt.line);
            }
        }

        self.clean_since(mark)
    }

    fn collect_function_signature(&mut self, func: &FunctionDecl, line: u32) {
        if func.is_global && self.function_table.contains_key(&func.name) {
            self.error(TypeErrorKind::FunctionAlreadyDeclared(func.name.clone()), line);
            return;
        }

        for param in &func.params {
            if param.ty == ValueType::Inferred {
                self.error(
                    TypeErrorKind::ParamNeedsType {
                        param: param.name.clone(),
                        function: func.name.clone(),
                    },
                    line,
                );
                return;
            }
        }

        if func.is_global {
            self.function_table.insert(
                func.name.clone(),
                FunctionInfo {
                    name: func.name.clone(),
                    return_type: func.return_type,
                    params: func.params.clone(),
                    is_global: true,
                },
            );
        }
    }
}
