//! Class, struct and enum lowering.
//!
//! Classes become value-type structs holding their non-static fields.
//! Constructors emit as `ClassName ClassName_new(...)` building `self` by
//! value; instance methods take `ClassName* self`; static methods mangle
//! to `ClassName_static_<name>`. Enum values mangle to `Enum_Value`.

use super::Codegen;
use crate::ast::*;
use crate::typeck::{ClassInfo, StructInfo, VarInfo};

impl Codegen {
    // ============ Enums ============

    pub(crate) fn compile_enum_decl(&mut self, decl: &EnumDecl) -> String {
        self.enum_table
            .insert(decl.name.clone(), decl.values.clone());

        let mut out = String::from("typedef enum {\n");
        for (i, value) in decl.values.iter().enumerate() {
            out.push_str(&format!("    {}_{}", decl.name, value));
            if i < decl.values.len() - 1 {
                out.push(',');
            }
            out.push('\n');
        }
        out.push_str(&format!("}} {};\n\n", decl.name));
        out
    }

    pub(crate) fn compile_enum_access(
        &mut self,
        enum_name: &str,
        value: &str,
        line: u32,
    ) -> String {
        let Some(values) = self.enum_table.get(enum_name) else {
            self.error(format!("Unknown enum '{}'", enum_name), line);
            return "0".to_owned();
        };
        if !values.iter().any(|v| v == value) {
            self.error(
                format!("Enum '{}' has no value '{}'", enum_name, value),
                line,
            );
            return "0".to_owned();
        }
        format!("{}_{}", enum_name, value)
    }

    // ============ Structs ============

    pub(crate) fn compile_struct_decl(&mut self, decl: &StructDecl, line: u32) {
        self.struct_table.insert(
            decl.name.clone(),
            StructInfo {
                name: decl.name.clone(),
                fields: decl.fields.clone(),
            },
        );

        let mut def = String::from("typedef struct {\n");
        for field in &decl.fields {
            let field_type = match field.ty {
                ValueType::Struct => {
                    if field.type_name.is_empty() {
                        self.error(
                            format!("Struct field '{}' has unknown struct type", field.name),
                            line,
                        );
                        "void*".to_owned()
                    } else {
                        field.type_name.clone()
                    }
                }
                ValueType::Enum => {
                    if field.type_name.is_empty() {
                        self.error(
                            format!("Struct field '{}' has unknown enum type", field.name),
                            line,
                        );
                        "int".to_owned()
                    } else {
                        field.type_name.clone()
                    }
                }
                other => self.c_type(other, ""),
            };
            def.push_str(&format!("    {} {};\n", field_type, field.name));
        }
        def.push_str(&format!("}} {};\n\n", decl.name));

        self.struct_defs.push((decl.name.clone(), def));
    }

    /// `(Name){...}` compound literal for value positions.
    pub(crate) fn compile_struct_constructor(
        &mut self,
        name: &str,
        named: &[(String, Expr)],
        positional: &[Expr],
        use_defaults: bool,
        line: u32,
    ) -> String {
        if !self.struct_table.contains_key(name) {
            self.error(format!("Struct '{}' not defined", name), line);
            return String::new();
        }
        let body = self.struct_literal_body(name, named, positional, use_defaults, line);
        format!("({}){{{}}}", name, body)
    }

    /// Brace initializer for global (file-scope) positions.
    pub(crate) fn compile_struct_initializer(
        &mut self,
        name: &str,
        named: &[(String, Expr)],
        positional: &[Expr],
        use_defaults: bool,
        line: u32,
    ) -> String {
        if !self.struct_table.contains_key(name) {
            self.error(format!("Struct '{}' not defined", name), line);
            return String::new();
        }
        let body = self.struct_literal_body(name, named, positional, use_defaults, line);
        format!("{{{}}}", body)
    }

    fn struct_literal_body(
        &mut self,
        name: &str,
        named: &[(String, Expr)],
        positional: &[Expr],
        use_defaults: bool,
        line: u32,
    ) -> String {
        let fields = self.struct_table[name].fields.clone();
        let mut parts: Vec<String> = Vec::new();

        if use_defaults {
            for field in &fields {
                parts.push(self.missing_field_value(
                    field.default.as_ref(),
                    field.ty,
                    field.optional,
                ));
            }
        } else if !positional.is_empty() {
            if positional.len() > fields.len() {
                self.error(format!("Too many arguments for struct '{}'", name), line);
                return String::new();
            }
            for (i, field) in fields.iter().enumerate() {
                if let Some(arg) = positional.get(i) {
                    parts.push(self.compile_expr_expecting(arg, field.ty, false));
                } else {
                    parts.push(self.missing_field_value(
                        field.default.as_ref(),
                        field.ty,
                        field.optional,
                    ));
                }
            }
        } else {
            for field in &fields {
                let provided = named.iter().find(|(field_name, _)| *field_name == field.name);
                if let Some((_, value)) = provided {
                    parts.push(self.compile_expr_expecting(value, field.ty, false));
                } else {
                    parts.push(self.missing_field_value(
                        field.default.as_ref(),
                        field.ty,
                        field.optional,
                    ));
                }
            }
        }

        parts.join(", ")
    }

    // ============ Classes ============

    /// Enter a class into the table so later declarations and bodies can
    /// resolve it before its own emission turn.
    pub(crate) fn register_class_info(&mut self, decl: &ClassDecl) {
        let mut info = ClassInfo::new(decl.name.clone());
        info.fields = decl.fields.clone();
        for method in &decl.methods {
            let mut return_type = method.return_type;
            // Static factories with inferred returns produce instances.
            if method.is_static
                && return_type == ValueType::Inferred
                && (method.name == "new"
                    || method.name.contains("create")
                    || method.name.contains("New"))
            {
                return_type = ValueType::Struct;
            }
            info.method_info
                .insert(method.name.clone(), (return_type, method.visibility));
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

    pub(crate) fn compile_class_decl(&mut self, decl: &ClassDecl, _line: u32) -> String {
        self.register_class_info(decl);

        let mut out = String::from("typedef struct {\n");
        for field in &decl.fields {
            if field.is_static {
                continue;
            }
            let field_type = match field.ty {
                ValueType::Struct | ValueType::Enum => field.type_name.clone(),
                other => self.c_type(other, ""),
            };
            out.push_str(&format!("    {} {};\n", field_type, field.name));
        }
        out.push_str(&format!("}} {};\n\n", decl.name));

        for field in &decl.fields {
            if !field.is_static {
                continue;
            }
            let field_type = match field.ty {
                ValueType::Enum => field.type_name.clone(),
                other => self.c_type(other, ""),
            };

            if field.is_const {
                out.push_str("static const ");
            } else {
                out.push_str("static ");
            }
            if field.visibility == Visibility::Private {
                out.push_str("/* private */ ");
            }
            out.push_str(&format!("{} {}_{}", field_type, decl.name, field.name));
            if let Some(default) = &field.default {
                out.push_str(&format!(" = {}", self.default_value_c(default, field.ty)));
            }
            out.push_str(";\n");
        }
        out.push('\n');

        if let Some(ctor) = &decl.constructor {
            out.push_str(&self.compile_constructor(&decl.name, ctor));
        }
        for method in &decl.methods {
            out.push_str(&self.compile_method(&decl.name, method));
        }

        out
    }

    fn compile_constructor(&mut self, class_name: &str, ctor: &ClassMethod) -> String {
        let saved_function = std::mem::replace(
            &mut self.current_function,
            format!("{}___init", class_name),
        );
        let saved_class = std::mem::replace(&mut self.current_class, class_name.to_owned());
        let saved_symbols = self.symbol_table.clone();
        let saved_indent = self.indent_level;

        let class_fields = self.class_table[class_name].fields.clone();

        let mut out = format!("{} {}_new(", class_name, class_name);
        for (i, param) in ctor.params.iter().enumerate() {
            // Prefer the field type of the matching class field.
            let field_type_name = class_fields
                .iter()
                .find(|f| f.name == param.name)
                .filter(|f| matches!(f.ty, ValueType::Struct | ValueType::Enum))
                .map(|f| f.type_name.clone())
                .unwrap_or_default();

            let param_type = match param.ty {
                ValueType::Struct => {
                    if !field_type_name.is_empty() {
                        field_type_name.clone()
                    } else if !param.type_name.is_empty() {
                        param.type_name.clone()
                    } else {
                        "void*".to_owned()
                    }
                }
                ValueType::Enum => {
                    if !field_type_name.is_empty() {
                        field_type_name.clone()
                    } else if !param.type_name.is_empty() {
                        param.type_name.clone()
                    } else {
                        "int".to_owned()
                    }
                }
                other => self.c_type(other, ""),
            };
            out.push_str(&format!("{} {}", param_type, param.name));
            if i < ctor.params.len() - 1 {
                out.push_str(", ");
            }
        }
        out.push_str(") {\n");
        self.indent_level = 1;

        out.push_str(&format!("{}{} self = {{0}};\n", self.indent(), class_name));

        self.symbol_table.insert(
            "self".to_owned(),
            VarInfo::new(ValueType::Struct, false).with_struct(class_name),
        );

        for param in &ctor.params {
            let field_type_name = class_fields
                .iter()
                .find(|f| f.name == param.name)
                .filter(|f| matches!(f.ty, ValueType::Struct | ValueType::Enum))
                .map(|f| f.type_name.clone())
                .unwrap_or_else(|| param.type_name.clone());

            let mut info = VarInfo::new(param.ty, param.optional);
            if matches!(param.ty, ValueType::Struct | ValueType::Enum) {
                info.is_struct = param.ty == ValueType::Struct;
                info.struct_type_name = field_type_name;
            }
            self.symbol_table.insert(param.name.clone(), info);
        }

        for stmt in &ctor.body {
            self.compile_statement(stmt, &mut out);
        }

        out.push_str(&format!("{}return self;\n", self.indent()));
        self.indent_level = saved_indent;
        out.push_str("}\n\n");

        self.symbol_table = saved_symbols;
        self.current_function = saved_function;
        self.current_class = saved_class;
        out
    }

    fn compile_method(&mut self, class_name: &str, method: &ClassMethod) -> String {
        let method_name = if method.is_static {
            format!("{}_static_{}", class_name, method.name)
        } else {
            format!("{}_{}", class_name, method.name)
        };

        let saved_function =
            std::mem::replace(&mut self.current_function, method_name.clone());
        let saved_class = std::mem::replace(&mut self.current_class, class_name.to_owned());
        let saved_symbols = self.symbol_table.clone();
        let saved_indent = self.indent_level;

        let mut actual_return_type = method.return_type;
        let mut has_return_value = false;
        for stmt in &method.body {
            if let StmtKind::Return(Some(value)) = &stmt.kind {
                has_return_value = true;
                if actual_return_type == ValueType::Inferred {
                    actual_return_type = self.infer_expr_type(value);
                }
                break;
            }
        }
        if actual_return_type == ValueType::Inferred
            && !has_return_value
            && method.is_static
            && (method.name == "new"
                || method.name.contains("create")
                || method.name.contains("New"))
        {
            actual_return_type = ValueType::Struct;
        }

        let return_type = match actual_return_type {
            ValueType::Struct => {
                if method.return_type_name.is_empty() {
                    class_name.to_owned()
                } else {
                    method.return_type_name.clone()
                }
            }
            ValueType::Inferred => {
                if has_return_value {
                    "double".to_owned()
                } else {
                    "void".to_owned()
                }
            }
            other => self.c_type(other, &method.return_type_name),
        };

        let mut out = format!("{} {}(", return_type, method_name);
        if !method.is_static {
            out.push_str(&format!("{}* self", class_name));
            if !method.params.is_empty() {
                out.push_str(", ");
            }
        }
        for (i, param) in method.params.iter().enumerate() {
            let param_type = match param.ty {
                ValueType::Struct => {
                    if param.type_name.is_empty() {
                        "void*".to_owned()
                    } else {
                        param.type_name.clone()
                    }
                }
                ValueType::Enum => {
                    if param.type_name.is_empty() {
                        "int".to_owned()
                    } else {
                        param.type_name.clone()
                    }
                }
                other => self.c_type(other, ""),
            };
            out.push_str(&format!("{} {}", param_type, param.name));
            if i < method.params.len() - 1 {
                out.push_str(", ");
            }
        }
        out.push_str(") {\n");
        self.indent_level = 1;

        if !method.is_static {
            self.symbol_table.insert(
                "self".to_owned(),
                VarInfo::new(ValueType::Struct, false).with_struct(class_name),
            );
        }
        for param in &method.params {
            let mut info = VarInfo::new(param.ty, param.optional);
            if matches!(param.ty, ValueType::Struct | ValueType::Enum) {
                info.is_struct = param.ty == ValueType::Struct;
                info.struct_type_name = param.type_name.clone();
            }
            self.symbol_table.insert(param.name.clone(), info);
        }

        for stmt in &method.body {
            self.compile_statement(stmt, &mut out);
        }

        let has_return_at_end = matches!(
            method.body.last().map(|s| &s.kind),
            Some(StmtKind::Return(_))
        );
        if !has_return_at_end && return_type != "void" {
            match actual_return_type {
                ValueType::Number | ValueType::Inferred => {
                    out.push_str(&format!("{}return 0.0;\n", self.indent()))
                }
                ValueType::String => out.push_str(&format!("{}return \"\";\n", self.indent())),
                ValueType::Bool => out.push_str(&format!("{}return 0;\n", self.indent())),
                ValueType::Struct => {
                    out.push_str(&format!("{}{} result = {{0}};\n", self.indent(), return_type));
                    out.push_str(&format!("{}return result;\n", self.indent()));
                }
                _ => out.push_str(&format!("{}return 0;\n", self.indent())),
            }
        }

        self.indent_level = saved_indent;
        out.push_str("}\n\n");

        self.symbol_table = saved_symbols;
        self.current_function = saved_function;
        self.current_class = saved_class;
        out
    }

    pub(crate) fn compile_method_call(
        &mut self,
        object: &Expr,
        method: &str,
        args: &[Expr],
        line: u32,
    ) -> String {
        let object_expr = self.compile_expr(object);

        let mut is_static = false;
        let mut class_name = String::new();

        match &object.kind {
            ExprKind::Var(name) => {
                if self.class_table.contains_key(name) {
                    is_static = true;
                    class_name = name.clone();
                } else if let Some(info) = self.symbol_table.get(name) {
                    if info.is_defined {
                        class_name = info.struct_type_name.clone();
                    } else {
                        self.error(
                            format!("Variable '{}' is declared but not initialized", name),
                            line,
                        );
                        return "0".to_owned();
                    }
                }
            }
            ExprKind::SelfRef => class_name = self.current_class.clone(),
            _ => {}
        }

        if class_name.is_empty() {
            self.error(
                format!("Cannot determine class type for method call '{}'", method),
                line,
            );
            return "0".to_owned();
        }
        if !self.class_table.contains_key(&class_name) {
            self.error(format!("Class '{}' not defined", class_name), line);
            return "0".to_owned();
        }
        if !self.class_table[&class_name].method_info.contains_key(method) {
            self.error(
                format!(
                    "Method '{}' does not exist in class '{}'",
                    method, class_name
                ),
                line,
            );
            return "0".to_owned();
        }

        let mut result;
        if is_static {
            result = format!("{}_static_{}(", class_name, method);
            for (i, arg) in args.iter().enumerate() {
                result.push_str(&self.compile_expr(arg));
                if i < args.len() - 1 {
                    result.push_str(", ");
                }
            }
        } else {
            result = format!("{}_{}(", class_name, method);

            // Inside a non-constructor method, `self` is already a pointer.
            let is_self_pointer = matches!(object.kind, ExprKind::SelfRef)
                && !self.current_function.contains("___init")
                && !self.current_class.is_empty();

            if is_self_pointer {
                result.push_str(&object_expr);
            } else {
                result.push_str(&format!("&({})", object_expr));
            }

            if !args.is_empty() {
                result.push_str(", ");
            }
            for (i, arg) in args.iter().enumerate() {
                result.push_str(&self.compile_expr(arg));
                if i < args.len() - 1 {
                    result.push_str(", ");
                }
            }
        }

        result.push(')');
        result
    }

    pub(crate) fn compile_field_access(&mut self, object: &Expr, field: &str) -> String {
        let object_expr = self.compile_expr(object);

        let is_self_pointer = matches!(object.kind, ExprKind::SelfRef)
            && !self.current_function.contains("___init")
            && !self.current_class.is_empty();

        if is_self_pointer {
            format!("{}->{}", object_expr, field)
        } else {
            format!("{}.{}", object_expr, field)
        }
    }

    pub(crate) fn compile_field_assignment(
        &mut self,
        object: &Expr,
        field: &str,
        value: &Expr,
        op: Option<BinaryOp>,
        line: u32,
        out: &mut String,
    ) {
        // `ClassName.field = v` writes a static field.
        if let ExprKind::Var(name) = &object.kind {
            if self.class_table.contains_key(name) && !self.symbol_table.contains_key(name) {
                let (is_static, is_const, field_ty) = self.class_table[name]
                    .field(field)
                    .map(|f| (f.is_static, f.is_const, f.ty))
                    .unwrap_or((false, false, ValueType::Inferred));

                if !is_static {
                    self.error(
                        format!("Field '{}' is not static in class '{}'", field, name),
                        line,
                    );
                    return;
                }
                if is_const {
                    self.error(format!("Cannot assign to const field '{}'", field), line);
                    return;
                }

                let target = format!("{}_{}", name, field);
                self.emit_target_assignment(&target, value, op, field_ty, out);
                return;
            }
        }

        let object_expr = self.compile_expr(object);

        let type_name = self.struct_type_name_of(object);
        if let Some(info) = self.class_table.get(&type_name) {
            if let Some(class_field) = info.field(field) {
                if class_field.is_const && !class_field.is_static {
                    if !self.current_function.contains("___init") {
                        self.error(
                            format!("Cannot assign to const field '{}' outside of constructor", field),
                            line,
                        );
                        return;
                    }
                    let key = format!("{}_{}", self.current_class, self.current_function);
                    let assigned = self.const_field_assignments.entry(key).or_default();
                    if !assigned.insert(field.to_owned()) {
                        self.error(
                            format!(
                                "Const field '{}' can only be assigned once in constructor",
                                field
                            ),
                            line,
                        );
                        return;
                    }
                }
            }
        }

        let accessor = if matches!(object.kind, ExprKind::SelfRef)
            && !self.current_function.contains("___init")
            && !self.current_class.is_empty()
        {
            "->"
        } else {
            "."
        };

        let field_ty = self.infer_field_access_type(object, field);
        let target = format!("{}{}{}", object_expr, accessor, field);
        self.emit_target_assignment(&target, value, op, field_ty, out);
    }

    /// Emit `target = ...` for a plain or compound assignment; `**=`, `//=`
    /// and `%=` expand through pow/floor/fmod.
    fn emit_target_assignment(
        &mut self,
        target: &str,
        value: &Expr,
        op: Option<BinaryOp>,
        expected: ValueType,
        out: &mut String,
    ) {
        let value_expr = self.compile_expr_expecting(value, expected, false);
        let line = match op {
            Some(BinaryOp::Pow) => format!("{} = pow({}, {});", target, target, value_expr),
            Some(BinaryOp::FloorDiv) => {
                format!("{} = (double)floor({} / {});", target, target, value_expr)
            }
            Some(BinaryOp::Mod) => format!("{} = fmod({}, {});", target, target, value_expr),
            Some(compound) => {
                let op_str = match compound {
                    BinaryOp::Add => " + ",
                    BinaryOp::Sub => " - ",
                    BinaryOp::Mul => " * ",
                    BinaryOp::Div => " / ",
                    _ => " + ",
                };
                format!("{} = {}{}{};", target, target, op_str, value_expr)
            }
            None => format!("{} = {};", target, value_expr),
        };
        out.push_str(&format!("{}{}\n", self.indent(), line));
    }

    pub(crate) fn compile_class_instantiation(
        &mut self,
        class: &str,
        args: &[Expr],
        line: u32,
    ) -> String {
        if !self.class_table.contains_key(class) {
            self.error(format!("Class '{}' not defined", class), line);
            return String::new();
        }

        let class_info = self.class_table[class].clone();
        if !class_info.has_constructor {
            self.error(format!("Class '{}' has no constructor", class), line);
            return String::new();
        }

        let params = &class_info.constructor_params;
        let total = params.len();
        let provided = args.len();

        let mut required = 0;
        for param in params {
            if param.optional {
                break;
            }
            required += 1;
        }

        if provided < required {
            self.error(
                format!(
                    "Constructor for '{}' requires at least {} argument(s), but got {}",
                    class, required, provided
                ),
                line,
            );
            return String::new();
        }
        if provided > total {
            self.error(
                format!(
                    "Constructor for '{}' expects at most {} argument(s), but got {}",
                    class, total, provided
                ),
                line,
            );
            return String::new();
        }

        let mut result = format!("{}_new(", class);

        for (i, arg) in args.iter().enumerate() {
            let param = &params[i];
            if matches!(arg.kind, ExprKind::Nil) && param.optional {
                result.push_str(self.nil_sentinel_arg(param.ty));
            } else {
                result.push_str(&self.compile_expr(arg));
            }
            if i < provided - 1 || provided < total {
                result.push_str(", ");
            }
        }

        for (i, param) in params.iter().enumerate().skip(provided) {
            result.push_str(self.nil_sentinel_arg(param.ty));
            if i < total - 1 {
                result.push_str(", ");
            }
        }

        result.push(')');
        result
    }
}
