//! Expression typing and validation.
//!
//! Every expression resolves to a `ValueType`; unknown names, bad operand
//! types and visibility violations are reported along the way. `Inferred`
//! flows out of positions the checker cannot pin down and is compatible
//! with everything.

use super::error::TypeErrorKind;
use super::TypeChecker;
use crate::ast::*;

impl TypeChecker {
    pub(crate) fn validate_expr(&mut self, expr: &Expr) -> ValueType {
        match &expr.kind {
            ExprKind::Int(_) | ExprKind::Float(_) => ValueType::Number,
            ExprKind::Str(_) => ValueType::String,
            ExprKind::Bool(_) => ValueType::Bool,
            ExprKind::Nil => ValueType::Inferred,
            ExprKind::Var(name) => self.validate_var(name, expr.line),
            ExprKind::SelfRef => ValueType::Struct,
            ExprKind::EnumAccess { .. } => ValueType::Enum,
            ExprKind::Lambda(_) => ValueType::Function,
            ExprKind::Call { name, args } => self.validate_call(name, args, expr.line),
            ExprKind::MethodCall {
                object,
                method,
                args,
            } => self.validate_method_call(object, method, args, expr.line),
            ExprKind::FieldAccess { object, field } => {
                self.validate_field_access(object, field, expr.line)
            }
            ExprKind::ClassNew { class, args } => {
                if !self.class_table.contains_key(class) {
                    self.error(TypeErrorKind::ClassNotDefined(class.clone()), expr.line);
                    return ValueType::Inferred;
                }
                for arg in args {
                    self.validate_expr(arg);
                }
                ValueType::Struct
            }
            ExprKind::StructLit {
                name,
                named,
                positional,
                ..
            } => self.validate_struct_lit(name, named, positional, expr.line),
            ExprKind::Binary { op, left, right } => {
                self.validate_binary(*op, left, right, expr.line)
            }
            ExprKind::Unary { op, operand } => self.validate_unary(*op, operand, expr.line),
            ExprKind::ForceUnwrap(operand) => self.validate_force_unwrap(operand, expr.line),
        }
    }

    fn validate_var(&mut self, name: &str, line: u32) -> ValueType {
        match self.symbol_table.get(name) {
            Some(info) => info.ty,
            None => {
                self.error(TypeErrorKind::VarNotDeclared(name.to_owned()), line);
                ValueType::Inferred
            }
        }
    }

    fn validate_call(&mut self, name: &str, args: &[Expr], line: u32) -> ValueType {
        // A function-typed local shadows everything else.
        if let Some(info) = self.symbol_table.get(name) {
            if info.is_function || info.ty == ValueType::Function {
                for arg in args {
                    self.validate_expr(arg);
                }
                return ValueType::Inferred;
            }
        }

        match name {
            "tostring" => {
                if args.len() != 1 {
                    self.error(TypeErrorKind::TostringArity, line);
                }
                for arg in args {
                    self.validate_expr(arg);
                }
                return ValueType::String;
            }
            "tonumber" => {
                if args.len() != 1 {
                    self.error(TypeErrorKind::TonumberArity, line);
                }
                for arg in args {
                    let ty = self.validate_expr(arg);
                    if ty != ValueType::String && ty != ValueType::Inferred {
                        self.error(TypeErrorKind::TonumberArg, line);
                    }
                }
                return ValueType::Number;
            }
            "type" => {
                if args.len() != 1 {
                    self.error(TypeErrorKind::TypeArity, line);
                }
                for arg in args {
                    self.validate_expr(arg);
                }
                return ValueType::String;
            }
            "print" => {
                for arg in args {
                    self.validate_expr(arg);
                }
                return ValueType::Inferred;
            }
            _ => {}
        }

        if let Some(info) = self.function_table.get(name) {
            let ret = info.return_type;
            for arg in args {
                self.validate_expr(arg);
            }
            return if ret == ValueType::Inferred {
                ValueType::Number
            } else {
                ret
            };
        }

        self.error(TypeErrorKind::FunctionNotDeclared(name.to_owned()), line);
        ValueType::Inferred
    }

    fn validate_method_call(
        &mut self,
        object: &Expr,
        method: &str,
        args: &[Expr],
        line: u32,
    ) -> ValueType {
        let mut class_name = String::new();
        let mut is_static_call = false;

        match &object.kind {
            ExprKind::Var(name) => {
                if self.class_table.contains_key(name) {
                    class_name = name.clone();
                    is_static_call = true;
                } else if let Some(info) = self.symbol_table.get(name) {
                    class_name = info.struct_type_name.clone();
                } else {
                    self.error(TypeErrorKind::VarNotDeclared(name.clone()), line);
                    return ValueType::Inferred;
                }
            }
            ExprKind::SelfRef => class_name = self.current_class.clone(),
            _ => {
                self.error(TypeErrorKind::MethodObjectUnknown(method.to_owned()), line);
                return ValueType::Inferred;
            }
        }

        if class_name.is_empty() {
            self.error(TypeErrorKind::MethodClassUnknown(method.to_owned()), line);
            return ValueType::Inferred;
        }

        let Some(info) = self.class_table.get(&class_name) else {
            self.error(TypeErrorKind::ClassNotDefined(class_name), line);
            return ValueType::Inferred;
        };

        let Some(&(return_type, visibility)) = info.method_info.get(method) else {
            self.error(
                TypeErrorKind::NoSuchMethod {
                    method: method.to_owned(),
                    owner: class_name,
                },
                line,
            );
            return ValueType::Inferred;
        };

        if !is_static_call
            && method != "__init"
            && visibility == Visibility::Private
            && self.current_class != class_name
        {
            self.error(
                TypeErrorKind::PrivateMethod {
                    method: method.to_owned(),
                    owner: class_name,
                },
                line,
            );
            return ValueType::Inferred;
        }

        for arg in args {
            self.validate_expr(arg);
        }

        return_type
    }

    fn validate_field_access(&mut self, object: &Expr, field: &str, line: u32) -> ValueType {
        // `ClassName.field` reads a static field.
        if let ExprKind::Var(name) = &object.kind {
            if self.class_table.contains_key(name) && !self.symbol_table.contains_key(name) {
                let info = &self.class_table[name];
                let Some(class_field) = info.field(field) else {
                    self.error(
                        TypeErrorKind::NoSuchClassField {
                            owner: name.clone(),
                            field: field.to_owned(),
                        },
                        line,
                    );
                    return ValueType::Inferred;
                };
                if !class_field.is_static {
                    self.error(
                        TypeErrorKind::FieldNotStatic {
                            field: field.to_owned(),
                            owner: name.clone(),
                        },
                        line,
                    );
                    return ValueType::Inferred;
                }
                let ty = class_field.ty;
                let visibility = class_field.visibility;
                if visibility == Visibility::Private && self.current_class != *name {
                    self.error(
                        TypeErrorKind::PrivateField {
                            field: field.to_owned(),
                            owner: name.clone(),
                        },
                        line,
                    );
                    return ValueType::Inferred;
                }
                return ty;
            }
        }

        let object_ty = self.validate_expr(object);
        if object_ty != ValueType::Struct {
            self.error(TypeErrorKind::FieldOnNonStruct, line);
            return ValueType::Inferred;
        }

        let container = self.container_type_name(object);
        if container.is_empty() {
            self.error(TypeErrorKind::FieldContainerUnknown(field.to_owned()), line);
            return ValueType::Inferred;
        }

        if let Some(info) = self.struct_table.get(&container) {
            if let Some(struct_field) = info.field(field) {
                return struct_field.ty;
            }
            self.error(
                TypeErrorKind::NoSuchStructField {
                    owner: container,
                    field: field.to_owned(),
                },
                line,
            );
            return ValueType::Inferred;
        }

        if let Some(info) = self.class_table.get(&container) {
            if let Some(class_field) = info.field(field) {
                let ty = class_field.ty;
                if class_field.visibility == Visibility::Private && self.current_class != container
                {
                    self.error(
                        TypeErrorKind::PrivateField {
                            field: field.to_owned(),
                            owner: container,
                        },
                        line,
                    );
                    return ValueType::Inferred;
                }
                return ty;
            }
            self.error(
                TypeErrorKind::NoSuchClassField {
                    owner: container,
                    field: field.to_owned(),
                },
                line,
            );
            return ValueType::Inferred;
        }

        self.error(TypeErrorKind::UnknownContainerType(container), line);
        ValueType::Inferred
    }

    /// Resolve the struct/class name an expression evaluates to, walking
    /// chains of field accesses.
    pub(crate) fn container_type_name(&self, object: &Expr) -> String {
        match &object.kind {
            ExprKind::Var(name) => self
                .symbol_table
                .get(name)
                .map(|info| info.struct_type_name.clone())
                .unwrap_or_default(),
            ExprKind::SelfRef => self.current_class.clone(),
            ExprKind::FieldAccess { object, field } => {
                let owner = self.container_type_name(object);
                if owner.is_empty() {
                    return String::new();
                }
                if let Some(info) = self.struct_table.get(&owner) {
                    if let Some(f) = info.field(field) {
                        if f.ty == ValueType::Struct && !f.type_name.is_empty() {
                            return f.type_name.clone();
                        }
                        return owner;
                    }
                } else if let Some(info) = self.class_table.get(&owner) {
                    if let Some(f) = info.field(field) {
                        if f.ty == ValueType::Struct && !f.type_name.is_empty() {
                            return f.type_name.clone();
                        }
                        return owner;
                    }
                }
                String::new()
            }
            _ => String::new(),
        }
    }

    fn validate_struct_lit(
        &mut self,
        name: &str,
        named: &[(String, Expr)],
        positional: &[Expr],
        line: u32,
    ) -> ValueType {
        if self.class_table.contains_key(name) {
            self.error(TypeErrorKind::BraceConstructedClass(name.to_owned()), line);
            return ValueType::Inferred;
        }
        if !self.struct_table.contains_key(name) {
            self.error(TypeErrorKind::StructNotDefined(name.to_owned()), line);
            return ValueType::Inferred;
        }

        for (field, value) in named {
            if self.struct_table[name].field(field).is_none() {
                self.error(
                    TypeErrorKind::NoSuchStructField {
                        owner: name.to_owned(),
                        field: field.clone(),
                    },
                    value.line,
                );
            }
            self.validate_expr(value);
        }
        for value in positional {
            self.validate_expr(value);
        }

        ValueType::Struct
    }

    fn validate_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        line: u32,
    ) -> ValueType {
        if op == BinaryOp::NilCoalesce {
            let left_ty = self.validate_expr(left);
            self.validate_expr(right);

            let left_is_optional = match &left.kind {
                ExprKind::Var(name) => self
                    .symbol_table
                    .get(name)
                    .map(|info| info.is_optional)
                    .unwrap_or(false),
                _ => false,
            };
            if !left_is_optional {
                self.error(TypeErrorKind::NilCoalesceNonOptional, line);
            }
            return left_ty;
        }

        let left_ty = self.validate_expr(left);
        let right_ty = self.validate_expr(right);

        if op.is_arithmetic() || matches!(op, BinaryOp::Pow | BinaryOp::FloorDiv) {
            if left_ty != ValueType::Number && left_ty != ValueType::Inferred {
                self.error(TypeErrorKind::LeftOperandNumber, line);
            }
            if right_ty != ValueType::Number && right_ty != ValueType::Inferred {
                self.error(TypeErrorKind::RightOperandNumber, line);
            }
            return ValueType::Number;
        }

        if op == BinaryOp::Concat {
            // Operands are stringified at codegen; anything without a
            // string form is rejected here.
            for ty in [left_ty, right_ty] {
                if matches!(ty, ValueType::Struct | ValueType::Function) {
                    self.error(TypeErrorKind::NotStringifiable(ty), line);
                }
            }
            return ValueType::String;
        }

        if op.is_comparison() {
            if left_ty != ValueType::Inferred
                && right_ty != ValueType::Inferred
                && !left_ty.is_compatible(right_ty)
            {
                self.error(
                    TypeErrorKind::CannotCompare {
                        left: left_ty,
                        right: right_ty,
                    },
                    line,
                );
            }
            return ValueType::Bool;
        }

        // `and` / `or` stay untyped; the Lua ternary idiom flows through them.
        ValueType::Inferred
    }

    fn validate_unary(&mut self, op: UnaryOp, operand: &Expr, line: u32) -> ValueType {
        let operand_ty = self.validate_expr(operand);
        match op {
            UnaryOp::Neg => {
                if operand_ty != ValueType::Number && operand_ty != ValueType::Inferred {
                    self.error(TypeErrorKind::CannotNegate, line);
                }
                ValueType::Number
            }
            UnaryOp::Not => ValueType::Bool,
        }
    }

    fn validate_force_unwrap(&mut self, operand: &Expr, line: u32) -> ValueType {
        let operand_ty = self.validate_expr(operand);

        let is_optional = match &operand.kind {
            ExprKind::Var(name) => self
                .symbol_table
                .get(name)
                .map(|info| info.is_optional)
                .unwrap_or(false),
            _ => false,
        };
        if !is_optional {
            self.error(TypeErrorKind::ForceUnwrapNonOptional, line);
        }

        operand_ty
    }
}
