//! Expression lowering.
//!
//! Contracts: integer literals emit `N.0`; nil emits the per-target-type
//! sentinel; `..` stringifies each operand then concatenates; `**` and
//! `//` lower through `pow`/`floor`; the Lua ternary idiom
//! `(cond and t or f)` becomes a single C ternary; `opt or default`
//! branches on the per-type nil predicate; force-unwrap is identity.

use super::Codegen;
use crate::ast::*;

impl Codegen {
    pub(crate) fn compile_expr(&mut self, expr: &Expr) -> String {
        self.compile_expr_expecting(expr, ValueType::Inferred, false)
    }

    pub(crate) fn compile_expr_expecting(
        &mut self,
        expr: &Expr,
        expected: ValueType,
        for_global_init: bool,
    ) -> String {
        match &expr.kind {
            ExprKind::Int(n) => format!("{}.0", n),
            ExprKind::Float(x) => self.double_to_string(*x),
            ExprKind::Str(s) => format!("\"{}\"", s),
            ExprKind::Bool(b) => (if *b { "1" } else { "0" }).to_owned(),
            ExprKind::Nil => self.nil_sentinel(expected).to_owned(),
            ExprKind::Var(name) => name.clone(),
            ExprKind::SelfRef => "self".to_owned(),
            ExprKind::EnumAccess { enum_name, value } => {
                self.compile_enum_access(enum_name, value, expr.line)
            }
            ExprKind::Call { name, args } => self.compile_call(name, args, expr.line),
            ExprKind::MethodCall {
                object,
                method,
                args,
            } => {
                let result = self.compile_method_call(object, method, args, expr.line);
                if result.is_empty() {
                    "0".to_owned()
                } else {
                    result
                }
            }
            ExprKind::ForceUnwrap(operand) => {
                // Nil-safety was proven by the checker; unwrap is identity.
                self.compile_expr_expecting(operand, expected, for_global_init)
            }
            ExprKind::Binary { op, left, right } => {
                self.compile_binary(*op, left, right, expected, for_global_init)
            }
            ExprKind::Unary { op, operand } => {
                let compiled = self.compile_expr_expecting(operand, expected, for_global_init);
                match op {
                    UnaryOp::Neg => format!("(-{})", compiled),
                    UnaryOp::Not => {
                        // `not` on an optional struct value is a presence test.
                        if self.infer_expr_type(operand) == ValueType::Struct {
                            match &operand.kind {
                                ExprKind::Var(name) => {
                                    if self
                                        .symbol_table
                                        .get(name)
                                        .map(|info| info.is_optional)
                                        .unwrap_or(false)
                                    {
                                        return format!("(isnan({}))", compiled);
                                    }
                                }
                                ExprKind::FieldAccess { .. } => {
                                    return format!("(isnan({}))", compiled);
                                }
                                _ => {}
                            }
                        }
                        format!("(!{})", compiled)
                    }
                }
            }
            ExprKind::StructLit {
                name,
                named,
                positional,
                use_defaults,
            } => {
                if for_global_init {
                    self.compile_struct_initializer(name, named, positional, *use_defaults, expr.line)
                } else {
                    self.compile_struct_constructor(name, named, positional, *use_defaults, expr.line)
                }
            }
            ExprKind::FieldAccess { object, field } => {
                // `ClassName.field` reads a static class field.
                if let ExprKind::Var(name) = &object.kind {
                    if self.class_table.contains_key(name) && !self.symbol_table.contains_key(name)
                    {
                        let is_static = self.class_table[name]
                            .field(field)
                            .map(|f| f.is_static)
                            .unwrap_or(false);
                        if is_static {
                            return format!("{}_{}", name, field);
                        }
                        self.error(
                            format!("Field '{}' is not static in class '{}'", field, name),
                            expr.line,
                        );
                        return "0".to_owned();
                    }
                }
                self.compile_field_access(object, field)
            }
            ExprKind::ClassNew { class, args } => {
                self.compile_class_instantiation(class, args, expr.line)
            }
            ExprKind::Lambda(_) => {
                // Lambdas only occur as variable initializers, which lift
                // them to file scope before this point.
                "0.0".to_owned()
            }
        }
    }

    fn compile_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        expected: ValueType,
        for_global_init: bool,
    ) -> String {
        if op == BinaryOp::NilCoalesce {
            let l = self.compile_expr_expecting(left, expected, for_global_init);
            let r = self.compile_expr_expecting(right, expected, for_global_init);
            return match self.infer_expr_type(left) {
                ValueType::String => format!("(({}) == NULL ? ({}) : ({}))", l, r, l),
                ValueType::Number => format!("(isnan({}) ? ({}) : ({}))", l, r, l),
                ValueType::Enum => format!("(({}) == -1 ? ({}) : ({}))", l, r, l),
                ValueType::Struct => format!("(isnan({}) ? ({}) : ({}))", l, r, l),
                _ => format!("(({}) == -1 ? ({}) : ({}))", l, r, l),
            };
        }

        if op == BinaryOp::Concat {
            let l = self.compile_expr_for_concat(left);
            let r = self.compile_expr_for_concat(right);
            return format!("hl_concat_strings({}, {})", l, r);
        }

        // Comparisons against nil test the per-type sentinel; a plain
        // `x != NaN` would be vacuously true in C.
        if matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
            let nil_side = matches!(left.kind, ExprKind::Nil) || matches!(right.kind, ExprKind::Nil);
            if nil_side && !(matches!(left.kind, ExprKind::Nil) && matches!(right.kind, ExprKind::Nil)) {
                let target = if matches!(left.kind, ExprKind::Nil) {
                    right
                } else {
                    left
                };
                let ty = self.infer_expr_type(target);
                let compiled = self.compile_expr_expecting(target, ty, for_global_init);
                let check = self.nil_check(&compiled, ty);
                return if op == BinaryOp::Ne {
                    format!("(!{})", check)
                } else {
                    format!("({})", check)
                };
            }
        }

        if op == BinaryOp::Pow {
            let l = self.compile_expr_expecting(left, expected, for_global_init);
            let r = self.compile_expr_expecting(right, expected, for_global_init);
            return format!("pow({}, {})", l, r);
        }

        if op == BinaryOp::FloorDiv {
            let l = self.compile_expr_expecting(left, expected, for_global_init);
            let r = self.compile_expr_expecting(right, expected, for_global_init);
            return format!("(double)floor(({}) / ({}))", l, r);
        }

        // `%` on doubles needs fmod.
        if op == BinaryOp::Mod {
            let l = self.compile_expr_expecting(left, expected, for_global_init);
            let r = self.compile_expr_expecting(right, expected, for_global_init);
            return format!("fmod({}, {})", l, r);
        }

        if op == BinaryOp::Or {
            // Lua ternary idiom: an OR whose left side is an AND.
            if let ExprKind::Binary {
                op: BinaryOp::And,
                left: cond,
                right: then_value,
            } = &left.kind
            {
                let c = self.compile_expr_expecting(cond, expected, for_global_init);
                let t = self.compile_expr_expecting(then_value, expected, for_global_init);
                let f = self.compile_expr_expecting(right, expected, for_global_init);
                return format!("({}) ? {} : {}", c, t, f);
            }

            // `value or default` on an optional left side is a nil-coalesce;
            // everything else is plain logical or.
            let left_ty = self.infer_expr_type(left);
            let l = self.compile_expr_expecting(left, expected, for_global_init);
            let r = self.compile_expr_expecting(right, expected, for_global_init);
            if self.is_optional_expr(left) {
                match left_ty {
                    ValueType::String => {
                        return format!("(!hl_is_nil_string({}) ? ({}) : ({}))", l, l, r)
                    }
                    ValueType::Number => {
                        return format!("(!hl_is_nil_number({}) ? ({}) : ({}))", l, l, r)
                    }
                    ValueType::Bool => {
                        return format!("(!hl_is_nil_bool({}) ? ({}) : ({}))", l, l, r)
                    }
                    ValueType::Enum => return format!("(({}) != -1 ? ({}) : ({}))", l, l, r),
                    ValueType::Struct => {
                        return format!("(!hl_is_nil_number({}) ? ({}) : ({}))", l, l, r)
                    }
                    _ => {}
                }
            }
            return format!("({} || {})", l, r);
        }

        let l = self.compile_expr_expecting(left, expected, for_global_init);
        let r = self.compile_expr_expecting(right, expected, for_global_init);
        let op_str = match op {
            BinaryOp::Add => " + ",
            BinaryOp::Sub => " - ",
            BinaryOp::Mul => " * ",
            BinaryOp::Div => " / ",
            BinaryOp::Eq => " == ",
            BinaryOp::Ne => " != ",
            BinaryOp::Lt => " < ",
            BinaryOp::Le => " <= ",
            BinaryOp::Gt => " > ",
            BinaryOp::Ge => " >= ",
            BinaryOp::And => " && ",
            _ => " + ",
        };
        format!("({}{}{})", l, op_str, r)
    }

    /// Lower one operand of `..`, inserting the type-specific
    /// stringification helper.
    pub(crate) fn compile_expr_for_concat(&mut self, expr: &Expr) -> String {
        if let ExprKind::Call { name, .. } = &expr.kind {
            if name == "tostring" {
                return self.compile_expr(expr);
            }
        }

        // A ternary over two strings already produces a string.
        if let ExprKind::Binary {
            op: BinaryOp::Or,
            left,
            right,
        } = &expr.kind
        {
            if let ExprKind::Binary {
                op: BinaryOp::And,
                right: then_value,
                ..
            } = &left.kind
            {
                if self.infer_expr_type(then_value) == ValueType::String
                    && self.infer_expr_type(right) == ValueType::String
                {
                    return self.compile_expr(expr);
                }
            }
        }

        let ty = self.infer_expr_type(expr);
        let compiled = self.compile_expr(expr);
        match ty {
            ValueType::Number => format!("hl_tostring_number({})", compiled),
            ValueType::Bool => format!("hl_tostring_bool({})", compiled),
            ValueType::String => compiled,
            ValueType::Enum => format!("hl_tostring_number((double){})", compiled),
            _ => format!("hl_tostring_string({})", compiled),
        }
    }

    /// The generator's own view of an expression's type; everything it
    /// needs was established by the checker, so unknowns fall to defaults.
    pub(crate) fn infer_expr_type(&self, expr: &Expr) -> ValueType {
        match &expr.kind {
            ExprKind::Int(_) | ExprKind::Float(_) => ValueType::Number,
            ExprKind::Str(_) => ValueType::String,
            ExprKind::Bool(_) => ValueType::Bool,
            ExprKind::Nil => ValueType::Inferred,
            ExprKind::Var(name) => self
                .symbol_table
                .get(name)
                .map(|info| info.ty)
                .unwrap_or(ValueType::Inferred),
            ExprKind::SelfRef => ValueType::Struct,
            ExprKind::EnumAccess { .. } => ValueType::Enum,
            ExprKind::Lambda(_) => ValueType::Function,
            ExprKind::Call { name, .. } => match name.as_str() {
                "tostring" | "type" => ValueType::String,
                "tonumber" => ValueType::Number,
                _ => self
                    .function_table
                    .get(name)
                    .map(|info| info.return_type)
                    .unwrap_or(ValueType::Number),
            },
            ExprKind::MethodCall { object, method, .. } => {
                let class_name = match &object.kind {
                    ExprKind::Var(name) => {
                        if let Some(info) = self.symbol_table.get(name) {
                            info.struct_type_name.clone()
                        } else if self.class_table.contains_key(name) {
                            name.clone()
                        } else {
                            String::new()
                        }
                    }
                    ExprKind::SelfRef => self.current_class.clone(),
                    _ => String::new(),
                };
                self.class_table
                    .get(&class_name)
                    .and_then(|info| info.method_info.get(method))
                    .map(|&(ty, _)| ty)
                    .unwrap_or(ValueType::Inferred)
            }
            ExprKind::ClassNew { .. } | ExprKind::StructLit { .. } => ValueType::Struct,
            ExprKind::ForceUnwrap(operand) => self.infer_expr_type(operand),
            ExprKind::Binary { op, left, right } => match op {
                BinaryOp::Concat => ValueType::String,
                BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
                | BinaryOp::And => ValueType::Bool,
                BinaryOp::Or => {
                    // The ternary idiom and `opt or default` produce values.
                    if let ExprKind::Binary {
                        op: BinaryOp::And,
                        right: then_value,
                        ..
                    } = &left.kind
                    {
                        let ty = self.infer_expr_type(then_value);
                        if ty != ValueType::Inferred {
                            return ty;
                        }
                        return self.infer_expr_type(right);
                    }
                    if self.is_optional_expr(left) {
                        return self.infer_expr_type(left);
                    }
                    ValueType::Bool
                }
                BinaryOp::NilCoalesce => self.infer_expr_type(right),
                _ => ValueType::Number,
            },
            ExprKind::Unary { op, .. } => match op {
                UnaryOp::Not => ValueType::Bool,
                UnaryOp::Neg => ValueType::Number,
            },
            ExprKind::FieldAccess { object, field } => self.infer_field_access_type(object, field),
        }
    }

    pub(crate) fn infer_field_access_type(&self, object: &Expr, field: &str) -> ValueType {
        let container = self.struct_type_name_of(object);
        if container.is_empty() {
            return ValueType::Inferred;
        }
        if let Some(info) = self.class_table.get(&container) {
            if let Some(f) = info.field(field) {
                return f.ty;
            }
        }
        if let Some(info) = self.struct_table.get(&container) {
            if let Some(f) = info.field(field) {
                return f.ty;
            }
        }
        ValueType::Inferred
    }

    /// Resolve the struct/class name an object expression evaluates to,
    /// walking chains of field accesses.
    pub(crate) fn struct_type_name_of(&self, object: &Expr) -> String {
        match &object.kind {
            ExprKind::Var(name) => {
                if let Some(info) = self.symbol_table.get(name) {
                    info.struct_type_name.clone()
                } else if self.class_table.contains_key(name) {
                    name.clone()
                } else {
                    String::new()
                }
            }
            ExprKind::SelfRef => self.current_class.clone(),
            ExprKind::FieldAccess { object, field } => {
                let owner = self.struct_type_name_of(object);
                if owner.is_empty() {
                    return String::new();
                }
                if let Some(info) = self.class_table.get(&owner) {
                    if let Some(f) = info.field(field) {
                        if f.ty == ValueType::Struct && !f.type_name.is_empty() {
                            return f.type_name.clone();
                        }
                        return owner;
                    }
                }
                if let Some(info) = self.struct_table.get(&owner) {
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

    /// Whether an expression references any variable (such initializers
    /// cannot run at file scope and defer to `main`).
    pub(crate) fn contains_variables(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Var(_) => true,
            ExprKind::Call { args, .. } => args.iter().any(|a| self.contains_variables(a)),
            ExprKind::MethodCall { object, args, .. } => {
                self.contains_variables(object) || args.iter().any(|a| self.contains_variables(a))
            }
            ExprKind::Binary { left, right, .. } => {
                self.contains_variables(left) || self.contains_variables(right)
            }
            ExprKind::Unary { operand, .. } => self.contains_variables(operand),
            ExprKind::StructLit {
                named, positional, ..
            } => {
                named.iter().any(|(_, v)| self.contains_variables(v))
                    || positional.iter().any(|v| self.contains_variables(v))
            }
            ExprKind::FieldAccess { object, .. } => self.contains_variables(object),
            ExprKind::ForceUnwrap(operand) => self.contains_variables(operand),
            _ => false,
        }
    }

    pub(crate) fn is_optional_expr(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Var(name) => self
                .symbol_table
                .get(name)
                .map(|info| info.is_optional)
                .unwrap_or(false),
            ExprKind::ForceUnwrap(operand) => self.is_optional_expr(operand),
            _ => false,
        }
    }
}
