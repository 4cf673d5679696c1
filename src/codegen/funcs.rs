//! Function, nested-function and lambda emission, and call lowering.
//!
//! Nested functions lift to file-scope `static` functions whose parameter
//! list is prepended with the enclosing function's parameters; calls
//! inside the enclosing function forward those parameters implicitly.
//! Lambdas lift under their variable's name, or `__lambda_<base>_<N>`.

use super::Codegen;
use crate::ast::*;
use crate::typeck::{FunctionInfo, VarInfo};

impl Codegen {
    pub(crate) fn compile_call(&mut self, name: &str, args: &[Expr], line: u32) -> String {
        match name {
            "tostring" => {
                if args.len() != 1 {
                    self.error("tostring() expects exactly 1 argument", line);
                    return String::new();
                }
                let arg = self.compile_expr(&args[0]);
                return match self.infer_expr_type(&args[0]) {
                    ValueType::Number => format!("hl_tostring_number({})", arg),
                    ValueType::String => format!("hl_tostring_string({})", arg),
                    ValueType::Bool => format!("hl_tostring_bool({})", arg),
                    _ => format!("hl_tostring_number({})", arg),
                };
            }
            "tonumber" => {
                if args.len() != 1 {
                    self.error("tonumber() expects exactly 1 argument", line);
                    return String::new();
                }
                let arg = self.compile_expr(&args[0]);
                let arg_ty = self.infer_expr_type(&args[0]);
                if arg_ty == ValueType::String || arg_ty == ValueType::Inferred {
                    return format!("hl_tonumber({})", arg);
                }
                self.error("tonumber() expects a string argument", line);
                return String::new();
            }
            "print" => {
                self.error("print() should be used as a statement, not an expression", line);
                return String::new();
            }
            "type" => {
                if args.len() != 1 {
                    self.error("type() expects exactly 1 argument", line);
                    return String::new();
                }
                let _ = self.compile_expr(&args[0]);
                return match self.infer_expr_type(&args[0]) {
                    ValueType::Number => "\"number\"".to_owned(),
                    ValueType::String => "\"string\"".to_owned(),
                    ValueType::Bool => "\"bool\"".to_owned(),
                    ValueType::Inferred => "\"nil\"".to_owned(),
                    _ => "\"unknown\"".to_owned(),
                };
            }
            _ => {}
        }

        if !self.check_function(name) {
            if self.symbol_table.get(name).map(|i| i.is_defined).unwrap_or(false) {
                self.error(
                    format!("Variable '{}' exists but is not callable as a function", name),
                    line,
                );
            } else {
                self.error(format!("Function '{}' is not declared", name), line);
            }
            return String::new();
        }

        let func_info = self.function_table[name].clone();
        let is_nested = !func_info.is_global;
        let param_count = func_info.params.len();
        let arg_count = args.len();
        let forwarded = if is_nested {
            self.current_function_params.len()
        } else {
            0
        };

        let expected_args = param_count - forwarded;
        let required_params = func_info.params[forwarded..]
            .iter()
            .filter(|p| !p.optional)
            .count();

        if arg_count < required_params {
            self.error(
                format!(
                    "Function '{}' requires at least {} argument(s), but got {}",
                    name, required_params, arg_count
                ),
                line,
            );
            return String::new();
        }
        if arg_count > expected_args {
            self.error(
                format!(
                    "Function '{}' expects at most {} argument(s), but got {}",
                    name, expected_args, arg_count
                ),
                line,
            );
            return String::new();
        }

        let mut result = format!("{}(", name);

        if is_nested {
            for (i, param) in self.current_function_params.clone().iter().enumerate() {
                result.push_str(&param.name);
                if i < forwarded - 1 || arg_count > 0 {
                    result.push_str(", ");
                }
            }
        }

        for (i, arg) in args.iter().enumerate() {
            let param_idx = forwarded + i;
            if param_idx < param_count {
                let param = func_info.params[param_idx].clone();
                if matches!(arg.kind, ExprKind::Nil) && param.optional {
                    result.push_str(self.nil_sentinel_arg(param.ty));
                } else {
                    result.push_str(&self.compile_expr_expecting(arg, param.ty, false));
                }
                if i < arg_count - 1 {
                    result.push_str(", ");
                }
            }
        }

        // Omitted trailing optionals receive their sentinels at the call site.
        let provided = forwarded + arg_count;
        for i in provided..param_count {
            if i > 0 || arg_count > 0 {
                result.push_str(", ");
            }
            result.push_str(self.nil_sentinel_arg(func_info.params[i].ty));
        }

        result.push(')');
        result
    }

    pub(crate) fn compile_function_decl(&mut self, func: &FunctionDecl, out: &mut String) {
        let saved_function =
            std::mem::replace(&mut self.current_function, func.name.clone());
        let saved_params =
            std::mem::replace(&mut self.current_function_params, func.params.clone());
        let saved_symbols = self.symbol_table.clone();

        for param in &func.params {
            self.bind_param(param);
        }

        for stmt in &func.body {
            if let StmtKind::Function(nested) = &stmt.kind {
                let mut merged = func.params.clone();
                merged.extend(nested.params.iter().cloned());
                self.function_table.insert(
                    nested.name.clone(),
                    FunctionInfo {
                        name: nested.name.clone(),
                        return_type: nested.return_type,
                        params: merged,
                        is_global: false,
                    },
                );
                let mut info = VarInfo::new(ValueType::Inferred, false);
                info.is_function = true;
                self.symbol_table.insert(nested.name.clone(), info);

                let mut lifted = String::new();
                self.compile_nested_function(nested, &func.params, &mut lifted);
                self.nested_function_decls.push_str(&lifted);
                self.nested_function_decls.push('\n');
            }
        }

        let actual_return_type = self.resolve_return_type(func);
        if func.is_global {
            if let Some(info) = self.function_table.get_mut(&func.name) {
                info.return_type = actual_return_type;
            }
        }

        let return_type = if func.name == "main" {
            "int".to_owned()
        } else {
            self.c_type(actual_return_type, &func.return_type_name)
        };

        out.push_str(&format!("{} {}(", return_type, func.name));
        for (i, param) in func.params.iter().enumerate() {
            let param_ty = if param.ty == ValueType::Inferred {
                ValueType::Number
            } else {
                param.ty
            };
            out.push_str(&format!(
                "{} {}",
                self.c_type(param_ty, &param.type_name),
                param.name
            ));
            if i < func.params.len() - 1 {
                out.push_str(", ");
            }
        }
        out.push_str(") {\n");

        let saved_indent = self.indent_level;
        self.indent_level = 1;

        // A user-defined main runs the deferred global initializers first.
        if func.name == "main" {
            for (name, code) in std::mem::take(&mut self.deferred_global_inits) {
                out.push_str(&self.indent());
                out.push_str(&code);
                out.push('\n');
                if let Some(info) = self.symbol_table.get_mut(&name) {
                    info.is_defined = true;
                }
            }
        }

        for stmt in &func.body {
            if matches!(stmt.kind, StmtKind::Function(_)) {
                continue;
            }
            self.compile_statement(stmt, out);
        }

        let has_return_at_end = matches!(
            func.body.last().map(|s| &s.kind),
            Some(StmtKind::Return(_))
        );
        if !has_return_at_end {
            out.push_str(&self.indent());
            if func.name == "main" {
                out.push_str("return 0;\n");
            } else {
                out.push_str(match actual_return_type {
                    ValueType::Number => "return 0.0;\n",
                    ValueType::String => "return \"\";\n",
                    _ => "return 0;\n",
                });
            }
        }

        self.indent_level = saved_indent;
        out.push_str("}\n");

        self.symbol_table = saved_symbols;
        self.current_function = saved_function;
        self.current_function_params = saved_params;
    }

    fn resolve_return_type(&mut self, func: &FunctionDecl) -> ValueType {
        if func.return_type != ValueType::Inferred {
            return func.return_type;
        }

        for stmt in &func.body {
            if let StmtKind::Return(Some(value)) = &stmt.kind {
                let mut inferred = self.infer_expr_type(value);
                if inferred == ValueType::Inferred {
                    match &value.kind {
                        ExprKind::Call { name, .. } if name == "tostring" => {
                            inferred = ValueType::String;
                        }
                        ExprKind::Binary {
                            op: BinaryOp::Concat,
                            ..
                        } => inferred = ValueType::String,
                        _ => {}
                    }
                }
                if inferred != ValueType::Inferred {
                    return inferred;
                }
                if self.is_string_expr(value) {
                    return ValueType::String;
                }
                if self.is_number_expr(value) {
                    return ValueType::Number;
                }
                if self.is_bool_expr(value) {
                    return ValueType::Bool;
                }
                return ValueType::Inferred;
            }
        }

        ValueType::Inferred
    }

    pub(crate) fn compile_nested_function(
        &mut self,
        func: &FunctionDecl,
        parent_params: &[Param],
        out: &mut String,
    ) {
        let saved_function =
            std::mem::replace(&mut self.current_function, func.name.clone());
        let saved_symbols = self.symbol_table.clone();

        for param in parent_params {
            self.bind_param(param);
        }
        for param in &func.params {
            self.bind_param(param);
        }

        let actual_return_type = if func.return_type == ValueType::Inferred {
            ValueType::Number
        } else {
            func.return_type
        };

        out.push_str(&format!(
            "static {} {}(",
            self.c_type(actual_return_type, &func.return_type_name),
            func.name
        ));

        let total = parent_params.len() + func.params.len();
        let mut emitted = 0;
        for param in parent_params.iter().chain(&func.params) {
            let param_ty = if param.ty == ValueType::Inferred {
                ValueType::Number
            } else {
                param.ty
            };
            out.push_str(&format!(
                "{} {}",
                self.c_type(param_ty, &param.type_name),
                param.name
            ));
            emitted += 1;
            if emitted < total {
                out.push_str(", ");
            }
        }
        out.push_str(") {\n");

        let saved_indent = self.indent_level;
        self.indent_level = 1;

        for stmt in &func.body {
            self.compile_statement(stmt, out);
        }

        let has_return_at_end = matches!(
            func.body.last().map(|s| &s.kind),
            Some(StmtKind::Return(_))
        );
        if !has_return_at_end {
            out.push_str(&self.indent());
            out.push_str(match actual_return_type {
                ValueType::Number => "return 0.0;\n",
                ValueType::String => "return \"\";\n",
                _ => "return 0;\n",
            });
        }

        self.indent_level = saved_indent;
        out.push_str("}\n");

        self.symbol_table = saved_symbols;
        self.current_function = saved_function;
    }

    /// Lift a lambda to a file-scope static function. `func_name` is the
    /// variable the lambda was assigned to, or empty for a generated name.
    pub(crate) fn compile_lambda(
        &mut self,
        lambda: &LambdaDef,
        func_name: &mut String,
        out: &mut String,
    ) {
        if func_name.is_empty() {
            *func_name = self.unique_lambda_name("func");
        }

        let saved_function = std::mem::replace(&mut self.current_function, func_name.clone());
        let saved_params =
            std::mem::replace(&mut self.current_function_params, lambda.params.clone());
        let saved_symbols = self.symbol_table.clone();

        for param in &lambda.params {
            self.bind_param(param);
        }

        let mut actual_return_type = lambda.return_type;
        if actual_return_type == ValueType::Inferred {
            for stmt in &lambda.body {
                if let StmtKind::Return(Some(value)) = &stmt.kind {
                    actual_return_type = self.infer_expr_type(value);
                    break;
                }
            }
            if actual_return_type == ValueType::Inferred {
                actual_return_type = ValueType::Number;
            }
        }

        out.push_str(&format!(
            "static {} {}(",
            self.c_type(actual_return_type, &lambda.return_type_name),
            func_name
        ));
        for (i, param) in lambda.params.iter().enumerate() {
            let param_ty = if param.ty == ValueType::Inferred {
                ValueType::Number
            } else {
                param.ty
            };
            out.push_str(&format!(
                "{} {}",
                self.c_type(param_ty, &param.type_name),
                param.name
            ));
            if i < lambda.params.len() - 1 {
                out.push_str(", ");
            }
        }
        out.push_str(") {\n");

        let saved_indent = self.indent_level;
        self.indent_level = 1;

        for stmt in &lambda.body {
            self.compile_statement(stmt, out);
        }

        let has_return_at_end = matches!(
            lambda.body.last().map(|s| &s.kind),
            Some(StmtKind::Return(_))
        );
        if !has_return_at_end {
            out.push_str(&self.indent());
            out.push_str(match actual_return_type {
                ValueType::Number => "return 0.0;\n",
                ValueType::String => "return \"\";\n",
                _ => "return 0;\n",
            });
        }

        self.indent_level = saved_indent;
        out.push_str("}\n\n");

        // Lambdas take no implicit parent parameters, so calls to them
        // lower like calls to globals.
        self.function_table.insert(
            func_name.clone(),
            FunctionInfo {
                name: func_name.clone(),
                return_type: actual_return_type,
                params: lambda.params.clone(),
                is_global: true,
            },
        );

        self.symbol_table = saved_symbols;
        self.current_function = saved_function;
        self.current_function_params = saved_params;
    }

    pub(crate) fn bind_param(&mut self, param: &Param) {
        let ty = if param.ty == ValueType::Inferred {
            ValueType::Number
        } else {
            param.ty
        };
        let mut info = VarInfo::new(ty, param.optional);
        if matches!(ty, ValueType::Struct | ValueType::Enum) {
            info.is_struct = ty == ValueType::Struct;
            info.struct_type_name = param.type_name.clone();
        }
        self.symbol_table.insert(param.name.clone(), info);
    }

    fn is_string_expr(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Call { name, .. } => name == "tostring",
            ExprKind::Binary { op, left, right } => {
                *op == BinaryOp::Concat || self.is_string_expr(left) || self.is_string_expr(right)
            }
            ExprKind::Str(_) => true,
            ExprKind::Var(name) => self
                .symbol_table
                .get(name)
                .map(|info| info.ty == ValueType::String)
                .unwrap_or(false),
            _ => false,
        }
    }

    fn is_number_expr(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Int(_) | ExprKind::Float(_) => true,
            ExprKind::Binary { op, .. } => matches!(
                op,
                BinaryOp::Add
                    | BinaryOp::Sub
                    | BinaryOp::Mul
                    | BinaryOp::Div
                    | BinaryOp::Mod
                    | BinaryOp::Pow
                    | BinaryOp::FloorDiv
            ),
            _ => false,
        }
    }

    fn is_bool_expr(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Bool(_) => true,
            ExprKind::Binary { op, .. } => op.is_comparison(),
            ExprKind::Unary { op, .. } => *op == UnaryOp::Not,
            _ => false,
        }
    }
}
