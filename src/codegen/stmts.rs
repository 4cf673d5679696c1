//! Statement lowering: declarations, assignments, control flow, print.

use super::Codegen;
use crate::ast::*;
use crate::typeck::VarInfo;

impl Codegen {
    pub(crate) fn compile_statement(&mut self, stmt: &Stmt, out: &mut String) {
        match &stmt.kind {
            StmtKind::VarDecl(decl) => self.compile_var_decl(decl, stmt.line, out),
            StmtKind::Function(func) => self.compile_function_decl(func, out),
            StmtKind::Return(value) => self.compile_return(value.as_ref(), stmt.line, out),
            StmtKind::Assign { name, value, op } => {
                self.compile_assignment(name, value, *op, stmt.line, out)
            }
            StmtKind::FieldAssign {
                object,
                field,
                value,
                op,
            } => self.compile_field_assignment(object, field, value, *op, stmt.line, out),
            StmtKind::Print(args) => self.compile_print(args, stmt.line, out),
            StmtKind::If(if_stmt) => self.compile_if(if_stmt, out),
            StmtKind::While { condition, body } => self.compile_while(condition, body, out),
            StmtKind::For {
                var,
                start,
                end,
                step,
                body,
            } => self.compile_for(var, start, end, step.as_ref(), body, out),
            StmtKind::Repeat { body, condition } => self.compile_repeat(body, condition, out),
            StmtKind::Struct(decl) => self.compile_struct_decl(decl, stmt.line),
            StmtKind::Class(decl) => {
                let emitted = self.compile_class_decl(decl, stmt.line);
                out.push_str(&emitted);
            }
            StmtKind::Enum(decl) => {
                let emitted = self.compile_enum_decl(decl);
                out.push_str(&emitted);
            }
            StmtKind::InlineC(code) => {
                out.push_str(&self.indent());
                out.push_str(code);
                out.push('\n');
            }
            StmtKind::Expr(expr) => match &expr.kind {
                ExprKind::Call { name, args } => {
                    let result = self.compile_call(name, args, expr.line);
                    if !result.is_empty() {
                        out.push_str(&format!("{}{};\n", self.indent(), result));
                    }
                }
                ExprKind::MethodCall {
                    object,
                    method,
                    args,
                } => {
                    let result = self.compile_method_call(object, method, args, expr.line);
                    if !result.is_empty() {
                        out.push_str(&format!("{}{};\n", self.indent(), result));
                    }
                }
                _ => {
                    let result = self.compile_expr(expr);
                    out.push_str(&format!("{}{};\n", self.indent(), result));
                }
            },
        }
    }

    pub(crate) fn compile_var_decl(&mut self, decl: &VarDecl, line: u32, out: &mut String) {
        if decl.is_global {
            return;
        }

        let mut actual_type = decl.ty;
        let mut struct_type_name = decl.type_name.clone();

        if actual_type == ValueType::Inferred {
            if let Some(value) = &decl.value {
                actual_type = self.infer_expr_type(value);
                match &value.kind {
                    ExprKind::ClassNew { class, .. } => struct_type_name = class.clone(),
                    ExprKind::StructLit { name, .. } => struct_type_name = name.clone(),
                    ExprKind::MethodCall { object, .. } => {
                        if let ExprKind::Var(obj) = &object.kind {
                            if self.class_table.contains_key(obj)
                                && actual_type == ValueType::Struct
                            {
                                struct_type_name = obj.clone();
                            }
                        }
                    }
                    ExprKind::EnumAccess { enum_name, .. } => {
                        struct_type_name = enum_name.clone()
                    }
                    _ => {}
                }
            }
        } else if let Some(value) = &decl.value {
            if let ExprKind::EnumAccess { enum_name, .. } = &value.kind {
                if struct_type_name.is_empty() {
                    struct_type_name = enum_name.clone();
                }
            }
        }

        // Lambdas lift out; the declaration itself emits nothing.
        if let Some(value) = &decl.value {
            if let ExprKind::Lambda(lambda) = &value.kind {
                let mut func_name = decl.name.clone();
                let mut lifted = String::new();
                self.compile_lambda(lambda, &mut func_name, &mut lifted);
                self.nested_function_decls.push_str(&lifted);

                let mut info = VarInfo::new(ValueType::Function, decl.optional);
                info.is_const = decl.is_const;
                info.is_function = true;
                self.symbol_table.insert(decl.name.clone(), info);
                return;
            }
        }

        let ctype = match actual_type {
            // An optional struct variable is modeled as a numeric sentinel slot.
            ValueType::Struct if decl.optional && decl.value.is_none() => "double".to_owned(),
            ValueType::Struct if !struct_type_name.is_empty() => struct_type_name.clone(),
            ValueType::Struct => {
                self.error(
                    format!(
                        "Cannot determine struct type for variable '{}'. Please specify the exact type or provide a value from which the type can be inferred.",
                        decl.name
                    ),
                    line,
                );
                return;
            }
            ValueType::Enum if !struct_type_name.is_empty() => struct_type_name.clone(),
            other => self.c_type(other, ""),
        };

        out.push_str(&self.indent());
        if decl.is_const {
            out.push_str("const ");
        }
        out.push_str(&format!("{} {}", ctype, decl.name));

        if let Some(value) = &decl.value {
            let compiled = self.compile_expr_expecting(value, actual_type, false);
            out.push_str(&format!(" = {}", compiled));
        } else if decl.optional {
            out.push_str(&format!(" = {}", self.nil_sentinel(actual_type)));
        }
        out.push_str(";\n");

        let mut info = VarInfo::new(actual_type, decl.optional);
        info.is_const = decl.is_const;
        info.is_struct = actual_type == ValueType::Struct;
        info.struct_type_name = struct_type_name;
        self.symbol_table.insert(decl.name.clone(), info);
    }

    /// Emit a global declaration at file scope. Initializers that cannot
    /// run there (anything referencing a variable, or a class
    /// instantiation) are deferred into `main`.
    pub(crate) fn compile_global_var_decl(&mut self, decl: &VarDecl, global_decls: &mut String) {
        let mut actual_type = decl.ty;
        let mut struct_type_name = decl.type_name.clone();

        if actual_type == ValueType::Inferred {
            if let Some(value) = &decl.value {
                actual_type = self.infer_expr_type(value);
                if let ExprKind::EnumAccess { enum_name, .. } = &value.kind {
                    struct_type_name = enum_name.clone();
                }
            } else {
                actual_type = ValueType::Number;
            }
        }

        if let Some(value) = &decl.value {
            if let ExprKind::Lambda(lambda) = &value.kind {
                let mut func_name = decl.name.clone();
                let mut lifted = String::new();
                self.compile_lambda(lambda, &mut func_name, &mut lifted);
                self.nested_function_decls.push_str(&lifted);

                let mut info = VarInfo::new(ValueType::Function, decl.optional);
                info.is_const = decl.is_const;
                info.is_function = true;
                self.symbol_table.insert(decl.name.clone(), info);
                return;
            }
        }

        let mut ctype = self.c_type(actual_type, "");
        if actual_type == ValueType::Struct {
            if let Some(value) = &decl.value {
                match &value.kind {
                    ExprKind::StructLit { name, .. } => {
                        ctype = name.clone();
                        if struct_type_name.is_empty() {
                            struct_type_name = name.clone();
                        }
                    }
                    ExprKind::ClassNew { class, .. } => {
                        ctype = class.clone();
                        if struct_type_name.is_empty() {
                            struct_type_name = class.clone();
                        }
                    }
                    _ => {}
                }
            }
            if !decl.type_name.is_empty() {
                ctype = decl.type_name.clone();
                if struct_type_name.is_empty() {
                    struct_type_name = decl.type_name.clone();
                }
            }
        }
        if actual_type == ValueType::Enum && !struct_type_name.is_empty() {
            ctype = struct_type_name.clone();
        }

        // Decide whether the initializer is a constant expression.
        let mut can_init_globally = true;
        let mut init_expr = String::new();
        if let Some(value) = &decl.value {
            match &value.kind {
                ExprKind::ClassNew { .. } => can_init_globally = false,
                ExprKind::StructLit {
                    named, positional, ..
                } => {
                    let has_var = named
                        .iter()
                        .any(|(_, v)| matches!(v.kind, ExprKind::Var(_)))
                        || positional.iter().any(|v| matches!(v.kind, ExprKind::Var(_)));
                    if has_var {
                        can_init_globally = false;
                    } else {
                        init_expr = self.compile_expr_expecting(value, actual_type, true);
                    }
                }
                _ => {
                    if self.contains_variables(value) {
                        can_init_globally = false;
                    } else {
                        init_expr = self.compile_expr_expecting(value, actual_type, true);
                    }
                }
            }
        }

        if decl.is_const {
            global_decls.push_str("const ");
        }
        global_decls.push_str(&format!("{} {}", ctype, decl.name));

        if can_init_globally && !init_expr.is_empty() {
            global_decls.push_str(&format!(" = {};\n", init_expr));
        } else {
            if decl.value.is_none() && decl.optional {
                global_decls.push_str(&format!(" = {};\n", self.nil_sentinel(actual_type)));
            } else {
                global_decls.push_str(";\n");
            }

            // Deferred initializers run at the top of main, before any call
            // can observe the variable.
            if let Some(value) = &decl.value {
                let compiled = self.compile_expr_expecting(value, actual_type, false);
                self.deferred_global_inits
                    .push((decl.name.clone(), format!("{} = {};", decl.name, compiled)));
            }
        }

        let mut info = VarInfo::new(actual_type, decl.optional);
        info.is_const = decl.is_const;
        info.is_struct = actual_type == ValueType::Struct;
        info.struct_type_name = struct_type_name;
        self.symbol_table.insert(decl.name.clone(), info);
    }

    fn compile_assignment(
        &mut self,
        name: &str,
        value: &Expr,
        op: Option<BinaryOp>,
        line: u32,
        out: &mut String,
    ) {
        if !self.check_variable(name) {
            self.error(
                format!(
                    "Variable '{}' not defined. Use 'local' or 'global' to declare it.",
                    name
                ),
                line,
            );
            return;
        }

        let var_ty = self.symbol_table[name].ty;
        if self.symbol_table[name].is_const {
            self.error(format!("Cannot assign to const variable '{}'", name), line);
            return;
        }

        match op {
            Some(BinaryOp::Pow) => {
                let rhs = self.compile_expr_expecting(value, var_ty, false);
                out.push_str(&format!(
                    "{}{} = pow({}, {});\n",
                    self.indent(),
                    name,
                    name,
                    rhs
                ));
            }
            Some(BinaryOp::FloorDiv) => {
                let rhs = self.compile_expr_expecting(value, var_ty, false);
                out.push_str(&format!(
                    "{}{} = (double)floor({} / {});\n",
                    self.indent(),
                    name,
                    name,
                    rhs
                ));
            }
            Some(BinaryOp::Mod) => {
                let rhs = self.compile_expr_expecting(value, var_ty, false);
                out.push_str(&format!(
                    "{}{} = fmod({}, {});\n",
                    self.indent(),
                    name,
                    name,
                    rhs
                ));
            }
            Some(compound) => {
                let op_str = match compound {
                    BinaryOp::Add => " + ",
                    BinaryOp::Sub => " - ",
                    BinaryOp::Mul => " * ",
                    BinaryOp::Div => " / ",
                    _ => " + ",
                };
                let rhs = self.compile_expr_expecting(value, var_ty, false);
                out.push_str(&format!(
                    "{}{} = {}{}{};\n",
                    self.indent(),
                    name,
                    name,
                    op_str,
                    rhs
                ));
            }
            None => {
                let rhs = self.compile_expr_expecting(value, var_ty, false);
                out.push_str(&format!("{}{} = {};\n", self.indent(), name, rhs));
            }
        }
    }

    fn compile_return(&mut self, value: Option<&Expr>, line: u32, out: &mut String) {
        if self.current_function.is_empty() {
            self.error("Return statement outside of function", line);
            return;
        }

        out.push_str(&self.indent());
        out.push_str("return");
        if let Some(value) = value {
            let return_type = self
                .function_table
                .get(&self.current_function)
                .map(|info| info.return_type)
                .unwrap_or(ValueType::Inferred);
            let compiled = self.compile_expr_expecting(value, return_type, false);
            out.push_str(&format!(" {}", compiled));
        }
        out.push_str(";\n");
    }

    /// Compile an if condition, turning bare optional variables into
    /// nil-sentinel tests and narrowing them in the branch.
    fn compile_condition(&mut self, condition: &Expr, narrow: bool) -> String {
        if let ExprKind::Var(name) = &condition.kind {
            if let Some(info) = self.symbol_table.get(name).cloned() {
                if info.is_optional {
                    if narrow {
                        self.mark_non_nil(name);
                    }
                    return format!("!{}", self.nil_check(name, info.ty));
                }
                return name.clone();
            }
            return name.clone();
        }

        if let ExprKind::Unary {
            op: UnaryOp::Not,
            operand,
        } = &condition.kind
        {
            if let ExprKind::Var(name) = &operand.kind {
                if let Some(info) = self.symbol_table.get(name).cloned() {
                    if info.is_optional {
                        return self.nil_check(name, info.ty);
                    }
                }
                let compiled = self.compile_expr(operand);
                return format!("!{}", compiled);
            }
        }

        self.compile_expr(condition)
    }

    fn compile_if(&mut self, if_stmt: &IfStmt, out: &mut String) {
        self.push_scope();

        let condition = self.compile_condition(&if_stmt.condition, true);
        out.push_str(&format!("{}if ({}) {{\n", self.indent(), condition));
        self.indent_level += 1;
        for stmt in &if_stmt.then_block {
            self.compile_statement(stmt, out);
        }
        self.indent_level -= 1;
        self.pop_scope();

        for (elseif_condition, block) in &if_stmt.elseif_branches {
            self.push_scope();
            let condition = self.compile_condition(elseif_condition, true);
            out.push_str(&format!("{}}} else if ({}) {{\n", self.indent(), condition));
            self.indent_level += 1;
            for stmt in block {
                self.compile_statement(stmt, out);
            }
            self.indent_level -= 1;
            self.pop_scope();
        }

        out.push_str(&self.indent());
        out.push('}');

        if !if_stmt.else_block.is_empty() {
            self.push_scope();

            // `not x` and `x == nil` prove x non-nil on this side.
            match &if_stmt.condition.kind {
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand,
                } => {
                    if let ExprKind::Var(name) = &operand.kind {
                        if self
                            .symbol_table
                            .get(name)
                            .map(|info| info.is_optional)
                            .unwrap_or(false)
                        {
                            self.mark_non_nil(&name.clone());
                        }
                    }
                }
                ExprKind::Binary {
                    op: BinaryOp::Eq,
                    left,
                    right,
                } => {
                    if let (ExprKind::Var(name), ExprKind::Nil) = (&left.kind, &right.kind) {
                        self.mark_non_nil(&name.clone());
                    }
                }
                _ => {}
            }

            out.push_str(" else {\n");
            self.indent_level += 1;
            for stmt in &if_stmt.else_block {
                self.compile_statement(stmt, out);
            }
            self.indent_level -= 1;
            out.push_str(&self.indent());
            out.push('}');

            self.pop_scope();
        }

        out.push('\n');
    }

    fn compile_while(&mut self, condition: &Expr, body: &[Stmt], out: &mut String) {
        let compiled = self.compile_expr(condition);
        out.push_str(&format!("{}while ({}) {{\n", self.indent(), compiled));

        self.push_scope();
        self.indent_level += 1;
        for stmt in body {
            self.compile_statement(stmt, out);
        }
        self.indent_level -= 1;
        self.pop_scope();

        out.push_str(&format!("{}}}\n", self.indent()));
    }

    fn compile_for(
        &mut self,
        var: &str,
        start: &Expr,
        end: &Expr,
        step: Option<&Expr>,
        body: &[Stmt],
        out: &mut String,
    ) {
        self.push_scope();
        self.symbol_table
            .insert(var.to_owned(), VarInfo::new(ValueType::Number, false));

        let start_c = self.compile_expr(start);
        let end_c = self.compile_expr(end);
        let step_c = match step {
            Some(step) => self.compile_expr(step),
            None => "1.0".to_owned(),
        };
        out.push_str(&format!(
            "{}for (double {} = {}; {} <= {}; {} += {}) {{\n",
            self.indent(),
            var,
            start_c,
            var,
            end_c,
            var,
            step_c
        ));

        self.indent_level += 1;
        for stmt in body {
            self.compile_statement(stmt, out);
        }
        self.indent_level -= 1;

        out.push_str(&format!("{}}}\n", self.indent()));

        self.symbol_table.remove(var);
        self.pop_scope();
    }

    fn compile_repeat(&mut self, body: &[Stmt], condition: &Expr, out: &mut String) {
        self.push_scope();

        out.push_str(&format!("{}do {{\n", self.indent()));
        self.indent_level += 1;
        for stmt in body {
            self.compile_statement(stmt, out);
        }
        self.indent_level -= 1;

        let compiled = self.compile_expr(condition);
        out.push_str(&format!("{}}} while (!({}));\n", self.indent(), compiled));

        self.pop_scope();
    }

    fn compile_print(&mut self, args: &[PrintArg], line: u32, out: &mut String) {
        if args.is_empty() {
            out.push_str(&format!("{}hl_print_newline();\n", self.indent()));
            return;
        }

        for arg in args {
            match arg {
                PrintArg::Ident(name) => {
                    if !self.check_variable(name) {
                        self.error(
                            format!(
                                "Cannot print undefined variable '{}'. Variables must be declared before use.",
                                name
                            ),
                            line,
                        );
                        return;
                    }
                }
                PrintArg::Expr(expr) => {
                    if !self.validate_expr_for_print(expr) {
                        self.error("Undefined variable in expression", line);
                        return;
                    }
                }
            }
        }

        out.push_str(&self.indent());

        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                out.push_str(" hl_print_tab(); ");
            }

            match arg {
                PrintArg::Ident(name) => {
                    if self.class_table.contains_key(name) {
                        self.error(
                            format!("Cannot print class name directly: '{}'", name),
                            line,
                        );
                        return;
                    }
                    let info = self.symbol_table[name].clone();
                    let type_name = self.print_type_name(info.ty);
                    if info.is_optional {
                        out.push_str(&format!(
                            "if (hl_is_nil_{}({})) hl_print_no_newline(\"nil\"); else hl_print_{}_no_newline({});",
                            type_name, name, type_name, name
                        ));
                    } else {
                        out.push_str(&format!(
                            "hl_print_{}_no_newline({});",
                            type_name, name
                        ));
                    }
                }
                PrintArg::Expr(expr) => {
                    let compiled = self.compile_expr(expr);
                    let mut ty = self.infer_expr_type(expr);

                    // Static class fields print under their field type.
                    if let ExprKind::FieldAccess { object, field } = &expr.kind {
                        if let ExprKind::Var(class) = &object.kind {
                            if let Some(info) = self.class_table.get(class) {
                                if let Some(class_field) = info.field(field) {
                                    if class_field.is_static {
                                        let field_ty = class_field.ty;
                                        let type_name = self.print_type_name(field_ty);
                                        out.push_str(&format!(
                                            "hl_print_{}_no_newline({}_{});",
                                            type_name, class, field
                                        ));
                                        continue;
                                    }
                                }
                            }
                        }
                    }

                    if let ExprKind::Binary {
                        op: BinaryOp::Concat,
                        ..
                    } = &expr.kind
                    {
                        out.push_str(&format!("hl_print_string_no_newline({});", compiled));
                        continue;
                    }

                    if let ExprKind::MethodCall { object, method, .. } = &expr.kind {
                        if let ExprKind::Var(class) = &object.kind {
                            if let Some(info) = self.class_table.get(class) {
                                if let Some(&(ret, _)) = info.method_info.get(method) {
                                    ty = ret;
                                }
                            }
                        }
                    }

                    let type_name = self.print_type_name(ty);
                    if self.is_optional_expr(expr) && !matches!(expr.kind, ExprKind::ForceUnwrap(_))
                    {
                        out.push_str(&format!(
                            "if (hl_is_nil_{}({})) hl_print_no_newline(\"nil\"); else hl_print_{}_no_newline({});",
                            type_name, compiled, type_name, compiled
                        ));
                    } else {
                        out.push_str(&format!(
                            "hl_print_{}_no_newline({});",
                            type_name, compiled
                        ));
                    }
                }
            }
        }

        out.push_str(" hl_print_newline();\n");
    }

    fn validate_expr_for_print(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Var(name) => self.check_variable(name),
            ExprKind::Call { name, args } => {
                if !self.check_function(name)
                    && !matches!(name.as_str(), "tostring" | "tonumber" | "type")
                {
                    return false;
                }
                args.iter().all(|arg| self.validate_expr_for_print(arg))
            }
            ExprKind::Binary { left, right, .. } => {
                self.validate_expr_for_print(left) && self.validate_expr_for_print(right)
            }
            ExprKind::Unary { operand, .. } => self.validate_expr_for_print(operand),
            ExprKind::StructLit {
                named, positional, ..
            } => {
                named.iter().all(|(_, v)| self.validate_expr_for_print(v))
                    && positional.iter().all(|v| self.validate_expr_for_print(v))
            }
            _ => true,
        }
    }
}
