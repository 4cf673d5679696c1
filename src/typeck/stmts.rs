//! Pass 4: whole-program statement validation.
//!
//! With every table populated, each statement is checked: declarations,
//! assignments (const rules, nil flow, compound operators), field
//! assignments with visibility and const-once enforcement, print
//! arguments, and control flow with nil narrowing on if conditions.

use super::context::VarInfo;
use super::error::TypeErrorKind;
use super::TypeChecker;
use crate::ast::*;

impl TypeChecker {
    pub(crate) fn pass_statements(&mut self, program: &Program) -> bool {
        let mark = self.errors.len();

        for stmt in &program.statements {
            match stmt.kind {
                StmtKind::Class(_) | StmtKind::Struct(_) | StmtKind::Enum(_) => continue,
                _ => {
                    self.validate_statement(stmt);
                }
            }
        }

        self.clean_since(mark)
    }

    pub(crate) fn validate_statement(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::VarDecl(decl) => self.validate_var_decl_stmt(decl, stmt.line),
            StmtKind::Assign { name, value, op } => {
                self.validate_assignment(name, value, *op, stmt.line)
            }
            StmtKind::FieldAssign {
                object,
                field,
                value,
                op,
            } => self.validate_field_assignment(object, field, value, *op, stmt.line),
            StmtKind::Function(_) => {}
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.validate_expr(value);
                }
            }
            StmtKind::Print(args) => self.validate_print(args, stmt.line),
            StmtKind::If(if_stmt) => self.validate_if(if_stmt),
            StmtKind::While { condition, body } => {
                self.validate_expr(condition);
                let saved = self.non_nil_vars.clone();
                for inner in body {
                    self.validate_statement(inner);
                }
                self.non_nil_vars = saved;
            }
            StmtKind::For {
                var,
                start,
                end,
                step,
                body,
            } => {
                self.validate_expr(start);
                self.validate_expr(end);
                if let Some(step) = step {
                    self.validate_expr(step);
                }
                self.symbol_table
                    .entry(var.clone())
                    .or_insert_with(|| VarInfo::new(ValueType::Number, false));
                let saved = self.non_nil_vars.clone();
                for inner in body {
                    self.validate_statement(inner);
                }
                self.non_nil_vars = saved;
            }
            StmtKind::Repeat { body, condition } => {
                let saved = self.non_nil_vars.clone();
                for inner in body {
                    self.validate_statement(inner);
                }
                self.non_nil_vars = saved;
                self.validate_expr(condition);
            }
            StmtKind::Struct(_) | StmtKind::Class(_) | StmtKind::Enum(_) => {}
            StmtKind::InlineC(_) => {}
            StmtKind::Expr(expr) => {
                self.validate_expr(expr);
            }
        }
    }

    /// Declarations were collected earlier (pass 1 for globals, the local
    /// prepass otherwise); here the initializer expression is validated,
    /// with lambda bodies checked in a child scope.
    fn validate_var_decl_stmt(&mut self, decl: &VarDecl, line: u32) {
        if let Some(value) = &decl.value {
            if let ExprKind::Lambda(lambda) = &value.kind {
                self.validate_lambda_body(lambda, line);
            } else {
                self.validate_expr(value);
            }
        }
    }

    fn validate_lambda_body(&mut self, lambda: &LambdaDef, line: u32) {
        let saved_symbols = self.symbol_table.clone();
        let saved_non_nil = std::mem::take(&mut self.non_nil_vars);
        let saved_function = std::mem::take(&mut self.current_function);
        let saved_class = std::mem::take(&mut self.current_class);

        let mut params_ok = true;
        for param in &lambda.params {
            if param.ty == ValueType::Inferred {
                self.error(TypeErrorKind::LambdaParamNeedsType(param.name.clone()), line);
                params_ok = false;
                continue;
            }
            let mut info = VarInfo::new(param.ty, param.optional);
            if matches!(param.ty, ValueType::Struct | ValueType::Enum) {
                info.is_struct = param.ty == ValueType::Struct;
                info.struct_type_name = param.type_name.clone();
            }
            self.symbol_table.insert(param.name.clone(), info);
        }

        if params_ok {
            self.collect_local_variables(&lambda.body);
            for stmt in &lambda.body {
                self.validate_statement(stmt);
            }
        }

        self.symbol_table = saved_symbols;
        self.non_nil_vars = saved_non_nil;
        self.current_function = saved_function;
        self.current_class = saved_class;
    }

    fn validate_assignment(
        &mut self,
        name: &str,
        value: &Expr,
        op: Option<BinaryOp>,
        line: u32,
    ) {
        let Some(info) = self.symbol_table.get(name).cloned() else {
            self.error(TypeErrorKind::VarNotDeclared(name.to_owned()), line);
            return;
        };

        if info.is_const {
            self.error(TypeErrorKind::AssignToConst(name.to_owned()), line);
            return;
        }

        let mut value_ty = self.validate_expr(value);

        let mut value_can_be_nil = match &value.kind {
            ExprKind::Nil => true,
            ExprKind::Var(rhs) => self
                .symbol_table
                .get(rhs)
                .map(|rhs_info| rhs_info.is_optional && !self.non_nil_vars.contains(rhs))
                .unwrap_or(false),
            _ => false,
        };

        if let ExprKind::Lambda(lambda) = &value.kind {
            self.validate_lambda_body(lambda, line);
            if let Some(entry) = self.symbol_table.get_mut(name) {
                entry.ty = ValueType::Function;
                entry.is_function = true;
            }
            value_ty = ValueType::Function;
            value_can_be_nil = false;
        }

        if op.is_some() {
            if info.is_optional && !self.non_nil_vars.contains(name) {
                self.error(TypeErrorKind::CompoundOnNilable(name.to_owned()), line);
                return;
            }
            if info.ty != ValueType::Number || value_ty != ValueType::Number {
                self.error(TypeErrorKind::CompoundNeedsNumbers, line);
            }
            return;
        }

        // Struct values must match the declared struct type by name.
        let value_type_name = match &value.kind {
            ExprKind::StructLit { name, .. } => Some(name.clone()),
            ExprKind::ClassNew { class, .. } => Some(class.clone()),
            _ => None,
        };
        if let Some(value_name) = value_type_name {
            if !info.struct_type_name.is_empty() && info.struct_type_name != value_name {
                self.error(
                    TypeErrorKind::DeclTypeMismatch {
                        declared: info.struct_type_name.clone(),
                        actual: value_name,
                    },
                    line,
                );
                return;
            }
        }

        if info.is_optional {
            if !value_can_be_nil && !info.ty.is_compatible(value_ty) {
                self.error(
                    TypeErrorKind::AssignTypeMismatchOptional {
                        value_ty,
                        var: name.to_owned(),
                        var_ty: info.ty,
                    },
                    line,
                );
            }
        } else {
            if value_can_be_nil {
                self.error(TypeErrorKind::AssignNilToNonOptional(name.to_owned()), line);
                return;
            }
            if !info.ty.is_compatible(value_ty) {
                self.error(
                    TypeErrorKind::AssignTypeMismatch {
                        value_ty,
                        var: name.to_owned(),
                        var_ty: info.ty,
                    },
                    line,
                );
            }
        }
    }

    fn validate_field_assignment(
        &mut self,
        object: &Expr,
        field: &str,
        value: &Expr,
        _op: Option<BinaryOp>,
        line: u32,
    ) {
        // `ClassName.field = v` writes a static field.
        if let ExprKind::Var(name) = &object.kind {
            if self.class_table.contains_key(name) && !self.symbol_table.contains_key(name) {
                let Some(class_field) = self.class_table[name].field(field).cloned() else {
                    self.error(
                        TypeErrorKind::NoSuchClassField {
                            owner: name.clone(),
                            field: field.to_owned(),
                        },
                        line,
                    );
                    return;
                };
                if !class_field.is_static {
                    self.error(
                        TypeErrorKind::FieldNotStatic {
                            field: field.to_owned(),
                            owner: name.clone(),
                        },
                        line,
                    );
                    return;
                }
                if class_field.visibility == Visibility::Private && self.current_class != *name {
                    self.error(
                        TypeErrorKind::PrivateField {
                            field: field.to_owned(),
                            owner: name.clone(),
                        },
                        line,
                    );
                    return;
                }
                let value_ty = self.validate_expr(value);
                if !class_field.ty.is_compatible(value_ty) {
                    self.error(
                        TypeErrorKind::FieldTypeMismatch {
                            value_ty,
                            field_ty: class_field.ty,
                        },
                        line,
                    );
                }
                return;
            }
        }

        let object_ty = self.validate_expr(object);
        if object_ty != ValueType::Struct {
            self.error(TypeErrorKind::FieldOnNonStruct, line);
            return;
        }

        let type_name = self.container_type_name(object);
        if type_name.is_empty() {
            self.error(TypeErrorKind::FieldAssignTargetUnknown, line);
            return;
        }

        if let Some(info) = self.class_table.get(&type_name) {
            let Some(class_field) = info.field(field).cloned() else {
                self.error(
                    TypeErrorKind::NoSuchClassField {
                        owner: type_name,
                        field: field.to_owned(),
                    },
                    line,
                );
                return;
            };

            if class_field.visibility == Visibility::Private && self.current_class != type_name {
                self.error(
                    TypeErrorKind::PrivateField {
                        field: field.to_owned(),
                        owner: type_name,
                    },
                    line,
                );
                return;
            }

            if class_field.is_const && !class_field.is_static {
                let in_ctor = self.current_class == type_name
                    && self.current_function.ends_with("__init");
                if !in_ctor {
                    self.error(
                        TypeErrorKind::ConstFieldOutsideCtor(field.to_owned()),
                        line,
                    );
                    return;
                }
                if !self.ctor_const_assigned.insert(field.to_owned()) {
                    self.error(
                        TypeErrorKind::ConstFieldReassigned(field.to_owned()),
                        line,
                    );
                    return;
                }
            }

            let value_ty = self.validate_expr(value);
            if !class_field.ty.is_compatible(value_ty) {
                self.error(
                    TypeErrorKind::FieldTypeMismatch {
                        value_ty,
                        field_ty: class_field.ty,
                    },
                    line,
                );
            }
            return;
        }

        if let Some(info) = self.struct_table.get(&type_name) {
            let Some(struct_field) = info.field(field).cloned() else {
                self.error(
                    TypeErrorKind::NoSuchStructField {
                        owner: type_name,
                        field: field.to_owned(),
                    },
                    line,
                );
                return;
            };
            let value_ty = self.validate_expr(value);
            if !struct_field.ty.is_compatible(value_ty) {
                self.error(
                    TypeErrorKind::FieldTypeMismatch {
                        value_ty,
                        field_ty: struct_field.ty,
                    },
                    line,
                );
            }
            return;
        }

        self.error(TypeErrorKind::UnknownContainerType(type_name), line);
    }

    fn validate_print(&mut self, args: &[PrintArg], line: u32) {
        for arg in args {
            match arg {
                PrintArg::Ident(name) => {
                    let Some(info) = self.symbol_table.get(name) else {
                        self.error(TypeErrorKind::VarNotDeclared(name.clone()), line);
                        continue;
                    };
                    if info.is_optional && !self.non_nil_vars.contains(name) {
                        self.error(TypeErrorKind::PrintOptional(name.clone()), line);
                    }
                }
                PrintArg::Expr(expr) => {
                    self.validate_expr(expr);
                }
            }
        }
    }

    fn validate_if(&mut self, if_stmt: &IfStmt) {
        self.validate_expr(&if_stmt.condition);

        let saved = self.non_nil_vars.clone();

        self.narrow_positive(&if_stmt.condition);
        for stmt in &if_stmt.then_block {
            self.validate_statement(stmt);
        }
        self.non_nil_vars = saved.clone();

        for (condition, block) in &if_stmt.elseif_branches {
            self.validate_expr(condition);
            self.narrow_positive(condition);
            for stmt in block {
                self.validate_statement(stmt);
            }
            self.non_nil_vars = saved.clone();
        }

        if !if_stmt.else_block.is_empty() {
            self.narrow_negative(&if_stmt.condition);
            for stmt in &if_stmt.else_block {
                self.validate_statement(stmt);
            }
            self.non_nil_vars = saved;
        }
    }

    /// `if x then` and `if x != nil then` prove `x` non-nil in the branch.
    fn narrow_positive(&mut self, condition: &Expr) {
        match &condition.kind {
            ExprKind::Var(name) => {
                if let Some(info) = self.symbol_table.get(name) {
                    if info.is_optional {
                        self.non_nil_vars.insert(name.clone());
                    }
                }
            }
            ExprKind::Binary {
                op: BinaryOp::Ne,
                left,
                right,
            } => {
                if let (ExprKind::Var(name), ExprKind::Nil) = (&left.kind, &right.kind) {
                    self.non_nil_vars.insert(name.clone());
                }
            }
            _ => {}
        }
    }

    /// `if not x` and `if x == nil` prove `x` non-nil in the else branch.
    fn narrow_negative(&mut self, condition: &Expr) {
        match &condition.kind {
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand,
            } => {
                if let ExprKind::Var(name) = &operand.kind {
                    if let Some(info) = self.symbol_table.get(name) {
                        if info.is_optional {
                            self.non_nil_vars.insert(name.clone());
                        }
                    }
                }
            }
            ExprKind::Binary {
                op: BinaryOp::Eq,
                left,
                right,
            } => {
                if let (ExprKind::Var(name), ExprKind::Nil) = (&left.kind, &right.kind) {
                    self.non_nil_vars.insert(name.clone());
                }
            }
            _ => {}
        }
    }
}
