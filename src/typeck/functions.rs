//! Pass 3: function and method bodies.
//!
//! Return types are gathered by walking every `return expr` (recursing
//! into branches but not into nested functions); a set that does not
//! unify is a conflict reported with every offending line. Class
//! constructors and methods are validated with `self` bound as a
//! struct-typed local of the class.

use super::context::VarInfo;
use super::error::TypeErrorKind;
use super::TypeChecker;
use crate::ast::*;
use std::fmt::Write;

/// The collected return sites of one function body
#[derive(Debug, Default)]
pub struct ReturnAnalysis {
    pub return_types: Vec<ValueType>,
    pub return_lines: Vec<u32>,
    pub has_conflict: bool,
    pub inferred: Option<ValueType>,
}

impl TypeChecker {
    pub(crate) fn pass_bodies(&mut self, program: &Program) -> bool {
        let mark = self.errors.len();

        for stmt in &program.statements {
            if let StmtKind::Function(func) = &stmt.kind {
                self.infer_and_validate_function(func, stmt.line);
                self.validate_function_body(func);
            }
        }

        for stmt in &program.statements {
            if let StmtKind::Class(decl) = &stmt.kind {
                if let Some(ctor) = &decl.constructor {
                    self.validate_class_method(&decl.name, ctor, true);
                }
                for method in &decl.methods {
                    self.validate_class_method(&decl.name, method, false);
                }
            }
        }

        self.clean_since(mark)
    }

    fn infer_and_validate_function(&mut self, func: &FunctionDecl, line: u32) {
        if !func.is_global {
            return;
        }

        let saved_symbols = self.symbol_table.clone();
        self.bind_params(&func.params);
        self.collect_local_variables(&func.body);

        let analysis = self.analyze_return_types(&func.body);

        if analysis.has_conflict {
            let mut message = format!("Function '{}' has conflicting return types:\n", func.name);
            for (ty, ret_line) in analysis.return_types.iter().zip(&analysis.return_lines) {
                writeln!(message, "  Line {}: {}", ret_line, ty).unwrap();
            }
            message.push_str("Explicit return type required or logic must be unified");
            self.error(TypeErrorKind::ConflictingReturns(message), line);
            self.symbol_table = saved_symbols;
            return;
        }

        if func.return_type == ValueType::Inferred {
            let inferred = analysis.inferred.unwrap_or(ValueType::Number);
            if let Some(info) = self.function_table.get_mut(&func.name) {
                info.return_type = inferred;
            }
        } else if let Some(actual) = analysis.inferred {
            if actual != ValueType::Inferred && !func.return_type.is_compatible(actual) {
                self.error(
                    TypeErrorKind::ReturnTypeMismatch {
                        function: func.name.clone(),
                        declared: func.return_type,
                        actual,
                    },
                    line,
                );
            }
        }

        self.symbol_table = saved_symbols;
    }

    /// Full statement validation of a global function body.
    fn validate_function_body(&mut self, func: &FunctionDecl) {
        if !func.is_global {
            return;
        }

        let saved_symbols = self.symbol_table.clone();
        let saved_non_nil = std::mem::take(&mut self.non_nil_vars);
        let saved_function = std::mem::replace(&mut self.current_function, func.name.clone());

        self.bind_params(&func.params);

        for stmt in &func.body {
            if let StmtKind::Function(nested) = &stmt.kind {
                if nested.is_global {
                    self.error(
                        TypeErrorKind::NestedFunctionGlobal(nested.name.clone()),
                        stmt.line,
                    );
                    continue;
                }
                let mut info = VarInfo::new(ValueType::Function, false);
                info.is_function = true;
                self.symbol_table.insert(nested.name.clone(), info);
            }
        }

        self.collect_local_variables(&func.body);

        for stmt in &func.body {
            if matches!(stmt.kind, StmtKind::Function(_)) {
                continue;
            }
            self.validate_statement(stmt);
        }

        self.symbol_table = saved_symbols;
        self.non_nil_vars = saved_non_nil;
        self.current_function = saved_function;
    }

    fn bind_params(&mut self, params: &[Param]) {
        for param in params {
            let mut info = VarInfo::new(param.ty, param.optional);
            match param.ty {
                ValueType::Struct => {
                    info.is_struct = true;
                    info.struct_type_name = param.type_name.clone();
                }
                ValueType::Enum => {
                    info.struct_type_name = param.type_name.clone();
                }
                _ => {}
            }
            self.symbol_table.insert(param.name.clone(), info);
        }
    }

    /// Recursively collect the type and line of every `return expr`,
    /// entering if/elseif/else branches but stopping at nested functions.
    pub(crate) fn analyze_return_types(&mut self, body: &[Stmt]) -> ReturnAnalysis {
        let mut analysis = ReturnAnalysis::default();
        self.collect_returns(body, &mut analysis);

        if analysis.return_types.len() > 1 {
            let first = analysis.return_types[0];
            if analysis.return_types.iter().any(|&ty| ty != first) {
                analysis.has_conflict = true;
            }
        }
        if !analysis.return_types.is_empty() && !analysis.has_conflict {
            analysis.inferred = Some(analysis.return_types[0]);
        }

        analysis
    }

    fn collect_returns(&mut self, body: &[Stmt], analysis: &mut ReturnAnalysis) {
        for stmt in body {
            match &stmt.kind {
                StmtKind::Return(Some(value)) => {
                    // Typing only; the statement pass reports expression errors.
                    self.quiet += 1;
                    let ty = self.validate_expr(value);
                    self.quiet -= 1;
                    analysis.return_types.push(ty);
                    analysis.return_lines.push(stmt.line);
                }
                StmtKind::If(if_stmt) => {
                    self.collect_returns(&if_stmt.then_block, analysis);
                    for (_, branch) in &if_stmt.elseif_branches {
                        self.collect_returns(branch, analysis);
                    }
                    self.collect_returns(&if_stmt.else_block, analysis);
                }
                _ => {}
            }
        }
    }

    /// Validate one class method (or the constructor) with `self` and the
    /// parameters in scope.
    fn validate_class_method(
        &mut self,
        class_name: &str,
        method: &ClassMethod,
        is_constructor: bool,
    ) {
        let saved_symbols = self.symbol_table.clone();
        let saved_non_nil = self.non_nil_vars.clone();
        let saved_function = std::mem::replace(
            &mut self.current_function,
            format!("{}_{}", class_name, method.name),
        );
        let saved_class = std::mem::replace(&mut self.current_class, class_name.to_owned());
        self.ctor_const_assigned.clear();

        let restore = |checker: &mut TypeChecker,
                       symbols: std::collections::HashMap<String, VarInfo>,
                       non_nil,
                       function,
                       class| {
            checker.symbol_table = symbols;
            checker.non_nil_vars = non_nil;
            checker.current_function = function;
            checker.current_class = class;
        };

        if !method.is_static {
            self.symbol_table.insert(
                "self".to_owned(),
                VarInfo::new(ValueType::Struct, false).with_struct(class_name),
            );
        }

        for (i, param) in method.params.iter().enumerate() {
            if param.ty == ValueType::Inferred {
                self.error(
                    TypeErrorKind::MethodParamNeedsType(param.name.clone()),
                    method.line,
                );
                restore(
                    self,
                    saved_symbols,
                    saved_non_nil,
                    saved_function,
                    saved_class,
                );
                return;
            }

            if method.params[..i].iter().any(|p| p.name == param.name) {
                self.error(
                    TypeErrorKind::DuplicateParam {
                        param: param.name.clone(),
                        method: method.name.clone(),
                    },
                    method.line,
                );
                restore(
                    self,
                    saved_symbols,
                    saved_non_nil,
                    saved_function,
                    saved_class,
                );
                return;
            }

            if matches!(param.ty, ValueType::Struct | ValueType::Enum) {
                if param.type_name.is_empty() {
                    self.error(
                        TypeErrorKind::StructParamMissingType {
                            param: param.name.clone(),
                            method: method.name.clone(),
                        },
                        method.line,
                    );
                    restore(
                        self,
                        saved_symbols,
                        saved_non_nil,
                        saved_function,
                        saved_class,
                    );
                    return;
                }
                let known = match param.ty {
                    ValueType::Struct => {
                        self.struct_table.contains_key(&param.type_name)
                            || self.class_table.contains_key(&param.type_name)
                    }
                    _ => self.enum_table.contains_key(&param.type_name),
                };
                if !known {
                    self.error(
                        TypeErrorKind::UnknownParamType {
                            type_name: param.type_name.clone(),
                            param: param.name.clone(),
                        },
                        method.line,
                    );
                    restore(
                        self,
                        saved_symbols,
                        saved_non_nil,
                        saved_function,
                        saved_class,
                    );
                    return;
                }
            }

            let mut info = VarInfo::new(param.ty, param.optional);
            if param.ty == ValueType::Struct {
                info.is_struct = true;
            }
            if matches!(param.ty, ValueType::Struct | ValueType::Enum) {
                info.struct_type_name = param.type_name.clone();
            }
            self.symbol_table.insert(param.name.clone(), info);
        }

        if is_constructor {
            if method.return_type != ValueType::Inferred {
                self.error(TypeErrorKind::CtorExplicitReturn, method.line);
            }
            for stmt in &method.body {
                if matches!(stmt.kind, StmtKind::Return(Some(_))) {
                    self.error(TypeErrorKind::CtorReturnsValue, stmt.line);
                }
            }
        } else if method.return_type == ValueType::Inferred {
            self.collect_local_variables(&method.body);
            let analysis = self.analyze_return_types(&method.body);
            if analysis.has_conflict {
                self.error(
                    TypeErrorKind::MethodConflictingReturns(method.name.clone()),
                    method.line,
                );
                restore(
                    self,
                    saved_symbols,
                    saved_non_nil,
                    saved_function,
                    saved_class,
                );
                return;
            }
        }

        self.collect_local_variables(&method.body);

        for stmt in &method.body {
            self.validate_statement(stmt);
        }

        restore(
            self,
            saved_symbols,
            saved_non_nil,
            saved_function,
            saved_class,
        );
    }
}
