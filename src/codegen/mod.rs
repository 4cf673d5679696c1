//! C code generator for HolyLua
//!
//! Lowers the checked AST to portable C that links against the
//! `holylua_api` runtime. Assembly is two-phase: a preamble (enum, struct
//! and class typedefs, static class fields, global declarations) followed
//! by lifted nested functions and lambdas, global functions, constructors
//! and methods. When the source has no `main`, top-level non-declaration
//! statements are wrapped into a generated `int main()`.
//!
//! Nil is lowered to per-type sentinels: NaN for numbers (and the
//! optional-struct slot), `NULL` for strings, `-1` for bools and enums.

mod classes;
mod exprs;
mod funcs;
mod stmts;
mod types;

use crate::ast::*;
use crate::typeck::{ClassInfo, FunctionInfo, StructInfo, VarInfo};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Code generation error: a message plus the offending source line
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct CodegenError {
    pub message: String,
    pub line: u32,
}

/// Compile a checked program to C source text
pub fn compile(program: &Program) -> Result<String, Vec<CodegenError>> {
    Codegen::new().compile(program)
}

/// The C code generator. One instance owns all tables for one program;
/// nothing is process-wide (the lambda counter and the const-field
/// assignment sets live here).
pub struct Codegen {
    pub(crate) symbol_table: HashMap<String, VarInfo>,
    pub(crate) function_table: HashMap<String, FunctionInfo>,
    pub(crate) struct_table: HashMap<String, StructInfo>,
    pub(crate) class_table: HashMap<String, ClassInfo>,
    pub(crate) enum_table: HashMap<String, Vec<String>>,

    pub(crate) non_nil_vars: HashSet<String>,
    pub(crate) non_nil_stack: Vec<HashSet<String>>,

    pub(crate) indent_level: usize,
    pub(crate) current_function: String,
    pub(crate) current_class: String,
    pub(crate) current_function_params: Vec<Param>,

    /// Lifted nested functions and lambdas, emitted at file scope
    pub(crate) nested_function_decls: String,
    /// Struct typedefs in declaration order
    pub(crate) struct_defs: Vec<(String, String)>,
    /// Deferred global initializers, in declaration order
    pub(crate) deferred_global_inits: Vec<(String, String)>,
    pub(crate) lambda_counter: u32,
    /// (class, function) → const fields already assigned there
    pub(crate) const_field_assignments: HashMap<String, HashSet<String>>,

    pub(crate) errors: Vec<CodegenError>,
}

impl Codegen {
    pub fn new() -> Self {
        Self {
            symbol_table: HashMap::new(),
            function_table: HashMap::new(),
            struct_table: HashMap::new(),
            class_table: HashMap::new(),
            enum_table: HashMap::new(),
            non_nil_vars: HashSet::new(),
            non_nil_stack: Vec::new(),
            indent_level: 1,
            current_function: String::new(),
            current_class: String::new(),
            current_function_params: Vec::new(),
            nested_function_decls: String::new(),
            struct_defs: Vec::new(),
            deferred_global_inits: Vec::new(),
            lambda_counter: 0,
            const_field_assignments: HashMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn compile(&mut self, program: &Program) -> Result<String, Vec<CodegenError>> {
        let mut enum_definitions = String::new();
        let mut global_decls = String::new();
        let mut function_decls = String::new();

        // Enum typedefs first; they are plain ints everywhere else.
        for stmt in &program.statements {
            if let StmtKind::Enum(decl) = &stmt.kind {
                enum_definitions.push_str(&self.compile_enum_decl(decl));
            }
        }

        for stmt in &program.statements {
            if let StmtKind::Struct(decl) = &stmt.kind {
                self.compile_struct_decl(decl, stmt.line);
            }
        }

        let mut struct_definitions = String::new();
        for (_, def) in &self.struct_defs {
            struct_definitions.push_str(def);
        }

        // Classes must fully resolve while other classes and functions
        // compile, regardless of declaration order.
        for stmt in &program.statements {
            if let StmtKind::Class(decl) = &stmt.kind {
                self.register_class_info(decl);
            }
        }

        let mut has_main_function = false;
        for stmt in &program.statements {
            if let StmtKind::Function(func) = &stmt.kind {
                self.function_table.insert(
                    func.name.clone(),
                    FunctionInfo {
                        name: func.name.clone(),
                        return_type: func.return_type,
                        params: func.params.clone(),
                        is_global: func.is_global,
                    },
                );
                if func.name == "main" {
                    has_main_function = true;
                }
            }
        }

        for stmt in &program.statements {
            if let StmtKind::VarDecl(decl) = &stmt.kind {
                if decl.is_global {
                    self.compile_global_var_decl(decl, &mut global_decls);
                }
            }
        }

        for stmt in &program.statements {
            if let StmtKind::Class(decl) = &stmt.kind {
                struct_definitions.push_str(&self.compile_class_decl(decl, stmt.line));
            }
        }

        for stmt in &program.statements {
            if let StmtKind::Function(func) = &stmt.kind {
                let mut out = String::new();
                self.compile_function_decl(func, &mut out);
                function_decls.push_str(&out);
                function_decls.push('\n');
            }
        }

        if !self.errors.is_empty() {
            return Err(std::mem::take(&mut self.errors));
        }

        // Synthesize main before assembly so top-level lambdas and nested
        // functions it lifts still reach the output.
        let main_text = if has_main_function {
            String::new()
        } else {
            self.synthesize_main(program)
        };

        let mut output = String::from("#include \"api/holylua_api.h\"\n\n");
        output.push_str(&enum_definitions);
        output.push_str(&struct_definitions);
        output.push_str(&global_decls);
        output.push('\n');
        if !self.nested_function_decls.is_empty() {
            output.push_str(&self.nested_function_decls.clone());
            output.push('\n');
        }
        output.push_str(&function_decls);
        output.push('\n');
        output.push_str(&main_text);

        if self.errors.is_empty() {
            Ok(output)
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }

    /// Wrap top-level non-declaration statements into `int main()`,
    /// running deferred global initializers at their declaration points.
    fn synthesize_main(&mut self, program: &Program) -> String {
        let mut body = String::new();
        self.indent_level = 1;

        for stmt in &program.statements {
            match &stmt.kind {
                StmtKind::Enum(_)
                | StmtKind::Struct(_)
                | StmtKind::Class(_)
                | StmtKind::Function(_) => {}
                StmtKind::VarDecl(decl) => {
                    if decl.is_global {
                        if let Some(idx) = self
                            .deferred_global_inits
                            .iter()
                            .position(|(name, _)| *name == decl.name)
                        {
                            let (name, code) = self.deferred_global_inits.remove(idx);
                            body.push_str(&self.indent());
                            body.push_str(&code);
                            body.push('\n');
                            if let Some(info) = self.symbol_table.get_mut(&name) {
                                info.is_defined = true;
                            }
                        }
                    } else {
                        self.compile_var_decl(decl, stmt.line, &mut body);
                    }
                }
                _ => self.compile_statement(stmt, &mut body),
            }
        }

        self.indent_level = 0;
        format!("int main() {{\n{}    return 0;\n}}\n", body)
    }

    pub(crate) fn error(&mut self, message: impl Into<String>, line: u32) {
        self.errors.push(CodegenError {
            message: message.into(),
            line,
        });
    }

    pub(crate) fn indent(&self) -> String {
        "    ".repeat(self.indent_level)
    }

    // ============ Nil narrowing scopes ============

    pub(crate) fn push_scope(&mut self) {
        self.non_nil_stack
            .push(std::mem::take(&mut self.non_nil_vars));
    }

    pub(crate) fn pop_scope(&mut self) {
        if let Some(saved) = self.non_nil_stack.pop() {
            self.non_nil_vars = saved;
        }
    }

    pub(crate) fn mark_non_nil(&mut self, name: &str) {
        self.non_nil_vars.insert(name.to_owned());
    }

    pub(crate) fn check_variable(&self, name: &str) -> bool {
        self.symbol_table
            .get(name)
            .map(|info| info.is_defined)
            .unwrap_or(false)
    }

    pub(crate) fn check_function(&self, name: &str) -> bool {
        self.function_table.contains_key(name)
    }

    pub(crate) fn unique_lambda_name(&mut self, base: &str) -> String {
        let name = format!("__lambda_{}_{}", base, self.lambda_counter);
        self.lambda_counter += 1;
        name
    }
}

impl Default for Codegen {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
