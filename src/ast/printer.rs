//! Source-form AST printer.
//!
//! Renders a program back to HolyLua syntax. Compound expressions are
//! fully parenthesized so that the printed form re-parses to the same
//! tree (grouping parentheses are not represented in the AST). Backs the
//! `--ast` flag and the parse/print/parse round-trip test.

use super::*;
use std::fmt::Write;

/// Render a whole program as HolyLua source.
pub fn pretty(program: &Program) -> String {
    let mut p = Printer::default();
    for stmt in &program.statements {
        p.stmt(stmt);
    }
    p.out
}

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn pad(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
    }

    fn line(&mut self, text: &str) {
        self.pad();
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn block(&mut self, body: &[Stmt]) {
        self.indent += 1;
        for stmt in body {
            self.stmt(stmt);
        }
        self.indent -= 1;
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::VarDecl(decl) => {
                let mut s = String::new();
                s.push_str(if decl.is_global { "global" } else { "local" });
                if decl.is_const {
                    s.push_str(" const");
                }
                write!(s, " {}", decl.name).unwrap();
                if !decl.type_name.is_empty() {
                    write!(s, ": {}", decl.type_name).unwrap();
                    if decl.optional {
                        s.push('?');
                    }
                }
                if let Some(value) = &decl.value {
                    write!(s, " = {}", expr_src(value)).unwrap();
                }
                self.line(&s);
            }
            StmtKind::Assign { name, value, op } => {
                let s = match op {
                    Some(op) => format!("{} {}= {}", name, op, expr_src(value)),
                    None => format!("{} = {}", name, expr_src(value)),
                };
                self.line(&s);
            }
            StmtKind::FieldAssign {
                object,
                field,
                value,
                op,
            } => {
                let target = format!("{}.{}", expr_src(object), field);
                let s = match op {
                    Some(op) => format!("{} {}= {}", target, op, expr_src(value)),
                    None => format!("{} = {}", target, expr_src(value)),
                };
                self.line(&s);
            }
            StmtKind::Function(func) => {
                let mut s = format!("function {}({})", func.name, params_src(&func.params));
                if !func.return_type_name.is_empty() {
                    write!(s, ": {}", func.return_type_name).unwrap();
                }
                self.line(&s);
                self.block(&func.body);
                self.line("end");
            }
            StmtKind::Return(value) => {
                let s = match value {
                    Some(expr) => format!("return {}", expr_src(expr)),
                    None => "return".to_string(),
                };
                self.line(&s);
            }
            StmtKind::Print(args) => {
                let rendered: Vec<String> = args
                    .iter()
                    .map(|arg| match arg {
                        PrintArg::Ident(name) => name.clone(),
                        PrintArg::Expr(expr) => expr_src(expr),
                    })
                    .collect();
                self.line(&format!("print({})", rendered.join(", ")));
            }
            StmtKind::If(if_stmt) => {
                self.line(&format!("if {} then", expr_src(&if_stmt.condition)));
                self.block(&if_stmt.then_block);
                for (cond, body) in &if_stmt.elseif_branches {
                    self.line(&format!("elseif {} then", expr_src(cond)));
                    self.block(body);
                }
                if !if_stmt.else_block.is_empty() {
                    self.line("else");
                    self.block(&if_stmt.else_block);
                }
                self.line("end");
            }
            StmtKind::While { condition, body } => {
                self.line(&format!("while {} do", expr_src(condition)));
                self.block(body);
                self.line("end");
            }
            StmtKind::For {
                var,
                start,
                end,
                step,
                body,
            } => {
                let mut s = format!(
                    "for local {} = {}, {}",
                    var,
                    expr_src(start),
                    expr_src(end)
                );
                if let Some(step) = step {
                    write!(s, ", {}", expr_src(step)).unwrap();
                }
                s.push_str(" do");
                self.line(&s);
                self.block(body);
                self.line("end");
            }
            StmtKind::Repeat { body, condition } => {
                self.line("repeat");
                self.block(body);
                self.line(&format!("until {}", expr_src(condition)));
            }
            StmtKind::Struct(decl) => {
                self.line(&format!("struct {}", decl.name));
                self.indent += 1;
                for field in &decl.fields {
                    let mut s = field.name.clone();
                    if !field.type_name.is_empty() {
                        write!(s, ": {}", field.type_name).unwrap();
                        if field.optional {
                            s.push('?');
                        }
                    }
                    if let Some(default) = &field.default {
                        write!(s, " = {}", default_src(default)).unwrap();
                    }
                    self.line(&s);
                }
                self.indent -= 1;
                self.line("end");
            }
            StmtKind::Class(decl) => {
                self.line(&format!("class {}", decl.name));
                self.indent += 1;
                for field in &decl.fields {
                    let mut s = String::new();
                    s.push_str(match field.visibility {
                        Visibility::Public => "public ",
                        Visibility::Private => "private ",
                    });
                    if field.is_static {
                        s.push_str("static ");
                    }
                    if field.is_const {
                        s.push_str("const ");
                    }
                    s.push_str(&field.name);
                    if !field.type_name.is_empty() {
                        write!(s, ": {}", field.type_name).unwrap();
                        if field.optional {
                            s.push('?');
                        }
                    }
                    if let Some(default) = &field.default {
                        write!(s, " = {}", default_src(default)).unwrap();
                    }
                    self.line(&s);
                }
                if let Some(ctor) = &decl.constructor {
                    self.method(ctor);
                }
                for method in &decl.methods {
                    self.method(method);
                }
                self.indent -= 1;
                self.line("end");
            }
            StmtKind::Enum(decl) => {
                self.line(&format!("enum {}", decl.name));
                self.indent += 1;
                for value in &decl.values {
                    self.line(value);
                }
                self.indent -= 1;
                self.line("end");
            }
            StmtKind::InlineC(code) => {
                self.line(&format!("inline C[[ {} ]]", code));
            }
            StmtKind::Expr(expr) => {
                let s = expr_src(expr);
                self.line(&s);
            }
        }
    }

    fn method(&mut self, method: &ClassMethod) {
        let mut s = String::new();
        s.push_str(match method.visibility {
            Visibility::Public => "public ",
            Visibility::Private => "private ",
        });
        if method.is_static {
            s.push_str("static ");
        }
        write!(s, "function {}({})", method.name, params_src(&method.params)).unwrap();
        if !method.return_type_name.is_empty() {
            write!(s, ": {}", method.return_type_name).unwrap();
        }
        self.line(&s);
        self.block(&method.body);
        self.line("end");
    }
}

fn params_src(params: &[Param]) -> String {
    let rendered: Vec<String> = params
        .iter()
        .map(|p| {
            if p.type_name.is_empty() {
                p.name.clone()
            } else if p.optional {
                format!("{}: {}?", p.name, p.type_name)
            } else {
                format!("{}: {}", p.name, p.type_name)
            }
        })
        .collect();
    rendered.join(", ")
}

fn default_src(default: &DefaultValue) -> String {
    match default {
        DefaultValue::Int(n) => n.to_string(),
        DefaultValue::Float(x) => float_src(*x),
        DefaultValue::Str(s) => format!("\"{}\"", s),
        DefaultValue::Bool(b) => b.to_string(),
        DefaultValue::Nil => "nil".to_string(),
    }
}

fn float_src(x: f64) -> String {
    if x.fract() == 0.0 && x.is_finite() {
        format!("{:.1}", x)
    } else {
        format!("{}", x)
    }
}

/// Render one expression as source text.
pub fn expr_src(expr: &Expr) -> String {
    match &expr.kind {
        // i64::MIN only arises from the boundary lexeme, which must print
        // back as itself to re-lex correctly.
        ExprKind::Int(n) if *n == i64::MIN => "9223372036854775808".to_string(),
        ExprKind::Int(n) => n.to_string(),
        ExprKind::Float(x) => float_src(*x),
        ExprKind::Str(s) => format!("\"{}\"", s),
        ExprKind::Bool(b) => b.to_string(),
        ExprKind::Nil => "nil".to_string(),
        ExprKind::Var(name) => name.clone(),
        ExprKind::SelfRef => "self".to_string(),
        ExprKind::EnumAccess { enum_name, value } => format!("{}.{}", enum_name, value),
        ExprKind::FieldAccess { object, field } => format!("{}.{}", expr_src(object), field),
        ExprKind::Call { name, args } => format!("{}({})", name, args_src(args)),
        ExprKind::MethodCall {
            object,
            method,
            args,
        } => format!("{}.{}({})", expr_src(object), method, args_src(args)),
        ExprKind::ClassNew { class, args } => format!("{}({})", class, args_src(args)),
        ExprKind::StructLit {
            name,
            named,
            positional,
            use_defaults,
        } => {
            if *use_defaults {
                format!("{}{{}}", name)
            } else if !named.is_empty() {
                let fields: Vec<String> = named
                    .iter()
                    .map(|(field, value)| format!("{} = {}", field, expr_src(value)))
                    .collect();
                format!("{}{{ {} }}", name, fields.join(", "))
            } else {
                let values: Vec<String> = positional.iter().map(expr_src).collect();
                format!("{}{{ {} }}", name, values.join(", "))
            }
        }
        ExprKind::Lambda(lambda) => {
            let mut s = format!("function({})", params_src(&lambda.params));
            if !lambda.return_type_name.is_empty() {
                s.push_str(&format!(": {}", lambda.return_type_name));
            }
            s.push('\n');
            let mut body = Printer {
                out: String::new(),
                indent: 1,
            };
            for stmt in &lambda.body {
                body.stmt(stmt);
            }
            s.push_str(&body.out);
            s.push_str("end");
            s
        }
        ExprKind::Binary { op, left, right } => {
            format!("({} {} {})", expr_src(left), op, expr_src(right))
        }
        ExprKind::Unary { op, operand } => match op {
            UnaryOp::Neg => format!("(-{})", expr_src(operand)),
            UnaryOp::Not => format!("(not {})", expr_src(operand)),
        },
        ExprKind::ForceUnwrap(operand) => format!("{}!", expr_src(operand)),
    }
}

fn args_src(args: &[Expr]) -> String {
    let rendered: Vec<String> = args.iter().map(expr_src).collect();
    rendered.join(", ")
}
