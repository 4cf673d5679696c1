//! Parser for HolyLua
//!
//! A recursive descent parser with operator-precedence climbing. The
//! parser maintains three in-progress sets of declared type names so that
//! later annotations in the same file resolve lexically, and disambiguates
//! struct constructors from blocks with ad-hoc lookahead.

use crate::ast::*;
use crate::lexer;
use crate::token::{NumberLit, Token, TokenKind};
use thiserror::Error;

/// Parser error: a message plus the offending source line
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub line: u32,
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parse source code into a program plus any parse errors. Lexical errors
/// are surfaced separately through [`lexer::lex`].
pub fn parse(source: &str) -> (Program, Vec<ParseError>) {
    let (tokens, _) = lexer::lex(source);
    let mut parser = Parser::new(tokens);
    let program = parser.parse_program();
    (program, parser.errors)
}

/// The parser for HolyLua
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<ParseError>,
    declared_structs: std::collections::HashSet<String>,
    declared_classes: std::collections::HashSet<String>,
    declared_enums: std::collections::HashSet<String>,
    enum_values: std::collections::HashMap<String, Vec<String>>,
    /// Functions at depth 0 default to global
    function_depth: u32,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            errors: Vec::new(),
            declared_structs: Default::default(),
            declared_classes: Default::default(),
            declared_enums: Default::default(),
            enum_values: Default::default(),
            function_depth: 0,
        }
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    // ============ Token plumbing ============

    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn line(&self) -> u32 {
        self.peek().line
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    /// Check the current token against a payload-free kind
    fn check(&self, kind: TokenKind) -> bool {
        *self.peek_kind() == kind
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_any(&mut self, kinds: &[TokenKind]) -> Option<TokenKind> {
        for kind in kinds {
            if self.check(kind.clone()) {
                return Some(self.advance().kind);
            }
        }
        None
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.err(message))
        }
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            line: self.line(),
        }
    }

    fn err_at(&self, message: impl Into<String>, line: u32) -> ParseError {
        ParseError {
            message: message.into(),
            line,
        }
    }

    fn skip_newlines(&mut self) {
        while self.matches(TokenKind::Newline) {}
    }

    fn check_ident(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Ident(_))
    }

    fn expect_ident(&mut self, message: &str) -> ParseResult<(String, u32)> {
        if self.check_ident() {
            let token = self.advance();
            match token.kind {
                TokenKind::Ident(name) => Ok((name, token.line)),
                _ => unreachable!(),
            }
        } else {
            Err(self.err(message))
        }
    }

    // ============ Top level ============

    pub fn parse_program(&mut self) -> Program {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            self.skip_newlines();
            if self.is_at_end() {
                break;
            }
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }

        Program { statements }
    }

    /// Skip past the failing construct to the next statement boundary
    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if matches!(self.tokens[self.current - 1].kind, TokenKind::Newline) {
                return;
            }
            match self.peek_kind() {
                TokenKind::Function
                | TokenKind::Class
                | TokenKind::Struct
                | TokenKind::Enum
                | TokenKind::For
                | TokenKind::While
                | TokenKind::If
                | TokenKind::Return
                | TokenKind::End => return,
                _ => {}
            }
            self.advance();
        }
    }

    // ============ Statements ============

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        if self.matches(TokenKind::Inline) {
            return self.parse_inline_c();
        }
        if self.matches(TokenKind::While) {
            return self.parse_while();
        }
        if self.matches(TokenKind::Repeat) {
            return self.parse_repeat();
        }
        if self.matches(TokenKind::If) {
            return self.parse_if();
        }
        if self.matches(TokenKind::For) {
            return self.parse_for();
        }
        if self.matches(TokenKind::Print) {
            return self.parse_print();
        }
        if self.matches(TokenKind::Return) {
            return self.parse_return();
        }
        if self.matches(TokenKind::Function) {
            return self.parse_function();
        }
        if self.matches(TokenKind::Struct) {
            return self.parse_struct();
        }
        if self.matches(TokenKind::Class) {
            return self.parse_class();
        }
        if self.matches(TokenKind::Enum) {
            return self.parse_enum();
        }
        self.parse_declaration()
    }

    /// Identifier-leading assignment, field assignment or call, a
    /// `local`/`global`/`const` declaration, or an expression statement.
    fn parse_declaration(&mut self) -> ParseResult<Stmt> {
        let saved = self.current;

        if self.check_ident() {
            let token = self.advance();
            let (name, line) = match token.kind {
                TokenKind::Ident(name) => (name, token.line),
                _ => unreachable!(),
            };

            if let Some(op) = self.match_compound_op() {
                let value = self.parse_expression()?;
                self.skip_newlines();
                return Ok(Stmt::new(
                    StmtKind::Assign {
                        name,
                        value,
                        op: Some(op),
                    },
                    line,
                ));
            }
            if self.matches(TokenKind::Eq) {
                let value = self.parse_expression()?;
                self.skip_newlines();
                return Ok(Stmt::new(StmtKind::Assign { name, value, op: None }, line));
            }
            if self.check(TokenKind::LParen) {
                let call = self.parse_call(name, line)?;
                self.skip_newlines();
                return Ok(Stmt::new(StmtKind::Expr(call), line));
            }

            if self.check(TokenKind::Dot) {
                // Re-parse the whole postfix chain, then look for an assignment.
                self.current = saved;
                let target = self.parse_postfix()?;
                if let Some(stmt) = self.try_field_assignment(target)? {
                    return Ok(stmt);
                }
                // Fall through: re-parse as a plain expression statement so
                // trailing operators still apply.
                self.current = saved;
                let expr = self.parse_expression()?;
                self.skip_newlines();
                let line = expr.line;
                return Ok(Stmt::new(StmtKind::Expr(expr), line));
            }

            self.current = saved;
        }

        if self.check(TokenKind::SelfValue) {
            let saved = self.current;
            let target = self.parse_postfix()?;
            if let Some(stmt) = self.try_field_assignment(target)? {
                return Ok(stmt);
            }
            self.current = saved;
        }

        if matches!(
            self.peek_kind(),
            TokenKind::Local | TokenKind::Global | TokenKind::Const
        ) {
            return self.parse_var_decl();
        }

        let expr = self.parse_expression()?;
        self.skip_newlines();
        let line = expr.line;
        Ok(Stmt::new(StmtKind::Expr(expr), line))
    }

    fn match_compound_op(&mut self) -> Option<BinaryOp> {
        let op = match self.peek_kind() {
            TokenKind::PlusEq => BinaryOp::Add,
            TokenKind::MinusEq => BinaryOp::Sub,
            TokenKind::StarEq => BinaryOp::Mul,
            TokenKind::SlashEq => BinaryOp::Div,
            TokenKind::PercentEq => BinaryOp::Mod,
            TokenKind::StarStarEq => BinaryOp::Pow,
            TokenKind::SlashSlashEq => BinaryOp::FloorDiv,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    /// If `target` is a field access followed by `=` or a compound operator,
    /// build the field assignment.
    fn try_field_assignment(&mut self, target: Expr) -> ParseResult<Option<Stmt>> {
        if let ExprKind::FieldAccess { object, field } = target.kind {
            if self.matches(TokenKind::Eq) {
                let line = self.tokens[self.current - 1].line;
                let value = self.parse_expression()?;
                self.skip_newlines();
                return Ok(Some(Stmt::new(
                    StmtKind::FieldAssign {
                        object: *object,
                        field,
                        value,
                        op: None,
                    },
                    line,
                )));
            }
            if let Some(op) = self.match_compound_op() {
                let line = self.tokens[self.current - 1].line;
                let value = self.parse_expression()?;
                self.skip_newlines();
                return Ok(Some(Stmt::new(
                    StmtKind::FieldAssign {
                        object: *object,
                        field,
                        value,
                        op: Some(op),
                    },
                    line,
                )));
            }
            // Not an assignment; hand the field access back for expression parsing.
            return Ok(None);
        }
        Ok(None)
    }

    fn parse_var_decl(&mut self) -> ParseResult<Stmt> {
        let decl_line = self.line();

        let mut is_local = false;
        let mut is_global = false;
        let mut is_const = false;
        while let Some(kind) = self.match_any(&[
            TokenKind::Local,
            TokenKind::Global,
            TokenKind::Const,
        ]) {
            match kind {
                TokenKind::Local => is_local = true,
                TokenKind::Global => is_global = true,
                TokenKind::Const => is_const = true,
                _ => unreachable!(),
            }
        }

        if !is_local && !is_global && !is_const {
            return Err(self.err_at(
                "Expected declaration keyword (local/global/const)",
                decl_line,
            ));
        }
        if is_local && is_global {
            return Err(self.err_at("Variable cannot be both local and global", decl_line));
        }

        let (name, _) = self.expect_ident("Expected identifier after declaration keywords")?;

        let mut ty = ValueType::Inferred;
        let mut optional = false;
        let mut type_name = String::new();

        if self.matches(TokenKind::Colon) {
            let (parsed_ty, parsed_name) = self.parse_type_name()?;
            ty = parsed_ty;
            type_name = parsed_name;
            if self.matches(TokenKind::Question) {
                optional = true;
            }
        }

        let value = if self.matches(TokenKind::Eq) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        self.skip_newlines();

        Ok(Stmt::new(
            StmtKind::VarDecl(VarDecl {
                is_global,
                is_const,
                name,
                ty,
                optional,
                type_name,
                value,
            }),
            decl_line,
        ))
    }

    /// Parse a type annotation after `:`. Identifiers must name an already
    /// declared struct, class or enum.
    fn parse_type_name(&mut self) -> ParseResult<(ValueType, String)> {
        if self.check_ident() {
            let (name, line) = self.expect_ident("Expected type after ':'")?;
            if self.declared_enums.contains(&name) {
                return Ok((ValueType::Enum, name));
            }
            if self.declared_structs.contains(&name) || self.declared_classes.contains(&name) {
                return Ok((ValueType::Struct, name));
            }
            return Err(self.err_at(format!("Unknown type '{}'", name), line));
        }
        if self.matches(TokenKind::TypeNumber) {
            return Ok((ValueType::Number, "number".to_owned()));
        }
        if self.matches(TokenKind::TypeString) {
            return Ok((ValueType::String, "string".to_owned()));
        }
        if self.matches(TokenKind::TypeBool) {
            return Ok((ValueType::Bool, "bool".to_owned()));
        }
        Err(self.err("Expected type after ':'"))
    }

    // ============ Functions ============

    fn parse_function(&mut self) -> ParseResult<Stmt> {
        let func_line = self.tokens[self.current - 1].line;

        let mut is_global = self.matches(TokenKind::Global);
        if !is_global && self.function_depth == 0 {
            is_global = true;
        }

        let (name, _) = self.expect_ident("Expected function name")?;
        self.expect(TokenKind::LParen, "Expected '(' after function name")?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen, "Expected ')' after parameters")?;

        let mut return_type = ValueType::Inferred;
        let mut return_type_name = String::new();
        if self.matches(TokenKind::Colon) {
            let (ty, type_name) = self.parse_type_name()?;
            return_type = ty;
            return_type_name = type_name;
            // An optional return marker is accepted but not tracked.
            self.matches(TokenKind::Question);
        }

        self.skip_newlines();

        self.function_depth += 1;
        let body = self.parse_block_until_end();
        self.function_depth -= 1;

        self.expect(TokenKind::End, "Expected 'end' to close function")?;
        self.skip_newlines();

        Ok(Stmt::new(
            StmtKind::Function(FunctionDecl {
                name,
                params,
                return_type,
                return_type_name,
                body,
                is_global,
            }),
            func_line,
        ))
    }

    fn parse_params(&mut self) -> ParseResult<Vec<Param>> {
        let mut params = Vec::new();
        if self.check(TokenKind::RParen) {
            return Ok(params);
        }
        loop {
            let (name, _) = self.expect_ident("Expected parameter name")?;
            let mut ty = ValueType::Inferred;
            let mut optional = false;
            let mut type_name = String::new();
            if self.matches(TokenKind::Colon) {
                let (parsed_ty, parsed_name) = self.parse_type_name()?;
                ty = parsed_ty;
                type_name = parsed_name;
                if self.matches(TokenKind::Question) {
                    optional = true;
                }
            }
            params.push(Param {
                name,
                ty,
                optional,
                type_name,
            });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        Ok(params)
    }

    fn parse_block_until_end(&mut self) -> Vec<Stmt> {
        let mut body = Vec::new();
        while !self.check(TokenKind::End) && !self.is_at_end() {
            self.skip_newlines();
            if self.check(TokenKind::End) {
                break;
            }
            match self.parse_statement() {
                Ok(stmt) => body.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }
        body
    }

    fn parse_call(&mut self, name: String, line: u32) -> ParseResult<Expr> {
        self.expect(TokenKind::LParen, "Expected '(' after function name")?;
        let args = self.parse_args()?;
        self.expect(TokenKind::RParen, "Expected ')' after function arguments")?;
        Ok(Expr::new(ExprKind::Call { name, args }, line))
    }

    fn parse_args(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.check(TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        Ok(args)
    }

    fn parse_lambda(&mut self, line: u32) -> ParseResult<Expr> {
        self.expect(TokenKind::LParen, "Expected '(' after function keyword")?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen, "Expected ')' after parameters")?;

        let mut return_type = ValueType::Inferred;
        let mut return_type_name = String::new();
        if self.matches(TokenKind::Colon) {
            let (ty, type_name) = self.parse_type_name()?;
            return_type = ty;
            return_type_name = type_name;
            self.matches(TokenKind::Question);
        }

        self.skip_newlines();

        self.function_depth += 1;
        let body = self.parse_block_until_end();
        self.function_depth -= 1;

        self.expect(TokenKind::End, "Expected 'end' to close anonymous function")?;
        self.skip_newlines();

        Ok(Expr::new(
            ExprKind::Lambda(Box::new(LambdaDef {
                params,
                return_type,
                return_type_name,
                body,
            })),
            line,
        ))
    }

    // ============ Control flow ============

    fn parse_if(&mut self) -> ParseResult<Stmt> {
        let if_line = self.tokens[self.current - 1].line;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::Then, "Expected 'then' after if condition")?;
        self.skip_newlines();

        let mut then_block = Vec::new();
        let mut elseif_branches = Vec::new();
        let mut else_block = Vec::new();

        while !self.at_if_boundary() && !self.is_at_end() {
            self.skip_newlines();
            if self.at_if_boundary() {
                break;
            }
            match self.parse_statement() {
                Ok(stmt) => then_block.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }

        while self.matches(TokenKind::Elseif) {
            let cond = self.parse_expression()?;
            self.expect(TokenKind::Then, "Expected 'then' after elseif condition")?;
            self.skip_newlines();

            let mut block = Vec::new();
            while !self.at_if_boundary() && !self.is_at_end() {
                self.skip_newlines();
                if self.at_if_boundary() {
                    break;
                }
                match self.parse_statement() {
                    Ok(stmt) => block.push(stmt),
                    Err(e) => {
                        self.errors.push(e);
                        self.synchronize();
                    }
                }
            }
            elseif_branches.push((cond, block));
        }

        if self.matches(TokenKind::Else) {
            self.skip_newlines();
            while !self.check(TokenKind::End) && !self.is_at_end() {
                self.skip_newlines();
                if self.check(TokenKind::End) {
                    break;
                }
                match self.parse_statement() {
                    Ok(stmt) => else_block.push(stmt),
                    Err(e) => {
                        self.errors.push(e);
                        self.synchronize();
                    }
                }
            }
        }

        self.expect(TokenKind::End, "Expected 'end' to close if statement")?;
        self.skip_newlines();

        Ok(Stmt::new(
            StmtKind::If(IfStmt {
                condition,
                then_block,
                elseif_branches,
                else_block,
            }),
            if_line,
        ))
    }

    fn at_if_boundary(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Elseif | TokenKind::Else | TokenKind::End
        )
    }

    fn parse_while(&mut self) -> ParseResult<Stmt> {
        let while_line = self.tokens[self.current - 1].line;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::Do, "Expected 'do' after while condition")?;
        self.skip_newlines();

        let body = self.parse_block_until_end();
        self.expect(TokenKind::End, "Expected 'end' to close while statement")?;
        self.skip_newlines();

        Ok(Stmt::new(StmtKind::While { condition, body }, while_line))
    }

    fn parse_repeat(&mut self) -> ParseResult<Stmt> {
        let repeat_line = self.tokens[self.current - 1].line;
        self.skip_newlines();

        let mut body = Vec::new();
        while !self.check(TokenKind::Until) && !self.is_at_end() {
            self.skip_newlines();
            if self.check(TokenKind::Until) {
                break;
            }
            match self.parse_statement() {
                Ok(stmt) => body.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }

        self.expect(TokenKind::Until, "Expected 'until' after repeat body")?;
        let condition = self.parse_expression()?;
        self.skip_newlines();

        Ok(Stmt::new(StmtKind::Repeat { body, condition }, repeat_line))
    }

    fn parse_for(&mut self) -> ParseResult<Stmt> {
        let for_line = self.tokens[self.current - 1].line;

        self.expect(TokenKind::Local, "Expected 'local' in for loop declaration")?;
        let (var, _) = self.expect_ident("Expected variable name in for loop")?;
        self.expect(TokenKind::Eq, "Expected '=' after for loop variable")?;
        let start = self.parse_expression()?;
        self.expect(TokenKind::Comma, "Expected ',' after start value")?;
        let end = self.parse_expression()?;
        let step = if self.matches(TokenKind::Comma) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.matches(TokenKind::Do);
        self.skip_newlines();

        let body = self.parse_block_until_end();
        self.expect(TokenKind::End, "Expected 'end' to close for loop")?;
        self.skip_newlines();

        Ok(Stmt::new(
            StmtKind::For {
                var,
                start,
                end,
                step,
                body,
            },
            for_line,
        ))
    }

    fn parse_print(&mut self) -> ParseResult<Stmt> {
        let print_line = self.tokens[self.current - 1].line;
        self.expect(TokenKind::LParen, "Expected '(' after 'print'")?;

        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let expr = self.parse_expression()?;
                match expr.kind {
                    ExprKind::Var(name) => args.push(PrintArg::Ident(name)),
                    _ => args.push(PrintArg::Expr(expr)),
                }
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect(TokenKind::RParen, "Expected ')' after print arguments")?;
        self.skip_newlines();

        Ok(Stmt::new(StmtKind::Print(args), print_line))
    }

    fn parse_return(&mut self) -> ParseResult<Stmt> {
        let return_line = self.tokens[self.current - 1].line;
        let value = if !self.check(TokenKind::Newline)
            && !self.check(TokenKind::End)
            && !self.is_at_end()
        {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.skip_newlines();
        Ok(Stmt::new(StmtKind::Return(value), return_line))
    }

    fn parse_inline_c(&mut self) -> ParseResult<Stmt> {
        let line = self.tokens[self.current - 1].line;

        match self.peek_kind() {
            TokenKind::Ident(name) if name == "C" => {
                self.advance();
            }
            _ => return Err(self.err("Expected 'C' after 'inline'")),
        }
        self.expect(TokenKind::LBracket, "Expected '[' after 'C'")?;
        self.expect(TokenKind::LBracket, "Expected second '[' for C[[ syntax")?;
        self.skip_newlines();

        let mut code = String::new();
        while !self.is_at_end() {
            if self.check(TokenKind::RBracket)
                && matches!(
                    self.tokens.get(self.current + 1).map(|t| &t.kind),
                    Some(TokenKind::RBracket)
                )
            {
                break;
            }

            let token = self.advance();
            if token.kind == TokenKind::Newline {
                code.push('\n');
                continue;
            }
            code.push_str(&token.kind.lexeme());

            if !self.is_at_end()
                && !self.check(TokenKind::RBracket)
                && !self.check(TokenKind::Newline)
            {
                code.push(' ');
            }
        }

        self.expect(TokenKind::RBracket, "Expected ']]' to close inline C block")?;
        self.expect(TokenKind::RBracket, "Expected second ']' for ]] syntax")?;

        while code.ends_with(' ') || code.ends_with('\n') {
            code.pop();
        }

        self.skip_newlines();
        Ok(Stmt::new(StmtKind::InlineC(code), line))
    }

    // ============ Type declarations ============

    fn parse_struct(&mut self) -> ParseResult<Stmt> {
        let struct_line = self.tokens[self.current - 1].line;
        let (name, _) = self.expect_ident("Expected struct name")?;

        self.declared_structs.insert(name.clone());
        self.skip_newlines();

        let mut fields = Vec::new();
        while !self.check(TokenKind::End) && !self.is_at_end() {
            self.skip_newlines();
            if self.check(TokenKind::End) {
                break;
            }

            let (field_name, _) = self.expect_ident("Expected field name")?;
            let mut ty = ValueType::Inferred;
            let mut optional = false;
            let mut type_name = String::new();
            if self.matches(TokenKind::Colon) {
                let (parsed_ty, parsed_name) = self.parse_type_name()?;
                ty = parsed_ty;
                type_name = parsed_name;
                if self.matches(TokenKind::Question) {
                    optional = true;
                }
            }

            let default = if self.matches(TokenKind::Eq) {
                Some(self.parse_literal_default()?)
            } else {
                None
            };

            self.matches(TokenKind::Comma);
            self.skip_newlines();

            fields.push(StructField {
                name: field_name,
                ty,
                optional,
                default,
                type_name,
            });
        }

        self.expect(TokenKind::End, "Expected 'end' to close struct")?;
        self.skip_newlines();

        Ok(Stmt::new(
            StmtKind::Struct(StructDecl { name, fields }),
            struct_line,
        ))
    }

    fn parse_literal_default(&mut self) -> ParseResult<DefaultValue> {
        match self.peek_kind().clone() {
            TokenKind::Number(NumberLit::Int(n)) => {
                self.advance();
                Ok(DefaultValue::Int(n))
            }
            TokenKind::Number(NumberLit::Float(x)) => {
                self.advance();
                Ok(DefaultValue::Float(x))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(DefaultValue::Str(s))
            }
            TokenKind::True => {
                self.advance();
                Ok(DefaultValue::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(DefaultValue::Bool(false))
            }
            TokenKind::Nil => {
                self.advance();
                Ok(DefaultValue::Nil)
            }
            _ => Err(self.err("Default value must be a literal")),
        }
    }

    fn parse_class(&mut self) -> ParseResult<Stmt> {
        let class_line = self.tokens[self.current - 1].line;
        let (name, _) = self.expect_ident("Expected class name")?;

        self.declared_classes.insert(name.clone());
        self.skip_newlines();

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        let mut constructor: Option<ClassMethod> = None;

        while !self.check(TokenKind::End) && !self.is_at_end() {
            self.skip_newlines();
            if self.check(TokenKind::End) {
                break;
            }

            let mut visibility = Visibility::Private;
            if self.matches(TokenKind::Public) {
                visibility = Visibility::Public;
                self.skip_newlines();
            } else if self.matches(TokenKind::Private) {
                self.skip_newlines();
            }

            let mut is_static = false;
            if self.matches(TokenKind::Static) {
                is_static = true;
                self.skip_newlines();
            }

            if self.matches(TokenKind::Function) {
                let method = self.parse_class_method(visibility, is_static)?;
                if method.name == "__init" {
                    if constructor.is_some() {
                        return Err(
                            self.err_at("Class can only have one __init constructor", method.line)
                        );
                    }
                    if is_static {
                        return Err(
                            self.err_at("Constructor __init cannot be static", method.line)
                        );
                    }
                    constructor = Some(method);
                } else {
                    methods.push(method);
                }
            } else {
                let field = self.parse_class_field(visibility, is_static)?;
                fields.push(field);
            }

            self.skip_newlines();
        }

        self.expect(TokenKind::End, "Expected 'end' to close class")?;
        self.skip_newlines();

        Ok(Stmt::new(
            StmtKind::Class(ClassDecl {
                name,
                fields,
                methods,
                constructor,
            }),
            class_line,
        ))
    }

    fn parse_class_field(
        &mut self,
        visibility: Visibility,
        is_static: bool,
    ) -> ParseResult<ClassField> {
        let is_const = self.matches(TokenKind::Const);

        let (name, _) = self.expect_ident("Expected field name")?;
        let mut ty = ValueType::Inferred;
        let mut optional = false;
        let mut type_name = String::new();

        if self.matches(TokenKind::Colon) {
            let (parsed_ty, parsed_name) = self.parse_type_name()?;
            ty = parsed_ty;
            type_name = parsed_name;
            if self.matches(TokenKind::Question) {
                optional = true;
            }
        }

        let mut default = None;
        if self.matches(TokenKind::Eq) {
            if is_static {
                if let TokenKind::Ident(ident) = self.peek_kind() {
                    if self.declared_classes.contains(ident) {
                        return Err(self.err(
                            "Complex default values for static fields should be handled in initialization",
                        ));
                    }
                }
            }
            let literal = if is_const {
                self.parse_literal_default()
                    .map_err(|e| self.err_at("Const fields must be initialized with literals", e.line))?
            } else {
                self.parse_literal_default()?
            };
            // Const fields may omit the annotation; the literal fixes the type.
            if is_const && ty == ValueType::Inferred {
                ty = match &literal {
                    DefaultValue::Int(_) | DefaultValue::Float(_) => ValueType::Number,
                    DefaultValue::Str(_) => ValueType::String,
                    DefaultValue::Bool(_) => ValueType::Bool,
                    DefaultValue::Nil => ValueType::Inferred,
                };
            }
            default = Some(literal);
        } else if !is_const && ty == ValueType::Inferred {
            return Err(self.err("Non-const fields must have type annotation"));
        }

        if is_const && default.is_none() {
            return Err(self.err("Const fields must be initialized"));
        }
        if is_const && optional {
            return Err(self.err("Const fields cannot be optional"));
        }

        Ok(ClassField {
            visibility,
            is_static,
            is_const,
            name,
            ty,
            optional,
            default,
            type_name,
        })
    }

    fn parse_class_method(
        &mut self,
        visibility: Visibility,
        is_static: bool,
    ) -> ParseResult<ClassMethod> {
        let method_line = self.tokens[self.current - 1].line;

        let (name, _) = self.expect_ident("Expected method name")?;
        self.expect(TokenKind::LParen, "Expected '(' after method name")?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen, "Expected ')' after parameters")?;

        let mut return_type = ValueType::Inferred;
        let mut return_type_name = String::new();
        if self.matches(TokenKind::Colon) {
            let (ty, type_name) = self.parse_type_name()?;
            return_type = ty;
            return_type_name = type_name;
            self.matches(TokenKind::Question);
        }

        self.skip_newlines();

        self.function_depth += 1;
        let body = self.parse_block_until_end();
        self.function_depth -= 1;

        self.expect(TokenKind::End, "Expected 'end' to close method")?;
        self.skip_newlines();

        Ok(ClassMethod {
            visibility,
            is_static,
            name,
            params,
            return_type,
            return_type_name,
            body,
            line: method_line,
        })
    }

    fn parse_enum(&mut self) -> ParseResult<Stmt> {
        let line = self.tokens[self.current - 1].line;
        let (name, _) = self.expect_ident("Expected enum name")?;

        if self.declared_enums.contains(&name)
            || self.declared_structs.contains(&name)
            || self.declared_classes.contains(&name)
        {
            return Err(self.err_at(format!("Type '{}' already declared", name), line));
        }

        self.skip_newlines();

        let mut values = Vec::new();
        while !self.check(TokenKind::End) && !self.is_at_end() {
            self.skip_newlines();
            if self.check(TokenKind::End) {
                break;
            }
            if !self.check_ident() {
                let e = self.err("Expected enum value name");
                self.errors.push(e);
                self.advance();
                continue;
            }
            let (value, _) = self.expect_ident("Expected enum value name")?;
            values.push(value);
            self.skip_newlines();
        }

        self.expect(TokenKind::End, "Expected 'end' after enum declaration")?;
        self.skip_newlines();

        self.declared_enums.insert(name.clone());
        self.enum_values.insert(name.clone(), values.clone());

        Ok(Stmt::new(StmtKind::Enum(EnumDecl { name, values }), line))
    }

    // ============ Expressions ============

    pub fn parse_expression(&mut self) -> ParseResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_and()?;
        while self.check(TokenKind::Or) {
            let line = self.advance().line;
            let right = self.parse_and()?;
            expr = Expr::new(
                ExprKind::Binary {
                    op: BinaryOp::Or,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                line,
            );
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_nil_coalescing()?;
        while self.check(TokenKind::And) {
            let line = self.advance().line;
            let right = self.parse_nil_coalescing()?;
            expr = Expr::new(
                ExprKind::Binary {
                    op: BinaryOp::And,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                line,
            );
        }
        Ok(expr)
    }

    fn parse_nil_coalescing(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_concat()?;
        while self.check(TokenKind::QuestionQuestion) {
            let line = self.advance().line;
            let right = self.parse_concat()?;
            expr = Expr::new(
                ExprKind::Binary {
                    op: BinaryOp::NilCoalesce,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                line,
            );
        }
        Ok(expr)
    }

    fn parse_concat(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_comparison()?;
        while self.check(TokenKind::DotDot) {
            let line = self.advance().line;
            let right = self.parse_comparison()?;
            expr = Expr::new(
                ExprKind::Binary {
                    op: BinaryOp::Concat,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                line,
            );
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::Ne,
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::LtEq => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::GtEq => BinaryOp::Ge,
                _ => break,
            };
            let line = self.advance().line;
            let right = self.parse_additive()?;
            expr = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                line,
            );
        }
        Ok(expr)
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let line = self.advance().line;
            let right = self.parse_multiplicative()?;
            expr = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                line,
            );
        }
        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_power()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                TokenKind::SlashSlash => BinaryOp::FloorDiv,
                _ => break,
            };
            let line = self.advance().line;
            let right = self.parse_power()?;
            expr = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                line,
            );
        }
        Ok(expr)
    }

    fn parse_power(&mut self) -> ParseResult<Expr> {
        let expr = self.parse_unary()?;
        if self.check(TokenKind::StarStar) {
            let line = self.advance().line;
            // right-associative
            let right = self.parse_power()?;
            return Ok(Expr::new(
                ExprKind::Binary {
                    op: BinaryOp::Pow,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                line,
            ));
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        if self.check(TokenKind::Minus) {
            let line = self.advance().line;
            let operand = self.parse_unary()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                },
                line,
            ));
        }
        if self.check(TokenKind::Not) {
            let line = self.advance().line;
            let operand = self.parse_unary()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                line,
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.matches(TokenKind::Dot) {
                let (member, member_line) = self.expect_ident("Expected member name after '.'")?;

                // An enum name on the left makes this an enum value access.
                if let ExprKind::Var(name) = &expr.kind {
                    if self.declared_enums.contains(name) {
                        if let Some(values) = self.enum_values.get(name) {
                            if !values.contains(&member) {
                                return Err(self.err_at(
                                    format!("Enum '{}' has no value '{}'", name, member),
                                    member_line,
                                ));
                            }
                        }
                        expr = Expr::new(
                            ExprKind::EnumAccess {
                                enum_name: name.clone(),
                                value: member,
                            },
                            member_line,
                        );
                        continue;
                    }
                }

                if self.matches(TokenKind::LParen) {
                    let args = self.parse_args()?;
                    self.expect(TokenKind::RParen, "Expected ')' after arguments")?;
                    expr = Expr::new(
                        ExprKind::MethodCall {
                            object: Box::new(expr),
                            method: member,
                            args,
                        },
                        member_line,
                    );
                } else {
                    expr = Expr::new(
                        ExprKind::FieldAccess {
                            object: Box::new(expr),
                            field: member,
                        },
                        member_line,
                    );
                }
            } else if self.check(TokenKind::Bang) {
                let line = self.advance().line;
                expr = Expr::new(ExprKind::ForceUnwrap(Box::new(expr)), line);
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let line = self.line();

        match self.peek_kind().clone() {
            TokenKind::Number(NumberLit::Int(n)) => {
                self.advance();
                Ok(Expr::new(ExprKind::Int(n), line))
            }
            TokenKind::Number(NumberLit::Float(x)) => {
                self.advance();
                Ok(Expr::new(ExprKind::Float(x), line))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::new(ExprKind::Str(s), line))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::new(ExprKind::Bool(true), line))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::new(ExprKind::Bool(false), line))
            }
            TokenKind::Nil => {
                self.advance();
                Ok(Expr::new(ExprKind::Nil, line))
            }
            TokenKind::SelfValue => {
                self.advance();
                Ok(Expr::new(ExprKind::SelfRef, line))
            }
            TokenKind::Function => {
                self.advance();
                self.parse_lambda(line)
            }
            TokenKind::Ident(name) => {
                self.advance();

                if self.declared_classes.contains(&name) && self.check(TokenKind::LParen) {
                    return self.parse_class_new(name, line);
                }

                if self.check(TokenKind::LBrace) {
                    if self.declared_structs.contains(&name) {
                        return self.parse_struct_lit(name, line);
                    }
                    return Err(self.err("Unexpected '{' after identifier"));
                }

                if self.check(TokenKind::LParen) {
                    return self.parse_call(name, line);
                }

                Ok(Expr::new(ExprKind::Var(name), line))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen, "Expected ')' after expression")?;
                Ok(expr)
            }
            _ => Err(self.err("Expected expression")),
        }
    }

    fn parse_class_new(&mut self, class: String, line: u32) -> ParseResult<Expr> {
        self.expect(TokenKind::LParen, "Expected '(' after class name")?;
        let args = self.parse_args()?;
        self.expect(TokenKind::RParen, "Expected ')' after arguments")?;
        Ok(Expr::new(ExprKind::ClassNew { class, args }, line))
    }

    /// Parse `Name{...}`. Named-field form is recognized by scanning ahead
    /// for an identifier immediately followed by `=` or `:`.
    fn parse_struct_lit(&mut self, name: String, line: u32) -> ParseResult<Expr> {
        self.expect(TokenKind::LBrace, "Expected '{' after struct name")?;
        self.skip_newlines();

        if self.matches(TokenKind::RBrace) {
            return Ok(Expr::new(
                ExprKind::StructLit {
                    name,
                    named: Vec::new(),
                    positional: Vec::new(),
                    use_defaults: true,
                },
                line,
            ));
        }

        let is_named = self.scan_for_named_fields();

        let mut named = Vec::new();
        let mut positional = Vec::new();

        if is_named {
            while !self.check(TokenKind::RBrace) && !self.is_at_end() {
                self.skip_newlines();
                if self.check(TokenKind::RBrace) {
                    break;
                }

                let (field, _) = self.expect_ident("Expected field name in struct constructor")?;
                if !self.matches(TokenKind::Eq) && !self.matches(TokenKind::Colon) {
                    return Err(self.err("Expected '=' or ':' after field name"));
                }
                let value = self.parse_expression()?;
                named.push((field, value));

                self.skip_newlines();
                if self.check(TokenKind::RBrace) {
                    break;
                }
                if !self.matches(TokenKind::Comma) && !self.check(TokenKind::RBrace) {
                    return Err(self.err("Expected ',' or '}' after field assignment"));
                }
            }
        } else {
            while !self.check(TokenKind::RBrace) && !self.is_at_end() {
                self.skip_newlines();
                if self.check(TokenKind::RBrace) {
                    break;
                }

                positional.push(self.parse_expression()?);

                self.skip_newlines();
                if self.check(TokenKind::RBrace) {
                    break;
                }
                if !self.matches(TokenKind::Comma) && !self.check(TokenKind::RBrace) {
                    return Err(self.err("Expected ',' or '}' after argument"));
                }
            }
        }

        self.expect(TokenKind::RBrace, "Expected '}' after struct constructor")?;

        Ok(Expr::new(
            ExprKind::StructLit {
                name,
                named,
                positional,
                use_defaults: false,
            },
            line,
        ))
    }

    fn scan_for_named_fields(&self) -> bool {
        let mut idx = self.current;
        loop {
            while idx < self.tokens.len() && self.tokens[idx].kind == TokenKind::Newline {
                idx += 1;
            }
            if idx >= self.tokens.len() {
                return false;
            }
            if matches!(self.tokens[idx].kind, TokenKind::Ident(_)) {
                let mut lookahead = idx + 1;
                while lookahead < self.tokens.len()
                    && self.tokens[lookahead].kind == TokenKind::Newline
                {
                    lookahead += 1;
                }
                if lookahead < self.tokens.len()
                    && matches!(
                        self.tokens[lookahead].kind,
                        TokenKind::Eq | TokenKind::Colon
                    )
                {
                    return true;
                }
                return false;
            }
            match self.tokens[idx].kind {
                TokenKind::RBrace
                | TokenKind::Comma
                | TokenKind::Number(_)
                | TokenKind::Str(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Nil
                | TokenKind::Eof => return false,
                _ => idx += 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Program {
        let (program, errors) = parse(source);
        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        program
    }

    fn parse_err(source: &str) -> Vec<ParseError> {
        let (_, errors) = parse(source);
        assert!(!errors.is_empty(), "expected parse errors");
        errors
    }

    #[test]
    fn test_var_decl() {
        let program = parse_ok("local x: number = 1");
        match &program.statements[0].kind {
            StmtKind::VarDecl(decl) => {
                assert_eq!(decl.name, "x");
                assert_eq!(decl.ty, ValueType::Number);
                assert!(!decl.is_global);
                assert!(decl.value.is_some());
            }
            other => panic!("expected var decl, got {:?}", other),
        }
    }

    #[test]
    fn test_optional_decl() {
        let program = parse_ok("local x: number? = nil");
        match &program.statements[0].kind {
            StmtKind::VarDecl(decl) => {
                assert!(decl.optional);
                assert_eq!(decl.value.as_ref().unwrap().kind, ExprKind::Nil);
            }
            other => panic!("expected var decl, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_annotation() {
        let errors = parse_err("local x: Widget = 1");
        assert!(errors[0].message.contains("Unknown type 'Widget'"));
    }

    #[test]
    fn test_precedence() {
        let program = parse_ok("local x = 1 + 2 * 3");
        match &program.statements[0].kind {
            StmtKind::VarDecl(decl) => match &decl.value.as_ref().unwrap().kind {
                ExprKind::Binary { op, right, .. } => {
                    assert_eq!(*op, BinaryOp::Add);
                    assert!(matches!(
                        right.kind,
                        ExprKind::Binary {
                            op: BinaryOp::Mul,
                            ..
                        }
                    ));
                }
                other => panic!("expected binary, got {:?}", other),
            },
            other => panic!("expected var decl, got {:?}", other),
        }
    }

    #[test]
    fn test_power_right_assoc() {
        let program = parse_ok("local x = 2 ** 3 ** 2");
        match &program.statements[0].kind {
            StmtKind::VarDecl(decl) => match &decl.value.as_ref().unwrap().kind {
                ExprKind::Binary { op, right, .. } => {
                    assert_eq!(*op, BinaryOp::Pow);
                    assert!(matches!(
                        right.kind,
                        ExprKind::Binary {
                            op: BinaryOp::Pow,
                            ..
                        }
                    ));
                }
                other => panic!("expected power, got {:?}", other),
            },
            other => panic!("expected var decl, got {:?}", other),
        }
    }

    #[test]
    fn test_lua_ternary_shape() {
        // (cond and a or b) must parse as Or(And(cond, a), b)
        let program = parse_ok("local x = (1 < 2) and \"yes\" or \"no\"");
        match &program.statements[0].kind {
            StmtKind::VarDecl(decl) => match &decl.value.as_ref().unwrap().kind {
                ExprKind::Binary {
                    op: BinaryOp::Or,
                    left,
                    ..
                } => {
                    assert!(matches!(
                        left.kind,
                        ExprKind::Binary {
                            op: BinaryOp::And,
                            ..
                        }
                    ));
                }
                other => panic!("expected or, got {:?}", other),
            },
            other => panic!("expected var decl, got {:?}", other),
        }
    }

    #[test]
    fn test_compound_assignment() {
        let program = parse_ok("local x = 1\nx += 2");
        match &program.statements[1].kind {
            StmtKind::Assign { op, .. } => assert_eq!(*op, Some(BinaryOp::Add)),
            other => panic!("expected assign, got {:?}", other),
        }
    }

    #[test]
    fn test_function_decl() {
        let program = parse_ok("function add(a: number, b: number): number\nreturn a + b\nend");
        match &program.statements[0].kind {
            StmtKind::Function(func) => {
                assert_eq!(func.name, "add");
                assert!(func.is_global);
                assert_eq!(func.params.len(), 2);
                assert_eq!(func.return_type, ValueType::Number);
                assert_eq!(func.body.len(), 1);
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_function_not_global() {
        let program = parse_ok("function outer(a: number)\nfunction inner(b: number)\nreturn b\nend\nreturn a\nend");
        match &program.statements[0].kind {
            StmtKind::Function(outer) => match &outer.body[0].kind {
                StmtKind::Function(inner) => assert!(!inner.is_global),
                other => panic!("expected nested function, got {:?}", other),
            },
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_struct_and_constructor_forms() {
        let src = "struct Point\nx: number = 0\ny: number = 0\nend\nlocal a = Point{}\nlocal b = Point{1, 2}\nlocal c = Point{ x = 1 }";
        let program = parse_ok(src);
        let lit = |stmt: &Stmt| match &stmt.kind {
            StmtKind::VarDecl(decl) => decl.value.clone().unwrap().kind,
            other => panic!("expected var decl, got {:?}", other),
        };
        match lit(&program.statements[1]) {
            ExprKind::StructLit { use_defaults, .. } => assert!(use_defaults),
            other => panic!("expected struct lit, got {:?}", other),
        }
        match lit(&program.statements[2]) {
            ExprKind::StructLit { positional, .. } => assert_eq!(positional.len(), 2),
            other => panic!("expected struct lit, got {:?}", other),
        }
        match lit(&program.statements[3]) {
            ExprKind::StructLit { named, .. } => assert_eq!(named[0].0, "x"),
            other => panic!("expected struct lit, got {:?}", other),
        }
    }

    #[test]
    fn test_enum_access() {
        let program = parse_ok("enum Color\nRed\nGreen\nBlue\nend\nlocal c = Color.Green");
        match &program.statements[1].kind {
            StmtKind::VarDecl(decl) => match &decl.value.as_ref().unwrap().kind {
                ExprKind::EnumAccess { enum_name, value } => {
                    assert_eq!(enum_name, "Color");
                    assert_eq!(value, "Green");
                }
                other => panic!("expected enum access, got {:?}", other),
            },
            other => panic!("expected var decl, got {:?}", other),
        }
    }

    #[test]
    fn test_enum_unknown_value() {
        let errors = parse_err("enum Color\nRed\nend\nlocal c = Color.Purple");
        assert!(errors[0].message.contains("has no value 'Purple'"));
    }

    #[test]
    fn test_class_with_constructor_and_method() {
        let src = "class Counter\nprivate count: number = 0\npublic function __init(start: number)\nself.count = start\nend\npublic function value(): number\nreturn self.count\nend\nend";
        let program = parse_ok(src);
        match &program.statements[0].kind {
            StmtKind::Class(class) => {
                assert_eq!(class.name, "Counter");
                assert!(class.constructor.is_some());
                assert_eq!(class.methods.len(), 1);
                assert_eq!(class.fields[0].visibility, Visibility::Private);
            }
            other => panic!("expected class, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_constructor_rejected() {
        let src = "class A\npublic x: number = 0\npublic function __init()\nself.x = 1\nend\npublic function __init()\nself.x = 2\nend\nend";
        let errors = parse_err(src);
        assert!(errors[0].message.contains("one __init constructor"));
    }

    #[test]
    fn test_class_instantiation_and_method_call() {
        let src = "class P\npublic x: number = 0\npublic function __init()\nself.x = 0\nend\nend\nlocal p = P()\np.show()";
        let program = parse_ok(src);
        match &program.statements[1].kind {
            StmtKind::VarDecl(decl) => {
                assert!(matches!(
                    decl.value.as_ref().unwrap().kind,
                    ExprKind::ClassNew { .. }
                ));
            }
            other => panic!("expected var decl, got {:?}", other),
        }
        match &program.statements[2].kind {
            StmtKind::Expr(expr) => {
                assert!(matches!(expr.kind, ExprKind::MethodCall { .. }));
            }
            other => panic!("expected method call stmt, got {:?}", other),
        }
    }

    #[test]
    fn test_field_assignment() {
        let src = "struct P\nx: number = 0\nend\nlocal p = P{}\np.x = 3";
        let program = parse_ok(src);
        match &program.statements[2].kind {
            StmtKind::FieldAssign { field, op, .. } => {
                assert_eq!(field, "x");
                assert!(op.is_none());
            }
            other => panic!("expected field assign, got {:?}", other),
        }
    }

    #[test]
    fn test_self_field_compound_assignment() {
        let src = "class C\npublic n: number = 0\npublic function bump()\nself.n += 1\nend\nend";
        let program = parse_ok(src);
        match &program.statements[0].kind {
            StmtKind::Class(class) => match &class.methods[0].body[0].kind {
                StmtKind::FieldAssign { op, .. } => assert_eq!(*op, Some(BinaryOp::Add)),
                other => panic!("expected field assign, got {:?}", other),
            },
            other => panic!("expected class, got {:?}", other),
        }
    }

    #[test]
    fn test_print_ident_vs_expr() {
        let program = parse_ok("local x = 1\nprint(x, x + 1)");
        match &program.statements[1].kind {
            StmtKind::Print(args) => {
                assert!(matches!(args[0], PrintArg::Ident(_)));
                assert!(matches!(args[1], PrintArg::Expr(_)));
            }
            other => panic!("expected print, got {:?}", other),
        }
    }

    #[test]
    fn test_force_unwrap() {
        let program = parse_ok("local x: number? = nil\nprint(x!)");
        match &program.statements[1].kind {
            StmtKind::Print(args) => match &args[0] {
                PrintArg::Expr(expr) => {
                    assert!(matches!(expr.kind, ExprKind::ForceUnwrap(_)));
                }
                other => panic!("expected expr arg, got {:?}", other),
            },
            other => panic!("expected print, got {:?}", other),
        }
    }

    #[test]
    fn test_loops() {
        let program =
            parse_ok("for local i = 1, 10, 2 do\nprint(i)\nend\nwhile true do\nend\nrepeat\nuntil true");
        assert!(matches!(program.statements[0].kind, StmtKind::For { .. }));
        assert!(matches!(program.statements[1].kind, StmtKind::While { .. }));
        assert!(matches!(program.statements[2].kind, StmtKind::Repeat { .. }));
    }

    #[test]
    fn test_if_elseif_else() {
        let src = "local x = 1\nif x > 0 then\nprint(\"a\")\nelseif x < 0 then\nprint(\"b\")\nelse\nprint(\"c\")\nend";
        let program = parse_ok(src);
        match &program.statements[1].kind {
            StmtKind::If(if_stmt) => {
                assert_eq!(if_stmt.elseif_branches.len(), 1);
                assert_eq!(if_stmt.else_block.len(), 1);
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_inline_c() {
        let program = parse_ok("inline C[[ int z = 1 ; ]]");
        match &program.statements[0].kind {
            StmtKind::InlineC(code) => assert!(code.contains("int z = 1")),
            other => panic!("expected inline C, got {:?}", other),
        }
    }

    #[test]
    fn test_error_recovery_keeps_going() {
        // First statement is bad, the rest must still parse.
        let (program, errors) = parse("local = 5\nlocal y = 2\nprint(y)");
        assert!(!errors.is_empty());
        assert!(program
            .statements
            .iter()
            .any(|s| matches!(s.kind, StmtKind::Print(_))));
    }

    #[test]
    fn test_round_trip_through_printer() {
        let src = "enum Color\nRed\nGreen\nend\nstruct Pixel\nc: Color\nv: number = 0\nend\nclass Counter\nprivate const id: number = 7\npublic count: number = 0\npublic function __init(start: number)\nself.count = start\nend\npublic function value(): number\nreturn self.count\nend\nend\nfunction describe(n: number?): string\nif n != nil then\nreturn \"some\"\nelse\nreturn \"none\"\nend\nend\nlocal p = Pixel{ c = Color.Green }\nlocal c = Counter(2)\nprint(p.v, c.value(), describe(nil))\nfor local i = 1, 3 do\nprint((i > 1) and \"big\" or \"small\")\nend";
        let first = parse_ok(src);
        let printed = crate::ast::printer::pretty(&first);
        let second = parse_ok(&printed);
        assert_eq!(first, second, "printed form:\n{}", printed);
    }
}
