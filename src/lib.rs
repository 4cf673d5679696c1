//! HolyLua Compiler
//!
//! An ahead-of-time compiler from a statically-typed, Lua-flavored source
//! language to portable C. The emitted C links against a small runtime
//! library (`holylua_api`) providing stringification, nil sentinels and I/O.
//!
//! # Architecture
//!
//! ```text
//! Source Code (.hlua)
//!       │
//!       ▼
//! ┌─────────────┐
//! │    Lexer    │  → Tokens
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │   Parser    │  → AST
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │  Type Check │  → Annotated tables (4 passes)
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │  C Codegen  │  → C source, compiled by gcc
//! └─────────────┘
//! ```

pub mod ast;
pub mod codegen;
pub mod diag;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod typeck;

// Re-exports for convenience
pub use lexer::Lexer;
pub use token::{Token, TokenKind};

/// Compiler version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// File extension for HolyLua source files
pub const FILE_EXTENSION: &str = "hlua";
