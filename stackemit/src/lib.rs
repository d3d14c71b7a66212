//! # stackemit
//!
//! Instruction emission core for a verified, typed stack machine.
//!
//! Given lowered, type-checked expression trees, this crate decides where
//! values live and produces the instruction stream for each method body:
//!
//! 1. **Addressability** - whether an expression has a storage location
//!    ("home") whose reference may be handed out for a given use
//! 2. **Reference escape** - whether a callee could capture a reference to a
//!    temporary passed by reference, which decides if the temporary may be
//!    reused after the call
//! 3. **Conversions** - numeric, reference, boxing, pointer and delegate
//!    creation sequences
//! 4. **Stack allocation** - sizing and bulk population of `stackalloc`
//!    blocks from constant data blobs
//!
//! ## Pipeline position
//!
//! ```text
//! Binder -> Lowering -> [ stackemit ] -> Metadata writer
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use stackemit::config::EmitOptions;
//! use stackemit::diagnostics::DiagnosticSink;
//! use stackemit::emit::CodeGenerator;
//! use stackemit::metadata::{InMemorySymbolTable, ModuleBuilder};
//! use stackemit::model::{Expr, LocalId, LocalRef, MethodContext, TypeRef};
//!
//! let mut generator = CodeGenerator::new(
//!     MethodContext::ordinary(TypeRef::class("Program")),
//!     EmitOptions::default(),
//!     Arc::new(InMemorySymbolTable::new()),
//!     Arc::new(ModuleBuilder::new()),
//!     Arc::new(DiagnosticSink::new()),
//! );
//!
//! let x = LocalRef::new(LocalId::new(0), TypeRef::int32());
//! let assign = Expr::assignment(Expr::local(x), Expr::int32(42), false);
//! generator.emit_expression(&assign, false)?;
//!
//! assert_eq!(generator.builder().listing(), "ldc.i4 42\nstloc V_0");
//! # Ok::<(), stackemit::ice::InternalError>(())
//! ```
//!
//! ## Error Handling
//!
//! Recoverable problems (a delegate type without a usable constructor, a
//! missing runtime helper) are reported to a shared [`DiagnosticSink`] and
//! emission continues. Trees that lowering should never have produced raise
//! an [`InternalError`] that aborts the current method.
//!
//! ## Module Overview
//!
//! - [`span`] - Source locations
//! - [`diagnostics`] - Error codes and the shared diagnostic sink
//! - [`ice`] - Internal compiler errors and the `ice_err!` macro
//! - [`config`] - Emission options, loadable from TOML
//! - [`model`] - Expression trees, types and symbols
//! - [`metadata`] - Symbol lookups and the module data-blob table
//! - [`emit`] - Analyses and instruction emission
//!
//! [`DiagnosticSink`]: diagnostics::DiagnosticSink
//! [`InternalError`]: ice::InternalError

pub mod config;
pub mod diagnostics;
pub mod emit;
pub mod ice;
pub mod metadata;
pub mod model;
pub mod span;

pub use config::EmitOptions;
pub use diagnostics::{Diagnostic, DiagnosticSink, ErrorCode};
pub use emit::{CodeGenerator, MethodBody, UseKind};
pub use ice::{EmitResult, InternalError};
pub use metadata::{InMemorySymbolTable, ModuleBuilder, SymbolTable};
pub use span::Span;
