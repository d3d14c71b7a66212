//! Shared builders for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use stackemit::config::EmitOptions;
use stackemit::diagnostics::DiagnosticSink;
use stackemit::emit::CodeGenerator;
use stackemit::metadata::{InMemorySymbolTable, ModuleBuilder, SymbolTable};
use stackemit::model::{
    Expr, FieldData, FieldRef, LocalId, LocalRef, MethodContext, MethodData, MethodKind,
    MethodRef, Parameter, RefKind, TypeRef,
};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Everything one method-body worker needs, plus the shared module state.
pub struct Harness {
    pub symbols: Arc<dyn SymbolTable>,
    pub module: Arc<ModuleBuilder>,
    pub diagnostics: Arc<DiagnosticSink>,
    pub options: EmitOptions,
}

impl Harness {
    pub fn new(symbols: InMemorySymbolTable) -> Self {
        init_tracing();
        Self {
            symbols: Arc::new(symbols),
            module: Arc::new(ModuleBuilder::new()),
            diagnostics: Arc::new(DiagnosticSink::new()),
            options: EmitOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EmitOptions) -> Self {
        self.options = options;
        self
    }

    pub fn generator(&self, method: MethodContext) -> CodeGenerator {
        CodeGenerator::new(
            method,
            self.options,
            Arc::clone(&self.symbols),
            Arc::clone(&self.module),
            Arc::clone(&self.diagnostics),
        )
    }
}

// ============================================================================
// Model builders
// ============================================================================

pub fn class_method(owner: &str) -> MethodContext {
    MethodContext::ordinary(TypeRef::class(owner))
}

pub fn method_of_kind(owner: TypeRef, kind: MethodKind) -> MethodContext {
    MethodContext { kind, ..MethodContext::ordinary(owner) }
}

pub fn readonly_struct_method(owner: &TypeRef) -> MethodContext {
    MethodContext { effectively_readonly: true, ..MethodContext::ordinary(owner.clone()) }
}

pub fn local(id: u32, ty: TypeRef) -> Expr {
    Expr::local(LocalRef::new(LocalId::new(id), ty))
}

pub fn ref_local(id: u32, ty: TypeRef, ref_kind: RefKind) -> Expr {
    Expr::local(LocalRef::new_ref(LocalId::new(id), ty, ref_kind))
}

pub fn param(ordinal: u16, ty: TypeRef, ref_kind: RefKind) -> Expr {
    Expr::parameter(Parameter::new(format!("p{}", ordinal), ordinal, ty).with_ref_kind(ref_kind))
}

pub fn mutable_field(owner: &TypeRef, name: &str, ty: TypeRef) -> FieldRef {
    FieldRef::new(FieldData::instance(name, owner.clone(), ty))
}

pub fn readonly_field(owner: &TypeRef, name: &str, ty: TypeRef) -> FieldRef {
    FieldRef::new(FieldData { is_readonly: true, ..FieldData::instance(name, owner.clone(), ty) })
}

pub fn static_readonly_field(owner: &TypeRef, name: &str, ty: TypeRef) -> FieldRef {
    FieldRef::new(FieldData {
        is_static: true,
        is_readonly: true,
        ..FieldData::instance(name, owner.clone(), ty)
    })
}

/// A static method on `Program`.
pub fn static_method(name: &str, return_type: TypeRef, parameters: Vec<Parameter>) -> MethodRef {
    let mut data = MethodData::new(name, TypeRef::class("Program"), return_type);
    data.is_static = true;
    data.parameters = parameters;
    MethodRef::new(data)
}

/// A static method returning `return_type` by reference.
pub fn ref_returning(name: &str, return_type: TypeRef, ref_kind: RefKind) -> MethodRef {
    let mut data = MethodData::new(name, TypeRef::class("Program"), return_type);
    data.is_static = true;
    data.return_ref_kind = ref_kind;
    MethodRef::new(data)
}

pub fn span_type() -> TypeRef {
    TypeRef::ref_struct("Span<int>", false)
}

pub fn listing(generator: &CodeGenerator) -> Vec<String> {
    generator
        .builder()
        .instructions()
        .iter()
        .map(|i| i.to_string())
        .collect()
}
