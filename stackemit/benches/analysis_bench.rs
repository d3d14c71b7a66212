//! Analysis and emission benchmarks using criterion.
//!
//! Measures home queries over nested expressions, escape verdicts over
//! wide signatures, and stack-allocation emission for each initializer
//! style.
//!
//! Run with: cargo bench --bench analysis_bench

use std::collections::HashSet;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use stackemit::config::EmitOptions;
use stackemit::diagnostics::DiagnosticSink;
use stackemit::emit::{classify_initializer, might_escape_temporary_refs, CodeGenerator, HomeQuery};
use stackemit::metadata::{InMemorySymbolTable, ModuleBuilder};
use stackemit::model::{
    AddressKind, ConstantValue, Expr, ExprKind, FieldData, FieldRef, LocalId, LocalRef,
    MethodContext, Parameter, RefKind, ScopeKind, TypeRef,
};

// ============================================================================
// Inputs
// ============================================================================

/// `a.f.f.f...` through `depth` value-typed fields, rooted at a local.
fn field_chain(depth: usize) -> Expr {
    let point = TypeRef::structure("Point");
    let field = FieldRef::new(FieldData::instance("inner", point.clone(), point.clone()));
    let mut expr = Expr::local(LocalRef::new(LocalId::new(0), point));
    for _ in 0..depth {
        expr = Expr::field(Some(expr), field.clone());
    }
    expr
}

/// A right-leaning chain of by-ref conditionals over ref locals.
fn conditional_chain(depth: usize) -> Expr {
    let ty = TypeRef::int32();
    let leaf = |id: u32| Expr::local(LocalRef::new_ref(LocalId::new(id), ty.clone(), RefKind::Ref));
    let mut expr = leaf(0);
    for i in 0..depth {
        let condition = Expr::literal(TypeRef::boolean(), ConstantValue::Boolean(i % 2 == 0));
        expr = Expr::conditional(condition, leaf(i as u32 + 1), expr, true);
    }
    expr
}

fn span_parameters(count: usize) -> Vec<Parameter> {
    let span = TypeRef::ref_struct("Span<int>", false);
    (0..count)
        .map(|i| {
            let param = Parameter::new(format!("s{}", i), i as u16, span.clone());
            // Only the last one can be written through.
            if i + 1 == count {
                param.with_ref_kind(RefKind::Ref)
            } else {
                param.with_scope(ScopeKind::Scoped)
            }
        })
        .collect()
}

fn stackalloc(count: usize, constant: bool) -> Expr {
    let element = TypeRef::int32();
    let initializers = (0..count)
        .map(|i| {
            if constant || i % 2 == 0 {
                Expr::int32(i as i32)
            } else {
                Expr::local(LocalRef::new(LocalId::new(i as u32), element.clone()))
            }
        })
        .collect();
    Expr::new(
        ExprKind::StackAllocArray {
            element_type: element.clone(),
            count: Box::new(Expr::int32(count as i32)),
            initializers: Some(initializers),
        },
        TypeRef::pointer(element),
    )
}

fn generator(module: &Arc<ModuleBuilder>) -> CodeGenerator {
    CodeGenerator::new(
        MethodContext::ordinary(TypeRef::class("Program")),
        EmitOptions::default(),
        Arc::new(InMemorySymbolTable::new()),
        Arc::clone(module),
        Arc::new(DiagnosticSink::new()),
    )
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_home_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("home_queries");
    let method = MethodContext::ordinary(TypeRef::class("Program"));
    let stack = HashSet::new();
    let query = HomeQuery::new(&method, false, &stack);

    for depth in [4, 16, 64].iter() {
        let fields = field_chain(*depth);
        group.bench_with_input(BenchmarkId::new("field_chain", depth), &fields, |b, expr| {
            b.iter(|| query.has_home(black_box(expr), AddressKind::Writable))
        });

        let conditionals = conditional_chain(*depth);
        group.bench_with_input(BenchmarkId::new("ref_conditional", depth), &conditionals, |b, expr| {
            b.iter(|| query.has_home(black_box(expr), AddressKind::ReadOnly))
        });
    }
    group.finish();
}

fn bench_escape_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("escape_queries");
    let void = TypeRef::void();

    for count in [1, 8, 32].iter() {
        let params = span_parameters(*count);
        group.bench_with_input(BenchmarkId::new("span_parameters", count), &params, |b, params| {
            b.iter(|| {
                might_escape_temporary_refs(
                    black_box(true),
                    &void,
                    RefKind::None,
                    None,
                    None,
                    black_box(params),
                )
            })
        });
    }
    group.finish();
}

fn bench_stackalloc_emission(c: &mut Criterion) {
    let mut group = c.benchmark_group("stackalloc_emission");
    let module = Arc::new(ModuleBuilder::new());

    for count in [8, 64, 512].iter() {
        let block = stackalloc(*count, true);
        group.bench_with_input(BenchmarkId::new("block", count), &block, |b, expr| {
            b.iter(|| {
                let mut generator = generator(&module);
                generator.emit_expression(black_box(expr), true).ok();
                generator.finish()
            })
        });

        let mixed = stackalloc(*count, false);
        group.bench_with_input(BenchmarkId::new("mixed", count), &mixed, |b, expr| {
            b.iter(|| {
                let mut generator = generator(&module);
                generator.emit_expression(black_box(expr), true).ok();
                generator.finish()
            })
        });
    }
    group.finish();
}

fn bench_classification(c: &mut Criterion) {
    c.bench_function("classify_initializer", |b| {
        b.iter(|| {
            (0..256usize)
                .map(|n| classify_initializer(black_box(n), black_box(n / 2)))
                .count()
        })
    });
}

criterion_group!(
    benches,
    bench_home_queries,
    bench_escape_queries,
    bench_stackalloc_emission,
    bench_classification,
);
criterion_main!(benches);
