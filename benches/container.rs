#![allow(dead_code)]

use criterion::{criterion_group, criterion_main, Criterion};
use joinery::{Config, Container, Inject, InstantiateErrorKind, Lifetime, Registry};
use std::sync::Arc;

struct A(Arc<B>, Arc<C>);
struct B(i32);
struct C(Arc<CA>);
struct CA(Arc<CAA>);
struct CAA(Arc<CAAA>);
struct CAAA(Arc<CAAAA>);
struct CAAAA(Arc<CAAAAA>);
struct CAAAAA;

fn chain(lifetime: Lifetime) -> Registry {
    Registry::new()
        .provide(|| Ok::<_, InstantiateErrorKind>(CAAAAA), lifetime)
        .provide(|Inject(caaaaa): Inject<CAAAAA>| Ok::<_, InstantiateErrorKind>(CAAAA(caaaaa)), lifetime)
        .provide(|Inject(caaaa): Inject<CAAAA>| Ok::<_, InstantiateErrorKind>(CAAA(caaaa)), lifetime)
        .provide(|Inject(caaa): Inject<CAAA>| Ok::<_, InstantiateErrorKind>(CAA(caaa)), lifetime)
        .provide(|Inject(caa): Inject<CAA>| Ok::<_, InstantiateErrorKind>(CA(caa)), lifetime)
        .provide(|Inject(ca): Inject<CA>| Ok::<_, InstantiateErrorKind>(C(ca)), lifetime)
        .provide(|| Ok::<_, InstantiateErrorKind>(B(2)), lifetime)
        .provide(|Inject(b): Inject<B>, Inject(c): Inject<C>| Ok::<_, InstantiateErrorKind>(A(b, c)), lifetime)
}

fn with_finalizers(registry: Registry) -> Registry {
    registry
        .add_finalizer(|_: Arc<CAAAAA>| {})
        .add_finalizer(|_: Arc<CAAAA>| {})
        .add_finalizer(|_: Arc<CAAA>| {})
        .add_finalizer(|_: Arc<CAA>| {})
        .add_finalizer(|_: Arc<CA>| {})
        .add_finalizer(|_: Arc<C>| {})
        .add_finalizer(|_: Arc<B>| {})
        .add_finalizer(|_: Arc<A>| {})
}

#[inline]
fn container_get(container: &Container) {
    let _ = container.create_scope().get::<A>().unwrap();
}

#[inline]
fn scope_dispose(container: &Container) {
    let scope = container.create_scope();
    let _ = scope.get::<A>().unwrap();

    scope.dispose().unwrap();
}

fn criterion_benchmark(c: &mut Criterion) {
    let compiled = Container::new(chain(Lifetime::Transient)).unwrap();
    let quick = Container::with_config(chain(Lifetime::Transient), Config::default().without_compilation()).unwrap();
    let scoped = Container::new(with_finalizers(chain(Lifetime::Scoped))).unwrap();

    c.bench_function("container_new", |b| b.iter(|| Container::new(chain(Lifetime::Transient)).unwrap()))
        .bench_function("container_get_compiled", |b| b.iter(|| container_get(&compiled)))
        .bench_function("container_get_quick_build", |b| b.iter(|| container_get(&quick)))
        .bench_function("container_get_scoped", |b| b.iter(|| container_get(&scoped)))
        .bench_function("scope_dispose", |b| b.iter(|| scope_dispose(&scoped)))
        .bench_function("generated_source", |b| b.iter(|| compiled.generated_source::<A>().unwrap()));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
