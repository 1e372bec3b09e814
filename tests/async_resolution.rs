use joinery::{BuildErrorKind, Config, Container, Inject, InstantiateErrorKind, Lifetime, PlanErrorKind, Registry, ResolveErrorKind};
use std::{
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
    time::Duration,
};

struct Pool(u32);
struct Repository {
    pool: Arc<Pool>,
}
struct Handler {
    repository: Arc<Repository>,
}

fn registry() -> Registry {
    Registry::new()
        .instance(4u32)
        .provide_async(
            |Inject(size): Inject<u32>| async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok::<_, InstantiateErrorKind>(Pool(*size))
            },
            Lifetime::Singleton,
        )
        .provide(|Inject(pool): Inject<Pool>| Ok::<_, InstantiateErrorKind>(Repository { pool }), Lifetime::Scoped)
        .provide(
            |Inject(repository): Inject<Repository>| Ok::<_, InstantiateErrorKind>(Handler { repository }),
            Lifetime::Transient,
        )
}

#[tokio::test]
async fn test_async_chain() {
    let container = Container::new(registry()).unwrap();
    let scope = container.create_scope();

    let handler = scope.get_async::<Handler>().await.unwrap();
    assert_eq!(handler.repository.pool.0, 4);

    let again = scope.get_async::<Handler>().await.unwrap();
    assert!(Arc::ptr_eq(&handler.repository, &again.repository));
}

#[tokio::test]
async fn test_sync_resolution_of_async_plan_fails() {
    let container = Container::new(registry()).unwrap();

    assert!(matches!(container.get::<Pool>(), Err(ResolveErrorKind::AsyncRequired { .. })));
    assert!(matches!(
        container.create_scope().get::<Handler>(),
        Err(ResolveErrorKind::AsyncRequired { .. })
    ));

    // sync plans resolve asynchronously too
    assert_eq!(*container.get_async::<u32>().await.unwrap(), 4);
}

#[tokio::test]
async fn test_async_matches_quick_build() {
    let compiled = Container::new(registry()).unwrap();
    let quick = Container::with_config(registry(), Config::default().without_compilation()).unwrap();

    let left = compiled.create_scope().get_async::<Handler>().await.unwrap();
    let right = quick.create_scope().get_async::<Handler>().await.unwrap();
    assert_eq!(left.repository.pool.0, right.repository.pool.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_async_singleton_built_once() {
    static BUILDS: AtomicU8 = AtomicU8::new(0);

    struct Client;

    let registry = Registry::new().provide_async(
        || async {
            BUILDS.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, InstantiateErrorKind>(Client)
        },
        Lifetime::Singleton,
    );
    let container = Container::new(registry).unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let container = container.clone();
            tokio::spawn(async move { container.get_async::<Client>().await.unwrap() })
        })
        .collect();

    let mut clients = Vec::new();
    for task in tasks {
        clients.push(task.await.unwrap());
    }

    assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
    assert!(clients.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[tokio::test]
async fn test_cyclic_registration_fails_async_resolution() {
    struct Ping(#[allow(dead_code)] Arc<Pong>);
    struct Pong(#[allow(dead_code)] Arc<Ping>);

    let registry = Registry::new()
        .provide_async(
            |Inject(pong): Inject<Pong>| async move { Ok::<_, InstantiateErrorKind>(Ping(pong)) },
            Lifetime::Scoped,
        )
        .provide(|Inject(ping): Inject<Ping>| Ok::<_, InstantiateErrorKind>(Pong(ping)), Lifetime::Transient);
    let container = Container::new(registry).unwrap();
    let scope = container.create_scope();

    let result = tokio::time::timeout(Duration::from_secs(10), scope.get_async::<Ping>()).await.unwrap();
    assert!(matches!(
        result,
        Err(ResolveErrorKind::Build(BuildErrorKind::Plan(PlanErrorKind::CyclicDependency { .. })))
    ));
    assert!(matches!(
        scope.get::<Pong>(),
        Err(ResolveErrorKind::Build(BuildErrorKind::Plan(PlanErrorKind::CyclicDependency { .. })))
    ));
}
