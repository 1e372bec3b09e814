use joinery::{Config, Container, DisposalLock, InstantiateErrorKind, Lifetime, Registration, Registry, ResolveErrorKind, ScopeErrorKind};
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
};

struct Connection;
struct Cache;
struct Request;

fn tracked(log: Arc<Mutex<Vec<&'static str>>>) -> Registry {
    let connection_log = log.clone();
    let cache_log = log.clone();
    let request_log = log;
    Registry::new()
        .register(
            Registration::factory(|| Ok::<_, InstantiateErrorKind>(Connection))
                .scoped()
                .with_finalizer(move |_: Arc<Connection>| connection_log.lock().push("connection")),
        )
        .register(
            Registration::factory(|| Ok::<_, InstantiateErrorKind>(Cache))
                .singleton()
                .with_finalizer(move |_: Arc<Cache>| cache_log.lock().push("cache")),
        )
        .register(
            Registration::factory(|| Ok::<_, InstantiateErrorKind>(Request))
                .transient()
                .with_finalizer(move |_: Arc<Request>| request_log.lock().push("request")),
        )
}

#[test]
fn test_dispose_is_idempotent() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let container = Container::new(tracked(log.clone())).unwrap();
    let scope = container.create_scope();

    scope.get::<Connection>().unwrap();
    scope.get::<Connection>().unwrap();
    assert_eq!(scope.tracked(), 1);

    scope.dispose().unwrap();
    scope.dispose().unwrap();
    assert_eq!(*log.lock(), vec!["connection"]);
    assert!(scope.is_disposed());
}

#[test]
fn test_disposal_in_first_resolved_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let container = Container::new(tracked(log.clone())).unwrap();
    let scope = container.create_scope();

    scope.get::<Request>().unwrap();
    scope.get::<Connection>().unwrap();
    scope.get::<Request>().unwrap();
    // singletons are tracked by the root
    scope.get::<Cache>().unwrap();
    assert_eq!(scope.tracked(), 3);
    assert_eq!(container.tracked(), 1);

    scope.dispose().unwrap();
    assert_eq!(*log.lock(), vec!["request", "connection", "request"]);

    container.dispose().unwrap();
    assert_eq!(log.lock().last(), Some(&"cache"));
}

#[test]
fn test_disposed_scope_refuses_resolution() {
    let container = Container::new(tracked(Arc::default())).unwrap();
    let scope = container.create_scope();
    scope.dispose().unwrap();

    assert!(matches!(scope.get::<Connection>(), Err(ResolveErrorKind::ScopeDisposed)));
    assert!(scope.try_get::<Connection>().unwrap().is_none());
    // the root is still alive
    assert!(container.get::<Cache>().is_ok());
}

#[test]
fn test_disposal_locks() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let container = Container::new(tracked(log.clone())).unwrap();

    let ignoring = container.create_scope();
    ignoring.get::<Connection>().unwrap();
    ignoring.set_disposal_lock(DisposalLock::Ignore);
    assert!(ignoring.dispose().is_ok());
    assert!(!ignoring.is_disposed());

    let throwing = container.create_scope();
    throwing.get::<Connection>().unwrap();
    throwing.set_disposal_lock(DisposalLock::ThrowOnDispose);
    assert_eq!(throwing.dispose(), Err(ScopeErrorKind::DisposalLocked));
    assert!(log.lock().is_empty());

    throwing.set_disposal_lock(DisposalLock::Unlocked);
    throwing.dispose().unwrap();
    assert_eq!(*log.lock(), vec!["connection"]);
}

#[test]
fn test_root_lock_from_config() {
    let config = Config {
        disposal_lock: DisposalLock::ThrowOnDispose,
        ..Config::default()
    };
    let container = Container::with_config(tracked(Arc::default()), config).unwrap();

    assert_eq!(container.dispose(), Err(ScopeErrorKind::DisposalLocked));
    // children start unlocked
    assert!(container.create_scope().dispose().is_ok());
}

#[test]
fn test_drop_disposes_scope() {
    static FINALIZED: AtomicU8 = AtomicU8::new(0);

    let registry = Registry::new().register(
        Registration::factory(|| Ok::<_, InstantiateErrorKind>(Connection))
            .scoped()
            .with_finalizer(|_: Arc<Connection>| {
                FINALIZED.fetch_add(1, Ordering::SeqCst);
            }),
    );
    let container = Container::new(registry).unwrap();

    {
        let scope = container.create_scope();
        scope.get::<Connection>().unwrap();
    }
    assert_eq!(FINALIZED.load(Ordering::SeqCst), 1);

    {
        let scope = container.create_scope();
        scope.get::<Connection>().unwrap();
        scope.set_disposal_lock(DisposalLock::Ignore);
    }
    assert_eq!(FINALIZED.load(Ordering::SeqCst), 1);
}

#[test]
fn test_registry_finalizer_applies_to_every_registration() {
    static FINALIZED: AtomicU8 = AtomicU8::new(0);

    let registry = Registry::new()
        .register(Registration::factory(|| Ok::<_, InstantiateErrorKind>(Connection)).named("primary"))
        .register(Registration::factory(|| Ok::<_, InstantiateErrorKind>(Connection)).named("replica"))
        .provide(|| Ok::<_, InstantiateErrorKind>(Request), Lifetime::Transient)
        .add_finalizer(|_: Arc<Connection>| {
            FINALIZED.fetch_add(1, Ordering::SeqCst);
        });
    let container = Container::new(registry).unwrap();
    let scope = container.create_scope();

    scope.get_named::<Connection>("primary").unwrap();
    scope.get_named::<Connection>("replica").unwrap();
    scope.get::<Request>().unwrap();
    assert_eq!(scope.tracked(), 2);

    drop(scope);
    assert_eq!(FINALIZED.load(Ordering::SeqCst), 2);
}
