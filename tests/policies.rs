use joinery::{
    Config, Container, Decorated, Decorator, GraphErrorKind, Inject, InstantiateErrorKind, Lazy, Lifetime, LoadMode, Many, Provider,
    Registration, Registry, ResolveErrorKind, TypeInfo, WhatDoIHaveOptions, GENERATED_FILE_NAME,
};
use std::{
    fs,
    marker::PhantomData,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
};

trait Engine: Send + Sync {
    fn power(&self) -> u32;
}

struct V6;
struct V8;
struct Turbo(Arc<DynEngine>);

impl Engine for V6 {
    fn power(&self) -> u32 {
        6
    }
}

impl Engine for V8 {
    fn power(&self) -> u32 {
        8
    }
}

impl Engine for Turbo {
    fn power(&self) -> u32 {
        self.0.power() * 2
    }
}

type DynEngine = Box<dyn Engine>;

fn engines() -> Registry {
    Registry::new()
        .register(Registration::factory(|| Ok::<_, InstantiateErrorKind>(Box::new(V6) as DynEngine)).implemented_by::<V6>())
        .register(
            Registration::factory(|| Ok::<_, InstantiateErrorKind>(Box::new(V8) as DynEngine))
                .implemented_by::<V8>()
                .singleton(),
        )
}

struct Repository<T>(PhantomData<T>);
struct User;
struct Order;

#[test]
fn test_open_generic_closes_on_demand() {
    let registry = Registry::new().provide_open(TypeInfo::of::<Repository<()>>(), Lifetime::Scoped, |args| {
        (args[0] == TypeInfo::of::<User>())
            .then(|| Registration::factory(|| Ok::<_, InstantiateErrorKind>(Repository::<User>(PhantomData))))
    });
    let container = Container::new(registry).unwrap();
    let scope = container.create_scope();

    let users = scope.get::<Repository<User>>().unwrap();
    assert!(Arc::ptr_eq(&users, &scope.get::<Repository<User>>().unwrap()));
    assert!(matches!(scope.get::<Repository<Order>>(), Err(ResolveErrorKind::NoInstance { .. })));
}

#[test]
fn test_decorator_wraps_every_instance() {
    let registry = engines().decorate(
        Decorator::new(|Decorated(inner): Decorated<DynEngine>| Ok::<_, InstantiateErrorKind>(Box::new(Turbo(inner)) as DynEngine))
            .implemented_by::<Turbo>(),
    );
    let container = Container::new(registry).unwrap();

    assert_eq!(container.get::<DynEngine>().unwrap().power(), 16);
    assert_eq!(container.get_named::<DynEngine>("v6").unwrap().power(), 12);
    // the wrapper keeps the singleton lifetime
    assert!(Arc::ptr_eq(
        &container.get::<DynEngine>().unwrap(),
        &container.get::<DynEngine>().unwrap()
    ));
}

#[test]
fn test_decorator_filter() {
    let registry = engines().decorate(
        Decorator::new(|Decorated(inner): Decorated<DynEngine>| Ok::<_, InstantiateErrorKind>(Box::new(Turbo(inner)) as DynEngine))
            .with_filter(|instance| instance.name() == "v6"),
    );
    let container = Container::new(registry).unwrap();

    assert_eq!(container.get_named::<DynEngine>("v6").unwrap().power(), 12);
    assert_eq!(container.get_named::<DynEngine>("v8").unwrap().power(), 8);
}

struct Garage(Vec<u32>);

#[test]
fn test_many_collects_in_registration_order() {
    let registry = engines().provide(
        |Many(engines): Many<DynEngine>| Ok::<_, InstantiateErrorKind>(Garage(engines.iter().map(|engine| engine.power()).collect())),
        Lifetime::Transient,
    );
    let container = Container::new(registry).unwrap();
    assert_eq!(container.get::<Garage>().unwrap().0, vec![6, 8]);

    let registry = Registry::new().provide(
        |Many(engines): Many<DynEngine>| Ok::<_, InstantiateErrorKind>(Garage(engines.iter().map(|engine| engine.power()).collect())),
        Lifetime::Transient,
    );
    let container = Container::new(registry).unwrap();
    assert!(container.get::<Garage>().unwrap().0.is_empty());
}

#[test]
fn test_lazy_resolves_once_on_demand() {
    static BUILDS: AtomicU8 = AtomicU8::new(0);

    struct Expensive(u32);
    struct Holder(Lazy<Expensive>);

    let registry = Registry::new()
        .provide(
            || {
                BUILDS.fetch_add(1, Ordering::SeqCst);
                Ok::<_, InstantiateErrorKind>(Expensive(42))
            },
            Lifetime::Transient,
        )
        .provide(|lazy: Lazy<Expensive>| Ok::<_, InstantiateErrorKind>(Holder(lazy)), Lifetime::Transient);
    let container = Container::new(registry).unwrap();

    let holder = container.get::<Holder>().unwrap();
    assert_eq!(BUILDS.load(Ordering::SeqCst), 0);

    let first = holder.0.get().unwrap();
    let second = holder.0.get().unwrap();
    assert_eq!(first.0, 42);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
}

#[test]
fn test_lazy_of_unresolvable_is_unbuildable() {
    struct Missing;
    struct Holder(#[allow(dead_code)] Lazy<Missing>);

    let registry = Registry::new().provide(|lazy: Lazy<Missing>| Ok::<_, InstantiateErrorKind>(Holder(lazy)), Lifetime::Transient);
    let container = Container::new(registry).unwrap();

    assert!(matches!(container.get::<Holder>(), Err(ResolveErrorKind::Build(_))));
}

#[test]
fn test_lazy_outliving_scope() {
    struct Session;
    struct Holder(Lazy<Session>);

    let registry = Registry::new()
        .provide(|| Ok::<_, InstantiateErrorKind>(Session), Lifetime::Scoped)
        .provide(|lazy: Lazy<Session>| Ok::<_, InstantiateErrorKind>(Holder(lazy)), Lifetime::Transient);
    let container = Container::new(registry).unwrap();

    let holder = container.create_scope().get::<Holder>().unwrap();
    assert!(matches!(holder.0.get(), Err(ResolveErrorKind::ScopeDisposed)));
}

#[test]
fn test_provider_resolves_every_call() {
    struct Dealer(Provider<DynEngine>);

    let registry = engines().provide(|provider: Provider<DynEngine>| Ok::<_, InstantiateErrorKind>(Dealer(provider)), Lifetime::Singleton);
    let container = Container::new(registry).unwrap();
    let dealer = container.get::<Dealer>().unwrap();

    let first = dealer.0.create_named("v6").unwrap();
    let second = dealer.0.create_named("v6").unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(dealer.0.create().unwrap().power(), 8);
    assert!(matches!(dealer.0.create_named("v10"), Err(ResolveErrorKind::NoInstance { .. })));
}

#[test]
fn test_configuration_validation() {
    struct Missing;
    struct Needy(#[allow(dead_code)] Arc<Missing>);

    let container = Container::new(engines()).unwrap();
    assert!(container.assert_configuration_is_valid().is_ok());

    let registry = engines().provide(|Inject(missing): Inject<Missing>| Ok::<_, InstantiateErrorKind>(Needy(missing)), Lifetime::Transient);
    let container = Container::new(registry).unwrap();

    match container.assert_configuration_is_valid() {
        Err(GraphErrorKind::InvalidConfiguration { errors }) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].service, TypeInfo::of::<Needy>());
            assert!(errors[0].message.contains("Missing"));
        }
        other => panic!("expected invalid configuration, got {other:?}"),
    }
}

#[test]
fn test_what_do_i_have() {
    let container = Container::new(engines()).unwrap();

    let report = container.what_do_i_have(&WhatDoIHaveOptions::default());
    assert!(report.contains("1 service families"));
    assert!(report.contains("'v8' [default] Singleton"));
    assert!(report.contains("'v6' [alternate] Transient"));

    let report = container.what_do_i_have(&WhatDoIHaveOptions::for_service::<DynEngine>().with_build_plans());
    assert!(report.contains("// joinery:type=Resolver"));

    let report = container.what_do_i_have(&WhatDoIHaveOptions::for_service::<User>());
    assert!(report.contains("0 service families"));
}

#[test]
fn test_generated_source() {
    struct Car(u32);

    let registry = engines().provide(|Inject(engine): Inject<DynEngine>| Ok::<_, InstantiateErrorKind>(Car(engine.power())), Lifetime::Transient);
    let container = Container::new(registry).unwrap();

    let source = container.generated_source::<Car>().unwrap();
    assert!(source.contains("pub fn build_car(&self, scope: &Scope)"));
    assert!(source.contains("Car::factory(engine)"));
    assert!(matches!(container.generated_source::<User>(), Err(ResolveErrorKind::NoInstance { .. })));
}

#[test]
fn test_precompile_persists_source() {
    let output = std::env::temp_dir().join(format!("joinery-precompile-{}", std::process::id()));
    let config = Config::default().with_load_mode(LoadMode::Static, &output);
    let container = Container::with_config(engines(), config).unwrap();

    assert_eq!(container.precompile().unwrap(), 2);
    let instance = container.graph().find_default(&TypeInfo::of::<DynEngine>()).unwrap();
    assert!(instance.is_compiled());
    assert_eq!(container.get::<DynEngine>().unwrap().power(), 8);

    let code = fs::read_to_string(output.join(GENERATED_FILE_NAME)).unwrap();
    assert!(code.contains(&format!("// joinery:type={}", format_args!("Resolver{:016x}", instance.hash()))));

    // nothing left to compile
    assert_eq!(container.precompile().unwrap(), 0);
    let _ = fs::remove_dir_all(&output);
}

#[test]
fn test_auto_mode_reuses_current_source() {
    struct Ticket;

    let registry = || Registry::new().provide(|| Ok::<_, InstantiateErrorKind>(Ticket), Lifetime::Transient);
    let output = std::env::temp_dir().join(format!("joinery-auto-{}", std::process::id()));
    let path = output.join(GENERATED_FILE_NAME);
    let config = || Config::default().with_load_mode(LoadMode::Auto, &output);

    // written for other registrations
    fs::create_dir_all(&output).unwrap();
    fs::write(&path, "// Generated build plans. Do not edit.\n").unwrap();
    let container = Container::with_config(registry(), config()).unwrap();
    assert_eq!(container.precompile().unwrap(), 1);
    let fresh = fs::read_to_string(&path).unwrap();
    assert_eq!(fresh, container.generated_source::<Ticket>().unwrap());

    // a current file is compiled as is and left alone
    let annotated = format!("{fresh}// reviewed\n");
    fs::write(&path, &annotated).unwrap();
    let container = Container::with_config(registry(), config()).unwrap();
    assert_eq!(container.precompile().unwrap(), 1);
    assert_eq!(fs::read_to_string(&path).unwrap(), annotated);
    assert!(container.get::<Ticket>().is_ok());

    // a section for a type that is no longer generated makes it stale
    fs::write(&path, fresh.replace("// joinery:type=", "// joinery:type=old_")).unwrap();
    let container = Container::with_config(registry(), config()).unwrap();
    assert_eq!(container.precompile().unwrap(), 1);
    assert_eq!(fs::read_to_string(&path).unwrap(), fresh);

    let _ = fs::remove_dir_all(&output);
}
