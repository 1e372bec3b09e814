use core::ops::Deref;
use std::{fs, path::Path, sync::Arc};
use tracing::{debug, error, info, info_span, warn};

use crate::{
    any::TypeInfo,
    codegen::{CompiledAssembly, Compiler, GeneratedAssembly},
    config::{Config, LoadMode},
    diagnostics::{self, WhatDoIHaveOptions},
    errors::{BuildErrorKind, CompileErrorKind, ConfigurationError, GraphErrorKind, ResolveErrorKind},
    graph::ServiceGraph,
    instance::Instance,
    registry::Registry,
    resolver::Resolver,
    scope::Scope,
};

/// File the precompiled assembly is persisted to, inside [`Config::output_path`].
pub const GENERATED_FILE_NAME: &str = "joinery_generated.rs";

/// Entry point: the service graph plus the root scope resolving from it.
///
/// Dereferences to the root [`Scope`], so everything a scope resolves is available on the container.
#[derive(Clone)]
pub struct Container {
    graph: Arc<ServiceGraph>,
    root: Scope,
}

impl Container {
    /// Creates a container with the default [`Config`].
    ///
    /// # Errors
    /// - Returns [`GraphErrorKind::HashCollision`] if two registrations share an identity hash
    #[inline]
    pub fn new(registry: Registry) -> Result<Self, GraphErrorKind> {
        Self::with_config(registry, Config::default())
    }

    /// Creates a container from registrations and a config.
    ///
    /// Plans aren't created here. Broken registrations surface on first resolution
    /// or from [`Self::assert_configuration_is_valid`].
    ///
    /// # Errors
    /// - Returns [`GraphErrorKind::HashCollision`] if two registrations share an identity hash
    pub fn with_config(registry: Registry, config: Config) -> Result<Self, GraphErrorKind> {
        let graph = Arc::new(ServiceGraph::new(registry, config)?);
        let root = Scope::new_root(graph.clone());
        Ok(Self { graph, root })
    }

    #[inline]
    #[must_use]
    pub fn graph(&self) -> &Arc<ServiceGraph> {
        &self.graph
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Scope {
        &self.root
    }

    fn registered(&self, with_inline: bool) -> Vec<Arc<Instance>> {
        let mut instances = Vec::new();
        for family in self.graph.families() {
            for instance in family.instances() {
                instances.push(instance.clone());
                if with_inline {
                    instances.extend(instance.inline_dependencies.iter().cloned());
                }
            }
        }
        instances
    }

    /// Plans every registered instance and reports all problems at once.
    ///
    /// # Errors
    /// - Returns [`GraphErrorKind::InvalidConfiguration`] listing every instance that can't be built
    pub fn assert_configuration_is_valid(&self) -> Result<(), GraphErrorKind> {
        let span = info_span!("assert_configuration_is_valid");
        let _guard = span.enter();

        let mut errors = Vec::new();
        for instance in self.registered(true) {
            let plan = instance.create_plan(&self.graph);
            let messages = if plan.is_valid() {
                match self.graph.ensure_acyclic(&instance) {
                    Ok(()) => continue,
                    Err(err) => vec![err.to_string()],
                }
            } else {
                plan.errors.clone()
            };
            errors.extend(messages.into_iter().map(|message| ConfigurationError {
                service: instance.service_type.clone(),
                name: instance.name.to_string(),
                message,
            }));
        }

        if errors.is_empty() {
            debug!("Configuration is valid");
            return Ok(());
        }
        let err = GraphErrorKind::InvalidConfiguration { errors };
        error!("{}", err);
        Err(err)
    }

    /// Text report of the registered families, their instances and optionally their build plans.
    #[must_use]
    pub fn what_do_i_have(&self, options: &WhatDoIHaveOptions) -> String {
        diagnostics::report(&self.graph, options)
    }

    /// Generated source of the default instance of `T`.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::NoInstance`] if `T` isn't registered
    /// - Returns [`ResolveErrorKind::Build`] if the plan of `T` can't be created
    pub fn generated_source<T: ?Sized + 'static>(&self) -> Result<String, ResolveErrorKind> {
        let service_type = TypeInfo::of::<T>();
        let Some(instance) = self.graph.find_default(&service_type) else {
            let err = ResolveErrorKind::NoInstance {
                service: service_type,
                name: None,
            };
            error!("{}", err);
            return Err(err);
        };
        let generated = instance.generated_type(&self.graph)?;

        let mut assembly = GeneratedAssembly::new();
        assembly.add_type(generated);
        Ok(assembly.source())
    }

    /// Compiles every compilable instance in one pass and installs the resulting resolvers.
    ///
    /// Instances already holding a resolver, quick-build instances and instances with broken plans are skipped.
    /// Returns the number of resolvers installed.
    ///
    /// # Errors
    /// - Returns [`BuildErrorKind::Compile`] if the generated assembly doesn't compile or can't be persisted
    pub fn precompile(&self) -> Result<usize, BuildErrorKind> {
        let span = info_span!("precompile");
        let _guard = span.enter();

        let config = self.graph.config();
        if !config.compile {
            debug!("Compilation is disabled");
            return Ok(0);
        }

        let mut assembly = GeneratedAssembly::new();
        for instance in self.registered(false) {
            if instance.has_resolver() || instance.requires_quick_build(&self.graph) {
                continue;
            }
            if assembly.has_type(&instance.resolver_type_name()) {
                continue;
            }
            match instance.generated_type(&self.graph) {
                Ok(generated) => assembly.add_type(generated),
                Err(err) => debug!(%err, instance = %instance.describe(), "Skipped"),
            }
        }

        let compiled = match config.load_mode {
            LoadMode::Dynamic => Compiler::compile(&assembly)?,
            LoadMode::Static => {
                let compiled = Compiler::compile(&assembly)?;
                persist(&config.output_path, &compiled.code)?;
                compiled
            }
            LoadMode::Auto => match load_current(&config.output_path, &assembly) {
                Some(compiled) => compiled,
                None => {
                    let compiled = Compiler::compile(&assembly)?;
                    persist(&config.output_path, &compiled.code)?;
                    compiled
                }
            },
        };

        let mut installed = 0;
        for program in compiled.programs() {
            if program.instance.attach_resolver(Resolver::Compiled(program.clone())) {
                installed += 1;
            }
        }
        info!(installed, "Precompiled");
        Ok(installed)
    }
}

/// Compiles the persisted source when it still matches every type of `assembly`.
fn load_current(output_path: &Path, assembly: &GeneratedAssembly) -> Option<CompiledAssembly> {
    let path = output_path.join(GENERATED_FILE_NAME);
    let Ok(existing) = fs::read_to_string(&path) else {
        debug!(path = %path.display(), "Generated source is missing");
        return None;
    };

    match Compiler::compile_source(existing, assembly) {
        Ok(compiled) => {
            debug!(path = %path.display(), "Generated source is up to date");
            Some(compiled)
        }
        Err(_) => {
            warn!(path = %path.display(), "Generated source is stale");
            None
        }
    }
}

fn persist(output_path: &Path, code: &str) -> Result<(), CompileErrorKind> {
    let path = output_path.join(GENERATED_FILE_NAME);
    let to_err = |err: std::io::Error| {
        let err = CompileErrorKind::Persist {
            path: path.display().to_string(),
            message: err.to_string(),
        };
        error!("{}", err);
        err
    };

    fs::create_dir_all(output_path).map_err(to_err)?;
    fs::write(&path, code).map_err(to_err)?;
    debug!(path = %path.display(), "Generated source written");
    Ok(())
}

impl Deref for Container {
    type Target = Scope;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.root
    }
}
