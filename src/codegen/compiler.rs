use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};
use tracing::{debug, error, info_span};

use super::{
    program::{FieldSlot, Step, StepOp},
    GeneratedAssembly, GeneratedType, Program, REFERENCE_MARKER, TYPE_MARKER, USES_MARKER,
};
use crate::{
    any::TypeInfo,
    errors::CompileErrorKind,
    plan::{AsyncMode, FrameOp, PlanState},
};

/// One generated type as found in source text, located by its marker.
#[derive(Default)]
struct Section<'a> {
    uses: Vec<&'a str>,
    bindings: Vec<&'a str>,
    returned: Option<&'a str>,
    tail: bool,
}

/// Source text split into the reference header and the marked type sections.
#[derive(Default)]
struct ParsedSource<'a> {
    references: BTreeSet<&'a str>,
    sections: BTreeMap<&'a str, Section<'a>>,
}

impl<'a> ParsedSource<'a> {
    fn parse(code: &'a str) -> Self {
        let mut parsed = Self::default();
        let mut current: Option<(&'a str, Section<'a>)> = None;

        for line in code.lines().map(str::trim) {
            if let Some(name) = line.strip_prefix(TYPE_MARKER) {
                if let Some((name, section)) = current.take() {
                    parsed.sections.insert(name, section);
                }
                current = Some((name.trim(), Section::default()));
                continue;
            }
            let Some((_, section)) = current.as_mut() else {
                if let Some(reference) = line.strip_prefix(REFERENCE_MARKER) {
                    parsed.references.insert(reference.trim());
                }
                continue;
            };

            if let Some(used) = line.strip_prefix(USES_MARKER) {
                section.uses.push(used.trim());
            } else if let Some(statement) = line.strip_prefix("let ") {
                if let Some((binding, _)) = statement.split_once(" =") {
                    section.bindings.push(binding.trim());
                }
            } else if let Some(returned) = line.strip_prefix("Ok(").and_then(|rest| rest.strip_suffix(')')) {
                section.returned = Some(returned.trim());
            } else if line.starts_with("Box::pin(") {
                section.tail = true;
            }
        }
        if let Some((name, section)) = current {
            parsed.sections.insert(name, section);
        }
        parsed
    }
}

/// Turns generated source into executable programs.
///
/// The source is the artifact that gets checked and persisted. It is split into sections by the
/// type markers, every section is checked against the frame chain it was rendered from, and the
/// program lowered from that chain is bound under the name its marker carries.
pub(crate) struct Compiler;

impl Compiler {
    #[inline]
    pub(crate) fn compile(assembly: &GeneratedAssembly) -> Result<CompiledAssembly, CompileErrorKind> {
        Self::compile_source(assembly.source(), assembly)
    }

    /// Compiles the types of `assembly` from `code`, which may be source persisted by an earlier run.
    pub(crate) fn compile_source(code: String, assembly: &GeneratedAssembly) -> Result<CompiledAssembly, CompileErrorKind> {
        let span = info_span!("compile", types = assembly.types.len());
        let _guard = span.enter();

        let parsed = ParsedSource::parse(&code);
        let mut programs = BTreeMap::new();
        for generated in &assembly.types {
            let Some((&name, section)) = parsed.sections.get_key_value(generated.name.as_str()) else {
                let err = CompileErrorKind::MissingType {
                    marker: generated.marker(),
                    code: code.clone(),
                };
                error!("{}", err);
                return Err(err);
            };
            Self::check_references(generated, section, &parsed.references, &code)?;
            Self::check_statements(generated, section, &code)?;

            let program = Self::lower(generated, &code)?;
            programs.insert(name.to_owned(), Arc::new(program));
        }

        debug!(programs = programs.len(), "Assembly compiled");
        Ok(CompiledAssembly { code, programs })
    }

    /// Every crate a section names, generic arguments included, must be in the header's reference set.
    fn check_references(generated: &GeneratedType, section: &Section<'_>, declared: &BTreeSet<&str>, code: &str) -> Result<(), CompileErrorKind> {
        let mut references = BTreeSet::new();
        for used in &section.uses {
            TypeInfo::from_path(used).references(&mut references);
        }

        match references.into_iter().find(|reference| !declared.contains(reference.as_str())) {
            Some(missing) => {
                let err = CompileErrorKind::UnresolvedReference {
                    type_name: generated.name.clone(),
                    assembly: missing,
                    code: code.to_owned(),
                };
                error!("{}", err);
                Err(err)
            }
            None => Ok(()),
        }
    }

    /// Statements of a section must bind what the chain builds, after what each step uses, and return its result.
    fn check_statements(generated: &GeneratedType, section: &Section<'_>, code: &str) -> Result<(), CompileErrorKind> {
        let method = &generated.method;
        let usage = |variable: usize| method.variables[variable].usage.as_str();
        let chain: Vec<_> = method.chain().map(|(_, frame)| frame).collect();
        let tail = method.async_mode == AsyncMode::TailAsync && !chain.is_empty();
        let bound = if tail { chain.len() - 1 } else { chain.len() };

        let mut positions = BTreeMap::new();
        for (index, binding) in section.bindings.iter().enumerate() {
            positions.entry(*binding).or_insert(index);
        }
        let arguments: Vec<&str> = method.arguments.iter().map(|variable| usage(*variable)).collect();

        for (index, frame) in chain.iter().enumerate() {
            let at = if tail && index == bound {
                section.bindings.len()
            } else {
                let created = frame.creates.first().map_or("_", |variable| usage(*variable));
                match positions.get(created) {
                    Some(at) => *at,
                    None => {
                        let err = CompileErrorKind::StatementMismatch {
                            method: method.name.clone(),
                            expected: created.to_owned(),
                            found: section.bindings.get(index).map_or_else(|| "nothing".to_owned(), |found| (*found).to_owned()),
                            code: code.to_owned(),
                        };
                        error!("{}", err);
                        return Err(err);
                    }
                }
            };

            let undefined = frame
                .uses
                .iter()
                .map(|variable| usage(*variable))
                .find(|used| !arguments.contains(used) && positions.get(used).map_or(true, |defined| *defined >= at));
            if let Some(undefined) = undefined {
                let err = CompileErrorKind::UndefinedVariable {
                    variable: undefined.to_owned(),
                    method: method.name.clone(),
                    code: code.to_owned(),
                };
                error!("{}", err);
                return Err(err);
            }
        }

        if section.bindings.len() != bound {
            let err = CompileErrorKind::StatementMismatch {
                method: method.name.clone(),
                expected: format!("{bound} statements"),
                found: format!("{} statements", section.bindings.len()),
                code: code.to_owned(),
            };
            error!("{}", err);
            return Err(err);
        }

        let returns = if tail {
            section.tail
        } else {
            method.return_variable.is_some_and(|variable| section.returned == Some(usage(variable)))
        };
        if !returns {
            let err = CompileErrorKind::MissingReturn {
                method: method.name.clone(),
                code: code.to_owned(),
            };
            error!("{}", err);
            return Err(err);
        }
        Ok(())
    }

    fn lower(generated: &GeneratedType, code: &str) -> Result<Program, CompileErrorKind> {
        let method = &generated.method;
        if method.state != PlanState::Linked {
            return Err(CompileErrorKind::NotArranged {
                method: method.name.clone(),
            });
        }
        let Some(&scope_slot) = method.arguments.first() else {
            return Err(CompileErrorKind::NotArranged {
                method: method.name.clone(),
            });
        };
        let Some(result) = method.return_variable else {
            return Err(CompileErrorKind::MissingReturn {
                method: method.name.clone(),
                code: code.to_owned(),
            });
        };

        let mut steps = Vec::with_capacity(method.frames.len());
        for (_, frame) in method.chain() {
            let Some(&output) = frame.creates.first() else {
                continue;
            };
            let op = match &frame.op {
                FrameOp::Construct { instance, constructor } => StepOp::Construct {
                    instance: instance.clone(),
                    constructor: constructor.clone(),
                },
                FrameOp::Field { instance } => StepOp::Field {
                    index: method.field_index(instance).unwrap_or_default(),
                },
                FrameOp::ScopedLookup { instance } => StepOp::ScopedLookup { instance: instance.clone() },
                FrameOp::QuickBuild { instance } => StepOp::QuickBuild { instance: instance.clone() },
                FrameOp::Collect { .. } => StepOp::Collect,
                FrameOp::Absent => StepOp::Absent {
                    service_type: method.variables[output].ty.clone(),
                },
            };
            steps.push(Step {
                op,
                inputs: frame.uses.clone(),
                output,
                is_async: frame.is_async,
            });
        }

        Ok(Program {
            name: generated.name.clone(),
            instance: generated.instance.clone(),
            steps,
            fields: method.fields.iter().cloned().map(FieldSlot::new).collect(),
            slots: method.variables.len(),
            scope_slot,
            result,
            async_mode: method.async_mode,
        })
    }
}

/// Output of one compile pass.
pub(crate) struct CompiledAssembly {
    pub(crate) code: String,
    programs: BTreeMap<String, Arc<Program>>,
}

impl CompiledAssembly {
    pub(crate) fn program(&self, name: &str) -> Result<Arc<Program>, CompileErrorKind> {
        self.programs.get(name).cloned().ok_or_else(|| CompileErrorKind::MissingType {
            marker: format!("{TYPE_MARKER}{name}"),
            code: self.code.clone(),
        })
    }

    pub(crate) fn programs(&self) -> impl Iterator<Item = &Arc<Program>> {
        self.programs.values()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use tracing_test::traced_test;

    use super::Compiler;
    use crate::{
        any::TypeInfo,
        codegen::{GeneratedAssembly, REFERENCE_MARKER, TYPE_MARKER},
        config::Config,
        errors::{CompileErrorKind, InstantiateErrorKind, ResolveErrorKind},
        graph::ServiceGraph,
        inject::Inject,
        lifetime::Lifetime,
        plan::AsyncMode,
        quick_build::QuickBuilder,
        registry::{Registration, Registry},
        scope::Scope,
    };

    struct A(u32);
    struct B(u32);
    struct C(u32);

    fn registry() -> Registry {
        Registry::new()
            .instance(7u32)
            .provide(|Inject(seed): Inject<u32>| Ok::<_, InstantiateErrorKind>(A(*seed)), Lifetime::Transient)
            .provide(|Inject(a): Inject<A>| Ok::<_, InstantiateErrorKind>(B(a.0 + 1)), Lifetime::Transient)
            .provide(
                |Inject(a): Inject<A>, Inject(b): Inject<B>| Ok::<_, InstantiateErrorKind>(C(a.0 * 10 + b.0)),
                Lifetime::Transient,
            )
    }

    fn graph(registry: Registry) -> Arc<ServiceGraph> {
        Arc::new(ServiceGraph::new(registry, Config::default()).unwrap())
    }

    fn assembly_for<T: 'static>(graph: &ServiceGraph) -> (GeneratedAssembly, String) {
        let instance = graph.find_default(&TypeInfo::of::<T>()).unwrap();
        let mut assembly = GeneratedAssembly::new();
        assembly.add_type(instance.generated_type(graph).unwrap());
        (assembly, instance.resolver_type_name())
    }

    #[test]
    #[traced_test]
    fn test_source_is_marked_and_ordered() {
        let graph = graph(registry());
        let (assembly, name) = assembly_for::<C>(&graph);

        let compiled = Compiler::compile(&assembly).unwrap();
        assert!(compiled.code.contains(&format!("{TYPE_MARKER}{name}")));

        let a = compiled.code.find("A::factory(").unwrap();
        let b = compiled.code.find("B::factory(").unwrap();
        let c = compiled.code.find("C::factory(").unwrap();
        assert!(a < b && b < c);
        assert!(compiled.program(&name).is_ok());
        assert!(matches!(compiled.program("Missing"), Err(CompileErrorKind::MissingType { .. })));
    }

    #[test]
    #[traced_test]
    fn test_unresolved_reference_fails_with_source() {
        let graph = graph(registry());
        let (assembly, _) = assembly_for::<C>(&graph);
        let krate = TypeInfo::of::<C>().assembly().to_owned();
        let code = assembly.source().replace(&format!("{REFERENCE_MARKER}{krate}\n"), "");

        match Compiler::compile_source(code, &assembly) {
            Err(CompileErrorKind::UnresolvedReference { assembly, code, .. }) => {
                assert_eq!(assembly, krate);
                assert!(code.contains(TYPE_MARKER));
            }
            other => panic!("expected unresolved reference, got {:?}", other.err()),
        }
    }

    #[test]
    #[traced_test]
    fn test_types_bound_by_marker() {
        let graph = graph(registry());
        let a = graph.find_default(&TypeInfo::of::<A>()).unwrap();
        let c = graph.find_default(&TypeInfo::of::<C>()).unwrap();
        let mut assembly = GeneratedAssembly::new();
        assembly.add_type(a.generated_type(&graph).unwrap());
        assembly.add_type(c.generated_type(&graph).unwrap());

        let compiled = Compiler::compile(&assembly).unwrap();
        assert_eq!(compiled.programs().count(), 2);
        assert!(Arc::ptr_eq(&compiled.program(&a.resolver_type_name()).unwrap().instance, &a));
        assert!(Arc::ptr_eq(&compiled.program(&c.resolver_type_name()).unwrap().instance, &c));

        let code = assembly.source().replace(&format!("{TYPE_MARKER}{}\n", a.resolver_type_name()), "");
        match Compiler::compile_source(code, &assembly) {
            Err(CompileErrorKind::MissingType { marker, .. }) => assert!(marker.ends_with(&a.resolver_type_name())),
            other => panic!("expected missing type, got {:?}", other.err()),
        }
    }

    #[test]
    #[traced_test]
    fn test_reordered_statement_is_undefined() {
        let graph = graph(registry());
        let (assembly, _) = assembly_for::<C>(&graph);
        let code = assembly.source();

        let mut lines: Vec<&str> = code.lines().collect();
        let built = lines.iter().position(|line| line.contains("C::factory(")).unwrap();
        let signature = lines.iter().position(|line| line.contains("pub fn build_c(")).unwrap();
        let statement = lines.remove(built);
        lines.insert(signature + 1, statement);

        assert!(matches!(
            Compiler::compile_source(lines.join("\n"), &assembly),
            Err(CompileErrorKind::UndefinedVariable { .. })
        ));
    }

    #[test]
    #[traced_test]
    fn test_renamed_binding_mismatches() {
        let graph = graph(registry());
        let (assembly, _) = assembly_for::<C>(&graph);
        let code = assembly.source().replace("let c = ", "let car = ");

        match Compiler::compile_source(code, &assembly) {
            Err(CompileErrorKind::StatementMismatch { expected, found, .. }) => {
                assert_eq!(expected, "c");
                assert_eq!(found, "car");
            }
            other => panic!("expected statement mismatch, got {:?}", other.err()),
        }
    }

    #[test]
    #[traced_test]
    fn test_wrong_return_is_missing() {
        let graph = graph(registry());
        let (assembly, _) = assembly_for::<C>(&graph);
        let code = assembly.source().replace("Ok(c)", "Ok(b)");

        assert!(matches!(
            Compiler::compile_source(code, &assembly),
            Err(CompileErrorKind::MissingReturn { .. })
        ));
    }

    #[test]
    #[traced_test]
    fn test_compiled_matches_quick_build() {
        let graph = graph(registry());
        let scope = Scope::new_root(graph.clone());
        let instance = graph.find_default(&TypeInfo::of::<C>()).unwrap();
        let (assembly, name) = assembly_for::<C>(&graph);
        let program = Compiler::compile(&assembly).unwrap().program(&name).unwrap();

        let compiled = program.invoke(&scope).unwrap().downcast::<C>().unwrap();
        let quick = QuickBuilder::new(&scope).build(&instance).unwrap().downcast::<C>().unwrap();

        assert_eq!(compiled.0, 78);
        assert_eq!(compiled.0, quick.0);
    }

    #[test]
    #[traced_test]
    fn test_async_program_requires_async_invoke() {
        let registry = Registry::new()
            .instance(7u32)
            .provide_async(
                |Inject(seed): Inject<u32>| async move { Ok::<_, InstantiateErrorKind>(A(*seed)) },
                Lifetime::Transient,
            );
        let graph = graph(registry);
        let scope = Scope::new_root(graph.clone());
        let (assembly, name) = assembly_for::<A>(&graph);
        let compiled = Compiler::compile(&assembly).unwrap();
        let program = compiled.program(&name).unwrap();

        assert_eq!(program.async_mode, AsyncMode::TailAsync);
        assert!(compiled.code.contains("Box::pin(A::factory(u32))"));
        assert!(matches!(program.invoke(&scope), Err(ResolveErrorKind::AsyncRequired { .. })));
    }

    #[tokio::test]
    async fn test_async_program_invoke() {
        let registry = Registry::new()
            .instance(7u32)
            .provide_async(
                |Inject(seed): Inject<u32>| async move { Ok::<_, InstantiateErrorKind>(A(*seed)) },
                Lifetime::Transient,
            )
            .provide(|Inject(a): Inject<A>| Ok::<_, InstantiateErrorKind>(B(a.0 + 1)), Lifetime::Transient);
        let graph = graph(registry);
        let scope = Scope::new_root(graph.clone());
        let (assembly, name) = assembly_for::<B>(&graph);
        let program = Compiler::compile(&assembly).unwrap().program(&name).unwrap();

        assert_eq!(program.async_mode, AsyncMode::AsyncWrapped);
        let object = program.invoke_async(&scope).await.unwrap();
        assert_eq!(object.downcast::<B>().unwrap().0, 8);
    }

    #[tokio::test]
    async fn test_tracked_transient_disables_tail_async() {
        struct Handle(u32);

        let registry = Registry::new()
            .register(
                Registration::factory(|| Ok::<_, InstantiateErrorKind>(Handle(3)))
                    .transient()
                    .with_finalizer(|_: Arc<Handle>| {}),
            )
            .provide_async(
                |Inject(handle): Inject<Handle>| async move { Ok::<_, InstantiateErrorKind>(A(handle.0)) },
                Lifetime::Transient,
            );
        let graph = graph(registry);
        let scope = Scope::new_root(graph.clone());
        let (assembly, name) = assembly_for::<A>(&graph);
        let compiled = Compiler::compile(&assembly).unwrap();
        let program = compiled.program(&name).unwrap();

        assert_eq!(program.async_mode, AsyncMode::AsyncWrapped);
        assert!(!compiled.code.contains("Box::pin("));
        let object = program.invoke_async(&scope).await.unwrap();
        assert_eq!(object.downcast::<A>().unwrap().0, 3);
        assert_eq!(scope.tracked(), 1);
    }
}
