use futures_core::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, error};

use crate::{
    any::{Object, TypeInfo},
    dependency_resolver::Arguments,
    errors::ResolveErrorKind,
    instance::{Instance, InstanceKind},
    instantiator::Constructor,
    plan::AsyncMode,
    scope::Scope,
    wrappers::ManyObject,
};

pub(crate) type Slot = usize;

pub(crate) enum StepOp {
    Construct { instance: Arc<Instance>, constructor: Constructor },
    Field { index: usize },
    ScopedLookup { instance: Arc<Instance> },
    QuickBuild { instance: Arc<Instance> },
    Collect,
    /// Unresolved optional parameter, or the default of an ignorable one.
    Absent { service_type: TypeInfo },
}

pub(crate) struct Step {
    pub(crate) op: StepOp,
    pub(crate) inputs: Vec<Slot>,
    pub(crate) output: Slot,
    pub(crate) is_async: bool,
}

/// Singleton or supplied object read by a compiled program.
pub(crate) struct FieldSlot {
    instance: Arc<Instance>,
}

impl FieldSlot {
    pub(crate) fn new(instance: Arc<Instance>) -> Self {
        Self { instance }
    }

    fn get(&self, scope: &Scope) -> Result<Object, ResolveErrorKind> {
        // Objects are read directly, the root store may be building this very field
        if let InstanceKind::Object(object) = &self.instance.kind {
            return Ok(object.clone());
        }
        scope.root().resolve_instance(&self.instance)
    }

    async fn get_async(&self, scope: &Scope) -> Result<Object, ResolveErrorKind> {
        if let InstanceKind::Object(object) = &self.instance.kind {
            return Ok(object.clone());
        }
        let root = scope.root();
        root.resolve_instance_async(&self.instance).await
    }
}

/// Executable form of one generated type: its build method lowered to slot operations.
pub(crate) struct Program {
    pub(crate) name: String,
    pub(crate) instance: Arc<Instance>,
    pub(crate) steps: Vec<Step>,
    pub(crate) fields: Vec<FieldSlot>,
    pub(crate) slots: usize,
    pub(crate) scope_slot: Slot,
    pub(crate) result: Slot,
    pub(crate) async_mode: AsyncMode,
}

impl Program {
    fn async_required(&self) -> ResolveErrorKind {
        ResolveErrorKind::AsyncRequired {
            service: self.instance.service_type.clone(),
            name: self.instance.name.to_string(),
        }
    }

    fn initial_slots(&self, scope: &Scope) -> Vec<Option<Object>> {
        let mut slots = vec![None; self.slots];
        slots[self.scope_slot] = Some(Arc::new(scope.clone()) as Object);
        slots
    }

    fn arguments(step: &Step, slots: &[Option<Object>]) -> Arguments {
        Arguments::new(step.inputs.iter().map(|input| slots[*input].clone()))
    }

    fn finish(&self, slots: &mut [Option<Object>]) -> Result<Object, ResolveErrorKind> {
        slots[self.result].take().ok_or_else(|| {
            let err = ResolveErrorKind::MissingArgument {
                index: self.result,
                expected: self.instance.service_type.clone(),
            };
            error!("{}", err);
            err
        })
    }

    fn run_step(&self, step: &Step, scope: &Scope, slots: &[Option<Object>]) -> Result<Option<Object>, ResolveErrorKind> {
        let object = match &step.op {
            StepOp::Construct { instance, constructor } => {
                let object = constructor.call(Self::arguments(step, slots))?;
                scope.track_transient(instance, &object);
                object
            }
            StepOp::Field { index } => self.fields[*index].get(scope)?,
            StepOp::ScopedLookup { instance } | StepOp::QuickBuild { instance } => scope.resolve_instance(instance)?,
            StepOp::Collect => Arc::new(ManyObject(step.inputs.iter().filter_map(|input| slots[*input].clone()).collect())),
            StepOp::Absent { service_type } => return Ok(scope.graph().config().ignorable_default(service_type)),
        };
        Ok(Some(object))
    }

    async fn run_step_async(&self, step: &Step, scope: &Scope, slots: &[Option<Object>]) -> Result<Option<Object>, ResolveErrorKind> {
        if !step.is_async {
            return self.run_step(step, scope, slots);
        }
        let object = match &step.op {
            StepOp::Construct { instance, constructor } => {
                let object = constructor.call_async(Self::arguments(step, slots)).await?;
                scope.track_transient(instance, &object);
                object
            }
            StepOp::Field { index } => self.fields[*index].get_async(scope).await?,
            StepOp::ScopedLookup { instance } | StepOp::QuickBuild { instance } => scope.resolve_instance_async(instance).await?,
            StepOp::Collect | StepOp::Absent { .. } => return self.run_step(step, scope, slots),
        };
        Ok(Some(object))
    }

    /// Runs a synchronous program.
    pub(crate) fn invoke(&self, scope: &Scope) -> Result<Object, ResolveErrorKind> {
        if self.async_mode != AsyncMode::Synchronous {
            let err = self.async_required();
            error!("{}", err);
            return Err(err);
        }

        let mut slots = self.initial_slots(scope);
        for step in &self.steps {
            slots[step.output] = self.run_step(step, scope, &slots)?;
        }
        debug!(program = %self.name, "Program invoked");
        self.finish(&mut slots)
    }

    pub(crate) fn invoke_async<'a>(&'a self, scope: &'a Scope) -> BoxFuture<'a, Result<Object, ResolveErrorKind>> {
        match self.async_mode {
            AsyncMode::Synchronous => Box::pin(core::future::ready(self.invoke(scope))),
            AsyncMode::TailAsync => match self.steps.split_last() {
                Some((tail, prefix)) if tail.output == self.result => {
                    let mut slots = self.initial_slots(scope);
                    for step in prefix {
                        match self.run_step(step, scope, &slots) {
                            Ok(object) => slots[step.output] = object,
                            Err(err) => return Box::pin(core::future::ready(Err(err))),
                        }
                    }
                    match &tail.op {
                        // The constructor's own future is handed out as is
                        StepOp::Construct { instance, constructor } => {
                            let future = constructor.call_async(Self::arguments(tail, &slots));
                            Box::pin(async move {
                                let object = future.await?;
                                scope.track_transient(instance, &object);
                                Ok(object)
                            })
                        }
                        _ => Box::pin(async move {
                            let mut slots = slots;
                            slots[tail.output] = self.run_step_async(tail, scope, &slots).await?;
                            self.finish(&mut slots)
                        }),
                    }
                }
                _ => self.invoke_wrapped(scope),
            },
            AsyncMode::AsyncWrapped => self.invoke_wrapped(scope),
        }
    }

    fn invoke_wrapped<'a>(&'a self, scope: &'a Scope) -> BoxFuture<'a, Result<Object, ResolveErrorKind>> {
        Box::pin(async move {
            let mut slots = self.initial_slots(scope);
            for step in &self.steps {
                slots[step.output] = self.run_step_async(step, scope, &slots).await?;
            }
            debug!(program = %self.name, "Program invoked");
            self.finish(&mut slots)
        })
    }
}
