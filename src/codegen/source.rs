use core::fmt::Write as _;

use crate::{
    instance::{Instance, InstanceKind},
    plan::{AsyncMode, Frame, FrameOp, GeneratedMethod},
};

/// Line based source builder with indentation.
pub(crate) struct SourceWriter {
    code: String,
    level: usize,
}

impl SourceWriter {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            code: String::new(),
            level: 0,
        }
    }

    pub(crate) fn line(&mut self, line: &str) {
        if line.is_empty() {
            self.code.push('\n');
            return;
        }
        for _ in 0..self.level {
            self.code.push_str("    ");
        }
        self.code.push_str(line);
        self.code.push('\n');
    }

    pub(crate) fn block(&mut self, header: &str) {
        self.line(&format!("{header} {{"));
        self.level += 1;
    }

    pub(crate) fn end_block(&mut self) {
        self.level = self.level.saturating_sub(1);
        self.line("}");
    }

    pub(crate) fn blank_line(&mut self) {
        self.line("");
    }

    #[must_use]
    pub(crate) fn build(self) -> String {
        self.code
    }
}

impl Default for SourceWriter {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn field_name(instance: &Instance) -> String {
    format!("{}_{:08x}", instance.service_type.variable_name(), instance.hash as u32)
}

fn owner_name(instance: &Instance) -> String {
    let owner = match &instance.kind {
        InstanceKind::Decorated { decorator, .. } => decorator.implementation.as_ref(),
        _ => instance.implementation.as_ref(),
    };
    base_name(&owner.unwrap_or(&instance.service_type).short_name())
}

/// Path usable in expression position: `Repository<User>` becomes `Repository::<User>`.
fn base_name(short: &str) -> String {
    match short.find('<') {
        Some(index) => format!("{}::{}", &short[..index], &short[index..]),
        None => short.to_owned(),
    }
}

fn uses(method: &GeneratedMethod, frame: &Frame) -> String {
    frame
        .uses
        .iter()
        .map(|variable| method.variables[*variable].usage.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Right hand side of the statement a frame renders to, without error propagation.
fn expression(method: &GeneratedMethod, frame: &Frame) -> String {
    match &frame.op {
        FrameOp::Construct { instance, constructor } => format!("{}::{}({})", owner_name(instance), constructor.label(), uses(method, frame)),
        FrameOp::Field { instance } => format!("self.{}.get(scope)", field_name(instance)),
        FrameOp::ScopedLookup { instance } => format!(
            "scope.resolve::<{}>({:#018x})",
            instance.service_type.short_name(),
            instance.hash
        ),
        FrameOp::QuickBuild { instance } => format!("scope.quick_build({:#018x})", instance.hash),
        FrameOp::Collect { element_type } => format!("Many::<{}>::from([{}])", element_type.short_name(), uses(method, frame)),
        FrameOp::Absent => match frame.creates.first() {
            Some(variable) => format!("ignorable::<{}>(scope)", method.variables[*variable].ty.short_name()),
            None => "None".to_owned(),
        },
    }
}

fn fallible(frame: &Frame) -> bool {
    !matches!(frame.op, FrameOp::Collect { .. } | FrameOp::Absent)
}

pub(crate) fn render_method(writer: &mut SourceWriter, method: &GeneratedMethod) {
    let scope = method
        .arguments
        .first()
        .map_or("scope", |variable| method.variables[*variable].usage.as_str());

    match method.async_mode {
        AsyncMode::Synchronous => writer.block(&format!(
            "pub fn {}(&self, {scope}: &Scope) -> Result<Object, ResolveErrorKind>",
            method.name
        )),
        AsyncMode::TailAsync => writer.block(&format!(
            "pub fn {}<'a>(&'a self, {scope}: &'a Scope) -> BoxFuture<'a, Result<Object, ResolveErrorKind>>",
            method.name
        )),
        AsyncMode::AsyncWrapped => writer.block(&format!(
            "pub async fn {}(&self, {scope}: &Scope) -> Result<Object, ResolveErrorKind>",
            method.name
        )),
    }

    let chain: Vec<_> = method.chain().collect();
    for (index, (_, frame)) in chain.iter().enumerate() {
        let expression = expression(method, frame);
        if method.async_mode == AsyncMode::TailAsync && index == chain.len() - 1 {
            writer.line(&format!("Box::pin({expression})"));
            writer.end_block();
            return;
        }

        let mut statement = String::new();
        let created = frame.creates.first().map_or("_", |variable| method.variables[*variable].usage.as_str());
        let _ = write!(statement, "let {created} = {expression}");
        if frame.is_async {
            statement.push_str(".await");
        }
        if fallible(frame) {
            statement.push('?');
        }
        statement.push(';');
        writer.line(&statement);
    }

    match method.return_variable {
        Some(variable) => writer.line(&format!("Ok({})", method.variables[variable].usage)),
        None => writer.line("// no return value"),
    }
    writer.end_block();
}
