use std::{collections::BTreeSet, sync::Arc};

use super::{
    source::{field_name, render_method, SourceWriter},
    REFERENCE_MARKER, TYPE_MARKER, USES_MARKER,
};
use crate::{any::TypeInfo, instance::Instance, plan::GeneratedMethod};

/// One resolver type: a build method plus the fields it reads.
#[derive(Clone)]
pub(crate) struct GeneratedType {
    pub(crate) name: String,
    pub(crate) instance: Arc<Instance>,
    pub(crate) method: Arc<GeneratedMethod>,
}

impl GeneratedType {
    pub(crate) fn new(name: String, instance: Arc<Instance>, method: Arc<GeneratedMethod>) -> Self {
        Self { name, instance, method }
    }

    #[inline]
    pub(crate) fn marker(&self) -> String {
        format!("{TYPE_MARKER}{}", self.name)
    }

    fn used_types(&self) -> impl Iterator<Item = &TypeInfo> {
        core::iter::once(&self.instance.service_type)
            .chain(self.instance.implementation.as_ref())
            .chain(self.method.variables.iter().map(|variable| &variable.ty))
    }

    /// Crates the generated code names, including those of generic arguments.
    pub(crate) fn references(&self) -> BTreeSet<String> {
        let mut references = BTreeSet::new();
        for ty in self.used_types() {
            ty.references(&mut references);
        }
        references
    }

    pub(crate) fn render(&self, writer: &mut SourceWriter) {
        writer.line(&self.marker());
        let used: BTreeSet<String> = self.used_types().map(ToString::to_string).collect();
        for ty in &used {
            writer.line(&format!("{USES_MARKER}{ty}"));
        }
        writer.line(&format!("/// Builds {}", self.instance.describe()));
        if self.method.fields.is_empty() {
            writer.line(&format!("pub struct {};", self.name));
        } else {
            writer.block(&format!("pub struct {}", self.name));
            for field in &self.method.fields {
                writer.line(&format!("{}: FieldSlot<{}>,", field_name(field), field.service_type.short_name()));
            }
            writer.end_block();
        }
        writer.blank_line();
        writer.block(&format!("impl {}", self.name));
        render_method(writer, &self.method);
        writer.end_block();
    }
}

/// Generated types compiled together in one pass.
pub(crate) struct GeneratedAssembly {
    pub(crate) types: Vec<GeneratedType>,
    pub(crate) references: BTreeSet<String>,
}

impl GeneratedAssembly {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            types: Vec::new(),
            references: ["core", "alloc", "std", env!("CARGO_CRATE_NAME")]
                .into_iter()
                .map(ToOwned::to_owned)
                .collect(),
        }
    }

    /// Adds a type and gathers the crates it references into the assembly's reference set.
    pub(crate) fn add_type(&mut self, generated: GeneratedType) {
        self.references.extend(generated.references());
        self.types.push(generated);
    }

    pub(crate) fn has_type(&self, name: &str) -> bool {
        self.types.iter().any(|generated| generated.name == name)
    }

    pub(crate) fn source(&self) -> String {
        let mut writer = SourceWriter::new();
        writer.line("// Generated build plans. Do not edit.");
        for reference in &self.references {
            writer.line(&format!("{REFERENCE_MARKER}{reference}"));
        }
        writer.line(&format!("use {}::{{ignorable, FieldSlot, Many, Object, ResolveErrorKind, Scope}};", env!("CARGO_CRATE_NAME")));
        writer.line("use futures_core::future::BoxFuture;");
        for generated in &self.types {
            writer.blank_line();
            generated.render(&mut writer);
        }
        writer.build()
    }
}

impl Default for GeneratedAssembly {
    fn default() -> Self {
        Self::new()
    }
}
