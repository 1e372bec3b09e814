//! Renders arranged build methods to source, parses and checks that source and lowers it to executable programs.

mod assembly;
mod compiler;
mod program;
mod source;

pub(crate) use assembly::{GeneratedAssembly, GeneratedType};
pub(crate) use compiler::{CompiledAssembly, Compiler};
pub(crate) use program::Program;
pub(crate) use source::SourceWriter;

/// Prefix of the comment line that marks where a generated type starts.
pub(crate) const TYPE_MARKER: &str = "// joinery:type=";
/// Prefix of the header lines listing the crates an assembly is compiled against.
pub(crate) const REFERENCE_MARKER: &str = "// reference: ";
/// Prefix of the lines listing the full paths of the types a generated type names.
pub(crate) const USES_MARKER: &str = "// uses: ";
