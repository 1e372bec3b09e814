//! Intermediate representation of a build plan.
//!
//! A [`GeneratedMethod`] owns an arena of [`Frame`]s and [`Variable`]s addressed by index.
//! Frames declare what they need as [`Requirement`]s, the arranger resolves those to variables,
//! orders the frames and links them into a single chain that codegen renders and lowers.

mod arranger;
mod frame;
mod method;
mod variable;

pub(crate) use arranger::{arrange, VariableSource};
pub(crate) use frame::{Frame, FrameId, FrameOp, Requirement};
pub(crate) use method::{AsyncMode, GeneratedMethod, PlanState};
pub(crate) use variable::{Variable, VariableId};
