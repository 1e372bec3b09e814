use std::collections::{BTreeSet, VecDeque};
use tracing::debug;

use super::{AsyncMode, FrameId, GeneratedMethod, PlanState, Requirement, VariableId};
use crate::errors::PlanErrorKind;

/// Supplies variables for frame requirements, creating new frames when needed.
pub(crate) trait VariableSource {
    fn find_or_create(&mut self, requirement: &Requirement, method: &mut GeneratedMethod) -> Result<VariableId, PlanErrorKind>;
}

/// Runs every arranging step on a fresh method: variables, dependencies, ordering, linking, async classification.
pub(crate) fn arrange<S: VariableSource>(method: &mut GeneratedMethod, source: &mut S) -> Result<(), PlanErrorKind> {
    resolve_variables(method, source)?;
    gather_dependencies(method)?;
    sort(method)?;
    link(method)?;
    method.async_mode = classify(method);

    debug!(method = %method.name, frames = method.frames.len(), async_mode = ?method.async_mode, "Method arranged");
    Ok(())
}

fn expect_state(method: &GeneratedMethod, expected: PlanState) -> Result<(), PlanErrorKind> {
    if method.state == expected {
        return Ok(());
    }
    Err(PlanErrorKind::InvalidState {
        method: method.name.clone(),
        expected: expected.as_str(),
        actual: method.state.as_str(),
    })
}

/// Resolves requirements of every requested frame, then of every frame discovered on the way.
pub(crate) fn resolve_variables<S: VariableSource>(method: &mut GeneratedMethod, source: &mut S) -> Result<(), PlanErrorKind> {
    expect_state(method, PlanState::Unresolved)?;

    let mut queue: VecDeque<FrameId> = method.requested.iter().copied().collect();
    while let Some(frame) = queue.pop_front() {
        if method.frames[frame].uses_resolved {
            continue;
        }

        let requirements = method.frames[frame].requirements.clone();
        let mut uses = Vec::with_capacity(requirements.len());
        for requirement in &requirements {
            let before = method.frames.len();
            let variable = source.find_or_create(requirement, method)?;
            if method.variables[variable].creator == Some(frame) {
                return Err(PlanErrorKind::SelfReference {
                    frame: method.frame_label(frame),
                    service: method.variables[variable].ty.clone(),
                });
            }
            uses.push(variable);
            queue.extend(before..method.frames.len());
        }

        let frame = &mut method.frames[frame];
        frame.uses = uses;
        frame.uses_resolved = true;
    }

    method.state = PlanState::VariablesResolved;
    Ok(())
}

/// Computes, for every frame and variable, the frames that must run before it.
pub(crate) fn gather_dependencies(method: &mut GeneratedMethod) -> Result<(), PlanErrorKind> {
    expect_state(method, PlanState::VariablesResolved)?;

    let mut gathered: Vec<Option<BTreeSet<FrameId>>> = vec![None; method.frames.len()];
    let mut visiting = vec![false; method.frames.len()];
    let mut path = Vec::new();
    for frame in 0..method.frames.len() {
        frame_dependencies(method, frame, &mut gathered, &mut visiting, &mut path)?;
    }

    for (frame, dependencies) in gathered.into_iter().enumerate() {
        method.frames[frame].dependencies = dependencies.unwrap_or_default();
    }
    for variable in 0..method.variables.len() {
        let mut frames = BTreeSet::new();
        collect_variable_frames(method, variable, &mut frames, &mut BTreeSet::new());
        method.variables[variable].frames = frames;
    }

    method.state = PlanState::DependenciesGathered;
    Ok(())
}

fn collect_variable_frames(method: &GeneratedMethod, variable: VariableId, frames: &mut BTreeSet<FrameId>, seen: &mut BTreeSet<VariableId>) {
    if !seen.insert(variable) {
        return;
    }
    if let Some(creator) = method.variables[variable].creator {
        frames.insert(creator);
        frames.extend(method.frames[creator].dependencies.iter().copied());
    }
    for dependency in &method.variables[variable].dependencies {
        collect_variable_frames(method, *dependency, frames, seen);
    }
}

fn frame_dependencies(
    method: &GeneratedMethod,
    frame: FrameId,
    gathered: &mut Vec<Option<BTreeSet<FrameId>>>,
    visiting: &mut Vec<bool>,
    path: &mut Vec<FrameId>,
) -> Result<BTreeSet<FrameId>, PlanErrorKind> {
    if let Some(dependencies) = &gathered[frame] {
        return Ok(dependencies.clone());
    }
    if visiting[frame] {
        let start = path.iter().position(|visited| *visited == frame).unwrap_or(0);
        let mut cycle: Vec<String> = path[start..].iter().map(|visited| method.frame_label(*visited)).collect();
        cycle.push(method.frame_label(frame));
        return Err(PlanErrorKind::CyclicDependency { path: cycle });
    }

    visiting[frame] = true;
    path.push(frame);

    let mut dependencies = BTreeSet::new();
    let mut pending: Vec<VariableId> = method.frames[frame].uses.clone();
    let mut seen = BTreeSet::new();
    while let Some(variable) = pending.pop() {
        if !seen.insert(variable) {
            continue;
        }
        pending.extend(method.variables[variable].dependencies.iter().copied());

        let Some(creator) = method.variables[variable].creator else {
            continue;
        };
        if creator == frame {
            return Err(PlanErrorKind::SelfReference {
                frame: method.frame_label(frame),
                service: method.variables[variable].ty.clone(),
            });
        }
        dependencies.insert(creator);
        dependencies.extend(frame_dependencies(method, creator, gathered, visiting, path)?);
    }

    path.pop();
    visiting[frame] = false;
    gathered[frame] = Some(dependencies.clone());
    Ok(dependencies)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    None,
    Temporary,
    Permanent,
}

/// Orders frames so that every frame follows the frames it depends on.
///
/// Discovered frames go before the requested ones. The sort is stable: independent frames keep that order.
pub(crate) fn sort(method: &mut GeneratedMethod) -> Result<(), PlanErrorKind> {
    expect_state(method, PlanState::DependenciesGathered)?;

    let mut order: Vec<FrameId> = (0..method.frames.len())
        .filter(|frame| !method.requested.contains(frame))
        .collect();
    order.extend(method.requested.iter().copied());

    let mut position = vec![0; method.frames.len()];
    for (index, frame) in order.iter().enumerate() {
        position[*frame] = index;
    }

    let mut marks = vec![Mark::None; method.frames.len()];
    let mut sorted = Vec::with_capacity(order.len());
    let mut path = Vec::new();
    for frame in &order {
        visit(method, *frame, &position, &mut marks, &mut sorted, &mut path)?;
    }

    method.sorted = sorted;
    method.state = PlanState::TopologicallySorted;
    Ok(())
}

fn visit(
    method: &GeneratedMethod,
    frame: FrameId,
    position: &[usize],
    marks: &mut Vec<Mark>,
    sorted: &mut Vec<FrameId>,
    path: &mut Vec<FrameId>,
) -> Result<(), PlanErrorKind> {
    match marks[frame] {
        Mark::Permanent => return Ok(()),
        Mark::Temporary => {
            let mut cycle: Vec<String> = path.iter().map(|visited| method.frame_label(*visited)).collect();
            cycle.push(method.frame_label(frame));
            return Err(PlanErrorKind::CyclicDependency { path: cycle });
        }
        Mark::None => {}
    }

    marks[frame] = Mark::Temporary;
    path.push(frame);

    let mut dependencies: Vec<FrameId> = method.frames[frame].dependencies.iter().copied().collect();
    dependencies.sort_by_key(|dependency| position[*dependency]);
    for dependency in dependencies {
        visit(method, dependency, position, marks, sorted, path)?;
    }

    path.pop();
    marks[frame] = Mark::Permanent;
    sorted.push(frame);
    Ok(())
}

/// Links sorted frames into a chain. Each frame's successor can only be set once.
pub(crate) fn link(method: &mut GeneratedMethod) -> Result<(), PlanErrorKind> {
    if method.head.is_some() || method.state == PlanState::Linked {
        return Err(PlanErrorKind::AlreadyLinked {
            method: method.name.clone(),
        });
    }
    expect_state(method, PlanState::TopologicallySorted)?;

    for pair in method.sorted.windows(2) {
        if method.next[pair[0]].is_some() {
            return Err(PlanErrorKind::AlreadyLinked {
                method: method.name.clone(),
            });
        }
        method.next[pair[0]] = Some(pair[1]);
    }
    method.head = method.sorted.first().copied();

    method.state = PlanState::Linked;
    Ok(())
}

pub(crate) fn classify(method: &GeneratedMethod) -> AsyncMode {
    let chain: Vec<_> = method.chain().collect();
    let async_frames: Vec<usize> = chain
        .iter()
        .enumerate()
        .filter(|(_, (_, frame))| frame.is_async)
        .map(|(index, _)| index)
        .collect();

    match async_frames.as_slice() {
        [] => AsyncMode::Synchronous,
        [index] if *index == chain.len() - 1 && !chain.iter().any(|(_, frame)| frame.wraps) => AsyncMode::TailAsync,
        _ => AsyncMode::AsyncWrapped,
    }
}
