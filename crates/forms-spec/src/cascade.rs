//! Cascading removals of steps and display subtrees.
//!
//! Each public operation runs inside a single store transaction: either every
//! dependent entity is removed or nothing is.

use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::spec::{
    Composite, ControlId, DisplayId, FormDisplay, GroupId, QuestionId, StepId, TransitionId,
};
use crate::store::{EntityStore, Transaction};

/// Identifiers of everything a cascade deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RemovalReport {
    pub steps: BTreeSet<StepId>,
    pub displays: BTreeSet<DisplayId>,
    pub questions: BTreeSet<QuestionId>,
    pub groups: BTreeSet<GroupId>,
    pub transitions: BTreeSet<TransitionId>,
    pub controls: BTreeSet<ControlId>,
    /// Questions whose saved responses were released.
    pub responses: BTreeSet<QuestionId>,
}

impl RemovalReport {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
            && self.displays.is_empty()
            && self.questions.is_empty()
            && self.groups.is_empty()
            && self.transitions.is_empty()
            && self.controls.is_empty()
            && self.responses.is_empty()
    }

    pub fn total(&self) -> usize {
        self.steps.len()
            + self.displays.len()
            + self.questions.len()
            + self.groups.len()
            + self.transitions.len()
            + self.controls.len()
    }
}

/// Removes a step, its display forest, and every transition entering or
/// leaving it together with their controls.
pub fn remove_step<S: EntityStore + ?Sized>(store: &S, step_id: StepId) -> Result<RemovalReport> {
    let mut report = RemovalReport::default();
    store.run_in_transaction(&mut |tx| {
        report = RemovalReport::default();
        remove_step_within(tx, step_id, &mut report)
    })?;
    info!(
        step_id,
        displays = report.displays.len(),
        transitions = report.transitions.len(),
        controls = report.controls.len(),
        "removed step"
    );
    Ok(report)
}

/// Removes a display node with all of its descendants and the records they
/// reference.
pub fn remove_display_subtree<S: EntityStore + ?Sized>(
    store: &S,
    display_id: DisplayId,
) -> Result<RemovalReport> {
    let mut report = RemovalReport::default();
    store.run_in_transaction(&mut |tx| {
        report = RemovalReport::default();
        remove_display_subtree_within(tx, display_id, &mut report)
    })?;
    info!(
        display_id,
        displays = report.displays.len(),
        questions = report.questions.len(),
        controls = report.controls.len(),
        "removed display subtree"
    );
    Ok(report)
}

/// Step removal against an open transaction, for callers composing larger
/// atomic changes.
pub fn remove_step_within(
    tx: &mut dyn Transaction,
    step_id: StepId,
    report: &mut RemovalReport,
) -> Result<()> {
    tx.load_step(step_id)?;

    // Roots first; anything left afterwards (orphans, cycles) is removed the same way.
    loop {
        let displays = tx.load_display_tree(step_id)?;
        let next = displays
            .iter()
            .find(|display| display.is_root())
            .or_else(|| displays.first());
        let Some(display) = next else {
            break;
        };
        remove_display_subtree_within(tx, display.id, report)?;
    }

    let mut transitions = tx.load_outgoing_transitions(step_id)?;
    transitions.extend(tx.load_incoming_transitions(step_id)?);
    for transition in transitions {
        if report.transitions.contains(&transition.id) {
            continue;
        }
        if let Some(control_id) = transition.control_id {
            delete_control_if_present(tx, control_id, report)?;
        }
        tx.delete_transition(transition.id)?;
        report.transitions.insert(transition.id);
    }

    tx.delete_step(step_id)?;
    report.steps.insert(step_id);
    Ok(())
}

pub fn remove_display_subtree_within(
    tx: &mut dyn Transaction,
    display_id: DisplayId,
    report: &mut RemovalReport,
) -> Result<()> {
    let root = tx.load_display(display_id)?;
    let subtree = collect_subtree(&root, &tx.load_display_tree(root.step_id)?);
    let removed_displays: BTreeSet<DisplayId> = subtree.iter().map(|display| display.id).collect();
    let removed_questions: BTreeSet<QuestionId> = subtree
        .iter()
        .filter_map(|display| display.composite.question_id())
        .collect();

    for control in tx.load_controls()? {
        let targets_removed = control
            .target_display()
            .is_some_and(|target| removed_displays.contains(&target));
        let keyed_by_removed = (control.is_validation() || control.is_conditional())
            && removed_questions.contains(&control.question_id());
        if targets_removed || keyed_by_removed {
            tx.delete_control(control.id)?;
            report.controls.insert(control.id);
        }
    }

    for display in &subtree {
        match display.composite {
            Composite::Question(question_id) => {
                if !tx.load_responses(question_id)?.is_empty() {
                    report.responses.insert(question_id);
                }
                tx.delete_responses(question_id)?;
                if delete_if_present(tx.delete_question(question_id))? {
                    report.questions.insert(question_id);
                }
            }
            Composite::Group(group_id) => {
                if delete_if_present(tx.delete_group(group_id))? {
                    report.groups.insert(group_id);
                }
            }
        }
        let (display_id, kind) = (display.id, display.composite.label());
        tx.delete_display(display_id)?;
        report.displays.insert(display_id);
        debug!(display_id, kind, "display removed");
    }
    Ok(())
}

/// The root and every node reachable below it, each node once.
fn collect_subtree(root: &FormDisplay, displays: &[FormDisplay]) -> Vec<FormDisplay> {
    let mut children: BTreeMap<DisplayId, Vec<&FormDisplay>> = BTreeMap::new();
    for display in displays {
        if let Some(parent_id) = display.parent_id {
            children.entry(parent_id).or_default().push(display);
        }
    }

    let mut seen = BTreeSet::from([root.id]);
    let mut subtree = vec![root.clone()];
    let mut cursor = 0;
    while cursor < subtree.len() {
        let parent_id = subtree[cursor].id;
        cursor += 1;
        for child in children.get(&parent_id).into_iter().flatten() {
            if seen.insert(child.id) {
                subtree.push((*child).clone());
            }
        }
    }
    subtree
}

fn delete_control_if_present(
    tx: &mut dyn Transaction,
    control_id: ControlId,
    report: &mut RemovalReport,
) -> Result<()> {
    if delete_if_present(tx.delete_control(control_id))? {
        report.controls.insert(control_id);
    }
    Ok(())
}

/// Treats a missing record as already gone.
fn delete_if_present(outcome: Result<()>) -> Result<bool> {
    match outcome {
        Ok(()) => Ok(true),
        Err(err) if err.is_not_found() => Ok(false),
        Err(err) => Err(err),
    }
}
