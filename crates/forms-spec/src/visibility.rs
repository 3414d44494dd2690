use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, warn};

use crate::condition::ControlEvaluator;
use crate::error::{ConfigWarning, Result, WarningCode};
use crate::responses::Responses;
use crate::spec::{DisplayId, FormDisplay, QuestionId, Step, StepId};

/// A display node kept in the composed tree, with its nesting depth (roots are 0).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayNode {
    pub display: FormDisplay,
    pub depth: usize,
}

/// Pre-order list of visible nodes plus what was hidden on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibleTree {
    pub nodes: Vec<DisplayNode>,
    /// Nodes excluded by a failing conditional control, descendants included.
    pub hidden: Vec<FormDisplay>,
    pub warnings: Vec<ConfigWarning>,
}

impl VisibleTree {
    pub fn visible_questions(&self) -> BTreeSet<QuestionId> {
        visible_questions(&self.nodes)
    }

    pub fn hidden_questions(&self) -> BTreeSet<QuestionId> {
        self.hidden
            .iter()
            .filter_map(|display| display.composite.question_id())
            .collect()
    }
}

pub fn visible_questions(nodes: &[DisplayNode]) -> BTreeSet<QuestionId> {
    nodes
        .iter()
        .filter_map(|node| node.display.composite.question_id())
        .collect()
}

#[derive(Clone, Copy)]
pub struct DisplayComposer<'a> {
    evaluator: ControlEvaluator<'a>,
}

impl<'a> DisplayComposer<'a> {
    pub fn new(evaluator: ControlEvaluator<'a>) -> Self {
        Self { evaluator }
    }

    pub fn compose_visible_tree(
        &self,
        step: &Step,
        displays: &[FormDisplay],
        responses: &Responses,
    ) -> Vec<DisplayNode> {
        self.compose(step, displays, responses).nodes
    }

    pub fn compose_step(&self, step_id: StepId, responses: &Responses) -> Result<VisibleTree> {
        let store = self.evaluator.store();
        let step = store.load_step(step_id)?;
        let displays = store.load_display_tree(step_id)?;
        Ok(self.compose(&step, &displays, responses))
    }

    /// Depth-first, siblings by ascending order; a node whose conditional
    /// control fails is dropped together with its whole subtree.
    pub fn compose(&self, step: &Step, displays: &[FormDisplay], responses: &Responses) -> VisibleTree {
        let own: Vec<&FormDisplay> = displays
            .iter()
            .filter(|display| display.step_id == step.id)
            .collect();
        let ids: BTreeSet<DisplayId> = own.iter().map(|display| display.id).collect();

        let mut children: BTreeMap<Option<DisplayId>, Vec<&FormDisplay>> = BTreeMap::new();
        for display in &own {
            if let Some(parent_id) = display.parent_id
                && !ids.contains(&parent_id)
            {
                let display_id = display.id;
                warn!(
                    display_id,
                    parent_id,
                    step_id = step.id,
                    "display references a parent outside the step; skipped"
                );
                continue;
            }
            children.entry(display.parent_id).or_default().push(display);
        }
        for siblings in children.values_mut() {
            siblings.sort_by_key(|display| (display.order, display.id));
        }

        let mut tree = VisibleTree::default();
        let mut visited = BTreeSet::new();
        self.walk(None, 0, &children, &mut visited, responses, &mut tree);

        let unreachable = own
            .iter()
            .filter(|display| !visited.contains(&display.id))
            .count();
        if unreachable > 0 {
            warn!(step_id = step.id, unreachable, "display nodes not reachable from the root");
        }
        debug!(
            step_id = step.id,
            visible = tree.nodes.len(),
            hidden = tree.hidden.len(),
            "composed display tree"
        );
        tree
    }

    fn walk(
        &self,
        parent: Option<DisplayId>,
        depth: usize,
        children: &BTreeMap<Option<DisplayId>, Vec<&FormDisplay>>,
        visited: &mut BTreeSet<DisplayId>,
        responses: &Responses,
        tree: &mut VisibleTree,
    ) {
        let Some(siblings) = children.get(&parent) else {
            return;
        };
        for display in siblings {
            if !visited.insert(display.id) {
                continue;
            }
            if self.is_shown(display, responses, &mut tree.warnings) {
                tree.nodes.push(DisplayNode {
                    display: (*display).clone(),
                    depth,
                });
                if display.is_group() {
                    self.walk(Some(display.id), depth + 1, children, visited, responses, tree);
                }
            } else {
                let display_id = display.id;
                debug!(display_id, "display hidden by its condition");
                tree.hidden.push((*display).clone());
                collect_hidden(display.id, children, visited, &mut tree.hidden);
            }
        }
    }

    fn is_shown(
        &self,
        display: &FormDisplay,
        responses: &Responses,
        warnings: &mut Vec<ConfigWarning>,
    ) -> bool {
        match self.evaluator.store().load_conditional_control(display.id) {
            Ok(None) => true,
            Ok(Some(control)) => {
                let evaluation = self.evaluator.inspect(&control, responses);
                warnings.extend(evaluation.warning);
                evaluation.passed
            }
            Err(err) => {
                warnings.push(ConfigWarning {
                    code: WarningCode::StoreError,
                    control_id: None,
                    step_id: Some(display.step_id),
                    message: format!("display {}: {}", display.id, err),
                });
                false
            }
        }
    }
}

fn collect_hidden(
    parent: DisplayId,
    children: &BTreeMap<Option<DisplayId>, Vec<&FormDisplay>>,
    visited: &mut BTreeSet<DisplayId>,
    hidden: &mut Vec<FormDisplay>,
) {
    let Some(siblings) = children.get(&Some(parent)) else {
        return;
    };
    for display in siblings {
        if visited.insert(display.id) {
            hidden.push((*display).clone());
            collect_hidden(display.id, children, visited, hidden);
        }
    }
}
