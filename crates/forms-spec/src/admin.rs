//! Control administration and configuration checks.

use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cascade::RemovalReport;
use crate::error::{ConfigWarning, FormsError, Result, WarningCode};
use crate::spec::{Control, ControlId, ControlKind, FormId, StepId, TransitionId, sentinel};
use crate::store::{EntityReader, EntityStore};
use crate::validator::ValidatorRegistry;

/// A control to create (`id` 0) or update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ControlRequest {
    #[serde(default)]
    pub id: ControlId,
    #[serde(flatten)]
    pub kind: ControlKind,
    /// Empty picks the first validator applicable to the question.
    #[serde(default)]
    pub validator: String,
    #[serde(default)]
    pub value: String,
    /// Transition guarded by a transition control.
    #[serde(default, with = "sentinel")]
    #[schemars(with = "u32")]
    pub transition_id: Option<TransitionId>,
}

/// Creates or updates a control after checking its validator.
///
/// A question keeps at most one validation control and a display at most one
/// conditional control; saving another one updates the existing record. A
/// transition control is attached to its transition in the same transaction.
pub fn save_control<S: EntityStore + ?Sized>(
    store: &S,
    registry: &ValidatorRegistry,
    request: ControlRequest,
) -> Result<Control> {
    let question = store.load_question(request.kind.question_id())?;

    let validator = if request.validator.trim().is_empty() {
        registry.default_for(question.answer_type()).ok_or_else(|| {
            FormsError::misconfigured(
                request.id,
                format!("no validator applies to {} answers", question.answer_type()),
            )
        })?
    } else {
        registry
            .resolve_for(request.validator.trim(), question.answer_type())
            .map_err(|reason| FormsError::misconfigured(request.id, reason))?
    };
    validator
        .check_value(&request.value)
        .map_err(|reason| FormsError::misconfigured(request.id, reason))?;

    let current = match request.id {
        0 => None,
        id => Some(store.load_control(id)?),
    };
    let occupant = match request.kind {
        ControlKind::Validation { question_id } => store.load_validation_control(question_id)?,
        ControlKind::Conditional { display_id, .. } => {
            store.load_display(display_id)?;
            store.load_conditional_control(display_id)?
        }
        ControlKind::Transition { .. } => match request.transition_id {
            Some(transition_id) => match store.load_transition(transition_id)?.control_id {
                Some(control_id) => match store.load_control(control_id) {
                    Ok(control) => Some(control),
                    Err(err) if err.is_not_found() => None,
                    Err(err) => return Err(err),
                },
                None => None,
            },
            None => None,
        },
    };
    let existing = match (current, occupant) {
        (Some(current), Some(occupant)) if occupant.id != current.id => {
            return Err(FormsError::misconfigured(
                current.id,
                format!(
                    "{} control {} already holds that target",
                    occupant.kind.label(),
                    occupant.id
                ),
            ));
        }
        (Some(current), _) => Some(current),
        (None, occupant) => occupant,
    };
    if let Some(existing) = &existing
        && existing.kind.label() != request.kind.label()
    {
        return Err(FormsError::misconfigured(
            existing.id,
            format!(
                "cannot turn a {} control into a {} control",
                existing.kind.label(),
                request.kind.label()
            ),
        ));
    }
    if matches!(request.kind, ControlKind::Transition { .. })
        && existing.is_none()
        && request.transition_id.is_none()
    {
        return Err(FormsError::misconfigured(
            request.id,
            "a transition control needs the transition it guards",
        ));
    }

    let control = Control {
        id: existing.as_ref().map(|control| control.id).unwrap_or(0),
        kind: request.kind,
        validator: validator.name().to_string(),
        value: request.value.clone(),
    };
    let transition_id = request.transition_id;
    let mut saved = control.clone();
    store.run_in_transaction(&mut |tx| {
        saved = control.clone();
        if saved.id != 0 {
            tx.update_control(&saved)?;
        } else {
            saved.id = tx.insert_control(saved.clone())?;
        }
        if let (ControlKind::Transition { .. }, Some(transition_id)) = (saved.kind, transition_id) {
            // A control guards one transition at most.
            for mut previous in tx.load_transitions_guarded_by(saved.id)? {
                if previous.id != transition_id {
                    previous.control_id = None;
                    tx.update_transition(&previous)?;
                }
            }
            let mut transition = tx.load_transition(transition_id)?;
            if transition.control_id != Some(saved.id) {
                transition.control_id = Some(saved.id);
                tx.update_transition(&transition)?;
            }
        }
        Ok(())
    })?;

    info!(
        control_id = saved.id,
        kind = saved.kind.label(),
        validator = %saved.validator,
        updated = existing.is_some(),
        "saved control"
    );
    Ok(saved)
}

/// Deletes a control; transitions it guarded become unconditional.
///
/// Returns the transitions whose guard was cleared.
pub fn remove_control<S: EntityStore + ?Sized>(
    store: &S,
    control_id: ControlId,
) -> Result<Vec<TransitionId>> {
    let mut cleared = Vec::new();
    store.run_in_transaction(&mut |tx| {
        cleared.clear();
        tx.load_control(control_id)?;
        for mut transition in tx.load_transitions_guarded_by(control_id)? {
            transition.control_id = None;
            tx.update_transition(&transition)?;
            cleared.push(transition.id);
        }
        tx.delete_control(control_id)
    })?;
    info!(control_id, cleared = cleared.len(), "removed control");
    Ok(cleared)
}

/// Deletes a transition together with its guard control.
pub fn remove_transition<S: EntityStore + ?Sized>(
    store: &S,
    transition_id: TransitionId,
) -> Result<RemovalReport> {
    let mut report = RemovalReport::default();
    store.run_in_transaction(&mut |tx| {
        report = RemovalReport::default();
        let transition = tx.load_transition(transition_id)?;
        if let Some(control_id) = transition.control_id {
            match tx.delete_control(control_id) {
                Ok(()) => {
                    report.controls.insert(control_id);
                }
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }
        tx.delete_transition(transition_id)?;
        report.transitions.insert(transition_id);
        Ok(())
    })?;
    info!(transition_id, "removed transition");
    Ok(report)
}

/// Reports configuration problems of one form without changing anything.
pub fn check_configuration(
    store: &dyn EntityReader,
    registry: &ValidatorRegistry,
    form_id: FormId,
) -> Result<Vec<ConfigWarning>> {
    let steps = store.load_steps(form_id)?;
    let step_ids: BTreeSet<StepId> = steps.iter().map(|step| step.id).collect();
    let mut warnings = Vec::new();

    if !steps.iter().any(|step| step.is_first) {
        warnings.push(ConfigWarning {
            code: WarningCode::MissingFirstStep,
            control_id: None,
            step_id: None,
            message: format!("form {} has no step flagged as first", form_id),
        });
    }

    for step in &steps {
        let transitions = store.load_outgoing_transitions(step.id)?;
        if transitions.is_empty() && !step.is_final {
            warnings.push(ConfigWarning::step(
                WarningCode::DeadEndStep,
                step.id,
                format!("step '{}' has no outgoing transition and is not final", step.title),
            ));
        }
        for transition in transitions {
            if let Err(err) = store.load_step(transition.to_step) {
                warnings.push(ConfigWarning::step(
                    lookup_code(&err, WarningCode::MissingStep),
                    step.id,
                    format!("transition {} leads to step {}: {}", transition.id, transition.to_step, err),
                ));
            }
            if let Some(control_id) = transition.control_id
                && let Err(err) = store.load_control(control_id)
            {
                warnings.push(ConfigWarning {
                    code: lookup_code(&err, WarningCode::MissingControl),
                    control_id: Some(control_id),
                    step_id: Some(step.id),
                    message: format!("transition {} is guarded by a missing control", transition.id),
                });
            }
        }
    }

    for control in store.load_controls()? {
        let question = match store.load_question(control.question_id()) {
            Ok(question) => question,
            Err(err) => {
                warnings.push(ConfigWarning::control(
                    lookup_code(&err, WarningCode::MissingQuestion),
                    control.id,
                    format!(
                        "{} control is keyed by question {}: {}",
                        control.kind.label(),
                        control.question_id(),
                        err
                    ),
                ));
                continue;
            }
        };
        if !step_ids.contains(&question.step_id) {
            continue;
        }
        if let Some(display_id) = control.target_display()
            && let Err(err) = store.load_display(display_id)
        {
            warnings.push(ConfigWarning::control(
                lookup_code(&err, WarningCode::MissingDisplay),
                control.id,
                format!("conditional control targets display {}: {}", display_id, err),
            ));
        }
        match registry.get(&control.validator) {
            Err(_) => warnings.push(ConfigWarning::control(
                WarningCode::UnknownValidator,
                control.id,
                format!("validator '{}' is not registered", control.validator),
            )),
            Ok(validator) if !validator.is_applicable_to(question.answer_type()) => {
                warnings.push(ConfigWarning::control(
                    WarningCode::InapplicableValidator,
                    control.id,
                    format!(
                        "validator '{}' does not apply to {} question {}",
                        validator.name(),
                        question.answer_type(),
                        question.id
                    ),
                ))
            }
            Ok(validator) => {
                if let Err(reason) = validator.check_value(&control.value) {
                    warnings.push(ConfigWarning::control(
                        WarningCode::InvalidValue,
                        control.id,
                        reason,
                    ));
                }
            }
        }
    }

    for warning in &warnings {
        warn!(code = ?warning.code, control_id = ?warning.control_id, step_id = ?warning.step_id, "{}", warning.message);
    }
    debug!(form_id, warnings = warnings.len(), "configuration checked");
    Ok(warnings)
}

fn lookup_code(err: &FormsError, missing: WarningCode) -> WarningCode {
    if err.is_not_found() {
        missing
    } else {
        WarningCode::StoreError
    }
}
