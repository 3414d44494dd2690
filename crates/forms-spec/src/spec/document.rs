use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{FormsError, Result};
use crate::responses::Responses;
use crate::spec::{Control, FormDisplay, FormId, Group, Question, Step, Transition};

/// Header of a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FormInfo {
    pub id: FormId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Serializable snapshot of a whole form and its saved responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormDocument {
    pub form: FormInfo,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub displays: Vec<FormDisplay>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
    #[serde(default)]
    pub controls: Vec<Control>,
    #[serde(default, skip_serializing_if = "Responses::is_empty")]
    pub responses: Responses,
}

impl FormDocument {
    pub fn from_json(raw: &str) -> Result<Self> {
        let document: FormDocument = serde_json::from_str(raw)?;
        document.check_structure()?;
        Ok(document)
    }

    /// Rejects documents the store could not hold consistently.
    pub fn check_structure(&self) -> Result<()> {
        ensure_unique("step", self.steps.iter().map(|step| step.id))?;
        ensure_unique("question", self.questions.iter().map(|question| question.id))?;
        ensure_unique("group", self.groups.iter().map(|group| group.id))?;
        ensure_unique("display", self.displays.iter().map(|display| display.id))?;
        ensure_unique(
            "transition",
            self.transitions.iter().map(|transition| transition.id),
        )?;
        ensure_unique("control", self.controls.iter().map(|control| control.id))?;

        if let Some(step) = self.steps.iter().find(|step| step.form_id != self.form.id) {
            return Err(FormsError::InvalidDocument(format!(
                "step {} belongs to form {}, expected {}",
                step.id, step.form_id, self.form.id
            )));
        }

        for display in &self.displays {
            let Some(parent_id) = display.parent_id else {
                continue;
            };
            let parent = self
                .displays
                .iter()
                .find(|candidate| candidate.id == parent_id)
                .ok_or_else(|| {
                    FormsError::InvalidDocument(format!(
                        "display {} references missing parent {}",
                        display.id, parent_id
                    ))
                })?;
            if parent.step_id != display.step_id {
                return Err(FormsError::InvalidDocument(format!(
                    "display {} and its parent {} belong to different steps",
                    display.id, parent_id
                )));
            }
            if !parent.is_group() {
                return Err(FormsError::InvalidDocument(format!(
                    "display {} is nested under non-group display {}",
                    display.id, parent_id
                )));
            }
        }

        Ok(())
    }
}

fn ensure_unique(entity: &str, ids: impl Iterator<Item = u32>) -> Result<()> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if id == 0 {
            return Err(FormsError::InvalidDocument(format!(
                "{} identifiers must be non-zero",
                entity
            )));
        }
        if !seen.insert(id) {
            return Err(FormsError::InvalidDocument(format!(
                "duplicate {} identifier {}",
                entity, id
            )));
        }
    }
    Ok(())
}
