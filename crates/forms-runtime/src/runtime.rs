//! Typed submission runtime over an entity store.

use serde::Serialize;
use tracing::{debug, info};

use forms_spec::{
    ConfigWarning, ControlEvaluator, DisplayComposer, DisplayId, DisplayNode, EngineConfig,
    EntityStore, FormDocument, FormId, FormInfo, MemoryStore, RenderPayload, Responses, Result,
    Routing, Step, StepId, StepRouter, StepValidation, TransitionId, ValidatorRegistry,
    VisibleTree, build_render_payload, validate_step,
};

/// A step as shown to the respondent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepView {
    pub form_id: FormId,
    pub step: Step,
    pub nodes: Vec<DisplayNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hidden: Vec<DisplayId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ConfigWarning>,
}

/// Result of submitting one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// A visible answer failed validation; nothing was saved.
    Rejected { validation: StepValidation },
    Advanced {
        transition_id: TransitionId,
        next: StepView,
    },
    Completed,
}

/// Bundles a store with the validator registry and engine configuration.
pub struct FormRuntime<S> {
    form: FormInfo,
    store: S,
    registry: ValidatorRegistry,
    config: EngineConfig,
}

impl FormRuntime<MemoryStore> {
    pub fn from_document(document: FormDocument, config: EngineConfig) -> Result<Self> {
        let form = document.form.clone();
        let store = MemoryStore::from_document(document)?;
        Ok(Self::new(form, store, config))
    }

    pub fn to_document(&self) -> FormDocument {
        self.store.to_document()
    }
}

impl<S: EntityStore> FormRuntime<S> {
    pub fn new(form: FormInfo, store: S, config: EngineConfig) -> Self {
        let registry = ValidatorRegistry::from_config(&config);
        Self {
            form,
            store,
            registry,
            config,
        }
    }

    pub fn with_registry(mut self, registry: ValidatorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn form(&self) -> &FormInfo {
        &self.form
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &ValidatorRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn evaluator(&self) -> ControlEvaluator<'_> {
        ControlEvaluator::new(&self.store, &self.registry)
    }

    fn router(&self) -> StepRouter<'_> {
        StepRouter::new(self.evaluator(), self.config.dead_end)
    }

    /// Saved responses overlaid with the submitted ones.
    pub fn responses_with(&self, submitted: &Responses) -> Result<Responses> {
        let mut responses = self.store.load_all_responses()?;
        responses.merge(submitted);
        Ok(responses)
    }

    pub fn start(&self) -> Result<StepView> {
        let step = self.router().first_step(self.form.id)?;
        let responses = self.store.load_all_responses()?;
        debug!(form_id = self.form.id, step_id = step.id, "starting form");
        self.view(step, &responses)
    }

    pub fn render(&self, step_id: StepId, submitted: &Responses) -> Result<StepView> {
        let step = self.store.load_step(step_id)?;
        let responses = self.responses_with(submitted)?;
        self.view(step, &responses)
    }

    /// Presentation payload for a step; `validate` also attaches answer errors.
    pub fn payload(
        &self,
        step_id: StepId,
        submitted: &Responses,
        validate: bool,
    ) -> Result<RenderPayload> {
        let step = self.store.load_step(step_id)?;
        let responses = self.responses_with(submitted)?;
        let tree = self.compose(&step, &responses)?;
        let validation =
            validate.then(|| validate_step(&self.evaluator(), &tree.nodes, &responses));
        Ok(build_render_payload(
            &self.store,
            &self.form,
            &step,
            &tree,
            &responses,
            validation.as_ref(),
        ))
    }

    /// Where the responses lead from `step_id`, without saving anything.
    pub fn next_step(&self, step_id: StepId, submitted: &Responses) -> Result<forms_spec::Advance> {
        let responses = self.responses_with(submitted)?;
        self.router().advance(step_id, &responses)
    }

    /// Validates, saves and routes a step submission.
    ///
    /// Answers to questions hidden on this step are dropped before routing and
    /// removed from the store. Dead ends surface as `FormsError::DeadEndStep`.
    pub fn submit(&self, step_id: StepId, submitted: &Responses) -> Result<SubmitOutcome> {
        let step = self.store.load_step(step_id)?;
        let mut responses = self.responses_with(submitted)?;
        let tree = self.compose(&step, &responses)?;

        let validation = validate_step(&self.evaluator(), &tree.nodes, &responses);
        if !validation.valid {
            info!(step_id, errors = validation.errors.len(), "submission rejected");
            return Ok(SubmitOutcome::Rejected { validation });
        }

        let hidden = tree.hidden_questions();
        responses.retain(|question_id| !hidden.contains(&question_id));
        let advance = self.router().advance(step_id, &responses)?;

        let visible = tree.visible_questions();
        self.store.run_in_transaction(&mut |tx| {
            for question_id in &hidden {
                tx.delete_responses(*question_id)?;
            }
            for question_id in &visible {
                if let Some(values) = responses.get(*question_id) {
                    tx.save_responses(*question_id, values.to_vec())?;
                }
            }
            Ok(())
        })?;

        match advance.routing {
            Routing::Next {
                step,
                transition_id,
            } => {
                info!(from = step_id, to = step.id, transition_id, "step submitted");
                let mut next = self.view(step, &responses)?;
                next.warnings.extend(advance.warnings);
                Ok(SubmitOutcome::Advanced {
                    transition_id,
                    next,
                })
            }
            Routing::Finished => {
                info!(form_id = self.form.id, step_id, "form completed");
                Ok(SubmitOutcome::Completed)
            }
        }
    }

    /// Like [`submit`](Self::submit), but rejected answers come back as
    /// `FormsError::ValidationFailure`.
    pub fn submit_strict(&self, step_id: StepId, submitted: &Responses) -> Result<SubmitOutcome> {
        match self.submit(step_id, submitted)? {
            SubmitOutcome::Rejected { validation } => validation
                .into_result(step_id)
                .map(|validation| SubmitOutcome::Rejected { validation }),
            outcome => Ok(outcome),
        }
    }

    fn compose(&self, step: &Step, responses: &Responses) -> Result<VisibleTree> {
        let displays = self.store.load_display_tree(step.id)?;
        Ok(DisplayComposer::new(self.evaluator()).compose(step, &displays, responses))
    }

    fn view(&self, step: Step, responses: &Responses) -> Result<StepView> {
        let tree = self.compose(&step, responses)?;
        Ok(StepView {
            form_id: self.form.id,
            step,
            hidden: tree.hidden.iter().map(|display| display.id).collect(),
            nodes: tree.nodes,
            warnings: tree.warnings,
        })
    }
}
