#![allow(missing_docs)]

pub mod admin;
pub mod cascade;
pub mod condition;
pub mod config;
pub mod error;
pub mod flow;
pub mod render;
pub mod responses;
pub mod spec;
pub mod store;
pub mod validate;
pub mod validator;
pub mod visibility;

pub use admin::{ControlRequest, check_configuration, remove_control, remove_transition, save_control};
pub use cascade::{
    RemovalReport, remove_display_subtree, remove_display_subtree_within, remove_step,
    remove_step_within,
};
pub use condition::{ControlEvaluator, Evaluation};
pub use config::{CONFIG_ENV, DEAD_END_ENV, DeadEndPolicy, EngineConfig};
pub use error::{ConfigWarning, FormsError, Result, WarningCode};
pub use flow::{Advance, Resolution, Routing, StepRouter};
pub use render::{
    RenderNode, RenderPayload, RenderProgress, RenderStatus, build_render_payload, render_json_ui,
    render_text,
};
pub use responses::Responses;
pub use spec::{
    AnswerType, Composite, Control, ControlId, ControlKind, DisplayId, Entry, FormDisplay,
    FormDocument, FormId, FormInfo, Group, GroupId, Question, QuestionId, Step, StepId,
    Transition, TransitionId,
};
pub use store::{EntityReader, EntityStore, MemoryStore, Transaction};
pub use validate::{StepValidation, ValidationError, validate_step};
pub use validator::{Validator, ValidatorRegistry};
pub use visibility::{DisplayComposer, DisplayNode, VisibleTree, visible_questions};
