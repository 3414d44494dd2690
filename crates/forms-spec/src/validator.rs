//! Pluggable answer validators and the registry resolving them by name.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use regex::Regex;
use tracing::warn;

use crate::config::EngineConfig;
use crate::error::{FormsError, Result};
use crate::spec::{AnswerType, Control};

/// A named check comparing submitted values against a control's configured value.
pub trait Validator: Send + Sync {
    /// Stable identifier stored in controls.
    fn name(&self) -> &'static str;

    fn label(&self) -> &'static str;

    fn is_applicable_to(&self, answer_type: AnswerType) -> bool;

    /// Returns `true` when `values` satisfy the control. An empty slice never does.
    fn check(&self, control: &Control, values: &[String]) -> bool;

    /// Rejects configured values the validator can never match against.
    fn check_value(&self, _value: &str) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// Ordered set of validators; order drives the default choice per answer type.
#[derive(Clone, Default)]
pub struct ValidatorRegistry {
    validators: Vec<Arc<dyn Validator>>,
}

impl std::fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.validators.iter().map(|validator| validator.name()))
            .finish()
    }
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in validator.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for validator in builtin_validators() {
            registry.register(validator);
        }
        registry
    }

    /// Built-ins minus the ones the configuration disables.
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut registry = Self::new();
        for validator in builtin_validators() {
            if config.is_validator_enabled(validator.name()) {
                registry.register(validator);
            }
        }
        registry
    }

    /// Adds a validator; a validator with the same name is replaced in place.
    pub fn register(&mut self, validator: Arc<dyn Validator>) {
        match self
            .validators
            .iter()
            .position(|existing| existing.name() == validator.name())
        {
            Some(index) => self.validators[index] = validator,
            None => self.validators.push(validator),
        }
    }

    pub fn list_applicable(&self, answer_type: AnswerType) -> Vec<&dyn Validator> {
        self.validators
            .iter()
            .filter(|validator| validator.is_applicable_to(answer_type))
            .map(|validator| validator.as_ref())
            .collect()
    }

    pub fn default_for(&self, answer_type: AnswerType) -> Option<&dyn Validator> {
        self.validators
            .iter()
            .find(|validator| validator.is_applicable_to(answer_type))
            .map(|validator| validator.as_ref())
    }

    pub fn get(&self, name: &str) -> Result<&dyn Validator> {
        self.validators
            .iter()
            .find(|validator| validator.name() == name)
            .map(|validator| validator.as_ref())
            .ok_or_else(|| FormsError::not_found("validator", name))
    }

    /// Resolves `name` and ensures it applies to `answer_type`.
    pub fn resolve_for(
        &self,
        name: &str,
        answer_type: AnswerType,
    ) -> std::result::Result<&dyn Validator, String> {
        let validator = self
            .get(name)
            .map_err(|_| format!("validator '{}' is not registered", name))?;
        if validator.is_applicable_to(answer_type) {
            Ok(validator)
        } else {
            Err(format!(
                "validator '{}' does not apply to {} answers",
                name, answer_type
            ))
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.validators.iter().map(|validator| validator.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

fn builtin_validators() -> Vec<Arc<dyn Validator>> {
    vec![
        Arc::new(NotEmpty),
        Arc::new(Equals),
        Arc::new(NotEquals),
        Arc::new(Contains),
        Arc::new(Pattern::default()),
        Arc::new(NumberBound::GreaterThan),
        Arc::new(NumberBound::LessThan),
        Arc::new(MaxLength),
    ]
}

const TEXTUAL: [AnswerType; 2] = [AnswerType::Text, AnswerType::TextArea];
const CHOICES: [AnswerType; 3] = [AnswerType::Radio, AnswerType::Checkbox, AnswerType::Select];

fn non_blank(values: &[String]) -> impl Iterator<Item = &str> {
    values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

struct NotEmpty;

impl Validator for NotEmpty {
    fn name(&self) -> &'static str {
        "is_not_empty"
    }

    fn label(&self) -> &'static str {
        "Answer is not empty"
    }

    fn is_applicable_to(&self, answer_type: AnswerType) -> bool {
        answer_type != AnswerType::Comment
    }

    fn check(&self, _control: &Control, values: &[String]) -> bool {
        non_blank(values).next().is_some()
    }
}

struct Equals;

impl Validator for Equals {
    fn name(&self) -> &'static str {
        "equals"
    }

    fn label(&self) -> &'static str {
        "Answer equals value"
    }

    fn is_applicable_to(&self, answer_type: AnswerType) -> bool {
        TEXTUAL.contains(&answer_type)
            || CHOICES.contains(&answer_type)
            || matches!(answer_type, AnswerType::Number | AnswerType::Date)
    }

    fn check(&self, control: &Control, values: &[String]) -> bool {
        let expected = control.value.trim();
        non_blank(values).any(|value| value == expected)
    }
}

struct NotEquals;

impl Validator for NotEquals {
    fn name(&self) -> &'static str {
        "not_equals"
    }

    fn label(&self) -> &'static str {
        "Answer differs from value"
    }

    fn is_applicable_to(&self, answer_type: AnswerType) -> bool {
        Equals.is_applicable_to(answer_type)
    }

    fn check(&self, control: &Control, values: &[String]) -> bool {
        let expected = control.value.trim();
        let mut answered = non_blank(values).peekable();
        answered.peek().is_some() && answered.all(|value| value != expected)
    }
}

struct Contains;

impl Validator for Contains {
    fn name(&self) -> &'static str {
        "contains"
    }

    fn label(&self) -> &'static str {
        "Answer contains value"
    }

    fn is_applicable_to(&self, answer_type: AnswerType) -> bool {
        TEXTUAL.contains(&answer_type) || answer_type == AnswerType::Checkbox
    }

    fn check(&self, control: &Control, values: &[String]) -> bool {
        if control.value.is_empty() {
            return false;
        }
        non_blank(values).any(|value| value.contains(control.value.as_str()))
    }
}

/// Compiled expressions are kept by source text.
#[derive(Default)]
struct Pattern {
    compiled: RwLock<HashMap<String, Regex>>,
}

impl Pattern {
    fn compile(&self, source: &str) -> std::result::Result<Regex, regex::Error> {
        if let Some(regex) = self.compiled.read().get(source) {
            return Ok(regex.clone());
        }
        let regex = Regex::new(source)?;
        self.compiled
            .write()
            .insert(source.to_string(), regex.clone());
        Ok(regex)
    }
}

impl Validator for Pattern {
    fn name(&self) -> &'static str {
        "pattern"
    }

    fn label(&self) -> &'static str {
        "Answer matches regular expression"
    }

    fn is_applicable_to(&self, answer_type: AnswerType) -> bool {
        TEXTUAL.contains(&answer_type)
    }

    fn check(&self, control: &Control, values: &[String]) -> bool {
        match self.compile(&control.value) {
            Ok(regex) => non_blank(values).any(|value| regex.is_match(value)),
            Err(err) => {
                warn!(control_id = control.id, %err, "invalid pattern in control");
                false
            }
        }
    }

    fn check_value(&self, value: &str) -> std::result::Result<(), String> {
        Regex::new(value)
            .map(|_| ())
            .map_err(|err| format!("invalid regular expression: {}", err))
    }
}

enum NumberBound {
    GreaterThan,
    LessThan,
}

impl Validator for NumberBound {
    fn name(&self) -> &'static str {
        match self {
            NumberBound::GreaterThan => "greater_than",
            NumberBound::LessThan => "less_than",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            NumberBound::GreaterThan => "Number greater than value",
            NumberBound::LessThan => "Number less than value",
        }
    }

    fn is_applicable_to(&self, answer_type: AnswerType) -> bool {
        answer_type == AnswerType::Number
    }

    fn check(&self, control: &Control, values: &[String]) -> bool {
        let Ok(bound) = control.value.trim().parse::<f64>() else {
            return false;
        };
        let mut answered = non_blank(values).peekable();
        if answered.peek().is_none() {
            return false;
        }
        answered.all(|value| match value.parse::<f64>() {
            Ok(number) => match self {
                NumberBound::GreaterThan => number > bound,
                NumberBound::LessThan => number < bound,
            },
            Err(_) => false,
        })
    }

    fn check_value(&self, value: &str) -> std::result::Result<(), String> {
        match value.trim().parse::<f64>() {
            Ok(number) if number.is_finite() => Ok(()),
            _ => Err(format!("'{}' is not a finite number", value)),
        }
    }
}

struct MaxLength;

impl Validator for MaxLength {
    fn name(&self) -> &'static str {
        "max_length"
    }

    fn label(&self) -> &'static str {
        "Answer is at most N characters"
    }

    fn is_applicable_to(&self, answer_type: AnswerType) -> bool {
        TEXTUAL.contains(&answer_type)
    }

    fn check(&self, control: &Control, values: &[String]) -> bool {
        let Ok(limit) = control.value.trim().parse::<usize>() else {
            return false;
        };
        let mut answered = non_blank(values).peekable();
        answered.peek().is_some() && answered.all(|value| value.chars().count() <= limit)
    }

    fn check_value(&self, value: &str) -> std::result::Result<(), String> {
        value
            .trim()
            .parse::<usize>()
            .map(|_| ())
            .map_err(|_| format!("'{}' is not a character count", value))
    }
}
