use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::QuestionId;

/// Submitted response values, keyed by question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Responses(BTreeMap<QuestionId, Vec<String>>);

impl Responses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, question_id: QuestionId) -> Option<&[String]> {
        self.0.get(&question_id).map(Vec::as_slice)
    }

    pub fn contains(&self, question_id: QuestionId) -> bool {
        self.0.contains_key(&question_id)
    }

    /// True when the question has at least one non-blank value.
    pub fn is_answered(&self, question_id: QuestionId) -> bool {
        self.get(question_id)
            .map(|values| values.iter().any(|value| !value.trim().is_empty()))
            .unwrap_or(false)
    }

    pub fn insert(&mut self, question_id: QuestionId, values: Vec<String>) {
        self.0.insert(question_id, values);
    }

    pub fn with(mut self, question_id: QuestionId, values: &[&str]) -> Self {
        self.insert(
            question_id,
            values.iter().map(|value| value.to_string()).collect(),
        );
        self
    }

    pub fn remove(&mut self, question_id: QuestionId) -> Option<Vec<String>> {
        self.0.remove(&question_id)
    }

    /// Overlays `other` on top of these responses.
    pub fn merge(&mut self, other: &Responses) {
        for (question_id, values) in &other.0 {
            self.0.insert(*question_id, values.clone());
        }
    }

    pub fn retain(&mut self, mut keep: impl FnMut(QuestionId) -> bool) {
        self.0.retain(|question_id, _| keep(*question_id));
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuestionId, &[String])> {
        self.0
            .iter()
            .map(|(question_id, values)| (*question_id, values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(QuestionId, Vec<String>)> for Responses {
    fn from_iter<T: IntoIterator<Item = (QuestionId, Vec<String>)>>(iter: T) -> Self {
        Responses(iter.into_iter().collect())
    }
}
