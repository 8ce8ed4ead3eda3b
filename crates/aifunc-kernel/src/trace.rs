//! Per-call record of the completion repair pipeline.
//!
//! A [`RepairTrace`] is built fresh for every call and handed back either in
//! the resolved result or inside [`crate::AiFunctionError::UnrecoverableFormat`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage that produced an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStage {
    StripFencing,
    DirectParse,
    HeuristicRepair,
    ModelRepair,
    Coerce,
}

impl RepairStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StripFencing => "strip_fencing",
            Self::DirectParse => "direct_parse",
            Self::HeuristicRepair => "heuristic_repair",
            Self::ModelRepair => "model_repair",
            Self::Coerce => "coerce",
        }
    }
}

impl fmt::Display for RepairStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pass of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairAttempt {
    pub stage: RepairStage,
    /// Candidate text fed into the stage
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl RepairAttempt {
    pub fn succeeded(stage: RepairStage, input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            stage,
            input: input.into(),
            output: Some(output.into()),
            failure: None,
        }
    }

    pub fn failed(stage: RepairStage, input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            stage,
            input: input.into(),
            output: None,
            failure: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Ordered list of attempts for a single call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepairTrace {
    attempts: Vec<RepairAttempt>,
}

impl RepairTrace {
    pub fn push(&mut self, attempt: RepairAttempt) {
        self.attempts.push(attempt);
    }

    pub fn attempts(&self) -> &[RepairAttempt] {
        &self.attempts
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Stages visited, in order, with duplicates collapsed.
    pub fn stages(&self) -> Vec<RepairStage> {
        let mut stages: Vec<RepairStage> = Vec::new();
        for attempt in &self.attempts {
            if stages.last() != Some(&attempt.stage) {
                stages.push(attempt.stage);
            }
        }
        stages
    }

    pub fn last_failure(&self) -> Option<&str> {
        self.attempts.iter().rev().find_map(|a| a.failure.as_deref())
    }
}

impl IntoIterator for RepairTrace {
    type Item = RepairAttempt;
    type IntoIter = std::vec::IntoIter<RepairAttempt>;

    fn into_iter(self) -> Self::IntoIter {
        self.attempts.into_iter()
    }
}
