//! Job lifecycle states
//!
//! `Idle -> Acquiring -> Inferring -> Encoding -> Done`, with `Failed`
//! reachable from every non-idle state. Both terminal states fall back
//! to `Idle` once their message has been sent.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    /// Waiting for a request (default state)
    #[default]
    Idle,
    /// Obtaining the inference session, downloading weights if needed
    Acquiring,
    /// Model is running
    Inferring,
    /// Stems are being encoded
    Encoding,
    Done,
    Failed,
}

impl JobState {
    pub fn is_idle(&self) -> bool {
        matches!(self, JobState::Idle)
    }

    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (Idle, Acquiring) => true,
            (Acquiring, Inferring) => true,
            (Inferring, Encoding) => true,
            (Encoding, Done) => true,
            (Acquiring | Inferring | Encoding, Failed) => true,
            (Done | Failed, Idle) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Idle => write!(f, "Idle"),
            JobState::Acquiring => write!(f, "Acquiring"),
            JobState::Inferring => write!(f, "Inferring"),
            JobState::Encoding => write!(f, "Encoding"),
            JobState::Done => write!(f, "Done"),
            JobState::Failed => write!(f, "Failed"),
        }
    }
}
