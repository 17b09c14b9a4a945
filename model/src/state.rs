// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Per-request lifecycle states, as recorded by the control node's
//! submission store.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    New,
    Staged,
    Building,
    Built,
    Queued,
    Running,
    Packaged,
    UploadQueued,
    Uploading,
    Done,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::New => "NEW",
            JobState::Staged => "STAGED",
            JobState::Building => "BUILDING",
            JobState::Built => "BUILT",
            JobState::Queued => "QUEUED",
            JobState::Running => "RUNNING",
            JobState::Packaged => "PACKAGED",
            JobState::UploadQueued => "UPLOAD_QUEUED",
            JobState::Uploading => "UPLOADING",
            JobState::Done => "DONE",
            JobState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownState(pub String);

impl fmt::Display for UnknownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown job state '{}'", self.0)
    }
}

impl std::error::Error for UnknownState {}

impl FromStr for JobState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(JobState::New),
            "STAGED" => Ok(JobState::Staged),
            "BUILDING" => Ok(JobState::Building),
            "BUILT" => Ok(JobState::Built),
            "QUEUED" => Ok(JobState::Queued),
            "RUNNING" => Ok(JobState::Running),
            "PACKAGED" => Ok(JobState::Packaged),
            "UPLOAD_QUEUED" => Ok(JobState::UploadQueued),
            "UPLOADING" => Ok(JobState::Uploading),
            "DONE" => Ok(JobState::Done),
            "FAILED" => Ok(JobState::Failed),
            other => Err(UnknownState(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_strings() {
        for state in [
            JobState::New,
            JobState::Staged,
            JobState::Building,
            JobState::Built,
            JobState::Queued,
            JobState::Running,
            JobState::Packaged,
            JobState::UploadQueued,
            JobState::Uploading,
            JobState::Done,
            JobState::Failed,
        ] {
            assert_eq!(state.as_str().parse::<JobState>().unwrap(), state);
        }
    }

    #[test]
    fn unknown_state_is_an_error() {
        let err = "SOMETHING".parse::<JobState>().unwrap_err();
        assert_eq!(err, UnknownState("SOMETHING".to_string()));
    }
}
