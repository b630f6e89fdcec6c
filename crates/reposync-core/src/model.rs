use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One entry of the repository list: the unique name doubles as the
/// directory name under the repo root.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RepoDescriptor {
    pub name: String,
    pub url: String,
}

impl RepoDescriptor {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationMode {
    CloneOnly,
    UpdateOnly,
    #[default]
    CloneAndUpdate,
}

impl OperationMode {
    pub fn clones(&self) -> bool {
        matches!(self, OperationMode::CloneOnly | OperationMode::CloneAndUpdate)
    }

    pub fn updates(&self) -> bool {
        matches!(self, OperationMode::UpdateOnly | OperationMode::CloneAndUpdate)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationMode::CloneOnly => "clone-only",
            OperationMode::UpdateOnly => "update-only",
            OperationMode::CloneAndUpdate => "clone-and-update",
        }
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoAction {
    Cloned,
    FastForwarded,
    UpToDate,
    Skipped,
    Failed,
}

impl RepoAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoAction::Cloned => "cloned",
            RepoAction::FastForwarded => "fast_forwarded",
            RepoAction::UpToDate => "up_to_date",
            RepoAction::Skipped => "skipped",
            RepoAction::Failed => "failed",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum FailureKind {
    CloneFailed,
    StatusFailed,
    ShelveFailed,
    FetchFailed,
    FastForwardRejected,
    SubmoduleUpdateFailed,
    UnshelveFailed,
    Panicked,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::CloneFailed => "CloneFailed",
            FailureKind::StatusFailed => "StatusFailed",
            FailureKind::ShelveFailed => "ShelveFailed",
            FailureKind::FetchFailed => "FetchFailed",
            FailureKind::FastForwardRejected => "FastForwardRejected",
            FailureKind::SubmoduleUpdateFailed => "SubmoduleUpdateFailed",
            FailureKind::UnshelveFailed => "UnshelveFailed",
            FailureKind::Panicked => "Panicked",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one repository's operation. Produced once per descriptor.
#[derive(Clone, Debug, Serialize)]
pub struct JobResult {
    pub name: String,
    pub success: bool,
    pub action: RepoAction,
    pub failure: Option<FailureKind>,
    pub error_detail: Option<String>,
    pub warnings: Vec<String>,
    pub shelved: bool,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl JobResult {
    pub fn succeeded(name: impl Into<String>, action: RepoAction) -> Self {
        Self {
            name: name.into(),
            success: true,
            action,
            failure: None,
            error_detail: None,
            warnings: Vec::new(),
            shelved: false,
            duration: Duration::ZERO,
        }
    }

    pub fn failed(name: impl Into<String>, kind: FailureKind, detail: impl fmt::Display) -> Self {
        Self {
            name: name.into(),
            success: false,
            action: RepoAction::Failed,
            failure: Some(kind),
            error_detail: Some(format!("{kind}: {detail}")),
            warnings: Vec::new(),
            shelved: false,
            duration: Duration::ZERO,
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u128(value.as_millis())
    }
}
