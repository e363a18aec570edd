use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A user-facing message produced by the orchestrator.
/// `job_id` is set when the notice concerns a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub level: NoticeLevel,
    pub job_id: Option<Uuid>,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, None, message)
    }

    pub fn warning(job_id: Option<Uuid>, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, job_id, message)
    }

    pub fn error(job_id: Option<Uuid>, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, job_id, message)
    }

    fn new(level: NoticeLevel, job_id: Option<Uuid>, message: impl Into<String>) -> Self {
        Self {
            level,
            job_id,
            message: message.into(),
        }
    }
}

impl Display for Notice {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let level = match self.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        write!(f, "[{}] {}", level, self.message)
    }
}
