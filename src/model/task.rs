use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid priority: {0}")]
pub struct PriorityParseError(pub String);

impl FromStr for Priority {
    type Err = PriorityParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            _ => Err(PriorityParseError(value.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields accepted when creating a task. The owner is supplied separately.
#[derive(Clone, Debug, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Fields accepted on update. There is deliberately no owner field.
#[derive(Clone, Debug, Default)]
pub struct TaskChanges {
    pub title: String,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub due_date: Option<DateTime<Utc>>,
}

impl Task {
    #[must_use]
    pub fn create(owner_id: Uuid, new: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            title: new.title,
            description: new.description,
            completed: new.completed.unwrap_or(false),
            priority: new.priority.unwrap_or_default(),
            due_date: new.due_date,
            created_at: now,
        }
    }

    /// Title and description are replaced; the remaining fields only change when present.
    pub fn apply(&mut self, changes: TaskChanges) {
        self.title = changes.title;
        self.description = changes.description;
        if let Some(completed) = changes.completed {
            self.completed = completed;
        }
        if let Some(priority) = changes.priority {
            self.priority = priority;
        }
        if let Some(due_date) = changes.due_date {
            self.due_date = Some(due_date);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn create_applies_defaults() {
        let owner = Uuid::new_v4();
        let now = Utc::now();
        let task = Task::create(
            owner,
            NewTask {
                title: "Write report".to_string(),
                ..NewTask::default()
            },
            now,
        );
        assert_eq!(task.owner_id, owner);
        assert!(!task.completed);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.created_at, now);
        assert!(task.due_date.is_none());
    }

    #[test]
    fn apply_keeps_owner_and_optional_fields() {
        let owner = Uuid::new_v4();
        let now = Utc::now();
        let due = now + Duration::days(2);
        let mut task = Task::create(
            owner,
            NewTask {
                title: "Old".to_string(),
                description: Some("old description".to_string()),
                priority: Some(Priority::High),
                due_date: Some(due),
                ..NewTask::default()
            },
            now,
        );

        task.apply(TaskChanges {
            title: "New".to_string(),
            description: None,
            completed: Some(true),
            priority: None,
            due_date: None,
        });

        assert_eq!(task.owner_id, owner);
        assert_eq!(task.title, "New");
        assert!(task.description.is_none());
        assert!(task.completed);
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.due_date, Some(due));
    }

    #[test]
    fn priority_round_trips_through_text() {
        for priority in [Priority::Low, Priority::Medium, Priority::High] {
            assert_eq!(priority.as_str().parse::<Priority>(), Ok(priority));
        }
        assert!("urgent".parse::<Priority>().is_err());
    }
}
