//! Tenant-scoped project repository.
//!
//! All reads and writes go through scoped contexts, so row-level security
//! re-verifies the tenant boundary on every statement. The repository adds
//! the second half of the posture: identifiers outside the caller's
//! company behave exactly like identifiers that do not exist, and read
//! surfaces degrade to empty for scopes with no user while writes fail
//! loudly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

use crate::bus::{ChangeBus, ProjectEventKind};
use crate::context::Executor;
use crate::db::Database;
use crate::error::{
    ContextError, ResourceError, StorageError, StorageResult, ValidationError,
};
use crate::scope::{CompanyId, ProjectId, Scope};

/// Minimum length of a project name, in characters.
pub const MIN_NAME_LENGTH: usize = 2;

/// Maximum length of a project name, in characters.
pub const MAX_NAME_LENGTH: usize = 100;

const PROJECT_COLUMNS: &str = "id, company_id, name, description, created_at, updated_at";

/// A project row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// The project's identifier.
    pub id: ProjectId,
    /// The owning company. Stamped from the creating scope, never from
    /// client input.
    pub company_id: CompanyId,
    /// The project's name.
    pub name: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Project {
    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            company_id: row.get("company_id"),
            name: row.get("name"),
            description: row.get("description"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

/// Input for creating a project.
///
/// There is deliberately no company field: the owning company always comes
/// from the scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectDraft {
    /// The project name. Trimmed before validation and storage.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}

impl ProjectDraft {
    /// Creates a draft with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Partial update for a project.
///
/// `None` leaves a field untouched; `Some(None)` on the description
/// clears it.
#[derive(Debug, Clone, Default)]
pub struct ProjectPatch {
    /// New name, if changing.
    pub name: Option<String>,
    /// New description state, if changing.
    pub description: Option<Option<String>>,
}

impl ProjectPatch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Changes the name.
    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Replaces the description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(Some(description.into()));
        self
    }

    /// Clears the description.
    pub fn clear_description(mut self) -> Self {
        self.description = Some(None);
        self
    }
}

/// Aggregate project figures across all companies.
///
/// Produced by a single query so the total and the per-company breakdown
/// are consistent with each other even under concurrent writers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStats {
    /// Total number of projects across all companies.
    pub total_projects: i64,
    /// Per-company project counts, ordered by company name.
    pub companies: Vec<CompanyProjects>,
}

/// Project count for one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProjects {
    /// The company's identifier.
    pub company_id: CompanyId,
    /// The company's name.
    pub company_name: String,
    /// Number of projects the company owns.
    pub projects: i64,
}

/// Tenant-scoped repository over the projects table.
#[derive(Debug, Clone)]
pub struct Projects {
    executor: Executor,
    bus: ChangeBus,
}

impl Projects {
    /// Creates the repository over a pool handle and change bus.
    pub fn new(db: Database, bus: ChangeBus) -> Self {
        Self {
            executor: Executor::new(db),
            bus,
        }
    }

    /// Lists the projects visible to the scope, oldest first.
    ///
    /// A scope with no user yields an empty list; context setup failures
    /// still propagate.
    pub async fn list(&self, scope: &Scope) -> StorageResult<Vec<Project>> {
        let result = self
            .executor
            .run_with_user_context(scope, |session| async move {
                let rows = session
                    .query(
                        &format!(
                            "SELECT {} FROM projects ORDER BY created_at, id",
                            PROJECT_COLUMNS
                        ),
                        &[],
                    )
                    .await?;
                Ok(rows.iter().map(Project::from_row).collect())
            })
            .await;

        match result {
            Err(StorageError::Context(ContextError::NoUserInScope)) => Ok(Vec::new()),
            other => other,
        }
    }

    /// Fetches a project by id.
    ///
    /// Returns `None` both when the id does not exist and when it belongs
    /// to another company; the two cases are indistinguishable. A scope
    /// with no user also resolves to `None`.
    pub async fn get(&self, scope: &Scope, id: ProjectId) -> StorageResult<Option<Project>> {
        let result = self
            .executor
            .run_with_user_context(scope, |session| async move {
                let row = session
                    .query_opt(
                        &format!("SELECT {} FROM projects WHERE id = $1", PROJECT_COLUMNS),
                        &[&id],
                    )
                    .await?;
                Ok(row.as_ref().map(Project::from_row))
            })
            .await;

        match result {
            Err(StorageError::Context(ContextError::NoUserInScope)) => Ok(None),
            other => other,
        }
    }

    /// Fetches a project by id, failing with [`ResourceError::NotFound`]
    /// when it is absent or not visible.
    pub async fn get_or_fail(&self, scope: &Scope, id: ProjectId) -> StorageResult<Project> {
        self.get(scope, id)
            .await?
            .ok_or_else(|| ResourceError::NotFound { id }.into())
    }

    /// Creates a project owned by the scope's company.
    ///
    /// Requires a resolvable company in scope; the owning key is stamped
    /// from the scope. Publishes a created event after the transaction
    /// commits.
    pub async fn create(&self, scope: &Scope, draft: ProjectDraft) -> StorageResult<Project> {
        let company_id = scope.company_id().ok_or(ContextError::NoCompanyInScope)?;
        let name = draft.name.trim().to_string();
        validate_name(&name)?;
        let description = draft.description;

        let project = self
            .executor
            .run_with_user_context(scope, |session| async move {
                let id = ProjectId::generate();
                let now = Utc::now();
                let row = session
                    .query_one(
                        &format!(
                            "INSERT INTO projects (id, company_id, name, description, created_at, updated_at)
                             VALUES ($1, $2, $3, $4, $5, $6)
                             RETURNING {}",
                            PROJECT_COLUMNS
                        ),
                        &[&id, &company_id, &name, &description, &now, &now],
                    )
                    .await?;
                Ok(Project::from_row(&row))
            })
            .await?;

        tracing::debug!(project = %project.id, company = %project.company_id, "project created");
        self.bus.publish(ProjectEventKind::Created, &project);
        Ok(project)
    }

    /// Applies a patch to a project.
    ///
    /// The row is re-verified by row-level security on the statement
    /// itself: a cross-company id updates nothing and reports
    /// [`ResourceError::NotFound`]. Publishes an updated event after
    /// commit.
    pub async fn update(
        &self,
        scope: &Scope,
        id: ProjectId,
        patch: ProjectPatch,
    ) -> StorageResult<Project> {
        let name = match patch.name {
            Some(name) => {
                let trimmed = name.trim().to_string();
                validate_name(&trimmed)?;
                Some(trimmed)
            }
            None => None,
        };
        let (set_description, description) = match patch.description {
            Some(value) => (true, value),
            None => (false, None),
        };

        let project = self
            .executor
            .run_with_user_context(scope, |session| async move {
                let now = Utc::now();
                let row = session
                    .query_opt(
                        &format!(
                            "UPDATE projects
                             SET name = COALESCE($2, name),
                                 description = CASE WHEN $3 THEN $4 ELSE description END,
                                 updated_at = $5
                             WHERE id = $1
                             RETURNING {}",
                            PROJECT_COLUMNS
                        ),
                        &[&id, &name, &set_description, &description, &now],
                    )
                    .await?;
                row.as_ref()
                    .map(Project::from_row)
                    .ok_or_else(|| ResourceError::NotFound { id }.into())
            })
            .await?;

        tracing::debug!(project = %project.id, company = %project.company_id, "project updated");
        self.bus.publish(ProjectEventKind::Updated, &project);
        Ok(project)
    }

    /// Deletes a project.
    ///
    /// Cross-company ids delete nothing and report
    /// [`ResourceError::NotFound`]. Publishes a deleted event carrying the
    /// removed row after commit.
    pub async fn delete(&self, scope: &Scope, id: ProjectId) -> StorageResult<()> {
        let project = self
            .executor
            .run_with_user_context(scope, |session| async move {
                let row = session
                    .query_opt(
                        &format!(
                            "DELETE FROM projects WHERE id = $1 RETURNING {}",
                            PROJECT_COLUMNS
                        ),
                        &[&id],
                    )
                    .await?;
                row.as_ref()
                    .map(Project::from_row)
                    .ok_or_else(|| ResourceError::NotFound { id }.into())
            })
            .await?;

        tracing::debug!(project = %project.id, company = %project.company_id, "project deleted");
        self.bus.publish(ProjectEventKind::Deleted, &project);
        Ok(())
    }

    /// Counts the projects visible to the scope.
    ///
    /// A scope with no user counts zero; context setup failures still
    /// propagate.
    pub async fn count(&self, scope: &Scope) -> StorageResult<i64> {
        let result = self
            .executor
            .run_with_user_context(scope, |session| async move {
                let row = session.query_one("SELECT COUNT(*) FROM projects", &[]).await?;
                Ok(row.get::<_, i64>(0))
            })
            .await;

        match result {
            Err(StorageError::Context(ContextError::NoUserInScope)) => Ok(0),
            other => other,
        }
    }

    /// Counts all projects across companies. Administrative.
    pub async fn count_all(&self) -> StorageResult<i64> {
        self.executor
            .run_with_admin_context(|session| async move {
                let row = session.query_one("SELECT COUNT(*) FROM projects", &[]).await?;
                Ok(row.get::<_, i64>(0))
            })
            .await
    }

    /// Counts one company's projects without entering its scope.
    /// Administrative.
    pub async fn count_for_company(&self, company_id: CompanyId) -> StorageResult<i64> {
        self.executor
            .run_with_admin_context(|session| async move {
                let row = session
                    .query_one(
                        "SELECT COUNT(*) FROM projects WHERE company_id = $1",
                        &[&company_id],
                    )
                    .await?;
                Ok(row.get::<_, i64>(0))
            })
            .await
    }

    /// Collects per-company project counts in one snapshot.
    /// Administrative.
    pub async fn stats(&self) -> StorageResult<SystemStats> {
        self.executor
            .run_with_admin_context(|session| async move {
                let rows = session
                    .query(
                        "SELECT c.id, c.name, COUNT(p.id) AS projects
                         FROM companies c
                         LEFT JOIN projects p ON p.company_id = c.id
                         GROUP BY c.id, c.name
                         ORDER BY c.name, c.id",
                        &[],
                    )
                    .await?;

                let companies: Vec<CompanyProjects> = rows
                    .iter()
                    .map(|row| CompanyProjects {
                        company_id: row.get("id"),
                        company_name: row.get("name"),
                        projects: row.get("projects"),
                    })
                    .collect();
                let total_projects = companies.iter().map(|c| c.projects).sum();

                Ok(SystemStats {
                    total_projects,
                    companies,
                })
            })
            .await
    }
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::NameRequired);
    }
    let length = name.chars().count();
    if !(MIN_NAME_LENGTH..=MAX_NAME_LENGTH).contains(&length) {
        return Err(ValidationError::NameLength {
            length,
            min: MIN_NAME_LENGTH,
            max: MAX_NAME_LENGTH,
        });
    }
    Ok(())
}
