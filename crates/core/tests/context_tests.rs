//! Scoped access context integration tests.
//!
//! These tests verify context establishment end to end against a real
//! PostgreSQL instance: session parameters, principal switching,
//! transaction-local cleanup, and the repository behavior that rides on
//! them. Requires Docker for testcontainers.
//!
//! Run with: `cargo test -p palisade-core --test context_tests`

mod common;

use uuid::Uuid;

use palisade_core::bus::{ChangeBus, ProjectEventKind};
use palisade_core::context::Executor;
use palisade_core::error::{ContextError, ResourceError, StorageError, ValidationError};
use palisade_core::identity::{Directory, ScopeSource};
use palisade_core::projects::{ProjectDraft, ProjectPatch, Projects};
use palisade_core::scope::{ProjectId, Scope, UserId};

// ============================================================================
// Session Parameter Tests
// ============================================================================

/// The executor materializes the scope as transaction-local parameters and
/// switches to the role's principal.
#[tokio::test]
async fn context_session_parameters_match_scope() {
    let db = common::connect().await;
    let directory = Directory::new(db.clone());
    let fixture = common::provision_company(&directory, "paramtest").await;
    let scope = fixture.member_scope();

    let executor = Executor::new(db);
    let (user_id, company_id, role, principal) = executor
        .run_with_user_context(&scope, |session| async move {
            let row = session
                .query_one(
                    "SELECT palisade_current_user_id(), palisade_current_company_id(), \
                     current_setting('app.current_user_role'), current_user::text",
                    &[],
                )
                .await?;
            Ok((
                row.get::<_, Option<Uuid>>(0),
                row.get::<_, Option<Uuid>>(1),
                row.get::<_, String>(2),
                row.get::<_, String>(3),
            ))
        })
        .await
        .unwrap();

    assert_eq!(user_id, Some(fixture.member.id.as_uuid()));
    assert_eq!(company_id, Some(fixture.company.id.as_uuid()));
    assert_eq!(role, "user");
    assert_eq!(principal, "palisade_user");
}

/// Session parameters are transaction-local: a connection returned to the
/// pool carries none of them.
#[tokio::test]
async fn context_parameters_do_not_leak_after_commit() {
    let db = common::connect().await;
    let directory = Directory::new(db.clone());
    let fixture = common::provision_company(&directory, "leaktest").await;

    let executor = Executor::new(db.clone());
    executor
        .run_with_user_context(&fixture.member_scope(), |session| async move {
            session.query_one("SELECT 1", &[]).await?;
            Ok(())
        })
        .await
        .unwrap();

    // Raw pooled connection, outside any scoped transaction.
    let client = db.client().await.unwrap();
    let row = client
        .query_one(
            "SELECT palisade_current_user_id(), palisade_current_company_id(), \
             current_setting('app.current_user_role', true), current_user::text",
            &[],
        )
        .await
        .unwrap();

    assert!(row.get::<_, Option<Uuid>>(0).is_none());
    assert!(row.get::<_, Option<Uuid>>(1).is_none());
    assert!(row.get::<_, Option<String>>(2).unwrap_or_default().is_empty());
    assert_eq!(row.get::<_, String>(3), "postgres");
}

/// A role value outside the known set fails context setup rather than
/// silently downgrading or defaulting to admin.
#[tokio::test]
async fn context_unknown_role_fails_setup() {
    let db = common::connect().await;
    let directory = Directory::new(db.clone());
    let fixture = common::provision_company(&directory, "roletest").await;

    // A row with an unmapped role can only exist through external writes.
    let user_id = Uuid::new_v4();
    let email = format!("intern-{}@roletest.test", common::short_suffix());
    let client = db.client().await.unwrap();
    client
        .execute(
            "INSERT INTO users (id, email, role, company_id) VALUES ($1, $2, $3, $4)",
            &[&user_id, &email, &"manager", &fixture.company.id],
        )
        .await
        .unwrap();

    let scope = directory
        .scope_for_user(UserId::new(user_id))
        .await
        .unwrap()
        .expect("directly inserted user should resolve");

    let projects = Projects::new(db, ChangeBus::new());
    match projects.list(&scope).await {
        Err(StorageError::Context(ContextError::UnknownRole { role })) => {
            assert_eq!(role, "manager");
        }
        other => panic!("expected UnknownRole, got {:?}", other),
    }
}

// ============================================================================
// Scope Resolution Tests
// ============================================================================

/// The directory resolves a stored user into a complete scope.
#[tokio::test]
async fn context_directory_resolves_scope() {
    let db = common::connect().await;
    let directory = Directory::new(db);
    let fixture = common::provision_company(&directory, "scopetest").await;

    let scope = directory
        .scope_for_user(fixture.member.id)
        .await
        .unwrap()
        .expect("provisioned user should resolve");

    let user = scope.user().expect("scope should carry the user");
    assert_eq!(user.id, fixture.member.id);
    assert_eq!(user.role, "user");
    assert_eq!(user.company_id, fixture.company.id);

    let company = scope.company().expect("scope should carry the company");
    assert_eq!(company.id, fixture.company.id);
    assert_eq!(company.name, fixture.company.name);
    assert_eq!(scope.company_id(), Some(fixture.company.id));

    let missing = directory.scope_for_user(UserId::generate()).await.unwrap();
    assert!(missing.is_none());
}

/// Scopes without a user degrade reads to empty and reject writes.
#[tokio::test]
async fn context_anonymous_scope_degrades_reads_and_blocks_writes() {
    let db = common::connect().await;
    let projects = Projects::new(db, ChangeBus::new());
    let scope = Scope::anonymous();

    assert!(projects.list(&scope).await.unwrap().is_empty());
    assert_eq!(projects.count(&scope).await.unwrap(), 0);
    assert!(
        projects
            .get(&scope, ProjectId::generate())
            .await
            .unwrap()
            .is_none()
    );

    let create = projects.create(&scope, ProjectDraft::new("Skunkworks")).await;
    assert!(matches!(
        create,
        Err(StorageError::Context(ContextError::NoCompanyInScope))
    ));

    let update = projects
        .update(&scope, ProjectId::generate(), ProjectPatch::new().rename("X1"))
        .await;
    assert!(matches!(
        update,
        Err(StorageError::Context(ContextError::NoUserInScope))
    ));

    let delete = projects.delete(&scope, ProjectId::generate()).await;
    assert!(matches!(
        delete,
        Err(StorageError::Context(ContextError::NoUserInScope))
    ));
}

// ============================================================================
// Repository Round-Trip Tests
// ============================================================================

/// Create stamps the owning company from the scope and the result reads
/// back identically.
#[tokio::test]
async fn context_create_stamps_company_and_roundtrips() {
    let db = common::connect().await;
    let directory = Directory::new(db.clone());
    let fixture = common::provision_company(&directory, "crudtest").await;
    let scope = fixture.member_scope();
    let projects = Projects::new(db, ChangeBus::new());

    let created = projects
        .create(&scope, ProjectDraft::new("  Orbital Launch  "))
        .await
        .unwrap();

    assert_eq!(created.company_id, fixture.company.id);
    assert_eq!(created.name, "Orbital Launch");
    assert!(created.description.is_none());

    let fetched = projects.get(&scope, created.id).await.unwrap();
    assert_eq!(fetched, Some(created.clone()));

    let listed = projects.list(&scope).await.unwrap();
    assert_eq!(listed, vec![created]);
}

/// Patch fields apply independently: untouched fields survive, cleared
/// fields go away.
#[tokio::test]
async fn context_update_applies_patch_fields_independently() {
    let db = common::connect().await;
    let directory = Directory::new(db.clone());
    let fixture = common::provision_company(&directory, "patchtest").await;
    let scope = fixture.member_scope();
    let projects = Projects::new(db, ChangeBus::new());

    let created = projects
        .create(
            &scope,
            ProjectDraft::new("Relay").with_description("First pass"),
        )
        .await
        .unwrap();

    let renamed = projects
        .update(&scope, created.id, ProjectPatch::new().rename("Relay II"))
        .await
        .unwrap();
    assert_eq!(renamed.name, "Relay II");
    assert_eq!(renamed.description.as_deref(), Some("First pass"));
    assert!(renamed.updated_at >= created.updated_at);

    let cleared = projects
        .update(&scope, created.id, ProjectPatch::new().clear_description())
        .await
        .unwrap();
    assert_eq!(cleared.name, "Relay II");
    assert!(cleared.description.is_none());

    let described = projects
        .update(&scope, created.id, ProjectPatch::new().describe("Second pass"))
        .await
        .unwrap();
    assert_eq!(described.description.as_deref(), Some("Second pass"));

    let fetched = projects.get(&scope, created.id).await.unwrap().unwrap();
    assert_eq!(fetched, described);
}

/// Deleting removes the row; subsequent reads see nothing.
#[tokio::test]
async fn context_delete_then_get_absent() {
    let db = common::connect().await;
    let directory = Directory::new(db.clone());
    let fixture = common::provision_company(&directory, "deltest").await;
    let scope = fixture.member_scope();
    let projects = Projects::new(db, ChangeBus::new());

    let created = projects
        .create(&scope, ProjectDraft::new("Ephemeral"))
        .await
        .unwrap();
    projects.delete(&scope, created.id).await.unwrap();

    assert!(projects.get(&scope, created.id).await.unwrap().is_none());
    let missing = projects.get_or_fail(&scope, created.id).await;
    assert!(matches!(
        missing,
        Err(StorageError::Resource(ResourceError::NotFound { id })) if id == created.id
    ));

    let again = projects.delete(&scope, created.id).await;
    assert!(matches!(
        again,
        Err(StorageError::Resource(ResourceError::NotFound { .. }))
    ));
}

/// Validation failures never reach storage.
#[tokio::test]
async fn context_validation_rejects_bad_names() {
    let db = common::connect().await;
    let directory = Directory::new(db.clone());
    let fixture = common::provision_company(&directory, "valtest").await;
    let scope = fixture.member_scope();
    let projects = Projects::new(db, ChangeBus::new());

    let empty = projects.create(&scope, ProjectDraft::new("   ")).await;
    assert!(matches!(
        empty,
        Err(StorageError::Validation(ValidationError::NameRequired))
    ));

    let short = projects.create(&scope, ProjectDraft::new("x")).await;
    assert!(matches!(
        short,
        Err(StorageError::Validation(ValidationError::NameLength {
            length: 1,
            ..
        }))
    ));

    let long = projects.create(&scope, ProjectDraft::new("x".repeat(101))).await;
    assert!(matches!(
        long,
        Err(StorageError::Validation(ValidationError::NameLength {
            length: 101,
            ..
        }))
    ));

    let created = projects
        .create(&scope, ProjectDraft::new("Valid"))
        .await
        .unwrap();
    let renamed = projects
        .update(&scope, created.id, ProjectPatch::new().rename(" "))
        .await;
    assert!(matches!(
        renamed,
        Err(StorageError::Validation(ValidationError::NameRequired))
    ));

    // Only the valid create touched storage.
    assert_eq!(projects.count(&scope).await.unwrap(), 1);
}

// ============================================================================
// Change Bus Tests
// ============================================================================

/// Mutations publish to the owning company's channel only, after commit.
#[tokio::test]
async fn context_bus_delivers_company_events() {
    let db = common::connect().await;
    let directory = Directory::new(db.clone());
    let fixture_a = common::provision_company(&directory, "busalpha").await;
    let fixture_b = common::provision_company(&directory, "busbeta").await;

    let bus = ChangeBus::new();
    let projects = Projects::new(db, bus.clone());
    let mut events_a = bus.subscribe(&fixture_a.member_scope()).unwrap();

    let created = projects
        .create(&fixture_a.member_scope(), ProjectDraft::new("Beacon"))
        .await
        .unwrap();
    let event = events_a.try_recv().expect("created event should be delivered");
    assert_eq!(event.kind, ProjectEventKind::Created);
    assert_eq!(event.project, created);

    projects
        .update(
            &fixture_a.member_scope(),
            created.id,
            ProjectPatch::new().rename("Beacon II"),
        )
        .await
        .unwrap();
    let event = events_a.try_recv().expect("updated event should be delivered");
    assert_eq!(event.kind, ProjectEventKind::Updated);
    assert_eq!(event.project.name, "Beacon II");

    // Another company's mutation never lands on this channel.
    projects
        .create(&fixture_b.member_scope(), ProjectDraft::new("Quiet"))
        .await
        .unwrap();
    assert!(events_a.try_recv().is_err());

    projects
        .delete(&fixture_a.member_scope(), created.id)
        .await
        .unwrap();
    let event = events_a.try_recv().expect("deleted event should be delivered");
    assert_eq!(event.kind, ProjectEventKind::Deleted);
    assert_eq!(event.project.id, created.id);

    // Subscribing requires a resolvable company.
    assert!(matches!(
        bus.subscribe(&Scope::anonymous()),
        Err(ContextError::NoCompanyInScope)
    ));
}
