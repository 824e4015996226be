//! Shared PostgreSQL test harness.
//!
//! This module starts a single PostgreSQL container per test process and
//! provides helpers for connecting and for provisioning isolated company
//! fixtures on the shared database.

use palisade_core::config::DatabaseConfig;
use palisade_core::db::Database;
use palisade_core::identity::{Company, Directory, NewCompany, NewUser, User};
use palisade_core::scope::{Role, Scope};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Shared PostgreSQL container state.
pub struct PgHarness {
    config: DatabaseConfig,
    /// Kept alive for the full test process lifetime. `None` when the
    /// database comes from `PALISADE_TEST_DATABASE_URL`.
    _container: Option<ContainerAsync<Postgres>>,
}

static SHARED_PG: OnceCell<PgHarness> = OnceCell::const_new();

impl PgHarness {
    /// Returns the process-global PostgreSQL harness, starting it on first use.
    ///
    /// If `PALISADE_TEST_DATABASE_URL` is set, tests run against that
    /// database instead of starting a container. Schema, principals, and
    /// policies are installed once when the harness starts; the install
    /// script is idempotent.
    pub async fn shared() -> &'static PgHarness {
        SHARED_PG
            .get_or_init(|| async {
                let (config, container) =
                    if let Ok(url) = std::env::var("PALISADE_TEST_DATABASE_URL") {
                        let mut config = DatabaseConfig::from_url(&url);
                        config.pool_size = 5;
                        (config, None)
                    } else {
                        let run_id = std::env::var("GITHUB_RUN_ID").unwrap_or_default();
                        let container = Postgres::default()
                            .with_label("github.run_id", &run_id)
                            .start()
                            .await
                            .expect("Failed to start PostgreSQL container");

                        let port = container
                            .get_host_port_ipv4(5432)
                            .await
                            .expect("Failed to get host port");

                        let host = container
                            .get_host()
                            .await
                            .expect("Failed to get host")
                            .to_string();

                        (config_for(&host, port), Some(container))
                    };

                let db = Database::connect(config.clone())
                    .await
                    .expect("Failed to connect to PostgreSQL container");
                db.initialize_schema()
                    .await
                    .expect("Failed to initialize schema");

                PgHarness {
                    config,
                    _container: container,
                }
            })
            .await
    }
}

fn config_for(host: &str, port: u16) -> DatabaseConfig {
    DatabaseConfig {
        host: host.to_string(),
        port,
        dbname: "postgres".to_string(),
        user: "postgres".to_string(),
        password: Some("postgres".to_string()),
        pool_size: 5,
        ..DatabaseConfig::default()
    }
}

/// Connects to the shared container.
pub async fn connect() -> Database {
    let pg = PgHarness::shared().await;
    Database::connect(pg.config.clone())
        .await
        .expect("Failed to connect to PostgreSQL container")
}

/// A freshly provisioned company with one user per role.
pub struct CompanyFixture {
    pub company: Company,
    pub admin: User,
    pub member: User,
    pub viewer: User,
}

impl CompanyFixture {
    /// Scope acting as the company's admin user.
    pub fn admin_scope(&self) -> Scope {
        Scope::for_user(self.admin.scope_user(), self.company.scope_company())
    }

    /// Scope acting as the company's regular user.
    pub fn member_scope(&self) -> Scope {
        Scope::for_user(self.member.scope_user(), self.company.scope_company())
    }

    /// Scope acting as the company's readonly user.
    pub fn viewer_scope(&self) -> Scope {
        Scope::for_user(self.viewer.scope_user(), self.company.scope_company())
    }
}

/// Provisions a fresh company with users for all three roles.
///
/// Names and emails carry a unique suffix so tests sharing the same
/// database never collide.
pub async fn provision_company(directory: &Directory, label: &str) -> CompanyFixture {
    let suffix = short_suffix();
    let company = directory
        .create_company(NewCompany::new(format!("{} {}", label, suffix)))
        .await
        .expect("Failed to create company");

    let admin = directory
        .create_user(NewUser::new(
            format!("admin-{}@{}.test", suffix, label),
            Role::Admin,
            company.id,
        ))
        .await
        .expect("Failed to create admin user");
    let member = directory
        .create_user(NewUser::new(
            format!("member-{}@{}.test", suffix, label),
            Role::User,
            company.id,
        ))
        .await
        .expect("Failed to create member user");
    let viewer = directory
        .create_user(NewUser::new(
            format!("viewer-{}@{}.test", suffix, label),
            Role::Readonly,
            company.id,
        ))
        .await
        .expect("Failed to create viewer user");

    CompanyFixture {
        company,
        admin,
        member,
        viewer,
    }
}

/// Generates a unique suffix for isolated fixtures.
pub fn short_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..10].to_string()
}
