//! Reversible, ordered schema migrations.
//!
//! A migration is a named unit with an `up` and a `down` list of DDL
//! statements. The runner applies pending migrations in ascending version
//! order and records each one in `public.__migrations__` only after every
//! statement of its `up` succeeded. A failing statement aborts the run with
//! the database error; earlier statements of the same migration stay applied
//! and must be reconciled by the operator.

mod catalog;

use std::collections::HashSet;

use async_trait::async_trait;

pub use self::catalog::MIGRATIONS;

use crate::config::MIGRATIONS_TABLE;
use crate::error::{DatabaseError, MigrationError};

/// One reversible schema change.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Creation timestamp in milliseconds; also the ordering key.
    pub version: i64,
    pub name: &'static str,
    pub up: &'static [&'static str],
    pub down: &'static [&'static str],
}

/// Database operations the runner needs.
#[async_trait]
pub trait MigrationTarget: Send + Sync {
    async fn ensure_tracking_table(&self) -> Result<(), DatabaseError>;

    async fn applied_versions(&self) -> Result<Vec<i64>, DatabaseError>;

    async fn execute(&self, statement: &str) -> Result<(), DatabaseError>;

    async fn record_applied(&self, migration: &Migration) -> Result<(), DatabaseError>;

    async fn remove_applied(&self, migration: &Migration) -> Result<(), DatabaseError>;
}

#[async_trait]
impl MigrationTarget for tokio_postgres::Client {
    async fn ensure_tracking_table(&self) -> Result<(), DatabaseError> {
        self.batch_execute(&format!(
            "CREATE TABLE IF NOT EXISTS \"public\".\"{MIGRATIONS_TABLE}\" (\
                \"id\" SERIAL NOT NULL, \
                \"timestamp\" bigint NOT NULL, \
                \"name\" character varying NOT NULL, \
                CONSTRAINT \"pk_migrations\" PRIMARY KEY (\"id\"))"
        ))
        .await?;
        Ok(())
    }

    async fn applied_versions(&self) -> Result<Vec<i64>, DatabaseError> {
        let rows = self
            .query(
                &format!(
                    "SELECT \"timestamp\" FROM \"public\".\"{MIGRATIONS_TABLE}\" \
                     ORDER BY \"timestamp\" ASC"
                ),
                &[],
            )
            .await?;
        Ok(rows.iter().map(|row| row.get::<_, i64>(0)).collect())
    }

    async fn execute(&self, statement: &str) -> Result<(), DatabaseError> {
        self.batch_execute(statement).await?;
        Ok(())
    }

    async fn record_applied(&self, migration: &Migration) -> Result<(), DatabaseError> {
        tokio_postgres::Client::execute(
            self,
            &format!(
                "INSERT INTO \"public\".\"{MIGRATIONS_TABLE}\" (\"timestamp\", \"name\") \
                 VALUES ($1, $2)"
            ),
            &[&migration.version, &migration.name],
        )
        .await?;
        Ok(())
    }

    async fn remove_applied(&self, migration: &Migration) -> Result<(), DatabaseError> {
        tokio_postgres::Client::execute(
            self,
            &format!("DELETE FROM \"public\".\"{MIGRATIONS_TABLE}\" WHERE \"timestamp\" = $1"),
            &[&migration.version],
        )
        .await?;
        Ok(())
    }
}

/// Migrations executed by a single runner call, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub executed: Vec<(i64, &'static str)>,
}

impl MigrationReport {
    pub fn is_empty(&self) -> bool {
        self.executed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatusEntry {
    pub version: i64,
    pub name: &'static str,
    pub applied: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationStatus {
    pub entries: Vec<MigrationStatusEntry>,
    /// Versions recorded as applied that the catalog does not know.
    pub unknown_applied: Vec<i64>,
}

impl MigrationStatus {
    pub fn pending(&self) -> impl Iterator<Item = &MigrationStatusEntry> {
        self.entries.iter().filter(|entry| !entry.applied)
    }
}

/// Applies and reverts a validated migration catalog.
#[derive(Debug, Clone, Copy)]
pub struct MigrationRunner {
    catalog: &'static [Migration],
}

impl MigrationRunner {
    /// Runner over the built-in catalog.
    pub fn builtin() -> Result<Self, MigrationError> {
        Self::new(MIGRATIONS)
    }

    /// Validates that versions are strictly ascending and that every
    /// migration can both apply and revert.
    pub fn new(catalog: &'static [Migration]) -> Result<Self, MigrationError> {
        for pair in catalog.windows(2) {
            if pair[0].version >= pair[1].version {
                return Err(MigrationError::InvalidCatalog(format!(
                    "{} ({}) must come before {} ({})",
                    pair[1].name, pair[1].version, pair[0].name, pair[0].version
                )));
            }
        }
        if let Some(migration) = catalog
            .iter()
            .find(|m| m.up.is_empty() || m.down.is_empty())
        {
            return Err(MigrationError::InvalidCatalog(format!(
                "{} ({}) needs both up and down statements",
                migration.name, migration.version
            )));
        }
        Ok(Self { catalog })
    }

    pub fn catalog(&self) -> &'static [Migration] {
        self.catalog
    }

    /// Applies every migration not yet recorded, oldest first.
    pub async fn run(
        &self,
        target: &dyn MigrationTarget,
    ) -> Result<MigrationReport, MigrationError> {
        let applied: HashSet<i64> = self.applied(target).await?.into_iter().collect();

        let mut report = MigrationReport::default();
        for migration in self
            .catalog
            .iter()
            .filter(|m| !applied.contains(&m.version))
        {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            execute_all(target, migration, migration.up).await?;
            target
                .record_applied(migration)
                .await
                .map_err(MigrationError::Tracking)?;
            report.executed.push((migration.version, migration.name));
        }

        if report.is_empty() {
            tracing::info!("No pending migrations");
        }
        Ok(report)
    }

    /// Reverts the most recently applied migration, if any.
    pub async fn revert_last(
        &self,
        target: &dyn MigrationTarget,
    ) -> Result<MigrationReport, MigrationError> {
        let applied = self.applied(target).await?;
        let mut report = MigrationReport::default();
        if let Some(&latest) = applied.iter().max() {
            let migration = self.lookup(latest)?;
            self.revert_one(target, migration).await?;
            report.executed.push((migration.version, migration.name));
        }
        Ok(report)
    }

    /// Reverts every applied migration, newest first.
    pub async fn revert_all(
        &self,
        target: &dyn MigrationTarget,
    ) -> Result<MigrationReport, MigrationError> {
        let mut applied = self.applied(target).await?;
        applied.sort_unstable_by(|a, b| b.cmp(a));
        applied.dedup();

        // Resolve everything first so an unknown version aborts before any DDL runs.
        let migrations = applied
            .iter()
            .map(|version| self.lookup(*version))
            .collect::<Result<Vec<_>, _>>()?;

        let mut report = MigrationReport::default();
        for migration in migrations {
            self.revert_one(target, migration).await?;
            report.executed.push((migration.version, migration.name));
        }
        Ok(report)
    }

    pub async fn status(
        &self,
        target: &dyn MigrationTarget,
    ) -> Result<MigrationStatus, MigrationError> {
        let applied: HashSet<i64> = self.applied(target).await?.into_iter().collect();
        let known: HashSet<i64> = self.catalog.iter().map(|m| m.version).collect();

        let mut unknown_applied: Vec<i64> = applied.difference(&known).copied().collect();
        unknown_applied.sort_unstable();

        Ok(MigrationStatus {
            entries: self
                .catalog
                .iter()
                .map(|m| MigrationStatusEntry {
                    version: m.version,
                    name: m.name,
                    applied: applied.contains(&m.version),
                })
                .collect(),
            unknown_applied,
        })
    }

    async fn applied(&self, target: &dyn MigrationTarget) -> Result<Vec<i64>, MigrationError> {
        target
            .ensure_tracking_table()
            .await
            .map_err(MigrationError::Tracking)?;
        let applied = target
            .applied_versions()
            .await
            .map_err(MigrationError::Tracking)?;
        for version in &applied {
            if !self.catalog.iter().any(|m| m.version == *version) {
                tracing::warn!(version, "Applied migration is not in the catalog");
            }
        }
        Ok(applied)
    }

    fn lookup(&self, version: i64) -> Result<&'static Migration, MigrationError> {
        self.catalog
            .iter()
            .find(|m| m.version == version)
            .ok_or(MigrationError::UnknownApplied(version))
    }

    async fn revert_one(
        &self,
        target: &dyn MigrationTarget,
        migration: &Migration,
    ) -> Result<(), MigrationError> {
        tracing::info!(
            version = migration.version,
            name = migration.name,
            "Reverting migration"
        );
        execute_all(target, migration, migration.down).await?;
        target
            .remove_applied(migration)
            .await
            .map_err(MigrationError::Tracking)
    }
}

async fn execute_all(
    target: &dyn MigrationTarget,
    migration: &Migration,
    statements: &[&str],
) -> Result<(), MigrationError> {
    for (index, statement) in statements.iter().enumerate() {
        target
            .execute(statement)
            .await
            .map_err(|source| MigrationError::Statement {
                version: migration.version,
                name: migration.name,
                index,
                source,
            })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Default)]
    struct FakeState {
        applied: Vec<i64>,
        executed: Vec<String>,
        fail_on: Option<&'static str>,
    }

    /// In-memory target that logs statements and can fail on one of them.
    #[derive(Default)]
    struct FakeTarget {
        state: Mutex<FakeState>,
    }

    impl FakeTarget {
        fn failing_on(statement: &'static str) -> Self {
            let target = Self::default();
            target.state.lock().unwrap().fail_on = Some(statement);
            target
        }

        fn with_applied(applied: &[i64]) -> Self {
            let target = Self::default();
            target.state.lock().unwrap().applied = applied.to_vec();
            target
        }

        fn executed(&self) -> Vec<String> {
            self.state.lock().unwrap().executed.clone()
        }

        fn applied(&self) -> Vec<i64> {
            self.state.lock().unwrap().applied.clone()
        }
    }

    #[async_trait]
    impl MigrationTarget for FakeTarget {
        async fn ensure_tracking_table(&self) -> Result<(), DatabaseError> {
            Ok(())
        }

        async fn applied_versions(&self) -> Result<Vec<i64>, DatabaseError> {
            Ok(self.applied())
        }

        async fn execute(&self, statement: &str) -> Result<(), DatabaseError> {
            let mut state = self.state.lock().unwrap();
            if state.fail_on == Some(statement) {
                return Err(DatabaseError::Pool(format!("cannot execute {statement}")));
            }
            state.executed.push(statement.to_string());
            Ok(())
        }

        async fn record_applied(&self, migration: &Migration) -> Result<(), DatabaseError> {
            self.state.lock().unwrap().applied.push(migration.version);
            Ok(())
        }

        async fn remove_applied(&self, migration: &Migration) -> Result<(), DatabaseError> {
            self.state
                .lock()
                .unwrap()
                .applied
                .retain(|v| *v != migration.version);
            Ok(())
        }
    }

    static CATALOG: &[Migration] = &[
        Migration {
            version: 10,
            name: "First",
            up: &["up 10a", "up 10b"],
            down: &["down 10b", "down 10a"],
        },
        Migration {
            version: 20,
            name: "Second",
            up: &["up 20"],
            down: &["down 20"],
        },
        Migration {
            version: 30,
            name: "Third",
            up: &["up 30a", "up 30b"],
            down: &["down 30b", "down 30a"],
        },
    ];

    fn runner() -> MigrationRunner {
        MigrationRunner::new(CATALOG).expect("valid catalog")
    }

    #[tokio::test]
    async fn run_applies_everything_in_ascending_order() {
        let target = FakeTarget::default();
        let report = runner().run(&target).await.unwrap();

        assert_eq!(
            report.executed,
            vec![(10, "First"), (20, "Second"), (30, "Third")]
        );
        assert_eq!(
            target.executed(),
            vec!["up 10a", "up 10b", "up 20", "up 30a", "up 30b"]
        );
        assert_eq!(target.applied(), vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn rerun_is_a_no_op() {
        let target = FakeTarget::default();
        runner().run(&target).await.unwrap();
        let second = runner().run(&target).await.unwrap();

        assert!(second.is_empty());
        assert_eq!(target.executed().len(), 5);
    }

    #[tokio::test]
    async fn only_pending_migrations_run() {
        let target = FakeTarget::with_applied(&[10, 30]);
        let report = runner().run(&target).await.unwrap();

        assert_eq!(report.executed, vec![(20, "Second")]);
        assert_eq!(target.executed(), vec!["up 20"]);
    }

    #[tokio::test]
    async fn failed_statement_is_not_recorded() {
        let target = FakeTarget::failing_on("up 30b");
        let err = runner().run(&target).await.expect_err("must fail");

        let MigrationError::Statement { version, index, .. } = &err else {
            panic!("expected Statement error, got {err:?}");
        };
        assert_eq!(*version, 30);
        assert_eq!(*index, 1);
        // Earlier migrations stay recorded, the failed one does not; its
        // first statement remains applied for the operator to reconcile.
        assert_eq!(target.applied(), vec![10, 20]);
        assert_eq!(target.executed().last().map(String::as_str), Some("up 30a"));
    }

    #[tokio::test]
    async fn revert_all_runs_down_steps_newest_first() {
        let target = FakeTarget::default();
        runner().run(&target).await.unwrap();
        let report = runner().revert_all(&target).await.unwrap();

        assert_eq!(
            report.executed,
            vec![(30, "Third"), (20, "Second"), (10, "First")]
        );
        assert_eq!(
            target.executed()[5..].to_vec(),
            vec!["down 30b", "down 30a", "down 20", "down 10b", "down 10a"]
        );
        assert!(target.applied().is_empty());
    }

    #[tokio::test]
    async fn revert_last_only_touches_newest() {
        let target = FakeTarget::with_applied(&[10, 20]);
        let report = runner().revert_last(&target).await.unwrap();

        assert_eq!(report.executed, vec![(20, "Second")]);
        assert_eq!(target.applied(), vec![10]);

        let empty = FakeTarget::default();
        assert!(runner().revert_last(&empty).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_applied_version_blocks_revert_all() {
        let target = FakeTarget::with_applied(&[10, 99]);
        let err = runner().revert_all(&target).await.expect_err("must fail");

        assert!(matches!(err, MigrationError::UnknownApplied(99)));
        assert!(target.executed().is_empty());
    }

    #[tokio::test]
    async fn status_reports_pending_and_unknown() {
        let target = FakeTarget::with_applied(&[20, 7]);
        let status = runner().status(&target).await.unwrap();

        let pending: Vec<i64> = status.pending().map(|e| e.version).collect();
        assert_eq!(pending, vec![10, 30]);
        assert_eq!(status.unknown_applied, vec![7]);
    }

    #[test]
    fn catalog_must_be_strictly_ascending() {
        static UNORDERED: &[Migration] = &[
            Migration {
                version: 2,
                name: "B",
                up: &["b"],
                down: &["b"],
            },
            Migration {
                version: 1,
                name: "A",
                up: &["a"],
                down: &["a"],
            },
        ];
        assert!(matches!(
            MigrationRunner::new(UNORDERED),
            Err(MigrationError::InvalidCatalog(_))
        ));
    }

    #[test]
    fn catalog_rejects_irreversible_migrations() {
        static IRREVERSIBLE: &[Migration] = &[Migration {
            version: 1,
            name: "A",
            up: &["a"],
            down: &[],
        }];
        assert!(MigrationRunner::new(IRREVERSIBLE).is_err());
    }

    #[test]
    fn builtin_catalog_is_valid() {
        let runner = MigrationRunner::builtin().expect("built-in catalog is valid");
        assert_eq!(runner.catalog().len(), 5);
        assert_eq!(runner.catalog()[0].name, "CreateSchemas");
    }

    #[test]
    fn builtin_down_drops_what_up_creates() {
        for migration in MIGRATIONS {
            let created = migration
                .up
                .iter()
                .filter(|s| s.trim_start().starts_with("CREATE TABLE"))
                .count();
            let dropped = migration
                .down
                .iter()
                .filter(|s| s.trim_start().starts_with("DROP TABLE"))
                .count();
            assert_eq!(created, dropped, "{}", migration.name);

            let added = migration
                .up
                .iter()
                .filter(|s| s.contains("ADD CONSTRAINT"))
                .count();
            let removed = migration
                .down
                .iter()
                .filter(|s| s.contains("DROP CONSTRAINT"))
                .count();
            assert_eq!(added, removed, "{}", migration.name);
        }
    }

    #[test]
    fn each_constraint_is_added_once_across_the_catalog() {
        let mut added: Vec<&str> = MIGRATIONS
            .iter()
            .flat_map(|m| m.up.iter())
            .filter_map(|s| s.split("ADD CONSTRAINT \"").nth(1))
            .filter_map(|rest| rest.split('"').next())
            .collect();
        let total = added.len();
        added.sort_unstable();
        added.dedup();
        assert_eq!(added.len(), total);
        assert!(added.contains(&"fk_project_workspace"));
        assert!(added.contains(&"fk_project_tag_tag"));
    }
}
