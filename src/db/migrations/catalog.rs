//! Ordered DDL for the `core` schema.
//!
//! Each `down` undoes its `up` statement by statement in reverse, so the
//! full sequence reverted in descending order returns the database to its
//! state before the first migration.

use super::Migration;

pub static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1750856141883,
        name: "CreateSchemas",
        up: &[
            r#"CREATE SCHEMA IF NOT EXISTS "core""#,
            r#"CREATE SCHEMA IF NOT EXISTS "discovery_source""#,
        ],
        down: &[
            r#"DROP SCHEMA IF EXISTS "discovery_source" CASCADE"#,
            r#"DROP SCHEMA IF EXISTS "core" CASCADE"#,
        ],
    },
    Migration {
        version: 1755602943059,
        name: "CreateUserTable",
        up: &[r#"CREATE TABLE "core"."user" (
                "id" uuid NOT NULL DEFAULT gen_random_uuid(),
                "name" character varying(255) NOT NULL,
                "email" character varying(320) NOT NULL,
                "profile_picture" character varying(500),
                CONSTRAINT "uq_user_email" UNIQUE ("email"),
                CONSTRAINT "pk_user" PRIMARY KEY ("id")
            )"#],
        down: &[r#"DROP TABLE "core"."user""#],
    },
    Migration {
        version: 1755607248129,
        name: "CreateTablesAndRelations",
        up: &[
            r#"CREATE TABLE "core"."task" (
                "id" uuid NOT NULL DEFAULT gen_random_uuid(),
                "name" character varying NOT NULL,
                "is_billable" boolean NOT NULL,
                "workspace_id" uuid,
                "project_id" uuid,
                CONSTRAINT "pk_task" PRIMARY KEY ("id")
            )"#,
            r#"CREATE TABLE "core"."project" (
                "id" uuid NOT NULL DEFAULT gen_random_uuid(),
                "name" character varying(255) NOT NULL,
                "hourly_rate" double precision,
                "workspace_id" uuid,
                "client_id" uuid,
                CONSTRAINT "pk_project" PRIMARY KEY ("id")
            )"#,
            r#"CREATE TABLE "core"."client" (
                "id" uuid NOT NULL DEFAULT gen_random_uuid(),
                "name" character varying(255) NOT NULL,
                "currency" character varying(10) NOT NULL,
                "notes" character varying(255) NOT NULL,
                "payment_method" character varying(255) NOT NULL,
                "emails" character varying(320) array NOT NULL,
                "preference_channel" character varying(255) NOT NULL,
                "workspace_id" uuid,
                CONSTRAINT "pk_client" PRIMARY KEY ("id")
            )"#,
            r#"CREATE TABLE "core"."tag" (
                "id" uuid NOT NULL DEFAULT gen_random_uuid(),
                "name" character varying(20) NOT NULL,
                "workspace_id" uuid,
                CONSTRAINT "pk_tag" PRIMARY KEY ("id")
            )"#,
            r#"ALTER TABLE "core"."user" ADD "workspace_id" uuid NOT NULL"#,
            r#"ALTER TABLE "core"."user" ADD CONSTRAINT "uq_user_workspace_id" UNIQUE ("workspace_id")"#,
            r#"ALTER TABLE "core"."task" ADD CONSTRAINT "fk_task_workspace" FOREIGN KEY ("workspace_id") REFERENCES "core"."user"("workspace_id") ON DELETE NO ACTION ON UPDATE NO ACTION"#,
            r#"ALTER TABLE "core"."task" ADD CONSTRAINT "fk_task_project" FOREIGN KEY ("project_id") REFERENCES "core"."project"("id") ON DELETE NO ACTION ON UPDATE NO ACTION"#,
            r#"ALTER TABLE "core"."project" ADD CONSTRAINT "fk_project_workspace" FOREIGN KEY ("workspace_id") REFERENCES "core"."user"("workspace_id") ON DELETE NO ACTION ON UPDATE NO ACTION"#,
            r#"ALTER TABLE "core"."project" ADD CONSTRAINT "fk_project_client" FOREIGN KEY ("client_id") REFERENCES "core"."client"("id") ON DELETE NO ACTION ON UPDATE NO ACTION"#,
            r#"ALTER TABLE "core"."client" ADD CONSTRAINT "fk_client_workspace" FOREIGN KEY ("workspace_id") REFERENCES "core"."user"("workspace_id") ON DELETE NO ACTION ON UPDATE NO ACTION"#,
            r#"ALTER TABLE "core"."tag" ADD CONSTRAINT "fk_tag_workspace" FOREIGN KEY ("workspace_id") REFERENCES "core"."user"("workspace_id") ON DELETE NO ACTION ON UPDATE NO ACTION"#,
        ],
        down: &[
            r#"ALTER TABLE "core"."tag" DROP CONSTRAINT "fk_tag_workspace""#,
            r#"ALTER TABLE "core"."client" DROP CONSTRAINT "fk_client_workspace""#,
            r#"ALTER TABLE "core"."project" DROP CONSTRAINT "fk_project_client""#,
            r#"ALTER TABLE "core"."project" DROP CONSTRAINT "fk_project_workspace""#,
            r#"ALTER TABLE "core"."task" DROP CONSTRAINT "fk_task_project""#,
            r#"ALTER TABLE "core"."task" DROP CONSTRAINT "fk_task_workspace""#,
            r#"ALTER TABLE "core"."user" DROP CONSTRAINT "uq_user_workspace_id""#,
            r#"ALTER TABLE "core"."user" DROP COLUMN "workspace_id""#,
            r#"DROP TABLE "core"."tag""#,
            r#"DROP TABLE "core"."client""#,
            r#"DROP TABLE "core"."project""#,
            r#"DROP TABLE "core"."task""#,
        ],
    },
    Migration {
        version: 1755608546371,
        name: "ProjectAndTagRelation",
        up: &[
            r#"CREATE TABLE "core"."project_tag" (
                "project_id" uuid NOT NULL,
                "tag_id" uuid NOT NULL,
                CONSTRAINT "pk_project_tag" PRIMARY KEY ("project_id", "tag_id")
            )"#,
            r#"CREATE INDEX "idx_project_tag_project_id" ON "core"."project_tag" ("project_id")"#,
            r#"CREATE INDEX "idx_project_tag_tag_id" ON "core"."project_tag" ("tag_id")"#,
            r#"ALTER TABLE "core"."tag" ADD "color" character varying(30) NOT NULL"#,
            r#"ALTER TABLE "core"."user" ALTER COLUMN "workspace_id" SET DEFAULT gen_random_uuid()"#,
            r#"ALTER TABLE "core"."project_tag" ADD CONSTRAINT "fk_project_tag_project" FOREIGN KEY ("project_id") REFERENCES "core"."project"("id") ON DELETE CASCADE ON UPDATE CASCADE"#,
            r#"ALTER TABLE "core"."project_tag" ADD CONSTRAINT "fk_project_tag_tag" FOREIGN KEY ("tag_id") REFERENCES "core"."tag"("id") ON DELETE NO ACTION ON UPDATE NO ACTION"#,
        ],
        down: &[
            r#"ALTER TABLE "core"."project_tag" DROP CONSTRAINT "fk_project_tag_tag""#,
            r#"ALTER TABLE "core"."project_tag" DROP CONSTRAINT "fk_project_tag_project""#,
            r#"ALTER TABLE "core"."user" ALTER COLUMN "workspace_id" DROP DEFAULT"#,
            r#"ALTER TABLE "core"."tag" DROP COLUMN "color""#,
            r#"DROP INDEX "core"."idx_project_tag_tag_id""#,
            r#"DROP INDEX "core"."idx_project_tag_project_id""#,
            r#"DROP TABLE "core"."project_tag""#,
        ],
    },
    Migration {
        version: 1755700000000,
        name: "WorkspaceIntegrity",
        up: &[
            r#"ALTER TABLE "core"."client" ADD CONSTRAINT "uq_client_id_workspace" UNIQUE ("id", "workspace_id")"#,
            r#"ALTER TABLE "core"."project" ADD CONSTRAINT "uq_project_id_workspace" UNIQUE ("id", "workspace_id")"#,
            r#"ALTER TABLE "core"."project" ADD CONSTRAINT "fk_project_client_workspace" FOREIGN KEY ("client_id", "workspace_id") REFERENCES "core"."client"("id", "workspace_id") ON DELETE NO ACTION ON UPDATE NO ACTION"#,
            r#"ALTER TABLE "core"."task" ADD CONSTRAINT "fk_task_project_workspace" FOREIGN KEY ("project_id", "workspace_id") REFERENCES "core"."project"("id", "workspace_id") ON DELETE NO ACTION ON UPDATE NO ACTION"#,
            r#"CREATE FUNCTION "core"."check_project_tag_workspace"() RETURNS trigger
                LANGUAGE plpgsql AS $$
            BEGIN
                IF NOT EXISTS (
                    SELECT 1 FROM "core"."project" p
                    JOIN "core"."tag" t ON t."workspace_id" IS NOT DISTINCT FROM p."workspace_id"
                    WHERE p."id" = NEW."project_id" AND t."id" = NEW."tag_id"
                ) THEN
                    RAISE EXCEPTION 'project % and tag % are not in the same workspace',
                        NEW."project_id", NEW."tag_id"
                        USING ERRCODE = 'foreign_key_violation';
                END IF;
                RETURN NEW;
            END;
            $$"#,
            r#"CREATE TRIGGER "trg_project_tag_workspace" BEFORE INSERT OR UPDATE ON "core"."project_tag" FOR EACH ROW EXECUTE FUNCTION "core"."check_project_tag_workspace"()"#,
            r#"CREATE FUNCTION "core"."forbid_workspace_id_change"() RETURNS trigger
                LANGUAGE plpgsql AS $$
            BEGIN
                IF NEW."workspace_id" IS DISTINCT FROM OLD."workspace_id" THEN
                    RAISE EXCEPTION 'workspace_id of user % is immutable', OLD."id"
                        USING ERRCODE = 'check_violation';
                END IF;
                RETURN NEW;
            END;
            $$"#,
            r#"CREATE TRIGGER "trg_user_workspace_id_immutable" BEFORE UPDATE OF "workspace_id" ON "core"."user" FOR EACH ROW EXECUTE FUNCTION "core"."forbid_workspace_id_change"()"#,
        ],
        down: &[
            r#"DROP TRIGGER "trg_user_workspace_id_immutable" ON "core"."user""#,
            r#"DROP FUNCTION "core"."forbid_workspace_id_change"()"#,
            r#"DROP TRIGGER "trg_project_tag_workspace" ON "core"."project_tag""#,
            r#"DROP FUNCTION "core"."check_project_tag_workspace"()"#,
            r#"ALTER TABLE "core"."task" DROP CONSTRAINT "fk_task_project_workspace""#,
            r#"ALTER TABLE "core"."project" DROP CONSTRAINT "fk_project_client_workspace""#,
            r#"ALTER TABLE "core"."project" DROP CONSTRAINT "uq_project_id_workspace""#,
            r#"ALTER TABLE "core"."client" DROP CONSTRAINT "uq_client_id_workspace""#,
        ],
    },
];
