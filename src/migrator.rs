use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_users_table::Migration),
            Box::new(m20240301_000002_create_job_orders_table::Migration),
            Box::new(m20240301_000003_create_appointments_table::Migration),
            Box::new(m20240301_000004_create_audit_logs_table::Migration),
            Box::new(m20240301_000005_create_system_logs_table::Migration),
            Box::new(m20240301_000006_create_maintenance_settings_table::Migration),
            Box::new(m20240301_000007_create_bug_reports_table::Migration),
        ]
    }
}

mod m20240301_000001_create_users_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Users::Name).string().not_null())
                        .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
                        .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                        .col(ColumnDef::new(Users::Role).string_len(20).not_null())
                        .col(ColumnDef::new(Users::Level).string_len(20).null())
                        .col(ColumnDef::new(Users::BreakStart).string_len(5).null())
                        .col(ColumnDef::new(Users::BreakEnd).string_len(5).null())
                        .col(
                            ColumnDef::new(Users::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_users_role")
                        .table(Users::Table)
                        .col(Users::Role)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
        Name,
        Email,
        PasswordHash,
        Role,
        Level,
        BreakStart,
        BreakEnd,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_job_orders_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_job_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(JobOrders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(JobOrders::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(JobOrders::JobNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(JobOrders::PlateNumber).string().not_null())
                        .col(ColumnDef::new(JobOrders::Vin).string().null())
                        .col(ColumnDef::new(JobOrders::AssignedTechnician).uuid().null())
                        .col(ColumnDef::new(JobOrders::ServiceAdvisor).uuid().null())
                        .col(ColumnDef::new(JobOrders::CreatedBy).uuid().not_null())
                        .col(ColumnDef::new(JobOrders::TimeStart).string_len(5).not_null())
                        .col(ColumnDef::new(JobOrders::TimeEnd).string_len(5).not_null())
                        .col(ColumnDef::new(JobOrders::ActualEndTime).string_len(5).null())
                        .col(ColumnDef::new(JobOrders::Date).date().not_null())
                        .col(ColumnDef::new(JobOrders::OriginalCreatedDate).date().not_null())
                        .col(ColumnDef::new(JobOrders::JobList).json().not_null())
                        .col(ColumnDef::new(JobOrders::Parts).json().not_null())
                        .col(ColumnDef::new(JobOrders::Status).string_len(2).not_null())
                        .col(ColumnDef::new(JobOrders::SourceType).string_len(20).not_null())
                        .col(
                            ColumnDef::new(JobOrders::CarriedOver)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(JobOrders::CarryOverChain).json().not_null())
                        .col(ColumnDef::new(JobOrders::OriginalJobId).uuid().null())
                        .col(
                            ColumnDef::new(JobOrders::IsImportant)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(JobOrders::QiStatus).string_len(20).null())
                        .col(ColumnDef::new(JobOrders::Notes).text().null())
                        .col(
                            ColumnDef::new(JobOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(JobOrders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_job_orders_date_status")
                        .table(JobOrders::Table)
                        .col(JobOrders::Date)
                        .col(JobOrders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_job_orders_technician_date")
                        .table(JobOrders::Table)
                        .col(JobOrders::AssignedTechnician)
                        .col(JobOrders::Date)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(JobOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum JobOrders {
        Table,
        Id,
        JobNumber,
        PlateNumber,
        Vin,
        AssignedTechnician,
        ServiceAdvisor,
        CreatedBy,
        TimeStart,
        TimeEnd,
        ActualEndTime,
        Date,
        OriginalCreatedDate,
        JobList,
        Parts,
        Status,
        SourceType,
        CarriedOver,
        CarryOverChain,
        OriginalJobId,
        IsImportant,
        QiStatus,
        Notes,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000003_create_appointments_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_appointments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Appointments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Appointments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Appointments::PlateNumber).string().not_null())
                        .col(ColumnDef::new(Appointments::TimeStart).string_len(5).not_null())
                        .col(ColumnDef::new(Appointments::TimeEnd).string_len(5).not_null())
                        .col(ColumnDef::new(Appointments::Date).date().not_null())
                        .col(
                            ColumnDef::new(Appointments::AssignedTechnician)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Appointments::ServiceAdvisor).uuid().null())
                        .col(ColumnDef::new(Appointments::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(Appointments::NoShow)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Appointments::Notes).text().null())
                        .col(
                            ColumnDef::new(Appointments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Appointments::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_appointments_technician_date")
                        .table(Appointments::Table)
                        .col(Appointments::AssignedTechnician)
                        .col(Appointments::Date)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Appointments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Appointments {
        Table,
        Id,
        PlateNumber,
        TimeStart,
        TimeEnd,
        Date,
        AssignedTechnician,
        ServiceAdvisor,
        CreatedBy,
        NoShow,
        Notes,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000004_create_audit_logs_table {
    use sea_orm_migration::prelude::*;
    use sea_orm_migration::sea_orm::{ConnectionTrait, DatabaseBackend};

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_audit_logs_table"
        }
    }

    const SQLITE_TRIGGERS: [&str; 2] = [
        "CREATE TRIGGER IF NOT EXISTS audit_logs_no_update BEFORE UPDATE ON audit_logs \
         BEGIN SELECT RAISE(ABORT, 'audit_logs rows are immutable'); END;",
        "CREATE TRIGGER IF NOT EXISTS audit_logs_no_delete BEFORE DELETE ON audit_logs \
         BEGIN SELECT RAISE(ABORT, 'audit_logs rows are immutable'); END;",
    ];

    const POSTGRES_TRIGGERS: [&str; 3] = [
        "CREATE OR REPLACE FUNCTION audit_logs_reject_mutation() RETURNS trigger AS $$ \
         BEGIN RAISE EXCEPTION 'audit_logs rows are immutable'; END; $$ LANGUAGE plpgsql;",
        "DROP TRIGGER IF EXISTS audit_logs_immutable ON audit_logs;",
        "CREATE TRIGGER audit_logs_immutable BEFORE UPDATE OR DELETE ON audit_logs \
         FOR EACH ROW EXECUTE FUNCTION audit_logs_reject_mutation();",
    ];

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(AuditLogs::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(AuditLogs::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(AuditLogs::Action).string().not_null())
                        .col(ColumnDef::new(AuditLogs::EntityType).string().not_null())
                        .col(ColumnDef::new(AuditLogs::EntityId).string().not_null())
                        .col(ColumnDef::new(AuditLogs::ActorId).uuid().null())
                        .col(ColumnDef::new(AuditLogs::ActorEmail).string().null())
                        .col(ColumnDef::new(AuditLogs::ActorName).string().null())
                        .col(ColumnDef::new(AuditLogs::ActorRole).string().null())
                        .col(ColumnDef::new(AuditLogs::Changes).json().not_null())
                        .col(ColumnDef::new(AuditLogs::BeforeState).json().null())
                        .col(ColumnDef::new(AuditLogs::AfterState).json().null())
                        .col(ColumnDef::new(AuditLogs::RequestId).string().null())
                        .col(ColumnDef::new(AuditLogs::IpAddress).string().null())
                        .col(ColumnDef::new(AuditLogs::UserAgent).string().null())
                        .col(
                            ColumnDef::new(AuditLogs::IsSuspicious)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(AuditLogs::SuspiciousReason).text().null())
                        .col(ColumnDef::new(AuditLogs::Severity).string_len(10).not_null())
                        .col(
                            ColumnDef::new(AuditLogs::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_audit_logs_entity")
                        .table(AuditLogs::Table)
                        .col(AuditLogs::EntityType)
                        .col(AuditLogs::EntityId)
                        .to_owned(),
                )
                .await?;

            let db = manager.get_connection();
            let statements: &[&str] = match manager.get_database_backend() {
                DatabaseBackend::Sqlite => &SQLITE_TRIGGERS,
                DatabaseBackend::Postgres => &POSTGRES_TRIGGERS,
                DatabaseBackend::MySql => &[],
            };
            for sql in statements {
                db.execute_unprepared(sql).await?;
            }
            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            if manager.get_database_backend() == DatabaseBackend::Postgres {
                manager
                    .get_connection()
                    .execute_unprepared("DROP FUNCTION IF EXISTS audit_logs_reject_mutation() CASCADE;")
                    .await?;
            }
            manager
                .drop_table(Table::drop().table(AuditLogs::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum AuditLogs {
        Table,
        Id,
        Action,
        EntityType,
        EntityId,
        ActorId,
        ActorEmail,
        ActorName,
        ActorRole,
        Changes,
        BeforeState,
        AfterState,
        RequestId,
        IpAddress,
        UserAgent,
        IsSuspicious,
        SuspiciousReason,
        Severity,
        CreatedAt,
    }
}

mod m20240301_000005_create_system_logs_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_system_logs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SystemLogs::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(SystemLogs::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(SystemLogs::Level).string_len(10).not_null())
                        .col(ColumnDef::new(SystemLogs::Category).string().not_null())
                        .col(ColumnDef::new(SystemLogs::Message).text().not_null())
                        .col(ColumnDef::new(SystemLogs::Metadata).json().null())
                        .col(
                            ColumnDef::new(SystemLogs::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_system_logs_created_at")
                        .table(SystemLogs::Table)
                        .col(SystemLogs::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SystemLogs::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum SystemLogs {
        Table,
        Id,
        Level,
        Category,
        Message,
        Metadata,
        CreatedAt,
    }
}

mod m20240301_000006_create_maintenance_settings_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000006_create_maintenance_settings_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(MaintenanceSettings::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MaintenanceSettings::Id)
                                .integer()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MaintenanceSettings::IsUnderMaintenance)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(MaintenanceSettings::MaintenanceMessage)
                                .text()
                                .not_null(),
                        )
                        .col(ColumnDef::new(MaintenanceSettings::ApiKey).string().null())
                        .col(
                            ColumnDef::new(MaintenanceSettings::ApiKeyLastValidatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(MaintenanceSettings::ApiKeyLastValidationResult)
                                .boolean()
                                .null(),
                        )
                        .col(ColumnDef::new(MaintenanceSettings::UpdatedBy).uuid().null())
                        .col(
                            ColumnDef::new(MaintenanceSettings::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(MaintenanceSettings::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum MaintenanceSettings {
        Table,
        Id,
        IsUnderMaintenance,
        MaintenanceMessage,
        ApiKey,
        ApiKeyLastValidatedAt,
        ApiKeyLastValidationResult,
        UpdatedBy,
        UpdatedAt,
    }
}

mod m20240301_000007_create_bug_reports_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000007_create_bug_reports_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(BugReports::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(BugReports::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(BugReports::Title).string().not_null())
                        .col(ColumnDef::new(BugReports::Description).text().not_null())
                        .col(ColumnDef::new(BugReports::Status).string_len(20).not_null())
                        .col(ColumnDef::new(BugReports::ReportedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(BugReports::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BugReports::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BugReports::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum BugReports {
        Table,
        Id,
        Title,
        Description,
        Status,
        ReportedBy,
        CreatedAt,
        UpdatedAt,
    }
}
