use crate::entities::prelude::*;
use crate::entities::users;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// API key of the bootstrap admin; replace it through `POST /api/users/me/api-key`.
pub const DEFAULT_API_KEY: &str = "missive_default_api_key_please_regenerate";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let now = crate::db::timestamp_now();

        let insert = Query::insert()
            .into_table(Users)
            .columns([
                users::Column::Id,
                users::Column::Username,
                users::Column::FirstName,
                users::Column::LastName,
                users::Column::Email,
                users::Column::Role,
                users::Column::ApiKey,
                users::Column::CreatedAt,
            ])
            .values_panic([
                uuid::Uuid::new_v4().to_string().into(),
                "admin".into(),
                "Admin".into(),
                "User".into(),
                "admin@localhost".into(),
                "admin".into(),
                DEFAULT_API_KEY.into(),
                now.into(),
            ])
            .to_owned();

        manager.exec_stmt(insert).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let delete = Query::delete()
            .from_table(Users)
            .and_where(Expr::col(users::Column::ApiKey).eq(DEFAULT_API_KEY))
            .to_owned();

        manager.exec_stmt(delete).await?;

        Ok(())
    }
}
