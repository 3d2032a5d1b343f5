use crate::errors::{AppError, ResultExt};
use crate::identification::Identification;
use crate::resolver::{EmailLookup, RESOLVER_FUNCTION};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }
}

/// Runs the resolver function over a direct Postgres connection.
#[derive(Clone)]
pub struct SqlLookup {
    pool: PgPool,
}

impl SqlLookup {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl EmailLookup for SqlLookup {
    async fn lookup(&self, id: &Identification) -> Result<Vec<String>, AppError> {
        sqlx::query_scalar::<_, String>(
            "SELECT email FROM public.get_email_by_identification($1)",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("{} failed for {}", RESOLVER_FUNCTION, id))
    }
}

/// Catalog facts about the resolver function.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ResolverFunctionStatus {
    pub exists: bool,
    pub security_definer: bool,
    pub anon_can_execute: bool,
    pub authenticated_can_execute: bool,
    pub public_can_execute: bool,
}

impl ResolverFunctionStatus {
    /// Exists, runs with owner privileges and is callable by exactly the
    /// `anon` and `authenticated` roles.
    pub fn is_correctly_exposed(&self) -> bool {
        self.exists
            && self.security_definer
            && self.anon_can_execute
            && self.authenticated_can_execute
            && !self.public_can_execute
    }
}

/// Reads the resolver function's definition and grants from `pg_catalog`.
pub async fn inspect_resolver_function(pool: &PgPool) -> Result<ResolverFunctionStatus, AppError> {
    let signature = format!("public.{}(text)", RESOLVER_FUNCTION);

    let exists: bool = sqlx::query_scalar("SELECT to_regprocedure($1) IS NOT NULL")
        .bind(&signature)
        .fetch_one(pool)
        .await
        .context("checking resolver function")?;

    if !exists {
        return Ok(ResolverFunctionStatus {
            exists: false,
            security_definer: false,
            anon_can_execute: false,
            authenticated_can_execute: false,
            public_can_execute: false,
        });
    }

    sqlx::query_as::<_, ResolverFunctionStatus>(
        r#"
        SELECT
            true AS "exists",
            p.prosecdef AS security_definer,
            has_function_privilege('anon', p.oid, 'EXECUTE') AS anon_can_execute,
            has_function_privilege('authenticated', p.oid, 'EXECUTE') AS authenticated_can_execute,
            CASE
                WHEN p.proacl IS NULL THEN true
                ELSE EXISTS (
                    SELECT 1 FROM aclexplode(p.proacl) acl
                    WHERE acl.grantee = 0 AND acl.privilege_type = 'EXECUTE'
                )
            END AS public_can_execute
        FROM pg_proc p
        WHERE p.oid = to_regprocedure($1)
        "#,
    )
    .bind(&signature)
    .fetch_one(pool)
    .await
    .context("reading resolver function grants")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exposure_requires_every_property() {
        let good = ResolverFunctionStatus {
            exists: true,
            security_definer: true,
            anon_can_execute: true,
            authenticated_can_execute: true,
            public_can_execute: false,
        };
        assert!(good.is_correctly_exposed());

        let open_to_public = ResolverFunctionStatus {
            public_can_execute: true,
            ..good.clone()
        };
        assert!(!open_to_public.is_correctly_exposed());

        let invoker = ResolverFunctionStatus {
            security_definer: false,
            ..good
        };
        assert!(!invoker.is_correctly_exposed());
    }
}
