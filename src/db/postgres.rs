//! Postgres repository. Every collection is a table of JSONB documents keyed
//! by `(id, realm_id)`, see `migrations/0001_collections.sql`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::PgPool;

use super::repository::Repository;
use crate::error::{DocumentError, Result};
use crate::models::{Document, Lease, Organization, Property, Template, Tenant};

pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .idle_timeout(std::time::Duration::from_secs(900))
            .max_lifetime(std::time::Duration::from_secs(1800))
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    async fn fetch_scoped<T: DeserializeOwned>(
        &self,
        table: &'static str,
        realm_id: &str,
        id: &str,
    ) -> Result<Option<T>> {
        let sql = format!("SELECT data FROM {} WHERE id = $1 AND realm_id = $2", table);
        let data: Option<Value> = sqlx::query_scalar(&sql)
            .bind(id)
            .bind(realm_id)
            .fetch_optional(&self.pool)
            .await?;
        data.map(decode).transpose()
    }
}

fn decode<T: DeserializeOwned>(data: Value) -> Result<T> {
    serde_json::from_value(data).map_err(|e| DocumentError::Database(sqlx::Error::Decode(Box::new(e))))
}

fn encode(document: &Document) -> Result<Value> {
    serde_json::to_value(document).map_err(|e| DocumentError::Database(sqlx::Error::Encode(Box::new(e))))
}

#[async_trait]
impl Repository for PgRepository {
    async fn find_organization(&self, id: &str) -> Result<Option<Organization>> {
        let data: Option<Value> = sqlx::query_scalar("SELECT data FROM realms WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        data.map(decode).transpose()
    }

    async fn find_tenant(&self, realm_id: &str, id: &str) -> Result<Option<Tenant>> {
        let Some(mut tenant) = self.fetch_scoped::<Tenant>("tenants", realm_id, id).await? else {
            return Ok(None);
        };

        let property_ids: Vec<String> = tenant
            .properties
            .iter()
            .map(|p| p.property_id.clone())
            .collect();
        if property_ids.is_empty() {
            return Ok(Some(tenant));
        }

        let rows: Vec<Value> = sqlx::query_scalar(
            "SELECT data FROM properties WHERE realm_id = $1 AND id = ANY($2)",
        )
        .bind(realm_id)
        .bind(&property_ids)
        .fetch_all(&self.pool)
        .await?;
        let properties = rows
            .into_iter()
            .map(decode::<Property>)
            .collect::<Result<Vec<_>>>()?;

        for occupied in tenant.properties.iter_mut() {
            occupied.property = properties
                .iter()
                .find(|p| p.id == occupied.property_id)
                .cloned();
        }
        Ok(Some(tenant))
    }

    async fn find_lease(&self, realm_id: &str, id: &str) -> Result<Option<Lease>> {
        self.fetch_scoped("leases", realm_id, id).await
    }

    async fn find_template(&self, realm_id: &str, id: &str) -> Result<Option<Template>> {
        self.fetch_scoped("templates", realm_id, id).await
    }

    async fn find_documents(&self, realm_id: &str) -> Result<Vec<Document>> {
        let rows: Vec<Value> = sqlx::query_scalar("SELECT data FROM documents WHERE realm_id = $1")
            .bind(realm_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(decode).collect()
    }

    async fn find_document(&self, realm_id: &str, id: &str) -> Result<Option<Document>> {
        self.fetch_scoped("documents", realm_id, id).await
    }

    async fn find_documents_by_ids(&self, realm_id: &str, ids: &[String]) -> Result<Vec<Document>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<Value> =
            sqlx::query_scalar("SELECT data FROM documents WHERE realm_id = $1 AND id = ANY($2)")
                .bind(realm_id)
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(decode).collect()
    }

    async fn insert_document(&self, document: &Document) -> Result<()> {
        sqlx::query("INSERT INTO documents (id, realm_id, data) VALUES ($1, $2, $3)")
            .bind(&document.id)
            .bind(&document.realm_id)
            .bind(encode(document)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn replace_document(&self, document: &Document) -> Result<bool> {
        let result = sqlx::query("UPDATE documents SET data = $3 WHERE id = $1 AND realm_id = $2")
            .bind(&document.id)
            .bind(&document.realm_id)
            .bind(encode(document)?)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_documents(&self, realm_id: &str, ids: &[String]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM documents WHERE realm_id = $1 AND id = ANY($2)")
            .bind(realm_id)
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
