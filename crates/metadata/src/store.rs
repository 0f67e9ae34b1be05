//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{CategoryRepo, MapRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: CategoryRepo + MapRepo + Send + Sync {
    /// Create missing tables where the backend allows it.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check that both tables are reachable.
    async fn health_check(&self) -> MetadataResult<()>;

    /// Get the name of this metadata backend ("hosted", "sqlite").
    fn backend_name(&self) -> &'static str;
}

/// SQLite-based metadata store for offline use and tests.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and apply the schema.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        Self::connect(opts).await
    }

    /// Open a private in-memory database.
    pub async fn in_memory() -> MetadataResult<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        Self::connect(opts).await
    }

    async fn connect(opts: SqliteConnectOptions) -> MetadataResult<Self> {
        // A single connection serializes writers and keeps in-memory
        // databases alive for the lifetime of the pool.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Insert the default categories that are not present yet.
    pub async fn seed_default_categories(&self) -> MetadataResult<u64> {
        let mut inserted = 0;
        for name in mapas_core::category::DEFAULT_CATEGORIES {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO categorias (id, nome, criado_em) VALUES (?, ?, ?)",
            )
            .bind(uuid::Uuid::new_v4())
            .bind(name)
            .bind(time::OffsetDateTime::now_utc())
            .execute(&self.pool)
            .await?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1 FROM categorias LIMIT 1")
            .execute(&self.pool)
            .await?;
        sqlx::query("SELECT 1 FROM maps LIMIT 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

mod sqlite_impl {
    use super::*;
    use crate::models::{CategoryRow, MapRow};
    use mapas_core::{Category, CategoryId, CoordinateUpdate, MapId, MapRecord, NewMap};
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn map_from_row(row: MapRow) -> MetadataResult<MapRecord> {
        MapRecord::try_from(row)
    }

    fn duplicate_name(e: sqlx::Error, name: &str) -> MetadataError {
        if let sqlx::Error::Database(db) = &e
            && db.is_unique_violation()
        {
            return MetadataError::AlreadyExists(format!("category '{name}'"));
        }
        MetadataError::Database(e)
    }

    #[async_trait]
    impl CategoryRepo for SqliteStore {
        async fn list_categories(&self) -> MetadataResult<Vec<Category>> {
            let rows = sqlx::query_as::<_, CategoryRow>(
                "SELECT id, nome, criado_em FROM categorias ORDER BY nome COLLATE NOCASE",
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(rows.into_iter().map(Category::from).collect())
        }

        async fn get_category(&self, id: CategoryId) -> MetadataResult<Option<Category>> {
            let row = sqlx::query_as::<_, CategoryRow>(
                "SELECT id, nome, criado_em FROM categorias WHERE id = ?",
            )
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
            Ok(row.map(Category::from))
        }

        async fn insert_category(&self, name: &str) -> MetadataResult<Category> {
            let row = CategoryRow {
                id: Uuid::new_v4(),
                nome: name.to_string(),
                criado_em: OffsetDateTime::now_utc(),
            };
            sqlx::query("INSERT INTO categorias (id, nome, criado_em) VALUES (?, ?, ?)")
                .bind(row.id)
                .bind(&row.nome)
                .bind(row.criado_em)
                .execute(&self.pool)
                .await
                .map_err(|e| duplicate_name(e, name))?;
            Ok(row.into())
        }

        async fn rename_category(&self, id: CategoryId, name: &str) -> MetadataResult<()> {
            let result = sqlx::query("UPDATE categorias SET nome = ? WHERE id = ?")
                .bind(name)
                .bind(id.as_uuid())
                .execute(&self.pool)
                .await
                .map_err(|e| duplicate_name(e, name))?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("category {id}")));
            }
            Ok(())
        }

        async fn delete_category(&self, id: CategoryId) -> MetadataResult<()> {
            let result = sqlx::query("DELETE FROM categorias WHERE id = ?")
                .bind(id.as_uuid())
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("category {id}")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl MapRepo for SqliteStore {
        async fn list_maps(&self) -> MetadataResult<Vec<MapRecord>> {
            let rows = sqlx::query_as::<_, MapRow>(
                "SELECT * FROM maps ORDER BY criado_em DESC, rowid DESC",
            )
            .fetch_all(&self.pool)
            .await?;
            rows.into_iter().map(map_from_row).collect()
        }

        async fn get_map(&self, id: MapId) -> MetadataResult<Option<MapRecord>> {
            let row = sqlx::query_as::<_, MapRow>("SELECT * FROM maps WHERE id = ?")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
            row.map(map_from_row).transpose()
        }

        async fn find_map_by_file_url(&self, file_url: &str) -> MetadataResult<Option<MapRecord>> {
            let row = sqlx::query_as::<_, MapRow>(
                "SELECT * FROM maps WHERE arquivo_url = ? ORDER BY criado_em LIMIT 1",
            )
            .bind(file_url)
            .fetch_optional(&self.pool)
            .await?;
            row.map(map_from_row).transpose()
        }

        async fn insert_map(&self, map: &NewMap) -> MetadataResult<MapRecord> {
            let row = MapRow {
                id: Uuid::new_v4(),
                nome: map.name.clone(),
                fazenda: map.farm.clone(),
                categoria_id: map.category_id.map(|c| *c.as_uuid()),
                arquivo_url: map.file_url.clone(),
                anotacoes: "{}".to_string(),
                latitude: None,
                longitude: None,
                criado_em: OffsetDateTime::now_utc(),
            };
            sqlx::query(
                "INSERT INTO maps (id, nome, fazenda, categoria_id, arquivo_url, anotacoes, criado_em) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(row.id)
            .bind(&row.nome)
            .bind(&row.fazenda)
            .bind(row.categoria_id)
            .bind(&row.arquivo_url)
            .bind(&row.anotacoes)
            .bind(row.criado_em)
            .execute(&self.pool)
            .await?;
            map_from_row(row)
        }

        async fn update_coordinates(
            &self,
            id: MapId,
            update: CoordinateUpdate,
        ) -> MetadataResult<()> {
            let result = sqlx::query("UPDATE maps SET latitude = ?, longitude = ? WHERE id = ?")
                .bind(update.latitude)
                .bind(update.longitude)
                .bind(id.as_uuid())
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("map {id}")));
            }
            Ok(())
        }

        async fn update_annotations(
            &self,
            id: MapId,
            annotations: &serde_json::Value,
        ) -> MetadataResult<()> {
            let result = sqlx::query("UPDATE maps SET anotacoes = ? WHERE id = ?")
                .bind(annotations.to_string())
                .bind(id.as_uuid())
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("map {id}")));
            }
            Ok(())
        }

        async fn set_category(&self, ids: &[MapId], category: CategoryId) -> MetadataResult<u64> {
            let mut tx = self.pool.begin().await?;
            let mut count = 0;
            for id in ids {
                let result = sqlx::query("UPDATE maps SET categoria_id = ? WHERE id = ?")
                    .bind(category.as_uuid())
                    .bind(id.as_uuid())
                    .execute(&mut *tx)
                    .await?;
                count += result.rows_affected();
            }
            tx.commit().await?;
            Ok(count)
        }

        async fn delete_map(&self, id: MapId) -> MetadataResult<()> {
            let result = sqlx::query("DELETE FROM maps WHERE id = ?")
                .bind(id.as_uuid())
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("map {id}")));
            }
            Ok(())
        }

        async fn category_references(&self) -> MetadataResult<Vec<Option<CategoryId>>> {
            let rows: Vec<(Option<Uuid>,)> = sqlx::query_as("SELECT categoria_id FROM maps")
                .fetch_all(&self.pool)
                .await?;
            Ok(rows
                .into_iter()
                .map(|(id,)| id.map(CategoryId::from_uuid))
                .collect())
        }
    }
}

/// SQL schema for SQLite, mirroring the hosted tables.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS categorias (
    id BLOB PRIMARY KEY,
    nome TEXT NOT NULL,
    criado_em TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_categorias_nome ON categorias(nome COLLATE NOCASE);

CREATE TABLE IF NOT EXISTS maps (
    id BLOB PRIMARY KEY,
    nome TEXT NOT NULL,
    fazenda TEXT NOT NULL,
    categoria_id BLOB REFERENCES categorias(id),
    arquivo_url TEXT NOT NULL,
    anotacoes TEXT NOT NULL DEFAULT '{}',
    latitude REAL,
    longitude REAL,
    criado_em TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_maps_criado_em ON maps(criado_em);
CREATE INDEX IF NOT EXISTS idx_maps_arquivo_url ON maps(arquivo_url);
CREATE INDEX IF NOT EXISTS idx_maps_categoria ON maps(categoria_id);
"#;
