//! SQLite-backed storage for categories, classes and their weekly instances.
//!
//! Every read of class instances goes through [`ScheduleStore::list_instances`],
//! which takes the soft-delete [`Visibility`] as an explicit argument.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use thiserror::Error;
use tracing::info;

use crate::models::{
    CategoryName, ClassCategory, ClassInput, ClassInstance, InstanceInput, TrainingClass,
    Visibility, Weekday,
};
use crate::validation::{validate_class_name, validate_time_range};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("{0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Malformed stored value: {0}")]
    Corrupt(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Filter for the instance read path.
#[derive(Debug, Clone, Copy)]
pub struct InstanceQuery {
    pub id: Option<i64>,
    pub weekday: Option<Weekday>,
    pub category: Option<CategoryName>,
    pub updated_since: Option<DateTime<Utc>>,
    pub visibility: Visibility,
}

impl InstanceQuery {
    pub fn new(visibility: Visibility) -> Self {
        Self {
            id: None,
            weekday: None,
            category: None,
            updated_since: None,
            visibility,
        }
    }

    pub fn weekday(mut self, weekday: Weekday) -> Self {
        self.weekday = Some(weekday);
        self
    }

    pub fn category(mut self, category: Option<CategoryName>) -> Self {
        self.category = category;
        self
    }

    pub fn updated_since(mut self, cutoff: DateTime<Utc>) -> Self {
        self.updated_since = Some(cutoff);
        self
    }

    fn id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}

#[derive(Clone)]
pub struct ScheduleStore {
    pool: SqlitePool,
}

impl ScheduleStore {
    /// Opens (creating if needed) the database at `url` and applies migrations.
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let filename = options.get_filename();
        let in_memory = filename == Path::new(":memory:") || url.contains(":memory:");
        if !in_memory {
            if let Some(parent) = filename.parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // every connection to an in-memory database sees its own empty schema
        let max_connections = if in_memory { 1 } else { max_connections.max(1) };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        MIGRATOR.run(&pool).await?;
        info!(url, max_connections, "schedule database ready");
        Ok(Self { pool })
    }

    pub async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    pub async fn list_categories(&self) -> StoreResult<Vec<ClassCategory>> {
        let rows = sqlx::query(
            "SELECT id, category, created, updated FROM class_category ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(category_from_row).collect()
    }

    pub async fn get_category(&self, id: i64) -> StoreResult<ClassCategory> {
        let row = sqlx::query("SELECT id, category, created, updated FROM class_category WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "category",
                id,
            })?;
        category_from_row(&row)
    }

    pub async fn create_category(&self, category: CategoryName) -> StoreResult<ClassCategory> {
        let now = encode_timestamp(Utc::now());
        let result = sqlx::query(
            "INSERT INTO class_category (category, created, updated) VALUES (?, ?, ?)",
        )
        .bind(category.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        self.get_category(result.last_insert_rowid()).await
    }

    pub async fn update_category(
        &self,
        id: i64,
        category: CategoryName,
    ) -> StoreResult<ClassCategory> {
        let result = sqlx::query("UPDATE class_category SET category = ?, updated = ? WHERE id = ?")
            .bind(category.as_str())
            .bind(encode_timestamp(Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "category",
                id,
            });
        }
        self.get_category(id).await
    }

    pub async fn delete_category(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM class_category WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "category",
                id,
            });
        }
        Ok(())
    }

    pub async fn list_classes(&self) -> StoreResult<Vec<TrainingClass>> {
        let rows = sqlx::query(
            "SELECT id, name, deleted, created, updated FROM training_class ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        let ids: Vec<i64> = rows
            .iter()
            .map(|row| row.try_get("id"))
            .collect::<Result<_, _>>()?;
        let mut categories = self.categories_for_classes(&ids).await?;
        rows.iter()
            .map(|row| {
                let id: i64 = row.try_get("id")?;
                class_from_row(row, categories.remove(&id).unwrap_or_default())
            })
            .collect()
    }

    pub async fn get_class(&self, id: i64) -> StoreResult<TrainingClass> {
        let row = sqlx::query(
            "SELECT id, name, deleted, created, updated FROM training_class WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound { entity: "class", id })?;
        let mut categories = self.categories_for_classes(&[id]).await?;
        class_from_row(&row, categories.remove(&id).unwrap_or_default())
    }

    pub async fn create_class(&self, input: &ClassInput) -> StoreResult<TrainingClass> {
        let name = validate_class_name(&input.name)?;
        let now = encode_timestamp(Utc::now());

        let mut tx = self.pool.begin().await?;
        for category_id in &input.categories {
            ensure_exists(&mut tx, "class_category", "category", *category_id).await?;
        }
        let result = sqlx::query(
            "INSERT INTO training_class (name, deleted, created, updated) VALUES (?, ?, ?, ?)",
        )
        .bind(&name)
        .bind(i64::from(input.deleted))
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        let id = result.last_insert_rowid();
        link_categories(&mut tx, id, &input.categories).await?;
        tx.commit().await?;

        self.get_class(id).await
    }

    pub async fn update_class(&self, id: i64, input: &ClassInput) -> StoreResult<TrainingClass> {
        let name = validate_class_name(&input.name)?;

        let mut tx = self.pool.begin().await?;
        ensure_exists(&mut tx, "training_class", "class", id).await?;
        for category_id in &input.categories {
            ensure_exists(&mut tx, "class_category", "category", *category_id).await?;
        }
        sqlx::query("UPDATE training_class SET name = ?, deleted = ?, updated = ? WHERE id = ?")
            .bind(&name)
            .bind(i64::from(input.deleted))
            .bind(encode_timestamp(Utc::now()))
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM training_class_categories WHERE class_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        link_categories(&mut tx, id, &input.categories).await?;
        tx.commit().await?;

        self.get_class(id).await
    }

    /// Hard delete; the class's instances go with it.
    pub async fn delete_class(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM training_class WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "class", id });
        }
        Ok(())
    }

    /// The single read path for class instances, ordered by weekday then start time.
    pub async fn list_instances(&self, query: &InstanceQuery) -> StoreResult<Vec<ClassInstance>> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT ci.id, ci.class_id, tc.name AS class_name, ci.weekday, ci.start_time, \
             ci.end_time, ci.time_span, ci.deleted, ci.created, ci.updated \
             FROM class_instance ci JOIN training_class tc ON tc.id = ci.class_id WHERE 1 = 1",
        );
        if let Some(id) = query.id {
            builder.push(" AND ci.id = ").push_bind(id);
        }
        if let Some(weekday) = query.weekday {
            builder.push(" AND ci.weekday = ").push_bind(weekday.to_string());
        }
        if let Some(category) = query.category {
            builder
                .push(
                    " AND EXISTS (SELECT 1 FROM training_class_categories tcc \
                     JOIN class_category cc ON cc.id = tcc.category_id \
                     WHERE tcc.class_id = ci.class_id AND cc.category = ",
                )
                .push_bind(category.as_str())
                .push(")");
        }
        if let Some(cutoff) = query.updated_since {
            builder
                .push(" AND ci.updated >= ")
                .push_bind(encode_timestamp(cutoff));
        }
        if query.visibility == Visibility::ActiveOnly {
            builder.push(" AND ci.deleted = 0 AND tc.deleted = 0");
        }
        builder.push(" ORDER BY ci.weekday, ci.start_time, ci.id");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(instance_from_row).collect()
    }

    pub async fn get_instance(&self, id: i64) -> StoreResult<ClassInstance> {
        let query = InstanceQuery::new(Visibility::IncludeDeleted).id(id);
        self.list_instances(&query)
            .await?
            .into_iter()
            .next()
            .ok_or(StoreError::NotFound {
                entity: "instance",
                id,
            })
    }

    pub async fn create_instance(&self, input: &InstanceInput) -> StoreResult<ClassInstance> {
        let range = validate_time_range(input.start_time, input.end_time, input.time_span)?;
        let now = encode_timestamp(Utc::now());

        let mut tx = self.pool.begin().await?;
        ensure_exists(&mut tx, "training_class", "class", input.class_id).await?;
        let result = sqlx::query(
            "INSERT INTO class_instance \
             (class_id, weekday, start_time, end_time, time_span, deleted, created, updated) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(input.class_id)
        .bind(input.weekday.to_string())
        .bind(encode_time(range.start))
        .bind(encode_time(range.end))
        .bind(range.span_minutes)
        .bind(i64::from(input.deleted))
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        self.get_instance(result.last_insert_rowid()).await
    }

    pub async fn update_instance(
        &self,
        id: i64,
        input: &InstanceInput,
    ) -> StoreResult<ClassInstance> {
        let range = validate_time_range(input.start_time, input.end_time, input.time_span)?;

        let mut tx = self.pool.begin().await?;
        ensure_exists(&mut tx, "class_instance", "instance", id).await?;
        ensure_exists(&mut tx, "training_class", "class", input.class_id).await?;
        sqlx::query(
            "UPDATE class_instance SET class_id = ?, weekday = ?, start_time = ?, end_time = ?, \
             time_span = ?, deleted = ?, updated = ? WHERE id = ?",
        )
        .bind(input.class_id)
        .bind(input.weekday.to_string())
        .bind(encode_time(range.start))
        .bind(encode_time(range.end))
        .bind(range.span_minutes)
        .bind(i64::from(input.deleted))
        .bind(encode_timestamp(Utc::now()))
        .bind(id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        self.get_instance(id).await
    }

    pub async fn delete_instance(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM class_instance WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "instance",
                id,
            });
        }
        Ok(())
    }

    /// Categories attached to each of `class_ids`, in link order.
    pub async fn categories_for_classes(
        &self,
        class_ids: &[i64],
    ) -> StoreResult<HashMap<i64, Vec<ClassCategory>>> {
        let mut by_class: HashMap<i64, Vec<ClassCategory>> = HashMap::new();
        if class_ids.is_empty() {
            return Ok(by_class);
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT tcc.class_id, cc.id, cc.category, cc.created, cc.updated \
             FROM training_class_categories tcc \
             JOIN class_category cc ON cc.id = tcc.category_id \
             WHERE tcc.class_id IN (",
        );
        let mut ids = builder.separated(", ");
        for id in class_ids {
            ids.push_bind(*id);
        }
        ids.push_unseparated(") ORDER BY tcc.class_id, cc.id");

        let rows = builder.build().fetch_all(&self.pool).await?;
        for row in &rows {
            let class_id: i64 = row.try_get("class_id")?;
            by_class
                .entry(class_id)
                .or_default()
                .push(category_from_row(row)?);
        }
        Ok(by_class)
    }
}

async fn ensure_exists(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    table: &'static str,
    entity: &'static str,
    id: i64,
) -> StoreResult<()> {
    let found = sqlx::query(&format!("SELECT 1 FROM {table} WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
    match found {
        Some(_) => Ok(()),
        None => Err(StoreError::NotFound { entity, id }),
    }
}

async fn link_categories(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    class_id: i64,
    category_ids: &[i64],
) -> StoreResult<()> {
    for category_id in category_ids {
        sqlx::query(
            "INSERT OR IGNORE INTO training_class_categories (class_id, category_id) VALUES (?, ?)",
        )
        .bind(class_id)
        .bind(category_id)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

pub(crate) fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| StoreError::Corrupt(format!("timestamp {raw:?}: {err}")))
}

fn encode_time(value: NaiveTime) -> String {
    value.format(TIME_FORMAT).to_string()
}

fn decode_time(raw: &str) -> StoreResult<NaiveTime> {
    NaiveTime::parse_from_str(raw, TIME_FORMAT)
        .map_err(|err| StoreError::Corrupt(format!("time {raw:?}: {err}")))
}

fn category_from_row(row: &SqliteRow) -> StoreResult<ClassCategory> {
    let label: String = row.try_get("category")?;
    let created: String = row.try_get("created")?;
    let updated: String = row.try_get("updated")?;
    Ok(ClassCategory {
        id: row.try_get("id")?,
        category: label.parse().map_err(StoreError::Corrupt)?,
        created: decode_timestamp(&created)?,
        updated: decode_timestamp(&updated)?,
    })
}

fn class_from_row(row: &SqliteRow, categories: Vec<ClassCategory>) -> StoreResult<TrainingClass> {
    let deleted: i64 = row.try_get("deleted")?;
    let created: String = row.try_get("created")?;
    let updated: String = row.try_get("updated")?;
    Ok(TrainingClass {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        categories,
        deleted: deleted != 0,
        created: decode_timestamp(&created)?,
        updated: decode_timestamp(&updated)?,
    })
}

fn instance_from_row(row: &SqliteRow) -> StoreResult<ClassInstance> {
    let weekday: String = row.try_get("weekday")?;
    let start_time: String = row.try_get("start_time")?;
    let end_time: String = row.try_get("end_time")?;
    let deleted: i64 = row.try_get("deleted")?;
    let created: String = row.try_get("created")?;
    let updated: String = row.try_get("updated")?;
    Ok(ClassInstance {
        id: row.try_get("id")?,
        class_id: row.try_get("class_id")?,
        class_name: row.try_get("class_name")?,
        weekday: weekday.parse().map_err(StoreError::Corrupt)?,
        start_time: decode_time(&start_time)?,
        end_time: decode_time(&end_time)?,
        time_span: row.try_get("time_span")?,
        deleted: deleted != 0,
        created: decode_timestamp(&created)?,
        updated: decode_timestamp(&updated)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) async fn memory_store() -> ScheduleStore {
        ScheduleStore::connect("sqlite::memory:", 1).await.unwrap()
    }

    pub(crate) fn slot(class_id: i64, weekday: Weekday, start: (u32, u32), end: (u32, u32)) -> InstanceInput {
        InstanceInput {
            class_id,
            weekday,
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            time_span: None,
            deleted: false,
        }
    }

    pub(crate) fn class_input(name: &str, categories: Vec<i64>) -> ClassInput {
        ClassInput {
            name: name.to_string(),
            categories,
            deleted: false,
        }
    }

    #[tokio::test]
    async fn test_create_instance_derives_time_span() {
        let store = memory_store().await;
        let class = store.create_class(&class_input("Boxing", vec![])).await.unwrap();
        let instance = store
            .create_instance(&slot(class.id, Weekday::Monday, (18, 0), (19, 30)))
            .await
            .unwrap();
        assert_eq!(instance.time_span, 90);
        assert_eq!(instance.class_name, "Boxing");
        assert_eq!(instance.start_time, NaiveTime::from_hms_opt(18, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_create_instance_rejects_inverted_range() {
        let store = memory_store().await;
        let class = store.create_class(&class_input("Boxing", vec![])).await.unwrap();
        let err = store
            .create_instance(&slot(class.id, Weekday::Monday, (19, 0), (18, 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_instance_stores_whole_seconds() {
        let store = memory_store().await;
        let class = store.create_class(&class_input("Boxing", vec![])).await.unwrap();
        let mut input = slot(class.id, Weekday::Monday, (18, 0), (19, 0));
        input.start_time = NaiveTime::from_hms_milli_opt(18, 0, 0, 500).unwrap();

        let instance = store.create_instance(&input).await.unwrap();

        assert_eq!(instance.start_time, NaiveTime::from_hms_opt(18, 0, 0).unwrap());
        assert_eq!(instance.time_span, 60);
        assert_eq!(
            instance.time_span,
            (instance.end_time - instance.start_time).num_minutes()
        );
    }

    #[tokio::test]
    async fn test_create_instance_within_one_second_is_invalid() {
        let store = memory_store().await;
        let class = store.create_class(&class_input("Boxing", vec![])).await.unwrap();
        let mut input = slot(class.id, Weekday::Monday, (18, 0), (19, 0));
        input.start_time = NaiveTime::from_hms_milli_opt(18, 0, 0, 200).unwrap();
        input.end_time = NaiveTime::from_hms_milli_opt(18, 0, 0, 800).unwrap();

        let err = store.create_instance(&input).await.unwrap_err();

        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_instance_unknown_class() {
        let store = memory_store().await;
        let err = store
            .create_instance(&slot(42, Weekday::Monday, (6, 0), (7, 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "class", id: 42 }));
    }

    #[tokio::test]
    async fn test_delete_class_cascades_to_instances() {
        let store = memory_store().await;
        let class = store.create_class(&class_input("BJJ", vec![])).await.unwrap();
        let instance = store
            .create_instance(&slot(class.id, Weekday::Friday, (10, 0), (11, 0)))
            .await
            .unwrap();
        store.delete_class(class.id).await.unwrap();
        assert!(matches!(
            store.get_instance(instance.id).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_visibility_predicate() {
        let store = memory_store().await;
        let class = store.create_class(&class_input("MMA", vec![])).await.unwrap();
        store
            .create_instance(&slot(class.id, Weekday::Monday, (9, 0), (10, 0)))
            .await
            .unwrap();
        let mut hidden = slot(class.id, Weekday::Monday, (11, 0), (12, 0));
        hidden.deleted = true;
        store.create_instance(&hidden).await.unwrap();

        let all = store
            .list_instances(&InstanceQuery::new(Visibility::IncludeDeleted))
            .await
            .unwrap();
        let active = store
            .list_instances(&InstanceQuery::new(Visibility::ActiveOnly))
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(active.len(), 1);
        assert!(!active[0].deleted);
    }

    #[tokio::test]
    async fn test_update_class_replaces_categories() {
        let store = memory_store().await;
        let striking = store.create_category(CategoryName::Striking).await.unwrap();
        let fitness = store.create_category(CategoryName::Fitness).await.unwrap();
        let class = store
            .create_class(&class_input("Kickboxing", vec![striking.id]))
            .await
            .unwrap();
        assert_eq!(class.categories.len(), 1);

        let updated = store
            .update_class(class.id, &class_input("Kickboxing", vec![fitness.id]))
            .await
            .unwrap();
        assert_eq!(updated.categories.len(), 1);
        assert_eq!(updated.categories[0].category, CategoryName::Fitness);
    }

    #[tokio::test]
    async fn test_create_class_unknown_category() {
        let store = memory_store().await;
        let err = store
            .create_class(&class_input("Judo", vec![7]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "category", id: 7 }));
        assert!(store.list_classes().await.unwrap().is_empty());
    }
}
