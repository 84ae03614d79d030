use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};

use super::{EntityStore, StatusChange, StoreError};
use crate::models::{Decision, Outcome, ReviewableItem, Status, StatusEvent, Variant};

const ITEM_COLUMNS: &str = "id, variant, status, submitted_at, decided_by, decided_at, \
     decision_notes, decision_outcome, payload, created_by, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn append_event(
        tx: &mut Transaction<'_, Postgres>,
        event: &StatusEvent,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO item_status_events (item_id, variant, from_status, to_status, actor_id, notes, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(&event.item_id)
        .bind(event.variant.as_str())
        .bind(event.from.map(|s| s.as_str()))
        .bind(event.to.as_str())
        .bind(&event.actor_id)
        .bind(&event.notes)
        .bind(event.at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn get(&self, variant: Variant, id: &str) -> Result<Option<ReviewableItem>, StoreError> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {} FROM reviewable_items WHERE variant = $1 AND id = $2",
            ITEM_COLUMNS
        ))
        .bind(variant.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ReviewableItem::try_from).transpose()
    }

    async fn insert(&self, item: &ReviewableItem, actor_id: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"INSERT INTO reviewable_items (id, variant, status, submitted_at, payload, created_by, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               ON CONFLICT (variant, id) DO NOTHING"#,
        )
        .bind(&item.id)
        .bind(item.variant.as_str())
        .bind(item.status.as_str())
        .bind(item.submitted_at)
        .bind(&item.payload)
        .bind(&item.created_by)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists(item.id.clone()));
        }

        let created = StatusEvent {
            item_id: item.id.clone(),
            variant: item.variant,
            from: None,
            to: item.status,
            actor_id: actor_id.to_string(),
            notes: None,
            at: item.created_at,
        };
        Self::append_event(&mut tx, &created).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn compare_and_set_status(
        &self,
        variant: Variant,
        id: &str,
        expected: Status,
        change: StatusChange,
    ) -> Result<ReviewableItem, StoreError> {
        let mut tx = self.pool.begin().await?;

        let decision = change.decision.as_ref();
        let updated = sqlx::query_as::<_, ItemRow>(&format!(
            r#"UPDATE reviewable_items
               SET status = $1,
                   submitted_at = COALESCE(submitted_at, $2),
                   decided_by = COALESCE($3, decided_by),
                   decided_at = COALESCE($4, decided_at),
                   decision_notes = COALESCE($5, decision_notes),
                   decision_outcome = COALESCE($6, decision_outcome),
                   updated_at = $7
               WHERE variant = $8 AND id = $9 AND status = $10
               RETURNING {}"#,
            ITEM_COLUMNS
        ))
        .bind(change.status.as_str())
        .bind(change.submitted_at)
        .bind(decision.map(|d| d.decided_by.as_str()))
        .bind(decision.map(|d| d.decided_at))
        .bind(decision.map(|d| d.notes.as_str()))
        .bind(decision.map(|d| d.outcome.as_str()))
        .bind(change.at)
        .bind(variant.as_str())
        .bind(id)
        .bind(expected.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let row = match updated {
            Some(row) => row,
            None => {
                // Nothing matched: either the item is gone or its status moved on.
                let current = sqlx::query_scalar::<_, String>(
                    "SELECT status FROM reviewable_items WHERE variant = $1 AND id = $2",
                )
                .bind(variant.as_str())
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
                tx.rollback().await?;

                return Err(match current {
                    None => StoreError::NotFound {
                        variant,
                        id: id.to_string(),
                    },
                    Some(raw) => StoreError::Conflict {
                        id: id.to_string(),
                        expected,
                        actual: parse_status(id, &raw)?,
                    },
                });
            }
        };

        Self::append_event(&mut tx, &change.event(variant, id, expected)).await?;
        tx.commit().await?;

        ReviewableItem::try_from(row)
    }

    async fn list_by_status(
        &self,
        variant: Variant,
        status: Status,
    ) -> Result<Vec<ReviewableItem>, StoreError> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {} FROM reviewable_items WHERE variant = $1 AND status = $2 \
             ORDER BY submitted_at ASC NULLS FIRST, id ASC",
            ITEM_COLUMNS
        ))
        .bind(variant.as_str())
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ReviewableItem::try_from).collect()
    }

    async fn history(&self, variant: Variant, id: &str) -> Result<Vec<StatusEvent>, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM reviewable_items WHERE variant = $1 AND id = $2)",
        )
        .bind(variant.as_str())
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        if !exists {
            return Err(StoreError::NotFound {
                variant,
                id: id.to_string(),
            });
        }

        let rows = sqlx::query_as::<_, EventRow>(
            r#"SELECT item_id, from_status, to_status, actor_id, notes, created_at
               FROM item_status_events
               WHERE variant = $1 AND item_id = $2
               ORDER BY seq ASC"#,
        )
        .bind(variant.as_str())
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<StatusEvent, StoreError> {
                Ok(StatusEvent {
                    from: row
                        .from_status
                        .as_deref()
                        .map(|s| parse_status(&row.item_id, s))
                        .transpose()?,
                    to: parse_status(&row.item_id, &row.to_status)?,
                    variant,
                    actor_id: row.actor_id,
                    notes: row.notes,
                    at: row.created_at,
                    item_id: row.item_id,
                })
            })
            .collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn parse_status(id: &str, raw: &str) -> Result<Status, StoreError> {
    raw.parse().map_err(|reason| StoreError::Corrupt {
        id: id.to_string(),
        reason,
    })
}

// -- Row types --

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ItemRow {
    pub id: String,
    pub variant: String,
    pub status: String,
    pub submitted_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decision_notes: Option<String>,
    pub decision_outcome: Option<String>,
    pub payload: serde_json::Value,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ItemRow> for ReviewableItem {
    type Error = StoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| StoreError::Corrupt {
            id: row.id.clone(),
            reason,
        };
        let variant: Variant = row.variant.parse().map_err(corrupt)?;
        let status = parse_status(&row.id, &row.status)?;

        let decision = match (row.decided_by, row.decided_at, row.decision_outcome) {
            (Some(decided_by), Some(decided_at), Some(outcome)) => Some(Decision {
                decided_by,
                decided_at,
                notes: row.decision_notes.unwrap_or_default(),
                outcome: outcome.parse::<Outcome>().map_err(corrupt)?,
            }),
            (None, None, None) => None,
            _ => return Err(corrupt("partially written decision".to_string())),
        };

        Ok(ReviewableItem {
            id: row.id,
            variant,
            status,
            submitted_at: row.submitted_at,
            decision,
            payload: row.payload,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    pub item_id: String,
    pub from_status: Option<String>,
    pub to_status: String,
    pub actor_id: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
