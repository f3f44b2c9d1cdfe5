//! # Postgres store
//!
//! Shared-table layout over two JSONB tables. Each row keeps the record
//! verbatim in `doc`; filters become containment (`doc @> $1`) so one GIN
//! index serves every equality lookup the services issue.
//!
//! The pool connects lazily and the schema is created on first use, so
//! building the adapter never blocks on the network.

use async_trait::async_trait;
use domains::{
    BoardName, Collection, ContainerInfo, DeleteOutcome, Document, DocumentStore, Filter, FindQuery,
    Mutation, MutationOp, SortDirection, StoreError, StoreLayout, StoreResult, StoreTransaction,
    Table, UpdateOutcome,
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgExecutor, PgPool, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{Postgres, Row, Transaction};
use tokio::sync::OnceCell;
use uuid::Uuid;

const SCHEMA: [&str; 6] = [
    "CREATE TABLE IF NOT EXISTS threads (id UUID PRIMARY KEY, board TEXT NOT NULL, doc JSONB NOT NULL)",
    "CREATE INDEX IF NOT EXISTS threads_doc_idx ON threads USING GIN (doc jsonb_path_ops)",
    "CREATE INDEX IF NOT EXISTS threads_board_idx ON threads (board)",
    "CREATE TABLE IF NOT EXISTS replies (id UUID PRIMARY KEY, board TEXT NOT NULL, doc JSONB NOT NULL)",
    "CREATE INDEX IF NOT EXISTS replies_doc_idx ON replies USING GIN (doc jsonb_path_ops)",
    "CREATE INDEX IF NOT EXISTS replies_board_idx ON replies (board)",
];

pub struct PostgresStore {
    pool: PgPool,
    schema: OnceCell<()>,
}

impl PostgresStore {
    pub fn connect_lazy(url: &SecretString, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(url.expose_secret())
            .map_err(map_sqlx)?;
        Ok(Self {
            pool,
            schema: OnceCell::new(),
        })
    }

    /// The pool, once the schema is known to exist.
    async fn ready(&self) -> StoreResult<&PgPool> {
        self.schema
            .get_or_try_init(|| async {
                for statement in SCHEMA {
                    sqlx::query(statement)
                        .execute(&self.pool)
                        .await
                        .map_err(map_sqlx)?;
                }
                tracing::info!("postgres schema ready");
                Ok::<(), StoreError>(())
            })
            .await?;
        Ok(&self.pool)
    }
}

fn map_sqlx(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Configuration(_) => StoreError::Connection(err.to_string()),
        other => StoreError::Backend(other.to_string()),
    }
}

fn table_name(table: Table) -> &'static str {
    table.as_str()
}

/// A positional parameter collected while building dynamic SQL.
#[derive(Debug, Clone, PartialEq)]
enum Bind {
    Text(String),
    Json(Value),
    Int(i64),
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    binds: Vec<Bind>,
) -> Query<'q, Postgres, PgArguments> {
    for bind in binds {
        query = match bind {
            Bind::Text(text) => query.bind(text),
            Bind::Json(json) => query.bind(json),
            Bind::Int(n) => query.bind(n),
        };
    }
    query
}

/// Builds the `SET doc = ...` expression for a mutation.
///
/// Placeholders start at `$first`; the returned binds are in placeholder order.
fn mutation_sql(mutation: &Mutation, first: usize) -> (String, Vec<Bind>) {
    let mut expr = String::from("doc");
    let mut binds = Vec::new();
    let mut n = first;

    for op in mutation.ops() {
        let (field, value) = (n, n + 1);
        expr = match op {
            MutationOp::Set(name, v) => {
                binds.push(Bind::Text(name.clone()));
                binds.push(Bind::Json(v.clone()));
                format!("jsonb_set({expr}, ARRAY[${field}]::text[], ${value}::jsonb, true)")
            }
            MutationOp::AppendText(name, suffix) => {
                binds.push(Bind::Text(name.clone()));
                binds.push(Bind::Text(suffix.clone()));
                format!(
                    "jsonb_set({expr}, ARRAY[${field}]::text[], \
                     to_jsonb(coalesce(({expr})->>${field}, '') || ${value}::text), true)"
                )
            }
            MutationOp::Push(name, v) => {
                binds.push(Bind::Text(name.clone()));
                binds.push(Bind::Json(v.clone()));
                format!(
                    "jsonb_set({expr}, ARRAY[${field}]::text[], \
                     coalesce(({expr})->${field}, '[]'::jsonb) || jsonb_build_array(${value}::jsonb), true)"
                )
            }
        };
        n += 2;
    }
    (expr, binds)
}

fn filter_bind(filter: &Filter) -> Bind {
    Bind::Json(Value::Object(filter.to_document()))
}

fn record_id(record: &mut Document) -> StoreResult<Uuid> {
    match record.get("id") {
        Some(Value::String(raw)) => Uuid::parse_str(raw)
            .map_err(|e| StoreError::Backend(format!("invalid record id '{raw}': {e}"))),
        Some(other) => Err(StoreError::Backend(format!("invalid record id {other}"))),
        None => {
            let id = Uuid::now_v7();
            record.insert("id".into(), Value::String(id.to_string()));
            Ok(id)
        }
    }
}

async fn insert_with<'e>(
    exec: impl PgExecutor<'e>,
    target: &Collection,
    mut record: Document,
) -> StoreResult<Uuid> {
    let id = record_id(&mut record)?;
    let sql = format!(
        "INSERT INTO {} (id, board, doc) VALUES ($1, $2, $3)",
        table_name(target.table)
    );
    sqlx::query(&sql)
        .bind(id)
        .bind(target.board.as_str())
        .bind(Value::Object(record))
        .execute(exec)
        .await
        .map_err(map_sqlx)?;
    Ok(id)
}

async fn update_one_with<'e>(
    exec: impl PgExecutor<'e>,
    target: &Collection,
    filter: &Filter,
    mutation: &Mutation,
) -> StoreResult<UpdateOutcome> {
    let table = table_name(target.table);
    let (expr, mut binds) = mutation_sql(mutation, 2);
    binds.insert(0, filter_bind(filter));

    let sql = format!(
        "UPDATE {table} SET doc = {expr} \
         WHERE id = (SELECT id FROM {table} WHERE doc @> $1::jsonb LIMIT 1 FOR UPDATE)"
    );
    let result = bind_all(sqlx::query(&sql), binds)
        .execute(exec)
        .await
        .map_err(map_sqlx)?;
    Ok(UpdateOutcome {
        matched_count: result.rows_affected(),
    })
}

async fn delete_with<'e>(
    exec: impl PgExecutor<'e>,
    target: &Collection,
    filter: &Filter,
    only_first: bool,
) -> StoreResult<DeleteOutcome> {
    let table = table_name(target.table);
    let sql = if only_first {
        format!(
            "DELETE FROM {table} \
             WHERE id = (SELECT id FROM {table} WHERE doc @> $1::jsonb LIMIT 1 FOR UPDATE)"
        )
    } else {
        format!("DELETE FROM {table} WHERE doc @> $1::jsonb")
    };
    let result = bind_all(sqlx::query(&sql), vec![filter_bind(filter)])
        .execute(exec)
        .await
        .map_err(map_sqlx)?;
    Ok(DeleteOutcome {
        deleted_count: result.rows_affected(),
    })
}

async fn find_with<'e>(
    exec: impl PgExecutor<'e>,
    target: &Collection,
    query: &FindQuery,
) -> StoreResult<Vec<Document>> {
    let mut sql = format!(
        "SELECT doc FROM {} WHERE doc @> $1::jsonb",
        table_name(target.table)
    );
    let mut binds = vec![filter_bind(&query.filter)];

    if let Some(sort) = &query.sort {
        let direction = match sort.direction {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        };
        binds.push(Bind::Text(sort.field.clone()));
        sql.push_str(&format!(
            " ORDER BY doc->>${n} {direction}, id {direction}",
            n = binds.len()
        ));
    }
    if let Some(limit) = query.limit {
        binds.push(Bind::Int(limit as i64));
        sql.push_str(&format!(" LIMIT ${}", binds.len()));
    }

    let rows = bind_all(sqlx::query(&sql), binds)
        .fetch_all(exec)
        .await
        .map_err(map_sqlx)?;

    rows.into_iter()
        .map(|row| match row.try_get::<Value, _>("doc").map_err(map_sqlx)? {
            Value::Object(doc) => Ok(query.project_document(doc)),
            other => Err(StoreError::Backend(format!("non-object record {other}"))),
        })
        .collect()
}

#[async_trait]
impl DocumentStore for PostgresStore {
    fn layout(&self) -> StoreLayout {
        StoreLayout::SharedTable
    }

    async fn insert(&self, target: &Collection, record: Document) -> StoreResult<Uuid> {
        insert_with(self.ready().await?, target, record).await
    }

    async fn update_one(
        &self,
        target: &Collection,
        filter: &Filter,
        mutation: &Mutation,
    ) -> StoreResult<UpdateOutcome> {
        update_one_with(self.ready().await?, target, filter, mutation).await
    }

    async fn delete_one(&self, target: &Collection, filter: &Filter) -> StoreResult<DeleteOutcome> {
        delete_with(self.ready().await?, target, filter, true).await
    }

    async fn delete_many(&self, target: &Collection, filter: &Filter) -> StoreResult<DeleteOutcome> {
        delete_with(self.ready().await?, target, filter, false).await
    }

    async fn find(&self, target: &Collection, query: &FindQuery) -> StoreResult<Vec<Document>> {
        find_with(self.ready().await?, target, query).await
    }

    async fn begin(&self) -> StoreResult<Option<Box<dyn StoreTransaction>>> {
        let tx = self.ready().await?.begin().await.map_err(map_sqlx)?;
        Ok(Some(Box::new(PostgresTransaction { tx })))
    }

    async fn create_container(&self, _board: &BoardName) -> StoreResult<bool> {
        Err(StoreError::Unsupported("containers on the postgres store"))
    }

    async fn read_container(&self, _board: &BoardName) -> StoreResult<Option<ContainerInfo>> {
        Err(StoreError::Unsupported("containers on the postgres store"))
    }

    async fn drop_container(&self, _board: &BoardName) -> StoreResult<bool> {
        Err(StoreError::Unsupported("containers on the postgres store"))
    }
}

pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn insert(&mut self, target: &Collection, record: Document) -> StoreResult<Uuid> {
        insert_with(&mut *self.tx, target, record).await
    }

    async fn update_one(
        &mut self,
        target: &Collection,
        filter: &Filter,
        mutation: &Mutation,
    ) -> StoreResult<UpdateOutcome> {
        update_one_with(&mut *self.tx, target, filter, mutation).await
    }

    async fn delete_many(&mut self, target: &Collection, filter: &Filter) -> StoreResult<DeleteOutcome> {
        delete_with(&mut *self.tx, target, filter, false).await
    }

    async fn find(&mut self, target: &Collection, query: &FindQuery) -> StoreResult<Vec<Document>> {
        find_with(&mut *self.tx, target, query).await
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await.map_err(map_sqlx)
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await.map_err(map_sqlx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_mutation_leaves_doc_untouched() {
        let (expr, binds) = mutation_sql(&Mutation::new(), 2);
        assert_eq!(expr, "doc");
        assert!(binds.is_empty());
    }

    #[test]
    fn mutation_placeholders_follow_the_filter() {
        let mutation = Mutation::new()
            .set("reported", true)
            .push("replies", "r1");
        let (expr, binds) = mutation_sql(&mutation, 2);

        assert!(expr.starts_with("jsonb_set(jsonb_set(doc, ARRAY[$2]::text[], $3::jsonb, true)"));
        assert!(expr.contains("->$4"));
        assert!(expr.contains("jsonb_build_array($5::jsonb)"));
        assert_eq!(
            binds,
            vec![
                Bind::Text("reported".into()),
                Bind::Json(json!(true)),
                Bind::Text("replies".into()),
                Bind::Json(json!("r1")),
            ]
        );
    }

    #[test]
    fn append_reads_the_current_text() {
        let (expr, _) = mutation_sql(&Mutation::new().append_text("text", " (edited)"), 2);
        assert!(expr.contains("coalesce((doc)->>$2, '') || $3::text"));
    }
}
