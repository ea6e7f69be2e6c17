//! Statement execution shared by the builders.
//!
//! Reads run on shareable connections. Writes run on a dedicated
//! connection and are committed before it goes back to the pool.

use steadydb_client::{QueryResult, Row, SqlValue};
use steadydb_pool::{Pool, PoolConnection};

use crate::error::Result;

/// Run a query and collect every row.
async fn rows(conn: &mut PoolConnection, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
    tracing::debug!(sql, params = params.len(), "query");
    let mut cursor = conn.cursor().await?;
    cursor.execute(sql, params).await?;
    let rows = cursor.fetch_all()?;
    tracing::debug!(rows = rows.len(), "query returned");
    Ok(rows)
}

/// Run a `COUNT(*)` query.
async fn count(conn: &mut PoolConnection, sql: &str, params: &[SqlValue]) -> Result<u64> {
    let rows = rows(conn, sql, params).await?;
    match rows.first() {
        Some(row) => Ok(row.get::<u64>(0)?),
        None => Ok(0),
    }
}

pub(crate) async fn fetch(pool: &Pool, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
    let mut conn = pool.connection(true).await?;
    let result = rows(&mut conn, sql, params).await;
    conn.release().await;
    result
}

pub(crate) async fn fetch_count(pool: &Pool, sql: &str, params: &[SqlValue]) -> Result<u64> {
    let mut conn = pool.connection(true).await?;
    let result = count(&mut conn, sql, params).await;
    conn.release().await;
    result
}

/// Count the matches, then fetch one page of them on the same connection.
///
/// Page indices start at 1; 0 is read as 1. No page query is issued when
/// nothing matches.
pub(crate) async fn fetch_page(
    pool: &Pool,
    count_sql: &str,
    select_sql: &str,
    params: &[SqlValue],
    index: u64,
    size: u64,
) -> Result<(Vec<Row>, u64)> {
    let mut conn = pool.connection(true).await?;
    let result = async {
        let total = count(&mut conn, count_sql, params).await?;
        tracing::debug!(total, "page total");
        if total == 0 {
            return Ok((Vec::new(), 0));
        }
        let offset = size.saturating_mul(index.max(1) - 1);
        let sql = format!("{select_sql} LIMIT {offset}, {size}");
        Ok((rows(&mut conn, &sql, params).await?, total))
    }
    .await;
    conn.release().await;
    result
}

/// Execute one write statement and commit it.
pub(crate) async fn write(pool: &Pool, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
    tracing::debug!(sql, params = params.len(), "write");
    let mut conn = pool.dedicated_connection().await?;
    let result = match conn.execute(sql, params).await {
        Ok(result) => conn.commit().await.map(|()| result),
        Err(e) => Err(e),
    };
    conn.release().await;
    let result = result?;
    tracing::debug!(affected = result.rows_affected, "write committed");
    Ok(result)
}
