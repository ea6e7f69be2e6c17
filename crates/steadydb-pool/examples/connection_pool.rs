//! Connection pooling example.
//!
//! Runs a pool over a temporary SQLite database and shows dedicated and
//! shared connections, concurrent use, and pool status along the way.
//!
//! # Running
//!
//! ```bash
//! RUST_LOG=steadydb_pool=trace cargo run --example connection_pool
//! ```

// Allow common patterns in example code
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use steadydb_client::{SqlValue, ThreadSafety};
use steadydb_pool::{Pool, PoolError};
use steadydb_testing::TempDatabase;
use tokio::time::Instant;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let db = TempDatabase::new()?;

    println!("=== Connection Pool Example ===\n");

    let pool = Pool::builder()
        .creator(db.creator().with_thread_safety(ThreadSafety::Connection))
        .min_cached(2)
        .max_cached(4)
        .max_shared(2)
        .max_connections(6)
        .blocking(true)
        .set_session(["PRAGMA foreign_keys = ON"])
        .build()
        .await?;

    print_pool_status(&pool);

    // Example 1: Basic pool usage
    println!("\n1. Basic pool usage:");
    {
        let mut conn = pool.dedicated_connection().await?;
        conn.execute(
            "CREATE TABLE visits (id INTEGER PRIMARY KEY AUTOINCREMENT, worker INTEGER NOT NULL)",
            &[],
        )
        .await?;
        let result = conn.execute("SELECT sqlite_version()", &[]).await?;
        let version: String = result.rows[0].get(0)?;
        println!("  Connected to SQLite {version}");
        // Connection is automatically returned to pool when dropped
    }

    // Example 2: Concurrent usage
    println!("\n2. Concurrent pool usage (12 parallel inserts):");
    let start = Instant::now();
    let mut handles = vec![];

    for i in 0..12i64 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            let mut conn = pool.dedicated_connection().await?;
            conn.execute("INSERT INTO visits (worker) VALUES (?)", &[SqlValue::BigInt(i)])
                .await?;
            tokio::time::sleep(Duration::from_millis(20)).await;
            conn.release().await;
            Ok::<_, PoolError>(i)
        }));
    }

    let mut completed = 0;
    for handle in handles {
        if handle.await?.is_ok() {
            completed += 1;
        }
    }
    println!("  Completed {} inserts in {:?}", completed, start.elapsed());
    print_pool_status(&pool);

    // Example 3: Shared connections
    println!("\n3. Shared connections:");
    let mut readers = Vec::new();
    for _ in 0..4 {
        readers.push(pool.connection(true).await?);
    }
    for reader in &mut readers {
        let result = reader.execute("SELECT COUNT(*) FROM visits", &[]).await?;
        let count: i64 = result.rows[0].get(0)?;
        println!(
            "  Connection {:?} sees {} rows",
            reader.connection_id(),
            count
        );
    }
    print_pool_status(&pool);
    for reader in &mut readers {
        reader.release().await;
    }

    // Example 4: Transactions
    println!("\n4. Transaction rolled back on release:");
    {
        let mut conn = pool.dedicated_connection().await?;
        conn.begin().await?;
        conn.execute("DELETE FROM visits", &[]).await?;
        conn.release().await;

        let mut conn = pool.dedicated_connection().await?;
        let result = conn.execute("SELECT COUNT(*) FROM visits", &[]).await?;
        let count: i64 = result.rows[0].get(0)?;
        println!("  Rows after rolled back delete: {count}");
    }

    // Graceful shutdown
    println!("\n5. Graceful shutdown:");
    pool.close_all().await;
    print_pool_status(&pool);

    Ok(())
}

fn print_pool_status(pool: &Pool) {
    let status = pool.status();
    println!(
        "  Status: {} in use, {} idle, {} shared ({} shares), max {}",
        status.connections, status.idle, status.shared, status.shares, status.max_connections
    );
}
