//! Statement construction tests.
//!
//! These run the builders against the mock driver, which records every
//! statement it receives, so the generated SQL and the connection traffic
//! can be checked exactly.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use steadydb_client::{ErrorKind, SqlValue};
use steadydb_orm::prelude::*;
use steadydb_orm::{FieldError, JoinItem, JoinRepository, OrmError, Repository, RepositoryOptions};
use steadydb_pool::Pool;
use steadydb_testing::{MockCreator, MockResponse};

#[derive(Debug, Default, Clone, PartialEq, Record)]
struct Song {
    id: Option<i64>,
    #[record(required)]
    title: String,
    #[record(default = 3)]
    rating: i64,
    #[record(map_json)]
    tags: Vec<String>,
    ct: Option<NaiveDateTime>,
    ut: Option<NaiveDateTime>,
}

#[derive(Debug, Default, Clone, PartialEq, Record)]
struct Singer {
    id: Option<i64>,
    name: String,
}

async fn pool(creator: &MockCreator) -> Pool {
    Pool::builder()
        .creator(creator.clone())
        .build()
        .await
        .expect("Failed to create pool")
}

fn songs(pool: &Pool) -> Repository<Song> {
    Repository::new(pool.clone(), "song")
}

// =============================================================================
// Update validation
// =============================================================================

#[tokio::test]
async fn test_update_without_set_fails_before_acquire() {
    let creator = MockCreator::new();
    let pool = pool(&creator).await;

    let err = songs(&pool)
        .update()
        .eq("id", 1i64)
        .execute()
        .await
        .unwrap_err();

    assert!(matches!(err, OrmError::NoUpdateField));
    assert!(err.is_configuration());
    assert_eq!(creator.stats().connects(), 0);
    assert_eq!(creator.stats().executes(), 0);
}

#[tokio::test]
async fn test_update_without_where_fails_before_acquire() {
    let creator = MockCreator::new();
    let pool = pool(&creator).await;

    let err = songs(&pool)
        .update()
        .set("title", "Blue".to_string())
        .unwrap()
        .execute()
        .await
        .unwrap_err();

    assert!(matches!(err, OrmError::UnsafeUpdate));
    assert_eq!(creator.stats().connects(), 0);
    assert_eq!(creator.stats().executes(), 0);
}

#[tokio::test]
async fn test_timestamp_alone_is_not_an_update() {
    let creator = MockCreator::new();
    let pool = pool(&creator).await;

    // `ut` is filled automatically, but does not count as a SET item.
    let err = songs(&pool).update().eq("id", 1i64).build().unwrap_err();
    assert!(matches!(err, OrmError::NoUpdateField));
}

#[tokio::test]
async fn test_set_unknown_field() {
    let creator = MockCreator::new();
    let pool = pool(&creator).await;

    let err = songs(&pool).update().set("artist", 1i64).unwrap_err();
    assert!(matches!(
        err,
        OrmError::UnknownField { ref entity, ref field } if entity == "Song" && field == "artist"
    ));
}

// =============================================================================
// Update statements
// =============================================================================

#[tokio::test]
async fn test_update_statement_and_params() {
    let seen: Arc<Mutex<Vec<SqlValue>>> = Arc::default();
    let captured = Arc::clone(&seen);
    let creator = MockCreator::builder()
        .with_default_response(MockResponse::custom(move |_, params| {
            *captured.lock().unwrap() = params.to_vec();
            MockResponse::affected(2)
        }))
        .build();
    let pool = pool(&creator).await;

    let affected = songs(&pool)
        .update()
        .set("title", "Blue".to_string())
        .unwrap()
        .set("tags", vec!["a".to_string(), "b".to_string()])
        .unwrap()
        .eq("id", 7i64)
        .execute()
        .await
        .unwrap();

    assert_eq!(affected, 2);
    assert_eq!(
        creator.stats().statements(),
        vec!["UPDATE `song` SET `title` = ?, `tags` = ?, `ut` = ? WHERE (`id` = ?)"]
    );
    assert_eq!(creator.stats().commits(), 1);

    let params = seen.lock().unwrap().clone();
    assert_eq!(params.len(), 4);
    assert_eq!(params[0], SqlValue::Text("Blue".into()));
    assert_eq!(params[1], SqlValue::Text(r#"["a","b"]"#.into()));
    assert!(matches!(params[2], SqlValue::DateTime(_)));
    assert_eq!(params[3], SqlValue::BigInt(7));
}

#[tokio::test]
async fn test_update_raw_set_and_no_fill() {
    let creator = MockCreator::new();
    let pool = pool(&creator).await;

    let (sql, params) = songs(&pool)
        .update()
        .fill_time(false)
        .set_sql("`rating` = `rating` + ?")
        .push_params([SqlValue::BigInt(1)])
        .gt("rating", 2i64)
        .build()
        .unwrap();

    assert_eq!(sql, "UPDATE `song` SET `rating` = `rating` + ? WHERE (`rating` > ?)");
    assert_eq!(params, vec![SqlValue::BigInt(1), SqlValue::BigInt(2)]);
}

#[tokio::test]
async fn test_explicit_timestamp_is_not_duplicated() {
    let creator = MockCreator::new();
    let pool = pool(&creator).await;

    let (sql, params) = songs(&pool)
        .update()
        .set("ut", None::<NaiveDateTime>)
        .unwrap()
        .eq("id", 1i64)
        .build()
        .unwrap();

    assert_eq!(sql, "UPDATE `song` SET `ut` = ? WHERE (`id` = ?)");
    assert_eq!(params, vec![SqlValue::Null, SqlValue::BigInt(1)]);
}

// =============================================================================
// Insert
// =============================================================================

#[tokio::test]
async fn test_insert_backfills_identity() {
    let expected_sql = "INSERT INTO `song` (`title`, `rating`, `tags`, `ct`, `ut`) VALUES (?, ?, ?, ?, ?)";
    let creator = MockCreator::builder()
        .with_response(expected_sql, MockResponse::inserted(42))
        .build();
    let pool = pool(&creator).await;
    let repo = songs(&pool);
    assert_eq!(repo.insert_sql(), expected_sql);

    let mut song = Song {
        title: "Blue".into(),
        ..Song::default()
    };
    let id = repo.insert(&mut song).await.unwrap();

    assert_eq!(id, Some(42));
    assert_eq!(song.id, Some(42));
    assert!(song.ct.is_some());
    assert_eq!(song.ct, song.ut);
    assert_eq!(creator.stats().commits(), 1);
}

#[tokio::test]
async fn test_insert_without_generated_identity() {
    let creator = MockCreator::new();
    let pool = pool(&creator).await;

    let mut song = Song::default();
    let err = songs(&pool).insert(&mut song).await.unwrap_err();
    assert!(matches!(err, OrmError::MissingIdentity { ref table } if table == "song"));
    assert_eq!(song.id, None);
}

#[tokio::test]
async fn test_insert_without_time_fill() {
    let creator = MockCreator::builder()
        .with_default_response(MockResponse::inserted(1))
        .build();
    let pool = pool(&creator).await;
    let repo: Repository<Song> = Repository::with_options(
        pool.clone(),
        "song",
        RepositoryOptions::new().fill_time(false),
    );

    let mut song = Song::default();
    repo.insert(&mut song).await.unwrap();
    assert_eq!(song.ct, None);
    assert_eq!(song.ut, None);
}

#[tokio::test]
async fn test_failed_write_returns_connection() {
    let creator = MockCreator::new();
    let pool = pool(&creator).await;
    creator.fail_next_execute(ErrorKind::Integrity);

    let mut song = Song::default();
    let err = songs(&pool).insert(&mut song).await.unwrap_err();
    assert!(matches!(err, OrmError::Pool(_)));
    assert_eq!(creator.stats().commits(), 0);
    assert_eq!(pool.status().connections, 0);
}

// =============================================================================
// Queries
// =============================================================================

#[tokio::test]
async fn test_select_sql() {
    let creator = MockCreator::new();
    let pool = pool(&creator).await;
    let repo = songs(&pool);

    assert_eq!(
        repo.query().sql(),
        "SELECT `id`, `title`, `rating`, `tags`, `ct`, `ut` FROM `song`"
    );

    let query = repo
        .query()
        .select(&["title", "id"])
        .unwrap()
        .eq("rating", 5i64)
        .or()
        .like("title", "Bl")
        .order_desc("rating");
    assert_eq!(
        query.sql(),
        "SELECT `title`, `id` FROM `song` WHERE (`rating` = ?) OR (`title` LIKE '%Bl%') \
         ORDER BY `rating` DESC, `id` DESC"
    );

    assert_eq!(
        repo.query().order("title").sql(),
        "SELECT `id`, `title`, `rating`, `tags`, `ct`, `ut` FROM `song` ORDER BY `title`"
    );
}

#[tokio::test]
async fn test_select_unknown_field() {
    let creator = MockCreator::new();
    let pool = pool(&creator).await;

    let err = songs(&pool).query().select(&["title", "plays"]).unwrap_err();
    assert!(matches!(err, OrmError::UnknownField { ref field, .. } if field == "plays"));
}

#[tokio::test]
async fn test_page_with_no_matches_skips_page_query() {
    let count_sql = "SELECT COUNT(*) FROM `song` WHERE (`rating` > ?)";
    let creator = MockCreator::builder()
        .with_response(count_sql, MockResponse::scalar(0i64))
        .build();
    let pool = pool(&creator).await;

    let (rows, total) = songs(&pool).query().gt("rating", 4i64).page(1, 10).await.unwrap();

    assert!(rows.is_empty());
    assert_eq!(total, 0);
    assert_eq!(creator.stats().statements(), vec![count_sql]);
}

#[tokio::test]
async fn test_page_limit_offset() {
    let creator = MockCreator::builder()
        .with_default_response(MockResponse::custom(|sql, _| {
            if sql.starts_with("SELECT COUNT(*)") {
                MockResponse::scalar(7i64)
            } else {
                MockResponse::rows(["id", "title"], Vec::new())
            }
        }))
        .build();
    let pool = pool(&creator).await;
    let repo = songs(&pool);

    let (_, total) = repo
        .query()
        .select(&["id", "title"])
        .unwrap()
        .page_rows(3, 3)
        .await
        .unwrap();
    assert_eq!(total, 7);

    // Page 0 is read as page 1.
    repo.query().page_rows(0, 5).await.unwrap();

    let statements = creator.stats().statements();
    assert_eq!(statements.len(), 4);
    assert_eq!(statements[1], "SELECT `id`, `title` FROM `song` LIMIT 6, 3");
    assert!(statements[3].ends_with("FROM `song` LIMIT 0, 5"));
}

#[tokio::test]
async fn test_get_first_adds_limit() {
    let creator = MockCreator::builder()
        .with_default_response(MockResponse::rows(
            ["id", "title", "rating", "tags", "ct", "ut"],
            vec![vec![
                SqlValue::BigInt(1),
                SqlValue::Text("Blue".into()),
                SqlValue::BigInt(4),
                SqlValue::Text(r#"["x"]"#.into()),
                SqlValue::Null,
                SqlValue::Null,
            ]],
        ))
        .build();
    let pool = pool(&creator).await;

    let song = songs(&pool).query().eq("id", 1i64).get_first().await.unwrap().unwrap();

    assert_eq!(song.id, Some(1));
    assert_eq!(song.title, "Blue");
    assert_eq!(song.tags, vec!["x".to_string()]);
    assert_eq!(
        creator.stats().statements(),
        vec!["SELECT `id`, `title`, `rating`, `tags`, `ct`, `ut` FROM `song` WHERE (`id` = ?) LIMIT 1"]
    );
}

#[tokio::test]
async fn test_null_column_decodes_to_default() {
    let creator = MockCreator::builder()
        .with_default_response(MockResponse::rows(
            ["title", "rating"],
            vec![vec![SqlValue::Null, SqlValue::Null]],
        ))
        .build();
    let pool = pool(&creator).await;

    let rows = songs(&pool)
        .query()
        .select(&["title", "rating"])
        .unwrap()
        .get_list()
        .await
        .unwrap();
    assert_eq!(rows, vec![Song::default()]);
}

#[tokio::test]
async fn test_decode_error_is_validation() {
    let creator = MockCreator::builder()
        .with_default_response(MockResponse::rows(
            ["rating"],
            vec![vec![SqlValue::Text("high".into())]],
        ))
        .build();
    let pool = pool(&creator).await;

    let err = songs(&pool)
        .query()
        .select(&["rating"])
        .unwrap()
        .get_list()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrmError::Validation(FieldError::TypeMismatch { ref field, .. }) if field == "rating"
    ));
}

#[tokio::test]
async fn test_in_list_and_count() {
    let count_sql = "SELECT COUNT(*) FROM `song` WHERE (`id` IN (?, ?, ?))";
    let creator = MockCreator::builder()
        .with_response(count_sql, MockResponse::scalar(3i64))
        .build();
    let pool = pool(&creator).await;

    let total = songs(&pool)
        .query()
        .in_list("id", [1i64, 2, 3])
        .count()
        .await
        .unwrap();
    assert_eq!(total, 3);
}

// =============================================================================
// Joins
// =============================================================================

#[tokio::test]
async fn test_join_sql() {
    let creator = MockCreator::new();
    let pool = pool(&creator).await;

    let repo = JoinRepository::<(Song, Singer)>::new(
        pool,
        vec![
            JoinItem::new("song", "s"),
            JoinItem::new("singer", "g").on("g.id = s.rating"),
        ],
    )
    .unwrap();

    assert_eq!(
        repo.select_sql(),
        "SELECT s.id, s.title, s.rating, s.tags, s.ct, s.ut, g.id, g.name \
         FROM `song` s LEFT JOIN `singer` g ON g.id = s.rating"
    );
    assert_eq!(
        repo.query().eq("s.id", 1i64).order_desc("g.name").sql(),
        format!("{} WHERE (s.id = ?) ORDER BY g.name DESC", repo.select_sql())
    );
}

#[tokio::test]
async fn test_join_validation() {
    let creator = MockCreator::new();
    let pool = pool(&creator).await;

    let err = JoinRepository::<(Song, Singer)>::new(pool.clone(), vec![JoinItem::new("song", "s")])
        .unwrap_err();
    assert!(matches!(err, OrmError::JoinArity { expected: 2, actual: 1 }));

    let err = JoinRepository::<(Song, Singer)>::new(
        pool,
        vec![
            JoinItem::new("song", "s"),
            JoinItem::new("singer", "s").on("s.id = s.id"),
        ],
    )
    .unwrap_err();
    assert!(matches!(err, OrmError::DuplicateAlias(ref alias) if alias == "s"));
    assert!(err.is_configuration());
}
