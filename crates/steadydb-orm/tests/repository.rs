//! Repository tests against a real SQLite database.
//!
//! Each test gets a fresh database file in a temporary directory, so
//! inserts, pagination and joins run genuine SQL.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::json;
use steadydb_orm::prelude::*;
use steadydb_orm::{FieldError, JoinItem, JoinRepository, JsonField, OrmError, Repository};
use steadydb_pool::Pool;
use steadydb_testing::{TempDatabase, TestFixture, init_tracing};

#[derive(Debug, Default, Clone, PartialEq, Record)]
struct Song {
    id: Option<i64>,
    #[record(required)]
    title: String,
    #[record(default = 3)]
    rating: i64,
    plays: f64,
    active: bool,
    released: Option<NaiveDate>,
    #[record(map_json)]
    tags: Vec<String>,
    #[record(map_json)]
    meta: BTreeMap<String, i64>,
    cover: Option<Bytes>,
    singer_id: Option<i64>,
    ct: Option<NaiveDateTime>,
    ut: Option<NaiveDateTime>,
    #[record(skip)]
    label: String,
}

/// Subset of `Song` with one field the table does not have.
#[derive(Debug, Default, Clone, PartialEq, Record)]
struct SongTitle {
    id: Option<i64>,
    title: String,
    lyrics: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Record)]
struct Singer {
    id: Option<i64>,
    #[record(required)]
    name: String,
}

#[derive(Debug, Default, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct Credits {
    writer: String,
    year: i32,
}

#[derive(Debug, Default, Clone, PartialEq, Record)]
struct Album {
    id: Option<i64>,
    #[record(rename = "album_title", alias = "name")]
    title: String,
    #[record(map_json)]
    credits: JsonField<Credits>,
}

fn fixture() -> TestFixture {
    TestFixture::new()
        .with_table(
            "song",
            "id INTEGER PRIMARY KEY AUTOINCREMENT, title TEXT NOT NULL, rating INTEGER NOT NULL, \
             plays REAL, active INTEGER, released TEXT, tags TEXT, meta TEXT, cover BLOB, \
             singer_id INTEGER, ct TEXT, ut TEXT",
        )
        .with_table(
            "singer",
            "id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL",
        )
        .with_table(
            "album",
            "id INTEGER PRIMARY KEY AUTOINCREMENT, album_title TEXT, credits TEXT",
        )
}

async fn setup() -> (TempDatabase, Pool) {
    init_tracing();
    let db = TempDatabase::new().expect("Failed to create database");
    let pool = Pool::builder()
        .creator(db.creator())
        .max_cached(4)
        .build()
        .await
        .expect("Failed to create pool");

    let mut conn = pool.dedicated_connection().await.unwrap();
    for sql in fixture().create_sql() {
        conn.execute(&sql, &[]).await.unwrap();
    }
    conn.release().await;
    (db, pool)
}

fn song(title: &str, rating: i64) -> Song {
    Song {
        title: title.to_string(),
        rating,
        ..Song::default()
    }
}

async fn insert_songs(repo: &Repository<Song>, count: i64) {
    for n in 1..=count {
        repo.insert(&mut song(&format!("song {n}"), n)).await.unwrap();
    }
}

// =============================================================================
// Insert and read back
// =============================================================================

#[tokio::test]
async fn test_insert_round_trip() {
    let (_db, pool) = setup().await;
    let repo = Repository::<Song>::new(pool, "song");

    let mut input = Song {
        title: "Blue".into(),
        rating: 5,
        plays: 12.5,
        active: true,
        released: NaiveDate::from_ymd_opt(2021, 3, 9),
        tags: vec!["jazz".into(), "live".into()],
        meta: BTreeMap::from([("bpm".to_string(), 92)]),
        cover: Some(Bytes::from_static(b"\x89PNG")),
        label: "not stored".into(),
        ..Song::default()
    };
    let id = repo.insert(&mut input).await.unwrap();
    assert_eq!(id, Some(1));
    assert_eq!(input.id, Some(1));
    assert!(input.ct.is_some());

    let stored = repo.query().eq("id", 1i64).get_first().await.unwrap().unwrap();
    assert_eq!(
        stored,
        Song {
            label: String::new(),
            ..input
        }
    );
}

#[tokio::test]
async fn test_get_first_without_match() {
    let (_db, pool) = setup().await;
    let repo = Repository::<Song>::new(pool, "song");

    assert_eq!(repo.query().eq("id", 99i64).get_first().await.unwrap(), None);
    assert!(repo.query().get_list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rename_alias_and_json_field() {
    let (_db, pool) = setup().await;
    let repo = Repository::<Album>::new(pool, "album");

    let mut album = Album {
        title: "Kind of Blue".into(),
        credits: JsonField(Credits {
            writer: "Miles".into(),
            year: 1959,
        }),
        ..Album::default()
    };
    repo.insert(&mut album).await.unwrap();

    let stored = repo.query().get_first().await.unwrap().unwrap();
    assert_eq!(stored, album);

    let map = stored.to_alias_map().unwrap();
    assert_eq!(map["name"], json!("Kind of Blue"));
    assert_eq!(map["credits"], json!({"writer": "Miles", "year": 1959}));

    let maps = repo.query().get_list_maps().await.unwrap();
    assert_eq!(maps[0]["album_title"], json!("Kind of Blue"));
}

#[tokio::test]
async fn test_nullable_columns_read_as_defaults() {
    let (_db, pool) = setup().await;
    let mut conn = pool.dedicated_connection().await.unwrap();
    conn.execute("INSERT INTO album (album_title, credits) VALUES (NULL, NULL)", &[])
        .await
        .unwrap();
    conn.commit().await.unwrap();
    conn.release().await;

    let repo = Repository::<Album>::new(pool, "album");
    let stored = repo.query().get_first().await.unwrap().unwrap();
    assert!(stored.id.is_some());
    assert_eq!(stored.title, "");
    assert_eq!(stored.credits, JsonField::default());
}

// =============================================================================
// Pagination
// =============================================================================

#[tokio::test]
async fn test_page_two_of_seven() {
    let (_db, pool) = setup().await;
    let repo = Repository::<Song>::new(pool, "song");
    insert_songs(&repo, 7).await;

    let (rows, total) = repo.query().order("id").page(2, 3).await.unwrap();
    assert_eq!(total, 7);
    let titles: Vec<_> = rows.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, ["song 4", "song 5", "song 6"]);
}

#[tokio::test]
async fn test_page_beyond_end() {
    let (_db, pool) = setup().await;
    let repo = Repository::<Song>::new(pool, "song");
    insert_songs(&repo, 7).await;

    let (rows, total) = repo.query().order("id").page(4, 3).await.unwrap();
    assert!(rows.is_empty());
    assert_eq!(total, 7);

    let (rows, total) = repo.query().gt("rating", 100i64).page(1, 3).await.unwrap();
    assert!(rows.is_empty());
    assert_eq!(total, 0);
}

#[tokio::test]
async fn test_order_desc_and_filters() {
    let (_db, pool) = setup().await;
    let repo = Repository::<Song>::new(pool, "song");
    insert_songs(&repo, 7).await;

    let songs = repo
        .query()
        .gt("rating", 5i64)
        .or()
        .lt("rating", 2i64)
        .order_desc("rating")
        .get_list()
        .await
        .unwrap();
    let ratings: Vec<_> = songs.iter().map(|s| s.rating).collect();
    assert_eq!(ratings, [7, 6, 1]);

    let found = repo.query().like("title", "song 3").count().await.unwrap();
    assert_eq!(found, 1);

    let found = repo.query().in_list("id", [2i64, 4, 40]).count().await.unwrap();
    assert_eq!(found, 2);

    let found = repo
        .query()
        .in_list("id", Vec::<i64>::new())
        .count()
        .await
        .unwrap();
    assert_eq!(found, 0);

    let only_even = true;
    let found = repo
        .query()
        .filter_if(only_even, |q| q.where_sql("`rating` % 2 = ?", [0i64.into()]))
        .count()
        .await
        .unwrap();
    assert_eq!(found, 3);
}

// =============================================================================
// Result shapes
// =============================================================================

#[tokio::test]
async fn test_select_subset_keeps_defaults() {
    let (_db, pool) = setup().await;
    let repo = Repository::<Song>::new(pool, "song");
    let mut input = song("Blue", 4);
    input.tags = vec!["a".into()];
    repo.insert(&mut input).await.unwrap();

    let stored = repo
        .query()
        .select(&["title", "tags"])
        .unwrap()
        .get_first()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "Blue");
    assert_eq!(stored.tags, vec!["a".to_string()]);
    assert_eq!(stored.id, None);
    assert_eq!(stored.rating, 0);
}

#[tokio::test]
async fn test_rows_and_maps() {
    let (_db, pool) = setup().await;
    let repo = Repository::<Song>::new(pool, "song");
    let mut input = song("Blue", 4);
    input.tags = vec!["a".into(), "b".into()];
    input.active = true;
    repo.insert(&mut input).await.unwrap();

    let row = repo
        .query()
        .select(&["id", "title"])
        .unwrap()
        .get_first_row()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.get::<i64>(0).unwrap(), 1);
    assert_eq!(row.get::<String>(1).unwrap(), "Blue");

    let maps = repo
        .query()
        .select(&["title", "tags", "active", "released"])
        .unwrap()
        .get_list_maps()
        .await
        .unwrap();
    assert_eq!(
        serde_json::Value::Object(maps[0].clone()),
        json!({"title": "Blue", "tags": ["a", "b"], "active": true, "released": null})
    );
}

#[tokio::test]
async fn test_projection_into_other_record() {
    let (_db, pool) = setup().await;
    let repo = Repository::<Song>::new(pool, "song");
    insert_songs(&repo, 4).await;

    let titles: Vec<SongTitle> = repo.query().order("id").get_list_as().await.unwrap();
    assert_eq!(titles.len(), 4);
    assert_eq!(
        titles[0],
        SongTitle {
            id: Some(1),
            title: "song 1".into(),
            lyrics: None,
        }
    );

    let (page, total) = repo
        .query()
        .order("id")
        .page_as::<SongTitle>(2, 3)
        .await
        .unwrap();
    assert_eq!(total, 4);
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].title, "song 4");
}

// =============================================================================
// Update
// =============================================================================

#[tokio::test]
async fn test_update_matching_rows() {
    let (_db, pool) = setup().await;
    let repo = Repository::<Song>::new(pool, "song");
    insert_songs(&repo, 5).await;
    let before = repo.query().eq("id", 2i64).get_first().await.unwrap().unwrap();

    let affected = repo
        .update()
        .set("tags", vec!["edited".to_string()])
        .unwrap()
        .set_sql("`rating` = `rating` * ?")
        .push_params([10i64.into()])
        .lt("rating", 3i64)
        .execute()
        .await
        .unwrap();
    assert_eq!(affected, 2);

    let after = repo.query().eq("id", 2i64).get_first().await.unwrap().unwrap();
    assert_eq!(after.rating, 20);
    assert_eq!(after.tags, vec!["edited".to_string()]);
    assert_eq!(after.ct, before.ct);
    assert!(after.ut >= before.ut);

    let untouched = repo.query().eq("id", 3i64).get_first().await.unwrap().unwrap();
    assert_eq!(untouched.rating, 3);
}

#[tokio::test]
async fn test_unsafe_update_leaves_rows() {
    let (_db, pool) = setup().await;
    let repo = Repository::<Song>::new(pool, "song");
    insert_songs(&repo, 2).await;

    let err = repo
        .update()
        .set("rating", 0i64)
        .unwrap()
        .execute()
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::UnsafeUpdate));
    assert_eq!(repo.query().eq("rating", 0i64).count().await.unwrap(), 0);
}

// =============================================================================
// Input maps
// =============================================================================

#[tokio::test]
async fn test_insert_from_input_map() {
    let (_db, pool) = setup().await;
    let repo = Repository::<Song>::new(pool, "song");

    let input = json!({"title": "  Blue  ", "tags": ["x"], "singerId": 4});
    let mut record = Song::from_map(input.as_object().unwrap()).unwrap();
    assert_eq!(record.rating, 3);
    assert_eq!(record.singer_id, Some(4));
    repo.insert(&mut record).await.unwrap();

    let stored = repo.query().get_first().await.unwrap().unwrap();
    assert_eq!(stored.title, "Blue");
    assert_eq!(stored.singer_id, Some(4));

    let err = Song::from_map(json!({"rating": 1}).as_object().unwrap()).unwrap_err();
    assert!(matches!(err, FieldError::Required { ref field } if field == "title"));

    let err = Song::from_map(json!({"title": "x", "rating": "high"}).as_object().unwrap())
        .unwrap_err();
    assert!(matches!(err, FieldError::TypeMismatch { ref field, .. } if field == "rating"));
}

// =============================================================================
// Joins
// =============================================================================

#[tokio::test]
async fn test_left_join() {
    let (_db, pool) = setup().await;
    let singers = Repository::<Singer>::new(pool.clone(), "singer");
    let songs = Repository::<Song>::new(pool.clone(), "song");

    let mut singer = Singer {
        name: "Nina".into(),
        ..Singer::default()
    };
    singers.insert(&mut singer).await.unwrap();
    for n in 1..=3 {
        let mut s = song(&format!("song {n}"), n);
        // The last song has no singer.
        s.singer_id = singer.id.filter(|_| n < 3);
        songs.insert(&mut s).await.unwrap();
    }

    let join = JoinRepository::<(Song, Singer)>::new(
        pool,
        vec![
            JoinItem::new("song", "s"),
            JoinItem::new("singer", "g").on("g.id = s.singer_id"),
        ],
    )
    .unwrap();

    let rows = join.query().order("s.id").get_list().await.unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].0.title, "song 1");
    assert_eq!(rows[0].1.name, "Nina");
    assert_eq!(rows[0].1.id, singer.id);
    // No matching singer: every column is NULL and the record stays at
    // its default.
    assert_eq!(rows[2].0.singer_id, None);
    assert_eq!(rows[2].1, Singer::default());
    assert!(rows[2].1.name.is_empty());

    assert_eq!(join.query().eq("g.name", "Nina").count().await.unwrap(), 2);

    let (page, total) = join
        .query()
        .eq("g.name", "Nina")
        .order_desc("s.id")
        .page(1, 1)
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(page[0].0.title, "song 2");
}
