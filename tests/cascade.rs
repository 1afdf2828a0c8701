//! Store-level tests for cascade deletes and the like toggle.

use chrono::NaiveDate;
use sqlx::PgPool;
use worship_backend::routes::board::{Comment, Like};
use worship_backend::routes::record::{RecordInput, WorshipRecord, WorshipType};
use worship_backend::routes::user::{NewUser, User};

async fn make_user(pool: &PgPool, username: &str) -> User {
    let new_user = NewUser {
        username: username.to_string(),
        real_name: format!("{username} 성도"),
        password: "grace-and-peace-7".to_string(),
    };
    User::create(pool, &new_user, 4).await.expect("user creation should succeed")
}

async fn make_record(pool: &PgPool, owner: &User, shared: bool) -> WorshipRecord {
    let input = RecordInput {
        date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        worship_type: WorshipType::Family,
        title: "가정예배".to_string(),
        content: String::new(),
        is_shared: shared,
    };
    WorshipRecord::create(pool, owner.id, &input)
        .await
        .expect("record creation should succeed")
}

async fn count(pool: &PgPool, sql: &str, id: i64) -> i64 {
    sqlx::query_scalar::<_, i64>(sql)
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn likes_on(pool: &PgPool, record_id: i64) -> i64 {
    count(pool, "SELECT COUNT(*) FROM likes WHERE record_id = $1", record_id).await
}

#[sqlx::test(migrations = "./migrations")]
async fn deleting_a_user_removes_everything_they_own(pool: PgPool) {
    let kim = make_user(&pool, "kim").await;
    let lee = make_user(&pool, "lee").await;

    let kims = make_record(&pool, &kim, true).await;
    let lees = make_record(&pool, &lee, true).await;

    // kim's activity on lee's record, lee's activity on kim's record
    Comment::create(&pool, lees.id, kim.id, "김의 댓글").await.unwrap().unwrap();
    Like::toggle(&pool, lees.id, kim.id).await.unwrap().unwrap();
    Comment::create(&pool, kims.id, lee.id, "이의 댓글").await.unwrap().unwrap();
    Like::toggle(&pool, kims.id, lee.id).await.unwrap().unwrap();

    assert!(User::delete(&pool, kim.id).await.unwrap());

    assert_eq!(count(&pool, "SELECT COUNT(*) FROM users WHERE id = $1", kim.id).await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM sessions WHERE user_id = $1", kim.id).await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM worship_records WHERE user_id = $1", kim.id).await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM comments WHERE user_id = $1", kim.id).await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM likes WHERE user_id = $1", kim.id).await, 0);
    // lee's comment and like lived on kim's record and went with it
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM comments WHERE record_id = $1", kims.id).await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM likes WHERE record_id = $1", kims.id).await, 0);

    // lee's own record survives untouched
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM worship_records WHERE user_id = $1", lee.id).await, 1);

    assert!(!User::delete(&pool, kim.id).await.unwrap());
}

#[sqlx::test(migrations = "./migrations")]
async fn deleting_a_record_removes_its_comments_and_likes(pool: PgPool) {
    let kim = make_user(&pool, "kim").await;
    let lee = make_user(&pool, "lee").await;
    let record = make_record(&pool, &kim, true).await;
    let other = make_record(&pool, &kim, true).await;

    Comment::create(&pool, record.id, lee.id, "은혜롭습니다").await.unwrap().unwrap();
    Like::toggle(&pool, record.id, lee.id).await.unwrap().unwrap();
    Like::toggle(&pool, other.id, lee.id).await.unwrap().unwrap();

    // not the owner: nothing happens
    assert!(!WorshipRecord::delete_owned(&pool, lee.id, record.id).await.unwrap());
    assert_eq!(likes_on(&pool, record.id).await, 1);

    assert!(WorshipRecord::delete_owned(&pool, kim.id, record.id).await.unwrap());
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM comments WHERE record_id = $1", record.id).await, 0);
    assert_eq!(likes_on(&pool, record.id).await, 0);
    assert_eq!(likes_on(&pool, other.id).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn like_toggle_reports_the_new_state(pool: PgPool) {
    let kim = make_user(&pool, "kim").await;
    let lee = make_user(&pool, "lee").await;
    let park = make_user(&pool, "park").await;
    let record = make_record(&pool, &kim, true).await;

    assert_eq!(Like::toggle(&pool, record.id, lee.id).await.unwrap(), Some(true));
    assert_eq!(Like::toggle(&pool, record.id, park.id).await.unwrap(), Some(true));
    assert_eq!(likes_on(&pool, record.id).await, 2);

    assert_eq!(Like::toggle(&pool, record.id, lee.id).await.unwrap(), Some(false));
    assert_eq!(likes_on(&pool, record.id).await, 1);
    assert!(!Like::exists(&pool, record.id, lee.id).await.unwrap());
    assert!(Like::exists(&pool, record.id, park.id).await.unwrap());
}

#[sqlx::test(migrations = "./migrations")]
async fn concurrent_toggles_never_duplicate_a_like(pool: PgPool) {
    let kim = make_user(&pool, "kim").await;
    let lee = make_user(&pool, "lee").await;
    let record = make_record(&pool, &kim, true).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            let (record_id, user_id) = (record.id, lee.id);
            tokio::spawn(async move { Like::toggle(&pool, record_id, user_id).await })
        })
        .collect();

    for handle in handles {
        handle
            .await
            .unwrap()
            .expect("a toggle must never fail on the unique constraint");
    }

    let rows = likes_on(&pool, record.id).await;
    assert!(rows <= 1, "at most one like per (record, user), got {rows}");
}

#[sqlx::test(migrations = "./migrations")]
async fn private_records_refuse_comments_and_likes(pool: PgPool) {
    let kim = make_user(&pool, "kim").await;
    let record = make_record(&pool, &kim, false).await;

    assert!(Comment::create(&pool, record.id, kim.id, "혼잣말").await.unwrap().is_none());
    assert!(Like::toggle(&pool, record.id, kim.id).await.unwrap().is_none());
}
