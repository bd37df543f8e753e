//! Database-backed tests. They need a live Postgres reachable via
//! `DATABASE_URL` and are skipped by default; run with
//! `cargo test -- --ignored`.

use neomdb::controllers::events::replace_organizers;
use sqlx::PgPool;

async fn seed_member(pool: &PgPool, email: &str) -> sqlx::Result<i32> {
    sqlx::query_scalar(
        "INSERT INTO members (first_name, last_name, email, password_hash)
         VALUES ('Test', 'Member', $1, 'x') RETURNING member_id",
    )
    .bind(email)
    .fetch_one(pool)
    .await
}

async fn seed_event(pool: &PgPool) -> sqlx::Result<i64> {
    sqlx::query_scalar(
        "INSERT INTO events (name, start_date) VALUES ('Test event', CURRENT_DATE)
         RETURNING event_id",
    )
    .fetch_one(pool)
    .await
}

async fn organizers_of(pool: &PgPool, event_id: i64) -> sqlx::Result<Vec<i32>> {
    sqlx::query_scalar(
        "SELECT member_id FROM event_organizers WHERE event_id = $1 ORDER BY member_id",
    )
    .bind(event_id)
    .fetch_all(pool)
    .await
}

#[sqlx::test(migrations = "src/migrations")]
#[ignore = "needs a live Postgres"]
async fn failed_rewrite_keeps_the_old_organizer_list(pool: PgPool) -> sqlx::Result<()> {
    let keeper = seed_member(&pool, "keeper@example.com").await?;
    let newcomer = seed_member(&pool, "newcomer@example.com").await?;
    let event_id = seed_event(&pool).await?;
    sqlx::query("INSERT INTO event_organizers (event_id, member_id) VALUES ($1, $2)")
        .bind(event_id)
        .bind(keeper)
        .execute(&pool)
        .await?;

    // Second id violates the members FK; the delete must roll back with it
    let mut tx = pool.begin().await?;
    assert!(replace_organizers(&mut tx, event_id, &[newcomer, 999_999])
        .await
        .is_err());
    tx.rollback().await?;

    assert_eq!(organizers_of(&pool, event_id).await?, vec![keeper]);
    Ok(())
}

#[sqlx::test(migrations = "src/migrations")]
#[ignore = "needs a live Postgres"]
async fn successful_rewrite_replaces_the_whole_list(pool: PgPool) -> sqlx::Result<()> {
    let old = seed_member(&pool, "old@example.com").await?;
    let new_a = seed_member(&pool, "new-a@example.com").await?;
    let new_b = seed_member(&pool, "new-b@example.com").await?;
    let event_id = seed_event(&pool).await?;
    sqlx::query("INSERT INTO event_organizers (event_id, member_id) VALUES ($1, $2)")
        .bind(event_id)
        .bind(old)
        .execute(&pool)
        .await?;

    let mut tx = pool.begin().await?;
    replace_organizers(&mut tx, event_id, &[new_a, new_b]).await?;
    tx.commit().await?;

    let mut expected = vec![new_a, new_b];
    expected.sort_unstable();
    assert_eq!(organizers_of(&pool, event_id).await?, expected);
    Ok(())
}
