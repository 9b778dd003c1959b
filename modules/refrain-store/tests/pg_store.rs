//! Postgres round trips. Skipped unless DATABASE_TEST_URL points at a scratch database.

use std::collections::HashSet;

use refrain_common::time::mid_year_ms;
use refrain_common::{Comment, TargetRecord, Tier};
use refrain_store::{CommentStore, PgCommentStore, RawFilter};

async fn store() -> Option<PgCommentStore> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let store = PgCommentStore::connect(&url).await.ok()?;
    store.migrate().await.ok()?;
    Some(store)
}

fn unique_target() -> String {
    format!("pg-test-{}", refrain_common::time::now_ms())
}

#[tokio::test]
async fn insert_is_idempotent_and_reads_skip_deleted() {
    let Some(store) = store().await else {
        eprintln!("DATABASE_TEST_URL not set, skipping");
        return;
    };
    let target = unique_target();
    store.upsert_target(&TargetRecord::new(&target)).await.unwrap();

    let a = Comment::new(format!("{target}-a"), &target, "青春回忆", 1200, Some(mid_year_ms(2018)), Tier::Hot);
    let b = Comment::new(format!("{target}-b"), &target, "好听", 3, Some(mid_year_ms(2021)), Tier::Recent);

    let first = store.insert_new(&[a.clone(), b.clone()]).await.unwrap();
    let second = store.insert_new(&[a.clone()]).await.unwrap();
    assert_eq!(first.inserted, 2);
    assert_eq!(second.skipped, 1);
    assert_eq!(store.count(&target).await.unwrap(), 2);

    let in_2018 = store
        .raw(&target, RawFilter { year: Some(2018), min_engagement: 0, limit: 10 })
        .await
        .unwrap();
    assert_eq!(in_2018.len(), 1);
    assert_eq!(in_2018[0].tier, Tier::Hot);

    let seen: HashSet<String> = [a.id.clone()].into_iter().collect();
    assert_eq!(store.mark_missing(&target, &seen, 1).await.unwrap(), 1);
    assert_eq!(store.count(&target).await.unwrap(), 1);

    let refreshed = store.observe(&[b.clone()], 2).await.unwrap();
    assert_eq!(refreshed.refreshed, 1);
    assert_eq!(store.count(&target).await.unwrap(), 2);

    let found = store.search(&target, "回忆", 0, 5).await.unwrap();
    assert_eq!(found.total, 1);
}
