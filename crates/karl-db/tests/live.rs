//! Live integration tests for `karl-db`, using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/karl-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use chrono::{TimeZone, Utc};
use karl_core::{AddProduct, Confidence, ProductBase, SupermarketId, VolumeMeasure};
use karl_db::{product_store, tag_store, DbError};
use sqlx::PgPool;

async fn insert_supermarket(pool: &PgPool, name: &str) -> SupermarketId {
    let id: i64 = sqlx::query_scalar("INSERT INTO supermarket (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await
        .expect("insert supermarket");
    SupermarketId::new(id)
}

fn appleflaps(valid_on: chrono::DateTime<Utc>, retrieved_on: chrono::DateTime<Utc>, price: i64) -> AddProduct {
    AddProduct {
        product_base: ProductBase {
            identifier: "wi210145".to_string(),
            name: "Appleflaps".to_string(),
            volume: 500,
            volume_measure: VolumeMeasure::Millilitres,
        },
        orig_price: 2000,
        price,
        discount_amount: 0,
        valid_on,
        retrieved_on,
        confidence: Confidence::Neutral,
        problems: vec![],
    }
}

/// S1: a fresh product creates exactly one productclass, one product, one
/// current productdetails row, and one productdetailsrecord.
#[sqlx::test(migrations = "../../migrations")]
async fn s1_fresh_product_creates_one_of_each(pool: PgPool) {
    let sm = insert_supermarket(&pool, "Albert Heijn").await;
    let valid_on = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let retrieved_on = Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap();

    product_store::add_product(&pool, sm, &appleflaps(valid_on, retrieved_on, 2000))
        .await
        .expect("add_product should succeed");

    let productclass_count: i64 = sqlx::query_scalar("SELECT count(*) FROM productclass")
        .fetch_one(&pool)
        .await
        .unwrap();
    let product_count: i64 = sqlx::query_scalar("SELECT count(*) FROM product")
        .fetch_one(&pool)
        .await
        .unwrap();
    let details_count: i64 = sqlx::query_scalar("SELECT count(*) FROM productdetails")
        .fetch_one(&pool)
        .await
        .unwrap();
    let current_count: i64 =
        sqlx::query_scalar("SELECT count(*) FROM productdetails WHERE valid_until IS NULL")
            .fetch_one(&pool)
            .await
            .unwrap();
    let record_count: i64 = sqlx::query_scalar("SELECT count(*) FROM productdetailsrecord")
        .fetch_one(&pool)
        .await
        .unwrap();

    assert_eq!(productclass_count, 1);
    assert_eq!(product_count, 1);
    assert_eq!(details_count, 1);
    assert_eq!(current_count, 1);
    assert_eq!(record_count, 1);
}

/// S2: a second, identical observation keeps the same productdetails row
/// and only adds a productdetailsrecord — invariant 3 (dedup idempotence).
#[sqlx::test(migrations = "../../migrations")]
async fn s2_identical_observation_dedups_into_one_productdetails(pool: PgPool) {
    let sm = insert_supermarket(&pool, "Albert Heijn").await;
    let valid_on = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let first_retrieved = Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap();
    let second_retrieved = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();

    product_store::add_product(&pool, sm, &appleflaps(valid_on, first_retrieved, 2000))
        .await
        .expect("first add_product should succeed");
    product_store::add_product(&pool, sm, &appleflaps(valid_on, second_retrieved, 2000))
        .await
        .expect("second add_product should succeed");

    let details_count: i64 = sqlx::query_scalar("SELECT count(*) FROM productdetails")
        .fetch_one(&pool)
        .await
        .unwrap();
    let record_count: i64 = sqlx::query_scalar("SELECT count(*) FROM productdetailsrecord")
        .fetch_one(&pool)
        .await
        .unwrap();

    assert_eq!(details_count, 1);
    assert_eq!(record_count, 2);
}

/// S3: a subsequent observation with a changed price closes out the old
/// productdetails (`valid_until` set) and opens a new current one.
#[sqlx::test(migrations = "../../migrations")]
async fn s3_price_change_closes_old_details_and_opens_new(pool: PgPool) {
    let sm = insert_supermarket(&pool, "Albert Heijn").await;
    let valid_on = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let first_retrieved = Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap();
    let second_retrieved = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
    let price_change_on = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();

    product_store::add_product(&pool, sm, &appleflaps(valid_on, first_retrieved, 2000))
        .await
        .unwrap();
    product_store::add_product(&pool, sm, &appleflaps(valid_on, second_retrieved, 2000))
        .await
        .unwrap();

    let mut changed = appleflaps(price_change_on, price_change_on, 1800);
    changed.valid_on = price_change_on;
    product_store::add_product(&pool, sm, &changed).await.unwrap();

    let details_count: i64 = sqlx::query_scalar("SELECT count(*) FROM productdetails")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(details_count, 2);

    let closed_valid_until: chrono::DateTime<Utc> = sqlx::query_scalar(
        "SELECT valid_until FROM productdetails WHERE valid_until IS NOT NULL",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(closed_valid_until, price_change_on);

    let current_price: i64 = sqlx::query_scalar(
        "SELECT price FROM productdetails WHERE valid_until IS NULL",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(current_price, 1800);
}

/// Invariant 2: the monotone chain — the closed row's `valid_until` never
/// exceeds the new row's `valid_on`.
#[sqlx::test(migrations = "../../migrations")]
async fn invariant2_monotone_chain_holds_across_a_price_change(pool: PgPool) {
    let sm = insert_supermarket(&pool, "Jumbo").await;
    let valid_on = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let retrieved_on = Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap();
    let price_change_on = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();

    product_store::add_product(&pool, sm, &appleflaps(valid_on, retrieved_on, 2000))
        .await
        .unwrap();
    let changed = appleflaps(price_change_on, price_change_on, 1800);
    product_store::add_product(&pool, sm, &changed).await.unwrap();

    let rows: Vec<(Option<chrono::DateTime<Utc>>, chrono::DateTime<Utc>)> = sqlx::query_as(
        "SELECT valid_until, valid_on FROM productdetails ORDER BY id ASC",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert_eq!(rows.len(), 2);
    let (first_valid_until, _) = rows[0];
    let (_, second_valid_on) = rows[1];
    assert!(first_valid_until.unwrap() <= second_valid_on);
}

/// Invariant 5 / S-equivalent: absorbing a productclass merges membership
/// and the source id then 404s.
#[sqlx::test(migrations = "../../migrations")]
async fn absorb_productclass_preserves_products_and_deletes_source(pool: PgPool) {
    let ah = insert_supermarket(&pool, "Albert Heijn").await;
    let jumbo = insert_supermarket(&pool, "Jumbo").await;
    let valid_on = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let retrieved_on = Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap();

    let mut at_jumbo = appleflaps(valid_on, retrieved_on, 2000);
    at_jumbo.product_base.identifier = "jb998".to_string();

    product_store::add_product(&pool, ah, &appleflaps(valid_on, retrieved_on, 2000))
        .await
        .unwrap();
    product_store::add_product(&pool, jumbo, &at_jumbo).await.unwrap();

    let src_id: i64 = sqlx::query_scalar("SELECT productclass_id FROM product WHERE supermarket_id = $1")
        .bind(ah.unseal())
        .fetch_one(&pool)
        .await
        .unwrap();
    let dst_id: i64 = sqlx::query_scalar("SELECT productclass_id FROM product WHERE supermarket_id = $1")
        .bind(jumbo.unseal())
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_ne!(src_id, dst_id);

    use karl_core::ProductclassId;
    product_store::absorb_productclass(&pool, ProductclassId::new(src_id), ProductclassId::new(dst_id))
        .await
        .unwrap();

    let merged = product_store::get_productclass(&pool, ProductclassId::new(dst_id))
        .await
        .expect("destination productclass should still exist");
    assert_eq!(merged.members.len(), 2);

    let err = product_store::get_productclass(&pool, ProductclassId::new(src_id))
        .await
        .expect_err("source productclass should be gone");
    assert!(matches!(err, DbError::NotFound));
}

/// Invariant 9 / S6 (first half): tag alias lookup is case-insensitive.
#[sqlx::test(migrations = "../../migrations")]
async fn find_add_tag_is_case_insensitive(pool: PgPool) {
    let category = tag_store::find_add_tagcategory(&pool, "dietary").await.unwrap();

    let t1 = tag_store::find_add_tag(&pool, "Milk", category).await.unwrap();
    let t2 = tag_store::find_add_tag(&pool, "milk", category).await.unwrap();

    assert_eq!(t1, t2);
}

/// S6 (second half): setting a tag as its own parent is rejected as a
/// self-cycle, and the attempted mutation does not stick.
#[sqlx::test(migrations = "../../migrations")]
async fn update_tag_set_parent_rejects_a_self_cycle(pool: PgPool) {
    let category = tag_store::find_add_tagcategory(&pool, "dietary").await.unwrap();
    let t1 = tag_store::find_add_tag(&pool, "Milk", category).await.unwrap();

    let err = tag_store::update_tag_set_parent(&pool, t1, Some(t1))
        .await
        .expect_err("a tag cannot be its own parent");
    assert!(matches!(err, DbError::IntegrityViolation(_)));

    let tags = tag_store::get_tags(&pool).await.unwrap();
    let tag = tags.into_iter().find(|t| t.id == t1).unwrap();
    assert_eq!(tag.parent, None, "the rejected mutation must not have been committed");
}

/// Invariant 4: a longer chain (tag -> parent -> grandparent) still passes
/// the forest check, and re-parenting a leaf under a different branch is
/// accepted as long as it introduces no cycle.
#[sqlx::test(migrations = "../../migrations")]
async fn reparenting_a_leaf_under_a_sibling_branch_is_accepted(pool: PgPool) {
    let category = tag_store::find_add_tagcategory(&pool, "taxonomy").await.unwrap();
    let root = tag_store::find_add_tag(&pool, "Food", category).await.unwrap();
    let dairy = tag_store::find_add_tag(&pool, "Dairy", category).await.unwrap();
    let produce = tag_store::find_add_tag(&pool, "Produce", category).await.unwrap();

    tag_store::update_tag_set_parent(&pool, dairy, Some(root)).await.unwrap();
    tag_store::update_tag_set_parent(&pool, produce, Some(root)).await.unwrap();

    let leaf = tag_store::find_add_tag(&pool, "Cheese", category).await.unwrap();
    tag_store::update_tag_set_parent(&pool, leaf, Some(dairy)).await.unwrap();

    tag_store::update_tag_set_parent(&pool, leaf, Some(produce))
        .await
        .expect("moving a leaf between two non-overlapping branches is not a cycle");

    tag_store::check_integrity(&pool).await.expect("forest must remain consistent");
}

/// A cycle through a grandparent (`a -> b -> a`) is rejected by the same
/// DFS-from-roots check, not just the trivial self-parent case.
#[sqlx::test(migrations = "../../migrations")]
async fn update_tag_set_parent_rejects_a_longer_cycle(pool: PgPool) {
    let category = tag_store::find_add_tagcategory(&pool, "taxonomy").await.unwrap();
    let a = tag_store::find_add_tag(&pool, "A", category).await.unwrap();
    let b = tag_store::find_add_tag(&pool, "B", category).await.unwrap();

    tag_store::update_tag_set_parent(&pool, b, Some(a)).await.unwrap();

    let err = tag_store::update_tag_set_parent(&pool, a, Some(b))
        .await
        .expect_err("a -> b -> a closes a cycle");
    assert!(matches!(err, DbError::IntegrityViolation(_)));
}
