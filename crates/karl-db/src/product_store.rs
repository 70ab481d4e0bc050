//! Product Store (C4): transactional upsert of products, detail dedup,
//! productclass creation, history/log queries.

use chrono::{DateTime, Utc};
use karl_core::{
    AddProduct, Confidence, ProductHistoryPoint, ProductLogEntry, ProductSummary,
    ProductclassId, ProductclassSummary, SupermarketId, TagId, VolumeMeasure,
};
use sqlx::{PgPool, Postgres, Transaction};

use crate::querybuilder::{Op, QueryBuilder};
use crate::DbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "volume_measure", rename_all = "UPPERCASE")]
enum VolumeMeasureSql {
    Units,
    Millilitres,
    Milligrams,
    Millimetres,
}

impl From<VolumeMeasure> for VolumeMeasureSql {
    fn from(v: VolumeMeasure) -> Self {
        match v {
            VolumeMeasure::Units => VolumeMeasureSql::Units,
            VolumeMeasure::Millilitres => VolumeMeasureSql::Millilitres,
            VolumeMeasure::Milligrams => VolumeMeasureSql::Milligrams,
            VolumeMeasure::Millimetres => VolumeMeasureSql::Millimetres,
        }
    }
}

impl From<VolumeMeasureSql> for VolumeMeasure {
    fn from(v: VolumeMeasureSql) -> Self {
        match v {
            VolumeMeasureSql::Units => VolumeMeasure::Units,
            VolumeMeasureSql::Millilitres => VolumeMeasure::Millilitres,
            VolumeMeasureSql::Milligrams => VolumeMeasure::Milligrams,
            VolumeMeasureSql::Millimetres => VolumeMeasure::Millimetres,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "confidence", rename_all = "UPPERCASE")]
enum ConfidenceSql {
    Low,
    Neutral,
    High,
    Perfect,
}

impl From<Confidence> for ConfidenceSql {
    fn from(c: Confidence) -> Self {
        match c {
            Confidence::Low => ConfidenceSql::Low,
            Confidence::Neutral => ConfidenceSql::Neutral,
            Confidence::High => ConfidenceSql::High,
            Confidence::Perfect => ConfidenceSql::Perfect,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ProductRow {
    id: i64,
    identifier: String,
    #[allow(dead_code)]
    supermarket_id: i64,
    productclass_id: i64,
    name: String,
    volume: i64,
    volume_measure: VolumeMeasureSql,
    image_citation: Option<i64>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ProductDetailsRow {
    id: i64,
    orig_price: i64,
    price: i64,
    discount_amount: i64,
}

impl ProductRow {
    fn into_summary(self, details: ProductDetailsRow) -> ProductSummary {
        ProductSummary {
            identifier: self.identifier,
            name: self.name,
            volume: self.volume,
            volume_measure: self.volume_measure.into(),
            orig_price: details.orig_price,
            price: details.price,
            discount_amount: details.discount_amount,
            image_citation: self.image_citation.map(karl_core::ImageCitationId::new),
            price_per_unit: ProductSummary::compute_price_per_unit(
                details.price,
                self.volume,
                self.volume_measure.into(),
            ),
        }
    }
}

async fn find_product(
    pool: &PgPool,
    supermarket_id: SupermarketId,
    identifier: &str,
) -> Result<Option<ProductRow>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(
        "SELECT id, identifier, supermarket_id, productclass_id, name, volume, volume_measure, image_citation_id AS image_citation \
         FROM product WHERE supermarket_id = $1 AND identifier = $2",
    )
    .bind(supermarket_id.unseal())
    .bind(identifier)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Two-phase find-or-create for the canonical `(supermarket, identifier)`
/// product: a cheap shared-lock read, then (only on miss) an exclusive-lock
/// re-check-and-insert, each its own short transaction.
async fn find_or_create_product(
    pool: &PgPool,
    supermarket_id: SupermarketId,
    base: &karl_core::ProductBase,
) -> Result<ProductRow, DbError> {
    {
        let mut tx = pool.begin().await?;
        sqlx::query("LOCK TABLE product IN SHARE MODE")
            .execute(&mut *tx)
            .await?;
        let found = sqlx::query_as::<_, ProductRow>(
            "SELECT id, identifier, supermarket_id, productclass_id, name, volume, volume_measure, image_citation_id AS image_citation \
             FROM product WHERE supermarket_id = $1 AND identifier = $2",
        )
        .bind(supermarket_id.unseal())
        .bind(&base.identifier)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        if let Some(row) = found {
            return Ok(row);
        }
    }

    let mut tx = pool.begin().await?;
    sqlx::query("LOCK TABLE product IN EXCLUSIVE MODE")
        .execute(&mut *tx)
        .await?;

    let found = sqlx::query_as::<_, ProductRow>(
        "SELECT id, identifier, supermarket_id, productclass_id, name, volume, volume_measure, image_citation_id AS image_citation \
         FROM product WHERE supermarket_id = $1 AND identifier = $2",
    )
    .bind(supermarket_id.unseal())
    .bind(&base.identifier)
    .fetch_optional(&mut *tx)
    .await?;
    if let Some(row) = found {
        tx.commit().await?;
        return Ok(row);
    }

    let productclass_id: i64 = sqlx::query_scalar("INSERT INTO productclass (name) VALUES ($1) RETURNING id")
        .bind(&base.name)
        .fetch_one(&mut *tx)
        .await?;

    let volume_measure_sql = VolumeMeasureSql::from(base.volume_measure);
    let product_id: i64 = sqlx::query_scalar(
        "INSERT INTO product (identifier, supermarket_id, productclass_id, name, volume, volume_measure) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
    )
    .bind(&base.identifier)
    .bind(supermarket_id.unseal())
    .bind(productclass_id)
    .bind(&base.name)
    .bind(base.volume)
    .bind(volume_measure_sql)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!(product_id, productclass_id, "created new product and productclass");

    Ok(ProductRow {
        id: product_id,
        identifier: base.identifier.clone(),
        supermarket_id: supermarket_id.unseal(),
        productclass_id,
        name: base.name.clone(),
        volume: base.volume,
        volume_measure: volume_measure_sql,
        image_citation: None,
    })
}

async fn fetch_current_productdetails(
    tx: &mut Transaction<'_, Postgres>,
    product_id: i64,
) -> Result<Option<ProductDetailsRow>, DbError> {
    let row = sqlx::query_as::<_, ProductDetailsRow>(
        "SELECT id, orig_price, price, discount_amount FROM productdetails \
         WHERE product_id = $1 AND valid_until IS NULL",
    )
    .bind(product_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(row)
}

async fn register_productdetailsrecord(
    tx: &mut Transaction<'_, Postgres>,
    productdetails_id: i64,
    retrieved_on: DateTime<Utc>,
    confidence: Confidence,
    problems: &[String],
) -> Result<(), DbError> {
    let record_id: i64 = sqlx::query_scalar(
        "INSERT INTO productdetailsrecord (productdetails_id, retrieved_on, confidence) \
         VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(productdetails_id)
    .bind(retrieved_on)
    .bind(ConfidenceSql::from(confidence))
    .fetch_one(&mut **tx)
    .await?;

    for problem in problems {
        sqlx::query("INSERT INTO productlog (productdetailsrecord_id, description) VALUES ($1, $2)")
            .bind(record_id)
            .bind(problem)
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

/// Ingest one crawler observation. See the algorithm in the component
/// design: find-or-create the canonical product, update its mutable
/// identity if changed, then dedup the price/packaging configuration
/// against the current `Productdetails`. Steps 2-5 (the identity
/// correction, the current-details fetch, and the invalidate-then-insert)
/// run as one transaction, so a crash or concurrent reader never observes
/// a product whose name/volume were corrected but whose productdetails
/// history was not, or vice versa.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on any database failure.
pub async fn add_product(
    pool: &PgPool,
    supermarket_id: SupermarketId,
    ap: &AddProduct,
) -> Result<(), DbError> {
    let canonical = find_or_create_product(pool, supermarket_id, &ap.product_base).await?;

    let mut tx = pool.begin().await?;

    if canonical.name != ap.product_base.name
        || canonical.volume != ap.product_base.volume
        || VolumeMeasure::from(canonical.volume_measure) != ap.product_base.volume_measure
    {
        sqlx::query("UPDATE product SET name = $1, volume = $2, volume_measure = $3 WHERE id = $4")
            .bind(&ap.product_base.name)
            .bind(ap.product_base.volume)
            .bind(VolumeMeasureSql::from(ap.product_base.volume_measure))
            .bind(canonical.id)
            .execute(&mut *tx)
            .await?;
        tracing::info!(product_id = canonical.id, "updated product name/volume/volume_measure");
    }

    let current = fetch_current_productdetails(&mut tx, canonical.id).await?;

    if let Some(current) = &current {
        let similar = current.discount_amount == ap.discount_amount
            && current.orig_price == ap.orig_price
            && current.price == ap.price;

        if similar {
            register_productdetailsrecord(&mut tx, current.id, ap.retrieved_on, ap.confidence, &ap.problems)
                .await?;
            tx.commit().await?;
            return Ok(());
        }

        sqlx::query("UPDATE productdetails SET valid_until = $1 WHERE id = $2")
            .bind(ap.valid_on)
            .bind(current.id)
            .execute(&mut *tx)
            .await?;
    }

    let new_id: i64 = sqlx::query_scalar(
        "INSERT INTO productdetails (product_id, orig_price, price, discount_amount, valid_on, valid_until) \
         VALUES ($1, $2, $3, $4, $5, NULL) RETURNING id",
    )
    .bind(canonical.id)
    .bind(ap.orig_price)
    .bind(ap.price)
    .bind(ap.discount_amount)
    .bind(ap.valid_on)
    .fetch_one(&mut *tx)
    .await?;
    tracing::info!(
        product_id = canonical.id,
        productdetails_id = new_id,
        "inserted new productdetails"
    );

    register_productdetailsrecord(&mut tx, new_id, ap.retrieved_on, ap.confidence, &ap.problems).await?;
    tx.commit().await?;
    Ok(())
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if the product does not exist, or
/// [`DbError::Logic`] if it exists without a current detail (Invariant 1
/// violation).
pub async fn get_product(
    pool: &PgPool,
    identifier: &str,
    supermarket_id: SupermarketId,
) -> Result<ProductSummary, DbError> {
    let product = find_product(pool, supermarket_id, identifier)
        .await?
        .ok_or(DbError::NotFound)?;

    let details = sqlx::query_as::<_, ProductDetailsRow>(
        "SELECT id, orig_price, price, discount_amount FROM productdetails \
         WHERE product_id = $1 AND valid_until IS NULL",
    )
    .bind(product.id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| {
        DbError::Logic(format!(
            "product {} has no current productdetails",
            product.id
        ))
    })?;

    Ok(product.into_summary(details))
}

/// Case-insensitive substring search over the product's own `name` column.
/// The caller passes the raw substring; `%` wrapping happens here.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on any database failure.
pub async fn get_products_by_name(
    pool: &PgPool,
    name: &str,
    supermarket_id: SupermarketId,
) -> Result<Vec<ProductSummary>, DbError> {
    let mut qb = QueryBuilder::new("product")
        .fields(&[
            "product.id",
            "product.identifier",
            "product.supermarket_id",
            "product.productclass_id",
            "product.name",
            "product.volume",
            "product.volume_measure",
            "product.image_citation_id AS image_citation",
            "productdetails.id",
            "productdetails.orig_price",
            "productdetails.price",
            "productdetails.discount_amount",
        ])
        .inner_join(
            "productdetails",
            "productdetails.product_id = product.id AND productdetails.valid_until IS NULL",
        );
    let supermarket_ph = qb.condition("product.supermarket_id", Op::Eq);
    let name_ph = qb.condition("product.name", Op::ILike);
    debug_assert_eq!(supermarket_ph, "$1");
    debug_assert_eq!(name_ph, "$2");

    let pattern = format!("%{name}%");
    let rows = sqlx::query_as::<_, (ProductRow, ProductDetailsRow)>(&qb.select())
        .bind(supermarket_id.unseal())
        .bind(pattern)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(product, details)| product.into_summary(details))
        .collect())
}

/// Orders productdetails by productdetailsrecord id ascending; effective
/// timestamp is `max(valid_on, retrieved_on)`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the product does not exist.
pub async fn get_product_history(
    pool: &PgPool,
    identifier: &str,
    supermarket_id: SupermarketId,
) -> Result<Vec<ProductHistoryPoint>, DbError> {
    let product = find_product(pool, supermarket_id, identifier)
        .await?
        .ok_or(DbError::NotFound)?;

    let rows: Vec<(DateTime<Utc>, DateTime<Utc>, i64)> = sqlx::query_as(
        "SELECT productdetails.valid_on, productdetailsrecord.retrieved_on, productdetails.price \
         FROM productdetailsrecord \
         INNER JOIN productdetails ON productdetails.id = productdetailsrecord.productdetails_id \
         WHERE productdetails.product_id = $1 \
         ORDER BY productdetailsrecord.id ASC",
    )
    .bind(product.id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(valid_on, retrieved_on, price)| ProductHistoryPoint {
            effective: valid_on.max(retrieved_on),
            price,
        })
        .collect())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] on any database failure.
pub async fn get_products(
    pool: &PgPool,
    supermarket_id: SupermarketId,
) -> Result<Vec<ProductSummary>, DbError> {
    let rows = sqlx::query_as::<_, (ProductRow, ProductDetailsRow)>(
        "SELECT \
            product.id, product.identifier, product.supermarket_id, product.productclass_id, \
            product.name, product.volume, product.volume_measure, product.image_citation_id AS image_citation, \
            productdetails.id, productdetails.orig_price, productdetails.price, productdetails.discount_amount \
         FROM product \
         INNER JOIN productdetails ON productdetails.product_id = product.id AND productdetails.valid_until IS NULL \
         WHERE product.supermarket_id = $1",
    )
    .bind(supermarket_id.unseal())
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(product, details)| product.into_summary(details))
        .collect())
}

/// Joins through productdetails + productdetailsrecord + productlog,
/// keeping only the most recent productdetailsrecord per productdetails,
/// grouped by product identifier.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on any database failure.
pub async fn get_recent_productlog(
    pool: &PgPool,
    supermarket_id: SupermarketId,
) -> Result<Vec<ProductLogEntry>, DbError> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT product.identifier, productlog.description \
         FROM productlog \
         INNER JOIN productdetailsrecord ON productdetailsrecord.id = productlog.productdetailsrecord_id \
         INNER JOIN productdetails ON productdetails.id = productdetailsrecord.productdetails_id \
         INNER JOIN product ON product.id = productdetails.product_id \
         WHERE product.supermarket_id = $1 \
           AND productdetailsrecord.id IN ( \
               SELECT max(id) FROM productdetailsrecord GROUP BY productdetails_id \
           ) \
         ORDER BY product.identifier",
    )
    .bind(supermarket_id.unseal())
    .fetch_all(pool)
    .await?;

    let mut entries: Vec<ProductLogEntry> = Vec::new();
    for (identifier, message) in rows {
        match entries.last_mut() {
            Some(last) if last.identifier == identifier => last.messages.push(message),
            _ => entries.push(ProductLogEntry {
                identifier,
                messages: vec![message],
            }),
        }
    }
    Ok(entries)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if the productclass does not exist.
pub async fn get_productclass(
    pool: &PgPool,
    productclass_id: ProductclassId,
) -> Result<ProductclassSummary, DbError> {
    let name: String = sqlx::query_scalar("SELECT name FROM productclass WHERE id = $1")
        .bind(productclass_id.unseal())
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)?;

    let rows = sqlx::query_as::<_, (ProductRow, ProductDetailsRow)>(
        "SELECT \
            product.id, product.identifier, product.supermarket_id, product.productclass_id, \
            product.name, product.volume, product.volume_measure, product.image_citation_id AS image_citation, \
            productdetails.id, productdetails.orig_price, productdetails.price, productdetails.discount_amount \
         FROM product \
         INNER JOIN productdetails ON productdetails.product_id = product.id AND productdetails.valid_until IS NULL \
         WHERE product.productclass_id = $1",
    )
    .bind(productclass_id.unseal())
    .fetch_all(pool)
    .await?;

    let members = rows
        .into_iter()
        .map(|(product, details)| product.into_summary(details))
        .collect();

    let tag_ids: Vec<i64> = sqlx::query_scalar("SELECT tag_id FROM tag_productclass WHERE productclass_id = $1")
        .bind(productclass_id.unseal())
        .fetch_all(pool)
        .await?;

    Ok(ProductclassSummary {
        id: productclass_id,
        name,
        members,
        tags: tag_ids.into_iter().map(TagId::new).collect(),
    })
}

/// Reassigns products and tag bindings from `src` to `dst`, then deletes the
/// source productclass. Idempotent: a repeated call with the same
/// `(src, dst)` finds nothing left under `src` and is a no-op past the
/// first statement.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on any database failure.
pub async fn absorb_productclass(
    pool: &PgPool,
    src: ProductclassId,
    dst: ProductclassId,
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE product SET productclass_id = $2 WHERE productclass_id = $1")
        .bind(src.unseal())
        .bind(dst.unseal())
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "DELETE FROM tag_productclass \
         WHERE productclass_id = $1 \
           AND tag_id IN (SELECT tag_id FROM tag_productclass WHERE productclass_id = $2)",
    )
    .bind(src.unseal())
    .bind(dst.unseal())
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE tag_productclass SET productclass_id = $2 WHERE productclass_id = $1")
        .bind(src.unseal())
        .bind(dst.unseal())
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM productclass WHERE id = $1")
        .bind(src.unseal())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}
