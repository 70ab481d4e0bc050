//! Image-Citation Sink (C8, database side): persists the `ImageCitation`
//! metadata row and points a `Product` at it. File I/O for the original
//! bytes and thumbnail lives in `karl-images`; the façade sequences
//! "insert record, then write files, then update product" so a visible
//! `image_citation` reference always has both files on disk already.

use chrono::{DateTime, Utc};
use karl_core::{ImageCitationId, SupermarketId};
use sqlx::PgPool;

use crate::DbError;

/// # Errors
///
/// Returns [`DbError::Sqlx`] on any database failure.
#[allow(clippy::too_many_arguments)]
pub async fn add_image_citation(
    pool: &PgPool,
    supermarket_id: SupermarketId,
    original_uri: &str,
    source_uri: &str,
    original_width: i32,
    original_height: i32,
    retrieved_on: DateTime<Utc>,
) -> Result<ImageCitationId, DbError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO imagecitation \
            (supermarket_id, original_uri, source_uri, original_width, original_height, retrieved_on) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
    )
    .bind(supermarket_id.unseal())
    .bind(original_uri)
    .bind(source_uri)
    .bind(original_width)
    .bind(original_height)
    .bind(retrieved_on)
    .fetch_one(pool)
    .await?;
    Ok(ImageCitationId::new(id))
}

/// Points the product identified by `(supermarket_id, product_identifier)`
/// at `image_citation_id`. Must run after the citation row and both image
/// files already exist on disk.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such product exists.
pub async fn update_product_image_citation(
    pool: &PgPool,
    product_identifier: &str,
    supermarket_id: SupermarketId,
    image_citation_id: ImageCitationId,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE product SET image_citation_id = $1 WHERE identifier = $2 AND supermarket_id = $3",
    )
    .bind(image_citation_id.unseal())
    .bind(product_identifier)
    .bind(supermarket_id.unseal())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
