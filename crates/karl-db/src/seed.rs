//! Upserts the fixed `Supermarket` reference set from `supermarkets.yaml`.
//! Not part of the core façade surface in spec.md §6 — an operational
//! bootstrap path, mirroring the teacher's own `seed_brands` idiom — since
//! `Supermarket` rows are never otherwise mutated by this core (spec.md §3).

use karl_core::SupermarketConfig;
use sqlx::PgPool;

use crate::DbError;

/// Upsert supermarkets by name, idempotent across repeated calls.
///
/// Returns the number of supermarkets processed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_supermarkets(pool: &PgPool, supermarkets: &[SupermarketConfig]) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut count = 0usize;

    for supermarket in supermarkets {
        sqlx::query(
            "INSERT INTO supermarket (name) VALUES ($1) \
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(&supermarket.name)
        .execute(&mut *tx)
        .await?;
        count += 1;
    }

    tx.commit().await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    #[test]
    fn seed_module_is_accessible() {
        let _ = std::mem::size_of::<crate::DbError>();
    }
}
