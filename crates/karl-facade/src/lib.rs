//! Core Façade (C10): the single entry point the API layer talks to.
//! Orchestrates the product/tag/session stores (`karl-db`), the identity
//! primitives (`karl-identity`), the similarity engine (`karl-similarity`),
//! and the image sink (`karl-images`), and enforces the propagation policy
//! from the error-handling design: a `not_found` on a write path becomes a
//! more specific kind, storage invariant violations become a generic
//! `logic` error, and nothing here is retried.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use karl_core::{
    AddProduct, AppConfig, ImageCitationId, KaruserId, ProductHistoryPoint, ProductLogEntry,
    ProductSummary, ProductclassId, ProductclassSummary, SupermarketId, Tag, TagId, TagcategoryId,
};
use karl_db::DbError;
use karl_similarity::Valuation;
use sqlx::PgPool;

mod session;

pub use session::{SessionPolicy, SessionTicketChallenge};

/// Errors raised by the façade. Mirrors spec.md's error-kind table at the
/// granularity the core can observe; session-token-missing,
/// content-type-unsupported, and route-not-found are routing concerns left
/// to `karl-server`.
#[derive(Debug, thiserror::Error)]
pub enum FacadeError {
    #[error("record not found")]
    NotFound,
    #[error("authentication failed")]
    AuthenticationError,
    #[error("session missing or expired")]
    SessionInvalid,
    #[error("tag forest integrity violation: {0}")]
    IntegrityViolation(String),
    #[error("storage invariant violated: {0}")]
    Logic(String),
    #[error("database connection unavailable: {0}")]
    BackendDown(String),
}

impl From<DbError> for FacadeError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => FacadeError::NotFound,
            DbError::Logic(msg) => FacadeError::Logic(msg),
            DbError::IntegrityViolation(msg) => FacadeError::IntegrityViolation(msg),
            DbError::Sqlx(e) => FacadeError::BackendDown(e.to_string()),
            DbError::Migration(e) => FacadeError::BackendDown(e.to_string()),
        }
    }
}

impl From<karl_images::ImageError> for FacadeError {
    fn from(err: karl_images::ImageError) -> Self {
        FacadeError::Logic(err.to_string())
    }
}

impl From<karl_identity::IdentityError> for FacadeError {
    fn from(err: karl_identity::IdentityError) -> Self {
        FacadeError::Logic(err.to_string())
    }
}

/// The Curator's core. Holds the only process-wide mutable-looking state:
/// a connection pool and the image-citations directory, both immutable
/// after construction.
pub struct Karl {
    pool: PgPool,
    images_dir: PathBuf,
    session_policy: SessionPolicy,
    enforce_permissions: bool,
}

impl Karl {
    #[must_use]
    pub fn new(
        pool: PgPool,
        images_dir: PathBuf,
        session_policy: SessionPolicy,
        enforce_permissions: bool,
    ) -> Self {
        Self {
            pool,
            images_dir,
            session_policy,
            enforce_permissions,
        }
    }

    /// Builds a `Karl` from resolved application configuration. `--no-perms`
    /// is threaded in separately by the CLI rather than stored in
    /// `AppConfig`, since it is a runtime flag, not a deployment setting.
    ///
    /// # Errors
    ///
    /// Returns [`FacadeError::BackendDown`] if the pool cannot be created.
    pub async fn from_app_config(config: &AppConfig, enforce_permissions: bool) -> Result<Self, FacadeError> {
        let pool = karl_db::connect_pool_from_app_config(config).await?;
        Ok(Self::new(
            pool,
            config.imagecitations_path.clone(),
            SessionPolicy::from_app_config(config),
            enforce_permissions,
        ))
    }

    #[must_use]
    pub fn check_permissions(&self) -> bool {
        self.enforce_permissions
    }

    // ---- Session Store + Identity Service (C6, C7) ----

    /// # Errors
    ///
    /// Returns [`FacadeError::BackendDown`] on a duplicate/invalid username
    /// or other storage failure.
    pub async fn create_user(&self, name: &str, password: &str) -> Result<KaruserId, FacadeError> {
        let (salt, hashed) = karl_identity::hash_new_password(password)?;
        let id = karl_db::session_store::add_karluser(&self.pool, name, &salt, &hashed).await?;
        Ok(id)
    }

    /// # Errors
    ///
    /// Returns [`FacadeError::AuthenticationError`] if no user has this
    /// name — deliberately indistinguishable from a bad password, so
    /// callers cannot enumerate usernames.
    pub async fn generate_sessionticket(&self, username: &str) -> Result<SessionTicketChallenge, FacadeError> {
        let user = karl_db::session_store::get_karluser_by_name(&self.pool, username)
            .await
            .map_err(|err| match err {
                DbError::NotFound => FacadeError::AuthenticationError,
                other => FacadeError::from(other),
            })?;

        let nonce = karl_identity::random_token();
        let ticket_id = karl_db::session_store::add_sessionticket(
            &self.pool,
            KaruserId::new(user.id),
            &nonce,
            Utc::now(),
        )
        .await?;

        Ok(SessionTicketChallenge {
            ticket_id,
            nonce: nonce.to_vec(),
            password_salt: user.password_salt,
        })
    }

    /// # Errors
    ///
    /// Returns [`FacadeError::AuthenticationError`] if the ticket has
    /// expired or `ticket_password` does not match, [`FacadeError::NotFound`]
    /// if the ticket id is unknown.
    pub async fn create_session(&self, ticket_id: i64, ticket_password: &[u8]) -> Result<Vec<u8>, FacadeError> {
        let ticket = karl_db::session_store::get_sessionticket(&self.pool, ticket_id).await?;
        let now = Utc::now();

        if now - ticket.creation > self.session_policy.ticket_ttl() {
            return Err(FacadeError::AuthenticationError);
        }

        if self.enforce_permissions {
            let user = karl_db::session_store::get_karluser(&self.pool, KaruserId::new(ticket.karluser_id)).await?;
            let expected = karl_identity::hash(&user.password_hashed, &ticket.nonce)?;
            if !karl_identity::constant_time_eq(&expected, ticket_password) {
                return Err(FacadeError::AuthenticationError);
            }
        }

        let token = karl_identity::random_token();
        karl_db::session_store::add_session(&self.pool, KaruserId::new(ticket.karluser_id), &token, now).await?;
        Ok(token.to_vec())
    }

    /// # Errors
    ///
    /// Returns [`FacadeError::SessionInvalid`] if the token is missing or
    /// expired. Always succeeds when permission enforcement is disabled.
    pub async fn check_session(&self, token: &[u8]) -> Result<(), FacadeError> {
        if !self.enforce_permissions {
            return Ok(());
        }

        let session = karl_db::session_store::get_session_by_token(&self.pool, token)
            .await
            .map_err(|err| match err {
                DbError::NotFound => FacadeError::SessionInvalid,
                other => FacadeError::from(other),
            })?;

        if Utc::now() - session.creation > self.session_policy.session_ttl() {
            return Err(FacadeError::SessionInvalid);
        }

        Ok(())
    }

    // ---- Product Store (C4) ----

    /// # Errors
    ///
    /// Returns [`FacadeError::BackendDown`] on a storage failure.
    pub async fn add_product(&self, supermarket_id: SupermarketId, product: &AddProduct) -> Result<(), FacadeError> {
        karl_db::product_store::add_product(&self.pool, supermarket_id, product).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`FacadeError::NotFound`] if the product does not exist.
    pub async fn get_product(&self, identifier: &str, supermarket_id: SupermarketId) -> Result<ProductSummary, FacadeError> {
        Ok(karl_db::product_store::get_product(&self.pool, identifier, supermarket_id).await?)
    }

    /// # Errors
    ///
    /// Returns [`FacadeError::BackendDown`] on a storage failure.
    pub async fn get_products_by_name(&self, name: &str, supermarket_id: SupermarketId) -> Result<Vec<ProductSummary>, FacadeError> {
        Ok(karl_db::product_store::get_products_by_name(&self.pool, name, supermarket_id).await?)
    }

    /// # Errors
    ///
    /// Returns [`FacadeError::NotFound`] if the product does not exist.
    pub async fn get_product_history(&self, identifier: &str, supermarket_id: SupermarketId) -> Result<Vec<ProductHistoryPoint>, FacadeError> {
        Ok(karl_db::product_store::get_product_history(&self.pool, identifier, supermarket_id).await?)
    }

    /// # Errors
    ///
    /// Returns [`FacadeError::BackendDown`] on a storage failure.
    pub async fn get_products(&self, supermarket_id: SupermarketId) -> Result<Vec<ProductSummary>, FacadeError> {
        Ok(karl_db::product_store::get_products(&self.pool, supermarket_id).await?)
    }

    /// # Errors
    ///
    /// Returns [`FacadeError::BackendDown`] on a storage failure.
    pub async fn get_recent_productlog(&self, supermarket_id: SupermarketId) -> Result<Vec<ProductLogEntry>, FacadeError> {
        Ok(karl_db::product_store::get_recent_productlog(&self.pool, supermarket_id).await?)
    }

    /// # Errors
    ///
    /// Returns [`FacadeError::NotFound`] if the productclass does not exist.
    pub async fn get_productclass(&self, id: ProductclassId) -> Result<ProductclassSummary, FacadeError> {
        Ok(karl_db::product_store::get_productclass(&self.pool, id).await?)
    }

    /// # Errors
    ///
    /// Returns [`FacadeError::BackendDown`] on a storage failure.
    pub async fn absorb_productclass(&self, src: ProductclassId, dst: ProductclassId) -> Result<(), FacadeError> {
        karl_db::product_store::absorb_productclass(&self.pool, src, dst).await?;
        Ok(())
    }

    // ---- Tag Store (C5) ----

    /// # Errors
    ///
    /// Returns [`FacadeError::BackendDown`] on a storage failure.
    pub async fn get_tags(&self) -> Result<Vec<Tag>, FacadeError> {
        Ok(karl_db::tag_store::get_tags(&self.pool).await?)
    }

    /// # Errors
    ///
    /// Returns [`FacadeError::BackendDown`] on a storage failure.
    pub async fn find_add_tagcategory(&self, name: &str) -> Result<TagcategoryId, FacadeError> {
        Ok(karl_db::tag_store::find_add_tagcategory(&self.pool, name).await?)
    }

    /// # Errors
    ///
    /// Returns [`FacadeError::BackendDown`] on a storage failure.
    pub async fn find_add_tag(&self, name: &str, tagcategory_id: TagcategoryId) -> Result<TagId, FacadeError> {
        Ok(karl_db::tag_store::find_add_tag(&self.pool, name, tagcategory_id).await?)
    }

    /// # Errors
    ///
    /// Returns [`FacadeError::BackendDown`] on a storage failure, including
    /// a duplicate binding.
    pub async fn bind_tag(&self, productclass_id: ProductclassId, tag_id: TagId) -> Result<(), FacadeError> {
        karl_db::tag_store::bind_tag(&self.pool, productclass_id, tag_id).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`FacadeError::IntegrityViolation`] if the new parentage
    /// introduces a cycle.
    pub async fn update_tag_set_parent(&self, tag_id: TagId, parent_id: Option<TagId>) -> Result<(), FacadeError> {
        karl_db::tag_store::update_tag_set_parent(&self.pool, tag_id, parent_id).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`FacadeError::IntegrityViolation`] if absorbing leaves the
    /// tag forest inconsistent.
    pub async fn absorb_tag(&self, src: TagId, dst: TagId) -> Result<(), FacadeError> {
        karl_db::tag_store::absorb_tag(&self.pool, src, dst).await?;
        Ok(())
    }

    /// Standalone integrity check (supplement to spec.md: the original
    /// exposes `storage::check_integrity()` directly, not only as a
    /// side effect of mutations).
    ///
    /// # Errors
    ///
    /// Returns [`FacadeError::IntegrityViolation`] if the tag forest
    /// contains a cycle.
    pub async fn check_integrity(&self) -> Result<(), FacadeError> {
        karl_db::tag_store::check_integrity(&self.pool).await?;
        Ok(())
    }

    // ---- Similarity Engine (C9) ----

    /// Pure CPU-bound comparison; never touches the database.
    #[must_use]
    pub fn similarity(&self, x: &ProductSummary, y: &ProductSummary) -> Valuation {
        karl_similarity::compare(x, y)
    }

    // ---- Image-Citation Sink (C8) ----

    /// Decodes `image_bytes`, inserts the `ImageCitation` record, writes
    /// the original and thumbnail files, then points the product at the
    /// new citation — in that order, so a visible reference always has
    /// both files already on disk.
    ///
    /// # Errors
    ///
    /// Returns [`FacadeError::Logic`] if the bytes cannot be decoded, or
    /// [`FacadeError::NotFound`] if the product does not exist.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_product_image_citation(
        &self,
        supermarket_id: SupermarketId,
        product_identifier: &str,
        original_uri: &str,
        source_uri: &str,
        retrieved_on: DateTime<Utc>,
        image_bytes: &[u8],
    ) -> Result<ImageCitationId, FacadeError> {
        let (width, height) = karl_images::measure(image_bytes)?;

        let ic_id = karl_db::image_store::add_image_citation(
            &self.pool,
            supermarket_id,
            original_uri,
            source_uri,
            i32::try_from(width).unwrap_or(i32::MAX),
            i32::try_from(height).unwrap_or(i32::MAX),
            retrieved_on,
        )
        .await?;

        karl_images::persist(&self.images_dir, ic_id, image_bytes)?;

        karl_db::image_store::update_product_image_citation(
            &self.pool,
            product_identifier,
            supermarket_id,
            ic_id,
        )
        .await?;

        Ok(ic_id)
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
