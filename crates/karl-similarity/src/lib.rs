//! Similarity Engine (C9): cross-supermarket record linkage. Purely
//! CPU-bound — never touches a database connection or holds a transaction,
//! so `karl-facade` can run it outside any lock.

pub mod hungarian;
pub mod levenshtein;
pub mod valuation;

pub use hungarian::solve_max;
pub use levenshtein::levenshtein;
pub use valuation::{compare, Valuation};
