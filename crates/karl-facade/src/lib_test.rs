//! Live integration tests for `karl-facade`, using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database. The migrations
//! path is relative to this crate root, so `"../../migrations"` resolves to
//! the workspace migration directory, same as the teacher's own
//! `tests/live.rs` convention.

use std::path::PathBuf;

use karl_identity::{constant_time_eq, hash};
use sqlx::PgPool;

use crate::{FacadeError, Karl, SessionPolicy};

fn make_karl(pool: PgPool, enforce_permissions: bool) -> Karl {
    Karl::new(pool, PathBuf::from("/tmp"), SessionPolicy::default(), enforce_permissions)
}

/// Invariant 8 and scenario S4: the full challenge-response round trip
/// succeeds, and the resulting session passes `check_session`.
#[sqlx::test(migrations = "../../migrations")]
async fn session_round_trip_succeeds(pool: PgPool) {
    let karl = make_karl(pool, true);

    karl.create_user("alice", "hunter2")
        .await
        .expect("create_user should succeed");

    let challenge = karl
        .generate_sessionticket("alice")
        .await
        .expect("generate_sessionticket should succeed for a known user");

    let step1 = hash(b"hunter2", &challenge.password_salt).expect("hash password with salt");
    let ticket_password = hash(&step1, &challenge.nonce).expect("hash under nonce");

    let token = karl
        .create_session(challenge.ticket_id, &ticket_password)
        .await
        .expect("create_session should accept the correct ticket password");

    karl.check_session(&token)
        .await
        .expect("a freshly created session must check out");
}

/// Scenario S5: a sessionticket request for an unknown username fails with
/// `AuthenticationError`, never `NotFound` — the two must be
/// indistinguishable so callers cannot enumerate usernames.
#[sqlx::test(migrations = "../../migrations")]
async fn unknown_username_fails_authentication_not_not_found(pool: PgPool) {
    let karl = make_karl(pool, true);

    karl.create_user("alice", "hunter2")
        .await
        .expect("create_user should succeed");

    let err = karl
        .generate_sessionticket("bob")
        .await
        .expect_err("an unknown username must not produce a ticket");

    assert!(matches!(err, FacadeError::AuthenticationError));
}

/// A wrong ticket password is rejected the same way an unknown ticket id
/// would be — both are `AuthenticationError`/`NotFound` per the propagation
/// policy, but a mismatched hash must never succeed.
#[sqlx::test(migrations = "../../migrations")]
async fn wrong_ticket_password_is_rejected(pool: PgPool) {
    let karl = make_karl(pool, true);

    karl.create_user("alice", "hunter2")
        .await
        .expect("create_user should succeed");

    let challenge = karl
        .generate_sessionticket("alice")
        .await
        .expect("generate_sessionticket should succeed");

    let wrong = vec![0u8; 32];
    let err = karl
        .create_session(challenge.ticket_id, &wrong)
        .await
        .expect_err("a wrong ticket password must not create a session");

    assert!(matches!(err, FacadeError::AuthenticationError));
}

/// `--no-perms` (`enforce_permissions = false`) disables both password
/// checking in `create_session` and session validity checking in
/// `check_session`, per spec.md's permission-bypass open question.
#[sqlx::test(migrations = "../../migrations")]
async fn no_perms_bypasses_password_and_session_checks(pool: PgPool) {
    let karl = make_karl(pool, false);

    karl.create_user("alice", "hunter2")
        .await
        .expect("create_user should succeed");

    let challenge = karl
        .generate_sessionticket("alice")
        .await
        .expect("generate_sessionticket should succeed");

    let bogus = vec![0u8; 32];
    let token = karl
        .create_session(challenge.ticket_id, &bogus)
        .await
        .expect("with permissions disabled, any ticket password is accepted");

    karl.check_session(&token).await.expect("check_session always succeeds with permissions disabled");
    karl.check_session(b"not-even-a-real-token").await.expect("check_session is a no-op with permissions disabled");
}

/// Not a constant-time equality test of cryptographic soundness, just that
/// the comparison behaves as a byte-for-byte equality check.
#[test]
fn constant_time_eq_matches_bytewise_equality() {
    assert!(constant_time_eq(b"abc", b"abc"));
    assert!(!constant_time_eq(b"abc", b"abd"));
    assert!(!constant_time_eq(b"abc", b"ab"));
}
