//! Session/ticket timeout policy, resolving spec.md's Open Question on
//! configurability: the original hard-codes 5 minutes and 6 hours, this
//! threads both through `AppConfig`.

use chrono::Duration as ChronoDuration;
use karl_core::AppConfig;

const DEFAULT_TICKET_TTL_SECS: u64 = 5 * 60;
const DEFAULT_SESSION_TTL_SECS: u64 = 6 * 60 * 60;

/// How long a sessionticket and a session each remain valid.
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    ticket_ttl_secs: u64,
    session_ttl_secs: u64,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            ticket_ttl_secs: DEFAULT_TICKET_TTL_SECS,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
        }
    }
}

impl SessionPolicy {
    #[must_use]
    pub fn new(ticket_ttl_secs: u64, session_ttl_secs: u64) -> Self {
        Self {
            ticket_ttl_secs,
            session_ttl_secs,
        }
    }

    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(config.session_ticket_ttl_secs, config.session_session_ttl_secs)
    }

    #[must_use]
    pub fn ticket_ttl(&self) -> ChronoDuration {
        ChronoDuration::seconds(i64::try_from(self.ticket_ttl_secs).unwrap_or(i64::MAX))
    }

    #[must_use]
    pub fn session_ttl(&self) -> ChronoDuration {
        ChronoDuration::seconds(i64::try_from(self.session_ttl_secs).unwrap_or(i64::MAX))
    }
}

/// The response to `generate_sessionticket`: enough for the caller to
/// compute `H(H(password, salt), nonce)` and call `create_session`.
#[derive(Debug, Clone)]
pub struct SessionTicketChallenge {
    pub ticket_id: i64,
    pub nonce: Vec<u8>,
    pub password_salt: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_values() {
        let policy = SessionPolicy::default();
        assert_eq!(policy.ticket_ttl(), ChronoDuration::minutes(5));
        assert_eq!(policy.session_ttl(), ChronoDuration::hours(6));
    }
}
