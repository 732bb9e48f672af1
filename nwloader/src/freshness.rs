//! Freshness inference from store-side TTLs.

use std::time::Duration;

use nwloader_store::Ttl;

/// Freshness of a cache entry that was just read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Young enough to serve as-is; no refresh.
    Fresh,
    /// Still servable, but a refresh is due.
    Stale,
}

/// Infers freshness from the remaining TTL of a data key.
///
/// Entries are written with an expiry of twice the freshness threshold, so
/// more than `threshold` remaining means the entry is younger than
/// `threshold`. Everything else refreshes: an entry without expiry should
/// not occur from this system and rewriting it attaches a proper one, and a
/// key that went missing between the read and this probe just expired.
pub fn freshness_of(ttl: Ttl, threshold: Duration) -> Freshness {
    match ttl {
        Ttl::Remaining(remaining) if remaining > threshold => Freshness::Fresh,
        Ttl::Remaining(_) | Ttl::NoExpiry | Ttl::Missing => Freshness::Stale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: Duration = Duration::from_secs(2);

    #[test]
    fn more_than_threshold_remaining_is_fresh() {
        let ttl = Ttl::Remaining(Duration::from_millis(2_001));
        assert_eq!(freshness_of(ttl, THRESHOLD), Freshness::Fresh);
    }

    #[test]
    fn threshold_or_less_remaining_is_stale() {
        assert_eq!(
            freshness_of(Ttl::Remaining(THRESHOLD), THRESHOLD),
            Freshness::Stale
        );
        assert_eq!(
            freshness_of(Ttl::Remaining(Duration::ZERO), THRESHOLD),
            Freshness::Stale
        );
    }

    #[test]
    fn missing_expiry_is_stale() {
        assert_eq!(freshness_of(Ttl::NoExpiry, THRESHOLD), Freshness::Stale);
    }

    #[test]
    fn missing_key_is_stale() {
        assert_eq!(freshness_of(Ttl::Missing, THRESHOLD), Freshness::Stale);
    }
}
