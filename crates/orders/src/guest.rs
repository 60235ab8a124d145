//! Synthetic buyer identities for guest checkout.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use orderdesk_core::BuyerId;

/// Generate a guest buyer id: `guest-<unix millis>-<uuid v4 hex>`.
///
/// The millisecond prefix keeps ids roughly sortable by checkout time; the
/// 122 random bits of the v4 suffix keep concurrent checkouts in the same
/// millisecond distinct.
pub fn guest_buyer_id(now: DateTime<Utc>) -> BuyerId {
    BuyerId::guest(now.timestamp_millis(), Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn guest_ids_carry_prefix_and_timestamp() {
        let now = Utc::now();
        let id = guest_buyer_id(now);
        let expected_prefix = format!("guest-{}-", now.timestamp_millis());
        assert!(id.is_guest());
        assert!(id.as_str().starts_with(&expected_prefix));
        assert_eq!(id.as_str().len(), expected_prefix.len() + 32);
    }

    #[test]
    fn same_instant_ids_are_distinct() {
        let now = Utc::now();
        let ids: HashSet<_> = (0..10_000).map(|_| guest_buyer_id(now)).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn concurrent_generation_never_collides() {
        let now = Utc::now();
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(move || (0..1_000).map(|_| guest_buyer_id(now)).collect::<Vec<_>>()))
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all.insert(id), "duplicate guest id");
            }
        }
        assert_eq!(all.len(), 8_000);
    }
}
