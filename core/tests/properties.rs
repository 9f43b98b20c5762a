//! Property tests for the wire types.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use oyster_core::types::{format_timestamp, parse_timestamp};
use oyster_core::{Card, OysterClient, TransactionQuery};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn card_strategy() -> impl Strategy<Value = Card> {
    (
        any::<i64>(),
        1..=i64::MAX,
        any::<i64>(),
        0i64..4_102_444_800,
        (any::<i64>(), 0u32..=4),
        any::<bool>(),
    )
        .prop_map(|(id, card_number, user_id, secs, (mantissa, scale), is_active)| Card {
            id,
            card_number,
            user_id,
            issued_at: format_timestamp(&Utc.timestamp_opt(secs, 0).unwrap()),
            balance: Decimal::new(mantissa, scale),
            is_active,
        })
}

proptest! {
    /// Decoding what we encoded gives the same card, however the balance
    /// was written.
    #[test]
    fn card_json_is_stable(card in card_strategy()) {
        let encoded = serde_json::to_string(&card).unwrap();
        let decoded: Card = serde_json::from_str(&encoded).unwrap();
        prop_assert_eq!(&decoded, &card);

        let reencoded = serde_json::to_string(&decoded).unwrap();
        let again: Card = serde_json::from_str(&reencoded).unwrap();
        prop_assert_eq!(again, decoded);
    }

    /// Formatted timestamps always have the fixed 19-character shape and
    /// parse back to the same instant.
    #[test]
    fn timestamps_round_trip(secs in 0i64..4_102_444_800) {
        let at = Utc.timestamp_opt(secs, 0).unwrap();
        let text = format_timestamp(&at);
        prop_assert_eq!(text.len(), 19);
        prop_assert_eq!(&text[10..11], "T");
        prop_assert_eq!(parse_timestamp(&text), Some(at.naive_utc()));
    }

    /// The same instant expressed in any offset yields the same query.
    #[test]
    fn history_dates_ignore_caller_offset(
        secs in 0i64..4_102_444_800,
        offset_hours in -12i32..=14,
    ) {
        let client = OysterClient::new("http://localhost:8080/api");
        let utc: DateTime<Utc> = Utc.timestamp_opt(secs, 0).unwrap();
        let offset = FixedOffset::east_opt(offset_hours * 3600).unwrap();
        let local = utc.with_timezone(&offset);

        let from_utc = client
            .build_list_transactions(1, &TransactionQuery::page(0, 10).since(utc))
            .unwrap();
        let from_local = client
            .build_list_transactions(1, &TransactionQuery::page(0, 10).since(local))
            .unwrap();
        prop_assert_eq!(from_utc.url, from_local.url);
    }
}
