//! Retention category derivation.

use crate::action::{ActionType, Category, EntryStatus};
use crate::entry::ActivityEntry;

/// Metadata key that flags an entry as suspicious.
pub const SUSPICIOUS_KEY: &str = "suspicious";

/// Derives the retention category for an entry.
///
/// Pure function over the entry's fields. Rules are evaluated in order and
/// the first match wins:
///
/// 1. BOOKING, PAYMENT or REFUND actions are CRITICAL.
/// 2. A failed LOGIN is SECURITY.
/// 3. Any other LOGIN is GENERAL.
/// 4. A DELETE of bookings or payments is CRITICAL.
/// 5. Any other DELETE is GENERAL.
/// 6. Entries whose metadata carries a `suspicious` key are SECURITY.
/// 7. Everything else is GENERAL.
///
/// The batching service applies this only when the caller did not supply
/// an explicit category.
#[must_use]
pub fn categorize(entry: &ActivityEntry) -> Category {
    match entry.action {
        ActionType::Booking | ActionType::Payment | ActionType::Refund => Category::Critical,
        ActionType::Login if entry.status == EntryStatus::Failed => Category::Security,
        ActionType::Login => Category::General,
        ActionType::Delete => {
            if is_critical_resource(entry.resource.as_deref()) {
                Category::Critical
            } else {
                Category::General
            }
        }
        _ if entry.metadata.contains_key(SUSPICIOUS_KEY) => Category::Security,
        _ => Category::General,
    }
}

fn is_critical_resource(resource: Option<&str>) -> bool {
    resource.is_some_and(|r| {
        r.eq_ignore_ascii_case("bookings") || r.eq_ignore_ascii_case("payments")
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn entry(action: ActionType) -> ActivityEntry {
        ActivityEntry::new(action, "/api/test", "POST")
    }

    #[test]
    fn test_financial_actions_are_critical() {
        assert_eq!(categorize(&entry(ActionType::Booking)), Category::Critical);
        assert_eq!(categorize(&entry(ActionType::Payment)), Category::Critical);
        assert_eq!(categorize(&entry(ActionType::Refund)), Category::Critical);
    }

    #[test]
    fn test_failed_login_is_security() {
        let failed = entry(ActionType::Login).with_status(EntryStatus::Failed);
        assert_eq!(categorize(&failed), Category::Security);
    }

    #[test]
    fn test_successful_login_is_general() {
        let ok = entry(ActionType::Login).with_status(EntryStatus::Success);
        assert_eq!(categorize(&ok), Category::General);
    }

    #[test]
    fn test_delete_of_financial_resources_is_critical() {
        let bookings = entry(ActionType::Delete).with_resource("bookings");
        assert_eq!(categorize(&bookings), Category::Critical);

        let payments = entry(ActionType::Delete).with_resource("Payments");
        assert_eq!(categorize(&payments), Category::Critical);
    }

    #[test]
    fn test_other_deletes_are_general() {
        let rooms = entry(ActionType::Delete).with_resource("rooms");
        assert_eq!(categorize(&rooms), Category::General);

        let bare = entry(ActionType::Delete);
        assert_eq!(categorize(&bare), Category::General);
    }

    #[test]
    fn test_delete_rule_beats_suspicious_metadata() {
        let deleted = entry(ActionType::Delete)
            .with_resource("rooms")
            .with_metadata_entry(SUSPICIOUS_KEY, json!(true));
        assert_eq!(categorize(&deleted), Category::General);
    }

    #[test]
    fn test_suspicious_metadata_is_security() {
        let flagged = entry(ActionType::Read).with_metadata_entry(SUSPICIOUS_KEY, json!("any"));
        assert_eq!(categorize(&flagged), Category::Security);
    }

    #[test]
    fn test_default_is_general() {
        assert_eq!(categorize(&entry(ActionType::Read)), Category::General);
        assert_eq!(categorize(&entry(ActionType::Create)), Category::General);
        assert_eq!(categorize(&entry(ActionType::Other)), Category::General);
    }

    #[test]
    fn test_categorize_is_pure() {
        let flagged = entry(ActionType::Booking).with_metadata_entry(SUSPICIOUS_KEY, json!(1));
        let first = categorize(&flagged);
        let second = categorize(&flagged);
        assert_eq!(first, second);
        assert_eq!(first, Category::Critical);
    }
}
