//! Property-based tests for registry transitions

use super::*;
use proptest::prelude::*;
use proptest::sample::Index;

fn arb_listing() -> impl Strategy<Value = Vec<ConversationSummary>> {
    prop::collection::btree_set("[a-z]{1,3}", 0..8)
        .prop_map(|ids| ids.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
        .prop_flat_map(|ids| {
            let len = ids.len();
            (
                Just(ids),
                prop::collection::vec(proptest::option::of("[A-Za-z ]{1,12}"), len),
                prop::collection::vec(0usize..40, len),
            )
        })
        .prop_map(|(ids, titles, counts)| {
            ids.into_iter()
                .zip(titles)
                .zip(counts)
                .map(|((id, title), message_count)| ConversationSummary {
                    id,
                    created_at: "2025-01-01T00:00:00".to_string(),
                    title,
                    message_count,
                })
                .collect()
        })
}

fn arb_id() -> impl Strategy<Value = Option<String>> {
    proptest::option::of("[a-z]{1,3}")
}

fn has(list: &[ConversationSummary], id: Option<&str>) -> bool {
    id.is_some_and(|id| list.iter().any(|summary| summary.id == id))
}

proptest! {
    // Listing the same conversations twice gives the same selection and order
    #[test]
    fn prop_listing_is_idempotent(list in arb_listing(), current in arb_id(), remembered in arb_id()) {
        let start = Snapshot::with_selection(current);
        let first = listed(&start, list.clone(), remembered.as_deref());
        let second = listed(&first, list, remembered.as_deref());

        prop_assert_eq!(&first.selected, &second.selected);
        prop_assert_eq!(&first.conversations, &second.conversations);
    }

    // Current beats remembered beats first, and the result is always listed
    #[test]
    fn prop_selection_priority(list in arb_listing(), current in arb_id(), remembered in arb_id()) {
        let selected = reconcile_selection(current.as_deref(), remembered.as_deref(), &list);

        let expected = if has(&list, current.as_deref()) {
            current.clone()
        } else if has(&list, remembered.as_deref()) {
            remembered.clone()
        } else {
            list.first().map(|summary| summary.id.clone())
        };
        prop_assert_eq!(&selected, &expected);
        prop_assert_eq!(selected.is_none(), list.is_empty());
    }

    // Deleting never leaves the selection on a missing conversation
    #[test]
    fn prop_delete_keeps_selection_listed(
        list in arb_listing(),
        current in arb_id(),
        victim in any::<Index>(),
    ) {
        prop_assume!(!list.is_empty());
        let id = list[victim.index(list.len())].id.clone();
        let before = listed(&Snapshot::with_selection(current), list, None);
        let after = deleted(&before, &id);

        prop_assert!(!after.contains(&id));
        prop_assert_eq!(after.conversations.len(), before.conversations.len() - 1);
        match after.selected.as_deref() {
            Some(selected) => {
                prop_assert!(after.contains(selected));
            }
            None => {
                prop_assert!(after.conversations.is_empty());
            }
        }
        if before.selected.as_deref() == Some(id.as_str()) {
            prop_assert_eq!(
                after.selected.as_deref(),
                after.conversations.first().map(|summary| summary.id.as_str())
            );
        } else {
            prop_assert_eq!(&after.selected, &before.selected);
        }
    }
}
