//! Property-based tests for the exchange reducer
//!
//! Arbitrary event sequences, including out-of-order and repeated events,
//! must never break the stage invariants.

use super::*;
use proptest::prelude::*;
use serde_json::Value;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_stage() -> impl Strategy<Value = Stage> {
    prop_oneof![Just(Stage::One), Just(Stage::Two), Just(Stage::Three)]
}

fn arb_payload() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,20}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::hash_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

fn arb_event() -> impl Strategy<Value = StreamEvent> {
    prop_oneof![
        4 => arb_stage().prop_map(StreamEvent::StageStart),
        4 => (arb_stage(), arb_payload(), proptest::option::of(arb_payload())).prop_map(
            |(stage, data, metadata)| StreamEvent::StageComplete {
                stage,
                data,
                metadata,
            }
        ),
        1 => proptest::option::of("[A-Za-z ]{1,20}")
            .prop_map(|title| StreamEvent::TitleComplete { title }),
        1 => Just(StreamEvent::Complete),
        1 => "[a-z ]{1,20}".prop_map(|message| StreamEvent::Error { message }),
        1 => "[a-z_]{1,12}".prop_map(|event_type| StreamEvent::Unknown { event_type }),
    ]
}

fn slots(message: &AssistantMessage) -> [&Option<Value>; 4] {
    [
        &message.stage1,
        &message.stage2,
        &message.stage3,
        &message.metadata,
    ]
}

fn flag(message: &AssistantMessage, stage: Stage) -> bool {
    match stage {
        Stage::One => message.loading.stage1,
        Stage::Two => message.loading.stage2,
        Stage::Three => message.loading.stage3,
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Stage slots go from absent to present once and never change afterwards
    #[test]
    fn prop_stage_fields_are_monotonic(events in prop::collection::vec(arb_event(), 0..24)) {
        let mut reducer = ExchangeReducer::new();
        let mut message = AssistantMessage::placeholder();

        for event in events {
            let before = message.clone();
            if let Some(next) = reducer.apply(&message, event).message {
                message = next;
            }
            for (was, is) in slots(&before).into_iter().zip(slots(&message)) {
                prop_assert!(was.is_none() || was == is, "slot changed from {:?} to {:?}", was, is);
            }
        }
    }

    // Loading flags mirror the reducer's per-stage phases
    #[test]
    fn prop_loading_flags_track_phases(events in prop::collection::vec(arb_event(), 0..24)) {
        let mut reducer = ExchangeReducer::new();
        let mut message = AssistantMessage::placeholder();

        for event in events {
            if let Some(next) = reducer.apply(&message, event).message {
                message = next;
            }
            for stage in Stage::ALL {
                prop_assert_eq!(flag(&message, stage), reducer.phase(stage) == StagePhase::Loading);
            }
        }
    }

    // Once terminal, nothing is loading and later events change nothing
    #[test]
    fn prop_terminal_exchange_is_frozen(
        events in prop::collection::vec(arb_event(), 0..24),
        trailing in prop::collection::vec(arb_event(), 1..8),
    ) {
        let mut reducer = ExchangeReducer::new();
        let mut message = AssistantMessage::placeholder();
        for event in events {
            if let Some(next) = reducer.apply(&message, event).message {
                message = next;
            }
        }
        if let Some(next) = reducer.close(&message).message {
            message = next;
        }

        prop_assert!(reducer.status().is_terminal());
        prop_assert!(!message.is_loading());
        for event in trailing {
            prop_assert_eq!(reducer.apply(&message, event), Step::default());
        }
    }

    // Only title_complete and complete ask for a registry refresh
    #[test]
    fn prop_refresh_requested_by_title_and_complete(events in prop::collection::vec(arb_event(), 0..24)) {
        let mut reducer = ExchangeReducer::new();
        let mut message = AssistantMessage::placeholder();

        for event in events {
            let refreshes = matches!(event, StreamEvent::TitleComplete { .. } | StreamEvent::Complete)
                && !reducer.status().is_terminal();
            let step = reducer.apply(&message, event);
            prop_assert_eq!(step.effects == vec![Effect::RefreshRegistry], refreshes);
            if let Some(next) = step.message {
                message = next;
            }
        }
    }

    // A well-formed exchange lands every payload in its slot
    #[test]
    fn prop_ordered_exchange_fills_every_stage(
        stage1 in arb_payload(),
        stage2 in arb_payload(),
        stage3 in arb_payload(),
        metadata in arb_payload(),
    ) {
        let events = vec![
            StreamEvent::StageStart(Stage::One),
            StreamEvent::StageComplete { stage: Stage::One, data: stage1.clone(), metadata: None },
            StreamEvent::StageStart(Stage::Two),
            StreamEvent::StageComplete {
                stage: Stage::Two,
                data: stage2.clone(),
                metadata: Some(metadata.clone()),
            },
            StreamEvent::StageStart(Stage::Three),
            StreamEvent::StageComplete { stage: Stage::Three, data: stage3.clone(), metadata: None },
            StreamEvent::Complete,
        ];

        let mut reducer = ExchangeReducer::new();
        let mut message = AssistantMessage::placeholder();
        for event in events {
            if let Some(next) = reducer.apply(&message, event).message {
                message = next;
            }
        }

        prop_assert_eq!(message.stage1, Some(stage1));
        prop_assert_eq!(message.stage2, Some(stage2));
        prop_assert_eq!(message.stage3, Some(stage3));
        prop_assert_eq!(message.metadata, Some(metadata));
        prop_assert!(!message.loading.any());
        prop_assert_eq!(reducer.status(), &ExchangeStatus::Done);
    }
}
