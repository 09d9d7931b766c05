//! Consecutive-duplicate removal.

use chatmark::Role;
use chatmark::extract::{ConversationMessage, dedup_key, dedupe};
use proptest::prelude::*;

fn message(role: Role, text: &str) -> ConversationMessage {
    ConversationMessage {
        role,
        markdown: text.to_string(),
        text: text.to_string(),
        key: String::new(),
    }
}

fn key(m: &ConversationMessage) -> String {
    dedup_key(m.role, &m.text, &m.markdown)
}

fn role_strategy() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::User), Just(Role::Assistant), Just(Role::System)]
}

fn text_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("hi".to_string()),
        Just("Hi ".to_string()),
        Just("hello".to_string()),
        Just("hel\u{200b}lo".to_string()),
        Just("two  words".to_string()),
        Just("two\nwords".to_string()),
    ]
}

#[test]
fn test_adjacent_duplicate_dropped() {
    let out = dedupe(vec![
        message(Role::User, "hi"),
        message(Role::Assistant, "hello"),
        message(Role::Assistant, "hello"),
    ]);
    let pairs: Vec<(Role, &str)> = out.iter().map(|m| (m.role, m.text.as_str())).collect();
    assert_eq!(pairs, vec![(Role::User, "hi"), (Role::Assistant, "hello")]);
}

#[test]
fn test_same_text_different_role_kept() {
    let out = dedupe(vec![message(Role::User, "ok"), message(Role::Assistant, "ok")]);
    assert_eq!(out.len(), 2);
}

proptest! {
    #[test]
    fn no_adjacent_equal_keys(
        input in prop::collection::vec((role_strategy(), text_strategy()), 0..24)
    ) {
        let messages: Vec<_> = input.iter().map(|(role, text)| message(*role, text)).collect();
        let out = dedupe(messages.clone());

        for pair in out.windows(2) {
            prop_assert_ne!(key(&pair[0]), key(&pair[1]));
        }

        // Output is the input minus exactly the messages equal to their predecessor.
        let expected: Vec<_> = messages
            .iter()
            .enumerate()
            .filter(|(i, m)| *i == 0 || key(&messages[i - 1]) != key(m))
            .map(|(_, m)| m.clone())
            .collect();
        prop_assert_eq!(&out, &expected);

        prop_assert_eq!(dedupe(out.clone()), out);
    }
}
