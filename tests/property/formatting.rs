//! Property-based tests for message body wrapping.
//!
//! Uses proptest to verify:
//! 1. No input line break survives wrapping.
//! 2. Removing the inserted breaks gives back the stripped input.
//! 3. Breaks appear exactly once per full 80-character run.
//! 4. No wrapped segment holds more than 80 input characters.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use tchat::chat::format::{WRAP_INDENT, WRAP_WIDTH, render, wrap};

/// Bodies with a mix of text, spaces, line breaks and multi-byte characters.
fn arb_body() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            4 => "[a-z ]",
            1 => Just("\n".to_string()),
            1 => Just("\r".to_string()),
            1 => "[\u{e0}-\u{ff}\u{4e00}-\u{4e10}]",
        ],
        0..400,
    )
    .prop_map(|parts| parts.concat())
}

fn stripped(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '\n' | '\r')).collect()
}

fn break_marker() -> String {
    format!("\n{WRAP_INDENT}")
}

proptest! {
    #[test]
    fn carriage_returns_never_survive(body in arb_body()) {
        prop_assert!(!wrap(&body).contains('\r'));
    }

    #[test]
    fn removing_breaks_restores_stripped_input(body in arb_body()) {
        let wrapped = wrap(&body);
        prop_assert_eq!(wrapped.replace(&break_marker(), ""), stripped(&body));
    }

    #[test]
    fn one_break_per_full_run(body in arb_body()) {
        let n = stripped(&body).chars().count();
        let expected = if n == 0 { 0 } else { (n - 1) / WRAP_WIDTH };
        prop_assert_eq!(wrap(&body).matches('\n').count(), expected);
    }

    #[test]
    fn segments_fit_the_width(body in arb_body()) {
        let wrapped = wrap(&body);
        for (i, segment) in wrapped.split('\n').enumerate() {
            let width = segment.chars().count() - usize::from(i > 0);
            prop_assert!(width <= WRAP_WIDTH);
        }
    }

    #[test]
    fn render_frames_one_record(id in "[a-z2-7]{56}", body in arb_body()) {
        let wrapped = wrap(&body);
        let line = render(&id, &wrapped);
        let prefix = format!("{id}> ");
        prop_assert!(line.starts_with(&prefix));
        prop_assert!(line.ends_with('\n'));
        prop_assert_eq!(&line[prefix.len()..line.len() - 1], wrapped.as_str());
    }
}
