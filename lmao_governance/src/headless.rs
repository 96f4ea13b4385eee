//! Detecting messages that wait on a human who is not there.

use once_cell::sync::Lazy;
use regex::Regex;

const INPUT_REQUEST_PHRASES: [&str; 18] = [
    "would you like",
    "do you want",
    "can you",
    "could you",
    "please provide",
    "please share",
    "please confirm",
    "please clarify",
    "which one",
    "which should",
    "what should i",
    "should i",
    "let me know",
    "tell me",
    "need more info",
    "need more information",
    "what is your",
    "what are your",
];

static REQUEST_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(you|your|please|which|what|confirm|clarif|provide|choose)\b")
        .unwrap_or_else(|_| unreachable!())
});

static QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""[^"]*"|“[^”]*”"#).unwrap_or_else(|_| unreachable!()));

/// True when any message solicits input: a known phrase, or a question mark
/// next to a second-person or request word. Quoted text is ignored so that
/// cited questions do not count.
pub fn requests_user_input<'a>(messages: impl IntoIterator<Item = &'a str>) -> bool {
    messages.into_iter().any(|content| {
        let lowered = QUOTED.replace_all(content.trim(), " ").to_lowercase();
        if lowered.trim().is_empty() {
            return false;
        }
        if INPUT_REQUEST_PHRASES
            .iter()
            .any(|phrase| lowered.contains(phrase))
        {
            return true;
        }
        lowered.contains('?') && REQUEST_KEYWORD.is_match(&lowered)
    })
}
