//! Intent-specific argument extraction. Runs on normalized text after the
//! intent is fixed; extraction never fails classification, missing required
//! arguments only reduce confidence.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static EMAIL_TO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bto\s+([a-z0-9._%+-]+(?:@[a-z0-9.-]+)?)").unwrap());
static EMAIL_SUBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\babout\s+(.+)$").unwrap());
static APP_TARGET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:open|launch|start|run|bring up|fire up)\s+(?:the\s+)?(.+)$").unwrap()
});
static SEARCH_QUERY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:search(?:\s+for)?|google|look\s+up|find\s+online|what\s+is)\s+(.+)$").unwrap()
});
static NAV_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:go\s+to|navigate\s+to|visit|browse|take\s+me\s+to)\s+(\S+)").unwrap()
});
static FILE_QUERY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:find\s+file|locate|search\s+files(?:\s+for)?)\s+(.+)$").unwrap()
});
static REMINDER_TASK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:remind(?:er)?(?:\s+me)?(?:\s+to)?|remember\s+to)\s+(.+)$").unwrap()
});
static CONTROL_LEVEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(volume|brightness)\s+(?:to\s+)?(\d{1,3})\b").unwrap());
static LOCATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bin\s+([a-z][a-z ]*)$").unwrap());

/// Extract arguments for a fixed intent from normalized text.
pub fn extract_args(intent_type: &str, text: &str) -> HashMap<String, String> {
    let mut args = HashMap::new();

    match intent_type {
        "compose_email" => {
            capture_into(&EMAIL_TO, text, 1, "to", &mut args);
            capture_into(&EMAIL_SUBJECT, text, 1, "subject", &mut args);
        }
        "app_launch" => {
            capture_into(&APP_TARGET, text, 1, "target", &mut args);
        }
        "web_search" => {
            capture_into(&SEARCH_QUERY, text, 1, "query", &mut args);
        }
        "browser_navigate" => {
            capture_into(&NAV_URL, text, 1, "url", &mut args);
        }
        "file_search" => {
            capture_into(&FILE_QUERY, text, 1, "query", &mut args);
        }
        "reminder" => {
            capture_into(&REMINDER_TASK, text, 1, "task", &mut args);
        }
        "system_control" => {
            if let Some(caps) = CONTROL_LEVEL.captures(text) {
                args.insert("control".to_string(), caps[1].to_string());
                args.insert("level".to_string(), caps[2].to_string());
            }
        }
        _ => {}
    }

    // Trailing location clause applies to any intent
    capture_into(&LOCATION, text, 1, "location", &mut args);

    args
}

fn capture_into(re: &Regex, text: &str, group: usize, key: &str, out: &mut HashMap<String, String>) {
    if let Some(caps) = re.captures(text) {
        if let Some(m) = caps.get(group) {
            let value = m.as_str().trim();
            if !value.is_empty() {
                out.insert(key.to_string(), value.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_launch_target() {
        let args = extract_args("app_launch", "open chrome");
        assert_eq!(args.get("target").map(String::as_str), Some("chrome"));
    }

    #[test]
    fn test_email_to_and_subject() {
        let args = extract_args("compose_email", "send mail to alice about the quarterly report");
        assert_eq!(args.get("to").map(String::as_str), Some("alice"));
        assert_eq!(
            args.get("subject").map(String::as_str),
            Some("the quarterly report")
        );
    }

    #[test]
    fn test_email_address_form() {
        let args = extract_args("compose_email", "email to bob@example.com");
        assert_eq!(args.get("to").map(String::as_str), Some("bob@example.com"));
    }

    #[test]
    fn test_search_query() {
        let args = extract_args("web_search", "search for rust async traits");
        assert_eq!(
            args.get("query").map(String::as_str),
            Some("rust async traits")
        );
    }

    #[test]
    fn test_navigate_url() {
        let args = extract_args("browser_navigate", "go to example.com please");
        assert_eq!(args.get("url").map(String::as_str), Some("example.com"));
    }

    #[test]
    fn test_reminder_task() {
        let args = extract_args("reminder", "remind me to water the plants");
        assert_eq!(
            args.get("task").map(String::as_str),
            Some("water the plants")
        );
    }

    #[test]
    fn test_system_control_level() {
        let args = extract_args("system_control", "volume to 40");
        assert_eq!(args.get("control").map(String::as_str), Some("volume"));
        assert_eq!(args.get("level").map(String::as_str), Some("40"));
    }

    #[test]
    fn test_trailing_location() {
        let args = extract_args("file_search", "find file report in documents");
        assert_eq!(args.get("location").map(String::as_str), Some("documents"));
    }

    #[test]
    fn test_missing_args_yield_empty_map() {
        let args = extract_args("web_search", "search");
        assert!(args.get("query").is_none());
    }
}
