use serde::{Deserialize, Serialize};

/// One intent with its trigger keywords, synonyms, and required argument
/// names. Entry order matters: tier-1 substring matching takes the first
/// entry that hits, so more specific intents go before broader ones
/// (`file_search` before `web_search`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentEntry {
    pub intent: String,
    pub keywords: Vec<String>,
    pub synonyms: Vec<String>,
    pub required_args: Vec<String>,
}

impl IntentEntry {
    pub fn new(intent: &str, keywords: &[&str], synonyms: &[&str], required: &[&str]) -> Self {
        Self {
            intent: intent.to_string(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
            required_args: required.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// All strings this entry matches against, keywords first.
    pub fn triggers(&self) -> impl Iterator<Item = &str> {
        self.keywords
            .iter()
            .chain(self.synonyms.iter())
            .map(|s| s.as_str())
    }
}

/// Static keyword → intent mapping, loaded at construction. Explicit data,
/// not reflection: the fuzzy fallback is a pure function over this table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentTable {
    entries: Vec<IntentEntry>,
}

impl IntentTable {
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn with_entry(mut self, entry: IntentEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn entries(&self) -> &[IntentEntry] {
        &self.entries
    }

    pub fn required_args(&self, intent: &str) -> &[String] {
        self.entries
            .iter()
            .find(|e| e.intent == intent)
            .map(|e| e.required_args.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for IntentTable {
    fn default() -> Self {
        Self {
            entries: vec![
                IntentEntry::new(
                    "file_search",
                    &["find file", "search files", "locate"],
                    &["where is the file"],
                    &["query"],
                ),
                IntentEntry::new(
                    "compose_email",
                    &["email", "compose", "send mail"],
                    &["write to", "mail to"],
                    &["to"],
                ),
                IntentEntry::new(
                    "browser_navigate",
                    &["go to", "navigate", "visit", "browse"],
                    &["take me to"],
                    &["url"],
                ),
                IntentEntry::new(
                    "web_search",
                    &["search", "google", "look up"],
                    &["find online", "what is"],
                    &["query"],
                ),
                IntentEntry::new(
                    "app_launch",
                    &["open", "launch", "start", "run"],
                    &["bring up", "fire up"],
                    &["target"],
                ),
                IntentEntry::new(
                    "system_control",
                    &["volume", "brightness", "mute", "lock screen", "sleep"],
                    &["turn down", "turn up"],
                    &[],
                ),
                IntentEntry::new(
                    "reminder",
                    &["remind", "reminder", "remember to"],
                    &["don't let me forget"],
                    &["task"],
                ),
            ],
        }
    }
}
