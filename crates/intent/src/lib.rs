pub mod classifier;
pub mod extract;
pub mod keywords;

pub use classifier::IntentClassifier;
pub use keywords::{IntentEntry, IntentTable};
