pub mod miner;
pub mod store;

pub use miner::{MinerConfig, PatternMiner};
pub use store::PatternStore;
