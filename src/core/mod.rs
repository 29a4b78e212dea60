pub mod joiner;
pub mod processor;
pub mod stats;
