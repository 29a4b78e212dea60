pub mod call;
pub mod common;
pub mod output;
