pub mod attempt;
pub mod billing;
pub mod transaction;
