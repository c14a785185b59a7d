pub mod quote;
pub mod task;
