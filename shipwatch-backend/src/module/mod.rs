pub mod fetch;
pub mod parse;
pub mod pipeline;
pub mod scheduled;
