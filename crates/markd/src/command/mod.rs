pub mod export;
pub mod serve;
