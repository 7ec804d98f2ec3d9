pub mod analysis;
pub mod client;
