pub mod list;
pub mod network;
pub mod token;
