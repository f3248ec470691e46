pub mod chat;
pub mod health;
pub mod predict;
pub mod therapy;
mod utils;
