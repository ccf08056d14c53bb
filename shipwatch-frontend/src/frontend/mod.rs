pub mod discord;
pub mod router;
