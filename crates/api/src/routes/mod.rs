pub mod health;
pub mod properties;
