pub mod alerts;
pub mod health;
pub mod notifications;
pub mod readings;
pub mod settings;
pub mod stats;
