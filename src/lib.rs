pub mod api;
pub mod media;
pub mod models;
pub mod request;
pub mod state;
pub use dotenv::dotenv;
