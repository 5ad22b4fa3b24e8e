pub mod protocol;
pub mod rest;
pub mod state;

pub use rest::router;
