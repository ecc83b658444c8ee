pub mod dto;
pub mod handlers;
pub mod routes;

pub use routes::register_routes;
