pub mod assets;
pub mod handlers;
pub mod history;
pub mod jobs;
pub mod routes;

pub use routes::create_router;
