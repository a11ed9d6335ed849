pub mod errors;
pub mod routes;
pub mod signature;
pub mod state;

pub use errors::ApiError;
pub use state::AppState;
