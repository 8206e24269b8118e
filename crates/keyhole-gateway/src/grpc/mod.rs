pub mod auth;
pub mod server;

pub use auth::GrpcAuth;
pub use server::ShortenerGrpcServer;
