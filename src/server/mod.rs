pub mod server;

pub use server::ConnectionServer;
