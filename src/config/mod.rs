mod permissions;
mod server;

pub use permissions::{default_roles, load_roles, parse_roles};
pub use server::ServerConfig;
