pub mod lifecycle;
pub mod server;

pub use lifecycle::{shutdown_signal, Lifecycle, Server, Starter, Stopper};
pub use server::{Engine, EngineBuilder};
