pub mod client;
pub mod traits;

pub use client::AurumClient;
pub use traits::{CatalogoApi, ComprasApi};
