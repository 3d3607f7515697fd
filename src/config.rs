use serde::Deserialize;
use std::fs;

use crate::model::MetodoPago;

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Base URL of the AURUM backend, e.g. "http://localhost:8000/api".
    pub api_base_url: String,
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
    /// Branch the purchase is registered against. Falls back to the first
    /// branch the backend reports when absent.
    #[serde(default)]
    pub sucursal_id: Option<i64>,
    pub metodo_pago: MetodoPago,
    #[serde(default)]
    pub notas: Option<String>,
    /// When false the run stops after the review report instead of
    /// submitting the purchase.
    #[serde(default)]
    pub auto_confirmar: bool,
}

pub fn load_config(path: &str) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}
