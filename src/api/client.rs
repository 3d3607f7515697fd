use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use tracing::info;

use crate::api::traits::{CatalogoApi, ComprasApi};
use crate::model::{AnalisisFactura, ApiError, CompraCreada, NuevaCompra, Producto, Sucursal};

/// HTTP implementation of the backend capabilities against the AURUM REST
/// API. One instance is built at startup and shared.
pub struct AurumClient {
    client: Client,
    base_url: String,
}

impl AurumClient {
    pub fn new(base_url: &str, timeout_seconds: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .user_agent("aurum-intake/0.1")
            .build()
            .expect("failed to create HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turns non-2xx responses into `ApiError::Status` with the body text,
    /// which is where the backend puts its error detail.
    async fn check(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_else(|_| "unknown".into());
        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait::async_trait]
impl CatalogoApi for AurumClient {
    async fn listar_productos(&self) -> Result<Vec<Producto>, ApiError> {
        let response = self.client.get(self.url("/productos")).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn listar_sucursales(&self) -> Result<Vec<Sucursal>, ApiError> {
        let response = self.client.get(self.url("/sucursales")).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }
}

#[async_trait::async_trait]
impl ComprasApi for AurumClient {
    async fn analizar_factura(
        &self,
        nombre_archivo: &str,
        contenido: Vec<u8>,
    ) -> Result<AnalisisFactura, ApiError> {
        info!("Uploading invoice {} for analysis...", nombre_archivo);
        let form = Form::new().part(
            "archivo",
            Part::bytes(contenido).file_name(nombre_archivo.to_string()),
        );
        let response = self
            .client
            .post(self.url("/compras/factura/ia"))
            .multipart(form)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn crear_compra(&self, compra: &NuevaCompra) -> Result<CompraCreada, ApiError> {
        info!(
            "Submitting purchase with {} item(s) to sucursal {}...",
            compra.items.len(),
            compra.sucursal_id
        );
        let response = self
            .client
            .post(self.url("/compras"))
            .json(compra)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}
