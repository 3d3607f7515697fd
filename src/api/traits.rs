use crate::model::{AnalisisFactura, ApiError, CompraCreada, NuevaCompra, Producto, Sucursal};

/// Read-only reference data: products (with variants) and branches.
#[async_trait::async_trait]
pub trait CatalogoApi: Send + Sync {
    async fn listar_productos(&self) -> Result<Vec<Producto>, ApiError>;
    async fn listar_sucursales(&self) -> Result<Vec<Sucursal>, ApiError>;
}

/// Purchase-side operations: AI invoice analysis and purchase creation.
#[async_trait::async_trait]
pub trait ComprasApi: Send + Sync {
    /// Uploads the invoice file and returns the detected line items.
    async fn analizar_factura(
        &self,
        nombre_archivo: &str,
        contenido: Vec<u8>,
    ) -> Result<AnalisisFactura, ApiError>;

    async fn crear_compra(&self, compra: &NuevaCompra) -> Result<CompraCreada, ApiError>;
}
