// Core structs shared across the intake flow.
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

fn default_activa() -> bool {
    true
}

/// A branch (sucursal) as returned by `GET /sucursales`.
#[derive(Debug, Clone, Deserialize)]
pub struct Sucursal {
    pub id: i64,
    pub nombre: String,
    #[serde(default)]
    pub direccion: Option<String>,
    #[serde(default = "default_activa")]
    pub activa: bool,
}

/// A product with its nested variants, as returned by `GET /productos`.
#[derive(Debug, Clone, Deserialize)]
pub struct Producto {
    pub id: i64,
    pub nombre: String,
    #[serde(default)]
    pub marca: Option<String>,
    #[serde(default)]
    pub variantes: Vec<Variante>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Variante {
    pub id: i64,
    pub producto_id: i64,
    #[serde(default)]
    pub sabor: Option<String>,
    #[serde(default)]
    pub tamanio: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    pub costo: Decimal,
    pub precio_venta: Decimal,
    #[serde(default)]
    pub stock_minimo: i32,
    #[serde(default)]
    pub stock_actual: i32,
    #[serde(default = "default_activa")]
    pub activa: bool,
}

/// One active variant flattened out of the product tree, ready for matching.
/// `label` is the display label shown to the user; the matcher derives its
/// own comparison label from `label`, `marca` and `nombre_producto`.
#[derive(Debug, Clone, PartialEq)]
pub struct VarianteCatalogo {
    pub id: i64,
    pub label: String,
    pub marca: Option<String>,
    pub nombre_producto: String,
    pub costo: Decimal,
}

/// Result of the AI invoice analysis (`POST /compras/factura/ia`).
#[derive(Debug, Clone, Deserialize)]
pub struct AnalisisFactura {
    #[serde(default)]
    pub proveedor_detectado: Option<String>,
    pub confianza: f64,
    #[serde(default)]
    pub total_detectado: Option<Decimal>,
    pub items_detectados: Vec<ItemDetectado>,
}

/// One line item detected on the invoice. `descripcion` is the AI-cleaned
/// text, `descripcion_original` the text as printed on the invoice.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemDetectado {
    pub descripcion: String,
    #[serde(default)]
    pub descripcion_original: String,
    pub cantidad: u32,
    pub costo_unitario: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetodoPago {
    Efectivo,
    Transferencia,
    Tarjeta,
}

/// One (branch, quantity) split of a purchase line. Entries with
/// `cantidad == 0` are never persisted; the central-warehouse remainder is
/// implicit and never appears here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistribucionEntry {
    pub sucursal_id: i64,
    pub cantidad: u32,
}

/// Purchase creation payload (`POST /compras`).
#[derive(Debug, Clone, Serialize)]
pub struct NuevaCompra {
    pub proveedor: Option<String>,
    pub sucursal_id: i64,
    pub metodo_pago: MetodoPago,
    pub notas: Option<String>,
    pub items: Vec<ItemCompra>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemCompra {
    pub variante_id: i64,
    pub cantidad: u32,
    pub costo_unitario: Decimal,
    pub distribucion: Vec<DistribucionEntry>,
}

/// Subset of the backend's purchase response we care about.
#[derive(Debug, Clone, Deserialize)]
pub struct CompraCreada {
    pub id: i64,
    #[serde(default)]
    pub proveedor: Option<String>,
    pub sucursal_id: i64,
    // the backend emits naive local timestamps, no offset
    pub fecha: NaiveDateTime,
    pub metodo_pago: MetodoPago,
    pub total: Decimal,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Validation failures surfaced before a purchase is submitted. These are
/// values, not panics: the caller decides how to message the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("la compra no tiene ítems")]
    SinItems,
    #[error("no hay sucursal seleccionada")]
    SinSucursal,
    #[error("ítem {0}: falta seleccionar la variante")]
    SinVariante(usize),
    #[error("ítem {0}: cantidad inválida")]
    CantidadInvalida(usize),
    #[error("ítem {item}: la distribución ({distribuido}) supera la cantidad ({cantidad})")]
    Sobreasignado {
        item: usize,
        distribuido: u32,
        cantidad: u32,
    },
}
