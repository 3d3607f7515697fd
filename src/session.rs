//! Purchase-intake session: the lifecycle of one invoice from upload to a
//! confirmed purchase.
//!
//! A session owns its line items and is discarded after `Done`; nothing is
//! shared between sessions. The flow mirrors the two-step review modal:
//!
//! ```text
//! UploadPending -> Analyzing -> ReviewItems -> Distributing -> Submitting -> Done
//!                     |             \________________________/^
//!                     v                (distribution optional)
//!               AnalysisFailed  (retry analysis, or manual entry)
//! ```

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};

use crate::allocator;
use crate::api::ComprasApi;
use crate::matcher::match_variante;
use crate::model::{
    AnalisisFactura, ApiError, CompraCreada, DistribucionEntry, ItemCompra, MetodoPago,
    NuevaCompra, SubmitError, Sucursal, VarianteCatalogo,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeState {
    UploadPending,
    Analyzing,
    AnalysisFailed(String),
    ReviewItems,
    Distributing,
    Submitting,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("operación no válida en estado {estado:?}")]
pub struct EstadoInvalido {
    pub estado: IntakeState,
}

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error(transparent)]
    Estado(#[from] EstadoInvalido),
    #[error(transparent)]
    Validacion(#[from] SubmitError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// One editable line of the purchase under review.
#[derive(Debug, Clone)]
pub struct LineaFactura {
    /// Text as printed on the invoice (falls back to the AI-cleaned text).
    pub descripcion_ia: String,
    /// AI-cleaned description, distinct from our own normalizer's output.
    pub descripcion_norm: String,
    pub variante_id: Option<i64>,
    pub cantidad: u32,
    pub costo_unitario: Decimal,
    pub distribucion: Vec<DistribucionEntry>,
    /// Whether the variant was assigned by the matcher rather than a user.
    pub match_auto: bool,
}

pub struct IntakeSession {
    variantes: Vec<VarianteCatalogo>,
    sucursales: Vec<Sucursal>,
    estado: IntakeState,
    proveedor: Option<String>,
    sucursal_id: Option<i64>,
    metodo_pago: MetodoPago,
    notas: Option<String>,
    items: Vec<LineaFactura>,
    confianza: Option<f64>,
    total_detectado: Option<Decimal>,
}

impl IntakeSession {
    pub fn new(
        variantes: Vec<VarianteCatalogo>,
        sucursales: Vec<Sucursal>,
        sucursal_id: Option<i64>,
        metodo_pago: MetodoPago,
    ) -> Self {
        Self {
            variantes,
            sucursales,
            estado: IntakeState::UploadPending,
            proveedor: None,
            sucursal_id,
            metodo_pago,
            notas: None,
            items: Vec::new(),
            confianza: None,
            total_detectado: None,
        }
    }

    pub fn estado(&self) -> &IntakeState {
        &self.estado
    }

    pub fn items(&self) -> &[LineaFactura] {
        &self.items
    }

    pub fn confianza(&self) -> Option<f64> {
        self.confianza
    }

    pub fn total_detectado(&self) -> Option<Decimal> {
        self.total_detectado
    }

    pub fn proveedor(&self) -> Option<&str> {
        self.proveedor.as_deref()
    }

    /// Σ cantidad × costo_unitario over all lines, for display.
    pub fn total(&self) -> Decimal {
        self.items
            .iter()
            .map(|l| Decimal::from(l.cantidad) * l.costo_unitario)
            .sum()
    }

    fn editable(&self) -> Result<(), EstadoInvalido> {
        match self.estado {
            IntakeState::ReviewItems | IntakeState::Distributing => Ok(()),
            _ => Err(EstadoInvalido {
                estado: self.estado.clone(),
            }),
        }
    }

    /// Uploads the invoice and derives the line-item set, auto-matching
    /// each detected line. Allowed from `UploadPending` and as a retry
    /// from `AnalysisFailed`.
    pub async fn analizar(
        &mut self,
        api: &dyn ComprasApi,
        nombre_archivo: &str,
        contenido: Vec<u8>,
    ) -> Result<(), IntakeError> {
        match self.estado {
            IntakeState::UploadPending | IntakeState::AnalysisFailed(_) => {}
            _ => {
                return Err(EstadoInvalido {
                    estado: self.estado.clone(),
                }
                .into());
            }
        }

        self.estado = IntakeState::Analyzing;
        match api.analizar_factura(nombre_archivo, contenido).await {
            Ok(analisis) => {
                self.aplicar_analisis(analisis);
                self.estado = IntakeState::ReviewItems;
                Ok(())
            }
            Err(e) => {
                warn!("Invoice analysis failed: {}", e);
                self.estado = IntakeState::AnalysisFailed(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Skips the AI path entirely: an empty review set the user fills by
    /// hand. Also the fallback after a failed analysis.
    pub fn entrada_manual(&mut self) -> Result<(), EstadoInvalido> {
        match self.estado {
            IntakeState::UploadPending | IntakeState::AnalysisFailed(_) => {
                self.items.clear();
                self.estado = IntakeState::ReviewItems;
                Ok(())
            }
            _ => Err(EstadoInvalido {
                estado: self.estado.clone(),
            }),
        }
    }

    fn aplicar_analisis(&mut self, analisis: AnalisisFactura) {
        self.proveedor = analisis.proveedor_detectado.clone();
        self.confianza = Some(analisis.confianza);
        self.total_detectado = analisis.total_detectado;

        self.items = analisis
            .items_detectados
            .into_iter()
            .map(|item| {
                let m = match_variante(
                    &item.descripcion,
                    &item.descripcion_original,
                    &self.variantes,
                );
                LineaFactura {
                    descripcion_ia: if item.descripcion_original.is_empty() {
                        item.descripcion.clone()
                    } else {
                        item.descripcion_original.clone()
                    },
                    descripcion_norm: item.descripcion,
                    variante_id: m.map(|v| v.id),
                    cantidad: item.cantidad,
                    costo_unitario: item.costo_unitario,
                    distribucion: Vec::new(),
                    match_auto: m.is_some(),
                }
            })
            .collect();

        let auto = self.items.iter().filter(|l| l.match_auto).count();
        info!(
            "Analysis produced {} line(s), {} auto-matched",
            self.items.len(),
            auto
        );
    }

    // ── Review-step edits. Out-of-range indices are ignored. ────────────

    pub fn set_proveedor(&mut self, proveedor: Option<String>) -> Result<(), EstadoInvalido> {
        self.editable()?;
        self.proveedor = proveedor;
        Ok(())
    }

    pub fn set_notas(&mut self, notas: Option<String>) -> Result<(), EstadoInvalido> {
        self.editable()?;
        self.notas = notas;
        Ok(())
    }

    /// Manual variant selection clears the auto-match flag: from here on
    /// the assignment is the user's.
    pub fn set_variante(&mut self, idx: usize, variante_id: Option<i64>) -> Result<(), EstadoInvalido> {
        self.editable()?;
        if let Some(item) = self.items.get_mut(idx) {
            item.variante_id = variante_id;
            item.match_auto = false;
        }
        Ok(())
    }

    pub fn set_cantidad(&mut self, idx: usize, raw: &str) -> Result<(), EstadoInvalido> {
        self.editable()?;
        if let Some(item) = self.items.get_mut(idx) {
            item.cantidad = allocator::parse_cantidad(raw);
        }
        Ok(())
    }

    pub fn set_costo(&mut self, idx: usize, costo: Decimal) -> Result<(), EstadoInvalido> {
        self.editable()?;
        if let Some(item) = self.items.get_mut(idx) {
            item.costo_unitario = costo;
        }
        Ok(())
    }

    pub fn quitar_item(&mut self, idx: usize) -> Result<(), EstadoInvalido> {
        self.editable()?;
        if idx < self.items.len() {
            self.items.remove(idx);
        }
        Ok(())
    }

    /// Appends a blank line for fully manual entry.
    pub fn agregar_item(&mut self) -> Result<(), EstadoInvalido> {
        self.editable()?;
        self.items.push(LineaFactura {
            descripcion_ia: String::new(),
            descripcion_norm: String::new(),
            variante_id: None,
            cantidad: 1,
            costo_unitario: Decimal::ZERO,
            distribucion: Vec::new(),
            match_auto: false,
        });
        Ok(())
    }

    // ── Distribution step. ──────────────────────────────────────────────

    /// Moves to the distribution step; the line set must already be valid
    /// (variant + quantity), exactly like the original modal gate.
    pub fn a_distribuir(&mut self) -> Result<(), IntakeError> {
        if self.estado != IntakeState::ReviewItems {
            return Err(EstadoInvalido {
                estado: self.estado.clone(),
            }
            .into());
        }
        self.validar_items()?;
        self.estado = IntakeState::Distributing;
        Ok(())
    }

    pub fn volver_a_revision(&mut self) -> Result<(), EstadoInvalido> {
        if self.estado != IntakeState::Distributing {
            return Err(EstadoInvalido {
                estado: self.estado.clone(),
            });
        }
        self.estado = IntakeState::ReviewItems;
        Ok(())
    }

    /// Applies one (branch, quantity) edit to a line's distribution.
    pub fn distribuir(
        &mut self,
        idx: usize,
        sucursal_id: i64,
        raw_cantidad: &str,
    ) -> Result<(), EstadoInvalido> {
        self.editable()?;
        let sucursales = &self.sucursales;
        if let Some(item) = self.items.get_mut(idx) {
            item.distribucion = allocator::aplicar_edicion(
                &item.distribucion,
                sucursales,
                sucursal_id,
                allocator::parse_cantidad(raw_cantidad),
            );
        }
        Ok(())
    }

    /// (central remainder, over-allocated) for one line, for display.
    pub fn resumen_distribucion(&self, idx: usize) -> Option<(u32, bool)> {
        self.items.get(idx).map(|item| {
            (
                allocator::a_central(item.cantidad, &item.distribucion),
                allocator::sobreasignado(item.cantidad, &item.distribucion),
            )
        })
    }

    // ── Validation and submission. ──────────────────────────────────────

    fn validar_items(&self) -> Result<(), SubmitError> {
        if self.items.is_empty() {
            return Err(SubmitError::SinItems);
        }
        for (i, item) in self.items.iter().enumerate() {
            if item.variante_id.is_none() {
                return Err(SubmitError::SinVariante(i));
            }
            if item.cantidad == 0 {
                return Err(SubmitError::CantidadInvalida(i));
            }
        }
        Ok(())
    }

    /// Full pre-submission check: fields plus per-line distribution.
    /// Over-allocation is only a warning while editing but a hard stop
    /// here — an over-allocated purchase must never reach the backend.
    pub fn validar(&self) -> Result<(), SubmitError> {
        if self.sucursal_id.is_none() {
            return Err(SubmitError::SinSucursal);
        }
        self.validar_items()?;
        for (i, item) in self.items.iter().enumerate() {
            if allocator::sobreasignado(item.cantidad, &item.distribucion) {
                return Err(SubmitError::Sobreasignado {
                    item: i,
                    distribuido: allocator::distribuido(&item.distribucion),
                    cantidad: item.cantidad,
                });
            }
        }
        Ok(())
    }

    /// Builds the wire payload. Zero-quantity distribution entries are
    /// dropped; an empty `distribucion` means everything stays central.
    pub fn construir_payload(&self) -> Result<NuevaCompra, SubmitError> {
        self.validar()?;
        let sucursal_id = self.sucursal_id.ok_or(SubmitError::SinSucursal)?;
        Ok(NuevaCompra {
            proveedor: self.proveedor.clone().filter(|p| !p.is_empty()),
            sucursal_id,
            metodo_pago: self.metodo_pago,
            notas: self.notas.clone().filter(|n| !n.is_empty()),
            items: self
                .items
                .iter()
                .map(|item| ItemCompra {
                    // validar() guarantees the id is present
                    variante_id: item.variante_id.unwrap_or_default(),
                    cantidad: item.cantidad,
                    costo_unitario: item.costo_unitario,
                    distribucion: item
                        .distribucion
                        .iter()
                        .filter(|d| d.cantidad > 0)
                        .cloned()
                        .collect(),
                })
                .collect(),
        })
    }

    /// Submits the purchase. Works from both `ReviewItems` (all-to-central
    /// mode) and `Distributing`. On failure the session returns to the step
    /// it was on with every edit intact, so the user can retry.
    pub async fn confirmar(&mut self, api: &dyn ComprasApi) -> Result<CompraCreada, IntakeError> {
        self.editable()?;
        let payload = self.construir_payload()?;

        let paso_previo = std::mem::replace(&mut self.estado, IntakeState::Submitting);
        match api.crear_compra(&payload).await {
            Ok(compra) => {
                info!("Purchase {} registered, total {}", compra.id, compra.total);
                self.estado = IntakeState::Done;
                Ok(compra)
            }
            Err(e) => {
                warn!("Purchase submission failed: {}", e);
                self.estado = paso_previo;
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemDetectado, Producto, Variante};
    use std::sync::Mutex;

    fn sucursales() -> Vec<Sucursal> {
        [(1, "Centro"), (2, "Norte")]
            .into_iter()
            .map(|(id, nombre)| Sucursal {
                id,
                nombre: nombre.to_string(),
                direccion: None,
                activa: true,
            })
            .collect()
    }

    fn catalogo() -> Vec<VarianteCatalogo> {
        let productos = vec![Producto {
            id: 1,
            nombre: "Creatina Monohidrato".into(),
            marca: Some("Star Nutrition".into()),
            variantes: vec![Variante {
                id: 7,
                producto_id: 1,
                sabor: None,
                tamanio: Some("300gr".into()),
                sku: None,
                costo: Decimal::from(4000),
                precio_venta: Decimal::from(6500),
                stock_minimo: 2,
                stock_actual: 0,
                activa: true,
            }],
        }];
        crate::matcher::aplanar_variantes(&productos)
    }

    fn analisis() -> AnalisisFactura {
        AnalisisFactura {
            proveedor_detectado: Some("Nutri Argentina".into()),
            confianza: 0.9,
            total_detectado: Some(Decimal::from(52000)),
            items_detectados: vec![
                ItemDetectado {
                    descripcion: "creatina monohidrato star 300gr".into(),
                    descripcion_original: "Crea Mono Star 300gr".into(),
                    cantidad: 10,
                    costo_unitario: Decimal::from(5000),
                },
                ItemDetectado {
                    descripcion: "producto desconocido xyz".into(),
                    descripcion_original: "PROD XYZ".into(),
                    cantidad: 2,
                    costo_unitario: Decimal::from(1000),
                },
            ],
        }
    }

    /// Test double for the backend: canned analysis, recorded submissions.
    struct FakeApi {
        fail_analizar: bool,
        fail_crear: bool,
        compras: Mutex<Vec<NuevaCompra>>,
    }

    impl FakeApi {
        fn ok() -> Self {
            Self {
                fail_analizar: false,
                fail_crear: false,
                compras: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl ComprasApi for FakeApi {
        async fn analizar_factura(
            &self,
            _nombre_archivo: &str,
            _contenido: Vec<u8>,
        ) -> Result<AnalisisFactura, ApiError> {
            if self.fail_analizar {
                return Err(ApiError::Status {
                    status: 502,
                    body: "gemini timeout".into(),
                });
            }
            Ok(analisis())
        }

        async fn crear_compra(&self, compra: &NuevaCompra) -> Result<CompraCreada, ApiError> {
            if self.fail_crear {
                return Err(ApiError::Status {
                    status: 500,
                    body: "db down".into(),
                });
            }
            self.compras.lock().unwrap().push(compra.clone());
            Ok(CompraCreada {
                id: 42,
                proveedor: compra.proveedor.clone(),
                sucursal_id: compra.sucursal_id,
                fecha: chrono::Utc::now().naive_utc(),
                metodo_pago: compra.metodo_pago,
                total: Decimal::from(52000),
            })
        }
    }

    fn sesion() -> IntakeSession {
        IntakeSession::new(catalogo(), sucursales(), Some(1), MetodoPago::Efectivo)
    }

    #[tokio::test]
    async fn analysis_prefills_matches() {
        let mut s = sesion();
        s.analizar(&FakeApi::ok(), "factura.jpg", vec![1, 2, 3])
            .await
            .unwrap();

        assert_eq!(*s.estado(), IntakeState::ReviewItems);
        assert_eq!(s.proveedor(), Some("Nutri Argentina"));
        assert_eq!(s.confianza(), Some(0.9));

        let items = s.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].variante_id, Some(7));
        assert!(items[0].match_auto);
        assert_eq!(items[0].descripcion_ia, "Crea Mono Star 300gr");
        assert_eq!(items[1].variante_id, None);
        assert!(!items[1].match_auto);
    }

    #[tokio::test]
    async fn failed_analysis_allows_retry_or_manual_entry() {
        let api = FakeApi {
            fail_analizar: true,
            ..FakeApi::ok()
        };
        let mut s = sesion();
        assert!(s.analizar(&api, "factura.jpg", vec![]).await.is_err());
        assert!(matches!(s.estado(), IntakeState::AnalysisFailed(_)));

        // Retry against a healthy backend works from the failure state.
        s.analizar(&FakeApi::ok(), "factura.jpg", vec![]).await.unwrap();
        assert_eq!(*s.estado(), IntakeState::ReviewItems);

        // Manual fallback is also reachable from the failure state.
        let mut s2 = sesion();
        let _ = s2.analizar(&api, "factura.jpg", vec![]).await;
        s2.entrada_manual().unwrap();
        assert_eq!(*s2.estado(), IntakeState::ReviewItems);
        assert!(s2.items().is_empty());
    }

    #[tokio::test]
    async fn unmatched_line_blocks_submission() {
        let api = FakeApi::ok();
        let mut s = sesion();
        s.analizar(&api, "factura.jpg", vec![]).await.unwrap();

        let err = s.confirmar(&api).await.unwrap_err();
        assert!(matches!(
            err,
            IntakeError::Validacion(SubmitError::SinVariante(1))
        ));
        // Edits survive the rejected attempt.
        assert_eq!(*s.estado(), IntakeState::ReviewItems);
        assert_eq!(s.items().len(), 2);
    }

    #[tokio::test]
    async fn all_to_central_submission() {
        let api = FakeApi::ok();
        let mut s = sesion();
        s.analizar(&api, "factura.jpg", vec![]).await.unwrap();
        s.set_variante(1, Some(7)).unwrap();

        let compra = s.confirmar(&api).await.unwrap();
        assert_eq!(compra.id, 42);
        assert_eq!(*s.estado(), IntakeState::Done);

        let enviadas = api.compras.lock().unwrap();
        assert_eq!(enviadas.len(), 1);
        // Skipping the distribution step means empty distribucion arrays.
        assert!(enviadas[0].items.iter().all(|i| i.distribucion.is_empty()));
        assert_eq!(enviadas[0].sucursal_id, 1);
    }

    #[tokio::test]
    async fn distribution_flow_and_central_remainder() {
        let api = FakeApi::ok();
        let mut s = sesion();
        s.analizar(&api, "factura.jpg", vec![]).await.unwrap();
        s.set_variante(1, Some(7)).unwrap();
        s.a_distribuir().unwrap();
        assert_eq!(*s.estado(), IntakeState::Distributing);

        // quantity 10: 4 to Centro, 3 to Norte, 3 stay central
        s.distribuir(0, 1, "4").unwrap();
        s.distribuir(0, 2, "3").unwrap();
        assert_eq!(s.resumen_distribucion(0), Some((3, false)));

        let compra = s.confirmar(&api).await.unwrap();
        assert_eq!(compra.id, 42);
        let enviadas = api.compras.lock().unwrap();
        assert_eq!(
            enviadas[0].items[0].distribucion,
            vec![
                DistribucionEntry { sucursal_id: 1, cantidad: 4 },
                DistribucionEntry { sucursal_id: 2, cantidad: 3 },
            ]
        );
    }

    #[tokio::test]
    async fn over_allocation_warns_and_blocks_submission() {
        let api = FakeApi::ok();
        let mut s = sesion();
        s.analizar(&api, "factura.jpg", vec![]).await.unwrap();
        s.set_variante(1, Some(7)).unwrap();
        s.a_distribuir().unwrap();

        // 8 + 5 > 10: flagged, but further edits are still allowed
        s.distribuir(0, 1, "8").unwrap();
        s.distribuir(0, 2, "5").unwrap();
        assert_eq!(s.resumen_distribucion(0), Some((0, true)));

        let err = s.confirmar(&api).await.unwrap_err();
        assert!(matches!(
            err,
            IntakeError::Validacion(SubmitError::Sobreasignado {
                item: 0,
                distribuido: 13,
                cantidad: 10,
            })
        ));
        assert_eq!(*s.estado(), IntakeState::Distributing);

        // Correcting the split unblocks the purchase.
        s.distribuir(0, 2, "2").unwrap();
        s.confirmar(&api).await.unwrap();
        assert_eq!(*s.estado(), IntakeState::Done);
    }

    #[tokio::test]
    async fn failed_submission_preserves_edits() {
        let api_ok = FakeApi::ok();
        let api_bad = FakeApi {
            fail_crear: true,
            ..FakeApi::ok()
        };
        let mut s = sesion();
        s.analizar(&api_ok, "factura.jpg", vec![]).await.unwrap();
        s.set_variante(1, Some(7)).unwrap();
        s.set_cantidad(1, "5").unwrap();

        let err = s.confirmar(&api_bad).await.unwrap_err();
        assert!(matches!(err, IntakeError::Api(_)));
        assert_eq!(*s.estado(), IntakeState::ReviewItems);
        assert_eq!(s.items()[1].cantidad, 5);

        // Manual retry against a working backend succeeds as-is.
        s.confirmar(&api_ok).await.unwrap();
        assert_eq!(*s.estado(), IntakeState::Done);
    }

    #[tokio::test]
    async fn done_session_rejects_further_edits() {
        let api = FakeApi::ok();
        let mut s = sesion();
        s.analizar(&api, "factura.jpg", vec![]).await.unwrap();
        s.set_variante(1, Some(7)).unwrap();
        s.confirmar(&api).await.unwrap();

        assert!(s.set_cantidad(0, "3").is_err());
        assert!(s.agregar_item().is_err());
        assert!(s.a_distribuir().is_err());
        assert!(s.confirmar(&api).await.is_err());
    }

    #[tokio::test]
    async fn manual_entry_builds_a_purchase_from_scratch() {
        let api = FakeApi::ok();
        let mut s = sesion();
        s.entrada_manual().unwrap();
        s.agregar_item().unwrap();
        s.set_variante(0, Some(7)).unwrap();
        s.set_cantidad(0, "3").unwrap();
        s.set_costo(0, Decimal::from(4200)).unwrap();
        s.set_proveedor(Some("Nutri Argentina".into())).unwrap();

        assert_eq!(s.total(), Decimal::from(12600));
        s.confirmar(&api).await.unwrap();
        let enviadas = api.compras.lock().unwrap();
        assert_eq!(enviadas[0].items[0].variante_id, 7);
        assert_eq!(enviadas[0].items[0].cantidad, 3);
    }

    #[tokio::test]
    async fn zero_quantity_line_is_rejected() {
        let api = FakeApi::ok();
        let mut s = sesion();
        s.analizar(&api, "factura.jpg", vec![]).await.unwrap();
        s.set_variante(1, Some(7)).unwrap();
        s.set_cantidad(0, "no idea").unwrap();

        let err = s.confirmar(&api).await.unwrap_err();
        assert!(matches!(
            err,
            IntakeError::Validacion(SubmitError::CantidadInvalida(0))
        ));
    }

    #[tokio::test]
    async fn distribution_gate_requires_valid_items() {
        let api = FakeApi::ok();
        let mut s = sesion();
        s.analizar(&api, "factura.jpg", vec![]).await.unwrap();
        // line 1 has no variant yet
        assert!(s.a_distribuir().is_err());
        assert_eq!(*s.estado(), IntakeState::ReviewItems);

        s.set_variante(1, Some(7)).unwrap();
        s.a_distribuir().unwrap();
        s.volver_a_revision().unwrap();
        assert_eq!(*s.estado(), IntakeState::ReviewItems);
    }
}
