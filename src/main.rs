mod allocator;
mod api;
mod config;
mod context;
mod matcher;
mod model;
mod normalizer;
mod session;

use std::env;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use api::{AurumClient, CatalogoApi};
use config::load_config;
use context::{AppContext, LogNotifier, NivelAviso};
use matcher::aplanar_variantes;
use session::IntakeSession;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let Some(archivo) = env::args().nth(1) else {
        error!("Usage: aurum-intake <invoice file> [config file]");
        return;
    };
    let config_path = env::args().nth(2).unwrap_or_else(|| "config.json".into());

    // Load configuration from file
    let config = match load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Config load error: {}", e);
            return;
        }
    };

    let contenido = match fs::read(&archivo) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Cannot read invoice {}: {}", archivo, e);
            return;
        }
    };
    let nombre_archivo = Path::new(&archivo)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| archivo.clone());

    let client = AurumClient::new(&config.api_base_url, config.request_timeout_seconds);

    // Reference data: products and branches, fetched concurrently.
    info!("Fetching catalog and branches from {}...", config.api_base_url);
    let (productos, mut sucursales) =
        match futures::try_join!(client.listar_productos(), client.listar_sucursales()) {
            Ok((p, s)) => (p, s),
            Err(e) => {
                error!("Backend fetch failed: {}", e);
                return;
            }
        };
    sucursales.retain(|s| s.activa);

    let variantes = aplanar_variantes(&productos);
    info!(
        "Catalog ready: {} product(s), {} active variant(s), {} branch(es)",
        productos.len(),
        variantes.len(),
        sucursales.len()
    );

    let ctx = AppContext::new(sucursales.clone(), Arc::new(LogNotifier));
    let sucursal_id = config
        .sucursal_id
        .or_else(|| ctx.sucursal_actual().map(|s| s.id));

    let mut sesion = IntakeSession::new(variantes, sucursales, sucursal_id, config.metodo_pago);

    info!("Analyzing invoice {}...", nombre_archivo);
    if let Err(e) = sesion.analizar(&client, &nombre_archivo, contenido).await {
        ctx.avisar(NivelAviso::Error, &format!("Error al analizar: {}", e));
        return;
    }
    if let Some(notas) = config.notas.clone() {
        let _ = sesion.set_notas(Some(notas));
    }
    if let Some(confianza) = sesion.confianza() {
        info!("AI confidence: {:.0}%", confianza * 100.0);
    }
    if let Some(total) = sesion.total_detectado() {
        info!("Invoice total according to the AI: {}", total);
    }

    // Review report
    let mut sin_match = 0usize;
    for (i, item) in sesion.items().iter().enumerate() {
        match item.variante_id {
            Some(id) => info!(
                "  [{}] \"{}\" -> variante {} · {} u. × {} {}",
                i,
                item.descripcion_ia,
                id,
                item.cantidad,
                item.costo_unitario,
                if item.match_auto { "(auto)" } else { "" }
            ),
            None => {
                sin_match += 1;
                warn!(
                    "  [{}] \"{}\" ({}) -> sin match, requiere selección manual",
                    i, item.descripcion_ia, item.descripcion_norm
                );
            }
        }
    }
    info!("Detected total: {}", sesion.total());

    if sin_match > 0 {
        ctx.avisar(
            NivelAviso::Error,
            &format!(
                "{} ítem(s) sin match automático; revisá la factura manualmente",
                sin_match
            ),
        );
        return;
    }

    if !config.auto_confirmar {
        info!("auto_confirmar is off; stopping after review (nothing submitted).");
        return;
    }

    // Every line matched: submit with everything going to the central pool.
    match sesion.confirmar(&client).await {
        Ok(compra) => {
            ctx.avisar(
                NivelAviso::Exito,
                &format!("Compra {} registrada, total {}", compra.id, compra.total),
            );
        }
        Err(e) => {
            ctx.avisar(NivelAviso::Error, &format!("Error al registrar: {}", e));
        }
    }
}
