//! Application context passed explicitly to whatever drives a session:
//! the known branches, the currently selected one, and a fire-and-forget
//! notification dispatcher. No module-level globals.

use std::sync::Arc;

use tracing::{error, info};

use crate::model::Sucursal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NivelAviso {
    Exito,
    Error,
}

/// Toast-style user notifications. Implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, nivel: NivelAviso, mensaje: &str);
}

/// Default dispatcher: notifications end up in the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, nivel: NivelAviso, mensaje: &str) {
        match nivel {
            NivelAviso::Exito => info!("✅ {}", mensaje),
            NivelAviso::Error => error!("❌ {}", mensaje),
        }
    }
}

pub struct AppContext {
    sucursales: Vec<Sucursal>,
    sucursal_actual: Option<i64>,
    notifier: Arc<dyn Notifier>,
}

impl AppContext {
    /// The first branch starts out selected, mirroring the original UI.
    pub fn new(sucursales: Vec<Sucursal>, notifier: Arc<dyn Notifier>) -> Self {
        let sucursal_actual = sucursales.first().map(|s| s.id);
        Self {
            sucursales,
            sucursal_actual,
            notifier,
        }
    }

    pub fn sucursales(&self) -> &[Sucursal] {
        &self.sucursales
    }

    pub fn sucursal_actual(&self) -> Option<&Sucursal> {
        self.sucursal_actual
            .and_then(|id| self.sucursales.iter().find(|s| s.id == id))
    }

    /// Selects a branch by id; unknown ids leave the selection untouched.
    pub fn seleccionar_sucursal(&mut self, id: i64) -> bool {
        if self.sucursales.iter().any(|s| s.id == id) {
            self.sucursal_actual = Some(id);
            true
        } else {
            false
        }
    }

    /// Replaces the branch list after a refresh. The current selection is
    /// kept when its id survives, otherwise it falls back to the first
    /// branch of the new list.
    pub fn recargar_sucursales(&mut self, nuevas: Vec<Sucursal>) {
        self.sucursal_actual = match self.sucursal_actual {
            Some(id) if nuevas.iter().any(|s| s.id == id) => Some(id),
            _ => nuevas.first().map(|s| s.id),
        };
        self.sucursales = nuevas;
    }

    pub fn avisar(&self, nivel: NivelAviso, mensaje: &str) {
        self.notifier.notify(nivel, mensaje);
    }
}
