//! Per-line stock distribution across branches.
//!
//! Each purchase line carries an explicit set of (branch, quantity) entries;
//! whatever is not explicitly allocated stays in the central warehouse. The
//! central remainder is derived, never stored. Lines never interact: every
//! function here is scoped to one line's quantity and entries.

use crate::model::{DistribucionEntry, Sucursal};

/// Rebuilds a line's distribution after one (branch, quantity) edit.
///
/// Every known branch keeps its previous quantity except the edited one,
/// and zero-quantity entries are dropped from the result. Branches no
/// longer in `sucursales` are dropped with them.
pub fn aplicar_edicion(
    actual: &[DistribucionEntry],
    sucursales: &[Sucursal],
    sucursal_id: i64,
    cantidad: u32,
) -> Vec<DistribucionEntry> {
    sucursales
        .iter()
        .map(|s| DistribucionEntry {
            sucursal_id: s.id,
            cantidad: if s.id == sucursal_id {
                cantidad
            } else {
                actual
                    .iter()
                    .find(|d| d.sucursal_id == s.id)
                    .map(|d| d.cantidad)
                    .unwrap_or(0)
            },
        })
        .filter(|d| d.cantidad > 0)
        .collect()
}

/// Units explicitly allocated to branches.
pub fn distribuido(distribucion: &[DistribucionEntry]) -> u32 {
    distribucion.iter().map(|d| d.cantidad).sum()
}

/// Units left for the central warehouse: `max(0, total - distribuido)`.
pub fn a_central(total: u32, distribucion: &[DistribucionEntry]) -> u32 {
    total.saturating_sub(distribuido(distribucion))
}

/// True when the explicit allocations exceed the line quantity. Shown as a
/// warning while editing; rejected outright at submission time.
pub fn sobreasignado(total: u32, distribucion: &[DistribucionEntry]) -> bool {
    distribuido(distribucion) > total
}

/// Coerces raw user input to a quantity the way the form fields do: an
/// optional leading integer is taken, anything else is 0.
pub fn parse_cantidad(raw: &str) -> u32 {
    let digits: String = raw
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}
