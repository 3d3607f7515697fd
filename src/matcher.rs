//! Maps detected invoice lines onto catalog variants.
//!
//! Scoring is deliberately simple: count how many description tokens appear
//! anywhere in the variant's normalized label, plus one bonus point when a
//! token is a prefix of the label (the brand usually leads it). A best score
//! below 2 is treated as no match — one shared token like "proteina" is not
//! evidence. Downstream auto-match behavior depends on this exact rule, so
//! do not tune it casually.

use crate::model::{Producto, VarianteCatalogo};
use crate::normalizer::normalize;

/// Flattens the nested product list into matchable variants. Inactive
/// variants are skipped; they must never win a match.
pub fn aplanar_variantes(productos: &[Producto]) -> Vec<VarianteCatalogo> {
    let mut variantes = Vec::new();
    for p in productos {
        for v in &p.variantes {
            if !v.activa {
                continue;
            }
            let partes: Vec<&str> = [
                Some(p.nombre.as_str()),
                p.marca.as_deref(),
                v.sabor.as_deref(),
                v.tamanio.as_deref(),
            ]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();

            variantes.push(VarianteCatalogo {
                id: v.id,
                label: partes.join(" · "),
                marca: p.marca.clone(),
                nombre_producto: p.nombre.clone(),
                costo: v.costo,
            });
        }
    }
    variantes
}

/// Picks the single best-matching variant for a detected line, or `None`
/// when nothing scores at least 2.
///
/// The AI-cleaned description is tried first, then the raw invoice text;
/// empty candidates are skipped. On equal scores the first variant seen
/// wins, in variant-list order then candidate order.
pub fn match_variante<'a>(
    descripcion: &str,
    descripcion_original: &str,
    variantes: &'a [VarianteCatalogo],
) -> Option<&'a VarianteCatalogo> {
    let textos: Vec<&str> = [descripcion, descripcion_original]
        .into_iter()
        .filter(|t| !t.is_empty())
        .collect();

    let mut mejor: Option<&VarianteCatalogo> = None;
    let mut mejor_score = 0usize;

    for texto in textos {
        let desc = normalize(texto);
        for v in variantes {
            let etiqueta = etiqueta_comparacion(v);
            let score = score_tokens(&desc, &etiqueta);
            if score > mejor_score {
                mejor_score = score;
                mejor = Some(v);
            }
        }
    }

    if mejor_score >= 2 { mejor } else { None }
}

/// Normalized haystack the description tokens are searched in: display
/// label, brand and product name glued together so brand-only or
/// name-only descriptions still overlap.
fn etiqueta_comparacion(v: &VarianteCatalogo) -> String {
    normalize(&format!(
        "{} {} {}",
        v.label,
        v.marca.as_deref().unwrap_or(""),
        v.nombre_producto
    ))
}

fn score_tokens(desc: &str, etiqueta: &str) -> usize {
    // Tokens of length <= 2 are units and noise ("gr", "x", "u").
    let palabras: Vec<&str> = desc.split_whitespace().filter(|p| p.len() > 2).collect();

    let coincidencias = palabras.iter().filter(|p| etiqueta.contains(**p)).count();
    let bonus_marca = palabras.iter().any(|p| etiqueta.starts_with(*p)) as usize;

    coincidencias + bonus_marca
}
