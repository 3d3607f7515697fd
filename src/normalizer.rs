//! Canonicalizes free-text invoice descriptions before token matching.
//!
//! Supplier invoices abbreviate almost everything ("crea mono star 300 gr"),
//! so an alias table rewrites known supplier terms into the catalog's
//! vocabulary. Patterns are plain substrings, applied longest-first so a
//! multi-word pattern is consumed before any of its shorter fragments.

/// One (pattern, replacement) rewrite. An empty replacement deletes the
/// pattern (packaging codes and other noise).
#[derive(Debug, Clone, Copy)]
pub struct AliasRule {
    pub pattern: &'static str,
    pub replacement: &'static str,
}

const fn alias(pattern: &'static str, replacement: &'static str) -> AliasRule {
    AliasRule {
        pattern,
        replacement,
    }
}

/// Supplier term -> catalog term. Carried over verbatim from production,
/// including the no-op entries and the literal " s$" pattern; invoices
/// already flowing through the system depend on this exact table.
pub const ALIAS: &[AliasRule] = &[
    // Marcas
    alias("star", "star nutrition"),
    alias("gold", "gold nutrition"),
    alias("gold nutrtion", "gold nutrition"),
    // Productos
    alias("crea mono", "creatina monohidrato"),
    alias("creatina mono", "creatina monohidrato"),
    alias("collagen plus", "colageno plus"),
    alias("collagen sport", "colageno sport"),
    alias("whey pr", "whey protein"),
    alias("plat whey", "whey protein"),
    alias("protein bar", "barra de proteina"),
    alias("pr bar", "barra de proteina"),
    alias("truemade", ""),
    // Sabores
    alias("ch", "chocolate"),
    alias("va", "vainilla"),
    alias("c&c", "cookies and cream"),
    alias("fr", "frutilla"),
    alias("lim", "limon"),
    alias("nar", "naranja"),
    // Tamaños
    alias("2lb", "2lb"),
    alias("2 l", "2lb"),
    alias("300 gr", "300gr"),
    alias("300gr", "300gr"),
    alias("360gr", "360gr"),
    alias("360 gr", "360gr"),
    // Neutro
    alias(" s ", " neutro "),
    alias(" s$", " neutro"),
    // Ignorar
    alias("dpk", ""),
    alias("br", ""),
    alias("u ct", ""),
    alias("plus", "plus"),
];

/// Lowercases `texto`, applies the alias table and collapses whitespace.
/// Total: empty input yields the empty string.
pub fn normalize(texto: &str) -> String {
    normalize_with(texto, ALIAS)
}

/// Same as [`normalize`] but over an explicit rule table.
///
/// Rules are applied longest-pattern-first; equal lengths keep table order
/// (stable sort). Each application is a global substring replacement on the
/// already-lowercased working string, so every pattern must be lowercase.
pub fn normalize_with(texto: &str, rules: &[AliasRule]) -> String {
    let mut t = texto.to_lowercase();

    let mut ordered: Vec<&AliasRule> = rules.iter().collect();
    ordered.sort_by(|a, b| b.pattern.len().cmp(&a.pattern.len()));

    for rule in ordered {
        if t.contains(rule.pattern) {
            t = t.replace(rule.pattern, rule.replacement);
        }
    }

    t.split_whitespace().collect::<Vec<_>>().join(" ")
}
