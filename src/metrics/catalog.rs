// Canonical category lists. Order here is chart-axis order.

pub const PAIN_POINTS: &[&str] = &[
    "Gestión de Reservas",
    "Gestión de Clientes (CRM)",
    "Inventario y Stock",
    "Operaciones y Procesos",
    "Automatización",
    "Administración y Backoffice",
    "Limitaciones del Sistema Actual",
];

pub const DISCOVERY_CHANNELS: &[&str] = &[
    "Búsqueda Orgánica",
    "Redes Sociales",
    "Prospección Directa",
    "Referimiento",
    "Partner Comercial",
    "Evento",
    "Contenido",
    "Marketplace",
    "Prueba de Producto",
];

pub const VOLUME_RANGES: &[&str] = &["0-50", "51-100", "101-200", "201-500", "500+"];

pub const SOLUTION_PARTS: &[&str] = &["Vambe AI", "Vambe Ads", "Vambe Connect"];

pub const USEFUL_ADDONS: &[&str] = &[
    "Llamadas en vambe",
    "Comentarios en instagram",
    "Generador de PDF con IA",
    "Gmail: Envio de correaos con IA",
    "Razones de perdida en tickets",
    "NPS con IA",
    "Formulas Matematicas con IA",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::types::VolumeRange;

    #[test]
    fn volume_catalog_matches_range_labels() {
        let labels: Vec<&str> = VolumeRange::ALL.iter().map(|r| r.label()).collect();
        assert_eq!(labels, VOLUME_RANGES);
    }
}
