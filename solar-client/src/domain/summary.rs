/// System-wide view of one gateway poll. Folded into a `Reading`, never stored
/// on its own.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SystemSummary {
    pub device_count: usize,
    pub working_device_count: usize,
    pub total_production_kw: f64,
    pub total_consumption_kw: f64,
    pub net_export_kw: f64,
    /// At least one device reported `working`.
    pub system_online: bool,
    /// The gateway answered the request at all.
    pub gateway_online: bool,
}
