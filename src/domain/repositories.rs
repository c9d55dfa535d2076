//! Unified access to the per-aggregate repositories.

use super::charge_point::ChargePointRepository;
use super::connector::ConnectorRepository;
use super::error_event::ErrorEventRepository;
use super::meter_value::MeterValueRepository;
use super::transaction::TransactionRepository;

/// Handlers take the provider and ask for the repository they need:
///
/// ```ignore
/// let cp = repos.charge_points().find_by_id("CP001").await?;
/// let open = repos.transactions().find_active_for_connector("CP001", 1).await?;
/// ```
pub trait RepositoryProvider: Send + Sync {
    fn charge_points(&self) -> &dyn ChargePointRepository;
    fn connectors(&self) -> &dyn ConnectorRepository;
    fn transactions(&self) -> &dyn TransactionRepository;
    fn meter_values(&self) -> &dyn MeterValueRepository;
    fn error_events(&self) -> &dyn ErrorEventRepository;
}
