//! SeaORM implementation of ChargePointRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, IntoActiveModel, Set};
use tracing::{debug, warn};

use super::db_err;
use crate::domain::{ChargePoint, ChargePointRepository, ConnectorStatus, DomainResult};
use crate::infrastructure::database::entities::charge_point;

pub struct SeaOrmChargePointRepository {
    db: DatabaseConnection,
}

impl SeaOrmChargePointRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Existing row, or a freshly inserted one.
    async fn ensure(&self, id: &str) -> DomainResult<charge_point::Model> {
        if let Some(model) = charge_point::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
        {
            return Ok(model);
        }
        debug!(charge_point_id = id, "Registering charge point");
        to_active_model(ChargePoint::new(id))
            .insert(&self.db)
            .await
            .map_err(db_err)
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: charge_point::Model) -> ChargePoint {
    let status = m.status.as_deref().and_then(|s| match s.parse::<ConnectorStatus>() {
        Ok(status) => Some(status),
        Err(e) => {
            warn!(charge_point_id = m.id.as_str(), error = e.as_str(), "Ignoring stored status");
            None
        }
    });

    ChargePoint {
        id: m.id,
        vendor: m.vendor,
        model: m.model,
        serial_number: m.serial_number,
        firmware_version: m.firmware_version,
        iccid: m.iccid,
        imsi: m.imsi,
        is_connected: m.is_connected,
        status,
        last_heartbeat_at: m.last_heartbeat_at,
        last_boot_at: m.last_boot_at,
        last_connect_at: m.last_connect_at,
        last_tx_start_at: m.last_tx_start_at,
        last_tx_stop_at: m.last_tx_stop_at,
        created_at: m.created_at,
    }
}

fn to_active_model(cp: ChargePoint) -> charge_point::ActiveModel {
    charge_point::ActiveModel {
        id: Set(cp.id),
        vendor: Set(cp.vendor),
        model: Set(cp.model),
        serial_number: Set(cp.serial_number),
        firmware_version: Set(cp.firmware_version),
        iccid: Set(cp.iccid),
        imsi: Set(cp.imsi),
        is_connected: Set(cp.is_connected),
        status: Set(cp.status.map(|s| s.as_str().to_string())),
        last_heartbeat_at: Set(cp.last_heartbeat_at),
        last_boot_at: Set(cp.last_boot_at),
        last_connect_at: Set(cp.last_connect_at),
        last_tx_start_at: Set(cp.last_tx_start_at),
        last_tx_stop_at: Set(cp.last_tx_stop_at),
        created_at: Set(cp.created_at),
    }
}

// ── ChargePointRepository impl ──────────────────────────────────

#[async_trait]
impl ChargePointRepository for SeaOrmChargePointRepository {
    async fn find_by_id(&self, id: &str) -> DomainResult<Option<ChargePoint>> {
        let model = charge_point::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn upsert(&self, charge_point: ChargePoint) -> DomainResult<()> {
        let exists = charge_point::Entity::find_by_id(charge_point.id.as_str())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .is_some();

        let model = to_active_model(charge_point);
        if exists {
            model.update(&self.db).await.map_err(db_err)?;
        } else {
            model.insert(&self.db).await.map_err(db_err)?;
        }
        Ok(())
    }

    async fn update_status(&self, id: &str, status: ConnectorStatus) -> DomainResult<()> {
        let mut model = self.ensure(id).await?.into_active_model();
        model.status = Set(Some(status.as_str().to_string()));
        model.update(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn set_connected(
        &self,
        id: &str,
        connected: bool,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let mut model = self.ensure(id).await?.into_active_model();
        model.is_connected = Set(connected);
        if connected {
            model.last_connect_at = Set(Some(at));
        }
        model.update(&self.db).await.map_err(db_err)?;
        Ok(())
    }
}
