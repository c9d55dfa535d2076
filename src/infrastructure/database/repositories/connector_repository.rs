//! SeaORM implementation of ConnectorRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, Set,
};

use super::{connector_column, db_err, stored_connector_id};
use crate::domain::{Connector, ConnectorRepository, ConnectorStatus, ConnectorStatusUpdate, DomainResult};
use crate::infrastructure::database::entities::connector;

pub struct SeaOrmConnectorRepository {
    db: DatabaseConnection,
}

impl SeaOrmConnectorRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find_model(
        &self,
        charge_point_id: &str,
        connector_id: u32,
    ) -> DomainResult<Option<connector::Model>> {
        connector::Entity::find()
            .filter(connector::Column::ChargePointId.eq(charge_point_id))
            .filter(connector::Column::ConnectorId.eq(connector_column(connector_id)?))
            .one(&self.db)
            .await
            .map_err(db_err)
    }

    async fn ensure(&self, charge_point_id: &str, connector_id: u32) -> DomainResult<connector::Model> {
        if let Some(model) = self.find_model(charge_point_id, connector_id).await? {
            return Ok(model);
        }
        let fresh = Connector::new(charge_point_id, connector_id);
        connector::ActiveModel {
            id: NotSet,
            charge_point_id: Set(fresh.charge_point_id),
            connector_id: Set(connector_column(connector_id)?),
            status: Set(fresh.status.as_str().to_string()),
            error_code: Set(None),
            info: Set(None),
            vendor_id: Set(None),
            vendor_error_code: Set(None),
            updated_at: Set(fresh.updated_at),
        }
        .insert(&self.db)
        .await
        .map_err(db_err)
    }
}

fn model_to_domain(m: connector::Model) -> Connector {
    Connector {
        charge_point_id: m.charge_point_id,
        connector_id: stored_connector_id(m.connector_id),
        status: m.status.parse().unwrap_or(ConnectorStatus::Unavailable),
        error_code: m.error_code,
        info: m.info,
        vendor_id: m.vendor_id,
        vendor_error_code: m.vendor_error_code,
        updated_at: m.updated_at,
    }
}

#[async_trait]
impl ConnectorRepository for SeaOrmConnectorRepository {
    async fn find(&self, charge_point_id: &str, connector_id: u32) -> DomainResult<Option<Connector>> {
        Ok(self
            .find_model(charge_point_id, connector_id)
            .await?
            .map(model_to_domain))
    }

    async fn get_or_create(&self, charge_point_id: &str, connector_id: u32) -> DomainResult<Connector> {
        Ok(model_to_domain(self.ensure(charge_point_id, connector_id).await?))
    }

    async fn update_status(
        &self,
        charge_point_id: &str,
        connector_id: u32,
        update: ConnectorStatusUpdate,
    ) -> DomainResult<Connector> {
        let mut model = self
            .ensure(charge_point_id, connector_id)
            .await?
            .into_active_model();
        model.status = Set(update.status.as_str().to_string());
        model.error_code = Set(update.error_code);
        model.info = Set(update.info);
        model.vendor_id = Set(update.vendor_id);
        model.vendor_error_code = Set(update.vendor_error_code);
        model.updated_at = Set(update.at);

        let saved = model.update(&self.db).await.map_err(db_err)?;
        Ok(model_to_domain(saved))
    }

    async fn find_by_charge_point(&self, charge_point_id: &str) -> DomainResult<Vec<Connector>> {
        let models = connector::Entity::find()
            .filter(connector::Column::ChargePointId.eq(charge_point_id))
            .order_by_asc(connector::Column::ConnectorId)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }
}
