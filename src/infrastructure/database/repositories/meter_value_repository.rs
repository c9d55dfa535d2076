//! SeaORM implementation of MeterValueRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveValue::NotSet, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    Set,
};

use super::{connector_column, db_err, stored_connector_id};
use crate::domain::{
    DomainResult, MeterValue, MeterValueRepository, NewMeterValue, ENERGY_ACTIVE_IMPORT_REGISTER,
};
use crate::infrastructure::database::entities::meter_value;

pub struct SeaOrmMeterValueRepository {
    db: DatabaseConnection,
}

impl SeaOrmMeterValueRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn model_to_domain(m: meter_value::Model) -> MeterValue {
    MeterValue {
        id: m.id,
        charge_point_id: m.charge_point_id,
        connector_id: stored_connector_id(m.connector_id),
        transaction_id: m.transaction_id,
        timestamp: m.timestamp,
        measurand: m.measurand,
        value: m.value,
        unit: m.unit,
        context: m.context,
        location: m.location,
        phase: m.phase,
        format: m.format,
    }
}

fn to_active_model(v: NewMeterValue) -> DomainResult<meter_value::ActiveModel> {
    Ok(meter_value::ActiveModel {
        id: NotSet,
        charge_point_id: Set(v.charge_point_id),
        connector_id: Set(connector_column(v.connector_id)?),
        transaction_id: Set(v.transaction_id),
        timestamp: Set(v.timestamp),
        measurand: Set(v.measurand),
        value: Set(v.value),
        unit: Set(v.unit),
        context: Set(v.context),
        location: Set(v.location),
        phase: Set(v.phase),
        format: Set(v.format),
    })
}

#[async_trait]
impl MeterValueRepository for SeaOrmMeterValueRepository {
    async fn append(&self, values: Vec<NewMeterValue>) -> DomainResult<usize> {
        // insert_many rejects an empty batch
        if values.is_empty() {
            return Ok(0);
        }
        let count = values.len();
        let models = values
            .into_iter()
            .map(to_active_model)
            .collect::<DomainResult<Vec<_>>>()?;
        meter_value::Entity::insert_many(models)
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(count)
    }

    async fn find_last_for_transaction(&self, transaction_id: i32) -> DomainResult<Option<MeterValue>> {
        let models = meter_value::Entity::find()
            .filter(meter_value::Column::TransactionId.eq(transaction_id))
            .filter(meter_value::Column::Measurand.eq(ENERGY_ACTIVE_IMPORT_REGISTER))
            .order_by_desc(meter_value::Column::Timestamp)
            .order_by_desc(meter_value::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(models
            .into_iter()
            .map(model_to_domain)
            .find(|mv| mv.energy_wh().is_some()))
    }
}
