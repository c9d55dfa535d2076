//! SeaORM implementation of ErrorEventRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Set,
};

use super::{connector_column, db_err, stored_connector_id};
use crate::domain::{DomainResult, ErrorEvent, ErrorEventRepository, NewErrorEvent};
use crate::infrastructure::database::entities::error_event;

pub struct SeaOrmErrorEventRepository {
    db: DatabaseConnection,
}

impl SeaOrmErrorEventRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn model_to_domain(m: error_event::Model) -> ErrorEvent {
    ErrorEvent {
        id: m.id,
        charge_point_id: m.charge_point_id,
        connector_id: m.connector_id.map(stored_connector_id),
        error_code: m.error_code,
        description: m.description,
        vendor_error_code: m.vendor_error_code,
        occurred_at: m.occurred_at,
        resolved_at: m.resolved_at,
    }
}

/// Unresolved events of one scope; `None` is the charge point itself.
fn open_in_scope(charge_point_id: &str, connector_id: Option<u32>) -> DomainResult<Condition> {
    let connector = match connector_id {
        Some(id) => error_event::Column::ConnectorId.eq(connector_column(id)?),
        None => error_event::Column::ConnectorId.is_null(),
    };
    Ok(Condition::all()
        .add(error_event::Column::ChargePointId.eq(charge_point_id))
        .add(connector)
        .add(error_event::Column::ResolvedAt.is_null()))
}

#[async_trait]
impl ErrorEventRepository for SeaOrmErrorEventRepository {
    async fn record(&self, event: NewErrorEvent) -> DomainResult<ErrorEvent> {
        let model = error_event::ActiveModel {
            id: NotSet,
            charge_point_id: Set(event.charge_point_id),
            connector_id: Set(event.connector_id.map(connector_column).transpose()?),
            error_code: Set(event.error_code),
            description: Set(event.description),
            vendor_error_code: Set(event.vendor_error_code),
            occurred_at: Set(event.occurred_at),
            resolved_at: Set(None),
        };
        let saved = model.insert(&self.db).await.map_err(db_err)?;
        Ok(model_to_domain(saved))
    }

    async fn find_open(
        &self,
        charge_point_id: &str,
        connector_id: Option<u32>,
    ) -> DomainResult<Vec<ErrorEvent>> {
        let models = error_event::Entity::find()
            .filter(open_in_scope(charge_point_id, connector_id)?)
            .order_by_asc(error_event::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn resolve_open(
        &self,
        charge_point_id: &str,
        connector_id: Option<u32>,
        at: DateTime<Utc>,
    ) -> DomainResult<u64> {
        let result = error_event::Entity::update_many()
            .col_expr(error_event::Column::ResolvedAt, Expr::value(at))
            .filter(open_in_scope(charge_point_id, connector_id)?)
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected)
    }
}
