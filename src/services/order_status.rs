use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveEnum, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::{
    auth::{authorize, Action, AuthUser, Resource},
    entities::order::{self, OrderStatus},
    errors::ServiceError,
    metrics,
};

impl OrderStatus {
    /// Legal next states. The single source of truth for every path that
    /// moves an order.
    pub fn allowed_transitions(self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Processing, Cancelled],
            Processing => &[Shipped, Cancelled],
            Shipped => &[Delivered, Returned],
            Delivered => &[Returned],
            Cancelled | Returned => &[],
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

/// Check a move and describe why it is illegal
pub fn check_transition(from: OrderStatus, to: OrderStatus) -> Result<(), ServiceError> {
    if from.can_transition_to(to) {
        return Ok(());
    }
    let reason = if from == to {
        format!("Order is already {}", from.to_value())
    } else if from.is_terminal() {
        format!("Order is {} and can no longer change status", from.to_value())
    } else {
        format!(
            "Cannot transition order from {} to {}",
            from.to_value(),
            to.to_value()
        )
    };
    Err(ServiceError::InvalidTransition(reason))
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DatabaseConnection>,
}

impl OrderStatusService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Move one order row to a new status
    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id, order_id = %order_id))]
    pub async fn update_status(
        &self,
        actor: &AuthUser,
        order_id: &str,
        request: UpdateOrderStatusRequest,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let order = order::Entity::find()
            .filter(order::Column::OrderId.eq(order_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        authorize(actor, Action::UpdateOrderStatus(Resource::order(&order)))?;

        let old_status = order.order_status;
        let updated = apply_transition(&txn, &order, request.status, request.notes).await?;
        txn.commit().await?;

        metrics::increment(metrics::ORDER_STATUS_CHANGED);
        info!(?old_status, new_status = ?updated.order_status, "order status updated");
        Ok(updated)
    }
}

/// Check and write a transition for `order` as it was read.
///
/// The write is conditional on the row still holding the status that was
/// checked, so two racing moves from the same state cannot both land.
pub async fn apply_transition<C>(
    conn: &C,
    order: &order::Model,
    new_status: OrderStatus,
    notes: Option<String>,
) -> Result<order::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let old_status = order.order_status;
    if let Err(err) = check_transition(old_status, new_status) {
        warn!(?old_status, ?new_status, "rejected order status transition");
        return Err(err);
    }

    let now = Utc::now();
    let mut changes = order::ActiveModel {
        order_status: Set(new_status),
        updated_at: Set(now),
        ..Default::default()
    };
    if new_status == OrderStatus::Delivered {
        changes.actual_delivery = Set(Some(now));
    }
    if let Some(notes) = notes {
        changes.notes = Set(Some(notes));
    }

    let result = order::Entity::update_many()
        .set(changes)
        .filter(order::Column::Id.eq(order.id))
        .filter(order::Column::OrderStatus.eq(old_status))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        warn!(?old_status, ?new_status, "order status moved concurrently");
        return Err(ServiceError::Conflict(format!(
            "Order {} is no longer {}",
            order.order_id,
            old_status.to_value()
        )));
    }

    order::Entity::find_by_id(order.id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order.order_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use OrderStatus::*;

    #[test]
    fn forward_path_is_legal() {
        let path = [Pending, Confirmed, Processing, Shipped, Delivered, Returned];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        assert!(Cancelled.is_terminal());
        assert!(Returned.is_terminal());
        assert!(!Delivered.is_terminal());
    }

    #[test]
    fn rejections_use_wire_names() {
        assert_matches!(
            check_transition(Shipped, Pending),
            Err(ServiceError::InvalidTransition(msg))
                if msg == "Cannot transition order from SHIPPED to PENDING"
        );
        assert_matches!(
            check_transition(Confirmed, Confirmed),
            Err(ServiceError::InvalidTransition(msg)) if msg == "Order is already CONFIRMED"
        );
    }
}
