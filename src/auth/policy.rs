//! Single access policy for every protected operation.
//!
//! Handlers and services describe what they are about to do as an [`Action`]
//! and call [`authorize`]; no other code inspects roles directly.

use uuid::Uuid;

use super::{AuthUser, Role, SubRole};
use crate::{
    entities::{customer, order},
    errors::ServiceError,
};

/// Ownership facts about the record an action targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Resource {
    /// Staff member who created the record
    pub created_by: Option<Uuid>,
    /// Website account that owns the record
    pub owner: Option<Uuid>,
    /// Record originated from the public website
    pub website: bool,
}

impl Resource {
    pub fn customer(model: &customer::Model) -> Self {
        Self {
            created_by: model.created_by,
            owner: model.user_id,
            website: model.website_customer,
        }
    }

    pub fn order(model: &order::Model) -> Self {
        Self {
            created_by: model.created_by,
            owner: model.user_id,
            website: model.source == order::OrderSource::Website,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ViewWarehouse,
    UpdateWarehouseStock,
    ManageBatches,
    ManageWarehouseSettings,
    ManageCatalog,
    ManageReferenceData,
    CreateCustomer,
    ListCustomers,
    ManageCustomer(Resource),
    CreateManualOrder(Resource),
    ViewOrder(Resource),
    UpdateOrderStatus(Resource),
    /// Cart, checkout and website self-registration
    Shop,
}

const WAREHOUSE_ONLY: &[SubRole] = &[SubRole::Warehouse];
const WAREHOUSE_VIEWERS: &[SubRole] = &[
    SubRole::Warehouse,
    SubRole::It,
    SubRole::Manager,
    SubRole::Director,
];
const ELEVATED: &[SubRole] = &SubRole::ELEVATED;
const REFERENCE_DATA: &[SubRole] = &[SubRole::It, SubRole::Director];
const SALES_OR_ELEVATED: &[SubRole] = &[
    SubRole::Sales,
    SubRole::It,
    SubRole::Manager,
    SubRole::Director,
];

/// Allow or deny `action` for `actor`. Denials only name the roles that
/// would have been accepted.
pub fn authorize(actor: &AuthUser, action: Action) -> Result<(), ServiceError> {
    let allowed = match action {
        Action::ViewWarehouse => has_any(actor, WAREHOUSE_VIEWERS),
        Action::UpdateWarehouseStock | Action::ManageBatches => has_any(actor, WAREHOUSE_ONLY),
        Action::ManageWarehouseSettings | Action::ManageCatalog => has_any(actor, ELEVATED),
        Action::ManageReferenceData => has_any(actor, REFERENCE_DATA),
        Action::CreateCustomer | Action::ListCustomers => has_any(actor, SALES_OR_ELEVATED),
        Action::ManageCustomer(resource) => {
            actor.is_elevated() || sales_owns(actor, resource, false)
        }
        Action::CreateManualOrder(customer) => {
            actor.is_elevated() || sales_owns(actor, customer, true)
        }
        Action::UpdateOrderStatus(order) => actor.is_elevated() || sales_owns(actor, order, true),
        Action::Shop => actor.role == Role::User,
        Action::ViewOrder(order) => {
            actor.is_elevated()
                || actor.has_staff_role(SubRole::Warehouse)
                || sales_owns(actor, order, true)
                || order.owner == Some(actor.user_id)
        }
    };

    if allowed {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(required_roles(action)))
    }
}

fn has_any(actor: &AuthUser, roles: &[SubRole]) -> bool {
    actor.staff_role().map_or(false, |r| roles.contains(&r))
}

fn sales_owns(actor: &AuthUser, resource: Resource, website_allowed: bool) -> bool {
    actor.has_staff_role(SubRole::Sales)
        && (resource.created_by == Some(actor.user_id) || (website_allowed && resource.website))
}

fn required_roles(action: Action) -> String {
    if action == Action::Shop {
        return format!("Requires role: {}", Role::User);
    }
    let roles: &[SubRole] = match action {
        Action::ViewWarehouse => WAREHOUSE_VIEWERS,
        Action::UpdateWarehouseStock | Action::ManageBatches => WAREHOUSE_ONLY,
        Action::ManageWarehouseSettings | Action::ManageCatalog => ELEVATED,
        Action::ManageReferenceData => REFERENCE_DATA,
        _ => SALES_OR_ELEVATED,
    };
    let names: Vec<String> = roles.iter().map(ToString::to_string).collect();
    format!("Requires role: {}", names.join(", "))
}

/// Which orders an actor may list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    All,
    CreatedByOrWebsite(Uuid),
    OwnedBy(Uuid),
}

pub fn order_scope(actor: &AuthUser) -> OrderScope {
    match actor.staff_role() {
        Some(role) if role.is_elevated() || role == SubRole::Warehouse => OrderScope::All,
        Some(SubRole::Sales) => OrderScope::CreatedByOrWebsite(actor.user_id),
        _ => OrderScope::OwnedBy(actor.user_id),
    }
}

/// Which customers an actor may list, once [`Action::ListCustomers`] passed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerScope {
    All,
    CreatedByOrWebsite(Uuid),
}

pub fn customer_scope(actor: &AuthUser) -> CustomerScope {
    if actor.is_elevated() {
        CustomerScope::All
    } else {
        CustomerScope::CreatedByOrWebsite(actor.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use assert_matches::assert_matches;

    fn admin(sub_role: SubRole) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            name: None,
            email: None,
            role: Role::Admin,
            sub_role: Some(sub_role),
        }
    }

    fn shopper() -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            name: None,
            email: None,
            role: Role::User,
            sub_role: None,
        }
    }

    #[test]
    fn only_warehouse_staff_update_stock() {
        assert!(authorize(&admin(SubRole::Warehouse), Action::UpdateWarehouseStock).is_ok());
        for role in [SubRole::It, SubRole::Manager, SubRole::Director, SubRole::Sales] {
            assert_matches!(
                authorize(&admin(role), Action::UpdateWarehouseStock),
                Err(ServiceError::Forbidden(msg)) if msg == "Requires role: WAREHOUSE"
            );
        }
        assert!(authorize(&shopper(), Action::UpdateWarehouseStock).is_err());
    }

    #[test]
    fn sales_order_requires_owned_or_website_customer() {
        let agent = admin(SubRole::Sales);
        let own = Resource {
            created_by: Some(agent.user_id),
            ..Resource::default()
        };
        let website = Resource {
            website: true,
            ..Resource::default()
        };
        let foreign = Resource {
            created_by: Some(Uuid::new_v4()),
            ..Resource::default()
        };

        assert!(authorize(&agent, Action::CreateManualOrder(own)).is_ok());
        assert!(authorize(&agent, Action::CreateManualOrder(website)).is_ok());
        assert_matches!(
            authorize(&agent, Action::CreateManualOrder(foreign)),
            Err(ServiceError::Forbidden(_))
        );
        assert!(authorize(&admin(SubRole::Manager), Action::CreateManualOrder(foreign)).is_ok());
        assert!(authorize(&admin(SubRole::Warehouse), Action::CreateManualOrder(own)).is_err());
    }

    #[test]
    fn sales_cannot_edit_website_customers() {
        let agent = admin(SubRole::Sales);
        let website = Resource {
            website: true,
            ..Resource::default()
        };
        assert!(authorize(&agent, Action::ManageCustomer(website)).is_err());
    }

    #[test]
    fn shoppers_see_only_their_orders() {
        let user = shopper();
        let own = Resource {
            owner: Some(user.user_id),
            website: true,
            ..Resource::default()
        };
        let other = Resource {
            owner: Some(Uuid::new_v4()),
            website: true,
            ..Resource::default()
        };
        assert!(authorize(&user, Action::ViewOrder(own)).is_ok());
        assert!(authorize(&user, Action::ViewOrder(other)).is_err());
        assert!(authorize(&user, Action::UpdateOrderStatus(own)).is_err());
        assert_eq!(order_scope(&user), OrderScope::OwnedBy(user.user_id));
    }

    #[test]
    fn only_shopper_accounts_use_the_cart() {
        assert!(authorize(&shopper(), Action::Shop).is_ok());
        assert_matches!(
            authorize(&admin(SubRole::Director), Action::Shop),
            Err(ServiceError::Forbidden(msg)) if msg == "Requires role: USER"
        );
    }

    #[test]
    fn admin_without_sub_role_has_no_staff_rights() {
        let bare = AuthUser {
            sub_role: None,
            ..admin(SubRole::It)
        };
        assert!(authorize(&bare, Action::ViewWarehouse).is_err());
        assert!(authorize(&bare, Action::ManageCatalog).is_err());
    }
}
