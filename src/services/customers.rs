use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{
        authorize,
        policy::{customer_scope, CustomerScope},
        Action, AuthUser, Resource,
    },
    entities::customer::{self, CustomerType},
    errors::ServiceError,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerRequest {
    pub customer_type: CustomerType,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 5, max = 30))]
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub registration_number: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomerRequest {
    pub customer_type: Option<CustomerType>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 5, max = 30))]
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub registration_number: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct CustomerListQuery {
    /// Matches name, email or company name
    pub search: Option<String>,
    pub customer_type: Option<CustomerType>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Business customers must identify the company they buy for
pub fn check_business_fields(
    customer_type: CustomerType,
    company_name: &Option<String>,
    registration_number: &Option<String>,
) -> Result<(), ServiceError> {
    if customer_type != CustomerType::Btb {
        return Ok(());
    }
    let mut errors = Vec::new();
    if blank(company_name) {
        errors.push("companyName is required for BTB customers".to_string());
    }
    if blank(registration_number) {
        errors.push("registrationNumber is required for BTB customers".to_string());
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::InvalidFields(errors))
    }
}

#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DatabaseConnection>,
}

impl CustomerService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Offline customer captured by a sales agent
    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id))]
    pub async fn create_customer(
        &self,
        actor: &AuthUser,
        request: CreateCustomerRequest,
    ) -> Result<customer::Model, ServiceError> {
        authorize(actor, Action::CreateCustomer)?;
        request.validate()?;
        check_business_fields(
            request.customer_type,
            &request.company_name,
            &request.registration_number,
        )?;

        let model = self
            .insert(request, false, None, Some(actor.user_id))
            .await?;
        info!(customer_id = %model.id, "customer created");
        Ok(model)
    }

    /// Website self-registration, one profile per account
    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id))]
    pub async fn register(
        &self,
        actor: &AuthUser,
        request: CreateCustomerRequest,
    ) -> Result<customer::Model, ServiceError> {
        authorize(actor, Action::Shop)?;
        request.validate()?;
        check_business_fields(
            request.customer_type,
            &request.company_name,
            &request.registration_number,
        )?;

        let existing = customer::Entity::find()
            .filter(customer::Column::UserId.eq(actor.user_id))
            .filter(customer::Column::IsDeleted.eq(false))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "A customer profile already exists for this account".to_string(),
            ));
        }

        let model = self
            .insert(request, true, Some(actor.user_id), None)
            .await?;
        info!(customer_id = %model.id, "website customer registered");
        Ok(model)
    }

    async fn insert(
        &self,
        request: CreateCustomerRequest,
        website_customer: bool,
        user_id: Option<Uuid>,
        created_by: Option<Uuid>,
    ) -> Result<customer::Model, ServiceError> {
        let now = Utc::now();
        let model = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_type: Set(request.customer_type),
            name: Set(request.name.trim().to_string()),
            email: Set(request.email.map(|e| e.trim().to_lowercase())),
            phone: Set(request.phone),
            company_name: Set(request.company_name),
            registration_number: Set(request.registration_number),
            address: Set(request.address),
            website_customer: Set(website_customer),
            user_id: Set(user_id),
            created_by: Set(created_by),
            total_orders: Set(0),
            total_order_value: Set(Decimal::ZERO),
            is_deleted: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(model.insert(&*self.db).await?)
    }

    pub async fn list_customers(
        &self,
        actor: &AuthUser,
        query: CustomerListQuery,
    ) -> Result<(Vec<customer::Model>, u64), ServiceError> {
        authorize(actor, Action::ListCustomers)?;

        let mut select = customer::Entity::find()
            .filter(customer::Column::IsDeleted.eq(false))
            .order_by_desc(customer::Column::CreatedAt);

        if let CustomerScope::CreatedByOrWebsite(user_id) = customer_scope(actor) {
            select = select.filter(
                Condition::any()
                    .add(customer::Column::CreatedBy.eq(user_id))
                    .add(customer::Column::WebsiteCustomer.eq(true)),
            );
        }
        if let Some(customer_type) = query.customer_type {
            select = select.filter(customer::Column::CustomerType.eq(customer_type));
        }
        if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            select = select.filter(
                Condition::any()
                    .add(customer::Column::Name.contains(term))
                    .add(customer::Column::Email.contains(term))
                    .add(customer::Column::CompanyName.contains(term)),
            );
        }

        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
        let page = query.page.unwrap_or(1).max(1);
        let paginator = select.paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;
        Ok((items, total))
    }

    async fn find_live(&self, id: Uuid) -> Result<customer::Model, ServiceError> {
        customer::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .filter(|c| !c.is_deleted)
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", id)))
    }

    pub async fn get_customer(
        &self,
        actor: &AuthUser,
        id: Uuid,
    ) -> Result<customer::Model, ServiceError> {
        let customer = self.find_live(id).await?;
        if customer.user_id != Some(actor.user_id) {
            authorize(actor, Action::ManageCustomer(Resource::customer(&customer)))?;
        }
        Ok(customer)
    }

    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id, customer_id = %id))]
    pub async fn update_customer(
        &self,
        actor: &AuthUser,
        id: Uuid,
        request: UpdateCustomerRequest,
    ) -> Result<customer::Model, ServiceError> {
        let customer = self.find_live(id).await?;
        authorize(actor, Action::ManageCustomer(Resource::customer(&customer)))?;
        request.validate()?;

        let customer_type = request.customer_type.unwrap_or(customer.customer_type);
        let company_name = request.company_name.clone().or(customer.company_name.clone());
        let registration_number = request
            .registration_number
            .clone()
            .or(customer.registration_number.clone());
        check_business_fields(customer_type, &company_name, &registration_number)?;

        let mut active: customer::ActiveModel = customer.into();
        active.customer_type = Set(customer_type);
        active.company_name = Set(company_name);
        active.registration_number = Set(registration_number);
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(email) = request.email {
            active.email = Set(Some(email.trim().to_lowercase()));
        }
        if let Some(phone) = request.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(address) = request.address {
            active.address = Set(Some(address));
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(&*self.db).await?)
    }

    /// Soft delete; order history keeps pointing at the row
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id, customer_id = %id))]
    pub async fn delete_customer(&self, actor: &AuthUser, id: Uuid) -> Result<(), ServiceError> {
        let customer = self.find_live(id).await?;
        authorize(actor, Action::ManageCustomer(Resource::customer(&customer)))?;

        let mut active: customer::ActiveModel = customer.into();
        active.is_deleted = Set(true);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;
        info!("customer soft-deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn btb_requires_company_details() {
        assert_matches!(
            check_business_fields(CustomerType::Btb, &None, &Some("  ".into())),
            Err(ServiceError::InvalidFields(errors)) if errors.len() == 2
        );
        assert!(check_business_fields(
            CustomerType::Btb,
            &Some("Roastery Ltd".into()),
            &Some("RC-1029".into())
        )
        .is_ok());
    }

    #[test]
    fn btc_needs_no_company() {
        assert!(check_business_fields(CustomerType::Btc, &None, &None).is_ok());
    }
}
