use std::sync::Arc;

use tracing::info;

use crate::domain::{Customer, CustomerId, CustomerStatus};
use crate::storage::Repository;

use super::EngineError;

/// Customer lifecycle operations.
pub struct CustomerService {
    repo: Arc<Repository>,
}

impl CustomerService {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Register a new customer. Email addresses are unique.
    pub async fn create_customer(
        &self,
        name: String,
        email: String,
    ) -> Result<Customer, EngineError> {
        let email = email.trim().to_lowercase();
        if self.repo.get_customer_by_email(&email).await?.is_some() {
            return Err(EngineError::EmailAlreadyRegistered(email));
        }

        let customer = Customer::new(name.trim().to_string(), email);
        self.repo.save_customer(&customer).await?;

        info!(customer_id = %customer.id, "registered customer");
        Ok(customer)
    }

    /// Get a customer by ID.
    pub async fn get_customer(&self, id: CustomerId) -> Result<Customer, EngineError> {
        self.repo
            .get_customer(id)
            .await?
            .ok_or_else(|| EngineError::CustomerNotFound(id.to_string()))
    }

    /// Get a customer by email address.
    pub async fn get_customer_by_email(&self, email: &str) -> Result<Customer, EngineError> {
        let email = email.trim().to_lowercase();
        self.repo
            .get_customer_by_email(&email)
            .await?
            .ok_or_else(|| EngineError::CustomerNotFound(email))
    }

    /// List all customers.
    pub async fn list_customers(&self) -> Result<Vec<Customer>, EngineError> {
        Ok(self.repo.list_customers().await?)
    }

    /// Suspend an ACTIVE customer, blocking new accounts and applications.
    pub async fn suspend_customer(
        &self,
        id: CustomerId,
        reason: Option<String>,
    ) -> Result<Customer, EngineError> {
        let mut customer = self.get_customer(id).await?;
        if customer.status != CustomerStatus::Active {
            return Err(EngineError::CustomerInactive {
                customer_id: id,
                status: customer.status.to_string(),
            });
        }

        self.repo
            .update_customer_status(id, CustomerStatus::Suspended)
            .await?;
        customer.status = CustomerStatus::Suspended;

        info!(
            customer_id = %id,
            reason = reason.as_deref().unwrap_or("unspecified"),
            "suspended customer"
        );
        Ok(customer)
    }

    /// Lift a suspension. Only SUSPENDED customers can be reactivated;
    /// CLOSED is terminal.
    pub async fn activate_customer(&self, id: CustomerId) -> Result<Customer, EngineError> {
        let mut customer = self.get_customer(id).await?;
        if customer.status != CustomerStatus::Suspended {
            return Err(EngineError::CustomerInactive {
                customer_id: id,
                status: customer.status.to_string(),
            });
        }

        self.repo
            .update_customer_status(id, CustomerStatus::Active)
            .await?;
        customer.status = CustomerStatus::Active;

        info!(customer_id = %id, "reactivated customer");
        Ok(customer)
    }
}
