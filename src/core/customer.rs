//! Customer, area and profile lookups.

use crate::{
    entities::{Area, Customer, Profile, area, customer, profile},
    errors::{Error, Result},
};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{QueryOrder, Set, prelude::*};

/// Creates a customer. Names are trimmed and must be unique.
pub async fn create_customer(db: &DatabaseConnection, name: &str) -> Result<customer::Model> {
    let name = required("Customer name", name)?;
    let customer = customer::ActiveModel {
        name: Set(name),
        ..Default::default()
    };
    Ok(customer.insert(db).await?)
}

/// All customers, alphabetically.
pub async fn list_customers(db: &DatabaseConnection) -> Result<Vec<customer::Model>> {
    Customer::find()
        .order_by_asc(customer::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates an area under an existing customer.
pub async fn create_area(
    db: &DatabaseConnection,
    customer_id: i64,
    name: &str,
    code: &str,
) -> Result<area::Model> {
    let name = required("Area name", name)?;
    if Customer::find_by_id(customer_id).one(db).await?.is_none() {
        return Err(Error::Validation {
            message: format!("Customer {customer_id} does not exist"),
        });
    }

    let area = area::ActiveModel {
        customer_id: Set(customer_id),
        name: Set(name),
        code: Set(code.trim().to_uppercase()),
        ..Default::default()
    };
    Ok(area.insert(db).await?)
}

/// Areas of one customer, alphabetically.
pub async fn list_areas_for_customer(
    db: &DatabaseConnection,
    customer_id: i64,
) -> Result<Vec<area::Model>> {
    Area::find()
        .filter(area::Column::CustomerId.eq(customer_id))
        .order_by_asc(area::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Looks up the operator profile for a signed-in email. Both the stored and
/// the given address are lowercased before comparing.
pub async fn find_profile_by_email(
    db: &DatabaseConnection,
    email: &str,
) -> Result<Option<profile::Model>> {
    Profile::find()
        .filter(
            Expr::expr(Func::lower(Expr::col(profile::Column::Email)))
                .eq(email.trim().to_lowercase()),
        )
        .one(db)
        .await
        .map_err(Into::into)
}

pub(crate) fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation {
            message: format!("{field} cannot be empty"),
        });
    }
    Ok(trimmed.to_string())
}
