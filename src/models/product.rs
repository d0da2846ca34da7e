use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, sqlite::SqliteRow};

use crate::error::{AppError, Result};

pub const NAME_MAX_LEN: usize = 200;
pub const DESCRIPTION_MAX_LEN: usize = 500;
pub const PRICE_SCALE: u32 = 2;
/// Prices travel as JSON numbers (f64), which hold 15 significant digits
/// exactly; with two decimals that leaves 13 before the point.
pub const PRICE_MAX_INTEGER_DIGITS: u32 = 13;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

// price is stored as TEXT so the decimal survives SQLite untouched
impl<'r> FromRow<'r, SqliteRow> for Product {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        let price: String = row.try_get("price")?;
        let price = Decimal::from_str(&price).map_err(|e| sqlx::Error::ColumnDecode {
            index: "price".to_string(),
            source: Box::new(e),
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price,
        })
    }
}

/// Body of `POST /api/products` and `PUT /api/products/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

/// A request that passed validation, with the price rounded to its stored scale.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
}

impl ProductRequest {
    pub fn validate(self) -> Result<NewProduct> {
        let name = self.name.trim().to_string();
        let description = self.description.trim().to_string();

        if name.is_empty() {
            return Err(AppError::BadRequest("Name is required".to_string()));
        }
        if name.chars().count() > NAME_MAX_LEN {
            return Err(AppError::BadRequest(format!(
                "Name must be at most {} characters",
                NAME_MAX_LEN
            )));
        }
        if description.is_empty() {
            return Err(AppError::BadRequest("Description is required".to_string()));
        }
        if description.chars().count() > DESCRIPTION_MAX_LEN {
            return Err(AppError::BadRequest(format!(
                "Description must be at most {} characters",
                DESCRIPTION_MAX_LEN
            )));
        }
        if self.price.is_sign_negative() && !self.price.is_zero() {
            return Err(AppError::BadRequest("Price cannot be negative".to_string()));
        }

        let price = self.price.round_dp(PRICE_SCALE);
        if price.trunc().abs().to_string().len() as u32 > PRICE_MAX_INTEGER_DIGITS {
            return Err(AppError::BadRequest("Price is too large".to_string()));
        }

        Ok(NewProduct {
            name,
            description,
            price,
        })
    }
}
