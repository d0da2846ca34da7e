use sqlx::SqlitePool;

use crate::{
    error::Result,
    models::{NewProduct, Product},
};

pub async fn list(pool: &SqlitePool) -> Result<Vec<Product>> {
    let products = sqlx::query_as::<_, Product>(
        "SELECT id, name, description, price FROM products ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(products)
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(
        "SELECT id, name, description, price FROM products WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(product)
}

pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

pub async fn create(pool: &SqlitePool, product: &NewProduct) -> Result<Product> {
    let product = sqlx::query_as::<_, Product>(
        "INSERT INTO products (name, description, price) VALUES (?, ?, ?)
         RETURNING id, name, description, price",
    )
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.price.to_string())
    .fetch_one(pool)
    .await?;

    Ok(product)
}

/// Inserts with an explicit id. Returns `None` when the id is already taken.
pub async fn create_with_id(
    pool: &SqlitePool,
    id: i64,
    product: &NewProduct,
) -> Result<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(
        "INSERT INTO products (id, name, description, price) VALUES (?, ?, ?, ?)
         ON CONFLICT (id) DO NOTHING
         RETURNING id, name, description, price",
    )
    .bind(id)
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.price.to_string())
    .fetch_optional(pool)
    .await?;

    Ok(product)
}

pub async fn update(pool: &SqlitePool, id: i64, product: &NewProduct) -> Result<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(
        "UPDATE products SET name = ?, description = ?, price = ? WHERE id = ?
         RETURNING id, name, description, price",
    )
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.price.to_string())
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(product)
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_all(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM products").execute(pool).await?;

    Ok(result.rows_affected())
}
