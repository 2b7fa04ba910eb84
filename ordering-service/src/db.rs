use anyhow::{anyhow, Context, Result};
use sqlx::PgPool;
use tracing::info;

use common_auth::ROLE_ADMIN;

use crate::auth_handlers::hash_password;
use crate::config::ServiceConfig;

/// Menu seeded on first boot when the menu table is empty.
pub const DEFAULT_MENU: &[(&str, &str, &str, f64)] = &[
    ("Veggie", "A garden of delight", "pizza1.png", 0.0038),
    ("Pepperoni", "Spicy treat", "pizza2.png", 0.0042),
    ("Margarita", "Essential classic", "pizza3.png", 0.0042),
    ("Crusty", "A dry mouthed favorite", "pizza4.png", 0.0028),
    (
        "Charred Leopard",
        "For those with a darker side",
        "pizza5.png",
        0.0099,
    ),
];

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS user_roles (
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        role TEXT NOT NULL,
        object_id BIGINT,
        UNIQUE (user_id, role, object_id)
    )",
    "CREATE TABLE IF NOT EXISTS franchises (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS franchise_admins (
        franchise_id BIGINT NOT NULL REFERENCES franchises(id) ON DELETE CASCADE,
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        UNIQUE (franchise_id, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS stores (
        id BIGSERIAL PRIMARY KEY,
        franchise_id BIGINT NOT NULL REFERENCES franchises(id) ON DELETE CASCADE,
        name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS menu_items (
        id BIGSERIAL PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        image TEXT NOT NULL,
        price DOUBLE PRECISION NOT NULL CHECK (price >= 0)
    )",
    "CREATE TABLE IF NOT EXISTS orders (
        id BIGSERIAL PRIMARY KEY,
        diner_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        franchise_id BIGINT NOT NULL,
        store_id BIGINT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS order_items (
        id BIGSERIAL PRIMARY KEY,
        order_id BIGINT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
        menu_id BIGINT NOT NULL,
        description TEXT NOT NULL,
        price DOUBLE PRECISION NOT NULL
    )",
];

/// Creates the schema and seeds the default menu and the bootstrap admin.
/// Safe to run on every startup.
pub async fn initialize(pool: &PgPool, config: &ServiceConfig) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("Failed to create schema")?;
    }

    seed_menu(pool).await?;
    seed_admin(pool, config).await?;
    Ok(())
}

async fn seed_menu(pool: &PgPool) -> Result<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM menu_items")
        .fetch_one(pool)
        .await
        .context("Failed to count menu items")?;
    if count > 0 {
        return Ok(());
    }

    for &(title, description, image, price) in DEFAULT_MENU {
        sqlx::query("INSERT INTO menu_items (title, description, image, price) VALUES ($1, $2, $3, $4)")
            .bind(title)
            .bind(description)
            .bind(image)
            .bind(price)
            .execute(pool)
            .await
            .context("Failed to seed menu")?;
    }

    info!(items = DEFAULT_MENU.len(), "seeded default menu");
    Ok(())
}

async fn seed_admin(pool: &PgPool, config: &ServiceConfig) -> Result<()> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
        .bind(&config.admin_email)
        .fetch_optional(pool)
        .await
        .context("Failed to look up bootstrap admin")?;
    if existing.is_some() {
        return Ok(());
    }

    let password_hash = hash_password(&config.admin_password)
        .map_err(|err| anyhow!("Failed to hash bootstrap admin password: {err}"))?;

    let mut tx = pool.begin().await?;
    let admin_id: i64 = sqlx::query_scalar(
        "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&config.admin_name)
    .bind(&config.admin_email)
    .bind(&password_hash)
    .fetch_one(&mut *tx)
    .await
    .context("Failed to insert bootstrap admin")?;

    sqlx::query("INSERT INTO user_roles (user_id, role, object_id) VALUES ($1, $2, NULL)")
        .bind(admin_id)
        .bind(ROLE_ADMIN)
        .execute(&mut *tx)
        .await
        .context("Failed to grant bootstrap admin role")?;
    tx.commit().await?;

    info!(user_id = admin_id, "seeded bootstrap admin");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_menu_includes_the_veggie() {
        let veggie = DEFAULT_MENU
            .iter()
            .find(|(title, _, _, _)| *title == "Veggie")
            .expect("Veggie on the default menu");
        assert_eq!(veggie.3, 0.0038);
        assert_eq!(DEFAULT_MENU.len(), 5);
    }

    #[test]
    fn default_menu_prices_are_non_negative() {
        assert!(DEFAULT_MENU.iter().all(|(_, _, _, price)| *price >= 0.0));
    }
}
