use std::sync::LazyLock;

use rand::{Rng, seq::SliceRandom};
use regex::Regex;
use rust_decimal::Decimal;
use sqlx::SqlitePool;

use crate::{
    error::Result,
    models::{NewProduct, ProviderStateRequest, StateAction},
    queries::product_queries,
};

pub const PRODUCTS_EXIST: &str = "products exist";
pub const NO_PRODUCTS_EXIST: &str = "no products exist";
pub const SEEDED_PRODUCT_COUNT: usize = 5;

static PRODUCT_EXISTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^product with id (\d+) exists$").expect("valid provider state pattern")
});

static PRODUCT_MISSING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^product with id (\d+) does not exist$").expect("valid provider state pattern")
});

const ADJECTIVES: &[&str] = &[
    "Rustic", "Sleek", "Ergonomic", "Handmade", "Refined", "Compact", "Vintage", "Sturdy",
];
const MATERIALS: &[&str] = &["Steel", "Wooden", "Cotton", "Granite", "Bamboo", "Leather"];
const NOUNS: &[&str] = &["Chair", "Lamp", "Table", "Backpack", "Kettle", "Keyboard", "Mug"];

/// A provider state recognised by the seeder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderState {
    ProductsExist,
    NoProductsExist,
    ProductExists(i64),
    ProductMissing(i64),
    Unknown(String),
}

impl ProviderState {
    pub fn parse(state: &str) -> Self {
        let state = state.trim();

        if state.eq_ignore_ascii_case(PRODUCTS_EXIST) {
            return ProviderState::ProductsExist;
        }
        if state.eq_ignore_ascii_case(NO_PRODUCTS_EXIST) {
            return ProviderState::NoProductsExist;
        }
        if let Some(id) = capture_id(&PRODUCT_EXISTS, state) {
            return ProviderState::ProductExists(id);
        }
        if let Some(id) = capture_id(&PRODUCT_MISSING, state) {
            return ProviderState::ProductMissing(id);
        }

        ProviderState::Unknown(state.to_string())
    }
}

fn capture_id(pattern: &Regex, state: &str) -> Option<i64> {
    pattern
        .captures(state)
        .and_then(|caps| caps.get(1))
        .and_then(|id| id.as_str().parse().ok())
}

/// Applies a provider state. Applying the same state twice is a no-op the second time.
pub async fn apply(pool: &SqlitePool, request: &ProviderStateRequest) -> Result<ProviderState> {
    let state = ProviderState::parse(&request.state);

    if request.action == StateAction::Teardown {
        tracing::debug!(state = %request.state, "Provider state teardown");
        return Ok(state);
    }

    match &state {
        ProviderState::ProductsExist => {
            if product_queries::count(pool).await? == 0 {
                for product in random_products(SEEDED_PRODUCT_COUNT) {
                    product_queries::create(pool, &product).await?;
                }
                tracing::info!("Seeded {} random products", SEEDED_PRODUCT_COUNT);
            }
        }
        ProviderState::NoProductsExist => {
            let removed = product_queries::delete_all(pool).await?;
            tracing::info!("Removed {} products", removed);
        }
        ProviderState::ProductExists(id) => {
            let product = random_products(1).remove(0);
            if product_queries::create_with_id(pool, *id, &product).await?.is_some() {
                tracing::info!("Seeded product {}", id);
            }
        }
        ProviderState::ProductMissing(id) => {
            if product_queries::delete(pool, *id).await? {
                tracing::info!("Removed product {}", id);
            }
        }
        ProviderState::Unknown(name) => {
            tracing::warn!(state = %name, "Unknown provider state, nothing to seed");
        }
    }

    Ok(state)
}

pub fn random_products(count: usize) -> Vec<NewProduct> {
    let mut rng = rand::thread_rng();

    (0..count)
        .map(|_| {
            let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("Plain");
            let material = MATERIALS.choose(&mut rng).copied().unwrap_or("Steel");
            let noun = NOUNS.choose(&mut rng).copied().unwrap_or("Item");
            let name = format!("{} {} {}", adjective, material, noun);

            NewProduct {
                description: format!("Description for {}", name),
                name,
                price: Decimal::new(rng.gen_range(100..=100_000), 2),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, database};

    async fn pool() -> SqlitePool {
        database::create_pool(&AppConfig::for_tests().database)
            .await
            .unwrap()
    }

    fn setup(state: &str) -> ProviderStateRequest {
        ProviderStateRequest {
            state: state.to_string(),
            params: None,
            action: StateAction::Setup,
        }
    }

    #[test]
    fn parses_known_states() {
        assert_eq!(ProviderState::parse("products exist"), ProviderState::ProductsExist);
        assert_eq!(ProviderState::parse("no products exist"), ProviderState::NoProductsExist);
        assert_eq!(
            ProviderState::parse("product with id 10 exists"),
            ProviderState::ProductExists(10)
        );
        assert_eq!(
            ProviderState::parse("product with id 999 does not exist"),
            ProviderState::ProductMissing(999)
        );
    }

    #[test]
    fn unmatched_states_are_unknown() {
        assert_eq!(
            ProviderState::parse("product with id abc exists"),
            ProviderState::Unknown("product with id abc exists".to_string())
        );
        assert_eq!(
            ProviderState::parse("a product with id 1 exists"),
            ProviderState::Unknown("a product with id 1 exists".to_string())
        );
    }

    #[test]
    fn random_products_are_valid() {
        for product in random_products(20) {
            assert!(!product.name.is_empty());
            assert!(product.description.starts_with("Description for "));
            assert_eq!(product.price.scale(), 2);
            assert!(product.price >= Decimal::ONE);
        }
    }

    #[tokio::test]
    async fn products_exist_seeds_five_once() {
        let pool = pool().await;

        apply(&pool, &setup("products exist")).await.unwrap();
        let first = product_queries::list(&pool).await.unwrap();
        apply(&pool, &setup("products exist")).await.unwrap();
        let second = product_queries::list(&pool).await.unwrap();

        assert_eq!(first.len(), SEEDED_PRODUCT_COUNT);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn products_exist_leaves_existing_rows_alone() {
        let pool = pool().await;

        apply(&pool, &setup("product with id 3 exists")).await.unwrap();
        apply(&pool, &setup("products exist")).await.unwrap();

        assert_eq!(product_queries::count(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn product_with_id_is_inserted_only_if_absent() {
        let pool = pool().await;

        apply(&pool, &setup("product with id 10 exists")).await.unwrap();
        let original = product_queries::find_by_id(&pool, 10).await.unwrap().unwrap();
        apply(&pool, &setup("product with id 10 exists")).await.unwrap();
        let again = product_queries::find_by_id(&pool, 10).await.unwrap().unwrap();

        assert_eq!(original, again);
        assert_eq!(product_queries::count(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_and_empty_states_remove_rows() {
        let pool = pool().await;

        apply(&pool, &setup("product with id 7 exists")).await.unwrap();
        apply(&pool, &setup("product with id 7 does not exist")).await.unwrap();
        assert!(product_queries::find_by_id(&pool, 7).await.unwrap().is_none());

        apply(&pool, &setup("products exist")).await.unwrap();
        apply(&pool, &setup("no products exist")).await.unwrap();
        assert_eq!(product_queries::count(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn teardown_does_not_touch_data() {
        let pool = pool().await;
        let request = ProviderStateRequest {
            action: StateAction::Teardown,
            ..setup("products exist")
        };

        apply(&pool, &request).await.unwrap();

        assert_eq!(product_queries::count(&pool).await.unwrap(), 0);
    }
}
