pub mod common;
pub mod health;
pub mod products;
pub mod sales;
pub mod service_orders;
pub mod taxonomy;

use crate::{config::AppConfig, db::DbPool, db::TransactionOptions};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub products: Arc<crate::services::products::ProductService>,
    pub sales: Arc<crate::services::sales::SalesService>,
    pub service_orders: Arc<crate::services::service_orders::ServiceOrderService>,
    pub taxonomy: Arc<crate::services::taxonomy::TaxonomyService>,
}

impl AppServices {
    /// Builds every service over one pool; writes share `tx_options`.
    pub fn new(db_pool: Arc<DbPool>, config: &AppConfig, tx_options: TransactionOptions) -> Self {
        let products = Arc::new(crate::services::products::ProductService::new(
            db_pool.clone(),
            tx_options.clone(),
            config.api_default_page_size,
            config.api_max_page_size,
            config.low_stock_threshold,
        ));
        let sales = Arc::new(crate::services::sales::SalesService::new(
            db_pool.clone(),
            tx_options.clone(),
            config.api_default_page_size,
            config.api_max_page_size,
        ));
        let service_orders = Arc::new(
            crate::services::service_orders::ServiceOrderService::new(
                db_pool.clone(),
                tx_options.clone(),
                config.api_default_page_size,
                config.api_max_page_size,
            ),
        );
        let taxonomy = Arc::new(crate::services::taxonomy::TaxonomyService::new(
            db_pool,
            tx_options,
        ));

        Self {
            products,
            sales,
            service_orders,
            taxonomy,
        }
    }
}
