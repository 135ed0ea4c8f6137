pub mod products;
pub mod sales;
pub mod service_orders;
pub mod taxonomy;

use uuid::Uuid;

/// Human-facing record code such as `OS-1A2B3C4D` or `B-9F00AB12`
pub fn generate_code(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, suffix[..8].to_uppercase())
}
