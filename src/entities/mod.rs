// Catalog
pub mod brand;
pub mod brand_part_type;
pub mod equipment_type;
pub mod part_type;
pub mod product;

// Point of sale
pub mod sale;
pub mod sale_item;

// Repair orders
pub mod equipment_check;
pub mod order_fault;
pub mod order_part;
pub mod order_photo;
pub mod service_order;
