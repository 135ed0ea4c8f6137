pub mod numeric;
pub mod repair_status;

pub use numeric::LooseNumber;
pub use repair_status::{effective_status, resolve_fault_status, RepairStatus};
