pub mod inventory;
pub mod order;
pub mod product;
pub mod purchase_order;
pub mod supplier_product;
pub mod sync_log;

pub use inventory::*;
pub use order::*;
pub use product::*;
pub use purchase_order::*;
pub use supplier_product::*;
pub use sync_log::*;
