mod access_grant;
mod catalog_item;
mod membership;
mod order;
mod purchase_history;

pub use access_grant::*;
pub use catalog_item::*;
pub use membership::*;
pub use order::*;
pub use purchase_history::*;
