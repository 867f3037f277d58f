mod credit;
pub mod lang;
mod metadata;
mod page;

pub use self::credit::Credit;
pub use self::metadata::GenericMetadata;
pub use self::page::{Page, PageType};
