//! Format-neutral comic metadata and the codecs that embed it in archives.
//!
//! [`GenericMetadata`] is the common model. Each [`MetadataStyle`] names one
//! on-disk format and hands out its [`Codec`]:
//!
//! ```
//! use panels_metadata::{GenericMetadata, MetadataStyle};
//!
//! let md = GenericMetadata { series: Some("Saga".into()), issue: Some("1".into()), ..Default::default() };
//! let codec = MetadataStyle::Cix.codec();
//! let xml = codec.serialize(&md).unwrap();
//! assert!(codec.validate(&xml));
//! assert_eq!(codec.parse(&xml).unwrap(), md);
//! ```

pub mod codec;
pub mod error;
pub mod models;

pub use crate::codec::{CoMet, Codec, ComicBookInfo, ComicInfo, MetadataLocation, MetadataStyle};
pub use crate::models::{Credit, GenericMetadata, Page, PageType};
