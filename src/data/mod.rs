//! Data sources: parsing uploads, opening stores, caching handles.

pub mod convert;
pub mod handle;
pub mod resolver;
pub mod table;

pub use handle::{DataHandle, Provenance, QueryResult};
pub use resolver::{DataSourceResolver, Selection, SourceKey, TableIdentity, TableUpload};
pub use table::{Column, ColumnType, TableData};
