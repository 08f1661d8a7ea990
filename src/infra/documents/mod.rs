pub mod graph_client;
pub mod json_catalog_store;

pub use graph_client::GraphDocumentStore;
pub use json_catalog_store::JsonCatalogStore;
