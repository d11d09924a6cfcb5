pub mod http_client;
pub mod mime;
pub mod shopware_client;
pub mod shopware_models;
