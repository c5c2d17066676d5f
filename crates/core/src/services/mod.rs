pub mod aggregation_service;
pub mod catalog_service;
pub mod history_service;
pub mod selection_service;
pub mod share_service;
