pub mod delivery;
pub mod group_service;
pub mod history;

pub use delivery::DeliveryService;
pub use group_service::GroupService;
pub use history::HistoryService;
