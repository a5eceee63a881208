//! Business logic services for SPPG procurement

pub mod approval;
pub mod audit;
pub mod budget;
pub mod export;
pub mod inventory;
pub mod items;
pub mod notification;
pub mod procurement;
pub mod quality_control;
pub mod settings;

pub use budget::BudgetService;
pub use export::ExportService;
pub use items::ItemService;
pub use notification::NotificationService;
pub use procurement::ProcurementService;
pub use quality_control::QualityControlService;
pub use settings::SettingsService;
