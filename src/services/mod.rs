pub mod conversion_service;
pub mod file_service;

pub use conversion_service::{BatchHandle, ConversionService, ConversionServiceError};
pub use file_service::FileService;
