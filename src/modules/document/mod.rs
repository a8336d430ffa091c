pub mod handle;
pub mod identifier;
pub mod model;
pub mod normalizer;
pub mod route;
pub mod schema;
pub mod service;
pub mod storage;
pub mod storage_cloudinary;

pub use model::UploadConfig;
pub use service::DocumentService;
pub use storage_cloudinary::CloudinaryStorage;
