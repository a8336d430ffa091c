use std::path::PathBuf;

pub const DEFAULT_FOLDER: &str = "tuition_master/documents";
pub const DEFAULT_MULTIPART_FILENAME: &str = "document";

pub struct Env {
    pub frontend_url: String,
    pub ip: String,
    pub port: u16,
    pub default_folder: String,
    pub max_upload_bytes: usize,
    pub storage_timeout_secs: u64,
    pub path_upload_root: Option<PathBuf>,
}

impl Env {
    fn new() -> Self {
        let frontend_url =
            std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());
        let ip = std::env::var("IP").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .expect("PORT must be a valid u16 integer");

        let default_folder =
            std::env::var("DEFAULT_FOLDER").unwrap_or_else(|_| DEFAULT_FOLDER.to_string());
        let max_upload_bytes = std::env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| (10 * 1024 * 1024).to_string())
            .parse::<usize>()
            .expect("MAX_UPLOAD_BYTES must be a valid usize integer");
        let storage_timeout_secs = std::env::var("STORAGE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse::<u64>()
            .expect("STORAGE_TIMEOUT_SECS must be a valid u64 integer");
        let path_upload_root = std::env::var("PATH_UPLOAD_ROOT")
            .ok()
            .filter(|root| !root.trim().is_empty())
            .map(PathBuf::from);

        Env {
            frontend_url,
            ip,
            port,
            default_folder,
            max_upload_bytes,
            storage_timeout_secs,
            path_upload_root,
        }
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}
