use actix_cors::Cors;
use actix_web::{self, App, HttpServer, http::header, middleware::Logger, web};
use std::sync::{Arc, LazyLock};

use crate::{
    configs::{CloudinaryConfig, build_http_client},
    modules::document::{CloudinaryStorage, DocumentService, UploadConfig},
};

mod api;
mod configs;
mod constants;
mod modules;
mod utils;

pub static ENV: LazyLock<constants::Env> = LazyLock::new(|| {
    dotenvy::dotenv().ok();
    env_logger::init();
    log::info!("Environment variables loaded from .env file");
    constants::Env::default()
});

#[actix_web::get("/")]
async fn health_check() -> &'static str {
    "Server is running"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    LazyLock::force(&ENV);

    let cloudinary = CloudinaryConfig::from_env().map_err(|e| {
        log::error!("{}", e);
        std::io::Error::other("Storage configuration error")
    })?;
    let client = build_http_client()
        .map_err(|_| std::io::Error::other("HTTP client initialization error"))?;

    let upload_config = UploadConfig::from_env();
    // base64 inflates the payload by a third, plus room for the other fields
    let json_limit = upload_config.max_file_size / 3 * 4 + 64 * 1024;

    let storage = CloudinaryStorage::new(client, cloudinary);
    let document_service = DocumentService::new(Arc::new(storage), upload_config);

    log::info!("Starting server at http://{}:{}", ENV.ip.as_str(), ENV.port);
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&ENV.frontend_url)
            .allowed_methods(vec!["GET", "POST", "DELETE"])
            .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(document_service.clone()))
            .app_data(web::JsonConfig::default().limit(json_limit))
            .service(health_check)
            .service(
                web::scope("/api").service(
                    web::scope("/documents")
                        .configure(modules::document::route::configure::<CloudinaryStorage>),
                ),
            )
    })
    .bind((ENV.ip.as_str(), ENV.port))?
    .workers(2)
    .run()
    .await
}
