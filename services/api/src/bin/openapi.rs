//! services/api/src/bin/openapi.rs
//!
//! Generates the OpenAPI 3.0 document for the study-assistant REST API and
//! writes it to `openapi.json`, for clients that want the contract without
//! a running server.

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

fn write_spec(
    api_doc: utoipa::openapi::OpenApi,
    path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let spec_json = api_doc.to_pretty_json()?;
    std::fs::write(path, spec_json)?;
    println!("OpenAPI specification generated at {}", path);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    write_spec(ApiDoc::openapi(), "openapi.json")?;
    Ok(())
}
