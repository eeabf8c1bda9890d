//! Emits the OpenAPI document as JSON on stdout. Used in CI to catch the
//! spec drifting from the routes without booting the server.

use logintel_api::openapi::ApiDoc;

fn main() {
    match ApiDoc::to_json() {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("failed to generate OpenAPI document: {e}");
            std::process::exit(1);
        }
    }
}
