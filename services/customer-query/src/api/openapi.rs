//! OpenAPI document for the customer API.
//!
//! # Purpose
//! Collects every route and schema type into a single document served at
//! `/openapi.json`.
use crate::api::customers;
use crate::api::system;
use crate::api::types::{CustomerCreateRequest, CustomerStoredResponse, ErrorResponse, HealthStatus};
use crate::model::Customer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "customer-query",
        version = "v1",
        description = "Customer lookup and upsert API keyed by RUT"
    ),
    paths(system::health, customers::get_customer, customers::create_customer),
    components(schemas(
        Customer,
        CustomerCreateRequest,
        CustomerStoredResponse,
        ErrorResponse,
        HealthStatus
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "customers", description = "Customer records"),
        (name = "system", description = "Probes")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
