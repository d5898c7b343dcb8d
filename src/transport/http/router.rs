use crate::domain::model::{Application, License, Module, Price, UpdateCheck};
use crate::domain::versioning::{ModuleVersion, ModuleVersionGroup};
use crate::transport::http::auth::require_admin;
use crate::transport::http::handlers::applications::{self, MAX_APPLICATION_UPLOAD_BYTES};
use crate::transport::http::handlers::modules::{self, MAX_MODULE_UPLOAD_BYTES};
use crate::transport::http::handlers::{download, health, license};
use crate::transport::http::types::{
    ApiResponse, AppState, LicenseActiveRequest, MarketplaceEntry, ModuleDetail,
    ModuleMetadataRequest, StoredModuleEntry, UnregisteredModule, UpdateModuleRequest,
    VerifyLicenseRequest, VerifyLicenseResponse,
};
use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::middleware;
use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck_handler,
        license::verify_license_handler,
        license::list_licenses_handler,
        license::set_license_active_handler,
        download::download_handler,
        modules::list_module_groups_handler,
        modules::module_detail_handler,
        modules::module_info_handler,
        modules::modules_of_type_handler,
        modules::module_versions_handler,
        modules::marketplace_handler,
        modules::upload_module_handler,
        modules::update_module_handler,
        modules::delete_module_handler,
        modules::module_metadata_handler,
        applications::list_applications_handler,
        applications::application_detail_handler,
        applications::check_update_handler,
        applications::upload_application_handler,
        applications::delete_application_handler
    ),
    components(schemas(
        ApiResponse,
        VerifyLicenseRequest,
        VerifyLicenseResponse,
        LicenseActiveRequest,
        UpdateModuleRequest,
        ModuleMetadataRequest,
        ModuleDetail,
        UnregisteredModule,
        StoredModuleEntry,
        MarketplaceEntry,
        Module,
        ModuleVersionGroup,
        ModuleVersion,
        Price,
        Application,
        UpdateCheck,
        License
    )),
    modifiers(&AdminKeyAuth)
)]
pub struct ApiDoc;

struct AdminKeyAuth;

impl Modify for AdminKeyAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

/// All API routes with state applied. Admin routes sit behind [`require_admin`].
pub fn create_router(app_state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health::healthcheck_handler))
        .route("/license/verify", post(license::verify_license_handler))
        .route("/download/:kind/:filename", get(download::download_handler))
        .route("/modules/:key", get(modules::module_detail_handler))
        .route("/modules/:key/versions", get(modules::module_versions_handler))
        .route("/modules/type/:kind", get(modules::modules_of_type_handler))
        .route(
            "/module-info/:kind/:filename",
            get(modules::module_info_handler),
        )
        .route("/marketplace", get(modules::marketplace_handler))
        .route("/applications", get(applications::list_applications_handler))
        .route("/applications/:key", get(applications::application_detail_handler))
        .route(
            "/updates/:platform/:name/:current_version",
            get(applications::check_update_handler),
        );

    let admin = Router::new()
        .route(
            "/modules",
            get(modules::list_module_groups_handler).merge(
                post(modules::upload_module_handler)
                    .layer(DefaultBodyLimit::max(MAX_MODULE_UPLOAD_BYTES)),
            ),
        )
        .route(
            "/modules/:key",
            put(modules::update_module_handler).delete(modules::delete_module_handler),
        )
        .route("/module-metadata", post(modules::module_metadata_handler))
        .route("/licenses", get(license::list_licenses_handler))
        .route("/licenses/:key", patch(license::set_license_active_handler))
        .route(
            "/applications",
            post(applications::upload_application_handler)
                .layer(DefaultBodyLimit::max(MAX_APPLICATION_UPLOAD_BYTES)),
        )
        .route(
            "/applications/:key",
            delete(applications::delete_application_handler),
        )
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_admin,
        ));

    Router::new()
        .merge(public)
        .merge(admin)
        .with_state(app_state)
}

/// Router plus Swagger UI, CORS and request tracing, as served by the binary.
pub fn build_app(app_state: AppState, cors_origins: Option<&str>) -> Router {
    create_router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(build_cors(cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn build_cors(origins: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    match origins {
        Some(o) => {
            let origins: Vec<_> = o.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            cors.allow_origin(origins)
        }
        None => cors.allow_origin(Any),
    }
}
