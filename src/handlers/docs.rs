use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;
use crate::handlers::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::liveness,
        crate::handlers::health::readiness,
        crate::handlers::auth::create_anonymous_session,
        crate::handlers::story::generate_story,
        crate::handlers::story::create_story_book,
        crate::handlers::cover::generate_cover,
        crate::handlers::usage::get_usage,
        crate::handlers::usage::record_share,
        crate::handlers::admin::reset_generations,
    ),
    components(
        schemas(
            crate::models::GenerateStoryRequest,
            crate::models::StoryResult,
            crate::models::GenerateCoverRequest,
            crate::models::GenerateCoverResponse,
            crate::models::StoryBookRequest,
            crate::models::StoryBook,
            crate::models::UserQuota,
            crate::models::QuotaReason,
            crate::models::QuotaDecision,
            crate::models::UsageResponse,
            crate::models::SessionResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "stories", description = "Story generation endpoints"),
        (name = "covers", description = "Cover illustration endpoints"),
        (name = "auth", description = "Anonymous sessions"),
        (name = "usage", description = "Monthly allowance and sharing"),
        (name = "admin", description = "Operator endpoints"),
        (name = "health", description = "Health check endpoints")
    ),
    info(
        title = "BraveBunny Story API",
        version = "1.0.0",
        description = "Personalised bedtime stories and cover illustrations with a monthly allowance"
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn create_docs_router() -> Router<AppState> {
    Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
