use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::handlers::ScheduleForm;
use crate::models::{
    CategoryFilter, CategoryInput, CategoryName, ClassCategory, ClassInput, ClassInstance,
    InstanceInput, ScheduleEntry, ScheduleView, TrainingClass, WeeklyScheduleDay,
};
use crate::pokedex::{Pokemon, PokemonCard};

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .build(),
            ),
        );
        components.add_security_scheme(
            "query_token",
            SecurityScheme::ApiKey(ApiKey::Query(ApiKeyValue::new("token"))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz_live,
        crate::handlers::healthz_ready,
        crate::handlers::get_schedule,
        crate::handlers::post_schedule,
        crate::handlers::get_schedule_ical,
        crate::handlers::get_pokedex,
        crate::handlers::admin_weekly_schedule,
        crate::handlers::list_categories,
        crate::handlers::create_category,
        crate::handlers::update_category,
        crate::handlers::delete_category,
        crate::handlers::list_classes,
        crate::handlers::create_class,
        crate::handlers::update_class,
        crate::handlers::delete_class,
        crate::handlers::list_instances,
        crate::handlers::create_instance,
        crate::handlers::update_instance,
        crate::handlers::delete_instance
    ),
    components(schemas(
        CategoryName,
        CategoryFilter,
        ClassCategory,
        TrainingClass,
        ClassInstance,
        ScheduleEntry,
        ScheduleView,
        WeeklyScheduleDay,
        CategoryInput,
        ClassInput,
        InstanceInput,
        ScheduleForm,
        Pokemon,
        PokemonCard
    )),
    tags(
        (name = "schedule", description = "Public class schedule"),
        (name = "admin", description = "Category, class and instance management"),
        (name = "pokedex", description = "Cached Pokédex data"),
        (name = "health", description = "Liveness and readiness probes")
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_admin_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/pfa"));
        assert!(doc.paths.paths.contains_key("/admin/instances/{id}"));
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
