use super::handlers::{admin, auth, health, tasks, users};
use utoipa::{
    Modify,
    openapi::{
        Contact, InfoBuilder, License, OpenApiBuilder, Tag,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_axum::{router::OpenApiRouter, routes};

pub const BEARER_SCHEME: &str = "bearer_auth";

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // reuse the served router wiring and keep only the document
    let (_router, mut openapi) = public_router().split_for_parts();
    let (_router, protected) = protected_router().split_for_parts();
    openapi.merge(protected);
    finish(&mut openapi);
    openapi
}

/// Endpoints reachable without a token.
pub(crate) fn public_router() -> OpenApiRouter {
    OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(auth::register))
        .routes(routes!(auth::login))
}

/// Endpoints behind the access guard. `routes!` reads each `#[utoipa::path]`.
pub(crate) fn protected_router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(users::me))
        .routes(routes!(users::get_user, users::delete_user))
        .routes(routes!(tasks::create_task))
        .routes(routes!(tasks::get_task, tasks::update_task, tasks::delete_task))
        .routes(routes!(tasks::my_tasks))
        .routes(routes!(tasks::user_tasks))
        .routes(routes!(admin::list_users))
        .routes(routes!(admin::assign_role))
        .routes(routes!(admin::list_tasks))
}

/// Tags and the bearer security scheme.
pub(crate) fn finish(openapi: &mut utoipa::openapi::OpenApi) {
    let tags = [
        ("taskmaster", "Task tracking API"),
        ("auth", "Registration and login"),
        ("users", "User records"),
        ("tasks", "Tasks owned by users"),
        ("admin", "Administrator operations"),
        ("health", "Service health"),
    ];
    openapi.tags = Some(
        tags.into_iter()
            .map(|(name, description)| {
                let mut tag = Tag::new(name);
                tag.description = Some(description.to_string());
                tag
            })
            .collect(),
    );
    BearerSecurity.modify(openapi);
}

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            BEARER_SCHEME,
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Cargo.toml metadata instead of the utoipa-axum defaults
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(':').next().map(str::trim)?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Split `Name <email>` into its parts.
fn parse_author<'a>(author: &'a str) -> (Option<&'a str>, Option<&'a str>) {
    let non_empty = |value: &'a str| -> Option<&'a str> {
        let value = value.trim();
        (!value.is_empty()).then_some(value)
    };
    match author.split_once('<') {
        Some((name, email)) => (non_empty(name), non_empty(email.trim_end_matches('>'))),
        None => (non_empty(author), None),
    }
}
