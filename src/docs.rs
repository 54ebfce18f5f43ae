use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::navigation::check,
		routes::profiles::me,
		routes::admin_requests::submit,
		routes::admin_requests::mine,
		routes::admin_requests::list,
		routes::admin_requests::decide,
		routes::admin::list_users,
		routes::admin::update_role,
		routes::groups::create_group,
		routes::groups::add_member,
		routes::groups::list_members,
		routes::groups::list_messages,
		routes::groups::post_message
	),
	components(
		schemas(
			models::Role,
			models::Profile,
			models::profile::MeResponse,
			models::profile::RoleUpdateRequest,
			models::RequestStatus,
			models::Decision,
			models::AdminRequest,
			models::admin_request::AdminRequestCreate,
			models::admin_request::DecisionRequest,
			models::group::Group,
			models::group::GroupMember,
			models::group::Message,
			models::group::GroupCreateRequest,
			models::group::MemberAddRequest,
			models::group::MessageCreateRequest,
			routes::health::HealthResponse,
			routes::navigation::NavigationResponse
		)
	),
	tags(
		(name = "Health", description = "Liveness and store reachability"),
		(name = "Navigation", description = "Route guard decisions for UI paths"),
		(name = "Profile", description = "Caller profile"),
		(name = "Admin Requests", description = "Requests for admin promotion"),
		(name = "Admin", description = "User and role management"),
		(name = "Groups", description = "Group rosters and chat")
	)
)]
pub struct ApiDoc;

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(&ApiDoc::openapi())?;

	normalize_path_operations(&mut doc);
	ensure_security_components(&mut doc);
	ensure_openapi_version(&mut doc);
	add_examples(&mut doc);
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(&doc)?);

	let json_route = {
		let doc_json = Arc::clone(&doc_json);
		get(move || {
			let doc_json = Arc::clone(&doc_json);
			async move { Json((*doc_json).clone()) }
		})
	};

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn normalize_path_operations(doc: &mut Value) {
	if let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) {
		for item in paths.values_mut() {
			if let Some(ops) = item.as_object() {
				let mut normalized = Map::new();
				for (method, val) in ops {
					let key = method.to_lowercase();
					if let Some(existing) = normalized.get_mut(&key) {
						merge_values(existing, val);
					} else {
						normalized.insert(key, val.clone());
					}
				}
				*item = Value::Object(normalized);
			}
		}
	}
}

fn root_entry<'a>(doc: &'a mut Value, key: &str) -> Option<&'a mut Value> {
	doc.as_object_mut()
		.map(|root| root.entry(key.to_string()).or_insert_with(|| Value::Object(Map::new())))
}

fn ensure_security_components(doc: &mut Value) {
	let schemes = root_entry(doc, "components")
		.and_then(Value::as_object_mut)
		.map(|components| {
			components
				.entry("securitySchemes")
				.or_insert_with(|| Value::Object(Map::new()))
		})
		.and_then(Value::as_object_mut);

	if let Some(schemes) = schemes {
		schemes.insert(
			"bearerAuth".to_string(),
			json!({
				"type": "http",
				"scheme": "bearer",
				"bearerFormat": "JWT"
			}),
		);
	}
}

fn ensure_openapi_version(doc: &mut Value) {
	if let Some(root) = doc.as_object_mut() {
		root.entry("openapi")
			.or_insert_with(|| Value::String("3.1.0".to_string()));
	}
}

fn add_examples(doc: &mut Value) {
	if let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) {
		for item in paths.values_mut() {
			if let Some(operations) = item.as_object_mut() {
				for operation in operations.values_mut() {
					apply_request_examples(operation);
				}
			}
		}
	}
}

fn apply_request_examples(operation: &mut Value) {
	let Some(media) = operation.pointer_mut("/requestBody/content/application~1json") else {
		return;
	};
	let Some(reference) = media.pointer("/schema/$ref").and_then(Value::as_str) else {
		return;
	};

	let example = match reference {
		"#/components/schemas/AdminRequestCreate" => Some(json!({
			"reason": "I run the Thursday workshop sessions and need to manage groups."
		})),
		"#/components/schemas/DecisionRequest" => Some(json!({ "action": "approve" })),
		"#/components/schemas/RoleUpdateRequest" => Some(json!({ "role": "admin" })),
		"#/components/schemas/GroupCreateRequest" => Some(json!({ "name": "Cohort A" })),
		"#/components/schemas/MemberAddRequest" => Some(json!({
			"user_id": "5f0c7a52-8d51-4a43-9a3d-2d6a0f3c1b7e"
		})),
		"#/components/schemas/MessageCreateRequest" => Some(json!({ "body": "See everyone on Thursday." })),
		_ => None,
	};

	if let (Some(example), Some(media)) = (example, media.as_object_mut()) {
		media.entry("example").or_insert(example);
	}
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let server_url = format!("http://localhost:{}", port);

	match doc.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			if let Some(root) = doc.as_object_mut() {
				root.insert("servers".to_string(), json!([{ "url": server_url }]));
			}
		}
	}
}

fn merge_values(target: &mut Value, addition: &Value) {
	match (target, addition) {
		(Value::Object(dest), Value::Object(src)) => {
			for (key, value) in src {
				if let Some(existing) = dest.get_mut(key) {
					merge_values(existing, value);
				} else {
					dest.insert(key.clone(), value.clone());
				}
			}
		}
		(Value::Array(dest), Value::Array(src)) => {
			for item in src {
				if !dest.contains(item) {
					dest.push(item.clone());
				}
			}
		}
		_ => {}
	}
}
