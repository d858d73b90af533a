use crate::{
    auth::auth::AuthEmployee,
    model::location::Location,
    utils::db_utils::{build_update_sql, execute_update},
};
use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::error;
use utoipa::ToSchema;

const UPDATABLE_COLUMNS: &[&str] = &[
    "name",
    "address",
    "description",
    "latitude",
    "longitude",
    "is_active",
];

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLocation {
    #[schema(example = "Head office")]
    pub name: String,
    #[schema(example = "12 Gulshan Avenue, Dhaka", nullable = true)]
    pub address: Option<String>,
    #[schema(nullable = true)]
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Create location
#[utoipa::path(
    post,
    path = "/api/v1/locations",
    request_body = CreateLocation,
    responses(
        (status = 201, description = "Location created", body = Location),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Admin only")
    ),
    tag = "Location",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_location(
    auth: AuthEmployee,
    pool: web::Data<MySqlPool>,
    body: web::Json<CreateLocation>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let body = body.into_inner();

    if body.name.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Location name must not be empty"
        })));
    }

    // Coordinates come as a pair or not at all.
    if body.latitude.is_some() != body.longitude.is_some() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "latitude and longitude must be supplied together"
        })));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO locations
        (name, address, description, latitude, longitude, is_active, created_by)
        VALUES (?, ?, ?, ?, ?, TRUE, ?)
        "#,
    )
    .bind(body.name.trim())
    .bind(&body.address)
    .bind(&body.description)
    .bind(body.latitude)
    .bind(body.longitude)
    .bind(auth.employee_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to create location");
        ErrorInternalServerError("Database error")
    })?;

    let created = sqlx::query_as::<_, Location>("SELECT * FROM locations WHERE id = ?")
        .bind(result.last_insert_id())
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to read back location");
            ErrorInternalServerError("Database error")
        })?;

    Ok(HttpResponse::Created().json(created))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LocationQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

/// List locations
#[utoipa::path(
    get,
    path = "/api/v1/locations",
    params(
        ("page", Query, description = "Page number"),
        ("per_page", Query, description = "Items per page"),
        ("is_active", Query, description = "Filter by active flag"),
        ("search", Query, description = "Search by name or address")
    ),
    responses(
        (status = 200, description = "Paginated location list", body = Object)
    ),
    tag = "Location",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_locations(
    _auth: AuthEmployee,
    pool: web::Data<MySqlPool>,
    query: web::Query<LocationQuery>,
) -> actix_web::Result<impl Responder> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(is_active) = query.is_active {
        conditions.push(if is_active {
            "is_active = TRUE"
        } else {
            "is_active = FALSE"
        });
    }

    if let Some(search) = &query.search {
        conditions.push("(name LIKE ? OR address LIKE ?)");
        let like = format!("%{}%", search);
        bindings.push(like.clone());
        bindings.push(like);
    }

    let where_clause = if conditions.is_empty() {
        "".to_string()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM locations {}", where_clause);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = count_query.bind(b);
    }
    let total = count_query.fetch_one(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, "Failed to count locations");
        ErrorInternalServerError("Database error")
    })?;

    let data_sql = format!(
        "SELECT * FROM locations {} ORDER BY name ASC LIMIT ? OFFSET ?",
        where_clause
    );
    let mut data_query = sqlx::query_as::<_, Location>(&data_sql);
    for b in &bindings {
        data_query = data_query.bind(b);
    }
    data_query = data_query.bind(per_page as i64).bind(offset as i64);

    let locations = data_query.fetch_all(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, "Failed to fetch locations");
        ErrorInternalServerError("Database error")
    })?;

    Ok(HttpResponse::Ok().json(json!({
        "data": locations,
        "page": page,
        "perPage": per_page,
        "total": total,
    })))
}

/// Get location by ID
#[utoipa::path(
    get,
    path = "/api/v1/locations/{location_id}",
    params(
        ("location_id", Path, description = "Location ID")
    ),
    responses(
        (status = 200, description = "Location found", body = Location),
        (status = 404, description = "Location not found")
    ),
    tag = "Location",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_location(
    _auth: AuthEmployee,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let location_id = path.into_inner();

    let location = sqlx::query_as::<_, Location>("SELECT * FROM locations WHERE id = ?")
        .bind(location_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, location_id, "Failed to fetch location");
            ErrorInternalServerError("Database error")
        })?;

    match location {
        Some(location) => Ok(HttpResponse::Ok().json(location)),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Location not found"
        }))),
    }
}

/// Update location
#[utoipa::path(
    put,
    path = "/api/v1/locations/{location_id}",
    params(
        ("location_id", Path, description = "Location ID")
    ),
    request_body = Object,
    responses(
        (status = 200, description = "Location updated"),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Location not found")
    ),
    tag = "Location",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_location(
    auth: AuthEmployee,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let location_id = path.into_inner();

    let update = build_update_sql("locations", &body, UPDATABLE_COLUMNS, "id", location_id)?;

    let affected = execute_update(pool.get_ref(), update)
        .await
        .map_err(ErrorInternalServerError)?;

    if affected == 0 {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Location not found"
        })));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Location updated successfully"
    })))
}

/// Deactivate location
///
/// QR codes keep referencing the location row, so delete only clears
/// the active flag.
#[utoipa::path(
    delete,
    path = "/api/v1/locations/{location_id}",
    params(
        ("location_id", Path, description = "Location ID")
    ),
    responses(
        (status = 200, description = "Location deactivated"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Location not found")
    ),
    tag = "Location",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_location(
    auth: AuthEmployee,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let location_id = path.into_inner();

    let result = sqlx::query("UPDATE locations SET is_active = FALSE WHERE id = ?")
        .bind(location_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, location_id, "Failed to deactivate location");
            ErrorInternalServerError("Database error")
        })?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Location not found"
        })));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Location deactivated"
    })))
}
