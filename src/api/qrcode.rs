use crate::{
    api::AppRecorder,
    attendance::RecordingError,
    attendance::ledger::{LocationRegistry, QrCodeStore},
    auth::auth::AuthEmployee,
    geo,
    model::location::Coordinates,
    model::qrcode::{QrCode, QrKind, TokenRejection, generate_qr_code_id, generate_short_code},
    utils::db_utils::{build_update_sql, execute_update},
};
use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use chrono::{Local, NaiveDateTime};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, error, info};
use utoipa::ToSchema;

/// Columns an admin may patch on an existing code. The identifiers and
/// the creator are immutable.
const UPDATABLE_COLUMNS: &[&str] = &[
    "name",
    "description",
    "location_id",
    "valid_from",
    "valid_until",
    "kind",
    "specific_employee_id",
    "is_active",
];

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateQrCode {
    #[schema(example = "Main entrance")]
    pub name: String,
    pub location_id: u64,
    #[schema(nullable = true)]
    pub description: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub valid_from: NaiveDateTime,
    #[schema(value_type = String, format = "date-time")]
    pub valid_until: NaiveDateTime,
    /// Defaults to a session code anyone may scan.
    pub kind: Option<QrKind>,
    pub specific_employee_id: Option<u64>,
}

/// Create QR code
#[utoipa::path(
    post,
    path = "/api/v1/qrcodes",
    request_body = CreateQrCode,
    responses(
        (status = 201, description = "QR code created", body = QrCode),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Location not found")
    ),
    tag = "QrCode",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_qr_code(
    auth: AuthEmployee,
    pool: web::Data<MySqlPool>,
    body: web::Json<CreateQrCode>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let body = body.into_inner();

    if body.valid_until < body.valid_from {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "validUntil must not be before validFrom"
        })));
    }

    let kind = body.kind.unwrap_or(QrKind::Session);
    let specific_employee_id = match kind {
        QrKind::EmployeeSpecific => match body.specific_employee_id {
            Some(id) => Some(id),
            None => {
                return Ok(HttpResponse::BadRequest().json(json!({
                    "message": "specificEmployeeId is required for an employee-specific code"
                })));
            }
        },
        QrKind::Session => None,
    };

    let location_exists =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM locations WHERE id = ?")
            .bind(body.location_id)
            .fetch_one(pool.get_ref())
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to check location");
                ErrorInternalServerError("Database error")
            })?;

    if location_exists == 0 {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Location not found"
        })));
    }

    // Regenerate on the rare short-code collision.
    for _ in 0..5 {
        let qr_code_id = generate_qr_code_id();
        let short_code = generate_short_code();
        let image_url = format!("/scan/{}", qr_code_id);

        let result = sqlx::query(
            r#"
            INSERT INTO qr_codes
            (qr_code_id, short_code, name, location_id, description, created_by,
             valid_from, valid_until, kind, specific_employee_id, is_active, image_url)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, TRUE, ?)
            "#,
        )
        .bind(&qr_code_id)
        .bind(&short_code)
        .bind(&body.name)
        .bind(body.location_id)
        .bind(&body.description)
        .bind(auth.employee_id)
        .bind(body.valid_from)
        .bind(body.valid_until)
        .bind(kind)
        .bind(specific_employee_id)
        .bind(&image_url)
        .execute(pool.get_ref())
        .await;

        match result {
            Ok(done) => {
                info!(id = done.last_insert_id(), %short_code, "QR code created");
                let created =
                    sqlx::query_as::<_, QrCode>("SELECT * FROM qr_codes WHERE id = ?")
                        .bind(done.last_insert_id())
                        .fetch_one(pool.get_ref())
                        .await
                        .map_err(|e| {
                            error!(error = %e, "Failed to read back QR code");
                            ErrorInternalServerError("Database error")
                        })?;
                return Ok(HttpResponse::Created().json(created));
            }
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23000") => {
                debug!(%short_code, "Short code collision, regenerating");
                continue;
            }
            Err(e) => {
                error!(error = %e, "Failed to create QR code");
                return Ok(HttpResponse::InternalServerError().json(json!({
                    "message": "Failed to create QR code"
                })));
            }
        }
    }

    error!("Exhausted short code generation attempts");
    Ok(HttpResponse::InternalServerError().json(json!({
        "message": "Failed to create QR code"
    })))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct QrCodeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub location_id: Option<u64>,
    pub is_active: Option<bool>,
    pub kind: Option<QrKind>,
    pub search: Option<String>,
}

/// List QR codes
#[utoipa::path(
    get,
    path = "/api/v1/qrcodes",
    params(
        ("page", Query, description = "Page number"),
        ("per_page", Query, description = "Items per page"),
        ("location_id", Query, description = "Filter by location"),
        ("is_active", Query, description = "Filter by active flag"),
        ("kind", Query, description = "Filter by kind (session/employee-specific)"),
        ("search", Query, description = "Search by name")
    ),
    responses(
        (status = 200, description = "Paginated QR code list", body = Object),
        (status = 403, description = "Admin only")
    ),
    tag = "QrCode",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_qr_codes(
    auth: AuthEmployee,
    pool: web::Data<MySqlPool>,
    query: web::Query<QrCodeQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    // ---------- build WHERE clause dynamically ----------
    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(location_id) = query.location_id {
        conditions.push("location_id = ?");
        bindings.push(location_id.to_string());
    }

    if let Some(is_active) = query.is_active {
        conditions.push(if is_active {
            "is_active = TRUE"
        } else {
            "is_active = FALSE"
        });
    }

    if let Some(kind) = query.kind {
        conditions.push("kind = ?");
        bindings.push(kind.to_string());
    }

    if let Some(search) = &query.search {
        conditions.push("name LIKE ?");
        bindings.push(format!("%{}%", search));
    }

    let where_clause = if conditions.is_empty() {
        "".to_string()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM qr_codes {}", where_clause);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = count_query.bind(b);
    }
    let total = count_query.fetch_one(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, sql = %count_sql, "Failed to count QR codes");
        ErrorInternalServerError("Database error")
    })?;

    let data_sql = format!(
        "SELECT * FROM qr_codes {} ORDER BY id DESC LIMIT ? OFFSET ?",
        where_clause
    );
    debug!(sql = %data_sql, page, per_page, "Fetching QR codes");

    let mut data_query = sqlx::query_as::<_, QrCode>(&data_sql);
    for b in &bindings {
        data_query = data_query.bind(b);
    }
    data_query = data_query.bind(per_page as i64).bind(offset as i64);

    let codes = data_query.fetch_all(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, sql = %data_sql, "Failed to fetch QR codes");
        ErrorInternalServerError("Database error")
    })?;

    Ok(HttpResponse::Ok().json(json!({
        "data": codes,
        "page": page,
        "perPage": per_page,
        "total": total,
    })))
}

/// Get QR code by ID
#[utoipa::path(
    get,
    path = "/api/v1/qrcodes/{qr_id}",
    params(
        ("qr_id", Path, description = "QR code ID")
    ),
    responses(
        (status = 200, description = "QR code found", body = QrCode),
        (status = 403, description = "Admin only"),
        (status = 404, description = "QR code not found")
    ),
    tag = "QrCode",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_qr_code(
    auth: AuthEmployee,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let qr_id = path.into_inner();

    let code = sqlx::query_as::<_, QrCode>("SELECT * FROM qr_codes WHERE id = ?")
        .bind(qr_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, qr_id, "Failed to fetch QR code");
            ErrorInternalServerError("Database error")
        })?;

    match code {
        Some(code) => Ok(HttpResponse::Ok().json(code)),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "QR code not found"
        }))),
    }
}

/// Update QR code
#[utoipa::path(
    put,
    path = "/api/v1/qrcodes/{qr_id}",
    params(
        ("qr_id", Path, description = "QR code ID")
    ),
    request_body = Object,
    responses(
        (status = 200, description = "QR code updated"),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "QR code not found")
    ),
    tag = "QrCode",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_qr_code(
    auth: AuthEmployee,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let qr_id = path.into_inner();

    let update = build_update_sql("qr_codes", &body, UPDATABLE_COLUMNS, "id", qr_id)?;

    let affected = execute_update(pool.get_ref(), update)
        .await
        .map_err(ErrorInternalServerError)?;

    if affected == 0 {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "QR code not found"
        })));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "QR code updated successfully"
    })))
}

/// Deactivate QR code
///
/// Historical attendance rows reference the code, so delete is a
/// soft-delete: the code is deactivated, never removed.
#[utoipa::path(
    delete,
    path = "/api/v1/qrcodes/{qr_id}",
    params(
        ("qr_id", Path, description = "QR code ID")
    ),
    responses(
        (status = 200, description = "QR code deactivated"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "QR code not found")
    ),
    tag = "QrCode",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_qr_code(
    auth: AuthEmployee,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let qr_id = path.into_inner();

    let result = sqlx::query("UPDATE qr_codes SET is_active = FALSE WHERE id = ?")
        .bind(qr_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, qr_id, "Failed to deactivate QR code");
            ErrorInternalServerError("Database error")
        })?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "QR code not found"
        })));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "QR code deactivated"
    })))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateQrReq {
    pub qr_code_id: Option<String>,
    pub short_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Validate a QR code without recording anything
#[utoipa::path(
    post,
    path = "/api/v1/qrcodes/validate",
    request_body = ValidateQrReq,
    responses(
        (status = 200, description = "Validation outcome", body = Object, example = json!({
            "valid": true,
            "locationValid": true,
            "locationMessage": "You are within 25 meters of the expected location.",
            "qrCode": { "name": "Main entrance", "shortCode": "AB12CD" }
        })),
        (status = 400, description = "No identifier supplied"),
        (status = 404, description = "Unknown QR code")
    ),
    tag = "QrCode",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn validate_qr_code(
    auth: AuthEmployee,
    recorder: web::Data<AppRecorder>,
    body: web::Json<ValidateQrReq>,
) -> Result<HttpResponse, RecordingError> {
    let body = body.into_inner();
    let store = recorder.store();

    let found = if let Some(qr_code_id) = &body.qr_code_id {
        store.find_by_qr_code_id(qr_code_id).await?
    } else if let Some(short_code) = &body.short_code {
        store.find_by_short_code(short_code).await?
    } else {
        return Err(RecordingError::MissingIdentifier);
    };

    let qr = match found {
        Some(qr) => qr,
        None => {
            return Ok(HttpResponse::NotFound().json(json!({
                "valid": false,
                "message": "Invalid QR code or short code"
            })));
        }
    };

    let now = Local::now().naive_local();
    let rejection = qr.usable_by(auth.employee_id, now).err();
    let message = rejection.map(|r| match r {
        TokenRejection::Inactive => "QR code is inactive",
        TokenRejection::Expired => "QR code is outside its validity window",
        TokenRejection::WrongEmployeeScope => "This QR code is assigned to another employee",
    });

    let claimed = match (body.latitude, body.longitude) {
        (Some(latitude), Some(longitude)) => Some(Coordinates { latitude, longitude }),
        _ => None,
    };
    let registered = store
        .location_info(qr.location_id)
        .await?
        .and_then(|l| l.coordinates);
    let proximity = geo::check_proximity(claimed, registered, recorder.policy().geofence_radius_m);

    let mut resp = json!({
        "valid": rejection.is_none(),
        "qrCode": {
            "name": qr.name,
            "shortCode": qr.short_code,
            "kind": qr.kind,
        },
    });
    if let Some(message) = message {
        resp["message"] = json!(message);
    }
    if let Some(report) = proximity {
        resp["locationValid"] = json!(report.location_valid);
        resp["locationMessage"] = json!(report.location_message);
    }

    Ok(HttpResponse::Ok().json(resp))
}
