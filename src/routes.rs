use crate::{
    api::{attendance, employee, location, qrcode},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(
                        web::resource("")
                            .route(web::post().to(attendance::record_attendance))
                            .route(web::get().to(attendance::list_attendance)),
                    )
                    // /attendance/me
                    .service(web::resource("/me").route(web::get().to(attendance::my_attendance)))
                    // /attendance/stats/summary
                    .service(
                        web::resource("/stats/summary")
                            .route(web::get().to(attendance::attendance_summary)),
                    )
                    // /attendance/export
                    .service(
                        web::resource("/export")
                            .route(web::get().to(attendance::export_attendance)),
                    ),
            )
            .service(
                web::scope("/qrcodes")
                    // /qrcodes
                    .service(
                        web::resource("")
                            .route(web::post().to(qrcode::create_qr_code))
                            .route(web::get().to(qrcode::list_qr_codes)),
                    )
                    // /qrcodes/validate
                    .service(
                        web::resource("/validate")
                            .route(web::post().to(qrcode::validate_qr_code)),
                    )
                    // /qrcodes/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(qrcode::get_qr_code))
                            .route(web::put().to(qrcode::update_qr_code))
                            .route(web::delete().to(qrcode::delete_qr_code)),
                    ),
            )
            .service(
                web::scope("/locations")
                    // /locations
                    .service(
                        web::resource("")
                            .route(web::post().to(location::create_location))
                            .route(web::get().to(location::list_locations)),
                    )
                    // /locations/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(location::get_location))
                            .route(web::put().to(location::update_location))
                            .route(web::delete().to(location::delete_location)),
                    ),
            )
            .service(
                web::scope("/employees")
                    // /employees
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    // /employees/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(employee::get_employee))
                            .route(web::put().to(employee::update_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    ),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)
//
// SCAN
//  └─ POST /api/v1/attendance with qrCodeId or shortCode
//       ├─ no open session today  -> check-in  (201)
//       └─ open session today     -> check-out (200)
