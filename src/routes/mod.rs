use crate::models::AppState;
use axum::Router;

pub mod auth_routes;
pub mod catatan_routes;
pub mod health_routes;
pub mod jadwal_routes;
pub mod kontrol_routes;
pub mod message_routes;
pub mod riwayat_routes;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/auth", auth_routes::router())
        .merge(kontrol_routes::router())
        .merge(jadwal_routes::router())
        .merge(riwayat_routes::router())
        .merge(catatan_routes::router())
        .merge(message_routes::router());

    Router::new()
        .nest("/v1/api", api)
        .merge(health_routes::router())
        .with_state(state)
}
