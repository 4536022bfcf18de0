pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod game_loop;
pub mod health;
pub mod session_manager;
pub mod state;
pub mod tournament_registry;
pub mod ws;

use std::time::Duration;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use blastgrid_engine::config::GameRules;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig, rules: GameRules) -> (Router<()>, AppState) {
    let web_root = config.web_root.clone();
    let state = AppState::new(config, rules);

    let admin_routes = Router::new()
        .route("/lobbies", get(api::list_lobbies).post(api::create_lobby))
        .route("/lobbies/{code}/end", post(api::end_lobby))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::admin_auth_middleware,
        ));

    let controller_routes = Router::new()
        .route("/join", post(api::controller_join))
        .route("/input", post(api::controller_input));

    let tournament_routes = Router::new()
        .route("/", post(api::create_tournament))
        .route("/by-code/{code}", get(api::get_tournament))
        .route("/{id_or_code}", get(api::get_tournament))
        .route("/{id_or_code}/join", post(api::join_tournament))
        .route("/{id_or_code}/start", post(api::start_tournament))
        .route("/{id_or_code}/match/start", post(api::start_tournament_match));

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health::health_check))
        .nest("/api/admin", admin_routes)
        .nest("/api/controller", controller_routes)
        .nest("/api/tournament", tournament_routes)
        .fallback_service(ServeDir::new(&web_root))
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    (app, state)
}

/// Background task re-broadcasting live sessions every
/// `sessions.broadcast_interval_ms` and reporting finished tournament
/// matches to their brackets.
pub fn spawn_state_sweeper(state: AppState) -> tokio::task::JoinHandle<()> {
    let period = Duration::from_millis(state.config.sessions.broadcast_interval_ms);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;

            // Never hold both locks at once here.
            let outcomes = state.sessions.write().await.sweep();
            if outcomes.is_empty() {
                continue;
            }

            let mut tournaments = state.tournaments.write().await;
            for outcome in outcomes {
                let Some(t) = tournaments.get_mut(&outcome.tournament_id) else {
                    tracing::warn!(
                        tournament_id = %outcome.tournament_id,
                        "Result for unknown tournament dropped"
                    );
                    continue;
                };
                match t.advance_winner(&outcome.match_id, &outcome.winner) {
                    Ok(()) => tracing::info!(
                        tournament_id = %outcome.tournament_id,
                        match_id = %outcome.match_id,
                        session = %outcome.code,
                        winner = %outcome.winner,
                        "Winner reported"
                    ),
                    Err(e) => tracing::warn!(
                        tournament_id = %outcome.tournament_id,
                        match_id = %outcome.match_id,
                        error = %e,
                        "Failed to report winner"
                    ),
                }
            }
        }
    })
}
