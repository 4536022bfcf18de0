use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use blastgrid_core::net::messages::InputAction;
use blastgrid_core::player::PlayerId;
use blastgrid_core::snapshot::Direction;
use blastgrid_core::tournament::{
    Match, MatchStatus, Standing, Tournament, TournamentError, TournamentMode,
};

use crate::error::AppError;
use crate::session_manager::{MatchLink, SessionSummary};
use crate::state::AppState;

// ============================================================================
// Admin
// ============================================================================

#[derive(Debug, Serialize)]
pub struct LobbyList {
    pub lobbies: Vec<SessionSummary>,
}

/// GET /api/admin/lobbies
pub async fn list_lobbies(State(state): State<AppState>) -> Json<LobbyList> {
    let lobbies = state.sessions.read().await.list();
    Json(LobbyList { lobbies })
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateLobbyBody {
    pub code: Option<String>,
    pub board_size: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct CreateLobbyResponse {
    pub code: String,
    pub board_size: usize,
}

/// POST /api/admin/lobbies
pub async fn create_lobby(
    State(state): State<AppState>,
    Json(body): Json<CreateLobbyBody>,
) -> Result<(StatusCode, Json<CreateLobbyResponse>), AppError> {
    let board_size = body
        .board_size
        .unwrap_or(state.config.sessions.default_board_size);
    let mut sessions = state.sessions.write().await;
    let (code, board_size) = sessions.create_session(body.code.as_deref(), board_size, None)?;
    Ok((
        StatusCode::CREATED,
        Json(CreateLobbyResponse { code, board_size }),
    ))
}

#[derive(Debug, Serialize)]
pub struct EndLobbyResponse {
    pub success: bool,
    pub code: String,
}

/// POST /api/admin/lobbies/{code}/end
pub async fn end_lobby(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<EndLobbyResponse>, AppError> {
    state.sessions.write().await.end_session(&code)?;
    Ok(Json(EndLobbyResponse {
        success: true,
        code,
    }))
}

// ============================================================================
// Controller bridge
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ControllerJoinBody {
    pub code: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ControllerJoinResponse {
    pub ok: bool,
    pub player_id: PlayerId,
    pub name: String,
}

/// POST /api/controller/join
pub async fn controller_join(
    State(state): State<AppState>,
    Json(body): Json<ControllerJoinBody>,
) -> Result<Json<ControllerJoinResponse>, AppError> {
    let code = required(body.code, "code")?;
    let (player_id, name) = state
        .sessions
        .write()
        .await
        .attach_controller(code.trim(), body.name.as_deref())?;
    Ok(Json(ControllerJoinResponse {
        ok: true,
        player_id,
        name,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ControllerInputBody {
    pub code: Option<String>,
    pub player_id: Option<PlayerId>,
    pub action: Option<String>,
    pub direction: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// POST /api/controller/input
pub async fn controller_input(
    State(state): State<AppState>,
    Json(body): Json<ControllerInputBody>,
) -> Result<Json<OkResponse>, AppError> {
    let code = required(body.code, "code")?;
    let player_id = required(body.player_id, "player_id")?;
    let action = parse_action(
        &required(body.action, "action")?,
        body.direction.as_deref(),
    )?;
    state
        .sessions
        .read()
        .await
        .controller_input(code.trim(), player_id, action)?;
    Ok(Json(OkResponse { ok: true }))
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::BadRequest(format!("missing field '{field}'")))
}

fn parse_direction(raw: &str) -> Option<Direction> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "UP" => Some(Direction::Up),
        "DOWN" => Some(Direction::Down),
        "LEFT" => Some(Direction::Left),
        "RIGHT" => Some(Direction::Right),
        _ => None,
    }
}

fn parse_action(action: &str, direction: Option<&str>) -> Result<InputAction, AppError> {
    match action.trim().to_ascii_lowercase().as_str() {
        "bomb" => Ok(InputAction::Bomb),
        "move" => {
            let direction = direction.and_then(parse_direction).ok_or_else(|| {
                AppError::BadRequest("move needs direction UP, DOWN, LEFT or RIGHT".to_string())
            })?;
            Ok(InputAction::Move { direction })
        },
        other => Err(AppError::BadRequest(format!("unknown action '{other}'"))),
    }
}

// ============================================================================
// Tournaments
// ============================================================================

#[derive(Debug, Serialize)]
pub struct TournamentView<'a> {
    pub tournament: &'a Tournament,
    pub standings: Vec<Standing>,
    pub next_matches: Vec<&'a Match>,
}

/// Serialize the tournament view while the registry lock is still held.
fn view(t: &Tournament) -> Result<Json<serde_json::Value>, AppError> {
    let view = TournamentView {
        tournament: t,
        standings: t.standings(),
        next_matches: t.next_matches(),
    };
    serde_json::to_value(view)
        .map(Json)
        .map_err(|e| AppError::Internal(format!("failed to serialize tournament: {e}")))
}

fn tournament_not_found(id_or_code: &str) -> AppError {
    AppError::NotFound(format!("tournament '{id_or_code}' not found"))
}

#[derive(Debug, Deserialize)]
pub struct CreateTournamentBody {
    pub mode: Option<String>,
    pub max_participants: Option<usize>,
}

/// POST /api/tournament
pub async fn create_tournament(
    State(state): State<AppState>,
    Json(body): Json<CreateTournamentBody>,
) -> (StatusCode, Json<Tournament>) {
    let mode = TournamentMode::parse(body.mode.as_deref());
    let max = body
        .max_participants
        .unwrap_or(state.config.tournaments.default_max_participants);
    let mut tournaments = state.tournaments.write().await;
    let tournament = tournaments.create(mode, max).clone();
    (StatusCode::CREATED, Json(tournament))
}

/// GET /api/tournament/{id_or_code} and /api/tournament/by-code/{code}
pub async fn get_tournament(
    State(state): State<AppState>,
    Path(id_or_code): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tournaments = state.tournaments.read().await;
    let t = tournaments
        .get(&id_or_code)
        .ok_or_else(|| tournament_not_found(&id_or_code))?;
    view(t)
}

#[derive(Debug, Deserialize)]
pub struct JoinTournamentBody {
    pub name: Option<String>,
}

/// POST /api/tournament/{id_or_code}/join
pub async fn join_tournament(
    State(state): State<AppState>,
    Path(id_or_code): Path<String>,
    Json(body): Json<JoinTournamentBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut tournaments = state.tournaments.write().await;
    let t = tournaments
        .get_mut(&id_or_code)
        .ok_or_else(|| tournament_not_found(&id_or_code))?;
    let name = t.add_participant(body.name.as_deref().unwrap_or_default())?;
    tracing::info!(tournament_id = %t.id, name = %name, "Participant registered");
    view(t)
}

/// POST /api/tournament/{id_or_code}/start
pub async fn start_tournament(
    State(state): State<AppState>,
    Path(id_or_code): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut tournaments = state.tournaments.write().await;
    let t = tournaments
        .get_mut(&id_or_code)
        .ok_or_else(|| tournament_not_found(&id_or_code))?;
    t.start()?;
    view(t)
}

#[derive(Debug, Deserialize)]
pub struct StartMatchBody {
    pub match_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartMatchResponse {
    pub code: String,
    pub match_id: String,
}

/// POST /api/tournament/{id_or_code}/match/start
///
/// Allocates a session bound to the match and marks it live. Asking again
/// for a live match whose session still exists returns that session.
pub async fn start_tournament_match(
    State(state): State<AppState>,
    Path(id_or_code): Path<String>,
    Json(body): Json<StartMatchBody>,
) -> Result<Json<StartMatchResponse>, AppError> {
    let match_id = required(body.match_id, "match_id")?;

    // Lock order: tournaments, then sessions.
    let mut tournaments = state.tournaments.write().await;
    let t = tournaments
        .get_mut(&id_or_code)
        .ok_or_else(|| tournament_not_found(&id_or_code))?;
    let m = t
        .find_match(&match_id)
        .ok_or_else(|| AppError::NotFound(format!("match '{match_id}' not found")))?
        .clone();

    let mut sessions = state.sessions.write().await;
    if m.status == MatchStatus::Live
        && let Some(code) = m.session_code
        && sessions.contains(&code)
    {
        return Ok(Json(StartMatchResponse { code, match_id }));
    }

    let (Some(player1), Some(player2)) = (m.player1, m.player2) else {
        return Err(TournamentError::IllegalTransition(format!(
            "match '{match_id}' is not ready to be played"
        ))
        .into());
    };
    let link = MatchLink {
        tournament_id: t.id.clone(),
        match_id: match_id.clone(),
        participants: [player1, player2],
    };
    let board_size = state.config.sessions.default_board_size;
    let (code, _) = sessions.create_session(None, board_size, Some(link))?;

    if let Err(e) = t.start_match(&match_id, &code) {
        if let Err(end_err) = sessions.end_session(&code) {
            tracing::warn!(session = %code, error = %end_err, "Failed to discard session");
        }
        return Err(e.into());
    }
    tracing::info!(
        tournament_id = %t.id,
        match_id = %match_id,
        session = %code,
        "Tournament match started"
    );
    Ok(Json(StartMatchResponse { code, match_id }))
}
