pub mod bans;
pub mod health;
pub mod members;
pub mod messages;
pub mod rooms;
pub mod votes;

use axum::Router;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::gateway::server::router())
        .nest(
            "/api/v1",
            rooms::router()
                .merge(members::router())
                .merge(bans::router())
                .merge(votes::router())
                .merge(messages::router()),
        )
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        // Rooms
        rooms::create_room,
        rooms::list_rooms,
        rooms::get_room,
        rooms::delete_room,
        rooms::deactivate_room,
        // Members
        members::list_participants,
        members::join_team,
        members::leave_team,
        members::delete_account,
        // Bans
        bans::list_bans,
        bans::ban_member,
        bans::unban_member,
        // Votes
        votes::vote,
        // Comments
        messages::list_comments,
        messages::create_comment,
        messages::get_comment,
        messages::edit_comment,
        messages::delete_comment,
    ),
    components(
        schemas(
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            crate::models::room::Room,
            crate::models::room::RoomResponse,
            crate::models::room::VoteCounts,
            crate::models::membership::Membership,
            crate::models::ban::RoomBan,
            crate::models::message::Message,
            crate::models::member::Member,
            health::HealthResponse,
            rooms::CreateRoomRequest,
            members::JoinTeamRequest,
            votes::VoteRequest,
            messages::CommentRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Rooms", description = "Debate rooms"),
        (name = "Members", description = "Team rosters and accounts"),
        (name = "Bans", description = "Room bans"),
        (name = "Votes", description = "Team votes"),
        (name = "Comments", description = "Room messages"),
    )
)]
pub struct ApiDoc;
