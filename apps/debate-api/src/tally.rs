//! Vote tally.
//!
//! A room's `first_team_votes` / `second_team_votes` always equal the number
//! of stored votes for that team. Each change to a vote row and the matching
//! counter increments commit together under the room row lock.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, AsyncPgConnection};
use scoped_futures::ScopedFutureExt;

use crate::db::schema::votes;
use crate::error::RoomError;
use crate::models::room::VoteCounts;
use crate::models::team::{vote_number, Team, NO_VOTE};
use crate::models::vote::{NewVote, Vote};
use crate::store::rooms;

/// Interpret a requested vote: 1 or 2 picks a team, 0 revokes.
pub fn parse_choice(team_number: i64) -> Result<Option<Team>, RoomError> {
    if team_number == i64::from(NO_VOTE) {
        return Ok(None);
    }
    Team::from_number(team_number).map(Some).ok_or_else(|| {
        RoomError::InvalidArgument(
            "You can choose either 1 or 2 to vote for a team, or 0 to revoke your vote"
                .to_string(),
        )
    })
}

/// Record, change or revoke `member_id`'s vote and return the new counters.
pub async fn vote(
    conn: &mut AsyncPgConnection,
    room_id: &str,
    member_id: &str,
    team_number: i64,
) -> Result<VoteCounts, RoomError> {
    let counts = conn
        .transaction::<_, RoomError, _>(|conn| {
            async move {
                let room = rooms::lock_room(conn, room_id).await?;
                if !room.is_active {
                    return Err(RoomError::inactive("You cannot vote in an inactive room"));
                }

                let choice = parse_choice(team_number)?;

                let prior: Option<Vote> = diesel_async::RunQueryDsl::get_result(
                    votes::table
                        .find((room_id, member_id))
                        .select(Vote::as_select()),
                    conn,
                )
                .await
                .optional()?;

                match prior {
                    None => {
                        let team = choice.ok_or_else(|| {
                            RoomError::InvalidArgument(
                                "You are voting for the first time, choose team 1 or 2"
                                    .to_string(),
                            )
                        })?;

                        diesel_async::RunQueryDsl::execute(
                            diesel::insert_into(votes::table).values(NewVote {
                                room_id,
                                member_id,
                                team_number: team.number(),
                                voted_at: Utc::now(),
                            }),
                            conn,
                        )
                        .await?;
                        rooms::adjust_votes(conn, room_id, team, 1).await?;
                    }
                    Some(prior) => {
                        if prior.team_number == vote_number(choice) {
                            return Err(RoomError::AlreadyVoted);
                        }

                        if let Some(old) = Team::from_stored(prior.team_number) {
                            rooms::adjust_votes(conn, room_id, old, -1).await?;
                        }
                        if let Some(new) = choice {
                            rooms::adjust_votes(conn, room_id, new, 1).await?;
                        }

                        diesel_async::RunQueryDsl::execute(
                            diesel::update(votes::table.find((room_id, member_id))).set((
                                votes::team_number.eq(vote_number(choice)),
                                votes::voted_at.eq(Utc::now()),
                            )),
                            conn,
                        )
                        .await?;
                    }
                }

                let room = rooms::find_room(conn, room_id).await?;
                Ok(VoteCounts::from(&room))
            }
            .scope_boxed()
        })
        .await?;

    tracing::debug!(
        room_id,
        member_id,
        team_number,
        first = counts.first_team_votes,
        second = counts.second_team_votes,
        "vote recorded"
    );
    Ok(counts)
}

/// Count live votes straight from the vote rows.
pub async fn recount(
    conn: &mut AsyncPgConnection,
    room_id: &str,
) -> Result<VoteCounts, RoomError> {
    let rows: Vec<(i16, i64)> = diesel_async::RunQueryDsl::load(
        votes::table
            .filter(votes::room_id.eq(room_id))
            .filter(votes::team_number.ne(NO_VOTE))
            .group_by(votes::team_number)
            .select((votes::team_number, diesel::dsl::count_star())),
        conn,
    )
    .await?;

    let mut counts = VoteCounts {
        first_team_votes: 0,
        second_team_votes: 0,
    };
    for (team_number, count) in rows {
        let count = i32::try_from(count).unwrap_or(i32::MAX);
        match Team::from_stored(team_number) {
            Some(Team::First) => counts.first_team_votes = count,
            Some(Team::Second) => counts.second_team_votes = count,
            None => {}
        }
    }
    Ok(counts)
}
