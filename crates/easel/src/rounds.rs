//! Round lifecycle: game start, round start, the per-round timer, round
//! end, game end.
//!
//! One timer task runs per active round, ticking every second. Each task
//! carries the round's serial number; the room bumps the serial on every
//! round start and game end, so a timer whose serial no longer matches
//! simply exits — a stale timer can never terminate a later round.
//!
//! Round end is driven from three places with identical semantics: the
//! timer expiring, the last non-drawer guessing correctly, and the
//! drawer leaving mid-round.

use easel_game::{scoring, SharedPlayer, SharedRoom};
use easel_hub::{Exclusion, HubHandle};
use easel_protocol::{
    GameEndData, GamePhase, GameState, GameStats, GuesserResult, MessageKind,
    NewRoundData, PlayerStats, RoundEndData, TimerData, UserId,
};

use crate::coordinator::{encode, SessionCoordinator};

/// Starts the game and its first round. Caller has already verified the
/// host and `can_start`.
pub(crate) async fn start_game(co: &SessionCoordinator, hub: &HubHandle, room: SharedRoom) {
    let snapshot = {
        let mut r = room.write().await;
        r.start_game().await;
        r.snapshot().await
    };

    if let Some(f) = encode(MessageKind::GameStarted, &snapshot) {
        hub.broadcast_room(snapshot.id.clone(), f, Exclusion::None);
    }

    begin_round(co, hub, room).await;
}

/// Picks a word and launches the next round.
///
/// Returns an explicitly boxed future (rather than `async fn`'s normal
/// opaque type) because `begin_round` and `end_round` call each other:
/// an opaque `impl Future` on either side of that cycle defeats rustc's
/// auto-trait (`Send`) inference on itself.
pub(crate) fn begin_round<'a>(
    co: &'a SessionCoordinator,
    hub: &'a HubHandle,
    room: SharedRoom,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
    let (difficulty, custom_words) = {
        let r = room.read().await;
        if r.state != GameState::Playing {
            // The room emptied or reset while the previous round was
            // being wrapped up.
            return;
        }
        (r.settings.difficulty, r.settings.custom_words.clone())
    };

    let (word, hint) = co.words.pick(difficulty, &custom_words).await;

    enum Launch {
        Announce {
            room_id: easel_protocol::RoomId,
            drawer_id: UserId,
            drawer_frame: NewRoundData,
            serial: u64,
        },
        DrawerMissing {
            serial: u64,
        },
    }

    let launch = {
        let mut r = room.write().await;
        if r.state != GameState::Playing {
            return;
        }
        r.start_new_round(word, hint).await;
        let serial = r.round_serial;

        let drawer = r
            .current_drawer
            .clone()
            .and_then(|id| r.player(&id).map(|p| (id, p)));
        match drawer {
            Some((drawer_id, drawer)) => {
                let drawer_name = drawer.read().await.username.clone();
                Launch::Announce {
                    room_id: r.id.clone(),
                    drawer_id: drawer_id.clone(),
                    drawer_frame: NewRoundData {
                        round: r.current_round,
                        max_rounds: r.settings.max_rounds,
                        drawer_id,
                        drawer_name,
                        word_hint: r.word_hint.clone().unwrap_or_default(),
                        time_limit: r.settings.round_seconds,
                        word: r.current_word.clone(),
                    },
                    serial,
                }
            }
            None => Launch::DrawerMissing { serial },
        }
    };

    match launch {
        Launch::DrawerMissing { serial } => {
            tracing::warn!("round started without a drawer, ending it");
            end_round(co, hub, &room, serial).await;
        }
        Launch::Announce {
            room_id,
            drawer_id,
            drawer_frame,
            serial,
        } => {
            // Two visibility-distinct copies of the same announcement:
            // the drawer's carries the word, everyone else's does not.
            if let Some(f) = encode(MessageKind::NewRound, &drawer_frame) {
                hub.send_to_user(drawer_id.clone(), f);
            }
            let guesser_frame = NewRoundData {
                word: None,
                ..drawer_frame
            };
            if let Some(f) = encode(MessageKind::NewRound, &guesser_frame) {
                hub.broadcast_room(room_id, f, Exclusion::User(drawer_id));
            }

            tokio::spawn(run_round_timer(
                co.clone(),
                hub.clone(),
                room.clone(),
                serial,
            ));
        }
    }
    })
}

/// Ticks every second, broadcasting the countdown, until the round ends
/// or the clock runs out.
async fn run_round_timer(
    co: SessionCoordinator,
    hub: HubHandle,
    room: SharedRoom,
    serial: u64,
) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(1));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let (live, time_left, phase, room_id) = {
            let r = room.read().await;
            let live = r.round_serial == serial
                && r.state == GameState::Playing
                && r.phase == GamePhase::Drawing;
            (live, r.time_left(), r.phase, r.id.clone())
        };
        if !live {
            return;
        }

        if let Some(f) = encode(
            MessageKind::Timer,
            &TimerData { time_left, phase },
        ) {
            hub.broadcast_room(room_id, f, Exclusion::None);
        }

        if time_left == 0 {
            end_round(&co, &hub, &room, serial).await;
            return;
        }
    }
}

/// Ends the round identified by `serial`: awards drawer points, builds
/// the results table, broadcasts `round_ended`, and either schedules the
/// next round or finishes the game.
///
/// Guarded by the serial and phase, so the three triggers (timer, last
/// guess, drawer departure) compose: whichever fires first wins and the
/// rest become no-ops.
pub(crate) async fn end_round(
    co: &SessionCoordinator,
    hub: &HubHandle,
    room: &SharedRoom,
    serial: u64,
) {
    let (room_id, data, next_round) = {
        let mut r = room.write().await;
        if r.round_serial != serial
            || r.state != GameState::Playing
            || r.phase != GamePhase::Drawing
        {
            return;
        }

        let word = r.current_word.clone().unwrap_or_default();
        let correct_guessers = r.guessed_players.len() as u32;

        // Drawer points. A drawer who left mid-round earns nothing.
        let computed = scoring::drawer_points(&co.config.points, correct_guessers);
        let (drawer_id, drawer_name, drawer_points) = match r.current_drawer.clone() {
            Some(id) => match r.player(&id) {
                Some(p) => {
                    let mut p = p.write().await;
                    p.add_score(computed);
                    p.record_drawer_turn();
                    (id, p.username.clone(), computed)
                }
                None => (id, String::new(), 0),
            },
            None => (UserId(String::new()), String::new(), 0),
        };

        // First correct guesser takes the round.
        if let Some(first) = r.guessed_players.first().cloned() {
            if let Some(p) = r.player(&first) {
                p.write().await.rounds_won += 1;
            }
        }

        let round_start = r.round_start;
        let mut guessers = Vec::with_capacity(r.player_count());
        for id in r.guessed_players.clone() {
            let Some(p) = r.player(&id) else { continue };
            let p = p.read().await;
            let guess_time = match (p.guess_time, round_start) {
                (Some(at), Some(start)) => {
                    Some(at.signed_duration_since(start).num_seconds().max(0) as u64)
                }
                _ => None,
            };
            guessers.push(GuesserResult {
                user_id: id,
                username: p.username.clone(),
                guessed: true,
                // The points actually awarded this round, so the results
                // table always sums to the score deltas.
                points: p.round_points,
                guess_order: p.guess_order,
                guess_time,
            });
        }

        let everyone: Vec<(UserId, SharedPlayer)> = r
            .players()
            .map(|(id, p)| (id.clone(), p.clone()))
            .collect();
        for (id, p) in everyone {
            if id == drawer_id || r.guessed_players.contains(&id) {
                continue;
            }
            let p = p.read().await;
            guessers.push(GuesserResult {
                user_id: id,
                username: p.username.clone(),
                guessed: false,
                points: 0,
                guess_order: None,
                guess_time: None,
            });
        }

        let leaderboard = r.leaderboard().await;
        let next_round = if r.current_round >= r.settings.max_rounds {
            0
        } else {
            r.current_round + 1
        };

        r.end_round();

        (
            r.id.clone(),
            RoundEndData {
                word,
                drawer_id,
                drawer_name,
                drawer_points,
                guessers,
                leaderboard,
                next_round,
            },
            next_round,
        )
    };

    if let Some(f) = encode(MessageKind::RoundEnded, &data) {
        hub.broadcast_room(room_id, f, Exclusion::None);
    }

    if next_round == 0 {
        end_game(hub, room).await;
    } else {
        // A fresh task breaks the end_round → begin_round → end_round
        // cycle that direct recursion would create in the future types.
        let co = co.clone();
        let hub = hub.clone();
        let room = room.clone();
        tokio::spawn(async move {
            begin_round(&co, &hub, room).await;
        });
    }
}

/// Finishes the game: final standings, per-player statistics, and the
/// reset back to a lobby.
async fn end_game(hub: &HubHandle, room: &SharedRoom) {
    let (room_id, data) = {
        let mut r = room.write().await;

        let rounds_played = r.current_round.max(1);
        let everyone: Vec<(UserId, SharedPlayer)> = r
            .players()
            .map(|(id, p)| (id.clone(), p.clone()))
            .collect();

        let mut player_stats = std::collections::HashMap::new();
        let mut total_score: u64 = 0;
        for (id, p) in &everyone {
            let p = p.read().await;
            total_score += u64::from(p.score);
            player_stats.insert(
                id.clone(),
                PlayerStats {
                    correct_guesses: p.correct_guesses,
                    total_guesses: p.total_guesses,
                    accuracy: p.accuracy(),
                    times_drawer: p.times_drawer,
                    average_points: f64::from(p.score) / f64::from(rounds_played),
                },
            );
        }

        // The leaderboard already encodes the winner rule: highest
        // score, ties to the earliest joiner.
        let leaderboard = r.leaderboard().await;
        let winner = leaderboard.first().cloned();
        let highest_score = winner.as_ref().map(|w| w.score).unwrap_or(0);
        let average_score = if everyone.is_empty() {
            0.0
        } else {
            total_score as f64 / everyone.len() as f64
        };

        let data = GameEndData {
            winner,
            leaderboard,
            game_stats: GameStats {
                total_rounds: r.current_round,
                total_players: everyone.len(),
                average_score,
                highest_score,
                player_stats,
            },
        };

        r.end_game().await;
        (r.id.clone(), data)
    };

    if let Some(f) = encode(MessageKind::GameEnded, &data) {
        hub.broadcast_room(room_id, f, Exclusion::None);
    }
}
