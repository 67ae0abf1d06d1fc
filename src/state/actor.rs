//! The room task: the single place where a room is mutated. Every request,
//! timer expiry and playlist outcome for a room goes through its command
//! channel and is handled to completion before the next one.

use std::{sync::Arc, time::SystemTime};

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{
        history::{HistoryRecord, HistorySink},
        models::{RoomRecordEntity, RoomStatusEntity, rank_results},
    },
    dto::sse::WrongGuessReason,
    error::ServiceError,
    matcher,
    providers::PlaylistCriteria,
    services::{playlist_service::PlaylistResolver, room_events},
    state::{
        hub::Broadcaster,
        room::{Player, PlayerId, Room, RoomId, RoomSnapshot, Song},
        scheduler::{RoundScheduler, TimerKind, TimerTicket},
        state_machine::RoomPhase,
    },
};

type Reply<T> = oneshot::Sender<Result<T, ServiceError>>;

/// Messages processed by a room task.
pub enum RoomCommand {
    Join {
        player: Player,
        reply: Reply<RoomSnapshot>,
    },
    StartGame {
        player_id: PlayerId,
        criteria: PlaylistCriteria,
        reply: Reply<RoomSnapshot>,
    },
    Guess {
        player_id: PlayerId,
        text: String,
        reply: Reply<GuessOutcome>,
    },
    Leave {
        player_id: PlayerId,
        reply: Reply<()>,
    },
    Snapshot {
        reply: Reply<RoomSnapshot>,
    },
    /// Outcome of the playlist resolution started by attempt `attempt`.
    PlaylistResolved {
        attempt: u64,
        outcome: Result<Vec<Song>, ServiceError>,
    },
    TimerFired(TimerTicket),
}

/// What happened to a submitted guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessOutcome {
    /// The guess claimed the round.
    Correct,
    /// The matcher rejected the guess.
    Incorrect,
    /// No round was open.
    RoundClosed,
}

/// Collaborators shared by every room.
#[derive(Clone)]
pub struct RoomContext {
    pub config: Arc<AppConfig>,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub resolver: PlaylistResolver,
    pub history: HistorySink,
}

/// Cheap, cloneable access to a live room.
#[derive(Clone)]
pub struct RoomHandle {
    id: RoomId,
    instance: Uuid,
    commands: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub(crate) fn new(id: RoomId, instance: Uuid, commands: mpsc::Sender<RoomCommand>) -> Self {
        Self {
            id,
            instance,
            commands,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Identity of this room instance; room ids are reused after teardown.
    pub fn instance(&self) -> Uuid {
        self.instance
    }

    /// Send a command carrying a reply channel and await the answer.
    pub async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> RoomCommand,
    ) -> Result<T, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| ServiceError::RoomClosed(self.id.clone()))?;
        response
            .await
            .map_err(|_| ServiceError::RoomClosed(self.id.clone()))?
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, ServiceError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

/// State owned by the task of one room.
pub struct RoomTask {
    room: Room,
    record_id: Uuid,
    ctx: RoomContext,
    scheduler: RoundScheduler,
    commands: mpsc::Receiver<RoomCommand>,
    sender: mpsc::WeakSender<RoomCommand>,
    loading_attempt: u64,
    loading_task: Option<JoinHandle<()>>,
}

impl RoomTask {
    pub fn new(
        room: Room,
        record_id: Uuid,
        ctx: RoomContext,
        commands: mpsc::Receiver<RoomCommand>,
        sender: mpsc::WeakSender<RoomCommand>,
    ) -> Self {
        let scheduler = RoundScheduler::new(room.id().to_string(), sender.clone());
        Self {
            room,
            record_id,
            ctx,
            scheduler,
            commands,
            sender,
            loading_attempt: 0,
            loading_task: None,
        }
    }

    fn broadcaster(&self) -> &dyn Broadcaster {
        self.ctx.broadcaster.as_ref()
    }

    /// Process commands until the room is torn down.
    pub async fn run(mut self) {
        self.opened();

        while let Some(command) = self.commands.recv().await {
            if self.handle(command) == Flow::Close {
                break;
            }
        }

        self.shutdown();
    }

    fn handle(&mut self, command: RoomCommand) -> Flow {
        match command {
            RoomCommand::Join { player, reply } => {
                let _ = reply.send(self.join(player));
                Flow::Continue
            }
            RoomCommand::StartGame {
                player_id,
                criteria,
                reply,
            } => {
                let _ = reply.send(self.start_game(&player_id, criteria));
                Flow::Continue
            }
            RoomCommand::Guess {
                player_id,
                text,
                reply,
            } => {
                let _ = reply.send(self.guess(&player_id, &text));
                Flow::Continue
            }
            RoomCommand::Leave { player_id, reply } => {
                let (result, flow) = self.leave(&player_id);
                let _ = reply.send(result);
                flow
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(Ok(self.room.snapshot()));
                Flow::Continue
            }
            RoomCommand::PlaylistResolved { attempt, outcome } => {
                self.playlist_resolved(attempt, outcome);
                Flow::Continue
            }
            RoomCommand::TimerFired(ticket) => {
                self.timer_fired(ticket);
                Flow::Continue
            }
        }
    }

    fn opened(&self) {
        let owner = self.room.owner().cloned();
        info!(room_id = %self.room.id(), owner = ?owner.as_ref().map(|o| &o.id), "room opened");

        if let Some(owner) = &owner {
            room_events::notify_membership(
                self.broadcaster(),
                room_events::EVENT_ROOM_CREATED,
                &owner.id,
                &self.room,
            );
        }

        let now = SystemTime::now();
        self.ctx
            .history
            .record(HistoryRecord::Opened(RoomRecordEntity {
                id: self.record_id,
                room_id: self.room.id().to_string(),
                owner_name: owner.map(|o| o.name).unwrap_or_default(),
                requested_rounds: self.room.requested_rounds(),
                status: RoomStatusEntity::Lobby,
                created_at: self.room.created_at(),
                updated_at: now,
                results: Vec::new(),
            }));
    }

    fn record_status(&self, status: RoomStatusEntity) {
        self.ctx.history.record(HistoryRecord::Status {
            id: self.record_id,
            status,
            at: SystemTime::now(),
        });
    }

    fn join(&mut self, player: Player) -> Result<RoomSnapshot, ServiceError> {
        let capacity = self.ctx.config.rooms.max_players;
        let joined = self.room.add_player(player, capacity)?.clone();
        info!(room_id = %self.room.id(), player_id = %joined.id, "player joined");

        room_events::publish_player_joined(self.broadcaster(), &self.room, &joined);
        room_events::notify_membership(
            self.broadcaster(),
            room_events::EVENT_ROOM_JOINED,
            &joined.id,
            &self.room,
        );
        Ok(self.room.snapshot())
    }

    fn start_game(
        &mut self,
        player_id: &str,
        criteria: PlaylistCriteria,
    ) -> Result<RoomSnapshot, ServiceError> {
        if self.room.player(player_id).is_none() {
            return Err(ServiceError::NotFound(format!(
                "player `{player_id}` is not in room `{}`",
                self.room.id()
            )));
        }
        self.room.begin_loading(player_id)?;

        let rounds = self
            .ctx
            .config
            .rooms
            .clamp_rounds(Some(criteria.rounds.unwrap_or(self.room.requested_rounds())));
        info!(room_id = %self.room.id(), rounds, "loading playlist");

        room_events::publish_game_loading(self.broadcaster(), self.room.id(), rounds);
        self.record_status(RoomStatusEntity::Loading);

        self.loading_attempt += 1;
        let attempt = self.loading_attempt;
        let resolver = self.ctx.resolver.clone();
        let sender = self.sender.clone();
        self.loading_task = Some(tokio::spawn(async move {
            let outcome = resolver.resolve(criteria, rounds).await;
            if let Some(sender) = sender.upgrade() {
                let _ = sender
                    .send(RoomCommand::PlaylistResolved { attempt, outcome })
                    .await;
            }
        }));

        Ok(self.room.snapshot())
    }

    fn playlist_resolved(&mut self, attempt: u64, outcome: Result<Vec<Song>, ServiceError>) {
        if attempt != self.loading_attempt || self.room.phase() != RoomPhase::Loading {
            debug!(room_id = %self.room.id(), attempt, "ignoring stale playlist outcome");
            return;
        }
        self.loading_task = None;

        let installed = outcome.and_then(|songs| self.room.install_playlist(songs));
        if let Err(err) = installed {
            warn!(room_id = %self.room.id(), error = %err, "playlist resolution failed; back to lobby");
            if let Err(rollback) = self.room.rollback_loading() {
                warn!(room_id = %self.room.id(), error = %rollback, "rollback refused");
                return;
            }
            room_events::publish_error(
                self.broadcaster(),
                self.room.id(),
                "playlist_unavailable",
                &err.to_string(),
            );
            self.record_status(RoomStatusEntity::Lobby);
            return;
        }

        info!(room_id = %self.room.id(), total_rounds = self.room.total_rounds(), "game started");
        room_events::publish_game_started(self.broadcaster(), &self.room);
        self.record_status(RoomStatusEntity::Playing);
        self.schedule_countdown();
    }

    fn schedule_countdown(&mut self) {
        let round = self.room.round_index() + 1;
        let countdown = self.ctx.config.timings.countdown;
        room_events::publish_round_countdown(
            self.broadcaster(),
            &self.room,
            round,
            countdown,
        );
        self.scheduler.arm(TimerKind::Countdown, round, countdown);
    }

    fn timer_fired(&mut self, ticket: TimerTicket) {
        if !self.scheduler.take_fired(ticket) {
            debug!(room_id = %self.room.id(), ?ticket, "ignoring stale timer");
            return;
        }

        match ticket.kind {
            TimerKind::Countdown => self.open_round(ticket.round),
            TimerKind::RoundTimeout => self.round_timed_out(ticket.round),
            TimerKind::Intermission => self.advance(),
        }
    }

    fn open_round(&mut self, expected: usize) {
        let Some(round) = self.room.start_next_round() else {
            warn!(room_id = %self.room.id(), round = expected, "no round to open; ending game");
            self.finish_game();
            return;
        };

        let duration = self.ctx.config.timings.round;
        debug!(room_id = %self.room.id(), round = round.number, "round opened");
        room_events::publish_round_started(
            self.broadcaster(),
            &self.room,
            &round,
            duration,
        );
        self.scheduler
            .arm(TimerKind::RoundTimeout, round.number, duration);
    }

    fn round_timed_out(&mut self, number: usize) {
        let Some(round) = self.room.claim_round(number) else {
            debug!(room_id = %self.room.id(), round = number, "timeout after resolution");
            return;
        };

        info!(room_id = %self.room.id(), round = number, "round timed out");
        room_events::publish_round_timeout(self.broadcaster(), self.room.id(), &round);
        self.scheduler.arm(
            TimerKind::Intermission,
            number,
            self.ctx.config.timings.timeout_delay,
        );
    }

    fn advance(&mut self) {
        if !self.room.has_remaining_rounds() {
            self.finish_game();
            return;
        }

        if let Err(err) = self.room.complete_round() {
            warn!(room_id = %self.room.id(), error = %err, "cannot hand over to next round");
            return;
        }
        self.schedule_countdown();
    }

    fn finish_game(&mut self) {
        self.scheduler.cancel();
        if let Err(err) = self.room.finish() {
            warn!(room_id = %self.room.id(), error = %err, "cannot end game");
            return;
        }

        info!(room_id = %self.room.id(), "game over");
        room_events::publish_game_over(self.broadcaster(), &self.room);

        let results = rank_results(
            self.room
                .scoreboard()
                .into_iter()
                .map(|player| (player.id, player.name, player.score)),
        );
        self.ctx.history.record(HistoryRecord::Results {
            id: self.record_id,
            results,
            at: SystemTime::now(),
        });
        self.record_status(RoomStatusEntity::Ended);
    }

    fn guess(&mut self, player_id: &str, text: &str) -> Result<GuessOutcome, ServiceError> {
        if !self.room.player(player_id).is_some_and(|player| player.connected) {
            return Err(ServiceError::NotFound(format!(
                "player `{player_id}` is not in room `{}`",
                self.room.id()
            )));
        }
        if self.room.phase() != RoomPhase::Playing {
            return Err(ServiceError::InvalidState(format!(
                "room `{}` is not playing",
                self.room.id()
            )));
        }

        let open = self
            .room
            .current_round()
            .filter(|_| self.room.is_round_active())
            .map(|round| (round.number, matcher::accept(text, &round.song.title)));

        let Some((number, accepted)) = open else {
            let number = self
                .room
                .current_round()
                .map(|round| round.number)
                .unwrap_or(self.room.round_index());
            room_events::notify_wrong_guess(
                self.broadcaster(),
                player_id,
                number,
                text,
                WrongGuessReason::RoundClosed,
            );
            return Ok(GuessOutcome::RoundClosed);
        };

        if !accepted {
            room_events::notify_wrong_guess(
                self.broadcaster(),
                player_id,
                number,
                text,
                WrongGuessReason::Incorrect,
            );
            return Ok(GuessOutcome::Incorrect);
        }

        let Some(round) = self.room.claim_round(number) else {
            return Ok(GuessOutcome::RoundClosed);
        };
        self.room.award_point(player_id);
        self.scheduler.cancel();

        let Some(winner) = self.room.player(player_id).cloned() else {
            return Ok(GuessOutcome::Correct);
        };
        info!(room_id = %self.room.id(), round = number, player_id, score = winner.score, "round won");
        room_events::publish_round_won(self.broadcaster(), self.room.id(), &round, &winner);
        room_events::publish_scoreboard(self.broadcaster(), &self.room);
        self.scheduler.arm(
            TimerKind::Intermission,
            number,
            self.ctx.config.timings.win_delay,
        );

        Ok(GuessOutcome::Correct)
    }

    fn leave(&mut self, player_id: &str) -> (Result<(), ServiceError>, Flow) {
        let Some(player) = self.room.leave(player_id) else {
            let err = ServiceError::NotFound(format!(
                "player `{player_id}` is not in room `{}`",
                self.room.id()
            ));
            return (Err(err), Flow::Continue);
        };

        info!(room_id = %self.room.id(), player_id, phase = ?self.room.phase(), "player left");
        room_events::publish_player_left(self.broadcaster(), &self.room, &player);

        if self.room.connected_players() == 0 {
            (Ok(()), Flow::Close)
        } else {
            (Ok(()), Flow::Continue)
        }
    }

    fn shutdown(&mut self) {
        self.scheduler.cancel();
        if let Some(task) = self.loading_task.take() {
            task.abort();
        }
        self.commands.close();

        self.record_status(RoomStatusEntity::Closed);
        self.ctx.broadcaster.room_closed(self.room.id());
        info!(room_id = %self.room.id(), "room closed");
    }
}
