//! The per-game orchestrator.
//!
//! [`GameSession`] owns one turn state machine, one ring scheduler, the
//! roster and the active-player pointer. It is synchronous: every entry
//! point takes one input (a player action or an expired wake), mutates the
//! game, and returns a [`SessionOutput`] listing the events to broadcast and
//! the wakes to schedule. The worker task behind [`crate::SessionHandle`]
//! owns the clocks and the queue.
//!
//! # Turn flow
//!
//! 1. `Roll`: the active player rolls (or the roll timer rolls for them).
//! 2. The piece moves, the scheduler advances one turn and processes the
//!    events due on it, and up to `max_cards_per_turn` cards are drawn.
//! 3. `Tile -> Card`, then `Decision` if a drawn card needs a choice,
//!    otherwise straight to `EndTurn`.
//! 4. `EndTurn -> Idle`: the pointer rotates, the round counter bumps when
//!    it wraps, and the next player's `Roll` begins.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use ringboard_core::config::{RingboardConfig, SessionConfig};
use ringboard_core::effects::EffectResolver;
use ringboard_core::scheduler::RingEventScheduler;
use ringboard_core::turn::{Transition, TurnStateMachine};
use ringboard_core::wake::{ArmedWake, WakeToken};
use ringboard_types::{
    Card, CardChoiceAction, CardResolved, Deck, EventKind, GameId, PendingDecision, PhaseTimedOut,
    PlayerId, PlayerSeat, PlayerState, Ring, RingEvent, RollAction, SessionEvent, SessionSnapshot,
    TileResult, TurnContext, TurnPhase, TurnResult, TurnStarted,
};
use tracing::{debug, info, warn};

use crate::catalog::{CardCatalog, CardFilter};
use crate::error::SessionError;

/// Highest face on the player's die.
const MAX_ROLL: u8 = 6;

/// What one input produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOutput {
    /// Events to broadcast, in order.
    pub events: Vec<SessionEvent>,
    /// Timers to schedule.
    pub wakes: Vec<ArmedWake>,
}

impl SessionOutput {
    fn record(&mut self, transition: Transition) {
        if let Some(wake) = transition.armed {
            self.wakes.push(wake);
        }
    }
}

/// One running game.
pub struct GameSession {
    game_id: GameId,
    config: SessionConfig,
    machine: TurnStateMachine,
    scheduler: RingEventScheduler,
    catalog: Arc<dyn CardCatalog>,
    players: Vec<PlayerState>,
    active: usize,
    round: u32,
    drawn: Vec<Card>,
    rng: StdRng,
}

impl core::fmt::Debug for GameSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GameSession")
            .field("game_id", &self.game_id)
            .field("phase", &self.machine.phase())
            .field("round", &self.round)
            .field("active", &self.active)
            .field("players", &self.players.len())
            .finish_non_exhaustive()
    }
}

impl GameSession {
    /// Seat `seats` in order and prepare an idle game.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EmptyRoster`] for an empty table, or
    /// [`SessionError::Scheduler`] if the ring intervals are invalid.
    pub fn new(
        game_id: GameId,
        seats: Vec<PlayerSeat>,
        config: &RingboardConfig,
        catalog: Arc<dyn CardCatalog>,
    ) -> Result<Self, SessionError> {
        if seats.is_empty() {
            return Err(SessionError::EmptyRoster);
        }
        let players = seats
            .into_iter()
            .map(|seat| PlayerState {
                id: seat.id,
                name: seat.name,
                stats: config.session.starting_stats,
                tags: Vec::new(),
                position: 0,
            })
            .collect();
        let rng = config
            .session
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);

        let mut machine = TurnStateMachine::new(&config.turn);
        for phase in [TurnPhase::Roll, TurnPhase::Decision] {
            machine.on_enter(
                phase,
                Box::new(move |phase: TurnPhase, context: &TurnContext| {
                    debug!(
                        %game_id,
                        phase = %phase,
                        turn = context.turn,
                        "awaiting player input"
                    );
                }),
            );
        }

        Ok(Self {
            game_id,
            config: config.session.clone(),
            machine,
            scheduler: RingEventScheduler::new(&config.rings.to_map())?,
            catalog,
            players,
            active: 0,
            round: 1,
            drawn: Vec::new(),
            rng,
        })
    }

    /// The game id.
    pub const fn game_id(&self) -> GameId {
        self.game_id
    }

    /// Current turn phase.
    pub const fn phase(&self) -> TurnPhase {
        self.machine.phase()
    }

    /// Round counter, starting at 1.
    pub const fn round(&self) -> u32 {
        self.round
    }

    /// Seat index of the active player.
    pub const fn active_index(&self) -> usize {
        self.active
    }

    /// Every seated player.
    pub fn players(&self) -> &[PlayerState] {
        &self.players
    }

    /// The ring scheduler.
    pub const fn scheduler(&self) -> &RingEventScheduler {
        &self.scheduler
    }

    /// Whether `token` is still a live timer.
    pub fn is_armed(&self, token: WakeToken) -> bool {
        self.machine.is_armed(token)
    }

    /// Begin the first player's turn.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Transition`] unless the game is idle.
    pub fn start(&mut self) -> Result<SessionOutput, SessionError> {
        let mut out = SessionOutput::default();
        self.begin_turn(&mut out)?;
        info!(
            game_id = %self.game_id,
            players = self.players.len(),
            "Game started"
        );
        Ok(out)
    }

    /// Apply a roll from the active player.
    ///
    /// # Errors
    ///
    /// Rejects actions for another game, from an inactive player, outside
    /// `Roll`, or with a value outside 1..=6. Nothing changes on rejection.
    pub fn handle_roll(&mut self, action: &RollAction) -> Result<SessionOutput, SessionError> {
        self.check_actor(action.game_id, action.player_id, TurnPhase::Roll)?;
        if !(1..=MAX_ROLL).contains(&action.roll_result) {
            return Err(self.rejected(SessionError::InvalidRoll {
                roll: action.roll_result,
            }));
        }
        let mut out = SessionOutput::default();
        self.play_roll(action.roll_result, &mut out)?;
        Ok(out)
    }

    /// Apply a card choice from the active player.
    ///
    /// # Errors
    ///
    /// Rejects actions for another game, from an inactive player, outside
    /// `Decision`, for a card other than the pending one, with an
    /// out-of-range index, or whose preconditions fail. Nothing changes on
    /// rejection and the decision timer keeps running.
    pub fn handle_choice(
        &mut self,
        action: &CardChoiceAction,
    ) -> Result<SessionOutput, SessionError> {
        self.check_actor(action.game_id, action.player_id, TurnPhase::Decision)?;

        let pending = self
            .machine
            .context()
            .pending_decision
            .as_ref()
            .filter(|pending| pending.card_id == action.card_id);
        let card = pending.and_then(|_| self.drawn.iter().find(|card| card.id == action.card_id));
        let Some(card) = card else {
            return Err(self.rejected(SessionError::UnknownCard {
                card_id: action.card_id.clone(),
            }));
        };
        let choice = match EffectResolver::choice_at(&card.choices, action.choice_index) {
            Ok(choice) => choice.clone(),
            Err(err) => return Err(self.rejected(err.into())),
        };

        let Some(player) = self.players.get_mut(self.active) else {
            return Err(SessionError::EmptyRoster);
        };
        let outcome = match EffectResolver::resolve_choice(
            &mut player.stats,
            &mut player.tags,
            &choice,
            &mut self.rng,
        ) {
            Ok(outcome) => outcome,
            Err(err) => return Err(self.rejected(err.into())),
        };
        let resolved = CardResolved {
            player_id: player.id,
            card_id: action.card_id.clone(),
            choice_index: action.choice_index,
            choice,
            dice_roll: outcome.dice_roll,
            new_stats: player.stats,
            tags: player.tags.clone(),
        };
        info!(
            game_id = %self.game_id,
            player_id = %resolved.player_id,
            card_id = %resolved.card_id,
            choice = resolved.choice_index,
            dice_roll = ?resolved.dice_roll,
            "Card choice resolved"
        );

        let mut out = SessionOutput::default();
        self.machine.set_pending_decision(None);
        out.record(self.machine.transition(TurnPhase::EndTurn)?);
        out.events.push(SessionEvent::CardResolved(resolved));
        self.finish_turn(&mut out)?;
        Ok(out)
    }

    /// Report an expired timer.
    ///
    /// Stale tokens produce an empty output. A roll timeout rolls for the
    /// idle player and plays the turn on; a decision timeout ends the turn
    /// without applying any choice.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Scheduler`] if the turn counter is exhausted.
    pub fn handle_wake(&mut self, token: WakeToken) -> Result<SessionOutput, SessionError> {
        let mut out = SessionOutput::default();
        let Some(forced) = self.machine.fire(token) else {
            return Ok(out);
        };
        out.record(forced);
        let player_id = self.active_player()?.id;
        warn!(
            game_id = %self.game_id,
            player_id = %player_id,
            phase = %forced.from,
            "Phase timed out"
        );
        out.events.push(SessionEvent::PhaseTimedOut(PhaseTimedOut {
            player_id,
            phase: forced.from,
        }));

        match forced.from {
            TurnPhase::Roll => {
                let roll = EffectResolver::roll_die(&mut self.rng);
                self.play_roll(roll, &mut out)?;
            }
            TurnPhase::Decision => self.finish_turn(&mut out)?,
            _ => {}
        }
        Ok(out)
    }

    /// A serializable view of the game.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            game_id: self.game_id,
            phase: self.machine.phase(),
            context: self.machine.context().clone(),
            round: self.round,
            active_index: self.active,
            players: self.players.clone(),
            scheduler_turn: self.scheduler.current_turn(),
            upcoming_events: self.scheduler.upcoming_events(self.config.upcoming_lookahead),
            fired_events: self.scheduler.history().len(),
            drawn_cards: self.drawn.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Turn steps
    // -----------------------------------------------------------------------

    /// Everything from the roll up to `Decision` or the next player's turn.
    fn play_roll(&mut self, roll: u8, out: &mut SessionOutput) -> Result<(), SessionError> {
        self.machine.record_roll(roll);
        let board_tiles = self.config.board_tiles;
        let player = self
            .players
            .get_mut(self.active)
            .ok_or(SessionError::EmptyRoster)?;
        player.position = player
            .position
            .saturating_add(u32::from(roll))
            .checked_rem(board_tiles)
            .unwrap_or(0);
        let player_id = player.id;
        let tile = TileResult {
            roll,
            position: player.position,
        };
        self.machine.record_tile(tile);

        let triggered = self.scheduler.advance_turn(&mut self.rng)?;
        let events = self.scheduler.process_current();
        self.apply_events(&events);

        self.drawn = self.draw_cards(&triggered);
        if let Some(last) = self.drawn.last() {
            self.machine.record_card(last.id.clone());
        }
        let pending = self
            .drawn
            .iter()
            .find(|card| card.requires_choice())
            .map(|card| PendingDecision {
                card_id: card.id.clone(),
                choice_count: card.choices.len(),
            });
        let awaiting_choice = pending.is_some();

        if self.machine.phase() == TurnPhase::Roll {
            out.record(self.machine.transition(TurnPhase::Tile)?);
        }
        out.record(self.machine.transition(TurnPhase::Card)?);
        self.machine.set_pending_decision(pending);

        info!(
            game_id = %self.game_id,
            player_id = %player_id,
            roll,
            position = tile.position,
            turn = self.scheduler.current_turn(),
            triggered = triggered.len(),
            events = events.len(),
            cards = self.drawn.len(),
            awaiting_choice,
            "Roll resolved"
        );
        out.events.push(SessionEvent::TurnResult(TurnResult {
            player_id,
            roll_result: roll,
            tile,
            triggered_rings: triggered,
            events,
            cards: self.drawn.clone(),
            awaiting_choice,
            next_player: self.next_index(),
            round: self.round,
            turn: self.machine.context().turn,
            scheduler_turn: self.scheduler.current_turn(),
        }));

        if awaiting_choice {
            out.record(self.machine.transition(TurnPhase::Decision)?);
        } else {
            out.record(self.machine.transition(TurnPhase::EndTurn)?);
            self.finish_turn(out)?;
        }
        Ok(())
    }

    /// `EndTurn -> Idle`, rotate the pointer, start the next turn.
    fn finish_turn(&mut self, out: &mut SessionOutput) -> Result<(), SessionError> {
        out.record(self.machine.transition(TurnPhase::Idle)?);
        self.drawn.clear();
        self.active = self.next_index();
        if self.active == 0 {
            self.round = self.round.saturating_add(1);
            debug!(game_id = %self.game_id, round = self.round, "Round complete");
        }
        self.begin_turn(out)
    }

    fn begin_turn(&mut self, out: &mut SessionOutput) -> Result<(), SessionError> {
        let player_id = self.active_player()?.id;
        out.record(self.machine.begin_turn(player_id)?);
        let turn = self.machine.context().turn;
        info!(
            game_id = %self.game_id,
            player_id = %player_id,
            round = self.round,
            turn,
            "Turn started"
        );
        out.events.push(SessionEvent::TurnStarted(TurnStarted {
            player_id,
            player_index: self.active,
            round: self.round,
            turn,
        }));
        Ok(())
    }

    /// Global events hit every player; tile events hit the active player.
    fn apply_events(&mut self, events: &[RingEvent]) {
        for event in events {
            match event.kind {
                EventKind::Global => {
                    for player in &mut self.players {
                        EffectResolver::apply(&mut player.stats, &event.effects);
                    }
                }
                EventKind::Tile => {
                    if let Some(player) = self.players.get_mut(self.active) {
                        EffectResolver::apply(&mut player.stats, &event.effects);
                    }
                }
            }
            debug!(
                game_id = %self.game_id,
                event_id = %event.id,
                ring = %event.ring,
                kind = ?event.kind,
                "Ring event applied"
            );
        }
    }

    /// One draw per triggered ring from a random deck, or a single
    /// unfiltered draw when no ring fired. Capped at `max_cards_per_turn`.
    fn draw_cards(&mut self, triggered: &[Ring]) -> Vec<Card> {
        let round = self.round;
        let filters: Vec<CardFilter> = if triggered.is_empty() {
            vec![CardFilter::default().in_round(round)]
        } else {
            triggered
                .iter()
                .map(|ring| CardFilter::category(ring.as_str()).in_round(round))
                .collect()
        };

        let mut cards = Vec::new();
        for filter in filters.iter().take(self.config.max_cards_per_turn) {
            let Some(deck) = Deck::ALL.choose(&mut self.rng).copied() else {
                continue;
            };
            if let Some(card) = self.catalog.random_card(deck, filter, &mut self.rng) {
                cards.push(card);
            } else {
                debug!(
                    game_id = %self.game_id,
                    deck = %deck,
                    category = ?filter.category,
                    "No card matched draw"
                );
            }
        }
        cards
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn active_player(&self) -> Result<&PlayerState, SessionError> {
        self.players
            .get(self.active)
            .ok_or(SessionError::EmptyRoster)
    }

    fn next_index(&self) -> usize {
        self.active
            .saturating_add(1)
            .checked_rem(self.players.len())
            .unwrap_or(0)
    }

    fn check_actor(
        &self,
        game_id: GameId,
        player_id: PlayerId,
        phase: TurnPhase,
    ) -> Result<(), SessionError> {
        if game_id != self.game_id {
            return Err(self.rejected(SessionError::WrongGame {
                expected: self.game_id,
                got: game_id,
            }));
        }
        if self.active_player()?.id != player_id {
            return Err(self.rejected(SessionError::NotYourTurn { player_id }));
        }
        if self.machine.phase() != phase {
            return Err(self.rejected(SessionError::WrongPhase {
                phase: self.machine.phase(),
            }));
        }
        Ok(())
    }

    fn rejected(&self, error: SessionError) -> SessionError {
        warn!(game_id = %self.game_id, error = %error, "Action rejected");
        error
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::panic
)]
mod tests {
    use ringboard_types::{
        CardChoice, CardId, ChoiceConditions, ChoiceTriggers, DiceBranch, EffectDelta, PlayerStats,
        Rarity, Stat,
    };

    use super::*;
    use crate::catalog::MemoryCatalog;

    fn seeded_config() -> RingboardConfig {
        let mut config = RingboardConfig::default();
        config.session.seed = Some(42);
        config
    }

    fn seats(n: usize) -> Vec<PlayerSeat> {
        (0..n)
            .map(|i| PlayerSeat {
                id: PlayerId::new(),
                name: format!("player-{i}"),
            })
            .collect()
    }

    fn card(id: &str, deck: Deck, category: &str, choices: Vec<CardChoice>) -> Card {
        Card {
            id: CardId::from(id),
            name: id.to_owned(),
            deck,
            card_type: "test".to_owned(),
            category: category.to_owned(),
            description: String::new(),
            choices,
            rarity: Rarity::Common,
            min_round: None,
        }
    }

    fn choice(text: &str, effects: EffectDelta) -> CardChoice {
        CardChoice {
            text: text.to_owned(),
            effects,
            conditions: None,
            triggers: None,
        }
    }

    /// One card per deck with two choices, in an unfiltered category.
    fn decision_catalog() -> Arc<dyn CardCatalog> {
        let mut catalog = MemoryCatalog::new();
        for (id, deck) in [("sin_1", Deck::Sin), ("vir_1", Deck::Virtue)] {
            let choices = vec![
                choice("take", EffectDelta::new().with(Stat::Money, -500).with(Stat::Mental, 1)),
                CardChoice {
                    text: "invest".to_owned(),
                    effects: EffectDelta::new().with(Stat::Money, -5000),
                    conditions: Some(ChoiceConditions {
                        requires_money: Some(5000),
                        ..ChoiceConditions::default()
                    }),
                    triggers: None,
                },
            ];
            catalog.insert(card(id, deck, "misc", choices)).unwrap();
        }
        Arc::new(catalog)
    }

    fn session(n: usize, catalog: Arc<dyn CardCatalog>) -> GameSession {
        GameSession::new(GameId::new(), seats(n), &seeded_config(), catalog).unwrap()
    }

    fn roll(session: &GameSession, value: u8) -> RollAction {
        RollAction {
            game_id: session.game_id(),
            player_id: session.players()[session.active_index()].id,
            roll_result: value,
        }
    }

    fn turn_result(out: &SessionOutput) -> &TurnResult {
        out.events
            .iter()
            .find_map(|e| match e {
                SessionEvent::TurnResult(r) => Some(r),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn empty_roster_is_rejected() {
        let result = GameSession::new(
            GameId::new(),
            Vec::new(),
            &seeded_config(),
            Arc::new(MemoryCatalog::new()),
        );
        assert!(matches!(result, Err(SessionError::EmptyRoster)));
    }

    #[test]
    fn start_enters_roll_and_arms_the_roll_timer() {
        let mut s = session(2, Arc::new(MemoryCatalog::new()));
        let out = s.start().unwrap();
        assert_eq!(s.phase(), TurnPhase::Roll);
        assert_eq!(out.wakes.len(), 1);
        assert!(matches!(
            out.events.as_slice(),
            [SessionEvent::TurnStarted(TurnStarted { player_index: 0, round: 1, .. })]
        ));
    }

    #[test]
    fn roll_without_cards_passes_the_turn() {
        let mut s = session(2, Arc::new(MemoryCatalog::new()));
        s.start().unwrap();
        let out = s.handle_roll(&roll(&s, 3)).unwrap();
        let result = turn_result(&out);
        assert_eq!(result.roll_result, 3);
        assert_eq!(result.tile.position, 3);
        assert!(result.cards.is_empty());
        assert!(!result.awaiting_choice);
        assert_eq!(result.next_player, 1);
        assert_eq!(result.scheduler_turn, 2);
        assert_eq!(s.active_index(), 1);
        assert_eq!(s.phase(), TurnPhase::Roll);
        assert_eq!(s.players()[0].position, 3);
    }

    #[test]
    fn turn_result_reports_the_started_turn_number() {
        let mut s = session(2, Arc::new(MemoryCatalog::new()));
        let opening = s.start().unwrap();
        let Some(SessionEvent::TurnStarted(started)) = opening.events.first() else {
            panic!("expected turn_started");
        };
        let out = s.handle_roll(&roll(&s, 2)).unwrap();
        let result = turn_result(&out);
        assert_eq!(result.turn, started.turn);
        assert_eq!(result.turn, 1);
        assert_eq!(result.scheduler_turn, 2);
        assert!(matches!(
            out.events.last(),
            Some(SessionEvent::TurnStarted(next)) if next.turn == 2
        ));
    }

    #[test]
    fn round_increments_when_the_pointer_wraps() {
        let mut s = session(2, Arc::new(MemoryCatalog::new()));
        s.start().unwrap();
        s.handle_roll(&roll(&s, 1)).unwrap();
        assert_eq!(s.round(), 1);
        s.handle_roll(&roll(&s, 1)).unwrap();
        assert_eq!(s.active_index(), 0);
        assert_eq!(s.round(), 2);
    }

    #[test]
    fn position_wraps_around_the_board() {
        let mut config = seeded_config();
        config.session.board_tiles = 4;
        let mut s =
            GameSession::new(GameId::new(), seats(1), &config, Arc::new(MemoryCatalog::new()))
                .unwrap();
        s.start().unwrap();
        s.handle_roll(&roll(&s, 3)).unwrap();
        s.handle_roll(&roll(&s, 3)).unwrap();
        assert_eq!(s.players()[0].position, 2);
    }

    #[test]
    fn rejects_out_of_turn_and_invalid_rolls_without_mutation() {
        let mut s = session(2, Arc::new(MemoryCatalog::new()));
        s.start().unwrap();
        let before = s.snapshot();

        let mut action = roll(&s, 4);
        action.player_id = s.players()[1].id;
        assert!(matches!(
            s.handle_roll(&action),
            Err(SessionError::NotYourTurn { .. })
        ));

        assert_eq!(
            s.handle_roll(&roll(&s, 7)),
            Err(SessionError::InvalidRoll { roll: 7 })
        );
        assert_eq!(
            s.handle_roll(&roll(&s, 0)),
            Err(SessionError::InvalidRoll { roll: 0 })
        );

        let mut action = roll(&s, 4);
        action.game_id = GameId::new();
        assert!(matches!(
            s.handle_roll(&action),
            Err(SessionError::WrongGame { .. })
        ));
        assert_eq!(s.snapshot(), before);
    }

    #[test]
    fn card_with_choices_waits_for_a_decision() {
        let mut s = session(2, decision_catalog());
        s.start().unwrap();
        let out = s.handle_roll(&roll(&s, 2)).unwrap();
        let result = turn_result(&out);
        assert!(result.awaiting_choice);
        assert_eq!(result.cards.len(), 1);
        assert_eq!(s.phase(), TurnPhase::Decision);
        assert_eq!(out.wakes.last().unwrap().token.phase(), TurnPhase::Decision);

        let pending = s.snapshot().context.pending_decision.unwrap();
        assert_eq!(pending.choice_count, 2);
    }

    #[test]
    fn choice_applies_effects_and_ends_the_turn() {
        let mut s = session(2, decision_catalog());
        s.start().unwrap();
        s.handle_roll(&roll(&s, 2)).unwrap();
        let pending = s.snapshot().context.pending_decision.unwrap();
        let player_id = s.players()[0].id;

        let out = s
            .handle_choice(&CardChoiceAction {
                game_id: s.game_id(),
                player_id,
                card_id: pending.card_id.clone(),
                choice_index: 0,
            })
            .unwrap();
        let resolved = out
            .events
            .iter()
            .find_map(|e| match e {
                SessionEvent::CardResolved(r) => Some(r),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            resolved.new_stats,
            PlayerStats {
                money: 1500,
                mental: 6,
                sin: 0,
                virtue: 0
            }
        );
        assert_eq!(s.active_index(), 1);
        assert_eq!(s.phase(), TurnPhase::Roll);
        assert!(s.snapshot().context.pending_decision.is_none());
    }

    #[test]
    fn failed_precondition_keeps_the_decision_open() {
        let mut s = session(2, decision_catalog());
        s.start().unwrap();
        s.handle_roll(&roll(&s, 2)).unwrap();
        let pending = s.snapshot().context.pending_decision.unwrap();
        let action = CardChoiceAction {
            game_id: s.game_id(),
            player_id: s.players()[0].id,
            card_id: pending.card_id,
            choice_index: 1,
        };
        assert!(matches!(
            s.handle_choice(&action),
            Err(SessionError::PreconditionFailed { .. })
        ));
        assert_eq!(s.players()[0].stats.money, 2000);
        assert_eq!(s.phase(), TurnPhase::Decision);
    }

    #[test]
    fn unknown_card_and_bad_index_are_rejected() {
        let mut s = session(1, decision_catalog());
        s.start().unwrap();
        s.handle_roll(&roll(&s, 2)).unwrap();
        let pending = s.snapshot().context.pending_decision.unwrap();
        let player_id = s.players()[0].id;

        let wrong_card = CardChoiceAction {
            game_id: s.game_id(),
            player_id,
            card_id: CardId::from("nope"),
            choice_index: 0,
        };
        assert!(matches!(
            s.handle_choice(&wrong_card),
            Err(SessionError::UnknownCard { .. })
        ));

        let bad_index = CardChoiceAction {
            card_id: pending.card_id,
            choice_index: 9,
            ..wrong_card
        };
        assert_eq!(
            s.handle_choice(&bad_index),
            Err(SessionError::InvalidChoice { index: 9, count: 2 })
        );
        assert_eq!(s.phase(), TurnPhase::Decision);
    }

    #[test]
    fn roll_timeout_rolls_for_the_player() {
        let mut s = session(2, Arc::new(MemoryCatalog::new()));
        let wake = s.start().unwrap().wakes[0];
        let out = s.handle_wake(wake.token).unwrap();
        assert!(matches!(
            out.events.first(),
            Some(SessionEvent::PhaseTimedOut(PhaseTimedOut {
                phase: TurnPhase::Roll,
                ..
            }))
        ));
        let result = turn_result(&out);
        assert!((1..=6).contains(&result.roll_result));
        assert_eq!(s.active_index(), 1);
        assert_eq!(s.phase(), TurnPhase::Roll);
    }

    #[test]
    fn decision_timeout_ends_the_turn_without_a_choice() {
        let mut s = session(2, decision_catalog());
        s.start().unwrap();
        let out = s.handle_roll(&roll(&s, 2)).unwrap();
        let wake = *out.wakes.last().unwrap();
        let out = s.handle_wake(wake.token).unwrap();
        assert!(matches!(
            out.events.first(),
            Some(SessionEvent::PhaseTimedOut(PhaseTimedOut {
                phase: TurnPhase::Decision,
                ..
            }))
        ));
        assert_eq!(s.players()[0].stats.money, 2000);
        assert_eq!(s.active_index(), 1);
        assert!(s.snapshot().context.pending_decision.is_none());
    }

    #[test]
    fn stale_wake_is_a_no_op() {
        let mut s = session(2, Arc::new(MemoryCatalog::new()));
        let wake = s.start().unwrap().wakes[0];
        s.handle_roll(&roll(&s, 1)).unwrap();
        let before = s.snapshot();
        let out = s.handle_wake(wake.token).unwrap();
        assert!(out.events.is_empty());
        assert_eq!(s.snapshot(), before);
    }

    #[test]
    fn global_ring_events_hit_every_player() {
        let mut s = session(2, Arc::new(MemoryCatalog::new()));
        s.start().unwrap();
        // Turns 2, 3 and 4: the career seed (global, -200 money) fires on 4.
        for _ in 0..3 {
            s.handle_roll(&roll(&s, 1)).unwrap();
        }
        assert!(s.players().iter().all(|p| p.stats.money == 1800));
        assert_eq!(s.snapshot().fired_events, 1);
    }

    #[test]
    fn triggered_ring_draws_from_its_category() {
        let mut catalog = MemoryCatalog::new();
        for deck in Deck::ALL {
            let id = format!("{deck}_career");
            let choices = vec![CardChoice {
                text: "gamble".to_owned(),
                effects: EffectDelta::new(),
                conditions: None,
                triggers: Some(ChoiceTriggers {
                    add_tags: vec!["gambler".to_owned()],
                    dice: vec![DiceBranch {
                        min: 1,
                        max: 6,
                        effects: EffectDelta::new().with(Stat::Sin, 1),
                    }],
                }),
            }];
            catalog.insert(card(&id, deck, "career", choices)).unwrap();
        }
        let mut config = seeded_config();
        config.rings.career = 2;
        let mut s = GameSession::new(GameId::new(), seats(1), &config, Arc::new(catalog)).unwrap();
        s.start().unwrap();
        let out = s.handle_roll(&roll(&s, 1)).unwrap();
        let result = turn_result(&out);
        assert_eq!(result.triggered_rings, vec![Ring::Career]);
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.cards.len(), 1);
        assert_eq!(result.cards[0].category, "career");

        let card_id = result.cards[0].id.clone();
        let out = s
            .handle_choice(&CardChoiceAction {
                game_id: s.game_id(),
                player_id: s.players()[0].id,
                card_id,
                choice_index: 0,
            })
            .unwrap();
        let resolved = out
            .events
            .iter()
            .find_map(|e| match e {
                SessionEvent::CardResolved(r) => Some(r),
                _ => None,
            })
            .unwrap();
        assert!(resolved.dice_roll.is_some());
        assert_eq!(resolved.tags, vec!["gambler"]);
        assert_eq!(resolved.new_stats.sin, 1);
    }
}
