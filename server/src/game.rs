use crate::player::{Player, TetherJumpBudget};
use crate::tether::{apply_tether, is_tether_jump_eligible};
use crate::utils::{default_player_name, normalize_player_name};
use crate::world::World;
use log::{debug, info};
use shared::{
    sanitize_tether_length, ClientId, InputState, JoinPayload, RestartVotes, RoomSettings,
    RoomSnapshot, RoomStatus, PROFILE_COUNT,
};
use std::collections::BTreeSet;

/// How a connection ended up inside a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Player { slot: usize, profile: usize },
    Spectator,
}

impl Membership {
    pub fn slot(&self) -> Option<usize> {
        match self {
            Membership::Player { slot, .. } => Some(*slot),
            Membership::Spectator => None,
        }
    }

    pub fn profile(&self) -> Option<usize> {
        match self {
            Membership::Player { profile, .. } => Some(*profile),
            Membership::Spectator => None,
        }
    }
}

/// One match: two player slots, any number of spectators, one world.
#[derive(Debug, Clone)]
pub struct Room {
    pub code: String,
    pub host_id: Option<ClientId>,
    pub status: RoomStatus,
    /// Wall-clock ms of the winning tick, 0 while nobody has won.
    pub winner_at: u64,
    pub settings: RoomSettings,
    pub world: World,
    pub budget: TetherJumpBudget,
    slots: [Option<Player>; 2],
    restart_votes: [bool; 2],
    spectators: BTreeSet<ClientId>,
}

impl Room {
    pub fn new(code: String, host_id: ClientId, tether_length: u32, world: World) -> Self {
        Self {
            code,
            host_id: Some(host_id),
            status: RoomStatus::Waiting,
            winner_at: 0,
            settings: RoomSettings { tether_length },
            world,
            budget: TetherJumpBudget::default(),
            slots: [None, None],
            restart_votes: [false, false],
            spectators: BTreeSet::new(),
        }
    }

    pub fn player(&self, id: ClientId) -> Option<&Player> {
        self.players().find(|player| player.id == id)
    }

    pub fn player_mut(&mut self, id: ClientId) -> Option<&mut Player> {
        self.slots.iter_mut().flatten().find(|player| player.id == id)
    }

    /// Seated players in slot order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.slots.iter().flatten()
    }

    pub fn spectators(&self) -> &BTreeSet<ClientId> {
        &self.spectators
    }

    pub fn active_player_count(&self) -> usize {
        self.players().count()
    }

    pub fn is_member(&self, id: ClientId) -> bool {
        self.player(id).is_some() || self.spectators.contains(&id)
    }

    pub fn is_host(&self, id: ClientId) -> bool {
        self.host_id == Some(id)
    }

    pub fn is_empty(&self) -> bool {
        self.active_player_count() == 0 && self.spectators.is_empty()
    }

    /// Everyone who receives this room's broadcasts.
    pub fn members(&self) -> Vec<ClientId> {
        self.players()
            .map(|player| player.id)
            .chain(self.spectators.iter().copied())
            .collect()
    }

    fn resolve_profile(&self, preferred: Option<usize>) -> usize {
        let used: Vec<usize> = self.players().map(|player| player.profile).collect();
        if let Some(profile) = preferred.filter(|profile| !used.contains(profile)) {
            return profile;
        }
        (0..PROFILE_COUNT)
            .find(|profile| !used.contains(profile))
            .or(preferred)
            .unwrap_or(0)
    }

    /// Seats `id` in the first free slot, or adds it as a spectator.
    pub fn add_member(
        &mut self,
        id: ClientId,
        preferred_profile: Option<usize>,
        custom_name: Option<&str>,
    ) -> Membership {
        let membership = match self.slots.iter().position(Option::is_none) {
            Some(slot) => {
                let profile = self.resolve_profile(preferred_profile);
                let mut name = normalize_player_name(custom_name.unwrap_or_default());
                if name.is_empty() {
                    name = default_player_name(profile).to_string();
                }
                self.spectators.remove(&id);
                self.slots[slot] = Some(Player::new(id, slot, profile, name, &self.world));
                self.restart_votes[slot] = false;
                Membership::Player { slot, profile }
            }
            None => {
                self.spectators.insert(id);
                Membership::Spectator
            }
        };

        info!("Client {} joined room {} as {:?}", id, self.code, membership);
        self.update_match_state();
        membership
    }

    /// Removes `id` from its slot or the spectator list.
    ///
    /// Returns `false` if `id` was not a member. Host election and match
    /// state are refreshed unless the room is now empty.
    pub fn remove_member(&mut self, id: ClientId) -> bool {
        let mut removed = self.spectators.remove(&id);
        for slot in 0..self.slots.len() {
            if self.slots[slot].as_ref().map(|player| player.id) == Some(id) {
                self.slots[slot] = None;
                self.restart_votes[slot] = false;
                removed = true;
            }
        }
        if self.host_id == Some(id) {
            self.host_id = None;
        }

        if removed {
            info!("Client {} left room {}", id, self.code);
        }
        if !self.is_empty() {
            self.resolve_host();
            self.update_match_state();
        }
        removed
    }

    /// Keeps a present host, otherwise promotes the first seated player,
    /// then the lowest spectator id.
    pub fn resolve_host(&mut self) {
        if let Some(host) = self.host_id {
            if self.is_member(host) {
                return;
            }
        }

        let next = self
            .players()
            .map(|player| player.id)
            .next()
            .or_else(|| self.spectators.iter().next().copied());
        if next != self.host_id {
            debug!("Room {} host is now {:?}", self.code, next);
        }
        self.host_id = next;
    }

    pub fn update_match_state(&mut self) {
        if self.active_player_count() < 2 {
            self.status = RoomStatus::Waiting;
            self.winner_at = 0;
            self.restart_votes = [false, false];
            return;
        }
        if self.status == RoomStatus::Waiting {
            self.reset_round();
        }
    }

    /// Respawns everybody and starts over.
    pub fn reset_round(&mut self) {
        self.restart_votes = [false, false];
        self.budget.reset();
        for player in self.slots.iter_mut().flatten() {
            player.reset(&self.world);
        }
        self.status = if self.active_player_count() == 2 {
            RoomStatus::Playing
        } else {
            RoomStatus::Waiting
        };
        self.winner_at = 0;
        debug!("Room {} round reset, status {:?}", self.code, self.status);
    }

    /// Latches the whole input state of a seated player.
    ///
    /// Returns `false` when the input was ignored.
    pub fn set_input(&mut self, id: ClientId, input: InputState) -> bool {
        if self.status == RoomStatus::Won {
            return false;
        }
        match self.player_mut(id) {
            Some(player) => {
                player.input = input;
                true
            }
            None => false,
        }
    }

    /// Records a restart vote. Returns `true` if the round was reset.
    pub fn vote_restart(&mut self, id: ClientId) -> bool {
        let Some(slot) = self.player(id).map(|player| player.slot) else {
            return false;
        };
        self.restart_votes[slot] = true;

        let votes = self.restart_votes();
        if votes.required >= 2 && votes.voted >= votes.required {
            info!("Room {} restarting by vote", self.code);
            self.reset_round();
            return true;
        }
        false
    }

    pub fn restart_votes(&self) -> RestartVotes {
        let voted = self
            .slots
            .iter()
            .zip(self.restart_votes.iter())
            .filter(|(player, vote)| player.is_some() && **vote)
            .count();
        RestartVotes {
            voted,
            required: self.active_player_count(),
        }
    }

    pub fn set_tether_length(&mut self, requested: Option<f64>) -> RoomSettings {
        self.settings.tether_length = sanitize_tether_length(requested);
        self.settings
    }

    fn both_airborne(&self) -> bool {
        matches!(&self.slots, [Some(first), Some(second)] if !first.on_ground && !second.on_ground)
    }

    /// Runs one simulation step. `now_ms` stamps a win.
    pub fn tick(&mut self, dt: f32, now_ms: u64) {
        self.world.advance_platforms(dt);
        self.update_match_state();
        if self.status != RoomStatus::Playing {
            return;
        }

        if !self.both_airborne() {
            self.budget.reset();
        }

        let tether_length = self.settings.tether_length as f32;
        for player in self.slots.iter_mut().flatten() {
            player.tether_jump_eligible = false;
        }
        if let [Some(first), Some(second)] = &mut self.slots {
            first.tether_jump_eligible = is_tether_jump_eligible(first, second, tether_length);
            second.tether_jump_eligible = is_tether_jump_eligible(second, first, tether_length);
        }

        for player in self.slots.iter_mut().flatten() {
            player.update(dt, &self.world, &mut self.budget);
        }

        if !self.both_airborne() {
            self.budget.reset();
        }

        if let [Some(first), Some(second)] = &mut self.slots {
            apply_tether(first, second, tether_length, &self.world, dt);

            for player in [&mut *first, &mut *second] {
                if !player.goal_locked && player.is_inside(&self.world.goal) {
                    player.lock_at_goal();
                    info!("Player {} reached the goal in room {}", player.id, self.code);
                }
            }

            if first.goal_locked && second.goal_locked {
                self.status = RoomStatus::Won;
                self.winner_at = now_ms;
                info!("Room {} won at {}", self.code, now_ms);
            }
        }

        for player in self.slots.iter_mut().flatten() {
            player.skip_semisolid_platform_id = None;
        }
    }

    pub fn snapshot(&self, now_ms: u64) -> RoomSnapshot {
        RoomSnapshot {
            room_code: self.code.clone(),
            host_id: self.host_id,
            status: self.status,
            winner_at: self.winner_at,
            players: self.players().map(Player::snapshot).collect(),
            spectators: self.spectators.len(),
            settings: self.settings,
            restart_votes: self.restart_votes(),
            moving_platforms: self.world.platform_snapshots(),
            server_time: now_ms,
        }
    }

    pub fn join_payload(&self, id: ClientId, membership: Membership) -> JoinPayload {
        JoinPayload {
            id,
            slot: membership.slot(),
            profile: membership.profile(),
            room_code: self.code.clone(),
            is_host: self.is_host(id),
            world: self.world.payload(),
            settings: self.settings,
        }
    }
}
