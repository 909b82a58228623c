//! Room directory and request handling
//!
//! The lobby owns every room and turns client requests into outbound
//! dispatches. It never touches sockets: callers hand in the requesting
//! session and deliver whatever comes back.

use crate::client_manager::Client;
use crate::error::RoomError;
use crate::game::Room;
use crate::level_store::LevelStore;
use crate::utils::{normalize_preferred_profile, normalize_room_code};
use log::{debug, error, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{sanitize_tether_length, ClientId, ClientMessage, ServerMessage, ROOM_CODE_LENGTH};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const MAX_ROOM_CODE_ATTEMPTS: usize = 3000;

/// One outbound message and the clients that should receive it
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub recipients: Vec<ClientId>,
    pub message: ServerMessage,
}

impl Dispatch {
    pub fn to(client_id: ClientId, message: ServerMessage) -> Self {
        Self {
            recipients: vec![client_id],
            message,
        }
    }

    /// Addresses every current member of `room`
    pub fn room(room: &Room, message: ServerMessage) -> Self {
        Self {
            recipients: room.members(),
            message,
        }
    }
}

/// A room torn down because its simulation panicked
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedRoom {
    pub code: String,
    pub members: Vec<ClientId>,
}

/// Everything one lobby tick wants sent or cleaned up
#[derive(Debug, Default)]
pub struct TickReport {
    pub dispatches: Vec<Dispatch>,
    pub closed: Vec<ClosedRoom>,
}

/// Draws room codes until `is_taken` accepts one
pub fn generate_room_code<R: Rng>(
    rng: &mut R,
    is_taken: impl Fn(&str) -> bool,
) -> Result<String, RoomError> {
    for _ in 0..MAX_ROOM_CODE_ATTEMPTS {
        let code: String = (0..ROOM_CODE_LENGTH)
            .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
            .collect();
        if !is_taken(&code) {
            return Ok(code);
        }
    }
    Err(RoomError::CreateFailed)
}

pub struct Lobby {
    rooms: HashMap<String, Room>,
    level_store: LevelStore,
    rng: StdRng,
}

impl Lobby {
    pub fn new(level_store: LevelStore) -> Self {
        Self::with_rng(level_store, StdRng::from_entropy())
    }

    pub fn with_rng(level_store: LevelStore, rng: StdRng) -> Self {
        Self {
            rooms: HashMap::new(),
            level_store,
            rng,
        }
    }

    pub fn room(&self, code: &str) -> Option<&Room> {
        self.rooms.get(code)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn level_store(&self) -> &LevelStore {
        &self.level_store
    }

    /// Applies one request from `client`
    ///
    /// Failures become a `request-failed` reply to the sender only; any
    /// dispatches produced before the failure are still returned.
    pub fn handle_message(
        &mut self,
        client: &mut Client,
        message: ClientMessage,
        now_ms: u64,
    ) -> Vec<Dispatch> {
        let request = message.request_name();
        let mut dispatches = Vec::new();

        if let Err(e) = self.apply(client, message, now_ms, &mut dispatches) {
            debug!("Client {} {} failed: {}", client.id, request, e);
            dispatches.push(Dispatch::to(
                client.id,
                ServerMessage::RequestFailed {
                    request: request.to_string(),
                    reason: e.to_string(),
                },
            ));
        }
        dispatches
    }

    fn apply(
        &mut self,
        client: &mut Client,
        message: ClientMessage,
        now_ms: u64,
        out: &mut Vec<Dispatch>,
    ) -> Result<(), RoomError> {
        match message {
            ClientMessage::CreateRoom {
                preferred_profile,
                custom_name,
                tether_length,
                level_file,
            } => self.create_room(
                client,
                preferred_profile,
                custom_name.as_deref(),
                tether_length,
                level_file.as_deref(),
                now_ms,
                out,
            ),
            ClientMessage::JoinRoom {
                code,
                preferred_profile,
                custom_name,
            } => self.join_room(
                client,
                &code,
                preferred_profile,
                custom_name.as_deref(),
                now_ms,
                out,
            ),
            ClientMessage::LeaveRoom => {
                self.leave_room(client, now_ms, out);
                Ok(())
            }
            ClientMessage::Input(input) => {
                if let Some(room) = self.current_room_mut(client) {
                    room.set_input(client.id, input);
                }
                Ok(())
            }
            ClientMessage::Restart => {
                self.restart(client, now_ms, out);
                Ok(())
            }
            ClientMessage::SetSettings { tether_length } => {
                self.set_settings(client, tether_length, now_ms, out)
            }
            ClientMessage::ListLevels => {
                out.push(Dispatch::to(
                    client.id,
                    ServerMessage::Levels {
                        levels: self.level_store.list_levels(),
                    },
                ));
                Ok(())
            }
        }
    }

    fn current_room_mut(&mut self, client: &Client) -> Option<&mut Room> {
        client
            .room_code
            .as_deref()
            .and_then(|code| self.rooms.get_mut(code))
    }

    #[allow(clippy::too_many_arguments)]
    fn create_room(
        &mut self,
        client: &mut Client,
        preferred_profile: Option<i64>,
        custom_name: Option<&str>,
        tether_length: Option<f64>,
        level_file: Option<&str>,
        now_ms: u64,
        out: &mut Vec<Dispatch>,
    ) -> Result<(), RoomError> {
        self.leave_room(client, now_ms, out);

        let rooms = &self.rooms;
        let code = generate_room_code(&mut self.rng, |code| rooms.contains_key(code))?;
        let tether_length = sanitize_tether_length(tether_length);
        let world = self.level_store.load_world(level_file);

        info!(
            "Client {} created room {} on level {:?}",
            client.id, code, world.name
        );
        let room = Room::new(code.clone(), client.id, tether_length, world);
        self.rooms.insert(code.clone(), room);
        self.seat(client, &code, preferred_profile, custom_name, now_ms, out);
        Ok(())
    }

    fn join_room(
        &mut self,
        client: &mut Client,
        code: &str,
        preferred_profile: Option<i64>,
        custom_name: Option<&str>,
        now_ms: u64,
        out: &mut Vec<Dispatch>,
    ) -> Result<(), RoomError> {
        let code = normalize_room_code(code);
        if !self.rooms.contains_key(&code) {
            return Err(RoomError::NotFound);
        }

        self.leave_room(client, now_ms, out);
        // Leaving may have emptied and removed the very room being rejoined
        if !self.rooms.contains_key(&code) {
            return Err(RoomError::NotFound);
        }
        self.seat(client, &code, preferred_profile, custom_name, now_ms, out);
        Ok(())
    }

    fn seat(
        &mut self,
        client: &mut Client,
        code: &str,
        preferred_profile: Option<i64>,
        custom_name: Option<&str>,
        now_ms: u64,
        out: &mut Vec<Dispatch>,
    ) {
        let Some(room) = self.rooms.get_mut(code) else {
            return;
        };

        let membership = room.add_member(
            client.id,
            normalize_preferred_profile(preferred_profile),
            custom_name,
        );
        client.enter_room(code, membership.slot());

        out.push(Dispatch::to(
            client.id,
            ServerMessage::RoomJoined(room.join_payload(client.id, membership)),
        ));
        out.push(Dispatch::room(room, ServerMessage::State(room.snapshot(now_ms))));
    }

    /// Vacates the client's seat or spectator entry, deleting an empty room
    pub fn leave_room(&mut self, client: &mut Client, now_ms: u64, out: &mut Vec<Dispatch>) {
        let Some(code) = client.leave_room() else {
            return;
        };
        let Some(room) = self.rooms.get_mut(&code) else {
            return;
        };

        room.remove_member(client.id);
        if room.is_empty() {
            self.rooms.remove(&code);
            info!("Room {} closed, no members left", code);
            return;
        }
        out.push(Dispatch::room(room, ServerMessage::State(room.snapshot(now_ms))));
    }

    /// Tears down the session's membership when its connection goes away
    pub fn disconnect(&mut self, client: &mut Client, now_ms: u64) -> Vec<Dispatch> {
        let mut dispatches = Vec::new();
        self.leave_room(client, now_ms, &mut dispatches);
        dispatches
    }

    fn restart(&mut self, client: &Client, now_ms: u64, out: &mut Vec<Dispatch>) {
        if client.slot.is_none() {
            return;
        }
        let Some(room) = self.current_room_mut(client) else {
            return;
        };
        if room.player(client.id).is_none() {
            return;
        }

        room.vote_restart(client.id);
        out.push(Dispatch::room(room, ServerMessage::State(room.snapshot(now_ms))));
    }

    fn set_settings(
        &mut self,
        client: &Client,
        tether_length: Option<f64>,
        now_ms: u64,
        out: &mut Vec<Dispatch>,
    ) -> Result<(), RoomError> {
        let room = self.current_room_mut(client).ok_or(RoomError::NotInRoom)?;
        if !room.is_host(client.id) {
            return Err(RoomError::NotHost);
        }

        let settings = room.set_tether_length(tether_length);
        debug!(
            "Room {} tether length set to {}",
            room.code, settings.tether_length
        );
        out.push(Dispatch::room(room, ServerMessage::Settings(settings)));
        out.push(Dispatch::room(room, ServerMessage::State(room.snapshot(now_ms))));
        Ok(())
    }

    /// Advances every room one step and snapshots it for its members
    pub fn tick(&mut self, dt: f32, now_ms: u64) -> TickReport {
        self.step_rooms(dt, now_ms, |room, dt, now_ms| room.tick(dt, now_ms))
    }

    /// Runs `step` on each room in isolation
    ///
    /// A room whose step panics is removed and reported in
    /// [`TickReport::closed`]; its members are told with `room-closed`.
    pub fn step_rooms<F>(&mut self, dt: f32, now_ms: u64, step: F) -> TickReport
    where
        F: Fn(&mut Room, f32, u64),
    {
        let mut report = TickReport::default();
        let mut failed = Vec::new();

        for (code, room) in self.rooms.iter_mut() {
            match catch_unwind(AssertUnwindSafe(|| step(room, dt, now_ms))) {
                Ok(()) => report
                    .dispatches
                    .push(Dispatch::room(room, ServerMessage::State(room.snapshot(now_ms)))),
                Err(_) => failed.push(code.clone()),
            }
        }

        for code in failed {
            let Some(room) = self.rooms.remove(&code) else {
                continue;
            };
            error!("Room {} panicked during its tick and was closed", code);
            let members = room.members();
            report.dispatches.push(Dispatch {
                recipients: members.clone(),
                message: ServerMessage::RoomClosed {
                    room_code: code.clone(),
                    reason: "The room hit an internal error and was closed.".to_string(),
                },
            });
            report.closed.push(ClosedRoom { code, members });
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{InputState, RoomStatus, DT};
    use std::net::SocketAddr;
    use std::path::PathBuf;
    use tokio::sync::mpsc;

    fn lobby() -> Lobby {
        let store = LevelStore::new(vec![PathBuf::from("/no/such/levels")], "forest-1-1.json");
        Lobby::with_rng(store, StdRng::seed_from_u64(42))
    }

    fn client(id: ClientId) -> Client {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        Client::new(id, addr, tx)
    }

    fn create(lobby: &mut Lobby, client: &mut Client) -> String {
        lobby.handle_message(
            client,
            ClientMessage::CreateRoom {
                preferred_profile: None,
                custom_name: None,
                tether_length: None,
                level_file: None,
            },
            0,
        );
        client.room_code.clone().unwrap()
    }

    fn join(lobby: &mut Lobby, client: &mut Client, code: &str) -> Vec<Dispatch> {
        lobby.handle_message(
            client,
            ClientMessage::JoinRoom {
                code: code.to_string(),
                preferred_profile: None,
                custom_name: None,
            },
            0,
        )
    }

    fn failure_reason(dispatches: &[Dispatch]) -> Option<String> {
        dispatches.iter().find_map(|dispatch| match &dispatch.message {
            ServerMessage::RequestFailed { reason, .. } => Some(reason.clone()),
            _ => None,
        })
    }

    #[test]
    fn test_room_code_alphabet() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let code = generate_room_code(&mut rng, |_| false).unwrap();
            assert_eq!(code.len(), ROOM_CODE_LENGTH);
            assert!(code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_room_code_exhaustion() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            generate_room_code(&mut rng, |_| true),
            Err(RoomError::CreateFailed)
        );
    }

    #[test]
    fn test_create_room_replies_and_broadcasts() {
        let mut lobby = lobby();
        let mut host = client(1);
        let dispatches = lobby.handle_message(
            &mut host,
            ClientMessage::CreateRoom {
                preferred_profile: Some(1),
                custom_name: Some("  Mossy  ".to_string()),
                tether_length: Some(9999.0),
                level_file: Some("missing.json".to_string()),
            },
            0,
        );

        assert_eq!(dispatches.len(), 2);
        match &dispatches[0].message {
            ServerMessage::RoomJoined(payload) => {
                assert_eq!(payload.slot, Some(0));
                assert_eq!(payload.profile, Some(1));
                assert!(payload.is_host);
                assert_eq!(payload.settings.tether_length, 395);
                assert_eq!(payload.world.name, "Forest Blocks");
            }
            other => panic!("Expected room-joined, got {:?}", other),
        }
        assert!(matches!(dispatches[1].message, ServerMessage::State(_)));
        assert_eq!(host.slot, Some(0));

        let code = host.room_code.clone().unwrap();
        assert_eq!(lobby.room(&code).unwrap().player(1).unwrap().name, "Mossy");
    }

    #[test]
    fn test_join_unknown_room() {
        let mut lobby = lobby();
        let mut guest = client(2);
        let dispatches = join(&mut lobby, &mut guest, "zzzzz");
        assert_eq!(
            failure_reason(&dispatches).as_deref(),
            Some("Room code not found.")
        );
        assert!(guest.room_code.is_none());
    }

    #[test]
    fn test_join_normalizes_code_and_fills_slots() {
        let mut lobby = lobby();
        let mut host = client(1);
        let code = create(&mut lobby, &mut host);

        let mut guest = client(2);
        let messy = format!(" {}-", code.to_lowercase());
        let dispatches = join(&mut lobby, &mut guest, &messy);
        assert!(failure_reason(&dispatches).is_none());
        assert_eq!(guest.slot, Some(1));
        assert_eq!(lobby.room(&code).unwrap().status, RoomStatus::Playing);

        let mut watcher = client(3);
        join(&mut lobby, &mut watcher, &code);
        assert_eq!(watcher.room_code.as_deref(), Some(code.as_str()));
        assert_eq!(watcher.slot, None);
        assert!(lobby.room(&code).unwrap().spectators().contains(&3));
    }

    #[test]
    fn test_switching_rooms_leaves_the_old_one() {
        let mut lobby = lobby();
        let mut first = client(1);
        let old_code = create(&mut lobby, &mut first);
        let mut second = client(2);
        let new_code = create(&mut lobby, &mut second);

        join(&mut lobby, &mut first, &new_code);
        assert!(lobby.room(&old_code).is_none());
        assert_eq!(lobby.room_count(), 1);
    }

    #[test]
    fn test_rejoining_own_empty_room_fails() {
        let mut lobby = lobby();
        let mut host = client(1);
        let code = create(&mut lobby, &mut host);

        let dispatches = join(&mut lobby, &mut host, &code);
        assert_eq!(
            failure_reason(&dispatches).as_deref(),
            Some("Room code not found.")
        );
        assert_eq!(lobby.room_count(), 0);
    }

    #[test]
    fn test_leave_and_disconnect() {
        let mut lobby = lobby();
        let mut host = client(1);
        let code = create(&mut lobby, &mut host);
        let mut guest = client(2);
        join(&mut lobby, &mut guest, &code);

        let dispatches = lobby.disconnect(&mut host, 0);
        assert_eq!(dispatches.len(), 1);
        assert_eq!(dispatches[0].recipients, vec![2]);
        let room = lobby.room(&code).unwrap();
        assert_eq!(room.host_id, Some(2));
        assert_eq!(room.status, RoomStatus::Waiting);

        lobby.handle_message(&mut guest, ClientMessage::LeaveRoom, 0);
        assert!(lobby.room(&code).is_none());
        assert!(guest.room_code.is_none());

        // Leaving twice is harmless
        assert!(lobby
            .handle_message(&mut guest, ClientMessage::LeaveRoom, 0)
            .is_empty());
    }

    #[test]
    fn test_settings_permissions() {
        let mut lobby = lobby();
        let mut outsider = client(9);
        let dispatches = lobby.handle_message(
            &mut outsider,
            ClientMessage::SetSettings {
                tether_length: Some(200.0),
            },
            0,
        );
        assert_eq!(failure_reason(&dispatches).as_deref(), Some("Join a room first."));

        let mut host = client(1);
        let code = create(&mut lobby, &mut host);
        let mut guest = client(2);
        join(&mut lobby, &mut guest, &code);

        let dispatches = lobby.handle_message(
            &mut guest,
            ClientMessage::SetSettings {
                tether_length: Some(200.0),
            },
            0,
        );
        assert_eq!(
            failure_reason(&dispatches).as_deref(),
            Some("Only the host can change settings.")
        );
        assert_eq!(dispatches[0].recipients, vec![2]);

        let dispatches = lobby.handle_message(
            &mut host,
            ClientMessage::SetSettings {
                tether_length: Some(12.0),
            },
            0,
        );
        assert_eq!(dispatches.len(), 2);
        assert_eq!(dispatches[0].recipients, vec![1, 2]);
        assert_eq!(
            dispatches[0].message,
            ServerMessage::Settings(shared::RoomSettings { tether_length: 75 })
        );
    }

    #[test]
    fn test_input_and_restart_are_silent_for_spectators() {
        let mut lobby = lobby();
        let mut host = client(1);
        let code = create(&mut lobby, &mut host);
        let mut guest = client(2);
        join(&mut lobby, &mut guest, &code);
        let mut watcher = client(3);
        join(&mut lobby, &mut watcher, &code);

        let input = InputState {
            left: false,
            right: true,
            jump: false,
        };
        assert!(lobby
            .handle_message(&mut watcher, ClientMessage::Input(input), 0)
            .is_empty());
        assert!(lobby
            .handle_message(&mut watcher, ClientMessage::Restart, 0)
            .is_empty());

        assert!(lobby
            .handle_message(&mut host, ClientMessage::Input(input), 0)
            .is_empty());
        assert_eq!(lobby.room(&code).unwrap().player(1).unwrap().input, input);

        let dispatches = lobby.handle_message(&mut host, ClientMessage::Restart, 0);
        assert_eq!(dispatches.len(), 1);
        assert_eq!(
            lobby.room(&code).unwrap().restart_votes(),
            shared::RestartVotes {
                voted: 1,
                required: 2
            }
        );
    }

    #[test]
    fn test_list_levels_replies_to_sender() {
        let mut lobby = lobby();
        let mut someone = client(4);
        let dispatches = lobby.handle_message(&mut someone, ClientMessage::ListLevels, 0);
        assert_eq!(
            dispatches,
            vec![Dispatch::to(4, ServerMessage::Levels { levels: Vec::new() })]
        );
    }

    #[test]
    fn test_tick_snapshots_every_room() {
        let mut lobby = lobby();
        let mut first = client(1);
        create(&mut lobby, &mut first);
        let mut second = client(2);
        create(&mut lobby, &mut second);

        let report = lobby.tick(DT, 77);
        assert!(report.closed.is_empty());
        assert_eq!(report.dispatches.len(), 2);
        for dispatch in &report.dispatches {
            match &dispatch.message {
                ServerMessage::State(snapshot) => assert_eq!(snapshot.server_time, 77),
                other => panic!("Expected state, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_panicking_room_is_closed_alone() {
        let mut lobby = lobby();
        let mut first = client(1);
        let doomed = create(&mut lobby, &mut first);
        let mut second = client(2);
        let healthy = create(&mut lobby, &mut second);

        let report = lobby.step_rooms(DT, 5, |room, dt, now_ms| {
            if room.code == doomed {
                panic!("simulated failure");
            }
            room.tick(dt, now_ms);
        });

        assert_eq!(
            report.closed,
            vec![ClosedRoom {
                code: doomed.clone(),
                members: vec![1],
            }]
        );
        assert!(lobby.room(&doomed).is_none());
        assert!(lobby.room(&healthy).is_some());
        assert!(report.dispatches.iter().any(|dispatch| matches!(
            &dispatch.message,
            ServerMessage::RoomClosed { room_code, .. } if *room_code == doomed
        )));
    }
}
