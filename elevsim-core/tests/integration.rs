//! Integration tests: a fake simulation server on localhost, end-to-end
//! reconciliation scenarios, and property checks on the frame envelope and
//! the typed messages it carries.

use std::time::Duration;

use bytes::BytesMut;
use elevsim_core::{
    Algorithm, Command, Connection, ConnectionInfo, ElevatorId, ElevsimError, Frame, FrameCodec,
    GameUpdate, Inconsistency, LoadId, PassengerSpawn, Reconciler, ServerEvent, SimulationConfig,
    SimulationPhase, StateUpdate, Trip,
};
use futures::{SinkExt, StreamExt};
use proptest::prelude::*;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Decoder, Framed};

// ── Helpers ──────────────────────────────────────────────────────

async fn ephemeral_listener() -> (TcpListener, ConnectionInfo) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let info = ConnectionInfo::new(addr.ip().to_string(), addr.port());
    (listener, info)
}

async fn recv_event(conn: &mut Connection) -> ServerEvent {
    let frame = tokio::time::timeout(Duration::from_secs(5), conn.recv())
        .await
        .expect("timeout")
        .expect("connection closed");
    ServerEvent::from_frame(&frame).unwrap()
}

async fn recv_command(server: &mut Framed<TcpStream, FrameCodec>) -> Command {
    let envelope = tokio::time::timeout(Duration::from_secs(5), server.next())
        .await
        .expect("timeout")
        .expect("client hung up")
        .unwrap();
    Command::from_frame(&Frame::decode(&envelope).unwrap()).unwrap()
}

async fn push(server: &mut Framed<TcpStream, FrameCodec>, event: ServerEvent) {
    server.send(event.to_frame().unwrap()).await.unwrap();
}

fn config() -> SimulationConfig {
    SimulationConfig {
        floor_count: 5,
        max_load: 0,
        algorithm_id: Algorithm::Look as u32,
        simulation_speed: 100,
        update_rate: 10,
    }
}

fn initialized() -> Reconciler {
    let mut state = Reconciler::new();
    assert!(state.apply(&ServerEvent::NewSimulation(config())).is_clean());
    state
}

fn tick(tick: u32, updates: Vec<StateUpdate>) -> ServerEvent {
    ServerEvent::GameUpdate(GameUpdate { tick, updates })
}

// ── Session over TCP ─────────────────────────────────────────────

#[tokio::test]
async fn test_session_over_loopback() {
    let (listener, info) = ephemeral_listener().await;

    let client = tokio::spawn({
        let info = info.clone();
        async move { Connection::connect(&info).await.unwrap() }
    });
    let (stream, _) = listener.accept().await.unwrap();
    let mut server = Framed::new(stream, FrameCodec::new());
    let mut conn = client.await.unwrap();
    let mut state = Reconciler::new();

    // Client asks for a simulation and an elevator.
    conn.send(&Command::NewSimulation).await.unwrap();
    conn.send(&Command::AddElevator { floor: 2 }).await.unwrap();
    conn.send(&Command::AddPassengers {
        trips: vec![Trip::new(2, 5)],
    })
    .await
    .unwrap();

    assert_eq!(recv_command(&mut server).await, Command::NewSimulation);
    push(&mut server, ServerEvent::NewSimulation(config())).await;

    assert_eq!(
        recv_command(&mut server).await,
        Command::AddElevator { floor: 2 }
    );
    push(
        &mut server,
        ServerEvent::AddElevator {
            id: ElevatorId(1),
            floor: 2,
        },
    )
    .await;

    let Command::AddPassengers { trips } = recv_command(&mut server).await else {
        panic!("expected AddPassengers");
    };
    let spawns = trips
        .iter()
        .enumerate()
        .map(|(i, t)| PassengerSpawn {
            id: LoadId(100 + i as u32),
            origin: t.origin,
            destination: t.destination,
        })
        .collect();
    push(&mut server, ServerEvent::AddPassengers(spawns)).await;
    push(&mut server, ServerEvent::StartSimulation).await;
    push(
        &mut server,
        tick(
            1,
            vec![StateUpdate::LoadLoad {
                elevator: ElevatorId(1),
                load: LoadId(100),
            }],
        ),
    )
    .await;

    for _ in 0..5 {
        let event = recv_event(&mut conn).await;
        assert!(state.apply(&event).is_clean(), "{event:?}");
    }

    assert_eq!(state.phase(), SimulationPhase::Running);
    assert_eq!(state.tick(), 1);
    let elevator = state.elevator(ElevatorId(1)).unwrap();
    assert!(elevator.loads.contains(&LoadId(100)));
    assert_eq!(state.load(LoadId(100)).unwrap().elevator, Some(ElevatorId(1)));
    assert!(state.links_consistent());

    conn.close().await;
}

#[tokio::test]
async fn test_corrupt_frame_is_dropped_and_stream_continues() {
    let (listener, info) = ephemeral_listener().await;
    let client = tokio::spawn(async move { Connection::connect(&info).await.unwrap() });
    let (mut stream, _) = listener.accept().await.unwrap();
    let mut conn = client.await.unwrap();

    let mut corrupt = ServerEvent::StartSimulation
        .to_frame()
        .unwrap()
        .to_bytes()
        .to_vec();
    let last = corrupt.len() - 1;
    corrupt[last] = 0xFE;
    let good = ServerEvent::SetFloors(12).to_frame().unwrap().to_bytes();

    use tokio::io::AsyncWriteExt;
    stream.write_all(&corrupt).await.unwrap();
    stream.write_all(&good).await.unwrap();

    assert_eq!(recv_event(&mut conn).await, ServerEvent::SetFloors(12));
}

#[tokio::test]
async fn test_damaged_length_does_not_swallow_later_frames() {
    let (listener, info) = ephemeral_listener().await;
    let client = tokio::spawn(async move { Connection::connect(&info).await.unwrap() });
    let (mut stream, _) = listener.accept().await.unwrap();
    let mut conn = client.await.unwrap();

    let with_length = |event: ServerEvent, declared: u32| {
        let mut bytes = event.to_frame().unwrap().to_bytes().to_vec();
        bytes[8..12].copy_from_slice(&declared.to_be_bytes());
        bytes
    };

    use tokio::io::AsyncWriteExt;
    stream
        .write_all(&with_length(ServerEvent::SetFloors(8), 60))
        .await
        .unwrap();
    for floors in [9, 10, 11] {
        let good = ServerEvent::SetFloors(floors).to_frame().unwrap().to_bytes();
        stream.write_all(&good).await.unwrap();
    }
    stream
        .write_all(&with_length(ServerEvent::StartSimulation, 2))
        .await
        .unwrap();
    let good = ServerEvent::SetMaxLoad(600).to_frame().unwrap().to_bytes();
    stream.write_all(&good).await.unwrap();

    assert_eq!(recv_event(&mut conn).await, ServerEvent::SetFloors(9));
    assert_eq!(recv_event(&mut conn).await, ServerEvent::SetFloors(10));
    assert_eq!(recv_event(&mut conn).await, ServerEvent::SetFloors(11));
    assert_eq!(recv_event(&mut conn).await, ServerEvent::SetMaxLoad(600));
}

#[tokio::test]
async fn test_server_close_ends_stream() {
    let (listener, info) = ephemeral_listener().await;
    let client = tokio::spawn(async move { Connection::connect(&info).await.unwrap() });
    let (stream, _) = listener.accept().await.unwrap();
    let mut server = Framed::new(stream, FrameCodec::new());
    let mut conn = client.await.unwrap();

    push(&mut server, ServerEvent::Close("bye".into())).await;
    drop(server);

    assert_eq!(recv_event(&mut conn).await, ServerEvent::Close("bye".into()));
    let end = tokio::time::timeout(Duration::from_secs(5), conn.recv())
        .await
        .expect("timeout");
    assert!(end.is_none());
}

#[tokio::test]
async fn test_connect_refused() {
    let (listener, info) = ephemeral_listener().await;
    drop(listener);
    let err = Connection::connect(&info).await.unwrap_err();
    assert!(matches!(err, ElevsimError::Connection(_)));
}

// ── Reconciliation scenarios ─────────────────────────────────────

#[test]
fn test_move_then_board_then_deliver() {
    let mut state = initialized();
    state.apply(&ServerEvent::AddElevator {
        id: ElevatorId(1),
        floor: 1,
    });
    state.apply(&ServerEvent::AddPassengers(vec![PassengerSpawn {
        id: LoadId(7),
        origin: 3,
        destination: 5,
    }]));

    let outcome = state.apply(&tick(
        4,
        vec![
            StateUpdate::ElevatorDestination {
                elevator: ElevatorId(1),
                floor: Some(3),
            },
            StateUpdate::ElevatorMove {
                elevator: ElevatorId(1),
                floor: 3,
            },
            StateUpdate::LoadLoad {
                elevator: ElevatorId(1),
                load: LoadId(7),
            },
        ],
    ));
    assert_eq!(outcome.applied, 3);
    assert!(outcome.is_clean());
    assert_eq!(state.elevator(ElevatorId(1)).unwrap().current_floor, 3);

    let outcome = state.apply(&tick(
        9,
        vec![
            StateUpdate::ElevatorMove {
                elevator: ElevatorId(1),
                floor: 5,
            },
            StateUpdate::LoadUnload {
                elevator: ElevatorId(1),
                load: LoadId(7),
            },
            StateUpdate::ElevatorDestination {
                elevator: ElevatorId(1),
                floor: None,
            },
        ],
    ));
    assert!(outcome.is_clean());
    assert!(state.load(LoadId(7)).is_none());
    assert!(state.elevator(ElevatorId(1)).unwrap().loads.is_empty());
    assert_eq!(state.stats().delivered, 1);
    assert_eq!(state.stats().total_wait_ticks, 4);
    assert_eq!(state.stats().total_ride_ticks, 5);
}

#[test]
fn test_unknown_elevator_is_skipped_without_mutation() {
    let mut state = initialized();
    state.apply(&ServerEvent::AddElevator {
        id: ElevatorId(1),
        floor: 1,
    });
    let before = state.snapshot();

    let outcome = state.apply(&tick(
        0,
        vec![StateUpdate::ElevatorMove {
            elevator: ElevatorId(9),
            floor: 4,
        }],
    ));
    assert_eq!(
        outcome.skipped,
        vec![Inconsistency::UnknownElevator(ElevatorId(9))]
    );
    assert_eq!(state.snapshot(), before);
}

#[test]
fn test_new_simulation_discards_everything() {
    let mut state = initialized();
    state.apply(&ServerEvent::AddElevator {
        id: ElevatorId(1),
        floor: 1,
    });
    state.apply(&ServerEvent::StartSimulation);
    state.apply(&tick(30, Vec::new()));

    let fresh = SimulationConfig {
        floor_count: 20,
        ..config()
    };
    state.apply(&ServerEvent::NewSimulation(fresh));

    assert_eq!(state.phase(), SimulationPhase::Ready);
    assert_eq!(state.tick(), 0);
    assert_eq!(state.config(), Some(&fresh));
    assert_eq!(state.elevators().count(), 0);
}

#[test]
fn test_corrupted_frame_never_reaches_state() {
    let mut state = initialized();
    let frame = ServerEvent::AddElevator {
        id: ElevatorId(1),
        floor: 1,
    }
    .to_frame()
    .unwrap();
    let mut bytes = frame.to_bytes().to_vec();
    let last = bytes.len() - 1;
    bytes[last] = 0x00;
    let before = state.snapshot();

    let result = Frame::decode(&bytes).and_then(|f| ServerEvent::from_frame(&f));
    assert!(matches!(result, Err(ElevsimError::InvalidEndMarker)));
    assert_eq!(state.snapshot(), before);

    // The intact frame still applies.
    let event = ServerEvent::from_frame(&Frame::decode(&frame.to_bytes()).unwrap()).unwrap();
    assert!(state.apply(&event).is_clean());
    assert!(state.elevator(ElevatorId(1)).is_some());
}

// ── Properties ───────────────────────────────────────────────────

fn arb_frame() -> impl Strategy<Value = Frame> {
    (0u32..=20, proptest::collection::vec(any::<u8>(), 0..256)).prop_map(|(opcode, payload)| {
        Frame::from_payload(opcode, payload.into()).unwrap()
    })
}

fn arb_update() -> impl Strategy<Value = StateUpdate> {
    let elevator = (1u32..=3).prop_map(ElevatorId);
    let load = (1u32..=6).prop_map(LoadId);
    prop_oneof![
        (elevator.clone(), load.clone())
            .prop_map(|(elevator, load)| StateUpdate::LoadLoad { elevator, load }),
        (elevator.clone(), load)
            .prop_map(|(elevator, load)| StateUpdate::LoadUnload { elevator, load }),
        (elevator, 1u32..=5).prop_map(|(elevator, floor)| StateUpdate::ElevatorMove {
            elevator,
            floor
        }),
    ]
}

/// Any string the wire can carry: one byte per char.
fn arb_latin1() -> impl Strategy<Value = String> {
    proptest::collection::vec(any::<u8>(), 0..48)
        .prop_map(|bytes| bytes.into_iter().map(char::from).collect())
}

fn arb_any_update() -> impl Strategy<Value = StateUpdate> {
    let elevator = any::<u32>().prop_map(ElevatorId);
    prop_oneof![
        (elevator.clone(), any::<u32>())
            .prop_map(|(elevator, floor)| StateUpdate::ElevatorMove { elevator, floor }),
        // Floor 0 is how the wire says "no destination".
        (elevator.clone(), proptest::option::of(1u32..=u32::MAX)).prop_map(
            |(elevator, floor)| StateUpdate::ElevatorDestination { elevator, floor }
        ),
        (elevator.clone(), any::<u32>()).prop_map(|(elevator, load)| StateUpdate::LoadLoad {
            elevator,
            load: LoadId(load)
        }),
        (elevator, any::<u32>()).prop_map(|(elevator, load)| StateUpdate::LoadUnload {
            elevator,
            load: LoadId(load)
        }),
        (4u32..=u32::MAX, any::<u32>(), any::<u32>()).prop_map(
            |(code, elevator_id, parameter)| StateUpdate::Unknown {
                code,
                elevator_id,
                parameter
            }
        ),
    ]
}

fn arb_event() -> BoxedStrategy<ServerEvent> {
    let config = any::<[u32; 5]>().prop_map(|[floor_count, max_load, algorithm_id, speed, rate]| {
        SimulationConfig {
            floor_count,
            max_load,
            algorithm_id,
            simulation_speed: speed,
            update_rate: rate,
        }
    });
    let spawn = any::<[u32; 3]>().prop_map(|[id, origin, destination]| PassengerSpawn {
        id: LoadId(id),
        origin,
        destination,
    });
    let lifecycle = prop_oneof![
        config.prop_map(ServerEvent::NewSimulation),
        Just(ServerEvent::StartSimulation),
        Just(ServerEvent::StopSimulation),
        any::<[u32; 2]>().prop_map(|[id, floor]| ServerEvent::AddElevator {
            id: ElevatorId(id),
            floor
        }),
        any::<u32>().prop_map(|id| ServerEvent::RemoveElevator { id: ElevatorId(id) }),
        proptest::collection::vec(spawn, 0..16).prop_map(ServerEvent::AddPassengers),
        (any::<u32>(), proptest::collection::vec(arb_any_update(), 0..16))
            .prop_map(|(tick, updates)| ServerEvent::GameUpdate(GameUpdate { tick, updates })),
    ];
    let settings = prop_oneof![
        any::<u32>().prop_map(ServerEvent::SetFloors),
        any::<u32>().prop_map(ServerEvent::SetAlgorithm),
        any::<u32>().prop_map(ServerEvent::SetSimulationSpeed),
        any::<u32>().prop_map(ServerEvent::SetUpdateRate),
        any::<u32>().prop_map(ServerEvent::SetMaxLoad),
        arb_latin1().prop_map(ServerEvent::Dashboard),
        arb_latin1().prop_map(ServerEvent::Error),
        arb_latin1().prop_map(ServerEvent::Close),
    ];
    prop_oneof![lifecycle, settings].boxed()
}

fn arb_command() -> BoxedStrategy<Command> {
    let trip = any::<[u32; 2]>().prop_map(|[origin, destination]| Trip::new(origin, destination));
    let valued = prop_oneof![
        any::<u32>().prop_map(|floor| Command::AddElevator { floor }),
        any::<u32>().prop_map(|elevator_id| Command::RemoveElevator { elevator_id }),
        any::<u32>().prop_map(|count| Command::SetFloors { count }),
        // Speeds travel in hundredths.
        any::<u32>().prop_map(|hundredths| Command::SetSimulationSpeed {
            speed: f64::from(hundredths) / 100.0
        }),
        any::<u32>().prop_map(|rate| Command::SetUpdateRate { rate }),
        proptest::collection::vec(trip, 0..16).prop_map(|trips| Command::AddPassengers { trips }),
        proptest::sample::select(Algorithm::ALL.to_vec())
            .prop_map(|algorithm| Command::SetAlgorithm { algorithm }),
        any::<u32>().prop_map(|value| Command::SetMaxLoad { value }),
    ];
    let bare = prop_oneof![
        Just(Command::StartSimulation),
        Just(Command::StopSimulation),
        Just(Command::NewSimulation),
        Just(Command::Dashboard),
    ];
    prop_oneof![valued, bare].boxed()
}

proptest! {
    #[test]
    fn server_events_survive_the_wire(event in arb_event()) {
        let bytes = event.to_frame().unwrap().to_bytes();
        let frame = Frame::decode(&bytes).unwrap();
        prop_assert_eq!(frame.opcode(), event.opcode() as u32);
        prop_assert_eq!(ServerEvent::from_frame(&frame).unwrap(), event);
    }

    #[test]
    fn commands_survive_the_wire(command in arb_command()) {
        let bytes = command.to_frame().unwrap().to_bytes();
        let frame = Frame::decode(&bytes).unwrap();
        prop_assert_eq!(frame.opcode(), command.opcode() as u32);
        prop_assert_eq!(Command::from_frame(&frame).unwrap(), command);
    }

    #[test]
    fn event_streams_decode_whatever_the_read_sizes(
        events in proptest::collection::vec(arb_event(), 1..8),
        read_size in 1usize..64,
    ) {
        let mut wire = Vec::new();
        for event in &events {
            wire.extend_from_slice(&event.to_frame().unwrap().to_bytes());
        }

        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        let mut decoded = Vec::new();
        for read in wire.chunks(read_size) {
            buf.extend_from_slice(read);
            while let Some(envelope) = codec.decode(&mut buf).unwrap() {
                let frame = Frame::decode(&envelope).unwrap();
                decoded.push(ServerEvent::from_frame(&frame).unwrap());
            }
        }
        prop_assert_eq!(decoded, events);
        prop_assert_eq!(codec.skipped_bytes(), 0);
    }

    #[test]
    fn frames_survive_the_envelope(frame in arb_frame()) {
        let bytes = frame.to_bytes();
        prop_assert_eq!(bytes.len(), frame.encoded_len());
        prop_assert_eq!(Frame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn payload_bit_flips_are_caught_by_the_checksum(
        frame in arb_frame().prop_filter("non-empty payload", |f| !f.payload().is_empty()),
        index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut bytes = frame.to_bytes().to_vec();
        let offset = elevsim_core::HEADER_SIZE + index.index(frame.payload().len());
        bytes[offset] ^= 1 << bit;

        let tampered = &bytes[elevsim_core::HEADER_SIZE..bytes.len() - 8];
        let recomputed = elevsim_core::checksum::checksum(frame.payload_len(), tampered);
        match Frame::decode(&bytes) {
            Err(ElevsimError::InvalidChecksum { .. }) => {
                prop_assert_ne!(recomputed, frame.checksum());
            }
            Ok(decoded) => {
                // Single-digit checksum: one in ten flips collides.
                prop_assert_eq!(recomputed, frame.checksum());
                prop_assert_eq!(decoded.payload(), tampered);
            }
            Err(other) => prop_assert!(false, "unexpected error {other}"),
        }
    }

    #[test]
    fn length_tampering_is_rejected(frame in arb_frame(), declared in any::<u32>()) {
        prop_assume!(declared != frame.payload_len());
        let mut bytes = frame.to_bytes().to_vec();
        bytes[8..12].copy_from_slice(&declared.to_be_bytes());
        let is_invalid_length = matches!(
            Frame::decode(&bytes),
            Err(ElevsimError::InvalidLength { .. })
        );
        prop_assert!(is_invalid_length);
    }

    #[test]
    fn links_stay_bidirectional(
        max_load in prop_oneof![Just(0u32), 60u32..=180],
        updates in proptest::collection::vec(arb_update(), 0..64),
    ) {
        let mut state = Reconciler::new();
        state.apply(&ServerEvent::NewSimulation(SimulationConfig { max_load, ..config() }));
        for id in 1..=3 {
            state.apply(&ServerEvent::AddElevator { id: ElevatorId(id), floor: 1 });
        }
        state.apply(&ServerEvent::AddPassengers(
            (1..=6)
                .map(|id| PassengerSpawn { id: LoadId(id), origin: 1, destination: 5 })
                .collect(),
        ));

        for (n, update) in updates.into_iter().enumerate() {
            state.apply(&tick(n as u32, vec![update]));
            prop_assert!(state.links_consistent());
        }
        if max_load > 0 {
            for elevator in state.elevators() {
                let aboard: u32 = elevator
                    .loads
                    .iter()
                    .filter_map(|id| state.load(*id))
                    .map(|l| l.weight)
                    .sum();
                prop_assert!(aboard <= max_load);
            }
        }
    }
}
