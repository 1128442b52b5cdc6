use bytestream::BufferPool;
use codec::{CodecError, Tick};
use protocol::memory::{MemoryNetwork, MemoryServer, MemorySocket};
use protocol::{
    ClientEvent, ClientId, ProtocolConfig, ProtocolError, ProtocolSchema, ReplicaClient,
    ReplicaServer, Scheduler, ServerEvent, SideSchema,
};
use replication::ReplicationError;
use schema::{SchemaType, StructType, Value};
use wire::WireError;

type Server = ReplicaServer<MemoryServer>;
type Client = ReplicaClient<MemorySocket>;

fn counter() -> SchemaType {
    SchemaType::structure(StructType::new().field("x", SchemaType::int32())).unwrap()
}

fn x(v: i64) -> Value {
    Value::Struct(vec![Value::Int(v)])
}

fn game_schema() -> ProtocolSchema {
    ProtocolSchema::new(
        SideSchema::new(SchemaType::boolean()).message("input", SchemaType::uint8()),
        SideSchema::new(counter()).message("chat", SchemaType::utf8()),
    )
}

fn roster_schema() -> ProtocolSchema {
    ProtocolSchema::new(
        SideSchema::new(SchemaType::boolean()).message("note", SchemaType::utf8()),
        SideSchema::new(SchemaType::dictionary(SchemaType::uint8()).unwrap())
            .message("chat", SchemaType::utf8()),
    )
}

fn roster(len: i64) -> Value {
    Value::dictionary((0..len).map(|i| (format!("player{i:05}"), Value::Int(i % 256))))
}

struct Harness {
    net: MemoryNetwork,
    server: Server,
    clients: Vec<Client>,
    server_events: Vec<ServerEvent>,
    client_events: Vec<Vec<ClientEvent>>,
}

impl Harness {
    fn new(server_schema: ProtocolSchema, client_schemas: Vec<ProtocolSchema>) -> Self {
        let net = MemoryNetwork::new(Scheduler::new(), BufferPool::new());
        let mut server =
            ReplicaServer::new(net.server(), net.pool().clone(), ProtocolConfig::default());
        server.configure(server_schema).unwrap();
        server.start().unwrap();

        let mut clients = Vec::new();
        for schema in client_schemas {
            let socket = net.socket(server.listener());
            let mut client =
                ReplicaClient::new(socket, net.pool().clone(), ProtocolConfig::default());
            client.configure(schema).unwrap();
            client.open().unwrap();
            clients.push(client);
        }
        let count = clients.len();
        Self {
            net,
            server,
            clients,
            server_events: Vec::new(),
            client_events: vec![Vec::new(); count],
        }
    }

    /// Runs the scheduler and drains every event until nothing moves.
    fn settle(&mut self) {
        loop {
            let ran = self.net.scheduler().run_until_idle();
            let mut seen = 0;
            for (client, events) in self.clients.iter_mut().zip(&mut self.client_events) {
                while let Some(event) = client.poll() {
                    events.push(event);
                    seen += 1;
                }
            }
            while let Some(event) = self.server.poll() {
                self.server_events.push(event);
                seen += 1;
            }
            if ran == 0 && seen == 0 {
                return;
            }
        }
    }

    fn take_server_events(&mut self) -> Vec<ServerEvent> {
        std::mem::take(&mut self.server_events)
    }

    fn take_client_events(&mut self, idx: usize) -> Vec<ClientEvent> {
        std::mem::take(&mut self.client_events[idx])
    }

    fn connected_ids(&self) -> Vec<ClientId> {
        self.server.clients().collect()
    }
}

#[test]
fn end_to_end_zero_window() {
    let mut h = Harness::new(game_schema(), vec![game_schema()]);
    h.settle();
    let events = h.take_server_events();
    assert_eq!(events[0], ServerEvent::Ready);
    let id = h.connected_ids()[0];
    assert!(events.contains(&ServerEvent::Connected(id)));
    assert_eq!(h.take_client_events(0), vec![ClientEvent::Ready]);

    assert_eq!(h.server.state(), Ok(&x(0)));
    let published = h.server.commit(&x(5), false).unwrap();
    assert_eq!(published.tick, Tick::new(1));
    assert_eq!(published.base_tick, Tick::ZERO);
    h.settle();

    assert_eq!(
        h.take_client_events(0),
        vec![ClientEvent::State { tick: Tick::new(1) }]
    );
    assert_eq!(h.clients[0].server_state(), Ok(&x(5)));
    let publisher = h.server.publisher().unwrap();
    assert!(publisher.observers().get(&id).unwrap().contains(Tick::new(1)));

    let published = h.server.commit(&x(6), false).unwrap();
    assert_eq!(published.base_tick, Tick::new(1));
    h.settle();
    h.server.commit(&x(7), false).unwrap();
    h.settle();
    let published = h.server.commit(&x(8), false).unwrap();
    assert_eq!(published.base_tick, Tick::new(3));
    assert!(published.evicted);
    h.settle();

    let publisher = h.server.publisher().unwrap();
    let raw: Vec<u32> = publisher.history().ticks().iter().map(|t| t.raw()).collect();
    assert_eq!(raw, vec![0, 2, 3, 4]);
    // The client trimmed its copy the same way and told the server.
    let observed: Vec<u32> = publisher
        .observers()
        .get(&id)
        .unwrap()
        .ticks()
        .iter()
        .map(|t| t.raw())
        .collect();
    assert_eq!(observed, vec![0, 2, 3, 4]);
    assert_eq!(h.clients[0].server_state(), Ok(&x(8)));
}

#[test]
fn handshake_mismatch_closes_both_sides() {
    let other = ProtocolSchema::new(
        SideSchema::new(SchemaType::int8()),
        SideSchema::new(counter()).message("chat", SchemaType::utf8()),
    );
    let mut h = Harness::new(game_schema(), vec![other]);
    h.settle();

    let client_events = h.take_client_events(0);
    assert_eq!(client_events.len(), 1);
    assert!(matches!(
        &client_events[0],
        ClientEvent::Closed {
            reason: Some(ProtocolError::HandshakeMismatch { .. })
        }
    ));

    let server_events = h.take_server_events();
    assert!(server_events.iter().any(|event| matches!(
        event,
        ServerEvent::Rejected {
            reason: ProtocolError::HandshakeMismatch { .. },
            ..
        }
    )));
    assert!(!server_events
        .iter()
        .any(|event| matches!(event, ServerEvent::Connected(_) | ServerEvent::ClientState { .. })));
    assert!(h.connected_ids().is_empty());

    h.server.commit(&x(1), false).unwrap();
    h.settle();
    assert!(h.take_client_events(0).is_empty());
    assert_eq!(h.clients[0].server_state(), Ok(&x(0)));
}

#[test]
fn mismatch_only_affects_offending_connection() {
    let other = ProtocolSchema::new(
        SideSchema::new(SchemaType::boolean()),
        SideSchema::new(counter()),
    );
    let mut h = Harness::new(game_schema(), vec![game_schema(), other]);
    h.settle();
    assert_eq!(h.connected_ids().len(), 1);
    assert_eq!(h.take_client_events(0), vec![ClientEvent::Ready]);

    h.server.commit(&x(3), false).unwrap();
    h.settle();
    assert_eq!(h.clients[0].server_state(), Ok(&x(3)));
}

#[test]
fn messages_flow_both_ways() {
    let mut h = Harness::new(game_schema(), vec![game_schema(), game_schema()]);
    h.settle();
    h.take_server_events();
    let ids = h.connected_ids();

    h.clients[1].send("input", &Value::Int(7)).unwrap();
    h.settle();
    assert_eq!(
        h.take_server_events(),
        vec![ServerEvent::Message {
            client: ids[1],
            name: "input".into(),
            value: Value::Int(7),
        }]
    );

    h.server.send(ids[0], "chat", &Value::from("hello")).unwrap();
    h.settle();
    h.take_client_events(1);
    assert_eq!(
        h.take_client_events(0),
        vec![
            ClientEvent::Ready,
            ClientEvent::Message {
                name: "chat".into(),
                value: Value::from("hello"),
            }
        ]
    );

    h.server.broadcast("chat", &Value::from("all")).unwrap();
    h.settle();
    for idx in 0..2 {
        assert_eq!(
            h.take_client_events(idx),
            vec![ClientEvent::Message {
                name: "chat".into(),
                value: Value::from("all"),
            }]
        );
    }

    assert_eq!(
        h.server.send(ids[0], "input", &Value::Int(1)),
        Err(ProtocolError::UnknownMessage {
            name: "input".into()
        })
    );
}

#[test]
fn client_state_is_mirrored_on_server() {
    let mut h = Harness::new(game_schema(), vec![game_schema()]);
    h.settle();
    h.take_server_events();
    let id = h.connected_ids()[0];

    let published = h.clients[0].commit(&Value::Bool(true), false).unwrap();
    assert_eq!(published.tick, Tick::new(1));
    h.settle();
    assert_eq!(
        h.take_server_events(),
        vec![ServerEvent::ClientState {
            client: id,
            tick: Tick::new(1),
        }]
    );
    assert_eq!(h.server.client_state(id), Ok(&Value::Bool(true)));
    assert_eq!(h.clients[0].state(), Ok(&Value::Bool(true)));
}

#[test]
fn reliable_commit_advances_base_immediately() {
    let mut h = Harness::new(game_schema(), vec![game_schema()]);
    h.settle();

    let first = h.server.commit(&x(1), true).unwrap();
    let second = h.server.commit(&x(2), true).unwrap();
    assert_eq!(second.base_tick, first.tick);
    h.settle();
    assert_eq!(h.clients[0].server_state(), Ok(&x(2)));
    assert_eq!(h.clients[0].server_tick(), Ok(Tick::new(2)));
}

#[test]
fn unreliable_bursts_keep_only_the_newest() {
    let mut h = Harness::new(game_schema(), vec![game_schema()]);
    h.settle();
    h.take_client_events(0);

    h.server.commit(&x(1), false).unwrap();
    h.server.commit(&x(2), false).unwrap();
    h.settle();
    assert_eq!(
        h.take_client_events(0),
        vec![ClientEvent::State { tick: Tick::new(2) }]
    );
    assert_eq!(h.clients[0].server_state(), Ok(&x(2)));
}

#[test]
fn client_close_disconnects_on_server() {
    let mut h = Harness::new(game_schema(), vec![game_schema()]);
    h.settle();
    h.take_server_events();
    let id = h.connected_ids()[0];

    h.clients[0].close();
    h.clients[0].close();
    h.settle();
    assert_eq!(
        h.take_client_events(0),
        vec![ClientEvent::Ready, ClientEvent::Closed { reason: None }]
    );
    assert_eq!(h.take_server_events(), vec![ServerEvent::Disconnected(id)]);
    assert!(h.server.publisher().unwrap().observers().is_empty());
    assert_eq!(
        h.clients[0].commit(&Value::Bool(true), false),
        Err(ProtocolError::SocketClosed)
    );
}

#[test]
fn server_close_reaches_clients() {
    let mut h = Harness::new(game_schema(), vec![game_schema()]);
    h.settle();
    h.take_client_events(0);
    let id = h.connected_ids()[0];

    h.server.close();
    h.settle();
    let events = h.take_server_events();
    assert_eq!(
        events,
        vec![ServerEvent::Disconnected(id), ServerEvent::Closed]
    );
    assert_eq!(
        h.take_client_events(0),
        vec![ClientEvent::Closed { reason: None }]
    );
}

#[test]
fn steady_state_reuses_pooled_buffers() {
    let mut h = Harness::new(game_schema(), vec![game_schema()]);
    h.settle();
    for v in 0..32 {
        h.server.commit(&x(v), false).unwrap();
        h.settle();
    }
    let stats = h.net.pool().stats();
    assert!(stats.reuses > stats.allocations);
}

#[test]
fn oversized_output_is_refused_and_connection_survives() {
    let mut h = Harness::new(roster_schema(), vec![roster_schema()]);
    h.settle();
    h.take_server_events();
    h.take_client_events(0);

    let err = h.server.commit(&roster(20_000), false).unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::Replication(ReplicationError::Codec(CodecError::LimitsExceeded {
            kind: codec::LimitKind::CollectionLength,
            ..
        }))
    ));
    let err = h.server.commit(&roster(8_000), true).unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::Replication(ReplicationError::Wire(WireError::LimitsExceeded {
            kind: wire::LimitKind::PacketBytes,
            ..
        }))
    ));
    assert_eq!(h.server.tick(), Ok(Tick::ZERO));

    let long = Value::from("x".repeat(40_000));
    assert!(matches!(
        h.server.broadcast("chat", &long),
        Err(ProtocolError::Wire(WireError::LimitsExceeded {
            kind: wire::LimitKind::MessageBytes,
            ..
        }))
    ));
    assert!(matches!(
        h.clients[0].send("note", &long),
        Err(ProtocolError::Wire(WireError::LimitsExceeded {
            kind: wire::LimitKind::MessageBytes,
            ..
        }))
    ));

    h.settle();
    assert!(h.take_server_events().is_empty());
    assert!(h.take_client_events(0).is_empty());
    assert!(h.clients[0].is_connected());

    let published = h.server.commit(&roster(3), false).unwrap();
    assert_eq!(published.tick, Tick::new(1));
    h.settle();
    assert_eq!(
        h.take_client_events(0),
        vec![ClientEvent::State { tick: Tick::new(1) }]
    );
    assert_eq!(h.clients[0].server_state(), Ok(&roster(3)));
}

#[test]
fn failed_reliable_send_drops_the_observer() {
    let mut h = Harness::new(game_schema(), vec![game_schema()]);
    h.settle();
    h.take_server_events();
    let id = h.connected_ids()[0];

    h.clients[0].close();
    let published = h.server.commit(&x(1), true).unwrap();
    assert_eq!(published.tick, Tick::new(1));
    assert!(h.connected_ids().is_empty());
    assert!(h.server.publisher().unwrap().observers().is_empty());

    h.settle();
    assert_eq!(h.take_server_events(), vec![ServerEvent::Disconnected(id)]);
}
