//! Property tests for the wire format: size/encode consistency and
//! decode-of-encode round-trips across randomly generated packets.

use proptest::prelude::*;
use silpipe_codec::{
    ControlCommand, ControlCommandType, Level, LogEntry, LogEntryType, Packet, ProcessFlow,
    ProcessFlowType, ViewerId, Watch, WatchType,
};

fn level_strategy() -> impl Strategy<Value = Level> {
    prop_oneof![
        Just(Level::Debug),
        Just(Level::Verbose),
        Just(Level::Message),
        Just(Level::Warning),
        Just(Level::Error),
        Just(Level::Fatal),
        Just(Level::Control),
    ]
}

fn opt_string() -> impl Strategy<Value = Option<String>> {
    // Empty strings are deliberately excluded: they are the same wire
    // state as None and decode to the canonical None.
    proptest::option::of("[a-zA-Z0-9 /_.:-]{1,40}".prop_map(String::from))
}

fn opt_data() -> impl Strategy<Value = Option<Vec<u8>>> {
    proptest::option::of(proptest::collection::vec(any::<u8>(), 1..200))
}

fn log_entry_strategy() -> impl Strategy<Value = Packet> {
    (
        level_strategy(),
        any::<u64>(),
        prop_oneof![
            Just(LogEntryType::Separator),
            Just(LogEntryType::Message),
            Just(LogEntryType::Warning),
            Just(LogEntryType::Error),
            Just(LogEntryType::Debug),
            Just(LogEntryType::Binary),
        ],
        prop_oneof![
            Just(ViewerId::NoViewer),
            Just(ViewerId::Title),
            Just(ViewerId::Data),
            Just(ViewerId::Binary),
        ],
        opt_string(),
        opt_string(),
        opt_string(),
        opt_string(),
        any::<u32>(),
        any::<u32>(),
        opt_data(),
    )
        .prop_map(
            |(
                level,
                timestamp,
                entry_type,
                viewer_id,
                app_name,
                session_name,
                title,
                host_name,
                correlation_id,
                color,
                data,
            )| {
                Packet::log_entry(
                    level,
                    timestamp,
                    LogEntry {
                        entry_type,
                        viewer_id,
                        app_name,
                        session_name,
                        title,
                        host_name,
                        correlation_id,
                        color,
                        data,
                    },
                )
            },
        )
}

fn watch_strategy() -> impl Strategy<Value = Packet> {
    (
        level_strategy(),
        any::<u64>(),
        "[a-zA-Z0-9_.]{0,30}",
        "[a-zA-Z0-9 _.:-]{0,60}",
        prop_oneof![
            Just(WatchType::Char),
            Just(WatchType::String),
            Just(WatchType::Integer),
            Just(WatchType::Float),
            Just(WatchType::Boolean),
            Just(WatchType::Timestamp),
            Just(WatchType::Object),
        ],
    )
        .prop_map(|(level, timestamp, name, value, watch_type)| {
            Packet::watch(
                level,
                timestamp,
                Watch {
                    name,
                    value,
                    watch_type,
                },
            )
        })
}

fn control_command_strategy() -> impl Strategy<Value = Packet> {
    (
        any::<u64>(),
        prop_oneof![
            Just(ControlCommandType::ClearLog),
            Just(ControlCommandType::ClearWatches),
            Just(ControlCommandType::ClearAll),
        ],
        opt_data(),
    )
        .prop_map(|(timestamp, command_type, data)| {
            Packet::control_command(timestamp, ControlCommand { command_type, data })
        })
}

fn process_flow_strategy() -> impl Strategy<Value = Packet> {
    (
        level_strategy(),
        any::<u64>(),
        prop_oneof![
            Just(ProcessFlowType::EnterMethod),
            Just(ProcessFlowType::LeaveMethod),
            Just(ProcessFlowType::EnterThread),
            Just(ProcessFlowType::LeaveThread),
            Just(ProcessFlowType::EnterProcess),
            Just(ProcessFlowType::LeaveProcess),
        ],
        opt_string(),
        opt_string(),
    )
        .prop_map(|(level, timestamp, flow_type, title, host_name)| {
            Packet::process_flow(
                level,
                timestamp,
                ProcessFlow {
                    flow_type,
                    title,
                    host_name,
                },
            )
        })
}

fn packet_strategy() -> impl Strategy<Value = Packet> {
    prop_oneof![
        log_entry_strategy(),
        watch_strategy(),
        control_command_strategy(),
        process_flow_strategy(),
    ]
}

proptest! {
    #[test]
    fn size_equals_encoded_length(packet in packet_strategy()) {
        prop_assert_eq!(packet.size(), packet.encode().len());
    }

    #[test]
    fn decode_inverts_encode(packet in packet_strategy()) {
        let encoded = packet.encode();
        let (decoded, consumed) = Packet::decode(&encoded).unwrap();
        prop_assert_eq!(consumed, encoded.len());
        prop_assert_eq!(decoded, packet);
    }

    #[test]
    fn decode_never_panics_on_noise(bytes in proptest::collection::vec(any::<u8>(), 0..128)) {
        let _ = Packet::decode(&bytes);
    }

    #[test]
    fn concatenated_packets_roundtrip(packets in proptest::collection::vec(packet_strategy(), 0..8)) {
        let mut stream = Vec::new();
        for packet in &packets {
            packet.encode_into(&mut stream);
        }
        prop_assert_eq!(Packet::decode_all(&stream).unwrap(), packets);
    }
}
