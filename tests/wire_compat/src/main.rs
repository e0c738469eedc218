fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use pteroconsole_protocol::{
        InboundEvent, OutputSource, PowerAction, ResourceSnapshot, ServerLifecycleState,
        WireEvent,
    };

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture file verbatim, as it would arrive in a text frame.
    fn load_frame(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        serde_json::from_str(&load_frame(name))
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    fn decode(name: &str) -> InboundEvent {
        InboundEvent::decode(&load_frame(name))
            .unwrap_or_else(|e| panic!("failed to decode {name}: {e}"))
    }

    /// Normalizes JSON values so that integer-valued floats compare equal.
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => serde_json::json!(f),
                None => v.clone(),
            },
            serde_json::Value::Object(map) => {
                let normalized: serde_json::Map<String, serde_json::Value> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect();
                serde_json::Value::Object(normalized)
            }
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    /// Asserts an outbound event serializes to exactly the captured frame
    /// (order-independent, float-normalized comparison).
    fn assert_encodes_as(event: &WireEvent, name: &str) {
        let fixture = load_fixture(name);
        let encoded: serde_json::Value = serde_json::from_str(&event.encode().unwrap()).unwrap();
        assert_eq!(
            normalize_value(&fixture),
            normalize_value(&encoded),
            "encoding mismatch for {name}:\n  daemon: {fixture}\n  client: {encoded}"
        );
    }

    // --- Inbound frames ---

    #[test]
    fn fixture_auth_success() {
        assert_eq!(decode("auth_success.json"), InboundEvent::AuthSuccess);
    }

    #[test]
    fn fixture_jwt_error() {
        assert_eq!(
            decode("jwt_error.json"),
            InboundEvent::JwtError(Some("jwt: exp claim is invalid".into()))
        );
    }

    #[test]
    fn fixture_token_lifecycle() {
        assert_eq!(decode("token_expiring.json"), InboundEvent::TokenExpiring);
        assert_eq!(decode("token_expired.json"), InboundEvent::TokenExpired);
    }

    #[test]
    fn fixture_stats() {
        let InboundEvent::Stats(snapshot) = decode("stats.json") else {
            panic!("expected stats");
        };
        assert!((snapshot.cpu_absolute - 37.512).abs() < 1e-9);
        assert_eq!(snapshot.memory_bytes, 1_073_741_824);
        assert_eq!(snapshot.memory_limit_bytes, 4_294_967_296);
        assert_eq!(snapshot.disk_bytes, 2_147_483_648);
        assert_eq!(snapshot.uptime, 3_601_000);
        assert_eq!(snapshot.network.rx_bytes, 88_123);
        assert_eq!(snapshot.network.tx_bytes, 104_456);
        assert_eq!(snapshot.lifecycle(), ServerLifecycleState::Running);
    }

    #[test]
    fn fixture_status() {
        assert_eq!(
            decode("status.json"),
            InboundEvent::Status(ServerLifecycleState::Starting)
        );
    }

    #[test]
    fn fixture_console_output() {
        assert_eq!(
            decode("console_output.json"),
            InboundEvent::Output {
                source: OutputSource::Console,
                lines: vec![
                    r#"[12:00:01 INFO]: Done (4.512s)! For help, type "help""#.into(),
                    "[12:00:01 INFO]: Timings Reset".into(),
                ],
            }
        );
    }

    #[test]
    fn fixture_install_output_with_null_line() {
        assert_eq!(
            decode("install_output.json"),
            InboundEvent::Output {
                source: OutputSource::Install,
                lines: vec!["Downloading server jar...".into(), String::new()],
            }
        );
    }

    #[test]
    fn fixture_daemon_message() {
        assert_eq!(
            decode("daemon_message.json"),
            InboundEvent::Output {
                source: OutputSource::Daemon,
                lines: vec!["Server marked as running...".into()],
            }
        );
    }

    #[test]
    fn fixture_install_completed() {
        assert_eq!(decode("install_completed.json"), InboundEvent::InstallCompleted);
    }

    #[test]
    fn fixture_unhandled_event() {
        assert_eq!(
            decode("backup_completed.json"),
            InboundEvent::Unknown("backup completed".into())
        );
    }

    #[test]
    fn fixture_resource_snapshot_roundtrip() {
        let fixture = load_fixture("resource_snapshot.json");
        let parsed: ResourceSnapshot = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize snapshot: {e}"));
        let reserialized = serde_json::to_value(&parsed).unwrap();
        assert_eq!(normalize_value(&fixture), normalize_value(&reserialized));
    }

    // --- Outbound frames ---

    #[test]
    fn fixture_auth() {
        assert_encodes_as(
            &WireEvent::auth("eyJ0eXAiOiJKV1QiLCJhbGciOiJIUzI1NiJ9.e30.sig"),
            "auth.json",
        );
    }

    #[test]
    fn fixture_subscriptions() {
        let [logs, stats] = WireEvent::subscriptions();
        assert_encodes_as(&logs, "send_logs.json");
        assert_encodes_as(&stats, "send_stats.json");
    }

    #[test]
    fn fixture_send_command() {
        assert_encodes_as(&WireEvent::command("say hello world"), "send_command.json");
    }

    #[test]
    fn fixture_set_state() {
        assert_encodes_as(&WireEvent::power(PowerAction::Restart), "set_state.json");
    }
}
