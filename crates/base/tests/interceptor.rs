//! Interceptor preflight and demux routing, without touching system state.

use std::collections::HashMap;
use std::time::Duration;

use weaver_ability::{pipe, AbilityHandle, Message, ParamValue, Params};
use weaver_registry::ModuleFactory;

fn base_factory() -> std::sync::Arc<ModuleFactory> {
    let factory = ModuleFactory::new();
    factory.install(weaver_base::package());
    factory
}

fn get(factory: &std::sync::Arc<ModuleFactory>, name: &str) -> AbilityHandle {
    factory
        .get_ability("base", name, &HashMap::new())
        .unwrap()
        .expect("exported by base")
}

#[tokio::test]
async fn preflight_rejects_ports_without_protocol() {
    let factory = base_factory();
    let mut mitm = get(&factory, "Message Interceptor");
    mitm.set_opt("interface", "lo").unwrap();
    mitm.set_opt("port_dst", 53i64).unwrap();

    // The run refuses before creating any bridge, capture or firewall
    // state, and reports no result.
    mitm.start().await.unwrap();
    assert!(mitm.join(Some(Duration::from_secs(2))).await);
    assert_eq!(mitm.result(), None);
}

#[tokio::test]
async fn preflight_rejects_missing_input_interface() {
    let factory = base_factory();
    let mut mitm = get(&factory, "Message Interceptor");
    mitm.start().await.unwrap();
    assert!(mitm.join(Some(Duration::from_secs(2))).await);
    assert_eq!(mitm.result(), None);
}

#[tokio::test]
async fn preflight_rejects_mux_without_outerface() {
    let factory = base_factory();
    let mut mitm = get(&factory, "Message Interceptor");
    mitm.set_opt("interface", "lo").unwrap();
    mitm.set_opt("mux", true).unwrap();
    mitm.start().await.unwrap();
    assert!(mitm.join(Some(Duration::from_secs(2))).await);
    assert_eq!(mitm.result(), None);
}

#[tokio::test]
async fn demux_routes_by_token_and_strips_it() {
    let factory = base_factory();
    let mut demux = get(&factory, "Demux");
    demux.set_opt("quiet", false).unwrap();

    let (feed, feed_reader) = pipe();
    demux.add_in_pipe(feed_reader);

    let (to_a, mut from_a) = pipe();
    let (to_b, mut from_b) = pipe();
    let routes = HashMap::from([(0x00u8, to_a), (0xFFu8, to_b)]);
    demux
        .start_with_params(Params::from([(
            "demux".to_string(),
            ParamValue::PipeMap(routes),
        )]))
        .await
        .unwrap();

    feed.send(Message::from_static(b"\x00X")).unwrap();
    feed.send(Message::from_static(b"\xffY")).unwrap();
    // An unknown token is logged (quiet=false) and otherwise dropped.
    feed.send(Message::from_static(b"\x7eZ")).unwrap();
    feed.close();

    demux.join(Some(Duration::from_secs(2))).await;

    assert_eq!(from_a.try_recv(), Some(Message::from_static(b"X")));
    assert_eq!(from_b.try_recv(), Some(Message::from_static(b"Y")));
    assert_eq!(from_a.try_recv(), None);
    assert_eq!(from_b.try_recv(), None);
}

#[test]
fn classic_names_cover_the_interceptor_dependencies() {
    let factory = base_factory();
    for short in ["capture", "sendraw", "netfilter", "demux", "mitm"] {
        let target = weaver_ability::classic_target(short).expect("classic entry");
        assert_eq!(target.package, "base");
        assert!(factory
            .get_ability("base", &target.ability, &HashMap::new())
            .unwrap()
            .is_some());
    }
}
