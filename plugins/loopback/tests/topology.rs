//! End-to-end tests: topology assembly and message flow over the loopback
//! transport.

use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::timeout;

use plugin_loopback::{LoopbackBolt, LoopbackBroker, LoopbackConfigurator, LoopbackSpout};
use sensorlink::channel::error::{ConsumeError, ProduceError};
use sensorlink::message::SensorMessage;
use sensorlink::sensor::{Configurator, SiteContext};
use sensorlink::topology::registry::{Bolt, BuildRequest, BuilderRegistry, Spout};
use sensorlink::topology::{AssemblyError, TopologyAssembler};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn conf(s: &str) -> toml::Table {
    toml::Table::from_str(s).unwrap()
}

fn registry(broker: &LoopbackBroker) -> BuilderRegistry {
    let mut registry = BuilderRegistry::new();
    plugin_loopback::register(&mut registry, broker);
    registry
}

fn build_request<'a>(channel: &'a str, fields: &'a [String], properties: &'a toml::Table) -> BuildRequest<'a> {
    BuildRequest {
        sensor: "s1",
        channel,
        fields,
        message_builder: "identity",
        properties: Some(properties),
        coordination: "zk-1:2181",
    }
}

#[tokio::test]
async fn assembles_a_loopback_topology() {
    let broker = LoopbackBroker::new();
    let registry = registry(&broker);
    let config = conf(
        r#"
        [coordination]
        connect = "zk-1:2181"

        [spouts.reader]
        channel = "readings"
        sensor = "s1"
        fields = ["time", "value"]
        builder = "identity"
        broker = "loopback"
        [spouts.reader.properties]
        queueName = "q-readings"

        [bolts.writer]
        channel = "commands"
        sensor = "s1"
        fields = []
        builder = "timestamp"
        broker = "loopback"
        [bolts.writer.properties]
        queueName = "q-commands"
        "#,
    );

    let mut components = TopologyAssembler::new(&registry).assemble(&config).unwrap();
    assert_eq!(components.len(), 2);

    // the handles are fully initialized: they open without error
    let rt = tokio::runtime::Handle::current();
    let spout = components.spout_mut("reader").unwrap();
    assert_eq!(spout.fields(), ["time", "value"]);
    spout.open(&rt).unwrap();
    spout.close();
    let bolt = components.bolt_mut("writer").unwrap();
    bolt.open(&rt).unwrap();
    bolt.close();
}

#[tokio::test]
async fn assembly_rejects_a_missing_queue_name() {
    let broker = LoopbackBroker::new();
    let registry = registry(&broker);
    let config = conf(
        r#"
        [coordination]
        connect = "zk-1:2181"

        [spouts.reader]
        channel = "readings"
        sensor = "s1"
        fields = []
        builder = "identity"
        broker = "loopback"
        "#,
    );

    let err = TopologyAssembler::new(&registry).assemble(&config).unwrap_err();
    assert!(matches!(err, AssemblyError::Build { ref node, .. } if node == "reader"));
}

#[tokio::test]
async fn messages_flow_from_bolt_to_spout() {
    init_logs();
    let broker = LoopbackBroker::new();
    let fields = vec!["value".to_owned()];
    let mut properties = toml::Table::new();
    properties.insert("queueName".to_owned(), toml::Value::String("q-shared".to_owned()));

    let mut spout = LoopbackSpout::build(&broker, &build_request("reader", &fields, &properties)).unwrap();
    let mut bolt = LoopbackBolt::build(&broker, &build_request("writer", &fields, &properties)).unwrap();

    let rt = tokio::runtime::Handle::current();
    spout.open(&rt).unwrap();
    bolt.open(&rt).unwrap();
    let mut output = spout.take_output().unwrap();

    for i in 0..3 {
        bolt.emit(&SensorMessage::new(format!("reading-{i}"))).await.unwrap();
    }

    for i in 0..3 {
        let msg = timeout(Duration::from_secs(5), output.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("spout output closed early");
        assert_eq!(msg.text(), format!("reading-{i}"));
    }

    bolt.close();
    spout.close();
}

#[tokio::test]
async fn configured_sensor_runs_a_send_and_a_receive_loop() {
    init_logs();
    let broker = LoopbackBroker::new();
    let configurator = LoopbackConfigurator::new(&broker);
    // the sensor sends to the same queue it receives from
    let mut context = configurator
        .configure(
            &SiteContext::new("local-1"),
            &conf(
                r#"
                send_queue = "perf"
                recv_queue = "perf"
                send_interval = 1
                "#,
            ),
        )
        .unwrap();

    let interval = context
        .property("send_interval")
        .and_then(toml::Value::as_integer)
        .unwrap() as u64;
    let rt = tokio::runtime::Handle::current();

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let receiver = context.channel_mut("loopback", "receiver").unwrap();
    receiver.open().unwrap();
    receiver
        .start_receive_loop(
            Box::new(move |msg: SensorMessage| -> Result<(), ConsumeError> {
                sink.lock().unwrap().push(msg.into_text());
                Ok(())
            }),
            &rt,
        )
        .unwrap();

    let sender = context.channel_mut("loopback", "sender").unwrap();
    sender.open().unwrap();
    sender
        .start_send_loop(
            Box::new(|| -> Result<Option<SensorMessage>, ProduceError> {
                Ok(Some(SensorMessage::new("measurement")))
            }),
            Duration::from_millis(interval),
            &rt,
        )
        .unwrap();

    // wait until at least one message went around the loop
    timeout(Duration::from_secs(5), async {
        loop {
            if !received.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("no message went around the loopback");

    context.close_all();

    // the sender channel uses the timestamp converter
    let received = received.lock().unwrap();
    let (prefix, body) = received[0].split_once("\r\n").expect("missing timestamp separator");
    assert_eq!(body, "measurement");
    let _ts: u128 = prefix.parse().expect("timestamp prefix should be an integer");
}

#[test]
fn unknown_message_builder_key_fails_the_build() {
    let broker = LoopbackBroker::new();
    let fields: Vec<String> = Vec::new();
    let mut properties = toml::Table::new();
    properties.insert("queueName".to_owned(), toml::Value::String("q".to_owned()));
    let mut req = build_request("reader", &fields, &properties);
    req.message_builder = "protobuf";

    let err = LoopbackSpout::build(&broker, &req).unwrap_err();
    assert!(err.to_string().contains("protobuf"));
}
