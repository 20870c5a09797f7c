// Text command surface, exercised through the dispatcher and over UDP

mod common;

use std::sync::Arc;
use std::time::Duration;

use ampsense::net::serve_commands;
use ampsense::protocol::execute;
use ampsense::{AppContext, ShutdownSignal};
use tokio::net::UdpSocket;

use common::{rig, rig_with, without_auto_cal};

async fn send(ctx: &Arc<AppContext>, raw: &str) -> String {
    execute(ctx, raw).await.to_string()
}

fn field(response: &str, key: &str) -> f32 {
    let start = response
        .find(key)
        .unwrap_or_else(|| panic!("{} missing in {}", key, response))
        + key.len();
    response[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect::<String>()
        .parse()
        .unwrap()
}

#[tokio::test]
async fn test_ping_and_unknown_command() {
    let rig = rig();
    assert_eq!(send(&rig.ctx, "PING").await, "PONG:ESP32_READY,AUTO_CAL_ENABLED");
    assert_eq!(send(&rig.ctx, "FOO").await, "ERROR:UNKNOWN_COMMAND:FOO");
    assert_eq!(
        send(&rig.ctx, "ZERO_CALIBRATE").await,
        "ERROR:UNKNOWN_COMMAND:ZERO_CALIBRATE"
    );
}

#[tokio::test]
async fn test_zero_cal_and_alias() {
    let rig = rig();
    rig.sensor.set_bias_voltage(1.0);

    let response = send(&rig.ctx, "ZERO_CAL").await;
    assert!(response.starts_with("ZERO_CAL:SUCCESS,BIAS=1.000"), "{}", response);

    let response = send(&rig.ctx, "RECALIBRATE_BIAS").await;
    assert!(response.starts_with("ZERO_CAL:SUCCESS,BIAS=1.000"), "{}", response);
}

#[tokio::test]
async fn test_scale_cal_success_and_errors() {
    let rig = rig();
    send(&rig.ctx, "ZERO_CAL").await;

    assert_eq!(
        send(&rig.ctx, "SCALE_CAL:5").await,
        "SCALE_CAL:ERROR,INSUFFICIENT_SAMPLES"
    );
    assert_eq!(
        send(&rig.ctx, "SCALE_CAL:500").await,
        "SCALE_CAL:ERROR,INVALID_RANGE"
    );
    assert_eq!(
        send(&rig.ctx, "SCALE_CAL:abc").await,
        "SCALE_CAL:ERROR,INVALID_FORMAT"
    );

    rig.sensor.set_load_amps(5.0);
    let response = send(&rig.ctx, "SCALE_CAL:5").await;
    assert!(response.starts_with("SCALE_CAL:SUCCESS,SCALE="), "{}", response);
    let scale = field(&response, "SCALE=");
    assert!((scale - 200.0).abs() < 10.0, "{}", response);

    let response = send(&rig.ctx, "CAL_KNOWN:5").await;
    assert!(response.starts_with("CAL_KNOWN:SUCCESS,SCALE="), "{}", response);
    let response = send(&rig.ctx, "CALIBRATE:5").await;
    assert!(response.starts_with("CALIBRATE:SUCCESS,SCALE="), "{}", response);
}

#[tokio::test]
async fn test_manual_cal_and_reset() {
    let rig = rig();
    assert_eq!(
        send(&rig.ctx, "MANUAL_CAL:1.6,180").await,
        "MANUAL_CAL:SUCCESS,BIAS=1.6000,SCALE=180.00"
    );
    assert_eq!(
        send(&rig.ctx, "MANUAL_CAL:1.6").await,
        "MANUAL_CAL:ERROR,INVALID_FORMAT"
    );
    assert_eq!(
        send(&rig.ctx, "MANUAL_CAL:5.0,180").await,
        "MANUAL_CAL:ERROR,INVALID_RANGE"
    );
    assert_eq!(
        send(&rig.ctx, "MANUAL_CAL:1.6,-1").await,
        "MANUAL_CAL:ERROR,INVALID_RANGE"
    );
    // Rejected writes leave the accepted pair in place
    assert!(send(&rig.ctx, "CAL_STATUS")
        .await
        .starts_with("CAL_STATUS:BIAS_V=1.6000,SCALE=180.00"));

    for _ in 0..2 {
        assert_eq!(
            send(&rig.ctx, "RESET_CAL").await,
            "RESET_CAL:SUCCESS,BIAS=1.6500,SCALE=200.00"
        );
    }
}

#[tokio::test]
async fn test_cal_status_and_config() {
    let rig = rig();
    assert_eq!(
        send(&rig.ctx, "CAL_STATUS").await,
        "CAL_STATUS:BIAS_V=1.6500,SCALE=200.00,AUTO_CAL=ON,AUTO_DET=ON,LOAD=0.000,LEARNING_PTS=0"
    );
    assert_eq!(
        send(&rig.ctx, "GET_CONFIG").await,
        "CONFIG:AUTO_CAL=ON,AUTO_DET=ON,LEARNING=ON,DEVICE_RECOG=ON,SENSITIVITY=0.70"
    );
    assert_eq!(
        send(&rig.ctx, "SCT_INFO").await,
        "SCT_INFO:THEORETICAL=200.0A/V,CURRENT_SCALE=200.00A/V,BIAS=1.6500V,BURDEN=10.0OHM,RATIO=2000:1"
    );
    assert_eq!(
        send(&rig.ctx, "SYSTEM_STATUS").await,
        "SYSTEM_STATUS:UPTIME=1s,AUTO_CAL=ON,AUTO_DET=ON,CAL_COUNT=0,UDP_RUNNING=NO"
    );
    assert_eq!(
        send(&rig.ctx, "AUTO_CAL_STATUS").await,
        "AUTO_CAL_STATUS:AUTO_CAL_STATS:ENABLED=YES,COUNT=0,UPTIME=0h,SUCCESS=0,FAILED=0,LEARNING_PTS=0,SENSITIVITY=0.70"
    );
}

#[tokio::test]
async fn test_auto_cal_toggle() {
    let rig = rig();
    assert_eq!(send(&rig.ctx, "AUTO_CAL_ON").await, "AUTO_CAL_ON:SUCCESS");
    assert!(rig.ctx.controller_running());

    assert_eq!(send(&rig.ctx, "AUTO_CAL_OFF").await, "AUTO_CAL_OFF:SUCCESS");
    assert!(send(&rig.ctx, "CAL_STATUS").await.contains("AUTO_CAL=OFF"));
    assert_eq!(send(&rig.ctx, "PING").await, "PONG:ESP32_READY,AUTO_CAL_DISABLED");

    tokio::time::timeout(Duration::from_secs(1), rig.ctx.shutdown())
        .await
        .expect("controller did not stop");
}

#[tokio::test]
async fn test_sensitivity_and_learning_rate() {
    let rig = rig();
    assert_eq!(
        send(&rig.ctx, "AUTO_CAL_SENSITIVITY:0.75").await,
        "AUTO_CAL_SENSITIVITY:SUCCESS,VALUE=0.75"
    );
    assert_eq!(
        send(&rig.ctx, "AUTO_CAL_SENSITIVITY:1.5").await,
        "AUTO_CAL_SENSITIVITY:ERROR,INVALID_RANGE"
    );
    assert_eq!(
        send(&rig.ctx, "AUTO_CAL_SENSITIVITY:abc").await,
        "AUTO_CAL_SENSITIVITY:ERROR,INVALID_FORMAT"
    );
    assert_eq!(
        send(&rig.ctx, "AUTO_CAL_LEARNING_RATE:0.2").await,
        "LEARNING_RATE:SUCCESS,VALUE=0.20"
    );
    assert_eq!(
        send(&rig.ctx, "AUTO_CAL_LEARNING_RATE:2").await,
        "LEARNING_RATE:ERROR,INVALID_RANGE"
    );
    assert_eq!(
        send(&rig.ctx, "LEARNING_STATS").await,
        "LEARNING_STATS:POINTS=0,RATE=0.20,MAX_POINTS=50"
    );
}

#[tokio::test]
async fn test_device_recognition_commands() {
    let rig = rig();

    let listing = send(&rig.ctx, "LIST_DEVICES").await;
    assert!(listing.starts_with(
        "DEVICE_LIST:Known devices:\n  60W Incandescent Bulb: 0.4-0.7A (typ: 0.5A)\n"
    ));
    assert!(listing.contains("  Laptop/Monitor: 2.0-4.0A (typ: 3.0A)\n"));

    assert_eq!(
        send(&rig.ctx, "RECOGNIZE_CURRENT:5.0").await,
        "DEVICE_RECOGNIZED:NAME=Hair Dryer Low Setting,TYPICAL=5.00A,RANGE=4.00-6.00A"
    );
    // Overlapping ranges resolve to the first catalog entry
    assert_eq!(
        send(&rig.ctx, "RECOGNIZE_CURRENT:11").await,
        "DEVICE_RECOGNIZED:NAME=Hair Dryer High Setting,TYPICAL=12.50A,RANGE=10.00-15.00A"
    );
    assert_eq!(
        send(&rig.ctx, "RECOGNIZE_CURRENT:0.05").await,
        "DEVICE_RECOGNIZED:NAME=Phone Charger/Standby,TYPICAL=0.05A,RANGE=0.02-0.10A"
    );
    assert_eq!(
        send(&rig.ctx, "RECOGNIZE_CURRENT:50").await,
        "DEVICE_RECOGNIZED:NONE"
    );

    assert_eq!(
        send(&rig.ctx, "ADD_DEVICE:20,30,25,EV Charger").await,
        "ADD_DEVICE:SUCCESS,NAME=EV Charger"
    );
    assert_eq!(
        send(&rig.ctx, "ADD_DEVICE:30,20,25,Broken").await,
        "ADD_DEVICE:ERROR,INVALID_RANGE"
    );
    assert_eq!(
        send(&rig.ctx, "RECOGNIZE_CURRENT:25").await,
        "DEVICE_RECOGNIZED:NAME=EV Charger,TYPICAL=25.00A,RANGE=20.00-30.00A"
    );
}

#[tokio::test]
async fn test_auto_recognize_uses_detected_load() {
    let rig = rig();
    send(&rig.ctx, "ZERO_CAL").await;
    rig.sensor.set_load_amps(5.0);
    rig.measure(1).await;

    let response = send(&rig.ctx, "AUTO_RECOGNIZE").await;
    assert!(
        response.starts_with("AUTO_RECOGNIZE:PROCESSED,CURRENT="),
        "{}",
        response
    );
    assert!((field(&response, "CURRENT=") - 5.0).abs() < 0.25);
    assert!(send(&rig.ctx, "AUTO_CAL_STATUS").await.contains("SUCCESS=1"));
}

#[tokio::test]
async fn test_learning_commands() {
    let rig = rig();
    assert_eq!(
        send(&rig.ctx, "APPLY_LEARNING").await,
        "APPLY_LEARNING:ERROR,NOT_ENOUGH_POINTS"
    );

    send(&rig.ctx, "ZERO_CAL").await;
    rig.sensor.set_load_amps(5.0);
    send(&rig.ctx, "SCALE_CAL:5").await;
    assert!(send(&rig.ctx, "LEARNING_STATS")
        .await
        .starts_with("LEARNING_STATS:POINTS=1,"));

    assert_eq!(send(&rig.ctx, "RESET_LEARNING").await, "RESET_LEARNING:SUCCESS");
    assert!(send(&rig.ctx, "LEARNING_STATS")
        .await
        .starts_with("LEARNING_STATS:POINTS=0,"));
}

#[tokio::test]
async fn test_detection_and_measurement_diagnostics() {
    let rig = rig();
    assert_eq!(
        send(&rig.ctx, "MEASUREMENT_STATS").await,
        "MEASUREMENT_STATS:MEASUREMENTS=0,AVG_CURRENT=0.000,MIN_CURRENT=0.000,MAX_CURRENT=0.000,LAST_VRMS=0.000000"
    );
    assert_eq!(
        send(&rig.ctx, "BUFFER_ANALYSIS").await,
        "BUFFER_ANALYSIS:BUFFER_ANALYSIS=NOT_READY"
    );

    send(&rig.ctx, "ZERO_CAL").await;
    rig.sensor.set_load_amps(5.0);

    let response = send(&rig.ctx, "AUTO_DETECT").await;
    assert!(response.starts_with("AUTO_DETECT:SUCCESS,CURRENT="), "{}", response);
    let detected = field(&response, "CURRENT=");
    assert!(detected > 3.5 && detected < 5.5, "{}", response);

    rig.measure(2).await;
    let stats = send(&rig.ctx, "MEASUREMENT_STATS").await;
    assert!(stats.starts_with("MEASUREMENT_STATS:MEASUREMENTS=2,"), "{}", stats);
    assert!((field(&stats, "AVG_CURRENT=") - 5.0).abs() < 0.25);

    let analysis = send(&rig.ctx, "BUFFER_ANALYSIS").await;
    assert!(analysis.starts_with("BUFFER_ANALYSIS:BUFFER_ANALYSIS=READY,MEAN="));

    let current = send(&rig.ctx, "GET_CURRENT").await;
    assert!(current.starts_with("CURRENT:INSTANT="), "{}", current);
    assert!((field(&current, "DETECTED=") - 5.0).abs() < 0.25);

    assert_eq!(send(&rig.ctx, "RESET_STATS").await, "RESET_STATS:SUCCESS");
    assert!(send(&rig.ctx, "MEASUREMENT_STATS")
        .await
        .starts_with("MEASUREMENT_STATS:MEASUREMENTS=0,"));
}

#[tokio::test]
async fn test_auto_detect_toggle() {
    let rig = rig_with(without_auto_cal(), None);
    assert_eq!(send(&rig.ctx, "AUTO_DETECT_OFF").await, "AUTO_DETECT_OFF:SUCCESS");
    assert!(send(&rig.ctx, "GET_CONFIG").await.contains("AUTO_DET=OFF"));
    assert_eq!(send(&rig.ctx, "AUTO_DETECT_ON").await, "AUTO_DETECT_ON:SUCCESS");
    assert!(send(&rig.ctx, "GET_CONFIG")
        .await
        .starts_with("CONFIG:AUTO_CAL=OFF,AUTO_DET=ON"));
}

#[tokio::test]
async fn test_set_bias_and_scale_ranges() {
    let rig = rig();
    assert_eq!(send(&rig.ctx, "SET_BIAS:1.6").await, "SET_BIAS:SUCCESS,VALUE=1.6000");
    assert_eq!(send(&rig.ctx, "SET_BIAS:3.2").await, "SET_BIAS:ERROR,INVALID_RANGE");
    assert_eq!(send(&rig.ctx, "SET_SCALE:150").await, "SET_SCALE:SUCCESS,VALUE=150.00");
    assert_eq!(send(&rig.ctx, "SET_SCALE:0.5").await, "SET_SCALE:ERROR,INVALID_RANGE");
    assert!(send(&rig.ctx, "CAL_STATUS")
        .await
        .starts_with("CAL_STATUS:BIAS_V=1.6000,SCALE=150.00"));
}

#[tokio::test]
async fn test_relay_commands() {
    let rig = rig();
    assert_eq!(send(&rig.ctx, "RELAY_ON").await, "RELAY_ON:SUCCESS");
    assert!(rig.ctx.relay_state());
    assert_eq!(send(&rig.ctx, "RELAY_TOGGLE").await, "RELAY_TOGGLE:SUCCESS,STATE=OFF");
    assert_eq!(send(&rig.ctx, "RELAY_TOGGLE").await, "RELAY_TOGGLE:SUCCESS,STATE=ON");
    assert_eq!(send(&rig.ctx, "RELAY_OFF").await, "RELAY_OFF:SUCCESS");
    assert!(!rig.ctx.relay_state());
}

#[tokio::test]
async fn test_help_lists_commands() {
    let rig = rig();
    let help = send(&rig.ctx, "HELP").await;
    assert!(help.starts_with("HELP:Commands available - ZERO_CAL"));
    assert!(help.contains("MANUAL_CAL:bias,scale"));
}

#[tokio::test]
async fn test_commands_over_udp() {
    let rig = rig();
    let server_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let server_addr = server_socket.local_addr().unwrap();
    let signal = ShutdownSignal::new();
    let server = tokio::spawn(serve_commands(
        Arc::clone(&rig.ctx),
        server_socket,
        signal.clone(),
    ));

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut buf = [0u8; 1024];
    for (command, expected) in [
        ("PING", "PONG:ESP32_READY,AUTO_CAL_ENABLED"),
        ("BOGUS\n", "ERROR:UNKNOWN_COMMAND:BOGUS"),
        ("SET_SCALE:150", "SET_SCALE:SUCCESS,VALUE=150.00"),
    ] {
        client.send_to(command.as_bytes(), server_addr).await.unwrap();
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .expect("no response")
            .unwrap();
        assert_eq!(std::str::from_utf8(&buf[..len]).unwrap(), expected);
    }

    signal.trigger();
    tokio::time::timeout(Duration::from_secs(1), server)
        .await
        .expect("server did not stop")
        .unwrap();
}
