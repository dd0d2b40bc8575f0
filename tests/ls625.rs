//! Protocol-level tests against an in-memory mock supply
//!
//! The mock sits on the far end of a duplex stream, records every raw command line it
//! receives, and answers queries through a caller-supplied reply function. Returning `None`
//! simulates a device that stays silent.

use std::time::Duration;
use tokio::{
    io::{ AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream },
    sync::mpsc,
};
use ls625::{ Ampere, AmpPerSec, CommandError, Limits, Ls625, RampLogger, SupplyState, Volt };

fn magnet_supply<F>(mut respond: F) -> (DuplexStream, mpsc::UnboundedReceiver<String>)
    where F: FnMut(&str) -> Option<String> + Send + 'static
{
    let (controller_side, supply_side) = tokio::io::duplex(512);
    let (sent_cmds, received_cmds) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (read_half, mut write_half) = tokio::io::split(supply_side);
        let mut reader = BufReader::new(read_half);
        let mut line = Vec::new();

        loop {
            line.clear();

            match reader.read_until(b'\n', &mut line).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }

            let raw = String::from_utf8_lossy(&line).into_owned();
            let trimmed = raw.trim_end_matches(|ch| ch == '\r' || ch == '\n').to_string();

            if let Some(reply) = respond(&trimmed) {
                if write_half.write_all(format!("{}\r\n", reply).as_bytes()).await.is_err() {
                    break;
                }
            }

            let _ = sent_cmds.send(raw);
        }
    });

    (controller_side, received_cmds)
}

#[tokio::test]
async fn setters_emit_one_wellformed_line_each()
{
    let (stream, mut cmds) = magnet_supply(|_| None);
    let mut supply = Ls625::with(stream);

    supply.set_target_current(Ampere::from_f64(35.0)).await.unwrap();
    assert_eq!(cmds.recv().await.unwrap(), "SETI 35.0\r\n");

    supply.set_compliance_voltage(Volt::from_f64(2.5)).await.unwrap();
    assert_eq!(cmds.recv().await.unwrap(), "SETV 2.5\r\n");

    supply.set_ramp_rate(AmpPerSec::from_f64(0.0125)).await.unwrap();
    assert_eq!(cmds.recv().await.unwrap(), "RATE 0.0125\r\n");
}

#[tokio::test]
async fn set_max_limits_sends_arguments_in_order()
{
    let (stream, mut cmds) = magnet_supply(|_| None);
    let mut supply = Ls625::with(stream);

    let limits = Limits {
        current: Ampere::from_f64(10.0),
        voltage: Volt::from_f64(5.0),
        rate: AmpPerSec::from_f64(0.1),
    };

    supply.set_max_limits(limits).await.unwrap();

    let raw = cmds.recv().await.unwrap();
    assert_eq!(raw, "LIMIT 10.0, 5.0, 0.1\r\n");

    let args = raw
        .trim_end()
        .strip_prefix("LIMIT ")
        .unwrap()
        .split(", ")
        .map(|token| token.parse::<f64>().unwrap())
        .collect::<Vec<_>>();

    assert_eq!(args, vec![10.0, 5.0, 0.1]);
}

#[tokio::test]
async fn out_of_span_limits_are_refused_without_transmission()
{
    let (stream, mut cmds) = magnet_supply(|_| None);
    let mut supply = Ls625::with(stream);

    let limits = Limits {
        current: Ampere::from_f64(75.0),
        voltage: Volt::from_f64(5.0),
        rate: AmpPerSec::from_f64(0.1),
    };

    assert!(matches!(
        supply.set_max_limits(limits).await,
        Err(CommandError::Range(_)),
    ));

    // a refused setting must never reach the wire
    supply.enable_quench_detection().await.unwrap();
    assert_eq!(cmds.recv().await.unwrap(), "QNCH 1\r\n");
}

#[tokio::test]
async fn quench_enable_is_idempotent_on_the_wire()
{
    let (stream, mut cmds) = magnet_supply(|_| None);
    let mut supply = Ls625::with(stream);

    supply.enable_quench_detection().await.unwrap();
    supply.enable_quench_detection().await.unwrap();

    assert_eq!(cmds.recv().await.unwrap(), "QNCH 1\r\n");
    assert_eq!(cmds.recv().await.unwrap(), "QNCH 1\r\n");

    supply.disable_quench_detection().await.unwrap();
    assert_eq!(cmds.recv().await.unwrap(), "QNCH 0\r\n");
}

#[tokio::test]
async fn queries_parse_plain_and_suffixed_replies()
{
    let (stream, _cmds) = magnet_supply(|cmd| match cmd {
        "RDGV?" => Some("+1.234V".to_string()),
        "RDGI?" => Some("1.234".to_string()),
        "RDGF?" => Some("+4.5000E-01".to_string()),
        _ => None,
    });

    let mut supply = Ls625::with(stream);

    assert_eq!(supply.get_voltage().await.unwrap(), Volt::from_f64(1.234));
    assert_eq!(supply.get_current().await.unwrap(), Ampere::from_f64(1.234));
    assert_eq!(supply.get_field().await.unwrap().as_f64(), 0.45);
}

#[tokio::test]
async fn non_numeric_reply_is_a_reply_error()
{
    let (stream, _cmds) = magnet_supply(|cmd| match cmd {
        "RDGV?" => Some("NO_RESPONSE".to_string()),
        _ => None,
    });

    let mut supply = Ls625::with(stream);

    assert!(matches!(
        supply.get_voltage().await,
        Err(CommandError::Reply(_)),
    ));
}

#[tokio::test]
async fn silent_device_times_out_instead_of_blocking()
{
    let (stream, _cmds) = magnet_supply(|_| None);
    let mut supply = Ls625::with_timeout(stream, Duration::from_millis(50));

    assert!(matches!(
        supply.get_current().await,
        Err(CommandError::Timeout),
    ));

    // the link stays usable for the next command
    supply.stop_ramp().await.unwrap();
}

#[tokio::test]
async fn status_and_structured_queries_decode()
{
    let (stream, _cmds) = magnet_supply(|cmd| match cmd {
        "OPST?" => Some("6".to_string()),
        "LIMIT?" => Some("+60.1000,+5.0000,+0.5000".to_string()),
        "QNCH?" => Some("1,0.5000".to_string()),
        "*IDN?" => Some("LSCI,MODEL625,6250001,1.0".to_string()),
        "BAUD?" => Some("0".to_string()),
        _ => None,
    });

    let mut supply = Ls625::with(stream);

    let status = supply.get_status().await.unwrap();
    assert_eq!(status.state(), SupplyState::Holding);
    assert!(status.ramp_done());

    let limits = supply.get_max_limits().await.unwrap();
    assert_eq!(limits.current, Ampere::from_f64(60.1));
    assert_eq!(limits.voltage, Volt::from_f64(5.0));
    assert_eq!(limits.rate, AmpPerSec::from_f64(0.5));

    let quench = supply.get_quench_detection().await.unwrap();
    assert!(quench.enabled);
    assert_eq!(quench.step_limit, AmpPerSec::from_f64(0.5));

    assert_eq!(supply.identification().await.unwrap(), "LSCI,MODEL625,6250001,1.0");
    assert_eq!(supply.baud_rate().await.unwrap().bits_per_sec(), 9600);
}

#[tokio::test]
async fn raw_command_reads_a_reply_only_for_queries()
{
    let (stream, mut cmds) = magnet_supply(|cmd| match cmd {
        "XPGM?" => Some("1".to_string()),
        _ => None,
    });

    let mut supply = Ls625::with(stream);

    assert_eq!(supply.raw_command("XPGM?").await.unwrap(), Some("1".to_string()));
    assert_eq!(cmds.recv().await.unwrap(), "XPGM?\r\n");

    assert_eq!(supply.raw_command("XPGM 1").await.unwrap(), None);
    assert_eq!(cmds.recv().await.unwrap(), "XPGM 1\r\n");
}

fn steady_replies(cmd: &str) -> Option<String>
{
    match cmd {
        "RATE?" => Some("+0.0100".to_string()),
        "RDGI?" => Some("+12.5000".to_string()),
        "RDGV?" => Some("+0.1250".to_string()),
        "RDGF?" => Some("+4.5000E-01".to_string()),
        _ => None,
    }
}

#[tokio::test]
async fn logger_appends_one_record_per_tick()
{
    let (stream, _cmds) = magnet_supply(steady_replies);
    let supply = Ls625::with(stream);

    let dir = std::env::temp_dir().join(format!("ls625-log-ticks-{}", std::process::id()));
    let mut logger = RampLogger::create(supply, &dir).unwrap();

    let mut timestamps = Vec::new();

    for _ in 0..5 {
        let record = logger.sample().await.unwrap();

        assert!(record.is_complete());
        assert_eq!(record.ramp_rate.unwrap(), AmpPerSec::from_f64(0.01));
        assert_eq!(record.current.unwrap(), Ampere::from_f64(12.5));
        assert_eq!(record.voltage.unwrap(), Volt::from_f64(0.125));
        assert_eq!(record.field.unwrap().as_f64(), 0.45);

        timestamps.push(record.timestamp);
    }

    assert!(timestamps.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(logger.records(), 5);

    let contents = std::fs::read_to_string(logger.path()).unwrap();
    let lines = contents.lines().collect::<Vec<_>>();

    assert_eq!(lines.len(), 6);
    assert!(lines[0].starts_with("timestamp,"));
    assert!(lines[1].contains(",12.5000,"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn logger_survives_a_failed_query_mid_session()
{
    let mut current_queries = 0u32;

    let (stream, _cmds) = magnet_supply(move |cmd| {
        if cmd == "RDGI?" {
            current_queries += 1;

            // second tick: the supply goes silent on this one query
            if current_queries == 2 {
                return None;
            }
        }

        steady_replies(cmd)
    });

    let supply = Ls625::with_timeout(stream, Duration::from_millis(50));

    let dir = std::env::temp_dir().join(format!("ls625-log-fail-{}", std::process::id()));
    let mut logger = RampLogger::create(supply, &dir).unwrap();

    let mut records = Vec::new();

    for _ in 0..3 {
        records.push(logger.sample().await.unwrap());
    }

    assert!(records[0].is_complete());
    assert!(!records[1].is_complete());
    assert!(records[1].current.is_none());
    assert!(records[1].voltage.is_some());
    assert!(records[2].is_complete());

    let contents = std::fs::read_to_string(logger.path()).unwrap();
    let lines = contents.lines().collect::<Vec<_>>();

    assert_eq!(lines.len(), 4);

    // the failed reading leaves its column blank, the rest of the row survives
    let failed_row = lines[2].split(',').collect::<Vec<_>>();
    assert_eq!(failed_row.len(), 6);
    assert_eq!(failed_row[3], "");
    assert_eq!(failed_row[4], "0.1250");

    let _ = std::fs::remove_dir_all(&dir);
}
