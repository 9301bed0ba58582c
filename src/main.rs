//! Sensor node firmware: main entry point.
//!
//! One wake cycle per boot: measure, decide, publish if needed, deep
//! sleep.  In development mode (`sleep_time_secs <= 0`) the cycle repeats
//! in place with a busy wait instead.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  ModelBus          WifiAdapter     MqttAdapter    NvsAdapter   │
//! │  (SensorBus)       (NetworkPort)   (PubSubPort)   (Storage)    │
//! │  SleepAdapter      Watchdog        ClockAdapter   LogEventSink │
//! │  (SleepPort)       (LivenessPort)  (ClockPort)    (EventSink)  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              NodeService (pure logic)                  │    │
//! │  │  policy · discovery · publish sequencer · power        │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use anyhow::Result;
use log::{error, info};

use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{
        delay::Ets,
        gpio::{AnyIOPin, InputOutput, PinDriver, Pull},
        prelude::Peripherals,
    },
    wifi::{BlockingWifi, EspWifi},
};

use sensornode::adapters::device_id;
use sensornode::adapters::log_sink::LogEventSink;
use sensornode::adapters::mqtt::MqttAdapter;
use sensornode::adapters::nvs::NvsAdapter;
use sensornode::adapters::sleep::SleepAdapter;
use sensornode::adapters::time::ClockAdapter;
use sensornode::adapters::wifi::WifiAdapter;
use sensornode::app::context::NodeContext;
use sensornode::app::events::AppEvent;
use sensornode::app::ports::{EventSink, SleepPort};
use sensornode::app::service::{NodePorts, NodeService};
use sensornode::config::NodeConfig;
use sensornode::drivers::watchdog::Watchdog;
use sensornode::power::PowerCycleController;
use sensornode::sensors::ModelBus;

/// Build-time node configuration.
const NODE_CONFIG: &str = include_str!("../node_config.json");

type SensorLine = PinDriver<'static, AnyIOPin, InputOutput>;

/// Sensor line and radio, the peripherals whose bring-up can fail.
struct Hardware {
    bus: ModelBus<SensorLine, Ets>,
    wifi: BlockingWifi<EspWifi<'static>>,
}

fn init_hardware(ctx: &NodeContext) -> Result<Hardware> {
    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;

    // SAFETY: the pin number was range-checked by `NodeContext::new` and
    // nothing else in the firmware drives this GPIO.
    let pin = unsafe { AnyIOPin::new(i32::from(ctx.registry.pin())) };
    let mut line = PinDriver::input_output_od(pin)?;
    line.set_pull(Pull::Up)?;
    let bus = ModelBus::new(ctx.registry.model(), line, Ets);

    let wifi = BlockingWifi::wrap(
        EspWifi::new(peripherals.modem, sys_loop.clone(), None)?,
        sys_loop,
    )?;
    Ok(Hardware { bus, wifi })
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  sensornode v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Identity + context ─────────────────────────────────
    let id = device_id::device_id(&device_id::read_mac());
    info!("Device id: {id}");

    let ctx = match NodeConfig::from_json(NODE_CONFIG).and_then(|c| NodeContext::new(c, &id)) {
        Ok(ctx) => ctx,
        Err(e) => {
            // Nothing sensible can run; sleep with no wake source until reset.
            error!("Config rejected: {e}, halting");
            SleepAdapter::new().enter_low_power();
            return Ok(());
        }
    };
    info!(
        "Node '{}': {} on GPIO{}, {} capability(ies)",
        ctx.identity.name,
        ctx.registry.model().name(),
        ctx.registry.pin(),
        ctx.registry.kinds().len()
    );

    // ── 3. Peripherals ────────────────────────────────────────
    let mut watchdog = Watchdog::new(ctx.config.watchdog_timeout_secs);
    let mut sink = LogEventSink::new();
    let power = PowerCycleController::new(&ctx.config);

    let hw = match init_hardware(&ctx) {
        Ok(hw) => hw,
        Err(e) => {
            error!("Hardware init failed: {e:#}");
            let plan = power.schedule_after_init_fault();
            sink.emit(&AppEvent::Sleeping(plan));
            power.enter(plan, &mut SleepAdapter::new(), &mut watchdog);
            return Ok(());
        }
    };

    // Without flash every cycle runs as never-reported.
    let storage = NvsAdapter::new().unwrap_or_else(|e| {
        sink.emit(&AppEvent::PersistenceFault(e));
        NvsAdapter::unavailable()
    });

    let mut ports = NodePorts {
        bus: hw.bus,
        network: WifiAdapter::new(hw.wifi),
        pubsub: MqttAdapter::new(),
        storage,
        sleep: SleepAdapter::new(),
        liveness: watchdog,
        clock: ClockAdapter::new(),
    };
    let mut service = NodeService::new(ctx);

    // ── 4. Wake cycle ─────────────────────────────────────────
    // Deep sleep never returns; development mode loops here.
    loop {
        service.run_cycle(&mut ports, &mut sink);
    }
}
