//! paxsniff: ESP-IDF std firmware
//!
//! Thread-based host for the capture engine using FreeRTOS threads and
//! std::sync::mpsc channels. Provides the WiFi driver calls, the hop timer
//! and the counting sink; all capture logic lives in the `paxsniff` crate.

use std::collections::HashSet;
use std::ffi::c_void;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use paxsniff::capture::{Capture, FrameCategory, FrameHandler, IdentifierSink, SourceTag};
use paxsniff::config::ScanConfig;
use paxsniff::hop::{ChannelHopper, DEFAULT_HOP_INTERVAL};
use paxsniff::protocol::{DeviceMessage, HostCommand, MsgBuffer, VERSION};
use paxsniff::radio::{
    Bandwidth, BufferConfig, ChannelTuner, FrameCallback, FrameFilter, Radio, RadioError, RadioOp,
};
use paxsniff::region::Region;
use paxsniff::sniffer::Sniffer;
use paxsniff::timer::{TimerCallback, TimerService};
use paxsniff::{board, comm};

use comm::LineReader;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::sys::{
    esp, esp_get_free_heap_size, esp_wifi_get_country, esp_wifi_set_channel,
    esp_wifi_set_country_code, esp_wifi_set_mode, esp_wifi_set_promiscuous,
    esp_wifi_set_promiscuous_filter, esp_wifi_set_promiscuous_rx_cb, esp_wifi_set_storage,
    esp_wifi_start, wifi_country_t, wifi_mode_t_WIFI_MODE_NULL,
    wifi_promiscuous_filter_t, wifi_promiscuous_pkt_t, wifi_promiscuous_pkt_type_t,
    wifi_second_chan_t, wifi_second_chan_t_WIFI_SECOND_CHAN_ABOVE,
    wifi_second_chan_t_WIFI_SECOND_CHAN_BELOW, wifi_second_chan_t_WIFI_SECOND_CHAN_NONE,
    wifi_storage_t_WIFI_STORAGE_RAM, EspError,
};
use esp_idf_svc::timer::{EspTaskTimerService, EspTimer};
use esp_idf_svc::wifi::WifiDriver;

/// Reporting window for unique address counts
const COUNT_WINDOW: Duration = Duration::from_secs(60);
/// Periodic status interval
const STATUS_INTERVAL: Duration = Duration::from_secs(30);
/// Bounded queue between the capture callback and the counting thread
const ID_QUEUE_DEPTH: usize = 256;

// ── Shared state ─────────────────────────────────────────────────────

static CONFIG: ScanConfig = ScanConfig::new();
static CAPTURE: Capture<'static, ChannelSink> = Capture::new(&CONFIG, ChannelSink::new());

const TUNER: Option<EspTuner> = if cfg!(feature = "wifi") {
    Some(EspTuner)
} else {
    None
};
static HOPPER: ChannelHopper<'static, Option<EspTuner>> = ChannelHopper::new(&CONFIG, TUNER);

/// Unique addresses seen in the last complete reporting window.
static LAST_UNIQUE: AtomicU32 = AtomicU32::new(0);

/// Boot time, captured once in main, used for uptime calculation.
static BOOT_INSTANT: Mutex<Option<Instant>> = Mutex::new(None);

fn uptime_secs() -> u32 {
    BOOT_INSTANT
        .lock()
        .ok()
        .and_then(|i| i.map(|boot| boot.elapsed().as_secs() as u32))
        .unwrap_or(0)
}

// ── Counting sink ────────────────────────────────────────────────────

/// Forwards observed addresses to the counting thread. Full queue drops.
struct ChannelSink {
    tx: OnceLock<SyncSender<[u8; 6]>>,
}

impl ChannelSink {
    const fn new() -> Self {
        Self {
            tx: OnceLock::new(),
        }
    }
}

impl IdentifierSink for ChannelSink {
    fn on_identifier_observed(&self, address: [u8; 6], _source: SourceTag) {
        if let Some(tx) = self.tx.get() {
            let _ = tx.try_send(address);
        }
    }
}

// ── WiFi promiscuous callbacks ───────────────────────────────────────

/// Runs in the WiFi driver task. Must not block.
unsafe extern "C" fn capture_rx_cb(buf: *mut c_void, pkt_type: wifi_promiscuous_pkt_type_t) {
    if buf.is_null() {
        return;
    }
    let pkt = unsafe { &*(buf as *const wifi_promiscuous_pkt_t) };
    let rssi = pkt.rx_ctrl.rssi() as i8;
    let sig_len = pkt.rx_ctrl.sig_len() as usize;

    // Safety: payload is `sig_len` bytes starting at pkt.payload
    let payload = unsafe { std::slice::from_raw_parts(pkt.payload.as_ptr(), sig_len) };
    CAPTURE.on_frame(payload, rssi, FrameCategory::from_raw(pkt_type as u32));
}

unsafe extern "C" fn discard_rx_cb(_buf: *mut c_void, _pkt_type: wifi_promiscuous_pkt_type_t) {}

// ── Radio ────────────────────────────────────────────────────────────

fn radio_err(op: RadioOp) -> impl Fn(EspError) -> RadioError {
    move |e| RadioError::new(op, e.code())
}

/// WiFi driver in NULL mode with promiscuous receive.
struct EspRadio {
    sysloop: EspSystemEventLoop,
    driver: Option<WifiDriver<'static>>,
}

impl EspRadio {
    fn new(sysloop: EspSystemEventLoop) -> Self {
        Self {
            sysloop,
            driver: None,
        }
    }
}

/// Driver buffers come from sdkconfig; warn when the build disagrees.
fn check_buffers(buffers: &BufferConfig) {
    use esp_idf_svc::sys::{
        CONFIG_ESP_WIFI_DYNAMIC_RX_BUFFER_NUM, CONFIG_ESP_WIFI_STATIC_RX_BUFFER_NUM,
    };
    if CONFIG_ESP_WIFI_STATIC_RX_BUFFER_NUM != buffers.static_rx as u32
        || CONFIG_ESP_WIFI_DYNAMIC_RX_BUFFER_NUM != buffers.dynamic_rx as u32
    {
        log::warn!(
            "sdkconfig RX buffers {}/{} differ from sniffer sizing {}/{}",
            CONFIG_ESP_WIFI_STATIC_RX_BUFFER_NUM,
            CONFIG_ESP_WIFI_DYNAMIC_RX_BUFFER_NUM,
            buffers.static_rx,
            buffers.dynamic_rx,
        );
    }
}

impl Radio for EspRadio {
    fn init(&mut self, buffers: &BufferConfig) -> Result<(), RadioError> {
        check_buffers(buffers);
        // Safety: the modem is only ever owned by this driver
        let modem = unsafe { Modem::new() };
        let driver =
            WifiDriver::new(modem, self.sysloop.clone(), None).map_err(radio_err(RadioOp::Init))?;
        // On error the local driver is dropped, which deinitializes WiFi
        unsafe {
            esp!(esp_wifi_set_storage(wifi_storage_t_WIFI_STORAGE_RAM))
                .map_err(radio_err(RadioOp::Init))?;
            esp!(esp_wifi_set_mode(wifi_mode_t_WIFI_MODE_NULL)).map_err(radio_err(RadioOp::Init))?;
            esp!(esp_wifi_start()).map_err(radio_err(RadioOp::Init))?;
        }
        self.driver = Some(driver);
        Ok(())
    }

    fn set_country(&mut self, region: &Region) -> Result<(), RadioError> {
        let mut cc = [0u8; 3];
        let bytes = region.country.as_bytes();
        let n = bytes.len().min(2);
        cc[..n].copy_from_slice(&bytes[..n]);
        unsafe {
            esp!(esp_wifi_set_country_code(cc.as_ptr() as *const _, true))
                .map_err(radio_err(RadioOp::SetCountry))
        }
    }

    fn region_channel_count(&self) -> Result<u8, RadioError> {
        let mut country = wifi_country_t::default();
        unsafe {
            esp!(esp_wifi_get_country(&mut country)).map_err(radio_err(RadioOp::GetCountry))?;
        }
        Ok(country.nchan)
    }

    fn set_frame_filter(&mut self, filter: FrameFilter) -> Result<(), RadioError> {
        let filter = wifi_promiscuous_filter_t {
            filter_mask: filter.bits(),
        };
        unsafe {
            esp!(esp_wifi_set_promiscuous_filter(&filter)).map_err(radio_err(RadioOp::SetFilter))
        }
    }

    fn register_frame_callback(&mut self, callback: FrameCallback) -> Result<(), RadioError> {
        let cb: unsafe extern "C" fn(*mut c_void, wifi_promiscuous_pkt_type_t) = match callback {
            FrameCallback::Capture => capture_rx_cb,
            FrameCallback::Discard => discard_rx_cb,
        };
        unsafe {
            esp!(esp_wifi_set_promiscuous_rx_cb(Some(cb))).map_err(radio_err(RadioOp::SetCallback))
        }
    }

    fn set_promiscuous(&mut self, enabled: bool) -> Result<(), RadioError> {
        unsafe {
            esp!(esp_wifi_set_promiscuous(enabled)).map_err(radio_err(RadioOp::SetPromiscuous))
        }
    }

    fn deinit(&mut self) {
        // Dropping the driver stops and deinitializes WiFi
        if self.driver.take().is_some() {
            log::debug!("WiFi driver released");
        }
    }
}

/// Channel switch from the hop timer task.
struct EspTuner;

fn second_channel(bandwidth: Bandwidth) -> wifi_second_chan_t {
    match bandwidth {
        Bandwidth::Ht20 => wifi_second_chan_t_WIFI_SECOND_CHAN_NONE,
        Bandwidth::Ht40Above => wifi_second_chan_t_WIFI_SECOND_CHAN_ABOVE,
        Bandwidth::Ht40Below => wifi_second_chan_t_WIFI_SECOND_CHAN_BELOW,
    }
}

impl ChannelTuner for EspTuner {
    fn set_channel(&self, channel: u8, bandwidth: Bandwidth) -> Result<(), RadioError> {
        unsafe {
            esp!(esp_wifi_set_channel(channel, second_channel(bandwidth)))
                .map_err(radio_err(RadioOp::SetChannel))
        }
    }
}

// ── Hop timer ────────────────────────────────────────────────────────

struct EspHopTimers {
    service: EspTaskTimerService,
}

struct EspHopTimer {
    timer: EspTimer<'static>,
    period: Duration,
}

impl TimerService for EspHopTimers {
    type Handle = EspHopTimer;

    fn create_periodic(
        &mut self,
        period_ms: u32,
        callback: &'static dyn TimerCallback,
    ) -> Result<Self::Handle, RadioError> {
        let timer = self
            .service
            .timer(move || callback.on_timer())
            .map_err(radio_err(RadioOp::TimerCreate))?;
        Ok(EspHopTimer {
            timer,
            period: Duration::from_millis(period_ms as u64),
        })
    }

    fn start(&mut self, handle: &mut Self::Handle) -> Result<(), RadioError> {
        handle
            .timer
            .every(handle.period)
            .map_err(radio_err(RadioOp::TimerStart))
    }

    fn stop(&mut self, handle: &mut Self::Handle) -> Result<(), RadioError> {
        handle
            .timer
            .cancel()
            .map(|_| ())
            .map_err(radio_err(RadioOp::TimerStop))
    }
}

type EspSniffer = Sniffer<Option<EspRadio>, EspHopTimers, Option<EspTuner>>;

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    // Bind the ESP-IDF logger to the `log` facade
    esp_idf_svc::log::EspLogger::initialize_default();

    if let Ok(mut boot) = BOOT_INSTANT.lock() {
        *boot = Some(Instant::now());
    }

    log::info!(
        "paxsniff v{} starting on {} (psram: {})",
        VERSION,
        board::BOARD_NAME,
        board::HAS_PSRAM
    );

    let sysloop = EspSystemEventLoop::take()?;

    // ── Channels ─────────────────────────────────────────────────────

    let (id_tx, id_rx) = mpsc::sync_channel::<[u8; 6]>(ID_QUEUE_DEPTH);
    let (output_tx, output_rx) = mpsc::sync_channel::<MsgBuffer>(8);
    let (cmd_tx, cmd_rx) = mpsc::sync_channel::<HostCommand>(4);

    if CAPTURE.sink().tx.set(id_tx).is_err() {
        anyhow::bail!("capture sink already initialized");
    }

    // ── Counting thread ──────────────────────────────────────────────

    thread::Builder::new()
        .name("count".into())
        .stack_size(4096)
        .spawn(move || counting_thread(id_rx))?;

    // ── Output thread ────────────────────────────────────────────────

    thread::Builder::new()
        .name("output".into())
        .stack_size(4096)
        .spawn(move || output_thread(output_rx))?;

    // ── Serial command reader ────────────────────────────────────────

    let serial_cmd_tx = cmd_tx.clone();
    thread::Builder::new()
        .name("serial".into())
        .stack_size(4096)
        .spawn(move || serial_thread(serial_cmd_tx))?;

    // ── Status thread ────────────────────────────────────────────────

    thread::Builder::new()
        .name("status".into())
        .stack_size(2048)
        .spawn(move || status_thread(cmd_tx))?;

    // ── Capture ──────────────────────────────────────────────────────

    let radio = if cfg!(feature = "wifi") {
        Some(EspRadio::new(sysloop))
    } else {
        log::warn!("Built without WiFi capture");
        None
    };
    let timers = EspHopTimers {
        service: EspTaskTimerService::new()?,
    };
    let mut sniffer: EspSniffer = Sniffer::new(radio, timers, &HOPPER);

    if let Err(e) = sniffer.start(DEFAULT_HOP_INTERVAL) {
        log::error!("Initial capture start failed: {}", e);
        send_error(&output_tx, "start", &e);
    }

    control_loop(&mut sniffer, cmd_rx, &output_tx);
    Ok(())
}

// ── Control ──────────────────────────────────────────────────────────

fn control_loop(
    sniffer: &mut EspSniffer,
    cmd_rx: mpsc::Receiver<HostCommand>,
    output_tx: &SyncSender<MsgBuffer>,
) {
    loop {
        match cmd_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(cmd) => {
                if let Err(e) = comm::handle_command(&cmd, sniffer) {
                    log::warn!("Command '{}' failed: {}", cmd.name(), e);
                    send_error(output_tx, cmd.name(), &e);
                }
                send_status(sniffer, output_tx);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if let Some(fault) = sniffer.check_hop_fault() {
            send_error(output_tx, "hop", &paxsniff::Error::Radio(fault));
            send_status(sniffer, output_tx);
        }
    }
}

fn send_status(sniffer: &EspSniffer, output_tx: &SyncSender<MsgBuffer>) {
    let snapshot = CONFIG.snapshot();
    let stats = CAPTURE.stats();
    let heap_free = unsafe { esp_get_free_heap_size() };

    let msg = DeviceMessage::Status {
        state: sniffer.state().as_str(),
        region: snapshot.region.code,
        ch: snapshot.channel,
        channels: snapshot.channel_mask,
        rssi: snapshot.rssi_threshold,
        seen: stats.seen,
        filtered: stats.filtered,
        malformed: stats.malformed,
        forwarded: stats.forwarded,
        unique: LAST_UNIQUE.load(Ordering::Relaxed),
        uptime: uptime_secs(),
        heap_free,
        board: board::BOARD_NAME,
        version: VERSION,
    };
    if let Some(buf) = comm::encode_message(&msg) {
        let _ = output_tx.try_send(buf);
    }
}

fn send_error(output_tx: &SyncSender<MsgBuffer>, cmd: &str, err: &paxsniff::Error) {
    let error = comm::error_string(err);
    let msg = DeviceMessage::Error { cmd, error: &error };
    if let Some(buf) = comm::encode_message(&msg) {
        let _ = output_tx.try_send(buf);
    }
}

// ── Worker threads ───────────────────────────────────────────────────

fn counting_thread(id_rx: mpsc::Receiver<[u8; 6]>) {
    log::info!("Counting thread started");

    let mut seen: HashSet<[u8; 6]> = HashSet::new();
    let mut window_start = Instant::now();
    loop {
        match id_rx.recv_timeout(Duration::from_millis(500)) {
            Ok(address) => {
                seen.insert(address);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if window_start.elapsed() >= COUNT_WINDOW {
            LAST_UNIQUE.store(seen.len() as u32, Ordering::Relaxed);
            log::info!("{} unique addresses in the last window", seen.len());
            seen.clear();
            window_start = Instant::now();
        }
    }
}

fn output_thread(output_rx: mpsc::Receiver<MsgBuffer>) {
    log::info!("Output thread started");

    let mut stdout = std::io::stdout();
    while let Ok(msg) = output_rx.recv() {
        if stdout.write_all(&msg).and_then(|_| stdout.flush()).is_err() {
            log::warn!("Console write failed");
        }
    }
}

fn serial_thread(cmd_tx: SyncSender<HostCommand>) {
    log::info!("Serial reader started at {} baud", comm::SERIAL_BAUD);

    let mut reader = LineReader::new();
    let mut stdin = std::io::stdin();
    let mut byte = [0u8; 1];
    loop {
        match stdin.read(&mut byte) {
            Ok(1) => {
                if let Some(line) = reader.feed(byte[0]) {
                    match comm::parse_command(line) {
                        Some(cmd) => {
                            if cmd_tx.try_send(cmd).is_err() {
                                log::warn!("Command queue full, dropping command");
                            }
                        }
                        None => log::warn!("Unrecognized command line"),
                    }
                }
            }
            // VFS console is non-blocking; back off when idle
            _ => thread::sleep(Duration::from_millis(20)),
        }
    }
}

fn status_thread(cmd_tx: SyncSender<HostCommand>) {
    loop {
        thread::sleep(STATUS_INTERVAL);
        // Status is built by the control loop, which owns the capture state
        if cmd_tx.try_send(HostCommand::GetStatus).is_err() {
            log::debug!("Status request skipped, command queue full");
        }
    }
}
