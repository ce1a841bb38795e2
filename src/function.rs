//! Gadget-side HID service.
//!
//! A single 10 ms sampler task drives the gadget end of the pad: it pumps
//! control events off `ep0`, drains host-written frames from `epOut`, and
//! streams the current input report to `epIn` while the host has streaming
//! enabled. Missed ticks are skipped, so a stall never causes a burst.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::controller::Ds3Controller;
use crate::error::BridgeError;
use crate::otg::ffs::{
    SetupRequest, HID_DT_REPORT, HID_REQ_GET_REPORT, HID_REQ_SET_REPORT, USB_REQ_GET_DESCRIPTOR,
    USB_TYPE_CLASS, USB_TYPE_MASK, USB_TYPE_STANDARD,
};
use crate::otg::{FfsEvent, GadgetEndpoints};
use crate::report::{ReportType, DS3_REPORT_DESCRIPTOR};

const SAMPLE_INTERVAL: Duration = Duration::from_millis(10);

/// The gadget-side endpoint service for one emulated pad.
pub struct Ds3Function {
    controller: Arc<Ds3Controller>,
    endpoints: Arc<GadgetEndpoints>,
    sampler: Mutex<Option<JoinHandle<()>>>,
    released: Arc<AtomicBool>,
}

impl Ds3Function {
    pub fn new(controller: Arc<Ds3Controller>, endpoints: Arc<GadgetEndpoints>) -> Self {
        Self {
            controller,
            endpoints,
            sampler: Mutex::new(None),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the sampler task.
    pub fn enable(&self) {
        let mut slot = self.sampler.lock();
        if slot.is_some() {
            return;
        }
        let controller = self.controller.clone();
        let endpoints = self.endpoints.clone();
        let released = self.released.clone();
        *slot = Some(tokio::spawn(async move {
            run_sampler(controller, endpoints, released).await;
        }));
        info!("HID function enabled");
    }

    /// Stop the sampler and drop the endpoint handles. Idempotent.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.sampler.lock().take() {
            handle.abort();
        }
        self.endpoints.close();
        info!("HID function released");
    }
}

async fn run_sampler(
    controller: Arc<Ds3Controller>,
    endpoints: Arc<GadgetEndpoints>,
    released: Arc<AtomicBool>,
) {
    let mut tick = tokio::time::interval(SAMPLE_INTERVAL);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tick.tick().await;
        if released.load(Ordering::SeqCst) {
            break;
        }

        if let Err(e) = pump_control_events(&controller, &endpoints) {
            warn!("ep0 failed, releasing function: {}", e);
            break;
        }

        if let Err(e) = drain_out_endpoint(&controller, &endpoints) {
            warn!("epOut failed, releasing function: {}", e);
            break;
        }

        if controller.input_streaming_enabled() {
            match endpoints.write_input(&controller.input_bytes()) {
                Ok(()) => trace!("input report written"),
                Err(e) if e.is_transient_endpoint() => {
                    trace!("epIn busy, sample dropped");
                }
                Err(e) => {
                    warn!("epIn failed, releasing function: {}", e);
                    break;
                }
            }
        }
    }

    released.store(true, Ordering::SeqCst);
    endpoints.close();
}

fn pump_control_events(
    controller: &Ds3Controller,
    endpoints: &GadgetEndpoints,
) -> crate::error::Result<()> {
    while let Some(event) = endpoints.read_event()? {
        match event {
            FfsEvent::Setup(setup) => handle_setup(controller, endpoints, setup),
            FfsEvent::Enable => debug!("host enabled the function"),
            FfsEvent::Disable => debug!("host disabled the function"),
            FfsEvent::Bind | FfsEvent::Unbind | FfsEvent::Suspend | FfsEvent::Resume => {
                trace!("ep0 event: {:?}", event);
            }
        }
    }
    Ok(())
}

fn drain_out_endpoint(
    controller: &Ds3Controller,
    endpoints: &GadgetEndpoints,
) -> crate::error::Result<()> {
    let mut buf = [0u8; 64];
    while let Some(n) = endpoints.read_output(&mut buf)? {
        if n == 0 {
            break;
        }
        controller.feed_endpoint_frame(&buf[..n]);
    }
    Ok(())
}

fn handle_setup(controller: &Ds3Controller, endpoints: &GadgetEndpoints, setup: SetupRequest) {
    if setup.is_device_to_host() {
        handle_in_request(controller, endpoints, setup);
    } else {
        handle_out_request(controller, endpoints, setup);
    }
}

fn handle_in_request(controller: &Ds3Controller, endpoints: &GadgetEndpoints, setup: SetupRequest) {
    let reply = match (setup.request_type & USB_TYPE_MASK, setup.request) {
        (USB_TYPE_STANDARD, USB_REQ_GET_DESCRIPTOR)
            if (setup.value >> 8) as u8 == HID_DT_REPORT =>
        {
            Some(DS3_REPORT_DESCRIPTOR.to_vec())
        }
        (USB_TYPE_CLASS, HID_REQ_GET_REPORT) => {
            let id = (setup.value & 0xFF) as u8;
            match ReportType::from_wire((setup.value >> 8) as u8) {
                Some(report_type) => match controller.get_report(report_type, id) {
                    Ok(data) => Some(data),
                    Err(e) => {
                        // the host sees a stall for reports we do not carry
                        debug!("GET_REPORT rejected: {}", e);
                        None
                    }
                },
                None => {
                    debug!("GET_REPORT with unknown type in wValue 0x{:04X}", setup.value);
                    None
                }
            }
        }
        _ => {
            trace!("unhandled IN control request 0x{:02X}", setup.request);
            None
        }
    };

    match reply {
        Some(mut data) => {
            data.truncate(setup.length as usize);
            if let Err(e) = endpoints.write_reply(&data) {
                warn!("control reply failed: {}", e);
            }
        }
        None => endpoints.stall_in(),
    }
}

fn handle_out_request(controller: &Ds3Controller, endpoints: &GadgetEndpoints, setup: SetupRequest) {
    let is_set_report = setup.request_type & USB_TYPE_MASK == USB_TYPE_CLASS
        && setup.request == HID_REQ_SET_REPORT;
    if !is_set_report {
        trace!("stalling unhandled OUT control request 0x{:02X}", setup.request);
        endpoints.stall_out();
        return;
    }

    let data = match endpoints.read_setup_data(setup.length as usize) {
        Ok(data) => data,
        Err(e) => {
            warn!("control data stage failed: {}", e);
            return;
        }
    };

    let id = (setup.value & 0xFF) as u8;
    match ReportType::from_wire((setup.value >> 8) as u8) {
        Some(report_type) => {
            if let Err(e) = controller.set_report(report_type, id, &data) {
                match e {
                    BridgeError::UnsupportedReport { .. } | BridgeError::Protocol(_) => {
                        debug!("SET_REPORT rejected: {}", e)
                    }
                    other => warn!("SET_REPORT failed: {}", other),
                }
            }
        }
        None => debug!("SET_REPORT with unknown type in wValue 0x{:04X}", setup.value),
    }
}
