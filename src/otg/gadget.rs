//! ConfigFS registration and FunctionFS plumbing for the emulated pad.
//!
//! `Ds3Gadget` owns the gadget lifecycle: the ConfigFS tree, the FunctionFS
//! mount, UDC binding, and teardown on every exit path. Endpoint I/O goes
//! through [`GadgetEndpoints`], which the gadget-side sampler holds on to.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::ffs::{self, FfsEvent, EVENT_SIZE};
use crate::error::{BridgeError, Result};

/// Sony Computer Entertainment
pub const VENDOR_ID: u16 = 0x054C;
/// DualShock 3 / Sixaxis
pub const PRODUCT_ID: u16 = 0x0268;

const CONFIGFS_PATH: &str = "/sys/kernel/config/usb_gadget";
const UDC_CLASS_PATH: &str = "/sys/class/udc";

const GADGET_NAME: &str = "ds3";
const FUNCTION_NAME: &str = "ffs.ds3";
const FUNCTION_DEV: &str = "ds3";
const MANUFACTURER: &str = "Sony Computer Entertainment Inc.";
const PRODUCT: &str = "PLAYSTATION(R)3 Controller";
const SERIAL_NUMBER: &str = "SN00000000";
const FFS_MOUNT_DIR: &str = "/dev/ffs-ds3";

const REBIND_DELAY_MS: u64 = 300;

/// Default time to wait for the host to configure the gadget.
pub const DEFAULT_CONFIGURED_TIMEOUT: Duration = Duration::from_secs(30);

/// FunctionFS endpoint file handles shared with the sampler task.
pub struct GadgetEndpoints {
    ep0: Mutex<Option<File>>,
    ep_in: Mutex<Option<File>>,
    ep_out: Mutex<Option<File>>,
}

impl GadgetEndpoints {
    pub(crate) fn new() -> Self {
        Self {
            ep0: Mutex::new(None),
            ep_in: Mutex::new(None),
            ep_out: Mutex::new(None),
        }
    }

    fn endpoint_err(endpoint: &'static str, source: std::io::Error) -> BridgeError {
        BridgeError::Endpoint { endpoint, source }
    }

    fn closed_err(endpoint: &'static str) -> BridgeError {
        BridgeError::Endpoint {
            endpoint,
            source: std::io::Error::new(std::io::ErrorKind::NotConnected, "endpoint closed"),
        }
    }

    /// Read the next control event, if one is pending.
    pub fn read_event(&self) -> Result<Option<FfsEvent>> {
        let mut dev = self.ep0.lock();
        let file = dev.as_mut().ok_or_else(|| Self::closed_err("ep0"))?;
        let mut raw = [0u8; EVENT_SIZE];
        match file.read(&mut raw) {
            Ok(EVENT_SIZE) => {
                let event = FfsEvent::parse(&raw);
                if event.is_none() {
                    debug!("ignoring unknown ep0 event type {}", raw[8]);
                }
                Ok(event)
            }
            Ok(n) => {
                warn!("short ep0 event read: {} bytes", n);
                Ok(None)
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(Self::endpoint_err("ep0", e)),
        }
    }

    /// Read the data stage of a host-to-device control transfer.
    ///
    /// A zero-length read acknowledges transfers without a data stage.
    pub fn read_setup_data(&self, len: usize) -> Result<Vec<u8>> {
        let mut dev = self.ep0.lock();
        let file = dev.as_mut().ok_or_else(|| Self::closed_err("ep0"))?;
        let mut data = vec![0u8; len];
        // the data stage may trail the event by a moment
        let deadline = Instant::now() + Duration::from_millis(20);
        loop {
            match file.read(&mut data) {
                Ok(n) => {
                    data.truncate(n);
                    return Ok(data);
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(Self::endpoint_err("ep0", e));
                    }
                    std::thread::sleep(Duration::from_micros(500));
                }
                Err(e) => return Err(Self::endpoint_err("ep0", e)),
            }
        }
    }

    /// Send the data stage of a device-to-host control transfer.
    pub fn write_reply(&self, data: &[u8]) -> Result<()> {
        let mut dev = self.ep0.lock();
        let file = dev.as_mut().ok_or_else(|| Self::closed_err("ep0"))?;
        file.write_all(data)
            .map_err(|e| Self::endpoint_err("ep0", e))
    }

    /// Stall a device-to-host request by reading in the opposite direction.
    pub fn stall_in(&self) {
        let mut dev = self.ep0.lock();
        if let Some(file) = dev.as_mut() {
            let _ = file.read(&mut []);
        }
    }

    /// Stall a host-to-device request by writing in the opposite direction.
    pub fn stall_out(&self) {
        let mut dev = self.ep0.lock();
        if let Some(file) = dev.as_mut() {
            let _ = file.write(&[]);
        }
    }

    /// Write one input report to `epIn`.
    pub fn write_input(&self, report: &[u8]) -> Result<()> {
        let mut dev = self.ep_in.lock();
        let file = dev.as_mut().ok_or_else(|| Self::closed_err("epIn"))?;
        file.write_all(report)
            .map_err(|e| Self::endpoint_err("epIn", e))
    }

    /// Read one frame from `epOut`, if one is pending.
    pub fn read_output(&self, buf: &mut [u8]) -> Result<Option<usize>> {
        let mut dev = self.ep_out.lock();
        let file = dev.as_mut().ok_or_else(|| Self::closed_err("epOut"))?;
        match file.read(buf) {
            Ok(n) => Ok(Some(n)),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) if e.raw_os_error() == Some(libc::EAGAIN) => Ok(None),
            Err(e) => Err(Self::endpoint_err("epOut", e)),
        }
    }

    /// Drop all endpoint handles.
    pub fn close(&self) {
        *self.ep0.lock() = None;
        *self.ep_in.lock() = None;
        *self.ep_out.lock() = None;
    }
}

/// The ConfigFS gadget for the emulated pad.
pub struct Ds3Gadget {
    gadget_path: PathBuf,
    config_path: PathBuf,
    ffs_dir: PathBuf,
    endpoints: std::sync::Arc<GadgetEndpoints>,
    udc: Option<String>,
    mounted: bool,
    created: bool,
}

impl Ds3Gadget {
    pub fn new() -> Self {
        let gadget_path = PathBuf::from(CONFIGFS_PATH).join(GADGET_NAME);
        let config_path = gadget_path.join("configs/c.1");
        Self {
            gadget_path,
            config_path,
            ffs_dir: PathBuf::from(FFS_MOUNT_DIR),
            endpoints: std::sync::Arc::new(GadgetEndpoints::new()),
            udc: None,
            mounted: false,
            created: false,
        }
    }

    /// Endpoint handles for the sampler task.
    pub fn endpoints(&self) -> std::sync::Arc<GadgetEndpoints> {
        self.endpoints.clone()
    }

    /// Create the ConfigFS tree, mount FunctionFS, and upload descriptors.
    pub fn setup(&mut self) -> Result<()> {
        if !Path::new(CONFIGFS_PATH).exists() {
            return Err(BridgeError::BindFailure(
                "ConfigFS not available. Is it mounted at /sys/kernel/config?".into(),
            ));
        }

        info!("Setting up USB gadget: {}", GADGET_NAME);
        make_dir(&self.gadget_path)?;
        self.created = true;

        for (attr, value) in [
            ("idVendor", format!("0x{:04x}", VENDOR_ID)),
            ("idProduct", format!("0x{:04x}", PRODUCT_ID)),
            ("bcdDevice", "0x0100".into()),
            ("bcdUSB", "0x0200".into()),
            ("bDeviceClass", "0x00".into()), // composite
            ("bDeviceSubClass", "0x00".into()),
            ("bDeviceProtocol", "0x00".into()),
        ] {
            write_attr(&self.gadget_path.join(attr), &value)?;
        }

        let strings_path = self.gadget_path.join("strings/0x409");
        make_dir(&strings_path)?;
        for (attr, value) in [
            ("manufacturer", MANUFACTURER),
            ("product", PRODUCT),
            ("serialnumber", SERIAL_NUMBER),
        ] {
            write_attr(&strings_path.join(attr), value)?;
        }

        let config_strings = self.config_path.join("strings/0x409");
        make_dir(&config_strings)?;
        write_attr(&config_strings.join("configuration"), PRODUCT)?;
        write_attr(&self.config_path.join("MaxPower"), "500")?;
        write_attr(&self.config_path.join("bmAttributes"), "0x80")?; // bus powered

        let func_path = self.gadget_path.join("functions").join(FUNCTION_NAME);
        make_dir(&func_path)?;
        let link_path = self.config_path.join(FUNCTION_NAME);
        if !link_path.exists() {
            std::os::unix::fs::symlink(&func_path, &link_path).map_err(|e| {
                BridgeError::Gadget(format!(
                    "Failed to link function into {}: {}",
                    link_path.display(),
                    e
                ))
            })?;
        }

        self.mount_functionfs()?;
        self.upload_descriptors()?;
        self.open_endpoints()?;

        info!("USB gadget setup complete");
        Ok(())
    }

    /// Bind the gadget to the first available UDC.
    pub fn bind(&mut self) -> Result<()> {
        let udc = first_udc()?;
        info!("Binding gadget to UDC: {}", udc);
        write_attr(&self.gadget_path.join("UDC"), &udc)
            .map_err(|e| BridgeError::BindFailure(e.to_string()))?;
        self.udc = Some(udc);
        std::thread::sleep(Duration::from_millis(REBIND_DELAY_MS));
        Ok(())
    }

    /// Wait until the host has configured the gadget.
    pub async fn await_configured(&self, timeout: Duration) -> Result<()> {
        let udc = self
            .udc
            .clone()
            .ok_or_else(|| BridgeError::BindFailure("gadget not bound to a UDC".into()))?;

        let start = Instant::now();
        let mut delay_ms = 10u64;
        const MAX_DELAY_MS: u64 = 100;

        while start.elapsed() < timeout {
            if udc_configured(&udc) {
                info!("UDC {} configured after {:?}", udc, start.elapsed());
                return Ok(());
            }
            let remaining = timeout.saturating_sub(start.elapsed());
            let sleep = Duration::from_millis(delay_ms).min(remaining);
            if sleep.is_zero() {
                break;
            }
            tokio::time::sleep(sleep).await;
            delay_ms = (delay_ms * 2).min(MAX_DELAY_MS);
        }

        Err(BridgeError::BindFailure(format!(
            "UDC {} did not reach configured state within {:?}",
            udc, timeout
        )))
    }

    /// Unbind the gadget from its UDC.
    pub fn unbind(&mut self) -> Result<()> {
        if self.udc.take().is_some() {
            write_attr(&self.gadget_path.join("UDC"), "")?;
            info!("Unbound gadget from UDC");
            std::thread::sleep(Duration::from_millis(REBIND_DELAY_MS));
        }
        Ok(())
    }

    /// Tear down everything this gadget created. Removal is best-effort;
    /// ConfigFS rejects out-of-order deletes and partially created trees are
    /// normal after a failed setup.
    pub fn cleanup(&mut self) -> Result<()> {
        if !self.created && !self.mounted {
            return Ok(());
        }
        info!("Cleaning up USB gadget: {}", GADGET_NAME);

        let _ = self.unbind();
        self.endpoints.close();

        if self.mounted {
            if let Err(e) = nix::mount::umount(&self.ffs_dir) {
                warn!("Failed to unmount {}: {}", self.ffs_dir.display(), e);
            }
            let _ = fs::remove_dir(&self.ffs_dir);
            self.mounted = false;
        }

        if self.created {
            let _ = fs::remove_file(self.config_path.join(FUNCTION_NAME));
            let _ = fs::remove_dir(self.config_path.join("strings/0x409"));
            let _ = fs::remove_dir(&self.config_path);
            let _ = fs::remove_dir(self.gadget_path.join("functions").join(FUNCTION_NAME));
            let _ = fs::remove_dir(self.gadget_path.join("strings/0x409"));
            if let Err(e) = fs::remove_dir(&self.gadget_path) {
                if self.gadget_path.exists() {
                    warn!("Could not remove gadget directory: {}", e);
                }
            }
            self.created = false;
        }

        info!("USB gadget cleanup complete");
        Ok(())
    }

    fn mount_functionfs(&mut self) -> Result<()> {
        make_dir(&self.ffs_dir)?;
        nix::mount::mount(
            Some(FUNCTION_DEV),
            &self.ffs_dir,
            Some("functionfs"),
            nix::mount::MsFlags::empty(),
            None::<&str>,
        )
        .map_err(|e| {
            BridgeError::Gadget(format!(
                "Failed to mount functionfs at {}: {}",
                self.ffs_dir.display(),
                e
            ))
        })?;
        self.mounted = true;
        debug!("FunctionFS mounted at {}", self.ffs_dir.display());
        Ok(())
    }

    fn upload_descriptors(&self) -> Result<()> {
        let ep0_path = self.ffs_dir.join("ep0");
        let mut ep0 = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&ep0_path)
            .map_err(|e| {
                BridgeError::Gadget(format!("Failed to open {}: {}", ep0_path.display(), e))
            })?;

        ep0.write_all(&ffs::descriptors_blob()).map_err(|e| {
            BridgeError::Gadget(format!("Failed to write FunctionFS descriptors: {}", e))
        })?;
        ep0.write_all(&ffs::strings_blob(PRODUCT)).map_err(|e| {
            BridgeError::Gadget(format!("Failed to write FunctionFS strings: {}", e))
        })?;
        debug!("FunctionFS descriptors uploaded");

        // switch ep0 to non-blocking for the event pump
        set_nonblocking(&ep0)?;
        *self.endpoints.ep0.lock() = Some(ep0);
        Ok(())
    }

    fn open_endpoints(&self) -> Result<()> {
        // descriptor upload makes ep1 (IN) and ep2 (OUT) appear
        let ep_in = open_endpoint(&self.ffs_dir.join("ep1"), libc::O_WRONLY)?;
        let ep_out = open_endpoint(&self.ffs_dir.join("ep2"), libc::O_RDONLY)?;
        *self.endpoints.ep_in.lock() = Some(ep_in);
        *self.endpoints.ep_out.lock() = Some(ep_out);
        debug!("Endpoint files opened");
        Ok(())
    }
}

impl Default for Ds3Gadget {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Ds3Gadget {
    fn drop(&mut self) {
        if self.created || self.mounted {
            if let Err(e) = self.cleanup() {
                warn!("Failed to clean up gadget on drop: {}", e);
            }
        }
    }
}

/// Write one ConfigFS/sysfs attribute.
///
/// The newline-terminated value goes out in a single write() call; sysfs
/// attributes only process complete writes.
fn write_attr(path: &Path, value: &str) -> Result<()> {
    let mut data = String::with_capacity(value.len() + 1);
    data.push_str(value);
    if !data.ends_with('\n') {
        data.push('\n');
    }
    fs::write(path, data)
        .map_err(|e| BridgeError::Gadget(format!("Failed to write {}: {}", path.display(), e)))
}

fn make_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .map_err(|e| BridgeError::Gadget(format!("Failed to create {}: {}", path.display(), e)))
}

/// Pick the first UDC the kernel advertises.
fn first_udc() -> Result<String> {
    fs::read_dir(UDC_CLASS_PATH)
        .map_err(|e| BridgeError::BindFailure(format!("cannot list {}: {}", UDC_CLASS_PATH, e)))?
        .flatten()
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .next()
        .ok_or_else(|| BridgeError::BindFailure("No USB Device Controller (UDC) found".into()))
}

/// Whether the host has enumerated and configured the given UDC.
fn udc_configured(udc: &str) -> bool {
    fs::read_to_string(Path::new(UDC_CLASS_PATH).join(udc).join("state"))
        .map(|state| state.trim().eq_ignore_ascii_case("configured"))
        .unwrap_or(false)
}

fn open_endpoint(path: &Path, mode: i32) -> Result<File> {
    OpenOptions::new()
        .read(mode == libc::O_RDONLY)
        .write(mode == libc::O_WRONLY)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .map_err(|e| BridgeError::Gadget(format!("Failed to open {}: {}", path.display(), e)))
}

fn set_nonblocking(file: &File) -> Result<()> {
    use std::os::unix::io::AsRawFd;
    let fd = file.as_raw_fd();
    // SAFETY: plain fcntl on a fd we own
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(BridgeError::Gadget("fcntl(F_GETFL) failed".into()));
    }
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(BridgeError::Gadget("fcntl(F_SETFL) failed".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gadget_paths() {
        let gadget = Ds3Gadget::new();
        assert_eq!(
            gadget.gadget_path,
            PathBuf::from("/sys/kernel/config/usb_gadget/ds3")
        );
        assert_eq!(
            gadget.config_path,
            PathBuf::from("/sys/kernel/config/usb_gadget/ds3/configs/c.1")
        );
        assert!(!gadget.created);
        assert!(!gadget.mounted);
    }

    #[test]
    fn test_endpoints_closed_by_default() {
        let gadget = Ds3Gadget::new();
        let endpoints = gadget.endpoints();
        assert!(endpoints.read_event().is_err());
        assert!(endpoints.write_input(&[0u8; 49]).is_err());
        let mut buf = [0u8; 64];
        assert!(endpoints.read_output(&mut buf).is_err());
    }

    #[test]
    fn test_write_attr_terminates_value() {
        let path = std::env::temp_dir().join("ds3-bridge-test-attr");
        write_attr(&path, "0x054c").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "0x054c\n");
        // an already terminated value is not doubled
        write_attr(&path, "configured\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "configured\n");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_usb_identity() {
        assert_eq!(VENDOR_ID, 0x054C);
        assert_eq!(PRODUCT_ID, 0x0268);
    }
}
