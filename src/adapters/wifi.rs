//! WiFi station-mode adapter.
//!
//! Implements [`NetworkPort`]: one bounded association attempt per
//! `connect` call.  Retries and watchdog feeds between attempts belong to
//! the publish sequencer.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::BlockingWifi`.  The
//!   attempt scans first so an absent access point is reported as
//!   [`ConnectivityError::ApNotInRange`] instead of a slow timeout.
//! - **all other targets**: a simulation that validates credentials and
//!   hands out a fixed address.

use std::net::Ipv4Addr;

use log::{info, warn};

use crate::app::ports::{NetworkInfo, NetworkPort};
use crate::config::StaticIpConfig;
use crate::error::ConnectivityError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    hal::delay::FreeRtos,
    ipv4::{
        ClientConfiguration as IpClientConfiguration, ClientSettings as IpClientSettings,
        Configuration as IpConfiguration, Mask, Subnet,
    },
    netif::{EspNetif, NetifConfiguration},
    wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi},
};

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() {
        return Err(ConnectivityError::NoCredentials);
    }
    if ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,
    connected: bool,
}

impl WifiAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(wifi: BlockingWifi<EspWifi<'static>>) -> Self {
        Self {
            wifi,
            connected: false,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self { connected: false }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn apply_static_ip(&mut self, static_ip: &StaticIpConfig) -> Result<(), ConnectivityError> {
        let parse = |s: &str| s.parse::<Ipv4Addr>().map_err(|_| ConnectivityError::ConnectionFailed);
        let conf = NetifConfiguration {
            ip_configuration: Some(IpConfiguration::Client(IpClientConfiguration::Fixed(
                IpClientSettings {
                    ip: parse(&static_ip.ip)?,
                    subnet: Subnet {
                        gateway: parse(&static_ip.gateway)?,
                        mask: Mask(static_ip.netmask_bits),
                    },
                    dns: static_ip.dns.as_deref().map(parse).transpose()?,
                    secondary_dns: None,
                },
            ))),
            ..NetifConfiguration::wifi_default_client()
        };
        let netif = EspNetif::new_with_conf(&conf).map_err(|e| {
            warn!("WiFi: static netif rejected: {e}");
            ConnectivityError::ConnectionFailed
        })?;
        self.wifi
            .wifi_mut()
            .swap_netif_sta(netif)
            .map(|_| ())
            .map_err(|_| ConnectivityError::ConnectionFailed)
    }

    #[cfg(target_os = "espidf")]
    fn platform_connect(
        &mut self,
        ssid: &str,
        password: &str,
        static_ip: Option<&StaticIpConfig>,
        timeout_secs: u32,
    ) -> Result<NetworkInfo, ConnectivityError> {
        if let Some(ip) = static_ip {
            self.apply_static_ip(ip)?;
        }

        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPAWPA2Personal
        };
        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration {
                ssid: ssid.try_into().map_err(|_| ConnectivityError::InvalidSsid)?,
                password: password
                    .try_into()
                    .map_err(|_| ConnectivityError::InvalidPassword)?,
                auth_method,
                ..Default::default()
            }))
            .map_err(|_| ConnectivityError::ConnectionFailed)?;
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|_| ConnectivityError::ConnectionFailed)?;
        }

        let in_range = self
            .wifi
            .scan()
            .map_err(|_| ConnectivityError::ConnectionFailed)?
            .iter()
            .any(|ap| ap.ssid.as_str() == ssid);
        if !in_range {
            return Err(ConnectivityError::ApNotInRange);
        }

        self.wifi
            .wifi_mut()
            .connect()
            .map_err(|_| ConnectivityError::ConnectionFailed)?;
        let mut waited = 0;
        while !self.wifi.is_up().unwrap_or(false) {
            if waited >= timeout_secs {
                let _ = self.wifi.disconnect();
                return Err(ConnectivityError::Timeout);
            }
            FreeRtos::delay_ms(1000);
            waited += 1;
        }

        let ip = self
            .wifi
            .wifi()
            .sta_netif()
            .get_ip_info()
            .map_err(|_| ConnectivityError::ConnectionFailed)?
            .ip;
        Ok(NetworkInfo { ip })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(
        &mut self,
        ssid: &str,
        _password: &str,
        static_ip: Option<&StaticIpConfig>,
        _timeout_secs: u32,
    ) -> Result<NetworkInfo, ConnectivityError> {
        let ip = match static_ip {
            Some(cfg) => cfg
                .ip
                .parse()
                .map_err(|_| ConnectivityError::ConnectionFailed)?,
            None => Ipv4Addr::new(192, 168, 4, 2),
        };
        info!("WiFi(sim): associated with '{ssid}'");
        Ok(NetworkInfo { ip })
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        let _ = self.wifi.disconnect();
        let _ = self.wifi.stop();
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        info!("WiFi(sim): disconnected");
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// NetworkPort
// ───────────────────────────────────────────────────────────────

impl NetworkPort for WifiAdapter {
    fn connect(
        &mut self,
        ssid: &str,
        password: &str,
        static_ip: Option<&StaticIpConfig>,
        timeout_secs: u32,
    ) -> Result<NetworkInfo, ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(password)?;

        info!("WiFi: connecting to '{ssid}' (timeout {timeout_secs}s)");
        match self.platform_connect(ssid, password, static_ip, timeout_secs) {
            Ok(info) => {
                self.connected = true;
                info!("WiFi: connected, ip={}", info.ip);
                Ok(info)
            }
            Err(e) => {
                warn!("WiFi: connection failed: {e}");
                self.connected = false;
                Err(e)
            }
        }
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        self.connected = false;
        info!("WiFi: disconnected");
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
