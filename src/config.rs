//! Runtime configuration for the host engine and the I2C bridge.
//!
//! The defaults reproduce the FT260 emulation and the single device setup the bridge is built for,
//! so `HostConfig::default()` and `BridgeConfig::default()` are what the firmware uses.

use fugit::MillisDurationU32;

use crate::spin::SpinBound;

/// Bus address assigned to the keyboard by `SET_ADDRESS`
pub const DEFAULT_DEVICE_ADDRESS: u8 = 1;
/// Configuration selected by `SET_CONFIGURATION`
pub const DEFAULT_CONFIGURATION: u8 = 1;
/// Time a device is given to start answering on its new address
pub const DEFAULT_SETTLE_DELAY_MS: u32 = 2;

/// 7 bit I2C address the FT260 answers on
pub const DEFAULT_SLAVE_ADDRESS: u8 = 0x10;
pub const FT260_VENDOR_ID: u16 = 0x0403;
pub const FT260_PRODUCT_ID: u16 = 0x6030;
pub const FT260_VERSION_ID: u16 = 0x0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BuilderError {
    /// USB device addresses are 1 to 127
    InvalidDeviceAddress,
    /// Configuration values start at 1
    InvalidConfiguration,
    /// I2C slave addresses are 7 bit and the reserved ranges are not accepted
    InvalidSlaveAddress,
}

pub type BuilderResult<B> = core::result::Result<B, BuilderError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostConfig {
    pub device_address: u8,
    pub configuration: u8,
    pub settle_delay: MillisDurationU32,
    pub spin: SpinBound,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            device_address: DEFAULT_DEVICE_ADDRESS,
            configuration: DEFAULT_CONFIGURATION,
            settle_delay: MillisDurationU32::millis(DEFAULT_SETTLE_DELAY_MS),
            spin: SpinBound::Unbounded,
        }
    }
}

#[must_use = "this `HostConfigBuilder` must be assigned or consumed by `::build()`"]
#[derive(Debug, Clone, Copy, Default)]
pub struct HostConfigBuilder {
    config: HostConfig,
}

impl HostConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device_address(mut self, address: u8) -> BuilderResult<Self> {
        if address == 0 || address > 127 {
            return Err(BuilderError::InvalidDeviceAddress);
        }
        self.config.device_address = address;
        Ok(self)
    }

    pub fn configuration(mut self, configuration: u8) -> BuilderResult<Self> {
        if configuration == 0 {
            return Err(BuilderError::InvalidConfiguration);
        }
        self.config.configuration = configuration;
        Ok(self)
    }

    pub fn settle_delay(mut self, delay: MillisDurationU32) -> Self {
        self.config.settle_delay = delay;
        self
    }

    /// Bound for every wait on a control transfer stage
    pub fn spin(mut self, bound: SpinBound) -> Self {
        self.config.spin = bound;
        self
    }

    #[must_use]
    pub fn build(self) -> HostConfig {
        self.config
    }
}

/// Electrical level that signals a pending input report to the I2C master
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptPolarity {
    #[default]
    ActiveHigh,
    ActiveLow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    pub slave_address: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub version_id: u16,
    pub interrupt_polarity: InterruptPolarity,
    pub spin: SpinBound,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            slave_address: DEFAULT_SLAVE_ADDRESS,
            vendor_id: FT260_VENDOR_ID,
            product_id: FT260_PRODUCT_ID,
            version_id: FT260_VERSION_ID,
            interrupt_polarity: InterruptPolarity::ActiveHigh,
            spin: SpinBound::Unbounded,
        }
    }
}

#[must_use = "this `BridgeConfigBuilder` must be assigned or consumed by `::build()`"]
#[derive(Debug, Clone, Copy, Default)]
pub struct BridgeConfigBuilder {
    config: BridgeConfig,
}

impl BridgeConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slave_address(mut self, address: u8) -> BuilderResult<Self> {
        // 0b0000xxx and 0b1111xxx are reserved
        if !(0x08..=0x77).contains(&address) {
            return Err(BuilderError::InvalidSlaveAddress);
        }
        self.config.slave_address = address;
        Ok(self)
    }

    pub fn vendor_id(mut self, id: u16) -> Self {
        self.config.vendor_id = id;
        self
    }

    pub fn product_id(mut self, id: u16) -> Self {
        self.config.product_id = id;
        self
    }

    pub fn version_id(mut self, id: u16) -> Self {
        self.config.version_id = id;
        self
    }

    pub fn interrupt_polarity(mut self, polarity: InterruptPolarity) -> Self {
        self.config.interrupt_polarity = polarity;
        self
    }

    /// Bound for waiting on room in the transmit FIFO while a register is streamed out
    pub fn spin(mut self, bound: SpinBound) -> Self {
        self.config.spin = bound;
        self
    }

    #[must_use]
    pub fn build(self) -> BridgeConfig {
        self.config
    }
}
