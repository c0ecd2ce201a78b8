//! Kernel configuration.

/// Upper bound of interrupt nesting depth
pub const IRQ_NESTING_LIMIT: u8 = 250;

/// Upper bound of scheduler-lock nesting depth
pub const SCHED_LOCK_NESTING_LIMIT: u8 = 250;

/// Default system tick rate in Hz
pub const DEFAULT_TICK_RATE_HZ: u32 = 1000;

/// Configuration for a kernel instance.
///
/// Message-pool capacity and wait-set capacity are const generics of the
/// pool and pend object types; this record holds what is decided at
/// kernel initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    pub name: &'static str,
    pub irq_nesting_limit: u8,
    pub sched_lock_nesting_limit: u8,
    pub tick_rate_hz: u32,
}

impl KernelConfig {
    /// Configuration with the stock limits, usable in `const` context
    pub const DEFAULT: Self = Self {
        name: "KNL",
        irq_nesting_limit: IRQ_NESTING_LIMIT,
        sched_lock_nesting_limit: SCHED_LOCK_NESTING_LIMIT,
        tick_rate_hz: DEFAULT_TICK_RATE_HZ,
    };

    /// Creates a new kernel configuration builder.
    pub fn builder() -> KernelConfigBuilder {
        KernelConfigBuilder::default()
    }

    /// Whether object tags are checked on every operation.
    pub const fn object_verify(&self) -> bool {
        cfg!(feature = "object-verify")
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Builder for ergonomic kernel configuration construction.
#[derive(Debug, Clone, Default)]
pub struct KernelConfigBuilder {
    config: KernelConfig,
}

impl KernelConfigBuilder {
    /// Sets the kernel name.
    pub fn name(mut self, name: &'static str) -> Self {
        self.config.name = name;
        self
    }

    /// Sets the interrupt nesting limit.
    ///
    /// Values above [`IRQ_NESTING_LIMIT`] are clamped.
    pub fn irq_nesting_limit(mut self, limit: u8) -> Self {
        self.config.irq_nesting_limit = limit.min(IRQ_NESTING_LIMIT);
        self
    }

    /// Sets the scheduler-lock nesting limit.
    ///
    /// Values above [`SCHED_LOCK_NESTING_LIMIT`] are clamped.
    pub fn sched_lock_nesting_limit(mut self, limit: u8) -> Self {
        self.config.sched_lock_nesting_limit = limit.min(SCHED_LOCK_NESTING_LIMIT);
        self
    }

    /// Sets the tick rate in Hz.
    pub fn tick_rate_hz(mut self, hz: u32) -> Self {
        self.config.tick_rate_hz = hz.max(1);
        self
    }

    /// Builds the kernel configuration.
    pub fn build(self) -> KernelConfig {
        self.config
    }
}
