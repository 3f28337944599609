//! The battery monitor: one tick of the cycle is read bus -> integrate ->
//! write bus -> maybe checkpoint -> maybe exit.
//!
//! The external scheduler (the tokio interval in `main`) never dispatches a
//! tick before the previous one returned, so the state here needs no
//! locking: it is owned by the monitor and mutated on a single thread of
//! control. Termination is requested by the monitor itself, through the
//! [`TickOutcome`] it returns after seeing the shutdown sentinel.

pub mod checkpoint;
pub mod integrator;
pub mod state;

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Local, Timelike};
use tracing::{debug, error, info, warn};

use crate::bus::{
    BusError, BusItem, ValueBus, CHARGED_ENERGY_PATH, CURRENT_PATH, DISCHARGED_ENERGY_PATH,
    VOLTAGE_PATH,
};
use crate::monitor::checkpoint::Checkpointer;
use crate::monitor::state::BatteryState;
use crate::store::{IndexStore, StoreError, CHARGED_INDEX, DISCHARGED_INDEX};

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("device bus failure: {0}")]
    Bus(#[from] BusError),

    #[error("index store failure: {0}")]
    Store(#[from] StoreError),
}

/// What the driver loop should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Shutdown,
}

/// The four monitored bus entities, bound once during init. One field per
/// entity: the entity set is fixed, so "all four are present" holds by
/// construction.
pub struct EnergyItems<I> {
    pub voltage: I,
    pub current: I,
    pub charged: I,
    pub discharged: I,
}

impl<I: BusItem> EnergyItems<I> {
    pub async fn bind<B: ValueBus<Item = I>>(bus: &B) -> Result<Self, BusError> {
        Ok(Self {
            voltage: bus.bind(VOLTAGE_PATH).await?,
            current: bus.bind(CURRENT_PATH).await?,
            charged: bus.bind(CHARGED_ENERGY_PATH).await?,
            discharged: bus.bind(DISCHARGED_ENERGY_PATH).await?,
        })
    }
}

pub struct BatteryMonitor<I: BusItem> {
    state: BatteryState,
    items: EnergyItems<I>,
    checkpointer: Checkpointer,
    sentinel: PathBuf,
}

impl<I: BusItem> BatteryMonitor<I> {
    /// Loads the persisted totals (defaults on absence), binds the four bus
    /// entities, republishes the resumed totals so every bus observer sees
    /// them immediately, and seeds voltage/current from a first read.
    ///
    /// Any failure here is returned to the caller; initialization failure
    /// is always fatal and never retried, but that policy belongs to the
    /// driver, not to this component.
    pub async fn init<B: ValueBus<Item = I>>(
        bus: &B,
        store: IndexStore,
        sentinel: PathBuf,
        now: DateTime<Local>,
    ) -> Result<Self, MonitorError> {
        let charged = store.load(CHARGED_INDEX)?.unwrap_or(0.0);
        let discharged = store.load(DISCHARGED_INDEX)?.unwrap_or(0.0);

        let items = EnergyItems::bind(bus).await?;

        items.charged.set(charged).await?;
        items.discharged.set(discharged).await?;

        let mut state = BatteryState::resumed(charged, discharged, now);
        state.voltage = items.voltage.get().await?;
        state.current = items.current.get().await?;
        state.samples_valid = true;

        info!(
            charged_kwh = charged,
            discharged_kwh = discharged,
            "battery monitor initialized"
        );

        Ok(Self {
            state,
            items,
            checkpointer: Checkpointer::new(store),
            sentinel,
        })
    }

    pub fn state(&self) -> &BatteryState {
        &self.state
    }

    /// One tick of the cycle. Sample failures are logged and survived;
    /// nothing escapes except the request to terminate.
    pub async fn tick(&mut self, now: DateTime<Local>) -> TickOutcome {
        if self.sentinel.is_file() {
            info!("shutdown sentinel found, terminating");
            if let Err(e) = fs::remove_file(&self.sentinel) {
                warn!(error = %e, "could not remove shutdown sentinel");
            }
            if let Err(e) = self.checkpointer.final_checkpoint(&self.state) {
                error!(error = %e, "final checkpoint failed, totals since last save are lost");
            }
            return TickOutcome::Shutdown;
        }

        // Elapsed time is wall-clock between ticks, not between successful
        // samples; a failed read invalidates the window via samples_valid.
        let elapsed_secs =
            (now - self.state.last_sample_time).num_milliseconds() as f64 / 1000.0;
        self.state.last_sample_time = now;

        let delta = integrator::integrate(
            self.state.voltage,
            self.state.current,
            elapsed_secs,
            self.state.samples_valid,
        );
        self.state.apply_delta(delta);

        match self.sync_bus().await {
            Ok(()) => self.state.samples_valid = true,
            Err(e) => {
                warn!(error = %e, "bus sync failed, next interval will not be integrated");
                self.state.samples_valid = false;
            }
        }

        let minute = now.minute();
        if Checkpointer::should_checkpoint(minute, self.state.historized_this_hour) {
            match self.checkpointer.checkpoint(&self.state) {
                Ok(()) => debug!(
                    charged_kwh = self.state.charged_energy,
                    discharged_kwh = self.state.discharged_energy,
                    "hourly checkpoint written"
                ),
                Err(e) => error!(error = %e, "hourly checkpoint failed, retrying next hour"),
            }
            self.state.historized_this_hour = true;
        }
        self.state.historized_this_hour =
            Checkpointer::update_latch(minute, self.state.historized_this_hour);

        TickOutcome::Continue
    }

    /// Publishes both accumulators, then refreshes voltage and current.
    /// The accumulators always go out as a complete pair before the reads.
    async fn sync_bus(&mut self) -> Result<(), BusError> {
        self.items.charged.set(self.state.charged_energy).await?;
        self.items.discharged.set(self.state.discharged_energy).await?;
        self.state.voltage = self.items.voltage.get().await?;
        self.state.current = self.items.current.get().await?;
        Ok(())
    }
}
