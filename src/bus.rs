//! Device-bus access for the monitored battery entities.
//!
//! The monitor only ever needs "bind a named value, read it as a number,
//! write a number back", so that seam is expressed as the [`ValueBus`] /
//! [`BusItem`] trait pair. The production implementation speaks the Victron
//! `com.victronenergy.BusItem` D-Bus interface, where every value travels
//! wrapped in a variant of whatever numeric width the publisher picked.

use async_trait::async_trait;
use zbus::zvariant::Value;
use zbus::{Connection, Proxy};

/// Battery voltage in volts (read-only).
pub const VOLTAGE_PATH: &str = "/Dc/0/Voltage";
/// Battery current in amps, positive while charging (read-only).
pub const CURRENT_PATH: &str = "/Dc/0/Current";
/// Cumulative charged energy in kWh (read/write).
pub const CHARGED_ENERGY_PATH: &str = "/History/ChargedEnergy";
/// Cumulative discharged energy in kWh (read/write).
pub const DISCHARGED_ENERGY_PATH: &str = "/History/DischargedEnergy";

const BUS_ITEM_INTERFACE: &str = "com.victronenergy.BusItem";

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("bus transport error: {0}")]
    Transport(#[from] zbus::Error),

    #[error("non-numeric value at {path} (signature {signature})")]
    NonNumeric { path: String, signature: String },
}

/// Connection to the device bus, able to bind named value entities.
#[async_trait]
pub trait ValueBus: Send + Sync {
    type Item: BusItem;

    async fn bind(&self, path: &str) -> Result<Self::Item, BusError>;
}

/// A bound value entity: unwrap to number on read, wrap from number on write.
#[async_trait]
pub trait BusItem: Send + Sync {
    async fn get(&self) -> Result<f64, BusError>;
    async fn set(&self, value: f64) -> Result<(), BusError>;
}

/// D-Bus implementation over the Victron `BusItem` interface.
pub struct DbusValueBus {
    connection: Connection,
    service: String,
}

impl DbusValueBus {
    /// Connects to the session bus when one is advertised in the
    /// environment (development), else to the system bus (the Venus
    /// device itself).
    pub async fn connect(service: &str) -> Result<Self, BusError> {
        let connection = if std::env::var_os("DBUS_SESSION_BUS_ADDRESS").is_some() {
            Connection::session().await?
        } else {
            Connection::system().await?
        };

        Ok(Self {
            connection,
            service: service.to_string(),
        })
    }
}

#[async_trait]
impl ValueBus for DbusValueBus {
    type Item = DbusBusItem;

    async fn bind(&self, path: &str) -> Result<DbusBusItem, BusError> {
        let proxy = Proxy::new(
            &self.connection,
            self.service.clone(),
            path.to_string(),
            BUS_ITEM_INTERFACE,
        )
        .await?;

        Ok(DbusBusItem {
            proxy,
            path: path.to_string(),
        })
    }
}

pub struct DbusBusItem {
    proxy: Proxy<'static>,
    path: String,
}

#[async_trait]
impl BusItem for DbusBusItem {
    async fn get(&self) -> Result<f64, BusError> {
        let value: zbus::zvariant::OwnedValue = self.proxy.call("GetValue", &()).await?;
        unwrap_number(&value).ok_or_else(|| BusError::NonNumeric {
            path: self.path.clone(),
            signature: value.value_signature().to_string(),
        })
    }

    async fn set(&self, value: f64) -> Result<(), BusError> {
        // SetValue returns a status int which is already reflected in the
        // call result; the payload itself is not interesting.
        let _: i32 = self.proxy.call("SetValue", &Value::F64(value)).await?;
        Ok(())
    }
}

/// Victron publishers wrap numbers in variants of assorted widths, sometimes
/// nested one level deep.
fn unwrap_number(value: &Value<'_>) -> Option<f64> {
    match value {
        Value::F64(v) => Some(*v),
        Value::U8(v) => Some(f64::from(*v)),
        Value::I16(v) => Some(f64::from(*v)),
        Value::U16(v) => Some(f64::from(*v)),
        Value::I32(v) => Some(f64::from(*v)),
        Value::U32(v) => Some(f64::from(*v)),
        Value::I64(v) => Some(*v as f64),
        Value::U64(v) => Some(*v as f64),
        Value::Value(inner) => unwrap_number(inner),
        _ => None,
    }
}
