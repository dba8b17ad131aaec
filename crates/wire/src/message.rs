// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed message catalog.
//!
//! The inbound type field is a closed enum: new message types are added
//! here deliberately, and anything unrecognized is a typed error the
//! dispatcher drops with a log line.

use crate::frame;
use evc_core::{CpId, CpState, DriverId};
use thiserror::Error;

/// DENY reasons issued by the Central.
pub mod reason {
    pub const CP_NOT_FOUND: &str = "CP_NOT_FOUND";
    pub const CP_ALREADY_IN_USE: &str = "CP_ALREADY_IN_USE";
    pub const CP_FAULT_EMERGENCY_STOP: &str = "CP_FAULT_EMERGENCY_STOP";
    pub const NOT_CURRENT_DRIVER: &str = "NOT_CURRENT_DRIVER";

    /// `CP_STATE_<token>` for a CP that is not Activated.
    pub fn cp_state(state: super::CpState) -> String {
        format!("CP_STATE_{}", state.wire_token())
    }
}

/// Message-level parse failures. The frame stays consumed; the connection
/// stays up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("unknown message type: {0:?}")]
    UnknownType(String),

    #[error("unknown REGISTER kind: {0:?}")]
    UnknownRegisterKind(String),

    #[error("{kind} expects {expected} fields, got {got}")]
    TooFewFields {
        kind: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{kind}: field {field} is not a decimal number: {value:?}")]
    InvalidNumber {
        kind: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("HEARTBEAT: unknown state token: {0:?}")]
    UnknownState(String),

    #[error("empty frame")]
    Empty,
}

/// Everything an agent can send to the Central.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    RegisterCp {
        cp_id: CpId,
        latitude: f64,
        longitude: f64,
        price_per_kwh: f64,
    },
    RegisterDriver {
        driver_id: DriverId,
    },
    RegisterMonitor {
        cp_id: CpId,
    },
    Heartbeat {
        cp_id: CpId,
        state: CpState,
    },
    RequestCharge {
        driver_id: DriverId,
        cp_id: CpId,
        energy: f64,
    },
    QueryAvailable {
        driver_id: DriverId,
    },
    SupplyUpdate {
        cp_id: CpId,
        energy_increment: f64,
        running_amount: f64,
    },
    SupplyEnd {
        cp_id: CpId,
        driver_id: DriverId,
        total_energy: f64,
        total_amount: f64,
    },
    EndCharge {
        driver_id: DriverId,
        cp_id: CpId,
    },
    Fault {
        cp_id: CpId,
    },
    Recovery {
        cp_id: CpId,
    },
    HealthOk {
        cp_id: CpId,
    },
    HealthKo {
        cp_id: CpId,
    },
}

fn require(kind: &'static str, fields: &[String], expected: usize) -> Result<(), MessageError> {
    if fields.len() < expected {
        return Err(MessageError::TooFewFields { kind, expected, got: fields.len() });
    }
    Ok(())
}

fn number(kind: &'static str, field: &'static str, value: &str) -> Result<f64, MessageError> {
    value.trim().parse::<f64>().map_err(|_| MessageError::InvalidNumber {
        kind,
        field,
        value: value.to_string(),
    })
}

impl Inbound {
    /// Parse the fields of one decoded frame.
    pub fn parse(fields: &[String]) -> Result<Self, MessageError> {
        let kind = fields.first().map(String::as_str).unwrap_or_default();
        if kind.is_empty() {
            return Err(MessageError::Empty);
        }

        match kind {
            "REGISTER" => Self::parse_register(fields),

            "HEARTBEAT" => {
                require("HEARTBEAT", fields, 3)?;
                let state = CpState::parse_wire_token(&fields[2])
                    .ok_or_else(|| MessageError::UnknownState(fields[2].clone()))?;
                Ok(Inbound::Heartbeat { cp_id: CpId::new(fields[1].as_str()), state })
            }

            "REQUEST_CHARGE" => {
                require("REQUEST_CHARGE", fields, 4)?;
                Ok(Inbound::RequestCharge {
                    driver_id: DriverId::new(fields[1].as_str()),
                    cp_id: CpId::new(fields[2].as_str()),
                    energy: number("REQUEST_CHARGE", "energy", &fields[3])?,
                })
            }

            "QUERY_AVAILABLE_CPS" => {
                require("QUERY_AVAILABLE_CPS", fields, 2)?;
                Ok(Inbound::QueryAvailable { driver_id: DriverId::new(fields[1].as_str()) })
            }

            "SUPPLY_UPDATE" => {
                require("SUPPLY_UPDATE", fields, 4)?;
                Ok(Inbound::SupplyUpdate {
                    cp_id: CpId::new(fields[1].as_str()),
                    energy_increment: number("SUPPLY_UPDATE", "energy_increment", &fields[2])?,
                    running_amount: number("SUPPLY_UPDATE", "running_amount", &fields[3])?,
                })
            }

            "SUPPLY_END" => {
                require("SUPPLY_END", fields, 5)?;
                Ok(Inbound::SupplyEnd {
                    cp_id: CpId::new(fields[1].as_str()),
                    driver_id: DriverId::new(fields[2].as_str()),
                    total_energy: number("SUPPLY_END", "total_energy", &fields[3])?,
                    total_amount: number("SUPPLY_END", "total_amount", &fields[4])?,
                })
            }

            "END_CHARGE" => {
                require("END_CHARGE", fields, 3)?;
                Ok(Inbound::EndCharge {
                    driver_id: DriverId::new(fields[1].as_str()),
                    cp_id: CpId::new(fields[2].as_str()),
                })
            }

            "FAULT" => {
                require("FAULT", fields, 2)?;
                Ok(Inbound::Fault { cp_id: CpId::new(fields[1].as_str()) })
            }

            "RECOVERY" => {
                require("RECOVERY", fields, 2)?;
                Ok(Inbound::Recovery { cp_id: CpId::new(fields[1].as_str()) })
            }

            "HEALTH_OK" => {
                require("HEALTH_OK", fields, 2)?;
                Ok(Inbound::HealthOk { cp_id: CpId::new(fields[1].as_str()) })
            }

            "HEALTH_KO" => {
                require("HEALTH_KO", fields, 2)?;
                Ok(Inbound::HealthKo { cp_id: CpId::new(fields[1].as_str()) })
            }

            other => Err(MessageError::UnknownType(other.to_string())),
        }
    }

    fn parse_register(fields: &[String]) -> Result<Self, MessageError> {
        require("REGISTER", fields, 2)?;
        match fields[1].as_str() {
            "CP" => {
                require("REGISTER CP", fields, 6)?;
                Ok(Inbound::RegisterCp {
                    cp_id: CpId::new(fields[2].as_str()),
                    latitude: number("REGISTER CP", "lat", &fields[3])?,
                    longitude: number("REGISTER CP", "lon", &fields[4])?,
                    price_per_kwh: number("REGISTER CP", "price", &fields[5])?,
                })
            }
            "DRIVER" => {
                require("REGISTER DRIVER", fields, 3)?;
                Ok(Inbound::RegisterDriver { driver_id: DriverId::new(fields[2].as_str()) })
            }
            // The fourth field repeats the monitored CP id.
            "MONITOR" => {
                require("REGISTER MONITOR", fields, 3)?;
                Ok(Inbound::RegisterMonitor { cp_id: CpId::new(fields[2].as_str()) })
            }
            other => Err(MessageError::UnknownRegisterKind(other.to_string())),
        }
    }
}

/// One row of an AVAILABLE_CPS listing.
#[derive(Debug, Clone, PartialEq)]
pub struct AvailableCp {
    pub cp_id: CpId,
    pub latitude: f64,
    pub longitude: f64,
    pub price_per_kwh: f64,
}

/// Everything the Central can push to an agent.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    AckOk {
        entity_id: String,
    },
    AckMonitor {
        cp_id: CpId,
    },
    /// AUTHORIZE to the driver carries the price; the CP form does not.
    AuthorizeDriver {
        driver_id: DriverId,
        cp_id: CpId,
        energy: f64,
        price: f64,
    },
    AuthorizeCp {
        driver_id: DriverId,
        cp_id: CpId,
        energy: f64,
    },
    Deny {
        driver_id: DriverId,
        cp_id: CpId,
        reason: String,
    },
    AvailableCps {
        cps: Vec<AvailableCp>,
    },
    SupplyUpdate {
        cp_id: CpId,
        energy_increment: f64,
        running_amount: f64,
    },
    Ticket {
        cp_id: CpId,
        total_energy: f64,
        total_amount: f64,
    },
    StopCommand {
        cp_id: CpId,
    },
    ResumeCommand {
        cp_id: CpId,
    },
    EndSupply {
        cp_id: CpId,
    },
    DriverStart {
        cp_id: CpId,
        driver_id: DriverId,
    },
    DriverStop {
        cp_id: CpId,
        driver_id: DriverId,
    },
    ChargingComplete {
        cp_id: CpId,
        driver_id: DriverId,
    },
}

fn num(v: f64) -> String {
    v.to_string()
}

impl Outbound {
    /// Field list in the normative order.
    pub fn fields(&self) -> Vec<String> {
        match self {
            Outbound::AckOk { entity_id } => {
                vec!["ACKNOWLEDGE".into(), entity_id.clone(), "OK".into()]
            }
            Outbound::AckMonitor { cp_id } => {
                vec!["ACKNOWLEDGE".into(), cp_id.to_string(), "MONITOR_OK".into()]
            }
            Outbound::AuthorizeDriver { driver_id, cp_id, energy, price } => vec![
                "AUTHORIZE".into(),
                driver_id.to_string(),
                cp_id.to_string(),
                num(*energy),
                num(*price),
            ],
            Outbound::AuthorizeCp { driver_id, cp_id, energy } => vec![
                "AUTHORIZE".into(),
                driver_id.to_string(),
                cp_id.to_string(),
                num(*energy),
            ],
            Outbound::Deny { driver_id, cp_id, reason } => vec![
                "DENY".into(),
                driver_id.to_string(),
                cp_id.to_string(),
                reason.clone(),
            ],
            Outbound::AvailableCps { cps } => {
                let mut fields = vec!["AVAILABLE_CPS".to_string()];
                for cp in cps {
                    fields.push(cp.cp_id.to_string());
                    fields.push(num(cp.latitude));
                    fields.push(num(cp.longitude));
                    fields.push(num(cp.price_per_kwh));
                }
                fields
            }
            Outbound::SupplyUpdate { cp_id, energy_increment, running_amount } => vec![
                "SUPPLY_UPDATE".into(),
                cp_id.to_string(),
                num(*energy_increment),
                num(*running_amount),
            ],
            Outbound::Ticket { cp_id, total_energy, total_amount } => vec![
                "TICKET".into(),
                cp_id.to_string(),
                num(*total_energy),
                num(*total_amount),
            ],
            Outbound::StopCommand { cp_id } => vec!["STOP_COMMAND".into(), cp_id.to_string()],
            Outbound::ResumeCommand { cp_id } => {
                vec!["RESUME_COMMAND".into(), cp_id.to_string()]
            }
            Outbound::EndSupply { cp_id } => vec!["END_SUPPLY".into(), cp_id.to_string()],
            Outbound::DriverStart { cp_id, driver_id } => {
                vec!["DRIVER_START".into(), cp_id.to_string(), driver_id.to_string()]
            }
            Outbound::DriverStop { cp_id, driver_id } => {
                vec!["DRIVER_STOP".into(), cp_id.to_string(), driver_id.to_string()]
            }
            Outbound::ChargingComplete { cp_id, driver_id } => {
                vec!["CHARGING_COMPLETE".into(), cp_id.to_string(), driver_id.to_string()]
            }
        }
    }

    /// Encode into one wire frame.
    pub fn encode(&self) -> Vec<u8> {
        frame::encode(&self.fields())
    }

    /// Message-type label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Outbound::AckOk { .. } | Outbound::AckMonitor { .. } => "ACKNOWLEDGE",
            Outbound::AuthorizeDriver { .. } | Outbound::AuthorizeCp { .. } => "AUTHORIZE",
            Outbound::Deny { .. } => "DENY",
            Outbound::AvailableCps { .. } => "AVAILABLE_CPS",
            Outbound::SupplyUpdate { .. } => "SUPPLY_UPDATE",
            Outbound::Ticket { .. } => "TICKET",
            Outbound::StopCommand { .. } => "STOP_COMMAND",
            Outbound::ResumeCommand { .. } => "RESUME_COMMAND",
            Outbound::EndSupply { .. } => "END_SUPPLY",
            Outbound::DriverStart { .. } => "DRIVER_START",
            Outbound::DriverStop { .. } => "DRIVER_STOP",
            Outbound::ChargingComplete { .. } => "CHARGING_COMPLETE",
        }
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
