//! Production decoder for Victron "extra manufacturer data" advertisements.
//!
//! Frame layout (manufacturer data for company ID 0x02E1):
//!
//! ```text
//! byte 0      0x10 product advertisement marker
//! bytes 1-2   model id, little endian
//! byte 3      record type (device kind discriminator)
//! bytes 4-5   encryption nonce, little endian
//! byte 6      first byte of the advertisement key (sanity check)
//! bytes 7..   AES-128-CTR encrypted payload
//! ```
//!
//! Payload fields are packed as little-endian bit fields, LSB first.
//! All-ones bit patterns mean "not available" and decode as `None`.

use super::{DecodeError, FrameDecoder};
use crate::reading::{
    AcChargerOutput, AcChargerReading, AuxInput, AuxMode, BatteryMonitorReading,
    BatterySenseReading, ChargerError, DcDcConverterReading, DcEnergyMeterReading, DeviceKind,
    DeviceState, InverterReading, LynxSmartBmsReading, MeterType, OffReason, OrionXsReading,
    Reading, SmartLithiumReading, SolarChargerReading, VeBusReading,
};
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{KeyIvInit, StreamCipher};
use aes::Aes128;

type Aes128Ctr = ctr::Ctr128LE<Aes128>;

const PRODUCT_ADVERTISEMENT: u8 = 0x10;
const HEADER_LEN: usize = 7;

const RECORD_SOLAR_CHARGER: u8 = 0x01;
const RECORD_BATTERY_MONITOR: u8 = 0x02;
const RECORD_INVERTER: u8 = 0x03;
const RECORD_DCDC_CONVERTER: u8 = 0x04;
const RECORD_SMART_LITHIUM: u8 = 0x05;
const RECORD_AC_CHARGER: u8 = 0x08;
const RECORD_LYNX_SMART_BMS: u8 = 0x0A;
const RECORD_VE_BUS: u8 = 0x0C;
const RECORD_DC_ENERGY_METER: u8 = 0x0D;
const RECORD_ORION_XS: u8 = 0x0F;

/// Smart Battery Sense shares the battery monitor record type and is told
/// apart by model id.
const MODEL_BATTERY_SENSE: [u16; 2] = [0xA3A4, 0xA3A5];

/// Kelvin offset for aux temperature fields carried as centi-Kelvin.
const KELVIN_OFFSET: f64 = 273.15;

/// Offset for temperature fields carried as degrees above -40 C.
const TEMPERATURE_OFFSET: f64 = 40.0;

/// Stateless production decoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct VictronDecoder;

impl FrameDecoder for VictronDecoder {
    fn detect_kind(&self, frame: &[u8]) -> Result<DeviceKind, DecodeError> {
        let header = FrameHeader::split(frame)?.0;
        match header.record_type {
            RECORD_SOLAR_CHARGER => Ok(DeviceKind::SolarCharger),
            RECORD_BATTERY_MONITOR if MODEL_BATTERY_SENSE.contains(&header.model_id) => {
                Ok(DeviceKind::BatterySense)
            }
            RECORD_BATTERY_MONITOR => Ok(DeviceKind::BatteryMonitor),
            RECORD_INVERTER => Ok(DeviceKind::Inverter),
            RECORD_DCDC_CONVERTER => Ok(DeviceKind::DcDcConverter),
            RECORD_SMART_LITHIUM => Ok(DeviceKind::SmartLithium),
            RECORD_AC_CHARGER => Ok(DeviceKind::AcCharger),
            RECORD_LYNX_SMART_BMS => Ok(DeviceKind::LynxSmartBms),
            RECORD_VE_BUS => Ok(DeviceKind::VeBus),
            RECORD_DC_ENERGY_METER => Ok(DeviceKind::DcEnergyMeter),
            RECORD_ORION_XS => Ok(DeviceKind::OrionXs),
            record_type => Err(DecodeError::UnknownDeviceKind { record_type }),
        }
    }

    fn decode(
        &self,
        key: &[u8; 16],
        kind: DeviceKind,
        frame: &[u8],
    ) -> Result<Reading, DecodeError> {
        let (header, ciphertext) = FrameHeader::split(frame)?;
        if header.key_check != key[0] {
            return Err(DecodeError::KeyMismatch);
        }
        let payload = decrypt(key, header.nonce, ciphertext);
        let mut bits = BitReader::new(&payload);
        match kind {
            DeviceKind::AcCharger => parse_ac_charger(&mut bits),
            DeviceKind::BatteryMonitor => {
                Ok(Reading::BatteryMonitor(parse_battery_monitor(&mut bits)?))
            }
            DeviceKind::BatterySense => parse_battery_sense(&mut bits),
            DeviceKind::DcDcConverter => parse_dcdc_converter(&mut bits),
            DeviceKind::DcEnergyMeter => parse_dc_energy_meter(&mut bits),
            DeviceKind::Inverter => parse_inverter(&mut bits),
            DeviceKind::LynxSmartBms => parse_lynx_smart_bms(&mut bits),
            DeviceKind::OrionXs => parse_orion_xs(&mut bits),
            DeviceKind::SmartLithium => parse_smart_lithium(&mut bits),
            DeviceKind::SolarCharger => parse_solar_charger(&mut bits),
            DeviceKind::VeBus => parse_ve_bus(&mut bits),
        }
    }
}

/// Cleartext prefix of an advertisement frame.
#[derive(Debug, Clone, Copy, PartialEq)]
struct FrameHeader {
    model_id: u16,
    record_type: u8,
    nonce: u16,
    key_check: u8,
}

impl FrameHeader {
    fn split(frame: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        if frame.len() < HEADER_LEN + 1 {
            return Err(DecodeError::Malformed(format!(
                "frame too short: {} bytes",
                frame.len()
            )));
        }
        if frame[0] != PRODUCT_ADVERTISEMENT {
            return Err(DecodeError::Malformed(format!(
                "unexpected advertisement marker {:#04x}",
                frame[0]
            )));
        }
        let header = FrameHeader {
            model_id: u16::from_le_bytes([frame[1], frame[2]]),
            record_type: frame[3],
            nonce: u16::from_le_bytes([frame[4], frame[5]]),
            key_check: frame[6],
        };
        Ok((header, &frame[HEADER_LEN..]))
    }
}

fn decrypt(key: &[u8; 16], nonce: u16, ciphertext: &[u8]) -> Vec<u8> {
    let mut iv = [0u8; 16];
    iv[..2].copy_from_slice(&nonce.to_le_bytes());
    let mut cipher = Aes128Ctr::new(GenericArray::from_slice(key), GenericArray::from_slice(&iv));
    let mut payload = ciphertext.to_vec();
    cipher.apply_keystream(&mut payload);
    payload
}

/// Reads little-endian bit fields, LSB first across bytes.
struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read_unsigned(&mut self, bits: u32) -> Result<u32, DecodeError> {
        debug_assert!(bits <= 32);
        let mut value = 0u32;
        for i in 0..bits {
            let byte = self.pos / 8;
            let bit = self.pos % 8;
            let Some(source) = self.data.get(byte) else {
                return Err(DecodeError::Malformed("truncated payload".into()));
            };
            value |= u32::from((source >> bit) & 1) << i;
            self.pos += 1;
        }
        Ok(value)
    }

    fn read_signed(&mut self, bits: u32) -> Result<i32, DecodeError> {
        let raw = self.read_unsigned(bits)?;
        if bits < 32 && raw & (1 << (bits - 1)) != 0 {
            Ok((raw | !((1u32 << bits) - 1)) as i32)
        } else {
            Ok(raw as i32)
        }
    }

    /// Unsigned field with the all-ones "not available" sentinel.
    fn read_opt_unsigned(&mut self, bits: u32) -> Result<Option<u32>, DecodeError> {
        let raw = self.read_unsigned(bits)?;
        Ok((raw != sentinel_unsigned(bits)).then_some(raw))
    }

    /// Signed field with the maximum-positive "not available" sentinel.
    fn read_opt_signed(&mut self, bits: u32) -> Result<Option<i32>, DecodeError> {
        let raw = self.read_signed(bits)?;
        Ok((raw != sentinel_signed(bits)).then_some(raw))
    }
}

fn sentinel_unsigned(bits: u32) -> u32 {
    ((1u64 << bits) - 1) as u32
}

fn sentinel_signed(bits: u32) -> i32 {
    ((1u64 << (bits - 1)) - 1) as i32
}

fn scaled(raw: Option<u32>, scale: f64) -> Option<f64> {
    raw.map(|v| f64::from(v) * scale)
}

fn scaled_signed(raw: Option<i32>, scale: f64) -> Option<f64> {
    raw.map(|v| f64::from(v) * scale)
}

/// Temperature carried as whole degrees above -40 C, 0x7F not available.
fn read_temperature(bits: &mut BitReader<'_>) -> Result<Option<f64>, DecodeError> {
    Ok(bits
        .read_opt_unsigned(7)?
        .map(|v| f64::from(v) - TEMPERATURE_OFFSET))
}

fn read_aux(bits: &mut BitReader<'_>) -> Result<AuxInput, DecodeError> {
    let raw = bits.read_unsigned(16)?;
    let mode = AuxMode::from_code(bits.read_unsigned(2)? as u8);
    let mut aux = AuxInput {
        mode,
        ..AuxInput::default()
    };
    match mode {
        AuxMode::StarterVoltage => {
            let value = raw as u16 as i16;
            if value != sentinel_signed(16) as i16 {
                aux.starter_voltage = Some(f64::from(value) / 100.0);
            }
        }
        AuxMode::Temperature => {
            // Centi-Kelvin on the wire, Celsius in the reading.
            if raw != sentinel_unsigned(16) {
                aux.temperature = Some(f64::from(raw) / 100.0 - KELVIN_OFFSET);
            }
        }
        AuxMode::MidpointVoltage | AuxMode::Disabled => {}
    }
    Ok(aux)
}

fn parse_battery_monitor(bits: &mut BitReader<'_>) -> Result<BatteryMonitorReading, DecodeError> {
    let remaining_mins = scaled(bits.read_opt_unsigned(16)?, 1.0);
    let voltage = scaled_signed(bits.read_opt_signed(16)?, 0.01);
    let _alarm = bits.read_unsigned(16)?;
    let aux = read_aux(bits)?;
    let current = scaled_signed(bits.read_opt_signed(22)?, 0.001);
    let consumed_ah = scaled(bits.read_opt_unsigned(20)?, 0.1);
    let soc = scaled(bits.read_opt_unsigned(10)?, 0.1);
    Ok(BatteryMonitorReading {
        voltage,
        current,
        soc,
        consumed_ah,
        remaining_mins,
        aux,
    })
}

fn parse_battery_sense(bits: &mut BitReader<'_>) -> Result<Reading, DecodeError> {
    // Battery monitor record layout with the aux channel fixed to temperature.
    let monitor = parse_battery_monitor(bits)?;
    Ok(Reading::BatterySense(BatterySenseReading {
        voltage: monitor.voltage,
        temperature: monitor.aux.temperature,
    }))
}

fn parse_solar_charger(bits: &mut BitReader<'_>) -> Result<Reading, DecodeError> {
    let charge_state = bits
        .read_opt_unsigned(8)?
        .and_then(|v| DeviceState::from_code(v as u8));
    let _charger_error = bits.read_unsigned(8)?;
    let voltage = scaled_signed(bits.read_opt_signed(16)?, 0.01);
    let current = scaled_signed(bits.read_opt_signed(16)?, 0.1);
    // 0.01 kWh resolution on the wire, watt-hours in the reading.
    let yield_today = scaled(bits.read_opt_unsigned(16)?, 10.0);
    let solar_power = scaled(bits.read_opt_unsigned(16)?, 1.0);
    let load_current = scaled(bits.read_opt_unsigned(9)?, 0.1);
    Ok(Reading::SolarCharger(SolarChargerReading {
        charge_state,
        voltage,
        current,
        solar_power,
        load_current,
        yield_today,
    }))
}

fn parse_inverter(bits: &mut BitReader<'_>) -> Result<Reading, DecodeError> {
    let device_state = bits
        .read_opt_unsigned(8)?
        .and_then(|v| DeviceState::from_code(v as u8));
    let _alarm = bits.read_unsigned(16)?;
    let battery_voltage = scaled_signed(bits.read_opt_signed(16)?, 0.01);
    let ac_apparent_power = scaled(bits.read_opt_unsigned(16)?, 1.0);
    let ac_voltage = scaled(bits.read_opt_unsigned(15)?, 0.01);
    let ac_current = scaled(bits.read_opt_unsigned(11)?, 0.1);
    Ok(Reading::Inverter(InverterReading {
        device_state,
        ac_apparent_power,
        ac_voltage,
        ac_current,
        battery_voltage,
    }))
}

fn parse_dcdc_converter(bits: &mut BitReader<'_>) -> Result<Reading, DecodeError> {
    let charge_state = bits
        .read_opt_unsigned(8)?
        .and_then(|v| DeviceState::from_code(v as u8));
    let charger_error = bits
        .read_opt_unsigned(8)?
        .and_then(|v| ChargerError::from_code(v as u8));
    let input_voltage = scaled(bits.read_opt_unsigned(16)?, 0.01);
    let output_voltage = scaled_signed(bits.read_opt_signed(16)?, 0.01);
    let off_reason = OffReason::from_bits(bits.read_unsigned(32)?);
    Ok(Reading::DcDcConverter(DcDcConverterReading {
        charge_state,
        charger_error,
        off_reason,
        input_voltage,
        output_voltage,
    }))
}

fn parse_smart_lithium(bits: &mut BitReader<'_>) -> Result<Reading, DecodeError> {
    let _bms_flags = bits.read_unsigned(32)?;
    let _error = bits.read_unsigned(16)?;
    for _ in 0..7 {
        let _cell = bits.read_unsigned(7)?;
    }
    let _balancer_status = bits.read_unsigned(4)?;
    let voltage = scaled(bits.read_opt_unsigned(12)?, 0.01);
    let temperature = read_temperature(bits)?;
    Ok(Reading::SmartLithium(SmartLithiumReading {
        voltage,
        temperature,
    }))
}

fn parse_ac_charger(bits: &mut BitReader<'_>) -> Result<Reading, DecodeError> {
    let charge_state = bits
        .read_opt_unsigned(8)?
        .and_then(|v| DeviceState::from_code(v as u8));
    let _charger_error = bits.read_unsigned(8)?;
    let mut outputs = [AcChargerOutput::default(); 3];
    for output in &mut outputs {
        output.voltage = scaled(bits.read_opt_unsigned(13)?, 0.01);
        output.current = scaled(bits.read_opt_unsigned(11)?, 0.1);
    }
    let temperature = read_temperature(bits)?;
    let _ac_current = bits.read_opt_unsigned(9)?;
    let [output1, output2, output3] = outputs;
    Ok(Reading::AcCharger(AcChargerReading {
        charge_state,
        temperature,
        output1,
        output2,
        output3,
    }))
}

fn parse_lynx_smart_bms(bits: &mut BitReader<'_>) -> Result<Reading, DecodeError> {
    let _error = bits.read_unsigned(8)?;
    let remaining_mins = scaled(bits.read_opt_unsigned(16)?, 1.0);
    let voltage = scaled_signed(bits.read_opt_signed(16)?, 0.01);
    let current = scaled_signed(bits.read_opt_signed(16)?, 0.1);
    let _io_status = bits.read_unsigned(16)?;
    let _warnings_alarms = bits.read_unsigned(18)?;
    let soc = scaled(bits.read_opt_unsigned(10)?, 0.1);
    let consumed_ah = scaled(bits.read_opt_unsigned(20)?, 0.1);
    let temperature = read_temperature(bits)?;
    let aux = read_aux(bits)?;
    Ok(Reading::LynxSmartBms(LynxSmartBmsReading {
        voltage,
        current,
        soc,
        consumed_ah,
        remaining_mins,
        temperature,
        aux,
    }))
}

fn parse_ve_bus(bits: &mut BitReader<'_>) -> Result<Reading, DecodeError> {
    let device_state = bits
        .read_opt_unsigned(8)?
        .and_then(|v| DeviceState::from_code(v as u8));
    let _error = bits.read_unsigned(8)?;
    let battery_current = scaled_signed(bits.read_opt_signed(16)?, 0.1);
    let battery_voltage = scaled(bits.read_opt_unsigned(14)?, 0.01);
    let _active_ac_in = bits.read_unsigned(2)?;
    let _active_ac_in_power = bits.read_opt_signed(19)?;
    let ac_out_power = scaled_signed(bits.read_opt_signed(19)?, 1.0);
    let _alarm = bits.read_unsigned(2)?;
    let battery_temperature = read_temperature(bits)?;
    let _soc = bits.read_opt_unsigned(7)?;
    Ok(Reading::VeBus(VeBusReading {
        device_state,
        ac_out_power,
        battery_voltage,
        battery_current,
        battery_temperature,
    }))
}

fn parse_dc_energy_meter(bits: &mut BitReader<'_>) -> Result<Reading, DecodeError> {
    let meter_type = MeterType::from_code(bits.read_signed(16)?);
    let voltage = scaled_signed(bits.read_opt_signed(16)?, 0.01);
    let _alarm = bits.read_unsigned(16)?;
    let aux = read_aux(bits)?;
    let current = scaled_signed(bits.read_opt_signed(22)?, 0.001);
    Ok(Reading::DcEnergyMeter(DcEnergyMeterReading {
        meter_type,
        voltage,
        current,
        aux,
    }))
}

fn parse_orion_xs(bits: &mut BitReader<'_>) -> Result<Reading, DecodeError> {
    let charge_state = bits
        .read_opt_unsigned(8)?
        .and_then(|v| DeviceState::from_code(v as u8));
    let charger_error = bits
        .read_opt_unsigned(8)?
        .and_then(|v| ChargerError::from_code(v as u8));
    let output_voltage = scaled_signed(bits.read_opt_signed(16)?, 0.01);
    let output_current = scaled_signed(bits.read_opt_signed(16)?, 0.1);
    let input_voltage = scaled_signed(bits.read_opt_signed(16)?, 0.01);
    let input_current = scaled_signed(bits.read_opt_signed(16)?, 0.1);
    let off_reason = OffReason::from_bits(bits.read_unsigned(32)?);
    Ok(Reading::OrionXs(OrionXsReading {
        charge_state,
        charger_error,
        off_reason,
        input_voltage,
        input_current,
        output_voltage,
        output_current,
    }))
}
