//! Field transformation from typed readings into Signal K path/value pairs.
//!
//! One pure function per device kind, dispatched exhaustively over the
//! [`Reading`] variants. Universal rules:
//!
//! - temperatures are converted from Celsius to Kelvin
//! - state of charge becomes a 0-1 ratio
//! - amp-hours become coulombs, watt-hours joules, minutes seconds
//! - power is computed as voltage x current, never read as a raw field
//! - absent fields are omitted entirely, never emitted as nulls
//! - enumerated states are emitted as their lowercase symbolic name

use crate::config::ConfiguredDevice;
use crate::reading::{
    AcChargerOutput, AcChargerReading, AuxInput, AuxMode, BatteryMonitorReading,
    BatterySenseReading, DcDcConverterReading, DcEnergyMeterReading, InverterReading,
    LynxSmartBmsReading, MeterType, OrionXsReading, Reading, SmartLithiumReading,
    SolarChargerReading, VeBusReading,
};
use serde::Serialize;

/// A single leaf observation in the Signal K namespace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathValue {
    pub path: String,
    pub value: FieldValue,
}

/// Value payload of a [`PathValue`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(&'static str),
}

/// Celsius to Kelvin.
pub fn kelvin(celsius: f64) -> f64 {
    celsius + 273.15
}

/// Percent (0-100) to ratio (0-1).
pub fn ratio(percent: f64) -> f64 {
    percent / 100.0
}

/// Amp-hours to coulombs.
pub fn coulombs(amp_hours: f64) -> f64 {
    amp_hours * 3600.0
}

/// Watt-hours to joules.
pub fn joules(watt_hours: f64) -> f64 {
    watt_hours * 3600.0
}

/// Minutes to seconds.
pub fn seconds(minutes: f64) -> f64 {
    minutes * 60.0
}

fn power(voltage: Option<f64>, current: Option<f64>) -> Option<f64> {
    Some(voltage? * current?)
}

/// Ordered path/value collector rooted at one path prefix.
struct Values {
    prefix: String,
    out: Vec<PathValue>,
}

impl Values {
    fn new(prefix: String) -> Self {
        Self {
            prefix,
            out: Vec::new(),
        }
    }

    fn number(&mut self, leaf: &str, value: Option<f64>) {
        if let Some(value) = value {
            self.out.push(PathValue {
                path: format!("{}.{leaf}", self.prefix),
                value: FieldValue::Number(value),
            });
        }
    }

    fn name(&mut self, leaf: &str, value: Option<&'static str>) {
        if let Some(value) = value {
            self.out.push(PathValue {
                path: format!("{}.{leaf}", self.prefix),
                value: FieldValue::Text(value),
            });
        }
    }

    fn number_at(&mut self, path: String, value: Option<f64>) {
        if let Some(value) = value {
            self.out.push(PathValue {
                path,
                value: FieldValue::Number(value),
            });
        }
    }

    fn finish(self) -> Vec<PathValue> {
        self.out
    }
}

/// Map a typed reading into an ordered set of path/value pairs.
pub fn transform(device: &ConfiguredDevice, reading: &Reading) -> Vec<PathValue> {
    match reading {
        Reading::AcCharger(r) => ac_charger(device, r),
        Reading::BatteryMonitor(r) => battery_monitor(device, r),
        Reading::BatterySense(r) => battery_sense(device, r),
        Reading::DcDcConverter(r) => dcdc_converter(device, r),
        Reading::DcEnergyMeter(r) => dc_energy_meter(device, r),
        Reading::Inverter(r) => inverter(device, r),
        Reading::LynxSmartBms(r) => lynx_smart_bms(device, r),
        Reading::OrionXs(r) => orion_xs(device, r),
        Reading::SmartLithium(r) => smart_lithium(device, r),
        Reading::SolarCharger(r) => solar_charger(device, r),
        Reading::VeBus(r) => ve_bus(device, r),
    }
}

/// Auxiliary-channel remap shared by monitors with an aux sensing input.
///
/// Starter voltage goes to the configured secondary battery's voltage path;
/// an aux temperature goes to the primary device's own temperature path.
/// The branches are mutually exclusive, driven solely by the aux mode.
fn aux_channel(values: &mut Values, device: &ConfiguredDevice, aux: &AuxInput) {
    match aux.mode {
        AuxMode::StarterVoltage => {
            if let Some(secondary) = &device.secondary_battery {
                values.number_at(
                    format!("electrical.batteries.{secondary}.voltage"),
                    aux.starter_voltage,
                );
            }
        }
        AuxMode::Temperature => {
            values.number("temperature", aux.temperature.map(kelvin));
        }
        AuxMode::MidpointVoltage | AuxMode::Disabled => {}
    }
}

fn battery_monitor(device: &ConfiguredDevice, r: &BatteryMonitorReading) -> Vec<PathValue> {
    let mut values = Values::new(format!("electrical.batteries.{}", device.id));
    values.number("voltage", r.voltage);
    values.number("current", r.current);
    values.number("power", power(r.voltage, r.current));
    values.number("capacity.stateOfCharge", r.soc.map(ratio));
    values.number("capacity.dischargeSinceFull", r.consumed_ah.map(coulombs));
    values.number("capacity.timeRemaining", r.remaining_mins.map(seconds));
    aux_channel(&mut values, device, &r.aux);
    values.finish()
}

fn battery_sense(device: &ConfiguredDevice, r: &BatterySenseReading) -> Vec<PathValue> {
    let mut values = Values::new(format!("electrical.batteries.{}", device.id));
    values.number("temperature", r.temperature.map(kelvin));
    values.number("voltage", r.voltage);
    values.finish()
}

fn dcdc_converter(device: &ConfiguredDevice, r: &DcDcConverterReading) -> Vec<PathValue> {
    let mut values = Values::new(format!("electrical.converters.{}", device.id));
    values.name("chargerError", r.charger_error.map(|e| e.name()));
    values.name("chargerOffReason", r.off_reason.map(|o| o.name()));
    values.name("chargingMode", r.charge_state.map(|s| s.name()));
    values.number("input.voltage", r.input_voltage);
    values.number("output.voltage", r.output_voltage);
    values.finish()
}

/// Canonical path prefix for a configurable DC energy meter.
///
/// The category is chosen once per frame from the meter's configured
/// measurement type and determines every subsequent path's prefix. Loads go
/// to the non-standard `dc-load` category; unknown types fall back to
/// `batteries`.
fn meter_prefix(meter_type: Option<MeterType>, id: &str) -> String {
    use MeterType::*;
    match meter_type {
        Some(GenericLoad | ElectricDrive | Fridge | WaterPump | BilgePump | DcSystem
        | WaterHeater) => format!("electrical.dc-load.{id}"),
        Some(SolarCharger) => format!("electrical.solar.{id}"),
        Some(WindCharger | ShaftGenerator | FuelCell | WaterGenerator | DcDcCharger | AcCharger
        | GenericSource) => format!("electrical.chargers.{id}"),
        Some(Alternator) => format!("electrical.alternators.{id}"),
        Some(Inverter) => format!("electrical.inverters.{id}.dc"),
        None => format!("electrical.batteries.{id}"),
    }
}

fn dc_energy_meter(device: &ConfiguredDevice, r: &DcEnergyMeterReading) -> Vec<PathValue> {
    let mut values = Values::new(meter_prefix(r.meter_type, &device.id));
    values.number("voltage", r.voltage);
    values.number("current", r.current);
    values.number("power", power(r.voltage, r.current));
    aux_channel(&mut values, device, &r.aux);
    values.finish()
}

fn inverter(device: &ConfiguredDevice, r: &InverterReading) -> Vec<PathValue> {
    let mut values = Values::new(format!("electrical.inverters.{}", device.id));
    values.number("ac.apparentPower", r.ac_apparent_power);
    values.number("ac.current", r.ac_current);
    values.number("ac.lineNeutralVoltage", r.ac_voltage);
    values.number("dc.voltage", r.battery_voltage);
    values.name("inverterMode", r.device_state.map(|s| s.name()));
    values.finish()
}

fn lynx_smart_bms(device: &ConfiguredDevice, r: &LynxSmartBmsReading) -> Vec<PathValue> {
    let mut values = Values::new(format!("electrical.batteries.{}", device.id));
    values.number("voltage", r.voltage);
    values.number("current", r.current);
    values.number("power", power(r.voltage, r.current));
    values.number("temperature", r.temperature.map(kelvin));
    values.number("capacity.stateOfCharge", r.soc.map(ratio));
    values.number("capacity.dischargeSinceFull", r.consumed_ah.map(coulombs));
    values.number("capacity.timeRemaining", r.remaining_mins.map(seconds));
    aux_channel(&mut values, device, &r.aux);
    values.finish()
}

fn orion_xs(device: &ConfiguredDevice, r: &OrionXsReading) -> Vec<PathValue> {
    let mut values = Values::new(format!("electrical.converters.{}", device.id));
    values.name("chargingMode", r.charge_state.map(|s| s.name()));
    values.name("chargerError", r.charger_error.map(|e| e.name()));
    values.name("chargerOffReason", r.off_reason.map(|o| o.name()));
    values.number("input.voltage", r.input_voltage);
    values.number("input.current", r.input_current);
    values.number("output.voltage", r.output_voltage);
    values.number("output.current", r.output_current);
    values.finish()
}

fn smart_lithium(device: &ConfiguredDevice, r: &SmartLithiumReading) -> Vec<PathValue> {
    let mut values = Values::new(format!("electrical.batteries.{}", device.id));
    values.number("voltage", r.voltage);
    values.number("temperature", r.temperature.map(kelvin));
    values.finish()
}

fn solar_charger(device: &ConfiguredDevice, r: &SolarChargerReading) -> Vec<PathValue> {
    let mut values = Values::new(format!("electrical.solar.{}", device.id));
    values.name("chargingMode", r.charge_state.map(|s| s.name()));
    values.number("current", r.current);
    values.number("loadCurrent", r.load_current);
    values.number("panelPower", r.solar_power);
    values.number("voltage", r.voltage);
    values.number("yieldToday", r.yield_today.map(joules));
    values.finish()
}

fn ve_bus(device: &ConfiguredDevice, r: &VeBusReading) -> Vec<PathValue> {
    let mut values = Values::new(format!("electrical.inverters.{}", device.id));
    values.number("ac.apparentPower", r.ac_out_power);
    values.number("dc.current", r.battery_current);
    values.number("dc.temperature", r.battery_temperature.map(kelvin));
    values.number("dc.voltage", r.battery_voltage);
    values.name("inverterMode", r.device_state.map(|s| s.name()));
    values.finish()
}

fn ac_charger_phase(
    values: &mut Values,
    r: &AcChargerReading,
    output: &AcChargerOutput,
) {
    values.name("chargingMode", r.charge_state.map(|s| s.name()));
    values.number("current", output.current);
    values.number("temperature", r.temperature.map(kelvin));
    values.number("voltage", output.voltage);
}

fn ac_charger(device: &ConfiguredDevice, r: &AcChargerReading) -> Vec<PathValue> {
    // The primary phase is always emitted; phases 2 and 3 only when their
    // output voltage is present.
    let mut values = Values::new(format!("electrical.chargers.{}_1", device.id));
    ac_charger_phase(&mut values, r, &r.output1);
    let mut out = values.finish();

    for (index, output) in [(2, &r.output2), (3, &r.output3)] {
        if output.voltage.is_some() {
            let mut values = Values::new(format!("electrical.chargers.{}_{index}", device.id));
            ac_charger_phase(&mut values, r, output);
            out.extend(values.finish());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::DeviceState;
    use crate::test_utils::{house_device, house_device_with_secondary};

    fn number(path: &str, value: f64) -> PathValue {
        PathValue {
            path: path.to_string(),
            value: FieldValue::Number(value),
        }
    }

    fn text(path: &str, value: &'static str) -> PathValue {
        PathValue {
            path: path.to_string(),
            value: FieldValue::Text(value),
        }
    }

    fn paths(values: &[PathValue]) -> Vec<&str> {
        values.iter().map(|v| v.path.as_str()).collect()
    }

    #[test]
    fn test_temperature_conversion_law() {
        for celsius in [-273.15, -40.0, 0.0, 25.0, 100.0] {
            assert_eq!(kelvin(celsius) - 273.15, celsius);
        }
    }

    #[test]
    fn test_battery_monitor_full_scenario() {
        // Reference end-to-end frame from the design notes.
        let device = house_device();
        let reading = Reading::BatteryMonitor(BatteryMonitorReading {
            voltage: Some(12.6),
            current: Some(-3.2),
            soc: Some(87.5),
            consumed_ah: Some(10.0),
            remaining_mins: Some(240.0),
            aux: AuxInput::default(),
        });

        let values = transform(&device, &reading);
        assert_eq!(
            values,
            vec![
                number("electrical.batteries.house.voltage", 12.6),
                number("electrical.batteries.house.current", -3.2),
                number("electrical.batteries.house.power", -40.32),
                number("electrical.batteries.house.capacity.stateOfCharge", 0.875),
                number(
                    "electrical.batteries.house.capacity.dischargeSinceFull",
                    36000.0
                ),
                number("electrical.batteries.house.capacity.timeRemaining", 14400.0),
            ]
        );
    }

    #[test]
    fn test_absent_fields_are_suppressed() {
        let device = house_device();
        let reading = Reading::BatteryMonitor(BatteryMonitorReading {
            voltage: Some(12.6),
            ..BatteryMonitorReading::default()
        });

        let values = transform(&device, &reading);
        // No current means no power either.
        assert_eq!(
            values,
            vec![number("electrical.batteries.house.voltage", 12.6)]
        );
    }

    #[test]
    fn test_aux_starter_voltage_remaps_to_secondary_battery() {
        let device = house_device_with_secondary("starter");
        let reading = Reading::BatteryMonitor(BatteryMonitorReading {
            voltage: Some(12.6),
            aux: AuxInput {
                mode: AuxMode::StarterVoltage,
                starter_voltage: Some(12.88),
                temperature: None,
            },
            ..BatteryMonitorReading::default()
        });

        let values = transform(&device, &reading);
        assert_eq!(
            values,
            vec![
                number("electrical.batteries.house.voltage", 12.6),
                number("electrical.batteries.starter.voltage", 12.88),
            ]
        );
        assert!(!paths(&values).contains(&"electrical.batteries.house.temperature"));
    }

    #[test]
    fn test_aux_starter_voltage_without_secondary_is_dropped() {
        let device = house_device();
        let reading = Reading::BatteryMonitor(BatteryMonitorReading {
            aux: AuxInput {
                mode: AuxMode::StarterVoltage,
                starter_voltage: Some(12.88),
                temperature: None,
            },
            ..BatteryMonitorReading::default()
        });

        assert!(transform(&device, &reading).is_empty());
    }

    #[test]
    fn test_aux_temperature_stays_on_primary_device() {
        let device = house_device_with_secondary("starter");
        let reading = Reading::BatteryMonitor(BatteryMonitorReading {
            aux: AuxInput {
                mode: AuxMode::Temperature,
                starter_voltage: None,
                temperature: Some(25.0),
            },
            ..BatteryMonitorReading::default()
        });

        let values = transform(&device, &reading);
        assert_eq!(
            values,
            vec![number("electrical.batteries.house.temperature", 298.15)]
        );
    }

    #[test]
    fn test_meter_category_table_is_exhaustive() {
        use MeterType::*;
        let cases = [
            (GenericLoad, "electrical.dc-load.house"),
            (ElectricDrive, "electrical.dc-load.house"),
            (Fridge, "electrical.dc-load.house"),
            (WaterPump, "electrical.dc-load.house"),
            (BilgePump, "electrical.dc-load.house"),
            (DcSystem, "electrical.dc-load.house"),
            (WaterHeater, "electrical.dc-load.house"),
            (SolarCharger, "electrical.solar.house"),
            (WindCharger, "electrical.chargers.house"),
            (ShaftGenerator, "electrical.chargers.house"),
            (FuelCell, "electrical.chargers.house"),
            (WaterGenerator, "electrical.chargers.house"),
            (DcDcCharger, "electrical.chargers.house"),
            (AcCharger, "electrical.chargers.house"),
            (GenericSource, "electrical.chargers.house"),
            (Alternator, "electrical.alternators.house"),
            (Inverter, "electrical.inverters.house.dc"),
        ];
        for (meter_type, expected) in cases {
            assert_eq!(
                meter_prefix(Some(meter_type), "house"),
                expected,
                "meter type {meter_type:?}"
            );
        }
        assert_eq!(meter_prefix(None, "house"), "electrical.batteries.house");
    }

    #[test]
    fn test_dc_energy_meter_values_follow_category() {
        let device = house_device();
        let reading = Reading::DcEnergyMeter(DcEnergyMeterReading {
            meter_type: Some(MeterType::Alternator),
            voltage: Some(14.2),
            current: Some(30.0),
            aux: AuxInput::default(),
        });

        let values = transform(&device, &reading);
        assert_eq!(
            values,
            vec![
                number("electrical.alternators.house.voltage", 14.2),
                number("electrical.alternators.house.current", 30.0),
                number("electrical.alternators.house.power", 14.2 * 30.0),
            ]
        );
    }

    #[test]
    fn test_ac_charger_emits_only_present_phases() {
        let device = house_device();
        let reading = Reading::AcCharger(AcChargerReading {
            charge_state: Some(DeviceState::Bulk),
            temperature: Some(25.0),
            output1: AcChargerOutput {
                voltage: Some(14.4),
                current: Some(5.0),
            },
            output2: AcChargerOutput {
                voltage: Some(14.3),
                current: Some(4.0),
            },
            output3: AcChargerOutput::default(),
        });

        let values = transform(&device, &reading);
        assert_eq!(
            values,
            vec![
                text("electrical.chargers.house_1.chargingMode", "bulk"),
                number("electrical.chargers.house_1.current", 5.0),
                number("electrical.chargers.house_1.temperature", 298.15),
                number("electrical.chargers.house_1.voltage", 14.4),
                text("electrical.chargers.house_2.chargingMode", "bulk"),
                number("electrical.chargers.house_2.current", 4.0),
                number("electrical.chargers.house_2.temperature", 298.15),
                number("electrical.chargers.house_2.voltage", 14.3),
            ]
        );
    }

    #[test]
    fn test_solar_charger_yield_is_joules() {
        let device = house_device();
        let reading = Reading::SolarCharger(SolarChargerReading {
            charge_state: Some(DeviceState::Bulk),
            voltage: Some(13.2),
            current: Some(8.5),
            solar_power: Some(118.0),
            load_current: None,
            yield_today: Some(420.0),
        });

        let values = transform(&device, &reading);
        assert_eq!(
            values,
            vec![
                text("electrical.solar.house.chargingMode", "bulk"),
                number("electrical.solar.house.current", 8.5),
                number("electrical.solar.house.panelPower", 118.0),
                number("electrical.solar.house.voltage", 13.2),
                number("electrical.solar.house.yieldToday", 420.0 * 3600.0),
            ]
        );
    }

    #[test]
    fn test_dcdc_converter_enum_names() {
        use crate::reading::{ChargerError, OffReason};
        let device = house_device();
        let reading = Reading::DcDcConverter(DcDcConverterReading {
            charge_state: Some(DeviceState::Bulk),
            charger_error: Some(ChargerError::NoError),
            off_reason: Some(OffReason::EngineShutdownDetection),
            input_voltage: Some(12.8),
            output_voltage: None,
        });

        let values = transform(&device, &reading);
        assert_eq!(
            values,
            vec![
                text("electrical.converters.house.chargerError", "no_error"),
                text(
                    "electrical.converters.house.chargerOffReason",
                    "engine_shutdown_detection"
                ),
                text("electrical.converters.house.chargingMode", "bulk"),
                number("electrical.converters.house.input.voltage", 12.8),
            ]
        );
    }

    #[test]
    fn test_ve_bus_values() {
        let device = house_device();
        let reading = Reading::VeBus(VeBusReading {
            device_state: Some(DeviceState::Inverting),
            ac_out_power: Some(350.0),
            battery_voltage: Some(25.6),
            battery_current: Some(-14.0),
            battery_temperature: Some(30.0),
        });

        let values = transform(&device, &reading);
        assert_eq!(
            values,
            vec![
                number("electrical.inverters.house.ac.apparentPower", 350.0),
                number("electrical.inverters.house.dc.current", -14.0),
                number("electrical.inverters.house.dc.temperature", 303.15),
                number("electrical.inverters.house.dc.voltage", 25.6),
                text("electrical.inverters.house.inverterMode", "inverting"),
            ]
        );
    }

    #[test]
    fn test_lynx_smart_bms_aux_remap() {
        let device = house_device_with_secondary("starter");
        let reading = Reading::LynxSmartBms(LynxSmartBmsReading {
            voltage: Some(26.0),
            current: Some(10.0),
            soc: Some(90.0),
            consumed_ah: Some(5.0),
            remaining_mins: Some(600.0),
            temperature: Some(20.0),
            aux: AuxInput {
                mode: AuxMode::StarterVoltage,
                starter_voltage: Some(12.5),
                temperature: None,
            },
        });

        let values = transform(&device, &reading);
        assert_eq!(
            paths(&values),
            vec![
                "electrical.batteries.house.voltage",
                "electrical.batteries.house.current",
                "electrical.batteries.house.power",
                "electrical.batteries.house.temperature",
                "electrical.batteries.house.capacity.stateOfCharge",
                "electrical.batteries.house.capacity.dischargeSinceFull",
                "electrical.batteries.house.capacity.timeRemaining",
                "electrical.batteries.starter.voltage",
            ]
        );
    }

    #[test]
    fn test_transform_is_pure() {
        let device = house_device_with_secondary("starter");
        let reading = Reading::BatteryMonitor(BatteryMonitorReading {
            voltage: Some(12.6),
            current: Some(-3.2),
            soc: Some(87.5),
            consumed_ah: Some(10.0),
            remaining_mins: Some(240.0),
            aux: AuxInput {
                mode: AuxMode::StarterVoltage,
                starter_voltage: Some(12.88),
                temperature: None,
            },
        });

        assert_eq!(transform(&device, &reading), transform(&device, &reading));
    }
}
