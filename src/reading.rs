//! Decoded advertisement readings, one variant per device kind.
//!
//! A [`Reading`] is the typed, already-decrypted snapshot of a single
//! advertisement frame. Fields are optional because not every physical
//! metric is present in every frame; absent fields are suppressed from the
//! emitted delta. Temperatures are in Celsius, state of charge in percent
//! (0-100), charge in amp-hours, energy in watt-hours and durations in
//! minutes; unit normalization happens in the transformer.

/// The closed set of device categories this engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    AcCharger,
    BatteryMonitor,
    BatterySense,
    DcDcConverter,
    DcEnergyMeter,
    Inverter,
    LynxSmartBms,
    OrionXs,
    SmartLithium,
    SolarCharger,
    VeBus,
}

/// Charger / inverter operation state shared across device kinds.
///
/// Emitted as its symbolic name, lower-cased.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Off,
    LowPower,
    Fault,
    Bulk,
    Absorption,
    Float,
    Storage,
    EqualizeManual,
    Inverting,
    PowerSupply,
    StartingUp,
    RepeatedAbsorption,
    AutoEqualize,
    BatterySafe,
    ExternalControl,
}

impl DeviceState {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Off),
            1 => Some(Self::LowPower),
            2 => Some(Self::Fault),
            3 => Some(Self::Bulk),
            4 => Some(Self::Absorption),
            5 => Some(Self::Float),
            6 => Some(Self::Storage),
            7 => Some(Self::EqualizeManual),
            8 => Some(Self::Inverting),
            9 => Some(Self::PowerSupply),
            11 => Some(Self::StartingUp),
            12 => Some(Self::RepeatedAbsorption),
            13 => Some(Self::AutoEqualize),
            14 => Some(Self::BatterySafe),
            252 => Some(Self::ExternalControl),
            _ => None,
        }
    }

    /// Lowercase symbolic name for delta output.
    pub fn name(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::LowPower => "low_power",
            Self::Fault => "fault",
            Self::Bulk => "bulk",
            Self::Absorption => "absorption",
            Self::Float => "float",
            Self::Storage => "storage",
            Self::EqualizeManual => "equalize_manual",
            Self::Inverting => "inverting",
            Self::PowerSupply => "power_supply",
            Self::StartingUp => "starting_up",
            Self::RepeatedAbsorption => "repeated_absorption",
            Self::AutoEqualize => "auto_equalize",
            Self::BatterySafe => "battery_safe",
            Self::ExternalControl => "external_control",
        }
    }
}

/// Charger fault codes. Unknown codes decode as absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargerError {
    NoError,
    TemperatureBatteryHigh,
    VoltageHigh,
    ChargerTemperatureTooHigh,
    ChargerOverCurrent,
    ChargerCurrentReversed,
    BulkTimeLimit,
    CurrentSensorIssue,
    TerminalsOverheated,
    ConverterIssue,
    InputVoltageTooHigh,
    InputCurrentTooHigh,
    InputShutdownVoltage,
    InputShutdownCurrent,
    LostCommunication,
    BmsConnectionLost,
    CalibrationDataLost,
    SettingsDataInvalid,
}

impl ChargerError {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::NoError),
            2 => Some(Self::TemperatureBatteryHigh),
            3 => Some(Self::VoltageHigh),
            17 => Some(Self::ChargerTemperatureTooHigh),
            18 => Some(Self::ChargerOverCurrent),
            19 => Some(Self::ChargerCurrentReversed),
            20 => Some(Self::BulkTimeLimit),
            21 => Some(Self::CurrentSensorIssue),
            26 => Some(Self::TerminalsOverheated),
            28 => Some(Self::ConverterIssue),
            33 => Some(Self::InputVoltageTooHigh),
            34 => Some(Self::InputCurrentTooHigh),
            38 => Some(Self::InputShutdownVoltage),
            39 => Some(Self::InputShutdownCurrent),
            65 => Some(Self::LostCommunication),
            67 => Some(Self::BmsConnectionLost),
            116 => Some(Self::CalibrationDataLost),
            119 => Some(Self::SettingsDataInvalid),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::NoError => "no_error",
            Self::TemperatureBatteryHigh => "temperature_battery_high",
            Self::VoltageHigh => "voltage_high",
            Self::ChargerTemperatureTooHigh => "charger_temperature_too_high",
            Self::ChargerOverCurrent => "charger_over_current",
            Self::ChargerCurrentReversed => "charger_current_reversed",
            Self::BulkTimeLimit => "bulk_time_limit",
            Self::CurrentSensorIssue => "current_sensor_issue",
            Self::TerminalsOverheated => "terminals_overheated",
            Self::ConverterIssue => "converter_issue",
            Self::InputVoltageTooHigh => "input_voltage_too_high",
            Self::InputCurrentTooHigh => "input_current_too_high",
            Self::InputShutdownVoltage => "input_shutdown_voltage",
            Self::InputShutdownCurrent => "input_shutdown_current",
            Self::LostCommunication => "lost_communication",
            Self::BmsConnectionLost => "bms_connection_lost",
            Self::CalibrationDataLost => "calibration_data_lost",
            Self::SettingsDataInvalid => "settings_data_invalid",
        }
    }
}

/// Reason a charger output is switched off. Single-flag values only;
/// unknown combinations decode as absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffReason {
    NoReason,
    NoInputPower,
    SwitchedOffPowerSwitch,
    SwitchedOffRegister,
    RemoteInput,
    ProtectionActive,
    Paygo,
    Bms,
    EngineShutdownDetection,
    AnalysingInputVoltage,
}

impl OffReason {
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0x0000_0000 => Some(Self::NoReason),
            0x0000_0001 => Some(Self::NoInputPower),
            0x0000_0002 => Some(Self::SwitchedOffPowerSwitch),
            0x0000_0004 => Some(Self::SwitchedOffRegister),
            0x0000_0008 => Some(Self::RemoteInput),
            0x0000_0010 => Some(Self::ProtectionActive),
            0x0000_0020 => Some(Self::Paygo),
            0x0000_0040 => Some(Self::Bms),
            0x0000_0080 => Some(Self::EngineShutdownDetection),
            0x0000_0100 => Some(Self::AnalysingInputVoltage),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::NoReason => "no_reason",
            Self::NoInputPower => "no_input_power",
            Self::SwitchedOffPowerSwitch => "switched_off_power_switch",
            Self::SwitchedOffRegister => "switched_off_register",
            Self::RemoteInput => "remote_input",
            Self::ProtectionActive => "protection_active",
            Self::Paygo => "paygo",
            Self::Bms => "bms",
            Self::EngineShutdownDetection => "engine_shutdown_detection",
            Self::AnalysingInputVoltage => "analysing_input_voltage",
        }
    }
}

/// What the auxiliary sensing channel of a monitor is wired to measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuxMode {
    StarterVoltage,
    MidpointVoltage,
    Temperature,
    #[default]
    Disabled,
}

impl AuxMode {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::StarterVoltage,
            1 => Self::MidpointVoltage,
            2 => Self::Temperature,
            _ => Self::Disabled,
        }
    }
}

/// Auxiliary channel sample, interpreted per [`AuxMode`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AuxInput {
    pub mode: AuxMode,
    /// Secondary battery voltage in volts, when mode is starter voltage.
    pub starter_voltage: Option<f64>,
    /// Auxiliary temperature in Celsius, when mode is temperature.
    pub temperature: Option<f64>,
}

/// What a configurable DC energy meter is installed to measure.
///
/// Negative codes are sources, positive codes loads, matching the wire
/// encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterType {
    SolarCharger,
    WindCharger,
    ShaftGenerator,
    Alternator,
    FuelCell,
    WaterGenerator,
    DcDcCharger,
    AcCharger,
    GenericSource,
    GenericLoad,
    ElectricDrive,
    Fridge,
    WaterPump,
    BilgePump,
    DcSystem,
    Inverter,
    WaterHeater,
}

impl MeterType {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -9 => Some(Self::SolarCharger),
            -8 => Some(Self::WindCharger),
            -7 => Some(Self::ShaftGenerator),
            -6 => Some(Self::Alternator),
            -5 => Some(Self::FuelCell),
            -4 => Some(Self::WaterGenerator),
            -3 => Some(Self::DcDcCharger),
            -2 => Some(Self::AcCharger),
            -1 => Some(Self::GenericSource),
            1 => Some(Self::GenericLoad),
            2 => Some(Self::ElectricDrive),
            3 => Some(Self::Fridge),
            4 => Some(Self::WaterPump),
            5 => Some(Self::BilgePump),
            6 => Some(Self::DcSystem),
            7 => Some(Self::Inverter),
            8 => Some(Self::WaterHeater),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatteryMonitorReading {
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub soc: Option<f64>,
    pub consumed_ah: Option<f64>,
    pub remaining_mins: Option<f64>,
    pub aux: AuxInput,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatterySenseReading {
    pub voltage: Option<f64>,
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DcDcConverterReading {
    pub charge_state: Option<DeviceState>,
    pub charger_error: Option<ChargerError>,
    pub off_reason: Option<OffReason>,
    pub input_voltage: Option<f64>,
    pub output_voltage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DcEnergyMeterReading {
    pub meter_type: Option<MeterType>,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub aux: AuxInput,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InverterReading {
    pub device_state: Option<DeviceState>,
    pub ac_apparent_power: Option<f64>,
    pub ac_voltage: Option<f64>,
    pub ac_current: Option<f64>,
    pub battery_voltage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LynxSmartBmsReading {
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub soc: Option<f64>,
    pub consumed_ah: Option<f64>,
    pub remaining_mins: Option<f64>,
    /// Battery temperature in Celsius.
    pub temperature: Option<f64>,
    pub aux: AuxInput,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrionXsReading {
    pub charge_state: Option<DeviceState>,
    pub charger_error: Option<ChargerError>,
    pub off_reason: Option<OffReason>,
    pub input_voltage: Option<f64>,
    pub input_current: Option<f64>,
    pub output_voltage: Option<f64>,
    pub output_current: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SmartLithiumReading {
    pub voltage: Option<f64>,
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SolarChargerReading {
    pub charge_state: Option<DeviceState>,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub solar_power: Option<f64>,
    pub load_current: Option<f64>,
    /// Energy harvested today in watt-hours.
    pub yield_today: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VeBusReading {
    pub device_state: Option<DeviceState>,
    pub ac_out_power: Option<f64>,
    pub battery_voltage: Option<f64>,
    pub battery_current: Option<f64>,
    pub battery_temperature: Option<f64>,
}

/// Per-phase output block of an AC charger.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AcChargerOutput {
    pub voltage: Option<f64>,
    pub current: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AcChargerReading {
    pub charge_state: Option<DeviceState>,
    pub temperature: Option<f64>,
    pub output1: AcChargerOutput,
    pub output2: AcChargerOutput,
    pub output3: AcChargerOutput,
}

/// The decoded, typed snapshot of one advertisement.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    AcCharger(AcChargerReading),
    BatteryMonitor(BatteryMonitorReading),
    BatterySense(BatterySenseReading),
    DcDcConverter(DcDcConverterReading),
    DcEnergyMeter(DcEnergyMeterReading),
    Inverter(InverterReading),
    LynxSmartBms(LynxSmartBmsReading),
    OrionXs(OrionXsReading),
    SmartLithium(SmartLithiumReading),
    SolarCharger(SolarChargerReading),
    VeBus(VeBusReading),
}

impl Reading {
    /// Runtime kind tag of this reading.
    pub fn kind(&self) -> DeviceKind {
        match self {
            Reading::AcCharger(_) => DeviceKind::AcCharger,
            Reading::BatteryMonitor(_) => DeviceKind::BatteryMonitor,
            Reading::BatterySense(_) => DeviceKind::BatterySense,
            Reading::DcDcConverter(_) => DeviceKind::DcDcConverter,
            Reading::DcEnergyMeter(_) => DeviceKind::DcEnergyMeter,
            Reading::Inverter(_) => DeviceKind::Inverter,
            Reading::LynxSmartBms(_) => DeviceKind::LynxSmartBms,
            Reading::OrionXs(_) => DeviceKind::OrionXs,
            Reading::SmartLithium(_) => DeviceKind::SmartLithium,
            Reading::SolarCharger(_) => DeviceKind::SolarCharger,
            Reading::VeBus(_) => DeviceKind::VeBus,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_state_names_are_lowercase() {
        assert_eq!(DeviceState::EqualizeManual.name(), "equalize_manual");
        assert_eq!(DeviceState::from_code(3), Some(DeviceState::Bulk));
        assert_eq!(DeviceState::from_code(10), None);
    }

    #[test]
    fn test_off_reason_single_flag_only() {
        assert_eq!(OffReason::from_bits(0), Some(OffReason::NoReason));
        assert_eq!(OffReason::from_bits(0x40), Some(OffReason::Bms));
        assert_eq!(OffReason::from_bits(0x41), None);
    }

    #[test]
    fn test_meter_type_codes() {
        assert_eq!(MeterType::from_code(-9), Some(MeterType::SolarCharger));
        assert_eq!(MeterType::from_code(7), Some(MeterType::Inverter));
        assert_eq!(MeterType::from_code(0), None);
        assert_eq!(MeterType::from_code(99), None);
    }

    #[test]
    fn test_reading_kind_tag() {
        let reading = Reading::BatteryMonitor(BatteryMonitorReading::default());
        assert_eq!(reading.kind(), DeviceKind::BatteryMonitor);
    }
}
