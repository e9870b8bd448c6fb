/// LiPo voltage to display percentage, clamped to the 3.0–4.2 V range
/// the board reports.
pub fn percentage_from_voltage(voltage: f32) -> u8 {
    if voltage <= 3.0 {
        return 0;
    }
    if voltage >= 4.2 {
        return 100;
    }
    (((voltage - 3.0) / 1.2) * 100.0).round() as u8
}
