//! Inventory presentation for the CLI.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::Serialize;

use beacon_core::Device;

/// Device counts per brand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InventorySummary {
    pub total: usize,
    pub by_brand: BTreeMap<String, usize>,
}

impl InventorySummary {
    pub fn from_devices(devices: &[Device]) -> Self {
        let mut by_brand = BTreeMap::new();
        for device in devices {
            *by_brand.entry(device.brand.clone()).or_insert(0) += 1;
        }
        Self {
            total: devices.len(),
            by_brand,
        }
    }
}

/// Sort devices for display: by brand, then IP, then MAC.
pub fn sort_devices(devices: &mut [Device]) {
    devices.sort_by(|a, b| {
        a.brand
            .cmp(&b.brand)
            .then_with(|| a.ip.cmp(&b.ip))
            .then_with(|| a.mac.cmp(&b.mac))
    });
}

const HEADERS: [&str; 7] = ["BRAND", "NAME", "IP", "MAC", "MODEL", "FIRMWARE", "LAST SEEN"];

/// Render devices as a fixed-width text table.
pub fn render_table(devices: &[Device]) -> String {
    let rows: Vec<[String; 7]> = devices
        .iter()
        .map(|d| {
            [
                d.brand.clone(),
                d.name.clone(),
                d.ip.clone(),
                d.mac.clone(),
                d.model.clone(),
                d.firmware.clone(),
                d.last_seen.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &widths, HEADERS.iter().copied());
    for row in &rows {
        push_row(&mut out, &widths, row.iter().map(String::as_str));
    }
    let _ = writeln!(out, "{} device(s)", devices.len());
    out
}

fn push_row<'a>(out: &mut String, widths: &[usize; 7], cells: impl Iterator<Item = &'a str>) {
    let line: Vec<String> = cells
        .zip(widths.iter().copied())
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    let _ = writeln!(out, "{}", line.join("  ").trim_end());
}
