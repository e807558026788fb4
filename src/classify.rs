//! Category classification over mapped components
//!
//! The taxonomy is fixed; rule order is deterministic and first-match wins.
//! Keywords are scanned over the lowercased description, keywords field and
//! target symbol.

use serde::{Deserialize, Serialize};

use crate::mapping::{keyword_in, MappedComponent};

/// Fixed category taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Resistors,
    Capacitors,
    Inductors,
    Diodes,
    Transistors,
    IntegratedCircuits,
    Connectors,
    Mechanical,
    CrystalsOscillators,
    Sensors,
    PowerManagement,
    Microcontrollers,
    Memory,
    Analog,
    Digital,
    Rf,
    Optoelectronics,
    TestPoints,
    Uncategorized,
}

/// One taxonomy entry; parents precede children in declaration order so the
/// store can assign ids in a single pass.
pub struct CategoryDef {
    pub category: Category,
    pub name: &'static str,
    pub description: &'static str,
    pub parent: Option<Category>,
}

/// Declaration order drives category ids in the target store
pub const TAXONOMY: &[CategoryDef] = &[
    CategoryDef {
        category: Category::Resistors,
        name: "Resistors",
        description: "Fixed and variable resistors",
        parent: None,
    },
    CategoryDef {
        category: Category::Capacitors,
        name: "Capacitors",
        description: "Ceramic, film and electrolytic capacitors",
        parent: None,
    },
    CategoryDef {
        category: Category::Inductors,
        name: "Inductors",
        description: "Inductors, chokes and ferrite beads",
        parent: None,
    },
    CategoryDef {
        category: Category::Diodes,
        name: "Diodes",
        description: "Rectifier, zener, schottky and TVS diodes",
        parent: None,
    },
    CategoryDef {
        category: Category::Transistors,
        name: "Transistors",
        description: "Bipolar and field-effect transistors",
        parent: None,
    },
    CategoryDef {
        category: Category::IntegratedCircuits,
        name: "Integrated Circuits",
        description: "General integrated circuits",
        parent: None,
    },
    CategoryDef {
        category: Category::Connectors,
        name: "Connectors",
        description: "Headers, sockets and terminal blocks",
        parent: None,
    },
    CategoryDef {
        category: Category::Mechanical,
        name: "Mechanical",
        description: "Mounting hardware and mechanical parts",
        parent: None,
    },
    CategoryDef {
        category: Category::CrystalsOscillators,
        name: "Crystals & Oscillators",
        description: "Crystals, oscillators and resonators",
        parent: None,
    },
    CategoryDef {
        category: Category::Sensors,
        name: "Sensors",
        description: "Sensing devices of all kinds",
        parent: None,
    },
    CategoryDef {
        category: Category::PowerManagement,
        name: "Power Management",
        description: "Regulators, converters and supervisors",
        parent: None,
    },
    CategoryDef {
        category: Category::Microcontrollers,
        name: "Microcontrollers",
        description: "Microcontrollers and SoCs",
        parent: Some(Category::IntegratedCircuits),
    },
    CategoryDef {
        category: Category::Memory,
        name: "Memory",
        description: "Volatile and non-volatile memory",
        parent: Some(Category::IntegratedCircuits),
    },
    CategoryDef {
        category: Category::Analog,
        name: "Analog",
        description: "Analog and mixed-signal ICs",
        parent: Some(Category::IntegratedCircuits),
    },
    CategoryDef {
        category: Category::Digital,
        name: "Digital",
        description: "Logic and digital ICs",
        parent: Some(Category::IntegratedCircuits),
    },
    CategoryDef {
        category: Category::Rf,
        name: "RF",
        description: "Radio-frequency parts",
        parent: None,
    },
    CategoryDef {
        category: Category::Optoelectronics,
        name: "Optoelectronics",
        description: "LEDs, displays and optocouplers",
        parent: None,
    },
    CategoryDef {
        category: Category::TestPoints,
        name: "Test Points",
        description: "Test and probe points",
        parent: None,
    },
    CategoryDef {
        category: Category::Uncategorized,
        name: "Uncategorized",
        description: "Parts no rule matched",
        parent: None,
    },
];

impl Category {
    pub fn name(&self) -> &'static str {
        TAXONOMY
            .iter()
            .find(|def| def.category == *self)
            .map(|def| def.name)
            .unwrap_or("Uncategorized")
    }
}

/// Ordered classification rules; specific families come before the broad
/// buckets they overlap with (phototransistor before transistor, photodiode
/// before diode, microcontroller before the IC catch-all).
const RULES: &[(&[&str], Category)] = &[
    (&["test point", "testpoint"], Category::TestPoints),
    (
        &["microcontroller", "mcu", "stm32", "atmega", "attiny", "esp32", "pic"],
        Category::Microcontrollers,
    ),
    (
        &["eeprom", "sram", "dram", "nvram", "flash", "memory"],
        Category::Memory,
    ),
    (
        &["crystal", "oscillator", "resonator", "xtal"],
        Category::CrystalsOscillators,
    ),
    (
        &["sensor", "thermistor", "thermocouple", "accelerometer", "gyroscope", "magnetometer"],
        Category::Sensors,
    ),
    (
        &["regulator", "ldo", "dc-dc", "dcdc", "buck", "boost", "charger", "pmic"],
        Category::PowerManagement,
    ),
    (
        &["antenna", "balun", "transceiver", "lora", "bluetooth", "wifi"],
        Category::Rf,
    ),
    (
        &["led", "optocoupler", "photodiode", "phototransistor", "laser", "oled", "display"],
        Category::Optoelectronics,
    ),
    (
        &["connector", "header", "receptacle", "socket", "terminal", "jack", "plug", "usb"],
        Category::Connectors,
    ),
    (
        &["mounting", "standoff", "screw", "heatsink", "bracket", "jumper"],
        Category::Mechanical,
    ),
    (
        &["transistor", "mosfet", "bjt", "jfet", "igbt", "fet", "npn", "pnp", "nmos", "pmos", ":q"],
        Category::Transistors,
    ),
    (
        &["diode", "rectifier", "zener", "schottky", "tvs", ":d"],
        Category::Diodes,
    ),
    (
        &["resistor", "potentiometer", "rheostat", "varistor", ":r"],
        Category::Resistors,
    ),
    (&["capacitor", "supercap", "mlcc", ":c"], Category::Capacitors),
    (&["inductor", "choke", "ferrite", ":l"], Category::Inductors),
    (
        &["opamp", "op-amp", "operational amplifier", "comparator", "adc", "dac", "analog"],
        Category::Analog,
    ),
    (
        &["logic", "flip-flop", "counter", "shift register", "digital", "74hc", "74ls"],
        Category::Digital,
    ),
    (
        &["ic", "integrated circuit", "processor", "microprocessor", "soc", "asic", ":u"],
        Category::IntegratedCircuits,
    ),
];

/// Assign the category for a mapped component
pub fn classify(component: &MappedComponent) -> Category {
    let haystack = format!(
        "{} {} {}",
        component.fields.get("Description").map(String::as_str).unwrap_or(""),
        component.fields.get("Keywords").map(String::as_str).unwrap_or(""),
        component.target_symbol,
    )
    .to_lowercase();

    for (keywords, category) in RULES {
        if keywords.iter().any(|kw| keyword_in(&haystack, kw)) {
            return *category;
        }
    }
    Category::Uncategorized
}
