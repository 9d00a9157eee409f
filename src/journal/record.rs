// SPDX-License-Identifier: Apache-2.0

//! Decoded journal and snapshot records.
//!
//! Field names follow the game's JSON. Every field is optional on the wire;
//! missing fields decode to their defaults.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event name and timestamp carried by every record.
pub trait NamedEvent {
    /// The `event` and `timestamp` fields, empty when absent.
    fn name_and_timestamp(&self) -> (&str, &str);

    fn name(&self) -> &str {
        self.name_and_timestamp().0
    }

    fn timestamp(&self) -> &str {
        self.name_and_timestamp().1
    }

    /// The timestamp as RFC 3339, if it parses.
    fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(self.timestamp())
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Shared `timestamp` / `event` fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub event: String,
}

macro_rules! named_by_header {
    ($($ty:ty),* $(,)?) => {
        $(
            impl NamedEvent for $ty {
                fn name_and_timestamp(&self) -> (&str, &str) {
                    (&self.header.event, &self.header.timestamp)
                }
            }
        )*
    };
}

/// One line of a journal file, kept as a free-form object.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub fields: Map<String, Value>,
    /// The line as read from the file
    pub raw: String,
}

impl JournalEntry {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

impl NamedEvent for JournalEntry {
    fn name_and_timestamp(&self) -> (&str, &str) {
        map_name_and_timestamp(&self.fields)
    }
}

fn map_name_and_timestamp(fields: &Map<String, Value>) -> (&str, &str) {
    let get = |key| fields.get(key).and_then(Value::as_str).unwrap_or("");
    (get("event"), get("timestamp"))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Cargo {
    #[serde(flatten)]
    pub header: Header,
    /// `Ship` or `SRV`
    pub vessel: String,
    pub inventory: Vec<CargoItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CargoItem {
    pub name: String,
    #[serde(rename = "Name_Localised", skip_serializing_if = "Option::is_none")]
    pub name_localised: Option<String>,
    pub count: i64,
    pub stolen: i64,
    #[serde(rename = "MissionID", skip_serializing_if = "Option::is_none")]
    pub mission_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Market {
    #[serde(flatten)]
    pub header: Header,
    #[serde(rename = "MarketID")]
    pub market_id: i64,
    pub station_name: String,
    pub station_type: String,
    pub star_system: String,
    pub items: Vec<MarketItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MarketItem {
    #[serde(rename = "id", alias = "ID")]
    pub id: i64,
    pub name: String,
    #[serde(rename = "Name_Localised", skip_serializing_if = "Option::is_none")]
    pub name_localised: Option<String>,
    pub category: String,
    #[serde(rename = "Category_Localised", skip_serializing_if = "Option::is_none")]
    pub category_localised: Option<String>,
    pub buy_price: i64,
    pub sell_price: i64,
    pub mean_price: i64,
    pub stock_bracket: i64,
    pub demand_bracket: i64,
    pub stock: i64,
    pub demand: i64,
    pub consumer: bool,
    pub producer: bool,
    pub rare: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ModulesInfo {
    #[serde(flatten)]
    pub header: Header,
    pub modules: Vec<Module>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Module {
    pub slot: String,
    pub item: String,
    pub power: f64,
    pub priority: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NavRoute {
    #[serde(flatten)]
    pub header: Header,
    pub route: Vec<RouteStop>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RouteStop {
    pub star_system: String,
    pub system_address: i64,
    pub star_pos: [f64; 3],
    pub star_class: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Outfitting {
    #[serde(flatten)]
    pub header: Header,
    #[serde(rename = "MarketID")]
    pub market_id: i64,
    pub station_name: String,
    pub star_system: String,
    pub horizons: bool,
    pub items: Vec<OutfittingItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct OutfittingItem {
    #[serde(rename = "id", alias = "ID")]
    pub id: i64,
    pub name: String,
    pub buy_price: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Shipyard {
    #[serde(flatten)]
    pub header: Header,
    #[serde(rename = "MarketID")]
    pub market_id: i64,
    pub station_name: String,
    pub star_system: String,
    pub horizons: bool,
    #[serde(rename = "AllowCobraMkIV")]
    pub allow_cobra_mk_iv: bool,
    pub price_list: Vec<ShipPrice>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ShipPrice {
    #[serde(rename = "id", alias = "ID")]
    pub id: i64,
    pub ship_type: String,
    #[serde(rename = "ShipType_Localised", skip_serializing_if = "Option::is_none")]
    pub ship_type_localised: Option<String>,
    pub ship_price: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Status {
    #[serde(flatten)]
    pub header: Header,
    pub flags: u64,
    /// Power distribution: systems, engines, weapons (in half pips)
    pub pips: [u8; 3],
    pub fire_group: i64,
    pub gui_focus: i64,
    pub cargo: f64,
    pub legal_state: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub heading: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_name: Option<String>,
    pub planet_radius: f64,
    pub fuel: Fuel,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Fuel {
    pub fuel_main: f64,
    pub fuel_reservoir: f64,
}

/// Ship locker contents. The layout changes between game versions, so it is
/// kept as a free-form object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShipLocker {
    pub fields: Map<String, Value>,
}

impl NamedEvent for ShipLocker {
    fn name_and_timestamp(&self) -> (&str, &str) {
        map_name_and_timestamp(&self.fields)
    }
}

named_by_header!(Cargo, Market, ModulesInfo, NavRoute, Outfitting, Shipyard, Status);

/// A decoded journal line or snapshot file.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Journal(JournalEntry),
    Cargo(Cargo),
    Market(Market),
    ModulesInfo(ModulesInfo),
    NavRoute(NavRoute),
    Outfitting(Outfitting),
    Shipyard(Shipyard),
    Status(Status),
    ShipLocker(ShipLocker),
}

impl Record {
    pub fn is_snapshot(&self) -> bool {
        !matches!(self, Record::Journal(_))
    }
}

impl NamedEvent for Record {
    fn name_and_timestamp(&self) -> (&str, &str) {
        match self {
            Record::Journal(r) => r.name_and_timestamp(),
            Record::Cargo(r) => r.name_and_timestamp(),
            Record::Market(r) => r.name_and_timestamp(),
            Record::ModulesInfo(r) => r.name_and_timestamp(),
            Record::NavRoute(r) => r.name_and_timestamp(),
            Record::Outfitting(r) => r.name_and_timestamp(),
            Record::Shipyard(r) => r.name_and_timestamp(),
            Record::Status(r) => r.name_and_timestamp(),
            Record::ShipLocker(r) => r.name_and_timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_status_decodes_with_missing_fields() {
        let status: Status = serde_json::from_str(
            r#"{ "timestamp":"2024-03-01T18:04:11Z", "event":"Status", "Flags":16842765,
                 "Pips":[4,8,0], "FireGroup":0, "GuiFocus":0,
                 "Fuel":{ "FuelMain":16.0, "FuelReservoir":0.49 },
                 "Cargo":0.0, "LegalState":"Clean" }"#,
        )
        .unwrap();

        assert_eq!(status.name(), "Status");
        assert_eq!(status.flags, 16842765);
        assert_eq!(status.pips, [4, 8, 0]);
        assert_eq!(status.fuel.fuel_main, 16.0);
        assert_eq!(status.body_name, None);
        assert_eq!(status.latitude, 0.0);
    }

    #[test]
    fn test_nav_route() {
        let route: NavRoute = serde_json::from_str(
            r#"{ "timestamp":"2024-03-01T18:04:11Z", "event":"NavRoute", "Route":[
                { "StarSystem":"Sol", "SystemAddress":10477373803, "StarPos":[0.0,0.0,0.0], "StarClass":"G" },
                { "StarSystem":"Alpha Centauri", "SystemAddress":1178708478315, "StarPos":[3.03125,-0.09375,3.15625], "StarClass":"G" }
            ]}"#,
        )
        .unwrap();

        assert_eq!(route.route.len(), 2);
        assert_eq!(route.route[1].star_system, "Alpha Centauri");
        assert_eq!(route.route[1].star_pos[0], 3.03125);
    }

    #[test]
    fn test_cargo_localised_names() {
        let cargo: Cargo = serde_json::from_str(
            r#"{ "timestamp":"2024-03-01T18:04:11Z", "event":"Cargo", "Vessel":"Ship", "Count":1,
                 "Inventory":[ { "Name":"drones", "Name_Localised":"Limpet", "Count":1, "Stolen":0 } ] }"#,
        )
        .unwrap();

        assert_eq!(cargo.vessel, "Ship");
        assert_eq!(cargo.inventory[0].name_localised.as_deref(), Some("Limpet"));
        assert_eq!(cargo.inventory[0].mission_id, None);
    }

    #[test]
    fn test_journal_entry_name_and_timestamp() {
        let raw = r#"{"timestamp":"2024-03-01T18:04:11Z","event":"FSDJump","StarSystem":"Sol"}"#;
        let entry = JournalEntry {
            fields: serde_json::from_str(raw).unwrap(),
            raw: raw.to_string(),
        };

        assert_eq!(entry.name_and_timestamp(), ("FSDJump", "2024-03-01T18:04:11Z"));
        assert_eq!(
            entry.parsed_timestamp(),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 18, 4, 11).unwrap())
        );
        assert_eq!(entry.get("StarSystem"), Some(&Value::from("Sol")));

        let record = Record::Journal(entry);
        assert_eq!(record.name(), "FSDJump");
        assert!(!record.is_snapshot());
    }

    #[test]
    fn test_missing_or_bad_timestamp() {
        let locker = ShipLocker {
            fields: serde_json::from_str(r#"{"event":"ShipLocker","timestamp":"yesterday"}"#)
                .unwrap(),
        };
        assert_eq!(locker.name(), "ShipLocker");
        assert_eq!(locker.parsed_timestamp(), None);

        let empty = Status::default();
        assert_eq!(empty.name_and_timestamp(), ("", ""));
    }
}
