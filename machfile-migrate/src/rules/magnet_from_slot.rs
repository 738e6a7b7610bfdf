use machfile_types::{NodePath, PersistError, PersistResult, SchemaVersion, is_reserved_key};
use serde_json::Value as JsonValue;

use super::{JsonMap, MigrationRule, child_object, set_type_tag, type_tag};

/// v1 stored the pole magnets inside the slot (`slot.magnet`, a list of
/// `MagnetType1x`). v2 keeps a single `Magnet` on the lamination and encodes the
/// magnet footprint in a `SlotM1x` slot.
pub struct MagnetFromSlotRule;

impl MagnetFromSlotRule {
    const RULE_ID: &'static str = "lamination.magnet-from-slot";

    const SLOT_TYPES: [&'static str; 2] = ["SlotMFlat", "SlotMPolar"];

    /// Fields a v1 magnet shares with the current `Magnet` type.
    const KEPT_MAGNET_FIELDS: [&'static str; 3] = ["mat_type", "type_magnetization", "Lmag"];

    fn magnet_number(type_name: &str) -> Option<u32> {
        type_name
            .strip_prefix("MagnetType")
            .and_then(|n| n.parse().ok())
            .filter(|n| (10..=14).contains(n))
    }
}

impl MigrationRule for MagnetFromSlotRule {
    fn id(&self) -> &'static str {
        Self::RULE_ID
    }

    fn type_name(&self) -> &'static str {
        "LamSlotMag"
    }

    fn from_version(&self) -> SchemaVersion {
        SchemaVersion::new(1)
    }

    fn applies(&self, node: &JsonMap) -> bool {
        node.get("slot")
            .and_then(JsonValue::as_object)
            .is_some_and(|slot| slot.get("magnet").is_some_and(JsonValue::is_array))
    }

    fn apply(&self, node: &mut JsonMap, path: &NodePath) -> PersistResult<()> {
        let slot_path = path.field("slot");
        let slot = child_object(node, "slot", path)?;

        let slot_type = type_tag(slot).unwrap_or_default().to_string();
        if !Self::SLOT_TYPES.contains(&slot_type.as_str()) {
            return Err(PersistError::unmigratable(
                slot_path,
                format!("magnets are only stored in SlotMFlat/SlotMPolar slots, found `{slot_type}`"),
            ));
        }

        let magnets_path = slot_path.field("magnet");
        let mut magnets = match slot.remove("magnet") {
            Some(JsonValue::Array(items)) => items,
            _ => return Err(PersistError::unmigratable(magnets_path, "expected a list")),
        };
        if magnets.len() != 1 {
            return Err(PersistError::unmigratable(
                magnets_path,
                format!("expected exactly one magnet per pole, found {}", magnets.len()),
            ));
        }

        if let Some(w3) = slot.remove("W3") {
            if w3.as_f64().is_some_and(|w| w != 0.0) {
                return Err(PersistError::unmigratable(
                    slot_path.field("W3"),
                    "several magnets per pole cannot be expressed with a single lamination magnet",
                ));
            }
        }

        let magnet_path = magnets_path.index(0);
        let mut magnet = match magnets.pop() {
            Some(JsonValue::Object(map)) => map,
            _ => return Err(PersistError::unmigratable(magnet_path, "expected an object")),
        };
        let magnet_type = type_tag(&magnet).unwrap_or_default().to_string();
        let Some(number) = Self::magnet_number(&magnet_type) else {
            return Err(PersistError::unmigratable(
                magnet_path,
                format!("unknown magnet type `{magnet_type}`"),
            ));
        };

        set_type_tag(slot, &format!("SlotM{number}"));
        if let Some(width) = magnet.remove("Wmag") {
            slot.insert("W1".to_string(), width);
        }
        if let Some(height) = magnet.remove("Hmag") {
            slot.insert("H1".to_string(), height);
        }
        if let Some(radius) = magnet.remove("Rtopm") {
            if number >= 13 {
                slot.insert("Rtopm".to_string(), radius);
            }
        }

        magnet.retain(|key, _| is_reserved_key(key) || Self::KEPT_MAGNET_FIELDS.contains(&key.as_str()));
        set_type_tag(&mut magnet, "Magnet");
        node.insert("magnet".to_string(), JsonValue::Object(magnet));
        Ok(())
    }
}
