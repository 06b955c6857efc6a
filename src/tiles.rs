use crate::errors::ConfigError;
use crate::models::TileConfig;
use std::collections::HashSet;

const FEEDING_TIMEOUT_SECS: i64 = 3 * 60 * 60;
const DIAPER_TIMEOUT_SECS: i64 = 3 * 60 * 60;

pub fn default_tiles() -> Vec<TileConfig> {
    vec![
        TileConfig::new("asleep", "Asleep")
            .cancels(&["awake"])
            .ignore_duplicates(),
        TileConfig::new("awake", "Awake")
            .cancels(&["asleep"])
            .ignore_duplicates(),
        TileConfig::new("diaper_feces", "Diaper change\n(feces)")
            .implies(&["awake"])
            .timeout(DIAPER_TIMEOUT_SECS),
        TileConfig::new("diaper_urine", "Diaper change\n(urine only)")
            .implies(&["awake"])
            .timeout(DIAPER_TIMEOUT_SECS),
        TileConfig::new("feeding_breast", "Feeding\n(breast)")
            .implies(&["awake"])
            .timeout(FEEDING_TIMEOUT_SECS),
        TileConfig::new("feeding_bottle_milk", "Feeding\n(bottled breast milk)")
            .implies(&["awake"])
            .timeout(FEEDING_TIMEOUT_SECS),
        TileConfig::new("feeding_formula", "Feeding\n(formula)")
            .implies(&["awake"])
            .timeout(FEEDING_TIMEOUT_SECS),
    ]
}

/// Every `cancels`/`implies` target must name another configured tile.
pub fn validate(tiles: &[TileConfig]) -> Result<(), ConfigError> {
    let mut known = HashSet::with_capacity(tiles.len());
    for tile in tiles {
        if !known.insert(tile.kind.as_str()) {
            return Err(ConfigError::DuplicateType(tile.kind.clone()));
        }
    }

    for tile in tiles {
        let relations = tile
            .cancels
            .iter()
            .map(|target| ("cancels", target))
            .chain(tile.implies.iter().map(|target| ("implies", target)));
        for (relation, target) in relations {
            if *target == tile.kind {
                return Err(ConfigError::SelfReference {
                    tile: tile.kind.clone(),
                    relation,
                });
            }
            if !known.contains(target.as_str()) {
                return Err(ConfigError::UnknownReference {
                    tile: tile.kind.clone(),
                    relation,
                    target: target.clone(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_valid() {
        let tiles = default_tiles();
        assert_eq!(tiles.len(), 7);
        assert_eq!(validate(&tiles), Ok(()));
    }

    #[test]
    fn duplicate_types_are_rejected() {
        let tiles = vec![TileConfig::new("awake", "Awake"), TileConfig::new("awake", "Up")];
        assert_eq!(
            validate(&tiles),
            Err(ConfigError::DuplicateType("awake".to_string()))
        );
    }

    #[test]
    fn dangling_references_are_rejected() {
        let tiles = vec![TileConfig::new("asleep", "Asleep").cancels(&["awake"])];
        assert!(matches!(
            validate(&tiles),
            Err(ConfigError::UnknownReference { relation: "cancels", .. })
        ));

        let tiles = vec![TileConfig::new("diaper_urine", "Diaper").implies(&["awake"])];
        assert!(matches!(
            validate(&tiles),
            Err(ConfigError::UnknownReference { relation: "implies", .. })
        ));
    }

    #[test]
    fn self_references_are_rejected() {
        let tiles = vec![TileConfig::new("awake", "Awake").implies(&["awake"])];
        assert!(matches!(validate(&tiles), Err(ConfigError::SelfReference { .. })));
    }
}
