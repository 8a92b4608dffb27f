// Level data and the world indices a running Match derives from it: tile
// grids, coin sets, and the flat power-up table. The level *file* loader and
// its JSON-schema validator are external collaborators (see
// `ports::LevelCatalog`); this module only holds the data shape and the
// pure index-building / tile-decoding rules the match engine depends on.

use std::collections::{HashMap, HashSet};

/// Tile that has just been hit for a coin/item effect becomes this code.
pub const TILE_CLEARED: i32 = 98331;
pub const TILE_ITEM_BLOCK: i32 = 17;
pub const TILE_COIN_BLOCK: i32 = 18;
pub const TILE_HIDDEN_COIN_BLOCK: i32 = 22;
pub const TILE_MULTI_COIN_BLOCK: i32 = 19;
pub const TILE_FLAGPOLE: i32 = 160;

/// Object type recorded in a zone's object map for a collectible coin.
pub const OBJECT_TYPE_COIN: i32 = 97;

/// The special lobby object that, once triggered, latches `gold_flower_taken`.
pub const GOLD_FLOWER_OID: i64 = 458761;

/// A tile's 32-bit code: `extra_data<<24 | id<<16 | low16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileCode(pub i32);

impl TileCode {
    pub fn id(self) -> i32 {
        (self.0 >> 16) & 0xff
    }

    pub fn extra_data(self) -> i32 {
        (self.0 >> 24) & 0xff
    }

    pub fn low16(self) -> i32 {
        self.0 & 0xffff
    }

    pub fn encode(low16: i32, id: i32, extra_data: i32) -> i32 {
        (extra_data << 24) | (id << 16) | (low16 & 0xffff)
    }

    pub fn with_extra_data(self, extra_data: i32) -> TileCode {
        TileCode(Self::encode(self.low16(), self.id(), extra_data))
    }
}

#[derive(Debug, Clone)]
pub struct Layer {
    pub z: i32,
    pub data: Vec<Vec<i32>>,
}

#[derive(Debug, Clone, Default)]
pub struct ZoneLevel {
    pub layers: Vec<Layer>,
    /// oid -> object type, as authored in the level file.
    pub objects: HashMap<i64, i32>,
}

impl ZoneLevel {
    /// The layer the match engine treats as the collidable/tile-event layer.
    /// Levels authored before the multi-layer format stored `data` directly
    /// on the zone; `from_raw_json` normalizes that into `layers: [{z:0,..}]`
    /// before a `ZoneLevel` is ever constructed, so this is always present
    /// once a level has passed through loading.
    pub fn main_layer(&self) -> &[Vec<i32>] {
        self.layers
            .iter()
            .find(|l| l.z == 0)
            .map(|l| l.data.as_slice())
            .unwrap_or(&[])
    }

    pub fn main_layer_mut(&mut self) -> Option<&mut Vec<Vec<i32>>> {
        self.layers.iter_mut().find(|l| l.z == 0).map(|l| &mut l.data)
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorldLevel {
    pub zones: Vec<ZoneLevel>,
}

#[derive(Debug, Clone, Default)]
pub struct LevelData {
    pub id: String,
    pub worlds: Vec<WorldLevel>,
}

impl LevelData {
    /// Parses a level file's JSON, migrating the legacy "data sits directly
    /// on the zone" shape to the current `layers` shape. Schema validation
    /// of custom levels is the `LevelCatalog` port's responsibility, not
    /// this function's; this only normalizes shape for internal use.
    pub fn from_raw_json(id: &str, raw: &serde_json::Value) -> Option<LevelData> {
        let worlds_json = raw.get("worlds")?.as_array()?;
        let mut worlds = Vec::with_capacity(worlds_json.len());
        for world_json in worlds_json {
            let zones_json = world_json.get("zones")?.as_array()?;
            let mut zones = Vec::with_capacity(zones_json.len());
            for zone_json in zones_json {
                zones.push(parse_zone(zone_json)?);
            }
            worlds.push(WorldLevel { zones });
        }
        Some(LevelData {
            id: id.to_string(),
            worlds,
        })
    }
}

fn parse_zone(zone_json: &serde_json::Value) -> Option<ZoneLevel> {
    let objects = zone_json
        .get("objects")
        .and_then(|v| v.as_object())
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| {
                    let oid: i64 = k.parse().ok()?;
                    let ty = v.as_i64()? as i32;
                    Some((oid, ty))
                })
                .collect()
        })
        .unwrap_or_default();

    let layers = if let Some(layers_json) = zone_json.get("layers").and_then(|v| v.as_array()) {
        layers_json.iter().filter_map(parse_layer).collect()
    } else if let Some(data_json) = zone_json.get("data").and_then(|v| v.as_array()) {
        // Legacy shape: `data` sits directly on the zone. Migrate to a
        // single z=0 layer.
        vec![Layer {
            z: 0,
            data: parse_rows(data_json),
        }]
    } else {
        Vec::new()
    };

    Some(ZoneLevel { layers, objects })
}

fn parse_layer(layer_json: &serde_json::Value) -> Option<Layer> {
    let z = layer_json.get("z")?.as_i64()? as i32;
    let data = parse_rows(layer_json.get("data")?.as_array()?);
    Some(Layer { z, data })
}

fn parse_rows(rows_json: &[serde_json::Value]) -> Vec<Vec<i32>> {
    rows_json
        .iter()
        .map(|row| {
            row.as_array()
                .map(|cells| {
                    cells
                        .iter()
                        .filter_map(|c| c.as_i64().map(|v| v as i32))
                        .collect()
                })
                .unwrap_or_default()
        })
        .collect()
}

/// Derived, mutable world indices a running Match owns once a level has
/// been selected and `start()` has re-initialized them.
#[derive(Debug, Clone, Default)]
pub struct WorldState {
    /// `tiles[world][zone][row][x]`, row 0 is the top of the zone.
    pub tiles: Vec<Vec<Vec<Vec<i32>>>>,
    pub zone_height: Vec<Vec<usize>>,
    pub objects: Vec<Vec<HashMap<i64, i32>>>,
    pub allcoins: Vec<Vec<HashSet<i64>>>,
    pub coins: Vec<Vec<HashSet<i64>>>,
    /// Flat, *not* indexed by (world, zone) -- preserves the source
    /// system's quirk of a single global power-up table.
    pub powerups: HashMap<i64, i32>,
}

impl WorldState {
    pub fn from_level(level: &LevelData) -> Self {
        let mut tiles = Vec::with_capacity(level.worlds.len());
        let mut zone_height = Vec::with_capacity(level.worlds.len());
        let mut objects = Vec::with_capacity(level.worlds.len());
        let mut allcoins = Vec::with_capacity(level.worlds.len());
        let mut coins = Vec::with_capacity(level.worlds.len());

        for world in &level.worlds {
            let mut w_tiles = Vec::with_capacity(world.zones.len());
            let mut w_height = Vec::with_capacity(world.zones.len());
            let mut w_objects = Vec::with_capacity(world.zones.len());
            let mut w_allcoins = Vec::with_capacity(world.zones.len());
            let mut w_coins = Vec::with_capacity(world.zones.len());

            for zone in &world.zones {
                let main = zone.main_layer().to_vec();
                w_height.push(main.len());
                w_tiles.push(main);

                let zone_allcoins: HashSet<i64> = zone
                    .objects
                    .iter()
                    .filter(|(_, ty)| **ty == OBJECT_TYPE_COIN)
                    .map(|(oid, _)| *oid)
                    .collect();
                w_coins.push(zone_allcoins.clone());
                w_allcoins.push(zone_allcoins);
                w_objects.push(zone.objects.clone());
            }

            tiles.push(w_tiles);
            zone_height.push(w_height);
            objects.push(w_objects);
            allcoins.push(w_allcoins);
            coins.push(w_coins);
        }

        WorldState {
            tiles,
            zone_height,
            objects,
            allcoins,
            coins,
            powerups: HashMap::new(),
        }
    }

    /// `y_raw` is the wire-level y (bottom-up); tiles are stored top-down.
    pub fn get_tile(&self, world: usize, zone: usize, x: usize, y_raw: usize) -> Option<TileCode> {
        let height = *self.zone_height.get(world)?.get(zone)?;
        let y = height.checked_sub(1)?.checked_sub(y_raw)?;
        self.tiles
            .get(world)?
            .get(zone)?
            .get(y)?
            .get(x)
            .copied()
            .map(TileCode)
    }

    pub fn set_tile(&mut self, world: usize, zone: usize, x: usize, y_raw: usize, code: TileCode) {
        let Some(height) = self.zone_height.get(world).and_then(|z| z.get(zone)).copied() else {
            return;
        };
        let Some(y) = height.checked_sub(1).and_then(|h| h.checked_sub(y_raw)) else {
            return;
        };
        if let Some(row) = self
            .tiles
            .get_mut(world)
            .and_then(|w| w.get_mut(zone))
            .and_then(|z| z.get_mut(y))
        {
            if let Some(cell) = row.get_mut(x) {
                *cell = code.0;
            }
        }
    }

    /// Power-up oid encoding: `x | (y_raw << 16)`. `y_raw` is the wire-level
    /// y, the same one tile events carry -- not the flipped row index the
    /// tile matrix is stored with. Preserving this mismatch is deliberate.
    pub fn powerup_oid(x: i32, y_raw: i32) -> i64 {
        (x as i64) | ((y_raw as i64) << 16)
    }
}

/// Picks a tile with id `TILE_COIN_BLOCK` on world 0's zone 0, z=0 layer and
/// rewrites it into a gold-flower item block (`id=17, extra_data=100`).
/// No-op if no such tile exists.
///
/// The source engine's `addGoldFlower` literally searches for id `18`
/// (a coin block) to convert into an id-`17` power-up block, not id `17` as
/// prose elsewhere might suggest; this follows that literal behavior.
pub fn add_gold_flower(level: &mut LevelData, mut pick: impl FnMut(usize) -> usize) {
    let Some(world) = level.worlds.get_mut(0) else {
        return;
    };
    let Some(zone) = world.zones.get_mut(0) else {
        return;
    };
    let Some(layer) = zone.main_layer_mut() else {
        return;
    };

    let candidates: Vec<(usize, usize)> = layer
        .iter()
        .enumerate()
        .flat_map(|(y, row)| {
            row.iter()
                .enumerate()
                .filter(|&(_, &code)| TileCode(code).id() == TILE_COIN_BLOCK)
                .map(move |(x, _)| (y, x))
                .collect::<Vec<_>>()
        })
        .collect();

    if candidates.is_empty() {
        return;
    }

    let (y, x) = candidates[pick(candidates.len()) % candidates.len()];
    let low16 = TileCode(layer[y][x]).low16();
    layer[y][x] = TileCode::encode(low16, TILE_ITEM_BLOCK, 100);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_code_round_trips() {
        let code = TileCode::encode(42, 18, 3);
        let decoded = TileCode(code);
        assert_eq!(decoded.low16(), 42);
        assert_eq!(decoded.id(), 18);
        assert_eq!(decoded.extra_data(), 3);
    }

    #[test]
    fn get_tile_flips_y() {
        let level = LevelData {
            id: "t".into(),
            worlds: vec![WorldLevel {
                zones: vec![ZoneLevel {
                    layers: vec![Layer {
                        z: 0,
                        data: vec![vec![1, 2], vec![3, 4]],
                    }],
                    objects: HashMap::new(),
                }],
            }],
        };
        let state = WorldState::from_level(&level);
        // zone_height = 2, y_raw=0 -> row index 1 ("bottom" row in wire terms).
        assert_eq!(state.get_tile(0, 0, 0, 0).unwrap().0, 3);
        assert_eq!(state.get_tile(0, 0, 0, 1).unwrap().0, 1);
    }

    #[test]
    fn powerup_oid_preserves_unflipped_y() {
        assert_eq!(WorldState::powerup_oid(5, 2), 5 | (2 << 16));
    }
}
