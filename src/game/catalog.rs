use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::state::PokemonId;

/// 卡池大小（关都地区 151 只）。
pub const CATALOG_SIZE: usize = 151;

const SPRITE_BASE_URL: &str =
    "https://raw.githubusercontent.com/PokeAPI/sprites/master/sprites/pokemon";

/// 卡池中的一项：身份、名称与正面图片。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: PokemonId,
    pub name: String,
    pub image: String,
}

impl CatalogEntry {
    fn kanto(id: PokemonId) -> Self {
        Self {
            id,
            name: format!("pokemon-{id}"),
            image: format!("{SPRITE_BASE_URL}/{id}.png"),
        }
    }
}

static CATALOG: Lazy<Vec<CatalogEntry>> =
    Lazy::new(|| (1..=CATALOG_SIZE as PokemonId).map(CatalogEntry::kanto).collect());

pub fn entries() -> &'static [CatalogEntry] {
    &CATALOG
}

pub fn lookup(id: PokemonId) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|entry| entry.id == id)
}
