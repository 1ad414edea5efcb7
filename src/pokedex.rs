use std::collections::HashMap;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

const DEFAULT_TINT: &str = "255, 255, 255";

static TYPE_TINTS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("fire", "255, 180, 142"),
        ("water", "155, 226, 255"),
        ("grass", "172, 255, 172"),
        ("electric", "255, 255, 50"),
        ("psychic", "255, 125, 200"),
        ("ice", "193, 236, 250"),
        ("dragon", "158, 63, 246"),
        ("dark", "132, 148, 164"),
        ("fairy", "255, 202, 213"),
        ("normal", "231, 231, 231"),
        ("fighting", "225, 112, 112"),
        ("flying", "155, 226, 255"),
        ("poison", "167, 132, 239"),
        ("ground", "230, 200, 160"),
        ("rock", "204, 154, 31"),
        ("bug", "174, 225, 70"),
        ("ghost", "95, 20, 150"),
        ("steel", "212, 212, 212"),
    ])
});

/// RGB triple used to tint a card for the given Pokémon type.
pub fn color_tint(type_name: &str) -> &'static str {
    TYPE_TINTS.get(type_name).copied().unwrap_or(DEFAULT_TINT)
}

#[derive(Debug, Error)]
pub enum PokedexError {
    #[error("failed to read pokedex cache {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("malformed pokedex cache {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// One entry of the pre-fetched cache file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Pokemon {
    pub id: u32,
    pub name: String,
    pub types: Vec<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
pub struct PokemonCard {
    #[serde(flatten)]
    pub pokemon: Pokemon,
    pub tint: String,
}

impl From<Pokemon> for PokemonCard {
    fn from(pokemon: Pokemon) -> Self {
        let tint = pokemon
            .types
            .first()
            .map(|t| color_tint(t))
            .unwrap_or(DEFAULT_TINT)
            .to_string();
        Self { pokemon, tint }
    }
}

/// Reads the cache file on every call; the file is refreshed out of band.
#[derive(Debug, Clone)]
pub struct PokedexCache {
    path: PathBuf,
}

impl PokedexCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn load(&self) -> Result<Vec<PokemonCard>, PokedexError> {
        let path = self.path.display().to_string();
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| PokedexError::Read {
                path: path.clone(),
                source,
            })?;
        let entries: Vec<Pokemon> =
            serde_json::from_str(&raw).map_err(|source| PokedexError::Parse { path, source })?;
        Ok(entries.into_iter().map(PokemonCard::from).collect())
    }
}
