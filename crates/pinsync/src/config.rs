use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::resource::PinInputSet;

pub const ROOT_ENV: &str = "PINATA_ROOT";
pub const TOKEN_ENV: &str = "PINATA_TOKEN";

fn default_cid_version() -> u8 {
    1
}

/// Boundary representation of a host-framework configuration slot that can
/// be absent, not yet computed, or concrete. Resolution happens entirely at
/// this boundary; the reconciliation core only ever sees resolved values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigValue<T> {
    #[default]
    Unset,
    Pending,
    Value(T),
}

impl<T> ConfigValue<T> {
    pub fn from_option(v: Option<T>) -> Self {
        match v {
            Some(v) => Self::Value(v),
            None => Self::Unset,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }
}

/// The `[provider]` table of a declaration file.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProviderConfig {
    pub root: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedProvider {
    pub root: String,
    pub token: String,
}

/// One `[[pins]]` entry of a declaration file.
#[derive(Debug, Clone, Deserialize)]
pub struct PinDecl {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_cid_version")]
    pub cid_version: u8,
    pub paths: Vec<String>,
}

impl PinDecl {
    /// Resolve declared paths (relative ones against the declaration file's
    /// directory) into the desired input set, preserving order.
    pub fn input_set(&self, base: &Path) -> PinInputSet {
        let paths = self
            .paths
            .iter()
            .map(|raw| {
                let p = PathBuf::from(raw);
                if p.is_absolute() { p } else { base.join(p) }
            })
            .collect();
        PinInputSet {
            paths,
            name: self.name.clone(),
            cid_version: self.cid_version,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Declaration {
    pub provider: ProviderConfig,
    pub pins: Vec<PinDecl>,
}

pub fn load_declaration(path: &Path) -> Result<Declaration> {
    let raw = fs::read_to_string(path)
        .map_err(|e| Error::msg(format!("failed to read declaration {}: {e}", path.display())))?;
    let decl: Declaration = toml::from_str(&raw)
        .map_err(|e| Error::msg(format!("TOML parse error in {}: {e}", path.display())))?;

    let mut seen = BTreeSet::<String>::new();
    for pin in &decl.pins {
        let id = safe_id(&pin.id)?;
        if !seen.insert(id.clone()) {
            return Err(Error::msg(format!("duplicate pin id '{}'", id)));
        }
    }
    Ok(decl)
}

fn safe_id(id: &str) -> Result<String> {
    let id = id.trim();
    if id.is_empty() {
        return Err(Error::msg("pin id is empty"));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
    {
        return Err(Error::msg(format!(
            "pin id '{}' contains invalid characters",
            id
        )));
    }
    Ok(id.to_string())
}

/// Resolve the provider connection settings. Explicit values win over the
/// environment; the root falls back to the production endpoint; the token is
/// mandatory. A `Pending` slot cannot be resolved and is a configuration
/// error; the caller must supply a concrete value first.
pub fn resolve_provider(
    root: ConfigValue<String>,
    token: ConfigValue<String>,
) -> Result<ResolvedProvider> {
    resolve_provider_with(root, token, |key| env_value(key))
}

fn resolve_provider_with(
    root: ConfigValue<String>,
    token: ConfigValue<String>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedProvider> {
    if root.is_pending() {
        return Err(Error::msg(format!(
            "provider root is not yet known; set it statically or via the {ROOT_ENV} environment variable"
        )));
    }
    if token.is_pending() {
        return Err(Error::msg(format!(
            "provider token is not yet known; set it statically or via the {TOKEN_ENV} environment variable"
        )));
    }

    let root = declared(&root)
        .or_else(|| env(ROOT_ENV))
        .unwrap_or_else(|| crate::client::DEFAULT_API_ROOT.to_string());

    let token = declared(&token).or_else(|| env(TOKEN_ENV)).ok_or_else(|| {
        Error::msg(format!(
            "missing API token; set provider.token in the declaration or the {TOKEN_ENV} environment variable"
        ))
    })?;

    Ok(ResolvedProvider { root, token })
}

fn declared(v: &ConfigValue<String>) -> Option<String> {
    v.value()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

fn env_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
}
