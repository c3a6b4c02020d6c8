//! Resource instantiation
//!
//! Expands resolved classes into concrete resource records. A virtual blade
//! class with `count: N` becomes N [`ResourceInstance`]s; an interconnect
//! class becomes exactly one [`Interconnect`].
//!
//! Instance indices are 0-based but name suffixes are 1-based: instance `i`
//! of a suffixed class is named `{name_prefix}{hostname_suffix_separator}{i+1}`
//! (prefix defaulting to the hostname, separator to `-`) with hostname
//! `{hostname}{separator}{i+1}`. A
//! class is suffixed when `add_hostname_suffix` is true or its count is
//! greater than one; otherwise its single instance uses the bare hostname.
//!
//! Addresses come from `blade_interconnect.ip_addrs` in list order. A pool
//! shorter than the count fails instantiation; no pool leaves the address to
//! the provisioning backend.

use serde::Serialize;
use serde_yaml::{Mapping, Value as YamlValue};

use crate::classes::{ResolvedClass, ResourceKind};
use crate::error::{Error, Result};

/// Path of a blade class's address pool.
pub const ADDRESS_POOL: &str = "blade_interconnect.ip_addrs";

/// Separator used between the name and the instance index by default.
pub const DEFAULT_SEPARATOR: &str = "-";

/// One concrete virtual blade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceInstance {
    pub class: String,
    pub index: usize,
    pub name: String,
    pub hostname: String,
    pub address: Option<String>,
    /// All resolved fields of the class.
    pub fields: Mapping,
}

/// One concrete blade interconnect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interconnect {
    pub class: String,
    pub network_name: String,
    pub ipv4_cidr: String,
    pub fields: Mapping,
}

/// The declared instance count of a blade class.
pub fn count(class: &ResolvedClass) -> Result<usize> {
    let invalid = || Error::InvalidField {
        class: class.name.clone(),
        field: "count".to_string(),
        message: "must be a non-negative integer".to_string(),
    };
    match class.get("count") {
        None | Some(YamlValue::Null) => Err(Error::MissingRequiredField {
            class: class.name.clone(),
            field: "count".to_string(),
        }),
        Some(YamlValue::Number(n)) => n
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(invalid),
        Some(_) => Err(invalid()),
    }
}

/// The address pool of a blade class, if it declares one.
pub fn address_pool(class: &ResolvedClass) -> Result<Option<Vec<String>>> {
    match class.get(ADDRESS_POOL) {
        None | Some(YamlValue::Null) => Ok(None),
        Some(YamlValue::Sequence(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Error::InvalidField {
                        class: class.name.clone(),
                        field: format!("{}[{}]", ADDRESS_POOL, i),
                        message: "addresses must be strings".to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()
            .map(Some),
        Some(_) => Err(Error::InvalidField {
            class: class.name.clone(),
            field: ADDRESS_POOL.to_string(),
            message: "must be a list of addresses".to_string(),
        }),
    }
}

/// Expand a resolved blade class into its instances.
///
/// Pure base classes produce nothing. The result depends only on the
/// resolved class, so repeated calls yield identical records.
pub fn instantiate(class: &ResolvedClass) -> Result<Vec<ResourceInstance>> {
    if !class.is_instantiable() {
        return Ok(Vec::new());
    }

    let count = count(class)?;
    let hostname = class.str_field("hostname")?;
    let prefix = match class.get("name_prefix") {
        None | Some(YamlValue::Null) => hostname,
        Some(_) => class.str_field("name_prefix")?,
    };
    let separator = match class.get("hostname_suffix_separator") {
        None | Some(YamlValue::Null) => DEFAULT_SEPARATOR,
        Some(_) => class.str_field("hostname_suffix_separator")?,
    };
    let suffixed = class.bool_field("add_hostname_suffix")?.unwrap_or(false) || count > 1;

    let pool = address_pool(class)?;
    if let Some(pool) = &pool {
        if pool.len() < count {
            return Err(Error::InsufficientAddressPool {
                class: class.name.clone(),
                count,
                available: pool.len(),
            });
        }
    }

    Ok((0..count)
        .map(|index| {
            let (name, host) = if suffixed {
                let suffix = index + 1;
                (
                    format!("{}{}{}", prefix, separator, suffix),
                    format!("{}{}{}", hostname, separator, suffix),
                )
            } else {
                (hostname.to_string(), hostname.to_string())
            };
            ResourceInstance {
                class: class.name.clone(),
                index,
                name,
                hostname: host,
                address: pool.as_ref().map(|pool| pool[index].clone()),
                fields: class.payload.clone(),
            }
        })
        .collect())
}

/// Build the interconnect record of a resolved interconnect class.
///
/// Returns `None` for pure base classes.
pub fn interconnect(class: &ResolvedClass) -> Result<Option<Interconnect>> {
    if !class.is_instantiable() {
        return Ok(None);
    }
    debug_assert_eq!(class.kind, ResourceKind::BladeInterconnect);
    Ok(Some(Interconnect {
        class: class.name.clone(),
        network_name: class.str_field("network_name")?.to_string(),
        ipv4_cidr: class.str_field("ipv4_cidr")?.to_string(),
        fields: class.payload.clone(),
    }))
}
