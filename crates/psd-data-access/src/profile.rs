//! ---
//! psd_section: "04-data-access"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Versioned raw profile discovery."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use std::collections::BTreeSet;

use psd_storage::FileSystem;

use crate::Result;

/// Profile families stored under `raw/<grid_model>/<kind>_<version>.csv`.
pub const PROFILE_KINDS: &[&str] = &[
    "demand",
    "hydro",
    "solar",
    "wind",
    "demand_flexibility_up",
    "demand_flexibility_dn",
    "demand_flexibility_cost_up",
    "demand_flexibility_cost_dn",
];

/// Directory holding the raw profiles of a grid model.
pub fn profile_dir(grid_model: &str) -> String {
    format!("raw/{grid_model}")
}

/// File name of one profile version.
pub fn profile_file_name(kind: &str, version: &str) -> String {
    format!("{kind}_{version}.csv")
}

/// Version encoded in a profile file name, if the name belongs to `kind`.
///
/// Names of a longer family sharing the prefix (`demand_flexibility_up_*`
/// for `demand`) are not versions of `kind`.
pub fn version_of(kind: &str, file_name: &str) -> Option<String> {
    let version = file_name
        .strip_prefix(kind)?
        .strip_prefix('_')?
        .strip_suffix(".csv")?;
    if version.is_empty() {
        return None;
    }
    let shadowed = PROFILE_KINDS.iter().any(|other| {
        other.len() > kind.len()
            && other.starts_with(kind)
            && file_name.starts_with(&format!("{other}_"))
    });
    (!shadowed).then(|| version.to_owned())
}

/// Versions of `kind` available on one backend for `grid_model`.
///
/// A missing directory yields no versions.
pub fn profile_versions(fs: &dyn FileSystem, grid_model: &str, kind: &str) -> Result<BTreeSet<String>> {
    let dir = profile_dir(grid_model);
    if !fs.is_dir(&dir)? {
        return Ok(BTreeSet::new());
    }
    Ok(fs
        .list_dir(&dir)?
        .iter()
        .filter_map(|name| version_of(kind, name))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use psd_storage::MemoryFs;

    #[test]
    fn versions_are_extracted_per_family() {
        assert_eq!(version_of("demand", "demand_vJan2021.csv").as_deref(), Some("vJan2021"));
        assert_eq!(version_of("demand", "demand_flexibility_up_vJan2021.csv"), None);
        assert_eq!(
            version_of("demand_flexibility_up", "demand_flexibility_up_vJan2021.csv").as_deref(),
            Some("vJan2021")
        );
        assert_eq!(version_of("solar", "solar_vJan2021.pkl"), None);
        assert_eq!(version_of("wind", "wind_.csv"), None);
    }

    #[test]
    fn listing_filters_one_backend() {
        let fs = MemoryFs::new("profiles");
        for name in ["demand_v1.csv", "demand_v2.csv", "solar_v1.csv"] {
            fs.write_bytes(&format!("raw/usa_tamu/{name}"), b"UTC\n").unwrap();
        }
        let versions = profile_versions(&fs, "usa_tamu", "demand").unwrap();
        assert_eq!(versions.into_iter().collect::<Vec<_>>(), ["v1", "v2"]);
        assert!(profile_versions(&fs, "hifld", "demand").unwrap().is_empty());
    }
}
