//! Build records from `.build.info` and the remote version endpoints.

use casc_formats::TextTable;

use crate::error::Result;

/// One enumerable build. Local builds carry `build_key`/`cdn_key` from
/// `.build.info`; remote builds carry the config keys and display name
/// from the `/versions` listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Build {
    pub product: String,
    pub region: String,
    pub branch: String,
    pub version: String,
    pub build_key: String,
    pub cdn_key: String,
    pub build_config: String,
    pub cdn_config: String,
    pub versions_name: String,
}

/// Whether a `.build.info` product row belongs to the game family this
/// client serves.
pub fn is_wow_product(product: &str) -> bool {
    product == "wow"
        || product.starts_with("wow_")
        || product.starts_with("wowt")
        || product.starts_with("wowxptr")
}

/// Parse `.build.info`, keeping only rows for known products.
pub fn parse_build_info(data: &str) -> Result<Vec<Build>> {
    let table = TextTable::parse(data)?;
    let mut builds = Vec::new();
    for row in 0..table.row_count() {
        let product = table.get(row, "Product").unwrap_or_default();
        if !is_wow_product(product) {
            continue;
        }
        builds.push(Build {
            product: product.to_string(),
            branch: table.get(row, "Branch").unwrap_or_default().to_string(),
            version: table.get(row, "Version").unwrap_or_default().to_string(),
            build_key: table.get(row, "BuildKey").unwrap_or_default().to_string(),
            cdn_key: table.get(row, "CDNKey").unwrap_or_default().to_string(),
            ..Build::default()
        });
    }
    Ok(builds)
}

/// Extract the builds of one product from a `/versions` table, keeping
/// only rows for `region`.
pub fn builds_from_versions(table: &TextTable, product: &str, region: &str) -> Vec<Build> {
    let mut builds = Vec::new();
    for row in 0..table.row_count() {
        if table.get(row, "Region") != Some(region) {
            continue;
        }
        builds.push(Build {
            product: product.to_string(),
            region: region.to_string(),
            build_config: table.get(row, "BuildConfig").unwrap_or_default().to_string(),
            cdn_config: table.get(row, "CDNConfig").unwrap_or_default().to_string(),
            versions_name: table
                .get(row, "VersionsName")
                .unwrap_or_default()
                .to_string(),
            ..Build::default()
        });
    }
    builds
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUILD_INFO: &str = "\
Branch!STRING:0|Active!DEC:1|Build Key!HEX:16|CDN Key!HEX:16|Install Key!HEX:16|IM Size!DEC:4|CDN Path!STRING:0|CDN Hosts!STRING:0|Tags!STRING:0|Armadillo!STRING:0|Last Activated!STRING:0|Version!STRING:0|KeyRing!HEX:16|Product!STRING:0\n\
us|1|aabbccdd|11223344||||||||10.0.0.46000||wow\n\
us|0|eeff0011|55667788||||||||1.14.3.46112||wow_classic_era\n\
us|0|deadbeef|99aabbcc||||||||4.4.0.53750||agent\n";

    #[test]
    fn parses_and_filters_products() {
        let builds = parse_build_info(BUILD_INFO).unwrap();
        assert_eq!(builds.len(), 2);
        assert_eq!(builds[0].product, "wow");
        assert_eq!(builds[0].build_key, "aabbccdd");
        assert_eq!(builds[0].cdn_key, "11223344");
        assert_eq!(builds[0].version, "10.0.0.46000");
        assert_eq!(builds[1].product, "wow_classic_era");
    }

    #[test]
    fn product_family_matching() {
        assert!(is_wow_product("wow"));
        assert!(is_wow_product("wowt"));
        assert!(is_wow_product("wowxptr"));
        assert!(is_wow_product("wow_beta"));
        assert!(!is_wow_product("agent"));
        assert!(!is_wow_product("pro"));
        assert!(!is_wow_product("w"));
    }

    #[test]
    fn versions_rows_filter_by_region() {
        let table = TextTable::parse(
            "Region!STRING:0|BuildConfig!HEX:16|CDNConfig!HEX:16|VersionsName!String:0\n\
             us|b1|c1|10.0.0.1\n\
             eu|b2|c2|10.0.0.2\n",
        )
        .unwrap();
        let builds = builds_from_versions(&table, "wow", "eu");
        assert_eq!(builds.len(), 1);
        assert_eq!(builds[0].build_config, "b2");
        assert_eq!(builds[0].versions_name, "10.0.0.2");
        assert_eq!(builds[0].product, "wow");
    }
}
