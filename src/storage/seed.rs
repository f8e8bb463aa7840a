//! Municipality code seed files
//!
//! One code per line as `county_code,municip_code,county_name,municipality_name`,
//! e.g. `14,17,Morris,Madison Borough`. Blank lines, `#` comments and a
//! leading `county_code,...` header are skipped.

use crate::storage::MunicipalityCode;
use crate::ScoutError;

/// Parses a seed file into code rows, in file order
///
/// Fails on the first malformed line; nothing is returned for a partially valid file.
pub fn parse_municipality_codes(text: &str) -> Result<Vec<MunicipalityCode>, ScoutError> {
    let mut codes = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("county_code") {
            continue;
        }

        let invalid = |message: String| ScoutError::InvalidSeed {
            line: index + 1,
            message,
        };

        let fields: Vec<&str> = line.splitn(4, ',').map(str::trim).collect();
        let [county_code, municip_code, county_name, municipality_name] = fields[..] else {
            return Err(invalid(format!("expected 4 fields, got {}", fields.len())));
        };

        for (name, code) in [("county code", county_code), ("municipality code", municip_code)] {
            if code.len() != 2 || !code.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid(format!("{} must be two digits, got '{}'", name, code)));
            }
        }

        if county_name.is_empty() || municipality_name.is_empty() {
            return Err(invalid("names cannot be blank".to_string()));
        }

        codes.push(MunicipalityCode::new(
            county_code,
            municip_code,
            county_name,
            municipality_name,
        ));
    }

    Ok(codes)
}
